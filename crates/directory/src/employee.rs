use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orgdir_core::EntityId;

use crate::department::{Department, DepartmentDto};

/// An employee, member of any number of departments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Employee {
    pub id: Option<EntityId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub position: Option<String>,
    pub email: Option<String>,
    pub departments: BTreeSet<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Employee {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-loading reference: a handle carrying only the id.
    pub fn with_id(id: EntityId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Copy scalar attributes from the transfer shape. The department set
    /// is untouched.
    pub fn copy_scalars(&mut self, dto: &EmployeeDto) {
        self.first_name = dto.first_name.clone();
        self.last_name = dto.last_name.clone();
        self.age = dto.age;
        self.position = dto.position.clone();
        self.email = dto.email.clone();
    }
}

/// Wire-facing projection of an [`Employee`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmployeeDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub position: Option<String>,
    pub email: Option<String>,
    pub departments: Vec<DepartmentDto>,
}

impl EmployeeDto {
    /// Scalar attributes only; `departments` stays empty.
    pub fn shallow(employee: &Employee) -> Self {
        Self {
            id: employee.id,
            first_name: employee.first_name.clone(),
            last_name: employee.last_name.clone(),
            age: employee.age,
            position: employee.position.clone(),
            email: employee.email.clone(),
            departments: Vec::new(),
        }
    }

    /// Shallow projection plus one level of shallow department projections.
    pub fn detailed(employee: &Employee, departments: &[Department]) -> Self {
        let mut dto = Self::shallow(employee);
        dto.departments = departments.iter().map(DepartmentDto::shallow).collect();
        dto
    }
}
