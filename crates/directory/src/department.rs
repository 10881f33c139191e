use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orgdir_core::EntityId;

use crate::employee::{Employee, EmployeeDto};

/// A department: belongs to at most one enterprise and holds a set of
/// employees.
///
/// `enterprise_id` is derived from the enterprise↔department relation rows
/// when the entity is loaded. It is read-only on the department side;
/// membership is edited from the enterprise.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Department {
    pub id: Option<EntityId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub enterprise_id: Option<EntityId>,
    pub employees: BTreeSet<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Department {
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

    /// Copy scalar attributes from the transfer shape. `enterprise_id` and
    /// the employee set are untouched.
    pub fn copy_scalars(&mut self, dto: &DepartmentDto) {
        self.name = dto.name.clone();
        self.description = dto.description.clone();
        self.phone = dto.phone.clone();
    }
}

/// Wire-facing projection of a [`Department`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DepartmentDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub enterprise_id: Option<EntityId>,
    pub employees: Vec<EmployeeDto>,
}

impl DepartmentDto {
    /// Scalar attributes only; `employees` stays empty.
    pub fn shallow(department: &Department) -> Self {
        Self {
            id: department.id,
            name: department.name.clone(),
            description: department.description.clone(),
            phone: department.phone.clone(),
            enterprise_id: department.enterprise_id,
            employees: Vec::new(),
        }
    }

    /// Shallow projection plus one level of shallow employee projections.
    pub fn detailed(department: &Department, employees: &[Employee]) -> Self {
        let mut dto = Self::shallow(department);
        dto.employees = employees.iter().map(EmployeeDto::shallow).collect();
        dto
    }
}
