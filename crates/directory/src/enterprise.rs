use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orgdir_core::EntityId;

use crate::department::{Department, DepartmentDto};

/// An enterprise groups departments.
///
/// `departments` holds only the ids of the member departments (the join
/// rows), never loaded department state. An `id` of `None` marks an entity
/// that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Enterprise {
    pub id: Option<EntityId>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub departments: BTreeSet<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Enterprise {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-loading reference: a handle carrying only the id.
    ///
    /// Existence is validated by the store when the handle is flushed,
    /// not here.
    pub fn with_id(id: EntityId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Copy scalar attributes from the transfer shape. Relation sets are
    /// untouched.
    pub fn copy_scalars(&mut self, dto: &EnterpriseDto) {
        self.name = dto.name.clone();
        self.address = dto.address.clone();
        self.phone = dto.phone.clone();
    }
}

/// Wire-facing projection of an [`Enterprise`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnterpriseDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub departments: Vec<DepartmentDto>,
}

impl EnterpriseDto {
    /// Scalar attributes only; `departments` stays empty.
    pub fn shallow(enterprise: &Enterprise) -> Self {
        Self {
            id: enterprise.id,
            name: enterprise.name.clone(),
            address: enterprise.address.clone(),
            phone: enterprise.phone.clone(),
            departments: Vec::new(),
        }
    }

    /// Shallow projection plus one level of shallow department projections.
    pub fn detailed(enterprise: &Enterprise, departments: &[Department]) -> Self {
        let mut dto = Self::shallow(enterprise);
        dto.departments = departments.iter().map(DepartmentDto::shallow).collect();
        dto
    }
}
