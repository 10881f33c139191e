//! The entity-store contract.

use async_trait::async_trait;

use orgdir_core::EntityId;
use orgdir_directory::{Department, Employee, Enterprise, Role, User};

use crate::error::StoreResult;

/// Persistent store for the five directory entity kinds and their relation
/// tables.
///
/// Semantics shared by every implementation:
///
/// - Loads (`*_all`, `*_by_id`) return entities with their relation id sets
///   populated from the join tables; `*_all` never fails on an empty store.
/// - `insert_*` assigns the identity, writes scalars and relation rows in
///   one atomic unit, and returns the persisted entity.
/// - `update_*` performs **no upfront existence check**: a missing id
///   surfaces as [`StoreError::RowMissing`](crate::StoreError::RowMissing)
///   when the write flushes. Owned relation rows are cleared and rebuilt
///   from the entity's relation set; every referenced id is validated at
///   flush time ([`StoreError::MissingReference`](crate::StoreError::MissingReference)
///   if absent). Atomic: scalars and relation rows commit or roll back
///   together.
/// - `delete_*` removes the row together with the relation rows it owns;
///   relation rows that *reference* the entity block the delete with
///   [`StoreError::IntegrityViolation`](crate::StoreError::IntegrityViolation),
///   leaving the entity untouched.
///
/// Concurrent writers are serialized by the implementation (transaction
/// isolation or a process-wide lock); last writer wins.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    // enterprises
    async fn enterprises(&self) -> StoreResult<Vec<Enterprise>>;
    async fn enterprise_by_id(&self, id: EntityId) -> StoreResult<Option<Enterprise>>;
    async fn insert_enterprise(&self, enterprise: Enterprise) -> StoreResult<Enterprise>;
    async fn update_enterprise(&self, id: EntityId, enterprise: Enterprise) -> StoreResult<Enterprise>;
    async fn delete_enterprise(&self, id: EntityId) -> StoreResult<()>;

    // departments
    async fn departments(&self) -> StoreResult<Vec<Department>>;
    async fn department_by_id(&self, id: EntityId) -> StoreResult<Option<Department>>;
    async fn insert_department(&self, department: Department) -> StoreResult<Department>;
    async fn update_department(&self, id: EntityId, department: Department) -> StoreResult<Department>;
    async fn delete_department(&self, id: EntityId) -> StoreResult<()>;

    // employees
    async fn employees(&self) -> StoreResult<Vec<Employee>>;
    async fn employee_by_id(&self, id: EntityId) -> StoreResult<Option<Employee>>;
    async fn insert_employee(&self, employee: Employee) -> StoreResult<Employee>;
    async fn update_employee(&self, id: EntityId, employee: Employee) -> StoreResult<Employee>;
    async fn delete_employee(&self, id: EntityId) -> StoreResult<()>;

    // users
    async fn users(&self) -> StoreResult<Vec<User>>;
    async fn user_by_id(&self, id: EntityId) -> StoreResult<Option<User>>;
    async fn insert_user(&self, user: User) -> StoreResult<User>;
    async fn update_user(&self, id: EntityId, user: User) -> StoreResult<User>;
    async fn delete_user(&self, id: EntityId) -> StoreResult<()>;

    // roles (attach-only: no HTTP surface, used for seeding and projection)
    async fn roles(&self) -> StoreResult<Vec<Role>>;
    async fn role_by_id(&self, id: EntityId) -> StoreResult<Option<Role>>;
    async fn insert_role(&self, role: Role) -> StoreResult<Role>;
}
