//! In-memory store for dev and tests.
//!
//! One `RwLock` serializes writers, standing in for the transaction
//! isolation a database would provide. Every mutating operation validates
//! all references before applying anything, so a failed write leaves the
//! store untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use async_trait::async_trait;

use orgdir_core::EntityId;
use orgdir_directory::{Department, Employee, Enterprise, Role, User};

use crate::error::{StoreError, StoreResult};
use crate::store::DirectoryStore;

/// One many-to-many join table: (owner id, target id) pairs.
///
/// The owning side's rows are cleared and rebuilt on save and removed with
/// the owner; rows referencing an entity as target block its deletion.
#[derive(Debug, Default)]
struct EdgeTable {
    edges: BTreeSet<(EntityId, EntityId)>,
}

impl EdgeTable {
    fn targets_of(&self, owner: EntityId) -> BTreeSet<EntityId> {
        self.edges
            .iter()
            .filter(|(o, _)| *o == owner)
            .map(|(_, t)| *t)
            .collect()
    }

    fn owners_of(&self, target: EntityId) -> BTreeSet<EntityId> {
        self.edges
            .iter()
            .filter(|(_, t)| *t == target)
            .map(|(o, _)| *o)
            .collect()
    }

    fn add(&mut self, owner: EntityId, target: EntityId) {
        self.edges.insert((owner, target));
    }

    fn clear_owner(&mut self, owner: EntityId) {
        self.edges.retain(|(o, _)| *o != owner);
    }

    fn clear_target(&mut self, target: EntityId) {
        self.edges.retain(|(_, t)| *t != target);
    }

    fn references(&self, target: EntityId) -> bool {
        self.edges.iter().any(|(_, t)| *t == target)
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    enterprises: BTreeMap<EntityId, Enterprise>,
    departments: BTreeMap<EntityId, Department>,
    employees: BTreeMap<EntityId, Employee>,
    users: BTreeMap<EntityId, User>,
    roles: BTreeMap<EntityId, Role>,
    enterprise_departments: EdgeTable,
    department_employees: EdgeTable,
    user_roles: EdgeTable,
}

impl Inner {
    fn next_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId::new(self.next_id)
    }

    fn require_departments(&self, ids: &BTreeSet<EntityId>) -> StoreResult<()> {
        for id in ids {
            if !self.departments.contains_key(id) {
                return Err(StoreError::MissingReference {
                    kind: "department",
                    id: *id,
                });
            }
        }
        Ok(())
    }

    fn require_employees(&self, ids: &BTreeSet<EntityId>) -> StoreResult<()> {
        for id in ids {
            if !self.employees.contains_key(id) {
                return Err(StoreError::MissingReference {
                    kind: "employee",
                    id: *id,
                });
            }
        }
        Ok(())
    }

    fn require_roles(&self, ids: &BTreeSet<EntityId>) -> StoreResult<()> {
        for id in ids {
            if !self.roles.contains_key(id) {
                return Err(StoreError::MissingReference {
                    kind: "role",
                    id: *id,
                });
            }
        }
        Ok(())
    }

    // Loads rebuild relation fields from the join tables; the maps hold
    // scalar state only.

    fn load_enterprise(&self, id: EntityId) -> Option<Enterprise> {
        let mut enterprise = self.enterprises.get(&id)?.clone();
        enterprise.departments = self.enterprise_departments.targets_of(id);
        Some(enterprise)
    }

    fn load_department(&self, id: EntityId) -> Option<Department> {
        let mut department = self.departments.get(&id)?.clone();
        department.employees = self.department_employees.targets_of(id);
        department.enterprise_id = self
            .enterprise_departments
            .owners_of(id)
            .into_iter()
            .next();
        Some(department)
    }

    fn load_employee(&self, id: EntityId) -> Option<Employee> {
        let mut employee = self.employees.get(&id)?.clone();
        employee.departments = self.department_employees.owners_of(id);
        Some(employee)
    }

    fn load_user(&self, id: EntityId) -> Option<User> {
        let mut user = self.users.get(&id)?.clone();
        user.roles = self.user_roles.targets_of(id);
        Some(user)
    }
}

/// In-memory [`DirectoryStore`] implementation.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::backend("store lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::backend("store lock poisoned"))
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    // ── enterprises ────────────────────────────────────────────────────

    async fn enterprises(&self) -> StoreResult<Vec<Enterprise>> {
        let inner = self.read()?;
        Ok(inner
            .enterprises
            .keys()
            .filter_map(|id| inner.load_enterprise(*id))
            .collect())
    }

    async fn enterprise_by_id(&self, id: EntityId) -> StoreResult<Option<Enterprise>> {
        Ok(self.read()?.load_enterprise(id))
    }

    async fn insert_enterprise(&self, mut enterprise: Enterprise) -> StoreResult<Enterprise> {
        let mut inner = self.write()?;
        inner.require_departments(&enterprise.departments)?;

        let id = inner.next_id();
        enterprise.id = Some(id);
        enterprise.created_at = Some(Utc::now());
        enterprise.updated_at = None;

        let departments = std::mem::take(&mut enterprise.departments);
        for dept in &departments {
            inner.enterprise_departments.add(id, *dept);
        }
        inner.enterprises.insert(id, enterprise);

        inner
            .load_enterprise(id)
            .ok_or_else(|| StoreError::backend("row vanished after insert"))
    }

    async fn update_enterprise(
        &self,
        id: EntityId,
        mut enterprise: Enterprise,
    ) -> StoreResult<Enterprise> {
        let mut inner = self.write()?;
        // existence is detected here, at flush time
        let existing = inner.enterprises.get(&id).ok_or(StoreError::RowMissing(id))?;

        enterprise.id = Some(id);
        enterprise.created_at = existing.created_at;
        enterprise.updated_at = Some(Utc::now());
        inner.require_departments(&enterprise.departments)?;

        let departments = std::mem::take(&mut enterprise.departments);
        inner.enterprise_departments.clear_owner(id);
        for dept in &departments {
            inner.enterprise_departments.add(id, *dept);
        }
        inner.enterprises.insert(id, enterprise);

        inner
            .load_enterprise(id)
            .ok_or_else(|| StoreError::backend("row vanished after update"))
    }

    async fn delete_enterprise(&self, id: EntityId) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.enterprises.remove(&id).is_none() {
            return Err(StoreError::RowMissing(id));
        }
        // owned relation rows go with the owner
        inner.enterprise_departments.clear_owner(id);
        Ok(())
    }

    // ── departments ────────────────────────────────────────────────────

    async fn departments(&self) -> StoreResult<Vec<Department>> {
        let inner = self.read()?;
        Ok(inner
            .departments
            .keys()
            .filter_map(|id| inner.load_department(*id))
            .collect())
    }

    async fn department_by_id(&self, id: EntityId) -> StoreResult<Option<Department>> {
        Ok(self.read()?.load_department(id))
    }

    async fn insert_department(&self, mut department: Department) -> StoreResult<Department> {
        let mut inner = self.write()?;
        inner.require_employees(&department.employees)?;

        let id = inner.next_id();
        department.id = Some(id);
        department.enterprise_id = None;
        department.created_at = Some(Utc::now());
        department.updated_at = None;

        let employees = std::mem::take(&mut department.employees);
        for emp in &employees {
            inner.department_employees.add(id, *emp);
        }
        inner.departments.insert(id, department);

        inner
            .load_department(id)
            .ok_or_else(|| StoreError::backend("row vanished after insert"))
    }

    async fn update_department(
        &self,
        id: EntityId,
        mut department: Department,
    ) -> StoreResult<Department> {
        let mut inner = self.write()?;
        let existing = inner.departments.get(&id).ok_or(StoreError::RowMissing(id))?;

        department.id = Some(id);
        department.enterprise_id = None;
        department.created_at = existing.created_at;
        department.updated_at = Some(Utc::now());
        inner.require_employees(&department.employees)?;

        let employees = std::mem::take(&mut department.employees);
        inner.department_employees.clear_owner(id);
        for emp in &employees {
            inner.department_employees.add(id, *emp);
        }
        inner.departments.insert(id, department);

        inner
            .load_department(id)
            .ok_or_else(|| StoreError::backend("row vanished after update"))
    }

    async fn delete_department(&self, id: EntityId) -> StoreResult<()> {
        let mut inner = self.write()?;
        if !inner.departments.contains_key(&id) {
            return Err(StoreError::RowMissing(id));
        }
        if inner.enterprise_departments.references(id) {
            return Err(StoreError::IntegrityViolation(format!(
                "department {id} is still referenced by an enterprise"
            )));
        }
        inner.departments.remove(&id);
        inner.department_employees.clear_owner(id);
        Ok(())
    }

    // ── employees ──────────────────────────────────────────────────────

    async fn employees(&self) -> StoreResult<Vec<Employee>> {
        let inner = self.read()?;
        Ok(inner
            .employees
            .keys()
            .filter_map(|id| inner.load_employee(*id))
            .collect())
    }

    async fn employee_by_id(&self, id: EntityId) -> StoreResult<Option<Employee>> {
        Ok(self.read()?.load_employee(id))
    }

    async fn insert_employee(&self, mut employee: Employee) -> StoreResult<Employee> {
        let mut inner = self.write()?;
        inner.require_departments(&employee.departments)?;

        let id = inner.next_id();
        employee.id = Some(id);
        employee.created_at = Some(Utc::now());
        employee.updated_at = None;

        // employee-side writes target the same department↔employee table
        let departments = std::mem::take(&mut employee.departments);
        for dept in &departments {
            inner.department_employees.add(*dept, id);
        }
        inner.employees.insert(id, employee);

        inner
            .load_employee(id)
            .ok_or_else(|| StoreError::backend("row vanished after insert"))
    }

    async fn update_employee(
        &self,
        id: EntityId,
        mut employee: Employee,
    ) -> StoreResult<Employee> {
        let mut inner = self.write()?;
        let existing = inner.employees.get(&id).ok_or(StoreError::RowMissing(id))?;

        employee.id = Some(id);
        employee.created_at = existing.created_at;
        employee.updated_at = Some(Utc::now());
        inner.require_departments(&employee.departments)?;

        let departments = std::mem::take(&mut employee.departments);
        inner.department_employees.clear_target(id);
        for dept in &departments {
            inner.department_employees.add(*dept, id);
        }
        inner.employees.insert(id, employee);

        inner
            .load_employee(id)
            .ok_or_else(|| StoreError::backend("row vanished after update"))
    }

    async fn delete_employee(&self, id: EntityId) -> StoreResult<()> {
        let mut inner = self.write()?;
        if !inner.employees.contains_key(&id) {
            return Err(StoreError::RowMissing(id));
        }
        if inner.department_employees.references(id) {
            return Err(StoreError::IntegrityViolation(format!(
                "employee {id} is still referenced by a department"
            )));
        }
        inner.employees.remove(&id);
        Ok(())
    }

    // ── users ──────────────────────────────────────────────────────────

    async fn users(&self) -> StoreResult<Vec<User>> {
        let inner = self.read()?;
        Ok(inner
            .users
            .keys()
            .filter_map(|id| inner.load_user(*id))
            .collect())
    }

    async fn user_by_id(&self, id: EntityId) -> StoreResult<Option<User>> {
        Ok(self.read()?.load_user(id))
    }

    async fn insert_user(&self, mut user: User) -> StoreResult<User> {
        let mut inner = self.write()?;
        inner.require_roles(&user.roles)?;

        let id = inner.next_id();
        user.id = Some(id);
        user.created_at = Some(Utc::now());
        user.updated_at = None;

        let roles = std::mem::take(&mut user.roles);
        for role in &roles {
            inner.user_roles.add(id, *role);
        }
        inner.users.insert(id, user);

        inner
            .load_user(id)
            .ok_or_else(|| StoreError::backend("row vanished after insert"))
    }

    async fn update_user(&self, id: EntityId, mut user: User) -> StoreResult<User> {
        let mut inner = self.write()?;
        let existing = inner.users.get(&id).ok_or(StoreError::RowMissing(id))?;

        user.id = Some(id);
        user.created_at = existing.created_at;
        user.updated_at = Some(Utc::now());
        // the stored credential survives updates untouched
        user.password_hash = existing.password_hash.clone();
        inner.require_roles(&user.roles)?;

        let roles = std::mem::take(&mut user.roles);
        inner.user_roles.clear_owner(id);
        for role in &roles {
            inner.user_roles.add(id, *role);
        }
        inner.users.insert(id, user);

        inner
            .load_user(id)
            .ok_or_else(|| StoreError::backend("row vanished after update"))
    }

    async fn delete_user(&self, id: EntityId) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.users.remove(&id).is_none() {
            return Err(StoreError::RowMissing(id));
        }
        inner.user_roles.clear_owner(id);
        Ok(())
    }

    // ── roles ──────────────────────────────────────────────────────────

    async fn roles(&self) -> StoreResult<Vec<Role>> {
        Ok(self.read()?.roles.values().cloned().collect())
    }

    async fn role_by_id(&self, id: EntityId) -> StoreResult<Option<Role>> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn insert_role(&self, mut role: Role) -> StoreResult<Role> {
        let mut inner = self.write()?;
        let id = inner.next_id();
        role.id = Some(id);
        inner.roles.insert(id, role.clone());
        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dept(name: &str) -> Department {
        let mut d = Department::new();
        d.name = Some(name.to_string());
        d
    }

    fn emp(first: &str) -> Employee {
        let mut e = Employee::new();
        e.first_name = Some(first.to_string());
        e
    }

    #[tokio::test]
    async fn insert_assigns_increasing_identities() {
        let store = InMemoryDirectoryStore::new();
        let a = store.insert_department(dept("a")).await.unwrap();
        let b = store.insert_department(dept("b")).await.unwrap();
        assert!(a.id.unwrap().as_i64() > 0);
        assert!(b.id.unwrap() > a.id.unwrap());
        assert!(a.created_at.is_some());
        assert!(a.updated_at.is_none());
    }

    #[tokio::test]
    async fn update_of_absent_row_fails_at_flush() {
        let store = InMemoryDirectoryStore::new();
        let err = store
            .update_department(EntityId::new(404), dept("ghost"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::RowMissing(EntityId::new(404)));
    }

    #[tokio::test]
    async fn missing_reference_surfaces_at_save_and_applies_nothing() {
        let store = InMemoryDirectoryStore::new();
        let d = store.insert_department(dept("eng")).await.unwrap();
        let id = d.id.unwrap();

        // one valid employee, one dangling reference
        let e = store.insert_employee(emp("ada")).await.unwrap();
        let mut edit = dept("eng renamed");
        edit.employees.insert(e.id.unwrap());
        edit.employees.insert(EntityId::new(999));

        let err = store.update_department(id, edit).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::MissingReference {
                kind: "employee",
                id: EntityId::new(999)
            }
        );

        // nothing was applied: scalars and relation rows are untouched
        let reloaded = store.department_by_id(id).await.unwrap().unwrap();
        assert_eq!(reloaded.name.as_deref(), Some("eng"));
        assert!(reloaded.employees.is_empty());
    }

    #[tokio::test]
    async fn save_rebuilds_relation_rows_from_scratch() {
        let store = InMemoryDirectoryStore::new();
        let e1 = store.insert_employee(emp("a")).await.unwrap().id.unwrap();
        let e2 = store.insert_employee(emp("b")).await.unwrap().id.unwrap();

        let mut d = dept("support");
        d.employees.insert(e1);
        d.employees.insert(e2);
        let d = store.insert_department(d).await.unwrap();
        let id = d.id.unwrap();
        assert_eq!(d.employees.len(), 2);

        let mut edit = dept("support");
        edit.employees.insert(e1);
        let updated = store.update_department(id, edit).await.unwrap();
        assert_eq!(updated.employees, BTreeSet::from([e1]));

        // the dropped edge is visible from the employee side too
        let b = store.employee_by_id(e2).await.unwrap().unwrap();
        assert!(b.departments.is_empty());
    }

    #[tokio::test]
    async fn delete_of_referenced_target_is_rejected_whole() {
        let store = InMemoryDirectoryStore::new();
        let e = store.insert_employee(emp("ada")).await.unwrap().id.unwrap();
        let mut d = dept("eng");
        d.employees.insert(e);
        store.insert_department(d).await.unwrap();

        let err = store.delete_employee(e).await.unwrap_err();
        assert!(matches!(err, StoreError::IntegrityViolation(_)));
        // the employee is still retrievable afterwards
        assert!(store.employee_by_id(e).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_of_owner_removes_its_relation_rows() {
        let store = InMemoryDirectoryStore::new();
        let d = store.insert_department(dept("eng")).await.unwrap().id.unwrap();
        let mut ent = Enterprise::new();
        ent.departments.insert(d);
        let ent = store.insert_enterprise(ent).await.unwrap();
        let ent_id = ent.id.unwrap();

        let loaded = store.department_by_id(d).await.unwrap().unwrap();
        assert_eq!(loaded.enterprise_id, Some(ent_id));

        store.delete_enterprise(ent_id).await.unwrap();
        let loaded = store.department_by_id(d).await.unwrap().unwrap();
        assert_eq!(loaded.enterprise_id, None);
    }

    #[tokio::test]
    async fn delete_of_absent_row_is_row_missing() {
        let store = InMemoryDirectoryStore::new();
        let err = store.delete_enterprise(EntityId::new(5)).await.unwrap_err();
        assert_eq!(err, StoreError::RowMissing(EntityId::new(5)));
    }

    #[tokio::test]
    async fn update_preserves_created_at_and_credentials() {
        let store = InMemoryDirectoryStore::new();
        let mut u = User::new();
        u.email = Some("a@b.c".to_string());
        u.password_hash = Some("hash-1".to_string());
        let u = store.insert_user(u).await.unwrap();
        let id = u.id.unwrap();

        let mut edit = User::new();
        edit.email = Some("a@b.d".to_string());
        edit.password_hash = Some("attacker-controlled".to_string());
        let updated = store.update_user(id, edit).await.unwrap();

        assert_eq!(updated.created_at, u.created_at);
        assert!(updated.updated_at.is_some());
        assert_eq!(updated.password_hash.as_deref(), Some("hash-1"));
    }
}
