//! Entity services: the layer between the HTTP routes and the store.
//!
//! Each service owns the same five operations. Listings project shallow
//! (scalars only); lookups by id project one level of relations. Inserts
//! and updates copy scalars onto the entity and rebuild its relation id set
//! from the incoming nested DTOs — full-replace semantics: any relation id
//! omitted from the request is removed. Updates build a non-loading
//! reference for the target id and let the store detect a missing row at
//! flush, never via an upfront existence check.

use std::collections::BTreeSet;
use std::sync::Arc;

use orgdir_core::{DomainError, DomainResult, EntityId};
use orgdir_directory::{
    CreateUserDto, Department, DepartmentDto, Employee, EmployeeDto, Enterprise, EnterpriseDto,
    Role, RoleDto, User, UserDto,
};
use orgdir_store::{DirectoryStore, StoreError};

/// Translate a store-level signal into a domain error, exactly once.
fn translate(err: StoreError) -> DomainError {
    match err {
        StoreError::RowMissing(id) => DomainError::NotFound(id.as_i64()),
        // a dangling non-loading reference is a not-found, surfaced at flush
        StoreError::MissingReference { id, .. } => DomainError::NotFound(id.as_i64()),
        StoreError::IntegrityViolation(_) => DomainError::conflict("data integrity violation"),
        StoreError::Backend(msg) => DomainError::Store(msg),
    }
}

/// Collect the ids of the nested relation DTOs. Every nested entry must
/// carry an id; anything else in it is ignored.
fn collect_ids(
    ids: impl IntoIterator<Item = Option<EntityId>>,
    kind: &str,
) -> DomainResult<BTreeSet<EntityId>> {
    ids.into_iter()
        .map(|id| {
            id.ok_or_else(|| DomainError::validation(format!("nested {kind} requires an id")))
        })
        .collect()
}

// ── enterprises ─────────────────────────────────────────────────────────

pub struct EnterpriseService {
    store: Arc<dyn DirectoryStore>,
}

impl EnterpriseService {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    pub async fn find_all(&self) -> DomainResult<Vec<EnterpriseDto>> {
        let list = self.store.enterprises().await.map_err(translate)?;
        Ok(list.iter().map(EnterpriseDto::shallow).collect())
    }

    pub async fn find_by_id(&self, id: EntityId) -> DomainResult<EnterpriseDto> {
        let enterprise = self
            .store
            .enterprise_by_id(id)
            .await
            .map_err(translate)?
            .ok_or(DomainError::NotFound(id.as_i64()))?;

        let mut departments = Vec::with_capacity(enterprise.departments.len());
        for dept_id in &enterprise.departments {
            if let Some(dept) = self
                .store
                .department_by_id(*dept_id)
                .await
                .map_err(translate)?
            {
                departments.push(dept);
            }
        }
        Ok(EnterpriseDto::detailed(&enterprise, &departments))
    }

    pub async fn insert(&self, dto: EnterpriseDto) -> DomainResult<EnterpriseDto> {
        let mut enterprise = Enterprise::new();
        enterprise.copy_scalars(&dto);
        enterprise.departments =
            collect_ids(dto.departments.iter().map(|d| d.id), "department")?;

        let saved = self
            .store
            .insert_enterprise(enterprise)
            .await
            .map_err(translate)?;
        Ok(EnterpriseDto::shallow(&saved))
    }

    pub async fn update(&self, id: EntityId, dto: EnterpriseDto) -> DomainResult<EnterpriseDto> {
        let mut enterprise = Enterprise::with_id(id);
        enterprise.copy_scalars(&dto);
        enterprise.departments =
            collect_ids(dto.departments.iter().map(|d| d.id), "department")?;

        let saved = self
            .store
            .update_enterprise(id, enterprise)
            .await
            .map_err(translate)?;
        Ok(EnterpriseDto::shallow(&saved))
    }

    pub async fn delete(&self, id: EntityId) -> DomainResult<()> {
        self.store.delete_enterprise(id).await.map_err(translate)
    }
}

// ── departments ─────────────────────────────────────────────────────────

pub struct DepartmentService {
    store: Arc<dyn DirectoryStore>,
}

impl DepartmentService {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    pub async fn find_all(&self) -> DomainResult<Vec<DepartmentDto>> {
        let list = self.store.departments().await.map_err(translate)?;
        Ok(list.iter().map(DepartmentDto::shallow).collect())
    }

    pub async fn find_by_id(&self, id: EntityId) -> DomainResult<DepartmentDto> {
        let department = self
            .store
            .department_by_id(id)
            .await
            .map_err(translate)?
            .ok_or(DomainError::NotFound(id.as_i64()))?;

        let mut employees = Vec::with_capacity(department.employees.len());
        for emp_id in &department.employees {
            if let Some(emp) = self
                .store
                .employee_by_id(*emp_id)
                .await
                .map_err(translate)?
            {
                employees.push(emp);
            }
        }
        Ok(DepartmentDto::detailed(&department, &employees))
    }

    pub async fn insert(&self, dto: DepartmentDto) -> DomainResult<DepartmentDto> {
        let mut department = Department::new();
        department.copy_scalars(&dto);
        department.employees = collect_ids(dto.employees.iter().map(|e| e.id), "employee")?;

        let saved = self
            .store
            .insert_department(department)
            .await
            .map_err(translate)?;
        Ok(DepartmentDto::shallow(&saved))
    }

    pub async fn update(&self, id: EntityId, dto: DepartmentDto) -> DomainResult<DepartmentDto> {
        let mut department = Department::with_id(id);
        department.copy_scalars(&dto);
        department.employees = collect_ids(dto.employees.iter().map(|e| e.id), "employee")?;

        let saved = self
            .store
            .update_department(id, department)
            .await
            .map_err(translate)?;
        Ok(DepartmentDto::shallow(&saved))
    }

    pub async fn delete(&self, id: EntityId) -> DomainResult<()> {
        self.store.delete_department(id).await.map_err(translate)
    }
}

// ── employees ───────────────────────────────────────────────────────────

pub struct EmployeeService {
    store: Arc<dyn DirectoryStore>,
}

impl EmployeeService {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    pub async fn find_all(&self) -> DomainResult<Vec<EmployeeDto>> {
        let list = self.store.employees().await.map_err(translate)?;
        Ok(list.iter().map(EmployeeDto::shallow).collect())
    }

    pub async fn find_by_id(&self, id: EntityId) -> DomainResult<EmployeeDto> {
        let employee = self
            .store
            .employee_by_id(id)
            .await
            .map_err(translate)?
            .ok_or(DomainError::NotFound(id.as_i64()))?;

        let mut departments = Vec::with_capacity(employee.departments.len());
        for dept_id in &employee.departments {
            if let Some(dept) = self
                .store
                .department_by_id(*dept_id)
                .await
                .map_err(translate)?
            {
                departments.push(dept);
            }
        }
        Ok(EmployeeDto::detailed(&employee, &departments))
    }

    pub async fn insert(&self, dto: EmployeeDto) -> DomainResult<EmployeeDto> {
        let mut employee = Employee::new();
        employee.copy_scalars(&dto);
        employee.departments =
            collect_ids(dto.departments.iter().map(|d| d.id), "department")?;

        let saved = self
            .store
            .insert_employee(employee)
            .await
            .map_err(translate)?;
        Ok(EmployeeDto::shallow(&saved))
    }

    pub async fn update(&self, id: EntityId, dto: EmployeeDto) -> DomainResult<EmployeeDto> {
        let mut employee = Employee::with_id(id);
        employee.copy_scalars(&dto);
        employee.departments =
            collect_ids(dto.departments.iter().map(|d| d.id), "department")?;

        let saved = self
            .store
            .update_employee(id, employee)
            .await
            .map_err(translate)?;
        Ok(EmployeeDto::shallow(&saved))
    }

    pub async fn delete(&self, id: EntityId) -> DomainResult<()> {
        self.store.delete_employee(id).await.map_err(translate)
    }
}

// ── users ───────────────────────────────────────────────────────────────

pub struct UserService {
    store: Arc<dyn DirectoryStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    pub async fn find_all(&self) -> DomainResult<Vec<UserDto>> {
        let list = self.store.users().await.map_err(translate)?;
        Ok(list.iter().map(UserDto::shallow).collect())
    }

    pub async fn find_by_id(&self, id: EntityId) -> DomainResult<UserDto> {
        let user = self
            .store
            .user_by_id(id)
            .await
            .map_err(translate)?
            .ok_or(DomainError::NotFound(id.as_i64()))?;

        let mut roles = Vec::with_capacity(user.roles.len());
        for role_id in &user.roles {
            if let Some(role) = self.store.role_by_id(*role_id).await.map_err(translate)? {
                roles.push(role);
            }
        }
        Ok(UserDto::detailed(&user, &roles))
    }

    /// Creation is the only operation that sees a plaintext password, and
    /// the only place it is hashed.
    pub async fn insert(&self, dto: CreateUserDto) -> DomainResult<UserDto> {
        if dto.password.is_empty() {
            return Err(DomainError::validation("password is required"));
        }

        let mut user = User::new();
        user.copy_scalars(&dto.as_user_dto());
        user.roles = collect_ids(dto.roles.iter().map(|r| r.id), "role")?;
        user.password_hash = Some(
            orgdir_auth::hash_password(&dto.password)
                .map_err(|e| DomainError::store(e.to_string()))?,
        );

        let saved = self.store.insert_user(user).await.map_err(translate)?;
        Ok(UserDto::shallow(&saved))
    }

    /// The update shape has no password field; the stored hash is never
    /// touched here.
    pub async fn update(&self, id: EntityId, dto: UserDto) -> DomainResult<UserDto> {
        let mut user = User::with_id(id);
        user.copy_scalars(&dto);
        user.roles = collect_ids(dto.roles.iter().map(|r| r.id), "role")?;

        let saved = self.store.update_user(id, user).await.map_err(translate)?;
        Ok(UserDto::shallow(&saved))
    }

    pub async fn delete(&self, id: EntityId) -> DomainResult<()> {
        self.store.delete_user(id).await.map_err(translate)
    }

    pub async fn roles(&self) -> DomainResult<Vec<RoleDto>> {
        let list = self.store.roles().await.map_err(translate)?;
        Ok(list.iter().map(RoleDto::shallow).collect())
    }
}

// ── assembly ────────────────────────────────────────────────────────────

pub struct AppServices {
    pub enterprises: EnterpriseService,
    pub departments: DepartmentService,
    pub employees: EmployeeService,
    pub users: UserService,
    store: Arc<dyn DirectoryStore>,
}

impl AppServices {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self {
            enterprises: EnterpriseService::new(store.clone()),
            departments: DepartmentService::new(store.clone()),
            employees: EmployeeService::new(store.clone()),
            users: UserService::new(store.clone()),
            store,
        }
    }

    /// Ensure the default permission labels exist so users have attachable
    /// roles from the first request on.
    pub async fn seed_default_roles(&self) -> DomainResult<()> {
        let existing = self.store.roles().await.map_err(translate)?;
        if !existing.is_empty() {
            return Ok(());
        }
        for authority in ["ROLE_USER", "ROLE_ADMIN"] {
            self.store
                .insert_role(Role::named(authority))
                .await
                .map_err(translate)?;
        }
        tracing::info!("seeded default roles");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgdir_store::InMemoryDirectoryStore;

    fn services() -> AppServices {
        let store: Arc<dyn DirectoryStore> = Arc::new(InMemoryDirectoryStore::new());
        AppServices::new(store)
    }

    fn enterprise_dto(name: &str, address: &str, phone: &str) -> EnterpriseDto {
        EnterpriseDto {
            name: Some(name.to_string()),
            address: Some(address.to_string()),
            phone: Some(phone.to_string()),
            ..EnterpriseDto::default()
        }
    }

    fn employee_dto(first: &str) -> EmployeeDto {
        EmployeeDto {
            first_name: Some(first.to_string()),
            ..EmployeeDto::default()
        }
    }

    fn nested(id: EntityId) -> EmployeeDto {
        EmployeeDto {
            id: Some(id),
            ..EmployeeDto::default()
        }
    }

    #[tokio::test]
    async fn insert_then_find_by_id_round_trips_scalars() {
        let app = services();
        let created = app
            .enterprises
            .insert(enterprise_dto("Acme", "1 Main St", "555-0100"))
            .await
            .unwrap();

        let id = created.id.unwrap();
        assert!(id.as_i64() > 0);
        assert_eq!(created.name.as_deref(), Some("Acme"));
        assert_eq!(created.address.as_deref(), Some("1 Main St"));
        assert_eq!(created.phone.as_deref(), Some("555-0100"));

        let found = app.enterprises.find_by_id(id).await.unwrap();
        assert_eq!(found.name, created.name);
        assert_eq!(found.address, created.address);
        assert_eq!(found.phone, created.phone);
        assert!(found.departments.is_empty());
    }

    #[tokio::test]
    async fn find_all_is_shallow_and_find_by_id_is_detailed() {
        let app = services();
        let emp = app.employees.insert(employee_dto("Ada")).await.unwrap();

        let dept = app
            .departments
            .insert(DepartmentDto {
                name: Some("Eng".to_string()),
                employees: vec![nested(emp.id.unwrap())],
                ..DepartmentDto::default()
            })
            .await
            .unwrap();

        let listed = app.departments.find_all().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].employees.is_empty(), "listings stay shallow");

        let detailed = app.departments.find_by_id(dept.id.unwrap()).await.unwrap();
        assert_eq!(detailed.employees.len(), 1);
        assert_eq!(detailed.employees[0].id, emp.id);
        assert_eq!(detailed.employees[0].first_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn missing_ids_are_not_found_for_find_update_and_delete() {
        let app = services();
        let ghost = EntityId::new(404);

        assert!(matches!(
            app.departments.find_by_id(ghost).await.unwrap_err(),
            DomainError::NotFound(404)
        ));
        assert!(matches!(
            app.departments
                .update(ghost, DepartmentDto::default())
                .await
                .unwrap_err(),
            DomainError::NotFound(404)
        ));
        assert!(matches!(
            app.departments.delete(ghost).await.unwrap_err(),
            DomainError::NotFound(404)
        ));
    }

    #[tokio::test]
    async fn update_fully_replaces_the_relation_set() {
        let app = services();
        let e1 = app.employees.insert(employee_dto("a")).await.unwrap().id.unwrap();
        let e2 = app.employees.insert(employee_dto("b")).await.unwrap().id.unwrap();

        let dept = app
            .departments
            .insert(DepartmentDto {
                name: Some("Support".to_string()),
                employees: vec![nested(e1), nested(e2)],
                ..DepartmentDto::default()
            })
            .await
            .unwrap();
        let id = dept.id.unwrap();

        // shrink to {e1}: the omitted e2 is removed even though the caller
        // never deleted it explicitly
        let edit = DepartmentDto {
            name: Some("Support".to_string()),
            employees: vec![nested(e1)],
            ..DepartmentDto::default()
        };
        app.departments.update(id, edit.clone()).await.unwrap();
        let after = app.departments.find_by_id(id).await.unwrap();
        assert_eq!(after.employees.len(), 1);
        assert_eq!(after.employees[0].id, Some(e1));

        // idempotent: replaying the same update does not double anything
        app.departments.update(id, edit).await.unwrap();
        let again = app.departments.find_by_id(id).await.unwrap();
        assert_eq!(again.employees.len(), 1);
    }

    #[tokio::test]
    async fn update_with_empty_relation_list_clears_everything() {
        let app = services();
        let e1 = app.employees.insert(employee_dto("a")).await.unwrap().id.unwrap();

        let dept = app
            .departments
            .insert(DepartmentDto {
                name: Some("Ops".to_string()),
                employees: vec![nested(e1)],
                ..DepartmentDto::default()
            })
            .await
            .unwrap();
        let id = dept.id.unwrap();

        app.departments
            .update(
                id,
                DepartmentDto {
                    name: Some("Ops".to_string()),
                    ..DepartmentDto::default()
                },
            )
            .await
            .unwrap();

        let after = app.departments.find_by_id(id).await.unwrap();
        assert!(after.employees.is_empty());
    }

    #[tokio::test]
    async fn dangling_relation_reference_surfaces_as_not_found_at_save() {
        let app = services();
        let err = app
            .departments
            .insert(DepartmentDto {
                name: Some("Eng".to_string()),
                employees: vec![nested(EntityId::new(999))],
                ..DepartmentDto::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(999)));
    }

    #[tokio::test]
    async fn nested_relation_without_id_is_a_validation_failure() {
        let app = services();
        let err = app
            .departments
            .insert(DepartmentDto {
                employees: vec![EmployeeDto::default()],
                ..DepartmentDto::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_of_referenced_entity_conflicts_and_is_not_applied() {
        let app = services();
        let emp = app.employees.insert(employee_dto("Ada")).await.unwrap();
        let emp_id = emp.id.unwrap();
        app.departments
            .insert(DepartmentDto {
                name: Some("Eng".to_string()),
                employees: vec![nested(emp_id)],
                ..DepartmentDto::default()
            })
            .await
            .unwrap();

        let err = app.employees.delete(emp_id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        // rejected, not partially applied
        let still_there = app.employees.find_by_id(emp_id).await.unwrap();
        assert_eq!(still_there.first_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn enterprise_update_resyncs_departments_both_ways() {
        let app = services();
        let d1 = app
            .departments
            .insert(DepartmentDto {
                name: Some("R&D".to_string()),
                ..DepartmentDto::default()
            })
            .await
            .unwrap()
            .id
            .unwrap();

        let ent = app
            .enterprises
            .insert(EnterpriseDto {
                name: Some("Acme".to_string()),
                departments: vec![DepartmentDto {
                    id: Some(d1),
                    ..DepartmentDto::default()
                }],
                ..EnterpriseDto::default()
            })
            .await
            .unwrap();
        let ent_id = ent.id.unwrap();

        // the department side sees its owning enterprise
        let dept = app.departments.find_by_id(d1).await.unwrap();
        assert_eq!(dept.enterprise_id, Some(ent_id));

        // dropping the relation clears the reverse view too
        app.enterprises
            .update(
                ent_id,
                EnterpriseDto {
                    name: Some("Acme".to_string()),
                    ..EnterpriseDto::default()
                },
            )
            .await
            .unwrap();
        let dept = app.departments.find_by_id(d1).await.unwrap();
        assert_eq!(dept.enterprise_id, None);
    }

    #[tokio::test]
    async fn user_password_is_hashed_once_and_never_leaves() {
        let app = services();
        app.seed_default_roles().await.unwrap();
        let roles = app.users.roles().await.unwrap();
        let role_id = roles[0].id.unwrap();

        let created = app
            .users
            .insert(CreateUserDto {
                first_name: Some("Ada".to_string()),
                email: Some("ada@example.com".to_string()),
                password: "s3cret".to_string(),
                roles: vec![RoleDto {
                    id: Some(role_id),
                    ..RoleDto::default()
                }],
                ..CreateUserDto::default()
            })
            .await
            .unwrap();
        let id = created.id.unwrap();

        // stored hash verifies against the plaintext and is not the plaintext
        let stored = app.store.user_by_id(id).await.unwrap().unwrap();
        let hash = stored.password_hash.unwrap();
        assert_ne!(hash, "s3cret");
        assert!(orgdir_auth::verify_password("s3cret", &hash).unwrap());

        // updating scalars does not rehash or drop the credential
        app.users
            .update(
                id,
                UserDto {
                    first_name: Some("Ada B.".to_string()),
                    email: Some("ada@example.com".to_string()),
                    ..UserDto::default()
                },
            )
            .await
            .unwrap();
        let after = app.store.user_by_id(id).await.unwrap().unwrap();
        assert_eq!(after.password_hash.as_deref(), Some(hash.as_str()));

        // the detailed projection lists roles, never credentials
        let detailed = app.users.find_by_id(id).await.unwrap();
        assert!(detailed.roles.is_empty(), "role set was replaced by update");
    }

    #[tokio::test]
    async fn user_insert_without_password_is_rejected() {
        let app = services();
        let err = app
            .users
            .insert(CreateUserDto {
                first_name: Some("Ada".to_string()),
                ..CreateUserDto::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn seeding_roles_is_idempotent() {
        let app = services();
        app.seed_default_roles().await.unwrap();
        app.seed_default_roles().await.unwrap();
        let roles = app.users.roles().await.unwrap();
        assert_eq!(roles.len(), 2);
    }
}
