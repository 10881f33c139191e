//! Postgres-backed directory store.
//!
//! Scalar rows live in one table per entity kind; the three many-to-many
//! relations live in join tables (see [`crate::schema`]). Every multi-step
//! write runs inside one transaction: scalar flush, then clear-and-rebuild
//! of the owned relation rows. Reference validation is deferred to the
//! database's foreign keys, so a dangling non-loading reference surfaces
//! only when the relation row flushes.
//!
//! SQLx error mapping:
//!
//! | PostgreSQL code | StoreError | Scenario |
//! |-----------------|------------|----------|
//! | `23503` on relation-row insert | `MissingReference` | attached id does not exist |
//! | `23503` on delete | `IntegrityViolation` | entity still referenced |
//! | zero rows affected by UPDATE/DELETE | `RowMissing` | id absent |
//! | anything else | `Backend` | connection/serialization failure |

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use orgdir_core::EntityId;
use orgdir_directory::{Department, Employee, Enterprise, Role, User};

use crate::error::{StoreError, StoreResult};
use crate::store::DirectoryStore;

/// Postgres [`DirectoryStore`] implementation.
#[derive(Debug, Clone)]
pub struct PostgresDirectoryStore {
    pool: PgPool,
}

impl PostgresDirectoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Compile-time description of one join table.
struct EdgeTable {
    table: &'static str,
    owner_col: &'static str,
    target_col: &'static str,
    /// Entity kind named in `MissingReference` when the target FK fails.
    target_kind: &'static str,
}

const ENTERPRISE_DEPARTMENTS: EdgeTable = EdgeTable {
    table: "enterprises_departments",
    owner_col: "enterprise_id",
    target_col: "department_id",
    target_kind: "department",
};

const DEPARTMENT_EMPLOYEES: EdgeTable = EdgeTable {
    table: "departments_employees",
    owner_col: "department_id",
    target_col: "employee_id",
    target_kind: "employee",
};

const USER_ROLES: EdgeTable = EdgeTable {
    table: "users_roles",
    owner_col: "user_id",
    target_col: "role_id",
    target_kind: "role",
};

fn backend(operation: &str, err: sqlx::Error) -> StoreError {
    StoreError::backend(format!("{operation}: {err}"))
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23503";
        }
    }
    false
}

/// The relation-table primitives: every save issues `clear_edges` followed
/// by one `add_edge` per id, inside the caller's transaction.
mod edges {
    use super::*;

    pub(super) async fn edges_of(
        pool: &PgPool,
        rel: &EdgeTable,
        key_col: &str,
        value_col: &str,
        id: EntityId,
    ) -> StoreResult<BTreeSet<EntityId>> {
        let sql = format!(
            "SELECT {value_col} FROM {table} WHERE {key_col} = $1",
            table = rel.table
        );
        let rows = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_all(pool)
            .await
            .map_err(|e| backend("edges_of", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<i64, _>(0)
                    .map(EntityId::new)
                    .map_err(|e| backend("edges_of", e))
            })
            .collect()
    }

    /// All rows of a join table, grouped by `key_col` — one query per scan
    /// instead of one per entity.
    pub(super) async fn all_edges(
        pool: &PgPool,
        rel: &EdgeTable,
        key_col: &str,
        value_col: &str,
    ) -> StoreResult<BTreeMap<EntityId, BTreeSet<EntityId>>> {
        let sql = format!(
            "SELECT {key_col}, {value_col} FROM {table}",
            table = rel.table
        );
        let rows = sqlx::query(&sql)
            .fetch_all(pool)
            .await
            .map_err(|e| backend("all_edges", e))?;

        let mut grouped: BTreeMap<EntityId, BTreeSet<EntityId>> = BTreeMap::new();
        for row in rows {
            let key: i64 = row.try_get(0).map_err(|e| backend("all_edges", e))?;
            let value: i64 = row.try_get(1).map_err(|e| backend("all_edges", e))?;
            grouped
                .entry(EntityId::new(key))
                .or_default()
                .insert(EntityId::new(value));
        }
        Ok(grouped)
    }

    pub(super) async fn clear_edges(
        tx: &mut Transaction<'_, Postgres>,
        rel: &EdgeTable,
        key_col: &str,
        id: EntityId,
    ) -> StoreResult<()> {
        let sql = format!("DELETE FROM {table} WHERE {key_col} = $1", table = rel.table);
        sqlx::query(&sql)
            .bind(id.as_i64())
            .execute(&mut **tx)
            .await
            .map_err(|e| backend("clear_edges", e))?;
        Ok(())
    }

    pub(super) async fn add_edge(
        tx: &mut Transaction<'_, Postgres>,
        rel: &EdgeTable,
        owner: EntityId,
        target: EntityId,
    ) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {table} ({owner_col}, {target_col}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            table = rel.table,
            owner_col = rel.owner_col,
            target_col = rel.target_col,
        );
        sqlx::query(&sql)
            .bind(owner.as_i64())
            .bind(target.as_i64())
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::MissingReference {
                        kind: rel.target_kind,
                        id: target,
                    }
                } else {
                    backend("add_edge", e)
                }
            })?;
        Ok(())
    }
}

async fn begin(pool: &PgPool) -> StoreResult<Transaction<'_, Postgres>> {
    pool.begin().await.map_err(|e| backend("begin", e))
}

async fn commit(tx: Transaction<'_, Postgres>) -> StoreResult<()> {
    tx.commit().await.map_err(|e| backend("commit", e))
}

/// DELETE one scalar row; zero rows affected means the id was absent and a
/// foreign-key failure means incoming relation rows still reference it.
async fn delete_row(pool: &PgPool, table: &str, id: EntityId) -> StoreResult<()> {
    let sql = format!("DELETE FROM {table} WHERE id = $1");
    let result = sqlx::query(&sql)
        .bind(id.as_i64())
        .execute(pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::IntegrityViolation(format!("{table} row {id} is still referenced"))
            } else {
                backend("delete_row", e)
            }
        })?;
    if result.rows_affected() == 0 {
        return Err(StoreError::RowMissing(id));
    }
    Ok(())
}

// ── row types ───────────────────────────────────────────────────────────

struct EnterpriseRow {
    id: i64,
    name: Option<String>,
    address: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for EnterpriseRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            phone: row.try_get("phone")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<EnterpriseRow> for Enterprise {
    fn from(row: EnterpriseRow) -> Self {
        Enterprise {
            id: Some(EntityId::new(row.id)),
            name: row.name,
            address: row.address,
            phone: row.phone,
            departments: BTreeSet::new(),
            created_at: Some(row.created_at),
            updated_at: row.updated_at,
        }
    }
}

struct DepartmentRow {
    id: i64,
    name: Option<String>,
    description: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for DepartmentRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            phone: row.try_get("phone")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<DepartmentRow> for Department {
    fn from(row: DepartmentRow) -> Self {
        Department {
            id: Some(EntityId::new(row.id)),
            name: row.name,
            description: row.description,
            phone: row.phone,
            enterprise_id: None,
            employees: BTreeSet::new(),
            created_at: Some(row.created_at),
            updated_at: row.updated_at,
        }
    }
}

struct EmployeeRow {
    id: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    age: Option<i32>,
    position: Option<String>,
    email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for EmployeeRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            age: row.try_get("age")?,
            position: row.try_get("position")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Employee {
            id: Some(EntityId::new(row.id)),
            first_name: row.first_name,
            last_name: row.last_name,
            age: row.age,
            position: row.position,
            email: row.email,
            departments: BTreeSet::new(),
            created_at: Some(row.created_at),
            updated_at: row.updated_at,
        }
    }
}

struct UserRow {
    id: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    password_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for UserRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: Some(EntityId::new(row.id)),
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: row.password_hash,
            roles: BTreeSet::new(),
            created_at: Some(row.created_at),
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl DirectoryStore for PostgresDirectoryStore {
    // ── enterprises ────────────────────────────────────────────────────

    async fn enterprises(&self) -> StoreResult<Vec<Enterprise>> {
        let rows = sqlx::query_as::<_, EnterpriseRow>(
            "SELECT id, name, address, phone, created_at, updated_at FROM enterprises ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend("enterprises", e))?;

        let mut grouped = edges::all_edges(
            &self.pool,
            &ENTERPRISE_DEPARTMENTS,
            "enterprise_id",
            "department_id",
        )
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut enterprise: Enterprise = row.into();
                if let Some(id) = enterprise.id {
                    enterprise.departments = grouped.remove(&id).unwrap_or_default();
                }
                enterprise
            })
            .collect())
    }

    async fn enterprise_by_id(&self, id: EntityId) -> StoreResult<Option<Enterprise>> {
        let row = sqlx::query_as::<_, EnterpriseRow>(
            "SELECT id, name, address, phone, created_at, updated_at FROM enterprises WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend("enterprise_by_id", e))?;

        match row {
            Some(row) => {
                let mut enterprise: Enterprise = row.into();
                enterprise.departments = edges::edges_of(
                    &self.pool,
                    &ENTERPRISE_DEPARTMENTS,
                    "enterprise_id",
                    "department_id",
                    id,
                )
                .await?;
                Ok(Some(enterprise))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, enterprise), err)]
    async fn insert_enterprise(&self, enterprise: Enterprise) -> StoreResult<Enterprise> {
        let mut tx = begin(&self.pool).await?;

        let row = sqlx::query(
            "INSERT INTO enterprises (name, address, phone) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&enterprise.name)
        .bind(&enterprise.address)
        .bind(&enterprise.phone)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| backend("insert_enterprise", e))?;
        let id = EntityId::new(row.try_get::<i64, _>("id").map_err(|e| backend("insert_enterprise", e))?);

        for dept in &enterprise.departments {
            edges::add_edge(&mut tx, &ENTERPRISE_DEPARTMENTS, id, *dept).await?;
        }
        commit(tx).await?;

        self.enterprise_by_id(id)
            .await?
            .ok_or_else(|| StoreError::backend("row vanished after insert"))
    }

    #[instrument(skip(self, enterprise), fields(id = %id), err)]
    async fn update_enterprise(
        &self,
        id: EntityId,
        enterprise: Enterprise,
    ) -> StoreResult<Enterprise> {
        let mut tx = begin(&self.pool).await?;

        let result = sqlx::query(
            "UPDATE enterprises SET name = $2, address = $3, phone = $4, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_i64())
        .bind(&enterprise.name)
        .bind(&enterprise.address)
        .bind(&enterprise.phone)
        .execute(&mut *tx)
        .await
        .map_err(|e| backend("update_enterprise", e))?;
        if result.rows_affected() == 0 {
            // the non-loading reference failed validation at flush
            return Err(StoreError::RowMissing(id));
        }

        edges::clear_edges(&mut tx, &ENTERPRISE_DEPARTMENTS, "enterprise_id", id).await?;
        for dept in &enterprise.departments {
            edges::add_edge(&mut tx, &ENTERPRISE_DEPARTMENTS, id, *dept).await?;
        }
        commit(tx).await?;

        self.enterprise_by_id(id)
            .await?
            .ok_or_else(|| StoreError::backend("row vanished after update"))
    }

    #[instrument(skip(self), err)]
    async fn delete_enterprise(&self, id: EntityId) -> StoreResult<()> {
        delete_row(&self.pool, "enterprises", id).await
    }

    // ── departments ────────────────────────────────────────────────────

    async fn departments(&self) -> StoreResult<Vec<Department>> {
        let rows = sqlx::query_as::<_, DepartmentRow>(
            "SELECT id, name, description, phone, created_at, updated_at FROM departments ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend("departments", e))?;

        let mut employee_sets = edges::all_edges(
            &self.pool,
            &DEPARTMENT_EMPLOYEES,
            "department_id",
            "employee_id",
        )
        .await?;
        let owners = edges::all_edges(
            &self.pool,
            &ENTERPRISE_DEPARTMENTS,
            "department_id",
            "enterprise_id",
        )
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut department: Department = row.into();
                if let Some(id) = department.id {
                    department.employees = employee_sets.remove(&id).unwrap_or_default();
                    department.enterprise_id =
                        owners.get(&id).and_then(|s| s.iter().next().copied());
                }
                department
            })
            .collect())
    }

    async fn department_by_id(&self, id: EntityId) -> StoreResult<Option<Department>> {
        let row = sqlx::query_as::<_, DepartmentRow>(
            "SELECT id, name, description, phone, created_at, updated_at FROM departments WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend("department_by_id", e))?;

        match row {
            Some(row) => {
                let mut department: Department = row.into();
                department.employees = edges::edges_of(
                    &self.pool,
                    &DEPARTMENT_EMPLOYEES,
                    "department_id",
                    "employee_id",
                    id,
                )
                .await?;
                department.enterprise_id = edges::edges_of(
                    &self.pool,
                    &ENTERPRISE_DEPARTMENTS,
                    "department_id",
                    "enterprise_id",
                    id,
                )
                .await?
                .into_iter()
                .next();
                Ok(Some(department))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, department), err)]
    async fn insert_department(&self, department: Department) -> StoreResult<Department> {
        let mut tx = begin(&self.pool).await?;

        let row = sqlx::query(
            "INSERT INTO departments (name, description, phone) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&department.name)
        .bind(&department.description)
        .bind(&department.phone)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| backend("insert_department", e))?;
        let id = EntityId::new(row.try_get::<i64, _>("id").map_err(|e| backend("insert_department", e))?);

        for emp in &department.employees {
            edges::add_edge(&mut tx, &DEPARTMENT_EMPLOYEES, id, *emp).await?;
        }
        commit(tx).await?;

        self.department_by_id(id)
            .await?
            .ok_or_else(|| StoreError::backend("row vanished after insert"))
    }

    #[instrument(skip(self, department), fields(id = %id), err)]
    async fn update_department(
        &self,
        id: EntityId,
        department: Department,
    ) -> StoreResult<Department> {
        let mut tx = begin(&self.pool).await?;

        let result = sqlx::query(
            "UPDATE departments SET name = $2, description = $3, phone = $4, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_i64())
        .bind(&department.name)
        .bind(&department.description)
        .bind(&department.phone)
        .execute(&mut *tx)
        .await
        .map_err(|e| backend("update_department", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowMissing(id));
        }

        edges::clear_edges(&mut tx, &DEPARTMENT_EMPLOYEES, "department_id", id).await?;
        for emp in &department.employees {
            edges::add_edge(&mut tx, &DEPARTMENT_EMPLOYEES, id, *emp).await?;
        }
        commit(tx).await?;

        self.department_by_id(id)
            .await?
            .ok_or_else(|| StoreError::backend("row vanished after update"))
    }

    #[instrument(skip(self), err)]
    async fn delete_department(&self, id: EntityId) -> StoreResult<()> {
        delete_row(&self.pool, "departments", id).await
    }

    // ── employees ──────────────────────────────────────────────────────

    async fn employees(&self) -> StoreResult<Vec<Employee>> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, first_name, last_name, age, position, email, created_at, updated_at FROM employees ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend("employees", e))?;

        let mut grouped = edges::all_edges(
            &self.pool,
            &DEPARTMENT_EMPLOYEES,
            "employee_id",
            "department_id",
        )
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut employee: Employee = row.into();
                if let Some(id) = employee.id {
                    employee.departments = grouped.remove(&id).unwrap_or_default();
                }
                employee
            })
            .collect())
    }

    async fn employee_by_id(&self, id: EntityId) -> StoreResult<Option<Employee>> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, first_name, last_name, age, position, email, created_at, updated_at FROM employees WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend("employee_by_id", e))?;

        match row {
            Some(row) => {
                let mut employee: Employee = row.into();
                employee.departments = edges::edges_of(
                    &self.pool,
                    &DEPARTMENT_EMPLOYEES,
                    "employee_id",
                    "department_id",
                    id,
                )
                .await?;
                Ok(Some(employee))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, employee), err)]
    async fn insert_employee(&self, employee: Employee) -> StoreResult<Employee> {
        let mut tx = begin(&self.pool).await?;

        let row = sqlx::query(
            "INSERT INTO employees (first_name, last_name, age, position, email) VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(employee.age)
        .bind(&employee.position)
        .bind(&employee.email)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| backend("insert_employee", e))?;
        let id = EntityId::new(row.try_get::<i64, _>("id").map_err(|e| backend("insert_employee", e))?);

        // employee-side writes hit the same department↔employee table,
        // with the employee as target
        for dept in &employee.departments {
            edges::add_edge(&mut tx, &DEPARTMENT_EMPLOYEES, *dept, id).await.map_err(
                |e| match e {
                    StoreError::MissingReference { .. } => StoreError::MissingReference {
                        kind: "department",
                        id: *dept,
                    },
                    other => other,
                },
            )?;
        }
        commit(tx).await?;

        self.employee_by_id(id)
            .await?
            .ok_or_else(|| StoreError::backend("row vanished after insert"))
    }

    #[instrument(skip(self, employee), fields(id = %id), err)]
    async fn update_employee(&self, id: EntityId, employee: Employee) -> StoreResult<Employee> {
        let mut tx = begin(&self.pool).await?;

        let result = sqlx::query(
            "UPDATE employees SET first_name = $2, last_name = $3, age = $4, position = $5, email = $6, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_i64())
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(employee.age)
        .bind(&employee.position)
        .bind(&employee.email)
        .execute(&mut *tx)
        .await
        .map_err(|e| backend("update_employee", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowMissing(id));
        }

        edges::clear_edges(&mut tx, &DEPARTMENT_EMPLOYEES, "employee_id", id).await?;
        for dept in &employee.departments {
            edges::add_edge(&mut tx, &DEPARTMENT_EMPLOYEES, *dept, id).await.map_err(
                |e| match e {
                    StoreError::MissingReference { .. } => StoreError::MissingReference {
                        kind: "department",
                        id: *dept,
                    },
                    other => other,
                },
            )?;
        }
        commit(tx).await?;

        self.employee_by_id(id)
            .await?
            .ok_or_else(|| StoreError::backend("row vanished after update"))
    }

    #[instrument(skip(self), err)]
    async fn delete_employee(&self, id: EntityId) -> StoreResult<()> {
        delete_row(&self.pool, "employees", id).await
    }

    // ── users ──────────────────────────────────────────────────────────

    async fn users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, first_name, last_name, email, password_hash, created_at, updated_at FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend("users", e))?;

        let mut grouped =
            edges::all_edges(&self.pool, &USER_ROLES, "user_id", "role_id").await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut user: User = row.into();
                if let Some(id) = user.id {
                    user.roles = grouped.remove(&id).unwrap_or_default();
                }
                user
            })
            .collect())
    }

    async fn user_by_id(&self, id: EntityId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, first_name, last_name, email, password_hash, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend("user_by_id", e))?;

        match row {
            Some(row) => {
                let mut user: User = row.into();
                user.roles =
                    edges::edges_of(&self.pool, &USER_ROLES, "user_id", "role_id", id).await?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, user), err)]
    async fn insert_user(&self, user: User) -> StoreResult<User> {
        let mut tx = begin(&self.pool).await?;

        let row = sqlx::query(
            "INSERT INTO users (first_name, last_name, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| backend("insert_user", e))?;
        let id = EntityId::new(row.try_get::<i64, _>("id").map_err(|e| backend("insert_user", e))?);

        for role in &user.roles {
            edges::add_edge(&mut tx, &USER_ROLES, id, *role).await?;
        }
        commit(tx).await?;

        self.user_by_id(id)
            .await?
            .ok_or_else(|| StoreError::backend("row vanished after insert"))
    }

    #[instrument(skip(self, user), fields(id = %id), err)]
    async fn update_user(&self, id: EntityId, user: User) -> StoreResult<User> {
        let mut tx = begin(&self.pool).await?;

        // password_hash is deliberately absent: the stored credential
        // survives updates
        let result = sqlx::query(
            "UPDATE users SET first_name = $2, last_name = $3, email = $4, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_i64())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .execute(&mut *tx)
        .await
        .map_err(|e| backend("update_user", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowMissing(id));
        }

        edges::clear_edges(&mut tx, &USER_ROLES, "user_id", id).await?;
        for role in &user.roles {
            edges::add_edge(&mut tx, &USER_ROLES, id, *role).await?;
        }
        commit(tx).await?;

        self.user_by_id(id)
            .await?
            .ok_or_else(|| StoreError::backend("row vanished after update"))
    }

    #[instrument(skip(self), err)]
    async fn delete_user(&self, id: EntityId) -> StoreResult<()> {
        delete_row(&self.pool, "users", id).await
    }

    // ── roles ──────────────────────────────────────────────────────────

    async fn roles(&self) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query("SELECT id, authority FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend("roles", e))?;

        rows.iter()
            .map(|row| {
                Ok(Role {
                    id: Some(EntityId::new(
                        row.try_get("id").map_err(|e| backend("roles", e))?,
                    )),
                    authority: row.try_get("authority").map_err(|e| backend("roles", e))?,
                })
            })
            .collect()
    }

    async fn role_by_id(&self, id: EntityId) -> StoreResult<Option<Role>> {
        let row = sqlx::query("SELECT id, authority FROM roles WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("role_by_id", e))?;

        match row {
            Some(row) => Ok(Some(Role {
                id: Some(EntityId::new(
                    row.try_get("id").map_err(|e| backend("role_by_id", e))?,
                )),
                authority: row
                    .try_get("authority")
                    .map_err(|e| backend("role_by_id", e))?,
            })),
            None => Ok(None),
        }
    }

    async fn insert_role(&self, mut role: Role) -> StoreResult<Role> {
        let row = sqlx::query("INSERT INTO roles (authority) VALUES ($1) RETURNING id")
            .bind(&role.authority)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| backend("insert_role", e))?;
        role.id = Some(EntityId::new(
            row.try_get("id").map_err(|e| backend("insert_role", e))?,
        ));
        Ok(role)
    }
}
