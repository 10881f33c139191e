//! Schema bootstrap for the Postgres store.
//!
//! Foreign keys encode the delete contract: the owning column of each join
//! table cascades (owned relation rows disappear with their owner) while
//! the referenced column restricts (a still-referenced entity cannot be
//! deleted, surfacing code 23503).

use sqlx::PgPool;

use crate::error::{StoreError, StoreResult};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS enterprises (
        id          BIGSERIAL PRIMARY KEY,
        name        TEXT,
        address     TEXT,
        phone       TEXT,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS departments (
        id          BIGSERIAL PRIMARY KEY,
        name        TEXT,
        description TEXT,
        phone       TEXT,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS employees (
        id          BIGSERIAL PRIMARY KEY,
        first_name  TEXT,
        last_name   TEXT,
        age         INTEGER,
        position    TEXT,
        email       TEXT,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            BIGSERIAL PRIMARY KEY,
        first_name    TEXT,
        last_name     TEXT,
        email         TEXT,
        password_hash TEXT,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at    TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id        BIGSERIAL PRIMARY KEY,
        authority TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS enterprises_departments (
        enterprise_id BIGINT NOT NULL REFERENCES enterprises (id) ON DELETE CASCADE,
        department_id BIGINT NOT NULL REFERENCES departments (id) ON DELETE RESTRICT,
        PRIMARY KEY (enterprise_id, department_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS departments_employees (
        department_id BIGINT NOT NULL REFERENCES departments (id) ON DELETE CASCADE,
        employee_id   BIGINT NOT NULL REFERENCES employees (id) ON DELETE RESTRICT,
        PRIMARY KEY (department_id, employee_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users_roles (
        user_id BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        role_id BIGINT NOT NULL REFERENCES roles (id) ON DELETE RESTRICT,
        PRIMARY KEY (user_id, role_id)
    )
    "#,
];

/// Create the directory tables if they do not exist yet.
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| StoreError::backend(format!("migration failed: {e}")))?;
    }
    Ok(())
}
