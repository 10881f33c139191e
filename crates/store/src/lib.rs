//! `orgdir-store` — entity store and relation tables.
//!
//! This crate provides:
//! - The [`DirectoryStore`] contract the services program against
//! - An in-memory implementation for dev and tests ([`InMemoryDirectoryStore`])
//! - A Postgres implementation behind the `postgres` feature
//!   ([`PostgresDirectoryStore`], [`run_migrations`])
//!
//! Relation rows (the three many-to-many join tables) are owned by the
//! store: every save clears and rebuilds the owned rows inside the same
//! atomic unit as the scalar write, and reference existence is validated at
//! flush time, never earlier.

mod error;
mod in_memory;
mod store;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
mod schema;

pub use error::{StoreError, StoreResult};
pub use in_memory::InMemoryDirectoryStore;
pub use store::DirectoryStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresDirectoryStore;
#[cfg(feature = "postgres")]
pub use schema::run_migrations;
