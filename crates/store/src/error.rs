//! Store-level failure signals.
//!
//! These are the raw signals the services translate into domain errors:
//! `RowMissing` and `MissingReference` become NotFound, `IntegrityViolation`
//! becomes Conflict, `Backend` is an opaque infrastructure failure.

use orgdir_core::EntityId;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The targeted row does not exist (empty-result delete, or an update
    /// whose flush touched zero rows).
    #[error("row {0} does not exist")]
    RowMissing(EntityId),

    /// A relation row referenced an entity that does not exist. Raised at
    /// flush time when a non-loading reference fails validation.
    #[error("referenced {kind} {id} does not exist")]
    MissingReference { kind: &'static str, id: EntityId },

    /// A write violated a referential-integrity constraint (e.g. deleting
    /// an entity still referenced by relation rows).
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// The backing store failed (connection, serialization, poisoned lock).
    #[error("backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
