//! Storage-specific error type wrapping sqlx errors.

use autorule_domain::error::{AutoruleError, ConflictError};

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize or deserialize a stored JSON value.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for AutoruleError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

/// Map a unique-constraint violation to [`ConflictError`], anything else to
/// a storage error.
pub(crate) fn conflict_or_storage(
    err: sqlx::Error,
    entity: &'static str,
    key: &str,
) -> AutoruleError {
    if matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation()) {
        return ConflictError {
            entity,
            key: key.to_string(),
        }
        .into();
    }
    StorageError::from(err).into()
}
