//! Storage-specific error type wrapping sqlx errors.

use areaflow_domain::error::AreaflowError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// A payload could not be encoded to JSON.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for AreaflowError {
    fn from(err: StorageError) -> Self {
        Self::storage(err)
    }
}
