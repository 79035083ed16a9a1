//! Error types for the PostgreSQL storage backend.

use sqlx_core::error::Error as SqlxError;

use ems_core::CoreError;

/// PostgreSQL error code for unique constraint violation (23505).
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL error code for foreign key violation (23503).
pub const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Checks if a sqlx error is a unique constraint violation (23505).
pub fn is_unique_violation(err: &SqlxError) -> bool {
    has_pg_error_code(err, PG_UNIQUE_VIOLATION)
}

/// Errors produced by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx_core::migrate::MigrateError),

    /// Unique constraint violation surfaced as a conflict.
    #[error("{entity} conflict: {detail}")]
    Conflict { entity: String, detail: String },

    /// Row missing or filtered out by the caller's scope.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: i64 },

    /// Pool or configuration error.
    #[error("Pool error: {message}")]
    Pool { message: String },
}

impl StorageError {
    /// Creates a new not-found error.
    #[must_use]
    pub fn not_found(entity: impl Into<String>, id: i64) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id,
        }
    }

    /// Creates a new conflict error.
    #[must_use]
    pub fn conflict(entity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
            detail: detail.into(),
        }
    }

    /// Creates a new pool error.
    #[must_use]
    pub fn pool(message: impl Into<String>) -> Self {
        Self::Pool {
            message: message.into(),
        }
    }

    /// Maps a sqlx error on a write path, converting unique violations
    /// into conflicts for the given entity.
    pub fn from_write(entity: &str, err: SqlxError) -> Self {
        if is_unique_violation(&err) {
            let detail = match &err {
                SqlxError::Database(db) => db.message().to_string(),
                _ => "duplicate key".to_string(),
            };
            Self::conflict(entity, detail)
        } else {
            Self::Database(err)
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => CoreError::not_found(entity, id),
            StorageError::Conflict { entity, detail } => CoreError::conflict(entity, detail),
            StorageError::Database(e) => CoreError::internal(format!("database error: {e}")),
            StorageError::Migration(e) => CoreError::internal(format!("migration error: {e}")),
            StorageError::Pool { message } => CoreError::internal(format!("pool error: {message}")),
        }
    }
}

/// Convenience result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_core_not_found() {
        let err: CoreError = StorageError::not_found("License", 9).into();
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_database_error_is_sanitized_to_internal() {
        let err: CoreError = StorageError::pool("exhausted").into();
        assert!(err.is_server_error());
    }
}
