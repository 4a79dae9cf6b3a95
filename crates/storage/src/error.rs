use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A conditional write lost against a concurrent or earlier one
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Capacity reached: {approved}/{max} approved")]
    CapacityReached { approved: i64, max: i64 },

    #[error("Corrupt row: {0}")]
    Decode(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Convert a raw sqlx error into a `ConstraintViolation` when it is a unique
/// violation, tagging it with `what` so callers can tell constraints apart.
pub(crate) fn unique_as_violation(error: sqlx::Error, what: &str) -> StorageError {
    if let sqlx::Error::Database(ref db_err) = error
        && db_err.code().as_deref() == Some("23505")
    {
        return StorageError::ConstraintViolation(what.to_string());
    }
    StorageError::from(error)
}
