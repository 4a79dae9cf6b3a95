use storage::StorageError;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Every failure the engine surfaces to its callers.
///
/// `kind()` is the stable machine-readable discriminator; `reason()` is the
/// human-readable detail. Only `Persistence` stands for a fault of the
/// engine's own infrastructure, everything else is terminal for the request.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("window closed: {0}")]
    WindowClosed(String),

    #[error("duplicate vote: {0}")]
    DuplicateVote(String),

    #[error("rate limit exceeded: {count} votes in the last {window_secs}s (ceiling {ceiling})")]
    RateLimitExceeded {
        count: usize,
        ceiling: u32,
        window_secs: i64,
    },

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("capacity reached: {approved}/{max} participants approved")]
    Capacity { approved: i64, max: i64 },

    #[error("invalid state: {0}")]
    State(String),

    #[error("no participant met the advancement criteria")]
    NoQualifiers,

    #[error("persistence failure: {0}")]
    Persistence(#[source] StorageError),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::WindowClosed(_) => "window_closed",
            Self::DuplicateVote(_) => "duplicate_vote",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::Permission(_) => "permission",
            Self::NotFound(_) => "not_found",
            Self::Capacity { .. } => "capacity",
            Self::State(_) => "state",
            Self::NoQualifiers => "no_qualifiers",
            Self::Persistence(_) => "persistence",
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Self::Validation(reason)
            | Self::WindowClosed(reason)
            | Self::DuplicateVote(reason)
            | Self::Permission(reason)
            | Self::State(reason) => reason.clone(),
            Self::NotFound(what) => format!("{} not found", what),
            Self::RateLimitExceeded { .. } | Self::Capacity { .. } | Self::NoQualifiers => {
                self.to_string()
            }
            Self::Persistence(_) => "storage unavailable".to_string(),
        }
    }

    /// Whether the caller may retry the same request after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    /// Map a storage failure, naming the entity a `NotFound` refers to.
    pub fn from_storage(error: StorageError, entity: &str) -> Self {
        match error {
            StorageError::NotFound => Self::NotFound(entity.to_string()),
            StorageError::Conflict(reason) | StorageError::ConstraintViolation(reason) => {
                Self::State(reason)
            }
            StorageError::CapacityReached { approved, max } => Self::Capacity { approved, max },
            other => Self::Persistence(other),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(error: StorageError) -> Self {
        Self::from_storage(error, "record")
    }
}

impl From<ValidationErrors> for EngineError {
    fn from(errors: ValidationErrors) -> Self {
        let details: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    format!(
                        "{}: {}",
                        field,
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    )
                })
            })
            .collect();

        Self::Validation(details.join("; "))
    }
}
