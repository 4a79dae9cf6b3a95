use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use engine::EngineError;
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Web layer errors
#[derive(Debug)]
pub enum WebError {
    Engine(EngineError),
    BadRequest(String),
    Unauthorized(String),
}

impl WebError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Engine(e) => e.kind(),
            Self::BadRequest(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Engine(e) => match e {
                EngineError::Validation(_) => StatusCode::BAD_REQUEST,
                EngineError::WindowClosed(_) => StatusCode::CONFLICT,
                EngineError::DuplicateVote(_) => StatusCode::CONFLICT,
                EngineError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                EngineError::Permission(_) => StatusCode::FORBIDDEN,
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                EngineError::Capacity { .. } => StatusCode::CONFLICT,
                EngineError::State(_) => StatusCode::CONFLICT,
                EngineError::NoQualifiers => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(e) => write!(f, "{}", e),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Engine(EngineError::Persistence(source)) => {
                tracing::error!(error = ?source, "Storage error");
                "An internal error occurred".to_string()
            }
            Self::Engine(e) => e.reason(),
            Self::BadRequest(msg) | Self::Unauthorized(msg) => msg.clone(),
        };

        let body = json!({
            "kind": self.kind(),
            "error": message,
        });

        (self.status_code(), Json(body)).into_response()
    }
}

impl From<EngineError> for WebError {
    fn from(error: EngineError) -> Self {
        Self::Engine(error)
    }
}

impl From<ValidationErrors> for WebError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Engine(EngineError::from(errors))
    }
}

pub type WebResult<T> = Result<T, WebError>;
