use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::Submission;

/// Request payload for entering a competition
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ApplyRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be between 1 and 255 characters"
    ))]
    pub title: String,

    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,

    #[validate(length(max = 20, message = "At most 20 media references are allowed"))]
    #[validate(custom(function = "validate_media_refs"))]
    #[serde(default)]
    pub media_refs: Vec<String>,
}

fn validate_media_refs(refs: &[String]) -> Result<(), validator::ValidationError> {
    if refs.iter().all(|r| !r.trim().is_empty() && r.len() <= 2048) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_media_ref"))
    }
}

impl From<ApplyRequest> for Submission {
    fn from(req: ApplyRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            media_refs: req.media_refs,
        }
    }
}
