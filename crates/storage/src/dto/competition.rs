use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{CompetitionStatus, NewCompetition, QualificationRules, Tier, TimeWindow};

/// Request payload for creating a new competition
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCompetitionRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be between 1 and 255 characters"
    ))]
    pub title: String,

    pub tier: Tier,

    pub registration_window: TimeWindow,

    pub voting_window: TimeWindow,

    #[validate(range(min = 1, message = "max_participants must be positive"))]
    pub max_participants: Option<i32>,

    #[serde(default = "default_requires_approval")]
    pub requires_approval: bool,

    #[validate(range(min = 1, message = "top_n must be at least 1"))]
    pub top_n: Option<i32>,

    #[validate(range(min = 0, message = "min_votes cannot be negative"))]
    pub min_votes: Option<i64>,
}

fn default_requires_approval() -> bool {
    true
}

impl From<CreateCompetitionRequest> for NewCompetition {
    fn from(req: CreateCompetitionRequest) -> Self {
        Self {
            title: req.title,
            tier: req.tier,
            status: CompetitionStatus::Draft,
            registration_window: req.registration_window,
            voting_window: req.voting_window,
            max_participants: req.max_participants,
            qualification_rules: QualificationRules {
                requires_approval: req.requires_approval,
                top_n: req.top_n,
                min_votes: req.min_votes,
            },
            source_competition_id: None,
        }
    }
}

/// Request payload for moving a competition forward in its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransitionStatusRequest {
    pub status: CompetitionStatus,
}
