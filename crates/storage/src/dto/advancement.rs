use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Competition, Participant, Tier};

/// Winner selection knobs for an advancement. Absent fields use the defaults
/// `top_n = max(3, ceil(10% of approved))` and `min_votes = 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdvancementCriteria {
    #[validate(range(min = 1, message = "top_n must be at least 1"))]
    pub top_n: Option<u32>,

    #[validate(range(min = 0, message = "min_votes cannot be negative"))]
    pub min_votes: Option<i64>,
}

/// Request payload for promoting a completed competition's winners
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdvanceRequest {
    pub next_tier: Tier,

    #[serde(default)]
    #[validate(nested)]
    pub criteria: AdvancementCriteria,
}

/// The next-tier competition and its pre-approved entrants
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdvancementOutcome {
    pub competition: Competition,
    pub participants: Vec<Participant>,
}
