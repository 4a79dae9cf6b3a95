use storage::dto::advancement::{AdvanceRequest, AdvancementOutcome};
use uuid::Uuid;

use crate::state::AppState;

/// Promote a completed competition's winners into the next tier
pub async fn advance(
    state: &AppState,
    competition_id: Uuid,
    request: AdvanceRequest,
) -> engine::Result<AdvancementOutcome> {
    state
        .engine
        .advance(competition_id, request.next_tier, request.criteria)
        .await
}
