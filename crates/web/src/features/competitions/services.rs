use storage::{
    dto::competition::CreateCompetitionRequest,
    models::{Competition, CompetitionStatus, NewCompetition},
};
use uuid::Uuid;

use crate::state::AppState;

/// Create a new competition in draft
pub async fn create_competition(
    state: &AppState,
    request: CreateCompetitionRequest,
) -> engine::Result<Competition> {
    state
        .engine
        .competitions()
        .create(NewCompetition::from(request))
        .await
}

/// Get competition by id
pub async fn get_competition(
    state: &AppState,
    competition_id: Uuid,
) -> engine::Result<Competition> {
    state.engine.competitions().get(competition_id).await
}

/// Move a competition forward in its lifecycle
pub async fn transition_status(
    state: &AppState,
    competition_id: Uuid,
    status: CompetitionStatus,
) -> engine::Result<Competition> {
    state
        .engine
        .competitions()
        .transition(competition_id, status)
        .await
}
