use storage::{
    dto::{participant::ApplyRequest, vote::LedgerAudit},
    models::{Participant, Submission},
};
use uuid::Uuid;

use crate::state::AppState;

/// Enter the caller into a competition
pub async fn apply(
    state: &AppState,
    competition_id: Uuid,
    user_id: Uuid,
    request: ApplyRequest,
) -> engine::Result<Participant> {
    state
        .engine
        .registrar()
        .apply(competition_id, user_id, Submission::from(request))
        .await
}

pub async fn approve(state: &AppState, participant_id: Uuid) -> engine::Result<Participant> {
    state.engine.registrar().approve(participant_id).await
}

pub async fn reject(state: &AppState, participant_id: Uuid) -> engine::Result<Participant> {
    state.engine.registrar().reject(participant_id).await
}

pub async fn withdraw(
    state: &AppState,
    participant_id: Uuid,
    user_id: Uuid,
) -> engine::Result<Participant> {
    state
        .engine
        .registrar()
        .withdraw(participant_id, user_id)
        .await
}

/// Ledger row count against the cached vote counter
pub async fn audit(state: &AppState, participant_id: Uuid) -> engine::Result<LedgerAudit> {
    state.engine.ledger().audit(participant_id).await
}
