use std::net::IpAddr;

use engine::CastVote;
use storage::dto::vote::VoteReceipt;
use uuid::Uuid;

use crate::state::AppState;

/// Resolve the voter's verification, then hand the vote to the engine
pub async fn cast_vote(
    state: &AppState,
    competition_id: Uuid,
    participant_id: Uuid,
    voter_user_id: Uuid,
    voter_ip: IpAddr,
) -> engine::Result<VoteReceipt> {
    let verification = state.identity.verification(voter_user_id).await?;

    state
        .engine
        .cast_vote(CastVote {
            competition_id,
            participant_id,
            voter_user_id,
            voter_ip,
            voter_verified: verification.is_verified(),
        })
        .await
}
