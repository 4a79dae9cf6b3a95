use storage::dto::{
    common::{PaginatedResponse, PaginationParams},
    ranking::LeaderboardEntry,
};
use uuid::Uuid;

use crate::state::AppState;

/// One page of the competition's leaderboard
pub async fn get_leaderboard(
    state: &AppState,
    competition_id: Uuid,
    pagination: PaginationParams,
) -> engine::Result<PaginatedResponse<LeaderboardEntry>> {
    let page = state
        .engine
        .leaderboard(competition_id, pagination.limit(), pagination.offset())
        .await?;

    Ok(PaginatedResponse::new(page.entries, pagination, page.total))
}
