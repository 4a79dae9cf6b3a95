use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use storage::dto::{
    common::{PaginatedResponse, PaginationParams},
    ranking::LeaderboardEntry,
};
use uuid::Uuid;

use crate::error::WebError;
use crate::state::AppState;

use super::services;

#[utoipa::path(
    get,
    path = "/api/competitions/{id}/leaderboard",
    params(
        ("id" = Uuid, Path, description = "Competition id"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Leaderboard page with rank trends", body = PaginatedResponse<LeaderboardEntry>),
        (status = 400, description = "Invalid query parameters"),
        (status = 404, description = "Competition not found")
    ),
    tag = "leaderboard"
)]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Response, WebError> {
    pagination.validate().map_err(WebError::BadRequest)?;

    let response = services::get_leaderboard(&state, id, pagination).await?;

    Ok(Json(response).into_response())
}
