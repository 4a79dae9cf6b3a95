use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use storage::dto::vote::{CastVoteRequest, VoteReceipt};
use uuid::Uuid;

use crate::error::WebError;
use crate::extract::{Caller, ClientIp};
use crate::state::AppState;

use super::services;

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/votes",
    params(
        ("id" = Uuid, Path, description = "Competition id"),
        ("X-User-Id" = Uuid, Header, description = "Voting user")
    ),
    request_body = CastVoteRequest,
    responses(
        (status = 201, description = "Vote accepted", body = VoteReceipt),
        (status = 403, description = "Unverified voter or self vote"),
        (status = 404, description = "Competition or participant not found"),
        (status = 409, description = "Voting closed, duplicate vote or participant not approved"),
        (status = 429, description = "Too many votes from this address")
    ),
    tag = "votes"
)]
pub async fn cast_vote(
    State(state): State<AppState>,
    Path(competition_id): Path<Uuid>,
    Caller(voter_user_id): Caller,
    ClientIp(voter_ip): ClientIp,
    Json(req): Json<CastVoteRequest>,
) -> Result<Response, WebError> {
    let receipt = services::cast_vote(
        &state,
        competition_id,
        req.participant_id,
        voter_user_id,
        voter_ip,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(receipt)).into_response())
}
