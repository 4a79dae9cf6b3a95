use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use storage::{
    dto::{participant::ApplyRequest, vote::LedgerAudit},
    models::Participant,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::WebError;
use crate::extract::Caller;
use crate::state::AppState;

use super::services;

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/participants",
    params(
        ("id" = Uuid, Path, description = "Competition id"),
        ("X-User-Id" = Uuid, Header, description = "Applying user")
    ),
    request_body = ApplyRequest,
    responses(
        (status = 201, description = "Application recorded", body = Participant),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Competition not found"),
        (status = 409, description = "Registration closed or already applied")
    ),
    tag = "participants"
)]
pub async fn apply(
    State(state): State<AppState>,
    Path(competition_id): Path<Uuid>,
    Caller(user_id): Caller,
    Json(req): Json<ApplyRequest>,
) -> Result<Response, WebError> {
    req.validate()?;

    let participant = services::apply(&state, competition_id, user_id, req).await?;

    Ok((StatusCode::CREATED, Json(participant)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/participants/{id}/approve",
    params(
        ("id" = Uuid, Path, description = "Participant id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Participant approved", body = Participant),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Participant not found"),
        (status = 409, description = "Not pending or competition full")
    ),
    tag = "participants"
)]
pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, WebError> {
    let participant = services::approve(&state, id).await?;

    Ok(Json(participant).into_response())
}

#[utoipa::path(
    post,
    path = "/api/participants/{id}/reject",
    params(
        ("id" = Uuid, Path, description = "Participant id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Participant rejected", body = Participant),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Participant not found"),
        (status = 409, description = "Not pending")
    ),
    tag = "participants"
)]
pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, WebError> {
    let participant = services::reject(&state, id).await?;

    Ok(Json(participant).into_response())
}

#[utoipa::path(
    post,
    path = "/api/participants/{id}/withdraw",
    params(
        ("id" = Uuid, Path, description = "Participant id"),
        ("X-User-Id" = Uuid, Header, description = "Owner of the entry")
    ),
    responses(
        (status = 200, description = "Entry withdrawn", body = Participant),
        (status = 403, description = "Caller does not own the entry"),
        (status = 404, description = "Participant not found"),
        (status = 409, description = "Competition frozen")
    ),
    tag = "participants"
)]
pub async fn withdraw(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Caller(user_id): Caller,
) -> Result<Response, WebError> {
    let participant = services::withdraw(&state, id, user_id).await?;

    Ok(Json(participant).into_response())
}

#[utoipa::path(
    get,
    path = "/api/participants/{id}/audit",
    params(
        ("id" = Uuid, Path, description = "Participant id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Ledger count and cached counter", body = LedgerAudit),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Participant not found")
    ),
    tag = "participants"
)]
pub async fn audit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, WebError> {
    let audit = services::audit(&state, id).await?;

    Ok(Json(audit).into_response())
}
