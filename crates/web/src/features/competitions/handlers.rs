use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use storage::{
    dto::competition::{CreateCompetitionRequest, TransitionStatusRequest},
    models::Competition,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::WebError;
use crate::state::AppState;

use super::services;

#[utoipa::path(
    get,
    path = "/api/competitions/{id}",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    responses(
        (status = 200, description = "Competition found", body = Competition),
        (status = 404, description = "Competition not found")
    ),
    tag = "competitions"
)]
pub async fn get_competition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, WebError> {
    let competition = services::get_competition(&state, id).await?;

    Ok(Json(competition).into_response())
}

#[utoipa::path(
    post,
    path = "/api/competitions",
    request_body = CreateCompetitionRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Competition created in draft", body = Competition),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "competitions"
)]
pub async fn create_competition(
    State(state): State<AppState>,
    Json(req): Json<CreateCompetitionRequest>,
) -> Result<Response, WebError> {
    req.validate()?;

    let competition = services::create_competition(&state, req).await?;

    Ok((StatusCode::CREATED, Json(competition)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    request_body = TransitionStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Status changed", body = Competition),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Competition not found"),
        (status = 409, description = "Backward or concurrent transition")
    ),
    tag = "competitions"
)]
pub async fn transition_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionStatusRequest>,
) -> Result<Response, WebError> {
    let competition = services::transition_status(&state, id, req.status).await?;

    Ok(Json(competition).into_response())
}
