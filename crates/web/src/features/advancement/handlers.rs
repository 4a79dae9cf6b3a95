use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use storage::dto::advancement::{AdvanceRequest, AdvancementOutcome};
use uuid::Uuid;
use validator::Validate;

use crate::error::WebError;
use crate::state::AppState;

use super::services;

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/advance",
    params(
        ("id" = Uuid, Path, description = "Completed competition id")
    ),
    request_body = AdvanceRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Next-tier competition created with winners registered", body = AdvancementOutcome),
        (status = 400, description = "Invalid criteria"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Competition not found"),
        (status = 409, description = "Not completed, illegal tier or already advanced"),
        (status = 422, description = "No participant met the criteria")
    ),
    tag = "advancement"
)]
pub async fn advance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Response, WebError> {
    req.validate()?;

    let outcome = services::advance(&state, id, req).await?;

    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}
