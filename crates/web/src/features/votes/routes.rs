use axum::{Router, routing::post};

use super::handlers::cast_vote;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/:id/votes", post(cast_vote))
}
