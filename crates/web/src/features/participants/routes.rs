use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::handlers::{apply, approve, audit, reject, withdraw};
use crate::middleware::auth::{ApiKeys, require_auth};
use crate::state::AppState;

/// Mounted under `/api/competitions`
pub fn competition_routes() -> Router<AppState> {
    Router::new().route("/:id/participants", post(apply))
}

/// Mounted under `/api/participants`
pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    let protected = Router::new()
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/audit", get(audit))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth));

    Router::new()
        .route("/:id/withdraw", post(withdraw))
        .merge(protected)
}
