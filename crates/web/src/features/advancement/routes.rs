use axum::{Router, middleware, routing::post};

use super::handlers::advance;
use crate::middleware::auth::{ApiKeys, require_auth};
use crate::state::AppState;

pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    Router::new()
        .route("/:id/advance", post(advance))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth))
}
