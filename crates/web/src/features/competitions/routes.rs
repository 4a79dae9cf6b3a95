use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::handlers::{create_competition, get_competition, transition_status};
use crate::middleware::auth::{ApiKeys, require_auth};
use crate::state::AppState;

pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    let protected = Router::new()
        .route("/", post(create_competition))
        .route("/:id/status", post(transition_status))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth));

    Router::new()
        .route("/:id", get(get_competition))
        .merge(protected)
}
