use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::states::{StatesQuery, StatesResponse},
    services::state_service,
    state::SharedState,
};

/// State dump endpoint.
pub fn router() -> Router<SharedState> {
    Router::new().route("/states", get(list_states))
}

/// Dump cached states, optionally restricted to `prefix`.
pub async fn list_states(
    State(state): State<SharedState>,
    Query(query): Query<StatesQuery>,
) -> Json<StatesResponse> {
    Json(state_service::dump(&state, query.prefix))
}
