use axum::{Json, Router, extract::State, routing::post};
use serde_json::Value;

use crate::{
    dto::ingest::{ClientsResponse, NotificationResponse},
    error::AppError,
    services::ingest_service,
    state::SharedState,
};

/// Routes receiving data pushed by the media server.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/clients", post(clients))
}

/// Ingest one webhook notification.
pub async fn webhook(
    State(state): State<SharedState>,
    Json(payload): Json<Value>,
) -> Result<Json<NotificationResponse>, AppError> {
    Ok(Json(ingest_service::notification(&state, payload).await?))
}

/// Ingest a client enumeration.
pub async fn clients(
    State(state): State<SharedState>,
    Json(payload): Json<Value>,
) -> Result<Json<ClientsResponse>, AppError> {
    Ok(Json(ingest_service::clients(&state, payload).await?))
}
