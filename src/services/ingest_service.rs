use serde_json::Value;

use crate::{
    dto::ingest::{ClientsResponse, NotificationResponse},
    error::ServiceError,
    state::SharedState,
};

/// Ingest one webhook notification.
pub async fn notification(
    state: &SharedState,
    payload: Value,
) -> Result<NotificationResponse, ServiceError> {
    let accepted = state.set_notification_data(payload).await?;
    Ok(NotificationResponse { accepted })
}

/// Ingest a client enumeration pushed by a caller.
pub async fn clients(state: &SharedState, payload: Value) -> Result<ClientsResponse, ServiceError> {
    Ok(state.set_client_data(payload).await?.into())
}
