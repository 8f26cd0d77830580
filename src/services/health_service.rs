use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the degraded flag with player and state counts, logging backend connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    if let Err(err) = state.store().backend().health_check().await {
        warn!(error = %err, "storage health check failed");
    }

    let players = state.players().len();
    let states = state.store().len();
    if state.is_degraded() {
        HealthResponse::degraded(players, states)
    } else {
        HealthResponse::ok(players, states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::state;

    #[tokio::test]
    async fn reports_degraded_mode() {
        let (state, _) = state();
        assert_eq!(health_status(&state).await.status, "ok");

        state.update_degraded(true);
        let status = health_status(&state).await;
        assert_eq!(status.status, "degraded");
        assert_eq!(status.players, 0);
    }
}
