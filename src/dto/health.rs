use serde::Serialize;

/// Health response returned by the `/health` route.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Registered players.
    pub players: usize,
    /// Cached state values.
    pub states: usize,
}

impl HealthResponse {
    /// Create a health response indicating the persistence backend is reachable.
    pub fn ok(players: usize, states: usize) -> Self {
        Self {
            status: "ok".to_string(),
            players,
            states,
        }
    }

    /// Create a health response indicating the system runs without its persistence backend.
    pub fn degraded(players: usize, states: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            players,
            states,
        }
    }
}
