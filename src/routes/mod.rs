use axum::Router;

use crate::state::SharedState;

pub mod health;
pub mod ingest;
pub mod players;
pub mod states;

/// Compose all route trees and wire in the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(ingest::router())
        .merge(players::router())
        .merge(states::router())
        .with_state(state)
}
