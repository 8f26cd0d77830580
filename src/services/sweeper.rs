use tokio::time::sleep;
use tracing::{debug, info};

use crate::{
    clock::now_ms,
    store::{Sweep, SweepReport},
    state::SharedState,
};

const EVENTS_PREFIX: &str = "events";
const HISTORY_PATH: &str = "events.history";

/// Empty notification states older than the configured horizon, as of `now`.
pub async fn sweep_events(state: &SharedState, now: i64) -> SweepReport {
    let sweep = Sweep::empty(EVENTS_PREFIX, state.config().notification_horizon)
        .excluding([HISTORY_PATH]);
    state.gc().collect_at(&sweep, now).await
}

/// Sweep notification states every `sweep_interval` until shutdown.
pub async fn run(state: SharedState) {
    let interval = state.config().sweep_interval;
    let mut shutdown = state.shutdown_watcher();

    while !*shutdown.borrow() {
        tokio::select! {
            _ = sleep(interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        let report = sweep_events(&state, now_ms()).await;
        if report.collected > 0 || report.failed > 0 {
            debug!(
                collected = report.collected,
                failed = report.failed,
                "swept notification states"
            );
        }
    }
    info!("notification sweep stopped");
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::test_support::state;

    #[tokio::test]
    async fn stale_notification_fields_are_emptied() {
        let (state, _) = state();
        state
            .set_notification_data(json!({
                "event": "media.stop",
                "Account": {"title": "bob"},
                "Player": {"title": "TV"},
                "Metadata": {"title": "Heat"}
            }))
            .await
            .unwrap();

        let fresh = sweep_events(&state, now_ms()).await;
        assert_eq!(fresh.collected, 0);

        let later = now_ms() + state.config().notification_horizon.as_millis() as i64 + 1_000;
        let report = sweep_events(&state, later).await;
        assert!(report.collected > 0);

        let store = state.store();
        assert_eq!(store.value("events.message"), Some(json!("")));
        assert_eq!(store.value("events.Account.title"), Some(json!("")));
        assert_ne!(store.value("events.history"), Some(json!("")));
        state.shutdown();
    }
}
