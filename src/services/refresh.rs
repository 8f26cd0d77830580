use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::state::SharedState;

const CLIENTS_PATH: &str = "/clients";

/// Enumerate the media server clients every `refresh_interval` until shutdown.
///
/// Returns immediately when no server is configured or the interval is disabled.
pub async fn run(state: SharedState) {
    let (Some(server), Some(interval)) = (state.server(), state.config().refresh_interval) else {
        info!("client refresh disabled");
        return;
    };
    let mut shutdown = state.shutdown_watcher();
    let mut delay = Duration::ZERO;

    while !*shutdown.borrow() {
        tokio::select! {
            _ = sleep(delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }
        delay = interval;

        match server.query(CLIENTS_PATH).await {
            Ok(clients) => match state.set_client_data(clients).await {
                Ok(ingest) => debug!(seen = ingest.seen, created = ingest.created, "refreshed clients"),
                Err(err) => warn!(error = %err, "client enumeration rejected"),
            },
            Err(err) => warn!(error = %err, "client enumeration failed"),
        }
    }
    info!("client refresh stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use futures::future::BoxFuture;
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::object_store::MemoryObjectStore,
        media_server::{MediaServer, ServerError},
        state::{AppState, Collaborators, test_support::OfflineDevice},
    };

    struct Clients {
        queries: AtomicUsize,
    }

    impl MediaServer for Clients {
        fn query(&self, path: &str) -> BoxFuture<'static, Result<Value, ServerError>> {
            assert_eq!(path, CLIENTS_PATH);
            self.queries.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Ok(json!({
                    "MediaContainer": {
                        "machineIdentifier": "srv",
                        "Server": [{"name": "TV", "machineIdentifier": "abc"}]
                    }
                }))
            })
        }
    }

    #[tokio::test]
    async fn refresh_registers_clients_until_shutdown() {
        let server = Arc::new(Clients {
            queries: AtomicUsize::new(0),
        });
        let config = AppConfig {
            refresh_interval: Some(Duration::from_millis(10)),
            ..AppConfig::default()
        };
        let state = AppState::new(
            config,
            Collaborators {
                backend: Arc::new(MemoryObjectStore::new()),
                transport: Arc::new(OfflineDevice),
                server: Some(server.clone()),
            },
        );

        let task = tokio::spawn(run(state.clone()));
        tokio::time::timeout(Duration::from_secs(2), async {
            while server.queries.load(Ordering::SeqCst) < 2 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(state.players().find_device("abc").is_some());

        state.shutdown();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn refresh_without_server_returns() {
        let (state, _) = crate::state::test_support::state();
        tokio::time::timeout(Duration::from_secs(1), run(state))
            .await
            .unwrap();
    }
}
