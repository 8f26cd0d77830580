use std::{future::Future, sync::Arc, time::Duration};

use tokio::{sync::watch, time::sleep};
use tracing::{info, warn};

use crate::{
    dao::{object_store::ObjectStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_HEALTH_RETRIES: u32 = 3;

/// Sleep for `delay`; resolves to `false` when shutdown was requested meanwhile.
async fn pause(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = sleep(delay) => true,
        changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
    }
}

/// Connect the persistence backend, replay the cache into it and keep the degraded flag in sync
/// with its health until shutdown.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ObjectStore>, StorageError>> + Send,
{
    let mut shutdown = state.shutdown_watcher();
    let mut delay = INITIAL_DELAY;
    state.update_degraded(true);

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                if !pause(&mut shutdown, delay).await {
                    break;
                }
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        let failed = state.store().install_backend(Arc::clone(&store)).await;
        match state.store().hydrate("").await {
            Ok(count) => info!(
                hydrated = count,
                replay_failures = failed,
                "storage connection established; leaving degraded mode"
            ),
            Err(err) => warn!(error = %err, "failed to hydrate state cache"),
        }
        state.update_degraded(false);
        delay = INITIAL_DELAY;

        if !watch_health(&state, store.as_ref(), &mut shutdown).await {
            break;
        }
        if !pause(&mut shutdown, delay).await {
            break;
        }
    }
    info!("storage supervisor stopped");
}

/// Poll `store` health. Resolves to `false` on shutdown and `true` when a reconnect is needed.
async fn watch_health(
    state: &SharedState,
    store: &dyn ObjectStore,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    loop {
        if !pause(shutdown, HEALTH_POLL_INTERVAL).await {
            return false;
        }
        if store.health_check().await.is_ok() {
            continue;
        }

        let mut retry_delay = INITIAL_DELAY;
        let mut recovered = false;
        for attempt in 0..MAX_HEALTH_RETRIES {
            match store.health_check().await {
                Ok(()) => {
                    recovered = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(attempt, error = %err, "storage health check failed; entering degraded mode");
                        state.update_degraded(true);
                    } else {
                        warn!(attempt, error = %err, "storage health check failed");
                    }
                    if !pause(shutdown, retry_delay).await {
                        return false;
                    }
                    retry_delay = (retry_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if recovered {
            info!("storage healthy again; leaving degraded mode");
            state.update_degraded(false);
        } else {
            warn!("storage still unhealthy; reconnecting");
            return true;
        }
    }
}
