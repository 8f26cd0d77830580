mod ingest;
pub mod notifications;
pub mod players;

use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    clock::now_ms,
    config::AppConfig,
    dao::object_store::ObjectStore,
    flatten::Flattener,
    media_server::MediaServer,
    player::{
        Player, PlayerContext,
        actions::{ActionMode, ActionTable},
        device::DeviceTransport,
        error::PlayerError,
        record::{NetworkInfo, PlayerIdentity},
    },
    registry::NodeRegistry,
    store::{GarbageCollector, StateStore, Sweep, SweepReport},
};

pub use self::ingest::ClientIngest;
pub use self::notifications::{NotificationHistory, NotificationRecord};
pub use self::players::PlayerRepository;

/// State shared by the handlers and background loops.
pub type SharedState = Arc<AppState>;

/// External collaborators the application talks to.
pub struct Collaborators {
    /// Persistence backend used until another one is installed.
    pub backend: Arc<dyn ObjectStore>,
    /// Device control transport.
    pub transport: Arc<dyn DeviceTransport>,
    /// Media server client, when a server is configured.
    pub server: Option<Arc<dyn MediaServer>>,
}

/// Central application state owning the state store, the players and the notification history.
pub struct AppState {
    config: AppConfig,
    store: Arc<StateStore>,
    flattener: Arc<Flattener>,
    gc: GarbageCollector,
    context: Arc<PlayerContext>,
    players: PlayerRepository,
    notifications: NotificationHistory,
    degraded: watch::Sender<bool>,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, collaborators: Collaborators) -> SharedState {
        let registry = Arc::new(NodeRegistry::builtin());
        let store = Arc::new(StateStore::new(collaborators.backend));
        let flattener = Arc::new(Flattener::new(
            registry,
            config.flatten,
            Some(config.server.link_base()),
        ));
        let gc = GarbageCollector::new(Arc::clone(&store));
        let context = Arc::new(PlayerContext {
            store: Arc::clone(&store),
            flattener: Arc::clone(&flattener),
            gc: gc.clone(),
            transport: collaborators.transport,
            server: collaborators.server,
            actions: Arc::new(ActionTable::builtin()),
            poll_interval: config.poll_interval,
        });
        let (degraded_tx, _rx) = watch::channel(false);
        let (shutdown_tx, _rx) = watch::channel(false);

        Arc::new(Self {
            config,
            store,
            flattener,
            gc,
            context,
            players: PlayerRepository::new(),
            notifications: NotificationHistory::new(),
            degraded: degraded_tx,
            shutdown: shutdown_tx,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// State store shared by every component.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Flattening engine.
    pub fn flattener(&self) -> &Flattener {
        &self.flattener
    }

    /// Garbage collector operating on the state store.
    pub fn gc(&self) -> &GarbageCollector {
        &self.gc
    }

    /// Media server client, if configured.
    pub fn server(&self) -> Option<Arc<dyn MediaServer>> {
        self.context.server.clone()
    }

    /// Known players.
    pub fn players(&self) -> &PlayerRepository {
        &self.players
    }

    /// Accepted notifications.
    pub fn notifications(&self) -> &NotificationHistory {
        &self.notifications
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Subscribe to the shutdown flag.
    pub fn shutdown_watcher(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Whether [`Self::shutdown`] was called.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stop every loop and player task.
    pub fn shutdown(&self) {
        if self.shutdown.send_replace(true) {
            return;
        }
        self.players.retire_all();
        info!("application state shut down");
    }

    /// Return the player registered under `identity`, creating and starting it when unknown.
    pub fn create_player_if_not_exist(
        &self,
        identity: PlayerIdentity,
        network: Option<NetworkInfo>,
    ) -> Arc<Player> {
        let shutdown = self.shutdown_watcher();
        let spawn = !self.is_shutting_down();
        let (player, created) = self.players.get_or_insert_with(&identity, || {
            let player = Player::new(identity.clone(), network, Arc::clone(&self.context));
            let task = spawn.then(|| player.spawn(shutdown));
            (player, task)
        });
        if created {
            info!(player = %identity, "registered player");
        }
        player
    }

    /// Whether a player is registered under `identity`.
    pub fn exist_player(&self, identity: &PlayerIdentity) -> bool {
        self.players.contains(identity)
    }

    /// Send an action to the player registered under `identity`.
    pub async fn action(
        &self,
        identity: &PlayerIdentity,
        mode: ActionMode,
        action: &str,
        value: Option<Value>,
        control_path: Option<String>,
    ) -> Result<(), PlayerError> {
        let player = self
            .players
            .get(identity)
            .ok_or_else(|| PlayerError::UnknownPlayer {
                device_id: identity.device_id.clone(),
            })?;
        player.action(mode, action, value, control_path).await
    }

    /// Forget the player and erase its subtree.
    ///
    /// Returns `None` when no player was registered under `identity`.
    pub async fn delete_player(&self, identity: &PlayerIdentity) -> Option<SweepReport> {
        let player = self.players.remove(identity)?;
        let prefix = player.identity().await.state_prefix();
        let sweep = Sweep::delete(prefix.clone(), Duration::ZERO);
        // +1 so entries written during this millisecond are erased too.
        let report = self.gc.collect_at(&sweep, now_ms() + 1).await;
        if self.store.has_object(&prefix) {
            if let Err(err) = self.store.delete(&prefix).await {
                warn!(path = %prefix, error = %err, "failed to delete player root");
            }
        }
        info!(
            player = %identity,
            erased = report.collected,
            failed = report.failed,
            "deleted player"
        );
        Some(report)
    }
}
