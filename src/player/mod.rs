//! Per-device poll loop, control synchronisation and command dispatch.

pub mod actions;
pub mod details;
pub mod device;
pub mod error;
pub mod record;
pub mod schedule;
pub mod state_machine;

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex as StdMutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde_json::{Value, json};
use tokio::{
    sync::{Mutex, Notify, watch},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, info, warn};

use crate::{
    clock::now_ms,
    flatten::{Flattener, state_path},
    media_server::{MediaServer, find_session},
    selector::{SESSION_RULES, select},
    store::{GarbageCollector, SetOptions, StateStore, Sweep},
};

use self::{
    actions::{ActionMode, ActionTable},
    details::{ActiveStream, DetailsSnapshot, MalformedTimeline, TimelineEntry, parse_timeline},
    device::{DeviceTarget, DeviceTransport},
    error::PlayerError,
    record::{NetworkInfo, PlayerIdentity, PlayerRecord, split_list},
    schedule::{Begin, Next, PollSchedule},
    state_machine::{PlayerEvent, PlayerPhase, PlayerStateMachine},
};

/// Query returning the sessions currently playing on the server.
pub const SESSIONS_PATH: &str = "/status/sessions";
/// Transient subtrees emptied when a player disconnects.
const DISCONNECT_SCOPES: [&str; 3] = ["_controls", "playing", "details"];
/// Paths kept when a disconnected player's transient subtrees are emptied.
const DISCONNECT_KEEP: [&str; 4] = [
    "player.address",
    "player.port",
    "player.protocolcapabilities",
    "player.controllable",
];

/// Dependencies shared by every player.
pub struct PlayerContext {
    /// State cache every player writes into.
    pub store: Arc<StateStore>,
    /// Turns timeline and session documents into state writes.
    pub flattener: Arc<Flattener>,
    /// Collector for the player subtrees.
    pub gc: GarbageCollector,
    /// Device polling and commands.
    pub transport: Arc<dyn DeviceTransport>,
    /// Media server used for session metadata, if configured.
    pub server: Option<Arc<dyn MediaServer>>,
    /// Known actions.
    pub actions: Arc<ActionTable>,
    /// Delay between two polls.
    pub poll_interval: Duration,
}

/// Attributes reported for a player by a notification or a client enumeration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    /// Display name.
    pub name: Option<String>,
    /// Where the device answers.
    pub network: Option<NetworkInfo>,
    /// Comma separated protocol capabilities.
    pub capabilities: Option<String>,
    /// Client application.
    pub product: Option<String>,
    /// Operating system or device class.
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ControlField {
    Volume,
    Seek,
    Playing,
    Shuffle,
    Repeat,
    ViewOffset,
}

impl ControlField {
    fn extract(self, active: &ActiveStream, entry: Option<&TimelineEntry>) -> Option<Value> {
        match self {
            ControlField::Volume => entry.and_then(|entry| entry.volume).map(Value::from),
            ControlField::Seek => active.seek_percent().map(Value::from),
            ControlField::Playing => Some(Value::Bool(active.state.eq_ignore_ascii_case("playing"))),
            ControlField::Shuffle => entry
                .and_then(|entry| entry.shuffle)
                .map(|shuffle| Value::Bool(shuffle != 0)),
            ControlField::Repeat => entry.and_then(|entry| entry.repeat).map(Value::from),
            ControlField::ViewOffset => active.time.map(Value::from),
        }
    }

    /// Store `value` into the record; returns whether it changed.
    fn update(self, record: &mut PlayerRecord, value: &Value) -> bool {
        let controls = &mut record.controls;
        match self {
            ControlField::Volume => replace(&mut controls.volume, value.as_i64()),
            ControlField::Seek => replace(&mut controls.seek, value.as_f64()),
            ControlField::Playing => replace(&mut controls.playing, value.as_bool()),
            ControlField::Shuffle => replace(&mut controls.shuffle, value.as_bool()),
            ControlField::Repeat => replace(&mut controls.repeat, value.as_i64()),
            ControlField::ViewOffset => replace(&mut controls.view_offset, value.as_i64()),
        }
    }
}

fn replace<T: PartialEq>(slot: &mut Option<T>, next: Option<T>) -> bool {
    if next.is_none() || *slot == next {
        return false;
    }
    *slot = next;
    true
}

/// Writable control nodes, gated by the affordance the device must advertise.
const CONTROL_NODES: &[(ControlField, &str, &str)] = &[
    (ControlField::Volume, "_controls.playback.volume", "volume"),
    (ControlField::Seek, "_controls.playback.seek", "seekTo"),
    (ControlField::Playing, "_controls.playback.playing", "playPause"),
    (ControlField::Shuffle, "_controls.playback.shuffle", "shuffle"),
    (ControlField::Repeat, "_controls.playback.repeat", "repeat"),
];

/// Read-only display nodes.
const DISPLAY_NODES: &[(ControlField, &str)] =
    &[(ControlField::ViewOffset, "_controls.playback.viewoffset")];

/// One known player and its poll loop state.
pub struct Player {
    record: Mutex<PlayerRecord>,
    machine: StdMutex<PlayerStateMachine>,
    schedule: StdMutex<PollSchedule>,
    context: Arc<PlayerContext>,
    wake: Notify,
    retired: AtomicBool,
}

impl Player {
    /// Build a player for `identity`.
    pub fn new(
        identity: PlayerIdentity,
        network: Option<NetworkInfo>,
        context: Arc<PlayerContext>,
    ) -> Arc<Self> {
        let schedule = PollSchedule::new(context.poll_interval);
        Arc::new(Self {
            record: Mutex::new(PlayerRecord::new(identity, network)),
            machine: StdMutex::new(PlayerStateMachine::new()),
            schedule: StdMutex::new(schedule),
            context,
            wake: Notify::new(),
            retired: AtomicBool::new(false),
        })
    }

    /// Copy of the player record.
    pub async fn record(&self) -> PlayerRecord {
        self.record.lock().await.clone()
    }

    /// Identity of the player.
    pub async fn identity(&self) -> PlayerIdentity {
        self.record.lock().await.identity.clone()
    }

    /// Current poll loop phase.
    pub fn phase(&self) -> PlayerPhase {
        self.machine
            .lock()
            .map(|machine| machine.phase())
            .unwrap_or(PlayerPhase::Idle)
    }

    /// Start the poll loop on the runtime. The loop ends when `shutdown` flips to `true` or the
    /// player is retired.
    pub fn spawn(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let player = Arc::clone(self);
        tokio::spawn(async move { player.run(shutdown).await })
    }

    /// Stop the poll loop and drop results of polls still in flight.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Ask for a poll as soon as possible.
    ///
    /// While a poll is in flight the trigger only bumps the failure counter.
    pub fn trigger(&self) {
        if let Ok(mut schedule) = self.schedule.lock() {
            if schedule.is_in_flight() {
                let _ = schedule.begin();
                return;
            }
        }
        if self.phase() == PlayerPhase::Disconnected {
            self.transition(PlayerEvent::Reset);
            if let Ok(mut schedule) = self.schedule.lock() {
                schedule.reset();
            }
        }
        self.wake.notify_one();
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut delay = Some(Duration::ZERO);
        loop {
            tokio::select! {
                _ = sleep(delay.unwrap_or_default()), if delay.is_some() => {}
                _ = self.wake.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *shutdown.borrow() || self.is_retired() {
                break;
            }
            delay = self.run_cycle().await;
        }
        self.transition(PlayerEvent::Stop);
        debug!(phase = ?self.phase(), "player loop stopped");
    }

    /// Run one poll cycle; returns the delay before the next one, or `None` to wait for a
    /// trigger.
    pub async fn run_cycle(&self) -> Option<Duration> {
        let (target, command_id) = {
            let mut record = self.record.lock().await;
            if !record.supports_timeline() {
                return None;
            }
            let network = record.network.as_ref()?;
            let target = DeviceTarget {
                base_url: network.base_url(),
                device_id: record.identity.device_id.clone(),
            };
            // Only a claimed poll takes a command id.
            let begin = self.schedule.lock().map(|mut schedule| schedule.begin()).ok();
            if begin != Some(Begin::Started) {
                return Some(self.context.poll_interval);
            }
            (target, record.next_command_id())
        };

        self.transition(PlayerEvent::Start);

        let result = self
            .context
            .transport
            .poll_timeline(target.clone(), command_id)
            .await;
        if self.is_retired() {
            return None;
        }

        let next = match result.map(|payload| parse_timeline(&payload)) {
            Ok(Ok(entries)) => {
                self.apply_timeline(entries).await;
                self.with_schedule(PollSchedule::success)
            }
            Ok(Err(MalformedTimeline(reason))) => {
                warn!(device = %target.device_id, %reason, "ignoring malformed timeline");
                self.transition(PlayerEvent::Failed);
                self.with_schedule(PollSchedule::skip)
            }
            Err(err) if !err.is_transient() => {
                warn!(device = %target.device_id, error = %err, "ignoring malformed timeline");
                self.transition(PlayerEvent::Failed);
                self.with_schedule(PollSchedule::skip)
            }
            Err(err) => {
                debug!(device = %target.device_id, error = %err, "timeline poll failed");
                self.transition(PlayerEvent::Failed);
                self.with_schedule(PollSchedule::failure)
            }
        };

        match next {
            Next::Reschedule(delay) => Some(delay),
            Next::Disconnect => {
                self.disconnect().await;
                None
            }
        }
    }

    fn with_schedule(&self, step: fn(&mut PollSchedule) -> Next) -> Next {
        self.schedule
            .lock()
            .map(|mut schedule| step(&mut schedule))
            .unwrap_or(Next::Disconnect)
    }

    fn transition(&self, event: PlayerEvent) {
        let Ok(mut machine) = self.machine.lock() else {
            return;
        };
        if let Err(err) = machine.apply(event) {
            debug!(error = %err, "ignored player event");
        }
    }

    async fn apply_timeline(&self, entries: Vec<TimelineEntry>) {
        let snapshot = DetailsSnapshot::from_entries(entries);
        let (prefix, previous, controls, affordances, newly_connected) = {
            let mut record = self.record.lock().await;
            let previous = record.details.replace(snapshot.clone());
            let newly_connected = !record.connected;
            record.connected = true;

            let advertised = snapshot
                .active_entry()
                .or_else(|| snapshot.entries.values().next())
                .and_then(|entry| entry.controllable.as_deref())
                .map(split_list)
                .unwrap_or_default();
            record.affordances = advertised;

            let controls = diff_controls(&mut record, &snapshot);
            (
                record.identity.state_prefix(),
                previous,
                controls,
                record.affordances.join(","),
                newly_connected,
            )
        };

        let store = &self.context.store;
        let flattener = &self.context.flattener;
        if newly_connected {
            self.write(&prefix, "player.connected", &Value::Bool(true), SetOptions::default())
                .await;
        }
        // The details tree is rebuilt every cycle; fields the device stopped reporting go away.
        let details = flattener.plan("details", &snapshot.to_document(), &prefix);
        let kept: HashSet<String> = details.iter().map(|write| write.path.clone()).collect();
        flattener.apply(store, details).await;
        self.context
            .gc
            .collect_missing(&format!("{prefix}.details"), &kept)
            .await;
        self.write(&prefix, "player.affordances", &Value::String(affordances), SetOptions::default())
            .await;
        for (key, value) in controls {
            self.write(&prefix, key, &value, SetOptions::default()).await;
        }

        let previous_active = previous.map(|details| details.active);
        let url_changed = previous_active.as_ref().and_then(|before| before.url.as_ref())
            != snapshot.active.url.as_ref();
        if snapshot.active.is_live() {
            if url_changed {
                self.refresh_metadata(&prefix).await;
            }
        } else if previous_active.is_some_and(|before| before.is_live()) {
            self.clear_session(&prefix).await;
        }

        self.transition(PlayerEvent::Observed {
            live: snapshot.active.is_live(),
        });
    }

    async fn write(&self, prefix: &str, key: &str, value: &Value, options: SetOptions) {
        let node = self.context.flattener.registry().resolve(key);
        self.context
            .store
            .set(&state_path(prefix, key), &node, value, options)
            .await;
    }

    /// Republish the metadata of the session playing on this device.
    async fn refresh_metadata(&self, prefix: &str) {
        let Some(server) = &self.context.server else {
            return;
        };
        let device_id = self.identity().await.device_id;
        let sessions = match server.query(SESSIONS_PATH).await {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(device = %device_id, error = %err, "failed to refresh session metadata");
                return;
            }
        };
        let Some(session) = find_session(&sessions, &device_id).cloned() else {
            debug!(device = %device_id, "no session found for player");
            return;
        };

        let store = &self.context.store;
        let flattener = &self.context.flattener;
        flattener
            .flatten(store, "playing.metadata", &session, prefix)
            .await;
        for (dest, value) in select(&session, SESSION_RULES) {
            flattener
                .flatten(store, &format!("playing.{dest}"), &value, prefix)
                .await;
        }
        self.record.lock().await.metadata = Some(session);
        info!(device = %device_id, "refreshed session metadata");
    }

    async fn clear_session(&self, prefix: &str) {
        self.record.lock().await.metadata = None;
        let sweep = Sweep::delete(format!("{prefix}.playing"), Duration::ZERO);
        // +1 so entries written during this millisecond are collected too.
        self.context.gc.collect_at(&sweep, now_ms() + 1).await;
    }

    async fn disconnect(&self) {
        self.transition(PlayerEvent::GiveUp);
        let (prefix, identity) = {
            let mut record = self.record.lock().await;
            record.connected = false;
            record.details = None;
            record.metadata = None;
            record.controls = Default::default();
            (record.identity.state_prefix(), record.identity.clone())
        };
        let now = now_ms() + 1;
        let mut emptied = 0;
        for scope in DISCONNECT_SCOPES {
            let sweep = Sweep::empty(format!("{prefix}.{scope}"), Duration::ZERO)
                .excluding(DISCONNECT_KEEP);
            emptied += self.context.gc.collect_at(&sweep, now).await.collected;
        }
        self.write(&prefix, "player.connected", &Value::Bool(false), SetOptions::default())
            .await;
        warn!(player = %identity, emptied, "player disconnected");
    }

    /// Merge attributes reported by a notification or client enumeration.
    pub async fn observe(&self, observation: Observation) {
        let (prefix, document) = {
            let mut record = self.record.lock().await;
            if let Some(name) = observation.name.clone().filter(|name| !name.is_empty()) {
                record.identity.name = Some(name);
            }
            if let Some(network) = observation.network.clone() {
                record.network = Some(network);
            }
            if let Some(capabilities) = &observation.capabilities {
                record.set_capabilities(capabilities);
            }
            record.controllable = record.has_capability("playback");

            let mut document = json!({
                "name": record.identity.name,
                "protocolCapabilities": record.capabilities.join(","),
                "controllable": record.controllable,
                "product": observation.product,
                "platform": observation.platform,
            });
            if let (Some(network), Value::Object(fields)) = (&record.network, &mut document) {
                fields.insert("address".into(), Value::String(network.address.clone()));
                fields.insert("port".into(), Value::from(network.port));
            }
            (record.identity.state_prefix(), document)
        };

        self.context
            .flattener
            .flatten(&self.context.store, "player", &document, &prefix)
            .await;
        self.trigger();
    }

    /// Send `action` to the device and confirm its control node.
    pub async fn action(
        &self,
        mode: ActionMode,
        action: &str,
        value: Option<Value>,
        control_path: Option<String>,
    ) -> Result<(), PlayerError> {
        let descriptor = self.context.actions.resolve(mode, action)?.clone();
        let (target, command_id, duration, prefix) = {
            let mut record = self.record.lock().await;
            let network = record
                .network
                .as_ref()
                .ok_or_else(|| PlayerError::NoAddress {
                    device_id: record.identity.device_id.clone(),
                })?;
            let target = DeviceTarget {
                base_url: network.base_url(),
                device_id: record.identity.device_id.clone(),
            };
            let duration = record.active_duration();
            (
                target,
                record.next_command_id(),
                duration,
                record.identity.state_prefix(),
            )
        };

        let command = descriptor.command(value.as_ref(), duration)?;
        info!(
            device = %target.device_id,
            action = %command.action,
            mode = %mode,
            "sending player command"
        );
        self.context
            .transport
            .send_command(target, command, command_id)
            .await?;

        let key = control_path.unwrap_or_else(|| descriptor.control_path());
        let confirmed = value.unwrap_or(Value::Bool(true));
        self.write(&prefix, &key, &confirmed, SetOptions::forced()).await;
        // Keep the record in step with the node so the next timeline echo is diffed against it.
        if let Some((field, _, _)) = CONTROL_NODES
            .iter()
            .find(|(_, path, _)| path.eq_ignore_ascii_case(&key))
        {
            let mut record = self.record.lock().await;
            field.update(&mut record, &confirmed);
        }
        self.trigger();
        Ok(())
    }
}

/// Diff the active entry against the recorded controls; returns the node writes to perform.
fn diff_controls(
    record: &mut PlayerRecord,
    snapshot: &DetailsSnapshot,
) -> Vec<(&'static str, Value)> {
    let entry = snapshot.active_entry();
    let mut writes = Vec::new();
    // Without a `controllable` list the playback capability gates every control.
    let by_affordance = !record.affordances.is_empty();

    for (field, key, affordance) in CONTROL_NODES {
        let allowed = if by_affordance {
            record.advertises(affordance)
        } else {
            record.controllable
        };
        if !allowed {
            continue;
        }
        if let Some(value) = field.extract(&snapshot.active, entry) {
            if field.update(record, &value) {
                writes.push((*key, value));
            }
        }
    }
    for (field, key) in DISPLAY_NODES {
        if let Some(value) = field.extract(&snapshot.active, entry) {
            if field.update(record, &value) {
                writes.push((*key, value));
            }
        }
    }
    writes
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as TestMutex;

    use futures::future::BoxFuture;
    use serde_json::json;

    use super::*;
    use crate::{
        dao::object_store::MemoryObjectStore,
        flatten::FlattenOptions,
        media_server::ServerError,
        player::{actions::Command, error::DeviceError},
        registry::NodeRegistry,
    };

    #[derive(Default)]
    struct FakeDevice {
        timelines: TestMutex<Vec<Result<Value, ()>>>,
        commands: TestMutex<Vec<Command>>,
    }

    impl FakeDevice {
        fn push(&self, payload: Value) {
            self.timelines.lock().unwrap().push(Ok(payload));
        }

        fn push_failure(&self) {
            self.timelines.lock().unwrap().push(Err(()));
        }
    }

    impl DeviceTransport for FakeDevice {
        fn poll_timeline(
            &self,
            target: DeviceTarget,
            _command_id: u64,
        ) -> BoxFuture<'static, Result<Value, DeviceError>> {
            let next = self.timelines.lock().unwrap().pop();
            Box::pin(async move {
                match next {
                    Some(Ok(payload)) => Ok(payload),
                    _ => Err(DeviceError::Timeout {
                        url: target.base_url,
                    }),
                }
            })
        }

        fn send_command(
            &self,
            _target: DeviceTarget,
            command: Command,
            _command_id: u64,
        ) -> BoxFuture<'static, Result<(), DeviceError>> {
            self.commands.lock().unwrap().push(command);
            Box::pin(async { Ok(()) })
        }
    }

    struct FakeServer(Value);

    impl MediaServer for FakeServer {
        fn query(&self, _path: &str) -> BoxFuture<'static, Result<Value, ServerError>> {
            let sessions = self.0.clone();
            Box::pin(async move { Ok(sessions) })
        }
    }

    fn setup(server: Option<Value>) -> (Arc<Player>, Arc<FakeDevice>, Arc<StateStore>) {
        let store = Arc::new(StateStore::new(Arc::new(MemoryObjectStore::new())));
        let device = Arc::new(FakeDevice::default());
        let flattener = Flattener::new(
            Arc::new(NodeRegistry::builtin()),
            FlattenOptions::default(),
            None,
        );
        let context = Arc::new(PlayerContext {
            store: Arc::clone(&store),
            flattener: Arc::new(flattener),
            gc: GarbageCollector::new(Arc::clone(&store)),
            transport: device.clone(),
            server: server.map(|sessions| Arc::new(FakeServer(sessions)) as Arc<dyn MediaServer>),
            actions: Arc::new(ActionTable::builtin()),
            poll_interval: Duration::from_millis(1_000),
        });
        let identity = PlayerIdentity::new("server", "abc", Some("TV".into())).unwrap();
        let network = NetworkInfo {
            address: "10.0.0.9".into(),
            port: 32500,
            protocol: "http".into(),
        };
        let player = Player::new(identity, Some(network), context);
        (player, device, store)
    }

    async fn observe_capabilities(player: &Player) {
        player
            .observe(Observation {
                capabilities: Some("timeline,playback".into()),
                ..Observation::default()
            })
            .await;
    }

    fn video_timeline() -> Value {
        json!({
            "MediaContainer": {
                "Timeline": [
                    {"type": "music", "state": "stopped"},
                    {
                        "type": "video",
                        "state": "playing",
                        "time": 5000,
                        "duration": 100000,
                        "key": "/library/metadata/42",
                        "volume": 80,
                        "controllable": "playPause,stop,volume,seekTo",
                        "address": "10.0.0.9"
                    }
                ]
            }
        })
    }

    #[tokio::test]
    async fn playing_video_drives_active_projection_and_seek() {
        let (player, device, store) = setup(None);
        observe_capabilities(&player).await;
        device.push(video_timeline());

        assert_eq!(player.run_cycle().await, Some(Duration::from_millis(1_000)));

        let record = player.record().await;
        let active = &record.details.as_ref().unwrap().active;
        assert_eq!(active.media_type, "video");
        assert_eq!(active.time, Some(5_000));
        assert_eq!(active.duration, Some(100_000));
        assert_eq!(record.controls.seek, Some(5.0));
        assert_eq!(player.phase(), PlayerPhase::Active);

        assert_eq!(
            store.value("players.server.abc._controls.playback.seek"),
            Some(json!(5.0))
        );
        assert_eq!(
            store.value("players.server.abc.details.active.type"),
            Some(json!("video"))
        );
        assert_eq!(
            store.value("players.server.abc.player.affordances"),
            Some(json!("playPause,stop,volume,seekTo"))
        );
        assert!(store.value("players.server.abc.details.video.address").is_none());
    }

    #[tokio::test]
    async fn controls_follow_advertised_affordances() {
        let (player, device, store) = setup(None);
        observe_capabilities(&player).await;
        let mut timeline = video_timeline();
        timeline["MediaContainer"]["Timeline"][1]["controllable"] = json!("playPause");
        device.push(timeline);

        player.run_cycle().await;

        assert_eq!(
            store.value("players.server.abc._controls.playback.playing"),
            Some(json!(true))
        );
        assert!(store.value("players.server.abc._controls.playback.volume").is_none());
        assert_eq!(
            store.value("players.server.abc._controls.playback.viewoffset"),
            Some(json!(5_000))
        );
    }

    #[tokio::test]
    async fn two_failures_disconnect_and_keep_allow_list() {
        let (player, device, store) = setup(None);
        observe_capabilities(&player).await;
        device.push(video_timeline());
        player.run_cycle().await;
        device.push_failure();
        device.push_failure();

        assert!(player.run_cycle().await.is_some());
        assert_eq!(player.phase(), PlayerPhase::Stalled);
        assert!(player.run_cycle().await.is_none());
        assert_eq!(player.phase(), PlayerPhase::Disconnected);

        assert_eq!(
            store.value("players.server.abc.player.address"),
            Some(json!("10.0.0.9"))
        );
        assert_eq!(
            store.value("players.server.abc.player.name"),
            Some(json!("TV"))
        );
        assert_eq!(
            store.value("players.server.abc._controls.playback.seek"),
            Some(json!(0))
        );
        assert_eq!(
            store.value("players.server.abc.details.active.type"),
            Some(json!(""))
        );
        assert_eq!(
            store.value("players.server.abc.player.connected"),
            Some(json!(false))
        );
        assert!(!player.record().await.connected);
    }

    #[tokio::test]
    async fn stopping_playback_drops_stale_details() {
        let (player, device, store) = setup(None);
        observe_capabilities(&player).await;
        device.push(video_timeline());
        player.run_cycle().await;
        device.push(json!({
            "MediaContainer": {
                "Timeline": [
                    {"type": "music", "state": "stopped"},
                    {"type": "video", "state": "stopped"}
                ]
            }
        }));

        player.run_cycle().await;

        assert_eq!(
            store.value("players.server.abc.details.active.type"),
            Some(json!("all"))
        );
        assert!(store.value("players.server.abc.details.active.url").is_none());
        assert!(store.value("players.server.abc.details.active.time").is_none());
        assert!(store.value("players.server.abc.details.video.time").is_none());
        assert!(store.value("players.server.abc.details.video.key").is_none());
        assert_eq!(
            store.value("players.server.abc.details.video.state"),
            Some(json!("stopped"))
        );
    }

    #[tokio::test]
    async fn playback_capability_gates_controls_without_controllable_list() {
        let (player, device, store) = setup(None);
        observe_capabilities(&player).await;
        device.push(json!({
            "MediaContainer": {
                "Timeline": [{
                    "type": "video",
                    "state": "playing",
                    "time": 5000,
                    "duration": 100000
                }]
            }
        }));

        player.run_cycle().await;

        assert_eq!(
            store.value("players.server.abc._controls.playback.seek"),
            Some(json!(5.0))
        );
        assert_eq!(
            store.value("players.server.abc._controls.playback.playing"),
            Some(json!(true))
        );
        assert_eq!(player.record().await.controls.seek, Some(5.0));
    }

    #[tokio::test]
    async fn device_echo_overrides_commanded_volume() {
        let (player, device, store) = setup(None);
        observe_capabilities(&player).await;
        device.push(video_timeline());
        player.run_cycle().await;

        player
            .action(ActionMode::Playback, "volume", Some(json!(40)), None)
            .await
            .unwrap();
        assert_eq!(player.record().await.controls.volume, Some(40));

        device.push(video_timeline());
        player.run_cycle().await;

        assert_eq!(
            store.value("players.server.abc._controls.playback.volume"),
            Some(json!(80))
        );
        assert_eq!(player.record().await.controls.volume, Some(80));
    }

    #[tokio::test]
    async fn busy_cycle_keeps_the_command_id() {
        let (player, device, _store) = setup(None);
        observe_capabilities(&player).await;
        assert_eq!(player.schedule.lock().unwrap().begin(), Begin::Started);

        assert_eq!(player.run_cycle().await, Some(Duration::from_millis(1_000)));
        assert_eq!(player.record().await.command_id(), 0);

        player.schedule.lock().unwrap().reset();
        device.push(video_timeline());
        player.run_cycle().await;
        assert_eq!(player.record().await.command_id(), 1);
    }

    #[tokio::test]
    async fn malformed_payload_does_not_count_as_failure() {
        let (player, device, _store) = setup(None);
        observe_capabilities(&player).await;
        device.push(json!("garbage"));

        assert!(player.run_cycle().await.is_some());
        assert_eq!(player.schedule.lock().unwrap().failures(), 0);
    }

    #[tokio::test]
    async fn new_url_refreshes_metadata_and_selector_output() {
        let sessions = json!({
            "MediaContainer": {
                "Metadata": [{
                    "type": "movie",
                    "title": "Heat",
                    "year": 1995,
                    "Player": {"machineIdentifier": "abc", "title": "TV"}
                }]
            }
        });
        let (player, device, store) = setup(Some(sessions));
        observe_capabilities(&player).await;
        device.push(video_timeline());

        player.run_cycle().await;

        assert_eq!(
            store.value("players.server.abc.playing.metadata.title"),
            Some(json!("Heat"))
        );
        assert_eq!(
            store.value("players.server.abc.playing.item.movie.year"),
            Some(json!("1995"))
        );
        assert!(player.record().await.metadata.is_some());
    }

    #[tokio::test]
    async fn action_confirms_control_node() {
        let (player, device, store) = setup(None);
        observe_capabilities(&player).await;
        device.push(video_timeline());
        player.run_cycle().await;

        player
            .action(ActionMode::Playback, "seek", Some(json!(50)), None)
            .await
            .unwrap();

        let commands = device.commands.lock().unwrap().clone();
        assert_eq!(commands[0].action, "seekTo");
        assert_eq!(commands[0].params, vec![("offset".into(), "50000".into())]);
        assert_eq!(
            store.value("players.server.abc._controls.playback.seek"),
            Some(json!(50))
        );
    }

    #[tokio::test]
    async fn players_without_timeline_are_not_polled() {
        let (player, device, _store) = setup(None);
        device.push(video_timeline());
        assert_eq!(player.run_cycle().await, None);
        assert_eq!(device.timelines.lock().unwrap().len(), 1);
    }
}
