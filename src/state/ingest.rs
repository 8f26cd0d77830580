//! Entry points feeding notifications and client enumerations into the state store.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    clock::now_ms,
    error::ServiceError,
    flatten::state_path,
    media_server::client_entries,
    player::{
        Observation,
        record::{NetworkInfo, PlayerIdentity},
    },
    store::SetOptions,
};

use super::{AppState, notifications::NotificationRecord};

const EVENTS_KEY: &str = "events";

/// Counters of one client enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientIngest {
    /// Entries describing a usable player.
    pub seen: usize,
    /// Players registered by this enumeration.
    pub created: usize,
    /// Entries without a device identifier.
    pub skipped: usize,
}

impl AppState {
    /// Controller identifier used when a payload does not name its server.
    pub fn default_controller(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }

    /// Ingest one webhook notification.
    ///
    /// Returns `false` when the notification duplicates a recent one and was dropped.
    pub async fn set_notification_data(&self, raw: Value) -> Result<bool, ServiceError> {
        if !raw.is_object() {
            warn!("rejecting notification that is not a JSON object");
            return Err(ServiceError::InvalidInput(
                "notification must be a JSON object".into(),
            ));
        }

        let record = NotificationRecord::from_payload(&raw, now_ms(), self.flattener.links());
        if !self.notifications.push(record.clone()).await {
            debug!(source = %record.source, media = %record.media, "dropping duplicate notification");
            return Ok(false);
        }

        let report = self
            .flattener
            .flatten(&self.store, EVENTS_KEY, &raw, "")
            .await;

        self.write_event("events.message", Value::String(record.message.clone()))
            .await;
        self.write_event("events.caption", Value::String(record.caption.clone()))
            .await;
        if let Some(thumbnail) = &record.thumbnail {
            self.write_event("events.thumbnail", Value::String(thumbnail.clone()))
                .await;
        }
        match serde_json::to_string(&self.notifications.snapshot().await) {
            Ok(history) => self.write_event("events.history", Value::String(history)).await,
            Err(err) => warn!(error = %err, "failed to serialize notification history"),
        }

        if let Some(device_id) = raw.pointer("/Player/uuid").and_then(Value::as_str) {
            let controller = raw
                .pointer("/Server/uuid")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| self.default_controller());
            let name = raw
                .pointer("/Player/title")
                .and_then(Value::as_str)
                .map(str::to_owned);
            match PlayerIdentity::new(controller, device_id, name.clone()) {
                Ok(identity) => {
                    let player = self.create_player_if_not_exist(identity, None);
                    player
                        .observe(Observation {
                            name,
                            ..Observation::default()
                        })
                        .await;
                }
                Err(err) => warn!(error = %err, "notification names an unusable player"),
            }
        }

        info!(
            event = %record.event,
            account = %record.account,
            written = report.written,
            "ingested notification"
        );
        Ok(true)
    }

    async fn write_event(&self, key: &str, value: Value) {
        let node = self.flattener.registry().resolve(key);
        self.store
            .set(&state_path("", key), &node, &value, SetOptions::default())
            .await;
    }

    /// Ingest a client enumeration (`/clients` answer) and refresh every listed player.
    pub async fn set_client_data(&self, raw: Value) -> Result<ClientIngest, ServiceError> {
        if !raw.is_object() {
            warn!("rejecting client data that is not a JSON object");
            return Err(ServiceError::InvalidInput(
                "client data must be a JSON object".into(),
            ));
        }

        let controller = raw
            .pointer("/MediaContainer/machineIdentifier")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| self.default_controller());
        let mut ingest = ClientIngest::default();

        for entry in client_entries(&raw) {
            let text = |field: &str| {
                entry
                    .get(field)
                    .and_then(Value::as_str)
                    .filter(|value| !value.is_empty())
                    .map(str::to_owned)
            };
            let Some(device_id) = text("machineIdentifier") else {
                ingest.skipped += 1;
                continue;
            };
            let identity = match PlayerIdentity::new(controller.clone(), device_id, text("name")) {
                Ok(identity) => identity,
                Err(err) => {
                    warn!(error = %err, "skipping client entry");
                    ingest.skipped += 1;
                    continue;
                }
            };

            let port = entry.get("port").and_then(|port| match port {
                Value::Number(number) => number.as_u64().and_then(|port| u16::try_from(port).ok()),
                Value::String(text) => text.parse().ok(),
                _ => None,
            });
            let network = text("address")
                .or_else(|| text("host"))
                .zip(port)
                .map(|(address, port)| NetworkInfo {
                    address,
                    port,
                    protocol: text("protocol")
                        .filter(|protocol| protocol.starts_with("http"))
                        .unwrap_or_else(|| "http".into()),
                });

            let existed = self.exist_player(&identity);
            let player = self.create_player_if_not_exist(identity, network.clone());
            player
                .observe(Observation {
                    name: text("name"),
                    network,
                    capabilities: text("protocolCapabilities"),
                    product: text("product"),
                    platform: text("platform").or_else(|| text("deviceClass")),
                })
                .await;

            ingest.seen += 1;
            if !existed {
                ingest.created += 1;
            }
        }

        debug!(
            seen = ingest.seen,
            created = ingest.created,
            skipped = ingest.skipped,
            "ingested client data"
        );
        Ok(ingest)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::test_support::state;
    use super::*;

    fn notification() -> Value {
        json!({
            "event": "media.play",
            "user": true,
            "owner": true,
            "Account": {"title": "alice"},
            "Server": {"title": "Home", "uuid": "srv"},
            "Player": {"title": "Living Room", "uuid": "abc", "local": true},
            "Metadata": {
                "type": "movie",
                "title": "Heat",
                "duration": 10_200_000,
                "addedAt": 1_700_000_000,
                "Media": [{"Part": [{"Stream": [{"codec": "h264"}, {"codec": "aac"}]}]}]
            }
        })
    }

    #[tokio::test]
    async fn notification_is_flattened_and_recorded() {
        let (state, _) = state();
        assert!(state.set_notification_data(notification()).await.unwrap());

        let store = state.store();
        assert_eq!(store.value("events.event"), Some(json!("media.play")));
        assert_eq!(store.value("events.Account.title"), Some(json!("alice")));
        assert_eq!(store.value("events.Metadata.duration"), Some(json!(170)));
        assert_eq!(
            store.value("events.Metadata.Media.000.Part.000.Stream.001.codec"),
            Some(json!("aac"))
        );
        assert_eq!(
            store.value("events.message"),
            Some(json!("alice started playing Heat on Living Room"))
        );
        assert!(store.value("events.history").is_some());

        let identity = PlayerIdentity::new("srv", "abc", None).unwrap();
        assert!(state.exist_player(&identity));
        state.shutdown();
    }

    #[tokio::test]
    async fn duplicate_notifications_are_dropped() {
        let (state, _) = state();
        assert!(state.set_notification_data(notification()).await.unwrap());
        assert!(!state.set_notification_data(notification()).await.unwrap());
        assert_eq!(state.notifications().len().await, 1);
        state.shutdown();
    }

    #[tokio::test]
    async fn non_object_notifications_are_rejected() {
        let (state, _) = state();
        assert!(matches!(
            state.set_notification_data(json!([1, 2])).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn client_data_registers_players() {
        let (state, _) = state();
        let clients = json!({
            "MediaContainer": {
                "machineIdentifier": "srv",
                "Server": [
                    {
                        "name": "TV",
                        "address": "10.0.0.9",
                        "port": "32500",
                        "machineIdentifier": "abc",
                        "product": "Plex for Android",
                        "protocolCapabilities": "timeline,playback,navigation"
                    },
                    {"name": "Ghost"}
                ]
            }
        });

        let ingest = state.set_client_data(clients).await.unwrap();
        assert_eq!(ingest.seen, 1);
        assert_eq!(ingest.created, 1);
        assert_eq!(ingest.skipped, 1);

        let player = state.players().find_device("abc").unwrap();
        let record = player.record().await;
        assert!(record.controllable);
        assert_eq!(record.network.unwrap().port, 32500);
        assert_eq!(
            state
                .store()
                .value("players.srv.abc.player.protocolCapabilities"),
            Some(json!("timeline,playback,navigation"))
        );
        state.shutdown();
    }
}
