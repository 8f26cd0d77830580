//! In-memory record of one known player.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{details::DetailsSnapshot, error::PlayerError};

/// Root of every player subtree in the state store.
pub const PLAYERS_ROOT: &str = "players";

/// Identity of a player: the controller that reported it and its device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerIdentity {
    /// Controller (media server) the device belongs to.
    pub controller: String,
    /// Machine identifier of the device.
    pub device_id: String,
    /// Human readable name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PlayerIdentity {
    /// Build an identity, rejecting blank identifiers.
    pub fn new(
        controller: impl Into<String>,
        device_id: impl Into<String>,
        name: Option<String>,
    ) -> Result<Self, PlayerError> {
        let controller = controller.into();
        let device_id = device_id.into();
        if controller.trim().is_empty() {
            return Err(PlayerError::MissingIdentity {
                field: "controller",
            });
        }
        if device_id.trim().is_empty() {
            return Err(PlayerError::MissingIdentity { field: "device_id" });
        }
        Ok(Self {
            controller,
            device_id,
            name: name.filter(|name| !name.is_empty()),
        })
    }

    /// Repository key of the player.
    pub fn key(&self) -> (String, String) {
        (self.controller.clone(), self.device_id.clone())
    }

    /// State path prefix of the player subtree, `players.<controller>.<device>`.
    pub fn state_prefix(&self) -> String {
        format!(
            "{PLAYERS_ROOT}.{}.{}",
            sanitize_segment(&self.controller),
            sanitize_segment(&self.device_id)
        )
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.device_id),
            None => f.write_str(&self.device_id),
        }
    }
}

/// Replace characters that would split a path segment.
pub fn sanitize_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '.' || c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Where the device can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Host name or IP address.
    pub address: String,
    /// Control port.
    pub port: u16,
    /// `http` or `https`.
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "http".into()
}

impl NetworkInfo {
    /// Base URL of the device control endpoint.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.address, self.port)
    }
}

/// Control values last confirmed by the device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlState {
    /// Volume, 0 to 100.
    pub volume: Option<i64>,
    /// Position as a percentage of the duration.
    pub seek: Option<f64>,
    /// Whether the active stream plays.
    pub playing: Option<bool>,
    /// Shuffle flag.
    pub shuffle: Option<bool>,
    /// Repeat mode.
    pub repeat: Option<i64>,
    /// Elapsed time in milliseconds.
    pub view_offset: Option<i64>,
}

/// Everything known about one player.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    /// Who the player is.
    pub identity: PlayerIdentity,
    /// Where it answers; polling needs it.
    pub network: Option<NetworkInfo>,
    /// Protocol capabilities (`timeline`, `playback`, ...).
    pub capabilities: Vec<String>,
    /// Whether the last poll succeeded.
    pub connected: bool,
    /// Whether the device accepts playback commands.
    pub controllable: bool,
    /// Playback affordances the device currently advertises.
    pub affordances: Vec<String>,
    command_id: u64,
    /// Control values last confirmed.
    pub controls: ControlState,
    /// Last timeline snapshot.
    pub details: Option<DetailsSnapshot>,
    /// Session metadata of the active stream.
    pub metadata: Option<Value>,
}

impl PlayerRecord {
    /// Fresh record for `identity`.
    pub fn new(identity: PlayerIdentity, network: Option<NetworkInfo>) -> Self {
        Self {
            identity,
            network,
            capabilities: Vec::new(),
            connected: false,
            controllable: false,
            affordances: Vec::new(),
            command_id: 0,
            controls: ControlState::default(),
            details: None,
            metadata: None,
        }
    }

    /// Next command identifier. Strictly increasing for the lifetime of the record.
    pub fn next_command_id(&mut self) -> u64 {
        self.command_id += 1;
        self.command_id
    }

    /// Last issued command identifier.
    pub fn command_id(&self) -> u64 {
        self.command_id
    }

    /// Replace the capability set from a comma separated list.
    pub fn set_capabilities(&mut self, raw: &str) {
        self.capabilities = split_list(raw);
    }

    /// Whether the device advertises `capability`.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities
            .iter()
            .any(|known| known.eq_ignore_ascii_case(capability))
    }

    /// Whether the device can be polled for its timeline.
    pub fn supports_timeline(&self) -> bool {
        self.has_capability("timeline")
    }

    /// Whether the device currently advertises `affordance`.
    pub fn advertises(&self, affordance: &str) -> bool {
        self.affordances
            .iter()
            .any(|known| known.eq_ignore_ascii_case(affordance))
    }

    /// Duration of the active stream, in milliseconds.
    pub fn active_duration(&self) -> Option<i64> {
        self.details
            .as_ref()
            .and_then(|details| details.active.duration)
    }
}

/// Split a comma separated list, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_device_id_is_rejected() {
        let err = PlayerIdentity::new("server", "  ", None).unwrap_err();
        assert!(matches!(
            err,
            PlayerError::MissingIdentity { field: "device_id" }
        ));
    }

    #[test]
    fn prefix_keeps_segments_intact() {
        let identity = PlayerIdentity::new("server", "abc.def 1", None).unwrap();
        assert_eq!(identity.state_prefix(), "players.server.abc_def_1");
    }

    #[test]
    fn same_device_on_two_controllers_gets_two_subtrees() {
        let first = PlayerIdentity::new("10.0.0.2:32400", "abc", None).unwrap();
        let second = PlayerIdentity::new("srv-b", "abc", None).unwrap();
        assert_eq!(first.state_prefix(), "players.10_0_0_2:32400.abc");
        assert_ne!(first.state_prefix(), second.state_prefix());
    }

    #[test]
    fn command_ids_increase() {
        let identity = PlayerIdentity::new("server", "abc", None).unwrap();
        let mut record = PlayerRecord::new(identity, None);
        assert_eq!(record.next_command_id(), 1);
        assert_eq!(record.next_command_id(), 2);
        assert_eq!(record.command_id(), 2);
    }

    #[test]
    fn capabilities_are_case_insensitive() {
        let identity = PlayerIdentity::new("server", "abc", None).unwrap();
        let mut record = PlayerRecord::new(identity, None);
        record.set_capabilities("timeline, Playback,,navigation");
        assert!(record.supports_timeline());
        assert!(record.has_capability("playback"));
        assert_eq!(record.capabilities.len(), 3);
    }
}
