//! DTOs for the player control routes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::{dto::validation::validate_control_path, player::actions::ActionMode};

/// Command sent to a player.
#[derive(Debug, Deserialize, Validate)]
pub struct ActionRequest {
    /// Controller owning the player; the first player with the device id is used when absent.
    #[validate(length(min = 1))]
    pub controller: Option<String>,
    /// Command family.
    pub mode: ActionMode,
    /// Action name within the family.
    #[validate(length(min = 1, max = 64))]
    pub action: String,
    /// Value for parameter actions (volume, seek, shuffle...).
    #[serde(default)]
    pub value: Option<Value>,
    /// Control node to confirm, relative to the player subtree.
    #[validate(custom(function = "validate_control_path"))]
    pub control_path: Option<String>,
}

/// Query string selecting a player by controller.
#[derive(Debug, Default, Deserialize)]
pub struct PlayerQuery {
    /// Controller owning the player.
    pub controller: Option<String>,
}

/// Acknowledgement of a player operation.
#[derive(Debug, Serialize)]
pub struct PlayerActionResponse {
    /// Device the command was sent to.
    pub device_id: String,
    /// Human readable outcome.
    pub message: String,
}

/// Result of a player deletion.
#[derive(Debug, Serialize)]
pub struct PlayerDeletedResponse {
    /// Device that was forgotten.
    pub device_id: String,
    /// State values erased with the player subtree.
    pub erased: usize,
    /// Erasures that failed to persist.
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn action_request_is_validated() {
        let request: ActionRequest = serde_json::from_value(json!({
            "mode": "playback",
            "action": "volume",
            "value": 40
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.mode, ActionMode::Playback);

        let empty: ActionRequest = serde_json::from_value(json!({
            "mode": "navigation",
            "action": ""
        }))
        .unwrap();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn unknown_modes_are_rejected() {
        let parsed = serde_json::from_value::<ActionRequest>(json!({
            "mode": "teleport",
            "action": "up"
        }));
        assert!(parsed.is_err());
    }
}
