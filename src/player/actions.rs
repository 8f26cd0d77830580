//! Table of commands a player accepts and their translation to device requests.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::ValueType;

use super::error::PlayerError;

/// Command family, also the first path segment of the device endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    /// Transport and mixer commands.
    Playback,
    /// Remote-control style navigation.
    Navigation,
}

impl ActionMode {
    /// Wire name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionMode::Playback => "playback",
            ActionMode::Navigation => "navigation",
        }
    }
}

impl fmt::Display for ActionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric conversion applied to the value before it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericConversion {
    /// Value is a percentage of the active duration; sent as an absolute offset in ms.
    PercentOfDuration,
}

/// How one action maps onto a device request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    /// Command family.
    pub mode: ActionMode,
    /// Lowercase action name used as table key and control node name.
    pub name: &'static str,
    /// Device action; the action name is used when absent.
    pub wire: Option<&'static str>,
    /// Query attribute carrying the value.
    pub attribute: Option<&'static str>,
    /// Keywords substituted for `true` / `false`.
    pub keywords: Option<(&'static str, &'static str)>,
    /// Conversion of numeric values.
    pub numeric: Option<NumericConversion>,
}

impl ActionDescriptor {
    const fn button(mode: ActionMode, name: &'static str, wire: Option<&'static str>) -> Self {
        Self {
            mode,
            name,
            wire,
            attribute: None,
            keywords: None,
            numeric: None,
        }
    }

    const fn parameter(name: &'static str, attribute: &'static str) -> Self {
        Self {
            mode: ActionMode::Playback,
            name,
            wire: Some("setParameters"),
            attribute: Some(attribute),
            keywords: None,
            numeric: None,
        }
    }

    /// Control node confirmed once the device accepts the action.
    pub fn control_path(&self) -> String {
        format!("_controls.{}.{}", self.mode, self.name)
    }

    /// Build the device request for `value`.
    ///
    /// `duration` is the active stream duration, needed by percent conversions.
    pub fn command(
        &self,
        value: Option<&Value>,
        duration: Option<i64>,
    ) -> Result<Command, PlayerError> {
        let mut action = self.wire.unwrap_or(self.name).to_owned();
        let mut params = Vec::new();

        let Some(attribute) = self.attribute else {
            if let (Some((on, off)), Some(value)) = (self.keywords, value) {
                action = (if as_flag(value) { on } else { off }).to_owned();
            }
            return Ok(Command {
                mode: self.mode,
                action,
                params,
            });
        };

        let value = value.filter(|value| !value.is_null()).ok_or_else(|| {
            PlayerError::MissingValue {
                action: self.name.to_owned(),
            }
        })?;
        let text = match (self.keywords, self.numeric) {
            (Some((on, off)), _) => (if as_flag(value) { on } else { off }).to_owned(),
            (None, Some(NumericConversion::PercentOfDuration)) => {
                let percent = as_number(value).ok_or_else(|| PlayerError::InvalidValue {
                    action: self.name.to_owned(),
                })?;
                let duration = duration
                    .filter(|duration| *duration > 0)
                    .ok_or(PlayerError::MissingDuration)?;
                let offset = (percent.clamp(0.0, 100.0) / 100.0 * duration as f64).round() as i64;
                offset.to_string()
            }
            (None, None) => match value {
                Value::String(text) => text.clone(),
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => u8::from(*flag).to_string(),
                _ => {
                    return Err(PlayerError::InvalidValue {
                        action: self.name.to_owned(),
                    });
                }
            },
        };
        params.push((attribute.to_owned(), text));

        Ok(Command {
            mode: self.mode,
            action,
            params,
        })
    }
}

fn as_flag(value: &Value) -> bool {
    ValueType::Boolean.coerce(value) == Value::Bool(true)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Device request derived from an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub mode: ActionMode,
    /// Device action, e.g. `seekTo`.
    pub action: String,
    /// Query parameters.
    pub params: Vec<(String, String)>,
}

const PLAYBACK_ACTIONS: &[ActionDescriptor] = &[
    ActionDescriptor::button(ActionMode::Playback, "play", None),
    ActionDescriptor::button(ActionMode::Playback, "pause", None),
    ActionDescriptor::button(ActionMode::Playback, "stop", None),
    ActionDescriptor::button(ActionMode::Playback, "skipnext", Some("skipNext")),
    ActionDescriptor::button(ActionMode::Playback, "skipprevious", Some("skipPrevious")),
    ActionDescriptor::button(ActionMode::Playback, "stepforward", Some("stepForward")),
    ActionDescriptor::button(ActionMode::Playback, "stepback", Some("stepBack")),
    ActionDescriptor {
        keywords: Some(("play", "pause")),
        ..ActionDescriptor::button(ActionMode::Playback, "playing", None)
    },
    ActionDescriptor {
        attribute: Some("offset"),
        ..ActionDescriptor::button(ActionMode::Playback, "seekto", Some("seekTo"))
    },
    ActionDescriptor {
        attribute: Some("offset"),
        numeric: Some(NumericConversion::PercentOfDuration),
        ..ActionDescriptor::button(ActionMode::Playback, "seek", Some("seekTo"))
    },
    ActionDescriptor::parameter("volume", "volume"),
    ActionDescriptor {
        keywords: Some(("1", "0")),
        ..ActionDescriptor::parameter("shuffle", "shuffle")
    },
    ActionDescriptor::parameter("repeat", "repeat"),
];

const NAVIGATION_ACTIONS: &[ActionDescriptor] = &[
    ActionDescriptor::button(ActionMode::Navigation, "moveup", Some("moveUp")),
    ActionDescriptor::button(ActionMode::Navigation, "movedown", Some("moveDown")),
    ActionDescriptor::button(ActionMode::Navigation, "moveleft", Some("moveLeft")),
    ActionDescriptor::button(ActionMode::Navigation, "moveright", Some("moveRight")),
    ActionDescriptor::button(ActionMode::Navigation, "select", None),
    ActionDescriptor::button(ActionMode::Navigation, "back", None),
    ActionDescriptor::button(ActionMode::Navigation, "home", None),
];

/// Lookup of action descriptors by `(mode, action)`.
#[derive(Debug, Clone)]
pub struct ActionTable {
    entries: HashMap<(ActionMode, String), ActionDescriptor>,
}

impl Default for ActionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ActionTable {
    /// Table with every built-in action.
    pub fn builtin() -> Self {
        let entries = PLAYBACK_ACTIONS
            .iter()
            .chain(NAVIGATION_ACTIONS)
            .map(|descriptor| ((descriptor.mode, descriptor.name.to_owned()), descriptor.clone()))
            .collect();
        Self { entries }
    }

    /// Descriptor for `action` in `mode`, case-insensitive.
    pub fn resolve(&self, mode: ActionMode, action: &str) -> Result<&ActionDescriptor, PlayerError> {
        self.entries
            .get(&(mode, action.to_ascii_lowercase()))
            .ok_or_else(|| PlayerError::UnknownAction {
                mode,
                action: action.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn resolve(mode: ActionMode, action: &str) -> ActionDescriptor {
        ActionTable::builtin().resolve(mode, action).unwrap().clone()
    }

    #[test]
    fn wire_key_falls_back_to_action_name() {
        let command = resolve(ActionMode::Playback, "stop").command(None, None).unwrap();
        assert_eq!(command.action, "stop");
        let command = resolve(ActionMode::Playback, "skipNext")
            .command(None, None)
            .unwrap();
        assert_eq!(command.action, "skipNext");
    }

    #[test]
    fn playing_flag_becomes_keyword_action() {
        let playing = resolve(ActionMode::Playback, "playing");
        assert_eq!(playing.command(Some(&json!(true)), None).unwrap().action, "play");
        assert_eq!(playing.command(Some(&json!("false")), None).unwrap().action, "pause");
        assert_eq!(playing.control_path(), "_controls.playback.playing");
    }

    #[test]
    fn seek_percent_becomes_offset() {
        let command = resolve(ActionMode::Playback, "seek")
            .command(Some(&json!(25)), Some(200_000))
            .unwrap();
        assert_eq!(command.action, "seekTo");
        assert_eq!(command.params, vec![("offset".into(), "50000".into())]);
    }

    #[test]
    fn seek_without_duration_fails() {
        let err = resolve(ActionMode::Playback, "seek")
            .command(Some(&json!(25)), None)
            .unwrap_err();
        assert!(matches!(err, PlayerError::MissingDuration));
    }

    #[test]
    fn shuffle_uses_numeric_keywords() {
        let command = resolve(ActionMode::Playback, "shuffle")
            .command(Some(&json!(true)), None)
            .unwrap();
        assert_eq!(command.action, "setParameters");
        assert_eq!(command.params, vec![("shuffle".into(), "1".into())]);
    }

    #[test]
    fn parameters_need_a_value() {
        let err = resolve(ActionMode::Playback, "volume")
            .command(None, None)
            .unwrap_err();
        assert!(matches!(err, PlayerError::MissingValue { .. }));
    }

    #[test]
    fn unknown_actions_are_rejected() {
        let err = ActionTable::builtin()
            .resolve(ActionMode::Navigation, "seek")
            .unwrap_err();
        assert!(matches!(err, PlayerError::UnknownAction { .. }));
    }
}
