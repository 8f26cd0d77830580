//! Error types raised by players and their device transport.

use reqwest::StatusCode;
use thiserror::Error;

use super::actions::ActionMode;

/// Failures talking to a player device, classified for the retry policy.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device did not answer within the request timeout.
    #[error("device `{url}` timed out")]
    Timeout { url: String },
    /// The device could not be reached at all.
    #[error("device `{url}` is unreachable")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The device answered with a non-success status.
    #[error("device `{url}` answered with status {status}")]
    Status { url: String, status: StatusCode },
    /// The device answered with a payload that cannot be interpreted.
    #[error("malformed payload from `{url}`: {reason}")]
    Malformed { url: String, reason: String },
}

impl DeviceError {
    /// Classify a transport error raised while calling `url`.
    pub fn from_request(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_owned(),
            }
        } else if let Some(status) = source.status() {
            Self::Status {
                url: url.to_owned(),
                status,
            }
        } else {
            Self::Unreachable {
                url: url.to_owned(),
                source,
            }
        }
    }

    /// Whether the failure counts toward the disconnect threshold.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Malformed { .. })
    }
}

/// Failures surfaced by player operations.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The player cannot be built without a controller and device identifier.
    #[error("player identity is missing `{field}`")]
    MissingIdentity { field: &'static str },
    /// No player is registered under the identity.
    #[error("unknown player `{device_id}`")]
    UnknownPlayer { device_id: String },
    /// The player has no known network address.
    #[error("player `{device_id}` has no known address")]
    NoAddress { device_id: String },
    /// The action table has no entry for the pair.
    #[error("unknown {mode} action `{action}`")]
    UnknownAction { mode: ActionMode, action: String },
    /// The action needs a value and none was given.
    #[error("action `{action}` requires a value")]
    MissingValue { action: String },
    /// The value cannot be used for the action.
    #[error("invalid value for action `{action}`")]
    InvalidValue { action: String },
    /// A relative seek was requested while the active duration is unknown.
    #[error("duration of the active stream is unknown")]
    MissingDuration,
    /// The device rejected or never received the command.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_payloads_are_not_transient() {
        let malformed = DeviceError::Malformed {
            url: "http://device".into(),
            reason: "not an object".into(),
        };
        let timeout = DeviceError::Timeout {
            url: "http://device".into(),
        };
        assert!(!malformed.is_transient());
        assert!(timeout.is_transient());
    }
}
