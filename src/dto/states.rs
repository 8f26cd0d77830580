//! DTOs for the state dump route.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{clock::format_ms, store::StateEntry};

/// Query string of `GET /states`.
#[derive(Debug, Default, Deserialize)]
pub struct StatesQuery {
    /// Only dump states at or below this path.
    #[serde(default)]
    pub prefix: String,
}

/// One cached state.
#[derive(Debug, Serialize)]
pub struct StateView {
    /// Current value.
    pub value: Value,
    /// Epoch milliseconds of the last write.
    pub ts: i64,
    /// RFC 3339 rendering of `ts`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<StateEntry> for StateView {
    fn from(entry: StateEntry) -> Self {
        Self {
            updated_at: format_ms(entry.timestamp),
            value: entry.value,
            ts: entry.timestamp,
        }
    }
}

/// Cached states keyed by path, sorted.
#[derive(Debug, Serialize)]
pub struct StatesResponse {
    /// Prefix the dump was restricted to.
    pub prefix: String,
    /// States at or below the prefix.
    pub states: IndexMap<String, StateView>,
}
