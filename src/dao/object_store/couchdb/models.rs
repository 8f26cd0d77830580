use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{ObjectEntity, StateEntity};

/// Id prefix of every state document.
pub const STATE_PREFIX: &str = "state::";
/// Upper bound suffix for `_all_docs` key ranges.
pub const END_SUFFIX: &str = "\u{ffff}";

/// `_all_docs` answer.
#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

/// One `_all_docs` row, with the document when `include_docs` was set.
#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// One persisted state node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchStateDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    pub ack: bool,
    pub ts: i64,
    pub common: ObjectEntity,
}

impl CouchStateDocument {
    /// Document for `path` without a value.
    pub fn new(path: &str, common: ObjectEntity, ts: i64) -> Self {
        Self {
            id: state_doc_id(path),
            rev: None,
            value: None,
            ack: true,
            ts,
            common,
        }
    }

    /// State path encoded in the document identifier.
    pub fn path(&self) -> &str {
        self.id.strip_prefix(STATE_PREFIX).unwrap_or(&self.id)
    }
}

impl From<CouchStateDocument> for StateEntity {
    fn from(doc: CouchStateDocument) -> Self {
        Self {
            value: doc.value,
            ack: doc.ack,
            ts: doc.ts,
            common: doc.common,
        }
    }
}

/// Document id of the state at `path`.
pub fn state_doc_id(path: &str) -> String {
    format!("{STATE_PREFIX}{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Role, ValueType};

    #[test]
    fn document_id_round_trips_path() {
        let common = ObjectEntity {
            description: "Title".into(),
            role: Role::Text,
            value_type: ValueType::String,
            writable: false,
        };
        let doc = CouchStateDocument::new("players.abc.player.name", common, 0);
        assert_eq!(doc.id, "state::players.abc.player.name");
        assert_eq!(doc.path(), "players.abc.player.name");
    }
}
