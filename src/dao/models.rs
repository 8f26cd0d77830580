use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::{NodeDescriptor, Role, ValueType};

/// Object definition persisted next to a state value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectEntity {
    /// Human readable description of the node.
    pub description: String,
    /// Role advertised for the node.
    pub role: Role,
    /// Declared value type.
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Whether the node accepts commands.
    pub writable: bool,
}

impl From<&NodeDescriptor> for ObjectEntity {
    fn from(node: &NodeDescriptor) -> Self {
        Self {
            description: node.description.clone(),
            role: node.role,
            value_type: node.value_type,
            writable: node.writable,
        }
    }
}

/// State value as last persisted by a backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateEntity {
    /// Persisted value, `None` for structural objects.
    pub value: Option<Value>,
    /// Whether the value was acknowledged (set from device data rather than a command).
    pub ack: bool,
    /// Last write time in milliseconds since the Unix epoch.
    pub ts: i64,
    /// Object definition.
    pub common: ObjectEntity,
}
