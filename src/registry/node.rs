use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Role advertised for a state node to the persisted object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Top-level grouping node for a player or server.
    Device,
    /// Structural grouping node without a value.
    Channel,
    /// Generic state.
    State,
    /// Free text.
    Text,
    /// Numeric value.
    Value,
    /// Read-only boolean flag.
    Indicator,
    /// Momentary trigger.
    Button,
    /// Writable numeric level (volume, seek percent).
    Level,
    /// Date or timestamp.
    Date,
    /// Absolute URL.
    Url,
    /// Serialized JSON document.
    Json,
}

impl Role {
    /// Grouping roles never carry a value.
    pub fn is_grouping(self) -> bool {
        matches!(self, Role::Device | Role::Channel)
    }

    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Device => "device",
            Role::Channel => "channel",
            Role::State => "state",
            Role::Text => "text",
            Role::Value => "value",
            Role::Indicator => "indicator",
            Role::Button => "button",
            Role::Level => "level",
            Role::Date => "date",
            Role::Url => "url",
            Role::Json => "json",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared value type of a state node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// UTF-8 string.
    String,
    /// Integer or floating point number.
    Number,
    /// Boolean flag.
    Boolean,
    /// Arbitrary JSON value.
    Json,
}

impl ValueType {
    /// Zero value used when a state is emptied.
    pub fn zero(self) -> Value {
        match self {
            ValueType::String => Value::String(String::new()),
            ValueType::Number => Value::from(0),
            ValueType::Boolean => Value::Bool(false),
            ValueType::Json => Value::Null,
        }
    }

    /// Whether `value` already has this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ValueType::String => value.is_string(),
            ValueType::Number => value.is_number(),
            ValueType::Boolean => value.is_boolean(),
            ValueType::Json => true,
        }
    }

    /// Coerce any JSON value into this type.
    ///
    /// Values that cannot be represented collapse to [`ValueType::zero`], so the result always
    /// satisfies [`ValueType::accepts`].
    pub fn coerce(self, value: &Value) -> Value {
        match self {
            ValueType::String => match value {
                Value::String(text) => Value::String(text.clone()),
                Value::Null => Value::String(String::new()),
                Value::Bool(flag) => Value::String(flag.to_string()),
                Value::Number(number) => Value::String(number.to_string()),
                other => Value::String(other.to_string()),
            },
            ValueType::Number => match value {
                Value::Number(number) => Value::Number(number.clone()),
                Value::Bool(flag) => Value::from(u8::from(*flag)),
                Value::String(text) => parse_number(text.trim()).unwrap_or_else(|| self.zero()),
                _ => self.zero(),
            },
            ValueType::Boolean => match value {
                Value::Bool(flag) => Value::Bool(*flag),
                Value::Number(number) => Value::Bool(number.as_f64().is_some_and(|n| n != 0.0)),
                Value::String(text) => Value::Bool(matches!(
                    text.trim().to_ascii_lowercase().as_str(),
                    "true" | "1" | "on" | "yes"
                )),
                _ => Value::Bool(false),
            },
            ValueType::Json => value.clone(),
        }
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(integer) = text.parse::<i64>() {
        return Some(Value::from(integer));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Declarative transform applied around persistence of a scalar node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Epoch ↔ date, publishes `{path}Date`.
    DateTimestamp,
    /// Elapsed milliseconds rendered as `H:MM:SS`, publishes `{path}human` and `{path}Seconds`.
    SecondsReadable,
    /// Milliseconds to minutes once above one minute, publishes `{path}Seconds`.
    MsMin,
    /// Absolute link next to the relative value, publishes `{path}Link`.
    CreateLink,
    /// Replace the relative value by its absolute link.
    CreateLinkOnly,
}

/// Metadata declared for a dotted state path.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    /// Human readable description.
    pub description: String,
    /// Role advertised to the object store.
    pub role: Role,
    /// Declared value type.
    pub value_type: ValueType,
    /// Conversion applied before persistence.
    pub conversion: Option<Conversion>,
    /// Whether the node accepts commands.
    pub writable: bool,
    /// Set on the generic sentinel returned for unknown paths.
    pub not_exist: bool,
}

impl NodeDescriptor {
    /// Build a read-only descriptor.
    pub fn new(description: impl Into<String>, role: Role, value_type: ValueType) -> Self {
        Self {
            description: description.into(),
            role,
            value_type,
            conversion: None,
            writable: false,
            not_exist: false,
        }
    }

    /// Structural channel node.
    pub fn channel(description: impl Into<String>) -> Self {
        Self::new(description, Role::Channel, ValueType::Json)
    }

    /// Sentinel returned when nothing in the catalog matches.
    pub fn generic() -> Self {
        Self {
            not_exist: true,
            ..Self::new("", Role::State, ValueType::String)
        }
    }

    /// Attach a conversion rule.
    pub fn with_conversion(mut self, conversion: Conversion) -> Self {
        self.conversion = Some(conversion);
        self
    }

    /// Mark the node as a writable control.
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn coerce_always_yields_declared_type() {
        let samples = [
            json!(null),
            json!("12"),
            json!("1.5"),
            json!("abc"),
            json!(true),
            json!(42),
            json!({"a": 1}),
            json!([1, 2]),
        ];
        for value_type in [ValueType::String, ValueType::Number, ValueType::Boolean] {
            for sample in &samples {
                let coerced = value_type.coerce(sample);
                assert!(
                    value_type.accepts(&coerced),
                    "{value_type:?} rejected coercion of {sample}"
                );
            }
        }
    }

    #[test]
    fn numeric_strings_become_numbers() {
        assert_eq!(ValueType::Number.coerce(&json!("5000")), json!(5000));
        assert_eq!(ValueType::Number.coerce(&json!("0.5")), json!(0.5));
        assert_eq!(ValueType::Number.coerce(&json!("n/a")), json!(0));
    }

    #[test]
    fn boolean_keywords_are_understood() {
        assert_eq!(ValueType::Boolean.coerce(&json!("1")), json!(true));
        assert_eq!(ValueType::Boolean.coerce(&json!("Yes")), json!(true));
        assert_eq!(ValueType::Boolean.coerce(&json!("0")), json!(false));
        assert_eq!(ValueType::Boolean.coerce(&json!(2)), json!(true));
    }

    #[test]
    fn grouping_roles() {
        assert!(Role::Device.is_grouping());
        assert!(Role::Channel.is_grouping());
        assert!(!Role::Level.is_grouping());
    }
}
