//! Conversion rules applied to scalar values before they are persisted.

use serde_json::Value;

use crate::{
    clock::{format_ms, parse_ms},
    registry::{Conversion, NodeDescriptor, Role, ValueType},
};

const TOKEN_PARAM: &str = "X-Plex-Token";
/// Epoch values below this are interpreted as seconds, above as milliseconds.
const EPOCH_MS_THRESHOLD: f64 = 1e11;
const MINUTE_MS: i64 = 60_000;

/// Absolute base used to turn relative media-server paths into links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBase {
    origin: String,
    token: Option<String>,
}

impl LinkBase {
    /// Base for `{protocol}://{host}:{port}` authenticated with `token`.
    pub fn new(protocol: &str, host: &str, port: u16, token: Option<&str>) -> Self {
        Self {
            origin: format!("{protocol}://{host}:{port}"),
            token: token.filter(|token| !token.is_empty()).map(str::to_owned),
        }
    }

    /// Absolute link for a relative path.
    pub fn link(&self, relative: &str) -> String {
        match &self.token {
            Some(token) => {
                let separator = if relative.contains('?') { '&' } else { '?' };
                format!("{}{relative}{separator}{TOKEN_PARAM}={token}", self.origin)
            }
            None => format!("{}{relative}", self.origin),
        }
    }

    /// Recover the relative path from a link built by [`Self::link`].
    pub fn relative<'a>(&self, link: &'a str) -> Option<&'a str> {
        let rest = link.strip_prefix(self.origin.as_str())?;
        let Some(token) = &self.token else {
            return Some(rest);
        };
        let suffix = format!("{TOKEN_PARAM}={token}");
        let rest = rest.strip_suffix(suffix.as_str())?;
        rest.strip_suffix('?').or_else(|| rest.strip_suffix('&'))
    }
}

/// Extra node published next to a converted value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sibling {
    /// Appended to the converted path to name the sibling.
    pub suffix: &'static str,
    /// Sibling value.
    pub value: Value,
    /// Descriptor used when the registry does not declare the sibling.
    pub fallback: NodeDescriptor,
}

/// Output of a conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    /// Value written at the original path.
    pub value: Value,
    /// Siblings written next to it.
    pub siblings: Vec<Sibling>,
}

impl Converted {
    fn unchanged(value: &Value) -> Self {
        Self {
            value: value.clone(),
            siblings: Vec::new(),
        }
    }
}

/// Apply `conversion` to `value`. Values the rule cannot interpret pass through unchanged.
pub fn apply(conversion: Conversion, value: &Value, links: Option<&LinkBase>) -> Converted {
    match conversion {
        Conversion::DateTimestamp => date_timestamp(value),
        Conversion::SecondsReadable => seconds_readable(value),
        Conversion::MsMin => ms_min(value),
        Conversion::CreateLink | Conversion::CreateLinkOnly => {
            let link = value
                .as_str()
                .filter(|relative| relative.starts_with('/'))
                .zip(links)
                .map(|(relative, links)| links.link(relative));
            match (link, conversion) {
                (Some(link), Conversion::CreateLinkOnly) => Converted {
                    value: Value::String(link),
                    siblings: Vec::new(),
                },
                (Some(link), _) => Converted {
                    value: value.clone(),
                    siblings: vec![Sibling {
                        suffix: "Link",
                        value: Value::String(link),
                        fallback: NodeDescriptor::new("Link", Role::Url, ValueType::String),
                    }],
                },
                (None, _) => Converted::unchanged(value),
            }
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn date_sibling(date: String) -> Sibling {
    Sibling {
        suffix: "Date",
        value: Value::String(date),
        fallback: NodeDescriptor::new("Date", Role::Date, ValueType::String),
    }
}

fn date_timestamp(value: &Value) -> Converted {
    if let Some(epoch) = as_number(value) {
        let ms = if epoch.abs() < EPOCH_MS_THRESHOLD {
            epoch * 1000.0
        } else {
            epoch
        };
        return Converted {
            value: value.clone(),
            siblings: format_ms(ms as i64).map(date_sibling).into_iter().collect(),
        };
    }

    match value.as_str().and_then(|text| parse_ms(text).map(|ms| (text, ms))) {
        Some((text, ms)) => Converted {
            value: Value::from(ms / 1000),
            siblings: vec![date_sibling(text.to_owned())],
        },
        None => Converted::unchanged(value),
    }
}

/// Render milliseconds as `H:MM:SS`, or `MM:SS` below one hour.
pub fn readable_duration(ms: i64) -> String {
    let total = ms.max(0) / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

fn seconds_sibling(seconds: i64) -> Sibling {
    Sibling {
        suffix: "Seconds",
        value: Value::from(seconds),
        fallback: NodeDescriptor::new("Seconds", Role::Value, ValueType::Number),
    }
}

fn seconds_readable(value: &Value) -> Converted {
    let Some(ms) = as_number(value) else {
        return Converted::unchanged(value);
    };
    let ms = ms as i64;
    Converted {
        value: value.clone(),
        siblings: vec![
            Sibling {
                suffix: "human",
                value: Value::String(readable_duration(ms)),
                fallback: NodeDescriptor::new("Readable time", Role::Text, ValueType::String),
            },
            seconds_sibling(ms / 1000),
        ],
    }
}

fn ms_min(value: &Value) -> Converted {
    let Some(ms) = as_number(value) else {
        return Converted::unchanged(value);
    };
    let ms = ms as i64;
    let converted = if ms < MINUTE_MS {
        value.clone()
    } else {
        Value::from(ms / MINUTE_MS)
    };
    Converted {
        value: converted,
        siblings: vec![seconds_sibling(ms / 1000)],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn links() -> LinkBase {
        LinkBase::new("http", "10.0.0.2", 32400, Some("secret"))
    }

    #[test]
    fn link_round_trip_recovers_relative_path() {
        let links = links();
        let relative = "/library/metadata/42/thumb/1700000000";
        let converted = apply(Conversion::CreateLinkOnly, &json!(relative), Some(&links));
        let link = converted.value.as_str().unwrap();
        assert_eq!(
            link,
            "http://10.0.0.2:32400/library/metadata/42/thumb/1700000000?X-Plex-Token=secret"
        );
        assert_eq!(links.relative(link), Some(relative));
        assert!(converted.siblings.is_empty());
    }

    #[test]
    fn link_round_trip_with_existing_query() {
        let links = links();
        let relative = "/photo/:/transcode?width=200";
        let link = links.link(relative);
        assert_eq!(links.relative(&link), Some(relative));
    }

    #[test]
    fn create_link_keeps_value_and_adds_sibling() {
        let converted = apply(Conversion::CreateLink, &json!("/art/1"), Some(&links()));
        assert_eq!(converted.value, json!("/art/1"));
        assert_eq!(converted.siblings.len(), 1);
        assert_eq!(converted.siblings[0].suffix, "Link");
    }

    #[test]
    fn links_need_a_configured_server() {
        let converted = apply(Conversion::CreateLinkOnly, &json!("/art/1"), None);
        assert_eq!(converted.value, json!("/art/1"));
    }

    #[test]
    fn epoch_seconds_publish_a_date() {
        let converted = apply(Conversion::DateTimestamp, &json!(1_700_000_000), None);
        assert_eq!(converted.value, json!(1_700_000_000));
        assert_eq!(converted.siblings[0].value, json!("2023-11-14T22:13:20Z"));
    }

    #[test]
    fn dates_become_epoch_seconds() {
        let converted = apply(Conversion::DateTimestamp, &json!("1970-01-02"), None);
        assert_eq!(converted.value, json!(86_400));
        assert_eq!(converted.siblings[0].suffix, "Date");
        assert_eq!(converted.siblings[0].value, json!("1970-01-02"));
    }

    #[test]
    fn readable_durations() {
        assert_eq!(readable_duration(5_000), "00:05");
        assert_eq!(readable_duration(754_000), "12:34");
        assert_eq!(readable_duration(3_723_000), "1:02:03");
    }

    #[test]
    fn seconds_readable_publishes_two_siblings() {
        let converted = apply(Conversion::SecondsReadable, &json!("65000"), None);
        assert_eq!(converted.siblings[0].value, json!("01:05"));
        assert_eq!(converted.siblings[1].value, json!(65));
    }

    #[test]
    fn short_durations_stay_in_milliseconds() {
        let converted = apply(Conversion::MsMin, &json!(45_000), None);
        assert_eq!(converted.value, json!(45_000));
        assert_eq!(converted.siblings[0].value, json!(45));
    }

    #[test]
    fn long_durations_become_minutes() {
        let converted = apply(Conversion::MsMin, &json!(7_259_000), None);
        assert_eq!(converted.value, json!(120));
        assert_eq!(converted.siblings[0].value, json!(7_259));
    }
}
