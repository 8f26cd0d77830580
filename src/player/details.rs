//! Timeline parsing and the active stream projection.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

use crate::registry::MEDIA_TYPES;

/// Active type published when nothing is playing.
pub const ALL_TYPES: &str = "all";
/// Playback state of an idle timeline entry.
pub const STOPPED: &str = "stopped";

/// Fields never persisted from a timeline entry.
const PRIVATE_FIELDS: &[&str] = &[
    "address",
    "port",
    "protocol",
    "containerKey",
    "guid",
    "machineIdentifier",
    "audioStreamID",
    "videoStreamID",
    "subtitleStreamID",
];

/// One per-media-type entry of a timeline poll.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    /// `photo`, `music` or `video`.
    #[serde(rename = "type")]
    pub media_type: String,
    /// `playing`, `paused`, `buffering` or `stopped`.
    #[serde(default)]
    pub state: String,
    /// Elapsed time in milliseconds.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    /// Stream duration in milliseconds.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// Volume, 0 to 100.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
    /// Non-zero when shuffle is on.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle: Option<i64>,
    /// Repeat mode as reported by the device.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<i64>,
    /// Comma separated affordances the device accepts for this stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controllable: Option<String>,
    /// Library key of the item being played.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Remaining attributes, kept as reported.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TimelineEntry {
    /// Whether the entry describes a stream that is not stopped.
    pub fn is_live(&self) -> bool {
        !self.state.is_empty() && !self.state.eq_ignore_ascii_case(STOPPED)
    }

    fn rank(&self) -> Option<usize> {
        MEDIA_TYPES
            .iter()
            .position(|kind| kind.eq_ignore_ascii_case(&self.media_type))
            .map(|index| index + 1)
    }
}

/// Why a timeline payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedTimeline(pub String);

/// Parse a timeline poll response into its entries, stripping private fields.
///
/// Accepts the container either at the top level or under `MediaContainer`. A container without
/// any `Timeline` is valid and yields no entries.
pub fn parse_timeline(payload: &Value) -> Result<Vec<TimelineEntry>, MalformedTimeline> {
    let container = payload
        .get("MediaContainer")
        .unwrap_or(payload)
        .as_object()
        .ok_or_else(|| MalformedTimeline("timeline container is not an object".into()))?;

    let raw = match container.get("Timeline") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items.clone(),
        Some(single @ Value::Object(_)) => vec![single.clone()],
        Some(_) => return Err(MalformedTimeline("`Timeline` is not a list".into())),
    };

    raw.into_iter()
        .map(|mut item| {
            if let Value::Object(fields) = &mut item {
                strip_private(fields);
            }
            serde_json::from_value::<TimelineEntry>(item)
                .map_err(|err| MalformedTimeline(err.to_string()))
        })
        .collect()
}

/// Remove address, port and identifier fields from a raw entry.
pub fn strip_private(fields: &mut Map<String, Value>) {
    fields.retain(|name, _| {
        !PRIVATE_FIELDS
            .iter()
            .any(|private| private.eq_ignore_ascii_case(name))
    });
}

/// Stream chosen among the timeline entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveStream {
    /// Media type of the chosen entry, or `all` when nothing plays.
    #[serde(rename = "type")]
    pub media_type: String,
    /// Playback state of the chosen entry.
    pub state: String,
    /// Elapsed time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    /// Duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// Library key of the item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ActiveStream {
    fn idle() -> Self {
        Self {
            media_type: ALL_TYPES.into(),
            state: STOPPED.into(),
            time: None,
            duration: None,
            url: None,
        }
    }

    /// Whether something is playing or paused.
    pub fn is_live(&self) -> bool {
        self.media_type != ALL_TYPES
    }

    /// Elapsed time as a percentage of the duration, rounded to one decimal.
    pub fn seek_percent(&self) -> Option<f64> {
        seek_percent(self.time?, self.duration?)
    }
}

/// `time / duration * 100`, rounded to one decimal. `None` without a positive duration.
pub fn seek_percent(time: i64, duration: i64) -> Option<f64> {
    if duration <= 0 {
        return None;
    }
    let percent = time as f64 / duration as f64 * 100.0;
    Some((percent * 10.0).round() / 10.0)
}

/// Per-media-type timeline state plus the active projection.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailsSnapshot {
    /// Entries keyed by lowercase media type, in reported order.
    pub entries: IndexMap<String, TimelineEntry>,
    /// Projection of the highest ranked live entry.
    pub active: ActiveStream,
}

impl DetailsSnapshot {
    /// Build the snapshot, ranking non-stopped entries photo < music < video.
    pub fn from_entries(entries: Vec<TimelineEntry>) -> Self {
        let active = entries
            .iter()
            .filter(|entry| entry.is_live())
            .filter_map(|entry| entry.rank().map(|rank| (rank, entry)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, entry)| ActiveStream {
                media_type: entry.media_type.to_lowercase(),
                state: entry.state.clone(),
                time: entry.time,
                duration: entry.duration,
                url: entry.key.clone(),
            })
            .unwrap_or_else(ActiveStream::idle);

        let entries = entries
            .into_iter()
            .map(|entry| (entry.media_type.to_lowercase(), entry))
            .collect();
        Self { entries, active }
    }

    /// Entry backing the active projection.
    pub fn active_entry(&self) -> Option<&TimelineEntry> {
        self.entries.get(&self.active.media_type)
    }

    /// JSON tree flattened under the player's `details` key.
    pub fn to_document(&self) -> Value {
        let mut document = Map::new();
        for (media_type, entry) in &self.entries {
            if let Ok(value) = serde_json::to_value(entry) {
                document.insert(media_type.clone(), value);
            }
        }
        if let Ok(active) = serde_json::to_value(&self.active) {
            document.insert("active".into(), active);
        }
        Value::Object(document)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(media_type: &str, state: &str) -> TimelineEntry {
        TimelineEntry {
            media_type: media_type.into(),
            state: state.into(),
            ..TimelineEntry::default()
        }
    }

    #[test]
    fn photo_beats_video() {
        let snapshot = DetailsSnapshot::from_entries(vec![
            entry("video", "playing"),
            entry("photo", "paused"),
            entry("music", STOPPED),
        ]);
        assert_eq!(snapshot.active.media_type, "photo");
        assert_eq!(snapshot.active.state, "paused");
    }

    #[test]
    fn only_video_is_active() {
        let snapshot = DetailsSnapshot::from_entries(vec![
            entry("photo", STOPPED),
            entry("video", "playing"),
        ]);
        assert_eq!(snapshot.active.media_type, "video");
    }

    #[test]
    fn all_stopped_reports_sentinel() {
        let snapshot = DetailsSnapshot::from_entries(vec![entry("music", STOPPED)]);
        assert_eq!(snapshot.active.media_type, ALL_TYPES);
        assert_eq!(snapshot.active.state, STOPPED);
        assert!(!snapshot.active.is_live());
    }

    #[test]
    fn numeric_strings_and_private_fields() {
        let payload = json!({
            "MediaContainer": {
                "commandID": "3",
                "Timeline": [{
                    "type": "video",
                    "state": "playing",
                    "time": "5000",
                    "duration": 100000,
                    "address": "10.0.0.9",
                    "port": "32400",
                    "machineIdentifier": "secret",
                    "containerKey": "/playQueues/1",
                    "ratingKey": "42"
                }]
            }
        });
        let entries = parse_timeline(&payload).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].time, Some(5_000));
        assert_eq!(entries[0].duration, Some(100_000));
        assert!(!entries[0].extra.contains_key("address"));
        assert!(!entries[0].extra.contains_key("machineIdentifier"));
        assert_eq!(entries[0].extra["ratingKey"], json!("42"));
    }

    #[test]
    fn empty_container_has_no_entries() {
        assert!(parse_timeline(&json!({"MediaContainer": {}})).unwrap().is_empty());
        assert!(parse_timeline(&json!("nope")).is_err());
    }

    #[test]
    fn seek_percent_rounds_to_one_decimal() {
        assert_eq!(seek_percent(5_000, 100_000), Some(5.0));
        assert_eq!(seek_percent(1_234, 10_000), Some(12.3));
        assert_eq!(seek_percent(1, 0), None);
    }

    #[test]
    fn document_has_active_branch() {
        let snapshot = DetailsSnapshot::from_entries(vec![TimelineEntry {
            time: Some(5_000),
            duration: Some(100_000),
            key: Some("/library/metadata/42".into()),
            ..entry("video", "playing")
        }]);
        let document = snapshot.to_document();
        assert_eq!(document["active"]["type"], json!("video"));
        assert_eq!(document["active"]["url"], json!("/library/metadata/42"));
        assert_eq!(document["video"]["time"], json!(5_000));
    }
}
