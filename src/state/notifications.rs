//! Bounded history of webhook notifications with duplicate suppression.

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::flatten::LinkBase;

/// Maximum number of notifications kept.
pub const HISTORY_LIMIT: usize = 1000;
/// Notifications with the same source, media and account closer than this are duplicates.
pub const DUPLICATE_WINDOW_MS: i64 = 1000;

/// One accepted notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    /// Unique id of the record.
    pub id: Uuid,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Account that triggered the event.
    pub account: String,
    /// Player title.
    pub player: String,
    /// Media title.
    pub media: String,
    /// Event name, e.g. `media.play`.
    pub event: String,
    /// Sentence describing the event.
    pub message: String,
    /// Short caption for displays.
    pub caption: String,
    /// Thumbnail link, when the media has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Device the notification originates from.
    #[serde(skip)]
    pub source: String,
}

impl NotificationRecord {
    /// Summarise a webhook payload received at `timestamp`.
    pub fn from_payload(payload: &Value, timestamp: i64, links: Option<&LinkBase>) -> Self {
        let text = |pointer: &str| {
            payload
                .pointer(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };

        let event = text("/event");
        let account = text("/Account/title");
        let player = text("/Player/title");
        let title = text("/Metadata/title");
        let parent = text("/Metadata/grandparentTitle");
        let media = if parent.is_empty() {
            title.clone()
        } else {
            format!("{parent} - {title}")
        };
        let source = payload
            .pointer("/Player/uuid")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| player.clone());

        let message = match event.as_str() {
            "library.new" => format!("New item available: {media}"),
            _ => format!("{account} {} {media} on {player}", verb(&event)),
        };
        let caption = match (text("/Metadata/librarySectionTitle"), text("/Metadata/type")) {
            (section, kind) if !section.is_empty() => format!("{section} ({kind})"),
            (_, kind) => kind,
        };
        let thumbnail = payload
            .pointer("/Metadata/thumb")
            .and_then(Value::as_str)
            .map(|relative| match links {
                Some(links) => links.link(relative),
                None => relative.to_owned(),
            });

        Self {
            id: Uuid::new_v4(),
            timestamp,
            account,
            player,
            media,
            event,
            message,
            caption,
            thumbnail,
            source,
        }
    }

    fn duplicates(&self, other: &NotificationRecord) -> bool {
        self.source == other.source
            && self.media == other.media
            && self.account == other.account
            && (self.timestamp - other.timestamp).abs() <= DUPLICATE_WINDOW_MS
    }
}

fn verb(event: &str) -> &str {
    match event {
        "media.play" => "started playing",
        "media.pause" => "paused",
        "media.resume" => "resumed",
        "media.stop" => "stopped",
        "media.scrobble" => "watched",
        "media.rate" => "rated",
        other => other,
    }
}

/// Last [`HISTORY_LIMIT`] accepted notifications, oldest first.
#[derive(Debug, Default)]
pub struct NotificationHistory {
    entries: Mutex<VecDeque<NotificationRecord>>,
}

impl NotificationHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record` unless it duplicates a recent one; returns whether it was kept.
    pub async fn push(&self, record: NotificationRecord) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.iter().rev().any(|known| known.duplicates(&record)) {
            return false;
        }
        entries.push_back(record);
        while entries.len() > HISTORY_LIMIT {
            entries.pop_front();
        }
        true
    }

    /// Copy of the history.
    pub async fn snapshot(&self) -> Vec<NotificationRecord> {
        self.entries.lock().await.iter().cloned().collect()
    }

    /// Number of kept notifications.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
