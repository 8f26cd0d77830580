//! Responses of the notification and client ingestion routes.

use serde::Serialize;

use crate::state::ClientIngest;

/// Outcome of a webhook notification.
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    /// `false` when the notification duplicated a recent one.
    pub accepted: bool,
}

/// Outcome of a client enumeration.
#[derive(Debug, Serialize)]
pub struct ClientsResponse {
    /// Entries describing a usable player.
    pub seen: usize,
    /// Players registered by this enumeration.
    pub created: usize,
    /// Entries without a device identifier.
    pub skipped: usize,
}

impl From<ClientIngest> for ClientsResponse {
    fn from(ingest: ClientIngest) -> Self {
        Self {
            seen: ingest.seen,
            created: ingest.created,
            skipped: ingest.skipped,
        }
    }
}
