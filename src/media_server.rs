//! Query client for the media server.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode, header::ACCEPT};
use serde_json::Value;
use thiserror::Error;

use crate::config::AppConfig;

/// Failures raised while querying the media server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The request could not be sent.
    #[error("failed to query media server `{path}`")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("media server answered {status} for `{path}`")]
    Status { path: String, status: StatusCode },
    /// The body is not JSON.
    #[error("failed to decode media server response for `{path}`")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Read-only access to the media server API.
pub trait MediaServer: Send + Sync {
    /// Fetch `path` (e.g. `/status/sessions`) as JSON.
    fn query(&self, path: &str) -> BoxFuture<'static, Result<Value, ServerError>>;
}

/// [`MediaServer`] backed by the server's HTTP API.
#[derive(Clone)]
pub struct PlexServer {
    client: Client,
    base_url: Arc<str>,
    client_identifier: Arc<str>,
    token: Option<Arc<str>>,
}

impl PlexServer {
    /// Build a client from the configured server connection.
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: Arc::from(config.server.base_url()),
            client_identifier: Arc::from(config.client_identifier.as_str()),
            token: config.server.token.as_deref().map(Arc::from),
        })
    }
}

impl MediaServer for PlexServer {
    fn query(&self, path: &str) -> BoxFuture<'static, Result<Value, ServerError>> {
        let path = path.to_owned();
        let mut request = self
            .client
            .get(format!("{}{path}", self.base_url))
            .header(ACCEPT, "application/json")
            .header("X-Plex-Client-Identifier", self.client_identifier.as_ref());
        if let Some(token) = &self.token {
            request = request.header("X-Plex-Token", token.as_ref());
        }

        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|source| ServerError::Request {
                    path: path.clone(),
                    source,
                })?;
            let status = response.status();
            if !status.is_success() {
                return Err(ServerError::Status { path, status });
            }
            response
                .json::<Value>()
                .await
                .map_err(|source| ServerError::Decode { path, source })
        })
    }
}

/// Metadata entry of the session played by `device_id`, if any.
pub fn find_session<'a>(sessions: &'a Value, device_id: &str) -> Option<&'a Value> {
    let container = sessions.get("MediaContainer").unwrap_or(sessions);
    container
        .get("Metadata")?
        .as_array()?
        .iter()
        .find(|session| {
            session
                .pointer("/Player/machineIdentifier")
                .and_then(Value::as_str)
                == Some(device_id)
        })
}

/// Entries of a `/clients` answer.
pub fn client_entries(clients: &Value) -> Vec<Value> {
    let container = clients.get("MediaContainer").unwrap_or(clients);
    match container.get("Server") {
        Some(Value::Array(items)) => items.clone(),
        Some(single @ Value::Object(_)) => vec![single.clone()],
        _ => Vec::new(),
    }
}
