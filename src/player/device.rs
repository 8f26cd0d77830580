//! HTTP transport to the player devices.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder, header::ACCEPT};
use serde_json::Value;

use super::{actions::Command, error::DeviceError};

const CLIENT_ID_HEADER: &str = "X-Plex-Client-Identifier";
const TARGET_ID_HEADER: &str = "X-Plex-Target-Client-Identifier";
const DEVICE_NAME_HEADER: &str = "X-Plex-Device-Name";
const TOKEN_HEADER: &str = "X-Plex-Token";

/// Device a request is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    /// `{protocol}://{address}:{port}` of the device.
    pub base_url: String,
    /// Machine identifier, sent as the target client.
    pub device_id: String,
}

/// Abstraction over the device control endpoint.
pub trait DeviceTransport: Send + Sync {
    /// Poll the device timeline.
    fn poll_timeline(
        &self,
        target: DeviceTarget,
        command_id: u64,
    ) -> BoxFuture<'static, Result<Value, DeviceError>>;

    /// Send a playback or navigation command.
    fn send_command(
        &self,
        target: DeviceTarget,
        command: Command,
        command_id: u64,
    ) -> BoxFuture<'static, Result<(), DeviceError>>;
}

/// Identity headers sent with every request.
#[derive(Debug, Clone)]
pub struct ClientHeaders {
    /// Stable identifier of this service.
    pub client_identifier: String,
    /// Name shown by the devices.
    pub device_name: String,
    /// Media server token, when configured.
    pub token: Option<String>,
}

/// [`DeviceTransport`] speaking HTTP through `reqwest`.
#[derive(Clone)]
pub struct HttpDevice {
    client: Client,
    headers: Arc<ClientHeaders>,
    timeout: Duration,
}

impl HttpDevice {
    /// Build a transport whose requests time out after `timeout`.
    pub fn new(headers: ClientHeaders, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            headers: Arc::new(headers),
            timeout,
        })
    }

    fn decorate(&self, builder: RequestBuilder, target: &DeviceTarget) -> RequestBuilder {
        let builder = builder
            .timeout(self.timeout)
            .header(ACCEPT, "application/json")
            .header(CLIENT_ID_HEADER, &self.headers.client_identifier)
            .header(TARGET_ID_HEADER, &target.device_id)
            .header(DEVICE_NAME_HEADER, &self.headers.device_name);
        match &self.headers.token {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }
}

impl DeviceTransport for HttpDevice {
    fn poll_timeline(
        &self,
        target: DeviceTarget,
        command_id: u64,
    ) -> BoxFuture<'static, Result<Value, DeviceError>> {
        let url = format!("{}/player/timeline/poll", target.base_url);
        let request = self
            .decorate(self.client.get(&url), &target)
            .query(&[("commandID", command_id.to_string()), ("wait", "0".into())]);
        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|err| DeviceError::from_request(&url, err))?;
            let status = response.status();
            if !status.is_success() {
                return Err(DeviceError::Status { url, status });
            }
            let body = response
                .text()
                .await
                .map_err(|err| DeviceError::from_request(&url, err))?;
            serde_json::from_str(&body).map_err(|err| DeviceError::Malformed {
                url,
                reason: err.to_string(),
            })
        })
    }

    fn send_command(
        &self,
        target: DeviceTarget,
        command: Command,
        command_id: u64,
    ) -> BoxFuture<'static, Result<(), DeviceError>> {
        let url = format!(
            "{}/player/{}/{}",
            target.base_url, command.mode, command.action
        );
        let mut params = command.params;
        params.push(("commandID".into(), command_id.to_string()));
        let request = self.decorate(self.client.post(&url), &target).query(&params);
        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|err| DeviceError::from_request(&url, err))?;
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(DeviceError::Status { url, status })
            }
        })
    }
}
