//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::flatten::{FlattenOptions, LinkBase};

/// Default location on disk where the service looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MEDIA_TELEMETRY_CONFIG_PATH";
/// Environment variable that overrides the media server token.
const TOKEN_ENV: &str = "MEDIA_SERVER_TOKEN";

/// Connection details of the media server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConnection {
    /// `http` or `https`.
    pub protocol: String,
    /// Host name or address of the media server.
    pub host: String,
    /// Port of the media server.
    pub port: u16,
    /// Access token sent with every request.
    pub token: Option<String>,
}

impl Default for ServerConnection {
    fn default() -> Self {
        Self {
            protocol: "http".into(),
            host: "127.0.0.1".into(),
            port: 32400,
            token: None,
        }
    }
}

impl ServerConnection {
    /// Base URL of the server, without trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// Link base used by link conversions.
    pub fn link_base(&self) -> LinkBase {
        LinkBase::new(&self.protocol, &self.host, self.port, self.token.as_deref())
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Media server connection.
    pub server: ServerConnection,
    /// Identifier sent as `X-Plex-Client-Identifier`.
    pub client_identifier: String,
    /// Name sent as `X-Plex-Device-Name`.
    pub device_name: String,
    /// Delay between two timeline polls of one player.
    pub poll_interval: Duration,
    /// Timeout of one timeline poll request.
    pub poll_timeout: Duration,
    /// Delay between two client enumerations; `None` disables the refresh loop.
    pub refresh_interval: Option<Duration>,
    /// Delay between two sweeps of stale notification states.
    pub sweep_interval: Duration,
    /// Age after which notification states are emptied by the periodic sweep.
    pub notification_horizon: Duration,
    /// Flattening switches.
    pub flatten: FlattenOptions,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to the built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Some(token) = env::var(TOKEN_ENV).ok().filter(|token| !token.is_empty()) {
            config.server.token = Some(token);
        }
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    server: ServerConnection,
    client_identifier: Option<String>,
    device_name: String,
    poll_interval_ms: u64,
    poll_timeout_ms: u64,
    refresh_interval_ms: u64,
    sweep_interval_ms: u64,
    notification_horizon_ms: u64,
    expand_arrays: bool,
    deep_expansion: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            server: ServerConnection::default(),
            client_identifier: None,
            device_name: "media-telemetry".into(),
            poll_interval_ms: 1_000,
            poll_timeout_ms: 900,
            refresh_interval_ms: 60_000,
            sweep_interval_ms: 60_000,
            notification_horizon_ms: 6 * 60 * 60 * 1000,
            expand_arrays: true,
            deep_expansion: true,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            server: raw.server,
            client_identifier: raw
                .client_identifier
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            device_name: raw.device_name,
            poll_interval: Duration::from_millis(raw.poll_interval_ms),
            poll_timeout: Duration::from_millis(raw.poll_timeout_ms),
            refresh_interval: (raw.refresh_interval_ms > 0)
                .then(|| Duration::from_millis(raw.refresh_interval_ms)),
            sweep_interval: Duration::from_millis(raw.sweep_interval_ms.max(1_000)),
            notification_horizon: Duration::from_millis(raw.notification_horizon_ms),
            flatten: FlattenOptions {
                expand_arrays: raw.expand_arrays,
                deep_expansion: raw.deep_expansion,
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"server": {"host": "10.0.0.2", "token": "abc"}, "poll_interval_ms": 2500}"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.server.base_url(), "http://10.0.0.2:32400");
        assert_eq!(config.server.token.as_deref(), Some("abc"));
        assert_eq!(config.poll_interval, Duration::from_millis(2_500));
        assert_eq!(config.poll_timeout, Duration::from_millis(900));
        assert!(config.flatten.expand_arrays);
        assert!(!config.client_identifier.is_empty());
    }

    #[test]
    fn zero_refresh_interval_disables_loop() {
        let raw: RawConfig = serde_json::from_str(r#"{"refresh_interval_ms": 0}"#).unwrap();
        assert!(AppConfig::from(raw).refresh_interval.is_none());
    }
}
