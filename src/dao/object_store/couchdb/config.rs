use std::{env, time::Duration};

use super::error::{CouchDaoError, CouchResult};

const BASE_URL_ENV: &str = "COUCH_BASE_URL";
const DATABASE_ENV: &str = "COUCH_DB";
const USERNAME_ENV: &str = "COUCH_USERNAME";
const PASSWORD_ENV: &str = "COUCH_PASSWORD";
const TIMEOUT_ENV: &str = "COUCH_TIMEOUT_MS";

const DEFAULT_DATABASE: &str = "media_states";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Basic-auth credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchCredentials {
    /// CouchDB user.
    pub username: String,
    /// Password of `username`.
    pub password: String,
}

/// Where the state database lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchConfig {
    /// Server URL, without the database.
    pub base_url: String,
    /// Database holding the state documents.
    pub database: String,
    /// Basic-auth credentials, when the server requires them.
    pub credentials: Option<CouchCredentials>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl CouchConfig {
    /// Anonymous configuration with the default timeout.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            credentials: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Authenticate with basic auth.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(CouchCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Read `COUCH_BASE_URL` (required), `COUCH_DB`, `COUCH_USERNAME`/`COUCH_PASSWORD` and
    /// `COUCH_TIMEOUT_MS`.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let base_url = lookup(BASE_URL_ENV)
            .filter(|url| !url.trim().is_empty())
            .ok_or(CouchDaoError::MissingEnvVar { var: BASE_URL_ENV })?;
        let database = lookup(DATABASE_ENV).unwrap_or_else(|| DEFAULT_DATABASE.into());

        let mut config = Self::new(base_url, database);
        if let (Some(username), Some(password)) = (lookup(USERNAME_ENV), lookup(PASSWORD_ENV)) {
            config = config.with_credentials(username, password);
        }
        if let Some(timeout) = lookup(TIMEOUT_ENV).and_then(|ms| ms.parse::<u64>().ok()) {
            config.timeout = Duration::from_millis(timeout.max(1));
        }
        Ok(config)
    }
}
