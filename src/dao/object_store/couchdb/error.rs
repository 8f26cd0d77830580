//! Error types raised by the CouchDB object store.

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias of the CouchDB backend.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures talking to CouchDB. `target` is the database name or the document id involved.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// The HTTP client could not be built.
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request never got an answer.
    #[error("CouchDB request for `{target}` failed")]
    Send {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB answered with an unexpected status.
    #[error("CouchDB answered {status} for `{target}`")]
    Status { target: String, status: StatusCode },
    /// The body is not the JSON we expect.
    #[error("failed to decode CouchDB response for `{target}`")]
    Decode {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    /// A listed document is not a state document.
    #[error("document `{target}` is not a state document")]
    Document {
        target: String,
        #[source]
        source: serde_json::Error,
    },
}
