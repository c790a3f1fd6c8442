use reqwest::{Method, StatusCode};
use thiserror::Error;

pub type CouchResult<T> = Result<T, CouchDaoError>;

#[derive(Debug, Error)]
pub enum CouchDaoError {
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("`{name}` is not a valid CouchDB database name")]
    InvalidDatabaseName { name: String },
    #[error("failed to build the CouchDB HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    /// The request never got an answer.
    #[error("CouchDB {method} `{target}` failed")]
    Transport {
        method: Method,
        target: String,
        #[source]
        source: reqwest::Error,
    },
    /// `_rev` no longer matches the stored document.
    #[error("session document `{target}` was updated concurrently")]
    Conflict { target: String },
    #[error("CouchDB answered {status} to {method} `{target}`")]
    Status {
        method: Method,
        target: String,
        status: StatusCode,
    },
    #[error("unreadable CouchDB response for `{target}`")]
    Decode {
        target: String,
        #[source]
        source: reqwest::Error,
    },
}
