use reqwest::StatusCode;
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ReplicaClientError {
    #[error("Transport error: {0}")]
    TransportError(#[from] reqwest_middleware::Error),

    #[error("Reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Replica configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Record {0} not found")]
    RecordNotFound(String),

    #[error("Replica returned record {received} when {requested} was requested")]
    RecordMismatch { requested: String, received: String },

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, ReplicaClientError>;

impl ReplicaClientError {
    /// The HTTP status behind this error, if a replica answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ReplicaClientError::TransportError(e) => e.status(),
            ReplicaClientError::ReqwestError(e) => e.status(),
            _ => None,
        }
    }
}
