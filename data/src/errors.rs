use payload_reconstruction::ReconstructionError;
use replica_client::ReplicaClientError;
use thiserror::Error;

/// Failure of a fetch pipeline, by the phase that failed.
#[derive(Error, Debug)]
pub enum FetchPipelineError {
    #[error("Replica client configuration error: {0}")]
    ClientError(ReplicaClientError),

    #[error("Record enumeration failed: {0}")]
    EnumerationError(ReplicaClientError),

    #[error("Reconstruction failed: {0}")]
    ReconstructionError(#[from] ReconstructionError),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Subtask scheduling error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FetchPipelineError>;
