use thiserror::Error;

/// Errors that end a reconstruction.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconstructionError {
    #[error("No usable aggregate among {records} records")]
    EmptyInput { records: usize },
}

pub type Result<T> = std::result::Result<T, ReconstructionError>;

/// Why a fragment payload could not be decoded. Never fatal; the fragment decodes to nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload of {0} hex digit(s) has no content")]
    TooShort(usize),

    #[error("odd number of hex digits ({0})")]
    OddLength(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl From<hex::FromHexError> for DecodeError {
    fn from(err: hex::FromHexError) -> Self {
        DecodeError::InvalidHex(err.to_string())
    }
}
