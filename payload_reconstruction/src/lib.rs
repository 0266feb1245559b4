mod error;
mod fragment_decoder;
pub mod header;
mod reassembler;
mod report;

pub use error::{DecodeError, ReconstructionError, Result};
pub use fragment_decoder::try_decode_fragment;
pub use header::{HeaderField, ReconstructedHeader};
pub use reassembler::{ReassembleOptions, Reassembler, ReconstructedPayload, reassemble};
pub use report::{DecodeFailure, DuplicateRecord, GapAnalysis, ReconstructionReport, RejectedRecord, SequenceRange};
