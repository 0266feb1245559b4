pub mod configurations;
pub mod errors;
pub mod logging;
mod payload_fetcher;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub use configurations::PipelineOptions;
pub use errors::{FetchPipelineError, Result};
pub use payload_fetcher::{DownloadOutcome, FailedFetch, PayloadFetcher};
pub use payload_reconstruction::{ReconstructedHeader, ReconstructedPayload, ReconstructionReport};
pub use progress_tracking::{ProgressPhase, ProgressSnapshot};

/// Write the reassembled payload to `path`.
///
/// With `data_url_body` set, header-bearing payloads are written without their `data:<mime>;base64,`
/// prefix; payloads without a header are written whole either way.
pub fn write_payload(path: impl AsRef<Path>, payload: &ReconstructedPayload, data_url_body: bool) -> Result<u64> {
    let bytes = match payload.data_url_body() {
        Some(body) if data_url_body => body,
        _ => payload.payload.as_slice(),
    };

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(bytes.len() as u64)
}
