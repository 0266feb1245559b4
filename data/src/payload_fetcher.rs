use std::sync::Arc;

use chain_types::{RawRecord, RecordRef};
use payload_reconstruction::{ReconstructedPayload, Reassembler};
use progress_tracking::{ProgressPhase, ProgressPublisher, ProgressSnapshot};
use replica_client::{BulkFetcher, Client, FetchOutcome, RecordEnumerator, RemoteClient};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::configurations::PipelineOptions;
use crate::errors::{FetchPipelineError, Result};

/// A record that could not be fetched from any replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFetch {
    pub hash: String,
    pub error: String,
}

#[derive(Debug)]
pub struct DownloadOutcome {
    pub refs: Vec<RecordRef>,
    pub failed: Vec<FailedFetch>,
    pub reconstruction: ReconstructedPayload,
}

/// Fetches the records stored under an address and rebuilds their payload.
///
/// Each instance owns its own progress state, so concurrent downloads through different fetchers do not
/// interfere.
pub struct PayloadFetcher {
    client: Arc<dyn Client>,
    progress: Arc<ProgressPublisher>,
}

impl PayloadFetcher {
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self {
            client,
            progress: Arc::new(ProgressPublisher::new()),
        }
    }

    /// A fetcher over remote replicas, configured from the process configuration.
    pub fn from_endpoints<I, S>(endpoints: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let client = RemoteClient::from_endpoints(endpoints).map_err(FetchPipelineError::ClientError)?;
        Ok(Self::new(client))
    }

    pub fn get_progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    pub fn reset_progress(&self) {
        self.progress.reset();
    }

    pub fn progress(&self) -> Arc<ProgressPublisher> {
        self.progress.clone()
    }

    #[instrument(skip_all, name = "PayloadFetcher::enumerate_aggregate_refs", fields(address = %address))]
    pub async fn enumerate_aggregate_refs(&self, address: &str, options: &PipelineOptions) -> Result<Vec<RecordRef>> {
        options.validate()?;
        self.progress.set_phase(ProgressPhase::FetchingList, "Listing records");

        RecordEnumerator::new(self.client.clone())
            .with_progress(self.progress.clone())
            .enumerate(address, &options.enumerate_options())
            .await
            .map_err(|e| {
                self.progress.set_message(format!("Listing records failed: {e}"));
                FetchPipelineError::EnumerationError(e)
            })
    }

    /// One outcome per hash, in input order. Individual failures never fail the call.
    pub async fn fetch_bodies(&self, hashes: &[String], options: &PipelineOptions) -> Result<Vec<FetchOutcome>> {
        options.validate()?;
        Ok(BulkFetcher::new(self.client.clone(), self.progress.clone())
            .fetch_all(hashes, &options.fetch_options())
            .await)
    }

    pub fn reassemble(&self, records: &[RawRecord], options: &PipelineOptions) -> Result<ReconstructedPayload> {
        self.progress.set_phase(ProgressPhase::Processing, "Reassembling payload");
        Reassembler::new(options.reassemble_options())
            .reassemble(records)
            .map_err(|e| {
                self.progress.set_message(format!("Reassembly failed: {e}"));
                e.into()
            })
    }

    /// List, fetch and reassemble everything stored under `address`.
    ///
    /// Records that cannot be fetched are left out of the reassembly and listed in the outcome; the gap
    /// report shows which sequence keys they leave missing.
    #[instrument(skip_all, name = "PayloadFetcher::download", fields(address = %address))]
    pub async fn download(&self, address: &str, options: &PipelineOptions) -> Result<DownloadOutcome> {
        self.progress.reset();

        let refs = self.enumerate_aggregate_refs(address, options).await?;
        let hashes: Vec<String> = refs.iter().map(|r| r.content_hash.clone()).collect();

        let outcomes = self.fetch_bodies(&hashes, options).await?;

        let mut failed = Vec::new();
        let mut records = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let hash = outcome.hash.clone();
            match outcome.into_result() {
                Ok(record) => records.push(record),
                Err(e) => failed.push(FailedFetch {
                    hash,
                    error: e.to_string(),
                }),
            }
        }
        if !failed.is_empty() {
            warn!(failed = failed.len(), total = hashes.len(), "Some records could not be fetched");
        }

        // Reassembly is CPU bound and may run over a large payload.
        let progress = self.progress.clone();
        let reassemble_options = options.reassemble_options();
        progress.set_phase(ProgressPhase::Processing, "Reassembling payload");
        let reconstruction = tokio::task::spawn_blocking(move || {
            Reassembler::new(reassemble_options).reassemble(&records)
        })
        .await?
        .map_err(|e| {
            progress.set_message(format!("Reassembly failed: {e}"));
            FetchPipelineError::from(e)
        })?;

        self.progress.complete(format!(
            "Reassembled {} bytes from {} records",
            reconstruction.header.size, reconstruction.report.groups_used
        ));
        info!(
            address,
            records = refs.len(),
            failed = failed.len(),
            bytes = reconstruction.header.size,
            "Download complete"
        );

        Ok(DownloadOutcome {
            refs,
            failed,
            reconstruction,
        })
    }
}

#[cfg(test)]
mod tests {
    use chain_config::ChainConfig;
    use chain_types::testing::{aggregate_record, record_hash};
    use replica_client::LocalClient;

    use super::*;

    fn options() -> PipelineOptions {
        PipelineOptions {
            retries: 1,
            base_delay_ms: 1,
            concurrency: 3,
            ..PipelineOptions::from_config(&ChainConfig::default())
        }
    }

    fn client_with(keys: &[u64]) -> Arc<LocalClient> {
        let client = LocalClient::new(2);
        for key in keys {
            client.insert(aggregate_record(*key, &[&format!("[{key}]")]));
        }
        client
    }

    #[tokio::test]
    async fn test_download_runs_all_phases() {
        let fetcher = PayloadFetcher::new(client_with(&[2, 0, 1]));

        let outcome = fetcher.download("TADDR", &options()).await.unwrap();
        assert_eq!(outcome.refs.len(), 3);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.reconstruction.payload, b"[0][1][2]");

        let progress = fetcher.get_progress();
        assert_eq!(progress.phase, ProgressPhase::Complete);
        assert_eq!(progress.percentage, 100.);
        assert_eq!(progress.details.unwrap().fetched, 3);

        fetcher.reset_progress();
        assert_eq!(fetcher.get_progress(), ProgressSnapshot::default());
    }

    #[tokio::test]
    async fn test_failed_records_are_reported() {
        let client = client_with(&[0, 1, 2]);
        client.fail_hash(&record_hash(1), 100);
        let fetcher = PayloadFetcher::new(client);

        let outcome = fetcher.download("TADDR", &options()).await.unwrap();
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].hash, record_hash(1));
        assert_eq!(outcome.reconstruction.payload, b"[0][2]");

        let gaps = outcome.reconstruction.report.gap_analysis.unwrap();
        assert_eq!(gaps.missing_sequence_keys, [1]);
    }

    #[tokio::test]
    async fn test_enumeration_failure_keeps_phase() {
        let client = client_with(&[0, 1]);
        client.fail_pages_after(0);
        let fetcher = PayloadFetcher::new(client);

        let err = fetcher.download("TADDR", &options()).await.unwrap_err();
        assert!(matches!(err, FetchPipelineError::EnumerationError(_)));
        assert_eq!(fetcher.get_progress().phase, ProgressPhase::FetchingList);
    }

    #[tokio::test]
    async fn test_nothing_to_reassemble() {
        let fetcher = PayloadFetcher::new(LocalClient::new(1));

        let err = fetcher.download("TADDR", &options()).await.unwrap_err();
        assert!(matches!(err, FetchPipelineError::ReconstructionError(_)));
        assert_eq!(fetcher.get_progress().phase, ProgressPhase::Processing);
    }

    #[tokio::test]
    async fn test_invalid_options() {
        let fetcher = PayloadFetcher::new(client_with(&[0]));
        let options = PipelineOptions {
            concurrency: 0,
            ..options()
        };

        assert!(matches!(fetcher.download("TADDR", &options).await, Err(FetchPipelineError::ParameterError(_))));
        assert!(matches!(fetcher.fetch_bodies(&[], &options).await, Err(FetchPipelineError::ParameterError(_))));
    }

    #[test]
    fn test_reassemble_sets_phase() {
        let fetcher = PayloadFetcher::new(LocalClient::new(1));
        let result = fetcher.reassemble(&[aggregate_record(4, &["x"])], &options()).unwrap();
        assert_eq!(result.payload, b"x");
        assert_eq!(fetcher.get_progress().phase, ProgressPhase::Processing);
    }
}
