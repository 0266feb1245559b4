use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chain_config::{ClientConfig, chain_config};
use chain_types::RawRecord;
use progress_tracking::ProgressPublisher;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use crate::Client;
use crate::error::{ReplicaClientError, Result};
use crate::retry_wrapper::RetryPolicy;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Upper bound on the number of records being fetched at once.
    pub concurrency: usize,
    pub retry_policy: RetryPolicy,
}

impl FetchOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            concurrency: config.fetch_concurrency,
            retry_policy: RetryPolicy::from_config(config),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retry_policy = RetryPolicy::new(retries, self.retry_policy.base_delay());
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.retry_policy = RetryPolicy::new(self.retry_policy.max_retries(), base_delay);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&chain_config().client)
    }
}

/// The result of fetching one hash. Exactly one of `record` and `error` is set.
#[derive(Debug)]
pub struct FetchOutcome {
    pub hash: String,
    pub record: Option<RawRecord>,
    pub error: Option<ReplicaClientError>,
}

impl FetchOutcome {
    fn new(hash: String, result: Result<RawRecord>) -> Self {
        match result {
            Ok(record) => Self {
                hash,
                record: Some(record),
                error: None,
            },
            Err(e) => Self {
                hash,
                record: None,
                error: Some(e),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.record.is_some()
    }

    pub fn into_result(self) -> Result<RawRecord> {
        match (self.record, self.error) {
            (Some(record), _) => Ok(record),
            (None, Some(e)) => Err(e),
            (None, None) => Err(ReplicaClientError::InternalError(format!("no result for {}", self.hash))),
        }
    }
}

/// Fetches full record bodies across the replica pool.
///
/// A fixed pool of `min(concurrency, hashes)` workers claims input positions from a shared atomic cursor,
/// so each position is fetched by exactly one worker.  Worker `w` starts every fetch at replica `w` and
/// moves one replica further on each retry.  A hash that still fails after its retries is reported in its
/// own slot; the rest of the batch is unaffected.
///
/// Dropping the future returned by [`BulkFetcher::fetch_all`] aborts the workers and their in-flight
/// requests.
pub struct BulkFetcher {
    client: Arc<dyn Client>,
    progress: Arc<ProgressPublisher>,
}

impl BulkFetcher {
    pub fn new(client: Arc<dyn Client>, progress: Arc<ProgressPublisher>) -> Self {
        Self { client, progress }
    }

    /// One outcome per input hash, in input order.
    #[instrument(skip_all, name = "BulkFetcher::fetch_all", fields(count = hashes.len()))]
    pub async fn fetch_all(&self, hashes: &[String], options: &FetchOptions) -> Vec<FetchOutcome> {
        let total = hashes.len();
        self.progress.begin_details(total as u64, format!("Fetching {total} records"));

        if total == 0 {
            return Vec::new();
        }

        let worker_count = options.concurrency.clamp(1, total);
        let hashes = Arc::new(hashes.to_vec());
        let cursor = Arc::new(AtomicUsize::new(0));

        info!(
            total,
            workers = worker_count,
            replicas = self.client.replica_count(),
            retries = options.retry_policy.max_retries(),
            "Starting bulk fetch"
        );

        let mut join_set = JoinSet::new();
        for worker_id in 0..worker_count {
            let client = self.client.clone();
            let progress = self.progress.clone();
            let hashes = hashes.clone();
            let cursor = cursor.clone();
            let policy = options.retry_policy.clone();

            join_set.spawn(async move {
                let mut done = Vec::new();
                loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(hash) = hashes.get(index) else {
                        break;
                    };

                    let result = client.get_record(hash, worker_id, &policy).await;
                    if let Err(e) = &result {
                        info!(hash, worker_id, "Giving up on record: {e}");
                    }

                    let snapshot = progress.record_fetched();
                    debug!(fetched = snapshot.current_step, total = snapshot.total_steps, "Record fetch finished");

                    done.push((index, result));
                }
                done
            });
        }

        let mut slots: Vec<Option<Result<RawRecord>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(done) => {
                    for (index, result) in done {
                        slots[index] = Some(result);
                    }
                },
                Err(e) => error!("Fetch worker failed: {e}"),
            }
        }

        let outcomes: Vec<FetchOutcome> = hashes
            .iter()
            .zip(slots)
            .map(|(hash, slot)| {
                let result = slot.unwrap_or_else(|| {
                    // Claimed by a worker that died before reporting.
                    self.progress.record_fetched();
                    Err(ReplicaClientError::InternalError(format!("fetch worker for {hash} did not finish")))
                });
                FetchOutcome::new(hash.clone(), result)
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(total, failed, "Bulk fetch complete");

        outcomes
    }
}
