use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chain_types::{RawRecord, RecordOrder, RecordPage};
use tracing::debug;

use crate::Client;
use crate::error::{ReplicaClientError, Result};
use crate::interface::PageRequest;
use crate::retry_wrapper::RetryPolicy;

/// An in-memory replica pool for testing.
///
/// Every replica serves the same records.  Failures can be injected per hash or for the index, and the
/// client keeps a log of the requests it saw so tests can check rotation and concurrency bounds.
pub struct LocalClient {
    replica_count: usize,
    records: Mutex<BTreeMap<String, RawRecord>>,
    page_log: Mutex<Vec<(usize, PageRequest)>>,
    page_overlap: AtomicUsize,
    pages_before_failure: Mutex<Option<usize>>,
    frozen_cursor: AtomicBool,
    hash_failures: Mutex<HashMap<String, usize>>,
    attempt_log: Mutex<HashMap<String, Vec<usize>>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    record_calls: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl LocalClient {
    pub fn new(replica_count: usize) -> Arc<Self> {
        Arc::new(Self {
            replica_count: replica_count.max(1),
            records: Mutex::new(BTreeMap::new()),
            page_log: Mutex::new(Vec::new()),
            page_overlap: AtomicUsize::new(0),
            pages_before_failure: Mutex::new(None),
            frozen_cursor: AtomicBool::new(false),
            hash_failures: Mutex::new(HashMap::new()),
            attempt_log: Mutex::new(HashMap::new()),
            latency: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            record_calls: AtomicUsize::new(0),
        })
    }

    /// Store a record under its id. Records without an id are indexed under their hash.
    pub fn insert(&self, record: RawRecord) {
        let key = record.id.clone().or_else(|| record.meta.hash.clone()).unwrap_or_default();
        lock(&self.records).insert(key, record);
    }

    /// Repeat the last `n` records of the previous page at the start of every following page.
    pub fn set_page_overlap(&self, n: usize) {
        self.page_overlap.store(n, Ordering::Relaxed);
    }

    /// Serve `n` index pages, then fail every following page request.
    pub fn fail_pages_after(&self, n: usize) {
        *lock(&self.pages_before_failure) = Some(n);
    }

    /// Ignore the cursor and always serve the first page.
    pub fn set_frozen_cursor(&self, frozen: bool) {
        self.frozen_cursor.store(frozen, Ordering::Relaxed);
    }

    /// Fail the next `times` fetches of `hash`.
    pub fn fail_hash(&self, hash: &str, times: usize) {
        lock(&self.hash_failures).insert(hash.to_owned(), times);
    }

    /// Delay every record fetch by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    pub fn page_requests(&self) -> Vec<PageRequest> {
        lock(&self.page_log).iter().map(|(_, r)| r.clone()).collect()
    }

    /// The replica each index page was requested from, in order.
    pub fn page_replicas(&self) -> Vec<usize> {
        lock(&self.page_log).iter().map(|(replica, _)| *replica).collect()
    }

    /// The replica indices tried for `hash`, in order.
    pub fn replicas_tried(&self, hash: &str) -> Vec<usize> {
        lock(&self.attempt_log).get(hash).cloned().unwrap_or_default()
    }

    /// Total number of single-replica fetch attempts.
    pub fn attempt_count(&self) -> usize {
        lock(&self.attempt_log).values().map(Vec::len).sum()
    }

    /// Number of `get_record` calls.
    pub fn record_calls(&self) -> usize {
        self.record_calls.load(Ordering::Relaxed)
    }

    /// The largest number of `get_record` calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::Relaxed)
    }

    fn serve_page(&self, request: &PageRequest) -> RecordPage {
        let records = lock(&self.records);

        let mut ordered: Vec<&RawRecord> = records.values().collect();
        if request.order == RecordOrder::Desc {
            ordered.reverse();
        }

        let offset = if self.frozen_cursor.load(Ordering::Relaxed) {
            None
        } else {
            request.offset.as_deref()
        };

        let start = match offset {
            None => 0,
            Some(cursor) => {
                let past_cursor = ordered
                    .iter()
                    .position(|r| {
                        let id = r.id.as_deref().unwrap_or_default();
                        match request.order {
                            RecordOrder::Asc => id > cursor,
                            RecordOrder::Desc => id < cursor,
                        }
                    })
                    .unwrap_or(ordered.len());
                past_cursor.saturating_sub(self.page_overlap.load(Ordering::Relaxed))
            },
        };

        RecordPage {
            data: ordered.into_iter().skip(start).take(request.page_size).cloned().collect(),
        }
    }

    async fn attempt(&self, hash: &str, replica: usize) -> Result<RawRecord> {
        lock(&self.attempt_log).entry(hash.to_owned()).or_default().push(replica);

        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        {
            let mut failures = lock(&self.hash_failures);
            if let Some(remaining) = failures.get_mut(hash).filter(|n| **n > 0) {
                *remaining -= 1;
                return Err(ReplicaClientError::InternalError(format!("injected failure for {hash} on replica {replica}")));
            }
        }

        lock(&self.records)
            .values()
            .find(|r| r.content_hash() == Some(hash))
            .cloned()
            .ok_or_else(|| ReplicaClientError::RecordNotFound(hash.to_owned()))
    }
}

#[async_trait]
impl Client for LocalClient {
    fn replica_count(&self) -> usize {
        self.replica_count
    }

    async fn get_record_page(&self, replica_index: usize, request: &PageRequest) -> Result<RecordPage> {
        let served = {
            let mut log = lock(&self.page_log);
            log.push((replica_index, request.clone()));
            log.len() - 1
        };

        if lock(&self.pages_before_failure).is_some_and(|n| served >= n) {
            return Err(ReplicaClientError::InternalError(format!("injected index failure on replica {replica_index}")));
        }

        Ok(self.serve_page(request))
    }

    async fn get_record(&self, hash: &str, first_replica: usize, policy: &RetryPolicy) -> Result<RawRecord> {
        self.record_calls.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut attempt = 0;
        let result = loop {
            let replica = first_replica.wrapping_add(attempt) % self.replica_count;
            match self.attempt(hash, replica).await {
                Ok(record) => break Ok(record),
                Err(e) if attempt < policy.max_retries() => {
                    debug!(hash, attempt, "Local fetch failed: {e}");
                    tokio::time::sleep(policy.backoff(attempt)).await;
                    attempt += 1;
                },
                Err(e) => break Err(e),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
