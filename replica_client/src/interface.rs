use chain_types::{RawRecord, RecordOrder, RecordPage};

use crate::error::Result;
use crate::retry_wrapper::RetryPolicy;

/// Which side of a record the index is filtered on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexFilter {
    /// Records of the address, narrowed to the requested record types.
    #[default]
    Address,
    /// Records sent to the address, including the inner entries of aggregates.
    /// The record type filter does not apply.
    Recipient,
}

/// One request against the filtered record index of a replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub address: String,
    pub filter: IndexFilter,
    pub record_types: Vec<u16>,
    pub page_size: usize,
    pub page_number: u32,
    pub order: RecordOrder,
    /// Opaque cursor; the id of the last record of the previous page.
    pub offset: Option<String>,
}

/// A client to a pool of equivalent record replicas. The replicas
/// provide for
/// 1. paging through the records filtered by address and type
/// 2. fetching the full body of a record by its content hash
#[async_trait::async_trait]
pub trait Client: Send + Sync {
    /// Number of replicas behind this client; replica indices wrap around it.
    fn replica_count(&self) -> usize;

    /// Fetch a single index page from the replica at `replica_index`.
    ///
    /// A missing or empty `data` array is returned as an empty page, never an error.
    async fn get_record_page(&self, replica_index: usize, request: &PageRequest) -> Result<RecordPage>;

    /// Fetch the record with content hash `hash`.
    ///
    /// The first attempt goes to `first_replica`; attempt `k` goes to `first_replica + k` so that a single
    /// failing replica cannot starve a hash.  Every failure is retried up to `policy.max_retries()` times.
    async fn get_record(&self, hash: &str, first_replica: usize, policy: &RetryPolicy) -> Result<RawRecord>;
}
