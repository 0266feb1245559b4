use std::collections::HashSet;
use std::sync::Arc;

use chain_config::{EnumerationConfig, chain_config};
use chain_types::{RecordOrder, RecordRef};
use progress_tracking::ProgressPublisher;
use tracing::{debug, info, instrument, warn};

use crate::Client;
use crate::error::{ReplicaClientError, Result};
use crate::interface::{IndexFilter, PageRequest};

/// The page sizes accepted by the record index.
pub const MIN_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerateOptions {
    pub filter: IndexFilter,
    /// Record type filter codes; only sent with [`IndexFilter::Address`].
    pub record_types: Vec<u16>,
    pub page_size: usize,
    pub order: RecordOrder,
    /// The replica to page through. Cursors are not portable between replicas, so a whole enumeration
    /// stays on one.
    pub replica: usize,
}

impl EnumerateOptions {
    pub fn from_config(config: &EnumerationConfig) -> Self {
        let order = config.order.parse().unwrap_or_else(|e| {
            warn!("{e}; using the default order");
            RecordOrder::default()
        });

        Self {
            filter: IndexFilter::Address,
            record_types: config.record_types.clone(),
            page_size: config.page_size,
            order,
            replica: 0,
        }
    }

    pub fn with_filter(mut self, filter: IndexFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_record_types(mut self, record_types: impl Into<Vec<u16>>) -> Self {
        self.record_types = record_types.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_order(mut self, order: RecordOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_replica(mut self, replica: usize) -> Self {
        self.replica = replica;
        self
    }

    /// The page size actually requested.
    pub fn effective_page_size(&self) -> usize {
        self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }
}

impl Default for EnumerateOptions {
    fn default() -> Self {
        Self::from_config(&chain_config().enumeration)
    }
}

/// Walks the filtered record index of one replica with the server's cursor.
///
/// Every page is requested as page 1 with `offset` set to the id of the last record seen, which keeps the
/// walk stable while new records are confirmed.  The walk stops at the first empty page, or as soon as the
/// cursor cannot move forward.  Any failed page aborts the whole enumeration, since a partial list of
/// hashes cannot be told apart from a complete one.
pub struct RecordEnumerator {
    client: Arc<dyn Client>,
    progress: Option<Arc<ProgressPublisher>>,
}

impl RecordEnumerator {
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self { client, progress: None }
    }

    pub fn with_progress(mut self, progress: Arc<ProgressPublisher>) -> Self {
        self.progress = Some(progress);
        self
    }

    #[instrument(skip_all, name = "RecordEnumerator::enumerate", fields(address = %address))]
    pub async fn enumerate(&self, address: &str, options: &EnumerateOptions) -> Result<Vec<RecordRef>> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ReplicaClientError::InvalidArguments("an address is required".into()));
        }

        let page_size = options.effective_page_size();
        if page_size != options.page_size {
            warn!(requested = options.page_size, page_size, "Page size out of range; clamped");
        }

        let mut request = PageRequest {
            address: address.to_owned(),
            filter: options.filter,
            record_types: options.record_types.clone(),
            page_size,
            page_number: 1,
            order: options.order,
            offset: None,
        };

        let mut seen = HashSet::new();
        let mut refs = Vec::new();
        let mut pages = 0usize;

        loop {
            let page = self.client.get_record_page(options.replica, &request).await?;
            if page.data.is_empty() {
                break;
            }
            pages += 1;

            let mut duplicates = 0usize;
            for record in &page.data {
                let Some(record_ref) = record.to_record_ref() else {
                    warn!(record_id = ?record.id, "Index entry without a content hash; skipped");
                    continue;
                };
                if seen.insert(record_ref.content_hash.clone()) {
                    refs.push(record_ref);
                } else {
                    duplicates += 1;
                }
            }

            debug!(page = pages, records = page.data.len(), duplicates, total = refs.len(), "Fetched index page");

            if let Some(progress) = &self.progress {
                progress.set_message(format!("Fetched page {pages}, {} records so far", refs.len()));
            }

            match page.data.last().and_then(|r| r.id.clone()) {
                None => {
                    warn!(page = pages, "Last record of the page has no id; stopping enumeration");
                    break;
                },
                Some(id) if request.offset.as_deref() == Some(id.as_str()) => {
                    warn!(page = pages, cursor = %id, "Cursor did not advance; stopping enumeration");
                    break;
                },
                Some(id) => request.offset = Some(id),
            }
        }

        info!(address, pages, records = refs.len(), "Enumeration complete");
        Ok(refs)
    }
}
