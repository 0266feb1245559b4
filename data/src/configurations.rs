use std::time::Duration;

use chain_config::{ChainConfig, chain_config};
use chain_types::RecordOrder;
use payload_reconstruction::ReassembleOptions;
use replica_client::{EnumerateOptions, FetchOptions, IndexFilter, MAX_PAGE_SIZE, MIN_PAGE_SIZE, RetryPolicy};
use tracing::warn;

use crate::errors::{FetchPipelineError, Result};

/// Caller options of the fetch pipeline, covering all three phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Index page size, 10 to 100. Values outside are clamped.
    pub page_size: usize,
    /// Record type filter codes.
    pub types: Vec<u16>,
    pub order: RecordOrder,
    pub filter: IndexFilter,
    /// The replica the record index is paged from.
    pub index_replica: usize,
    pub concurrency: usize,
    /// Retries per record after the first attempt.
    pub retries: usize,
    pub base_delay_ms: u64,
    pub debug: bool,
    pub analyze_gaps: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &ChainConfig) -> Self {
        let enumeration = EnumerateOptions::from_config(&config.enumeration);
        Self {
            page_size: enumeration.page_size,
            types: enumeration.record_types,
            order: enumeration.order,
            filter: enumeration.filter,
            index_replica: enumeration.replica,
            concurrency: config.client.fetch_concurrency,
            retries: config.client.retry_max_attempts,
            base_delay_ms: config.client.retry_base_delay.as_millis() as u64,
            debug: false,
            analyze_gaps: config.reconstruction.analyze_gaps,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.filter == IndexFilter::Address && self.types.is_empty() {
            return Err(FetchPipelineError::ParameterError("at least one record type is required".into()));
        }
        if self.concurrency == 0 {
            return Err(FetchPipelineError::ParameterError("concurrency must be positive".into()));
        }
        if self.base_delay_ms == 0 {
            return Err(FetchPipelineError::ParameterError("base delay must be positive".into()));
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            warn!(page_size = self.page_size, "Page size will be clamped to {MIN_PAGE_SIZE}..={MAX_PAGE_SIZE}");
        }
        Ok(())
    }

    pub fn enumerate_options(&self) -> EnumerateOptions {
        EnumerateOptions::default()
            .with_page_size(self.page_size)
            .with_record_types(self.types.clone())
            .with_order(self.order)
            .with_filter(self.filter)
            .with_replica(self.index_replica)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
            .with_concurrency(self.concurrency)
            .with_retry_policy(RetryPolicy::new(self.retries, Duration::from_millis(self.base_delay_ms)))
    }

    pub fn reassemble_options(&self) -> ReassembleOptions {
        ReassembleOptions::default()
            .with_gap_analysis(self.analyze_gaps)
            .with_debug(self.debug)
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(chain_config())
    }
}
