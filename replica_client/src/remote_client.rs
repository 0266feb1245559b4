use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chain_config::{ChainConfig, chain_config};
use chain_types::{RawRecord, RecordPage};
use lazy_static::lazy_static;
use reqwest::{Response, StatusCode, Url};
use reqwest_middleware::ClientWithMiddleware;
use tracing::{event, instrument};

use crate::error::{ReplicaClientError, Result};
use crate::http_client::{self, Api};
use crate::interface::{IndexFilter, PageRequest};
use crate::replica_pool::ReplicaPool;
use crate::retry_wrapper::{RetryPolicy, RetryWrapper, RetryableReqwestError, parse_json_response};
use crate::{Client, INFORMATION_LOG_LEVEL};

lazy_static! {
    static ref FN_CALL_ID: AtomicU64 = AtomicU64::new(1);
}

pub struct RemoteClient {
    replicas: ReplicaPool,
    record_route: String,
    http_client: Arc<ClientWithMiddleware>,
    enumeration_policy: RetryPolicy,
}

impl RemoteClient {
    pub fn new(replicas: ReplicaPool, config: &ChainConfig) -> Result<Arc<Self>> {
        let route = config.client.record_route.trim().trim_end_matches('/');
        let record_route = if route.starts_with('/') {
            route.to_owned()
        } else {
            format!("/{route}")
        };

        Ok(Arc::new(Self {
            replicas,
            record_route,
            http_client: Arc::new(http_client::build_http_client(&config.client)?),
            enumeration_policy: RetryPolicy::new(
                config.enumeration.retry_max_attempts,
                config.client.retry_base_delay,
            ),
        }))
    }

    /// Build a client over the given endpoints with the process configuration.
    pub fn from_endpoints<I, S>(endpoints: I) -> Result<Arc<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(ReplicaPool::new(endpoints)?, chain_config())
    }

    pub fn replicas(&self) -> &ReplicaPool {
        &self.replicas
    }

    fn collection_url(&self, replica_index: usize) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.replicas.endpoint(replica_index), self.record_route))?)
    }

    pub fn page_url(&self, replica_index: usize, request: &PageRequest) -> Result<Url> {
        let mut url = self.collection_url(replica_index)?;
        {
            let mut query = url.query_pairs_mut();
            match request.filter {
                IndexFilter::Address => {
                    query.append_pair("address", &request.address);
                    for record_type in &request.record_types {
                        query.append_pair("type", &record_type.to_string());
                    }
                },
                IndexFilter::Recipient => {
                    query.append_pair("recipientAddress", &request.address);
                    query.append_pair("embedded", "true");
                },
            }
            query.append_pair("pageSize", &request.page_size.to_string());
            query.append_pair("pageNumber", &request.page_number.to_string());
            query.append_pair("order", request.order.as_str());
            if let Some(offset) = &request.offset {
                query.append_pair("offset", offset);
            }
        }
        Ok(url)
    }

    pub fn record_url(&self, replica_index: usize, hash: &str) -> Result<Url> {
        let mut url = self.collection_url(replica_index)?;
        let not_a_base = format!("cannot append a path to {url}");
        url.path_segments_mut()
            .map_err(|_| ReplicaClientError::ConfigurationError(not_a_base))?
            .push(hash);
        Ok(url)
    }
}

/// Parse a record body and check it is the record that was asked for.
///
/// A replica answering with a different hash is treated as a retryable failure; the next attempt goes
/// to another replica.  Bodies without a hash are attributed to the requested one.
async fn check_record_response(requested: String, resp: Response) -> std::result::Result<RawRecord, RetryableReqwestError> {
    let mut record: RawRecord = parse_json_response(resp).await?;

    match record.meta.hash.as_deref() {
        Some(received) if !received.eq_ignore_ascii_case(&requested) => {
            Err(RetryableReqwestError::RetryableError(ReplicaClientError::RecordMismatch {
                requested,
                received: received.to_owned(),
            }))
        },
        Some(_) => Ok(record),
        None => {
            record.meta.hash = Some(requested);
            Ok(record)
        },
    }
}

#[async_trait::async_trait]
impl Client for RemoteClient {
    fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    #[instrument(skip_all, name = "RemoteClient::get_record_page", fields(replica = replica_index, offset = ?request.offset))]
    async fn get_record_page(&self, replica_index: usize, request: &PageRequest) -> Result<RecordPage> {
        let url = self.page_url(replica_index, request)?;

        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);
        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            %url,
            "Starting get_record_page API call",
        );

        let api_tag = "replica::get_record_page";
        let client = self.http_client.clone();

        let page: RecordPage = RetryWrapper::new(api_tag)
            .with_policy(self.enumeration_policy.clone())
            .run_and_extract_json(move |_attempt| client.get(url.clone()).with_extension(Api(api_tag)).send())
            .await?;

        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            record_count = page.data.len(),
            "Completed get_record_page API call",
        );

        Ok(page)
    }

    #[instrument(skip_all, name = "RemoteClient::get_record", fields(record.hash = hash))]
    async fn get_record(&self, hash: &str, first_replica: usize, policy: &RetryPolicy) -> Result<RawRecord> {
        if hash.is_empty() {
            return Err(ReplicaClientError::InvalidArguments("empty record hash".into()));
        }

        // One url per replica, in the order the attempts visit them.
        let urls = (0..self.replicas.len())
            .map(|k| self.record_url(self.replicas.index_for_attempt(first_replica, k), hash))
            .collect::<Result<Vec<_>>>()?;

        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);
        event!(INFORMATION_LOG_LEVEL, call_id, hash, first_replica, "Starting get_record API call");

        let api_tag = "replica::get_record";
        let client = self.http_client.clone();
        let requested = hash.to_owned();

        let result = RetryWrapper::new(api_tag)
            .with_policy(policy.clone())
            .with_retry_on_all_failures()
            .log_errors_as_info()
            .run_and_process(
                move |attempt| client.get(urls[attempt % urls.len()].clone()).with_extension(Api(api_tag)).send(),
                move |resp| check_record_response(requested.clone(), resp),
            )
            .await;

        match result {
            Ok(record) => {
                event!(INFORMATION_LOG_LEVEL, call_id, hash, "Completed get_record API call");
                Ok(record)
            },
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => Err(ReplicaClientError::RecordNotFound(hash.to_owned())),
            Err(e) => Err(e),
        }
    }
}
