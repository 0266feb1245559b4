pub use bulk_fetch::{BulkFetcher, FetchOptions, FetchOutcome};
pub use http_client::{Api, RequestLogger, build_http_client};
pub use interface::{Client, IndexFilter, PageRequest};
pub use local_client::LocalClient;
pub use record_index::{EnumerateOptions, MAX_PAGE_SIZE, MIN_PAGE_SIZE, RecordEnumerator};
pub use remote_client::RemoteClient;
pub use replica_pool::ReplicaPool;
pub use retry_wrapper::{RetryPolicy, RetryWrapper};
use tracing::Level;

pub use crate::error::{ReplicaClientError, Result};

pub mod bulk_fetch;
mod error;
pub mod http_client;
mod interface;
pub mod local_client;
pub mod record_index;
pub mod remote_client;
pub mod replica_pool;
pub mod retry_wrapper;

#[cfg(not(feature = "elevated_information_level"))]
pub const INFORMATION_LOG_LEVEL: Level = Level::DEBUG;

#[cfg(feature = "elevated_information_level")]
pub const INFORMATION_LOG_LEVEL: Level = Level::INFO;
