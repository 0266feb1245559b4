use url::Url;

use crate::error::{ReplicaClientError, Result};

/// The set of equivalent read endpoints.
///
/// Endpoints are normalized without a trailing slash so routes can be appended directly.
#[derive(Debug)]
pub struct ReplicaPool {
    endpoints: Vec<String>,
}

impl ReplicaPool {
    pub fn new<I, S>(endpoints: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints = endpoints
            .into_iter()
            .map(|e| {
                let e = e.as_ref().trim().trim_end_matches('/');
                Url::parse(e)?;
                Ok(e.to_owned())
            })
            .collect::<Result<Vec<_>>>()?;

        if endpoints.is_empty() {
            return Err(ReplicaClientError::ConfigurationError("at least one replica endpoint is required".into()));
        }

        Ok(Self { endpoints })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// The endpoint at `index`, wrapping around the pool.
    pub fn endpoint(&self, index: usize) -> &str {
        &self.endpoints[index % self.endpoints.len()]
    }

    /// Index of the replica used by a worker on a given attempt; consecutive attempts rotate
    /// through the pool.
    pub fn index_for_attempt(&self, worker_id: usize, attempt: usize) -> usize {
        worker_id.wrapping_add(attempt) % self.endpoints.len()
    }
}
