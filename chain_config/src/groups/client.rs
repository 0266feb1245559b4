use std::time::Duration;

crate::config_group!({

    /// The number of retries after the first attempt of a per-record fetch.
    /// Each retry goes to the next replica in the pool.
    ///
    /// Use the environment variable `CHAINFETCH_CLIENT_RETRY_MAX_ATTEMPTS` to set this value.
    ref retry_max_attempts: usize = 3;

    /// The base delay of the exponential backoff; retry `k` waits `retry_base_delay * 2^k`.
    ///
    /// Use the environment variable `CHAINFETCH_CLIENT_RETRY_BASE_DELAY` to set this value.
    ref retry_base_delay: Duration = Duration::from_millis(500);

    /// Randomize every backoff delay below its exponential value.
    ///
    /// Use the environment variable `CHAINFETCH_CLIENT_RETRY_JITTER` to set this value.
    ref retry_jitter: bool = false;

    /// The number of record bodies fetched concurrently.
    ///
    /// Use the environment variable `CHAINFETCH_CLIENT_FETCH_CONCURRENCY` to set this value.
    ref fetch_concurrency: usize = 8;

    /// Timeout applied to every HTTP request.
    ///
    /// Use the environment variable `CHAINFETCH_CLIENT_REQUEST_TIMEOUT` to set this value.
    ref request_timeout: Duration = Duration::from_secs(30);

    /// The route of the confirmed record collection on every replica.
    ///
    /// Use the environment variable `CHAINFETCH_CLIENT_RECORD_ROUTE` to set this value.
    ref record_route: String = "/records/confirmed".to_string();

    /// User agent sent with every request.
    ref user_agent: String = concat!("chainfetch/", env!("CARGO_PKG_VERSION")).to_string();
});
