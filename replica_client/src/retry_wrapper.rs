use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chain_config::{ClientConfig, chain_config};
use reqwest::{Error as ReqwestError, Response};
use reqwest_retry::{Retryable, default_on_request_success};
use tokio_retry::RetryIf;
use tokio_retry::strategy::jitter;
use tracing::{error, info};

use crate::error::ReplicaClientError;

#[derive(Debug)]
pub enum RetryableReqwestError {
    FatalError(ReplicaClientError),
    RetryableError(ReplicaClientError),
}

type BackoffFn = Arc<dyn Fn(usize) -> Duration + Send + Sync>;

/// How often and how long to wait between attempts.
///
/// `max_retries` counts the retries after the first attempt, so at most `max_retries + 1` requests are
/// made. Before retry `k + 1` the caller waits `backoff(k)`, which is `base_delay * 2^k` unless a custom
/// backoff function is installed.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    base_delay: Duration,
    backoff_fn: Option<BackoffFn>,
    jitter: bool,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("custom_backoff", &self.backoff_fn.is_some())
            .field("jitter", &self.jitter)
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&chain_config().client)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff_fn: None,
            jitter: false,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let policy = Self::new(config.retry_max_attempts, config.retry_base_delay);
        if config.retry_jitter { policy.with_jitter() } else { policy }
    }

    /// Replace the exponential schedule, e.g. with a zero delay in tests.
    pub fn with_backoff_fn(mut self, backoff: impl Fn(usize) -> Duration + Send + Sync + 'static) -> Self {
        self.backoff_fn = Some(Arc::new(backoff));
        self
    }

    /// Randomize each delay within `[0, delay)`.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn backoff(&self, attempt: usize) -> Duration {
        if let Some(f) = &self.backoff_fn {
            return f(attempt);
        }
        let factor = 2u32.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX));
        self.base_delay.saturating_mul(factor)
    }

    /// The delays slept between attempts, in order; one per retry.
    pub fn delays(&self) -> Vec<Duration> {
        (0..self.max_retries)
            .map(|attempt| self.backoff(attempt))
            .map(|d| if self.jitter { jitter(d) } else { d })
            .collect()
    }
}

pub struct RetryWrapper {
    policy: RetryPolicy,
    retry_on_all_failures: bool,
    log_errors_as_info: bool,
    api_tag: &'static str,
}

impl RetryWrapper {
    pub fn new(api_tag: &'static str) -> Self {
        Self {
            policy: RetryPolicy::default(),
            retry_on_all_failures: false,
            log_errors_as_info: false,
            api_tag,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.policy.max_retries = retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    /// Treat every failure, including 4xx statuses and malformed bodies, as transient. Used when the
    /// next attempt goes to a different replica that may well have the answer.
    pub fn with_retry_on_all_failures(mut self) -> Self {
        self.retry_on_all_failures = true;
        self
    }

    pub fn log_errors_as_info(mut self) -> Self {
        self.log_errors_as_info = true;
        self
    }

    fn classify(&self, retryable: bool, err: ReplicaClientError) -> RetryableReqwestError {
        if retryable || self.retry_on_all_failures {
            RetryableReqwestError::RetryableError(err)
        } else {
            RetryableReqwestError::FatalError(err)
        }
    }

    fn process_error_response(&self, try_idx: usize, err: reqwest_middleware::Error) -> RetryableReqwestError {
        let api = &self.api_tag;

        let log_error = |txt: &str, log_as_info: bool, err: &reqwest_middleware::Error| {
            let msg = if try_idx > 0 {
                format!("{txt}: {api} api call failed (retry {try_idx}): {err}")
            } else {
                format!("{txt}: {api} api call failed: {err}")
            };

            info!(api = self.api_tag, "Connection attempt {}/{}", try_idx + 1, self.policy.max_attempts());

            if self.log_errors_as_info || log_as_info {
                info!("{msg}");
            } else {
                error!("{msg}");
            }
        };

        match on_request_failure(&err) {
            Retryable::Transient => {
                log_error("Retryable Client Error", true, &err);
                self.classify(true, err.into())
            },
            Retryable::Fatal => {
                log_error("Fatal Client Error", self.retry_on_all_failures, &err);
                self.classify(false, err.into())
            },
        }
    }

    fn process_ok_response(&self, try_idx: usize, resp: Response) -> Result<Response, RetryableReqwestError> {
        let retry_str = if try_idx == 0 {
            String::default()
        } else {
            format!(", retry {try_idx}")
        };

        let api = &self.api_tag;
        let url = resp.url().clone();

        let log_error = |context: &str, err: &ReqwestError, log_as_info: bool| {
            if self.log_errors_as_info || log_as_info {
                info!("{context}: {api:?} api call failed ({url}{retry_str}): {err}");
            } else {
                error!("{context}: {api:?} api call failed ({url}{retry_str}): {err}");
            }
        };

        let retriability = default_on_request_success(&resp);

        match (resp.error_for_status(), retriability) {
            (Err(e), Some(Retryable::Transient)) => {
                log_error("Retryable Error", &e, true);
                Err(self.classify(true, e.into()))
            },
            (Err(e), Some(Retryable::Fatal)) => {
                log_error("Fatal Error", &e, self.retry_on_all_failures);
                Err(self.classify(false, e.into()))
            },
            (Err(e), None) => {
                // A non-success status without a classification; the library should not produce this.
                log_error("Unknown Error", &e, false);
                Err(self.classify(false, e.into()))
            },
            (Ok(result), _) => {
                info!("Request Success: {api} api call succeeded ({url}{retry_str}).");
                Ok(result)
            },
        }
    }

    /// Run a request and process the result, retrying on transient errors or if `process_fn` returns a
    /// retryable error.
    ///
    /// `make_request` receives the zero based attempt index and returns the request future, e.g.
    /// `move |attempt| client.get(urls[attempt % urls.len()].clone()).send()`.  Passing the attempt lets
    /// callers send each retry to a different replica.
    ///
    /// `process_fn` turns a successful response into the output.  A `RetryableError` from it restarts the
    /// whole request; a `FatalError` is returned immediately.
    pub async fn run_and_process<T, ReqFut, ReqFn, ProcFut, ProcFn>(
        self,
        make_request: ReqFn,
        process_fn: ProcFn,
    ) -> Result<T, ReplicaClientError>
    where
        ReqFn: Fn(usize) -> ReqFut + Send + Sync + 'static,
        ReqFut: Future<Output = Result<Response, reqwest_middleware::Error>> + 'static,
        ProcFn: Fn(Response) -> ProcFut + Send + 'static,
        ProcFut: Future<Output = Result<T, RetryableReqwestError>> + 'static,
    {
        let strategy = self.policy.delays();

        info!(
            api = self.api_tag,
            max_retries = self.policy.max_retries,
            base_delay=?self.policy.base_delay,
            retry_on_all_failures = self.retry_on_all_failures,
            "Retry strategy",
        );

        let self_ = Arc::new(self);
        let try_count = AtomicUsize::new(0);
        let retry_info = Arc::new((make_request, process_fn, try_count, self_.clone()));

        let result = RetryIf::spawn(
            strategy,
            move || {
                let retry_info = retry_info.clone();

                async move {
                    let (make_request, process_fn, try_count, self_) = retry_info.as_ref();

                    let try_idx = try_count.fetch_add(1, Ordering::Relaxed);
                    let resp_result = make_request(try_idx).await;

                    let checked_result = match resp_result {
                        Err(e) => Err(self_.process_error_response(try_idx, e)),
                        Ok(resp) => self_.process_ok_response(try_idx, resp),
                    };

                    match checked_result {
                        Ok(ok_response) => process_fn(ok_response).await,
                        Err(e) => Err(e),
                    }
                }
            },
            |err: &RetryableReqwestError| matches!(err, RetryableReqwestError::RetryableError(_)),
        )
        .await;

        match result {
            Ok(r) => Ok(r),
            Err(RetryableReqwestError::FatalError(e)) => Err(e),
            Err(RetryableReqwestError::RetryableError(e)) => {
                if self_.log_errors_as_info {
                    info!("No more retries; aborting: {e}");
                } else {
                    error!("No more retries; aborting: {e}");
                }

                Err(e)
            },
        }
    }

    /// Run a request and deserialize the body as json, retrying on transient errors or on a truncated or
    /// corrupted body.
    pub async fn run_and_extract_json<JsonDest, ReqFn, ReqFut>(
        self,
        make_request: ReqFn,
    ) -> Result<JsonDest, ReplicaClientError>
    where
        JsonDest: for<'de> serde::Deserialize<'de>,
        ReqFn: Fn(usize) -> ReqFut + Send + Sync + 'static,
        ReqFut: Future<Output = Result<Response, reqwest_middleware::Error>> + 'static,
    {
        self.run_and_process(make_request, |resp: Response| async move { parse_json_response(resp).await })
            .await
    }
}

/// Deserialize a response body, classifying transport-level body failures as retryable.
pub async fn parse_json_response<T>(resp: Response) -> Result<T, RetryableReqwestError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    match resp.json::<T>().await {
        Ok(v) => Ok(v),
        Err(e) => {
            if e.is_connect() || e.is_decode() || e.is_body() || e.is_timeout() {
                // Incomplete or corrupted response, possibly a dropped connection.
                Err(RetryableReqwestError::RetryableError(e.into()))
            } else {
                Err(RetryableReqwestError::FatalError(e.into()))
            }
        },
    }
}

/// Like `reqwest_retry::default_on_request_failure`, but retries every io error in the source chain
/// instead of a subset.
pub fn on_request_failure(error: &reqwest_middleware::Error) -> Retryable {
    let reqwest_middleware::Error::Reqwest(error) = error else {
        return Retryable::Fatal;
    };

    if error.is_timeout() || error.is_connect() {
        Retryable::Transient
    } else if error.is_body() || error.is_decode() || error.is_builder() || error.is_redirect() {
        Retryable::Fatal
    } else if error.is_request() && get_source_error_type::<std::io::Error>(error).is_some() {
        // Connection cut while the response was in flight.
        Retryable::Transient
    } else {
        Retryable::Fatal
    }
}

/// Downcasts the given err source into T.
fn get_source_error_type<T: std::error::Error + 'static>(err: &dyn std::error::Error) -> Option<&T> {
    let mut source = err.source();

    while let Some(err) = source {
        if let Some(err) = err.downcast_ref::<T>() {
            return Some(err);
        }

        source = err.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use reqwest::StatusCode;
    use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
    use serde::{Deserialize, Serialize};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    impl RetryWrapper {
        /// Run a request and return the raw response.
        async fn run<ReqFut, ReqFn>(self, make_request: ReqFn) -> Result<Response, ReplicaClientError>
        where
            ReqFn: Fn(usize) -> ReqFut + Send + Sync + 'static,
            ReqFut: Future<Output = Result<Response, reqwest_middleware::Error>> + 'static,
        {
            self.run_and_process(make_request, |resp| async move { Ok(resp) }).await
        }
    }

    fn connection_wrapper(api: &'static str) -> RetryWrapper {
        RetryWrapper::new(api)
            .with_base_delay(Duration::from_millis(5))
            .with_max_retries(3)
    }

    fn make_client() -> ClientWithMiddleware {
        ClientBuilder::new(reqwest::Client::new()).build()
    }

    #[test]
    fn test_policy_backoff_doubles() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.delays(), vec![100, 200, 400, 800].into_iter().map(Duration::from_millis).collect::<Vec<_>>());
        assert!(policy.backoff(200) >= policy.backoff(31));
    }

    #[test]
    fn test_policy_injected_backoff_and_jitter() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1)).with_backoff_fn(|attempt| Duration::from_millis(attempt as u64));
        assert_eq!(policy.delays(), vec![Duration::ZERO, Duration::from_millis(1), Duration::from_millis(2)]);

        let jittered = RetryPolicy::new(5, Duration::from_millis(10)).with_jitter();
        for (k, d) in jittered.delays().into_iter().enumerate() {
            assert!(d <= jittered.backoff(k));
        }

        assert!(RetryPolicy::new(0, Duration::from_millis(1)).delays().is_empty());
    }

    #[test]
    fn test_policy_from_config() {
        let config = ClientConfig {
            retry_max_attempts: 4,
            retry_base_delay: Duration::from_millis(8),
            ..ClientConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.delays().last(), Some(&Duration::from_millis(64)));
        assert!(format!("{policy:?}").contains("jitter: false"));

        let jittered = RetryPolicy::from_config(&ClientConfig {
            retry_jitter: true,
            ..config
        });
        assert!(format!("{jittered:?}").contains("jitter: true"));
        for (k, d) in jittered.delays().into_iter().enumerate() {
            assert!(d <= jittered.backoff(k));
        }
    }

    async fn check_success_first_try(server: &MockServer) {
        let _guard = Mock::given(method("GET"))
            .and(path("/success"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let result = connection_wrapper("check_success_first_try")
            .run(move |_attempt| {
                let url = format!("{}/success", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    async fn check_retry_then_success(server: &MockServer) {
        let _guard1 = Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount_as_scoped(server)
            .await;

        let _guard2 = Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Recovered"))
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let result = connection_wrapper("check_retry_then_success")
            .run(move |_attempt| {
                let url = format!("{}/flaky", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(url).send()
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(&result.unwrap().bytes().await.unwrap()[..], b"Recovered");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    async fn check_retry_limit_exceeded(server: &MockServer) {
        let _guard = Mock::given(method("GET"))
            .and(path("/fail"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4) // 1 initial + 3 retries
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let result = connection_wrapper("check_retry_limit_exceeded")
            .run(move |_attempt| {
                let url = format!("{}/fail", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await;

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    async fn check_non_retryable_status(server: &MockServer) {
        let _guard = Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let result = connection_wrapper("check_non_retryable_status")
            .run(move |_attempt| {
                let url = format!("{}/missing", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    async fn check_retry_on_all_failures(server: &MockServer) {
        let _guard = Mock::given(method("GET"))
            .and(path("/missing_everywhere"))
            .respond_with(ResponseTemplate::new(404))
            .expect(4)
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let result = connection_wrapper("check_retry_on_all_failures")
            .with_retry_on_all_failures()
            .run(move |_attempt| {
                let url = format!("{}/missing_everywhere", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    async fn check_attempt_index_rotates(server: &MockServer) {
        let _guard_a = Mock::given(method("GET"))
            .and(path("/replica/0"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount_as_scoped(server)
            .await;
        let _guard_b = Mock::given(method("GET"))
            .and(path("/replica/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("from replica 1"))
            .expect(1)
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let server_uri = server.uri();

        let result = connection_wrapper("check_attempt_index_rotates")
            .run(move |attempt| client.clone().get(format!("{server_uri}/replica/{}", attempt % 2)).send())
            .await
            .unwrap();

        assert_eq!(&result.bytes().await.unwrap()[..], b"from replica 1");
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct JsonData {
        text: String,
        number: u64,
    }

    async fn check_json_unexpected_eof_retry(server: &MockServer) {
        let data = JsonData {
            text: "test".into(),
            number: 42,
        };

        let json_data = serde_json::to_string(&data).unwrap();

        let _guard1 = Mock::given(method("GET"))
            .and(path("/json_flaky"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_string(&json_data[..json_data.len() - 5]))
            .up_to_n_times(1)
            .mount_as_scoped(server)
            .await;

        let _guard2 = Mock::given(method("GET"))
            .and(path("/json_flaky"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_string(&json_data))
            .expect(1)
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let ret_data: JsonData = connection_wrapper("check_json_unexpected_eof_retry")
            .run_and_extract_json(move |_attempt| {
                let url = format!("{}/json_flaky", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await
            .unwrap();

        assert_eq!(ret_data, data);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_wrapper() {
        let server = MockServer::start().await;

        // One server with scoped mocks for every check, to keep the number of open sockets down.
        check_success_first_try(&server).await;
        check_retry_then_success(&server).await;
        check_retry_limit_exceeded(&server).await;
        check_non_retryable_status(&server).await;
        check_retry_on_all_failures(&server).await;
        check_attempt_index_rotates(&server).await;
        check_json_unexpected_eof_retry(&server).await;
    }

    #[tokio::test]
    async fn test_no_retries_is_single_attempt() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = make_client();
        let uri = server.uri();

        let result = RetryWrapper::new("test_no_retries_is_single_attempt")
            .with_max_retries(0)
            .run(move |_attempt| client.clone().get(format!("{uri}/down")).send())
            .await;

        assert!(result.is_err());
    }
}
