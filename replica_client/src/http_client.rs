use std::time::Instant;

use chain_config::ClientConfig;
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use tracing::debug;

use crate::error::Result;

/// Request extension naming the API a request belongs to, used for logging.
#[derive(Clone, Copy, Debug)]
pub struct Api(pub &'static str);

/// Logs the outcome and latency of every request at debug level.
pub struct RequestLogger;

#[async_trait::async_trait]
impl Middleware for RequestLogger {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let api = extensions.get::<Api>().map(|a| a.0).unwrap_or("unknown");
        let url = req.url().clone();
        let start = Instant::now();

        let result = next.run(req, extensions).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(resp) => debug!(api, %url, status = resp.status().as_u16(), elapsed_ms, "HTTP request completed"),
            Err(e) => debug!(api, %url, error = %e, elapsed_ms, "HTTP request failed"),
        }

        result
    }
}

/// Builds the shared HTTP client. Retries are not part of the middleware stack; they are
/// driven by [`crate::retry_wrapper::RetryWrapper`] so each attempt can go to a different replica.
pub fn build_http_client(config: &ClientConfig) -> Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(config.user_agent.as_str())
        .build()?;

    Ok(ClientBuilder::new(client).with(RequestLogger).build())
}
