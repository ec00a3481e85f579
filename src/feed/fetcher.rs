use crate::config::Config;
use crate::util::{validate_url, HostPolicy, UrlValidationError};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while retrieving a document.
///
/// These cover the full lifecycle of a request: URL checks, network issues,
/// HTTP status codes and body limits.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL refused before any request was sent
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// A GET-capable text fetch.
///
/// The pipeline only ever asks for a document body as text. Retries,
/// redirects and timeouts are the implementation's business.
pub trait Transport: Send + Sync {
    fn get_text(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// [`Transport`] backed by a `reqwest` client.
///
/// # Behavior
///
/// - Only `http`/`https` URLs are requested, subject to the [`HostPolicy`]
/// - Each request has a per-request timeout
/// - HTTP 429 and 5xx trigger exponential backoff up to `max_retries`
/// - Other non-2xx statuses fail immediately
/// - Bodies are limited to `max_body_bytes`; truncated bodies are retried
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    max_body_bytes: usize,
    host_policy: HostPolicy,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout(),
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
            max_body_bytes: config.max_body_bytes,
            host_policy: config.host_policy(),
        })
    }

    fn backoff(&self, retry_count: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(retry_count))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let validated = validate_url(url, self.host_policy)?;
        let mut retry_count = 0;

        loop {
            let request = self
                .client
                .get(validated.clone())
                .header(reqwest::header::ACCEPT, "*/*");

            let response = tokio::time::timeout(self.timeout, request.send())
                .await
                .map_err(|_| FetchError::Timeout)?
                .map_err(FetchError::Network)?;

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= self.max_retries {
                    return Err(FetchError::RateLimited(self.max_retries));
                }

                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %url,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );

                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if status.is_server_error() {
                if retry_count >= self.max_retries {
                    return Err(FetchError::HttpStatus(status.as_u16()));
                }

                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %url,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying after delay"
                );

                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            // 4xx and other non-success statuses are not retried
            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            let body = tokio::time::timeout(
                self.timeout,
                read_limited_bytes(response, self.max_body_bytes),
            )
            .await
            .map_err(|_| FetchError::Timeout)?;

            match body {
                Ok(bytes) => return Ok(bytes),
                Err(FetchError::IncompleteResponse { expected, received }) => {
                    if retry_count >= self.max_retries {
                        return Err(FetchError::IncompleteResponse { expected, received });
                    }

                    let delay = self.backoff(retry_count);
                    tracing::debug!(
                        url = %url,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying incomplete download"
                    );

                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let bytes = self.fetch_bytes(url).await?;
        tracing::debug!(url = %url, bytes = bytes.len(), "Fetched document");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // Fewer bytes than Content-Length means the connection dropped mid-body
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
