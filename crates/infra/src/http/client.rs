//! Retrying HTTP transport for the Dropbox API.
//!
//! Every request is bounded by the provider timeout. Transport failures come
//! back as `Network` errors; statuses are left to the caller because their
//! meaning depends on the endpoint (a 409 is routine for `create_folder_v2`).

use std::time::Duration;

use eventtracker_domain::{BackupErrorKind, ProviderConfig};
use reqwest::{Client, IntoUrl, RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::error::RemoteError;

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Shared reqwest client plus the retry policy for provider calls.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
    attempts: u32,
    backoff: Duration,
}

impl HttpClient {
    /// Client bounded by the provider's configured timeout.
    pub fn for_provider(config: &ProviderConfig) -> Result<Self, RemoteError> {
        Self::with_timeout(Duration::from_secs(config.http_timeout_secs.max(1)))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("eventtracker/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()
            .map_err(|e| {
                RemoteError::new(BackupErrorKind::Unknown, format!("HTTP client setup failed: {e}"))
            })?;
        Ok(Self { client, timeout, attempts: DEFAULT_ATTEMPTS, backoff: DEFAULT_BACKOFF })
    }

    /// Total attempts per request (at least one) and the delay before the
    /// first retry. Later retries double it.
    #[must_use]
    pub fn with_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn post(&self, url: impl IntoUrl) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send `request`, retrying rate limits, server errors and transient
    /// transport failures. Any other status is returned untouched.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let mut attempt = 1;
        loop {
            let current = request.try_clone().ok_or_else(|| {
                RemoteError::new(BackupErrorKind::Unknown, "Request body cannot be replayed")
            })?;
            let last = attempt >= self.attempts;

            match current.send().await {
                Ok(response) if !last && is_retryable(response.status()) => {
                    debug!(
                        attempt,
                        status = %response.status(),
                        url = %response.url(),
                        "http.retry.status"
                    );
                }
                Ok(response) => return Ok(response),
                Err(err) if !last && is_transient(&err) => {
                    debug!(attempt, error = %err, "http.retry.transport");
                }
                Err(err) => return Err(self.transport_error(&err)),
            }

            tokio::time::sleep(self.backoff_for(attempt)).await;
            attempt += 1;
        }
    }

    /// Classify a reqwest failure, including one hit while streaming a body.
    pub fn transport_error(&self, err: &reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::network(format!("request timed out after {:?}", self.timeout))
        } else if err.is_builder() {
            RemoteError::new(BackupErrorKind::Unknown, format!("Invalid request: {err}"))
        } else if err.is_decode() {
            RemoteError::malformed(err)
        } else {
            RemoteError::network(err)
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.backoff.saturating_mul(1 << shift)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(attempts: u32) -> HttpClient {
        HttpClient::with_timeout(Duration::from_secs(5))
            .unwrap()
            .with_retries(attempts, Duration::from_millis(5))
    }

    /// Validates that rate limits and server errors are retried until the
    /// provider recovers.
    ///
    /// Assertions:
    /// - Ensures a 429 and a 503 are each retried.
    /// - Ensures the third attempt's 200 is returned.
    #[tokio::test]
    async fn test_retries_rate_limits_and_server_errors() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        Mock::given(method("POST"))
            .respond_with(move |_: &wiremock::Request| {
                match seen.fetch_add(1, Ordering::SeqCst) {
                    0 => ResponseTemplate::new(429),
                    1 => ResponseTemplate::new(503),
                    _ => ResponseTemplate::new(200),
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let http = client(3);
        let response = http.send(http.post(server.uri()).body(b"sealed".to_vec())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    /// Validates that endpoint-level statuses reach the caller on the first
    /// attempt and that the last server error is returned once retries run out.
    #[tokio::test]
    async fn test_client_statuses_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(&server)
            .await;

        let http = client(3);
        let response = http.send(http.post(server.uri())).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let failing = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&failing)
            .await;
        let http = client(2);
        let response = http.send(http.post(failing.uri())).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    /// Validates that a slow provider surfaces as a `Network` timeout.
    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let http = HttpClient::with_timeout(Duration::from_millis(50))
            .unwrap()
            .with_retries(1, Duration::ZERO);
        let err = http.send(http.post(server.uri())).await.unwrap_err();

        assert_eq!(err.kind, BackupErrorKind::Network);
        assert!(err.message.contains("timed out after 50ms"), "{}", err.message);
    }

    /// Validates that an unreachable host is a `Network` error after retries.
    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let http = client(2);
        let err = http.send(http.post(format!("http://{addr}"))).await.unwrap_err();

        assert_eq!(err.kind, BackupErrorKind::Network);
        assert!(err.message.starts_with("Network error. Please check your connection."));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let http = client(3).with_retries(10, Duration::from_millis(100));
        assert_eq!(http.backoff_for(1), Duration::from_millis(100));
        assert_eq!(http.backoff_for(3), Duration::from_millis(400));
        assert_eq!(http.backoff_for(20), Duration::from_millis(6400));
    }
}
