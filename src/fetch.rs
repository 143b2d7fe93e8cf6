use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// User-Agent sent on every outbound request.
pub const USER_AGENT: &str = concat!("newswire/", env!("CARGO_PKG_VERSION"));

/// Maximum response body size (10MB). Feeds larger than this are broken.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

const DEFAULT_TIMEOUT_MS: u64 = 8000;

/// Hard per-call deadline for one outbound request.
///
/// Every network call takes one of these explicitly; there is no global
/// pipeline deadline and deadlines never cascade. Expiry cancels only the
/// one in-flight call it guards (the future is dropped, which aborts the
/// request).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Duration);

impl Deadline {
    pub fn from_millis(ms: u64) -> Self {
        Deadline(Duration::from_millis(ms))
    }

    pub fn duration(self) -> Duration {
        self.0
    }
}

impl Default for Deadline {
    /// 8 seconds, shared by feed fetches and link resolution.
    fn default() -> Self {
        Deadline::from_millis(DEFAULT_TIMEOUT_MS)
    }
}

/// Errors a single fetch attempt can produce.
///
/// There are no retries anywhere in this service (a failed call is final
/// for the invocation), so the variants cover exactly what one attempt
/// can hit.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// No response within the deadline
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Builds the shared HTTP client: rustls, fixed product User-Agent, and
/// the default redirect-following policy (the link resolver depends on
/// redirects being followed).
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().user_agent(USER_AGENT).build()
}

/// Performs one GET with a hard deadline and returns the raw body bytes.
///
/// A single attempt only: any non-success status, transport error, or
/// deadline expiry is a failure. The deadline covers the whole exchange,
/// headers and body both.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    deadline: Deadline,
) -> Result<Vec<u8>, FetchError> {
    let exchange = async {
        let response = client.get(url).send().await.map_err(FetchError::Network)?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }
        read_limited_bytes(response, MAX_BODY_SIZE).await
    };

    tokio::time::timeout(deadline.duration(), exchange)
        .await
        .map_err(|_| FetchError::Timeout)?
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
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

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let bytes = fetch_bytes(&client, &mock_server.uri(), Deadline::default())
            .await
            .unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn test_fetch_404_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let result = fetch_bytes(&client, &mock_server.uri(), Deadline::default()).await;
        match result.unwrap_err() {
            FetchError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_times_out_without_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_secs(5)),
            )
            .expect(1) // single attempt, no retries
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let result =
            fetch_bytes(&client, &mock_server.uri(), Deadline::from_millis(100)).await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_fetch_500_fails_immediately() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1) // no retry on server errors either
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let result = fetch_bytes(&client, &mock_server.uri(), Deadline::default()).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(500))));
    }

    #[tokio::test]
    async fn test_connection_error() {
        // Port 1 is essentially guaranteed to refuse connections
        let client = build_client().unwrap();
        let result = fetch_bytes(&client, "http://127.0.0.1:1/feed", Deadline::default()).await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }
}
