use crate::core::error::{QuoteError, QuoteResult};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

/// HTTP client shared by every supplier.
///
/// Each request is bounded by the client timeout and must hold a permit from
/// a shared semaphore, which caps the number of concurrent outbound calls.
#[derive(Clone)]
pub struct HttpContext {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
}

impl HttpContext {
    pub fn new(timeout: Duration, max_concurrent_requests: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fxboard/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
        })
    }

    /// Issues a GET and decodes the JSON body. Every failure, including a
    /// timeout or an unparsable payload, is reported as `ProviderUnavailable`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, symbol: &str) -> QuoteResult<T> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| QuoteError::unavailable(symbol, e))?;

        debug!("Requesting {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| QuoteError::unavailable(symbol, describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuoteError::unavailable(symbol, format!("HTTP error: {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| QuoteError::unavailable(symbol, describe(&e)))?;

        serde_json::from_str(&text).map_err(|e| {
            QuoteError::unavailable(symbol, format!("Failed to parse JSON response: {e}"))
        })
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timed out".to_string()
    } else {
        format!("Request error: {e}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Payload {
        value: f64,
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value": 1.5}"#))
            .mount(&mock_server)
            .await;

        let http = HttpContext::new(Duration::from_secs(5), 2).unwrap();
        let payload: Payload = http
            .get_json(&format!("{}/ok", mock_server.uri()), "TEST")
            .await
            .unwrap();
        assert_eq!(payload.value, 1.5);
    }

    #[tokio::test]
    async fn test_get_json_timeout_is_unavailable() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"value": 1.5}"#)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let http = HttpContext::new(Duration::from_millis(50), 2).unwrap();
        let result: QuoteResult<Payload> = http
            .get_json(&format!("{}/slow", mock_server.uri()), "SLOW")
            .await;
        assert_eq!(
            result.unwrap_err(),
            QuoteError::unavailable("SLOW", "Request timed out")
        );
    }

    #[tokio::test]
    async fn test_get_json_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let http = HttpContext::new(Duration::from_secs(5), 2).unwrap();
        let result: QuoteResult<Payload> = http
            .get_json(&format!("{}/down", mock_server.uri()), "DOWN")
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Provider unavailable for DOWN: HTTP error: 503 Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_capped() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/delayed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"value": 1.0}"#)
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(4)
            .mount(&mock_server)
            .await;

        let http = HttpContext::new(Duration::from_secs(5), 2).unwrap();
        let url = format!("{}/delayed", mock_server.uri());

        let started = std::time::Instant::now();
        let results: Vec<QuoteResult<Payload>> =
            futures::future::join_all((0..4).map(|_| http.get_json(&url, "CAP"))).await;
        let elapsed = started.elapsed();

        assert!(results.iter().all(Result::is_ok));
        // two waves of two requests each
        assert!(elapsed >= Duration::from_millis(400), "elapsed {elapsed:?}");
    }
}
