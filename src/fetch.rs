//! Single-shot HTTP GET with a default header set.
//!
//! Failure is a value here: anything other than a 200 with a readable
//! body collapses to `None`, logged but never raised, so converters
//! can fall back to their previous document.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;

/// Desktop browser User-Agent sent unless a converter overrides it.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch seam for the converters; tests substitute a mock.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// One GET. `Some(body)` only on HTTP 200.
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        headers: Option<HeaderMap>,
    ) -> Option<String>;
}

/// Production fetcher over a shared reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        headers: Option<HeaderMap>,
    ) -> Option<String> {
        let mut merged = default_headers();
        if let Some(overrides) = headers {
            for (name, value) in overrides.iter() {
                merged.insert(name.clone(), value.clone());
            }
        }

        let response = match self
            .client
            .get(url)
            .query(query)
            .headers(merged)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url, error = ?e, "http request failed");
                counter!("feeder_fetch_errors_total").increment(1);
                return None;
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            tracing::warn!(url, %status, body = %preview, "http request rejected");
            counter!("feeder_fetch_errors_total").increment(1);
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(url, error = ?e, "reading response body failed");
                counter!("feeder_fetch_errors_total").increment(1);
                None
            }
        }
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}
