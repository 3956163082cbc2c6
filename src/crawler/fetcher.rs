//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the archiver:
//! - Building the shared HTTP client with the configured user agent
//! - GET requests with a per-request timeout (pages and assets differ)
//! - Classifying failures so the caller can log and move on
//!
//! Nothing here retries. A failed fetch is reported once and the crawl
//! continues without that resource.

use crate::config::UserAgentConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the resource
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value (empty if absent)
        content_type: String,
        /// Raw response body
        body: Vec<u8>,
    },

    /// Server answered with a non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// One-line description of a failure, for logging
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::HttpError { status_code } => Some(format!("HTTP {}", status_code)),
            Self::NetworkError { error } => Some(error.clone()),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed with reqwest's default policy. Total request
/// timeouts are applied per request, since pages and assets use different
/// limits.
///
/// # Example
///
/// ```no_run
/// use snapkeep::config::UserAgentConfig;
/// use snapkeep::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.value.clone())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL as raw bytes
///
/// # Error Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | Success |
/// | any other status | HttpError |
/// | timeout | NetworkError ("Request timeout") |
/// | connection failure | NetworkError ("Connection refused") |
/// | body read failure | NetworkError |
pub async fn fetch_url(client: &Client, url: &str, timeout: Duration) -> FetchResult {
    match client.get(url).timeout(timeout).send().await {
        Ok(response) => {
            let status = response.status();
            let final_url = response.url().to_string();

            if !status.is_success() {
                return FetchResult::HttpError {
                    status_code: status.as_u16(),
                };
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();

            match response.bytes().await {
                Ok(body) => FetchResult::Success {
                    final_url,
                    status_code: status.as_u16(),
                    content_type,
                    body: body.to_vec(),
                },
                Err(e) => FetchResult::NetworkError {
                    error: classify_error(&e),
                },
            }
        }
        Err(e) => FetchResult::NetworkError {
            error: classify_error(&e),
        },
    }
}

fn classify_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else {
        e.to_string()
    }
}

/// Returns true if a Content-Type should be parsed as HTML
///
/// A missing header is treated as HTML, since many small servers omit it.
pub fn is_html_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.is_empty()
        || content_type.contains("text/html")
        || content_type.contains("application/xhtml")
}
