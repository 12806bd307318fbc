//! HTTP client creation and configuration utilities

use crate::constants::headers;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, ORIGIN, REFERER};
use std::time::Duration;

/// Creates the HTTP client used for every stats API call.
///
/// # Features
/// * Per-request timeout (default: 30 seconds, configurable via config/env)
/// * Connection pooling with centralized pool size configuration
/// * Browser-like default headers; the stats API stalls requests without them
/// * Retry logic for transient failures lives in [`crate::retry::RetryPolicy`]
pub fn create_http_client_with_timeout(timeout_seconds: u64) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static(headers::ACCEPT));
    default_headers.insert(REFERER, HeaderValue::from_static(headers::REFERER));
    default_headers.insert(ORIGIN, HeaderValue::from_static(headers::ORIGIN));

    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(headers::USER_AGENT)
        .default_headers(default_headers)
        .pool_max_idle_per_host(crate::constants::HTTP_POOL_MAX_IDLE_PER_HOST)
        .build()
}

/// Creates an HTTP client for testing with default timeout
#[cfg(test)]
pub fn create_test_http_client() -> Client {
    create_http_client_with_timeout(crate::constants::DEFAULT_HTTP_TIMEOUT_SECONDS)
        .expect("Failed to create test HTTP client")
}
