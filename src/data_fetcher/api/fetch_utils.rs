//! Single-shot HTTP fetch with status and payload classification

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument};

use crate::error::AppError;
use crate::retry::RetryPolicy;

/// Performs one GET request and decodes the JSON body.
///
/// Maps transport failures and HTTP status codes onto [`AppError`] variants so
/// a [`RetryPolicy`] can decide what is worth another attempt:
/// - timeouts and connection failures become `NetworkTimeout` / `NetworkConnection`
/// - 429 becomes `ApiRateLimit`, carrying any `Retry-After` seconds
/// - 502/503 become `ApiServiceUnavailable`, other 5xx `ApiServerError`
/// - 404 and other 4xx are not retryable
#[instrument(skip(client))]
pub(super) async fn fetch_once<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, AppError> {
    let response = match client.get(url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            error!("Request failed for URL {}: {}", url, e);
            return if e.is_timeout() {
                Err(AppError::network_timeout(url))
            } else if e.is_connect() {
                Err(AppError::network_connection(url, e.to_string()))
            } else {
                Err(AppError::ApiFetch(e))
            };
        }
    };

    let status = response.status();
    debug!("Response status: {status}");

    if !status.is_success() {
        let status_code = status.as_u16();
        let reason = status.canonical_reason().unwrap_or("Unknown error");

        error!("HTTP {} - {} (URL: {})", status_code, reason, url);

        return Err(match status_code {
            404 => AppError::api_not_found(url),
            429 => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok());
                AppError::api_rate_limit(reason, url).with_retry_after(retry_after)
            }
            400..=499 => AppError::api_client_error(status_code, reason, url),
            502 | 503 => AppError::api_service_unavailable(status_code, reason, url),
            _ => AppError::api_server_error(status_code, reason, url),
        });
    }

    let response_text = match response.text().await {
        Ok(text) => text,
        Err(e) if e.is_timeout() => return Err(AppError::network_timeout(url)),
        Err(e) => {
            error!("Failed to read response text from URL {}: {}", url, e);
            return Err(AppError::ApiFetch(e));
        }
    };

    debug!("Response length: {} bytes", response_text.len());

    match serde_json::from_str::<T>(&response_text) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            error!("Failed to parse API response: {} (URL: {})", e, url);
            error!(
                "Response text (first 200 chars): {}",
                &response_text.chars().take(200).collect::<String>()
            );

            if response_text.trim().is_empty() {
                Err(AppError::api_unexpected_structure("Response body is empty", url))
            } else if !response_text.trim_start().starts_with('{')
                && !response_text.trim_start().starts_with('[')
            {
                Err(AppError::api_malformed_json("Response is not valid JSON", url))
            } else {
                Err(AppError::api_unexpected_structure(e.to_string(), url))
            }
        }
    }
}

/// [`fetch_once`] wrapped in the caller's retry policy.
pub(super) async fn fetch<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    policy: &RetryPolicy,
    operation: &str,
) -> Result<T, AppError> {
    policy.run(operation, |_| fetch_once(client, url)).await
}
