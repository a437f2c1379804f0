//! HTTP retry for destination API calls.
//!
//! Every request to a remote sink goes through [`send_json`], which retries
//! transient failures (timeouts, connection resets, HTTP 429, HTTP 5xx)
//! with exponential backoff and turns any other error status into
//! [`SyncError::Status`] carrying the API's own message.

use std::time::Duration;

use crate::SyncError;

/// Retry attempts after the first try. With backoff of 2s, 4s, 8s and 16s
/// a request gives up after 30 seconds of waiting.
const MAX_RETRIES: u32 = 4;

/// Maximum length of the response body included in error messages.
const BODY_PREVIEW_LEN: usize = 300;

/// Delay before retry `attempt` (1-based).
#[must_use]
pub const fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt)
}

/// Whether a response status is worth retrying.
#[must_use]
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

/// Sends the request built by `build_request` and parses the response body
/// as JSON. An empty body parses as `null`.
///
/// `build_request` is called once per attempt, since a
/// [`reqwest::RequestBuilder`] is consumed by sending it.
///
/// # Errors
///
/// Returns [`SyncError`] if the request fails after all retries, the API
/// answers with a non-retryable error status, or the body is not JSON.
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, SyncError>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = backoff(attempt);
            log::warn!("  retry {attempt}/{MAX_RETRIES} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) if is_transient(&e) && attempt < MAX_RETRIES => {
                log::warn!("  transient error: {e}");
                attempt += 1;
                continue;
            }
            Err(e) => return Err(SyncError::Http(e)),
        };

        let status = response.status();
        if is_retryable_status(status) && attempt < MAX_RETRIES {
            log::warn!("  HTTP {status}");
            attempt += 1;
            continue;
        }

        let text = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        return Ok(serde_json::from_str(&text)?);
    }
}

/// The `error.message` of a Google-style error body, else a body preview.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .map(ToOwned::to_owned)
        })
        .unwrap_or_else(|| body.chars().take(BODY_PREVIEW_LEN).collect())
}
