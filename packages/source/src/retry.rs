//! HTTP retry helpers for transient errors.
//!
//! Provider clients should use [`send_json`] or [`send_text`] instead of
//! calling `reqwest::RequestBuilder::send()` directly. Every request then
//! gets bounded retry with exponential backoff for transient failures
//! (timeouts, connection resets, server errors, rate limiting).
//!
//! Exhausting the retry budget is not an error: both helpers return
//! `Ok(None)` and the caller treats the call as having produced no rows.
//!
//! # Usage
//!
//! ```ignore
//! use crate::retry;
//!
//! let Some(body) = retry::send_json(|| client.get(&url).query(&params)).await? else {
//!     return Ok(Vec::new());
//! };
//! ```

use std::time::Duration;

use crate::SourceError;

/// Retry attempts after the initial request. Waits 1s, 2s and 4s.
pub const MAX_RETRIES: u32 = 3;

/// Maximum number of characters of a response body included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// # Errors
///
/// Returns [`SourceError`] if the server returns a non-retryable status
/// code, a non-transient transport error occurs, or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<Option<serde_json::Value>, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let Some(text) = send_text(build_request).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&text) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::error!(
                "JSON parse failed: {e}\n  received: {} bytes\n  body preview: {}",
                text.len(),
                preview(&text),
            );
            Err(SourceError::Json(e))
        }
    }
}

/// Sends an HTTP request and returns the response body as a `String`.
///
/// Behaves like [`send_json`] but returns raw text. Used for the HTML
/// statistics pages.
///
/// # Errors
///
/// Returns [`SourceError`] if the server returns a non-retryable status
/// code or a non-transient transport error occurs.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(build_request: F) -> Result<Option<String>, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let Some(response) = send_inner(&build_request, MAX_RETRIES).await? else {
        return Ok(None);
    };

    let url = response.url().to_string();
    let status = response.status();

    match response.text().await {
        Ok(text) => Ok(Some(text)),
        Err(e) if is_transient(&e) => {
            log::warn!("Response body read failed for {url} (status {status}): {e}");
            Ok(None)
        }
        Err(e) => Err(SourceError::Http(e)),
    }
}

/// Sends one request and classifies the outcome. 429 and 5xx responses and
/// transient transport errors come back as `Ok(None)`, meaning "try again".
///
/// Used directly by clients that must reset state between attempts; they
/// run their own loop over [`MAX_RETRIES`] and [`backoff`].
///
/// # Errors
///
/// Returns [`SourceError::Provider`] for any other 4xx status and
/// [`SourceError::Http`] for non-transient transport errors.
pub async fn attempt(
    request: reqwest::RequestBuilder,
) -> Result<Option<reqwest::Response>, SourceError> {
    match request.send().await {
        Err(e) => {
            if is_transient(&e) {
                log::warn!("  transient error: {e}");
                return Ok(None);
            }
            Err(SourceError::Http(e))
        }
        Ok(response) => {
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                log::warn!("  HTTP 429 (rate limited)");
                return Ok(None);
            }

            if status.is_server_error() {
                log::warn!("  HTTP {status} (server error)");
                return Ok(None);
            }

            // 4xx other than 429 is permanent
            if status.is_client_error() {
                return Err(SourceError::Provider {
                    code: status.as_u16().to_string(),
                    message: format!("HTTP {status} from {}", response.url()),
                });
            }

            Ok(Some(response))
        }
    }
}

/// Core retry loop shared by [`send_json`] and [`send_text`].
///
/// Returns `Ok(None)` once `max_retries` transient failures in a row have
/// been seen.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
) -> Result<Option<reqwest::Response>, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    for attempt_no in 0..=max_retries {
        if attempt_no > 0 {
            let delay = backoff(attempt_no);
            log::warn!("  retry {attempt_no}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        if let Some(response) = attempt(build_request()).await? {
            return Ok(Some(response));
        }
    }

    log::warn!("Request failed after {max_retries} retries, giving up");
    Ok(None)
}

/// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, ...
#[must_use]
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.saturating_sub(1).min(16))
}

/// Returns `true` if the error is likely transient and worth retrying.
#[must_use]
pub fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

fn preview(text: &str) -> String {
    if text.chars().count() > BODY_PREVIEW_LEN {
        let head: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_server::{TestServer, client};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn server_errors_exhaust_retries_into_no_rows() {
        let server = TestServer::start(&["503 Service Unavailable"]).await;
        let client = client();
        let started = tokio::time::Instant::now();

        let body = send_text(|| client.get(&server.url)).await.unwrap();

        assert_eq!(body, None);
        assert_eq!(server.hits(), 1 + MAX_RETRIES as usize);
        assert!(started.elapsed() >= Duration::from_secs(1 + 2 + 4));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let server = TestServer::start(&["404 Not Found"]).await;
        let client = client();

        let result = send_text(|| client.get(&server.url)).await;

        match result {
            Err(SourceError::Provider { code, .. }) => assert_eq!(code, "404"),
            other => panic!("expected provider error, got {other:?}"),
        }
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_and_server_error_are_retried_until_success() {
        let server = TestServer::start(&[
            "503 Service Unavailable",
            "429 Too Many Requests",
            "200 OK|{\"rows\":[]}",
        ])
        .await;
        let client = client();

        let body = send_json(|| client.get(&server.url)).await.unwrap();

        assert_eq!(body, Some(serde_json::json!({ "rows": [] })));
        assert_eq!(server.hits(), 3);
    }

    #[test]
    fn backoff_doubles_from_one_second() {
        let delays: Vec<u64> = (1..=MAX_RETRIES).map(|a| backoff(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4]);
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        let text = "가".repeat(BODY_PREVIEW_LEN + 10);
        let shown = preview(&text);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), BODY_PREVIEW_LEN + 3);
        assert_eq!(preview("short"), "short");
    }
}
