//! HTTP retry helper for transient errors.
//!
//! Both HTTP collaborators ([`crate::http::HttpFetcher`] and
//! [`crate::form_browser::FormBrowser`]) send requests through
//! [`send_text`], which retries connection failures and timeouts with
//! exponential backoff. What happens on an error status depends on the
//! [`StatusPolicy`]. The pagination core itself never retries.
//!
//! ```ignore
//! let page = retry::send_text(|| client.get(&url), 3, StatusPolicy::Fail).await?;
//! let page = retry::send_text(|| client.post(&action).form(&fields), 3, StatusPolicy::Load).await?;
//! ```

use std::time::Duration;

use crate::ScrapeError;

/// A response body together with where it was finally served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    /// Response body.
    pub body: String,
}

/// How a response with a 4xx or 5xx status is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// HTTP 429 and 5xx are retried; any error status left over is a
    /// [`ScrapeError::Status`].
    Fail,
    /// Every response is a page, whatever its status, the way a browser
    /// shows an error page. Status codes never trigger a retry.
    Load,
}

/// Sends an HTTP request and returns the final URL and body text.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
/// With `max_retries == 0` the request is sent exactly once.
///
/// # Errors
///
/// Returns [`ScrapeError`] if the request fails after all retries, or under
/// [`StatusPolicy::Fail`] the server returns an error status.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(
    build_request: F,
    max_retries: u32,
    policy: StatusPolicy,
) -> Result<FetchedPage, ScrapeError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    for body_attempt in 0..=max_retries {
        let response = send_inner(&build_request, max_retries, policy).await?;
        let url = response.url().to_string();
        let status = response.status();

        match response.text().await {
            Ok(body) => return Ok(FetchedPage { url, body }),
            Err(e) => {
                if body_attempt < max_retries {
                    let delay = backoff(body_attempt + 1);
                    log::warn!(
                        "Body read failed (retry {}/{max_retries}), re-fetching in {delay:?}...\n  \
                         url: {url}\n  \
                         status: {status}\n  \
                         error: {e}",
                        body_attempt + 1,
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                log::error!("Body read failed for {url} (status {status}): {e}");
                return Err(ScrapeError::Http(e));
            }
        }
    }

    unreachable!("send_text retry loop exited without returning")
}

/// Core retry loop. Under [`StatusPolicy::Fail`] returns the first response
/// with a 2xx or 3xx status; under [`StatusPolicy::Load`] the first response.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
    policy: StatusPolicy,
) -> Result<reqwest::Response, ScrapeError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<ScrapeError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    last_error = Some(ScrapeError::Http(e));
                    continue;
                }
                return Err(ScrapeError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                let url = response.url().to_string();

                if policy == StatusPolicy::Load {
                    if !status.is_success() {
                        log::debug!("Loaded HTTP {status} page from {url}");
                    }
                    return Ok(response);
                }

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if attempt < max_retries {
                        log::warn!("  HTTP {status} from {url}");
                        last_error = Some(ScrapeError::Status { url, status });
                        continue;
                    }
                    return Err(ScrapeError::Status { url, status });
                }

                if status.is_client_error() {
                    return Err(ScrapeError::Status { url, status });
                }

                return Ok(response);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ScrapeError::Parse("request failed after all retries".to_owned())
    }))
}

/// 2s, 4s, 8s, ... capped at 64s.
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6))
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}
