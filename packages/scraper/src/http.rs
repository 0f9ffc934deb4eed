//! HTTP client construction and the detail-page fetcher.
//!
//! The timetable host only negotiates outdated TLS versions. Building with
//! the `legacy-tls` feature switches the client to native TLS with a TLS 1.0
//! floor; the default build keeps rustls.

use std::time::Duration;

use crate::retry::{self, StatusPolicy};
use crate::{DetailFetcher, ScrapeError};

/// Per-request timeout for every HTTP collaborator.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Builds the [`reqwest::Client`] shared by the HTTP collaborators.
///
/// `cookie_store` keeps the server session alive across requests, which the
/// stateful search pages require.
///
/// # Errors
///
/// Returns [`ScrapeError::Http`] if the TLS backend cannot be initialised.
pub fn build_client(cookie_store: bool) -> Result<reqwest::Client, ScrapeError> {
    let builder = reqwest::Client::builder()
        .cookie_store(cookie_store)
        .timeout(REQUEST_TIMEOUT);

    #[cfg(feature = "legacy-tls")]
    let builder = builder
        .use_native_tls()
        .min_tls_version(reqwest::tls::Version::TLS_1_0);

    builder.build().map_err(ScrapeError::Http)
}

/// Fetches detail pages with a plain GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpFetcher {
    /// Creates a fetcher that retries transient failures `max_retries` times.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the client cannot be built.
    pub fn new(max_retries: u32) -> Result<Self, ScrapeError> {
        Ok(Self {
            client: build_client(false)?,
            max_retries,
        })
    }
}

impl DetailFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        log::trace!("GET {url}");
        retry::send_text(|| self.client.get(url), self.max_retries, StatusPolicy::Fail)
            .await
            .map(|page| page.body)
            .map_err(|e| ScrapeError::Fetch {
                url: url.to_owned(),
                source: Box::new(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::test_server::{Reply, serve};

    #[tokio::test]
    async fn fetch_returns_detail_page_body() {
        let base = serve(BTreeMap::from([(
            "GET /Course.aspx",
            Reply::ok("<h1>CSI2110 - Data Structures</h1>"),
        )]))
        .await;

        let fetcher = HttpFetcher::new(0).unwrap();
        let body = fetcher.fetch(&format!("{base}/Course.aspx")).await.unwrap();

        assert_eq!(body, "<h1>CSI2110 - Data Structures</h1>");
    }

    #[tokio::test]
    async fn fetch_fails_on_error_status() {
        let base = serve(BTreeMap::from([(
            "GET /Course.aspx",
            Reply::status("500 Internal Server Error", "oops"),
        )]))
        .await;

        let fetcher = HttpFetcher::new(0).unwrap();
        let err = fetcher
            .fetch(&format!("{base}/Course.aspx"))
            .await
            .unwrap_err();

        match err {
            ScrapeError::Fetch { source, .. } => assert!(matches!(
                *source,
                ScrapeError::Status { status, .. } if status.as_u16() == 500
            )),
            other => panic!("expected a fetch error, got {other:?}"),
        }
    }
}
