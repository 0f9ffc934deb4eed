#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pagination and extraction engine for session-stateful result listings.
//!
//! The engine never drives a browser itself. It consumes two capabilities:
//!
//! - [`BrowserDriver`]: navigation, clicks, dropdown selection and script
//!   postbacks against a stateful page. [`form_browser::FormBrowser`] is an
//!   HTTP implementation that emulates ASP.NET `WebForms` postbacks.
//! - [`DetailFetcher`]: a plain request/response fetch for per-identifier
//!   detail pages. [`http::HttpFetcher`] is the `reqwest` implementation.
//!
//! On top of those it provides the [`walker::PaginationWalker`] state
//! machine, the row-schema [`extract`]or and the deduplicating
//! [`dispatch::Dispatcher`].

pub mod dispatch;
pub mod extract;
pub mod form_browser;
pub mod http;
pub mod progress;
pub mod retry;
pub mod walker;

#[cfg(test)]
mod test_server;

use serde::Deserialize;

/// Errors that can occur while driving the source or fetching pages.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// URL that was requested.
        url: String,
        /// Status code of the final response.
        status: reqwest::StatusCode,
    },

    /// Parsing markup or a selector failed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No element on the current page matches the locator.
    #[error("No element matching {0} on the current page")]
    ElementNotFound(Locator),

    /// The dropdown exists but has no option with the requested value.
    #[error("Dropdown {locator} has no option with value '{value}'")]
    OptionNotFound {
        /// Locator of the `<select>` element.
        locator: Locator,
        /// Value that was requested.
        value: String,
    },

    /// The driver does not know how to run the given script.
    #[error("Unsupported script: {0}")]
    UnsupportedScript(String),

    /// The end-of-results marker was never observed within the page cap.
    #[error("[{target}] no end-of-results marker after {max_pages} pages")]
    PageLimitExceeded {
        /// Outer target being walked.
        target: String,
        /// The configured cap.
        max_pages: u32,
    },

    /// A detail page could not be fetched.
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        /// URL of the detail page.
        url: String,
        /// Underlying failure.
        #[source]
        source: Box<Self>,
    },
}

/// Locates one element on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    /// Match by the element's `id` attribute.
    Id(String),
    /// Match by an arbitrary CSS selector.
    Css(String),
}

impl Locator {
    /// Shorthand for [`Locator::Id`].
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Returns the CSS selector text for this locator.
    #[must_use]
    pub fn to_css(&self) -> String {
        match self {
            Self::Id(id) => format!("[id=\"{id}\"]"),
            Self::Css(css) => css.clone(),
        }
    }

    /// Parses the locator into a [`scraper::Selector`].
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] if the selector text is invalid.
    pub fn selector(&self) -> Result<scraper::Selector, ScrapeError> {
        extract::parse_selector(&self.to_css())
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Css(css) => write!(f, "'{css}'"),
        }
    }
}

/// A stateful page the engine can drive.
///
/// [`current_page_content`](Self::current_page_content) is the sole source
/// of truth for extraction and [`current_url`](Self::current_url) the sole
/// termination oracle. Timeouts and retries are the implementation's
/// business.
pub trait BrowserDriver: Send {
    /// Loads `url`, replacing the current page.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the page cannot be loaded.
    fn navigate(&mut self, url: &str)
    -> impl std::future::Future<Output = Result<(), ScrapeError>> + Send;

    /// URL of the current page, after any redirects.
    fn current_url(&self) -> &str;

    /// Raw markup of the current page.
    fn current_page_content(&self) -> &str;

    /// Clicks the element matching `locator`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the element is missing or the resulting
    /// request fails.
    fn click_element(
        &mut self,
        locator: &Locator,
    ) -> impl std::future::Future<Output = Result<(), ScrapeError>> + Send;

    /// Selects the option with `value` in the dropdown matching `locator`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the dropdown or option is missing.
    fn select_dropdown_option(
        &mut self,
        locator: &Locator,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), ScrapeError>> + Send;

    /// Runs a page script (e.g. a `__doPostBack` call).
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the script is unsupported or fails.
    fn run_script(
        &mut self,
        code: &str,
    ) -> impl std::future::Future<Output = Result<(), ScrapeError>> + Send;
}

/// Plain request/response fetch of a detail page.
pub trait DetailFetcher: Send + Sync {
    /// Fetches `url` and returns the raw markup.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Fetch`] when the page cannot be retrieved.
    fn fetch(&self, url: &str)
    -> impl std::future::Future<Output = Result<String, ScrapeError>> + Send;
}
