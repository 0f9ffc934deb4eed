//! Pagination walker.
//!
//! The source has no "last page" indicator: results are paged with a
//! postback, and asking for the page after the last one lands on an internal
//! error page. The walker therefore drives a small state machine per outer
//! target:
//!
//! ```text
//! Initial -> Loaded -> Extracting -> Advancing -> (Loaded | Terminal)
//! ```
//!
//! and treats the [`TerminationPredicate`] as the only end-of-results signal.
//! A page cap guards against a source that never emits it.

use crate::{BrowserDriver, Locator, ScrapeError};

/// Decides, from the URL reached after a "next page" action, whether the
/// results are exhausted.
pub trait TerminationPredicate: Send + Sync {
    /// Returns `true` when `url` marks the end of results.
    fn is_terminal(&self, url: &str) -> bool;
}

impl<F> TerminationPredicate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_terminal(&self, url: &str) -> bool {
        self(url)
    }
}

/// Terminates when the URL contains a fixed marker (e.g. `"ErrorInternal"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMarker {
    marker: String,
}

impl UrlMarker {
    /// Creates a predicate matching URLs that contain `marker`.
    #[must_use]
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_owned(),
        }
    }
}

impl TerminationPredicate for UrlMarker {
    fn is_terminal(&self, url: &str) -> bool {
        url.contains(&self.marker)
    }
}

/// Where and how a walk begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Search page URL.
    pub url: String,
    /// Dropdown selection to make before searching, if any.
    pub selection: Option<(Locator, String)>,
    /// The "show results" button.
    pub search_button: Locator,
}

/// How to advance between pages and when to give up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    /// Script that requests the next results page.
    pub next_page_script: String,
    /// Maximum pages per outer target before the walk is abandoned.
    pub max_pages: u32,
}

/// States of one walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// Not yet at the results.
    Initial,
    /// A results page is loaded and not yet handed out.
    Loaded,
    /// The current page was handed out for extraction.
    Extracting,
    /// The "next page" action is in flight.
    Advancing,
    /// The end-of-results marker was observed.
    Terminal,
}

/// Walks the results pages of one outer target.
///
/// Obtain one with [`PaginationWalker::start`], then call
/// [`next_page`](Self::next_page) until it returns `None`.
pub struct PaginationWalker<'a, B, T> {
    browser: &'a mut B,
    termination: &'a T,
    options: &'a WalkOptions,
    label: String,
    state: WalkState,
    pages: u32,
}

impl<B, T> std::fmt::Debug for PaginationWalker<'_, B, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationWalker")
            .field("label", &self.label)
            .field("state", &self.state)
            .field("pages", &self.pages)
            .finish_non_exhaustive()
    }
}

impl<'a, B, T> PaginationWalker<'a, B, T>
where
    B: BrowserDriver,
    T: TerminationPredicate,
{
    /// Navigates to the entry point, applies its selection and triggers the
    /// search, leaving the walker at the first results page.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if any browser action fails.
    pub async fn start(
        browser: &'a mut B,
        termination: &'a T,
        options: &'a WalkOptions,
        label: &str,
        entry: &EntryPoint,
    ) -> Result<Self, ScrapeError> {
        log::debug!("[{label}] Opening url: {}", entry.url);
        browser.navigate(&entry.url).await?;

        if let Some((dropdown, value)) = &entry.selection {
            log::debug!("[{label}] Selecting '{value}' in {dropdown}");
            browser.select_dropdown_option(dropdown, value).await?;
        }
        browser.click_element(&entry.search_button).await?;

        let state = if termination.is_terminal(browser.current_url()) {
            log::warn!("[{label}] Search landed on the end-of-results page");
            WalkState::Terminal
        } else {
            WalkState::Loaded
        };

        Ok(Self {
            browser,
            termination,
            options,
            label: label.to_owned(),
            state,
            pages: 0,
        })
    }

    /// Returns the content of the next results page, or `None` once the
    /// end-of-results marker has been observed.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::PageLimitExceeded`] if the page cap is reached
    /// without seeing the marker, or any browser error.
    pub async fn next_page(&mut self) -> Result<Option<String>, ScrapeError> {
        loop {
            match self.state {
                WalkState::Initial | WalkState::Advancing => {
                    return Err(ScrapeError::Parse(format!(
                        "[{}] walker polled in state {:?}",
                        self.label, self.state
                    )));
                }
                WalkState::Terminal => return Ok(None),
                WalkState::Loaded => {
                    self.state = WalkState::Extracting;
                    self.pages += 1;
                    log::debug!("[{}] Extracting page {}", self.label, self.pages);
                    return Ok(Some(self.browser.current_page_content().to_owned()));
                }
                WalkState::Extracting => self.advance().await?,
            }
        }
    }

    async fn advance(&mut self) -> Result<(), ScrapeError> {
        if self.pages >= self.options.max_pages {
            log::error!(
                "[{}] No end-of-results marker after {} pages, giving up",
                self.label,
                self.pages
            );
            return Err(ScrapeError::PageLimitExceeded {
                target: self.label.clone(),
                max_pages: self.options.max_pages,
            });
        }

        self.state = WalkState::Advancing;
        self.browser
            .run_script(&self.options.next_page_script)
            .await?;

        if self.termination.is_terminal(self.browser.current_url()) {
            log::debug!(
                "[{}] Finished after {} pages",
                self.label,
                self.pages
            );
            self.state = WalkState::Terminal;
        } else {
            self.state = WalkState::Loaded;
        }
        Ok(())
    }

    /// Current state of the walk.
    #[must_use]
    pub const fn state(&self) -> WalkState {
        self.state
    }

    /// Number of pages handed out so far.
    #[must_use]
    pub const fn pages(&self) -> u32 {
        self.pages
    }
}
