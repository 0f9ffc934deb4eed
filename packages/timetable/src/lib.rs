#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! University of Ottawa timetable scrapes.
//!
//! Three scrapes share the engine in [`campus_guide_scraper`]:
//!
//! - [`discipline`]: subject codes, bilingual names and the faculties
//!   offering them, written to `disciplines.json`.
//! - [`course`]: every course section of every session, written to
//!   `<session>/<faculty>.csv`.
//! - [`exam`]: every exam of every exam session, written to
//!   `<session>/<faculty>_exams.csv`.
//!
//! [`run`] executes the selected scrapes in that order over one browser
//! session and returns a [`ScrapeReport`].

pub mod aggregate;
pub mod config;
pub mod course;
pub mod diagnostics;
pub mod discipline;
pub mod exam;
pub mod faculty;
pub mod listing;
pub mod output;
pub mod parse;

#[cfg(test)]
mod testing;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use campus_guide_scraper::dispatch::Dispatcher;
use campus_guide_scraper::progress::ProgressCallback;
use campus_guide_scraper::{BrowserDriver, DetailFetcher, ScrapeError};
use campus_guide_timetable_models::ScrapeKind;

use crate::config::SiteConfig;
use crate::diagnostics::Diagnostics;

/// Errors that can abort a timetable run.
#[derive(Debug, thiserror::Error)]
pub enum TimetableError {
    /// Driving the site or fetching a detail page failed.
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a CSV file failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serializing the discipline document failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The site configuration file is invalid.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

/// What to scrape and where to write it.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Scrapes to run. Always executed as disciplines, courses, exams.
    pub kinds: BTreeSet<ScrapeKind>,
    /// Root directory for every output file.
    pub output_dir: PathBuf,
    /// Site constants.
    pub site: SiteConfig,
}

/// Outcome of a completed run.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    /// Every file written, in the order written.
    pub output_files: Vec<PathBuf>,
    /// Recoverable problems, in the order encountered.
    pub diagnostics: Diagnostics,
    /// Records (or discipline entries) written.
    pub records: usize,
    /// Records dropped for an unrecognized faculty.
    pub dropped: usize,
    /// Distinct detail pages fetched.
    pub detail_fetches: usize,
    /// Listing occurrences skipped as already fetched.
    pub repeats: u64,
}

/// State threaded through one run's scrapes.
pub struct ScrapeContext<'a> {
    /// Site constants.
    pub site: &'a SiteConfig,
    /// Detail-page dedup, scoped per outer target.
    pub dispatcher: Dispatcher,
    /// Recoverable problems.
    pub diagnostics: Diagnostics,
    /// Progress over outer targets.
    pub progress: Arc<dyn ProgressCallback>,
}

impl std::fmt::Debug for ScrapeContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapeContext")
            .field("dispatcher", &self.dispatcher)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

impl<'a> ScrapeContext<'a> {
    /// Creates a fresh context for one run.
    #[must_use]
    pub fn new(site: &'a SiteConfig, progress: Arc<dyn ProgressCallback>) -> Self {
        Self {
            site,
            dispatcher: Dispatcher::new(),
            diagnostics: Diagnostics::new(),
            progress,
        }
    }
}

/// Runs the selected scrapes and writes their output.
///
/// Each scrape's files are written as soon as that scrape completes.
///
/// # Errors
///
/// Returns [`TimetableError`] if navigation, a detail fetch or writing
/// output fails. Row-level problems are reported in
/// [`ScrapeReport::diagnostics`] instead.
pub async fn run<B, F>(
    browser: &mut B,
    fetcher: &F,
    options: &ScrapeOptions,
    progress: Arc<dyn ProgressCallback>,
) -> Result<ScrapeReport, TimetableError>
where
    B: BrowserDriver,
    F: DetailFetcher,
{
    let mut ctx = ScrapeContext::new(&options.site, progress);
    let mut report = ScrapeReport::default();

    for kind in &options.kinds {
        match kind {
            ScrapeKind::Disciplines => {
                let entries = discipline::scrape_disciplines(browser, &mut ctx).await?;
                report.records += entries.len();
                let path = output::write_disciplines(&options.output_dir, entries)?;
                log::info!("Saved disciplines to {}", path.display());
                report.output_files.push(path);
            }
            ScrapeKind::Courses => {
                let buckets = course::scrape_courses(browser, fetcher, &mut ctx).await?;
                report.records += buckets.len();
                report.dropped += buckets.dropped();
                let written = output::write_buckets(&options.output_dir, buckets)?;
                log::info!("Wrote {} course files", written.len());
                report.output_files.extend(written);
            }
            ScrapeKind::Exams => {
                let buckets = exam::scrape_exams(browser, fetcher, &mut ctx).await?;
                report.records += buckets.len();
                report.dropped += buckets.dropped();
                let written = output::write_buckets(&options.output_dir, buckets)?;
                log::info!("Wrote {} exam files", written.len());
                report.output_files.extend(written);
            }
        }
    }

    ctx.progress.finish(format!(
        "{} records in {} files",
        report.records,
        report.output_files.len()
    ));
    log::debug!(
        "Fetched {} detail pages, skipped {} repeated listings, dropped {} records",
        ctx.dispatcher.dispatched(),
        ctx.dispatcher.repeats(),
        report.dropped
    );
    ctx.diagnostics.log_summary();

    report.detail_fetches = ctx.dispatcher.dispatched();
    report.repeats = ctx.dispatcher.repeats();
    report.diagnostics = ctx.diagnostics;
    Ok(report)
}
