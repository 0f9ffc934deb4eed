#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Scrapes the University of Ottawa timetable into CSV and JSON files.
//!
//! ```text
//! campus_guide --disciplines --courses --exams [--verbose]
//!              [--output-dir <dir>] [--site-config <file.toml>]
//! ```
//!
//! Running without any scrape switch prints the usage and exits.
//!
//! The live timetable host only negotiates outdated TLS versions, which the
//! default rustls backend refuses. Build with `--features legacy-tls` to
//! scrape it.
//!
//! Uses `indicatif-log-bridge` (via [`campus_guide_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

use std::collections::BTreeSet;
use std::path::PathBuf;

use campus_guide_cli_utils::IndicatifProgress;
use campus_guide_scraper::form_browser::FormBrowser;
use campus_guide_scraper::http::HttpFetcher;
use campus_guide_timetable::ScrapeOptions;
use campus_guide_timetable::config::SiteConfig;
use campus_guide_timetable_models::ScrapeKind;
use clap::{CommandFactory, Parser};

#[cfg(feature = "legacy-tls")]
const LEGACY_TLS_HELP: &str = "Built with legacy TLS support for the timetable host.";

#[cfg(not(feature = "legacy-tls"))]
const LEGACY_TLS_HELP: &str = "The timetable host requires outdated TLS versions. \
    This binary was built without legacy TLS support; rebuild with \
    `cargo build --features legacy-tls` (needs system OpenSSL) if connections fail.";

#[derive(Parser)]
#[command(
    name = "campus_guide",
    about = "Welcome to the uOttawa Campus Guide web scraping tool",
    after_help = LEGACY_TLS_HELP
)]
struct Cli {
    /// Retrieve a list of all courses available at the University of Ottawa
    #[arg(short, long)]
    courses: bool,

    /// Retrieve a list of disciplines available at the University of Ottawa
    #[arg(short, long)]
    disciplines: bool,

    /// Retrieve a list of exams in the current semesters at the University of Ottawa
    #[arg(short, long)]
    exams: bool,

    /// Provide in depth logs as the tool executes (ignored when `RUST_LOG` is set)
    #[arg(short, long)]
    verbose: bool,

    /// Directory the session folders and `disciplines.json` are written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// TOML file overriding the site URLs, element ids and limits
    #[arg(long)]
    site_config: Option<PathBuf>,
}

impl Cli {
    fn kinds(&self) -> BTreeSet<ScrapeKind> {
        [
            (self.disciplines, ScrapeKind::Disciplines),
            (self.courses, ScrapeKind::Courses),
            (self.exams, ScrapeKind::Exams),
        ]
        .into_iter()
        .filter_map(|(selected, kind)| selected.then_some(kind))
        .collect()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let kinds = cli.kinds();
    if kinds.is_empty() {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    let multi = campus_guide_cli_utils::init_logger(cli.verbose);

    #[cfg(not(feature = "legacy-tls"))]
    log::warn!(
        "Built without the legacy-tls feature; the timetable host may refuse the TLS handshake"
    );

    let site = match &cli.site_config {
        Some(path) => {
            log::info!("Loading site config from {}", path.display());
            SiteConfig::load(path)?
        }
        None => SiteConfig::default(),
    };

    let mut browser = FormBrowser::new(site.max_retries)?;
    let fetcher = HttpFetcher::new(site.max_retries)?;
    let options = ScrapeOptions {
        kinds,
        output_dir: cli.output_dir,
        site,
    };

    let progress = IndicatifProgress::targets_bar(&multi, "Scraping timetable");
    let report = campus_guide_timetable::run(&mut browser, &fetcher, &options, progress).await?;

    let mut files: Vec<String> = report
        .output_files
        .iter()
        .map(|path| path.display().to_string())
        .collect();
    files.sort();

    println!("Finished executing. See output files for results.");
    println!("Output files:");
    for file in &files {
        println!("  {file}");
    }

    Ok(())
}
