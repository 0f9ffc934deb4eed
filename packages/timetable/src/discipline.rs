//! Discipline scrape.
//!
//! Discipline codes and English names come from the subject dropdown; the
//! French names from the same dropdown after switching the site language.
//! Each code is then searched on its own and the faculties of every listed
//! course are collected into a union.

use std::collections::{BTreeMap, BTreeSet};

use campus_guide_scraper::extract::{self, DropdownOption};
use campus_guide_scraper::walker::PaginationWalker;
use campus_guide_scraper::{BrowserDriver, ScrapeError};
use campus_guide_timetable_models::{DisciplineEntry, FacultyKey};

use crate::ScrapeContext;
use crate::faculty::faculty_shorthand;
use crate::listing::listing_rows;

/// Log label of the discipline scrape.
pub const DISCIPLINES_LABEL: &str = "disciplines";

/// Collects every discipline with its bilingual names and faculty union.
///
/// # Errors
///
/// Returns [`ScrapeError`] if navigation or a script fails, or a walk
/// exceeds its page cap.
pub async fn scrape_disciplines<B: BrowserDriver>(
    browser: &mut B,
    ctx: &mut ScrapeContext<'_>,
) -> Result<Vec<DisciplineEntry>, ScrapeError> {
    log::info!("[{DISCIPLINES_LABEL}] Starting scrape for disciplines");
    let site = ctx.site;

    log::debug!("[{DISCIPLINES_LABEL}] Opening url: {}", site.search_url);
    browser.navigate(&site.search_url).await?;

    log::debug!("[{DISCIPLINES_LABEL}] Retrieving English discipline names");
    let english =
        extract::dropdown_options(browser.current_page_content(), &site.subject_dropdown)?;

    log::debug!("[{DISCIPLINES_LABEL}] Retrieving French discipline names");
    browser.run_script(&site.french_script).await?;
    let french: BTreeMap<String, String> =
        extract::dropdown_options(browser.current_page_content(), &site.subject_dropdown)?
            .into_iter()
            .map(|DropdownOption { value, label }| (value, label))
            .collect();
    browser.run_script(&site.english_script).await?;

    let total = english.len();
    ctx.progress.set_total(total as u64);
    let termination = site.termination();
    let options = site.walk_options();
    let mut entries = Vec::with_capacity(total);

    for (index, DropdownOption { value: code, label }) in english.into_iter().enumerate() {
        log::info!(
            "[{DISCIPLINES_LABEL}] Scraping discipline ({}/{total}): {label}",
            index + 1,
        );
        ctx.progress.set_message(format!("disciplines {code}"));

        let target = format!("{DISCIPLINES_LABEL}:{code}");
        let entry = site.course_search(Some(code.as_str()));
        let mut walker =
            PaginationWalker::start(&mut *browser, &termination, &options, &target, &entry).await?;

        let mut faculties = BTreeSet::new();
        while let Some(page) = walker.next_page().await? {
            faculties.extend(
                listing_rows(&page)?
                    .iter()
                    .map(|row| faculty_shorthand(&row.category))
                    .filter(|faculty| *faculty != FacultyKey::Unrecognized),
            );
        }
        log::debug!(
            "[{DISCIPLINES_LABEL}] Finished scraping discipline {label}: {} faculties",
            faculties.len()
        );

        let name_fr = if let Some(name) = french.get(&code) {
            name.clone()
        } else {
            ctx.diagnostics.name_resolution(&code);
            label.clone()
        };

        entries.push(DisciplineEntry {
            code,
            faculties,
            name_en: label,
            name_fr,
        });
        ctx.progress.inc(1);
    }

    log::info!("[{DISCIPLINES_LABEL}] All {} disciplines scraped", entries.len());
    Ok(entries)
}
