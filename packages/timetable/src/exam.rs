//! Exam scrape.
//!
//! One walk per exam session offered in the session dropdown. Detail pages
//! are session-specific, so the dispatcher is scoped per session.

use campus_guide_scraper::extract::{
    self, Anchor, AnchoredRow, DropdownOption, ExtractError, RowSchema, element_text,
    parse_selector,
};
use campus_guide_scraper::walker::PaginationWalker;
use campus_guide_scraper::{BrowserDriver, DetailFetcher, ScrapeError};
use campus_guide_timetable_models::{ExamRecord, FacultyKey, SessionKey};
use scraper::{Html, Selector};

use crate::ScrapeContext;
use crate::aggregate::Buckets;
use crate::config::RowErrorPolicy;
use crate::diagnostics::Diagnostics;
use crate::faculty::faculty_shorthand;
use crate::listing::listing_rows;
use crate::parse::parse_exam_date;

/// Log label of the exam scrape.
pub const EXAMS_LABEL: &str = "exams";

/// Tables holding exam sittings.
pub const EXAM_TABLE: &str = "table.display.exams";

/// Column tags of an exam table.
pub const EXAM_TAGS: [&str; 3] = ["Section", "Date", "Place"];

/// Walks the exam listing of every session and fetches each course's exam
/// page once per session.
///
/// # Errors
///
/// Returns [`ScrapeError`] if navigation or a detail fetch fails, or a walk
/// exceeds its page cap.
pub async fn scrape_exams<B, F>(
    browser: &mut B,
    fetcher: &F,
    ctx: &mut ScrapeContext<'_>,
) -> Result<Buckets<ExamRecord>, ScrapeError>
where
    B: BrowserDriver,
    F: DetailFetcher,
{
    log::info!("[{EXAMS_LABEL}] Starting scrape for exams");
    let site = ctx.site;

    log::debug!("[{EXAMS_LABEL}] Opening url: {}", site.exam_search_url);
    browser.navigate(&site.exam_search_url).await?;
    log::debug!("[{EXAMS_LABEL}] Retrieving list of sessions to scrape");
    let sessions =
        extract::dropdown_options(browser.current_page_content(), &site.session_dropdown)?;

    ctx.progress.set_total(sessions.len() as u64);
    let termination = site.termination();
    let options = site.walk_options();
    let mut buckets = Buckets::new();

    for (index, DropdownOption { value, label }) in sessions.iter().enumerate() {
        let session = SessionKey::labelled(value, label);
        let target = format!("{EXAMS_LABEL}:{value}");
        log::info!(
            "[{EXAMS_LABEL}] Beginning session scrape: {session} ({}/{})",
            index + 1,
            sessions.len()
        );
        ctx.progress.set_message(format!("exams {session}"));

        let entry = site.exam_search(value);
        let mut walker =
            PaginationWalker::start(&mut *browser, &termination, &options, &target, &entry).await?;

        while let Some(page) = walker.next_page().await? {
            let rows = listing_rows(&page)?;
            log::debug!("[{target}] Found {} exams on page, now parsing", rows.len());

            for row in rows {
                let mut dispatch = ctx.dispatcher.target(&target);
                if !dispatch.admit(&row.code) {
                    log::trace!(
                        "[{target}] {} already dispatched (listed {} times)",
                        row.code,
                        dispatch.visits(&row.code)
                    );
                    continue;
                }
                let faculty = faculty_shorthand(&row.category);
                if faculty == FacultyKey::Unrecognized {
                    log::debug!(
                        "[{target}] Skipping {} with unrecognized faculty '{}'",
                        row.code,
                        row.category
                    );
                    continue;
                }

                let url = site.exam_url(&row.code, value);
                log::debug!("[{target}] Opening url: {url}");
                let markup = fetcher.fetch(&url).await?;

                let exams = parse_exam_page(
                    &row.code,
                    &markup,
                    &session,
                    site.row_error_policy,
                    &mut ctx.diagnostics,
                )?;
                log::debug!(
                    "[{target}] Found {} instances of {}",
                    exams.len(),
                    row.code
                );
                for exam in exams {
                    buckets.add(session.clone(), faculty, exam);
                }
            }
        }

        log::debug!(
            "[{EXAMS_LABEL}] Finished scraping session {session} after {} pages",
            walker.pages()
        );
        ctx.progress.inc(1);
    }

    log::info!(
        "[{EXAMS_LABEL}] Finished scraping exams: {} records over {} sessions",
        buckets.len(),
        sessions.len()
    );
    Ok(buckets)
}

/// Parses a course's exam page for one session.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] only for invalid selectors.
pub fn parse_exam_page(
    code: &str,
    markup: &str,
    session: &SessionKey,
    policy: RowErrorPolicy,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ExamRecord>, ScrapeError> {
    let schema = RowSchema::new(EXAM_TABLE, &EXAM_TAGS);
    let label_sel = parse_selector("strong.section")?;

    let mut exams = Vec::new();
    for table in extract::extract(markup, &schema)? {
        let rows = match table {
            Ok(rows) => rows,
            Err(e) => {
                diagnostics.extraction(code, e);
                match policy {
                    RowErrorPolicy::SkipRow => continue,
                    RowErrorPolicy::AbortIdentifier => return Ok(vec![]),
                }
            }
        };

        let anchored = match extract::carry_forward(rows, |row| section_anchor(row, &label_sel)) {
            Ok(anchored) => anchored,
            Err(e) => {
                diagnostics.extraction(code, e);
                return Ok(vec![]);
            }
        };

        for row in &anchored {
            match exam_record(code, session, row) {
                Ok(exam) => exams.push(exam),
                Err(e) => {
                    diagnostics.extraction(code, e);
                    if policy == RowErrorPolicy::AbortIdentifier {
                        return Ok(vec![]);
                    }
                }
            }
        }
    }

    Ok(exams)
}

/// A section cell anchors when it contains a `strong.section` label; the
/// text after the label is the professor.
fn section_anchor(row: &extract::RawRow, label_sel: &Selector) -> Option<Anchor> {
    let cell = row.cell("Section").ok()?;
    let fragment = Html::parse_fragment(&cell.html);
    let section = fragment.select(label_sel).next().map(element_text)?;
    if section.is_empty() {
        return None;
    }

    let person = cell
        .text
        .find(&section)
        .map(|at| cell.text[at + section.len()..].trim().to_owned())
        .unwrap_or_default();

    Some(Anchor {
        section,
        person: Some(person),
    })
}

fn exam_record(
    code: &str,
    session: &SessionKey,
    anchored: &AnchoredRow,
) -> Result<ExamRecord, ExtractError> {
    let row = &anchored.row;
    let raw_date = row.text("Date")?;
    let date = parse_exam_date(raw_date, session.display_label()).ok_or_else(|| {
        ExtractError::Malformed {
            row: row.index,
            field: "date",
            value: raw_date.to_owned(),
        }
    })?;

    Ok(ExamRecord {
        code: code.to_owned(),
        section: anchored.anchor.section.clone(),
        date,
        room: row.text("Place")?.to_owned(),
        professor: anchored.anchor.person.clone().unwrap_or_default(),
    })
}
