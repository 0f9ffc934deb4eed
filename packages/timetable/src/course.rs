//! Course scrape.
//!
//! One global listing walk. Each newly seen course code is fetched once from
//! its detail page, whose `div.schedule` blocks (one per session) hold the
//! section tables.

use campus_guide_scraper::extract::{
    self, Anchor, AnchoredRow, ExtractError, RowSchema, element_text, parse_selector,
};
use campus_guide_scraper::walker::PaginationWalker;
use campus_guide_scraper::{BrowserDriver, DetailFetcher, ScrapeError};
use campus_guide_timetable_models::{CourseRecord, FacultyKey, SessionKey};
use regex::Regex;
use scraper::Html;

use crate::ScrapeContext;
use crate::aggregate::Buckets;
use crate::config::RowErrorPolicy;
use crate::diagnostics::Diagnostics;
use crate::faculty::faculty_shorthand;
use crate::listing::listing_rows;
use crate::parse::{DayError, parse_time_range, parse_weekday};

/// Dispatcher target and log label of the course scrape.
pub const COURSES_TARGET: &str = "courses";

/// Column tags of a course section table.
pub const COURSE_TAGS: [&str; 5] = ["Section", "Activity", "Day", "Place", "Professor"];

/// Walks the course listing and fetches every course's detail page once.
///
/// # Errors
///
/// Returns [`ScrapeError`] if navigation or a detail fetch fails, or the walk
/// exceeds its page cap.
pub async fn scrape_courses<B, F>(
    browser: &mut B,
    fetcher: &F,
    ctx: &mut ScrapeContext<'_>,
) -> Result<Buckets<CourseRecord>, ScrapeError>
where
    B: BrowserDriver,
    F: DetailFetcher,
{
    log::info!("[{COURSES_TARGET}] Starting scrape for courses");
    ctx.progress.set_message("courses".to_owned());

    let site = ctx.site;
    let termination = site.termination();
    let options = site.walk_options();
    let entry = site.course_search(None);
    let mut walker =
        PaginationWalker::start(browser, &termination, &options, COURSES_TARGET, &entry).await?;

    let mut buckets = Buckets::new();
    while let Some(page) = walker.next_page().await? {
        let rows = listing_rows(&page)?;
        log::debug!(
            "[{COURSES_TARGET}] Found {} courses on page, now parsing",
            rows.len()
        );

        for row in rows {
            let mut dispatch = ctx.dispatcher.target(COURSES_TARGET);
            if !dispatch.admit(&row.code) {
                log::trace!(
                    "[{COURSES_TARGET}] {} already dispatched (listed {} times)",
                    row.code,
                    dispatch.visits(&row.code)
                );
                continue;
            }
            let faculty = faculty_shorthand(&row.category);
            if faculty == FacultyKey::Unrecognized {
                log::debug!(
                    "[{COURSES_TARGET}] Skipping {} with unrecognized faculty '{}'",
                    row.code,
                    row.category
                );
                continue;
            }

            let url = site.course_url(&row.code);
            log::debug!("[{COURSES_TARGET}] Opening url: {url}");
            let markup = fetcher.fetch(&url).await?;

            let records = parse_course_page(
                &row.code,
                &markup,
                site.row_error_policy,
                &mut ctx.diagnostics,
            )?;
            log::debug!(
                "[{COURSES_TARGET}] Found {} instances of {}",
                records.len(),
                row.code
            );
            for (session, record) in records {
                buckets.add(session, faculty, record);
            }
        }
    }

    log::info!(
        "[{COURSES_TARGET}] Finished scraping courses: {} records over {} pages",
        buckets.len(),
        walker.pages()
    );
    Ok(buckets)
}

/// Parses a course detail page into `(session, record)` pairs.
///
/// Recoverable problems are recorded in `diagnostics`; a page without the
/// `CODE - Name` heading yields no records.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] only for invalid selectors.
pub fn parse_course_page(
    code: &str,
    markup: &str,
    policy: RowErrorPolicy,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<(SessionKey, CourseRecord)>, ScrapeError> {
    let document = Html::parse_document(markup);

    let Some(name) = course_name(&document, code)? else {
        diagnostics.name_resolution(code);
        return Ok(vec![]);
    };
    log::trace!("Found course name: {name}");

    let schema = RowSchema::new("table", &COURSE_TAGS);
    let schedule_sel = parse_selector("div.schedule")?;
    let table_sel = parse_selector("table")?;
    let section_re = section_regex(code)?;

    let mut records = Vec::new();
    for schedule in document.select(&schedule_sel) {
        let Some(session_id) = schedule.value().id() else {
            log::debug!("Schedule block without an id on {code}, skipping");
            continue;
        };
        let session = SessionKey::new(session_id);

        for table in schedule.select(&table_sel) {
            let rows = match extract::extract_table(table, &schema)? {
                Ok(rows) => rows,
                Err(e) => {
                    diagnostics.extraction(code, e);
                    match policy {
                        RowErrorPolicy::SkipRow => continue,
                        RowErrorPolicy::AbortIdentifier => return Ok(vec![]),
                    }
                }
            };

            let anchored = match extract::carry_forward(rows, |row| {
                let text = row.text("Section").ok()?;
                let caps = section_re.captures(text)?;
                Some(Anchor {
                    section: caps[1].to_owned(),
                    person: None,
                })
            }) {
                Ok(anchored) => anchored,
                Err(e) => {
                    diagnostics.extraction(code, e);
                    return Ok(vec![]);
                }
            };

            for row in &anchored {
                match course_record(code, &name, row) {
                    Ok(record) => records.push((session.clone(), record)),
                    Err(e) => {
                        diagnostics.extraction(code, e);
                        if policy == RowErrorPolicy::AbortIdentifier {
                            return Ok(vec![]);
                        }
                    }
                }
            }
        }
    }

    Ok(records)
}

fn course_name(document: &Html, code: &str) -> Result<Option<String>, ScrapeError> {
    let heading_sel = parse_selector("h1")?;
    Ok(document.select(&heading_sel).map(element_text).find_map(|text| {
        text.strip_prefix(code)?
            .trim_start()
            .strip_prefix('-')
            .map(|name| name.trim().to_owned())
    }))
}

fn section_regex(code: &str) -> Result<Regex, ScrapeError> {
    Regex::new(&format!(r"{}\s*(.*?)\s*\(", regex::escape(code)))
        .map_err(|e| ScrapeError::Parse(format!("section pattern for {code}: {e}")))
}

fn course_record(
    code: &str,
    name: &str,
    anchored: &AnchoredRow,
) -> Result<CourseRecord, ExtractError> {
    let row = &anchored.row;
    let schedule = row.text("Day")?;

    let day = parse_weekday(schedule).map_err(|e| ExtractError::Malformed {
        row: row.index,
        field: "day",
        value: match e {
            DayError::Missing => schedule.to_owned(),
            DayError::Unknown(token) => token,
        },
    })?;
    let (start_time, end_time) =
        parse_time_range(schedule).ok_or_else(|| ExtractError::Malformed {
            row: row.index,
            field: "time",
            value: schedule.to_owned(),
        })?;

    Ok(CourseRecord {
        code: code.to_owned(),
        section: anchored.anchor.section.clone(),
        activity: row.text("Activity")?.to_owned(),
        day,
        start_time,
        end_time,
        room: row.text("Place")?.to_owned(),
        name: name.to_owned(),
        professor: row.text("Professor")?.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;

    use super::*;

    const CSI2110_PAGE: &str = r#"
        <html><body>
        <h1>CSI2110 - Data Structures and Algorithms</h1>
        <div class="schedule" id="20159">
            <table>
                <tr><th>Section</th><th>Activity</th><th>Day</th><th>Place</th><th>Professor</th></tr>
                <tr>
                    <td class="Section">CSI2110 A (Lecture)</td>
                    <td class="Activity">Lecture</td>
                    <td class="Day">Tuesday 08:30 - 09:50</td>
                    <td class="Place">MRT 211</td>
                    <td class="Professor">Jane Doe</td>
                </tr>
                <tr>
                    <td class="Section"></td>
                    <td class="Activity">Lecture</td>
                    <td class="Day">Thursday 10:00 - 11:20</td>
                    <td class="Place">MRT 211</td>
                    <td class="Professor">Jane Doe</td>
                </tr>
            </table>
        </div>
        </body></html>
    "#;

    #[test]
    fn add_on_rows_inherit_section() {
        let mut diagnostics = Diagnostics::new();
        let records =
            parse_course_page("CSI2110", CSI2110_PAGE, RowErrorPolicy::SkipRow, &mut diagnostics)
                .unwrap();

        assert!(diagnostics.is_empty());
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|(s, _)| s.id == "20159"));
        assert_eq!(records[0].1.section, "A");
        assert_eq!(records[1].1.section, "A");
        assert_eq!(records[0].1.day, Weekday::Tue);
        assert_eq!(records[1].1.day, Weekday::Thu);
        assert_eq!(records[1].1.start_time, "10:00");
        assert_eq!(records[1].1.name, "Data Structures and Algorithms");
    }

    #[test]
    fn missing_name_yields_no_records() {
        let markup = CSI2110_PAGE.replace("<h1>CSI2110 - Data Structures and Algorithms</h1>", "");
        let mut diagnostics = Diagnostics::new();
        let records =
            parse_course_page("CSI2110", &markup, RowErrorPolicy::SkipRow, &mut diagnostics)
                .unwrap();

        assert!(records.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics.iter().next().unwrap().to_string(),
            "Unable to find name for CSI2110"
        );
    }

    #[test]
    fn bad_day_follows_row_policy() {
        let markup = CSI2110_PAGE.replace("Thursday 10:00", "Funday 10:00");

        let mut skipped = Diagnostics::new();
        let records =
            parse_course_page("CSI2110", &markup, RowErrorPolicy::SkipRow, &mut skipped).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(skipped.len(), 1);

        let mut aborted = Diagnostics::new();
        let records =
            parse_course_page("CSI2110", &markup, RowErrorPolicy::AbortIdentifier, &mut aborted)
                .unwrap();
        assert!(records.is_empty());
        assert_eq!(aborted.len(), 1);
    }

    #[test]
    fn orphan_add_on_aborts_the_identifier() {
        let markup = CSI2110_PAGE.replace("CSI2110 A (Lecture)", "see below");
        let mut diagnostics = Diagnostics::new();
        let records =
            parse_course_page("CSI2110", &markup, RowErrorPolicy::SkipRow, &mut diagnostics)
                .unwrap();

        assert!(records.is_empty());
        assert!(matches!(
            diagnostics.iter().next(),
            Some(crate::diagnostics::Diagnostic::Extraction {
                error: ExtractError::OrphanAddOn { row: 0 },
                ..
            })
        ));
    }

    #[test]
    fn sessions_come_from_schedule_ids() {
        let second = CSI2110_PAGE
            .split("<div class=\"schedule\"")
            .nth(1)
            .unwrap()
            .split("</div>")
            .next()
            .unwrap()
            .replace("id=\"20159\"", "id=\"20161\"");
        let markup = CSI2110_PAGE.replace(
            "</body>",
            &format!("<div class=\"schedule\"{second}</div></body>"),
        );

        let mut diagnostics = Diagnostics::new();
        let records =
            parse_course_page("CSI2110", &markup, RowErrorPolicy::SkipRow, &mut diagnostics)
                .unwrap();
        let sessions: Vec<&str> = records.iter().map(|(s, _)| s.id.as_str()).collect();
        assert_eq!(sessions, vec!["20159", "20159", "20161", "20161"]);
    }
}
