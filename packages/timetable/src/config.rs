//! Site configuration.
//!
//! Every URL, element id and script the scrapes depend on lives in
//! [`SiteConfig`]. The defaults target the University of Ottawa timetable;
//! a TOML file can override any subset of them:
//!
//! ```toml
//! max_pages = 1000
//! row_error_policy = "abort_identifier"
//!
//! [search_button]
//! id = "ctl00_MainContentPlaceHolder_Basic_Button"
//! ```

use std::path::Path;

use campus_guide_scraper::Locator;
use campus_guide_scraper::walker::{EntryPoint, UrlMarker, WalkOptions};
use serde::Deserialize;

use crate::TimetableError;

const TIMETABLE_BASE: &str = "https://web30.uottawa.ca/v3/SITS/timetable";

/// What to do when one row of a detail page cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorPolicy {
    /// Skip the row, record a diagnostic, keep the identifier's other rows.
    #[default]
    SkipRow,
    /// Record a diagnostic and drop every record of the identifier.
    AbortIdentifier,
}

/// Site-specific constants for the timetable scrapes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Course search page.
    pub search_url: String,
    /// Exam search page.
    pub exam_search_url: String,
    /// Course detail page; `{code}` is replaced by the course code.
    pub course_url: String,
    /// Exam detail page; `{code}` and `{session}` are replaced.
    pub exam_url: String,
    /// The "show all results" button.
    pub search_button: Locator,
    /// Discipline (subject) dropdown on the course search page.
    pub subject_dropdown: Locator,
    /// Session dropdown on the exam search page.
    pub session_dropdown: Locator,
    /// Script requesting the next results page.
    pub next_page_script: String,
    /// Script switching the site to French.
    pub french_script: String,
    /// Script switching the site back to English.
    pub english_script: String,
    /// Substring of the URL reached once results are exhausted.
    pub end_of_results_marker: String,
    /// Page cap per outer target.
    pub max_pages: u32,
    /// Retries for transient HTTP failures in the HTTP collaborators.
    pub max_retries: u32,
    /// Policy for unparseable detail rows.
    pub row_error_policy: RowErrorPolicy,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            search_url: format!("{TIMETABLE_BASE}/Search.aspx"),
            exam_search_url: format!("{TIMETABLE_BASE}/ExamSearch.aspx"),
            course_url: format!("{TIMETABLE_BASE}/Course.aspx?code={{code}}"),
            exam_url: format!("{TIMETABLE_BASE}/Exam.aspx?code={{code}}&session={{session}}"),
            search_button: Locator::id("ctl00_MainContentPlaceHolder_Basic_Button"),
            subject_dropdown: Locator::id("ctl00_MainContentPlaceHolder_Basic_SubjectDropDown"),
            session_dropdown: Locator::id("ctl00_MainContentPlaceHolder_Basic_SessionDropDown"),
            next_page_script: r#"__doPostBack("ctl00$MainContentPlaceHolder$ctl05","")"#
                .to_owned(),
            french_script: language_script("fr-CA"),
            english_script: language_script("en-CA"),
            end_of_results_marker: "ErrorInternal".to_owned(),
            max_pages: 500,
            max_retries: 0,
            row_error_policy: RowErrorPolicy::SkipRow,
        }
    }
}

fn language_script(culture: &str) -> String {
    format!(
        r#"WebForm_DoPostBackWithOptions(new WebForm_PostBackOptions("ctl00$ChLangUrlLinkButton1", "{culture}", false, "", "", false, true))"#
    )
}

impl SiteConfig {
    /// Parses a TOML override. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TimetableError::Config`] if the TOML is invalid.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, TimetableError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Reads and parses a TOML override file.
    ///
    /// # Errors
    ///
    /// Returns [`TimetableError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, TimetableError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Detail page URL for a course.
    #[must_use]
    pub fn course_url(&self, code: &str) -> String {
        self.course_url.replace("{code}", code)
    }

    /// Detail page URL for a course's exams in one session.
    #[must_use]
    pub fn exam_url(&self, code: &str, session: &str) -> String {
        self.exam_url
            .replace("{code}", code)
            .replace("{session}", session)
    }

    /// Termination predicate for every walk.
    #[must_use]
    pub fn termination(&self) -> UrlMarker {
        UrlMarker::new(&self.end_of_results_marker)
    }

    /// Paging options for every walk.
    #[must_use]
    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            next_page_script: self.next_page_script.clone(),
            max_pages: self.max_pages,
        }
    }

    /// Entry point of the course search, optionally filtered to one
    /// discipline.
    #[must_use]
    pub fn course_search(&self, discipline: Option<&str>) -> EntryPoint {
        EntryPoint {
            url: self.search_url.clone(),
            selection: discipline.map(|code| (self.subject_dropdown.clone(), code.to_owned())),
            search_button: self.search_button.clone(),
        }
    }

    /// Entry point of the exam search for one session.
    #[must_use]
    pub fn exam_search(&self, session: &str) -> EntryPoint {
        EntryPoint {
            url: self.exam_search_url.clone(),
            selection: Some((self.session_dropdown.clone(), session.to_owned())),
            search_button: self.search_button.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_urls_expand_templates() {
        let config = SiteConfig::default();
        assert_eq!(
            config.course_url("CSI2110"),
            "https://web30.uottawa.ca/v3/SITS/timetable/Course.aspx?code=CSI2110"
        );
        assert_eq!(
            config.exam_url("CSI2110", "20159"),
            "https://web30.uottawa.ca/v3/SITS/timetable/Exam.aspx?code=CSI2110&session=20159"
        );
    }

    #[test]
    fn toml_overrides_keep_unspecified_defaults() {
        let config = SiteConfig::from_toml_str(
            r#"
            max_pages = 42
            row_error_policy = "abort_identifier"
            end_of_results_marker = "Oops"

            [search_button]
            css = "input[type=submit]"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_pages, 42);
        assert_eq!(config.row_error_policy, RowErrorPolicy::AbortIdentifier);
        assert_eq!(
            config.search_button,
            Locator::Css("input[type=submit]".to_owned())
        );
        assert_eq!(config.search_url, SiteConfig::default().search_url);
        assert_eq!(config.walk_options().max_pages, 42);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = SiteConfig::from_toml_str("max_pages = \"many\"").unwrap_err();
        assert!(matches!(err, TimetableError::Config(_)));
    }

    #[test]
    fn exam_search_selects_the_session() {
        let config = SiteConfig::default();
        let entry = config.exam_search("20159");
        assert_eq!(entry.url, config.exam_search_url);
        assert_eq!(
            entry.selection,
            Some((config.session_dropdown.clone(), "20159".to_owned()))
        );
        assert_eq!(config.course_search(None).selection, None);
    }
}
