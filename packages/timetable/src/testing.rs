//! In-memory collaborators for scrape tests.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use campus_guide_scraper::{BrowserDriver, DetailFetcher, Locator, ScrapeError};

use crate::config::SiteConfig;

const RESULTS_URL: &str = "https://fake.test/Results.aspx";
const ERROR_URL: &str = "https://fake.test/ErrorInternal.aspx";

/// A unique, not yet existing directory under the system temp dir.
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "campus_guide_timetable_{name}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// A results page with one listing row per `(code, faculty)` pair.
pub fn listing_page(rows: &[(&str, &str)]) -> String {
    let mut page = String::from("<html><body><table class=\"results\">");
    for (code, faculty) in rows {
        let _ = write!(
            page,
            "<tr><td><a href=\"Course.aspx?code={code}\">{code}</a></td>\
             <td class=\"Faculty\">{faculty}</td></tr>"
        );
    }
    page.push_str("</table></body></html>");
    page
}

fn dropdown(locator: &Locator, options: &[(String, String)]) -> String {
    let Locator::Id(id) = locator else {
        panic!("fake browser only renders id locators");
    };
    let mut html = format!("<select id=\"{id}\"><option value=\"\">--</option>");
    for (value, label) in options {
        let _ = write!(html, "<option value=\"{value}\">{label}</option>");
    }
    html.push_str("</select>");
    html
}

fn pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(a, b)| ((*a).to_owned(), (*b).to_owned()))
        .collect()
}

/// Simulates the search pages of the timetable site.
///
/// Results are keyed by the dropdown value selected before the search
/// button is clicked (`None` for an unfiltered search).
pub struct FakeBrowser {
    site: SiteConfig,
    subjects_en: Vec<(String, String)>,
    subjects_fr: Vec<(String, String)>,
    sessions: Vec<(String, String)>,
    results: BTreeMap<Option<String>, Vec<String>>,
    end_marker: bool,
    url: String,
    content: String,
    selection: Option<String>,
    page: usize,
}

impl FakeBrowser {
    pub fn new(site: &SiteConfig) -> Self {
        Self {
            site: site.clone(),
            subjects_en: vec![],
            subjects_fr: vec![],
            sessions: vec![],
            results: BTreeMap::new(),
            end_marker: true,
            url: String::new(),
            content: String::new(),
            selection: None,
            page: 0,
        }
    }

    pub fn with_subjects(mut self, english: &[(&str, &str)], french: &[(&str, &str)]) -> Self {
        self.subjects_en = pairs(english);
        self.subjects_fr = pairs(french);
        self
    }

    pub fn with_sessions(mut self, sessions: &[(&str, &str)]) -> Self {
        self.sessions = pairs(sessions);
        self
    }

    pub fn with_results(mut self, selection: Option<&str>, pages: Vec<String>) -> Self {
        self.results.insert(selection.map(str::to_owned), pages);
        self
    }

    /// Past the last page, keeps serving it instead of redirecting to the
    /// error page.
    pub fn without_end_marker(mut self) -> Self {
        self.end_marker = false;
        self
    }

    fn search_page(&self, subjects: &[(String, String)]) -> String {
        format!(
            "<html><body><form>{}</form></body></html>",
            dropdown(&self.site.subject_dropdown, subjects)
        )
    }

    fn show_page(&mut self) {
        let pages = self
            .results
            .get(&self.selection)
            .map_or(&[][..], Vec::as_slice);
        if let Some(page) = pages.get(self.page) {
            self.url = RESULTS_URL.to_owned();
            self.content.clone_from(page);
        } else if self.end_marker || pages.is_empty() {
            self.url = ERROR_URL.to_owned();
            self.content = "<html><body>Internal error</body></html>".to_owned();
        }
    }
}

impl BrowserDriver for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
        self.selection = None;
        self.page = 0;
        self.url = url.to_owned();
        self.content = if url == self.site.search_url {
            self.search_page(&self.subjects_en)
        } else if url == self.site.exam_search_url {
            format!(
                "<html><body><form>{}</form></body></html>",
                dropdown(&self.site.session_dropdown, &self.sessions)
            )
        } else {
            return Err(ScrapeError::Parse(format!("unknown url {url}")));
        };
        Ok(())
    }

    fn current_url(&self) -> &str {
        &self.url
    }

    fn current_page_content(&self) -> &str {
        &self.content
    }

    async fn click_element(&mut self, _locator: &Locator) -> Result<(), ScrapeError> {
        self.page = 0;
        self.show_page();
        Ok(())
    }

    async fn select_dropdown_option(
        &mut self,
        _locator: &Locator,
        value: &str,
    ) -> Result<(), ScrapeError> {
        self.selection = Some(value.to_owned());
        Ok(())
    }

    async fn run_script(&mut self, code: &str) -> Result<(), ScrapeError> {
        if code == self.site.next_page_script {
            self.page += 1;
            self.show_page();
        } else if code == self.site.french_script {
            self.content = self.search_page(&self.subjects_fr);
        } else if code == self.site.english_script {
            self.content = self.search_page(&self.subjects_en);
        } else {
            return Err(ScrapeError::UnsupportedScript(code.to_owned()));
        }
        Ok(())
    }
}

/// Serves detail pages from a map and counts every request.
#[derive(Default)]
pub struct FakeFetcher {
    pages: BTreeMap<String, String>,
    fetches: Mutex<BTreeMap<String, u32>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, markup: &str) -> Self {
        self.pages.insert(url.to_owned(), markup.to_owned());
        self
    }

    pub fn fetches(&self, url: &str) -> u32 {
        self.fetches
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }
}

impl DetailFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(url.to_owned())
            .or_insert(0) += 1;

        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScrapeError::Fetch {
                url: url.to_owned(),
                source: Box::new(ScrapeError::Parse("no such page".to_owned())),
            })
    }
}
