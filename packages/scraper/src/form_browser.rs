//! HTTP [`BrowserDriver`] for ASP.NET `WebForms` pages.
//!
//! `WebForms` pages keep their state in hidden form fields (`__VIEWSTATE`,
//! `__EVENTVALIDATION`, ...) plus a session cookie, and every interaction is
//! a POST of the whole form back to the server. That is all the timetable
//! search needs, so instead of a real browser this driver:
//!
//! - `navigate`: GETs the page.
//! - `select_dropdown_option`: remembers the chosen value for the
//!   `<select>`'s form field, to be sent with the next post.
//! - `click_element`: posts the form with the clicked submit button, or
//!   follows a `javascript:__doPostBack(...)` link.
//! - `run_script`: understands `__doPostBack(...)` and
//!   `WebForm_DoPostBackWithOptions(new WebForm_PostBackOptions(...))`.
//!
//! The current URL is the final URL after redirects, so a postback that the
//! server answers with a redirect to its error page is visible to the
//! termination predicate. Like a browser, the driver loads a page whatever
//! its HTTP status; only transport failures are errors.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use crate::extract::{element_text, parse_selector};
use crate::http::build_client;
use crate::retry::{self, FetchedPage, StatusPolicy};
use crate::{BrowserDriver, Locator, ScrapeError};

static DO_POSTBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"__doPostBack\(\s*['"]([^'"]*)['"]\s*,\s*['"]([^'"]*)['"]\s*\)"#)
        .unwrap_or_else(|_| unreachable!())
});

static POSTBACK_OPTIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"WebForm_PostBackOptions\(\s*['"]([^'"]*)['"]\s*,\s*['"]([^'"]*)['"]"#)
        .unwrap_or_else(|_| unreachable!())
});

/// The event target and argument of a `WebForms` postback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Postback {
    /// Value for `__EVENTTARGET`.
    pub target: String,
    /// Value for `__EVENTARGUMENT`.
    pub argument: String,
}

/// Recognises the postback scripts `WebForms` pages emit.
#[must_use]
pub fn parse_postback(code: &str) -> Option<Postback> {
    DO_POSTBACK_RE
        .captures(code)
        .or_else(|| POSTBACK_OPTIONS_RE.captures(code))
        .map(|caps| Postback {
            target: caps[1].to_owned(),
            argument: caps[2].to_owned(),
        })
}

/// Drives `WebForms` pages over plain HTTP.
#[derive(Debug)]
pub struct FormBrowser {
    client: reqwest::Client,
    max_retries: u32,
    url: String,
    content: String,
    overrides: BTreeMap<String, String>,
}

impl FormBrowser {
    /// Creates a driver with a cookie-backed session.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the client cannot be built.
    pub fn new(max_retries: u32) -> Result<Self, ScrapeError> {
        Ok(Self {
            client: build_client(true)?,
            max_retries,
            url: String::new(),
            content: String::new(),
            overrides: BTreeMap::new(),
        })
    }

    fn load(&mut self, page: FetchedPage) {
        log::trace!("Loaded {} ({} bytes)", page.url, page.body.len());
        self.url = page.url;
        self.content = page.body;
        self.overrides.clear();
    }

    async fn submit(&mut self, extra: &[(String, String)]) -> Result<(), ScrapeError> {
        let submission = build_submission(&self.content, &self.url, &self.overrides, extra)?;
        log::trace!(
            "Posting {} fields to {}",
            submission.fields.len(),
            submission.action
        );
        let page = retry::send_text(
            || {
                self.client
                    .post(&submission.action)
                    .form(&submission.fields)
            },
            self.max_retries,
            StatusPolicy::Load,
        )
        .await?;
        self.load(page);
        Ok(())
    }

    async fn postback(&mut self, postback: Postback) -> Result<(), ScrapeError> {
        self.submit(&[
            ("__EVENTTARGET".to_owned(), postback.target),
            ("__EVENTARGUMENT".to_owned(), postback.argument),
        ])
        .await
    }
}

impl BrowserDriver for FormBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
        let page =
            retry::send_text(|| self.client.get(url), self.max_retries, StatusPolicy::Load)
                .await?;
        self.load(page);
        Ok(())
    }

    fn current_url(&self) -> &str {
        &self.url
    }

    fn current_page_content(&self) -> &str {
        &self.content
    }

    async fn click_element(&mut self, locator: &Locator) -> Result<(), ScrapeError> {
        match resolve_click(&self.content, locator)? {
            Click::Submit { name, value } => self.submit(&[(name, value)]).await,
            Click::Postback(postback) => self.postback(postback).await,
        }
    }

    async fn select_dropdown_option(
        &mut self,
        locator: &Locator,
        value: &str,
    ) -> Result<(), ScrapeError> {
        let field = dropdown_field(&self.content, locator, value)?;
        self.overrides.insert(field, value.to_owned());
        Ok(())
    }

    async fn run_script(&mut self, code: &str) -> Result<(), ScrapeError> {
        let postback =
            parse_postback(code).ok_or_else(|| ScrapeError::UnsupportedScript(code.to_owned()))?;
        self.postback(postback).await
    }
}

/// A form ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FormSubmission {
    action: String,
    fields: Vec<(String, String)>,
}

/// What clicking an element amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Click {
    Submit { name: String, value: String },
    Postback(Postback),
}

fn set_field(fields: &mut Vec<(String, String)>, name: &str, value: &str) {
    if let Some((_, existing)) = fields.iter_mut().find(|(n, _)| n == name) {
        value.clone_into(existing);
    } else {
        fields.push((name.to_owned(), value.to_owned()));
    }
}

fn resolve_url(base: &str, action: &str) -> Result<String, ScrapeError> {
    let base = reqwest::Url::parse(base)
        .map_err(|e| ScrapeError::Parse(format!("invalid page url '{base}': {e}")))?;
    base.join(action)
        .map(String::from)
        .map_err(|e| ScrapeError::Parse(format!("invalid form action '{action}': {e}")))
}

/// Serialises the page's first form the way a browser would submit it.
fn build_submission(
    content: &str,
    base_url: &str,
    overrides: &BTreeMap<String, String>,
    extra: &[(String, String)],
) -> Result<FormSubmission, ScrapeError> {
    let document = Html::parse_document(content);
    let form_sel = parse_selector("form")?;
    let field_sel = parse_selector("input[name], select[name], textarea[name]")?;
    let option_sel = parse_selector("option")?;

    let form = document
        .select(&form_sel)
        .next()
        .ok_or_else(|| ScrapeError::Parse(format!("no <form> on {base_url}")))?;
    let action = resolve_url(base_url, form.value().attr("action").unwrap_or(""))?;

    let mut fields = Vec::new();
    for el in form.select(&field_sel) {
        let element = el.value();
        let Some(name) = element.attr("name") else {
            continue;
        };

        let value = match element.name() {
            "input" => {
                let kind = element.attr("type").unwrap_or("text").to_ascii_lowercase();
                match kind.as_str() {
                    "submit" | "button" | "image" | "reset" | "file" => continue,
                    "checkbox" | "radio" if element.attr("checked").is_none() => continue,
                    _ => element.attr("value").unwrap_or("").to_owned(),
                }
            }
            "select" => {
                let selected = el
                    .select(&option_sel)
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| el.select(&option_sel).next());
                selected.map_or_else(String::new, |o| {
                    o.value()
                        .attr("value")
                        .map_or_else(|| element_text(o), ToOwned::to_owned)
                })
            }
            _ => el.text().collect(),
        };
        set_field(&mut fields, name, &value);
    }

    for (name, value) in overrides {
        set_field(&mut fields, name, value);
    }
    for (name, value) in extra {
        set_field(&mut fields, name, value);
    }

    Ok(FormSubmission { action, fields })
}

fn resolve_click(content: &str, locator: &Locator) -> Result<Click, ScrapeError> {
    let document = Html::parse_document(content);
    let selector = locator.selector()?;
    let el = document
        .select(&selector)
        .next()
        .ok_or_else(|| ScrapeError::ElementNotFound(locator.clone()))?;
    let element = el.value();

    if let Some(postback) = element
        .attr("href")
        .or_else(|| element.attr("onclick"))
        .and_then(parse_postback)
    {
        return Ok(Click::Postback(postback));
    }

    match element.name() {
        "input" | "button" => {
            let name = element
                .attr("name")
                .ok_or_else(|| ScrapeError::Parse(format!("button {locator} has no name")))?;
            Ok(Click::Submit {
                name: name.to_owned(),
                value: element.attr("value").unwrap_or("").to_owned(),
            })
        }
        other => Err(ScrapeError::Parse(format!(
            "element {locator} (<{other}>) is not clickable"
        ))),
    }
}

/// Returns the form field name of the dropdown, after checking that the
/// option exists.
fn dropdown_field(content: &str, locator: &Locator, value: &str) -> Result<String, ScrapeError> {
    let document = Html::parse_document(content);
    let selector = locator.selector()?;
    let option_sel = parse_selector("option")?;
    let select = document
        .select(&selector)
        .next()
        .ok_or_else(|| ScrapeError::ElementNotFound(locator.clone()))?;

    if !select
        .select(&option_sel)
        .any(|o| o.value().attr("value") == Some(value))
    {
        return Err(ScrapeError::OptionNotFound {
            locator: locator.clone(),
            value: value.to_owned(),
        });
    }

    select
        .value()
        .attr("name")
        .map(ToOwned::to_owned)
        .ok_or_else(|| ScrapeError::Parse(format!("dropdown {locator} has no name")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{Reply, serve};
    use crate::walker::{TerminationPredicate as _, UrlMarker};

    const SEARCH_PAGE: &str = r#"
        <html><body>
        <form method="post" action="./Search.aspx" id="aspnetForm">
            <input type="hidden" name="__EVENTTARGET" id="__EVENTTARGET" value="" />
            <input type="hidden" name="__EVENTARGUMENT" id="__EVENTARGUMENT" value="" />
            <input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="abc123" />
            <select name="ctl00$Main$SubjectDropDown" id="ctl00_Main_SubjectDropDown">
                <option value="">All subjects</option>
                <option value="CSI">Computer Science</option>
                <option value="MAT">Mathematics</option>
            </select>
            <input type="checkbox" name="ctl00$Main$OpenOnly" />
            <input type="checkbox" name="ctl00$Main$English" checked="checked" value="on" />
            <input type="submit" name="ctl00$Main$Basic_Button" value="Search" id="ctl00_Main_Basic_Button" />
            <a id="nextLink" href="javascript:__doPostBack('ctl00$Main$ctl05','')">Next</a>
            <span id="label">Not clickable</span>
        </form>
        </body></html>
    "#;

    fn field<'a>(submission: &'a FormSubmission, name: &str) -> Option<&'a str> {
        submission
            .fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn parses_do_postback_script() {
        assert_eq!(
            parse_postback(r#"__doPostBack("ctl00$MainContentPlaceHolder$ctl05","")"#),
            Some(Postback {
                target: "ctl00$MainContentPlaceHolder$ctl05".to_owned(),
                argument: String::new(),
            })
        );
    }

    #[test]
    fn parses_postback_with_options_script() {
        let script = r#"WebForm_DoPostBackWithOptions(new WebForm_PostBackOptions("ctl00$ChLangUrlLinkButton1", "fr-CA", false, "", "", false, true))"#;
        assert_eq!(
            parse_postback(script),
            Some(Postback {
                target: "ctl00$ChLangUrlLinkButton1".to_owned(),
                argument: "fr-CA".to_owned(),
            })
        );
    }

    #[test]
    fn other_scripts_are_not_postbacks() {
        assert_eq!(parse_postback("window.history.go(-1)"), None);
    }

    #[test]
    fn serialises_form_like_a_browser() {
        let submission = build_submission(
            SEARCH_PAGE,
            "https://web30.example.test/v3/SITS/timetable/Search.aspx",
            &BTreeMap::new(),
            &[],
        )
        .unwrap();

        assert_eq!(
            submission.action,
            "https://web30.example.test/v3/SITS/timetable/Search.aspx"
        );
        assert_eq!(field(&submission, "__VIEWSTATE"), Some("abc123"));
        assert_eq!(field(&submission, "ctl00$Main$SubjectDropDown"), Some(""));
        assert_eq!(field(&submission, "ctl00$Main$English"), Some("on"));
        assert_eq!(field(&submission, "ctl00$Main$OpenOnly"), None);
        assert_eq!(field(&submission, "ctl00$Main$Basic_Button"), None);
    }

    #[test]
    fn overrides_and_extra_fields_replace_form_values() {
        let mut overrides = BTreeMap::new();
        overrides.insert("ctl00$Main$SubjectDropDown".to_owned(), "MAT".to_owned());
        let submission = build_submission(
            SEARCH_PAGE,
            "https://web30.example.test/v3/SITS/timetable/Search.aspx",
            &overrides,
            &[("__EVENTTARGET".to_owned(), "ctl00$Main$ctl05".to_owned())],
        )
        .unwrap();

        assert_eq!(field(&submission, "ctl00$Main$SubjectDropDown"), Some("MAT"));
        assert_eq!(field(&submission, "__EVENTTARGET"), Some("ctl00$Main$ctl05"));
        let targets = submission
            .fields
            .iter()
            .filter(|(n, _)| n == "__EVENTTARGET")
            .count();
        assert_eq!(targets, 1);
    }

    #[test]
    fn clicking_submit_sends_button_name() {
        let click = resolve_click(SEARCH_PAGE, &Locator::id("ctl00_Main_Basic_Button")).unwrap();
        assert_eq!(
            click,
            Click::Submit {
                name: "ctl00$Main$Basic_Button".to_owned(),
                value: "Search".to_owned(),
            }
        );
    }

    #[test]
    fn clicking_postback_link_follows_script() {
        let click = resolve_click(SEARCH_PAGE, &Locator::id("nextLink")).unwrap();
        assert_eq!(
            click,
            Click::Postback(Postback {
                target: "ctl00$Main$ctl05".to_owned(),
                argument: String::new(),
            })
        );
    }

    #[test]
    fn clicking_plain_element_fails() {
        assert!(matches!(
            resolve_click(SEARCH_PAGE, &Locator::id("label")),
            Err(ScrapeError::Parse(_))
        ));
        assert!(matches!(
            resolve_click(SEARCH_PAGE, &Locator::id("missing")),
            Err(ScrapeError::ElementNotFound(_))
        ));
    }

    #[test]
    fn dropdown_selection_validates_option() {
        let locator = Locator::id("ctl00_Main_SubjectDropDown");
        assert_eq!(
            dropdown_field(SEARCH_PAGE, &locator, "CSI").unwrap(),
            "ctl00$Main$SubjectDropDown"
        );
        assert!(matches!(
            dropdown_field(SEARCH_PAGE, &locator, "XYZ"),
            Err(ScrapeError::OptionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn postback_redirected_to_error_status_page_is_loaded() {
        let base = serve(BTreeMap::from([
            ("GET /Search.aspx", Reply::ok(SEARCH_PAGE)),
            ("POST /Search.aspx", Reply::redirect("/ErrorInternal.aspx")),
            (
                "GET /ErrorInternal.aspx",
                Reply::status("500 Internal Server Error", "<html><body>Internal error</body></html>"),
            ),
        ]))
        .await;

        let mut browser = FormBrowser::new(0).unwrap();
        browser.navigate(&format!("{base}/Search.aspx")).await.unwrap();
        browser
            .run_script("__doPostBack('ctl00$Main$ctl05','')")
            .await
            .unwrap();

        assert_eq!(browser.current_url(), format!("{base}/ErrorInternal.aspx"));
        assert!(browser.current_page_content().contains("Internal error"));
        assert!(UrlMarker::new("ErrorInternal").is_terminal(browser.current_url()));
    }

    #[tokio::test]
    async fn navigating_to_missing_page_loads_it() {
        let base = serve(BTreeMap::new()).await;

        let mut browser = FormBrowser::new(0).unwrap();
        browser.navigate(&format!("{base}/Gone.aspx")).await.unwrap();

        assert_eq!(browser.current_url(), format!("{base}/Gone.aspx"));
        assert!(browser.current_page_content().is_empty());
    }
}
