//! Search result listings.
//!
//! Each results page lists one row per course section with a link whose
//! text starts with the course code and a `Faculty` cell naming the
//! offering faculty.

use std::sync::LazyLock;

use campus_guide_scraper::ScrapeError;
use campus_guide_scraper::extract::{element_text, parse_selector};
use regex::Regex;
use scraper::Html;

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}[0-9]{4}").unwrap_or_else(|_| unreachable!()));

/// One `(identifier, category)` pair from a results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    /// Course code as presented by the source.
    pub code: String,
    /// Free-text faculty name.
    pub category: String,
}

/// Extracts every listing row from a results page, in page order.
///
/// Rows without a course-code link or without a `Faculty` cell are ignored.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] if a selector fails to parse.
pub fn listing_rows(markup: &str) -> Result<Vec<ListingRow>, ScrapeError> {
    let document = Html::parse_document(markup);
    let row_sel = parse_selector("tr")?;
    let link_sel = parse_selector("a")?;
    let faculty_sel = parse_selector("td.Faculty")?;

    Ok(document
        .select(&row_sel)
        .filter_map(|row| {
            let code = row
                .select(&link_sel)
                .map(element_text)
                .find(|text| CODE_RE.is_match(text))?;
            let category = row.select(&faculty_sel).next().map(element_text)?;
            Some(ListingRow { code, category })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_codes_with_faculties() {
        let markup = r#"
            <table class="results">
                <tr><th>Course</th><th>Faculty</th></tr>
                <tr>
                    <td class="CourseCode"><a href="Course.aspx?code=CSI2110">CSI2110</a></td>
                    <td class="Faculty">Faculty of Engineering</td>
                </tr>
                <tr>
                    <td class="CourseCode"><a href="Course.aspx?code=MAT1341">MAT1341</a></td>
                    <td class="Faculty">Faculty of Science</td>
                </tr>
                <tr><td><a href="Help.aspx">Help</a></td><td class="Faculty">n/a</td></tr>
                <tr><td><a href="Course.aspx?code=PHY1121">PHY1121</a></td></tr>
            </table>
        "#;
        assert_eq!(
            listing_rows(markup).unwrap(),
            vec![
                ListingRow {
                    code: "CSI2110".to_owned(),
                    category: "Faculty of Engineering".to_owned(),
                },
                ListingRow {
                    code: "MAT1341".to_owned(),
                    category: "Faculty of Science".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn empty_page_has_no_rows() {
        assert!(listing_rows("<html><body></body></html>").unwrap().is_empty());
    }
}
