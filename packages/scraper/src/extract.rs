//! Row-schema table extraction.
//!
//! Result tables on the timetable site do not carry usable header rows.
//! Instead every cell is tagged with a structural class (`Section`, `Day`,
//! `Place`, ...). A [`RowSchema`] names the tags of one logical table; the
//! `i`-th row is assembled from the `i`-th cell of every tagged column.
//!
//! Continuation ("add-on") rows omit fields shared with the row above. Use
//! [`carry_forward`] to resolve them against the last anchoring row.

use scraper::{ElementRef, Html, Selector};

use crate::{Locator, ScrapeError};

/// Errors raised while turning table markup into rows.
///
/// These are recoverable: the caller decides whether to skip the row or
/// abandon the identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// Tagged columns of one table have different lengths.
    #[error("column '{tag}' has {found} cells, expected {expected}")]
    ColumnMismatch {
        /// Tag of the offending column.
        tag: String,
        /// Row count of the first column.
        expected: usize,
        /// Row count of the offending column.
        found: usize,
    },

    /// The row has no cell for the requested tag.
    #[error("row {row} has no '{tag}' cell")]
    MissingCell {
        /// Zero-based row index.
        row: usize,
        /// Requested tag.
        tag: String,
    },

    /// The first row of a table is an add-on with nothing to inherit from.
    #[error("row {row} continues a previous row but the table has none")]
    OrphanAddOn {
        /// Zero-based row index.
        row: usize,
    },

    /// A cell's text did not have the expected shape.
    #[error("row {row}: malformed {field} '{value}'")]
    Malformed {
        /// Zero-based row index.
        row: usize,
        /// Which field was being parsed (e.g. `"day"`).
        field: &'static str,
        /// The offending text.
        value: String,
    },
}

/// Names the tagged columns of one logical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSchema {
    table_selector: String,
    tags: Vec<String>,
}

impl RowSchema {
    /// Creates a schema for tables matching `table_selector` whose cells are
    /// `<td>` elements classed with each of `tags`.
    #[must_use]
    pub fn new(table_selector: &str, tags: &[&str]) -> Self {
        Self {
            table_selector: table_selector.to_owned(),
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
        }
    }

    /// CSS selector for the tables this schema applies to.
    #[must_use]
    pub fn table_selector(&self) -> &str {
        &self.table_selector
    }

    /// The column tags, in schema order.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Text and inner markup of one cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawCell {
    /// Trimmed text content.
    pub text: String,
    /// Inner HTML, for cells whose structure matters.
    pub html: String,
}

impl RawCell {
    fn from_element(el: ElementRef<'_>) -> Self {
        Self {
            text: element_text(el),
            html: el.inner_html(),
        }
    }
}

/// One table row as an ordered tuple of tagged cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// Zero-based position within its table.
    pub index: usize,
    cells: Vec<(String, RawCell)>,
}

impl RawRow {
    /// Builds a row from `(tag, text)` pairs. Inner HTML mirrors the text.
    #[cfg(test)]
    #[must_use]
    pub fn from_texts(index: usize, cells: &[(&str, &str)]) -> Self {
        Self {
            index,
            cells: cells
                .iter()
                .map(|(tag, text)| {
                    (
                        (*tag).to_owned(),
                        RawCell {
                            text: (*text).to_owned(),
                            html: (*text).to_owned(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Returns the cell tagged `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::MissingCell`] if the schema had no such tag.
    pub fn cell(&self, tag: &str) -> Result<&RawCell, ExtractError> {
        self.cells
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, cell)| cell)
            .ok_or_else(|| ExtractError::MissingCell {
                row: self.index,
                tag: tag.to_owned(),
            })
    }

    /// Shorthand for the text of the cell tagged `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::MissingCell`] if the schema had no such tag.
    pub fn text(&self, tag: &str) -> Result<&str, ExtractError> {
        self.cell(tag).map(|c| c.text.as_str())
    }
}

/// The fields an add-on row inherits from the row that anchors it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Section label.
    pub section: String,
    /// Person carried along with the section, for tables that need it.
    pub person: Option<String>,
}

/// A row paired with the anchor it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredRow {
    /// The resolved section/person.
    pub anchor: Anchor,
    /// `true` when the anchor was inherited from an earlier row.
    pub is_add_on: bool,
    /// The raw cells.
    pub row: RawRow,
}

/// Parses a CSS selector string, returning a [`ScrapeError`] on failure.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] if the selector is invalid.
pub fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector)
        .map_err(|e| ScrapeError::Parse(format!("invalid CSS selector '{selector}': {e}")))
}

/// Collects an element's text nodes into one trimmed string.
#[must_use]
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_owned()
}

/// Extracts the rows of every table in `markup` matching the schema.
///
/// Each inner `Vec` is one table; add-on resolution must not cross table
/// boundaries.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] for invalid selectors. Column mismatches
/// are reported per table in the inner `Result`.
pub fn extract(
    markup: &str,
    schema: &RowSchema,
) -> Result<Vec<Result<Vec<RawRow>, ExtractError>>, ScrapeError> {
    let document = Html::parse_document(markup);
    let table_sel = parse_selector(&schema.table_selector)?;
    let column_sels = column_selectors(schema)?;

    Ok(document
        .select(&table_sel)
        .map(|table| rows_from_columns(table, schema, &column_sels))
        .collect())
}

/// Extracts the rows of a single, already located table.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] for invalid selectors, or the inner
/// [`ExtractError`] when the tagged columns disagree on row count.
pub fn extract_table(
    table: ElementRef<'_>,
    schema: &RowSchema,
) -> Result<Result<Vec<RawRow>, ExtractError>, ScrapeError> {
    let column_sels = column_selectors(schema)?;
    Ok(rows_from_columns(table, schema, &column_sels))
}

fn column_selectors(schema: &RowSchema) -> Result<Vec<Selector>, ScrapeError> {
    schema
        .tags
        .iter()
        .map(|tag| parse_selector(&format!("td.{tag}")))
        .collect()
}

fn rows_from_columns(
    table: ElementRef<'_>,
    schema: &RowSchema,
    column_sels: &[Selector],
) -> Result<Vec<RawRow>, ExtractError> {
    let columns: Vec<Vec<RawCell>> = column_sels
        .iter()
        .map(|sel| table.select(sel).map(RawCell::from_element).collect())
        .collect();

    let expected = columns.first().map_or(0, Vec::len);
    for (tag, column) in schema.tags.iter().zip(&columns) {
        if column.len() != expected {
            return Err(ExtractError::ColumnMismatch {
                tag: tag.clone(),
                expected,
                found: column.len(),
            });
        }
    }

    let mut columns: Vec<std::vec::IntoIter<RawCell>> =
        columns.into_iter().map(IntoIterator::into_iter).collect();

    Ok((0..expected)
        .map(|index| RawRow {
            index,
            cells: schema
                .tags
                .iter()
                .zip(columns.iter_mut())
                .map(|(tag, column)| (tag.clone(), column.next().unwrap_or_default()))
                .collect(),
        })
        .collect())
}

/// Resolves add-on rows against the last row that anchored a section.
///
/// `anchor_of` returns `Some` for rows that carry their own section (and
/// person, when relevant) and `None` for add-on rows.
///
/// # Errors
///
/// Returns [`ExtractError::OrphanAddOn`] if the first row is an add-on.
pub fn carry_forward<F>(
    rows: Vec<RawRow>,
    mut anchor_of: F,
) -> Result<Vec<AnchoredRow>, ExtractError>
where
    F: FnMut(&RawRow) -> Option<Anchor>,
{
    let mut last: Option<Anchor> = None;
    let mut resolved = Vec::with_capacity(rows.len());

    for row in rows {
        let (anchor, is_add_on) = if let Some(anchor) = anchor_of(&row) {
            last = Some(anchor.clone());
            (anchor, false)
        } else {
            let anchor = last
                .clone()
                .ok_or(ExtractError::OrphanAddOn { row: row.index })?;
            (anchor, true)
        };
        resolved.push(AnchoredRow {
            anchor,
            is_add_on,
            row,
        });
    }

    Ok(resolved)
}

/// One `<option>` of a dropdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownOption {
    /// The `value` attribute.
    pub value: String,
    /// The visible label.
    pub label: String,
}

/// Reads the non-placeholder options of the `<select>` matching `locator`.
///
/// Options with an empty value are skipped.
///
/// # Errors
///
/// Returns [`ScrapeError::ElementNotFound`] if no element matches.
pub fn dropdown_options(
    markup: &str,
    locator: &Locator,
) -> Result<Vec<DropdownOption>, ScrapeError> {
    let document = Html::parse_document(markup);
    let select_sel = locator.selector()?;
    let option_sel = parse_selector("option")?;

    let select = document
        .select(&select_sel)
        .next()
        .ok_or_else(|| ScrapeError::ElementNotFound(locator.clone()))?;

    Ok(select
        .select(&option_sel)
        .filter_map(|option| {
            let value = option.value().attr("value")?.trim().to_owned();
            if value.is_empty() {
                return None;
            }
            Some(DropdownOption {
                value,
                label: element_text(option),
            })
        })
        .collect())
}
