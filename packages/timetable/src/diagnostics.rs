//! Recoverable problems collected during a run.
//!
//! Row-level extraction errors and missing course names never abort the
//! run. They are gathered here and reported once, at the end.

use campus_guide_scraper::extract::ExtractError;

/// One recoverable problem, tied to the identifier it affected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    /// A row (or table) of a detail page could not be parsed.
    #[error("Error parsing {identifier}: {error}")]
    Extraction {
        /// Course code whose page was being parsed.
        identifier: String,
        /// What went wrong.
        error: ExtractError,
    },

    /// A page lacks the title/name marker for its identifier.
    #[error("Unable to find name for {identifier}")]
    NameResolution {
        /// Course or discipline code.
        identifier: String,
    },
}

/// Ordered list of [`Diagnostic`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an extraction error for `identifier`.
    pub fn extraction(&mut self, identifier: &str, error: ExtractError) {
        log::debug!("Error parsing {identifier}: {error}");
        self.entries.push(Diagnostic::Extraction {
            identifier: identifier.to_owned(),
            error,
        });
    }

    /// Records a missing name for `identifier`.
    pub fn name_resolution(&mut self, identifier: &str) {
        log::debug!("Unable to find name for {identifier}");
        self.entries.push(Diagnostic::NameResolution {
            identifier: identifier.to_owned(),
        });
    }

    /// Number of recorded problems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing went wrong.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the recorded problems in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    /// Logs the count followed by every message.
    pub fn log_summary(&self) {
        if self.entries.is_empty() {
            return;
        }
        log::warn!(
            "{} errors were encountered. Printing messages below.",
            self.entries.len()
        );
        for entry in &self.entries {
            log::warn!("ERROR: {entry}");
        }
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_messages_per_identifier() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.name_resolution("CSI2110");
        diagnostics.extraction(
            "MAT1341",
            ExtractError::Malformed {
                row: 2,
                field: "day",
                value: "Funday".to_owned(),
            },
        );

        let messages: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec![
                "Unable to find name for CSI2110",
                "Error parsing MAT1341: row 2: malformed day 'Funday'",
            ]
        );
        assert_eq!(diagnostics.len(), 2);
        assert!(!diagnostics.is_empty());
    }
}
