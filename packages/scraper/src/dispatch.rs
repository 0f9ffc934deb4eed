//! Deduplicating dispatcher.
//!
//! Listing pages repeat identifiers (one listing row per section, and the
//! same course reappears across pages). Detail pages are expensive, so each
//! identifier is admitted at most once per outer target. Visit counts are
//! kept for logging only.

use std::collections::BTreeMap;

/// Tracks which identifiers have been dispatched, per outer target.
#[derive(Debug, Default)]
pub struct Dispatcher {
    visits: BTreeMap<String, BTreeMap<String, u32>>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view scoped to one outer target.
    pub fn target(&mut self, target: &str) -> TargetDispatch<'_> {
        TargetDispatch {
            visits: self.visits.entry(target.to_owned()).or_default(),
        }
    }

    /// Number of listing occurrences that were dropped as repeats, across
    /// every target.
    #[must_use]
    pub fn repeats(&self) -> u64 {
        self.visits
            .values()
            .flat_map(BTreeMap::values)
            .map(|count| u64::from(count.saturating_sub(1)))
            .sum()
    }

    /// Number of distinct identifiers dispatched, across every target.
    #[must_use]
    pub fn dispatched(&self) -> usize {
        self.visits.values().map(BTreeMap::len).sum()
    }
}

/// The dispatcher state for a single outer target.
#[derive(Debug)]
pub struct TargetDispatch<'a> {
    visits: &'a mut BTreeMap<String, u32>,
}

impl TargetDispatch<'_> {
    /// Returns `true` if `identifier` was already marked in this target.
    #[must_use]
    pub fn seen(&self, identifier: &str) -> bool {
        self.visits.contains_key(identifier)
    }

    /// Records one occurrence of `identifier`.
    pub fn mark(&mut self, identifier: &str) {
        *self.visits.entry(identifier.to_owned()).or_insert(0) += 1;
    }

    /// Marks `identifier` and returns `true` only on its first occurrence.
    pub fn admit(&mut self, identifier: &str) -> bool {
        let first = !self.seen(identifier);
        self.mark(identifier);
        first
    }

    /// How many times `identifier` has been marked.
    #[must_use]
    pub fn visits(&self, identifier: &str) -> u32 {
        self.visits.get(identifier).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_each_identifier_once() {
        let mut dispatcher = Dispatcher::new();
        let mut scope = dispatcher.target("courses");
        assert!(scope.admit("CSI2110"));
        assert!(!scope.admit("CSI2110"));
        assert!(scope.admit("CSI2132"));
        assert!(!scope.admit("CSI2110"));
        assert_eq!(scope.visits("CSI2110"), 3);
        assert!(scope.seen("CSI2132"));
        assert!(!scope.seen("MAT1341"));

        assert_eq!(dispatcher.dispatched(), 2);
        assert_eq!(dispatcher.repeats(), 2);
    }

    #[test]
    fn identifiers_are_case_sensitive() {
        let mut dispatcher = Dispatcher::new();
        let mut scope = dispatcher.target("courses");
        assert!(scope.admit("CSI2110"));
        assert!(scope.admit("csi2110"));
    }

    #[test]
    fn targets_are_independent() {
        let mut dispatcher = Dispatcher::new();
        assert!(dispatcher.target("20159").admit("CSI2110"));
        assert!(dispatcher.target("20161").admit("CSI2110"));
        assert!(!dispatcher.target("20159").admit("CSI2110"));
    }
}
