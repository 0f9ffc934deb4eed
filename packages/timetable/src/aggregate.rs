//! Session/faculty aggregation.
//!
//! Records are grouped first by [`SessionKey`], then by [`FacultyKey`].
//! Buckets are created on first insert and only ever appended to. Records
//! are put in their final order when the buckets are drained for output.

use std::collections::BTreeMap;

use campus_guide_timetable_models::{FacultyKey, SessionKey, TimetableRecord};

/// The records of one `(session, faculty)` pair, sorted for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket<R> {
    /// Session the records belong to.
    pub session: SessionKey,
    /// Faculty the records belong to.
    pub faculty: FacultyKey,
    /// Records sorted by code, then section.
    pub records: Vec<R>,
}

/// Two-level grouping: session → faculty → records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets<R> {
    sessions: BTreeMap<SessionKey, BTreeMap<FacultyKey, Vec<R>>>,
    dropped: usize,
}

impl<R> Default for Buckets<R> {
    fn default() -> Self {
        Self {
            sessions: BTreeMap::new(),
            dropped: 0,
        }
    }
}

impl<R: TimetableRecord> Buckets<R> {
    /// Creates an empty set of buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `record` to its bucket, creating the bucket if needed.
    ///
    /// Records whose faculty is [`FacultyKey::Unrecognized`] are dropped and
    /// `false` is returned.
    pub fn add(&mut self, session: SessionKey, faculty: FacultyKey, record: R) -> bool {
        if !faculty.is_recognized() {
            log::trace!(
                "Dropping {} {} with unrecognized faculty",
                record.code(),
                record.section()
            );
            self.dropped += 1;
            return false;
        }
        self.sessions
            .entry(session)
            .or_default()
            .entry(faculty)
            .or_default()
            .push(record);
        true
    }

    /// Total number of bucketed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Whether no record has been bucketed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records dropped for an unrecognized faculty.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Sessions with at least one record, in key order.
    pub fn sessions(&self) -> impl Iterator<Item = &SessionKey> {
        self.sessions.keys()
    }

    /// Faculties with at least one record in `session`, in key order.
    #[cfg(test)]
    pub fn faculties<'a>(&'a self, session: &SessionKey) -> impl Iterator<Item = FacultyKey> + 'a {
        self.sessions
            .get(session)
            .into_iter()
            .flat_map(BTreeMap::keys)
            .copied()
    }

    /// Records of one bucket in insertion order.
    #[cfg(test)]
    #[must_use]
    pub fn records(&self, session: &SessionKey, faculty: FacultyKey) -> &[R] {
        self.sessions
            .get(session)
            .and_then(|faculties| faculties.get(&faculty))
            .map_or(&[], Vec::as_slice)
    }

    /// Drains the buckets in (session, faculty) order, each stably sorted by
    /// code then section.
    #[must_use]
    pub fn into_sorted(self) -> Vec<Bucket<R>> {
        self.sessions
            .into_iter()
            .flat_map(|(session, faculties)| {
                faculties.into_iter().map(move |(faculty, mut records)| {
                    records.sort_by(|a, b| {
                        a.code()
                            .cmp(b.code())
                            .then_with(|| a.section().cmp(b.section()))
                    });
                    Bucket {
                        session: session.clone(),
                        faculty,
                        records,
                    }
                })
            })
            .collect()
    }
}
