#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Timetable record types and the keys used to group them.
//!
//! Every scrape produces either [`CourseRecord`]s or [`ExamRecord`]s (grouped
//! by [`SessionKey`] and [`FacultyKey`] before output), or
//! [`DisciplineEntry`] values for the discipline listing.

use std::collections::BTreeSet;

use chrono::Weekday;
use serde::{Deserialize, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};

/// Short code a free-text faculty name resolves to.
///
/// [`FacultyKey::Unrecognized`] is a valid value that downstream code must
/// filter out: records carrying it are dropped, never grouped.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FacultyKey {
    /// Faculty of Arts
    Arts,
    /// Faculty of Engineering
    Engineering,
    /// Faculty of Medicine
    Medicine,
    /// Telfer School of Management
    Telfer,
    /// Faculty of Graduate and Postdoctoral Studies
    Graduate,
    /// Faculty of Law
    Law,
    /// Faculty of Social Sciences
    SocialSciences,
    /// Faculty of Health Sciences
    HealthSciences,
    /// Faculty of Education
    Education,
    /// Faculty of Science
    Science,
    /// Category string that matched none of the known faculties.
    Unrecognized,
}

impl FacultyKey {
    /// Returns `false` only for the [`FacultyKey::Unrecognized`] sentinel.
    #[must_use]
    pub const fn is_recognized(self) -> bool {
        !matches!(self, Self::Unrecognized)
    }
}

/// Identifies one academic term's result set.
///
/// Course sessions only carry an id (taken from the schedule markup). Exam
/// sessions also carry the dropdown label (e.g. `"Fall 2015"`), which decides
/// the timezone correction applied to exam dates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    /// Stable session identifier; also the output directory name.
    pub id: String,
    /// Human-readable label, when the source provides one.
    pub label: Option<String>,
}

impl SessionKey {
    /// Creates a session key without a label.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }

    /// Creates a session key with a human-readable label.
    #[must_use]
    pub fn labelled(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: Some(label.into()),
        }
    }

    /// Returns the label, or the id when no label is known.
    #[must_use]
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({label})", self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// The scrapes the tool knows how to run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum ScrapeKind {
    /// Discipline codes with their bilingual names and faculties.
    Disciplines,
    /// Course sections for every session.
    Courses,
    /// Final exams for every exam session.
    Exams,
}

/// Common accessors used to order records within a faculty bucket.
pub trait TimetableRecord {
    /// The course code the record belongs to.
    fn code(&self) -> &str;

    /// The section label (e.g. `"A"`, `"A00"`).
    fn section(&self) -> &str;
}

/// One scheduled activity of a course section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    /// Course code (e.g. `"CSI2110"`).
    pub code: String,
    /// Section label (e.g. `"A"`).
    pub section: String,
    /// Activity type (e.g. `"Lecture"`, `"Laboratory"`).
    pub activity: String,
    /// Day of the week the activity takes place.
    pub day: Weekday,
    /// Start time as printed by the source (`HH:MM`).
    pub start_time: String,
    /// End time as printed by the source (`HH:MM`).
    pub end_time: String,
    /// Room or building.
    pub room: String,
    /// Course display name.
    pub name: String,
    /// Professor teaching the activity.
    pub professor: String,
}

impl CourseRecord {
    /// Day of the week as 0 (Sunday) through 6 (Saturday).
    #[must_use]
    pub fn day_number(&self) -> u32 {
        self.day.num_days_from_sunday()
    }
}

impl TimetableRecord for CourseRecord {
    fn code(&self) -> &str {
        &self.code
    }

    fn section(&self) -> &str {
        &self.section
    }
}

/// One exam sitting of a course section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamRecord {
    /// Course code (e.g. `"CSI2110"`).
    pub code: String,
    /// Section label.
    pub section: String,
    /// Exam start as Unix epoch seconds, timezone-corrected.
    pub date: i64,
    /// Room or building.
    pub room: String,
    /// Professor responsible for the section.
    pub professor: String,
}

impl TimetableRecord for ExamRecord {
    fn code(&self) -> &str {
        &self.code
    }

    fn section(&self) -> &str {
        &self.section
    }
}

/// A discipline (subject code) and the faculties offering its courses.
///
/// Serialized with keys in alphabetical order and `faculties` pipe-joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisciplineEntry {
    /// Discipline code (e.g. `"CSI"`).
    pub code: String,
    /// Union of the faculties seen across every listing page.
    #[serde(serialize_with = "serialize_pipe_joined")]
    pub faculties: BTreeSet<FacultyKey>,
    /// English display name.
    pub name_en: String,
    /// French display name.
    pub name_fr: String,
}

fn serialize_pipe_joined<S: Serializer>(
    faculties: &BTreeSet<FacultyKey>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let joined = faculties
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join("|");
    serializer.serialize_str(&joined)
}
