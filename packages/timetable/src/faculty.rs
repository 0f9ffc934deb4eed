//! Faculty name mapping.
//!
//! Listing rows carry the faculty as free text ("Faculty of Engineering",
//! "Faculté des arts", "Telfer School of Management", ...). The mapping is
//! an ordered table of substrings checked top to bottom, so the more
//! specific "Social Science" and "Health Science" patterns win over the
//! catch-all "Science".

use campus_guide_timetable_models::FacultyKey;

/// `(substring, faculty)` pairs in priority order. Matching is case-sensitive.
pub const FACULTY_PATTERNS: &[(&str, FacultyKey)] = &[
    ("Arts", FacultyKey::Arts),
    ("Engineering", FacultyKey::Engineering),
    ("Medicine", FacultyKey::Medicine),
    ("Telfer", FacultyKey::Telfer),
    ("Grad", FacultyKey::Graduate),
    ("Law", FacultyKey::Law),
    ("Social Science", FacultyKey::SocialSciences),
    ("Health Science", FacultyKey::HealthSciences),
    ("Education", FacultyKey::Education),
    ("Science", FacultyKey::Science),
];

/// Maps a faculty display name to its short key.
///
/// Returns [`FacultyKey::Unrecognized`] when no pattern matches.
#[must_use]
pub fn faculty_shorthand(category: &str) -> FacultyKey {
    FACULTY_PATTERNS
        .iter()
        .find(|(pattern, _)| category.contains(pattern))
        .map_or(FacultyKey::Unrecognized, |(_, key)| *key)
}
