//! Output writer.
//!
//! Course and exam buckets become one CSV file per (session, faculty) pair:
//!
//! ```text
//! <output_dir>/<session id>/<faculty>.csv        courses
//! <output_dir>/<session id>/<faculty>_exams.csv  exams
//! ```
//!
//! Disciplines become a single `disciplines.json`. Existing files are
//! removed before being written, never appended to.

use std::path::{Path, PathBuf};

use campus_guide_timetable_models::{CourseRecord, DisciplineEntry, ExamRecord, TimetableRecord};
use serde::Serialize;

use crate::TimetableError;
use crate::aggregate::Buckets;

/// File name of the discipline document.
pub const DISCIPLINES_FILE: &str = "disciplines.json";

/// A record kind that can be flushed as CSV.
pub trait CsvRecord: TimetableRecord {
    /// Header line, in column order.
    const HEADER: &'static [&'static str];

    /// Appended to the faculty key to form the file stem.
    const FILE_SUFFIX: &'static str;

    /// Field values, in [`HEADER`](Self::HEADER) order.
    fn fields(&self) -> Vec<String>;
}

impl CsvRecord for CourseRecord {
    const HEADER: &'static [&'static str] = &[
        "CODE",
        "SECTION",
        "TYPE",
        "DAY",
        "START",
        "END",
        "ROOM",
        "NAME",
        "PROFESSOR",
    ];
    const FILE_SUFFIX: &'static str = "";

    fn fields(&self) -> Vec<String> {
        vec![
            self.code.clone(),
            self.section.clone(),
            self.activity.clone(),
            self.day_number().to_string(),
            self.start_time.clone(),
            self.end_time.clone(),
            self.room.clone(),
            self.name.clone(),
            self.professor.clone(),
        ]
    }
}

impl CsvRecord for ExamRecord {
    const HEADER: &'static [&'static str] = &["CODE", "SECTION", "DATE", "ROOM", "PROFESSOR"];
    const FILE_SUFFIX: &'static str = "_exams";

    fn fields(&self) -> Vec<String> {
        vec![
            self.code.clone(),
            self.section.clone(),
            self.date.to_string(),
            self.room.clone(),
            self.professor.clone(),
        ]
    }
}

/// Writes every bucket to its CSV file and returns the written paths in
/// (session, faculty) order.
///
/// # Errors
///
/// Returns [`TimetableError`] if a directory or file cannot be written.
pub fn write_buckets<R: CsvRecord>(
    output_dir: &Path,
    buckets: Buckets<R>,
) -> Result<Vec<PathBuf>, TimetableError> {
    let mut written = Vec::new();

    for bucket in buckets.into_sorted() {
        let session_dir = output_dir.join(&bucket.session.id);
        if !session_dir.is_dir() {
            log::debug!("Creating new session folder: {}", session_dir.display());
            std::fs::create_dir_all(&session_dir)?;
        }

        let path = session_dir.join(format!(
            "{}{}.csv",
            bucket.faculty.as_ref(),
            R::FILE_SUFFIX
        ));
        log::debug!(
            "Writing {} records for {} to {}",
            bucket.records.len(),
            bucket.session,
            path.display()
        );
        write_csv(&path, &bucket.records)?;
        written.push(path);
    }

    Ok(written)
}

fn write_csv<R: CsvRecord>(path: &Path, records: &[R]) -> Result<(), TimetableError> {
    remove_existing(path)?;

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)?;

    writer.write_record(R::HEADER)?;
    for record in records {
        writer.write_record(record.fields())?;
    }
    writer.flush()?;

    Ok(())
}

#[derive(Serialize)]
struct DisciplineDocument<'a> {
    #[serde(rename = "Disciplines")]
    disciplines: &'a [DisciplineEntry],
}

/// Writes `disciplines.json` sorted by code and returns its path.
///
/// # Errors
///
/// Returns [`TimetableError`] if the file cannot be written or serialized.
pub fn write_disciplines(
    output_dir: &Path,
    mut entries: Vec<DisciplineEntry>,
) -> Result<PathBuf, TimetableError> {
    std::fs::create_dir_all(output_dir)?;
    entries.sort_by(|a, b| a.code.cmp(&b.code));

    let path = output_dir.join(DISCIPLINES_FILE);
    remove_existing(&path)?;

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    DisciplineDocument {
        disciplines: &entries,
    }
    .serialize(&mut serializer)?;

    log::debug!("Saving {} disciplines to {}", entries.len(), path.display());
    std::fs::write(&path, buf)?;

    Ok(path)
}

fn remove_existing(path: &Path) -> Result<(), TimetableError> {
    if path.is_file() {
        log::trace!("Removing stale {}", path.display());
        std::fs::remove_file(path)?;
    }
    Ok(())
}
