//! Org file discovery and date filtering.

use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, Local, NaiveDate};

use crate::error::OutlineError;
use crate::outline::org::parse_document;
use crate::outline::{Heading, TodoKeywords};

/// Earliest date a heading may be relevant on to be synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCutoff {
    /// Today
    Now,
    /// Monday of the current week
    ThisWeek,
    Date(NaiveDate),
}

impl SyncCutoff {
    pub fn parse(value: &str) -> Result<Self, OutlineError> {
        match value.trim() {
            "now" => Ok(SyncCutoff::Now),
            "thisweek" => Ok(SyncCutoff::ThisWeek),
            s => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(SyncCutoff::Date)
                .map_err(|_| OutlineError::InvalidCutoff(value.to_string())),
        }
    }

    pub fn resolve(&self, today: NaiveDate) -> NaiveDate {
        match self {
            SyncCutoff::Now => today,
            SyncCutoff::ThisWeek => {
                today - Duration::days(today.weekday().num_days_from_monday() as i64)
            }
            SyncCutoff::Date(d) => *d,
        }
    }

    pub fn resolve_today(&self) -> NaiveDate {
        self.resolve(Local::now().date_naive())
    }
}

/// Expand a mixed list of files and directories into org file paths.
///
/// Directories contribute their `*.org` files (not recursive), sorted by name.
pub fn discover_files(entries: &[String]) -> Result<Vec<PathBuf>, OutlineError> {
    let mut files = Vec::new();

    for entry in entries {
        let path = PathBuf::from(shellexpand::tilde(entry).as_ref());

        if path.is_dir() {
            let read = std::fs::read_dir(&path).map_err(|source| OutlineError::Io {
                path: path.clone(),
                source,
            })?;
            let mut found: Vec<PathBuf> = read
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "org"))
                .collect();
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            files.push(path);
        } else {
            return Err(OutlineError::NotFound(path));
        }
    }

    Ok(files)
}

/// Read one org file into headings.
pub fn read_file(path: &Path, keywords: &TodoKeywords) -> Result<Vec<Heading>, OutlineError> {
    let text = std::fs::read_to_string(path).map_err(|source| OutlineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_document(&text, keywords))
}

/// Load every heading from `entries` with a scheduled or deadline date on or after
/// `cutoff`. Headings without either are dropped here.
pub fn load_headings(
    entries: &[String],
    cutoff: NaiveDate,
    keywords: &TodoKeywords,
) -> Result<Vec<Heading>, OutlineError> {
    let mut headings = Vec::new();

    for path in discover_files(entries)? {
        let file_headings = read_file(&path, keywords)?;
        let before = file_headings.len();

        headings.extend(
            file_headings
                .into_iter()
                .filter(|h| h.latest_date().is_some_and(|d| d >= cutoff)),
        );

        tracing::debug!(
            file = %path.display(),
            headings = before,
            "Read org file"
        );
    }

    Ok(headings)
}
