//! Error types for orgcal.
//!
//! Errors are split by how far they are allowed to propagate:
//! - [`DeriveError`]: one heading is skipped
//! - [`PortError`]: one remote operation failed, the run continues
//! - [`SyncError`]: the current calendar is aborted
//! - [`ConfigError`]: nothing runs

use std::path::PathBuf;

use thiserror::Error;

/// A heading could not be turned into an event.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeriveError {
    #[error("Invalid effort value '{0}' (expected minutes or H:MM)")]
    InvalidEffort(String),

    #[error("Local time {0} does not exist in time zone {1}")]
    NonexistentLocalTime(String, String),

    #[error("Heading has no title")]
    EmptyTitle,

    #[error("Event starting {0} ends past the representable range")]
    EndOutOfRange(String),
}

/// A call against the remote calendar failed.
#[derive(Error, Debug)]
pub enum PortError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Server returned status {status} for {href}")]
    Status { status: u16, href: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Could not decode remote event: {0}")]
    Decode(String),

    #[error("Could not encode event '{0}': it has no start")]
    MissingStart(String),
}

/// The snapshot could not be read or written.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The outline source could not be read.
#[derive(Error, Debug)]
pub enum OutlineError {
    #[error("Org file not found: {0}")]
    NotFound(PathBuf),

    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid sync cutoff '{0}'. Expected 'now', 'thisweek' or YYYY-MM-DD")]
    InvalidCutoff(String),
}

/// Configuration is missing or invalid.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found at {0}")]
    NotFound(PathBuf),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not load config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Unknown time zone '{0}'")]
    UnknownTimeZone(String),

    #[error("Could not read password file {path}: {source}")]
    PasswordFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A calendar-level failure: the calendar's run stops and its snapshot is left alone.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Outline(#[from] OutlineError),

    #[error("Remote calendar unavailable: {0}")]
    RemoteUnavailable(#[source] PortError),

    #[error("Sync cancelled")]
    Cancelled,
}

pub type SyncResult<T> = Result<T, SyncError>;
