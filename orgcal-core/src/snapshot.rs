//! Snapshot Store: what the previous run wrote, per calendar.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SnapshotError;
use crate::event::Fingerprint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(flatten)]
    pub fingerprint: Fingerprint,
    /// The last write for this uid failed and must be retried
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl SnapshotEntry {
    pub fn synced(fingerprint: Fingerprint) -> Self {
        SnapshotEntry {
            fingerprint,
            pending: false,
        }
    }

    pub fn pending(fingerprint: Fingerprint) -> Self {
        SnapshotEntry {
            fingerprint,
            pending: true,
        }
    }
}

/// uid -> entry, sorted for deterministic output.
pub type Snapshot = BTreeMap<String, SnapshotEntry>;

/// Snapshots keyed by calendar. The CLI keys them on the collection URL.
pub trait SnapshotStore {
    /// Load the snapshot for a calendar. A calendar never synced loads as empty.
    fn load(&self, calendar_key: &str) -> Result<Snapshot, SnapshotError>;

    /// Replace the snapshot for a calendar.
    fn save(&self, calendar_key: &str, snapshot: &Snapshot) -> Result<(), SnapshotError>;
}

/// One JSON file per calendar under a cache directory, named
/// `<slug>-<hash>.json` so keys that slugify alike stay apart.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSnapshotStore { dir: dir.into() }
    }

    pub fn path(&self, calendar_key: &str) -> PathBuf {
        let digest = Sha256::digest(calendar_key.as_bytes());
        let hash: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();
        self.dir
            .join(format!("{}-{hash}.json", slug::slugify(calendar_key)))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, calendar_key: &str) -> Result<Snapshot, SnapshotError> {
        let path = self.path(calendar_key);

        if !path.exists() {
            return Ok(Snapshot::new());
        }

        let content = std::fs::read_to_string(&path).map_err(io_error(&path))?;
        serde_json::from_str(&content).map_err(|source| SnapshotError::Corrupt { path, source })
    }

    fn save(&self, calendar_key: &str, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        std::fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;

        let path = self.path(calendar_key);
        let temp = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(snapshot)?;

        std::fs::write(&temp, content).map_err(io_error(&temp))?;
        std::fs::rename(&temp, &path).map_err(io_error(&path))?;

        tracing::debug!(path = %path.display(), entries = snapshot.len(), "Saved snapshot");
        Ok(())
    }
}

/// Snapshots kept in memory, for tests.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, Snapshot>>,
    saves: Mutex<usize>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or_default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, calendar_key: &str) -> Result<Snapshot, SnapshotError> {
        Ok(self
            .snapshots
            .lock()
            .map(|s| s.get(calendar_key).cloned().unwrap_or_default())
            .unwrap_or_default())
    }

    fn save(&self, calendar_key: &str, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(calendar_key.to_string(), snapshot.clone());
        }
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ScheduleKey;
    use chrono::NaiveDate;

    fn fingerprint(title: &str) -> Fingerprint {
        Fingerprint {
            title: title.to_string(),
            scheduled: Some(ScheduleKey::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())),
            duration_secs: None,
            description: String::new(),
            recurrence: None,
            tags: vec!["todo".to_string()],
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        assert!(store.load("Work").unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("cache"));

        let mut snapshot = Snapshot::new();
        snapshot.insert("b".to_string(), SnapshotEntry::synced(fingerprint("Second")));
        snapshot.insert("a".to_string(), SnapshotEntry::pending(fingerprint("First")));

        store.save("Work Calendar", &snapshot).unwrap();

        let path = store.path("Work Calendar");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("work-calendar-"), "{name}");
        assert!(name.ends_with(".json"), "{name}");
        assert!(!path.with_extension("json.tmp").exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.find("\"a\"").unwrap() < content.find("\"b\"").unwrap());
        assert_eq!(content.matches("pending").count(), 1);

        assert_eq!(store.load("Work Calendar").unwrap(), snapshot);
    }

    #[test]
    fn test_keys_with_equal_slugs_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());

        assert_ne!(store.path("Work Cal"), store.path("work-cal"));
        assert_ne!(
            store.path("https://a.example.com/calendars/me/personal/"),
            store.path("https://b.example.com/calendars/me/personal/")
        );
        assert_eq!(store.path("work-cal"), store.path("work-cal"));

        let mut snapshot = Snapshot::new();
        snapshot.insert("a".to_string(), SnapshotEntry::synced(fingerprint("First")));
        store.save("Work Cal", &snapshot).unwrap();

        assert!(store.load("work-cal").unwrap().is_empty());
        assert_eq!(store.load("Work Cal").unwrap(), snapshot);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        std::fs::write(store.path("work"), "{ not json").unwrap();

        assert!(matches!(
            store.load("work"),
            Err(SnapshotError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemorySnapshotStore::new();
        let mut snapshot = Snapshot::new();
        snapshot.insert("a".to_string(), SnapshotEntry::synced(fingerprint("First")));

        store.save("work", &snapshot).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load("work").unwrap(), snapshot);
        assert!(store.load("home").unwrap().is_empty());
    }
}
