use std::fmt;

use crate::snapshot::Snapshot;

/// What happened to one identity during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fingerprint matched the snapshot; the remote was not consulted
    Cached,
    /// Remote already had equal content
    Unchanged,
    Updated,
    Created,
    Deleted,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Cached | Outcome::Unchanged => write!(f, "="),
            Outcome::Updated => write!(f, "~"),
            Outcome::Created => write!(f, "+"),
            Outcome::Deleted => write!(f, "-"),
            Outcome::Failed => write!(f, "!"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventOutcome {
    pub uid: String,
    pub title: String,
    pub outcome: Outcome,
}

/// Result of reconciling one calendar.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<EventOutcome>,
    /// Snapshot to persist for the next run
    pub snapshot: Snapshot,
    /// Prior entries kept because they predate the sync window
    pub retained: usize,
    pub dry_run: bool,
}

impl RunReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.iter().filter(|o| o.outcome == outcome).count()
    }

    pub fn unchanged(&self) -> usize {
        self.count(Outcome::Cached) + self.count(Outcome::Unchanged)
    }

    pub fn failures(&self) -> impl Iterator<Item = &EventOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == Outcome::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(uid: &str, outcome: Outcome) -> EventOutcome {
        EventOutcome {
            uid: uid.to_string(),
            title: uid.to_string(),
            outcome,
        }
    }

    #[test]
    fn test_symbols() {
        let symbols: Vec<String> = [
            Outcome::Cached,
            Outcome::Unchanged,
            Outcome::Updated,
            Outcome::Created,
            Outcome::Deleted,
            Outcome::Failed,
        ]
        .iter()
        .map(|o| o.to_string())
        .collect();
        assert_eq!(symbols, vec!["=", "=", "~", "+", "-", "!"]);
    }

    #[test]
    fn test_counts() {
        let report = RunReport {
            outcomes: vec![
                outcome("a", Outcome::Cached),
                outcome("b", Outcome::Unchanged),
                outcome("c", Outcome::Failed),
            ],
            ..Default::default()
        };
        assert_eq!(report.unchanged(), 2);
        assert_eq!(report.failures().count(), 1);
    }
}
