//! Reconciler: bring a remote calendar in line with the desired events.
//!
//! Each event is compared against the previous run's snapshot first and only
//! looked up remotely when that comparison is inconclusive. Identities from the
//! previous run that are no longer desired are deleted afterwards.

mod outcome;

pub use outcome::{EventOutcome, Outcome, RunReport};

use std::collections::HashSet;

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::cancel::CancelFlag;
use crate::error::{SyncError, SyncResult};
use crate::event::IdentifiedEvent;
use crate::remote::{CalendarPort, RemoteRecord};
use crate::snapshot::{Snapshot, SnapshotEntry, SnapshotStore};

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Look up only; never write to the remote or the snapshot
    pub dry_run: bool,
    /// Prior entries scheduled before this window are kept rather than deleted
    pub retain_before: Option<Retention>,
    pub cancel: CancelFlag,
}

/// Start of the sync window, as a local date in the zone headings are read in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Retention {
    pub before: NaiveDate,
    pub timezone: Tz,
}

impl Retention {
    fn keeps(&self, entry: &SnapshotEntry) -> bool {
        entry
            .fingerprint
            .scheduled
            .as_ref()
            .is_some_and(|s| s.local_date(self.timezone) < self.before)
    }
}

pub struct Reconciler<'a, P> {
    port: &'a P,
    options: &'a ReconcileOptions,
}

impl<'a, P: CalendarPort> Reconciler<'a, P> {
    pub fn new(port: &'a P, options: &'a ReconcileOptions) -> Self {
        Reconciler { port, options }
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.options.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    pub async fn reconcile(
        &self,
        events: &[IdentifiedEvent],
        prior: &Snapshot,
    ) -> SyncResult<RunReport> {
        let mut report = RunReport {
            dry_run: self.options.dry_run,
            ..Default::default()
        };
        let mut seen = HashSet::new();
        let total = events.len();

        for (index, item) in events.iter().enumerate() {
            self.check_cancelled()?;
            seen.insert(item.uid.as_str());

            let outcome = self.apply(item, prior, &mut report.snapshot).await;

            tracing::info!(
                "{} [{:03}/{:03}] [{}] {}",
                outcome,
                index + 1,
                total,
                item.event.time_label(),
                item.event.title
            );
            report.outcomes.push(EventOutcome {
                uid: item.uid.clone(),
                title: item.event.title.clone(),
                outcome,
            });
        }

        // BTreeMap iteration keeps deletions in uid order
        for (uid, entry) in prior {
            if seen.contains(uid.as_str()) {
                continue;
            }
            self.check_cancelled()?;

            if self.options.retain_before.is_some_and(|r| r.keeps(entry)) {
                report.snapshot.insert(uid.clone(), entry.clone());
                report.retained += 1;
                continue;
            }

            if let Some(outcome) = self.remove(uid, entry, &mut report.snapshot).await {
                report.outcomes.push(EventOutcome {
                    uid: uid.clone(),
                    title: entry.fingerprint.title.clone(),
                    outcome,
                });
            }
        }

        Ok(report)
    }

    /// Decide and perform the write for one desired event, recording it in `next`.
    async fn apply(&self, item: &IdentifiedEvent, prior: &Snapshot, next: &mut Snapshot) -> Outcome {
        let uid = &item.uid;
        let fingerprint = item.event.fingerprint();

        if prior
            .get(uid)
            .is_some_and(|entry| !entry.pending && entry.fingerprint == fingerprint)
        {
            next.insert(uid.clone(), SnapshotEntry::synced(fingerprint));
            return Outcome::Cached;
        }

        let (outcome, result) = match self.port.find(uid).await {
            Err(e) => (Outcome::Failed, Err(e)),
            Ok(Some(record)) if record.event.content_eq(&item.event) => (Outcome::Unchanged, Ok(())),
            Ok(Some(record)) if self.options.dry_run => {
                tracing::debug!(uid = %uid, href = %record.href, "Would update");
                (Outcome::Updated, Ok(()))
            }
            Ok(Some(record)) => (
                Outcome::Updated,
                self.port.update(&record, &item.event).await,
            ),
            Ok(None) if self.options.dry_run => (Outcome::Created, Ok(())),
            Ok(None) => (Outcome::Created, self.port.create(uid, &item.event).await),
        };

        match result {
            Ok(()) => {
                next.insert(uid.clone(), SnapshotEntry::synced(fingerprint));
                outcome
            }
            Err(e) => {
                tracing::error!(uid = %uid, title = %item.event.title, "{e}");
                next.insert(uid.clone(), SnapshotEntry::pending(fingerprint));
                Outcome::Failed
            }
        }
    }

    /// Delete an identity that is no longer desired. Returns `None` when there was
    /// nothing to delete.
    async fn remove(&self, uid: &str, entry: &SnapshotEntry, next: &mut Snapshot) -> Option<Outcome> {
        let keep_pending = |next: &mut Snapshot| {
            next.insert(
                uid.to_string(),
                SnapshotEntry::pending(entry.fingerprint.clone()),
            );
        };

        let record: RemoteRecord = match self.port.find(uid).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(uid = %uid, "Already gone from remote");
                return None;
            }
            Err(e) => {
                tracing::error!(uid = %uid, "{e}");
                keep_pending(next);
                return Some(Outcome::Failed);
            }
        };

        if self.options.dry_run {
            tracing::info!("- {uid}");
            return Some(Outcome::Deleted);
        }

        match self.port.delete(&record).await {
            Ok(()) => {
                tracing::info!("- {uid}");
                Some(Outcome::Deleted)
            }
            Err(e) => {
                tracing::error!(uid = %uid, href = %record.href, "{e}");
                keep_pending(next);
                Some(Outcome::Failed)
            }
        }
    }
}

/// Run one calendar: load its snapshot, reconcile, and save the result once.
///
/// Nothing is saved when the run is cancelled or a dry run.
pub async fn sync_calendar<P, S>(
    calendar_key: &str,
    events: &[IdentifiedEvent],
    port: &P,
    store: &S,
    options: &ReconcileOptions,
) -> SyncResult<RunReport>
where
    P: CalendarPort,
    S: SnapshotStore + Sync + ?Sized,
{
    let prior = store.load(calendar_key)?;
    tracing::debug!(calendar = %calendar_key, entries = prior.len(), "Loaded snapshot");

    let report = Reconciler::new(port, options)
        .reconcile(events, &prior)
        .await?;

    if !options.dry_run {
        store.save(calendar_key, &report.snapshot)?;
    }

    Ok(report)
}
