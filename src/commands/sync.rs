use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use orgcal_caldav::CaldavCalendar;
use orgcal_core::cancel::CancelFlag;
use orgcal_core::config::{CalendarConfig, OrgcalConfig};
use orgcal_core::derive::{Vocabulary, derive_all};
use orgcal_core::error::SyncError;
use orgcal_core::identity::resolve;
use orgcal_core::outline::source::load_headings;
use orgcal_core::reconcile::{ReconcileOptions, Retention, RunReport, sync_calendar};
use orgcal_core::snapshot::FileSnapshotStore;
use owo_colors::OwoColorize;
use tokio::task::JoinSet;

use crate::render::{Render, calendar_header, render_error};

pub struct SyncArgs {
    pub dry_run: bool,
    pub parallel: bool,
}

/// Everything one calendar's run owns, so it can move onto its own task.
struct Job {
    index: usize,
    calendar: CalendarConfig,
    port: CaldavCalendar,
    vocabulary: Vocabulary,
    store: FileSnapshotStore,
    options: ReconcileOptions,
}

pub async fn run(
    config: &OrgcalConfig,
    calendars: Vec<CalendarConfig>,
    args: SyncArgs,
    cancel: CancelFlag,
) -> Result<()> {
    let started = Instant::now();
    let vocabulary = config.vocabulary()?;
    let store = FileSnapshotStore::new(config.cache_dir());

    let options = ReconcileOptions {
        dry_run: args.dry_run,
        retain_before: None,
        cancel,
    };

    let mut results: Vec<(usize, String, Result<RunReport>)> = Vec::new();
    let mut jobs = Vec::new();

    // Credentials may prompt, so clients are built up front and in order
    for (index, calendar) in calendars.into_iter().enumerate() {
        let name = calendar.display_name().to_string();
        match super::connect(&calendar, vocabulary.timezone) {
            Ok(port) => jobs.push(Job {
                index,
                calendar,
                port,
                vocabulary: vocabulary.clone(),
                store: store.clone(),
                options: options.clone(),
            }),
            Err(e) => results.push((index, name, Err(e))),
        }
    }

    if args.parallel {
        let mut set = JoinSet::new();
        for job in jobs {
            set.spawn(async move {
                let name = job.calendar.display_name().to_string();
                let result = sync_one(&job).await;
                (job.index, name, result)
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!("Calendar task failed: {e}"),
            }
        }
    } else {
        for job in jobs {
            let name = job.calendar.display_name().to_string();
            tracing::info!("Syncing {}", name);
            let result = sync_one(&job).await;
            results.push((job.index, name, result));
        }
    }

    results.sort_by_key(|(index, _, _)| *index);
    print_summary(&results, started.elapsed());

    Ok(())
}

/// Sync a single calendar. Any error aborts this calendar only.
async fn sync_one(job: &Job) -> Result<RunReport> {
    let calendar = &job.calendar;

    job.port
        .check()
        .await
        .map_err(SyncError::RemoteUnavailable)
        .with_context(|| format!("Cannot reach {}", job.port.url()))?;

    let cutoff = calendar.cutoff()?.resolve_today();
    let headings = load_headings(&calendar.org_files, cutoff, &job.vocabulary.keywords)
        .map_err(SyncError::from)?;

    let derived = derive_all(&headings, &job.vocabulary);
    let events = resolve(&calendar.id, derived);

    tracing::debug!(
        calendar = %calendar.display_name(),
        headings = headings.len(),
        events = events.len(),
        cutoff = %cutoff,
        "Prepared events"
    );

    let options = ReconcileOptions {
        retain_before: Some(Retention {
            before: cutoff,
            timezone: job.vocabulary.timezone,
        }),
        ..job.options.clone()
    };

    // Snapshots follow the collection, not the configured name
    let snapshot_key = job.port.url().as_str();
    let report = sync_calendar(snapshot_key, &events, &job.port, &job.store, &options).await?;
    Ok(report)
}

fn print_summary(results: &[(usize, String, Result<RunReport>)], elapsed: Duration) {
    let mut failed_calendars = 0;

    for (i, (_, name, result)) in results.iter().enumerate() {
        println!("{}", calendar_header(name));
        match result {
            Ok(report) => {
                println!("{}", report.render());
                for failure in report.failures() {
                    println!("      {} {}", failure.title, failure.uid.dimmed());
                }
            }
            Err(e) => {
                failed_calendars += 1;
                println!("{}", render_error(e));
            }
        }
        if i + 1 < results.len() {
            println!();
        }
    }

    let elapsed = Duration::from_millis(elapsed.as_millis() as u64);
    let noun = if results.len() == 1 { "calendar" } else { "calendars" };
    let mut footer = format!(
        "\nSynced {} {} in {}",
        results.len(),
        noun,
        humantime::format_duration(elapsed)
    );
    if failed_calendars > 0 {
        footer.push_str(&format!(", {} failed", failed_calendars));
    }
    println!("{}", footer.dimmed());
}
