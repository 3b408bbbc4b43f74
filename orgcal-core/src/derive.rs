//! Event Model: turn an outline heading into calendar events.
//!
//! A heading yields zero, one or two events: one for its scheduled timestamp and
//! one for a distinct deadline.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::error::DeriveError;
use crate::event::{DerivedEvent, Event, EventTime, Frequency, Recurrence, normalize_tags};
use crate::outline::{Heading, OrgTimestamp, TodoKeywords};

pub const DEADLINE_TAG: &str = "deadline";
pub const DEADLINE_MARKER: &str = " (deadline)";
pub const DONE_PREFIX: &str = "Done: ";

/// Everything derivation depends on besides the heading itself.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub keywords: TodoKeywords,
    /// Priority letters stripped as `[#X]` cookies
    pub priorities: Vec<String>,
    /// Zone all timestamps are localized in
    pub timezone: Tz,
}

impl Vocabulary {
    pub fn new(timezone: Tz) -> Self {
        Vocabulary {
            keywords: TodoKeywords::default(),
            priorities: ["A", "B", "C", "D", "E", "F", "G"].map(String::from).to_vec(),
            timezone,
        }
    }
}

/// Start and timestamp-declared duration of one variant.
struct Placement {
    start: EventTime,
    duration: Option<Duration>,
    recurrence: Option<Recurrence>,
}

pub fn derive(heading: &Heading, vocab: &Vocabulary) -> Result<Vec<DerivedEvent>, DeriveError> {
    let scheduled = heading
        .scheduled
        .as_ref()
        .map(|t| place(t, vocab.timezone))
        .transpose()?;
    let deadline = heading
        .deadline
        .as_ref()
        .map(|t| place(t, vocab.timezone))
        .transpose()?;

    if scheduled.is_none() && deadline.is_none() {
        return Ok(Vec::new());
    }

    let (title, state) = clean_title(heading, vocab);
    if title.is_empty() {
        return Err(DeriveError::EmptyTitle);
    }

    let done = heading.done || state.as_deref().is_some_and(|s| vocab.keywords.is_done(s));
    let title = if done {
        format!("{DONE_PREFIX}{title}")
    } else {
        title
    };

    let effort = effort(heading)?;
    for placement in scheduled.iter().chain(&deadline) {
        check_end(placement, effort)?;
    }
    let base_tags: Vec<String> = heading.tags.iter().cloned().chain(state).collect();
    let source_id = heading.source_id().map(String::from);

    let mut events = Vec::new();

    // Deadline only counts as a separate event when it differs from the schedule
    let deadline = deadline.filter(|d| scheduled.as_ref().is_none_or(|s| s.start != d.start));

    if let Some(placement) = scheduled {
        events.push(DerivedEvent {
            source_id: source_id.clone(),
            event: Event {
                title: title.clone(),
                description: heading.body.clone(),
                scheduled: Some(placement.start),
                duration: placement.duration.or(effort),
                recurrence: placement.recurrence,
                tags: normalize_tags(&base_tags),
            },
        });
    }

    if let Some(placement) = deadline {
        events.push(DerivedEvent {
            source_id: source_id.map(|id| format!("{id}-{DEADLINE_TAG}")),
            event: Event {
                title: format!("{title}{DEADLINE_MARKER}"),
                description: heading.body.clone(),
                scheduled: Some(placement.start),
                duration: placement.duration.or(effort),
                recurrence: placement.recurrence,
                tags: normalize_tags(base_tags.iter().map(String::as_str).chain([DEADLINE_TAG])),
            },
        });
    }

    Ok(events)
}

/// Derive every heading, skipping the ones that fail with a warning. The result
/// is ordered by start; equal starts keep their outline order.
pub fn derive_all(headings: &[Heading], vocab: &Vocabulary) -> Vec<DerivedEvent> {
    let mut derived = Vec::new();
    for heading in headings {
        match derive(heading, vocab) {
            Ok(events) => derived.extend(events),
            Err(e) => tracing::warn!(
                line = heading.line,
                title = %heading.title,
                "Skipping heading: {e}"
            ),
        }
    }

    derived.sort_by_key(|d| d.event.scheduled.as_ref().map(EventTime::sort_key));
    derived
}

/// Strip the workflow keyword and the priority cookie. Returns the title and the
/// workflow state, if any.
fn clean_title(heading: &Heading, vocab: &Vocabulary) -> (String, Option<String>) {
    let mut state = heading.todo.clone();
    let mut text = heading.title.trim();

    // One state marker at most; the parser may already have taken it
    if state.is_none()
        && let Some(first) = text.split_whitespace().next()
        && vocab.keywords.contains(first)
    {
        state = Some(first.to_string());
        text = text[first.len()..].trim_start();
    }

    for priority in &vocab.priorities {
        if let Some(rest) = text.strip_prefix(&format!("[#{priority}]")) {
            text = rest.trim_start();
            break;
        }
    }

    (text.trim().to_string(), state)
}

/// Effort property as a duration: bare minutes or `H:MM`.
fn effort(heading: &Heading) -> Result<Option<Duration>, DeriveError> {
    let Some(raw) = heading.property("EFFORT").map(str::trim) else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }

    let invalid = || DeriveError::InvalidEffort(raw.to_string());

    let minutes = match raw.split_once(':') {
        Some((hours, minutes)) => {
            let hours: i64 = parse_digits(hours).ok_or_else(invalid)?;
            let minutes: i64 = parse_digits(minutes).ok_or_else(invalid)?;
            hours
                .checked_mul(60)
                .and_then(|h| h.checked_add(minutes))
                .ok_or_else(invalid)?
        }
        None => parse_digits(raw).ok_or_else(invalid)?,
    };

    Duration::try_minutes(minutes).map(Some).ok_or_else(invalid)
}

/// The end of a variant must be representable.
fn check_end(placement: &Placement, effort: Option<Duration>) -> Result<(), DeriveError> {
    let Some(duration) = placement.duration.or(effort) else {
        return Ok(());
    };
    match placement.start.checked_add(duration) {
        Some(_) => Ok(()),
        None => Err(DeriveError::EndOutOfRange(placement.start.to_string())),
    }
}

/// Parse a non-empty run of ASCII digits. Signs are rejected.
fn parse_digits(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Decode an org repeater. Only `+<N><d|w|m|y>` repeats; anything else does not.
pub fn parse_repeater(cookie: &str) -> Option<Recurrence> {
    let rest = cookie.strip_prefix('+')?;
    let unit = rest.chars().last()?;
    let interval = parse_digits(&rest[..rest.len() - unit.len_utf8()])?;

    let frequency = match unit {
        'd' => Frequency::Daily,
        'w' => Frequency::Weekly,
        'm' => Frequency::Monthly,
        'y' => Frequency::Yearly,
        _ => return None,
    };

    let interval = u32::try_from(interval).ok().filter(|i| *i >= 1)?;

    Some(Recurrence {
        frequency,
        interval,
        count: 0,
    })
}

fn place(stamp: &OrgTimestamp, tz: Tz) -> Result<Placement, DeriveError> {
    let recurrence = stamp.repeater.as_deref().and_then(parse_repeater);

    let Some(start_time) = stamp.start_time else {
        // Date-only range: inclusive of the last day
        let duration = stamp
            .range_end
            .map(|(end, _)| end - stamp.date + Duration::days(1))
            .filter(|d| *d > Duration::zero());
        return Ok(Placement {
            start: EventTime::Date(stamp.date),
            duration,
            recurrence,
        });
    };

    let start = stamp.date.and_time(start_time);
    let duration = match (stamp.end_time, stamp.range_end) {
        (Some(end_time), _) => Some(same_day_span(stamp.date, start_time, end_time)),
        (None, Some((end_date, end_time))) => {
            let end = end_date.and_time(end_time.unwrap_or(start_time));
            Some(end - start).filter(|d| *d >= Duration::zero())
        }
        (None, None) => None,
    };

    Ok(Placement {
        start: EventTime::DateTime(localize(start, tz)?),
        duration,
        recurrence,
    })
}

/// Span between two clock times on the same nominal day. An end before the start
/// crosses midnight.
fn same_day_span(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Duration {
    let start = date.and_time(start);
    let mut end = date.and_time(end);
    if end < start {
        end += Duration::days(1);
    }
    end - start
}

fn localize(datetime: NaiveDateTime, tz: Tz) -> Result<chrono::DateTime<Tz>, DeriveError> {
    tz.from_local_datetime(&datetime)
        .earliest()
        .ok_or_else(|| DeriveError::NonexistentLocalTime(datetime.to_string(), tz.name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::org::{parse_document, properties_from};
    use chrono_tz::Europe::Berlin;

    fn vocab() -> Vocabulary {
        Vocabulary::new(Berlin)
    }

    fn heading(title: &str, scheduled: Option<OrgTimestamp>) -> Heading {
        Heading {
            scheduled,
            ..Heading::new(title)
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_buy_milk_scenario() {
        let mut h = heading("TODO Buy milk", Some(OrgTimestamp::at(ymd(2024, 1, 1), hm(10, 0))));
        h.properties = properties_from(&[":EFFORT: 30"]);

        let events = derive(&h, &vocab()).unwrap();
        assert_eq!(events.len(), 1);

        let derived = &events[0];
        assert_eq!(derived.source_id, None);
        assert_eq!(derived.event.title, "Buy milk");
        assert_eq!(derived.event.tags, vec!["todo"]);
        assert_eq!(derived.event.duration, Some(Duration::minutes(30)));
        assert_eq!(
            derived.event.scheduled,
            Some(EventTime::DateTime(Berlin.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_overnight_time_range() {
        let mut stamp = OrgTimestamp::at(ymd(2024, 1, 1), hm(23, 0));
        stamp.end_time = Some(hm(1, 0));

        let events = derive(&heading("Night shift", Some(stamp)), &vocab()).unwrap();
        assert_eq!(events[0].event.duration, Some(Duration::hours(2)));
    }

    #[test]
    fn test_timestamp_range_beats_effort() {
        let mut stamp = OrgTimestamp::at(ymd(2024, 1, 1), hm(9, 0));
        stamp.range_end = Some((ymd(2024, 1, 1), Some(hm(12, 30))));
        let mut h = heading("Workshop", Some(stamp));
        h.properties = properties_from(&[":Effort: 0:45"]);

        let events = derive(&h, &vocab()).unwrap();
        assert_eq!(events[0].event.duration, Some(Duration::minutes(210)));
    }

    #[test]
    fn test_effort_forms() {
        let stamp = Some(OrgTimestamp::at(ymd(2024, 1, 1), hm(9, 0)));

        let mut h = heading("Read", stamp.clone());
        h.properties = properties_from(&[":EFFORT: 1:30"]);
        assert_eq!(
            derive(&h, &vocab()).unwrap()[0].event.duration,
            Some(Duration::minutes(90))
        );

        h.properties = properties_from(&[":EFFORT: 1h"]);
        assert_eq!(
            derive(&h, &vocab()),
            Err(DeriveError::InvalidEffort("1h".to_string()))
        );

        h.properties = properties_from(&[":EFFORT: -5"]);
        assert!(derive(&h, &vocab()).is_err());
    }

    #[test]
    fn test_oversized_effort_is_an_error() {
        let stamp = Some(OrgTimestamp::at(ymd(2024, 1, 1), hm(9, 0)));
        let mut h = heading("Forever", stamp);

        h.properties = properties_from(&[":EFFORT: 999999999999999999"]);
        assert!(matches!(derive(&h, &vocab()), Err(DeriveError::InvalidEffort(_))));

        h.properties = properties_from(&[":EFFORT: 999999999999999999:00"]);
        assert!(matches!(derive(&h, &vocab()), Err(DeriveError::InvalidEffort(_))));

        h.properties = properties_from(&[":EFFORT: 999999999999"]);
        assert!(matches!(derive(&h, &vocab()), Err(DeriveError::EndOutOfRange(_))));
    }

    #[test]
    fn test_done_state_and_priority() {
        let mut h = heading("[#B] Ship release", Some(OrgTimestamp::on(ymd(2024, 1, 2))));
        h.todo = Some("DONE".to_string());
        h.tags = vec!["Work".to_string()];

        let event = &derive(&h, &vocab()).unwrap()[0].event;
        assert_eq!(event.title, "Done: Ship release");
        assert_eq!(event.tags, vec!["done", "work"]);
        assert_eq!(event.scheduled, Some(EventTime::Date(ymd(2024, 1, 2))));
        assert_eq!(event.duration, None);
    }

    #[test]
    fn test_only_one_state_marker_is_stripped() {
        let stamp = Some(OrgTimestamp::on(ymd(2024, 1, 2)));

        let h = heading("TODO NEXT thing", stamp.clone());
        let event = &derive(&h, &vocab()).unwrap()[0].event;
        assert_eq!(event.title, "NEXT thing");
        assert_eq!(event.tags, vec!["todo"]);

        let mut parsed = heading("NEXT thing", stamp);
        parsed.todo = Some("TODO".to_string());
        assert_eq!(derive(&parsed, &vocab()).unwrap()[0].event.title, "NEXT thing");
    }

    #[test]
    fn test_file_local_done_keyword() {
        let doc = "#+TODO: TODO | FAILED\n* FAILED Launch\n  SCHEDULED: <2024-01-06 Sat>\n";
        let headings = parse_document(doc, &TodoKeywords::default());
        let event = &derive(&headings[0], &vocab()).unwrap()[0].event;

        assert_eq!(event.title, "Done: Launch");
        assert_eq!(event.tags, vec!["failed"]);
    }

    #[test]
    fn test_derive_all_skips_bad_headings() {
        let mut bad = heading("Broken", Some(OrgTimestamp::at(ymd(2024, 1, 1), hm(9, 0))));
        bad.properties = properties_from(&[":EFFORT: soon"]);
        let later = heading("Later", Some(OrgTimestamp::on(ymd(2024, 1, 3))));
        let first = heading("First", Some(OrgTimestamp::at(ymd(2024, 1, 2), hm(8, 0))));
        let same = heading("Same time", Some(OrgTimestamp::at(ymd(2024, 1, 2), hm(8, 0))));

        let derived = derive_all(&[later, bad, first, same], &vocab());
        let titles: Vec<&str> = derived.iter().map(|d| d.event.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Same time", "Later"]);
    }

    #[test]
    fn test_unknown_priority_is_kept() {
        let h = heading("[#Z] Odd", Some(OrgTimestamp::on(ymd(2024, 1, 2))));
        assert_eq!(derive(&h, &vocab()).unwrap()[0].event.title, "[#Z] Odd");
    }

    #[test]
    fn test_scheduled_and_deadline_yield_two_events() {
        let mut h = heading("Report", Some(OrgTimestamp::at(ymd(2024, 1, 2), hm(14, 0))));
        h.deadline = Some(OrgTimestamp::on(ymd(2024, 1, 5)));
        h.properties = properties_from(&[":ID: report-1"]);

        let events = derive(&h, &vocab()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].source_id.as_deref(), Some("report-1"));
        assert_eq!(events[0].event.title, "Report");

        assert_eq!(events[1].source_id.as_deref(), Some("report-1-deadline"));
        assert_eq!(events[1].event.title, "Report (deadline)");
        assert_eq!(events[1].event.tags, vec!["deadline"]);
        assert_eq!(events[1].event.scheduled, Some(EventTime::Date(ymd(2024, 1, 5))));
    }

    #[test]
    fn test_equal_deadline_is_not_duplicated() {
        let stamp = OrgTimestamp::at(ymd(2024, 1, 2), hm(14, 0));
        let mut h = heading("Report", Some(stamp.clone()));
        h.deadline = Some(stamp);

        assert_eq!(derive(&h, &vocab()).unwrap().len(), 1);
    }

    #[test]
    fn test_deadline_only() {
        let mut h = heading("Taxes", None);
        h.deadline = Some(OrgTimestamp::on(ymd(2024, 5, 31)));

        let events = derive(&h, &vocab()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.title, "Taxes (deadline)");
    }

    #[test]
    fn test_unplanned_heading_yields_nothing() {
        assert_eq!(derive(&heading("Someday", None), &vocab()).unwrap(), vec![]);
    }

    #[test]
    fn test_keyword_only_heading_is_an_error() {
        let h = heading("TODO", Some(OrgTimestamp::on(ymd(2024, 1, 2))));
        assert_eq!(derive(&h, &vocab()), Err(DeriveError::EmptyTitle));
    }

    #[test]
    fn test_repeaters() {
        assert_eq!(
            parse_repeater("+2w"),
            Some(Recurrence {
                frequency: Frequency::Weekly,
                interval: 2,
                count: 0
            })
        );
        assert_eq!(parse_repeater("+1y").map(|r| r.frequency), Some(Frequency::Yearly));
        assert_eq!(parse_repeater("++1w"), None);
        assert_eq!(parse_repeater(".+1d"), None);
        assert_eq!(parse_repeater("+1h"), None);
        assert_eq!(parse_repeater("+0d"), None);
        assert_eq!(parse_repeater("+w"), None);
    }

    #[test]
    fn test_dst_gap_is_an_error() {
        // 02:30 does not exist in Berlin on 2024-03-31
        let h = heading("Ghost", Some(OrgTimestamp::at(ymd(2024, 3, 31), hm(2, 30))));
        assert!(matches!(
            derive(&h, &vocab()),
            Err(DeriveError::NonexistentLocalTime(_, _))
        ));
    }

    #[test]
    fn test_from_parsed_document() {
        let doc = "* NEXT Water plants :home:\n  SCHEDULED: <2024-01-06 Sat 08:00 +3d>\n  Balcony too.\n";
        let headings = parse_document(doc, &TodoKeywords::default());
        let event = &derive(&headings[0], &vocab()).unwrap()[0].event;

        assert_eq!(event.title, "Water plants");
        assert_eq!(event.tags, vec!["home", "next"]);
        assert_eq!(event.description, "Balcony too.");
        assert_eq!(
            event.recurrence,
            Some(Recurrence {
                frequency: Frequency::Daily,
                interval: 3,
                count: 0
            })
        );
    }
}
