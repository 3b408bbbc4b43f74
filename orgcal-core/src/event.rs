//! Canonical event types.
//!
//! An [`Event`] is what a heading means on a calendar. Its [`Fingerprint`] is the
//! comparable subset of fields used to decide whether a remote write is needed.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// When an event happens: a whole day, or an instant in the configured zone.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTime {
    Date(NaiveDate),
    DateTime(DateTime<Tz>),
}

impl EventTime {
    pub fn date(&self) -> NaiveDate {
        match self {
            EventTime::Date(d) => *d,
            EventTime::DateTime(dt) => dt.date_naive(),
        }
    }

    /// Instant used for ordering. All-day values sort at midnight UTC.
    pub fn sort_key(&self) -> DateTime<Utc> {
        match self {
            EventTime::Date(d) => d.and_time(chrono::NaiveTime::MIN).and_utc(),
            EventTime::DateTime(dt) => dt.with_timezone(&Utc),
        }
    }

    /// Stable textual form used when hashing identities.
    pub fn canonical_string(&self) -> String {
        match self {
            EventTime::Date(d) => d.format("%Y-%m-%d").to_string(),
            EventTime::DateTime(dt) => dt.to_rfc3339(),
        }
    }

    fn key(&self) -> ScheduleKey {
        match self {
            EventTime::Date(d) => ScheduleKey::Date(*d),
            EventTime::DateTime(dt) => ScheduleKey::Instant(dt.with_timezone(&Utc)),
        }
    }

    /// Add a duration, or `None` past the representable range. Dates only move by
    /// whole days.
    pub fn checked_add(&self, duration: Duration) -> Option<EventTime> {
        match self {
            EventTime::Date(d) => {
                let days = Duration::try_days(duration.num_days())?;
                d.checked_add_signed(days).map(EventTime::Date)
            }
            EventTime::DateTime(dt) => dt.checked_add_signed(duration).map(EventTime::DateTime),
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    pub fn from_rrule(value: &str) -> Option<Self> {
        match value {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

/// A repeat rule. `count == 0` repeats forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub frequency: Frequency,
    pub interval: u32,
    #[serde(default)]
    pub count: u32,
}

impl Recurrence {
    /// RRULE value, e.g. `FREQ=WEEKLY;INTERVAL=2`.
    pub fn to_rrule(&self) -> String {
        let mut rule = format!("FREQ={};INTERVAL={}", self.frequency.as_str(), self.interval);
        if self.count > 0 {
            rule.push_str(&format!(";COUNT={}", self.count));
        }
        rule
    }

    /// Parse the subset of RRULE this tool writes. Unknown parts are ignored.
    pub fn from_rrule(rule: &str) -> Option<Self> {
        let mut frequency = None;
        let mut interval = 1;
        let mut count = 0;

        for part in rule.split(';') {
            let (key, value) = part.split_once('=')?;
            match key.trim().to_ascii_uppercase().as_str() {
                "FREQ" => frequency = Frequency::from_rrule(&value.trim().to_ascii_uppercase()),
                "INTERVAL" => interval = value.trim().parse().ok()?,
                "COUNT" => count = value.trim().parse().ok()?,
                _ => {}
            }
        }

        Some(Recurrence {
            frequency: frequency?,
            interval,
            count,
        })
    }
}

/// A calendar event as derived from a heading (or decoded from the remote).
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub title: String,
    pub description: String,
    pub scheduled: Option<EventTime>,
    pub duration: Option<Duration>,
    pub recurrence: Option<Recurrence>,
    /// Lowercase, sorted, deduplicated
    pub tags: Vec<String>,
}

impl Event {
    /// Duration as it survives the remote encoding: all-day events only keep whole
    /// days and a zero-length span is no span at all.
    pub fn effective_duration(&self) -> Option<Duration> {
        let duration = self.duration?;
        let duration = match self.scheduled {
            Some(EventTime::Date(_)) => Duration::days(duration.num_days()),
            _ => duration,
        };
        (duration > Duration::zero()).then_some(duration)
    }

    /// End of the event, or `None` when it would equal the start or cannot be
    /// represented.
    pub fn end(&self) -> Option<EventTime> {
        let start = self.scheduled.as_ref()?;
        self.effective_duration().and_then(|d| start.checked_add(d))
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            title: self.title.clone(),
            scheduled: self.scheduled.as_ref().map(EventTime::key),
            duration_secs: self.effective_duration().map(|d| d.num_seconds()),
            description: self.description.clone(),
            recurrence: self.recurrence.clone(),
            tags: self.tags.clone(),
        }
    }

    pub fn content_eq(&self, other: &Event) -> bool {
        self.fingerprint() == other.fingerprint()
    }

    /// `2024-01-01 10:00--10:30` style label for status lines.
    pub fn time_label(&self) -> String {
        let Some(start) = &self.scheduled else {
            return "----------".to_string();
        };
        match (start, self.end()) {
            (EventTime::DateTime(_), Some(EventTime::DateTime(end))) => {
                format!("{}--{}", start, end.format("%H:%M"))
            }
            _ => start.to_string(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Normalize a tag list: lowercase, trimmed, non-empty, sorted and unique.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Event Model output: an event plus the identifier its heading declared, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedEvent {
    pub source_id: Option<String>,
    pub event: Event,
}

/// An event with its final identity.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifiedEvent {
    pub uid: String,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKey {
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

impl ScheduleKey {
    /// Calendar date of the key as seen in `tz`.
    pub fn local_date(&self, tz: Tz) -> NaiveDate {
        match self {
            ScheduleKey::Date(d) => *d,
            ScheduleKey::Instant(dt) => dt.with_timezone(&tz).date_naive(),
        }
    }
}

/// Comparable field set of an event. Equal fingerprints mean no write is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<ScheduleKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub tags: Vec<String>,
}
