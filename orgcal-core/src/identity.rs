//! Identity Resolver: stable identifiers for derived events.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::event::{DerivedEvent, Event, IdentifiedEvent};

/// Synthesize an identifier from the event's identity fields.
///
/// Only calendar, title, start and recurrence contribute, so editing a description
/// or tags keeps the identifier.
pub fn synthesize_uid(calendar_id: &str, event: &Event) -> String {
    let scheduled = event
        .scheduled
        .as_ref()
        .map(|s| s.canonical_string())
        .unwrap_or_default();
    let (frequency, interval, count) = match &event.recurrence {
        Some(r) => (r.frequency.as_str(), r.interval, r.count),
        None => ("", 0, 0),
    };

    let interval = interval.to_string();
    let count = count.to_string();
    let fields: [&str; 6] = [
        calendar_id,
        &event.title,
        &scheduled,
        frequency,
        &interval,
        &count,
    ];

    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[16..]);
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}

/// Assign identifiers and drop duplicates. The first event with a given identifier
/// wins.
pub fn resolve(calendar_id: &str, events: Vec<DerivedEvent>) -> Vec<IdentifiedEvent> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(events.len());

    for DerivedEvent { source_id, event } in events {
        let uid = source_id.unwrap_or_else(|| synthesize_uid(calendar_id, &event));
        if !seen.insert(uid.clone()) {
            tracing::debug!(uid = %uid, title = %event.title, "Dropping duplicate event");
            continue;
        }
        resolved.push(IdentifiedEvent { uid, event });
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventTime, Frequency, Recurrence};
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::Europe::Berlin;

    fn make_event(title: &str) -> Event {
        Event {
            title: title.to_string(),
            description: String::new(),
            scheduled: Some(EventTime::DateTime(
                Berlin.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            )),
            duration: None,
            recurrence: None,
            tags: vec![],
        }
    }

    fn derived(source_id: Option<&str>, event: Event) -> DerivedEvent {
        DerivedEvent {
            source_id: source_id.map(String::from),
            event,
        }
    }

    #[test]
    fn test_uid_is_a_v4_uuid() {
        let uid = synthesize_uid("work", &make_event("Standup"));
        let parsed = uuid::Uuid::parse_str(&uid).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(uid, uid.to_lowercase());
        assert_eq!(uid, synthesize_uid("work", &make_event("Standup")));
    }

    #[test]
    fn test_uid_ignores_description_and_tags() {
        let a = make_event("Standup");
        let mut b = make_event("Standup");
        b.description = "Room 4".to_string();
        b.tags = vec!["work".to_string()];
        assert_eq!(synthesize_uid("work", &a), synthesize_uid("work", &b));
    }

    #[test]
    fn test_uid_depends_on_identity_fields() {
        let base = make_event("Standup");
        let uid = synthesize_uid("work", &base);

        assert_ne!(uid, synthesize_uid("home", &base));
        assert_ne!(uid, synthesize_uid("work", &make_event("Retro")));

        let mut moved = make_event("Standup");
        moved.scheduled = Some(EventTime::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        assert_ne!(uid, synthesize_uid("work", &moved));

        let mut repeating = make_event("Standup");
        repeating.recurrence = Some(Recurrence {
            frequency: Frequency::Daily,
            interval: 1,
            count: 0,
        });
        assert_ne!(uid, synthesize_uid("work", &repeating));
    }

    #[test]
    fn test_resolve_keeps_explicit_ids_and_first_duplicate() {
        let mut second = make_event("Standup");
        second.description = "second copy".to_string();

        let resolved = resolve(
            "work",
            vec![
                derived(Some("abc"), make_event("Explicit")),
                derived(None, make_event("Standup")),
                derived(None, second),
                derived(Some("abc"), make_event("Also explicit")),
            ],
        );

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].uid, "abc");
        assert_eq!(resolved[0].event.title, "Explicit");
        assert_eq!(resolved[1].event.description, "");
    }
}
