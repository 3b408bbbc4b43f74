//! ICS parsing using the icalendar crate's parser.

use chrono::{Duration, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{read_calendar, unfold},
};

use crate::event::{Event, EventTime, Recurrence, normalize_tags};

/// Decode the first VEVENT of a calendar object into its uid and event.
///
/// Datetimes are converted to `tz`; floating times are read in it.
pub fn decode_event(content: &str, tz: Tz) -> Option<(String, Event)> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).ok()?;
    let vevent = calendar.components.iter().find(|c| c.name == "VEVENT")?;

    let uid = vevent.find_prop("UID")?.val.to_string();
    let title = vevent
        .find_prop("SUMMARY")
        .map(|p| p.val.to_string())
        .unwrap_or_default();

    let start = vevent
        .find_prop("DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .and_then(|dpt| to_event_time(dpt, tz))?;
    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .and_then(|dpt| to_event_time(dpt, tz));

    let duration = end.and_then(|end| span(&start, &end));

    let description = vevent
        .find_prop("DESCRIPTION")
        .map(|p| p.val.to_string())
        .unwrap_or_default();

    let recurrence = vevent
        .find_prop("RRULE")
        .and_then(|p| Recurrence::from_rrule(p.val.as_ref()));

    let tags = normalize_tags(
        vevent
            .properties
            .iter()
            .filter(|p| p.name == "CATEGORIES")
            .flat_map(|p| p.val.as_ref().split(',').map(String::from).collect::<Vec<_>>()),
    );

    Some((
        uid,
        Event {
            title,
            description,
            scheduled: Some(start),
            duration,
            recurrence,
            tags,
        },
    ))
}

fn to_event_time(dpt: DatePerhapsTime, tz: Tz) -> Option<EventTime> {
    match dpt {
        DatePerhapsTime::Date(d) => Some(EventTime::Date(d)),
        DatePerhapsTime::DateTime(cal_dt) => {
            let dt = match cal_dt {
                CalendarDateTime::Utc(dt) => dt.with_timezone(&tz),
                CalendarDateTime::Floating(naive) => in_zone(naive, tz)?,
                CalendarDateTime::WithTimezone { date_time, tzid } => match tzid.parse::<Tz>() {
                    Ok(zone) => in_zone(date_time, zone)?.with_timezone(&tz),
                    Err(_) => {
                        tracing::debug!(tzid = %tzid, "Unknown TZID, reading as local time");
                        in_zone(date_time, tz)?
                    }
                },
            };
            Some(EventTime::DateTime(dt))
        }
    }
}

fn in_zone(naive: NaiveDateTime, tz: Tz) -> Option<chrono::DateTime<Tz>> {
    tz.from_local_datetime(&naive).earliest()
}

fn span(start: &EventTime, end: &EventTime) -> Option<Duration> {
    match (start, end) {
        (EventTime::Date(s), EventTime::Date(e)) => Some(*e - *s),
        (EventTime::DateTime(s), EventTime::DateTime(e)) => Some(*e - *s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Frequency;
    use crate::ics::encode_event;
    use chrono::NaiveDate;
    use chrono_tz::Europe::Berlin;

    fn make_event() -> Event {
        Event {
            title: "Buy milk".to_string(),
            description: "Oat".to_string(),
            scheduled: Some(EventTime::DateTime(
                Berlin.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            )),
            duration: Some(Duration::minutes(30)),
            recurrence: Some(Recurrence {
                frequency: Frequency::Weekly,
                interval: 2,
                count: 0,
            }),
            tags: vec!["errand".to_string(), "todo".to_string()],
        }
    }

    #[test]
    fn test_decoded_event_is_content_equal() {
        let event = make_event();
        let ics = encode_event("abc", &event).unwrap();

        let (uid, decoded) = decode_event(&ics, Berlin).unwrap();
        assert_eq!(uid, "abc");
        assert!(event.content_eq(&decoded), "{event:?} != {decoded:?}");
    }

    #[test]
    fn test_special_characters_survive() {
        let mut event = make_event();
        event.title = "Lunch, then nap; maybe".to_string();
        event.description = "one\ntwo\nC:\\temp\\new".to_string();

        let ics = encode_event("abc", &event).unwrap();
        let (_, decoded) = decode_event(&ics, Berlin).unwrap();

        assert_eq!(decoded.title, event.title);
        assert_eq!(decoded.description, event.description);
        assert_eq!(decoded.tags, event.tags);
        assert!(event.content_eq(&decoded), "{event:?} != {decoded:?}");
    }

    #[test]
    fn test_comma_separated_categories() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:remote-2\r\n\
DTSTART;VALUE=DATE:20240101\r\n\
CATEGORIES:Work,todo\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let (_, event) = decode_event(ics, Berlin).unwrap();
        assert_eq!(event.tags, vec!["todo".to_string(), "work".to_string()]);
    }

    #[test]
    fn test_all_day_and_zero_duration() {
        let mut event = make_event();
        event.scheduled = Some(EventTime::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
        event.duration = Some(Duration::zero());
        event.recurrence = None;

        let ics = encode_event("abc", &event).unwrap();
        let (_, decoded) = decode_event(&ics, Berlin).unwrap();

        assert_eq!(decoded.duration, None);
        assert!(event.content_eq(&decoded));
    }

    #[test]
    fn test_utc_and_foreign_zones_are_converted() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:remote-1\r\n\
SUMMARY:Call\r\n\
DTSTART:20240101T090000Z\r\n\
DTEND;TZID=America/New_York:20240101T050000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let (_, event) = decode_event(ics, Berlin).unwrap();
        assert_eq!(
            event.scheduled,
            Some(EventTime::DateTime(
                Berlin.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
            ))
        );
        assert_eq!(event.duration, Some(Duration::hours(1)));
        assert!(event.tags.is_empty());
    }

    #[test]
    fn test_missing_start_or_uid() {
        let no_start = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:x\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        assert!(decode_event(no_start, Berlin).is_none());
        assert!(decode_event("not ics", Berlin).is_none());
    }
}
