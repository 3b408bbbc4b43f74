//! ICS generation.

use icalendar::{Calendar, Component, EventLike, Property, ValueType};

use crate::error::PortError;
use crate::event::{Event, EventTime};

/// Encode an event as a single-VEVENT calendar object.
pub fn encode_event(uid: &str, event: &Event) -> Result<String, PortError> {
    let start = event
        .scheduled
        .as_ref()
        .ok_or_else(|| PortError::MissingStart(event.title.clone()))?;

    let mut cal = Calendar::new();

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(uid);
    ics_event.summary(&event.title);

    let dtstamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    ics_event.add_property("DTSTAMP", &dtstamp);

    add_datetime_property(&mut ics_event, "DTSTART", start);
    // No DTEND when the event has no length
    if let Some(end) = event.end() {
        add_datetime_property(&mut ics_event, "DTEND", &end);
    }

    if !event.description.is_empty() {
        ics_event.description(&event.description.replace("\r\n", "\n"));
    }

    if let Some(ref recurrence) = event.recurrence {
        ics_event.add_property("RRULE", recurrence.to_rrule());
    }

    // One property per tag; a joined value would get its commas escaped
    for tag in &event.tags {
        ics_event.add_multi_property("CATEGORIES", tag);
    }

    let ics_event = ics_event.done();
    cal.push(ics_event);
    let cal = cal.done();

    Ok(strip_ics_bloat(&cal.to_string()))
}

/// Replace the PRODID and drop the default CALSCALE.
fn strip_ics_bloat(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:-//orgcal//EN\r\n");
            continue;
        }
        if line == "CALSCALE:GREGORIAN" {
            continue;
        }
        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

fn add_datetime_property(ics_event: &mut icalendar::Event, name: &str, time: &EventTime) {
    match time {
        EventTime::Date(d) => {
            let mut prop = Property::new(name, d.format("%Y%m%d").to_string());
            prop.append_parameter(ValueType::Date);
            ics_event.append_property(prop);
        }
        EventTime::DateTime(dt) => {
            let mut prop = Property::new(name, dt.format("%Y%m%dT%H%M%S").to_string());
            prop.add_parameter("TZID", dt.timezone().name());
            ics_event.append_property(prop);
        }
    }
}
