//! CalDAV implementation of the orgcal calendar port.

mod calendar;
mod multistatus;

pub use calendar::{CaldavCalendar, Credentials, calendar_url};
pub use multistatus::{CalendarResource, parse_calendar_resources};
