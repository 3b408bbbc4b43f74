//! iCalendar encoding of events, as stored on the remote.
//!
//! TEXT escaping is left to `icalendar` in both directions.

mod generate;
mod parse;

pub use generate::encode_event;
pub use parse::decode_event;
