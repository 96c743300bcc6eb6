//! ICS reading and writing.
//!
//! Writing is done by hand against RFC 5545; reading reference calendars goes
//! through the icalendar crate's parser.

mod parse;
mod write;

pub use parse::{parse_calendar, unescape_text};
pub use write::{PRODID, VERSION_STAMP_PROPERTY, escape_text, fold_line, format_utc, write_calendar};
