//! ICS generation, written directly against RFC 5545.
//!
//! Output is deterministic: the same [`Calendar`] always yields the same bytes,
//! so an unchanged feed republishes an identical file.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::calendar::Calendar;
use crate::event::CalendarEntry;

pub const PRODID: &str = "-//pcr-ics//pcr-ics-core//ZH";
pub const VERSION_STAMP_PROPERTY: &str = "X-PCR-ICS-DB-VERSION";

/// Maximum octets per physical line, excluding the CRLF
const MAX_LINE_OCTETS: usize = 75;

/// Render a whole calendar as ICS text
pub fn write_calendar(calendar: &Calendar) -> String {
    let mut out = String::new();

    push_line(&mut out, "BEGIN", "VCALENDAR");
    push_line(&mut out, "VERSION", "2.0");
    push_line(&mut out, "PRODID", PRODID);
    push_line(&mut out, "CALSCALE", "GREGORIAN");
    push_line(&mut out, "METHOD", "PUBLISH");
    push_line(&mut out, "X-WR-CALNAME", &escape_text(&calendar.header.name));
    push_line(&mut out, "X-WR-CALDESC", &escape_text(&calendar.header.description));
    push_line(&mut out, "X-WR-TIMEZONE", &escape_text(&calendar.header.timezone));
    if let Some(ref version) = calendar.version {
        push_line(&mut out, VERSION_STAMP_PROPERTY, &escape_text(version));
    }

    for entry in &calendar.entries {
        write_event(&mut out, entry);
    }

    push_line(&mut out, "END", "VCALENDAR");
    out
}

fn write_event(out: &mut String, entry: &CalendarEntry) {
    let record = &entry.record;
    let meta = &entry.metadata;

    push_line(out, "BEGIN", "VEVENT");
    push_line(out, "UID", &escape_text(&record.uid));
    // DTSTAMP follows LAST-MODIFIED so untouched events stay byte-identical
    push_line(out, "DTSTAMP", &format_utc(&meta.last_modified));
    push_line(out, "CREATED", &format_utc(&meta.created));
    push_line(out, "LAST-MODIFIED", &format_utc(&meta.last_modified));
    push_line(out, "SEQUENCE", &meta.sequence.to_string());
    push_line(out, "DTSTART", &format_utc(&record.start));
    push_line(out, "DTEND", &format_utc(&record.end));
    push_line(out, "SUMMARY", &escape_text(&record.title));
    if let Some(ref desc) = record.description {
        push_line(out, "DESCRIPTION", &escape_text(desc));
    }
    push_line(out, "CATEGORIES", &escape_text(record.category.as_str()));
    push_line(out, "END", "VEVENT");
}

/// UTC date-time form: 20240701T000000Z
pub fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape a TEXT value (RFC 5545 section 3.3.11)
pub fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }

    escaped
}

/// Append `NAME:value` as one or more folded physical lines
fn push_line(out: &mut String, name: &str, value: &str) {
    let mut line = String::with_capacity(name.len() + value.len() + 1);
    let _ = write!(line, "{name}:{value}");
    out.push_str(&fold_line(&line));
}

/// Fold a content line at 75 octets, never splitting a UTF-8 sequence.
///
/// Continuation lines start with a single space, which counts towards their
/// 75 octets.
pub fn fold_line(line: &str) -> String {
    let mut folded = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3 + 2);
    let mut octets = 0;

    for c in line.chars() {
        let width = c.len_utf8();
        if octets + width > MAX_LINE_OCTETS {
            folded.push_str("\r\n ");
            octets = 1;
        }
        folded.push(c);
        octets += width;
    }

    folded.push_str("\r\n");
    folded
}
