//! Reference calendar parsing using the icalendar crate's parser.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use icalendar::parser::{Component, Property, read_calendar, unfold};
use icalendar::{CalendarDateTime, DatePerhapsTime};

use crate::calendar::{Calendar, CalendarHeader};
use crate::error::{CoreError, CoreResult};
use crate::event::{CalendarEntry, Category, EventMetadata, EventRecord, MAX_SEQUENCE};
use crate::ics::write::VERSION_STAMP_PROPERTY;
use crate::reconcile::sort_entries;
use crate::schedule::local_to_utc;

/// Parse a previously published calendar.
///
/// Anything that keeps metadata from being carried forward reliably (missing
/// UID, missing times, unusable timestamps) is reported as an error rather
/// than skipped.
pub fn parse_calendar(content: &str) -> CoreResult<Calendar> {
    let unfolded = unfold(content);
    if !unfolded.lines().any(|line| line.trim_end() == "BEGIN:VCALENDAR") {
        return Err(CoreError::IcsParse("no VCALENDAR found".to_string()));
    }
    let calendar = read_calendar(&unfolded).map_err(|e| CoreError::IcsParse(e.to_string()))?;

    let defaults = CalendarHeader::default();
    let header = CalendarHeader {
        name: find_text(&calendar.properties, "X-WR-CALNAME").unwrap_or(defaults.name),
        description: find_text(&calendar.properties, "X-WR-CALDESC")
            .unwrap_or(defaults.description),
        timezone: find_text(&calendar.properties, "X-WR-TIMEZONE").unwrap_or(defaults.timezone),
    };
    let version = find_text(&calendar.properties, VERSION_STAMP_PROPERTY);

    let mut entries = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .map(parse_entry)
        .collect::<CoreResult<Vec<_>>>()?;
    sort_entries(&mut entries);

    Ok(Calendar {
        header,
        version,
        entries,
    })
}

fn parse_entry(vevent: &Component) -> CoreResult<CalendarEntry> {
    let uid = vevent
        .find_prop("UID")
        .map(|p| unescape_text(p.val.as_ref()))
        .ok_or_else(|| CoreError::IcsParse("VEVENT without UID".to_string()))?;

    let required_time = |name: &str| -> CoreResult<DateTime<Utc>> {
        let prop = vevent
            .find_prop(name)
            .ok_or_else(|| CoreError::IcsParse(format!("event {uid} has no {name}")))?;
        property_to_utc(prop)
    };
    let optional_time = |name: &str| -> CoreResult<Option<DateTime<Utc>>> {
        vevent.find_prop(name).map(property_to_utc).transpose()
    };

    let start = required_time("DTSTART")?;
    let end = required_time("DTEND")?;

    let title = vevent
        .find_prop("SUMMARY")
        .map(|p| unescape_text(p.val.as_ref()))
        .unwrap_or_default();
    let description = vevent
        .find_prop("DESCRIPTION")
        .map(|p| unescape_text(p.val.as_ref()));
    let category = vevent
        .find_prop("CATEGORIES")
        .map(|p| Category::from_ics_str(&unescape_text(p.val.as_ref())))
        .unwrap_or_else(|| Category::Other(String::new()));

    let sequence = match vevent.find_prop("SEQUENCE") {
        Some(p) => parse_sequence(p.val.as_ref()).map_err(|reason| {
            CoreError::IcsParse(format!("event {uid} has invalid SEQUENCE: {reason}"))
        })?,
        None => 0,
    };

    let created = optional_time("CREATED")?;
    let last_modified = optional_time("LAST-MODIFIED")?;
    let dtstamp = optional_time("DTSTAMP")?;

    let created = created
        .or(last_modified)
        .or(dtstamp)
        .ok_or_else(|| CoreError::IcsParse(format!("event {uid} has no usable timestamp")))?;
    let last_modified = last_modified.unwrap_or(created);

    Ok(CalendarEntry {
        record: EventRecord {
            uid,
            title,
            description,
            start,
            end,
            category,
        },
        metadata: EventMetadata {
            created,
            last_modified,
            sequence,
        },
    })
}

/// Non-negative INTEGER (RFC 5545 section 3.3.8)
fn parse_sequence(value: &str) -> Result<u32, String> {
    let sequence = value.trim().parse::<u32>().map_err(|e| e.to_string())?;
    if sequence > MAX_SEQUENCE {
        return Err(format!("{sequence} is larger than {MAX_SEQUENCE}"));
    }
    Ok(sequence)
}

fn find_text(properties: &[Property], name: &str) -> Option<String> {
    properties
        .iter()
        .find(|p| p.name == name)
        .map(|p| unescape_text(p.val.as_ref()))
}

/// Resolve a date or date-time property to UTC.
///
/// Floating times are read as UTC, TZID-qualified times are resolved through
/// the tz database, and plain dates mean midnight UTC.
fn property_to_utc(prop: &Property) -> CoreResult<DateTime<Utc>> {
    let value = DatePerhapsTime::try_from(prop).map_err(|_| {
        CoreError::IcsParse(format!(
            "invalid {} value '{}'",
            prop.name.to_string(),
            prop.val.to_string()
        ))
    })?;

    match value {
        DatePerhapsTime::Date(d) => Ok(d.and_time(chrono::NaiveTime::MIN).and_utc()),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Ok(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => Ok(naive.and_utc()),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            zoned_to_utc(&date_time, &tzid)
        }
    }
}

fn zoned_to_utc(naive: &NaiveDateTime, tzid: &str) -> CoreResult<DateTime<Utc>> {
    let tz: Tz = tzid.parse().map_err(|_| CoreError::InvalidTime {
        value: naive.to_string(),
        reason: format!("unknown timezone '{tzid}'"),
    })?;

    local_to_utc(naive, tz)
}

/// Undo TEXT escaping (RFC 5545 section 3.3.11)
pub fn unescape_text(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => unescaped.push('\n'),
            Some(other) => unescaped.push(other),
            None => unescaped.push('\\'),
        }
    }

    unescaped
}
