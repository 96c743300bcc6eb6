//! The published calendar document.

use std::collections::HashMap;

use crate::event::CalendarEntry;

/// Calendar-level display properties (X-WR-* extensions)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarHeader {
    pub name: String,
    pub description: String,
    pub timezone: String,
}

impl Default for CalendarHeader {
    fn default() -> Self {
        CalendarHeader {
            name: "公主连结国服活动日历".to_string(),
            description: "公主连结国服活动日历，由pcr-ics生成，数据来自干炸里脊资料站".to_string(),
            timezone: "Asia/Shanghai".to_string(),
        }
    }
}

/// A calendar: header, version stamp and entries sorted by start time
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Calendar {
    pub header: CalendarHeader,
    /// Data version the entries were generated from
    pub version: Option<String>,
    pub entries: Vec<CalendarEntry>,
}

impl Calendar {
    pub fn new(header: CalendarHeader, version: Option<String>, entries: Vec<CalendarEntry>) -> Self {
        Calendar {
            header,
            version,
            entries,
        }
    }

    /// Entries keyed by UID
    pub fn by_uid(&self) -> HashMap<&str, &CalendarEntry> {
        self.entries
            .iter()
            .map(|entry| (entry.record.uid.as_str(), entry))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
