//! Mapping from the game's schedule tables to [`EventRecord`]s.
//!
//! The data site publishes the CN server's master database as a
//! brotli-compressed SQLite file. [`ScheduleFeed::from_database`] runs one
//! query per schedule table and keeps every result row as a column-name keyed
//! object; the same shape can be written as JSON for fixtures:
//!
//! ```json
//! {
//!   "truth_version": "202406250001",
//!   "tables": {
//!     "tower_schedule": [
//!       {"tower_schedule_id": 12, "start_time": "2024/06/25 05:00:00",
//!        "end_time": "2024/07/01 23:59:59", "max_floor_num": 300}
//!     ]
//!   }
//! }
//! ```
//!
//! Each row is decoded on its own so one malformed row only costs that row.

mod database;
mod tables;
mod time;

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::event::{Category, EventRecord};

pub use tables::RowSpan;
use tables::{CampaignRow, CharaFortuneRow, ClanBattleRow, FreeGachaRow, HatsuneRow, TowerRow};
pub use time::{local_to_utc, parse_feed_time};

/// Prefix of the name hashed into every event UID
const UID_NAMESPACE_PREFIX: &str = "pcr_cn";

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleFeed {
    /// Version of the game database the tables were exported from
    pub truth_version: String,
    #[serde(default)]
    pub tables: HashMap<String, Vec<serde_json::Value>>,
}

impl ScheduleFeed {
    /// Parse a JSON dump of the schedule tables
    pub fn from_json(content: &str) -> CoreResult<Self> {
        serde_json::from_str(content).map_err(|e| CoreError::Feed(e.to_string()))
    }
}

/// Settings that shape how rows become events
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Timezone the feed's local times are expressed in
    pub timezone: Tz,
    /// Events ending before this are dropped; earlier starts are clamped to it
    pub release_time: DateTime<Utc>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        let timezone = chrono_tz::Asia::Shanghai;
        // 2020-04-17 11:00 in Shanghai, launch of the CN server
        let release_time = NaiveDate::from_ymd_opt(2020, 4, 17)
            .and_then(|d| d.and_hms_opt(3, 0, 0))
            .map(|naive| naive.and_utc())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        BuildOptions {
            timezone,
            release_time,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub rows: usize,
    pub records: usize,
    /// Rows that could not be decoded or had unusable times
    pub malformed: usize,
    /// Rows intentionally left out (unknown campaign kind, pre-release, ...)
    pub ignored: usize,
}

/// A schedule table whose rows map to calendar events
pub trait ScheduleTable: DeserializeOwned {
    const NAME: &'static str;
    const CATEGORY: Category;
    /// Selects this table's rows from the master database, one column per field
    const QUERY: &'static str;

    fn row_id(&self) -> i64;
    fn span(&self) -> &RowSpan;

    /// Event title, or `None` when the row should not be published
    fn title(&self) -> Option<String>;

    /// Start/end strings in the feed's `YYYY/MM/DD HH:MM:SS` form
    fn times(&self) -> (String, String) {
        let span = self.span();
        (span.start_time.clone(), span.end_time.clone())
    }
}

/// Build event records from every known table in the feed
pub fn build_records(feed: &ScheduleFeed, options: &BuildOptions) -> (Vec<EventRecord>, BuildStats) {
    let mut records = Vec::new();
    let mut stats = BuildStats::default();

    build_table::<ClanBattleRow>(feed, options, &mut records, &mut stats);
    build_table::<FreeGachaRow>(feed, options, &mut records, &mut stats);
    build_table::<CampaignRow>(feed, options, &mut records, &mut stats);
    build_table::<TowerRow>(feed, options, &mut records, &mut stats);
    build_table::<HatsuneRow>(feed, options, &mut records, &mut stats);
    build_table::<CharaFortuneRow>(feed, options, &mut records, &mut stats);

    stats.records = records.len();
    (records, stats)
}

fn build_table<T: ScheduleTable>(
    feed: &ScheduleFeed,
    options: &BuildOptions,
    records: &mut Vec<EventRecord>,
    stats: &mut BuildStats,
) {
    let Some(rows) = feed.tables.get(T::NAME) else {
        warn!(table = T::NAME, "table missing from feed");
        return;
    };

    for (index, value) in rows.iter().enumerate() {
        stats.rows += 1;

        let row: T = match serde_json::from_value(value.clone()) {
            Ok(row) => row,
            Err(e) => {
                warn!(table = T::NAME, index, "skipping malformed row: {}", e);
                stats.malformed += 1;
                continue;
            }
        };

        match build_record(&row, options) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => stats.ignored += 1,
            Err(e) => {
                warn!(table = T::NAME, id = row.row_id(), "skipping malformed row: {}", e);
                stats.malformed += 1;
            }
        }
    }
}

/// Turn one row into a record; `Ok(None)` means the row is deliberately skipped
pub fn build_record<T: ScheduleTable>(
    row: &T,
    options: &BuildOptions,
) -> CoreResult<Option<EventRecord>> {
    let id = row.row_id();

    let Some(title) = row.title() else {
        debug!(table = T::NAME, id, "row has no published title");
        return Ok(None);
    };

    let (start_raw, end_raw) = row.times();
    let mut start = parse_feed_time(&start_raw, options.timezone)?;
    let end = parse_feed_time(&end_raw, options.timezone)?;

    if end < start {
        return Err(CoreError::InvalidTime {
            value: end_raw,
            reason: format!("ends before it starts ({start_raw})"),
        });
    }

    if end < options.release_time {
        debug!(table = T::NAME, id, "event ended before server release");
        return Ok(None);
    }
    if start < options.release_time {
        start = options.release_time;
    }

    Ok(Some(EventRecord {
        uid: event_uid(T::NAME, id),
        title,
        description: row.span().description.clone(),
        start,
        end,
        category: T::CATEGORY,
    }))
}

/// Name-based UUID of `pcr_cn/<table>/<id>`, identical on every run
pub fn event_uid(table: &str, id: i64) -> String {
    let name = format!("{UID_NAMESPACE_PREFIX}/{table}/{id}");
    Uuid::new_v3(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}
