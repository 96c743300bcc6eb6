//! Feed timestamps: local wall-clock times in the game server's timezone.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{CoreError, CoreResult};

const FEED_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Parse `YYYY/MM/DD HH:MM:SS` (zero padding optional) as a time in `tz`
pub fn parse_feed_time(value: &str, tz: Tz) -> CoreResult<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), FEED_TIME_FORMAT).map_err(|e| {
        CoreError::InvalidTime {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;

    local_to_utc(&naive, tz)
}

/// Resolve a wall-clock time in `tz`; ambiguous times take the earlier instant
pub fn local_to_utc(naive: &NaiveDateTime, tz: Tz) -> CoreResult<DateTime<Utc>> {
    tz.from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| CoreError::InvalidTime {
            value: naive.to_string(),
            reason: format!("does not exist in {}", tz.name()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Shanghai;

    #[test]
    fn test_parse_feed_time_converts_to_utc() {
        let parsed = parse_feed_time("2024/07/01 05:00:00", Shanghai).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 6, 30, 21, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_feed_time_accepts_unpadded_fields() {
        let parsed = parse_feed_time("2020/7/11 5:00:00", Shanghai).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2020, 7, 10, 21, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_feed_time_rejects_other_formats() {
        assert!(parse_feed_time("2024-07-01T05:00:00", Shanghai).is_err());
        assert!(parse_feed_time("", Shanghai).is_err());
    }
}
