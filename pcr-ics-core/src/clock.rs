//! Source of the current time.
//!
//! Reconciliation stamps CREATED/LAST-MODIFIED with "now", so the clock is
//! passed in explicitly instead of read from a global.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};

pub trait Clock {
    fn now(&self) -> CoreResult<DateTime<Utc>>;
}

/// Wall clock, truncated to whole seconds (the precision ICS can store)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> CoreResult<DateTime<Utc>> {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| CoreError::ClockUnavailable(e.to_string()))?;

        let secs = i64::try_from(since_epoch.as_secs())
            .map_err(|e| CoreError::ClockUnavailable(e.to_string()))?;

        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| CoreError::ClockUnavailable(format!("timestamp {secs} out of range")))
    }
}

/// A clock that always reports the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> CoreResult<DateTime<Utc>> {
        Ok(self.0)
    }
}
