//! Core of the pcr-ics calendar generator.
//!
//! - `schedule` turns the data site's schedule tables into [`EventRecord`]s
//! - `reconcile` carries metadata forward from a previously published calendar
//! - `ics` reads reference calendars and writes the published feed

pub mod calendar;
pub mod clock;
pub mod error;
pub mod event;
pub mod ics;
pub mod reconcile;
pub mod schedule;

pub use calendar::{Calendar, CalendarHeader};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use event::*;
pub use reconcile::{ReconcileStats, Reconciliation, reconcile};
