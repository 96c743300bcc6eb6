//! Carry event metadata forward from a previously published calendar.
//!
//! Calendar clients only refresh a cached event when its SEQUENCE goes up, so
//! every regeneration has to decide per UID whether the event is new, changed
//! or untouched compared to what was published last time.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::calendar::Calendar;
use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::event::{CalendarEntry, EventMetadata, EventRecord};

/// What happened to a single event during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => write!(f, "+"),
            Outcome::Updated => write!(f, "~"),
            Outcome::Unchanged => write!(f, "="),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Prior events with no counterpart in the new record set
    pub dropped: usize,
}

impl ReconcileStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Unchanged => self.unchanged += 1,
        }
    }
}

impl fmt::Display for ReconcileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} dropped",
            self.created, self.updated, self.unchanged, self.dropped
        )
    }
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Entries ordered by start time, then UID
    pub entries: Vec<CalendarEntry>,
    pub stats: ReconcileStats,
}

/// Merge freshly built records with the metadata of a prior calendar.
///
/// - no prior calendar, or UID not in it: fresh metadata (sequence 0)
/// - UID found with the same content: metadata copied as-is
/// - UID found with different content ([`EventRecord::differs_from`]): same
///   CREATED, sequence + 1, LAST-MODIFIED = now
///
/// Prior events missing from `records` are dropped. The clock is read once, and
/// a `now` earlier than any matched prior timestamp is rejected as clock skew.
pub fn reconcile(
    records: Vec<EventRecord>,
    prior: Option<&Calendar>,
    clock: &dyn Clock,
) -> CoreResult<Reconciliation> {
    let now = clock.now()?;
    let prior_by_uid = prior.map(Calendar::by_uid).unwrap_or_default();

    let records = dedup_by_uid(records);
    let mut stats = ReconcileStats::default();
    let mut entries = Vec::with_capacity(records.len());

    for record in records {
        let (metadata, outcome) = match prior_by_uid.get(record.uid.as_str()) {
            None => (EventMetadata::fresh(now), Outcome::Created),
            Some(old) => {
                check_not_before(&old.record.uid, now, &old.metadata)?;
                if record.differs_from(&old.record) {
                    (old.metadata.bumped(now)?, Outcome::Updated)
                } else {
                    (old.metadata, Outcome::Unchanged)
                }
            }
        };

        if outcome != Outcome::Unchanged {
            debug!(uid = %record.uid, sequence = metadata.sequence, "{} {}", outcome, record);
        }
        stats.record(outcome);
        entries.push(CalendarEntry { record, metadata });
    }

    let kept: HashSet<&str> = entries.iter().map(|e| e.record.uid.as_str()).collect();
    for (uid, old) in &prior_by_uid {
        if !kept.contains(uid) {
            debug!(uid = %uid, "- {}", old.record);
            stats.dropped += 1;
        }
    }

    sort_entries(&mut entries);

    Ok(Reconciliation { entries, stats })
}

/// Order by start ascending, ties broken by UID
pub fn sort_entries(entries: &mut [CalendarEntry]) {
    entries.sort_by(|a, b| {
        a.record
            .start
            .cmp(&b.record.start)
            .then_with(|| a.record.uid.cmp(&b.record.uid))
    });
}

/// Keep the last record for every UID, preserving first-seen order
fn dedup_by_uid(records: Vec<EventRecord>) -> Vec<EventRecord> {
    let mut slot_by_uid: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<EventRecord> = Vec::with_capacity(records.len());

    for record in records {
        match slot_by_uid.get(&record.uid) {
            Some(&slot) => {
                warn!(uid = %record.uid, "duplicate event uid, keeping the last record");
                deduped[slot] = record;
            }
            None => {
                slot_by_uid.insert(record.uid.clone(), deduped.len());
                deduped.push(record);
            }
        }
    }

    deduped
}

fn check_not_before(uid: &str, now: DateTime<Utc>, metadata: &EventMetadata) -> CoreResult<()> {
    let latest = metadata.created.max(metadata.last_modified);
    if now < latest {
        return Err(CoreError::ClockSkew {
            uid: uid.to_string(),
            now,
            recorded: latest,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarHeader;
    use crate::clock::FixedClock;
    use crate::event::Category;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn make_record(uid: &str, title: &str, start: DateTime<Utc>) -> EventRecord {
        EventRecord {
            uid: uid.to_string(),
            title: title.to_string(),
            description: None,
            start,
            end: start + Duration::days(7),
            category: Category::StoryEvent,
        }
    }

    fn make_prior(entries: Vec<CalendarEntry>) -> Calendar {
        Calendar::new(CalendarHeader::default(), Some("202407010000".to_string()), entries)
    }

    fn published(at: DateTime<Utc>, sequence: u32) -> EventMetadata {
        EventMetadata {
            created: at - Duration::days(30),
            last_modified: at,
            sequence,
        }
    }

    #[test]
    fn test_no_prior_gives_fresh_metadata() {
        let now = at(2024, 8, 1);
        let records = vec![make_record("E1", "Summer Event", at(2024, 7, 1))];

        let result = reconcile(records, None, &FixedClock(now)).unwrap();

        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].metadata, EventMetadata::fresh(now));
        assert_eq!(result.stats.created, 1);
    }

    #[test]
    fn test_identical_event_keeps_metadata() {
        let published_at = at(2024, 6, 20);
        let now = at(2024, 8, 1);
        let e1 = make_record("E1", "Summer Event", at(2024, 7, 1));
        let prior = make_prior(vec![CalendarEntry {
            record: e1.clone(),
            metadata: published(published_at, 2),
        }]);

        let result = reconcile(vec![e1], Some(&prior), &FixedClock(now)).unwrap();

        let meta = result.entries[0].metadata;
        assert_eq!(meta.sequence, 2);
        assert_eq!(meta.last_modified, published_at);
        assert_eq!(result.stats.unchanged, 1);
        assert_eq!(result.stats.updated, 0);
    }

    #[test]
    fn test_changed_title_bumps_sequence() {
        let published_at = at(2024, 6, 20);
        let now = at(2024, 8, 1);
        let e1 = make_record("E1", "Summer Event", at(2024, 7, 1));
        let prior = make_prior(vec![CalendarEntry {
            record: e1.clone(),
            metadata: published(published_at, 2),
        }]);

        let mut renamed = e1;
        renamed.title = "Summer Event (rerun)".to_string();
        let result = reconcile(vec![renamed], Some(&prior), &FixedClock(now)).unwrap();

        let meta = result.entries[0].metadata;
        assert_eq!(meta.sequence, 3);
        assert_eq!(meta.last_modified, now);
        assert_eq!(meta.created, published_at - Duration::days(30));
        assert_eq!(result.stats.updated, 1);
    }

    #[test]
    fn test_each_visible_field_counts_as_change() {
        let now = at(2024, 8, 1);
        let base = make_record("E1", "Summer Event", at(2024, 7, 1));
        let prior = make_prior(vec![CalendarEntry {
            record: base.clone(),
            metadata: published(at(2024, 6, 20), 0),
        }]);

        let mut variants = Vec::new();
        let mut v = base.clone();
        v.description = Some("drop x2".to_string());
        variants.push(v);
        let mut v = base.clone();
        v.start = base.start + Duration::hours(1);
        variants.push(v);
        let mut v = base.clone();
        v.end = base.end + Duration::hours(1);
        variants.push(v);
        let mut v = base.clone();
        v.category = Category::Campaign;
        variants.push(v);

        for variant in variants {
            let result = reconcile(vec![variant.clone()], Some(&prior), &FixedClock(now)).unwrap();
            assert_eq!(
                result.entries[0].metadata.sequence, 1,
                "change not detected for {:?}",
                variant
            );
        }
    }

    #[test]
    fn test_new_uid_against_prior_gets_sequence_zero() {
        let now = at(2024, 8, 1);
        let prior = make_prior(vec![CalendarEntry {
            record: make_record("E1", "Summer Event", at(2024, 7, 1)),
            metadata: published(at(2024, 6, 20), 5),
        }]);

        let records = vec![
            make_record("E1", "Summer Event", at(2024, 7, 1)),
            make_record("E3", "Clan Battle", at(2024, 7, 25)),
        ];
        let result = reconcile(records, Some(&prior), &FixedClock(now)).unwrap();

        let e3 = result
            .entries
            .iter()
            .find(|e| e.record.uid == "E3")
            .expect("E3 should be present");
        assert_eq!(e3.metadata, EventMetadata::fresh(now));
    }

    #[test]
    fn test_missing_event_is_dropped() {
        let now = at(2024, 8, 1);
        let prior = make_prior(vec![
            CalendarEntry {
                record: make_record("E1", "Summer Event", at(2024, 7, 1)),
                metadata: published(at(2024, 6, 20), 0),
            },
            CalendarEntry {
                record: make_record("E2", "Tower", at(2024, 7, 10)),
                metadata: published(at(2024, 6, 20), 0),
            },
        ]);

        let records = vec![make_record("E1", "Summer Event", at(2024, 7, 1))];
        let result = reconcile(records, Some(&prior), &FixedClock(now)).unwrap();

        assert!(result.entries.iter().all(|e| e.record.uid != "E2"));
        assert_eq!(result.stats.dropped, 1);
    }

    #[test]
    fn test_output_sorted_by_start_then_uid() {
        let now = at(2024, 8, 1);
        let t1 = at(2024, 7, 20);
        let t2 = at(2024, 7, 10);
        let records = vec![
            make_record("B", "later", t1),
            make_record("Z", "earlier", t2),
            make_record("A", "earlier too", t2),
        ];

        let result = reconcile(records, None, &FixedClock(now)).unwrap();

        let uids: Vec<_> = result.entries.iter().map(|e| e.record.uid.as_str()).collect();
        assert_eq!(uids, vec!["A", "Z", "B"]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let first_run = at(2024, 7, 1);
        let records = vec![
            make_record("E1", "Summer Event", at(2024, 7, 1)),
            make_record("E2", "Tower", at(2024, 7, 10)),
        ];
        let first = reconcile(records.clone(), None, &FixedClock(first_run)).unwrap();
        let prior = make_prior(first.entries.clone());

        let second = reconcile(records, Some(&prior), &FixedClock(at(2024, 8, 1))).unwrap();

        assert_eq!(first.entries, second.entries);
        assert_eq!(second.stats.unchanged, 2);
    }

    #[test]
    fn test_sequence_never_decreases_across_runs() {
        let mut prior: Option<Calendar> = None;
        let mut last_sequence = 0;
        let titles = ["a", "b", "b", "c", "c", "c", "d"];

        for (day, title) in titles.iter().enumerate() {
            let now = at(2024, 8, 1) + Duration::days(day as i64);
            let records = vec![make_record("E1", title, at(2024, 9, 1))];
            let result = reconcile(records, prior.as_ref(), &FixedClock(now)).unwrap();

            let sequence = result.entries[0].metadata.sequence;
            assert!(sequence >= last_sequence);
            last_sequence = sequence;
            prior = Some(make_prior(result.entries));
        }

        assert_eq!(last_sequence, 3);
    }

    #[test]
    fn test_duplicate_uid_keeps_last_record() {
        let now = at(2024, 8, 1);
        let records = vec![
            make_record("E1", "first", at(2024, 7, 1)),
            make_record("E1", "second", at(2024, 7, 1)),
        ];

        let result = reconcile(records, None, &FixedClock(now)).unwrap();

        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].record.title, "second");
    }

    #[test]
    fn test_clock_behind_prior_is_rejected() {
        let published_at = at(2024, 8, 1);
        let e1 = make_record("E1", "Summer Event", at(2024, 7, 1));
        let prior = make_prior(vec![CalendarEntry {
            record: e1.clone(),
            metadata: published(published_at, 0),
        }]);

        let err = reconcile(vec![e1], Some(&prior), &FixedClock(at(2024, 7, 1))).unwrap_err();

        assert!(matches!(err, CoreError::ClockSkew { .. }), "got {err:?}");
    }

    #[test]
    fn test_unavailable_clock_is_fatal() {
        struct BrokenClock;
        impl Clock for BrokenClock {
            fn now(&self) -> CoreResult<DateTime<Utc>> {
                Err(CoreError::ClockUnavailable("no time source".to_string()))
            }
        }

        let records = vec![make_record("E1", "Summer Event", at(2024, 7, 1))];
        let err = reconcile(records, None, &BrokenClock).unwrap_err();

        assert!(matches!(err, CoreError::ClockUnavailable(_)));
    }

    #[test]
    fn test_changed_event_at_max_sequence_is_an_error() {
        let now = at(2024, 8, 1);
        let e1 = make_record("E1", "Summer Event", at(2024, 7, 1));
        let prior = make_prior(vec![CalendarEntry {
            record: e1.clone(),
            metadata: published(at(2024, 6, 20), crate::event::MAX_SEQUENCE),
        }]);

        let mut renamed = e1;
        renamed.title = "Summer Event (rerun)".to_string();
        let err = reconcile(vec![renamed], Some(&prior), &FixedClock(now)).unwrap_err();

        assert!(matches!(err, CoreError::SequenceOverflow { .. }), "got {err:?}");
    }

    #[test]
    fn test_prior_without_category_is_not_bumped() {
        let published_at = at(2024, 6, 20);
        let e1 = make_record("E1", "Summer Event", at(2024, 7, 1));
        let mut legacy = e1.clone();
        legacy.category = Category::Other(String::new());
        let prior = make_prior(vec![CalendarEntry {
            record: legacy,
            metadata: published(published_at, 3),
        }]);

        let result = reconcile(vec![e1], Some(&prior), &FixedClock(at(2024, 8, 1))).unwrap();

        let entry = &result.entries[0];
        assert_eq!(entry.metadata.sequence, 3);
        assert_eq!(entry.metadata.last_modified, published_at);
        assert_eq!(entry.record.category, Category::StoryEvent);
        assert_eq!(result.stats.unchanged, 1);
    }
}
