//! Local scan archive.
//!
//! Every recorded scan lands here, whether or not the content store
//! accepted it, so history survives a store outage for the life of the
//! process. The archive holds at most `capacity` records; the oldest
//! insertion is evicted first.

use parking_lot::RwLock;
use std::collections::VecDeque;

use lumiere_core::ScanRecord;

/// Default bound on archived scans.
pub const DEFAULT_ARCHIVE_CAPACITY: usize = 256;

/// Bounded in-memory scan log.
#[derive(Debug)]
pub struct ScanArchive {
    records: RwLock<VecDeque<ScanRecord>>,
    capacity: usize,
}

impl Default for ScanArchive {
    fn default() -> Self {
        Self::new(DEFAULT_ARCHIVE_CAPACITY)
    }
}

impl ScanArchive {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_ARCHIVE_CAPACITY))),
            capacity,
        }
    }

    pub fn append(&self, record: ScanRecord) {
        let mut records = self.records.write();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Up to `limit` records, newest first by scan date.
    ///
    /// Equal dates keep the later insertion first. Only the returned
    /// records are cloned.
    pub fn recent(&self, limit: usize) -> Vec<ScanRecord> {
        let records = self.records.read();
        let mut newest: Vec<&ScanRecord> = records.iter().rev().collect();
        newest.sort_by(|a, b| b.date.cmp(&a.date));
        newest.into_iter().take(limit).cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use lumiere_core::AnalysisScores;

    fn record(user: &str, minutes: i64) -> ScanRecord {
        let mut record = ScanRecord::new(user, AnalysisScores::new(50.0, 50.0, 50.0, 50.0), &[]);
        record.date = Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap() + Duration::minutes(minutes);
        record
    }

    #[test]
    fn test_recent_newest_first() {
        let archive = ScanArchive::default();
        archive.append(record("a", 0));
        archive.append(record("c", 20));
        archive.append(record("b", 10));

        let users: Vec<String> = archive.recent(5).into_iter().map(|r| r.user_id).collect();
        assert_eq!(users, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_recent_respects_limit() {
        let archive = ScanArchive::default();
        assert!(archive.is_empty());
        for minute in 0..8 {
            archive.append(record("u", minute));
        }
        assert_eq!(archive.len(), 8);
        assert_eq!(archive.recent(5).len(), 5);
        assert_eq!(archive.recent(5)[0].date, record("u", 7).date);
    }

    #[test]
    fn test_oldest_evicted_at_capacity() {
        let archive = ScanArchive::new(4);
        for minute in 0..7 {
            archive.append(record(&format!("u{minute}"), minute));
        }

        assert_eq!(archive.len(), 4);
        let users: Vec<String> = archive.recent(10).into_iter().map(|r| r.user_id).collect();
        assert_eq!(users, vec!["u6", "u5", "u4", "u3"]);
    }

    #[test]
    fn test_equal_dates_latest_insertion_first() {
        let archive = ScanArchive::new(8);
        archive.append(record("first", 5));
        archive.append(record("second", 5));

        assert_eq!(archive.recent(1)[0].user_id, "second");
    }

    #[test]
    fn test_zero_capacity_keeps_newest() {
        let archive = ScanArchive::new(0);
        archive.append(record("a", 0));
        archive.append(record("b", 1));

        assert_eq!(archive.capacity(), 1);
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.recent(5)[0].user_id, "b");
    }
}
