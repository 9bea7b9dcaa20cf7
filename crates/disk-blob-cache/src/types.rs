//! Cache types

use crate::resource::FileResource;
use chrono::{DateTime, TimeZone, Utc};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Sentinel for size/count before the first full scan
pub const UNINITIALIZED: i64 = -1;

/// Snapshot of one content file, produced by a storage enumeration.
///
/// Size and timestamp are read from disk at most once per snapshot.
#[derive(Debug, Clone)]
pub struct Entry {
    id: String,
    resource: FileResource,
    timestamp_ms: OnceLock<i64>,
    size: OnceLock<u64>,
}

impl Entry {
    pub fn new(id: String, path: PathBuf) -> Self {
        Self {
            id,
            resource: FileResource::new(path),
            timestamp_ms: OnceLock::new(),
            size: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resource(&self) -> &FileResource {
        &self.resource
    }

    /// Last-modified time in milliseconds; 0 when the file cannot be stat'ed
    pub fn timestamp_ms(&self) -> i64 {
        *self.timestamp_ms.get_or_init(|| {
            fs::metadata(self.resource.path())
                .map(|meta| file_time_to_ms(FileTime::from_last_modification_time(&meta)))
                .unwrap_or(0)
        })
    }

    pub fn size(&self) -> u64 {
        *self
            .size
            .get_or_init(|| self.resource.size().unwrap_or(0))
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms()).single()
    }
}

pub(crate) fn file_time_to_ms(time: FileTime) -> i64 {
    time.unix_seconds() * 1000 + i64::from(time.nanoseconds() / 1_000_000)
}

pub(crate) fn ms_to_file_time(ms: i64) -> FileTime {
    let secs = ms.div_euclid(1000);
    let nanos = (ms.rem_euclid(1000) as u32) * 1_000_000;
    FileTime::from_unix_time(secs, nanos)
}

/// Aggregate size and count of the cache, the ground truth for eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub initialized: bool,
    pub size: i64,
    pub count: i64,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self {
            initialized: false,
            size: UNINITIALIZED,
            count: UNINITIALIZED,
        }
    }
}

impl CacheStats {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn set(&mut self, size: i64, count: i64) {
        self.size = size;
        self.count = count;
        self.initialized = true;
    }

    /// No-op until the first full scan has set a baseline
    pub(crate) fn increment(&mut self, size_delta: i64, count_delta: i64) {
        if self.initialized {
            self.size += size_delta;
            self.count += count_delta;
        }
    }
}

/// Public view of the cache counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub initialized: bool,
    pub size: i64,
    pub count: i64,
    pub hits: u64,
    pub misses: u64,
}

/// One line of a debug dump
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpEntry {
    pub id: String,
    pub path: PathBuf,
    pub content_type: String,
    pub size: u64,
    pub first_bits: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskDumpInfo {
    pub entries: Vec<DumpEntry>,
    pub type_counts: HashMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_default_is_uninitialized() {
        let stats = CacheStats::default();
        assert!(!stats.initialized);
        assert_eq!(stats.size, UNINITIALIZED);
        assert_eq!(stats.count, UNINITIALIZED);
    }

    #[test]
    fn test_increment_ignored_until_set() {
        let mut stats = CacheStats::default();
        stats.increment(100, 1);
        assert_eq!(stats.size, UNINITIALIZED);

        stats.set(10, 1);
        stats.increment(100, 1);
        assert_eq!(stats.size, 110);
        assert_eq!(stats.count, 2);

        stats.reset();
        assert!(!stats.initialized);
        assert_eq!(stats.count, UNINITIALIZED);
    }

    #[test]
    fn test_ms_file_time_conversion() {
        for ms in [0, 1, 999, 1_000, 1_700_000_000_123, -1_500] {
            assert_eq!(file_time_to_ms(ms_to_file_time(ms)), ms);
        }
    }

    #[test]
    fn test_entry_reads_size_and_timestamp_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.cnt");
        fs::write(&path, b"12345").unwrap();
        filetime::set_file_mtime(&path, ms_to_file_time(42_000)).unwrap();

        let entry = Entry::new("abc".to_string(), path.clone());
        assert_eq!(entry.size(), 5);
        assert_eq!(entry.timestamp_ms(), 42_000);

        // Snapshot values stay fixed after the file changes
        fs::write(&path, b"123456789").unwrap();
        filetime::set_file_mtime(&path, ms_to_file_time(99_000)).unwrap();
        assert_eq!(entry.size(), 5);
        assert_eq!(entry.timestamp_ms(), 42_000);
        assert_eq!(entry.modified_at().unwrap().timestamp(), 42);
    }

    #[test]
    fn test_dump_info_serialization() {
        let mut info = DiskDumpInfo::default();
        info.entries.push(DumpEntry {
            id: "abc123".to_string(),
            path: PathBuf::from("/cache/v2.ols100.1/42/abc123.cnt"),
            content_type: "jpg".to_string(),
            size: 12345,
            first_bits: String::new(),
        });
        info.type_counts.insert("jpg".to_string(), 1);

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("abc123"));
        assert!(json.contains("12345"));

        let deserialized: DiskDumpInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.entries[0].content_type, "jpg");
        assert_eq!(deserialized.type_counts["jpg"], 1);
    }
}
