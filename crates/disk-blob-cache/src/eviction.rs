//! Eviction ordering: which entries go first when space is needed

use crate::types::Entry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Entries more than this far in the future are evicted before anything else
pub const FUTURE_TIMESTAMP_THRESHOLD_MS: i64 = 2 * 60 * 60 * 1000;

/// Total order over entries, most evictable first
pub trait EvictionPolicy: Send + Sync {
    fn sort(&self, entries: &mut [Entry], now_ms: i64);
}

/// Oldest timestamp first. Reads refresh timestamps, so this is LRU.
#[derive(Debug, Default, Clone, Copy)]
pub struct LruEvictionPolicy;

impl EvictionPolicy for LruEvictionPolicy {
    fn sort(&self, entries: &mut [Entry], _now_ms: i64) {
        entries.sort_by_key(Entry::timestamp_ms);
    }
}

/// Weighted blend of age and size, each normalized to `[0, 1]` by the
/// largest value in the batch. Highest score is evicted first.
#[derive(Debug, Clone, Copy)]
pub struct ScoreBasedEvictionPolicy {
    age_weight: f64,
    size_weight: f64,
}

impl ScoreBasedEvictionPolicy {
    pub fn new(age_weight: f64, size_weight: f64) -> Self {
        Self {
            age_weight,
            size_weight,
        }
    }
}

impl EvictionPolicy for ScoreBasedEvictionPolicy {
    fn sort(&self, entries: &mut [Entry], now_ms: i64) {
        let age = |e: &Entry| (now_ms - e.timestamp_ms()).max(0) as f64;
        let max_age = entries.iter().map(age).fold(0.0, f64::max);
        let max_size = entries.iter().map(|e| e.size() as f64).fold(0.0, f64::max);

        let normalize = |value: f64, max: f64| if max > 0.0 { value / max } else { 0.0 };
        let score = |e: &Entry| {
            self.age_weight * normalize(age(e), max_age)
                + self.size_weight * normalize(e.size() as f64, max_size)
        };
        entries.sort_by(|a, b| score(b).total_cmp(&score(a)));
    }
}

/// Selects an eviction policy without runtime lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvictionStrategy {
    #[default]
    Lru,
    ScoreBased { age_weight: f64, size_weight: f64 },
}

impl EvictionStrategy {
    pub fn policy(&self) -> Arc<dyn EvictionPolicy> {
        match *self {
            EvictionStrategy::Lru => Arc::new(LruEvictionPolicy),
            EvictionStrategy::ScoreBased {
                age_weight,
                size_weight,
            } => Arc::new(ScoreBasedEvictionPolicy::new(age_weight, size_weight)),
        }
    }
}

/// Order entries for eviction.
///
/// Entries stamped beyond `now + FUTURE_TIMESTAMP_THRESHOLD_MS` cannot be
/// trusted to reflect recency; they go first, the rest follow `policy`.
pub fn order_for_eviction(
    policy: &dyn EvictionPolicy,
    entries: Vec<Entry>,
    now_ms: i64,
) -> Vec<Entry> {
    let threshold = now_ms + FUTURE_TIMESTAMP_THRESHOLD_MS;
    let (mut ordered, mut rest): (Vec<Entry>, Vec<Entry>) = entries
        .into_iter()
        .partition(|e| e.timestamp_ms() > threshold);
    policy.sort(&mut rest, now_ms);
    ordered.append(&mut rest);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ms_to_file_time;
    use std::fs;
    use std::path::Path;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    fn entry(dir: &Path, id: &str, size: usize, timestamp_ms: i64) -> Entry {
        let path = dir.join(format!("{}.cnt", id));
        fs::write(&path, vec![0u8; size]).unwrap();
        filetime::set_file_mtime(&path, ms_to_file_time(timestamp_ms)).unwrap();
        Entry::new(id.to_string(), path)
    }

    fn ids(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(Entry::id).collect()
    }

    #[test]
    fn test_lru_orders_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut entries = vec![
            entry(dir.path(), "mid", 1, 2 * HOUR_MS),
            entry(dir.path(), "new", 1, 3 * HOUR_MS),
            entry(dir.path(), "old", 1, HOUR_MS),
        ];
        LruEvictionPolicy.sort(&mut entries, 4 * HOUR_MS);
        assert_eq!(ids(&entries), vec!["old", "mid", "new"]);
    }

    #[test]
    fn test_score_prefers_size_when_size_dominates() {
        let dir = tempfile::tempdir().unwrap();
        let now = 100 * HOUR_MS;
        let mut entries = vec![
            entry(dir.path(), "small-ancient", 10, 0),
            entry(dir.path(), "large-recent", 1000, now - HOUR_MS),
        ];
        ScoreBasedEvictionPolicy::new(0.1, 0.9).sort(&mut entries, now);
        assert_eq!(ids(&entries), vec!["large-recent", "small-ancient"]);

        ScoreBasedEvictionPolicy::new(0.9, 0.1).sort(&mut entries, now);
        assert_eq!(ids(&entries), vec!["small-ancient", "large-recent"]);
    }

    #[test]
    fn test_future_entries_go_first() {
        let dir = tempfile::tempdir().unwrap();
        let now = 10 * HOUR_MS;
        let entries = vec![
            entry(dir.path(), "old", 1, HOUR_MS),
            entry(dir.path(), "slightly-ahead", 1, now + HOUR_MS),
            entry(dir.path(), "far-future", 1, now + 3 * HOUR_MS),
        ];
        let ordered = order_for_eviction(&LruEvictionPolicy, entries, now);
        assert_eq!(ids(&ordered), vec!["far-future", "old", "slightly-ahead"]);
    }

    #[test]
    fn test_strategy_serialization() {
        let strategy = EvictionStrategy::ScoreBased {
            age_weight: 0.5,
            size_weight: 0.5,
        };
        let json = serde_json::to_string(&strategy).unwrap();
        assert!(json.contains("score_based"));
        let back: EvictionStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, strategy);
        assert_eq!(EvictionStrategy::default(), EvictionStrategy::Lru);
    }
}
