//! Observational cache events

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    ContentStale,
    CacheFull,
    CacheManagerTrimmed,
    UserForced,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionReason::ContentStale => write!(f, "content_stale"),
            EvictionReason::CacheFull => write!(f, "cache_full"),
            EvictionReason::CacheManagerTrimmed => write!(f, "cache_manager_trimmed"),
            EvictionReason::UserForced => write!(f, "user_forced"),
        }
    }
}

/// Details attached to a single notification; unset fields do not apply
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheEvent {
    pub resource_id: Option<String>,
    pub cache_key: Option<String>,
    pub item_size: Option<u64>,
    pub cache_size: Option<i64>,
    pub cache_limit: Option<i64>,
    pub eviction_reason: Option<EvictionReason>,
    pub error: Option<String>,
}

impl CacheEvent {
    pub(crate) fn for_key(uri: String) -> Self {
        Self {
            cache_key: Some(uri),
            ..Self::default()
        }
    }

    pub(crate) fn eviction(
        resource_id: &str,
        reason: EvictionReason,
        item_size: u64,
        cache_size: i64,
    ) -> Self {
        Self {
            resource_id: Some(resource_id.to_string()),
            eviction_reason: Some(reason),
            item_size: Some(item_size),
            cache_size: Some(cache_size),
            ..Self::default()
        }
    }
}

/// Receives cache notifications.
///
/// Callbacks may run while the cache lock is held, so implementations must
/// not call back into the cache.
pub trait CacheEventListener: Send + Sync {
    fn on_hit(&self, _event: &CacheEvent) {}
    fn on_miss(&self, _event: &CacheEvent) {}
    fn on_write_attempt(&self, _event: &CacheEvent) {}
    fn on_write_success(&self, _event: &CacheEvent) {}
    fn on_read_exception(&self, _event: &CacheEvent) {}
    fn on_write_exception(&self, _event: &CacheEvent) {}
    fn on_eviction(&self, _event: &CacheEvent) {}
    fn on_cleared(&self) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Kind {
        Hit,
        Miss,
        WriteAttempt,
        WriteSuccess,
        ReadException,
        WriteException,
        Eviction,
        Cleared,
    }

    /// Keeps every notification in arrival order
    #[derive(Default)]
    pub struct RecordingListener {
        pub events: Mutex<Vec<(Kind, CacheEvent)>>,
    }

    impl RecordingListener {
        pub fn kinds(&self) -> Vec<Kind> {
            self.events.lock().iter().map(|(k, _)| k.clone()).collect()
        }

        pub fn of_kind(&self, kind: Kind) -> Vec<CacheEvent> {
            self.events
                .lock()
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, e)| e.clone())
                .collect()
        }

        fn push(&self, kind: Kind, event: &CacheEvent) {
            self.events.lock().push((kind, event.clone()));
        }
    }

    impl CacheEventListener for RecordingListener {
        fn on_hit(&self, event: &CacheEvent) {
            self.push(Kind::Hit, event);
        }
        fn on_miss(&self, event: &CacheEvent) {
            self.push(Kind::Miss, event);
        }
        fn on_write_attempt(&self, event: &CacheEvent) {
            self.push(Kind::WriteAttempt, event);
        }
        fn on_write_success(&self, event: &CacheEvent) {
            self.push(Kind::WriteSuccess, event);
        }
        fn on_read_exception(&self, event: &CacheEvent) {
            self.push(Kind::ReadException, event);
        }
        fn on_write_exception(&self, event: &CacheEvent) {
            self.push(Kind::WriteException, event);
        }
        fn on_eviction(&self, event: &CacheEvent) {
            self.push(Kind::Eviction, event);
        }
        fn on_cleared(&self) {
            self.push(Kind::Cleared, &CacheEvent::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_event_serialization() {
        let event = CacheEvent::eviction("abc", EvictionReason::ContentStale, 41, 84);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"content_stale\""));
        assert!(json.contains("\"item_size\":41"));
        assert!(json.contains("\"cache_size\":84"));
    }

    #[test]
    fn test_for_key_sets_only_key() {
        let event = CacheEvent::for_key("https://cdn.example/x.png".to_string());
        assert_eq!(event.cache_key.as_deref(), Some("https://cdn.example/x.png"));
        assert!(event.resource_id.is_none());
        assert!(event.eviction_reason.is_none());
    }
}
