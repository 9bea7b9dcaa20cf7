//! Cache keys and their mapping to on-disk resource ids

use sha2::{Digest, Sha256};
use std::fmt;

/// A caller-level cache key that resolves to one or more resource ids.
///
/// Ids are tried in order on read; only the first one is ever written.
pub trait CacheKey: Send + Sync {
    /// Human-readable form, reported in cache events
    fn uri_string(&self) -> String;

    /// Ordered candidate resource ids
    fn resource_ids(&self) -> Vec<String>;

    fn first_resource_id(&self) -> Option<String> {
        self.resource_ids().into_iter().next()
    }
}

/// Hash an arbitrary string into a filesystem-safe resource id
pub fn secure_hash_key(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Key identified by a single uri
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimpleCacheKey {
    uri: String,
}

impl SimpleCacheKey {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn resource_id(&self) -> String {
        secure_hash_key(&self.uri)
    }
}

impl fmt::Display for SimpleCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl CacheKey for SimpleCacheKey {
    fn uri_string(&self) -> String {
        self.uri.clone()
    }

    fn resource_ids(&self) -> Vec<String> {
        vec![self.resource_id()]
    }
}

/// Several aliases for the same payload (e.g. a thumbnail and its source)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MultiCacheKey {
    keys: Vec<SimpleCacheKey>,
}

impl MultiCacheKey {
    /// Returns `None` for an empty key list
    pub fn new(keys: Vec<SimpleCacheKey>) -> Option<Self> {
        if keys.is_empty() {
            None
        } else {
            Some(Self { keys })
        }
    }

    pub fn keys(&self) -> &[SimpleCacheKey] {
        &self.keys
    }
}

impl CacheKey for MultiCacheKey {
    fn uri_string(&self) -> String {
        self.keys
            .first()
            .map(|k| k.uri_string())
            .unwrap_or_default()
    }

    fn resource_ids(&self) -> Vec<String> {
        self.keys.iter().map(SimpleCacheKey::resource_id).collect()
    }
}
