use crate::cache::{CacheParams, DiskStorageCache, DiskStorageCacheBuilder};
use crate::clock::{Clock, SystemClock};
use crate::eviction::EvictionStrategy;
use crate::logger::{CacheErrorLogger, TracingErrorLogger};
use crate::storage::ShardedDiskStorage;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

const MIB: i64 = 1024 * 1024;

/// Disk cache configuration, usually parsed from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct DiskCacheConfig {
    /// Payload format version; changing it wipes the directory
    pub version: u32,
    pub base_directory: PathBuf,
    pub directory_name: String,
    pub max_cache_size: i64,
    pub max_cache_size_on_low_disk_space: i64,
    /// Floor used when trimming on low-disk-space signals
    pub max_cache_size_on_very_low_disk_space: i64,
    pub eviction: EvictionStrategy,
    pub index_populate_at_startup: bool,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            version: 1,
            base_directory: PathBuf::from("./cache"),
            directory_name: "image_cache".to_string(),
            max_cache_size: 40 * MIB,
            max_cache_size_on_low_disk_space: 10 * MIB,
            max_cache_size_on_very_low_disk_space: 2 * MIB,
            eviction: EvictionStrategy::Lru,
            index_populate_at_startup: false,
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|v| v.trim().parse().ok())
}

impl DiskCacheConfig {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Parse configuration from any variable source; unset or unparsable
    /// values keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_directory = lookup("DISK_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.base_directory);

        let directory_name = lookup("DISK_CACHE_NAME")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(defaults.directory_name);

        let eviction = match lookup("DISK_CACHE_EVICTION")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("score") | Some("score_based") => EvictionStrategy::ScoreBased {
                age_weight: parse_var(&lookup, "DISK_CACHE_AGE_WEIGHT").unwrap_or(0.5),
                size_weight: parse_var(&lookup, "DISK_CACHE_SIZE_WEIGHT").unwrap_or(0.5),
            },
            _ => EvictionStrategy::Lru,
        };

        let index_populate_at_startup = lookup("DISK_CACHE_POPULATE_INDEX")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.index_populate_at_startup);

        Self {
            version: parse_var(&lookup, "DISK_CACHE_VERSION").unwrap_or(defaults.version),
            base_directory,
            directory_name,
            max_cache_size: parse_var(&lookup, "DISK_CACHE_MAX_SIZE")
                .unwrap_or(defaults.max_cache_size),
            max_cache_size_on_low_disk_space: parse_var(&lookup, "DISK_CACHE_MAX_SIZE_LOW_SPACE")
                .unwrap_or(defaults.max_cache_size_on_low_disk_space),
            max_cache_size_on_very_low_disk_space: parse_var(
                &lookup,
                "DISK_CACHE_MAX_SIZE_VERY_LOW_SPACE",
            )
            .unwrap_or(defaults.max_cache_size_on_very_low_disk_space),
            eviction,
            index_populate_at_startup,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_base_directory(mut self, base_directory: impl Into<PathBuf>) -> Self {
        self.base_directory = base_directory.into();
        self
    }

    pub fn with_directory_name(mut self, directory_name: impl Into<String>) -> Self {
        self.directory_name = directory_name.into();
        self
    }

    pub fn with_max_cache_size(mut self, bytes: i64) -> Self {
        self.max_cache_size = bytes;
        self
    }

    pub fn with_max_cache_size_on_low_disk_space(mut self, bytes: i64) -> Self {
        self.max_cache_size_on_low_disk_space = bytes;
        self
    }

    pub fn with_max_cache_size_on_very_low_disk_space(mut self, bytes: i64) -> Self {
        self.max_cache_size_on_very_low_disk_space = bytes;
        self
    }

    pub fn with_eviction(mut self, eviction: EvictionStrategy) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn with_index_populate_at_startup(mut self, enabled: bool) -> Self {
        self.index_populate_at_startup = enabled;
        self
    }

    pub fn cache_directory(&self) -> PathBuf {
        self.base_directory.join(&self.directory_name)
    }

    pub fn params(&self) -> CacheParams {
        CacheParams {
            cache_size_limit_minimum: self.max_cache_size_on_very_low_disk_space,
            low_disk_space_cache_size_limit: self.max_cache_size_on_low_disk_space,
            default_cache_size_limit: self.max_cache_size,
        }
    }

    /// Cache builder over sharded storage in [`Self::cache_directory`].
    ///
    /// Opening the storage wipes the directory if it holds another version.
    pub fn builder(&self) -> DiskStorageCacheBuilder {
        let error_logger: Arc<dyn CacheErrorLogger> = Arc::new(TracingErrorLogger);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let storage = ShardedDiskStorage::new(
            self.cache_directory(),
            self.version,
            Arc::clone(&error_logger),
            Arc::clone(&clock),
        );
        DiskStorageCache::builder(Arc::new(storage))
            .eviction_policy(self.eviction.policy())
            .params(self.params())
            .error_logger(error_logger)
            .clock(clock)
            .index_populate_at_startup(self.index_populate_at_startup)
    }
}
