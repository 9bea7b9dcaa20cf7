//! Sharded, size-bounded disk cache for encoded image blobs
//!
//! Payloads live one file per resource under
//! `<root>/v2.ols100.<version>/<shard>/<resource id>.cnt`. Writes go to a temp
//! file and are published by rename, so readers never see partial content.
//! [`DiskStorageCache`] keeps an in-memory index and size tally on top of the
//! storage and evicts by age (`clear_old_entries`) or by size when the
//! dynamic limit is exceeded.

mod cache;
mod clock;
mod config;
mod disk_space;
mod error;
mod events;
mod eviction;
mod executor;
mod key;
mod logger;
mod resource;
pub mod storage;
mod trim;
mod types;

pub use cache::{
    CacheParams, DiskStorageCache, DiskStorageCacheBuilder, FILECACHE_SIZE_UPDATE_PERIOD_MS,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DiskCacheConfig;
pub use disk_space::{
    CachedDiskSpace, DiskSpaceProbe, FixedDiskSpace, StatFsProbe, RESTAT_INTERVAL_MS,
};
pub use error::{CacheError, RenameFailure, Result};
pub use events::{CacheEvent, CacheEventListener, EvictionReason};
pub use eviction::{
    order_for_eviction, EvictionPolicy, EvictionStrategy, LruEvictionPolicy,
    ScoreBasedEvictionPolicy, FUTURE_TIMESTAMP_THRESHOLD_MS,
};
pub use executor::{Executor, Task, ThreadExecutor, TokioBlockingExecutor};
pub use key::{secure_hash_key, CacheKey, MultiCacheKey, SimpleCacheKey};
pub use logger::{CacheErrorCategory, CacheErrorLogger, TracingErrorLogger};
pub use resource::{FileResource, WriterCallback, WriterCallbacks};
pub use storage::{DiskStorage, Inserter, Removal, ShardedDiskStorage};
pub use trim::{DiskTrimmable, DiskTrimmableRegistry};
pub use types::{CacheStats, CacheStatsSnapshot, DiskDumpInfo, DumpEntry, Entry, UNINITIALIZED};
