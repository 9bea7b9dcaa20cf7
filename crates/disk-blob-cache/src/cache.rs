//! Disk cache orchestrator
//!
//! [`DiskStorageCache`] sits on top of a [`DiskStorage`] and owns everything
//! the storage layer does not know about: the in-memory resource index, the
//! aggregate size/count, the dynamic size limit and both eviction sweeps.
//!
//! One mutex guards index and stats mutation, eviction and clears. The write
//! phase of an insert runs outside it, so inserts for different keys stream
//! their payloads in parallel.

use crate::clock::{Clock, SystemClock};
use crate::disk_space::{CachedDiskSpace, DiskSpaceProbe, StatFsProbe};
use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, CacheEventListener, EvictionReason};
use crate::eviction::{
    order_for_eviction, EvictionPolicy, LruEvictionPolicy, FUTURE_TIMESTAMP_THRESHOLD_MS,
};
use crate::executor::{Executor, ThreadExecutor};
use crate::key::CacheKey;
use crate::logger::{CacheErrorCategory, CacheErrorLogger, TracingErrorLogger};
use crate::resource::{FileResource, WriterCallback};
use crate::storage::{DiskStorage, Inserter, Removal};
use crate::trim::{DiskTrimmable, DiskTrimmableRegistry};
use crate::types::{CacheStats, CacheStatsSnapshot, DiskDumpInfo};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Ground-truth size is recomputed from a full scan at least this often
pub const FILECACHE_SIZE_UPDATE_PERIOD_MS: i64 = 30 * 60 * 1000;

/// Trims smaller than this fraction of the cache are skipped
const TRIMMING_LOWER_BOUND: f64 = 0.02;

const LOG_SOURCE: &str = "DiskStorageCache";

/// Size limits in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheParams {
    /// Floor that `trim_to_minimum` shrinks toward
    pub cache_size_limit_minimum: i64,
    /// Limit while free disk space is short
    pub low_disk_space_cache_size_limit: i64,
    pub default_cache_size_limit: i64,
}

impl Default for CacheParams {
    fn default() -> Self {
        Self {
            cache_size_limit_minimum: 2 * 1024 * 1024,
            low_disk_space_cache_size_limit: 10 * 1024 * 1024,
            default_cache_size_limit: 40 * 1024 * 1024,
        }
    }
}

/// Everything the cache lock protects
struct CacheState {
    /// Ids believed to be on disk. May miss ids, never lists absent ones.
    resource_index: HashSet<String>,
    stats: CacheStats,
    size_limit: i64,
    size_last_update_ms: Option<i64>,
}

struct CacheInner {
    storage: Arc<dyn DiskStorage>,
    policy: Arc<dyn EvictionPolicy>,
    params: CacheParams,
    listener: Option<Arc<dyn CacheEventListener>>,
    error_logger: Arc<dyn CacheErrorLogger>,
    clock: Arc<dyn Clock>,
    disk_space: Arc<dyn DiskSpaceProbe>,
    index_populate_at_startup: bool,
    state: Mutex<CacheState>,
    index_ready: AtomicBool,
    index_latch: Mutex<bool>,
    index_signal: Condvar,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Size-bounded cache of opaque payloads on disk.
///
/// One instance per directory; two caches over the same root will fight
/// over its contents.
pub struct DiskStorageCache {
    inner: Arc<CacheInner>,
}

/// Configures a [`DiskStorageCache`]; every collaborator except the storage
/// has a default
pub struct DiskStorageCacheBuilder {
    storage: Arc<dyn DiskStorage>,
    policy: Arc<dyn EvictionPolicy>,
    params: CacheParams,
    listener: Option<Arc<dyn CacheEventListener>>,
    error_logger: Arc<dyn CacheErrorLogger>,
    clock: Arc<dyn Clock>,
    disk_space: Option<Arc<dyn DiskSpaceProbe>>,
    index_populate_at_startup: bool,
    executor: Arc<dyn Executor>,
}

impl DiskStorageCacheBuilder {
    pub fn eviction_policy(mut self, policy: Arc<dyn EvictionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn params(mut self, params: CacheParams) -> Self {
        self.params = params;
        self
    }

    pub fn event_listener(mut self, listener: Arc<dyn CacheEventListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn error_logger(mut self, error_logger: Arc<dyn CacheErrorLogger>) -> Self {
        self.error_logger = error_logger;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Defaults to statvfs readings cached against the cache's clock
    pub fn disk_space_probe(mut self, disk_space: Arc<dyn DiskSpaceProbe>) -> Self {
        self.disk_space = Some(disk_space);
        self
    }

    /// Scan the directory in the background after construction and fill the
    /// index from it
    pub fn index_populate_at_startup(mut self, enabled: bool) -> Self {
        self.index_populate_at_startup = enabled;
        self
    }

    pub fn background_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn build(self) -> DiskStorageCache {
        let disk_space = self.disk_space.unwrap_or_else(|| {
            Arc::new(CachedDiskSpace::new(StatFsProbe, Arc::clone(&self.clock)))
        });
        let inner = Arc::new(CacheInner {
            storage: self.storage,
            policy: self.policy,
            params: self.params,
            listener: self.listener,
            error_logger: self.error_logger,
            clock: self.clock,
            disk_space,
            index_populate_at_startup: self.index_populate_at_startup,
            state: Mutex::new(CacheState {
                resource_index: HashSet::new(),
                stats: CacheStats::default(),
                size_limit: self.params.default_cache_size_limit,
                size_last_update_ms: None,
            }),
            index_ready: AtomicBool::new(false),
            index_latch: Mutex::new(!self.index_populate_at_startup),
            index_signal: Condvar::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        });

        if inner.index_populate_at_startup {
            let latch = IndexLatchRelease(Arc::clone(&inner));
            self.executor
                .execute(Box::new(move || latch.0.populate_index()));
        }

        info!(
            root = ?inner.storage.root(),
            default_limit = inner.params.default_cache_size_limit,
            low_space_limit = inner.params.low_disk_space_cache_size_limit,
            populate_index = inner.index_populate_at_startup,
            "Disk cache initialized"
        );
        DiskStorageCache { inner }
    }
}

/// Opens the index latch when the population task finishes, panics or is
/// dropped unrun, so `await_index` cannot wait forever
struct IndexLatchRelease(Arc<CacheInner>);

impl Drop for IndexLatchRelease {
    fn drop(&mut self) {
        self.0.release_index_latch();
    }
}

impl DiskStorageCache {
    pub fn builder(storage: Arc<dyn DiskStorage>) -> DiskStorageCacheBuilder {
        DiskStorageCacheBuilder {
            storage,
            policy: Arc::new(LruEvictionPolicy),
            params: CacheParams::default(),
            listener: None,
            error_logger: Arc::new(TracingErrorLogger),
            clock: Arc::new(SystemClock),
            disk_space: None,
            index_populate_at_startup: false,
            executor: Arc::new(ThreadExecutor),
        }
    }

    /// Subscribe this cache to low-disk-space broadcasts
    pub fn register(self: &Arc<Self>, registry: &DiskTrimmableRegistry) {
        let trimmable: Arc<dyn DiskTrimmable> = Arc::clone(self) as Arc<dyn DiskTrimmable>;
        registry.register(&trimmable);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.storage.is_enabled()
    }

    pub fn dump_info(&self) -> Result<DiskDumpInfo> {
        self.inner.storage.dump_info()
    }

    /// False while the startup scan is still running
    pub fn is_index_ready(&self) -> bool {
        self.inner.index_ready.load(Ordering::Acquire) || !self.inner.index_populate_at_startup
    }

    /// Block until the startup scan has finished; returns at once when
    /// startup population is off
    pub fn await_index(&self) {
        let mut ready = self.inner.index_latch.lock();
        while !*ready {
            self.inner.index_signal.wait(&mut ready);
        }
    }

    /// Look up `key`, marking the hit as recently used.
    ///
    /// Read errors are logged, reported and treated as a miss.
    pub fn get_resource(&self, key: &dyn CacheKey) -> Option<FileResource> {
        let inner = &self.inner;
        let mut event = CacheEvent::for_key(key.uri_string());
        let mut state = inner.state.lock();

        let mut last_tried = None;
        for resource_id in key.resource_ids() {
            event.resource_id = Some(resource_id.clone());
            match inner.storage.get_resource(&resource_id) {
                Ok(Some(resource)) => {
                    inner.hits.fetch_add(1, Ordering::Relaxed);
                    inner.notify(|l| l.on_hit(&event));
                    state.resource_index.insert(resource_id);
                    return Some(resource);
                }
                Ok(None) => last_tried = Some(resource_id),
                Err(err) => {
                    inner.error_logger.log_error(
                        CacheErrorCategory::GenericIo,
                        LOG_SOURCE,
                        "get_resource",
                        Some(&err),
                    );
                    event.error = Some(err.to_string());
                    inner.notify(|l| l.on_read_exception(&event));
                    return None;
                }
            }
        }

        inner.misses.fetch_add(1, Ordering::Relaxed);
        inner.notify(|l| l.on_miss(&event));
        if let Some(resource_id) = last_tried {
            state.resource_index.remove(&resource_id);
        }
        None
    }

    /// Existence check that also refreshes the timestamp; no payload read
    pub fn probe(&self, key: &dyn CacheKey) -> bool {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        for resource_id in key.resource_ids() {
            match inner.storage.touch(&resource_id) {
                Ok(true) => {
                    state.resource_index.insert(resource_id);
                    return true;
                }
                Ok(false) => {}
                Err(err) => {
                    inner.error_logger.log_error(
                        CacheErrorCategory::GenericIo,
                        LOG_SOURCE,
                        "probe",
                        Some(&err),
                    );
                    let mut event = CacheEvent::for_key(key.uri_string());
                    event.resource_id = Some(resource_id);
                    event.error = Some(err.to_string());
                    inner.notify(|l| l.on_read_exception(&event));
                    return false;
                }
            }
        }
        false
    }

    /// Store the payload produced by `callback` under `key`.
    ///
    /// Only the key's first resource id is written. On failure the error is
    /// returned after a write-exception event and the id is dropped from the
    /// index.
    pub fn insert(
        &self,
        key: &dyn CacheKey,
        callback: &mut dyn WriterCallback,
    ) -> Result<FileResource> {
        let inner = &self.inner;
        let mut event = CacheEvent::for_key(key.uri_string());
        inner.notify(|l| l.on_write_attempt(&event));

        let resource_id = match key.first_resource_id() {
            Some(resource_id) => resource_id,
            None => {
                let err = CacheError::EmptyKey;
                event.error = Some(err.to_string());
                inner.notify(|l| l.on_write_exception(&event));
                return Err(err);
            }
        };
        event.resource_id = Some(resource_id.clone());

        match self.write_resource(&resource_id, callback) {
            Ok((resource, cache_size)) => {
                event.item_size = resource.size().ok();
                event.cache_size = Some(cache_size);
                inner.notify(|l| l.on_write_success(&event));
                Ok(resource)
            }
            Err(err) => {
                inner.state.lock().resource_index.remove(&resource_id);
                error!(resource_id = %resource_id, error = %err, "Failed inserting a file into the cache");
                event.error = Some(err.to_string());
                inner.notify(|l| l.on_write_exception(&event));
                Err(err)
            }
        }
    }

    /// Returns the committed resource and the cache size right after commit
    fn write_resource(
        &self,
        resource_id: &str,
        callback: &mut dyn WriterCallback,
    ) -> Result<(FileResource, i64)> {
        let inner = &self.inner;
        // Shard directory setup races with purge pruning, so it stays locked
        let mut inserter = {
            let mut state = inner.state.lock();
            inner.maybe_evict_files_in_cache_dir(&mut state)?;
            inner.storage.insert(resource_id)?
        };

        let result = inserter
            .write_data(callback)
            .and_then(|()| inner.end_insert(inserter.as_mut(), resource_id));

        if !inserter.clean_up() {
            error!(resource_id = %resource_id, "Failed to delete temp file");
        }
        result
    }

    /// Delete every resource id of `key`. Best effort.
    pub fn remove(&self, key: &dyn CacheKey) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        for resource_id in key.resource_ids() {
            match inner.storage.remove(&resource_id) {
                Removal::Freed(bytes) => {
                    state.stats.increment(-(bytes as i64), -1);
                    let event = CacheEvent::eviction(
                        &resource_id,
                        EvictionReason::UserForced,
                        bytes,
                        state.stats.size,
                    );
                    inner.notify(|l| l.on_eviction(&event));
                }
                Removal::Missing => {}
                Removal::Failed => inner.error_logger.log_error(
                    CacheErrorCategory::DeleteFile,
                    LOG_SOURCE,
                    &format!("delete: {}", resource_id),
                    None,
                ),
            }
            state.resource_index.remove(&resource_id);
        }
    }

    /// Remove entries whose age is at least `max_age_ms`.
    ///
    /// Age is `max(1, |now - timestamp|)` so clock skew in either direction
    /// still ages entries. Returns the largest age among survivors, 0 if
    /// none survive.
    pub fn clear_old_entries(&self, max_age_ms: i64) -> i64 {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        let now = inner.clock.now_ms();

        let entries = match inner.storage.get_entries() {
            Ok(entries) => entries,
            Err(err) => {
                inner.error_logger.log_error(
                    CacheErrorCategory::Eviction,
                    LOG_SOURCE,
                    "clear_old_entries",
                    Some(&err),
                );
                return 0;
            }
        };

        let size_before = state.stats.size;
        let mut removed_count = 0i64;
        let mut removed_size = 0i64;
        let mut oldest_remaining_ms = 0i64;
        for entry in &entries {
            let age_ms = now
                .saturating_sub(entry.timestamp_ms())
                .saturating_abs()
                .max(1);
            if age_ms < max_age_ms {
                oldest_remaining_ms = oldest_remaining_ms.max(age_ms);
                continue;
            }
            let removal = inner.storage.remove_entry(entry);
            state.resource_index.remove(entry.id());
            if let Removal::Freed(bytes) = removal {
                if bytes > 0 {
                    removed_count += 1;
                    removed_size += bytes as i64;
                    let event = CacheEvent::eviction(
                        entry.id(),
                        EvictionReason::ContentStale,
                        bytes,
                        size_before - removed_size,
                    );
                    inner.notify(|l| l.on_eviction(&event));
                }
            }
        }

        inner.storage.purge_unexpected_resources();
        if removed_count > 0 {
            state.stats.increment(-removed_size, -removed_count);
            debug!(
                removed = removed_count,
                freed_bytes = removed_size,
                max_age_ms,
                "Cleared stale cache entries"
            );
        }
        oldest_remaining_ms
    }

    /// Shrink by `ratio` (0..1) of the current size, after a fresh scan
    pub fn trim_by(&self, ratio: f64) {
        let mut state = self.inner.state.lock();
        self.inner.trim_by(&mut state, ratio);
    }

    /// Shrink toward the configured minimum size
    pub fn trim_to_minimum(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        inner.maybe_update_file_cache_size(&mut state);

        let cache_size = state.stats.size;
        let minimum = inner.params.cache_size_limit_minimum;
        if minimum <= 0 || cache_size <= 0 || cache_size < minimum {
            return;
        }
        let ratio = 1.0 - minimum as f64 / cache_size as f64;
        if ratio > TRIMMING_LOWER_BOUND {
            inner.trim_by(&mut state, ratio);
        }
    }

    pub fn trim_to_nothing(&self) {
        self.clear_all();
    }

    /// Delete everything. Stats become uninitialized until the next scan.
    pub fn clear_all(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        match inner.storage.clear_all() {
            Ok(()) => {
                inner.notify(|l| l.on_cleared());
                info!(root = ?inner.storage.root(), "Disk cache cleared");
            }
            Err(err) => inner.error_logger.log_error(
                CacheErrorCategory::Eviction,
                LOG_SOURCE,
                "clear_all",
                Some(&err),
            ),
        }
        state.resource_index.clear();
        state.stats.reset();
    }

    /// Index-only lookup: fast, may report false for a resource on disk
    pub fn has_key_sync(&self, key: &dyn CacheKey) -> bool {
        let state = self.inner.state.lock();
        key.resource_ids()
            .iter()
            .any(|resource_id| state.resource_index.contains(resource_id))
    }

    /// Index lookup with a disk fallback that backfills the index
    pub fn has_key(&self, key: &dyn CacheKey) -> bool {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        let resource_ids = key.resource_ids();
        if resource_ids
            .iter()
            .any(|resource_id| state.resource_index.contains(resource_id))
        {
            return true;
        }
        for resource_id in resource_ids {
            match inner.storage.contains(&resource_id) {
                Ok(true) => {
                    state.resource_index.insert(resource_id);
                    return true;
                }
                Ok(false) => {}
                Err(err) => {
                    inner.error_logger.log_error(
                        CacheErrorCategory::GenericIo,
                        LOG_SOURCE,
                        "has_key",
                        Some(&err),
                    );
                    return false;
                }
            }
        }
        false
    }

    /// Total bytes, or -1 before the first scan
    pub fn size(&self) -> i64 {
        self.inner.state.lock().stats.size
    }

    /// Entry count, or -1 before the first scan
    pub fn count(&self) -> i64 {
        self.inner.state.lock().stats.count
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        let stats = self.inner.state.lock().stats;
        CacheStatsSnapshot {
            initialized: stats.initialized,
            size: stats.size,
            count: stats.count,
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }
}

impl DiskTrimmable for DiskStorageCache {
    fn trim_to_minimum(&self) {
        DiskStorageCache::trim_to_minimum(self);
    }

    fn trim_to_nothing(&self) {
        DiskStorageCache::trim_to_nothing(self);
    }
}

impl CacheInner {
    fn notify(&self, f: impl FnOnce(&dyn CacheEventListener)) {
        if let Some(listener) = &self.listener {
            f(listener.as_ref());
        }
    }

    fn populate_index(&self) {
        {
            let mut state = self.state.lock();
            self.maybe_update_file_cache_size(&mut state);
        }
        self.index_ready.store(true, Ordering::Release);
        debug!(root = ?self.storage.root(), "Disk cache index populated");
    }

    fn release_index_latch(&self) {
        let mut ready = self.index_latch.lock();
        *ready = true;
        self.index_signal.notify_all();
    }

    fn end_insert(
        &self,
        inserter: &mut dyn Inserter,
        resource_id: &str,
    ) -> Result<(FileResource, i64)> {
        let mut state = self.state.lock();
        let resource = inserter.commit(self.clock.now_ms())?;
        let size = resource.size()?;
        state.resource_index.insert(resource_id.to_string());
        state.stats.increment(size as i64, 1);
        Ok((resource, state.stats.size))
    }

    /// Evict to 90% of the limit when over it; the margin keeps eviction
    /// from re-triggering on every insert at the boundary
    fn maybe_evict_files_in_cache_dir(&self, state: &mut CacheState) -> Result<()> {
        let calculated_now = self.maybe_update_file_cache_size(state);
        self.update_file_cache_size_limit(state);

        let mut cache_size = state.stats.size;
        // Never evict on an incrementally maintained size
        if cache_size > state.size_limit && !calculated_now {
            state.stats.reset();
            self.maybe_update_file_cache_size(state);
            cache_size = state.stats.size;
        }

        if cache_size > state.size_limit {
            let desired = state.size_limit * 9 / 10;
            self.evict_above_size(state, desired, EvictionReason::CacheFull)?;
        }
        Ok(())
    }

    /// Remove entries in eviction order until the size drops below `desired`
    fn evict_above_size(
        &self,
        state: &mut CacheState,
        desired: i64,
        reason: EvictionReason,
    ) -> Result<()> {
        let entries = match self.storage.get_entries() {
            Ok(entries) => entries,
            Err(err) => {
                self.error_logger.log_error(
                    CacheErrorCategory::Eviction,
                    LOG_SOURCE,
                    "evict_above_size",
                    Some(&err),
                );
                return Err(err);
            }
        };
        let entries = order_for_eviction(self.policy.as_ref(), entries, self.clock.now_ms());

        let size_before = state.stats.size;
        let delete_size = size_before - desired;
        let mut evicted = 0i64;
        let mut freed = 0i64;
        for entry in &entries {
            if freed > delete_size {
                break;
            }
            let removal = self.storage.remove_entry(entry);
            state.resource_index.remove(entry.id());
            if let Removal::Freed(bytes) = removal {
                if bytes > 0 {
                    evicted += 1;
                    freed += bytes as i64;
                    let mut event =
                        CacheEvent::eviction(entry.id(), reason, bytes, size_before - freed);
                    event.cache_limit = Some(desired);
                    self.notify(|l| l.on_eviction(&event));
                }
            }
        }

        state.stats.increment(-freed, -evicted);
        self.storage.purge_unexpected_resources();
        debug!(
            evicted,
            freed_bytes = freed,
            desired_size = desired,
            %reason,
            "Evicted cache entries"
        );
        Ok(())
    }

    fn trim_by(&self, state: &mut CacheState, ratio: f64) {
        // Trimming acts on a fresh scan, never on the running tally
        state.stats.reset();
        self.maybe_update_file_cache_size(state);
        if !state.stats.initialized {
            return;
        }
        let cache_size = state.stats.size;
        let target = cache_size - (ratio * cache_size as f64) as i64;
        let trimmed = self.evict_above_size(state, target, EvictionReason::CacheManagerTrimmed);
        if let Err(err) = trimmed {
            debug!(error = %err, "Trim aborted");
        }
    }

    /// Drop to the low-disk-space limit when free space cannot absorb growth
    /// up to the default limit
    fn update_file_cache_size_limit(&self, state: &mut CacheState) {
        let headroom = self.params.default_cache_size_limit - state.stats.size;
        state.size_limit = if self
            .disk_space
            .is_low_disk_space(self.storage.root(), headroom)
        {
            self.params.low_disk_space_cache_size_limit
        } else {
            self.params.default_cache_size_limit
        };
    }

    /// Rescan when stats are uninitialized or stale; true if a scan succeeded
    fn maybe_update_file_cache_size(&self, state: &mut CacheState) -> bool {
        let now = self.clock.now_ms();
        let stale = match state.size_last_update_ms {
            Some(last) => now - last > FILECACHE_SIZE_UPDATE_PERIOD_MS,
            None => true,
        };
        if !state.stats.initialized || stale {
            self.update_file_cache_size_and_index(state)
        } else {
            false
        }
    }

    fn update_file_cache_size_and_index(&self, state: &mut CacheState) -> bool {
        let now = self.clock.now_ms();
        let threshold = now + FUTURE_TIMESTAMP_THRESHOLD_MS;

        let entries = match self.storage.get_entries() {
            Ok(entries) => entries,
            Err(err) => {
                self.error_logger.log_error(
                    CacheErrorCategory::GenericIo,
                    LOG_SOURCE,
                    "calc_file_cache_size",
                    Some(&err),
                );
                return false;
            }
        };

        let mut size = 0i64;
        let mut count = 0i64;
        let mut future_count = 0usize;
        let mut future_size = 0i64;
        let mut max_time_delta = -1i64;
        let mut scanned_index = self
            .index_populate_at_startup
            .then(|| HashSet::with_capacity(entries.len()));

        for entry in &entries {
            count += 1;
            size += entry.size() as i64;
            if entry.timestamp_ms() > threshold {
                future_count += 1;
                future_size += entry.size() as i64;
                max_time_delta = max_time_delta.max(entry.timestamp_ms() - now);
            } else if let Some(index) = scanned_index.as_mut() {
                index.insert(entry.id().to_string());
            }
        }

        // Reported only; the timestamps are left as they are
        if future_count > 0 {
            self.error_logger.log_error(
                CacheErrorCategory::ReadInvalidEntry,
                LOG_SOURCE,
                &format!(
                    "Future timestamp found in {} files, with a total size of {} bytes, and a maximum time delta of {}ms",
                    future_count, future_size, max_time_delta
                ),
                None,
            );
        }

        if let Some(index) = scanned_index {
            if index != state.resource_index {
                state.resource_index = index;
            }
        }
        if state.stats.count != count || state.stats.size != size || !state.stats.initialized {
            state.stats.set(size, count);
        }
        state.size_last_update_ms = Some(now);
        true
    }
}
