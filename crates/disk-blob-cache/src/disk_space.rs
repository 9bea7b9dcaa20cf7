//! Free disk space probing for the dynamic size limit

use crate::clock::Clock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// How long a free-space reading is reused before the filesystem is asked again
pub const RESTAT_INTERVAL_MS: i64 = 2 * 60 * 1000;

pub trait DiskSpaceProbe: Send + Sync {
    /// Bytes available to this process on the filesystem holding `path`
    fn available_bytes(&self, path: &Path) -> Option<u64>;

    /// True when free space is below `threshold`, or cannot be determined
    fn is_low_disk_space(&self, path: &Path, threshold: i64) -> bool {
        match self.available_bytes(path) {
            Some(available) if available > 0 => {
                i64::try_from(available).map_or(false, |available| available < threshold)
            }
            _ => true,
        }
    }
}

/// Asks the OS (statvfs / GetDiskFreeSpaceEx)
#[derive(Debug, Default, Clone, Copy)]
pub struct StatFsProbe;

impl DiskSpaceProbe for StatFsProbe {
    fn available_bytes(&self, path: &Path) -> Option<u64> {
        match fs2::available_space(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(path = ?path, error = %e, "Could not read available disk space");
                None
            }
        }
    }
}

/// Reuses each path's reading from `probe` for [`RESTAT_INTERVAL_MS`]
pub struct CachedDiskSpace<P> {
    probe: P,
    clock: Arc<dyn Clock>,
    readings: Mutex<HashMap<PathBuf, (i64, Option<u64>)>>,
}

impl<P: DiskSpaceProbe> CachedDiskSpace<P> {
    pub fn new(probe: P, clock: Arc<dyn Clock>) -> Self {
        Self {
            probe,
            clock,
            readings: Mutex::new(HashMap::new()),
        }
    }
}

impl<P: DiskSpaceProbe> DiskSpaceProbe for CachedDiskSpace<P> {
    fn available_bytes(&self, path: &Path) -> Option<u64> {
        let now = self.clock.now_ms();
        let mut readings = self.readings.lock();
        if let Some(&(read_at, available)) = readings.get(path) {
            if now - read_at <= RESTAT_INTERVAL_MS && now >= read_at {
                return available;
            }
        }
        let available = self.probe.available_bytes(path);
        readings.insert(path.to_path_buf(), (now, available));
        available
    }
}

/// Reports a fixed amount of free space
#[derive(Debug, Clone, Copy)]
pub struct FixedDiskSpace(pub u64);

impl DiskSpaceProbe for FixedDiskSpace {
    fn available_bytes(&self, _path: &Path) -> Option<u64> {
        Some(self.0)
    }
}
