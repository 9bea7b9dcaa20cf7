//! Disk storage: the layer below the cache that owns files and directories

pub mod file_tree;
mod sharded;

pub use sharded::{
    ShardedDiskStorage, CONTENT_FILE_EXTENSION, SHARDING_BUCKET_COUNT, TEMP_FILE_EXTENSION,
    TEMP_FILE_LIFETIME_MS,
};

use crate::error::Result;
use crate::resource::{FileResource, WriterCallback};
use crate::types::{DiskDumpInfo, Entry};
use std::path::Path;

/// Outcome of deleting one content file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Deleted; carries the bytes reclaimed
    Freed(u64),
    /// Nothing to delete
    Missing,
    /// The file exists but could not be deleted
    Failed,
}

impl Removal {
    /// Bytes reclaimed, `0` when absent, `-1` when the delete failed
    pub fn as_bytes(&self) -> i64 {
        match self {
            Removal::Freed(bytes) => *bytes as i64,
            Removal::Missing => 0,
            Removal::Failed => -1,
        }
    }
}

/// An in-progress write of one resource
pub trait Inserter: Send {
    /// Stream the payload into the temp file and verify its length on disk
    fn write_data(&mut self, callback: &mut dyn WriterCallback) -> Result<()>;

    /// Atomically publish the temp file and stamp it with `timestamp_ms`
    fn commit(&mut self, timestamp_ms: i64) -> Result<FileResource>;

    /// Best-effort removal of the temp file; true if it is gone
    fn clean_up(&mut self) -> bool;
}

pub trait DiskStorage: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Directory used to probe free space
    fn root(&self) -> &Path;

    fn insert(&self, resource_id: &str) -> Result<Box<dyn Inserter>>;

    /// Returns the content file and marks it recently used
    fn get_resource(&self, resource_id: &str) -> Result<Option<FileResource>>;

    fn contains(&self, resource_id: &str) -> Result<bool>;

    /// Like `contains`, but also refreshes the timestamp
    fn touch(&self, resource_id: &str) -> Result<bool>;

    fn remove(&self, resource_id: &str) -> Removal;

    fn remove_entry(&self, entry: &Entry) -> Removal;

    /// Immutable snapshot of every correctly sharded content file
    fn get_entries(&self) -> Result<Vec<Entry>>;

    /// Delete foreign files, misplaced content and abandoned temp files
    fn purge_unexpected_resources(&self);

    fn clear_all(&self) -> Result<()>;

    fn dump_info(&self) -> Result<DiskDumpInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_sentinels() {
        assert_eq!(Removal::Freed(12).as_bytes(), 12);
        assert_eq!(Removal::Missing.as_bytes(), 0);
        assert_eq!(Removal::Failed.as_bytes(), -1);
    }
}
