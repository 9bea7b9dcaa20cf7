//! Versioned, sharded file layout with temp-file-then-rename commits
//!
//! ```text
//! <root>/
//!   v2.ols100.<version>/
//!     <shard>/
//!       <resource id>.cnt
//!       <resource id>.<random>.tmp
//! ```

use super::file_tree::{self, NodeKind};
use super::{DiskStorage, Inserter, Removal};
use crate::clock::Clock;
use crate::error::{CacheError, RenameFailure, Result};
use crate::logger::{CacheErrorCategory, CacheErrorLogger};
use crate::resource::{FileResource, WriterCallback};
use crate::types::{file_time_to_ms, ms_to_file_time, DiskDumpInfo, DumpEntry, Entry};
use filetime::FileTime;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const CONTENT_FILE_EXTENSION: &str = ".cnt";
pub const TEMP_FILE_EXTENSION: &str = ".tmp";

/// Structural prefix of the version directory; bump on layout changes
const VERSION_PREFIX: &str = "v2";

/// Keeps per-directory file counts low on filesystems that choke on large
/// directories. Part of the persisted layout.
pub const SHARDING_BUCKET_COUNT: i32 = 100;

/// Temp files older than this are considered abandoned
pub const TEMP_FILE_LIFETIME_MS: i64 = 30 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileType {
    Content,
    Temp,
}

/// Parsed name of a file this storage owns
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileInfo {
    file_type: FileType,
    resource_id: String,
}

impl FileInfo {
    fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let pos = name.rfind('.').filter(|&pos| pos > 0)?;
        let file_type = match &name[pos..] {
            CONTENT_FILE_EXTENSION => FileType::Content,
            TEMP_FILE_EXTENSION => FileType::Temp,
            _ => return None,
        };
        let mut resource_id = &name[..pos];
        if file_type == FileType::Temp {
            // <id>.<random>.tmp
            let num_pos = resource_id.rfind('.').filter(|&pos| pos > 0)?;
            resource_id = &resource_id[..num_pos];
        }
        Some(Self {
            file_type,
            resource_id: resource_id.to_string(),
        })
    }
}

/// 31-polynomial string hash over UTF-16 code units.
///
/// Must stay stable across builds and platforms: shard placement is persisted.
pub fn shard_hash(resource_id: &str) -> i32 {
    resource_id
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

fn shard_for(resource_id: &str) -> u32 {
    (shard_hash(resource_id) % SHARDING_BUCKET_COUNT).unsigned_abs()
}

fn modified_ms(path: &Path) -> io::Result<i64> {
    let meta = fs::metadata(path)?;
    Ok(file_time_to_ms(FileTime::from_last_modification_time(&meta)))
}

fn set_modified_ms(path: &Path, timestamp_ms: i64) -> io::Result<()> {
    filetime::set_file_mtime(path, ms_to_file_time(timestamp_ms))
}

/// Default storage: one content file per resource, sharded by id hash
pub struct ShardedDiskStorage {
    root: PathBuf,
    version_dir: PathBuf,
    error_logger: Arc<dyn CacheErrorLogger>,
    clock: Arc<dyn Clock>,
}

impl ShardedDiskStorage {
    /// Open storage under `root` for payloads of format `version`.
    ///
    /// A root without the expected version directory holds an incompatible
    /// layout and is wiped.
    pub fn new(
        root: impl Into<PathBuf>,
        version: u32,
        error_logger: Arc<dyn CacheErrorLogger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let root = root.into();
        let version_dir = root.join(Self::version_directory_name(version));
        let storage = Self {
            root,
            version_dir,
            error_logger,
            clock,
        };
        storage.recreate_directory_if_version_changes();
        storage
    }

    pub fn version_directory_name(version: u32) -> String {
        format!("{}.ols{}.{}", VERSION_PREFIX, SHARDING_BUCKET_COUNT, version)
    }

    pub fn version_directory(&self) -> &Path {
        &self.version_dir
    }

    fn recreate_directory_if_version_changes(&self) {
        let recreate = if !self.root.exists() {
            true
        } else if !self.version_dir.exists() {
            info!(root = ?self.root, "Cache version changed, wiping stale contents");
            if let Err(e) = file_tree::delete_recursively(&self.root) {
                warn!(root = ?self.root, error = %e, "Failed to wipe stale cache directory");
            }
            true
        } else {
            false
        };

        if recreate {
            if let Err(source) = fs::create_dir_all(&self.version_dir) {
                // Not fatal: insert creates missing parents again
                let err = CacheError::CreateDirectory {
                    path: self.version_dir.clone(),
                    source,
                };
                self.error_logger.log_error(
                    CacheErrorCategory::WriteCreateDir,
                    "ShardedDiskStorage",
                    "version directory could not be created",
                    Some(&err),
                );
            }
        }
    }

    fn shard_directory(&self, resource_id: &str) -> PathBuf {
        self.version_dir.join(shard_for(resource_id).to_string())
    }

    /// Canonical content path for `resource_id`
    pub fn content_file_for(&self, resource_id: &str) -> PathBuf {
        self.shard_directory(resource_id)
            .join(format!("{}{}", resource_id, CONTENT_FILE_EXTENSION))
    }

    /// Parse `path` and confirm it sits in the shard its name hashes to
    fn shard_file_info(&self, path: &Path) -> Option<FileInfo> {
        let info = FileInfo::from_path(path)?;
        let expected = self.shard_directory(&info.resource_id);
        (path.parent() == Some(expected.as_path())).then_some(info)
    }

    fn is_expected_file(&self, path: &Path, now_ms: i64) -> bool {
        match self.shard_file_info(path) {
            None => false,
            Some(info) if info.file_type == FileType::Temp => modified_ms(path)
                .map(|mtime| mtime > now_ms - TEMP_FILE_LIFETIME_MS)
                .unwrap_or(false),
            Some(_) => true,
        }
    }

    fn query(&self, resource_id: &str, touch: bool) -> Result<bool> {
        let path = self.content_file_for(resource_id);
        match fs::metadata(&path) {
            Ok(_) => {
                if touch {
                    self.touch_path(&path);
                }
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn touch_path(&self, path: &Path) {
        if let Err(e) = set_modified_ms(path, self.clock.now_ms()) {
            warn!(path = ?path, error = %e, "Failed to touch cache file");
        }
    }

    fn do_remove(&self, path: &Path) -> Removal {
        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Removal::Missing,
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to stat cache file before delete");
                return Removal::Failed;
            }
        };
        match fs::remove_file(path) {
            Ok(()) => Removal::Freed(size),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Removal::Missing,
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to delete cache file");
                Removal::Failed
            }
        }
    }
}

impl DiskStorage for ShardedDiskStorage {
    /// False when the version directory is missing and cannot be created
    fn is_enabled(&self) -> bool {
        if self.version_dir.is_dir() {
            return true;
        }
        match fs::create_dir_all(&self.version_dir) {
            Ok(()) => true,
            Err(e) => {
                debug!(path = ?self.version_dir, error = %e, "Cache directory unavailable");
                false
            }
        }
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn insert(&self, resource_id: &str) -> Result<Box<dyn Inserter>> {
        let parent = self.shard_directory(resource_id);
        if !parent.exists() {
            if let Err(source) = fs::create_dir_all(&parent) {
                let err = CacheError::CreateDirectory {
                    path: parent,
                    source,
                };
                self.error_logger.log_error(
                    CacheErrorCategory::WriteCreateDir,
                    "ShardedDiskStorage",
                    "insert",
                    Some(&err),
                );
                return Err(err);
            }
        }

        let temp_path = tempfile::Builder::new()
            .prefix(&format!("{}.", resource_id))
            .suffix(TEMP_FILE_EXTENSION)
            .rand_bytes(10)
            .tempfile_in(&parent)
            .and_then(|file| file.into_temp_path().keep().map_err(io::Error::from));
        let temp_path = match temp_path {
            Ok(path) => path,
            Err(source) => {
                let err = CacheError::CreateTempFile {
                    path: parent,
                    source,
                };
                self.error_logger.log_error(
                    CacheErrorCategory::WriteCreateTempFile,
                    "ShardedDiskStorage",
                    "insert",
                    Some(&err),
                );
                return Err(err);
            }
        };

        Ok(Box::new(ShardedInserter {
            temp_path,
            content_path: self.content_file_for(resource_id),
            error_logger: Arc::clone(&self.error_logger),
        }))
    }

    fn get_resource(&self, resource_id: &str) -> Result<Option<FileResource>> {
        let path = self.content_file_for(resource_id);
        match fs::metadata(&path) {
            Ok(_) => {
                self.touch_path(&path);
                Ok(Some(FileResource::new(path)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, resource_id: &str) -> Result<bool> {
        self.query(resource_id, false)
    }

    fn touch(&self, resource_id: &str) -> Result<bool> {
        self.query(resource_id, true)
    }

    fn remove(&self, resource_id: &str) -> Removal {
        self.do_remove(&self.content_file_for(resource_id))
    }

    fn remove_entry(&self, entry: &Entry) -> Removal {
        self.do_remove(entry.resource().path())
    }

    fn get_entries(&self) -> Result<Vec<Entry>> {
        let entries = file_tree::walk(&self.version_dir)
            .filter_map(|node| match node {
                Ok(node) if node.kind == NodeKind::File => self
                    .shard_file_info(&node.path)
                    .filter(|info| info.file_type == FileType::Content)
                    .map(|info| Ok(Entry::new(info.resource_id, node.path))),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
            .collect::<io::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn purge_unexpected_resources(&self) {
        let now = self.clock.now_ms();
        // Directories that lost a child during this sweep
        let mut emptied: HashSet<PathBuf> = HashSet::new();
        let mut deleted = 0usize;

        for node in file_tree::walk(&self.root) {
            let node = match node {
                Ok(node) => node,
                Err(e) => {
                    warn!(root = ?self.root, error = %e, "Error walking cache directory");
                    continue;
                }
            };
            let inside = node.path.starts_with(&self.version_dir);
            let removed = match node.kind {
                NodeKind::File => {
                    if inside && self.is_expected_file(&node.path, now) {
                        continue;
                    }
                    fs::remove_file(&node.path)
                }
                NodeKind::Directory => {
                    if node.path == self.version_dir
                        || (inside && !emptied.contains(&node.path))
                    {
                        continue;
                    }
                    // Fails harmlessly if something is still inside
                    fs::remove_dir(&node.path)
                }
            };
            match removed {
                Ok(()) => {
                    deleted += 1;
                    if let Some(parent) = node.path.parent() {
                        emptied.insert(parent.to_path_buf());
                    }
                }
                Err(e) if node.kind == NodeKind::File => {
                    warn!(path = ?node.path, error = %e, "Failed to purge unexpected file");
                }
                Err(_) => {}
            }
        }

        if deleted > 0 {
            debug!(root = ?self.root, deleted, "Purged unexpected cache resources");
        }
    }

    fn clear_all(&self) -> Result<()> {
        file_tree::delete_contents(&self.root).map_err(|source| CacheError::Delete {
            path: self.root.clone(),
            source,
        })
    }

    fn dump_info(&self) -> Result<DiskDumpInfo> {
        let mut info = DiskDumpInfo::default();
        for entry in self.get_entries()? {
            let mut bytes = Vec::with_capacity(4);
            entry.resource().open()?.take(4).read_to_end(&mut bytes)?;
            let content_type = type_of_bytes(&bytes);
            let first_bits = if content_type == "undefined" && bytes.len() >= 4 {
                format!(
                    "0x{:02X} 0x{:02X} 0x{:02X} 0x{:02X}",
                    bytes[0], bytes[1], bytes[2], bytes[3]
                )
            } else {
                String::new()
            };
            *info.type_counts.entry(content_type.to_string()).or_insert(0) += 1;
            info.entries.push(DumpEntry {
                id: entry.id().to_string(),
                path: entry.resource().path().to_path_buf(),
                content_type: content_type.to_string(),
                size: entry.size(),
                first_bits,
            });
        }
        Ok(info)
    }
}

/// Sniff the image container from its magic bytes
fn type_of_bytes(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, ..] => "jpg",
        [0x89, 0x50, ..] => "png",
        [0x52, 0x49, ..] => "webp",
        [0x47, 0x49, ..] => "gif",
        _ => "undefined",
    }
}

/// Counts bytes on their way to the temp file
struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct ShardedInserter {
    temp_path: PathBuf,
    content_path: PathBuf,
    error_logger: Arc<dyn CacheErrorLogger>,
}

impl ShardedInserter {
    fn stream_to_temp(&self, callback: &mut dyn WriterCallback) -> Result<u64> {
        let file = File::create(&self.temp_path).map_err(|source| {
            let err = CacheError::from(source);
            self.error_logger.log_error(
                CacheErrorCategory::WriteUpdateFileNotFound,
                "ShardedInserter",
                "write_data",
                Some(&err),
            );
            err
        })?;

        let mut counting = CountingWriter {
            inner: BufWriter::new(file),
            count: 0,
        };
        callback.write(&mut counting)?;
        // Flush explicitly so a failing final write surfaces here
        counting.flush()?;
        let file = counting.inner.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(counting.count)
    }
}

impl Inserter for ShardedInserter {
    fn write_data(&mut self, callback: &mut dyn WriterCallback) -> Result<()> {
        let expected = self.stream_to_temp(callback)?;
        // Some filesystems close short without reporting an error
        let actual = fs::metadata(&self.temp_path)?.len();
        if actual != expected {
            return Err(CacheError::IncompleteWrite { expected, actual });
        }
        Ok(())
    }

    fn commit(&mut self, timestamp_ms: i64) -> Result<FileResource> {
        if let Err(source) = fs::rename(&self.temp_path, &self.content_path) {
            let parent_exists = self
                .content_path
                .parent()
                .map(Path::exists)
                .unwrap_or(false);
            let failure = if !parent_exists {
                RenameFailure::ParentDirMissing
            } else if !self.temp_path.exists() {
                RenameFailure::TempFileMissing
            } else {
                RenameFailure::Other
            };
            let err = CacheError::Rename {
                failure,
                from: self.temp_path.clone(),
                to: self.content_path.clone(),
                source,
            };
            self.error_logger
                .log_error(err.category(), "ShardedInserter", "commit", Some(&err));
            return Err(err);
        }

        // Order by commit time, not by how long the write took
        if let Err(e) = set_modified_ms(&self.content_path, timestamp_ms) {
            warn!(path = ?self.content_path, error = %e, "Failed to stamp committed file");
        }
        Ok(FileResource::new(self.content_path.clone()))
    }

    fn clean_up(&mut self) -> bool {
        match fs::remove_file(&self.temp_path) {
            Ok(()) => true,
            Err(e) => e.kind() == io::ErrorKind::NotFound,
        }
    }
}
