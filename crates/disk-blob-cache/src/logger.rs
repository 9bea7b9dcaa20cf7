//! Structured sink for internal cache failures

use std::fmt;
use tracing::{error, warn};

/// Operation and failure kind attached to every logged cache error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheErrorCategory {
    ReadInvalidEntry,
    WriteCreateDir,
    WriteCreateTempFile,
    WriteUpdateFileNotFound,
    WriteRenameTempFileNotFound,
    WriteRenameTempFileParentNotFound,
    WriteRenameOther,
    WriteCallbackError,
    DeleteFile,
    Eviction,
    GenericIo,
    Other,
}

impl fmt::Display for CacheErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheErrorCategory::ReadInvalidEntry => "read_invalid_entry",
            CacheErrorCategory::WriteCreateDir => "write_create_dir",
            CacheErrorCategory::WriteCreateTempFile => "write_create_tempfile",
            CacheErrorCategory::WriteUpdateFileNotFound => "write_update_file_not_found",
            CacheErrorCategory::WriteRenameTempFileNotFound => "write_rename_file_tempfile_not_found",
            CacheErrorCategory::WriteRenameTempFileParentNotFound => {
                "write_rename_file_tempfile_parent_not_found"
            }
            CacheErrorCategory::WriteRenameOther => "write_rename_file_other",
            CacheErrorCategory::WriteCallbackError => "write_callback_error",
            CacheErrorCategory::DeleteFile => "delete_file",
            CacheErrorCategory::Eviction => "eviction",
            CacheErrorCategory::GenericIo => "generic_io",
            CacheErrorCategory::Other => "other",
        };
        f.write_str(name)
    }
}

/// Receives internal failures that the cache recovers from or reports upward
pub trait CacheErrorLogger: Send + Sync {
    fn log_error(
        &self,
        category: CacheErrorCategory,
        source: &'static str,
        message: &str,
        err: Option<&(dyn std::error::Error + 'static)>,
    );
}

/// Default logger: forwards every failure to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorLogger;

impl CacheErrorLogger for TracingErrorLogger {
    fn log_error(
        &self,
        category: CacheErrorCategory,
        source: &'static str,
        message: &str,
        err: Option<&(dyn std::error::Error + 'static)>,
    ) {
        match (category, err) {
            // Future timestamps are a data-quality signal, not a failure
            (CacheErrorCategory::ReadInvalidEntry, None) => {
                warn!(%category, source, "{}", message)
            }
            (_, Some(err)) => error!(%category, source, error = %err, "{}", message),
            (_, None) => error!(%category, source, "{}", message),
        }
    }
}
