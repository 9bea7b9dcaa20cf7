//! Error types for the disk blob cache

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Why a temp-to-content rename failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameFailure {
    /// The shard directory of the destination is gone
    ParentDirMissing,
    /// The temp file disappeared before it could be committed
    TempFileMissing,
    Other,
}

impl fmt::Display for RenameFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenameFailure::ParentDirMissing => write!(f, "parent directory not found"),
            RenameFailure::TempFileMissing => write!(f, "temp file not found"),
            RenameFailure::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug)]
pub enum CacheError {
    CreateDirectory {
        path: PathBuf,
        source: io::Error,
    },
    CreateTempFile {
        path: PathBuf,
        source: io::Error,
    },
    IncompleteWrite {
        expected: u64,
        actual: u64,
    },
    Rename {
        failure: RenameFailure,
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    Delete {
        path: PathBuf,
        source: io::Error,
    },
    Io(Box<io::Error>),
    EmptyKey,
}

impl CacheError {
    /// Category reported to the error logger for this failure
    pub fn category(&self) -> crate::logger::CacheErrorCategory {
        use crate::logger::CacheErrorCategory;
        match self {
            CacheError::CreateDirectory { .. } => CacheErrorCategory::WriteCreateDir,
            CacheError::CreateTempFile { .. } => CacheErrorCategory::WriteCreateTempFile,
            CacheError::IncompleteWrite { .. } => CacheErrorCategory::WriteCallbackError,
            CacheError::Rename { failure, .. } => match failure {
                RenameFailure::ParentDirMissing => {
                    CacheErrorCategory::WriteRenameTempFileParentNotFound
                }
                RenameFailure::TempFileMissing => CacheErrorCategory::WriteRenameTempFileNotFound,
                RenameFailure::Other => CacheErrorCategory::WriteRenameOther,
            },
            CacheError::Delete { .. } => CacheErrorCategory::DeleteFile,
            CacheError::Io(_) => CacheErrorCategory::GenericIo,
            CacheError::EmptyKey => CacheErrorCategory::Other,
        }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::CreateDirectory { path, source } => {
                write!(f, "Failed to create directory {:?}: {}", path, source)
            }
            CacheError::CreateTempFile { path, source } => {
                write!(f, "Failed to create temp file in {:?}: {}", path, source)
            }
            CacheError::IncompleteWrite { expected, actual } => write!(
                f,
                "File was not written completely. Expected: {}, found: {}",
                expected, actual
            ),
            CacheError::Rename {
                failure,
                from,
                to,
                source,
            } => write!(
                f,
                "Unknown error renaming {:?} to {:?} ({}): {}",
                from, to, failure, source
            ),
            CacheError::Delete { path, source } => {
                write!(f, "Failed to delete {:?}: {}", path, source)
            }
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::EmptyKey => write!(f, "Cache key has no resource ids"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::CreateDirectory { source, .. }
            | CacheError::CreateTempFile { source, .. }
            | CacheError::Rename { source, .. }
            | CacheError::Delete { source, .. } => Some(source),
            CacheError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for CacheError {
    fn from(err: io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<walkdir::Error> for CacheError {
    fn from(err: walkdir::Error) -> Self {
        CacheError::Io(Box::new(err.into()))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::CacheErrorCategory;
    use std::error::Error;

    #[test]
    fn test_incomplete_write_display() {
        let err = CacheError::IncompleteWrite {
            expected: 10,
            actual: 7,
        };
        assert_eq!(
            format!("{}", err),
            "File was not written completely. Expected: 10, found: 7"
        );
    }

    #[test]
    fn test_rename_category_follows_failure_kind() {
        let make = |failure| CacheError::Rename {
            failure,
            from: PathBuf::from("/a.tmp"),
            to: PathBuf::from("/a.cnt"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(
            make(RenameFailure::ParentDirMissing).category(),
            CacheErrorCategory::WriteRenameTempFileParentNotFound
        );
        assert_eq!(
            make(RenameFailure::TempFileMissing).category(),
            CacheErrorCategory::WriteRenameTempFileNotFound
        );
        assert_eq!(
            make(RenameFailure::Other).category(),
            CacheErrorCategory::WriteRenameOther
        );
    }

    #[test]
    fn test_io_error_has_source() {
        let err: CacheError = io::Error::new(io::ErrorKind::Other, "disk on fire").into();
        assert!(err.source().is_some());
        assert!(format!("{}", err).contains("disk on fire"));
        assert_eq!(err.category(), CacheErrorCategory::GenericIo);
    }

    #[test]
    fn test_error_is_debug() {
        let err = CacheError::EmptyKey;
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("EmptyKey"));
    }
}
