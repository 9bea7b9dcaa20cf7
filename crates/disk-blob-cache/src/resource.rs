//! Committed payload handles and the streaming write entry point

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A committed content file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResource {
    path: PathBuf,
}

impl FileResource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> io::Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    pub fn open(&self) -> io::Result<File> {
        File::open(&self.path)
    }
}

/// Streams a payload into the cache; invoked once per insert
pub trait WriterCallback {
    fn write(&mut self, out: &mut dyn Write) -> io::Result<()>;
}

impl<F> WriterCallback for F
where
    F: FnMut(&mut dyn Write) -> io::Result<()>,
{
    fn write(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self(out)
    }
}

pub struct WriterCallbacks;

impl WriterCallbacks {
    /// Callback that writes a fixed buffer
    pub fn from_bytes(data: &[u8]) -> impl WriterCallback + '_ {
        move |out: &mut dyn Write| out.write_all(data)
    }
}
