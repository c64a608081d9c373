//! Virtual file system over in-memory assets
//!
//! Provides the minimal file capabilities an HTTP file server needs:
//! open by path, read/seek the contents, and stat. There is no directory
//! concept; listing always fails.

mod memory;
pub mod path;

pub use memory::MemoryFs;

use chrono::{DateTime, Utc};
use hyper::body::Bytes;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// Permission bits reported for every served file
pub const FILE_MODE: u32 = 0o644;

/// File system errors
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("not found")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
}

/// Path-keyed file lookup
pub trait FileSystem: Send + Sync {
    fn open(&self, path: &str) -> Result<ServedFile, FsError>;
}

/// Metadata for a served file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Base name of the virtual path
    pub name: String,
    pub size: u64,
    pub mode: u32,
    /// Unix epoch means "unknown"
    pub modified: DateTime<Utc>,
    pub is_dir: bool,
}

/// Read-only view over in-memory file contents
///
/// Lives for one response. Reading and seeking operate on a shared handle
/// to the underlying bytes, nothing is copied on open.
#[derive(Debug)]
pub struct ServedFile {
    reader: Cursor<Bytes>,
    name: String,
}

impl ServedFile {
    pub fn new(name: impl Into<String>, data: Bytes) -> Self {
        Self {
            reader: Cursor::new(data),
            name: name.into(),
        }
    }

    /// Full virtual path of the file
    pub fn path(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.reader.get_ref().len() as u64
    }

    /// Whole contents, independent of the current read position
    pub fn contents(&self) -> Bytes {
        self.reader.get_ref().clone()
    }

    pub fn stat(&self) -> FileInfo {
        FileInfo {
            name: path::base(&self.name).to_string(),
            size: self.size(),
            mode: FILE_MODE,
            modified: modified_time(&self.name),
            is_dir: false,
        }
    }

    pub fn read_dir(&self) -> Result<Vec<FileInfo>, FsError> {
        Err(FsError::NotADirectory)
    }

    /// Read `len` bytes starting at `offset`
    pub fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Bytes> {
        self.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0; len];
        self.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

impl Read for ServedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for ServedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

/// Files under a `static` segment are content-hashed by the UI build and
/// never change, so they report the epoch. Everything else reports "now".
fn modified_time(name: &str) -> DateTime<Utc> {
    if name.contains("/static/") {
        DateTime::<Utc>::UNIX_EPOCH
    } else {
        Utc::now()
    }
}
