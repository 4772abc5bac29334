//! Whole-file virtual filesystem abstraction.
//!
//! The [`FileSystem`] trait is the small set of primitives a mirror needs
//! from a backing store: directories, whole-file reads and writes, recursive
//! removal, listing and stat. [`mem_fs::FileSystem`] is the in-memory
//! implementation.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod mem_fs;

pub type Result<T> = std::result::Result<T, FsError>;

/// Options for [`FileSystem::remove`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Remove directories together with everything below them.
    pub recursive: bool,
    /// Treat a missing entry as already removed.
    pub force: bool,
}

impl RemoveOptions {
    /// `rm -rf` semantics.
    pub const fn recursive_force() -> Self {
        Self {
            recursive: true,
            force: true,
        }
    }
}

pub trait FileSystem: fmt::Debug {
    /// Create a single directory. The parent must exist.
    fn create_dir(&self, path: &Path) -> Result<()>;

    /// Create the file at `path` if needed and replace its whole content.
    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Read the whole content of the file at `path`.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    fn remove(&self, path: &Path, options: RemoveOptions) -> Result<()>;

    fn read_dir(&self, path: &Path) -> Result<ReadDir>;

    fn metadata(&self, path: &Path) -> Result<Metadata>;

    fn remove_file(&self, path: &Path) -> Result<()> {
        if !self.metadata(path)?.is_file() {
            return Err(FsError::NotAFile);
        }
        self.remove(path, RemoveOptions::default())
    }

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> Result<()> {
        if !self.metadata(path)?.is_dir() {
            return Err(FsError::BaseNotDirectory);
        }
        self.remove(path, RemoveOptions::default())
    }
}

impl<T> FileSystem for std::sync::Arc<T>
where
    T: FileSystem + ?Sized,
{
    fn create_dir(&self, path: &Path) -> Result<()> {
        (**self).create_dir(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        (**self).write_file(path, contents)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        (**self).read_file(path)
    }

    fn remove(&self, path: &Path, options: RemoveOptions) -> Result<()> {
        (**self).remove(path, options)
    }

    fn read_dir(&self, path: &Path) -> Result<ReadDir> {
        (**self).read_dir(path)
    }

    fn metadata(&self, path: &Path) -> Result<Metadata> {
        (**self).metadata(path)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileType {
    pub dir: bool,
    pub file: bool,
}

impl FileType {
    pub fn is_dir(&self) -> bool {
        self.dir
    }

    pub fn is_file(&self) -> bool {
        self.file
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub ft: FileType,
    pub len: u64,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.ft.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.ft.is_file()
    }

    pub fn file_type(&self) -> FileType {
        self.ft
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.len
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub metadata: Metadata,
}

impl DirEntry {
    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }

    /// The last component of the entry's path.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn file_type(&self) -> FileType {
        self.metadata.ft
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadDir {
    pub(crate) data: Vec<DirEntry>,
    index: usize,
}

impl ReadDir {
    pub fn new(data: Vec<DirEntry>) -> Self {
        Self { data, index: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Iterator for ReadDir {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        let entry = self.data.get(self.index).cloned()?;
        self.index += 1;
        Some(entry)
    }
}

/// Error type for external users
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum FsError {
    /// A parent component of the path was not a directory
    #[error("not a directory")]
    BaseNotDirectory,
    /// Expected a file but found not a file
    #[error("not a file")]
    NotAFile,
    /// File exists
    #[error("file exists")]
    AlreadyExists,
    /// The provided path or data is invalid
    #[error("invalid input")]
    InvalidInput,
    /// The requested file or directory could not be found
    #[error("entry not found")]
    EntryNotFound,
    /// The directory still has children
    #[error("directory not empty")]
    DirectoryNotEmpty,
    /// Something failed when doing IO. These errors can generally not be handled.
    #[error("io error")]
    IOError,
    /// The internal lock was poisoned
    #[error("lock error")]
    Lock,
    /// Some other unhandled error. If you see this, it's probably a bug.
    #[error("unknown error found")]
    UnknownError,
}

impl From<io::Error> for FsError {
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists,
            io::ErrorKind::InvalidInput => FsError::InvalidInput,
            io::ErrorKind::NotFound => FsError::EntryNotFound,
            io::ErrorKind::Other => FsError::IOError,
            _ => FsError::UnknownError,
        }
    }
}

impl From<FsError> for io::Error {
    fn from(fs_error: FsError) -> Self {
        let kind = match fs_error {
            FsError::AlreadyExists => io::ErrorKind::AlreadyExists,
            FsError::InvalidInput | FsError::BaseNotDirectory | FsError::NotAFile => {
                io::ErrorKind::InvalidInput
            }
            FsError::EntryNotFound => io::ErrorKind::NotFound,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, fs_error)
    }
}
