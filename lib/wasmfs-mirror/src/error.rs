use std::path::{Path, PathBuf};

use thiserror::Error;
use virtual_fs::FsError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MirrorError {
    /// A primitive of the backing store failed. Nothing is retried or
    /// rolled back, so the in-memory tree may be ahead of the store.
    #[error("backing store operation on {} failed", .path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: FsError,
    },
    /// The entry name is empty, `.`, `..` or contains a path separator.
    #[error("invalid entry name {0:?}")]
    InvalidName(String),
    /// The mount point is not an absolute path.
    #[error("invalid mount point {}", .0.display())]
    InvalidMountPoint(PathBuf),
    /// The directory behind this handle was removed or replaced.
    #[error("directory handle for {} is detached", .path.display())]
    Detached { path: PathBuf },
    #[error("mirror lock poisoned")]
    Lock,
}

impl MirrorError {
    pub(crate) fn store(path: &Path) -> impl FnOnce(FsError) -> MirrorError + '_ {
        move |source| MirrorError::Store {
            path: path.to_path_buf(),
            source,
        }
    }
}
