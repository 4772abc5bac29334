//! The live mirror: a plain tree kept in lock-step with a backing store.

mod builder;
pub(crate) mod cache;
mod dir;

pub use builder::{MirrorBuilder, MirrorOptions};
pub use dir::{MirrorDir, MirrorEntry};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use virtual_fs::{FileSystem, RemoveOptions};

use self::cache::{DirHandle, NodeCache};
use crate::export::export_tree;
use crate::{FsDir, FsNode, MirrorError, NodeKind};

/// A plain tree mirrored onto a [`FileSystem`].
///
/// ```
/// use wasmfs_mirror::{FsDir, FsMirror, FsNode};
///
/// let mirror = FsMirror::new(FsDir::from([
///     ("file.txt".to_owned(), FsNode::from("Hello")),
///     ("folder1".to_owned(), FsNode::directory([("file.txt", "Hello2")])),
/// ]))
/// .unwrap();
///
/// let folder = mirror.root().get_dir("folder1").unwrap().unwrap();
/// let file = folder.get("file.txt").unwrap().unwrap();
/// assert_eq!(file.as_text(), Some("Hello2"));
/// ```
#[derive(Debug, Clone)]
pub struct FsMirror {
    root: MirrorDir,
    fs: Arc<dyn FileSystem + Send + Sync>,
    options: MirrorOptions,
}

impl FsMirror {
    /// Mirror `tree` onto a fresh in-memory filesystem mounted at `/`.
    pub fn new(tree: FsDir) -> Result<Self, MirrorError> {
        Self::builder().with_tree(tree).build()
    }

    pub fn builder() -> MirrorBuilder {
        MirrorBuilder::default()
    }

    /// The handle of the mirror root.
    pub fn root(&self) -> MirrorDir {
        self.root.clone()
    }

    /// The raw backing store, for diagnostics. Writing to it directly makes
    /// the store drift away from the mirror.
    pub fn filesystem(&self) -> &Arc<dyn FileSystem + Send + Sync> {
        &self.fs
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    /// Export the backing store below the mount point.
    pub fn snapshot(&self) -> Result<FsDir, MirrorError> {
        export_tree(
            self.fs.as_ref(),
            &self.options.mount_point,
            &self.options.export_options(),
        )
    }

    /// Number of directory handles currently materialized, root included.
    pub fn materialized_handles(&self) -> Result<usize, MirrorError> {
        let inner = self.root.shared().read().map_err(|_| MirrorError::Lock)?;
        Ok(inner.cache.len())
    }
}

/// State shared by every handle of one mirror.
#[derive(Debug)]
pub(crate) struct MirrorInner {
    tree: FsDir,
    cache: NodeCache,
    fs: Arc<dyn FileSystem + Send + Sync>,
    mount_point: PathBuf,
}

impl MirrorInner {
    pub(crate) fn store_path(&self, rel: &Path) -> PathBuf {
        if rel.as_os_str().is_empty() {
            self.mount_point.clone()
        } else {
            self.mount_point.join(rel)
        }
    }

    pub(crate) fn detached(&self, rel: &Path) -> MirrorError {
        MirrorError::Detached {
            path: self.store_path(rel),
        }
    }

    fn dir_at(&self, rel: &Path) -> Option<&FsDir> {
        let mut dir = &self.tree;
        for component in rel.components() {
            let name = component.as_os_str().to_str()?;
            dir = dir.get(name)?.as_dir()?;
        }
        Some(dir)
    }

    pub(crate) fn dir_at_mut(&mut self, rel: &Path) -> Option<&mut FsDir> {
        let mut dir = &mut self.tree;
        for component in rel.components() {
            let name = component.as_os_str().to_str()?;
            dir = dir.get_mut(name)?.as_dir_mut()?;
        }
        Some(dir)
    }

    /// The directory behind `handle`, unless the handle was detached.
    pub(crate) fn live_dir(&self, handle: &DirHandle) -> Result<&FsDir, MirrorError> {
        if handle.is_detached() {
            return Err(self.detached(&handle.rel));
        }
        self.dir_at(&handle.rel).ok_or_else(|| self.detached(&handle.rel))
    }

    /// Bring the backing store entry at `rel` from `existing` to `value`.
    ///
    /// Directory values get a handle each, so the subtree they describe
    /// resolves to live handles right away.
    pub(crate) fn replay(
        &mut self,
        rel: &Path,
        existing: Option<NodeKind>,
        value: &FsNode,
    ) -> Result<(), MirrorError> {
        let path = self.store_path(rel);

        match (existing, value.kind()) {
            (Some(NodeKind::Directory), _) => {
                // Evict first: the new value is committed even when the store fails.
                let evicted = self.cache.evict(rel);
                debug!(path = %path.display(), evicted, "dropped replaced directory");
                self.fs
                    .remove(&path, RemoveOptions::recursive_force())
                    .map_err(MirrorError::store(&path))?;
            }
            (Some(NodeKind::File), NodeKind::Directory) => {
                self.fs
                    .remove(&path, RemoveOptions::recursive_force())
                    .map_err(MirrorError::store(&path))?;
            }
            _ => {}
        }

        match value {
            FsNode::Text(_) | FsNode::Binary(_) => {
                let contents = value.contents().unwrap_or_default();
                self.fs
                    .write_file(&path, contents)
                    .map_err(MirrorError::store(&path))
            }
            FsNode::Directory(children) => {
                self.fs
                    .create_dir(&path)
                    .map_err(MirrorError::store(&path))?;
                self.cache.ensure(rel);

                for (name, child) in children {
                    self.replay(&rel.join(name), None, child)?;
                }
                Ok(())
            }
        }
    }
}
