use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;
use virtual_fs::RemoveOptions;

use super::cache::DirHandle;
use super::MirrorInner;
use crate::tree::{validate_name, validate_tree};
use crate::{FsDir, FsNode, MirrorError, NodeKind};

/// What [`MirrorDir::get`] found under a key.
///
/// Files are handed out by value, directories as a handle into the mirror.
#[derive(Debug, Clone)]
pub enum MirrorEntry {
    Text(String),
    Binary(Vec<u8>),
    Directory(MirrorDir),
}

impl MirrorEntry {
    pub fn kind(&self) -> NodeKind {
        match self {
            MirrorEntry::Text(_) | MirrorEntry::Binary(_) => NodeKind::File,
            MirrorEntry::Directory(_) => NodeKind::Directory,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MirrorEntry::Text(text) => Some(text),
            _ => None,
        }
    }

    /// File content, whether it is held as text or as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            MirrorEntry::Text(text) => Some(text.as_bytes()),
            MirrorEntry::Binary(bytes) => Some(bytes),
            MirrorEntry::Directory(_) => None,
        }
    }

    pub fn into_dir(self) -> Option<MirrorDir> {
        match self {
            MirrorEntry::Directory(dir) => Some(dir),
            _ => None,
        }
    }
}

/// A live view of one directory of the mirror.
///
/// Reads are answered from the mirror's plain tree. Writes and removals are
/// replayed onto the backing store first and then committed to the plain
/// tree. Handles are shared: every `get` of the same directory returns a
/// clone of the same handle until that directory is removed or replaced, at
/// which point the handle is detached and all its operations fail with
/// [`MirrorError::Detached`].
#[derive(Clone)]
pub struct MirrorDir {
    shared: Arc<RwLock<MirrorInner>>,
    handle: Arc<DirHandle>,
}

impl MirrorDir {
    pub(crate) fn new(shared: Arc<RwLock<MirrorInner>>, handle: Arc<DirHandle>) -> Self {
        Self { shared, handle }
    }

    pub(crate) fn shared(&self) -> &Arc<RwLock<MirrorInner>> {
        &self.shared
    }

    /// Whether both values are the same handle.
    pub fn ptr_eq(this: &MirrorDir, other: &MirrorDir) -> bool {
        Arc::ptr_eq(&this.handle, &other.handle)
    }

    pub fn is_detached(&self) -> bool {
        self.handle.is_detached()
    }

    /// Location of this directory relative to the mirror root.
    pub fn relative_path(&self) -> &Path {
        &self.handle.rel
    }

    /// Location of this directory in the backing store.
    pub fn path(&self) -> Result<PathBuf, MirrorError> {
        Ok(self.read()?.store_path(&self.handle.rel))
    }

    pub fn keys(&self) -> Result<Vec<String>, MirrorError> {
        Ok(self.read()?.live_dir(&self.handle)?.keys().cloned().collect())
    }

    pub fn len(&self) -> Result<usize, MirrorError> {
        Ok(self.read()?.live_dir(&self.handle)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, MirrorError> {
        Ok(self.len()? == 0)
    }

    pub fn contains_key(&self, key: &str) -> Result<bool, MirrorError> {
        Ok(self.read()?.live_dir(&self.handle)?.contains_key(key))
    }

    /// A copy of the plain tree below this directory.
    pub fn to_tree(&self) -> Result<FsDir, MirrorError> {
        Ok(self.read()?.live_dir(&self.handle)?.clone())
    }

    /// Look up `key`. Directories come back as handles, created on first
    /// access and cached from then on. Never touches the backing store.
    pub fn get(&self, key: &str) -> Result<Option<MirrorEntry>, MirrorError> {
        let mut inner = self.write()?;

        let file = match inner.live_dir(&self.handle)?.get(key) {
            None => return Ok(None),
            Some(node) => node.contents().map(|_| node.clone()),
        };

        let entry = match file {
            Some(FsNode::Text(text)) => MirrorEntry::Text(text),
            Some(FsNode::Binary(bytes)) => MirrorEntry::Binary(bytes),
            _ => {
                let handle = inner.cache.ensure(&self.handle.rel.join(key));
                MirrorEntry::Directory(MirrorDir::new(self.shared.clone(), handle))
            }
        };

        Ok(Some(entry))
    }

    /// Shorthand for a `get` that only cares about directories.
    pub fn get_dir(&self, key: &str) -> Result<Option<MirrorDir>, MirrorError> {
        Ok(self.get(key)?.and_then(MirrorEntry::into_dir))
    }

    /// Store `value` under `key`, replacing whatever was there.
    ///
    /// A directory previously stored under `key` is removed from the backing
    /// store first, together with the handles below it. A directory value is
    /// created in the store and filled entry by entry.
    ///
    /// The mirror takes ownership of `value`; a copy kept by the caller is
    /// independent of the mirror from then on.
    ///
    /// When the backing store fails, the plain tree still records `value`
    /// and the error is returned: the store may then be missing part of it.
    pub fn insert(&self, key: &str, value: impl Into<FsNode>) -> Result<(), MirrorError> {
        let value = value.into();
        validate_name(key)?;
        if let FsNode::Directory(children) = &value {
            validate_tree(children)?;
        }

        let mut inner = self.write()?;
        let existing = inner.live_dir(&self.handle)?.get(key).map(FsNode::kind);
        let rel = self.handle.rel.join(key);

        debug!(
            path = %inner.store_path(&rel).display(),
            existing = ?existing,
            new = ?value.kind(),
            "mirror insert",
        );

        let synced = inner.replay(&rel, existing, &value);

        match inner.dir_at_mut(&self.handle.rel) {
            Some(dir) => {
                dir.insert(key.to_owned(), value);
            }
            None => return Err(inner.detached(&self.handle.rel)),
        }

        synced
    }

    /// Remove `key` from the backing store and from the plain tree.
    ///
    /// Removing a key that does not exist, or that can never exist because
    /// it is not a valid name, is not an error. Returns the removed value.
    pub fn remove(&self, key: &str) -> Result<Option<FsNode>, MirrorError> {
        let mut inner = self.write()?;
        inner.live_dir(&self.handle)?;

        if validate_name(key).is_err() {
            return Ok(None);
        }

        let rel = self.handle.rel.join(key);
        let path = inner.store_path(&rel);
        inner
            .fs
            .remove(&path, RemoveOptions::recursive_force())
            .map_err(MirrorError::store(&path))?;

        let evicted = inner.cache.evict(&rel);
        debug!(path = %path.display(), evicted, "mirror remove");

        Ok(inner
            .dir_at_mut(&self.handle.rel)
            .and_then(|dir| dir.remove(key)))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MirrorInner>, MirrorError> {
        self.shared.read().map_err(|_| MirrorError::Lock)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MirrorInner>, MirrorError> {
        self.shared.write().map_err(|_| MirrorError::Lock)
    }
}

impl fmt::Debug for MirrorDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorDir")
            .field("path", &self.handle.rel)
            .field("detached", &self.handle.is_detached())
            .finish()
    }
}
