//! Per-path registry of directory handles.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared identity of a [`super::MirrorDir`].
///
/// `rel` is relative to the mirror root; the root itself is the empty path.
#[derive(Debug)]
pub(crate) struct DirHandle {
    pub(crate) rel: PathBuf,
    detached: AtomicBool,
}

impl DirHandle {
    fn new(rel: PathBuf) -> Self {
        Self {
            rel,
            detached: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub(crate) struct NodeCache {
    handles: HashMap<PathBuf, Arc<DirHandle>>,
}

impl NodeCache {
    /// The handle for `rel`, created on first use.
    pub(crate) fn ensure(&mut self, rel: &Path) -> Arc<DirHandle> {
        self.handles
            .entry(rel.to_path_buf())
            .or_insert_with(|| Arc::new(DirHandle::new(rel.to_path_buf())))
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, rel: &Path) -> Option<&Arc<DirHandle>> {
        self.handles.get(rel)
    }

    /// Drop the handles for `rel` and everything below it. Handles still
    /// held by callers are marked detached. Returns how many were evicted.
    pub(crate) fn evict(&mut self, rel: &Path) -> usize {
        let before = self.handles.len();
        self.handles.retain(|path, handle| {
            let stale = path.starts_with(rel);
            if stale {
                handle.detach();
            }
            !stale
        });
        before - self.handles.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }
}
