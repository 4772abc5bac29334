use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;
use virtual_fs::{mem_fs, FileSystem};

use super::cache::NodeCache;
use super::{FsMirror, MirrorDir, MirrorInner};
use crate::export::ExportOptions;
use crate::import::import_tree;
use crate::tree::validate_tree;
use crate::{FsDir, MirrorError};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "enable-serde", serde(default))]
pub struct MirrorOptions {
    /// Directory of the backing store that holds the mirror root.
    pub mount_point: PathBuf,
    /// Decode UTF-8 file contents to text in snapshots.
    pub decode_text: bool,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            mount_point: PathBuf::from("/"),
            decode_text: true,
        }
    }
}

impl MirrorOptions {
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            decode_text: self.decode_text,
        }
    }
}

/// Builder for [`FsMirror`].
#[derive(Debug, Default)]
pub struct MirrorBuilder {
    tree: FsDir,
    fs: Option<Arc<dyn FileSystem + Send + Sync>>,
    options: MirrorOptions,
}

impl MirrorBuilder {
    /// Initial content of the mirror. Defaults to an empty directory.
    pub fn with_tree(mut self, tree: FsDir) -> Self {
        self.tree = tree;
        self
    }

    /// Backing store to mirror onto. Defaults to a new
    /// [`mem_fs::FileSystem`].
    pub fn with_filesystem<F>(mut self, fs: F) -> Self
    where
        F: FileSystem + Send + Sync + 'static,
    {
        let fs: Arc<dyn FileSystem + Send + Sync> = Arc::new(fs);
        self.fs = Some(fs);
        self
    }

    pub fn with_mount_point(mut self, mount_point: impl Into<PathBuf>) -> Self {
        self.options.mount_point = mount_point.into();
        self
    }

    pub fn with_decode_text(mut self, decode_text: bool) -> Self {
        self.options.decode_text = decode_text;
        self
    }

    pub fn with_options(mut self, options: MirrorOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate the tree, import it into the backing store and hand out the
    /// mirror. Missing directories up to the mount point are created.
    pub fn build(self) -> Result<FsMirror, MirrorError> {
        let MirrorBuilder { tree, fs, options } = self;

        if !options.mount_point.is_absolute() {
            return Err(MirrorError::InvalidMountPoint(options.mount_point));
        }
        validate_tree(&tree)?;

        let fs: Arc<dyn FileSystem + Send + Sync> = match fs {
            Some(fs) => fs,
            None => Arc::new(mem_fs::FileSystem::default()),
        };
        import_tree(fs.as_ref(), &options.mount_point, &tree)?;

        debug!(
            mount_point = %options.mount_point.display(),
            entries = tree.len(),
            "mirror initialized",
        );

        let mut cache = NodeCache::default();
        let root = cache.ensure(Path::new(""));
        let inner = MirrorInner {
            tree,
            cache,
            fs: fs.clone(),
            mount_point: options.mount_point.clone(),
        };

        Ok(FsMirror {
            root: MirrorDir::new(Arc::new(RwLock::new(inner)), root),
            fs,
            options,
        })
    }
}
