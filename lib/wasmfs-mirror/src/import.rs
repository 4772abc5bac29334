//! Materialize a plain tree into a [`FileSystem`].

use std::path::Path;

use tracing::trace;
use virtual_fs::{FileSystem, FsError};

use crate::{FsDir, FsNode, MirrorError};

/// Write `tree` below `base`, depth-first.
///
/// Directories get a `create_dir` before their children are written, files
/// get exactly one `write_file`. `base` and its ancestors are created when
/// missing; an existing directory there is reused. Names are not validated.
pub fn import_tree(fs: &dyn FileSystem, base: &Path, tree: &FsDir) -> Result<(), MirrorError> {
    create_dir_all(fs, base)?;
    import_children(fs, base, tree)
}

fn import_children(fs: &dyn FileSystem, parent: &Path, tree: &FsDir) -> Result<(), MirrorError> {
    for (name, node) in tree {
        let path = parent.join(name);
        match node {
            FsNode::Directory(children) => {
                trace!(path = %path.display(), "import: create_dir");
                fs.create_dir(&path).map_err(MirrorError::store(&path))?;
                import_children(fs, &path, children)?;
            }
            FsNode::Text(_) | FsNode::Binary(_) => {
                let contents = node.contents().unwrap_or_default();
                trace!(path = %path.display(), len = contents.len(), "import: write_file");
                fs.write_file(&path, contents)
                    .map_err(MirrorError::store(&path))?;
            }
        }
    }
    Ok(())
}

/// Create `path` and every missing ancestor.
pub(crate) fn create_dir_all(fs: &dyn FileSystem, path: &Path) -> Result<(), MirrorError> {
    match fs.metadata(path) {
        Ok(metadata) if metadata.is_dir() => return Ok(()),
        Ok(_) => {
            return Err(MirrorError::Store {
                path: path.to_path_buf(),
                source: FsError::BaseNotDirectory,
            });
        }
        Err(FsError::EntryNotFound) => {}
        Err(e) => return Err(MirrorError::store(path)(e)),
    }

    if let Some(parent) = path.parent() {
        create_dir_all(fs, parent)?;
    }

    trace!(path = %path.display(), "import: create_dir");
    fs.create_dir(path).map_err(MirrorError::store(path))
}
