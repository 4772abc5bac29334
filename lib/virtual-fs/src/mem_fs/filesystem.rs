//! This module contains the [`FileSystem`] type itself.

use super::*;
use crate::{DirEntry, FsError, Metadata, ReadDir, RemoveOptions, Result};
use slab::Slab;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::trace;

/// The in-memory file system!
///
/// This `FileSystem` type can be cloned, it's a light copy of the
/// `FileSystemInner` (which is behind a `Arc` + `RwLock`).
#[derive(Clone, Default)]
pub struct FileSystem {
    pub(super) inner: Arc<RwLock<FileSystemInner>>,
}

impl FileSystem {
    /// Canonicalize a path without validating that it actually exists.
    pub fn canonicalize_unchecked(&self, path: &Path) -> Result<PathBuf> {
        let guard = self.inner.read().map_err(|_| FsError::Lock)?;
        guard.canonicalize_without_inode(path)
    }

    /// Number of nodes (files and directories, root included).
    pub fn node_count(&self) -> Result<usize> {
        let guard = self.inner.read().map_err(|_| FsError::Lock)?;
        Ok(guard.storage.len())
    }
}

impl crate::FileSystem for FileSystem {
    fn create_dir(&self, path: &Path) -> Result<()> {
        let mut fs = self.inner.write().map_err(|_| FsError::Lock)?;

        let path = fs.canonicalize_without_inode(path)?;
        let (inode_of_parent, name_of_directory) = fs.parent_and_name(&path)?;

        if fs
            .as_parent_get_position_and_inode(inode_of_parent, &name_of_directory)?
            .is_some()
        {
            return Err(FsError::AlreadyExists);
        }

        let inode_of_directory = fs.storage.vacant_entry().key();
        fs.storage.insert(Node::Directory(DirectoryNode {
            inode: inode_of_directory,
            name: name_of_directory,
            children: Vec::new(),
        }));
        fs.add_child_to_node(inode_of_parent, inode_of_directory)?;

        trace!(path = %path.display(), inode = inode_of_directory, "created directory");
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut fs = self.inner.write().map_err(|_| FsError::Lock)?;

        let path = fs.canonicalize_without_inode(path)?;
        let (inode_of_parent, name_of_file) = fs.parent_and_name(&path)?;

        match fs.as_parent_get_position_and_inode(inode_of_parent, &name_of_file)? {
            Some((_, inode_of_file)) => match fs.storage.get_mut(inode_of_file) {
                Some(Node::File(FileNode { data, .. })) => {
                    data.clear();
                    data.extend_from_slice(contents);
                }
                Some(Node::Directory(_)) => return Err(FsError::NotAFile),
                None => return Err(FsError::UnknownError),
            },
            None => {
                let inode_of_file = fs.storage.vacant_entry().key();
                fs.storage.insert(Node::File(FileNode {
                    inode: inode_of_file,
                    name: name_of_file,
                    data: contents.to_vec(),
                }));
                fs.add_child_to_node(inode_of_parent, inode_of_file)?;
            }
        }

        trace!(path = %path.display(), len = contents.len(), "wrote file");
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let fs = self.inner.read().map_err(|_| FsError::Lock)?;

        let path = fs.canonicalize_without_inode(path)?;
        match fs.storage.get(fs.inode_of(&path)?) {
            Some(Node::File(FileNode { data, .. })) => Ok(data.clone()),
            Some(Node::Directory(_)) => Err(FsError::NotAFile),
            None => Err(FsError::UnknownError),
        }
    }

    fn remove(&self, path: &Path, options: RemoveOptions) -> Result<()> {
        let mut fs = self.inner.write().map_err(|_| FsError::Lock)?;

        let path = fs.canonicalize_without_inode(path)?;
        let (inode_of_parent, name) = match fs.parent_and_name(&path) {
            Ok(found) => found,
            Err(FsError::EntryNotFound) if options.force => return Ok(()),
            Err(e) => return Err(e),
        };

        let (position, inode) =
            match fs.as_parent_get_position_and_inode(inode_of_parent, &name)? {
                Some(found) => found,
                None if options.force => return Ok(()),
                None => return Err(FsError::EntryNotFound),
            };

        if let Some(Node::Directory(DirectoryNode { children, .. })) = fs.storage.get(inode) {
            if !children.is_empty() && !options.recursive {
                return Err(FsError::DirectoryNotEmpty);
            }
        }

        let removed = fs.subtree_of(inode);
        for inode in removed.iter() {
            fs.storage.try_remove(*inode);
        }
        fs.remove_child_from_node(inode_of_parent, position)?;

        trace!(path = %path.display(), nodes = removed.len(), "removed");
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> Result<ReadDir> {
        let fs = self.inner.read().map_err(|_| FsError::Lock)?;

        let path = fs.canonicalize_without_inode(path)?;
        let children = match fs.storage.get(fs.inode_of(&path)?) {
            Some(Node::Directory(DirectoryNode { children, .. })) => children
                .iter()
                .filter_map(|inode| fs.storage.get(*inode))
                .map(|node| DirEntry {
                    path: path.join(node.name()),
                    metadata: node.metadata(),
                })
                .collect(),
            Some(Node::File(_)) => return Err(FsError::BaseNotDirectory),
            None => return Err(FsError::UnknownError),
        };

        Ok(ReadDir::new(children))
    }

    fn metadata(&self, path: &Path) -> Result<Metadata> {
        let fs = self.inner.read().map_err(|_| FsError::Lock)?;

        let path = fs.canonicalize_without_inode(path)?;
        fs.storage
            .get(fs.inode_of(&path)?)
            .map(Node::metadata)
            .ok_or(FsError::UnknownError)
    }
}

impl fmt::Debug for FileSystem {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.read() {
            Ok(fs) => fs.fmt(formatter),
            Err(_) => formatter.write_str("FileSystem { <poisoned> }"),
        }
    }
}

/// The core of the file system. It contains a collection of `Node`s,
/// indexed by their respective `Inode` in a slab.
pub(super) struct FileSystemInner {
    pub(super) storage: Slab<Node>,
}

impl FileSystemInner {
    /// Get the inode associated to a canonical path if it exists.
    fn inode_of(&self, path: &Path) -> Result<Inode> {
        let mut node = self.storage.get(ROOT_INODE).ok_or(FsError::UnknownError)?;
        let mut components = path.components();

        match components.next() {
            Some(Component::RootDir) => {}
            _ => return Err(FsError::InvalidInput),
        }

        for component in components {
            let name = component.as_os_str().to_str().ok_or(FsError::InvalidInput)?;
            node = match node {
                Node::Directory(DirectoryNode { children, .. }) => children
                    .iter()
                    .filter_map(|inode| self.storage.get(*inode))
                    .find(|node| node.name() == name)
                    .ok_or(FsError::EntryNotFound)?,
                Node::File(_) => return Err(FsError::BaseNotDirectory),
            };
        }

        Ok(node.inode())
    }

    /// Resolve the parent directory of a canonical path together with the
    /// name of the last component.
    fn parent_and_name(&self, path: &Path) -> Result<(Inode, String)> {
        let parent_of_path = path.parent().ok_or(FsError::BaseNotDirectory)?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(FsError::InvalidInput)?
            .to_owned();

        let inode_of_parent = self.inode_of(parent_of_path)?;
        match self.storage.get(inode_of_parent) {
            Some(Node::Directory(_)) => Ok((inode_of_parent, name)),
            _ => Err(FsError::BaseNotDirectory),
        }
    }

    /// From the inode of a parent node (so, a directory), returns the
    /// child index of `name_of` along with its inode, whatever the
    /// type of inode is (directory or file).
    fn as_parent_get_position_and_inode(
        &self,
        inode_of_parent: Inode,
        name_of: &str,
    ) -> Result<Option<(usize, Inode)>> {
        match self.storage.get(inode_of_parent) {
            Some(Node::Directory(DirectoryNode { children, .. })) => Ok(children
                .iter()
                .enumerate()
                .filter_map(|(nth, inode)| self.storage.get(*inode).map(|node| (nth, node)))
                .find(|(_, node)| node.name() == name_of)
                .map(|(nth, node)| (nth, node.inode()))),
            _ => Err(FsError::BaseNotDirectory),
        }
    }

    /// The inode itself followed by every inode below it.
    fn subtree_of(&self, inode: Inode) -> Vec<Inode> {
        let mut subtree = Vec::new();
        let mut remaining = vec![inode];

        while let Some(next) = remaining.pop() {
            match self.storage.get(next) {
                Some(Node::Directory(DirectoryNode { children, .. })) => {
                    remaining.extend(children.iter().copied());
                }
                Some(Node::File(_)) => {}
                None => continue,
            }
            subtree.push(next);
        }

        subtree
    }

    /// Add a child to a directory node represented by `inode`.
    fn add_child_to_node(&mut self, inode: Inode, new_child: Inode) -> Result<()> {
        match self.storage.get_mut(inode) {
            Some(Node::Directory(DirectoryNode { children, .. })) => {
                children.push(new_child);
                Ok(())
            }
            _ => Err(FsError::UnknownError),
        }
    }

    /// Remove the child at position `position` of a directory node
    /// represented by `inode`.
    fn remove_child_from_node(&mut self, inode: Inode, position: usize) -> Result<()> {
        match self.storage.get_mut(inode) {
            Some(Node::Directory(DirectoryNode { children, .. })) => {
                children.remove(position);
                Ok(())
            }
            _ => Err(FsError::UnknownError),
        }
    }

    /// Canonicalize a path, i.e. resolve it to an absolute form with all
    /// intermediate components normalized:
    ///
    /// * A path must starts with a root (`/`),
    /// * A path can contain `..` or `.` components,
    /// * A path must not contain a Windows prefix (`C:` or `\\server`).
    ///
    /// There is no guarantee that the path exists in the file system.
    fn canonicalize_without_inode(&self, path: &Path) -> Result<PathBuf> {
        let mut components = path.components();

        match components.next() {
            Some(Component::RootDir) => {}
            _ => return Err(FsError::InvalidInput),
        }

        let mut new_path = PathBuf::with_capacity(path.as_os_str().len());
        new_path.push("/");

        for component in components {
            match component {
                Component::RootDir => return Err(FsError::UnknownError),
                Component::CurDir => (),
                Component::ParentDir => {
                    if !new_path.pop() {
                        return Err(FsError::InvalidInput);
                    }
                }
                Component::Normal(name) => {
                    new_path.push(name);
                }
                Component::Prefix(_) => return Err(FsError::InvalidInput),
            }
        }

        Ok(new_path)
    }
}

impl fmt::Debug for FileSystemInner {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            formatter,
            "\n{inode:<8}    {ty:<4}    name",
            inode = "inode",
            ty = "type",
        )?;

        fn debug(
            nodes: Vec<&Node>,
            slf: &FileSystemInner,
            formatter: &mut fmt::Formatter<'_>,
            indentation: usize,
        ) -> fmt::Result {
            for node in nodes {
                writeln!(
                    formatter,
                    "{inode:<8}    {ty:<4}   {indentation_symbol:indentation_width$}{name}",
                    inode = node.inode(),
                    ty = match node {
                        Node::File { .. } => "file",
                        Node::Directory { .. } => "dir",
                    },
                    name = node.name(),
                    indentation_symbol = " ",
                    indentation_width = indentation * 2 + 1,
                )?;

                if let Node::Directory(DirectoryNode { children, .. }) = node {
                    debug(
                        children
                            .iter()
                            .filter_map(|inode| slf.storage.get(*inode))
                            .collect(),
                        slf,
                        formatter,
                        indentation + 1,
                    )?;
                }
            }

            Ok(())
        }

        debug(
            self.storage.get(ROOT_INODE).into_iter().collect(),
            self,
            formatter,
            0,
        )
    }
}

impl Default for FileSystemInner {
    fn default() -> Self {
        let mut slab = Slab::new();
        slab.insert(Node::Directory(DirectoryNode {
            inode: ROOT_INODE,
            name: String::from("/"),
            children: Vec::new(),
        }));

        Self { storage: slab }
    }
}
