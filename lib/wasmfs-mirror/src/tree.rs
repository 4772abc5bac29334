use std::collections::BTreeMap;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

use crate::MirrorError;

/// The children of a directory, by name.
pub type FsDir = BTreeMap<String, FsNode>;

/// A plain tree node: a file holding text or raw bytes, or a directory.
///
/// With `enable-serde` a node (de)serializes untagged: strings are text
/// files, byte sequences are binary files and maps are directories.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "enable-serde", serde(untagged))]
pub enum FsNode {
    Text(String),
    Binary(#[cfg_attr(feature = "enable-serde", serde(with = "serde_bytes"))] Vec<u8>),
    Directory(FsDir),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Directory,
}

impl FsNode {
    /// Build a directory node from `(name, node)` pairs.
    pub fn directory<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FsNode>,
    {
        FsNode::Directory(
            entries
                .into_iter()
                .map(|(name, node)| (name.into(), node.into()))
                .collect(),
        )
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            FsNode::Text(_) | FsNode::Binary(_) => NodeKind::File,
            FsNode::Directory(_) => NodeKind::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind() == NodeKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == NodeKind::Directory
    }

    /// The raw content of a file node, `None` for directories.
    pub fn contents(&self) -> Option<&[u8]> {
        match self {
            FsNode::Text(text) => Some(text.as_bytes()),
            FsNode::Binary(bytes) => Some(bytes.as_slice()),
            FsNode::Directory(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FsNode::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_dir(&self) -> Option<&FsDir> {
        match self {
            FsNode::Directory(children) => Some(children),
            _ => None,
        }
    }

    pub fn as_dir_mut(&mut self) -> Option<&mut FsDir> {
        match self {
            FsNode::Directory(children) => Some(children),
            _ => None,
        }
    }
}

impl From<&str> for FsNode {
    fn from(text: &str) -> Self {
        FsNode::Text(text.to_owned())
    }
}

impl From<String> for FsNode {
    fn from(text: String) -> Self {
        FsNode::Text(text)
    }
}

impl From<Vec<u8>> for FsNode {
    fn from(bytes: Vec<u8>) -> Self {
        FsNode::Binary(bytes)
    }
}

impl From<&[u8]> for FsNode {
    fn from(bytes: &[u8]) -> Self {
        FsNode::Binary(bytes.to_vec())
    }
}

impl From<FsDir> for FsNode {
    fn from(children: FsDir) -> Self {
        FsNode::Directory(children)
    }
}

/// Entry names must be usable as a single path component.
pub(crate) fn validate_name(name: &str) -> Result<(), MirrorError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
    {
        return Err(MirrorError::InvalidName(name.to_owned()));
    }
    Ok(())
}

/// Check every name in a tree, depth-first.
pub(crate) fn validate_tree(tree: &FsDir) -> Result<(), MirrorError> {
    for (name, node) in tree {
        validate_name(name)?;
        if let FsNode::Directory(children) = node {
            validate_tree(children)?;
        }
    }
    Ok(())
}
