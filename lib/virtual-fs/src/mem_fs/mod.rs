//! An in-memory implementation of [`crate::FileSystem`].
//!
//! Every node lives in a slab and is addressed by its inode; directories
//! only hold the inodes of their children.

mod filesystem;

pub use filesystem::FileSystem;

use crate::{FileType, Metadata};

type Inode = usize;
const ROOT_INODE: Inode = 0;

#[derive(Debug)]
struct FileNode {
    inode: Inode,
    name: String,
    data: Vec<u8>,
}

#[derive(Debug)]
struct DirectoryNode {
    inode: Inode,
    name: String,
    children: Vec<Inode>,
}

#[derive(Debug)]
enum Node {
    File(FileNode),
    Directory(DirectoryNode),
}

impl Node {
    fn inode(&self) -> Inode {
        *match self {
            Self::File(FileNode { inode, .. }) => inode,
            Self::Directory(DirectoryNode { inode, .. }) => inode,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::File(FileNode { name, .. }) => name.as_str(),
            Self::Directory(DirectoryNode { name, .. }) => name.as_str(),
        }
    }

    fn metadata(&self) -> Metadata {
        match self {
            Self::File(FileNode { data, .. }) => Metadata {
                ft: FileType {
                    file: true,
                    ..Default::default()
                },
                len: data.len() as u64,
            },
            Self::Directory(DirectoryNode { .. }) => Metadata {
                ft: FileType {
                    dir: true,
                    ..Default::default()
                },
                len: 0,
            },
        }
    }
}
