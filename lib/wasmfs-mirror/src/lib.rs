//! A plain directory tree mirrored onto a virtual filesystem.
//!
//! A tree of [`FsNode`]s is imported into a [`virtual_fs::FileSystem`] and
//! then edited through [`MirrorDir`] handles: every insert or removal is
//! replayed onto the filesystem while the plain tree stays the reference for
//! what the mirror contains. [`export::export_tree`] goes the other way and
//! reads a filesystem back into a plain tree.
//!
//! ```
//! use wasmfs_mirror::{FsDir, FsMirror, FsNode};
//!
//! let mirror = FsMirror::new(FsDir::from([(
//!     "folder1".to_owned(),
//!     FsNode::directory([("file.txt", "Hello2")]),
//! )]))
//! .unwrap();
//!
//! mirror
//!     .root()
//!     .insert("folder1", FsNode::directory([("b.txt", "X")]))
//!     .unwrap();
//!
//! let snapshot = mirror.snapshot().unwrap();
//! assert_eq!(
//!     snapshot["folder1"],
//!     FsNode::directory([("b.txt", "X")]),
//! );
//! ```

mod error;
pub mod export;
pub mod import;
pub mod mirror;
mod tree;

pub use error::MirrorError;
pub use export::{export_tree, ExportOptions};
pub use import::import_tree;
pub use mirror::{FsMirror, MirrorBuilder, MirrorDir, MirrorEntry, MirrorOptions};
pub use tree::{FsDir, FsNode, NodeKind};

pub use virtual_fs;
