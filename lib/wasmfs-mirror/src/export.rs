//! Snapshot a [`FileSystem`] back into a plain tree.

use std::path::Path;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use virtual_fs::FileSystem;

use crate::{FsDir, FsNode, MirrorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "enable-serde", serde(default))]
pub struct ExportOptions {
    /// Turn file contents that are valid UTF-8 into [`FsNode::Text`].
    /// When disabled every file is exported as [`FsNode::Binary`].
    pub decode_text: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { decode_text: true }
    }
}

/// Rebuild the tree found below `from`.
///
/// The result owns all of its data. A file that is not valid UTF-8 is kept
/// as raw bytes, it never fails the export.
pub fn export_tree(
    fs: &dyn FileSystem,
    from: &Path,
    options: &ExportOptions,
) -> Result<FsDir, MirrorError> {
    let mut tree = FsDir::new();

    for entry in fs.read_dir(from).map_err(MirrorError::store(from))? {
        let path = entry.path();
        let metadata = fs.metadata(&path).map_err(MirrorError::store(&path))?;

        if metadata.is_file() {
            trace!(path = %path.display(), "export: read_file");
            let contents = fs.read_file(&path).map_err(MirrorError::store(&path))?;
            tree.insert(entry.file_name(), decode_contents(&path, contents, options));
        } else if metadata.is_dir() {
            let children = export_tree(fs, &path, options)?;
            tree.insert(entry.file_name(), FsNode::Directory(children));
        }
    }

    Ok(tree)
}

/// Strict UTF-8 decoding with a raw-bytes fallback.
fn decode_contents(path: &Path, contents: Vec<u8>, options: &ExportOptions) -> FsNode {
    if !options.decode_text {
        return FsNode::Binary(contents);
    }

    match String::from_utf8(contents) {
        Ok(text) => FsNode::Text(text),
        Err(e) => {
            debug!(
                path = %path.display(),
                valid_up_to = e.utf8_error().valid_up_to(),
                "keeping non UTF-8 file as bytes",
            );
            FsNode::Binary(e.into_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::import_tree;
    use pretty_assertions::assert_eq;
    use virtual_fs::{mem_fs, FsError};

    #[test]
    fn round_trip() {
        let fs = mem_fs::FileSystem::default();
        let tree = FsDir::from([
            ("hello.txt".to_owned(), FsNode::from("Hello")),
            ("blob".to_owned(), FsNode::from(vec![0xffu8, 0xfe, 0x00])),
            (
                "folder".to_owned(),
                FsNode::directory([
                    ("nested.txt", FsNode::from("héllo")),
                    ("empty", FsNode::directory(Vec::<(String, FsNode)>::new())),
                ]),
            ),
        ]);

        import_tree(&fs, Path::new("/"), &tree).unwrap();
        let exported = export_tree(&fs, Path::new("/"), &ExportOptions::default()).unwrap();

        assert_eq!(exported, tree);
    }

    #[test]
    #[tracing_test::traced_test]
    fn invalid_utf8_stays_binary() {
        let fs = mem_fs::FileSystem::default();
        // Valid prefix followed by a truncated multi-byte sequence.
        fs.write_file(Path::new("/almost.txt"), b"abc\xe2\x82").unwrap();

        let exported = export_tree(&fs, Path::new("/"), &ExportOptions::default()).unwrap();

        assert_eq!(
            exported.get("almost.txt"),
            Some(&FsNode::Binary(b"abc\xe2\x82".to_vec()))
        );
        assert!(logs_contain("keeping non UTF-8 file as bytes"));
    }

    #[test]
    fn decoding_can_be_disabled() {
        let fs = mem_fs::FileSystem::default();
        fs.write_file(Path::new("/a.txt"), b"plain").unwrap();

        let exported =
            export_tree(&fs, Path::new("/"), &ExportOptions { decode_text: false }).unwrap();

        assert_eq!(exported.get("a.txt"), Some(&FsNode::Binary(b"plain".to_vec())));
    }

    #[test]
    fn export_from_subdirectory() {
        let fs = mem_fs::FileSystem::default();
        fs.create_dir(Path::new("/outer")).unwrap();
        fs.create_dir(Path::new("/outer/inner")).unwrap();
        fs.write_file(Path::new("/outer/inner/x"), b"x").unwrap();
        fs.write_file(Path::new("/top"), b"top").unwrap();

        let exported =
            export_tree(&fs, Path::new("/outer"), &ExportOptions::default()).unwrap();

        assert_eq!(
            exported,
            FsDir::from([("inner".to_owned(), FsNode::directory([("x", "x")]))])
        );
    }

    #[test]
    fn missing_start_is_a_store_error() {
        let fs = mem_fs::FileSystem::default();

        assert_eq!(
            export_tree(&fs, Path::new("/nope"), &ExportOptions::default()),
            Err(MirrorError::Store {
                path: "/nope".into(),
                source: FsError::EntryNotFound,
            })
        );
    }
}
