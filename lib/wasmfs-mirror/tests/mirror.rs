use std::path::Path;

use pretty_assertions::assert_eq;
use wasmfs_mirror::virtual_fs::{
    mem_fs, FileSystem, FsError, Metadata, ReadDir, RemoveOptions, Result as FsResult,
};
use wasmfs_mirror::{FsDir, FsMirror, FsNode, MirrorDir, MirrorError, NodeKind};

fn empty_dir() -> FsNode {
    FsNode::Directory(FsDir::new())
}

fn sample_tree() -> FsDir {
    FsDir::from([
        ("file.txt".to_owned(), FsNode::from("Hello")),
        (
            "folder1".to_owned(),
            FsNode::directory([("file.txt", "Hello2")]),
        ),
    ])
}

fn dir(parent: &MirrorDir, key: &str) -> MirrorDir {
    parent
        .get_dir(key)
        .unwrap()
        .unwrap_or_else(|| panic!("{key} should be a directory"))
}

#[test]
fn reads_and_replaces_a_folder() {
    let mirror = FsMirror::new(sample_tree()).unwrap();
    let root = mirror.root();

    let folder1 = dir(&root, "folder1");
    let file = folder1.get("file.txt").unwrap().unwrap();
    assert_eq!(file.as_text(), Some("Hello2"));

    root.insert("folder1", FsNode::directory([("b.txt", "X")]))
        .unwrap();

    let fs = mirror.filesystem();
    assert_eq!(
        fs.metadata(Path::new("/folder1/file.txt")),
        Err(FsError::EntryNotFound)
    );
    assert_eq!(
        fs.read_file(Path::new("/folder1/b.txt")),
        Ok(b"X".to_vec())
    );
    assert_eq!(
        mirror.snapshot().unwrap(),
        FsDir::from([
            ("file.txt".to_owned(), FsNode::from("Hello")),
            ("folder1".to_owned(), FsNode::directory([("b.txt", "X")])),
        ])
    );
}

#[test]
fn directory_handles_are_stable() {
    let mirror = FsMirror::new(sample_tree()).unwrap();
    let root = mirror.root();

    let first = dir(&root, "folder1");
    let second = dir(&root, "folder1");
    assert!(MirrorDir::ptr_eq(&first, &second));
    assert!(MirrorDir::ptr_eq(&root, &mirror.root()));

    // A handle reached through another handle is the same one too.
    first.insert("nested", empty_dir()).unwrap();
    let nested_a = dir(&first, "nested");
    let nested_b = dir(&dir(&root, "folder1"), "nested");
    assert!(MirrorDir::ptr_eq(&nested_a, &nested_b));
    assert_eq!(nested_a.relative_path(), Path::new("folder1/nested"));
    assert_eq!(nested_a.path().unwrap(), Path::new("/folder1/nested"));
}

#[test]
fn handles_are_materialized_lazily() {
    let mirror = FsMirror::new(FsDir::from([
        ("a".to_owned(), FsNode::directory([("b", empty_dir())])),
        ("c.txt".to_owned(), FsNode::from("c")),
    ]))
    .unwrap();
    let root = mirror.root();

    assert_eq!(mirror.materialized_handles(), Ok(1), "only the root");

    root.get("c.txt").unwrap();
    root.get("missing").unwrap();
    assert_eq!(mirror.materialized_handles(), Ok(1), "files are not wrapped");

    let a = dir(&root, "a");
    assert_eq!(mirror.materialized_handles(), Ok(2));
    dir(&a, "b");
    dir(&root, "a");
    assert_eq!(mirror.materialized_handles(), Ok(3));
}

#[test]
fn enumerate_uses_the_plain_tree() {
    let mirror = FsMirror::new(sample_tree()).unwrap();
    let root = mirror.root();

    assert_eq!(
        root.keys().unwrap(),
        vec!["file.txt".to_owned(), "folder1".to_owned()]
    );
    assert_eq!(root.len(), Ok(2));
    assert!(root.contains_key("folder1").unwrap());
    assert!(!root.contains_key("nope").unwrap());
    assert!(root.get("nope").unwrap().is_none());

    let folder1 = dir(&root, "folder1");
    folder1.insert("more.txt", "more").unwrap();
    assert_eq!(folder1.len(), Ok(2));
    assert_eq!(
        root.to_tree().unwrap()["folder1"],
        FsNode::directory([("file.txt", "Hello2"), ("more.txt", "more")])
    );
}

#[test]
fn file_over_directory_leaves_no_residue() {
    let mirror = FsMirror::new(FsDir::from([(
        "tree".to_owned(),
        FsNode::directory([
            ("a.txt", FsNode::from("a")),
            ("deep", FsNode::directory([("b.txt", "b")])),
        ]),
    )]))
    .unwrap();
    let root = mirror.root();
    let tree = dir(&root, "tree");
    let deep = dir(&tree, "deep");

    root.insert("tree", "now a file").unwrap();

    assert_eq!(
        mirror.snapshot().unwrap(),
        FsDir::from([("tree".to_owned(), FsNode::from("now a file"))])
    );
    assert!(mirror.filesystem().metadata(Path::new("/tree")).unwrap().is_file());
    assert_eq!(mirror.materialized_handles(), Ok(1));
    assert!(tree.is_detached());
    assert!(deep.is_detached());
    assert_eq!(
        root.get("tree").unwrap().map(|entry| entry.kind()),
        Some(NodeKind::File)
    );
}

#[test]
fn directory_over_file() {
    let mirror = FsMirror::new(sample_tree()).unwrap();
    let root = mirror.root();

    root.insert("file.txt", FsNode::directory([("inner", "i")]))
        .unwrap();

    assert!(mirror
        .filesystem()
        .metadata(Path::new("/file.txt"))
        .unwrap()
        .is_dir());
    let replaced = dir(&root, "file.txt");
    assert_eq!(replaced.get("inner").unwrap().unwrap().as_text(), Some("i"));
    assert_eq!(
        mirror.snapshot().unwrap()["file.txt"],
        FsNode::directory([("inner", "i")])
    );
}

#[test]
fn file_over_file_is_a_single_write() {
    let mirror = FsMirror::new(sample_tree()).unwrap();
    let root = mirror.root();

    root.insert("file.txt", vec![0xffu8, 0x00]).unwrap();

    assert_eq!(
        root.get("file.txt").unwrap().unwrap().as_bytes(),
        Some(&[0xffu8, 0x00][..])
    );
    assert_eq!(
        mirror.snapshot().unwrap()["file.txt"],
        FsNode::Binary(vec![0xff, 0x00])
    );
}

#[test]
fn caller_copies_do_not_reach_the_mirror() {
    let mirror = FsMirror::new(FsDir::new()).unwrap();
    let root = mirror.root();

    let mut kept = FsNode::directory([("a", "1")]);
    root.insert("key", kept.clone()).unwrap();

    kept.as_dir_mut()
        .unwrap()
        .insert("a".to_owned(), FsNode::from("changed"));
    kept.as_dir_mut()
        .unwrap()
        .insert("b".to_owned(), FsNode::from("added"));

    let key = dir(&root, "key");
    assert_eq!(key.keys().unwrap(), vec!["a".to_owned()]);
    assert_eq!(key.get("a").unwrap().unwrap().as_text(), Some("1"));
    assert_eq!(
        mirror.snapshot().unwrap()["key"],
        FsNode::directory([("a", "1")])
    );
}

#[test]
fn construction_does_not_alias_the_input() {
    let mut input = sample_tree();
    let mirror = FsMirror::new(input.clone()).unwrap();

    input.insert("late.txt".to_owned(), FsNode::from("late"));

    assert!(!mirror.root().contains_key("late.txt").unwrap());
    assert_eq!(mirror.snapshot().unwrap(), sample_tree());
}

#[test]
fn removing_is_idempotent() {
    let mirror = FsMirror::new(sample_tree()).unwrap();
    let root = mirror.root();
    let before = mirror.snapshot().unwrap();

    assert_eq!(root.remove("does-not-exist"), Ok(None));
    assert_eq!(root.remove(".."), Ok(None));
    assert_eq!(mirror.snapshot().unwrap(), before);

    assert_eq!(
        root.remove("folder1"),
        Ok(Some(FsNode::directory([("file.txt", "Hello2")])))
    );
    assert_eq!(root.remove("folder1"), Ok(None));
    assert_eq!(
        mirror.snapshot().unwrap(),
        FsDir::from([("file.txt".to_owned(), FsNode::from("Hello"))])
    );
    assert_eq!(root.keys().unwrap(), vec!["file.txt".to_owned()]);
}

#[test]
fn removed_handles_are_detached() {
    let mirror = FsMirror::new(sample_tree()).unwrap();
    let root = mirror.root();
    let folder1 = dir(&root, "folder1");

    root.remove("folder1").unwrap();

    let detached = MirrorError::Detached {
        path: "/folder1".into(),
    };
    assert!(folder1.is_detached());
    assert_eq!(folder1.keys(), Err(detached.clone()));
    assert_eq!(folder1.get("file.txt").map(|_| ()), Err(detached.clone()));
    assert_eq!(folder1.insert("x", "x"), Err(detached.clone()));
    assert_eq!(folder1.remove("file.txt"), Err(detached));
    assert!(mirror
        .filesystem()
        .metadata(Path::new("/folder1"))
        .is_err());

    // Recreating the directory hands out a new, live handle.
    root.insert("folder1", empty_dir()).unwrap();
    let fresh = dir(&root, "folder1");
    assert!(!MirrorDir::ptr_eq(&folder1, &fresh));
    assert!(fresh.is_empty().unwrap());
    assert!(folder1.is_detached());
}

#[test]
fn export_round_trips_the_initial_tree() {
    let tree = FsDir::from([
        ("text.txt".to_owned(), FsNode::from("héllo wörld")),
        ("binary".to_owned(), FsNode::from(vec![0xc3u8, 0x28, 0xa0])),
        (
            "nested".to_owned(),
            FsNode::directory([
                ("empty", empty_dir()),
                ("deeper", FsNode::directory([("leaf.txt", "leaf")])),
            ]),
        ),
    ]);

    let mirror = FsMirror::new(tree.clone()).unwrap();

    assert_eq!(mirror.snapshot().unwrap(), tree);
    assert_eq!(mirror.root().to_tree().unwrap(), tree);
}

#[test]
fn invalid_names_are_rejected_before_the_store() {
    let mirror = FsMirror::new(FsDir::new()).unwrap();
    let root = mirror.root();

    assert_eq!(
        root.insert("a/b", "x"),
        Err(MirrorError::InvalidName("a/b".to_owned()))
    );
    assert_eq!(
        root.insert("ok", FsNode::directory([("", "x")])),
        Err(MirrorError::InvalidName(String::new()))
    );
    assert!(root.is_empty().unwrap());
    assert_eq!(mirror.snapshot().unwrap(), FsDir::new());

    assert_eq!(
        FsMirror::new(FsDir::from([("..".to_owned(), FsNode::from("x"))])).map(|_| ()),
        Err(MirrorError::InvalidName("..".to_owned()))
    );
}

#[test]
fn mirror_below_a_mount_point() {
    let fs = mem_fs::FileSystem::default();
    let mirror = FsMirror::builder()
        .with_tree(sample_tree())
        .with_filesystem(fs.clone())
        .with_mount_point("/data/app")
        .build()
        .unwrap();

    assert_eq!(
        fs.read_file(Path::new("/data/app/folder1/file.txt")),
        Ok(b"Hello2".to_vec())
    );

    let root = mirror.root();
    assert_eq!(root.path().unwrap(), Path::new("/data/app"));
    dir(&root, "folder1").insert("new.txt", "new").unwrap();
    assert_eq!(
        fs.read_file(Path::new("/data/app/folder1/new.txt")),
        Ok(b"new".to_vec())
    );

    let outside = fs.read_dir(Path::new("/")).unwrap();
    assert_eq!(
        outside.map(|entry| entry.file_name()).collect::<Vec<_>>(),
        vec!["data".to_owned()]
    );
}

#[test]
fn relative_mount_point_is_rejected() {
    assert_eq!(
        FsMirror::builder()
            .with_mount_point("relative")
            .build()
            .map(|_| ()),
        Err(MirrorError::InvalidMountPoint("relative".into()))
    );
}

#[test]
fn snapshot_without_text_decoding() {
    let mirror = FsMirror::builder()
        .with_tree(sample_tree())
        .with_decode_text(false)
        .build()
        .unwrap();

    assert_eq!(
        mirror.snapshot().unwrap()["file.txt"],
        FsNode::Binary(b"Hello".to_vec())
    );
    // The mirror itself keeps what it was given.
    assert_eq!(
        mirror.root().get("file.txt").unwrap().unwrap().as_text(),
        Some("Hello")
    );
}

/// Fails every write to an entry named `bad`.
#[derive(Debug, Default, Clone)]
struct FailingFs {
    inner: mem_fs::FileSystem,
}

impl FileSystem for FailingFs {
    fn create_dir(&self, path: &Path) -> FsResult<()> {
        self.inner.create_dir(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> FsResult<()> {
        if path.file_name().is_some_and(|name| name == "bad") {
            return Err(FsError::IOError);
        }
        self.inner.write_file(path, contents)
    }

    fn read_file(&self, path: &Path) -> FsResult<Vec<u8>> {
        self.inner.read_file(path)
    }

    fn remove(&self, path: &Path, options: RemoveOptions) -> FsResult<()> {
        self.inner.remove(path, options)
    }

    fn read_dir(&self, path: &Path) -> FsResult<ReadDir> {
        self.inner.read_dir(path)
    }

    fn metadata(&self, path: &Path) -> FsResult<Metadata> {
        self.inner.metadata(path)
    }
}

#[test]
fn store_failures_propagate_and_leave_the_mirror_ahead() {
    let fs = FailingFs::default();
    let mirror = FsMirror::builder()
        .with_filesystem(fs.clone())
        .build()
        .unwrap();
    let root = mirror.root();

    let value = FsNode::directory([("a", "1"), ("bad", "2"), ("c", "3")]);
    assert_eq!(
        root.insert("d", value.clone()),
        Err(MirrorError::Store {
            path: "/d/bad".into(),
            source: FsError::IOError,
        })
    );

    // The plain tree holds the whole value, the store stopped at the failure.
    assert_eq!(root.to_tree().unwrap()["d"], value);
    assert_eq!(
        mirror.snapshot().unwrap(),
        FsDir::from([("d".to_owned(), FsNode::directory([("a", "1")]))])
    );

    assert_eq!(
        root.insert("bad", "x"),
        Err(MirrorError::Store {
            path: "/bad".into(),
            source: FsError::IOError,
        })
    );
    assert!(root.contains_key("bad").unwrap());
    assert_eq!(
        fs.inner.metadata(Path::new("/bad")),
        Err(FsError::EntryNotFound)
    );
}

/// Refuses every removal.
#[derive(Debug, Default, Clone)]
struct PinnedFs {
    inner: mem_fs::FileSystem,
}

impl FileSystem for PinnedFs {
    fn create_dir(&self, path: &Path) -> FsResult<()> {
        self.inner.create_dir(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> FsResult<()> {
        self.inner.write_file(path, contents)
    }

    fn read_file(&self, path: &Path) -> FsResult<Vec<u8>> {
        self.inner.read_file(path)
    }

    fn remove(&self, _path: &Path, _options: RemoveOptions) -> FsResult<()> {
        Err(FsError::IOError)
    }

    fn read_dir(&self, path: &Path) -> FsResult<ReadDir> {
        self.inner.read_dir(path)
    }

    fn metadata(&self, path: &Path) -> FsResult<Metadata> {
        self.inner.metadata(path)
    }
}

#[test]
fn replaced_directory_is_detached_when_removal_fails() {
    let mirror = FsMirror::builder()
        .with_tree(FsDir::from([(
            "d".to_owned(),
            FsNode::directory([("x", "1")]),
        )]))
        .with_filesystem(PinnedFs::default())
        .build()
        .unwrap();
    let root = mirror.root();
    let d = dir(&root, "d");

    assert_eq!(
        root.insert("d", "file"),
        Err(MirrorError::Store {
            path: "/d".into(),
            source: FsError::IOError,
        })
    );
    assert_eq!(root.to_tree().unwrap()["d"], FsNode::from("file"));
    assert!(d.is_detached());
    assert_eq!(mirror.materialized_handles(), Ok(1));

    // Going back to a directory never revives the old handle.
    assert!(root.insert("d", empty_dir()).is_err());
    let fresh = dir(&root, "d");
    assert!(!MirrorDir::ptr_eq(&d, &fresh));
    assert!(!fresh.is_detached());
    assert!(d.is_detached());
}

#[cfg(feature = "enable-serde")]
#[test]
fn mirror_options_from_json() {
    use wasmfs_mirror::MirrorOptions;

    let options: MirrorOptions =
        serde_json::from_str(r#"{ "mount_point": "/srv", "decode_text": false }"#).unwrap();
    assert_eq!(
        options,
        MirrorOptions {
            mount_point: "/srv".into(),
            decode_text: false,
        }
    );

    let defaults: MirrorOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(defaults, MirrorOptions::default());
}

#[cfg(feature = "enable-serde")]
#[test]
fn snapshot_serializes_to_json() {
    let mirror = FsMirror::new(FsDir::from([
        ("a.txt".to_owned(), FsNode::from("a")),
        ("raw".to_owned(), FsNode::from(vec![0xffu8])),
    ]))
    .unwrap();

    let json = serde_json::to_string(&mirror.snapshot().unwrap()).unwrap();
    assert_eq!(json, r#"{"a.txt":"a","raw":[255]}"#);
}
