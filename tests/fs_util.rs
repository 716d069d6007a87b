use nfs4_mamont::fs_util::{
    check_path, ensure_directory_is_writable, file_name, fully_delete,
    fully_delete_contents, is_same_or_descendant, join_path, parent_path, validate_component,
};
use nfs4_mamont::xdr::nfs4::nfsstat4;

#[test]
fn normalizes_paths() {
    assert_eq!(check_path("/").expect("root"), "/");
    assert_eq!(check_path("/a//b/./c/").expect("path"), "/a/b/c");
    assert_eq!(check_path("/a/../../b").expect("path"), "/b");
    assert!(check_path("relative").is_err());
    assert!(check_path("/a:b").is_err());
}

#[test]
fn splits_and_joins_paths() {
    assert_eq!(join_path("/", "a"), "/a");
    assert_eq!(join_path("/a", "b"), "/a/b");
    assert_eq!(parent_path("/a/b").as_deref(), Some("/a"));
    assert_eq!(parent_path("/a").as_deref(), Some("/"));
    assert_eq!(parent_path("/"), None);
    assert_eq!(file_name("/a/b"), Some("b"));
    assert_eq!(file_name("/"), None);
}

#[test]
fn descendant_check_respects_component_boundaries() {
    assert!(is_same_or_descendant("/a", "/a"));
    assert!(is_same_or_descendant("/a/b", "/a"));
    assert!(!is_same_or_descendant("/ab", "/a"));
    assert!(is_same_or_descendant("/anything", "/"));
}

#[test]
fn validates_components() {
    assert_eq!(validate_component("file.txt"), Ok(()));
    assert_eq!(validate_component(""), Err(nfsstat4::NFS4ERR_INVAL));
    assert_eq!(validate_component("."), Err(nfsstat4::NFS4ERR_BADNAME));
    assert_eq!(validate_component(".."), Err(nfsstat4::NFS4ERR_BADNAME));
    assert_eq!(validate_component("a/b"), Err(nfsstat4::NFS4ERR_INVAL));
    assert_eq!(validate_component(&"x".repeat(256)), Err(nfsstat4::NFS4ERR_NAMETOOLONG));
}

#[test]
fn deletes_trees() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("root");
    std::fs::create_dir_all(root.join("a/b")).expect("mkdir");
    std::fs::write(root.join("a/b/file"), b"x").expect("write");
    std::fs::write(root.join("top"), b"y").expect("write");

    fully_delete_contents(&root).expect("delete contents");
    assert!(root.is_dir());
    assert_eq!(std::fs::read_dir(&root).expect("read_dir").count(), 0);

    fully_delete(&root).expect("delete");
    assert!(root.symlink_metadata().is_err());
    fully_delete(&root).expect("deleting a missing path");
}

#[test]
fn creates_writable_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("nested/export");
    ensure_directory_is_writable(&target).expect("writable");
    assert!(target.is_dir());
    assert_eq!(std::fs::read_dir(&target).expect("read_dir").count(), 0);

    let file = dir.path().join("plain");
    std::fs::write(&file, b"").expect("write");
    assert!(ensure_directory_is_writable(&file).is_err());
}
