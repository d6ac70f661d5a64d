//! Directory-tree pack and unpack round-trips

use img_archive::{ImgError, NameEncoding, create_archive_from_directory, extract_archive_to_directory};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

#[test]
fn pack_then_unpack_a_tree() {
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("radar.txd"), vec![0x11; 100]).unwrap();
    fs::create_dir_all(src.path().join("models")).unwrap();
    fs::write(src.path().join("models/fence.dff"), vec![0x22; 3000]).unwrap();

    let work = TempDir::new().unwrap();
    let archive_path = work.path().join("bundle.img");
    let mut archive =
        create_archive_from_directory(src.path(), &archive_path, NameEncoding::default()).unwrap();
    assert_eq!(archive.len(), 2);
    assert!(archive.entry("models/fence.dff").is_some());
    assert!(archive.entry("radar.txd").is_some());
    archive.close();

    let out = TempDir::new().unwrap();
    extract_archive_to_directory(&archive_path, out.path(), NameEncoding::default()).unwrap();

    // extracted files carry their zero padding to the block boundary
    let radar = fs::read(out.path().join("radar.txd")).unwrap();
    assert_eq!(radar.len(), 2048);
    assert_eq!(&radar[..100], &[0x11; 100]);
    assert!(radar[100..].iter().all(|&b| b == 0));

    let fence = fs::read(out.path().join("models/fence.dff")).unwrap();
    assert_eq!(fence.len(), 4096);
    assert_eq!(&fence[..3000], &[0x22; 3000]);
}

#[test]
fn overlong_relative_names_abort_creation() {
    let src = TempDir::new().unwrap();
    fs::create_dir_all(src.path().join("a/very/deep/directory/tree")).unwrap();
    fs::write(
        src.path().join("a/very/deep/directory/tree/file.dat"),
        b"data",
    )
    .unwrap();

    let work = TempDir::new().unwrap();
    let archive_path = work.path().join("deep.img");
    let err = create_archive_from_directory(src.path(), &archive_path, NameEncoding::default())
        .unwrap_err();
    assert!(matches!(err, ImgError::Format(_)), "got {err:?}");
    // creation aborted before the archive file was touched
    assert!(!archive_path.exists());
}
