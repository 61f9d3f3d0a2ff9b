use super::*;
use crate::digest::Algorithm;
use std::io::Write as _;

fn sha256_of(bytes: &[u8]) -> Digest {
    use sha2::{Digest as _, Sha256};
    let mut h = Sha256::new();
    h.update(bytes);
    Digest::new(Algorithm::Sha256, h.finalize().to_vec()).unwrap()
}

#[test]
fn test_setup_creates_store_and_tmp() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = BlobStore::setup(dir.path(), 0o022).unwrap();
    assert!(blobs.store_dir().is_dir());
    assert!(blobs.tmp_dir().is_dir());
}

#[test]
fn test_path_for_splits_4_4_4_rest() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = BlobStore::setup(dir.path(), 0o022).unwrap();
    let digest = sha256_of(b"some data");
    let path = blobs.path_for(&digest);
    let rel = path.strip_prefix(blobs.store_dir()).unwrap();
    let comps: Vec<_> = rel.components().collect();
    assert_eq!(comps.len(), 4);
}

#[test]
fn test_settle_then_get_round_trips_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = BlobStore::setup(dir.path(), 0o022).unwrap();
    let digest = sha256_of(b"some data");

    let mut tmp = blobs.create_temp().unwrap();
    tmp.write_all(b"some data").unwrap();
    blobs
        .settle(&digest, tmp, Timestamp::now(), false)
        .unwrap();

    let handle = blobs.get(&digest, true).unwrap().expect("blob present");
    let bytes = read_all(handle.open().unwrap()).unwrap();
    assert_eq!(bytes, b"some data");
}

#[test]
fn test_get_missing_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = BlobStore::setup(dir.path(), 0o022).unwrap();
    let digest = sha256_of(b"nope");
    assert!(blobs.get(&digest, true).unwrap().is_none());
}

#[test]
fn test_settle_without_overwrite_keeps_existing() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = BlobStore::setup(dir.path(), 0o022).unwrap();
    let digest = sha256_of(b"some data");

    let mut tmp1 = blobs.create_temp().unwrap();
    tmp1.write_all(b"some data").unwrap();
    blobs
        .settle(&digest, tmp1, Timestamp::now(), false)
        .unwrap();

    let mut tmp2 = blobs.create_temp().unwrap();
    tmp2.write_all(b"different bytes, same digest pretend").unwrap();
    blobs
        .settle(&digest, tmp2, Timestamp::now(), false)
        .unwrap();

    let handle = blobs.get(&digest, true).unwrap().unwrap();
    let bytes = read_all(handle.open().unwrap()).unwrap();
    assert_eq!(bytes, b"some data");
}

#[test]
fn test_erase_removes_blob_and_prunes_empty_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = BlobStore::setup(dir.path(), 0o022).unwrap();
    let digest = sha256_of(b"some data");

    let mut tmp = blobs.create_temp().unwrap();
    tmp.write_all(b"some data").unwrap();
    blobs
        .settle(&digest, tmp, Timestamp::now(), false)
        .unwrap();

    let path = blobs.path_for(&digest);
    assert!(path.exists());

    let handle = blobs.erase(&digest).unwrap();
    assert!(handle.is_some());
    assert!(!path.exists());

    // every ancestor directory below store/ should have been pruned away
    assert!(!path.parent().unwrap().exists());
}

#[test]
fn test_erase_missing_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = BlobStore::setup(dir.path(), 0o022).unwrap();
    let digest = sha256_of(b"nope");
    assert!(blobs.erase(&digest).unwrap().is_none());
}
