use super::*;
use crate::digest::Algorithm;
use std::io::Cursor;

fn open_store(algorithms: &[Algorithm]) -> (tempfile::TempDir, Store<LmdbDriver>) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new(dir.path());
    config.set_algorithms(algorithms.to_vec());
    config.set_primary(algorithms[0]);
    let store = Store::open(&config).unwrap();
    (dir, store)
}

#[test]
fn test_open_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new(dir.path());
    config.set_driver("bogus");
    assert!(Store::open(&config).is_err());
}

#[test]
fn test_add_then_get_round_trips_blob_contents() {
    let (_dir, store) = open_store(&[Algorithm::Sha256]);
    let mut source = Cursor::new(b"round trip".to_vec());
    let object = store.add(&mut source, AddOptions::default()).unwrap();

    let digest = object.digests.get(Algorithm::Sha256).unwrap().clone();
    let (fetched, handle) = store.get(MetaKey::Digest(&digest)).unwrap().unwrap();
    assert_eq!(fetched.size, 10);
    let bytes = crate::blobstore::read_all(handle.unwrap().open().unwrap()).unwrap();
    assert_eq!(bytes, b"round trip");
}

#[test]
fn test_remove_then_forget_fully_purges() {
    let (_dir, store) = open_store(&[Algorithm::Sha256]);
    let mut source = Cursor::new(b"gone soon".to_vec());
    let object = store.add(&mut source, AddOptions::default()).unwrap();

    let (tombstoned, handle) = store.remove(&object.digests).unwrap().unwrap();
    assert!(!tombstoned.is_live());
    assert!(handle.is_some());

    let (purged, _) = store.forget(&object.digests).unwrap().unwrap();
    assert!(!purged.is_live());

    let digest = object.digests.get(Algorithm::Sha256).unwrap().clone();
    assert!(store.get(MetaKey::Digest(&digest)).unwrap().is_none());
}

#[test]
fn test_list_iterates_live_objects() {
    let (_dir, store) = open_store(&[Algorithm::Sha256]);
    let mut a = Cursor::new(b"one".to_vec());
    let mut b = Cursor::new(b"two!".to_vec());
    store.add(&mut a, AddOptions::default()).unwrap();
    store.add(&mut b, AddOptions::default()).unwrap();

    let sizes: Vec<u64> = store.list(&Filter::new()).unwrap().map(|o| o.size).collect();
    assert_eq!(sizes.len(), 2);
}

#[test]
fn test_stats_counts_objects_and_bytes() {
    let (_dir, store) = open_store(&[Algorithm::Sha256]);
    let mut source = Cursor::new(b"counted".to_vec());
    store.add(&mut source, AddOptions::default()).unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.objects, 1);
    assert_eq!(stats.deleted, 0);
    assert_eq!(stats.bytes, 7);
}
