use super::*;
use crate::config::Config;
use crate::digest::Algorithm;
use crate::engine::MetaKey;
use std::io::Cursor;

fn open_driver(algorithms: &[Algorithm]) -> (tempfile::TempDir, LmdbDriver) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new(dir.path());
    config.set_algorithms(algorithms.to_vec());
    config.set_primary(algorithms[0]);
    let driver = LmdbDriver::open(&config).unwrap();
    (dir, driver)
}

#[test]
fn test_add_settles_blob_and_returns_fresh_object() {
    let (_dir, driver) = open_driver(&[Algorithm::Sha256]);
    let mut source = Cursor::new(b"some data".to_vec());
    let object = driver.add(&mut source, AddOptions::default()).unwrap();

    assert!(object.fresh);
    assert_eq!(object.size, 9);

    let digest = object.digests.get(Algorithm::Sha256).unwrap().clone();
    let (fetched, handle) = driver.get(MetaKey::Digest(&digest)).unwrap().unwrap();
    assert_eq!(fetched.size, 9);
    let bytes = crate::blobstore::read_all(handle.unwrap().open().unwrap()).unwrap();
    assert_eq!(bytes, b"some data");
}

#[test]
fn test_add_twice_unchanged_is_not_fresh() {
    let (_dir, driver) = open_driver(&[Algorithm::Sha256]);
    let mut source = Cursor::new(b"repeat me".to_vec());
    let first = driver.add(&mut source, AddOptions::default()).unwrap();
    assert!(first.fresh);

    let mut source = Cursor::new(b"repeat me".to_vec());
    let opts = AddOptions {
        preserve: true,
        ..Default::default()
    };
    let second = driver.add(&mut source, opts).unwrap();
    assert!(!second.fresh);
    assert_eq!(second.mtime, first.mtime);
}

#[test]
fn test_remove_erases_blob_and_tombstones() {
    let (_dir, driver) = open_driver(&[Algorithm::Sha256]);
    let mut source = Cursor::new(b"to be removed".to_vec());
    let object = driver.add(&mut source, AddOptions::default()).unwrap();

    let (removed, handle) = driver.remove(&object.digests).unwrap().unwrap();
    assert!(!removed.is_live());
    let bytes = crate::blobstore::read_all(handle.unwrap()).unwrap();
    assert_eq!(bytes, b"to be removed");

    let digest = object.digests.get(Algorithm::Sha256).unwrap().clone();
    let (fetched, blob) = driver.get(MetaKey::Digest(&digest)).unwrap().unwrap();
    assert!(!fetched.is_live());
    assert!(blob.is_none());
}

#[test]
fn test_forget_purges_record_entirely() {
    let (_dir, driver) = open_driver(&[Algorithm::Sha256]);
    let mut source = Cursor::new(b"forget me".to_vec());
    let object = driver.add(&mut source, AddOptions::default()).unwrap();

    let (_, handle) = driver.forget(&object.digests).unwrap().unwrap();
    assert!(handle.is_some());

    let digest = object.digests.get(Algorithm::Sha256).unwrap().clone();
    assert!(driver.get(MetaKey::Digest(&digest)).unwrap().is_none());
}

#[test]
fn test_get_missing_returns_none() {
    let (_dir, driver) = open_driver(&[Algorithm::Sha256]);
    use sha2::{Digest as _, Sha256};
    let mut h = Sha256::new();
    h.update(b"nope");
    let digest = crate::digest::Digest::new(Algorithm::Sha256, h.finalize().to_vec()).unwrap();
    assert!(driver.get(MetaKey::Digest(&digest)).unwrap().is_none());
}

#[test]
fn test_stats_reflect_add_and_remove() {
    let (_dir, driver) = open_driver(&[Algorithm::Sha256]);
    let mut a = Cursor::new(b"a".to_vec());
    let mut b = Cursor::new(b"b".to_vec());
    driver.add(&mut a, AddOptions::default()).unwrap();
    let object_b = driver.add(&mut b, AddOptions::default()).unwrap();
    driver.remove(&object_b.digests).unwrap();

    let stats = driver.stats().unwrap();
    assert_eq!(stats.objects, 2);
    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.bytes, 1);
}

#[test]
fn test_add_populates_charset_language_encoding() {
    let (_dir, driver) = open_driver(&[Algorithm::Sha256]);
    let mut source = Cursor::new(b"plain text".to_vec());
    let opts = AddOptions {
        charset: Some("UTF-8".to_string()),
        language: Some("en_US".to_string()),
        encoding: Some("gzip".to_string()),
        ..Default::default()
    };
    let object = driver.add(&mut source, opts).unwrap();

    assert_eq!(object.charset.as_deref(), Some("utf-8"));
    assert_eq!(object.language.as_deref(), Some("en-us"));
    assert_eq!(object.encoding.as_deref(), Some("gzip"));

    let stats = driver.stats().unwrap();
    assert_eq!(stats.charsets.get("utf-8"), Some(&1));
    assert_eq!(stats.languages.get("en-us"), Some(&1));
    assert_eq!(stats.encodings.get("gzip"), Some(&1));
}

#[test]
fn test_add_malformed_charset_non_strict_is_dropped() {
    let (_dir, driver) = open_driver(&[Algorithm::Sha256]);
    let mut source = Cursor::new(b"plain text".to_vec());
    let opts = AddOptions {
        charset: Some("not a charset!!".to_string()),
        ..Default::default()
    };
    let object = driver.add(&mut source, opts).unwrap();
    assert!(object.charset.is_none());
}

#[test]
fn test_add_malformed_charset_strict_errors() {
    let (_dir, driver) = open_driver(&[Algorithm::Sha256]);
    let mut source = Cursor::new(b"plain text".to_vec());
    let opts = AddOptions {
        charset: Some("not a charset!!".to_string()),
        strict: true,
        ..Default::default()
    };
    assert!(driver.add(&mut source, opts).is_err());
}

#[test]
fn test_list_roundtrips_added_objects() {
    let (_dir, driver) = open_driver(&[Algorithm::Sha256]);
    let mut source = Cursor::new(b"listed".to_vec());
    driver.add(&mut source, AddOptions::default()).unwrap();

    let results = driver.list(&Filter::new()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].size, 6);
}
