use super::*;
use crate::config::Config;
use crate::digest::{Algorithm, DigestSet};
use crate::object::Object;
use crate::timestamp::Timestamp;

fn sha256_of(bytes: &[u8]) -> crate::digest::Digest {
    use sha2::{Digest as _, Sha256};
    let mut h = Sha256::new();
    h.update(bytes);
    crate::digest::Digest::new(Algorithm::Sha256, h.finalize().to_vec()).unwrap()
}

fn object_with(bytes: &[u8], media_type: &str) -> Object {
    let mut digests = DigestSet::new();
    digests.insert(sha256_of(bytes));
    let mut obj = Object::new(digests, bytes.len() as u64, Timestamp::now());
    obj.media_type = media_type.to_string();
    obj
}

#[test]
fn test_filter_dimensions_empty_by_default() {
    let filter = Filter::new();
    assert!(filter.dimensions().is_empty());
}

#[test]
fn test_filter_dimensions_lists_supplied_fields() {
    let mut filter = Filter::new();
    filter.media_type = vec!["text/plain".to_string()];
    filter.size = (Some(0), None);
    let dims = filter.dimensions();
    assert!(dims.contains(&"type"));
    assert!(dims.contains(&"size"));
    assert_eq!(dims.len(), 2);
}

#[test]
fn test_filter_matches_set_dimension_is_or() {
    let mut filter = Filter::new();
    filter.media_type = vec!["text/plain".to_string(), "text/markdown".to_string()];
    assert!(filter.matches(&object_with(b"x", "text/markdown")));
    assert!(!filter.matches(&object_with(b"x", "application/json")));
}

#[test]
fn test_filter_matches_range_dimension_inclusive() {
    let mut filter = Filter::new();
    filter.size = (Some(2), Some(4));
    assert!(filter.matches(&object_with(b"ab", "application/octet-stream")));
    assert!(filter.matches(&object_with(b"abcd", "application/octet-stream")));
    assert!(!filter.matches(&object_with(b"a", "application/octet-stream")));
    assert!(!filter.matches(&object_with(b"abcde", "application/octet-stream")));
}

#[test]
fn test_filter_matches_dtime_absent_excludes_when_range_set() {
    let mut filter = Filter::new();
    filter.dtime = (Some(Timestamp::from_micros(1)), None);
    assert!(!filter.matches(&object_with(b"x", "application/octet-stream")));
}

#[test]
fn test_in_range_open_bounds() {
    assert!(in_range(None, None, 5u64));
    assert!(in_range(Some(1u64), None, 5u64));
    assert!(!in_range(Some(6u64), None, 5u64));
    assert!(in_range(None, Some(10u64), 5u64));
    assert!(!in_range(None, Some(4u64), 5u64));
}

#[test]
fn test_list_range_filter_on_ctime() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new(dir.path());
    config.set_algorithms(vec![Algorithm::Sha256]);
    config.set_primary(Algorithm::Sha256);
    let engine = LmdbEngine::open(&config).unwrap();

    engine.set_meta(&object_with(b"first", "text/plain"), false).unwrap();
    engine.set_meta(&object_with(b"second", "text/plain"), false).unwrap();

    let mut filter = Filter::new();
    filter.ctime = (Some(Timestamp::from_micros(0)), None);
    let results = list(&engine, &filter).unwrap();
    assert_eq!(results.len(), 2);

    let mut filter = Filter::new();
    filter.ctime = (Some(Timestamp::from_micros(u64::MAX)), None);
    let results = list(&engine, &filter).unwrap();
    assert!(results.is_empty());
}
