use super::*;
use crate::digest::{Algorithm, Digest, DigestSet};

#[test]
fn test_token_normalization_aliases() {
    assert_eq!(normalize_token("X-GZIP"), "gzip");
    assert_eq!(normalize_token(" UTF8 "), "utf-8");
    assert_eq!(normalize_token("Text/Plain"), "text/plain");
}

#[test]
fn test_language_normalization() {
    assert_eq!(normalize_language("en_US-"), "en-us");
}

#[test]
fn test_validate_media_type_strict_rejects_garbage() {
    assert!(validate_media_type("not a type", true).is_err());
    assert!(validate_media_type("not a type", false).unwrap().is_none());
}

#[test]
fn test_validate_media_type_accepts_normalized() {
    let got = validate_media_type("TEXT/PLAIN", false).unwrap();
    assert_eq!(got.as_deref(), Some("text/plain"));
}

#[test]
fn test_validate_language_rejects_bad_tag() {
    assert!(validate_language("!!!", true).is_err());
    assert_eq!(validate_language("en-US", false).unwrap().as_deref(), Some("en-us"));
}

#[test]
fn test_flags_roundtrip_validation_states() {
    let mut flags = Flags::default();
    flags.set_content_type_state(ValidationState::Verified);
    flags.set_charset_state(ValidationState::Invalid);
    assert_eq!(flags.content_type_state(), ValidationState::Verified);
    assert_eq!(flags.charset_state(), ValidationState::Invalid);
    assert_eq!(flags.encoding_state(), ValidationState::Unverified);
}

#[test]
fn test_flags_cache_bit_independent_of_validation_bits() {
    let mut flags = Flags::default();
    flags.set_content_type_state(ValidationState::Verified);
    flags.set_cache(true);
    assert!(flags.is_cache());
    assert_eq!(flags.content_type_state(), ValidationState::Verified);
    flags.set_cache(false);
    assert!(!flags.is_cache());
}

#[test]
fn test_object_live_vs_tombstone_vs_cache() {
    let mut digests = DigestSet::new();
    digests.insert(Digest::new(Algorithm::Sha256, vec![1u8; 32]).unwrap());
    let now = Timestamp::now();
    let mut obj = Object::new(digests, 9, now);
    assert!(obj.is_live());
    assert!(!obj.is_tombstone());

    obj.dtime = Some(now);
    assert!(!obj.is_live());
    assert!(obj.is_tombstone());

    obj.flags.set_cache(true);
    assert!(!obj.is_tombstone());
    assert!(obj.is_cache());
}
