use super::*;
use crate::digest::Digest;
use crate::timestamp::Timestamp;

fn sample_object() -> Object {
    let mut digests = DigestSet::new();
    digests.insert(Digest::new(Algorithm::Sha256, vec![9u8; 32]).unwrap());
    let now = Timestamp::from_micros(1_700_000_000_000_000);
    Object::new(digests, 123, now)
}

#[test]
fn test_round_trip_basic() {
    let algos = [Algorithm::Sha256];
    let obj = sample_object();
    let packed = encode_v1(&obj, &algos).unwrap();
    let back = decode_v1(&packed, &algos).unwrap();
    assert_eq!(back.size, 123);
    assert_eq!(back.media_type, crate::object::DEFAULT_MEDIA_TYPE);
    assert_eq!(back.dtime, None);
    assert_eq!(back.charset, None);
}

#[test]
fn test_round_trip_with_optional_fields() {
    let algos = [Algorithm::Md5, Algorithm::Sha256];
    let mut obj = sample_object();
    obj.digests
        .insert(Digest::new(Algorithm::Md5, vec![1u8; 16]).unwrap());
    obj.charset = Some("utf-8".to_string());
    obj.language = Some("en".to_string());
    obj.encoding = Some("gzip".to_string());
    obj.dtime = Some(Timestamp::from_micros(42));

    let packed = encode_v1(&obj, &algos).unwrap();
    let back = decode_v1(&packed, &algos).unwrap();
    assert_eq!(back.charset.as_deref(), Some("utf-8"));
    assert_eq!(back.language.as_deref(), Some("en"));
    assert_eq!(back.encoding.as_deref(), Some("gzip"));
    assert_eq!(back.dtime, Some(Timestamp::from_micros(42)));
    assert_eq!(back.digests.get(Algorithm::Md5).unwrap().as_bytes(), &[1u8; 16][..]);
}

#[test]
fn test_decode_rejects_truncated_buffer() {
    let algos = [Algorithm::Sha256];
    let obj = sample_object();
    let mut packed = encode_v1(&obj, &algos).unwrap();
    packed.truncate(5);
    assert!(decode_v1(&packed, &algos).is_err());
}

#[test]
fn test_schema_selection() {
    assert_eq!(Schema::from_control_value(None).unwrap(), Schema::V0);
    assert_eq!(Schema::from_control_value(Some(b"1")).unwrap(), Schema::V1);
    assert!(Schema::from_control_value(Some(b"7")).is_err());
}
