use super::*;

#[test]
fn test_algorithm_canonical_order() {
    assert!(Algorithm::Md5 < Algorithm::Sha1);
    assert!(Algorithm::Sha1 < Algorithm::Sha256);
    assert!(Algorithm::Sha256 < Algorithm::Sha384);
    assert!(Algorithm::Sha384 < Algorithm::Sha512);
}

#[test]
fn test_algorithm_from_token() {
    assert_eq!(Algorithm::from_token("sha-256").unwrap(), Algorithm::Sha256);
    assert!(Algorithm::from_token("sha256").is_err());
}

#[test]
fn test_digest_len_validated() {
    let err = Digest::new(Algorithm::Sha256, vec![0u8; 10]);
    assert!(err.is_err());
    let ok = Digest::new(Algorithm::Sha256, vec![0u8; 32]);
    assert!(ok.is_ok());
}

#[test]
fn test_digest_uri_round_trip() {
    let d = Digest::new(Algorithm::Sha1, vec![7u8; 20]).unwrap();
    let uri = d.to_uri();
    assert!(uri.starts_with("ni:///sha-1;"));
    let back = Digest::from_uri(&uri).unwrap();
    assert_eq!(d, back);
}

#[test]
fn test_digest_set_largest_available() {
    let mut set = DigestSet::new();
    set.insert(Digest::new(Algorithm::Md5, vec![0u8; 16]).unwrap());
    set.insert(Digest::new(Algorithm::Sha256, vec![1u8; 32]).unwrap());
    assert_eq!(set.largest_available().unwrap().algorithm(), Algorithm::Sha256);
}
