use super::*;

#[test]
fn test_parse_mapsize_plain_and_suffixed() {
    assert_eq!(parse_mapsize("1024").unwrap(), 1024);
    assert_eq!(parse_mapsize("2k").unwrap(), 2_000);
    assert_eq!(parse_mapsize("2K").unwrap(), 2_048);
    assert_eq!(parse_mapsize("1g").unwrap(), 1_000_000_000);
    assert_eq!(parse_mapsize("1G").unwrap(), 1_073_741_824);
}

#[test]
fn test_parse_mapsize_rejects_garbage() {
    assert!(parse_mapsize("").is_err());
    assert!(parse_mapsize("abc").is_err());
}

#[test]
fn test_config_validate_requires_primary_in_algorithms() {
    let mut config = Config::new("/tmp/store-x");
    config.set_algorithms(vec![Algorithm::Md5]);
    config.set_primary(Algorithm::Sha256);
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validate_rejects_unknown_driver() {
    let mut config = Config::new("/tmp/store-x");
    config.set_driver("rocksdb");
    assert!(config.validate().is_err());
}

#[test]
fn test_config_defaults() {
    let config = Config::new("/tmp/store-x");
    assert_eq!(config.primary, Algorithm::Sha256);
    assert_eq!(config.algorithms.len(), 5);
    assert!(config.validate().is_ok());
}
