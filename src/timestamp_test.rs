use super::*;

#[test]
fn test_zero_is_none() {
    assert!(Timestamp::ZERO.is_none());
    assert!(unpack_opt(Timestamp::ZERO).is_none());
}

#[test]
fn test_now_monotonic_enough() {
    let a = Timestamp::now();
    let b = Timestamp::now();
    assert!(b >= a);
}

#[test]
fn test_plus_seconds() {
    let a = Timestamp::from_micros(1_000_000);
    let b = a.plus_seconds(5);
    assert_eq!(b.to_micros(), 6_000_000);
}

#[test]
fn test_pack_unpack_opt_round_trip() {
    let t = Timestamp::from_micros(42);
    assert_eq!(unpack_opt(pack_opt(Some(t))), Some(t));
    assert_eq!(unpack_opt(pack_opt(None)), None);
}
