//! Engine-derived timestamps.
//!
//! Packed as `unix_seconds * 1_000_000 + micros` in a 64-bit word, per
//! engine. A zero value decodes to "none" (used for optional fields like
//! `dtime`).

use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

/// Microsecond-resolution timestamp, counted from the Unix epoch.
///
/// `Timestamp(0)` is reserved to mean "unset" wherever a field is optional
/// (`dtime`), matching the packed record's "zero decodes to none" rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn now() -> Timestamp {
        let dur = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(dur.as_secs() * 1_000_000 + u64::from(dur.subsec_micros()))
    }

    pub fn from_micros(micros: u64) -> Timestamp {
        Timestamp(micros)
    }

    pub fn to_micros(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Add a duration given in whole seconds, used for cache expiry
    /// (`now + expiry`).
    pub fn plus_seconds(self, secs: u64) -> Timestamp {
        Timestamp(self.0 + secs * 1_000_000)
    }

    pub fn max(self, other: Timestamp) -> Timestamp {
        Timestamp(self.0.max(other.0))
    }

    pub fn to_system_time(self) -> SystemTime {
        UNIX_EPOCH + std::time::Duration::from_micros(self.0)
    }

    pub fn from_system_time(t: SystemTime) -> Result<Timestamp> {
        let dur = t.duration_since(UNIX_EPOCH).map_err(|_| {
            Error::ArgumentError("timestamp predates the unix epoch".to_string())
        })?;
        Ok(Timestamp(dur.as_secs() * 1_000_000 + u64::from(dur.subsec_micros())))
    }
}

impl Default for Timestamp {
    fn default() -> Timestamp {
        Timestamp::ZERO
    }
}

/// An optional timestamp, as used for `dtime`: `None` is the wire
/// representation `0`.
pub type OptTimestamp = Option<Timestamp>;

pub fn pack_opt(t: OptTimestamp) -> Timestamp {
    t.unwrap_or(Timestamp::ZERO)
}

pub fn unpack_opt(t: Timestamp) -> OptTimestamp {
    if t.is_none() {
        None
    } else {
        Some(t)
    }
}

#[cfg(test)]
#[path = "timestamp_test.rs"]
mod timestamp_test;
