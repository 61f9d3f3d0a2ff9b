//! Store configuration: the `Config::new(...).set_*()` builder, `mapsize`
//! suffix parsing, and an optional TOML-file loader.

use serde::Deserialize;

use std::{convert::TryFrom, path::PathBuf};

use crate::{
    digest::{Algorithm, ALL_ALGORITHMS, DEFAULT_PRIMARY},
    err_at, Error, Result,
};

/// Default LMDB memory-map size, 1 GiB.
pub const DEFAULT_MAPSIZE: usize = 1024 * 1024 * 1024;

/// Default cache expiry, in seconds (`control.expiry`).
pub const DEFAULT_EXPIRY_SECS: u64 = 86_400;

/// Configuration for opening or creating a [`crate::store::Store`].
///
/// Only `dir` is required; every other field has a sensible default.
#[derive(Clone, Debug)]
pub struct Config {
    /// Root directory; holds `store/`, `tmp/`, and the LMDB environment.
    pub dir: PathBuf,
    /// Reserved for selecting among concrete driver implementations; only
    /// `"lmdb"` is recognized today.
    pub driver: String,
    pub algorithms: Vec<Algorithm>,
    pub primary: Algorithm,
    pub mapsize: usize,
    pub umask: u32,
    pub expiry_secs: u64,
}

impl Config {
    pub fn new(dir: impl Into<PathBuf>) -> Config {
        Config {
            dir: dir.into(),
            driver: "lmdb".to_string(),
            algorithms: ALL_ALGORITHMS.to_vec(),
            primary: DEFAULT_PRIMARY,
            mapsize: DEFAULT_MAPSIZE,
            umask: current_umask(),
            expiry_secs: DEFAULT_EXPIRY_SECS,
        }
    }

    pub fn set_driver(&mut self, driver: impl Into<String>) -> &mut Self {
        self.driver = driver.into();
        self
    }

    pub fn set_algorithms(&mut self, algorithms: Vec<Algorithm>) -> &mut Self {
        self.algorithms = algorithms;
        self
    }

    pub fn set_primary(&mut self, primary: Algorithm) -> &mut Self {
        self.primary = primary;
        self
    }

    pub fn set_mapsize(&mut self, mapsize: usize) -> &mut Self {
        self.mapsize = mapsize;
        self
    }

    pub fn set_umask(&mut self, umask: u32) -> &mut Self {
        self.umask = umask;
        self
    }

    pub fn set_expiry_secs(&mut self, secs: u64) -> &mut Self {
        self.expiry_secs = secs;
        self
    }

    /// Validate cross-field constraints: `driver` recognized, `primary`
    /// present in `algorithms`, `dir` non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.driver != "lmdb" {
            return err_at!(ArgumentError, msg: "unrecognized driver {:?}", self.driver);
        }
        if self.dir.as_os_str().is_empty() {
            return err_at!(ArgumentError, msg: "missing required `dir`");
        }
        if !self.algorithms.contains(&self.primary) {
            return err_at!(
                ArgumentError,
                msg: "primary algorithm {} not in configured algorithms",
                self.primary
            );
        }
        Ok(())
    }

    /// Load a config from a TOML file, following this corpus's
    /// `load_toml`-style helper; `dir` in the file is resolved relative to
    /// nothing (an absolute or cwd-relative path is expected).
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let raw = err_at!(IOError, std::fs::read_to_string(path.as_ref()))?;
        let parsed: RawConfig = err_at!(ArgumentError, toml::from_str(&raw))?;
        Config::try_from(parsed)
    }
}

#[derive(Deserialize)]
struct RawConfig {
    dir: PathBuf,
    #[serde(default)]
    driver: Option<String>,
    #[serde(default)]
    algorithms: Option<Vec<String>>,
    #[serde(default)]
    primary: Option<String>,
    #[serde(default)]
    mapsize: Option<String>,
    #[serde(default)]
    umask: Option<u32>,
    #[serde(default)]
    expiry_secs: Option<u64>,
}

impl TryFrom<RawConfig> for Config {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<Config> {
        let mut config = Config::new(raw.dir);
        if let Some(driver) = raw.driver {
            config.set_driver(driver);
        }
        if let Some(algos) = raw.algorithms {
            let mut parsed = Vec::with_capacity(algos.len());
            for a in algos {
                parsed.push(Algorithm::from_token(&a)?);
            }
            config.set_algorithms(parsed);
        }
        if let Some(primary) = raw.primary {
            config.set_primary(Algorithm::from_token(&primary)?);
        }
        if let Some(mapsize) = raw.mapsize {
            config.set_mapsize(parse_mapsize(&mapsize)?);
        }
        if let Some(umask) = raw.umask {
            config.set_umask(umask);
        }
        if let Some(expiry) = raw.expiry_secs {
            config.set_expiry_secs(expiry);
        }
        Ok(config)
    }
}

/// Parse a `mapsize` string: a decimal integer with an optional unit suffix
/// in `[kmgtpeKMGTPE]`. Lowercase multiplies by 1000, uppercase by 1024.
pub fn parse_mapsize(raw: &str) -> Result<usize> {
    let raw = raw.trim();
    if raw.is_empty() {
        return err_at!(ArgumentError, msg: "empty mapsize");
    }
    let (digits, mult) = match raw.chars().last().unwrap() {
        'k' => (&raw[..raw.len() - 1], 1_000u64),
        'm' => (&raw[..raw.len() - 1], 1_000u64.pow(2)),
        'g' => (&raw[..raw.len() - 1], 1_000u64.pow(3)),
        't' => (&raw[..raw.len() - 1], 1_000u64.pow(4)),
        'p' => (&raw[..raw.len() - 1], 1_000u64.pow(5)),
        'e' => (&raw[..raw.len() - 1], 1_000u64.pow(6)),
        'K' => (&raw[..raw.len() - 1], 1024u64),
        'M' => (&raw[..raw.len() - 1], 1024u64.pow(2)),
        'G' => (&raw[..raw.len() - 1], 1024u64.pow(3)),
        'T' => (&raw[..raw.len() - 1], 1024u64.pow(4)),
        'P' => (&raw[..raw.len() - 1], 1024u64.pow(5)),
        'E' => (&raw[..raw.len() - 1], 1024u64.pow(6)),
        _ => (raw, 1u64),
    };
    let n: u64 = err_at!(ArgumentError, digits.parse(), "mapsize {:?}", raw)?;
    let bytes = n
        .checked_mul(mult)
        .ok_or_else(|| Error::ArgumentError(format!("mapsize overflow: {:?}", raw)))?;
    err_at!(ArgumentError, usize::try_from(bytes))
}

#[cfg(unix)]
fn current_umask() -> u32 {
    // SAFETY: umask(2) has no failure mode; we immediately restore the
    // previous mask, making this call transparent to the rest of the
    // process.
    unsafe {
        let mask = libc::umask(0o022);
        libc::umask(mask);
        mask as u32
    }
}

#[cfg(not(unix))]
fn current_umask() -> u32 {
    0o022
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
