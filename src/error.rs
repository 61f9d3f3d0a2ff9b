//! Crate-wide error type.
//!
//! Every fallible call-site in this crate is expected to go through the
//! [`err_at`] macro, which stamps the error with the `file!()`/`line!()` of
//! its construction instead of leaving that to a backtrace.

use std::{fmt, io, result};

/// Result type used throughout this crate.
pub type Result<T> = result::Result<T, Error>;

/// Crate-wide error taxonomy, corresponding to the error kinds named in the
/// taxonomy: `ArgumentError`, `CorruptStateError`, `IOError`. `NotFound`
/// is deliberately absent here — absence of a record is represented as
/// `Option::None`, never as an error.
#[derive(Debug)]
pub enum Error {
    /// Malformed input: non-seekable stream, unrecognized driver, a token
    /// that fails its grammar in strict mode, negative size, invalid
    /// algorithm, missing `dir`, a secondary-digest collision.
    ArgumentError(String),
    /// On-disk state is inconsistent: unrecognized schema version, a blob
    /// path that exists but isn't a regular readable file, a packed record
    /// whose length doesn't match the schema.
    CorruptStateError(String),
    /// System-level I/O failure: filesystem permissions at setup, or during
    /// settle/erase.
    IOError(String),
    /// The underlying LMDB environment reported an error.
    LmdbError(String),
    /// Encoding/decoding a packed record or digest URI failed.
    DecodeFail(String),
    /// A numeric conversion failed (e.g. `usize` from a file length).
    FailConvert(String),
    /// An invariant was violated that indicates a bug in this crate rather
    /// than bad input.
    Fatal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ArgumentError(msg) => write!(f, "argument-error: {}", msg),
            Error::CorruptStateError(msg) => write!(f, "corrupt-state: {}", msg),
            Error::IOError(msg) => write!(f, "io-error: {}", msg),
            Error::LmdbError(msg) => write!(f, "lmdb-error: {}", msg),
            Error::DecodeFail(msg) => write!(f, "decode-fail: {}", msg),
            Error::FailConvert(msg) => write!(f, "fail-convert: {}", msg),
            Error::Fatal(msg) => write!(f, "fatal: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IOError(err.to_string())
    }
}

impl From<lmdb::Error> for Error {
    fn from(err: lmdb::Error) -> Error {
        Error::LmdbError(err.to_string())
    }
}

/// Stamp an error with its construction site and fold it into [`Error`].
///
/// Three call shapes, matching how the rest of the crate uses it:
///
/// * `err_at!(IOError, fs::create_dir_all(path))?` — wrap a
///   `std::result::Result<T, E: Display>` into `Result<T>`.
/// * `err_at!(IOError, fs::create_dir_all(path), "creating {:?}", path)?` —
///   same, with extra context appended on failure.
/// * `err_at!(ArgumentError, msg: "missing field {}", name)` — construct an
///   error directly (no wrapped result).
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let msg = format!($($arg),+);
        Err($crate::error::Error::$v(format!("{}:{} {}", file!(), line!(), msg)))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => Err($crate::error::Error::$v(format!(
                "{}:{} {}",
                file!(),
                line!(),
                err
            ))),
        }
    }};
    ($v:ident, $e:expr, $($arg:expr),+) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let ctx = format!($($arg),+);
                Err($crate::error::Error::$v(format!(
                    "{}:{} {} ({})",
                    file!(),
                    line!(),
                    err,
                    ctx
                )))
            }
        }
    }};
}
