//! The in-memory representation of one stored item: its digests, size,
//! timestamps, user-manipulable attributes, and validation-flags byte.

use lazy_static::lazy_static;
use regex::Regex;

use std::fmt;

use crate::{
    digest::DigestSet,
    err_at,
    timestamp::{OptTimestamp, Timestamp},
    Error, Result,
};

/// Default media type for an object whose type was never set or detected.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

lazy_static! {
    // A deliberately loose approximation of the `type/subtype[+suffix]`
    // grammar: the full media-type token grammar is an external collaborator
    // this just keeps obviously-malformed input out.
    static ref MEDIA_TYPE_RE: Regex =
        Regex::new(r"^[a-z0-9][a-z0-9!#$&^_.+-]*/[a-z0-9][a-z0-9!#$&^_.+-]*$").unwrap();
    static ref CHARSET_RE: Regex = Regex::new(r"^[a-z0-9][a-z0-9_.:-]*$").unwrap();
    static ref ENCODING_RE: Regex = Regex::new(r"^[a-z0-9][a-z0-9-]*$").unwrap();
    // RFC5646-ish: primary subtag plus hyphen-separated extension subtags.
    static ref LANGUAGE_RE: Regex =
        Regex::new(r"^[a-z]{2,8}(-[a-z0-9]{1,8})*$").unwrap();
}

/// Normalize a free-form token: strip, lowercase, and
/// fold a handful of well-known aliases.
pub fn normalize_token(raw: &str) -> String {
    let t = raw.trim().to_lowercase();
    match t.as_str() {
        "x-gzip" => "gzip".to_string(),
        "x-compress" => "compress".to_string(),
        "utf8" => "utf-8".to_string(),
        "utf16" => "utf-16".to_string(),
        _ => t,
    }
}

/// Normalize a language tag: strip, lowercase, `_` -> `-`, trim trailing
/// separators.
pub fn normalize_language(raw: &str) -> String {
    let t = raw.trim().to_lowercase().replace('_', "-");
    t.trim_matches('-').to_string()
}

/// Validate a media type token. In strict mode a grammar failure is an
/// error; otherwise the caller is expected to drop the value silently.
pub fn validate_media_type(token: &str, strict: bool) -> Result<Option<String>> {
    validate_with(&MEDIA_TYPE_RE, token, strict, "media type")
}

pub fn validate_charset(token: &str, strict: bool) -> Result<Option<String>> {
    validate_with(&CHARSET_RE, token, strict, "charset")
}

pub fn validate_encoding(token: &str, strict: bool) -> Result<Option<String>> {
    validate_with(&ENCODING_RE, token, strict, "encoding")
}

pub fn validate_language(token: &str, strict: bool) -> Result<Option<String>> {
    let normalized = normalize_language(token);
    if normalized.is_empty() || !LANGUAGE_RE.is_match(&normalized) {
        if strict {
            return err_at!(ArgumentError, msg: "invalid language tag {:?}", token);
        }
        return Ok(None);
    }
    Ok(Some(normalized))
}

fn validate_with(re: &Regex, token: &str, strict: bool, what: &str) -> Result<Option<String>> {
    let normalized = normalize_token(token);
    if normalized.is_empty() || !re.is_match(&normalized) {
        if strict {
            return err_at!(ArgumentError, msg: "invalid {} {:?}", what, token);
        }
        return Ok(None);
    }
    Ok(Some(normalized))
}

/// One of the four independently-tracked validation states a flag pair can
/// hold (content-type, charset, encoding, syntax).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationState {
    Unverified = 0,
    Invalid = 1,
    Recheck = 2,
    Verified = 3,
}

impl ValidationState {
    fn from_bits(bits: u16) -> ValidationState {
        match bits & 0b11 {
            0 => ValidationState::Unverified,
            1 => ValidationState::Invalid,
            2 => ValidationState::Recheck,
            _ => ValidationState::Verified,
        }
    }

    fn to_bits(self) -> u16 {
        self as u16
    }
}

/// The validation-flags byte(s): four 2-bit validation-state pairs plus a
/// cache bit at position 8.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Flags(u16);

const SHIFT_CONTENT_TYPE: u16 = 0;
const SHIFT_CHARSET: u16 = 2;
const SHIFT_ENCODING: u16 = 4;
const SHIFT_SYNTAX: u16 = 6;
const CACHE_BIT: u16 = 1 << 8;

impl Flags {
    pub fn from_bits(bits: u16) -> Flags {
        Flags(bits)
    }

    pub fn to_bits(self) -> u16 {
        self.0
    }

    fn get(&self, shift: u16) -> ValidationState {
        ValidationState::from_bits(self.0 >> shift)
    }

    fn set(&mut self, shift: u16, state: ValidationState) {
        let mask = !(0b11u16 << shift);
        self.0 = (self.0 & mask) | (state.to_bits() << shift);
    }

    pub fn content_type_state(&self) -> ValidationState {
        self.get(SHIFT_CONTENT_TYPE)
    }
    pub fn set_content_type_state(&mut self, s: ValidationState) {
        self.set(SHIFT_CONTENT_TYPE, s)
    }

    pub fn charset_state(&self) -> ValidationState {
        self.get(SHIFT_CHARSET)
    }
    pub fn set_charset_state(&mut self, s: ValidationState) {
        self.set(SHIFT_CHARSET, s)
    }

    pub fn encoding_state(&self) -> ValidationState {
        self.get(SHIFT_ENCODING)
    }
    pub fn set_encoding_state(&mut self, s: ValidationState) {
        self.set(SHIFT_ENCODING, s)
    }

    pub fn syntax_state(&self) -> ValidationState {
        self.get(SHIFT_SYNTAX)
    }
    pub fn set_syntax_state(&mut self, s: ValidationState) {
        self.set(SHIFT_SYNTAX, s)
    }

    pub fn is_cache(&self) -> bool {
        self.0 & CACHE_BIT != 0
    }

    pub fn set_cache(&mut self, on: bool) {
        if on {
            self.0 |= CACHE_BIT;
        } else {
            self.0 &= !CACHE_BIT;
        }
    }
}

/// One stored item's full metadata record.
#[derive(Clone, Debug)]
pub struct Object {
    pub digests: DigestSet,
    pub size: u64,
    pub ctime: Timestamp,
    pub mtime: Timestamp,
    pub ptime: Timestamp,
    pub dtime: OptTimestamp,
    pub media_type: String,
    pub charset: Option<String>,
    pub language: Option<String>,
    pub encoding: Option<String>,
    pub flags: Flags,
    /// True iff the `add` call that produced this object changed something
    /// (new entry, resurrection, or a merged field change). Never persisted;
    /// set by the driver, defaults to `false` for freshly-constructed or
    /// freshly-loaded objects.
    pub fresh: bool,
}

impl Object {
    /// Construct a brand-new live object from scan results, with all
    /// timestamps set to `now`.
    pub fn new(digests: DigestSet, size: u64, now: Timestamp) -> Object {
        Object {
            digests,
            size,
            ctime: now,
            mtime: now,
            ptime: now,
            dtime: None,
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
            charset: None,
            language: None,
            encoding: None,
            flags: Flags::default(),
            fresh: false,
        }
    }

    pub fn is_live(&self) -> bool {
        self.dtime.is_none()
    }

    pub fn is_tombstone(&self) -> bool {
        self.dtime.is_some() && !self.flags.is_cache()
    }

    pub fn is_cache(&self) -> bool {
        self.flags.is_cache()
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Object(size={}, type={}, live={})",
            self.size,
            self.media_type,
            self.is_live()
        )
    }
}

#[cfg(test)]
#[path = "object_test.rs"]
mod object_test;
