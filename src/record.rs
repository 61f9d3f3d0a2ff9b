//! The packed binary layout for one `entry` table value (schema v1), and the
//! legacy v0 layout the engine can still read.
//!
//! v1 layout, in order:
//!
//! 1. raw digest bytes, one per configured algorithm, in canonical order
//! 2. `size` (u64, little-endian)
//! 3. `ctime`, `mtime`, `ptime`, `dtime` (u64 microsecond timestamps)
//! 4. `flags` (u16)
//! 5. `type`, `language`, `charset`, `encoding` (each NUL-terminated; an
//!    empty string decodes to "none")

use std::convert::TryInto;

use crate::{
    digest::{Algorithm, Digest, DigestSet},
    err_at,
    object::{Flags, Object},
    timestamp::Timestamp,
    Error, Result,
};

/// Schema version selected by inspecting `control.version`: absent means v0,
/// `"1"` means v1, anything else is a corrupt store.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Schema {
    V0,
    V1,
}

impl Schema {
    pub fn from_control_value(value: Option<&[u8]>) -> Result<Schema> {
        match value {
            None => Ok(Schema::V0),
            Some(b) if b == b"1" => Ok(Schema::V1),
            Some(b) => {
                let shown = String::from_utf8_lossy(b).to_string();
                err_at!(CorruptStateError, msg: "unrecognized schema version {:?}", shown)
            }
        }
    }

    pub fn control_value(self) -> &'static [u8] {
        match self {
            Schema::V0 => b"",
            Schema::V1 => b"1",
        }
    }
}

fn push_nul_terminated(buf: &mut Vec<u8>, s: &Option<String>) {
    if let Some(s) = s {
        buf.extend_from_slice(s.as_bytes());
    }
    buf.push(0u8);
}

fn read_nul_terminated(buf: &[u8], pos: &mut usize) -> Result<Option<String>> {
    let start = *pos;
    let end = buf[start..]
        .iter()
        .position(|&b| b == 0)
        .map(|i| start + i)
        .ok_or_else(|| Error::CorruptStateError("unterminated string field".to_string()))?;
    let s = err_at!(CorruptStateError, String::from_utf8(buf[start..end].to_vec()))?;
    *pos = end + 1;
    Ok(if s.is_empty() { None } else { Some(s) })
}

/// Encode an object into the v1 packed record, for the store's configured
/// algorithm set (in canonical order).
pub fn encode_v1(obj: &Object, algorithms: &[Algorithm]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);

    for algo in algorithms {
        let digest = obj.digests.get(*algo).ok_or_else(|| {
            Error::Fatal(format!("object missing configured digest {}", algo))
        })?;
        buf.extend_from_slice(digest.as_bytes());
    }

    buf.extend_from_slice(&obj.size.to_le_bytes());
    buf.extend_from_slice(&obj.ctime.to_micros().to_le_bytes());
    buf.extend_from_slice(&obj.mtime.to_micros().to_le_bytes());
    buf.extend_from_slice(&obj.ptime.to_micros().to_le_bytes());
    let dtime = obj.dtime.unwrap_or(Timestamp::ZERO);
    buf.extend_from_slice(&dtime.to_micros().to_le_bytes());
    buf.extend_from_slice(&obj.flags.to_bits().to_le_bytes());

    push_nul_terminated(&mut buf, &Some(obj.media_type.clone()));
    push_nul_terminated(&mut buf, &obj.language);
    push_nul_terminated(&mut buf, &obj.charset);
    push_nul_terminated(&mut buf, &obj.encoding);

    Ok(buf)
}

/// Decode a v1 packed record back into an [`Object`].
pub fn decode_v1(buf: &[u8], algorithms: &[Algorithm]) -> Result<Object> {
    let digest_bytes: usize = algorithms.iter().map(|a| a.digest_len()).sum();
    let fixed_len = digest_bytes + 8 + 8 * 4 + 2;
    if buf.len() < fixed_len {
        return err_at!(
            CorruptStateError,
            msg: "packed record too short: {} < {}",
            buf.len(),
            fixed_len
        );
    }

    let mut pos = 0usize;
    let mut digests = DigestSet::new();
    for algo in algorithms {
        let len = algo.digest_len();
        let raw = buf[pos..pos + len].to_vec();
        pos += len;
        digests.insert(Digest::new(*algo, raw)?);
    }

    let size = u64::from_le_bytes(err_at!(CorruptStateError, buf[pos..pos + 8].try_into())?);
    pos += 8;
    let ctime = Timestamp::from_micros(u64::from_le_bytes(err_at!(
        CorruptStateError,
        buf[pos..pos + 8].try_into()
    )?));
    pos += 8;
    let mtime = Timestamp::from_micros(u64::from_le_bytes(err_at!(
        CorruptStateError,
        buf[pos..pos + 8].try_into()
    )?));
    pos += 8;
    let ptime = Timestamp::from_micros(u64::from_le_bytes(err_at!(
        CorruptStateError,
        buf[pos..pos + 8].try_into()
    )?));
    pos += 8;
    let raw_dtime = Timestamp::from_micros(u64::from_le_bytes(err_at!(
        CorruptStateError,
        buf[pos..pos + 8].try_into()
    )?));
    pos += 8;
    let dtime = if raw_dtime.is_none() { None } else { Some(raw_dtime) };

    let flags = Flags::from_bits(u16::from_le_bytes(err_at!(
        CorruptStateError,
        buf[pos..pos + 2].try_into()
    )?));
    pos += 2;

    let media_type = read_nul_terminated(buf, &mut pos)?
        .unwrap_or_else(|| crate::object::DEFAULT_MEDIA_TYPE.to_string());
    let language = read_nul_terminated(buf, &mut pos)?;
    let charset = read_nul_terminated(buf, &mut pos)?;
    let encoding = read_nul_terminated(buf, &mut pos)?;

    Ok(Object {
        digests,
        size,
        ctime,
        mtime,
        ptime,
        dtime,
        media_type,
        charset,
        language,
        encoding,
        flags,
        fresh: false,
    })
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
