//! The object scanner: one streaming pass over a byte source that computes
//! every configured digest, tallies size, and resolves a final media type
//! from content sniffing, a path hint, and a caller-supplied hint.

use std::{
    io::{Read, Seek, SeekFrom},
    path::Path,
};

use crate::{
    digest::{Algorithm, Digest, DigestSet},
    err_at,
    object::{validate_media_type, DEFAULT_MEDIA_TYPE},
    Result,
};

/// Minimum sample size retained for MIME sniffing: large enough to cover
/// OOXML's zip-central-directory-adjacent magic bytes.
pub const SAMPLE_SIZE: usize = 8192;

const READ_CHUNK: usize = 64 * 1024;

/// Isolates the magic-byte sniffer behind a trait, the way this corpus
/// isolates other pluggable external dependencies behind a narrow trait
/// rather than calling the dependency directly from business logic.
pub trait MimeSniffer {
    /// Inspect a content sample and return a best-guess media type, or
    /// `None` if nothing was recognized.
    fn sniff(&self, sample: &[u8]) -> Option<String>;
}

/// Default sniffer: magic-byte detection via the `infer` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct MagicSniffer;

impl MimeSniffer for MagicSniffer {
    fn sniff(&self, sample: &[u8]) -> Option<String> {
        infer::get(sample).map(|kind| kind.mime_type().to_string())
    }
}

/// The outcome of one `scan` call.
#[derive(Clone, Debug)]
pub struct ScanResult {
    pub digests: DigestSet,
    pub size: u64,
    pub media_type: String,
}

enum Hasher {
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
}

impl Hasher {
    fn new(algo: Algorithm) -> Hasher {
        match algo {
            Algorithm::Md5 => {
                use md5::Digest as _;
                Hasher::Md5(md5::Md5::new())
            }
            Algorithm::Sha1 => {
                use sha1::Digest as _;
                Hasher::Sha1(sha1::Sha1::new())
            }
            Algorithm::Sha256 => {
                use sha2::Digest as _;
                Hasher::Sha256(sha2::Sha256::new())
            }
            Algorithm::Sha384 => {
                use sha2::Digest as _;
                Hasher::Sha384(sha2::Sha384::new())
            }
            Algorithm::Sha512 => {
                use sha2::Digest as _;
                Hasher::Sha512(sha2::Sha512::new())
            }
        }
    }

    fn algorithm(&self) -> Algorithm {
        match self {
            Hasher::Md5(_) => Algorithm::Md5,
            Hasher::Sha1(_) => Algorithm::Sha1,
            Hasher::Sha256(_) => Algorithm::Sha256,
            Hasher::Sha384(_) => Algorithm::Sha384,
            Hasher::Sha512(_) => Algorithm::Sha512,
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(h) => {
                use md5::Digest as _;
                h.update(data)
            }
            Hasher::Sha1(h) => {
                use sha1::Digest as _;
                h.update(data)
            }
            Hasher::Sha256(h) => {
                use sha2::Digest as _;
                h.update(data)
            }
            Hasher::Sha384(h) => {
                use sha2::Digest as _;
                h.update(data)
            }
            Hasher::Sha512(h) => {
                use sha2::Digest as _;
                h.update(data)
            }
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Hasher::Md5(h) => {
                use md5::Digest as _;
                h.finalize().to_vec()
            }
            Hasher::Sha1(h) => {
                use sha1::Digest as _;
                h.finalize().to_vec()
            }
            Hasher::Sha256(h) => {
                use sha2::Digest as _;
                h.finalize().to_vec()
            }
            Hasher::Sha384(h) => {
                use sha2::Digest as _;
                h.finalize().to_vec()
            }
            Hasher::Sha512(h) => {
                use sha2::Digest as _;
                h.finalize().to_vec()
            }
        }
    }
}

/// Stream `source` through every algorithm in `algorithms`, in one pass,
/// then rewind it to the start. `filename`, if given, is used for a
/// path-based media-type refinement; `caller_type`, if given, is a
/// caller-asserted hint that wins only when the sniffed type doesn't refine
/// it. `strict` governs whether a malformed `caller_type` is a hard error or
/// a silent drop.
pub fn scan<R: Read + Seek>(
    source: &mut R,
    algorithms: &[Algorithm],
    sniffer: &dyn MimeSniffer,
    filename: Option<&Path>,
    caller_type: Option<&str>,
    strict: bool,
) -> Result<ScanResult> {
    let mut hashers: Vec<Hasher> = algorithms.iter().map(|a| Hasher::new(*a)).collect();
    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    let mut size: u64 = 0;
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let n = err_at!(IOError, source.read(&mut buf))?;
        if n == 0 {
            break;
        }
        let chunk = &buf[..n];
        for h in hashers.iter_mut() {
            h.update(chunk);
        }
        size += n as u64;
        if sample.len() < SAMPLE_SIZE {
            let take = (SAMPLE_SIZE - sample.len()).min(chunk.len());
            sample.extend_from_slice(&chunk[..take]);
        }
    }

    err_at!(IOError, source.seek(SeekFrom::Start(0)))?;

    let mut digests = DigestSet::new();
    for h in hashers {
        let algo = h.algorithm();
        digests.insert(Digest::new(algo, h.finalize())?);
    }

    let media_type = resolve_media_type(&sample, sniffer, filename, caller_type, strict)?;

    Ok(ScanResult { digests, size, media_type })
}

fn resolve_media_type(
    sample: &[u8],
    sniffer: &dyn MimeSniffer,
    filename: Option<&Path>,
    caller_type: Option<&str>,
    strict: bool,
) -> Result<String> {
    let mut detected = sniffer.sniff(sample).unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());

    if let Some(path) = filename {
        if let Some(path_type) = guess_from_extension(path) {
            if is_refinement(&path_type, &detected) {
                detected = path_type;
            }
        }
    }

    match caller_type {
        None => Ok(detected),
        Some(raw) => match validate_media_type(raw, strict)? {
            None => Ok(detected),
            Some(caller) => {
                if is_refinement(&detected, &caller) {
                    Ok(caller)
                } else {
                    Ok(detected)
                }
            }
        },
    }
}

/// Whether `candidate` is a strictly more specific type than `base`: either
/// `base` is the generic catch-all, or `base` is the generic `text/plain`
/// and `candidate` is some other `text/*` subtype. Intentionally
/// conservative, covering only the two cases a magic-byte/extension sniffer
/// can actually distinguish.
fn is_refinement(candidate: &str, base: &str) -> bool {
    if candidate == base {
        return false;
    }
    if base == DEFAULT_MEDIA_TYPE {
        return true;
    }
    if base == "text/plain" {
        return candidate.starts_with("text/");
    }
    false
}

/// A small built-in extension table, used only to produce a path-based
/// refinement hint; final authority always rests with content sniffing
/// unless this guess refines it.
fn guess_from_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "js" => "application/javascript",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime.to_string())
}

#[cfg(test)]
#[path = "scanner_test.rs"]
mod scanner_test;
