//! Digest identifiers: `(algorithm, raw bytes)` pairs, serializable to an
//! RFC6920 `ni:` URI.

use data_encoding::BASE64URL_NOPAD;

use std::{cmp::Ordering, collections::BTreeMap, convert::TryFrom, fmt};

use crate::{err_at, Error, Result};

/// One of the digest algorithms this crate knows how to compute and encode.
///
/// Variant order is the crate's canonical algorithm order: it governs both
/// the concatenation order of digest bytes in the packed entry record (see
/// [`crate::record`]) and the order `algorithms` is serialized to the
/// control table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

/// All supported algorithms, in canonical order.
pub const ALL_ALGORITHMS: [Algorithm; 5] = [
    Algorithm::Md5,
    Algorithm::Sha1,
    Algorithm::Sha256,
    Algorithm::Sha384,
    Algorithm::Sha512,
];

/// Default primary algorithm for a freshly created store.
pub const DEFAULT_PRIMARY: Algorithm = Algorithm::Sha256;

impl Algorithm {
    /// Token used on the wire (`ni:///<algo>;...`) and in the control table's
    /// `algorithms`/`primary` keys.
    pub fn token(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha-1",
            Algorithm::Sha256 => "sha-256",
            Algorithm::Sha384 => "sha-384",
            Algorithm::Sha512 => "sha-512",
        }
    }

    /// Raw digest length in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Algorithm::Md5 => 16,
            Algorithm::Sha1 => 20,
            Algorithm::Sha256 => 32,
            Algorithm::Sha384 => 48,
            Algorithm::Sha512 => 64,
        }
    }

    /// Rank in canonical order; used to sort and to index fixed-size arrays.
    pub fn rank(&self) -> usize {
        ALL_ALGORITHMS.iter().position(|a| a == self).unwrap()
    }

    pub fn from_token(token: &str) -> Result<Algorithm> {
        ALL_ALGORITHMS
            .iter()
            .find(|a| a.token() == token)
            .copied()
            .ok_or_else(|| Error::ArgumentError(format!("unknown digest algorithm {:?}", token)))
    }
}

impl PartialOrd for Algorithm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Algorithm {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// A single digest: an algorithm tag paired with its raw binary digest.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Digest {
    algorithm: Algorithm,
    bytes: Vec<u8>,
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Digest({})", self.to_uri())
    }
}

impl Digest {
    /// Build a digest from raw bytes, validating the length against the
    /// algorithm's expected digest size.
    pub fn new(algorithm: Algorithm, bytes: Vec<u8>) -> Result<Digest> {
        if bytes.len() != algorithm.digest_len() {
            return err_at!(
                ArgumentError,
                msg: "{} digest must be {} bytes, got {}",
                algorithm,
                algorithm.digest_len(),
                bytes.len()
            );
        }
        Ok(Digest { algorithm, bytes })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Serialize as an RFC6920 `ni:///<algo>;<base64url-no-padding>` URI.
    pub fn to_uri(&self) -> String {
        format!(
            "ni:///{};{}",
            self.algorithm.token(),
            BASE64URL_NOPAD.encode(&self.bytes)
        )
    }

    /// Parse an RFC6920 `ni:` URI back into a digest.
    pub fn from_uri(uri: &str) -> Result<Digest> {
        let rest = uri.strip_prefix("ni:///").ok_or_else(|| {
            Error::ArgumentError(format!("not a ni: URI: {:?}", uri))
        })?;
        let (algo, b64) = rest
            .split_once(';')
            .ok_or_else(|| Error::ArgumentError(format!("malformed ni: URI: {:?}", uri)))?;
        let algorithm = Algorithm::from_token(algo)?;
        let bytes = err_at!(ArgumentError, BASE64URL_NOPAD.decode(b64.as_bytes()))?;
        Digest::new(algorithm, bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

/// The set of digests known for one object, one per algorithm the store was
/// configured with. Ordered by [`Algorithm`]'s canonical order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DigestSet(BTreeMap<Algorithm, Digest>);

impl DigestSet {
    pub fn new() -> DigestSet {
        DigestSet(BTreeMap::new())
    }

    pub fn insert(&mut self, digest: Digest) {
        self.0.insert(digest.algorithm(), digest);
    }

    pub fn get(&self, algorithm: Algorithm) -> Option<&Digest> {
        self.0.get(&algorithm)
    }

    pub fn contains(&self, algorithm: Algorithm) -> bool {
        self.0.contains_key(&algorithm)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Digest> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pick the digest for the given primary algorithm, erroring if the
    /// object was never scanned with it.
    pub fn primary(&self, primary: Algorithm) -> Result<&Digest> {
        self.get(primary)
            .ok_or_else(|| Error::Fatal(format!("object missing primary digest {}", primary)))
    }

    /// The digest belonging to the algorithm with the largest canonical
    /// rank among those present — used by `set_meta` to resolve an existing
    /// entry-id when several algorithms are available (prefer the "largest"
    /// available).
    pub fn largest_available(&self) -> Option<&Digest> {
        self.0.values().next_back()
    }
}

impl TryFrom<Vec<Digest>> for DigestSet {
    type Error = Error;

    fn try_from(digests: Vec<Digest>) -> Result<DigestSet> {
        let mut set = DigestSet::new();
        for d in digests {
            set.insert(d);
        }
        Ok(set)
    }
}

#[cfg(test)]
#[path = "digest_test.rs"]
mod digest_test;
