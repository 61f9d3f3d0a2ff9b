//! A content-addressable blob store with durable, multi-digest metadata.
//!
//! Objects are identified by one or more cryptographic digests (md5, sha-1,
//! sha-256, sha-384, sha-512), one of which is designated the *primary*
//! digest and used to name the object's blob on disk. Metadata — size,
//! timestamps, media type, charset, language, encoding, validation state,
//! and a tombstone/cache lifecycle — is kept durably in an LMDB environment
//! alongside the blob filesystem.
//!
//! [`Store`] is the entry point: open one with [`Config`], then `add`,
//! `get`, `remove`, `forget`, `list`, and `stats` against it.

mod blobstore;
mod config;
mod digest;
mod driver;
mod engine;
mod error;
mod object;
mod record;
mod scanner;
mod stats;
mod store;
mod timestamp;

pub use crate::blobstore::BlobHandle;
pub use crate::config::{Config, DEFAULT_EXPIRY_SECS, DEFAULT_MAPSIZE};
pub use crate::digest::{Algorithm, Digest, DigestSet, ALL_ALGORITHMS, DEFAULT_PRIMARY};
pub use crate::driver::{AddOptions, Driver, LmdbDriver};
pub use crate::engine::{Filter, MetaKey};
pub use crate::error::{Error, Result};
pub use crate::object::{Flags, Object, ValidationState};
pub use crate::scanner::{MagicSniffer, MimeSniffer};
pub use crate::stats::Stats;
pub use crate::store::Store;
pub use crate::timestamp::Timestamp;
