//! `Driver`: the composition that binds the blob filesystem and the
//! metadata engine under one transactional envelope, exposing `add`/`get`/
//! `remove`/`forget`/`stats`/`list`.

use std::{
    io::{Read, Seek},
    path::PathBuf,
};

use crate::{
    blobstore::{BlobHandle, BlobStore},
    config::Config,
    digest::DigestSet,
    engine::{self, query::Filter, LmdbEngine, MetaKey},
    object::{self, Object},
    scanner::{self, MagicSniffer, MimeSniffer},
    stats::Stats,
    timestamp::Timestamp,
    Result,
};

/// Per-call knobs for [`Driver::add`]. Bundled into one struct rather than a
/// long parameter list, the way `set_meta`'s caller-supplied fields cluster
/// naturally together.
#[derive(Clone, Debug, Default)]
pub struct AddOptions {
    /// A filename hint, used only to refine the detected media type.
    pub filename: Option<PathBuf>,
    /// A caller-asserted media type; wins only when sniffing doesn't
    /// contradict it.
    pub media_type: Option<String>,
    /// A caller-asserted charset; normalized and validated the same way as
    /// `media_type`.
    pub charset: Option<String>,
    /// A caller-asserted RFC5646 language tag.
    pub language: Option<String>,
    /// A caller-asserted encoding token (e.g. `gzip`).
    pub encoding: Option<String>,
    /// Explicit mtime; defaults to the scan time if absent.
    pub mtime: Option<Timestamp>,
    /// If true, keep an existing record's `mtime` across a merge.
    pub preserve: bool,
    /// If true, a malformed `media_type`/`charset`/`language`/`encoding` is
    /// a hard `ArgumentError` instead of being silently dropped.
    pub strict: bool,
}

/// The composition every concrete backend implements: blob storage plus
/// metadata engine, bound under one transactional envelope. See
/// [`crate::store::Store`] for the public-facing wrapper.
pub trait Driver {
    fn add<R: Read + Seek>(&self, source: &mut R, opts: AddOptions) -> Result<Object>;

    fn get(&self, key: MetaKey<'_>) -> Result<Option<(Object, Option<BlobHandle>)>>;

    /// Tombstone the record and erase its blob, returning an already-open
    /// handle to the blob's contents as they existed just before unlinking.
    fn remove(&self, digests: &DigestSet) -> Result<Option<(Object, Option<std::fs::File>)>>;

    /// Purge the record entirely and erase its blob, same handle semantics
    /// as [`Driver::remove`].
    fn forget(&self, digests: &DigestSet) -> Result<Option<(Object, Option<std::fs::File>)>>;

    fn list(&self, filter: &Filter) -> Result<Vec<Object>>;

    fn stats(&self) -> Result<Stats>;
}

/// The concrete LMDB-metadata-engine-backed driver.
pub struct LmdbDriver {
    blobs: BlobStore,
    engine: LmdbEngine,
    sniffer: Box<dyn MimeSniffer + Send + Sync>,
    algorithms: Vec<crate::digest::Algorithm>,
    primary: crate::digest::Algorithm,
}

impl LmdbDriver {
    pub fn open(config: &Config) -> Result<LmdbDriver> {
        config.validate()?;
        let blobs = BlobStore::setup(&config.dir, config.umask)?;
        let engine = LmdbEngine::open(config)?;
        Ok(LmdbDriver {
            blobs,
            engine,
            sniffer: Box::new(MagicSniffer),
            algorithms: config.algorithms.clone(),
            primary: config.primary,
        })
    }

    /// Swap in a custom sniffer, e.g. a test double or a stricter corporate
    /// MIME policy. Kept separate from `open` so the common path stays a
    /// one-liner.
    pub fn set_sniffer(&mut self, sniffer: Box<dyn MimeSniffer + Send + Sync>) -> &mut Self {
        self.sniffer = sniffer;
        self
    }
}

impl Driver for LmdbDriver {
    fn add<R: Read + Seek>(&self, source: &mut R, opts: AddOptions) -> Result<Object> {
        let scanned = scanner::scan(
            source,
            &self.algorithms,
            self.sniffer.as_ref(),
            opts.filename.as_deref(),
            opts.media_type.as_deref(),
            opts.strict,
        )?;

        let now = Timestamp::now();
        let mut new_in = Object::new(scanned.digests, scanned.size, now);
        new_in.media_type = scanned.media_type;
        if let Some(mtime) = opts.mtime {
            new_in.mtime = mtime;
        }
        if let Some(charset) = &opts.charset {
            new_in.charset = object::validate_charset(charset, opts.strict)?;
        }
        if let Some(language) = &opts.language {
            new_in.language = object::validate_language(language, opts.strict)?;
        }
        if let Some(encoding) = &opts.encoding {
            new_in.encoding = object::validate_encoding(encoding, opts.strict)?;
        }

        let mut tempfh = self.blobs.create_temp()?;
        crate::err_at!(IOError, std::io::copy(source, &mut tempfh))?;

        let result = self.engine.set_meta(&new_in, opts.preserve)?;
        let mut object = result.object;
        object.fresh = result.changed;

        if result.changed {
            let primary = object.digests.primary(self.primary)?.clone();
            self.blobs.settle(&primary, tempfh, object.mtime, true)?;
        }

        Ok(object)
    }

    fn get(&self, key: MetaKey<'_>) -> Result<Option<(Object, Option<BlobHandle>)>> {
        let obj = match self.engine.get_meta(key)? {
            Some(obj) => obj,
            None => return Ok(None),
        };
        let handle = if obj.is_live() {
            self.blobs.get(obj.digests.primary(self.primary)?, false)?
        } else {
            None
        };
        Ok(Some((obj, handle)))
    }

    fn remove(&self, digests: &DigestSet) -> Result<Option<(Object, Option<std::fs::File>)>> {
        let removed = match self.engine.mark_meta_deleted(digests)? {
            Some(obj) => obj,
            None => return Ok(None),
        };
        let primary = removed.digests.primary(self.primary)?;
        let handle = self.blobs.erase(primary)?;
        Ok(Some((removed, handle)))
    }

    fn forget(&self, digests: &DigestSet) -> Result<Option<(Object, Option<std::fs::File>)>> {
        let purged = match self.engine.remove_meta(digests)? {
            Some(obj) => obj,
            None => return Ok(None),
        };
        let primary = purged.digests.primary(self.primary)?;
        let handle = self.blobs.erase(primary)?;
        Ok(Some((purged, handle)))
    }

    fn list(&self, filter: &Filter) -> Result<Vec<Object>> {
        engine::query::list(&self.engine, filter)
    }

    fn stats(&self) -> Result<Stats> {
        let (ctime, mtime, objects, deleted, bytes) = self.engine.stats()?;
        Ok(Stats {
            ctime,
            mtime,
            objects,
            deleted,
            bytes,
            types: self.engine.facet_counts("type")?,
            languages: self.engine.facet_counts("language")?,
            charsets: self.engine.facet_counts("charset")?,
            encodings: self.engine.facet_counts("encoding")?,
        })
    }
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod driver_test;
