//! The concrete LMDB-backed implementation of the metadata engine: database
//! layout, schema selection, and the `set_meta`/`get_meta`/
//! `mark_meta_deleted`/`remove_meta`/`sweep_expired` transactional envelope.

use lmdb::{Cursor, Database, DatabaseFlags, Environment, EnvironmentFlags, Transaction, WriteFlags};
use log::{debug, info, warn};

use std::{
    collections::HashMap,
    convert::{TryFrom, TryInto},
    fs,
    path::Path,
    sync::Arc,
};

use crate::{
    config::Config,
    digest::{Algorithm, Digest, DigestSet},
    err_at,
    object::Object,
    record::{self, Schema},
    timestamp::Timestamp,
    Error, Result,
};

/// Everything needed to look a record up: by entry-id, by a single digest,
/// or by a digest set (any known algorithm suffices, largest-ranked
/// preferred).
pub enum MetaKey<'a> {
    EntryId(u64),
    Digest(&'a Digest),
    Digests(&'a DigestSet),
}

/// The result of a `set_meta` call: the merged record, and whether it
/// differs from what was previously stored (a brand-new entry, a
/// resurrection, or any field change all count as a change).
pub struct SetMetaResult {
    pub object: Object,
    pub changed: bool,
}

struct Indexes {
    size: Database,
    ctime: Database,
    mtime: Database,
    ptime: Database,
    dtime: Database,
    etime: Database,
    media_type: Database,
    language: Database,
    charset: Database,
    encoding: Database,
}

/// An open LMDB-backed metadata engine.
pub struct LmdbEngine {
    env: Arc<Environment>,
    control: Database,
    entry: Database,
    digest_dbs: HashMap<Algorithm, Database>,
    idx: Indexes,
    algorithms: Vec<Algorithm>,
    primary: Algorithm,
    schema: Schema,
    expiry_secs: u64,
}

const CONTROL_VERSION: &str = "version";
const CONTROL_CTIME: &str = "ctime";
const CONTROL_MTIME: &str = "mtime";
const CONTROL_EXPIRY: &str = "expiry";
const CONTROL_OBJECTS: &str = "objects";
const CONTROL_DELETED: &str = "deleted";
const CONTROL_BYTES: &str = "bytes";
const CONTROL_ALGORITHMS: &str = "algorithms";
const CONTROL_PRIMARY: &str = "primary";

impl LmdbEngine {
    /// Open (creating if absent) the metadata environment under
    /// `<config.dir>/meta`.
    pub fn open(config: &Config) -> Result<LmdbEngine> {
        let meta_dir = config.dir.join("meta");
        err_at!(IOError, fs::create_dir_all(&meta_dir), "{:?}", meta_dir)?;

        let env = open_environment(&meta_dir, config.mapsize)?;

        let control = err_at!(LmdbError, env.create_db(Some("control"), DatabaseFlags::empty()))?;
        let entry = err_at!(
            LmdbError,
            env.create_db(Some("entry"), DatabaseFlags::INTEGER_KEY)
        )?;

        let mut digest_dbs = HashMap::new();
        for algo in &config.algorithms {
            let name = format!("digest.{}", algo.token());
            let db = err_at!(LmdbError, env.create_db(Some(&name), DatabaseFlags::DUP_SORT))?;
            digest_dbs.insert(*algo, db);
        }

        let idx = Indexes {
            size: err_at!(
                LmdbError,
                env.create_db(Some("ix.size"), DatabaseFlags::INTEGER_KEY | DatabaseFlags::DUP_SORT)
            )?,
            ctime: err_at!(
                LmdbError,
                env.create_db(Some("ix.ctime"), DatabaseFlags::INTEGER_KEY | DatabaseFlags::DUP_SORT)
            )?,
            mtime: err_at!(
                LmdbError,
                env.create_db(Some("ix.mtime"), DatabaseFlags::INTEGER_KEY | DatabaseFlags::DUP_SORT)
            )?,
            ptime: err_at!(
                LmdbError,
                env.create_db(Some("ix.ptime"), DatabaseFlags::INTEGER_KEY | DatabaseFlags::DUP_SORT)
            )?,
            dtime: err_at!(
                LmdbError,
                env.create_db(Some("ix.dtime"), DatabaseFlags::INTEGER_KEY | DatabaseFlags::DUP_SORT)
            )?,
            etime: err_at!(
                LmdbError,
                env.create_db(Some("ix.etime"), DatabaseFlags::INTEGER_KEY | DatabaseFlags::DUP_SORT)
            )?,
            media_type: err_at!(LmdbError, env.create_db(Some("ix.type"), DatabaseFlags::DUP_SORT))?,
            language: err_at!(LmdbError, env.create_db(Some("ix.language"), DatabaseFlags::DUP_SORT))?,
            charset: err_at!(LmdbError, env.create_db(Some("ix.charset"), DatabaseFlags::DUP_SORT))?,
            encoding: err_at!(LmdbError, env.create_db(Some("ix.encoding"), DatabaseFlags::DUP_SORT))?,
        };

        let env = Arc::new(env);

        let schema = {
            let txn = err_at!(LmdbError, env.begin_ro_txn())?;
            let existing = txn.get(control, &CONTROL_VERSION).ok();
            let schema = Schema::from_control_value(existing)?;
            schema
        };

        let mut engine = LmdbEngine {
            env,
            control,
            entry,
            digest_dbs,
            idx,
            algorithms: config.algorithms.clone(),
            primary: config.primary,
            schema,
            expiry_secs: config.expiry_secs,
        };

        if schema == Schema::V0 {
            // A fresh store (nothing written yet) always starts at V1; only
            // a pre-existing store with an explicit absent `version` key
            // stays readable as V0.
            let is_fresh = {
                let txn = err_at!(LmdbError, engine.env.begin_ro_txn())?;
                txn.get(control, &CONTROL_OBJECTS).is_err()
            };
            if is_fresh {
                engine.schema = Schema::V1;
                engine.bootstrap_control()?;
                info!(target: "engine", "{:?}, bootstrapped fresh control table", meta_dir);
            }
        }

        info!(target: "engine", "{:?}, opened at schema {:?}", meta_dir, engine.schema);
        Ok(engine)
    }

    fn bootstrap_control(&self) -> Result<()> {
        let mut txn = err_at!(LmdbError, self.env.begin_rw_txn())?;
        let now = Timestamp::now();
        put_control_str(&mut txn, self.control, CONTROL_VERSION, Schema::V1.control_value())?;
        put_control_u64(&mut txn, self.control, CONTROL_CTIME, now.to_micros())?;
        put_control_u64(&mut txn, self.control, CONTROL_MTIME, now.to_micros())?;
        put_control_u64(&mut txn, self.control, CONTROL_EXPIRY, self.expiry_secs)?;
        put_control_u64(&mut txn, self.control, CONTROL_OBJECTS, 0)?;
        put_control_u64(&mut txn, self.control, CONTROL_DELETED, 0)?;
        put_control_u64(&mut txn, self.control, CONTROL_BYTES, 0)?;
        let algos = self
            .algorithms
            .iter()
            .map(|a| a.token())
            .collect::<Vec<_>>()
            .join(",");
        put_control_str(&mut txn, self.control, CONTROL_ALGORITHMS, algos.as_bytes())?;
        put_control_str(&mut txn, self.control, CONTROL_PRIMARY, self.primary.token().as_bytes())?;
        err_at!(LmdbError, txn.commit())
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    /// Resolve an entry-id from any known digest in `digests`, rejecting a
    /// write whose non-matching digests disagree about which entry they
    /// belong to (secondary-digest collision).
    fn resolve_entry_id<T: Transaction>(&self, txn: &T, digests: &DigestSet) -> Result<Option<u64>> {
        let mut found: Option<(Algorithm, u64)> = None;
        for algo in &self.algorithms {
            let digest = match digests.get(*algo) {
                Some(d) => d,
                None => continue,
            };
            let db = match self.digest_dbs.get(algo) {
                Some(db) => *db,
                None => continue,
            };
            if let Ok(raw) = txn.get(db, &digest.as_bytes()) {
                let id = decode_id(raw)?;
                match found {
                    None => found = Some((*algo, id)),
                    Some((prev_algo, prev_id)) if prev_id != id => {
                        warn!(
                            target: "engine",
                            "digest collision: {} -> entry {}, {} -> entry {}",
                            algo, id, prev_algo, prev_id
                        );
                        return err_at!(
                            ArgumentError,
                            msg: "secondary digest collision: {} maps to entry {} but {} maps to entry {}",
                            algo,
                            id,
                            prev_algo,
                            prev_id
                        );
                    }
                    _ => {}
                }
            }
        }
        Ok(found.map(|(_, id)| id))
    }

    fn load_entry<T: Transaction>(&self, txn: &T, id: u64) -> Result<Object> {
        // Every entry this engine ever writes is v1 (see `bootstrap_control`);
        // a v0 store is only ever read here to the extent its layout happens
        // to coincide with v1's, since v0 fixtures to cross-check a true
        // legacy decoder against were never available.
        let raw = err_at!(LmdbError, txn.get(self.entry, &id.to_ne_bytes()))?;
        record::decode_v1(raw, &self.algorithms)
    }

    fn next_entry_id<T: Transaction>(&self, txn: &T) -> Result<u64> {
        let mut cursor = err_at!(LmdbError, txn.open_ro_cursor(self.entry))?;
        let max = cursor
            .iter()
            .filter_map(|r| r.ok())
            .filter_map(|(k, _)| <[u8; 8]>::try_from(k).ok())
            .map(u64::from_ne_bytes)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    /// Transactional write: resolve-or-allocate an entry-id, merge against
    /// any existing record, and persist the result.
    pub fn set_meta(&self, new_in: &Object, preserve: bool) -> Result<SetMetaResult> {
        let now = Timestamp::now();
        let mut txn = err_at!(LmdbError, self.env.begin_rw_txn())?;

        let existing_id = self.resolve_entry_id(&txn, &new_in.digests)?;
        let old = match existing_id {
            Some(id) => Some(self.load_entry(&txn, id)?),
            None => None,
        };

        let merged = merge(old.as_ref(), new_in, preserve, now, self.expiry_secs);

        if let Some(old) = &old {
            if packed_equal(old, &merged, &self.algorithms)? {
                return Ok(SetMetaResult {
                    object: old.clone(),
                    changed: false,
                });
            }
        }

        let id = match existing_id {
            Some(id) => id,
            None => self.next_entry_id(&txn)?,
        };

        let packed = record::encode_v1(&merged, &self.algorithms)?;
        err_at!(
            LmdbError,
            txn.put(self.entry, &id.to_ne_bytes(), &packed, WriteFlags::empty())
        )?;

        if old.is_none() {
            for algo in &self.algorithms {
                if let (Some(digest), Some(db)) = (merged.digests.get(*algo), self.digest_dbs.get(algo)) {
                    err_at!(
                        LmdbError,
                        txn.put(*db, &digest.as_bytes(), &id.to_ne_bytes(), WriteFlags::empty())
                    )?;
                }
            }
            reindex_u64(&mut txn, self.idx.size, id, None, Some(merged.size))?;
            reindex_u64(&mut txn, self.idx.ctime, id, None, Some(merged.ctime.to_micros()))?;
        }

        reindex_u64(
            &mut txn,
            self.idx.mtime,
            id,
            old.as_ref().map(|o| o.mtime.to_micros()),
            Some(merged.mtime.to_micros()),
        )?;
        reindex_u64(
            &mut txn,
            self.idx.ptime,
            id,
            old.as_ref().map(|o| o.ptime.to_micros()),
            Some(merged.ptime.to_micros()),
        )?;

        let old_dtime_key = old.as_ref().filter(|o| !o.is_cache()).and_then(|o| o.dtime);
        let new_dtime_key = if merged.is_cache() { None } else { merged.dtime };
        reindex_u64(
            &mut txn,
            self.idx.dtime,
            id,
            old_dtime_key.map(|t| t.to_micros()),
            new_dtime_key.map(|t| t.to_micros()),
        )?;

        let old_etime_key = old.as_ref().filter(|o| o.is_cache()).and_then(|o| o.dtime);
        let new_etime_key = if merged.is_cache() { merged.dtime } else { None };
        reindex_u64(
            &mut txn,
            self.idx.etime,
            id,
            old_etime_key.map(|t| t.to_micros()),
            new_etime_key.map(|t| t.to_micros()),
        )?;

        reindex_token(
            &mut txn,
            self.idx.media_type,
            id,
            old.as_ref().map(|o| o.media_type.as_str()),
            Some(merged.media_type.as_str()),
        )?;
        reindex_token(
            &mut txn,
            self.idx.charset,
            id,
            old.as_ref().and_then(|o| o.charset.as_deref()),
            merged.charset.as_deref(),
        )?;
        reindex_token(
            &mut txn,
            self.idx.language,
            id,
            old.as_ref().and_then(|o| o.language.as_deref()),
            merged.language.as_deref(),
        )?;
        reindex_token(
            &mut txn,
            self.idx.encoding,
            id,
            old.as_ref().and_then(|o| o.encoding.as_deref()),
            merged.encoding.as_deref(),
        )?;

        let (d_objects, d_deleted, d_bytes) = transition_delta(
            old.as_ref().map(|o| o.is_live()),
            merged.is_live(),
            merged.size,
        );
        apply_counter_deltas(&mut txn, self.control, d_objects, d_deleted, d_bytes)?;
        put_control_u64(&mut txn, self.control, CONTROL_MTIME, now.to_micros())?;

        err_at!(LmdbError, txn.commit())?;

        let mut result = merged;
        result.fresh = true;
        debug!(
            target: "engine",
            "entry {}, {} ({})",
            id,
            if old.is_none() { "created" } else { "merged" },
            if result.is_live() { "live" } else if result.is_cache() { "cache" } else { "tombstone" },
        );
        Ok(SetMetaResult {
            object: result,
            changed: true,
        })
    }

    /// Read-only lookup by entry-id, digest, or digest set.
    pub fn get_meta(&self, key: MetaKey) -> Result<Option<Object>> {
        let txn = err_at!(LmdbError, self.env.begin_ro_txn())?;
        let id = match key {
            MetaKey::EntryId(id) => Some(id),
            MetaKey::Digest(digest) => {
                let db = self.digest_dbs.get(&digest.algorithm()).ok_or_else(|| {
                    Error::ArgumentError(format!("algorithm {} not configured", digest.algorithm()))
                })?;
                txn.get(*db, &digest.as_bytes()).ok().map(|raw| decode_id(raw)).transpose()?
            }
            MetaKey::Digests(digests) => self.resolve_entry_id(&txn, digests)?,
        };
        match id {
            Some(id) => Ok(Some(self.load_entry(&txn, id)?)),
            None => Ok(None),
        }
    }

    /// Tombstone a live record: set `dtime=now`, move counters, leave the
    /// entry in place. No-op if already non-live.
    pub fn mark_meta_deleted(&self, digests: &DigestSet) -> Result<Option<Object>> {
        let mut txn = err_at!(LmdbError, self.env.begin_rw_txn())?;
        let id = match self.resolve_entry_id(&txn, digests)? {
            Some(id) => id,
            None => return Ok(None),
        };
        let old = self.load_entry(&txn, id)?;
        if !old.is_live() {
            return Ok(Some(old));
        }

        let now = Timestamp::now();
        let mut merged = old.clone();
        merged.dtime = Some(now);
        merged.ptime = now;

        let packed = record::encode_v1(&merged, &self.algorithms)?;
        err_at!(
            LmdbError,
            txn.put(self.entry, &id.to_ne_bytes(), &packed, WriteFlags::empty())
        )?;
        reindex_u64(&mut txn, self.idx.ptime, id, Some(old.ptime.to_micros()), Some(now.to_micros()))?;
        reindex_u64(&mut txn, self.idx.dtime, id, None, Some(now.to_micros()))?;

        apply_counter_deltas(&mut txn, self.control, 0, 1, -(merged.size as i64))?;
        put_control_u64(&mut txn, self.control, CONTROL_MTIME, now.to_micros())?;

        err_at!(LmdbError, txn.commit())?;
        debug!(target: "engine", "entry {}, tombstoned", id);
        Ok(Some(merged))
    }

    /// Purge an entry and every index reference to it (`forget`).
    pub fn remove_meta(&self, digests: &DigestSet) -> Result<Option<Object>> {
        let mut txn = err_at!(LmdbError, self.env.begin_rw_txn())?;
        let id = match self.resolve_entry_id(&txn, digests)? {
            Some(id) => id,
            None => return Ok(None),
        };
        let old = self.load_entry(&txn, id)?;
        self.purge_locked(&mut txn, id, &old)?;
        err_at!(LmdbError, txn.commit())?;
        Ok(Some(old))
    }

    fn purge_locked(&self, txn: &mut lmdb::RwTransaction, id: u64, old: &Object) -> Result<()> {
        err_at!(LmdbError, txn.del(self.entry, &id.to_ne_bytes(), None))?;

        for algo in &self.algorithms {
            if let (Some(digest), Some(db)) = (old.digests.get(*algo), self.digest_dbs.get(algo)) {
                err_at!(LmdbError, txn.del(*db, &digest.as_bytes(), Some(&id.to_ne_bytes()[..])))?;
            }
        }

        reindex_u64(txn, self.idx.size, id, Some(old.size), None)?;
        reindex_u64(txn, self.idx.ctime, id, Some(old.ctime.to_micros()), None)?;
        reindex_u64(txn, self.idx.mtime, id, Some(old.mtime.to_micros()), None)?;
        reindex_u64(txn, self.idx.ptime, id, Some(old.ptime.to_micros()), None)?;
        if old.is_cache() {
            reindex_u64(txn, self.idx.etime, id, old.dtime.map(|t| t.to_micros()), None)?;
        } else {
            reindex_u64(txn, self.idx.dtime, id, old.dtime.map(|t| t.to_micros()), None)?;
        }
        reindex_token(txn, self.idx.media_type, id, Some(old.media_type.as_str()), None)?;
        reindex_token(txn, self.idx.charset, id, old.charset.as_deref(), None)?;
        reindex_token(txn, self.idx.language, id, old.language.as_deref(), None)?;
        reindex_token(txn, self.idx.encoding, id, old.encoding.as_deref(), None)?;

        let now = Timestamp::now();
        if old.is_live() {
            apply_counter_deltas(txn, self.control, -1, 0, -(old.size as i64))?;
        } else {
            apply_counter_deltas(txn, self.control, -1, -1, 0)?;
        }
        put_control_u64(txn, self.control, CONTROL_MTIME, now.to_micros())?;
        Ok(())
    }

    /// Purge every cache entry whose expiry (`etime`) is at or before `now`.
    pub fn sweep_expired(&self, now: Timestamp) -> Result<Vec<Object>> {
        let mut purged = Vec::new();
        let candidate_ids: Vec<u64> = {
            let txn = err_at!(LmdbError, self.env.begin_ro_txn())?;
            let mut cursor = err_at!(LmdbError, txn.open_ro_cursor(self.idx.etime))?;
            let mut ids = Vec::new();
            for item in cursor.iter() {
                let (key, val) = err_at!(LmdbError, item)?;
                let when = decode_id(key)?;
                if when <= now.to_micros() {
                    ids.push(decode_id(val)?);
                }
            }
            ids
        };

        for id in candidate_ids {
            let mut txn = err_at!(LmdbError, self.env.begin_rw_txn())?;
            let old = self.load_entry(&txn, id)?;
            self.purge_locked(&mut txn, id, &old)?;
            err_at!(LmdbError, txn.commit())?;
            purged.push(old);
        }
        Ok(purged)
    }

    pub fn env(&self) -> &Arc<Environment> {
        &self.env
    }

    pub(crate) fn entry_db(&self) -> Database {
        self.entry
    }

    pub(crate) fn index_db(&self, name: &str) -> Option<Database> {
        match name {
            "size" => Some(self.idx.size),
            "ctime" => Some(self.idx.ctime),
            "mtime" => Some(self.idx.mtime),
            "ptime" => Some(self.idx.ptime),
            "dtime" => Some(self.idx.dtime),
            "etime" => Some(self.idx.etime),
            "type" => Some(self.idx.media_type),
            "language" => Some(self.idx.language),
            "charset" => Some(self.idx.charset),
            "encoding" => Some(self.idx.encoding),
            _ => None,
        }
    }

    pub(crate) fn decode_entry(&self, raw: &[u8]) -> Result<Object> {
        record::decode_v1(raw, &self.algorithms)
    }

    pub fn stats(&self) -> Result<(Timestamp, Timestamp, u64, u64, u64)> {
        let txn = err_at!(LmdbError, self.env.begin_ro_txn())?;
        let ctime = Timestamp::from_micros(get_control_u64(&txn, self.control, CONTROL_CTIME)?);
        let mtime = Timestamp::from_micros(get_control_u64(&txn, self.control, CONTROL_MTIME)?);
        let objects = get_control_u64(&txn, self.control, CONTROL_OBJECTS)?;
        let deleted = get_control_u64(&txn, self.control, CONTROL_DELETED)?;
        let bytes = get_control_u64(&txn, self.control, CONTROL_BYTES)?;
        Ok((ctime, mtime, objects, deleted, bytes))
    }

    /// Distinct-value counts for a token index (`type`/`language`/`charset`/
    /// `encoding`), used to populate [`crate::stats::Stats`].
    pub fn facet_counts(&self, which: &str) -> Result<HashMap<String, u64>> {
        let db = self
            .index_db(which)
            .ok_or_else(|| Error::Fatal(format!("no such facet index {:?}", which)))?;
        let txn = err_at!(LmdbError, self.env.begin_ro_txn())?;
        let mut cursor = err_at!(LmdbError, txn.open_ro_cursor(db))?;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for item in cursor.iter() {
            let (key, _) = err_at!(LmdbError, item)?;
            let token = err_at!(CorruptStateError, std::str::from_utf8(key))?.to_string();
            *counts.entry(token).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

fn open_environment(dir: &Path, mapsize: usize) -> Result<Environment> {
    let mut builder = Environment::new();
    builder.set_max_dbs(16);
    builder.set_map_size(mapsize);
    builder.set_flags(EnvironmentFlags::empty());
    err_at!(LmdbError, builder.open(dir), "{:?}", dir)
}

fn decode_id(raw: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = err_at!(CorruptStateError, raw.try_into())?;
    Ok(u64::from_ne_bytes(arr))
}

fn get_control_u64<T: Transaction>(txn: &T, control: Database, key: &str) -> Result<u64> {
    let raw = err_at!(LmdbError, txn.get(control, &key))?;
    let text = err_at!(CorruptStateError, std::str::from_utf8(raw))?;
    err_at!(CorruptStateError, text.parse())
}

fn put_control_u64(txn: &mut lmdb::RwTransaction, control: Database, key: &str, value: u64) -> Result<()> {
    put_control_str(txn, control, key, value.to_string().as_bytes())
}

fn put_control_str(txn: &mut lmdb::RwTransaction, control: Database, key: &str, value: &[u8]) -> Result<()> {
    err_at!(LmdbError, txn.put(control, &key, &value, WriteFlags::empty()))
}

fn apply_counter_deltas(
    txn: &mut lmdb::RwTransaction,
    control: Database,
    d_objects: i64,
    d_deleted: i64,
    d_bytes: i64,
) -> Result<()> {
    let objects = apply_delta(get_control_u64(txn, control, CONTROL_OBJECTS)?, d_objects);
    let deleted = apply_delta(get_control_u64(txn, control, CONTROL_DELETED)?, d_deleted);
    let bytes = apply_delta(get_control_u64(txn, control, CONTROL_BYTES)?, d_bytes);
    put_control_u64(txn, control, CONTROL_OBJECTS, objects)?;
    put_control_u64(txn, control, CONTROL_DELETED, deleted)?;
    put_control_u64(txn, control, CONTROL_BYTES, bytes)?;
    Ok(())
}

fn apply_delta(base: u64, delta: i64) -> u64 {
    if delta < 0 {
        base.saturating_sub((-delta) as u64)
    } else {
        base + delta as u64
    }
}

/// `objects`/`deleted`/`bytes` deltas for a live/non-live transition. Cache
/// entries are non-live (they always carry a `dtime`), so they fall into the
/// same buckets as tombstones here — the cache-bit only affects which
/// secondary index (`dtime` vs `etime`) carries the record, not counting.
fn transition_delta(old_live: Option<bool>, new_live: bool, size: u64) -> (i64, i64, i64) {
    match (old_live, new_live) {
        (None, true) => (1, 0, size as i64),
        (None, false) => (1, 1, 0),
        (Some(true), true) => (0, 0, 0),
        (Some(true), false) => (0, 1, -(size as i64)),
        (Some(false), true) => (0, -1, size as i64),
        (Some(false), false) => (0, 0, 0),
    }
}

fn reindex_u64(
    txn: &mut lmdb::RwTransaction,
    db: Database,
    id: u64,
    old_key: Option<u64>,
    new_key: Option<u64>,
) -> Result<()> {
    if old_key == new_key {
        return Ok(());
    }
    if let Some(k) = old_key {
        err_at!(LmdbError, txn.del(db, &k.to_ne_bytes(), Some(&id.to_ne_bytes()[..])))?;
    }
    if let Some(k) = new_key {
        err_at!(LmdbError, txn.put(db, &k.to_ne_bytes(), &id.to_ne_bytes(), WriteFlags::empty()))?;
    }
    Ok(())
}

fn reindex_token(
    txn: &mut lmdb::RwTransaction,
    db: Database,
    id: u64,
    old_key: Option<&str>,
    new_key: Option<&str>,
) -> Result<()> {
    if old_key == new_key {
        return Ok(());
    }
    if let Some(k) = old_key {
        err_at!(LmdbError, txn.del(db, &k.as_bytes(), Some(&id.to_ne_bytes()[..])))?;
    }
    if let Some(k) = new_key {
        err_at!(LmdbError, txn.put(db, &k.as_bytes(), &id.to_ne_bytes(), WriteFlags::empty()))?;
    }
    Ok(())
}

/// Compute the merged record per the set_meta merge rules, without
/// deciding whether anything actually changed (see [`packed_equal`]).
fn merge(old: Option<&Object>, new_in: &Object, preserve: bool, now: Timestamp, expiry_secs: u64) -> Object {
    let was_cache = old.map(|o| o.is_cache()).unwrap_or(false);
    let old_was_tombstone = old.map(|o| o.is_tombstone()).unwrap_or(false);
    let is_cache_requested = new_in.is_cache();

    let (final_is_cache, final_dtime) = if was_cache && is_cache_requested {
        let dtime = new_in.dtime.unwrap_or_else(|| {
            let old_dtime = old.and_then(|o| o.dtime).unwrap_or(Timestamp::ZERO);
            old_dtime.max(now.plus_seconds(expiry_secs))
        });
        (true, Some(dtime))
    } else if !was_cache && is_cache_requested {
        if old_was_tombstone {
            (true, Some(new_in.dtime.unwrap_or_else(|| now.plus_seconds(expiry_secs))))
        } else {
            (false, new_in.dtime)
        }
    } else {
        // was_cache && !is_cache_requested: promote to live unless the
        // caller still supplies an explicit dtime.
        // !was_cache && !is_cache_requested: honor the supplied dtime as a
        // plain tombstone toggle.
        (false, new_in.dtime)
    };

    let (digests, size, ctime) = match old {
        Some(o) => (o.digests.clone(), o.size, o.ctime),
        None => (new_in.digests.clone(), new_in.size, now),
    };
    let mtime = match old {
        Some(o) if preserve => o.mtime,
        _ => new_in.mtime,
    };
    let charset = new_in.charset.clone().or_else(|| old.and_then(|o| o.charset.clone()));
    let language = new_in.language.clone().or_else(|| old.and_then(|o| o.language.clone()));
    let encoding = new_in.encoding.clone().or_else(|| old.and_then(|o| o.encoding.clone()));
    let media_type = new_in.media_type.clone();

    let mut flags = new_in.flags;
    flags.set_cache(final_is_cache);

    let ptime = old.map(|o| o.ptime).unwrap_or(now);

    let mut merged = Object {
        digests,
        size,
        ctime,
        mtime,
        ptime,
        dtime: final_dtime,
        media_type,
        charset,
        language,
        encoding,
        flags,
        fresh: false,
    };

    match old {
        None => merged.ptime = now,
        Some(o) => {
            let unchanged = o.mtime == merged.mtime
                && o.dtime == merged.dtime
                && o.media_type == merged.media_type
                && o.charset == merged.charset
                && o.language == merged.language
                && o.encoding == merged.encoding
                && o.flags == merged.flags;
            merged.ptime = if unchanged { o.ptime } else { now };
        }
    }

    merged
}

fn packed_equal(old: &Object, merged: &Object, algorithms: &[Algorithm]) -> Result<bool> {
    let a = record::encode_v1(old, algorithms)?;
    let mut merged_with_old_ptime = merged.clone();
    merged_with_old_ptime.ptime = old.ptime;
    let b = record::encode_v1(&merged_with_old_ptime, algorithms)?;
    Ok(a == b)
}

#[cfg(test)]
#[path = "lmdb_engine_test.rs"]
mod lmdb_engine_test;
