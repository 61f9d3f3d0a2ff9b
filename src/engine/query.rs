//! `list(filter)`: the multi-dimensional query over object metadata.
//!
//! Set dimensions (`type`, `charset`, `encoding`, `language`) are ORed
//! within themselves; range dimensions (`size`, `ctime`, `mtime`, `ptime`,
//! `dtime`) are inclusive `[lo, hi]` with either bound optionally open.
//! Dimensions are ANDed against each other. The driving dimension is the
//! supplied one with the smallest table cardinality (or a full `entry` scan
//! if nothing was supplied); every candidate is then re-checked against the
//! full predicate conjunction, so picking a sub-optimal driving index only
//! costs time, never correctness.

use lmdb::{Cursor, Transaction};

use std::{collections::HashSet, convert::TryInto};

use crate::{err_at, object::Object, timestamp::Timestamp, Result};

use super::lmdb_engine::LmdbEngine;

/// An inclusive range, either bound optionally open.
pub type Range<T> = (Option<T>, Option<T>);

/// A `list` query: set-membership over the token dimensions, inclusive
/// ranges over the numeric/timestamp dimensions.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub media_type: Vec<String>,
    pub charset: Vec<String>,
    pub encoding: Vec<String>,
    pub language: Vec<String>,
    pub size: Range<u64>,
    pub ctime: Range<Timestamp>,
    pub mtime: Range<Timestamp>,
    pub ptime: Range<Timestamp>,
    pub dtime: Range<Timestamp>,
}

impl Filter {
    pub fn new() -> Filter {
        Filter::default()
    }

    fn dimensions(&self) -> Vec<&'static str> {
        let mut dims = Vec::new();
        if !self.media_type.is_empty() {
            dims.push("type");
        }
        if !self.charset.is_empty() {
            dims.push("charset");
        }
        if !self.encoding.is_empty() {
            dims.push("encoding");
        }
        if !self.language.is_empty() {
            dims.push("language");
        }
        if self.size.0.is_some() || self.size.1.is_some() {
            dims.push("size");
        }
        if self.ctime.0.is_some() || self.ctime.1.is_some() {
            dims.push("ctime");
        }
        if self.mtime.0.is_some() || self.mtime.1.is_some() {
            dims.push("mtime");
        }
        if self.ptime.0.is_some() || self.ptime.1.is_some() {
            dims.push("ptime");
        }
        if self.dtime.0.is_some() || self.dtime.1.is_some() {
            dims.push("dtime");
        }
        dims
    }

    fn matches(&self, obj: &Object) -> bool {
        if !self.media_type.is_empty() && !self.media_type.iter().any(|t| t == &obj.media_type) {
            return false;
        }
        if !self.charset.is_empty() {
            match &obj.charset {
                Some(c) if self.charset.iter().any(|t| t == c) => {}
                _ => return false,
            }
        }
        if !self.encoding.is_empty() {
            match &obj.encoding {
                Some(e) if self.encoding.iter().any(|t| t == e) => {}
                _ => return false,
            }
        }
        if !self.language.is_empty() {
            match &obj.language {
                Some(l) if self.language.iter().any(|t| t == l) => {}
                _ => return false,
            }
        }
        if !in_range(self.size.0, self.size.1, obj.size) {
            return false;
        }
        if !in_range(self.ctime.0, self.ctime.1, obj.ctime) {
            return false;
        }
        if !in_range(self.mtime.0, self.mtime.1, obj.mtime) {
            return false;
        }
        if !in_range(self.ptime.0, self.ptime.1, obj.ptime) {
            return false;
        }
        match obj.dtime {
            Some(d) if !in_range(self.dtime.0, self.dtime.1, d) => return false,
            None if self.dtime.0.is_some() || self.dtime.1.is_some() => return false,
            _ => {}
        }
        true
    }
}

fn in_range<T: PartialOrd>(lo: Option<T>, hi: Option<T>, v: T) -> bool {
    if let Some(lo) = lo {
        if v < lo {
            return false;
        }
    }
    if let Some(hi) = hi {
        if v > hi {
            return false;
        }
    }
    true
}

/// Run `filter` against the engine, returning every matching record.
///
/// Materializes the full result set rather than returning a lazy iterator
/// tied to a transaction's lifetime — a deliberate simplification of the
/// public "iterator of Object" surface; [`crate::store::Store::list`]
/// re-exposes it as `impl Iterator`.
pub fn list(engine: &LmdbEngine, filter: &Filter) -> Result<Vec<Object>> {
    let dims = filter.dimensions();

    if dims.is_empty() {
        return full_scan(engine);
    }

    let driving = pick_driving_dimension(engine, &dims)?;
    let candidate_ids = collect_candidates(engine, filter, driving)?;

    let txn = err_at!(LmdbError, engine.env().begin_ro_txn())?;
    let mut out = Vec::with_capacity(candidate_ids.len());
    for id in candidate_ids {
        let raw = match txn.get(engine.entry_db(), &id.to_ne_bytes()) {
            Ok(raw) => raw,
            Err(lmdb::Error::NotFound) => continue,
            Err(err) => return err_at!(LmdbError, Err(err)),
        };
        let obj = engine.decode_entry(raw)?;
        if filter.matches(&obj) {
            out.push(obj);
        }
    }
    Ok(out)
}

fn full_scan(engine: &LmdbEngine) -> Result<Vec<Object>> {
    let txn = err_at!(LmdbError, engine.env().begin_ro_txn())?;
    let mut cursor = err_at!(LmdbError, txn.open_ro_cursor(engine.entry_db()))?;
    let mut out = Vec::new();
    for item in cursor.iter() {
        let (_, raw) = err_at!(LmdbError, item)?;
        out.push(engine.decode_entry(raw)?);
    }
    Ok(out)
}

/// Pick the supplied dimension backed by the smallest table, via a full
/// cursor count. A linear count per candidate dimension is simpler (and, for
/// a crate written to be read rather than load-tested, safer) than relying
/// on engine-internal B-tree statistics; it only affects which index does
/// the initial narrowing, never correctness.
fn pick_driving_dimension(engine: &LmdbEngine, dims: &[&'static str]) -> Result<&'static str> {
    let mut best: Option<(&'static str, u64)> = None;
    for name in dims {
        let db = engine
            .index_db(name)
            .ok_or_else(|| crate::Error::Fatal(format!("no such index {:?}", name)))?;
        let txn = err_at!(LmdbError, engine.env().begin_ro_txn())?;
        let mut cursor = err_at!(LmdbError, txn.open_ro_cursor(db))?;
        let count = cursor.iter().count() as u64;
        best = match best {
            Some((_, n)) if n <= count => best,
            _ => Some((name, count)),
        };
    }
    Ok(best.map(|(n, _)| n).unwrap_or(dims[0]))
}

fn collect_candidates(engine: &LmdbEngine, filter: &Filter, driving: &str) -> Result<Vec<u64>> {
    let db = engine
        .index_db(driving)
        .ok_or_else(|| crate::Error::Fatal(format!("no such index {:?}", driving)))?;
    let txn = err_at!(LmdbError, engine.env().begin_ro_txn())?;
    let mut cursor = err_at!(LmdbError, txn.open_ro_cursor(db))?;

    let mut ids = HashSet::new();
    match driving {
        "type" | "charset" | "encoding" | "language" => {
            let values: &[String] = match driving {
                "type" => &filter.media_type,
                "charset" => &filter.charset,
                "encoding" => &filter.encoding,
                _ => &filter.language,
            };
            for item in cursor.iter() {
                let (key, val) = err_at!(LmdbError, item)?;
                let token = err_at!(CorruptStateError, std::str::from_utf8(key))?;
                if values.iter().any(|v| v == token) {
                    ids.insert(decode_id(val)?);
                }
            }
        }
        _ => {
            let (lo, hi) = numeric_bounds(filter, driving);
            for item in cursor.iter() {
                let (key, val) = err_at!(LmdbError, item)?;
                let k = decode_id(key)?;
                if lo.map_or(true, |lo| k >= lo) && hi.map_or(true, |hi| k <= hi) {
                    ids.insert(decode_id(val)?);
                }
            }
        }
    }
    Ok(ids.into_iter().collect())
}

fn numeric_bounds(filter: &Filter, driving: &str) -> (Option<u64>, Option<u64>) {
    match driving {
        "size" => filter.size,
        "ctime" => (filter.ctime.0.map(|t| t.to_micros()), filter.ctime.1.map(|t| t.to_micros())),
        "mtime" => (filter.mtime.0.map(|t| t.to_micros()), filter.mtime.1.map(|t| t.to_micros())),
        "ptime" => (filter.ptime.0.map(|t| t.to_micros()), filter.ptime.1.map(|t| t.to_micros())),
        "dtime" => (filter.dtime.0.map(|t| t.to_micros()), filter.dtime.1.map(|t| t.to_micros())),
        _ => (None, None),
    }
}

fn decode_id(raw: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = err_at!(CorruptStateError, raw.try_into())?;
    Ok(u64::from_ne_bytes(arr))
}

#[cfg(test)]
#[path = "query_test.rs"]
mod query_test;
