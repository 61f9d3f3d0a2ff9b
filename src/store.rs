//! `Store`: the public entry point. A thin wrapper generic over a [`Driver`]
//! backend, the way this corpus typically generalizes a composed type over
//! its underlying index/storage implementation.

use std::io::{Read, Seek};

use crate::{
    blobstore::BlobHandle,
    config::Config,
    digest::DigestSet,
    driver::{AddOptions, Driver, LmdbDriver},
    engine::{query::Filter, MetaKey},
    object::Object,
    stats::Stats,
    Result,
};

/// A content-addressable blob store. Generic over the backend driver;
/// `Store::open` wires up the only driver this crate ships, [`LmdbDriver`].
pub struct Store<D: Driver = LmdbDriver> {
    driver: D,
}

impl Store<LmdbDriver> {
    /// Validate `config` and open (creating if absent) the store rooted at
    /// `config.dir`.
    pub fn open(config: &Config) -> Result<Store<LmdbDriver>> {
        config.validate()?;
        Ok(Store {
            driver: LmdbDriver::open(config)?,
        })
    }
}

impl<D: Driver> Store<D> {
    /// Wrap an already-constructed driver, e.g. a test double.
    pub fn with_driver(driver: D) -> Store<D> {
        Store { driver }
    }

    /// Scan `source`, write its blob, and upsert its metadata record.
    /// Returns the resulting [`Object`]; `object.fresh` is `true` only if
    /// this call changed the record.
    pub fn add<R: Read + Seek>(&self, source: &mut R, opts: AddOptions) -> Result<Object> {
        self.driver.add(source, opts)
    }

    /// Look up a record by entry id or digest, along with a lazily-openable
    /// handle to its blob if the record is live.
    pub fn get(&self, key: MetaKey<'_>) -> Result<Option<(Object, Option<BlobHandle>)>> {
        self.driver.get(key)
    }

    /// Tombstone the record and erase its blob, handing back a read handle
    /// to the blob's contents as they existed just before unlinking.
    pub fn remove(&self, digests: &DigestSet) -> Result<Option<(Object, Option<std::fs::File>)>> {
        self.driver.remove(digests)
    }

    /// Purge the record entirely (no tombstone survives) and erase its blob,
    /// same handle semantics as [`Store::remove`].
    pub fn forget(&self, digests: &DigestSet) -> Result<Option<(Object, Option<std::fs::File>)>> {
        self.driver.forget(digests)
    }

    /// Query every record — live, tombstoned, or cache — matching every
    /// dimension set on `filter`. Dimensions are ANDed against each other;
    /// within a set dimension (`type`/`charset`/`language`/`encoding`),
    /// values are ORed. An empty filter returns every record the store has
    /// ever held, not just live ones; callers who want only live records
    /// should check `Object::is_live()` on each result, since "live" isn't
    /// itself a filterable dimension.
    pub fn list(&self, filter: &Filter) -> Result<impl Iterator<Item = Object>> {
        Ok(self.driver.list(filter)?.into_iter())
    }

    /// Store-wide counters and facet breakdowns.
    pub fn stats(&self) -> Result<Stats> {
        self.driver.stats()
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
