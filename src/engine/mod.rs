//! The persistent metadata engine: an LMDB environment holding a `control`
//! table, one `entry` table keyed by integer entry-id, one digest table per
//! configured algorithm, and one secondary index per queryable field.
//!
//! This module owns the transactional envelope for `set_meta`/`get_meta`/
//! `mark_meta_deleted`/`remove_meta`; [`query`] layers the `list` predicate
//! evaluator on top of the same databases.

mod lmdb_engine;
pub mod query;

pub use lmdb_engine::{LmdbEngine, MetaKey, SetMetaResult};
pub use query::Filter;
