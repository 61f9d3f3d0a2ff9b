//! Aggregate store statistics: the `control` table's scalar counters plus a
//! distinct-value breakdown for each token dimension.

use std::collections::HashMap;

use crate::timestamp::Timestamp;

/// A snapshot of store-wide counters and facet breakdowns, as returned by
/// [`crate::store::Store::stats`].
#[derive(Clone, Debug)]
pub struct Stats {
    pub ctime: Timestamp,
    pub mtime: Timestamp,
    /// Count of all records, live and tombstoned.
    pub objects: u64,
    /// Count of tombstoned (and expired-cache) records.
    pub deleted: u64,
    /// Sum of `size` over live records only.
    pub bytes: u64,
    pub types: HashMap<String, u64>,
    pub languages: HashMap<String, u64>,
    pub charsets: HashMap<String, u64>,
    pub encodings: HashMap<String, u64>,
}
