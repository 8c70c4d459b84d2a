//! Collapse record collections to one record per key
//!
//! Later records win: mined data observed later in a run is usually more
//! complete than an earlier sighting of the same key. Each key keeps the
//! position of its first occurrence, so output order is deterministic.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::models::Keyed;

/// Keep the last record for every key produced by `key_of`.
pub fn dedup_with<T, K, F>(records: impl IntoIterator<Item = T>, key_of: F) -> Vec<T>
where
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::new();

    for record in records {
        let key = key_of(&record);
        match positions.get(&key) {
            Some(&pos) => out[pos] = record,
            None => {
                positions.insert(key, out.len());
                out.push(record);
            }
        }
    }

    out
}

/// Deduplicate entities by natural key
pub fn dedup_by_key<T: Keyed>(records: impl IntoIterator<Item = T>) -> Vec<T> {
    dedup_with(records, |r| r.key().to_string())
}

/// Deduplicate relationship records by their full structural value
pub fn dedup_by_value<T: Debug>(records: impl IntoIterator<Item = T>) -> Vec<T> {
    dedup_with(records, |r| format!("{:?}", r))
}
