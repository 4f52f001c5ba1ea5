//! Idempotent relation add. Every relation triple, rule-derived or
//! inferred, is written through here.

use super::stats::UpdateStats;
use crate::graph::Triple;
use crate::storage::{StorageResult, TripleStore};

/// Insert `triple` unless the exact triple (direction-sensitive) is already
/// stored. Returns whether it was inserted.
///
/// Only inserted triples are counted in `stats`.
pub fn add_relation_if_absent<S>(store: &S, triple: &Triple, stats: &mut UpdateStats) -> StorageResult<bool>
where
    S: TripleStore + ?Sized,
{
    if store.contains_triple(triple)? {
        tracing::debug!(relation = %triple, "relation already present");
        return Ok(false);
    }

    store.insert_triple(triple)?;
    stats.record_relation(triple);
    tracing::info!(relation = %triple, "added relation");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{OpenStore, SqliteStore};

    #[test]
    fn second_add_is_a_noop() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut stats = UpdateStats::new();
        let t = Triple::new("松墨天牛", "transmits", "松树枯死");

        assert!(add_relation_if_absent(&store, &t, &mut stats).unwrap());
        assert!(!add_relation_if_absent(&store, &t, &mut stats).unwrap());

        assert_eq!(store.triples().unwrap(), vec![t]);
        assert_eq!(stats.new_relations_added, 1);
        assert_eq!(stats.updates.len(), 1);
    }

    #[test]
    fn reverse_direction_is_a_different_relation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut stats = UpdateStats::new();

        assert!(add_relation_if_absent(&store, &Triple::new("a", "r", "b"), &mut stats).unwrap());
        assert!(add_relation_if_absent(&store, &Triple::new("b", "r", "a"), &mut stats).unwrap());
        assert_eq!(stats.new_relations_added, 2);
    }
}
