//! Shared helpers for curator integration tests
//!
//! Entity builders for the forest-pest scenarios and a fault-injecting
//! store wrapper.

#![allow(dead_code)]

use graph_curator::{
    DetectedEntity, EntityFeatureRecord, FeatureMap, FeatureStore, OpenStore, SqliteStore,
    StorageError, StorageResult, Triple, TripleStore,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub fn insect(name: &str) -> DetectedEntity {
    DetectedEntity::new(name, "insect", 0.9, 0.3)
}

pub fn symptom(name: &str) -> DetectedEntity {
    DetectedEntity::new(name, "disease_symptom", 0.8, 0.2)
}

pub fn tree(name: &str) -> DetectedEntity {
    DetectedEntity::new(name, "tree", 0.85, 0.25)
}

pub fn in_memory_store() -> SqliteStore {
    SqliteStore::open_in_memory().expect("in-memory store")
}

type TriplePredicate = Box<dyn Fn(&Triple) -> bool + Send + Sync>;

/// Store wrapper that injects failures into an otherwise working
/// [`SqliteStore`].
pub struct FaultyStore {
    inner: SqliteStore,
    fail_insert: Option<TriplePredicate>,
    fail_valid_relations: AtomicBool,
    fail_begin_at: Option<usize>,
    begins: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            fail_insert: None,
            fail_valid_relations: AtomicBool::new(false),
            fail_begin_at: None,
            begins: AtomicUsize::new(0),
        }
    }

    /// Fail `insert_triple` for every triple matching `predicate`
    pub fn failing_insert(mut self, predicate: impl Fn(&Triple) -> bool + Send + Sync + 'static) -> Self {
        self.fail_insert = Some(Box::new(predicate));
        self
    }

    /// Fail every `valid_relations` lookup
    pub fn failing_valid_relations(self) -> Self {
        self.fail_valid_relations.store(true, Ordering::SeqCst);
        self
    }

    /// Fail the `n`th `begin_atomic` call (1-based) and only that one
    pub fn failing_begin_at(mut self, n: usize) -> Self {
        self.fail_begin_at = Some(n);
        self
    }

    pub fn inner(&self) -> &SqliteStore {
        &self.inner
    }
}

fn injected(what: &str) -> StorageError {
    StorageError::InvalidInput(format!("injected failure: {}", what))
}

impl TripleStore for FaultyStore {
    fn contains_triple(&self, triple: &Triple) -> StorageResult<bool> {
        self.inner.contains_triple(triple)
    }

    fn contains_entity(&self, name: &str) -> StorageResult<bool> {
        self.inner.contains_entity(name)
    }

    fn are_connected(&self, a: &str, b: &str) -> StorageResult<bool> {
        self.inner.are_connected(a, b)
    }

    fn insert_triple(&self, triple: &Triple) -> StorageResult<()> {
        if self.fail_insert.as_ref().is_some_and(|fail| fail(triple)) {
            return Err(injected(&triple.to_string()));
        }
        self.inner.insert_triple(triple)
    }

    fn valid_relations(&self) -> StorageResult<BTreeSet<String>> {
        if self.fail_valid_relations.load(Ordering::SeqCst) {
            return Err(injected("valid_relations"));
        }
        self.inner.valid_relations()
    }

    fn add_valid_relation(&self, label: &str) -> StorageResult<bool> {
        self.inner.add_valid_relation(label)
    }

    fn triples(&self) -> StorageResult<Vec<Triple>> {
        self.inner.triples()
    }

    fn begin_atomic(&self) -> StorageResult<()> {
        let call = self.begins.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_begin_at == Some(call) {
            return Err(injected("begin_atomic"));
        }
        self.inner.begin_atomic()
    }

    fn commit_atomic(&self) -> StorageResult<()> {
        self.inner.commit_atomic()
    }

    fn rollback_atomic(&self) -> StorageResult<()> {
        self.inner.rollback_atomic()
    }
}

impl FeatureStore for FaultyStore {
    fn merge_features(&self, entity_name: &str, features: &FeatureMap) -> StorageResult<usize> {
        self.inner.merge_features(entity_name, features)
    }

    fn load_features(&self, entity_name: &str) -> StorageResult<Vec<EntityFeatureRecord>> {
        self.inner.load_features(entity_name)
    }
}
