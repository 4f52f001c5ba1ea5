//! Storage trait definitions

use crate::graph::Triple;
use crate::perception::FeatureMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Atomic scope error: {0}")]
    AtomicScope(String),

    #[error("Date parsing error: {0}")]
    DateParse(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A persisted feature of a known entity (side table, last-write-wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityFeatureRecord {
    pub entity_name: String,
    pub feature_type: String,
    pub feature_value: serde_json::Value,
    pub confidence: f64,
    pub updated_at: DateTime<Utc>,
}

/// Gateway to the triple store.
///
/// Implementations must be thread-safe (Send + Sync). Atomic scopes nest:
/// every `begin_atomic` must be paired with exactly one `commit_atomic` or
/// `rollback_atomic`, innermost first. Callers should go through
/// [`run_atomically`](super::run_atomically) rather than pairing these by hand.
pub trait TripleStore: Send + Sync {
    // === Existence checks ===

    /// True if the exact triple is stored (direction-sensitive)
    fn contains_triple(&self, triple: &Triple) -> StorageResult<bool>;

    /// True if `name` appears as head or tail of any stored triple
    fn contains_entity(&self, name: &str) -> StorageResult<bool>;

    /// True if any triple joins `a` and `b`, in either direction
    fn are_connected(&self, a: &str, b: &str) -> StorageResult<bool>;

    // === Writes ===

    /// Insert a triple. Performs no existence check of its own.
    fn insert_triple(&self, triple: &Triple) -> StorageResult<()>;

    // === Relation vocabulary ===

    /// Relation labels the inference oracle may choose from
    fn valid_relations(&self) -> StorageResult<BTreeSet<String>>;

    /// Add a label to the valid relation set. Returns false if already present.
    fn add_valid_relation(&self, label: &str) -> StorageResult<bool>;

    // === Inspection ===

    /// All stored triples, in insertion order
    fn triples(&self) -> StorageResult<Vec<Triple>>;

    // === Atomic scopes ===

    /// Open a (possibly nested) atomic scope
    fn begin_atomic(&self) -> StorageResult<()>;

    /// Make the innermost scope's writes part of its parent (or durable, at
    /// the outermost level)
    fn commit_atomic(&self) -> StorageResult<()>;

    /// Discard every write made since the innermost scope was opened
    fn rollback_atomic(&self) -> StorageResult<()>;
}

/// Side table of per-entity features, independent of the triple graph.
pub trait FeatureStore: Send + Sync {
    /// Upsert every feature of `features` for `entity_name`.
    ///
    /// All-or-nothing: either every field is written or none is.
    /// Returns the number of fields written.
    fn merge_features(&self, entity_name: &str, features: &FeatureMap) -> StorageResult<usize>;

    /// Load every stored feature of an entity, ordered by feature type
    fn load_features(&self, entity_name: &str) -> StorageResult<Vec<EntityFeatureRecord>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: TripleStore + FeatureStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
