//! Graph Curator: perception-driven knowledge graph updates
//!
//! Turns batches of uncertain, possibly redundant entity detections into
//! deduplicated triple-store writes.
//!
//! # Core Concepts
//!
//! - **Triples**: `(head, relation, tail)` facts, stored once each
//! - **Admission**: threshold rules deciding which detections become entities
//! - **Relations**: derived from co-occurring entity types, or inferred by an
//!   external oracle and checked against a set of valid relation labels
//! - **Batches**: each perception event commits or rolls back as a unit
//!
//! # Example
//!
//! ```
//! use graph_curator::{CuratorConfig, CuratorEngine, DetectedEntity, NoopOracle, OpenStore,
//!     PerceptionResult, SqliteStore};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Arc::new(SqliteStore::open_in_memory().unwrap());
//! let engine = CuratorEngine::new(CuratorConfig::default(), store, Arc::new(NoopOracle)).unwrap();
//!
//! let batch = PerceptionResult::new(vec![
//!     DetectedEntity::new("松墨天牛", "insect", 0.9, 0.3),
//!     DetectedEntity::new("松树枯死", "disease_symptom", 0.8, 0.2),
//! ]);
//! let stats = engine.process_batch(&batch).await.unwrap();
//! assert_eq!(stats.new_entities_added, 2);
//! # });
//! ```

pub mod config;
pub mod curator;
pub mod graph;
pub mod oracle;
pub mod perception;
pub mod storage;

pub use config::{ConfigError, CuratorConfig};
pub use curator::{
    BatchState, CuratorEngine, CuratorError, CuratorResult, Priority, Suggestion, UpdateRecord,
    UpdateStats,
};
pub use graph::{EntityKind, Triple};
pub use oracle::{CommandOracle, MockOracle, NoopOracle, OracleError, RelationOracle};
pub use perception::{DetectedEntity, FeatureMap, PerceptionResult};
pub use storage::{
    EntityFeatureRecord, FeatureStore, OpenStore, SqliteStore, StorageError, StorageResult,
    TripleStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
