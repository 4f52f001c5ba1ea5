//! Storage backends for the curator
//!
//! The curator talks to storage through the `TripleStore` and `FeatureStore`
//! traits. The primary implementation is `SqliteStore`.

mod atomic;
mod sqlite;
mod traits;

pub use atomic::run_atomically;
pub use sqlite::SqliteStore;
pub use traits::{
    EntityFeatureRecord, FeatureStore, OpenStore, StorageError, StorageResult, TripleStore,
};
