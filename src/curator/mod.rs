//! Update decision engine: admission, insertion, relation derivation and
//! suggestions over perception batches.

mod admission;
mod engine;
mod inference;
mod insertion;
mod projection;
mod relations;
mod rules;
mod stats;
mod suggest;

pub use admission::{Admission, AdmissionPolicy, RejectReason};
pub use engine::{BatchState, CuratorEngine, CuratorError, CuratorResult};
pub use inference::{consult_oracle, write_inferred, PairError};
pub use insertion::{admit_entity, EntityInsertion};
pub use projection::{project_features, size_bucket};
pub use relations::add_relation_if_absent;
pub use rules::{apply_rule_relations, derive_rule_relations};
pub use stats::{UpdateRecord, UpdateStats};
pub use suggest::{suggest, Priority, Suggestion};
