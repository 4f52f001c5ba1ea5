//! Core graph data structures

mod triple;
pub mod vocabulary;

pub use triple::Triple;
pub use vocabulary::{default_type_labels, placeholder_target, EntityKind};
