//! Triple representation in the knowledge graph

use serde::{Deserialize, Serialize};

/// A directed labeled edge: `(head, relation, tail)`.
///
/// Entities have no record of their own; an entity exists as long as it
/// appears as the head or tail of at least one stored triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    /// Subject entity
    #[serde(rename = "head_entity")]
    pub head: String,
    /// Relation label
    pub relation: String,
    /// Object entity (or literal value for feature relations)
    #[serde(rename = "tail_entity")]
    pub tail: String,
}

impl Triple {
    /// Create a new triple
    pub fn new(
        head: impl Into<String>,
        relation: impl Into<String>,
        tail: impl Into<String>,
    ) -> Self {
        Self {
            head: head.into(),
            relation: relation.into(),
            tail: tail.into(),
        }
    }

    /// True if this triple joins `a` and `b`, in either direction
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.head == a && self.tail == b) || (self.head == b && self.tail == a)
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} --[{}]--> {}", self.head, self.relation, self.tail)
    }
}
