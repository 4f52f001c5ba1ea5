//! Entity admission policy
//!
//! Decides whether a detected entity is novel and confident enough to become
//! a new node. Admission is conservative: it needs both a strong novelty
//! signal (low similarity, no upstream match) and a strong confidence
//! signal, and placeholder names are resolved against the live store first.

use crate::config::CuratorConfig;
use crate::graph::placeholder_target;
use crate::perception::DetectedEntity;
use crate::storage::{StorageResult, TripleStore};

/// Why an entity was not admitted.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Confidence below `confidence_threshold`
    LowConfidence,
    /// Similarity above `similarity_threshold`: a similar entity is known
    KnownSimilar,
    /// Placeholder whose real name already appears in the graph
    PlaceholderResolved(String),
    /// Upstream already matched it to a knowledge-base entity
    AlreadyMatched,
    /// Unmatched, but not confident enough to be admitted
    InsufficientConfidence,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LowConfidence => write!(f, "low confidence"),
            Self::KnownSimilar => write!(f, "similar entity already known"),
            Self::PlaceholderResolved(name) => write!(f, "placeholder for known entity {}", name),
            Self::AlreadyMatched => write!(f, "matched to a knowledge-base entity"),
            Self::InsufficientConfidence => write!(f, "confidence too low for a new entity"),
        }
    }
}

/// Outcome of the admission policy for one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admit,
    Reject(RejectReason),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit)
    }
}

/// The admission rules, evaluated in order; the first match decides.
pub struct AdmissionPolicy<'a> {
    config: &'a CuratorConfig,
}

impl<'a> AdmissionPolicy<'a> {
    pub fn new(config: &'a CuratorConfig) -> Self {
        Self { config }
    }

    /// Evaluate the rules for `entity`. Only the placeholder rule reads the
    /// store; a store error there is returned, not treated as a decision.
    pub fn evaluate<S>(&self, store: &S, entity: &DetectedEntity) -> StorageResult<Admission>
    where
        S: TripleStore + ?Sized,
    {
        if entity.confidence < self.config.confidence_threshold {
            return Ok(Admission::Reject(RejectReason::LowConfidence));
        }

        if entity.similarity > self.config.similarity_threshold {
            return Ok(Admission::Reject(RejectReason::KnownSimilar));
        }

        if let Some(actual) = placeholder_target(&entity.name) {
            if store.contains_entity(actual)? {
                tracing::info!(
                    placeholder = %entity.name,
                    entity = actual,
                    "placeholder refers to a known entity, not admitting"
                );
                return Ok(Admission::Reject(RejectReason::PlaceholderResolved(
                    actual.to_string(),
                )));
            }
        }

        if entity.matched_entity().is_some() {
            return Ok(Admission::Reject(RejectReason::AlreadyMatched));
        }

        if entity.confidence > self.config.admit_confidence {
            Ok(Admission::Admit)
        } else {
            Ok(Admission::Reject(RejectReason::InsufficientConfidence))
        }
    }

    /// Boolean view of [`evaluate`](Self::evaluate).
    pub fn should_admit<S>(&self, store: &S, entity: &DetectedEntity) -> StorageResult<bool>
    where
        S: TripleStore + ?Sized,
    {
        Ok(self.evaluate(store, entity)?.is_admitted())
    }
}
