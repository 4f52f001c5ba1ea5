//! Per-batch update statistics

use crate::graph::Triple;
use crate::perception::DetectedEntity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One durable change made while processing a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateRecord {
    NewEntity {
        entity: String,
        entity_type: String,
        confidence: f64,
    },
    NewRelation {
        head_entity: String,
        relation: String,
        tail_entity: String,
    },
}

/// Counters and change log for one batch run.
///
/// Built fresh for every batch and returned to the caller; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateStats {
    /// Correlates this batch's log lines
    pub batch_id: Uuid,
    pub new_entities_added: usize,
    pub new_relations_added: usize,
    /// Feature-projection triples written for admitted entities
    pub features_updated: usize,
    /// Entities rejected for confidence below the threshold
    pub skipped_low_confidence: usize,
    /// Entities skipped because their admission or insertion failed
    pub entities_failed: usize,
    /// Entity pairs skipped because inference failed for them
    pub inference_failures: usize,
    pub updates: Vec<UpdateRecord>,
}

impl UpdateStats {
    /// Fresh stats for a new batch
    pub fn new() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            ..Self::default()
        }
    }

    pub fn record_entity(&mut self, entity: &DetectedEntity, feature_triples: usize) {
        self.new_entities_added += 1;
        self.features_updated += feature_triples;
        self.updates.push(UpdateRecord::NewEntity {
            entity: entity.name.clone(),
            entity_type: entity.kind.to_string(),
            confidence: entity.confidence,
        });
    }

    pub fn record_relation(&mut self, triple: &Triple) {
        self.new_relations_added += 1;
        self.updates.push(UpdateRecord::NewRelation {
            head_entity: triple.head.clone(),
            relation: triple.relation.clone(),
            tail_entity: triple.tail.clone(),
        });
    }

    /// Fold the counters and records of a committed sub-scope into these
    /// stats. The other batch id is discarded.
    pub fn absorb(&mut self, other: UpdateStats) {
        self.new_entities_added += other.new_entities_added;
        self.new_relations_added += other.new_relations_added;
        self.features_updated += other.features_updated;
        self.skipped_low_confidence += other.skipped_low_confidence;
        self.entities_failed += other.entities_failed;
        self.inference_failures += other.inference_failures;
        self.updates.extend(other.updates);
    }

    /// True if the batch wrote nothing
    pub fn is_noop(&self) -> bool {
        self.updates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stats_have_distinct_batch_ids() {
        let a = UpdateStats::new();
        let b = UpdateStats::new();
        assert_ne!(a.batch_id, b.batch_id);
        assert!(a.is_noop());
    }

    #[test]
    fn records_are_tagged_by_kind() {
        let mut stats = UpdateStats::new();
        stats.record_entity(&DetectedEntity::new("松墨天牛", "insect", 0.9, 0.3), 2);
        stats.record_relation(&Triple::new("松墨天牛", "transmits", "松树枯死"));

        assert_eq!(stats.new_entities_added, 1);
        assert_eq!(stats.features_updated, 2);
        assert_eq!(stats.new_relations_added, 1);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["updates"][0]["type"], "new_entity");
        assert_eq!(json["updates"][0]["entity_type"], "insect");
        assert_eq!(json["updates"][1]["type"], "new_relation");
        assert_eq!(json["updates"][1]["tail_entity"], "松树枯死");
    }

    #[test]
    fn absorb_keeps_own_batch_id() {
        let mut stats = UpdateStats::new();
        let id = stats.batch_id;

        let mut pair = UpdateStats::default();
        pair.record_relation(&Triple::new("a", "r", "b"));
        stats.absorb(pair);

        assert_eq!(stats.batch_id, id);
        assert_eq!(stats.new_relations_added, 1);
        assert_eq!(stats.updates.len(), 1);
    }
}
