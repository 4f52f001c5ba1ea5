//! Advisory update suggestions for a perception batch
//!
//! Pure: reads the batch and the thresholds, never the store.

use crate::config::CuratorConfig;
use crate::perception::{DetectedEntity, FeatureMap};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

/// A proposed knowledge-base change for a human or downstream tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Suggestion {
    /// Confident but unfamiliar entity
    AddEntity {
        priority: Priority,
        entity_name: String,
        entity_type: String,
        confidence: f64,
        similarity: f64,
        reason: String,
        action: String,
    },
    /// Known entity observed with possibly new features
    UpdateFeatures {
        priority: Priority,
        entity_name: String,
        new_features: FeatureMap,
        reason: String,
        action: String,
    },
    /// Several entities co-occur; relations between them may be missing
    DiscoverRelations {
        priority: Priority,
        entities: Vec<String>,
        reason: String,
        action: String,
    },
}

/// Suggestions for `entities`, in batch order, with the relation discovery
/// suggestion (if any) last.
pub fn suggest(config: &CuratorConfig, entities: &[DetectedEntity]) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    for entity in entities {
        if entity.similarity < config.similarity_threshold
            && entity.confidence > config.confidence_threshold
        {
            suggestions.push(Suggestion::AddEntity {
                priority: Priority::High,
                entity_name: entity.name.clone(),
                entity_type: entity.kind.to_string(),
                confidence: entity.confidence,
                similarity: entity.similarity,
                reason: format!(
                    "high confidence ({:.2}) but low similarity ({:.2}) to known entities",
                    entity.confidence, entity.similarity
                ),
                action: format!("add '{}' as a new {} entity", entity.name, entity.kind),
            });
        }

        if let Some(matched) = entity.matched_entity() {
            if entity.similarity > config.feature_update_similarity {
                suggestions.push(Suggestion::UpdateFeatures {
                    priority: Priority::Medium,
                    entity_name: matched.to_string(),
                    new_features: entity.features.clone(),
                    reason: "new feature observations for a known entity".to_string(),
                    action: format!("update the feature data of '{}'", matched),
                });
            }
        }
    }

    if entities.len() > 1 {
        suggestions.push(Suggestion::DiscoverRelations {
            priority: Priority::Medium,
            entities: entities
                .iter()
                .map(|e| e.resolved_name().to_string())
                .collect(),
            reason: "multiple entities detected in one image; unknown relations may exist"
                .to_string(),
            action: "analyze potential relations between the entities and add them to the graph"
                .to_string(),
        });
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn novel_confident_entity_gets_add_suggestion() {
        let e = DetectedEntity::new("松墨天牛", "insect", 0.9, 0.3);
        let suggestions = suggest(&CuratorConfig::default(), &[e]);

        assert_eq!(suggestions.len(), 1);
        match &suggestions[0] {
            Suggestion::AddEntity {
                priority,
                entity_name,
                entity_type,
                reason,
                ..
            } => {
                assert_eq!(*priority, Priority::High);
                assert_eq!(entity_name, "松墨天牛");
                assert_eq!(entity_type, "insect");
                assert!(reason.contains("0.90"));
                assert!(reason.contains("0.30"));
            }
            other => panic!("unexpected suggestion: {:?}", other),
        }
    }

    #[test]
    fn confidence_at_threshold_gets_no_add_suggestion() {
        let e = DetectedEntity::new("x", "insect", 0.5, 0.1);
        assert!(suggest(&CuratorConfig::default(), &[e]).is_empty());
    }

    #[test]
    fn matched_similar_entity_gets_feature_update() {
        let e = DetectedEntity::new("beetle", "insect", 0.9, 0.8)
            .with_match("松墨天牛")
            .with_feature("area", 900);
        let suggestions = suggest(&CuratorConfig::default(), &[e]);

        assert_eq!(suggestions.len(), 1);
        match &suggestions[0] {
            Suggestion::UpdateFeatures {
                entity_name,
                new_features,
                ..
            } => {
                assert_eq!(entity_name, "松墨天牛");
                assert_eq!(new_features["area"], 900);
            }
            other => panic!("unexpected suggestion: {:?}", other),
        }
    }

    #[test]
    fn match_below_update_similarity_gets_only_add() {
        // similarity 0.5 is below 0.6 but not above 0.7
        let e = DetectedEntity::new("beetle", "insect", 0.9, 0.5).with_match("松墨天牛");
        let suggestions = suggest(&CuratorConfig::default(), &[e]);
        assert_eq!(suggestions.len(), 1);
        assert!(matches!(suggestions[0], Suggestion::AddEntity { .. }));
    }

    #[test]
    fn discover_relations_comes_last_with_resolved_names() {
        let entities = [
            DetectedEntity::new("松墨天牛", "insect", 0.9, 0.3),
            DetectedEntity::new("枯枝", "disease_symptom", 0.8, 0.65).with_match("松树枯死"),
        ];
        let suggestions = suggest(&CuratorConfig::default(), &entities);

        assert_eq!(suggestions.len(), 2);
        match suggestions.last().unwrap() {
            Suggestion::DiscoverRelations { entities, priority, .. } => {
                assert_eq!(entities, &vec!["松墨天牛".to_string(), "松树枯死".to_string()]);
                assert_eq!(*priority, Priority::Medium);
            }
            other => panic!("unexpected suggestion: {:?}", other),
        }
    }

    #[test]
    fn serializes_with_type_tag() {
        let e = DetectedEntity::new("松墨天牛", "insect", 0.9, 0.3);
        let json = serde_json::to_value(suggest(&CuratorConfig::default(), &[e])).unwrap();
        assert_eq!(json[0]["type"], "add_entity");
        assert_eq!(json[0]["priority"], "high");
    }
}
