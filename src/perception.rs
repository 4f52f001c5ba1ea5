//! Perception input: entities detected in an image, as handed over by the
//! upstream recognition pipeline.
//!
//! Similarity scores and knowledge-base matches are computed upstream; the
//! curator only reads them.

use crate::graph::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw feature map of a detection (`dominant_color`, `area`, ...).
pub type FeatureMap = BTreeMap<String, serde_json::Value>;

/// A single entity detected in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEntity {
    /// Raw label from the recognizer
    pub name: String,
    /// Semantic type
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Recognition confidence in [0, 1]
    pub confidence: f64,
    /// Similarity against the closest known entity in [0, 1]
    pub similarity: f64,
    /// Canonical graph identity resolved upstream, if any
    #[serde(default)]
    pub matched_kb_entity: Option<String>,
    #[serde(default)]
    pub features: FeatureMap,
}

impl DetectedEntity {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<EntityKind>,
        confidence: f64,
        similarity: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            confidence,
            similarity,
            matched_kb_entity: None,
            features: FeatureMap::new(),
        }
    }

    pub fn with_match(mut self, kb_entity: impl Into<String>) -> Self {
        self.matched_kb_entity = Some(kb_entity.into());
        self
    }

    pub fn with_feature(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.features.insert(key.into(), value.into());
        self
    }

    /// The matched knowledge-base entity, if present and non-empty.
    pub fn matched_entity(&self) -> Option<&str> {
        self.matched_kb_entity.as_deref().filter(|m| !m.is_empty())
    }

    /// Graph identity for relation derivation: the matched entity when
    /// there is one, otherwise the raw name.
    pub fn resolved_name(&self) -> &str {
        self.matched_entity().unwrap_or(&self.name)
    }
}

/// One perception event: every entity detected in a single image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerceptionResult {
    #[serde(default)]
    pub detected_entities: Vec<DetectedEntity>,
}

impl PerceptionResult {
    pub fn new(detected_entities: Vec<DetectedEntity>) -> Self {
        Self { detected_entities }
    }

    pub fn len(&self) -> usize {
        self.detected_entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detected_entities.is_empty()
    }
}

impl From<Vec<DetectedEntity>> for PerceptionResult {
    fn from(detected_entities: Vec<DetectedEntity>) -> Self {
        Self::new(detected_entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_name_prefers_match() {
        let e = DetectedEntity::new("beetle", "insect", 0.9, 0.8).with_match("松墨天牛");
        assert_eq!(e.resolved_name(), "松墨天牛");
    }

    #[test]
    fn empty_match_falls_back_to_name() {
        let e = DetectedEntity::new("beetle", "insect", 0.9, 0.8).with_match("");
        assert_eq!(e.matched_entity(), None);
        assert_eq!(e.resolved_name(), "beetle");
    }

    #[test]
    fn deserializes_pipeline_payload() {
        let json = r#"{
            "detected_entities": [
                {"name": "松墨天牛", "type": "insect", "confidence": 0.9,
                 "similarity": 0.3, "matched_kb_entity": null,
                 "features": {"dominant_color": "brown", "area": 1200}},
                {"name": "枯枝", "type": "disease_symptom", "confidence": 0.8,
                 "similarity": 0.2}
            ]
        }"#;
        let batch: PerceptionResult = serde_json::from_str(json).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.detected_entities[0].kind, EntityKind::Insect);
        assert_eq!(batch.detected_entities[0].features["area"], 1200);
        assert!(batch.detected_entities[1].features.is_empty());
        assert!(batch.detected_entities[1].matched_kb_entity.is_none());
    }
}
