//! Feature projection: raw detection features → descriptive triples

use crate::graph::vocabulary::{
    COLOR, SIZE, SIZE_LARGE, SIZE_MEDIUM, SIZE_SMALL, TEXTURE, TEXTURE_ROUGH,
};
use crate::graph::Triple;
use crate::perception::FeatureMap;

/// Areas above this are `large`
pub const LARGE_AREA: f64 = 10_000.0;
/// Areas above this (and not large) are `medium`
pub const MEDIUM_AREA: f64 = 5_000.0;
/// Roughness above this projects to `texture: rough`
pub const ROUGH_TEXTURE: f64 = 100.0;

/// Size bucket for a detection area.
pub fn size_bucket(area: f64) -> &'static str {
    if area > LARGE_AREA {
        SIZE_LARGE
    } else if area > MEDIUM_AREA {
        SIZE_MEDIUM
    } else {
        SIZE_SMALL
    }
}

/// Triples describing `entity_name` derived from its feature map.
///
/// Each rule fires independently. No existence checks: the caller only
/// projects features of an entity it has just inserted.
pub fn project_features(entity_name: &str, features: &FeatureMap) -> Vec<Triple> {
    let mut triples = Vec::new();

    if let Some(color) = features.get("dominant_color") {
        let color = match color {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        triples.push(Triple::new(entity_name, COLOR, color));
    }

    if let Some(area) = features.get("area").and_then(|v| v.as_f64()) {
        triples.push(Triple::new(entity_name, SIZE, size_bucket(area)));
    }

    if let Some(roughness) = features.get("texture_roughness").and_then(|v| v.as_f64()) {
        if roughness > ROUGH_TEXTURE {
            triples.push(Triple::new(entity_name, TEXTURE, TEXTURE_ROUGH));
        }
    }

    triples
}
