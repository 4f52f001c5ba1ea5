//! Relation labels, entity kinds and placeholder names
//!
//! The labels here are the fixed vocabulary the curator writes. Type labels
//! (the tail of a `belongs-to` triple) are configurable; the defaults live in
//! [`default_type_labels`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type membership: `(entity, belongs-to, type label)`
pub const BELONGS_TO: &str = "belongs-to";
/// Feature relation for the dominant color
pub const COLOR: &str = "color";
/// Feature relation for the size bucket
pub const SIZE: &str = "size";
/// Feature relation for surface texture
pub const TEXTURE: &str = "texture";

/// Rule relation: carrier insect → disease symptom
pub const TRANSMITS: &str = "transmits";
/// Rule relation: host tree → disease symptom
pub const SUSCEPTIBLE_TO: &str = "susceptible-to";
/// Rule relation: carrier insect → host tree
pub const HOSTED_BY: &str = "hosted-by";

pub const SIZE_LARGE: &str = "large";
pub const SIZE_MEDIUM: &str = "medium";
pub const SIZE_SMALL: &str = "small";
pub const TEXTURE_ROUGH: &str = "rough";

/// Label used when an entity kind has no entry in the type label map
pub const UNKNOWN_TYPE_LABEL: &str = "unknown-type";

/// Prefix marking a detection the recognizer could not match confidently.
/// The best-guess real name follows after a colon.
pub const PLACEHOLDER_MARKER: &str = "未知实体";

/// Semantic type of a detected entity.
///
/// Unknown upstream labels are kept verbatim in `Unrecognized` rather than
/// failing deserialization of the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Insect,
    DiseaseSymptom,
    Tree,
    Plant,
    Environment,
    Vehicle,
    Building,
    Natural,
    Industrial,
    Other,
    Unrecognized(String),
}

impl EntityKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Insect => "insect",
            Self::DiseaseSymptom => "disease_symptom",
            Self::Tree => "tree",
            Self::Plant => "plant",
            Self::Environment => "environment",
            Self::Vehicle => "vehicle",
            Self::Building => "building",
            Self::Natural => "natural",
            Self::Industrial => "industrial",
            Self::Other => "other",
            Self::Unrecognized(s) => s,
        }
    }
}

impl From<String> for EntityKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "insect" => Self::Insect,
            "disease_symptom" => Self::DiseaseSymptom,
            "tree" => Self::Tree,
            "plant" => Self::Plant,
            "environment" => Self::Environment,
            "vehicle" => Self::Vehicle,
            "building" => Self::Building,
            "natural" => Self::Natural,
            "industrial" => Self::Industrial,
            "other" => Self::Other,
            _ => Self::Unrecognized(s),
        }
    }
}

impl From<&str> for EntityKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default kind → type label mapping, keyed by the kind's wire name.
pub fn default_type_labels() -> BTreeMap<String, String> {
    [
        ("insect", "insect"),
        ("disease_symptom", "symptom"),
        ("tree", "plant"),
        ("plant", "plant"),
        ("environment", "environmental-factor"),
        ("vehicle", "vehicle"),
        ("building", "facility"),
        ("natural", "natural-environment"),
        ("industrial", "industrial-item"),
        ("other", "other"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// If `name` is a placeholder (`未知实体: <name>`, ASCII or full-width
/// colon), return the trimmed real name it carries.
///
/// Returns `None` for ordinary names and for placeholders with nothing
/// after the colon.
pub fn placeholder_target(name: &str) -> Option<&str> {
    let rest = name.strip_prefix(PLACEHOLDER_MARKER)?;
    let rest = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix('：'))?
        .trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}
