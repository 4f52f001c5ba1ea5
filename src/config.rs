//! Curator configuration
//!
//! Thresholds and the type label mapping are read-only after the engine is
//! constructed. Configuration can come from defaults or a YAML file:
//!
//! ```yaml
//! similarity_threshold: 0.6
//! confidence_threshold: 0.5
//! oracle_timeout_ms: 10000
//! type_labels:
//!   vehicle: transport
//! ```
//!
//! Entries in `type_labels` override the defaults key by key; kinds not
//! listed keep their default label.

use crate::graph::vocabulary::{default_type_labels, EntityKind, UNKNOWN_TYPE_LABEL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{name} must be within [0, 1], got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("oracle_timeout_ms must be greater than zero")]
    InvalidTimeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CuratorConfig {
    /// Entities more similar than this to known knowledge are not admitted
    pub similarity_threshold: f64,
    /// Entities recognized with less confidence than this are never admitted
    pub confidence_threshold: f64,
    /// Confidence an unmatched entity needs to be admitted
    pub admit_confidence: f64,
    /// Similarity above which a matched entity gets an update-features suggestion
    pub feature_update_similarity: f64,
    /// Upper bound for a single relation-inference oracle call
    pub oracle_timeout_ms: u64,
    /// Entity kind (wire name) → type label written by `belongs-to`
    pub type_labels: BTreeMap<String, String>,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            confidence_threshold: 0.5,
            admit_confidence: 0.7,
            feature_update_similarity: 0.7,
            oracle_timeout_ms: 30_000,
            type_labels: default_type_labels(),
        }
    }
}

impl CuratorConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        for (kind, label) in default_type_labels() {
            config.type_labels.entry(kind).or_insert(label);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("similarity_threshold", self.similarity_threshold),
            ("confidence_threshold", self.confidence_threshold),
            ("admit_confidence", self.admit_confidence),
            ("feature_update_similarity", self.feature_update_similarity),
        ];
        for (name, value) in thresholds {
            // NaN fails the range check too
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if self.oracle_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// The `belongs-to` label for an entity kind, `unknown-type` if unmapped.
    pub fn type_label(&self, kind: &EntityKind) -> &str {
        self.type_labels
            .get(kind.as_str())
            .map(String::as_str)
            .unwrap_or(UNKNOWN_TYPE_LABEL)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }
}
