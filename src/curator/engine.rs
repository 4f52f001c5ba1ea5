//! CuratorEngine: turns perception batches into graph updates
//!
//! A batch first asks the relation oracle about its unconnected pairs,
//! without writing anything. All of its writes then run in one synchronous
//! atomic scope over the triple store, so the scope never spans an await
//! and no write lock is held while the oracle is working. Inside the scope,
//! each admitted entity and each inferred pair gets its own nested scope,
//! so a failure there is rolled back and counted without touching the rest
//! of the batch. Anything that escapes those boundaries fails the whole
//! batch.

use super::admission::{Admission, AdmissionPolicy, RejectReason};
use super::inference::{consult_oracle, write_inferred};
use super::insertion::admit_entity;
use super::rules::{apply_rule_relations, derive_rule_relations};
use super::stats::UpdateStats;
use super::suggest::{suggest, Suggestion};
use crate::config::{ConfigError, CuratorConfig};
use crate::graph::Triple;
use crate::oracle::RelationOracle;
use crate::perception::{DetectedEntity, FeatureMap, PerceptionResult};
use crate::storage::{run_atomically, FeatureStore, StorageError, StorageResult, TripleStore};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the curator
#[derive(Debug, Error)]
pub enum CuratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The batch was rolled back. `partial` holds what had been counted
    /// before the failure; none of it was persisted.
    #[error("Batch {} failed and was rolled back: {source}", .partial.batch_id)]
    BatchFailed {
        source: StorageError,
        partial: Box<UpdateStats>,
    },
}

/// Result type for curator operations
pub type CuratorResult<T> = Result<T, CuratorError>;

/// Lifecycle of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Processing,
    Committed,
    Failed,
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn transition(batch_id: Uuid, from: BatchState, to: BatchState) {
    tracing::debug!(%batch_id, %from, %to, "batch state");
}

fn batch_failed(source: StorageError, partial: UpdateStats) -> CuratorError {
    transition(partial.batch_id, BatchState::Processing, BatchState::Failed);
    tracing::error!(batch_id = %partial.batch_id, error = %source, "batch rolled back");
    CuratorError::BatchFailed {
        source,
        partial: Box::new(partial),
    }
}

/// Batch-level failure carrying the stats accumulated so far out of the
/// batch scope.
struct BatchAbort {
    source: StorageError,
    partial: UpdateStats,
}

/// The curator engine
///
/// Owns read-only configuration, the stores and the relation oracle.
/// Batches on one engine are serialized.
pub struct CuratorEngine {
    config: CuratorConfig,
    triples: Arc<dyn TripleStore>,
    features: Arc<dyn FeatureStore>,
    oracle: Arc<dyn RelationOracle>,
    batch_lock: tokio::sync::Mutex<()>,
}

impl CuratorEngine {
    /// Create an engine over a store that serves both triples and features.
    ///
    /// Fails if `config` does not validate.
    pub fn new<S>(
        config: CuratorConfig,
        store: Arc<S>,
        oracle: Arc<dyn RelationOracle>,
    ) -> CuratorResult<Self>
    where
        S: TripleStore + FeatureStore + 'static,
    {
        Self::with_stores(config, store.clone(), store, oracle)
    }

    /// Create an engine over separate triple and feature stores.
    pub fn with_stores(
        config: CuratorConfig,
        triples: Arc<dyn TripleStore>,
        features: Arc<dyn FeatureStore>,
        oracle: Arc<dyn RelationOracle>,
    ) -> CuratorResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            triples,
            features,
            oracle,
            batch_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn config(&self) -> &CuratorConfig {
        &self.config
    }

    /// Process one perception batch.
    ///
    /// On success every write of the batch is committed and the stats are
    /// returned. On a batch-level failure every write of the batch is rolled
    /// back and [`CuratorError::BatchFailed`] carries the partial stats.
    /// Dropping the returned future before it completes writes nothing.
    pub async fn process_batch(&self, perception: &PerceptionResult) -> CuratorResult<UpdateStats> {
        let _guard = self.batch_lock.lock().await;

        let mut stats = UpdateStats::new();
        let batch_id = stats.batch_id;
        let entities = perception.detected_entities.as_slice();
        let store: &dyn TripleStore = self.triples.as_ref();

        transition(batch_id, BatchState::Idle, BatchState::Processing);
        tracing::info!(%batch_id, entities = entities.len(), "processing batch");

        // Pairs joined by a rule triple are never offered to the oracle
        let rule_triples = derive_rule_relations(entities);
        let proposals = match consult_oracle(
            store,
            self.oracle.as_ref(),
            entities,
            &rule_triples,
            self.config.oracle_timeout(),
            &mut stats,
        )
        .await
        {
            Ok(proposals) => proposals,
            Err(source) => return Err(batch_failed(source, stats)),
        };

        let outcome =
            run_atomically(store, move || self.run_batch(entities, &rule_triples, &proposals, stats));

        match outcome {
            Ok(Ok(stats)) => {
                transition(batch_id, BatchState::Processing, BatchState::Committed);
                tracing::info!(
                    %batch_id,
                    new_entities = stats.new_entities_added,
                    new_relations = stats.new_relations_added,
                    features = stats.features_updated,
                    skipped = stats.skipped_low_confidence,
                    entities_failed = stats.entities_failed,
                    inference_failures = stats.inference_failures,
                    "batch committed"
                );
                Ok(stats)
            }
            Ok(Err(abort)) => Err(batch_failed(abort.source, abort.partial)),
            // The scope itself broke; the stats were lost with it.
            Err(source) => Err(batch_failed(
                source,
                UpdateStats {
                    batch_id,
                    ..UpdateStats::default()
                },
            )),
        }
    }

    fn run_batch(
        &self,
        entities: &[DetectedEntity],
        rule_triples: &[Triple],
        proposals: &[Triple],
        mut stats: UpdateStats,
    ) -> Result<UpdateStats, BatchAbort> {
        match self.apply_batch(entities, rule_triples, proposals, &mut stats) {
            Ok(()) => Ok(stats),
            Err(source) => Err(BatchAbort {
                source,
                partial: stats,
            }),
        }
    }

    fn apply_batch(
        &self,
        entities: &[DetectedEntity],
        rule_triples: &[Triple],
        proposals: &[Triple],
        stats: &mut UpdateStats,
    ) -> StorageResult<()> {
        let store: &dyn TripleStore = self.triples.as_ref();

        for entity in entities {
            self.process_entity(entity, stats)?;
        }

        apply_rule_relations(store, rule_triples, stats)?;
        write_inferred(store, proposals, stats)?;

        Ok(())
    }

    /// Admission and insertion for one entity. Only a broken atomic scope
    /// is returned as an error.
    fn process_entity(&self, entity: &DetectedEntity, stats: &mut UpdateStats) -> StorageResult<()> {
        let store: &dyn TripleStore = self.triples.as_ref();

        let decision = match AdmissionPolicy::new(&self.config).evaluate(store, entity) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(entity = %entity.name, error = %e, "admission check failed");
                stats.entities_failed += 1;
                return Ok(());
            }
        };

        match decision {
            Admission::Admit => {}
            Admission::Reject(RejectReason::LowConfidence) => {
                tracing::debug!(entity = %entity.name, confidence = entity.confidence, "skipping low-confidence entity");
                stats.skipped_low_confidence += 1;
                return Ok(());
            }
            Admission::Reject(reason) => {
                tracing::debug!(entity = %entity.name, %reason, "entity not admitted");
                return Ok(());
            }
        }

        match run_atomically(store, || admit_entity(store, &self.config, entity))? {
            Ok(Some(insertion)) => {
                tracing::info!(
                    entity = %entity.name,
                    entity_type = %insertion.membership.tail,
                    features = insertion.feature_triples.len(),
                    "added entity"
                );
                stats.record_entity(entity, insertion.feature_triples.len());
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(entity = %entity.name, error = %e, "entity insertion rolled back");
                stats.entities_failed += 1;
            }
        }

        Ok(())
    }

    /// Upsert an entity's features into the feature table.
    ///
    /// All-or-nothing: returns `false` if any field failed, in which case
    /// nothing of this call was written and the call can be retried. The
    /// write runs on the blocking pool and does not wait for a batch in
    /// progress.
    pub async fn merge_entity_features(&self, entity_name: &str, features: &FeatureMap) -> bool {
        let store = Arc::clone(&self.features);
        let (name, fields) = (entity_name.to_string(), features.clone());

        match tokio::task::spawn_blocking(move || store.merge_features(&name, &fields)).await {
            Ok(Ok(written)) => {
                tracing::info!(entity = entity_name, fields = written, "merged features");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(entity = entity_name, error = %e, "feature merge failed, nothing written");
                false
            }
            Err(e) => {
                tracing::error!(entity = entity_name, error = %e, "feature merge task failed");
                false
            }
        }
    }

    /// Advisory suggestions for `entities` under this engine's thresholds
    pub fn suggestions(&self, entities: &[DetectedEntity]) -> Vec<Suggestion> {
        suggest(&self.config, entities)
    }
}
