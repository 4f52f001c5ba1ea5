//! Oracle-assisted relation inference between unconnected entity pairs
//!
//! Runs in two steps around the batch's write scope. [`consult_oracle`]
//! offers every pair that is neither connected in the store nor joined by a
//! rule triple of the batch to the [`RelationOracle`], before any write is
//! made, so no write lock is held while the oracle thinks. Only labels from
//! the valid relation set come back as proposals. [`write_inferred`] then
//! writes the proposals inside the batch scope, one nested scope per pair,
//! so a store error on one pair leaves the rest of the batch untouched.

use super::relations::add_relation_if_absent;
use super::stats::UpdateStats;
use crate::graph::Triple;
use crate::oracle::{OracleError, RelationOracle};
use crate::perception::DetectedEntity;
use crate::storage::{run_atomically, StorageError, StorageResult, TripleStore};
use std::collections::BTreeSet;
use std::time::Duration;

/// Failure confined to one entity pair.
#[derive(Debug, thiserror::Error)]
pub enum PairError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Ask the oracle about every unconnected pair of `entities` and return
/// the relation triples it proposed with a valid label.
///
/// Pairs joined by one of `rule_triples` are not offered. Each unordered
/// pair is offered at most once. Per-pair failures are logged and counted
/// in `stats.inference_failures`; only a failed read of the valid relation
/// set is returned as an error.
pub async fn consult_oracle<S>(
    store: &S,
    oracle: &dyn RelationOracle,
    entities: &[DetectedEntity],
    rule_triples: &[Triple],
    timeout: Duration,
    stats: &mut UpdateStats,
) -> StorageResult<Vec<Triple>>
where
    S: TripleStore + ?Sized,
{
    if entities.len() < 2 {
        return Ok(Vec::new());
    }

    let valid = store.valid_relations()?;
    if valid.is_empty() {
        tracing::debug!("no valid relations configured, skipping inference");
        return Ok(Vec::new());
    }

    let mut offered = BTreeSet::new();
    let mut proposals = Vec::new();
    for (i, first) in entities.iter().enumerate() {
        for second in &entities[i + 1..] {
            let (a, b) = (first.resolved_name(), second.resolved_name());
            if a == b || !offered.insert(unordered(a, b)) {
                continue;
            }
            if rule_triples.iter().any(|t| t.connects(a, b)) {
                tracing::debug!(entity_a = a, entity_b = b, "pair joined by a rule relation");
                continue;
            }

            match ask_pair(store, oracle, a, b, &valid, timeout).await {
                Ok(Some(triple)) => proposals.push(triple),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(entity_a = a, entity_b = b, error = %e, "relation inference failed for pair");
                    stats.inference_failures += 1;
                }
            }
        }
    }

    Ok(proposals)
}

fn unordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// One pair: gate on connectivity, ask the oracle, validate.
async fn ask_pair<S>(
    store: &S,
    oracle: &dyn RelationOracle,
    a: &str,
    b: &str,
    valid: &BTreeSet<String>,
    timeout: Duration,
) -> Result<Option<Triple>, PairError>
where
    S: TripleStore + ?Sized,
{
    if store.are_connected(a, b)? {
        tracing::debug!(entity_a = a, entity_b = b, "pair already connected");
        return Ok(None);
    }

    let label = tokio::time::timeout(timeout, oracle.infer_relation(a, b, valid))
        .await
        .map_err(|_| OracleError::Timeout(timeout.as_millis() as u64))??;

    let Some(label) = label else {
        return Ok(None);
    };

    if !valid.contains(&label) {
        tracing::debug!(entity_a = a, entity_b = b, relation = %label, "discarding label outside valid relations");
        return Ok(None);
    }

    Ok(Some(Triple::new(a, label, b)))
}

/// Write the oracle's proposals, each in its own nested scope.
///
/// Returns the number of relations written. A pair that got connected
/// since the oracle was asked is left alone. A pair whose write fails is
/// rolled back, logged and counted in `stats.inference_failures`; only a
/// broken atomic scope is returned as an error.
pub fn write_inferred<S>(store: &S, proposals: &[Triple], stats: &mut UpdateStats) -> StorageResult<usize>
where
    S: TripleStore + ?Sized,
{
    let mut inserted = 0;
    for triple in proposals {
        match run_atomically(store, || write_pair(store, triple))? {
            Ok(pair_stats) => {
                inserted += pair_stats.new_relations_added;
                stats.absorb(pair_stats);
            }
            Err(e) => {
                tracing::warn!(relation = %triple, error = %e, "inferred relation rolled back");
                stats.inference_failures += 1;
            }
        }
    }
    Ok(inserted)
}

fn write_pair<S>(store: &S, triple: &Triple) -> StorageResult<UpdateStats>
where
    S: TripleStore + ?Sized,
{
    let mut pair_stats = UpdateStats::default();
    if store.are_connected(&triple.head, &triple.tail)? {
        tracing::debug!(relation = %triple, "pair connected since the oracle was asked");
        return Ok(pair_stats);
    }
    add_relation_if_absent(store, triple, &mut pair_stats)?;
    Ok(pair_stats)
}
