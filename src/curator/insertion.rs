//! Entity insertion for admitted entities

use super::projection::project_features;
use crate::config::CuratorConfig;
use crate::graph::vocabulary::BELONGS_TO;
use crate::graph::Triple;
use crate::perception::DetectedEntity;
use crate::storage::{StorageResult, TripleStore};

/// What was written for one inserted entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInsertion {
    /// The `belongs-to` type membership triple
    pub membership: Triple,
    /// Triples written by feature projection
    pub feature_triples: Vec<Triple>,
}

/// Insert an admitted entity: its type membership triple plus its
/// projected features.
///
/// Returns `None` without writing if the name already appears in the graph
/// (another event or an earlier entity of the same batch inserted it).
/// Callers run this inside an atomic scope so a failure midway leaves no
/// partial entity behind.
pub fn admit_entity<S>(
    store: &S,
    config: &CuratorConfig,
    entity: &DetectedEntity,
) -> StorageResult<Option<EntityInsertion>>
where
    S: TripleStore + ?Sized,
{
    if store.contains_entity(&entity.name)? {
        tracing::info!(entity = %entity.name, "entity already exists, skipping");
        return Ok(None);
    }

    let membership = Triple::new(&entity.name, BELONGS_TO, config.type_label(&entity.kind));
    store.insert_triple(&membership)?;

    let feature_triples = project_features(&entity.name, &entity.features);
    for triple in &feature_triples {
        store.insert_triple(triple)?;
    }

    Ok(Some(EntityInsertion {
        membership,
        feature_triples,
    }))
}
