//! Rule-based relation derivation over co-occurring entity types

use super::relations::add_relation_if_absent;
use super::stats::UpdateStats;
use crate::graph::vocabulary::{HOSTED_BY, SUSCEPTIBLE_TO, TRANSMITS};
use crate::graph::{EntityKind, Triple};
use crate::perception::DetectedEntity;
use crate::storage::{StorageResult, TripleStore};

/// Candidate relation triples for a batch.
///
/// Entities are partitioned into insects, disease symptoms and trees, and
/// three fixed cross products are taken:
/// - insect × symptom → `transmits`
/// - tree × symptom → `susceptible-to`
/// - insect × tree → `hosted-by`
///
/// Each side uses its resolved name. Pairs whose sides resolve to the same
/// name are skipped. The result can contain duplicates; the write path
/// deduplicates.
pub fn derive_rule_relations(entities: &[DetectedEntity]) -> Vec<Triple> {
    let insects = names_of(entities, EntityKind::Insect);
    let symptoms = names_of(entities, EntityKind::DiseaseSymptom);
    let trees = names_of(entities, EntityKind::Tree);

    let mut triples = Vec::new();
    for (heads, relation, tails) in [
        (&insects, TRANSMITS, &symptoms),
        (&trees, SUSCEPTIBLE_TO, &symptoms),
        (&insects, HOSTED_BY, &trees),
    ] {
        for head in heads {
            for tail in tails {
                if head != tail {
                    triples.push(Triple::new(*head, relation, *tail));
                }
            }
        }
    }

    triples
}

fn names_of(entities: &[DetectedEntity], kind: EntityKind) -> Vec<&str> {
    entities
        .iter()
        .filter(|e| e.kind == kind)
        .map(DetectedEntity::resolved_name)
        .collect()
}

/// Write the missing triples of `rule_triples`, as derived by
/// [`derive_rule_relations`]. Returns how many were inserted.
pub fn apply_rule_relations<S>(
    store: &S,
    rule_triples: &[Triple],
    stats: &mut UpdateStats,
) -> StorageResult<usize>
where
    S: TripleStore + ?Sized,
{
    let mut inserted = 0;
    for triple in rule_triples {
        if add_relation_if_absent(store, triple, stats)? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{OpenStore, SqliteStore};

    fn insect(name: &str) -> DetectedEntity {
        DetectedEntity::new(name, "insect", 0.9, 0.3)
    }

    fn symptom(name: &str) -> DetectedEntity {
        DetectedEntity::new(name, "disease_symptom", 0.8, 0.2)
    }

    fn tree(name: &str) -> DetectedEntity {
        DetectedEntity::new(name, "tree", 0.8, 0.2)
    }

    #[test]
    fn insect_and_symptom_give_transmits() {
        let triples = derive_rule_relations(&[insect("松墨天牛"), symptom("松树枯死")]);
        assert_eq!(triples, vec![Triple::new("松墨天牛", TRANSMITS, "松树枯死")]);
    }

    #[test]
    fn all_three_rules_fire() {
        let triples = derive_rule_relations(&[insect("i"), symptom("s"), tree("t")]);
        assert_eq!(
            triples,
            vec![
                Triple::new("i", TRANSMITS, "s"),
                Triple::new("t", SUSCEPTIBLE_TO, "s"),
                Triple::new("i", HOSTED_BY, "t"),
            ]
        );
    }

    #[test]
    fn cross_product_covers_every_pair() {
        let triples = derive_rule_relations(&[insect("i1"), insect("i2"), symptom("s1"), symptom("s2")]);
        assert_eq!(triples.len(), 4);
    }

    #[test]
    fn plant_is_not_a_tree() {
        let plant = DetectedEntity::new("灌木", "plant", 0.9, 0.2);
        assert!(derive_rule_relations(&[insect("i"), plant]).is_empty());
    }

    #[test]
    fn matched_names_are_used() {
        let beetle = insect("beetle").with_match("松墨天牛");
        let triples = derive_rule_relations(&[beetle, symptom("枯枝")]);
        assert_eq!(triples, vec![Triple::new("松墨天牛", TRANSMITS, "枯枝")]);
    }

    #[test]
    fn self_pairs_are_skipped() {
        let a = insect("x");
        let b = tree("y").with_match("x");
        assert!(derive_rule_relations(&[a, b]).is_empty());
    }

    #[test]
    fn duplicates_are_written_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut stats = UpdateStats::new();
        let triples = derive_rule_relations(&[insect("i"), insect("i"), symptom("s")]);

        assert_eq!(triples.len(), 2);
        assert_eq!(apply_rule_relations(&store, &triples, &mut stats).unwrap(), 1);
        assert_eq!(apply_rule_relations(&store, &triples, &mut stats).unwrap(), 0);
        assert_eq!(stats.new_relations_added, 1);
    }
}
