//! The blocker: applies a predicate disjunction to a record collection and
//! emits candidate pairs, without ever materializing the full cross
//! product.

use std::collections::HashMap;

use crate::algo::tfidf::TfIdfIndex;
use crate::algo::tokenizer;
use crate::model::{Record, RecordId};
use crate::predicates::{PredicateKind, PredicateSpec};

/// A block: two or more records that share at least one predicate key.
#[derive(Debug, Clone)]
pub struct Block {
    pub predicate_id: String,
    pub key: String,
    pub record_ids: Vec<RecordId>,
}

/// Applies a fixed set of `PredicateSpec`s to a record collection.
pub struct Blocker {
    predicates: Vec<PredicateSpec>,
    tfidf_indices: HashMap<String, TfIdfIndex>,
}

impl Blocker {
    pub fn new(predicates: Vec<PredicateSpec>) -> Self {
        Self {
            predicates,
            tfidf_indices: HashMap::new(),
        }
    }

    pub fn predicates(&self) -> &[PredicateSpec] {
        &self.predicates
    }

    /// Build TF-IDF indices for every `TfIdfCanopy` predicate's field, over
    /// the given records. Must run before `blocks` if the predicate set
    /// contains any canopy predicates.
    pub fn index_tfidf(&mut self, records: &[Record]) {
        let mut fields_needed: Vec<String> = self
            .predicates
            .iter()
            .filter(|p| matches!(p.kind, PredicateKind::TfIdfCanopy { .. }))
            .map(|p| p.field.clone())
            .collect();
        fields_needed.sort();
        fields_needed.dedup();

        for field in fields_needed {
            let mut index = TfIdfIndex::new();
            for record in records {
                if let Some(value) = record.get(&field) {
                    let tokens = tokenizer::tokenize(value);
                    index.add(record.id.clone(), &tokens);
                }
            }
            index.build();
            self.tfidf_indices.insert(field, index);
        }
    }

    /// Every block with at least two members, across all predicates and
    /// fields. Blocks with a single member cannot yield a candidate pair
    /// and are dropped.
    pub fn blocks(&self, records: &[Record]) -> Vec<Block> {
        let mut blocks = Vec::new();

        for predicate in &self.predicates {
            match &predicate.kind {
                PredicateKind::TfIdfCanopy { .. } => {
                    blocks.extend(self.tfidf_blocks(predicate, records));
                }
                other => {
                    let mut grouped: HashMap<String, Vec<RecordId>> = HashMap::new();
                    for record in records {
                        let Some(value) = record.get(&predicate.field) else {
                            continue;
                        };
                        for key in other.keys(value) {
                            grouped.entry(key).or_default().push(record.id.clone());
                        }
                    }
                    for (key, mut ids) in grouped {
                        if ids.len() < 2 {
                            continue;
                        }
                        ids.sort();
                        ids.dedup();
                        if ids.len() < 2 {
                            continue;
                        }
                        blocks.push(Block {
                            predicate_id: predicate.id(),
                            key,
                            record_ids: ids,
                        });
                    }
                }
            }
        }

        blocks
    }

    fn tfidf_blocks(&self, predicate: &PredicateSpec, records: &[Record]) -> Vec<Block> {
        let Some(index) = self.tfidf_indices.get(&predicate.field) else {
            return vec![];
        };
        let mut blocks = Vec::new();
        for record in records {
            let Some(value) = record.get(&predicate.field) else {
                continue;
            };
            let tokens = tokenizer::tokenize(value);
            let mut matches = predicate.kind.tfidf_canopy_keys(&record.id, &tokens, index);
            if matches.is_empty() {
                continue;
            }
            matches.push(record.id.clone());
            matches.sort();
            matches.dedup();
            if matches.len() < 2 {
                continue;
            }
            blocks.push(Block {
                predicate_id: predicate.id(),
                key: record.id.clone(),
                record_ids: matches,
            });
        }
        blocks
    }

    /// Canonical candidate pairs across every block: `(min_id, max_id)`,
    /// deduplicated across predicates so a pair covered by two predicates is
    /// scored once.
    pub fn candidate_pairs(&self, records: &[Record]) -> Vec<(RecordId, RecordId)> {
        let blocks = self.blocks(records);
        let mut seen = std::collections::HashSet::new();
        let mut pairs = Vec::new();
        for block in &blocks {
            for i in 0..block.record_ids.len() {
                for j in (i + 1)..block.record_ids.len() {
                    let a = &block.record_ids[i];
                    let b = &block.record_ids[j];
                    let key = if a < b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
                    if seen.insert(key.clone()) {
                        pairs.push(key);
                    }
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attributes;

    fn record(id: &str, name: &str) -> Record {
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), name.to_string());
        Record::new(id, attrs)
    }

    #[test]
    fn whole_field_blocks_exact_duplicates() {
        let records = vec![
            record("1", "acme corp"),
            record("2", "acme corp"),
            record("3", "widget co"),
        ];
        let blocker = Blocker::new(vec![PredicateSpec::new("name", PredicateKind::WholeField)]);
        let pairs = blocker.candidate_pairs(&records);
        assert_eq!(pairs, vec![("1".to_string(), "2".to_string())]);
    }

    #[test]
    fn same_prefix_blocks_near_duplicates() {
        let records = vec![
            record("1", "mcdonald's"),
            record("2", "mcdonalds"),
            record("3", "burger king"),
        ];
        let blocker = Blocker::new(vec![PredicateSpec::new("name", PredicateKind::SamePrefix(3))]);
        let pairs = blocker.candidate_pairs(&records);
        assert_eq!(pairs, vec![("1".to_string(), "2".to_string())]);
    }

    #[test]
    fn duplicate_pairs_across_predicates_are_deduped() {
        let records = vec![record("1", "acme corp"), record("2", "acme corp")];
        let blocker = Blocker::new(vec![
            PredicateSpec::new("name", PredicateKind::WholeField),
            PredicateSpec::new("name", PredicateKind::SamePrefix(3)),
        ]);
        let pairs = blocker.candidate_pairs(&records);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn singleton_blocks_produce_no_pairs() {
        let records = vec![record("1", "acme"), record("2", "widget"), record("3", "gizmo")];
        let blocker = Blocker::new(vec![PredicateSpec::new("name", PredicateKind::WholeField)]);
        assert!(blocker.candidate_pairs(&records).is_empty());
    }

    #[test]
    fn tfidf_canopy_blocks_similar_text() {
        let records = vec![
            record("1", "acme corp industries global holdings"),
            record("2", "acme corporation industries global holdings"),
            record("3", "completely different text here"),
        ];
        let mut blocker = Blocker::new(vec![PredicateSpec::new(
            "name",
            PredicateKind::TfIdfCanopy { tau: crate::predicates::OrderedTau(0.4) },
        )]);
        blocker.index_tfidf(&records);
        let pairs = blocker.candidate_pairs(&records);
        assert!(pairs.contains(&("1".to_string(), "2".to_string())));
        assert!(!pairs.iter().any(|(a, b)| a == "3" || b == "3"));
    }
}
