//! Blocking predicates.
//!
//! A predicate maps one field's value to zero or more blocking keys. Two
//! records land in the same block when any predicate produces the same key
//! for both, on the same field. Predicates are represented as tagged data
//! (`PredicateKind`), not closures, so a learned predicate set can be
//! written to a settings file and read back byte-for-byte.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::algo::tokenizer;
use crate::algo::tfidf::TfIdfIndex;
use crate::model::RecordId;

/// One blocking predicate, tagged by kind. `TfIdfCanopy` additionally
/// carries the cosine threshold it was learned at — distinct thresholds are
/// distinct predicates, exactly as in the source's predicate catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredicateKind {
    WholeField,
    WhitespaceToken,
    FirstInteger,
    SamePrefix(usize),
    NearInteger,
    NGram(usize),
    TfIdfCanopy { tau: OrderedTau },
}

/// `f64` cosine threshold wrapped for `Eq`/`Hash`/serialization — canopy
/// thresholds are drawn from a fixed, finite grid (`0.2, 0.4, 0.6, 0.8`), so
/// bit-for-bit comparison is safe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderedTau(pub f64);

impl Eq for OrderedTau {}

impl OrderedTau {
    pub fn bits(&self) -> u64 {
        self.0.to_bits()
    }
}

impl PredicateKind {
    /// A short, stable tag used in predicate ids and settings serialization.
    pub fn tag(&self) -> String {
        match self {
            PredicateKind::WholeField => "wholeField".to_string(),
            PredicateKind::WhitespaceToken => "whitespaceToken".to_string(),
            PredicateKind::FirstInteger => "firstInteger".to_string(),
            PredicateKind::SamePrefix(n) => format!("samePrefix{n}"),
            PredicateKind::NearInteger => "nearInteger".to_string(),
            PredicateKind::NGram(n) => format!("{n}gram"),
            PredicateKind::TfIdfCanopy { tau } => format!("tfidf:{:.2}", tau.0),
        }
    }

    /// The full catalogue of predicate kinds that don't require an index
    /// (everything except `TfIdfCanopy`, which is constructed separately
    /// once a `TfIdfIndex` exists per field).
    pub fn standard_catalogue() -> Vec<PredicateKind> {
        vec![
            PredicateKind::WholeField,
            PredicateKind::WhitespaceToken,
            PredicateKind::FirstInteger,
            PredicateKind::SamePrefix(3),
            PredicateKind::SamePrefix(5),
            PredicateKind::SamePrefix(7),
            PredicateKind::NearInteger,
            PredicateKind::NGram(4),
            PredicateKind::NGram(6),
        ]
    }

    pub const TFIDF_THRESHOLDS: [f64; 4] = [0.2, 0.4, 0.6, 0.8];

    /// Blocking keys this predicate would assign to `value`. A key is
    /// compared only against other keys produced by the *same* predicate on
    /// the *same* field, so it need not be globally unique.
    pub fn keys(&self, value: &str) -> Vec<String> {
        match self {
            PredicateKind::WholeField => {
                if value.is_empty() {
                    vec![]
                } else {
                    vec![value.to_string()]
                }
            }
            PredicateKind::WhitespaceToken => value
                .split_whitespace()
                .map(|t| t.to_string())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect(),
            PredicateKind::FirstInteger => first_integer(value).map(|i| vec![i]).unwrap_or_default(),
            PredicateKind::SamePrefix(n) => {
                let prefix: String = value.chars().take(*n).collect();
                if prefix.is_empty() {
                    vec![]
                } else {
                    vec![prefix]
                }
            }
            PredicateKind::NearInteger => near_integers(value),
            PredicateKind::NGram(n) => {
                if value.is_empty() {
                    vec![]
                } else {
                    tokenizer::shingles(value, *n).into_iter().collect::<HashSet<_>>().into_iter().collect()
                }
            }
            PredicateKind::TfIdfCanopy { .. } => {
                // Resolved via `tfidf_canopy_keys`, which needs the index.
                vec![]
            }
        }
    }

    /// TF-IDF canopy predicates resolve to the set of record ids within the
    /// cosine threshold of `record_id`'s own tokens, rather than a single
    /// string key — every matching record shares a block with `record_id`.
    pub fn tfidf_canopy_keys(
        &self,
        record_id: &RecordId,
        tokens: &[String],
        index: &TfIdfIndex,
    ) -> Vec<RecordId> {
        match self {
            PredicateKind::TfIdfCanopy { tau } => index
                .query(tokens, tau.0)
                .into_iter()
                .map(|(id, _)| id)
                .filter(|id| id != record_id)
                .collect(),
            _ => vec![],
        }
    }
}

fn first_integer(value: &str) -> Option<String> {
    let mut digits = String::new();
    let mut started = false;
    for c in value.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            started = true;
        } else if started {
            break;
        }
    }
    if digits.is_empty() {
        None
    } else {
        Some(digits.trim_start_matches('0').to_string()).filter(|s| !s.is_empty()).or(Some("0".to_string()))
    }
}

/// Keys for every integer found in `value`, plus its immediate neighbours
/// (`n-1`, `n`, `n+1`), so records differing by an off-by-one count land
/// together.
fn near_integers(value: &str) -> Vec<String> {
    let mut keys = HashSet::new();
    let mut digits = String::new();
    let flush = |digits: &mut String, keys: &mut HashSet<String>| {
        if !digits.is_empty() {
            if let Ok(n) = digits.parse::<i64>() {
                for d in -1..=1 {
                    keys.insert((n + d).to_string());
                }
            }
            digits.clear();
        }
    };
    for c in value.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            flush(&mut digits, &mut keys);
        }
    }
    flush(&mut digits, &mut keys);
    keys.into_iter().collect()
}

/// A predicate bound to a specific field, as applied by the blocker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateSpec {
    pub field: String,
    pub kind: PredicateKind,
}

impl PredicateSpec {
    pub fn new(field: impl Into<String>, kind: PredicateKind) -> Self {
        Self { field: field.into(), kind }
    }

    pub fn id(&self) -> String {
        format!("{}:{}", self.kind.tag(), self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_field_single_key() {
        let keys = PredicateKind::WholeField.keys("acme corp");
        assert_eq!(keys, vec!["acme corp"]);
    }

    #[test]
    fn whole_field_empty_yields_no_key() {
        assert!(PredicateKind::WholeField.keys("").is_empty());
    }

    #[test]
    fn whitespace_token_splits_and_dedupes() {
        let mut keys = PredicateKind::WhitespaceToken.keys("acme acme corp");
        keys.sort();
        assert_eq!(keys, vec!["acme", "corp"]);
    }

    #[test]
    fn first_integer_extracts_leading_number() {
        let keys = PredicateKind::FirstInteger.keys("apt 42b main st");
        assert_eq!(keys, vec!["42"]);
    }

    #[test]
    fn first_integer_absent() {
        assert!(PredicateKind::FirstInteger.keys("no numbers here").is_empty());
    }

    #[test]
    fn same_prefix_truncates() {
        let keys = PredicateKind::SamePrefix(3).keys("mcdonald's");
        assert_eq!(keys, vec!["mcd"]);
    }

    #[test]
    fn same_prefix_shorter_than_n() {
        let keys = PredicateKind::SamePrefix(7).keys("ab");
        assert_eq!(keys, vec!["ab"]);
    }

    #[test]
    fn near_integer_includes_neighbors() {
        let mut keys = PredicateKind::NearInteger.keys("unit 10");
        keys.sort();
        assert_eq!(keys, vec!["10", "11", "9"]);
    }

    #[test]
    fn ngram_four_basic() {
        let keys = PredicateKind::NGram(4).keys("main street");
        assert!(keys.contains(&"main".to_string()));
        assert!(keys.contains(&"stre".to_string()));
    }

    #[test]
    fn ngram_of_empty_string() {
        assert!(PredicateKind::NGram(4).keys("").is_empty());
    }

    #[test]
    fn predicate_id_combines_tag_and_field() {
        let p = PredicateSpec::new("name", PredicateKind::SamePrefix(3));
        assert_eq!(p.id(), "samePrefix3:name");
    }

    #[test]
    fn tfidf_predicate_tag_includes_threshold() {
        let p = PredicateKind::TfIdfCanopy { tau: OrderedTau(0.4) };
        assert_eq!(p.tag(), "tfidf:0.40");
    }
}
