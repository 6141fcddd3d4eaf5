//! The data model: fields, comparators, learned weights, and the records
//! they describe.
//!
//! The source's dictionary-of-dictionaries data model is redesigned here as
//! an owned struct: fields are an ordered `Vec`, weights live beside them,
//! bias is a scalar. Synthetic missing-indicator fields are generated once
//! at construction time.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::algo::string_distance;
use crate::error::{DedupeError, Result};

/// A field-to-value mapping. `BTreeMap` gives deterministic iteration order,
/// which matters for tokenization and blocking-key stringification.
pub type Attributes = BTreeMap<String, String>;

/// Opaque record identifier. Strings cover both numeric and natural keys
/// without forcing every caller through a newtype.
pub type RecordId = String;

/// A single input record: an id paired with an immutable attribute map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub attributes: Arc<Attributes>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            attributes: Arc::new(attributes),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).map(String::as_str)
    }
}

/// A user-supplied comparator for `Custom` fields: a pure, symmetric
/// distance kernel returning a finite real. The crate never rescales it.
pub type CustomComparator = Arc<dyn Fn(&str, &str) -> f64 + Send + Sync>;

#[derive(Clone)]
pub enum Comparator {
    AffineGap,
    Custom(CustomComparator),
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::AffineGap => write!(f, "Comparator::AffineGap"),
            Comparator::Custom(_) => write!(f, "Comparator::Custom(..)"),
        }
    }
}

impl Comparator {
    pub fn distance(&self, a: &str, b: &str) -> f64 {
        match self {
            Comparator::AffineGap => string_distance::normalized_affine_gap(a, b),
            Comparator::Custom(f) => f(a, b),
        }
    }
}

/// Declared kind of a field, mirroring the source's `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Custom,
    MissingDataIndicator,
}

/// One field of the data model: its name, kind, comparator, and learned
/// weight. Synthetic `:not_missing` companions carry `FieldKind::MissingDataIndicator`
/// and no comparator.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub comparator: Option<Comparator>,
    pub has_missing: bool,
    pub weight: f64,
}

impl FieldSpec {
    fn not_missing_companion(base_name: &str) -> Self {
        Self {
            name: format!("{base_name}:not_missing"),
            kind: FieldKind::MissingDataIndicator,
            comparator: None,
            has_missing: false,
            weight: 0.0,
        }
    }
}

/// A single field's definition as supplied by the caller (`§6 Field definition input`).
#[derive(Clone)]
pub struct FieldDef {
    pub kind: FieldKind,
    pub comparator: Option<CustomComparator>,
    pub missing: bool,
}

impl FieldDef {
    pub fn string() -> Self {
        Self {
            kind: FieldKind::String,
            comparator: None,
            missing: false,
        }
    }

    pub fn custom(comparator: CustomComparator) -> Self {
        Self {
            kind: FieldKind::Custom,
            comparator: Some(comparator),
            missing: false,
        }
    }

    pub fn with_missing(mut self, missing: bool) -> Self {
        self.missing = missing;
        self
    }
}

/// The ordered collection of fields plus a scalar bias. Field order is
/// immutable after construction — feature vectors and weight vectors are
/// indexed positionally against it.
#[derive(Debug, Clone)]
pub struct DataModel {
    fields: Vec<FieldSpec>,
    pub bias: f64,
}

impl DataModel {
    /// Build a `DataModel` from an ordered field definition list.
    ///
    /// Rejects: a `String` field carrying a comparator, a `Custom` field
    /// missing one. There is no "unknown type" case in this API because
    /// `FieldKind` is a closed enum — the caller cannot construct
    /// `FieldKind::MissingDataIndicator` directly via `FieldDef`.
    pub fn new(fields: Vec<(String, FieldDef)>) -> Result<Self> {
        if fields.is_empty() {
            return Err(DedupeError::Configuration(
                "field definition must contain at least one field".into(),
            ));
        }

        let mut built = Vec::with_capacity(fields.len());
        let mut missing_companions = Vec::new();

        for (name, def) in fields {
            let comparator = match def.kind {
                FieldKind::String => {
                    if def.comparator.is_some() {
                        return Err(DedupeError::Configuration(format!(
                            "field '{name}': custom comparators can only be defined for 'Custom' fields"
                        )));
                    }
                    Some(Comparator::AffineGap)
                }
                FieldKind::Custom => match def.comparator {
                    Some(c) => Some(Comparator::Custom(c)),
                    None => {
                        return Err(DedupeError::Configuration(format!(
                            "field '{name}': 'Custom' fields require a comparator"
                        )));
                    }
                },
                FieldKind::MissingDataIndicator => {
                    return Err(DedupeError::Configuration(format!(
                        "field '{name}': MissingDataIndicator is not a valid input field kind"
                    )));
                }
            };

            if def.missing {
                missing_companions.push(FieldSpec::not_missing_companion(&name));
            }

            built.push(FieldSpec {
                name,
                kind: def.kind,
                comparator,
                has_missing: def.missing,
                weight: 0.0,
            });
        }

        built.extend(missing_companions);

        Ok(Self {
            fields: built,
            bias: 0.0,
        })
    }

    /// Rebuild a `DataModel` from already-validated parts — used when
    /// reading a settings file back, where validation happened at write
    /// time.
    pub(crate) fn from_parts(fields: Vec<FieldSpec>, bias: f64) -> Self {
        Self { fields, bias }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut [FieldSpec] {
        &mut self.fields
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Real (non-synthetic) field names, in model order — used wherever a
    /// concatenation of a record's textual content is required (TF-IDF
    /// corpus building, predicate evaluation).
    pub fn real_field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.kind != FieldKind::MissingDataIndicator)
            .map(|f| f.name.as_str())
    }

    pub fn weights(&self) -> Vec<f64> {
        self.fields.iter().map(|f| f.weight).collect()
    }

    pub fn set_weights(&mut self, weights: &[f64], bias: f64) {
        assert_eq!(weights.len(), self.fields.len());
        for (field, &w) in self.fields.iter_mut().zip(weights) {
            field.weight = w;
        }
        self.bias = bias;
    }
}

/// A feature vector: one real-valued distance per model field (including
/// synthetic `:not_missing` companions), in model order.
pub type FeatureVector = Vec<f64>;

/// A pair of records with a human/oracle-assigned label.
#[derive(Debug, Clone)]
pub struct LabeledPair {
    pub a: Record,
    pub b: Record,
    pub label: u8,
}
