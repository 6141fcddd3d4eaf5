//! Settings file: a self-describing framed binary format persisting a
//! trained `DataModel` and its learned predicate disjunction.
//!
//! Layout: `b"DDPE"` magic, a 2-byte little-endian version, then two
//! length-prefixed sections (4-byte LE length + JSON payload): the data
//! model, then the predicate disjunction. All multi-byte integers are
//! little-endian, so the format round-trips byte-identically regardless of
//! host endianness.
//!
//! `Custom` field comparators are functions and cannot be serialized; the
//! settings file persists their name, weight, and missing-data flag only.
//! The caller must re-supply the same comparators by field name when
//! reading settings back (see `read_settings`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DedupeError, Result};
use crate::model::{Comparator, CustomComparator, DataModel, FieldKind, FieldSpec};
use crate::predicates::PredicateSpec;

const MAGIC: &[u8; 4] = b"DDPE";
const VERSION: u16 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SerializableField {
    name: String,
    kind: SerializableKind,
    weight: f64,
    has_missing: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
enum SerializableKind {
    String,
    Custom,
    MissingDataIndicator,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializableModel {
    fields: Vec<SerializableField>,
    bias: f64,
}

/// Serialize a trained model and predicate set to the framed binary format.
pub fn write_settings(model: &DataModel, predicates: &[PredicateSpec]) -> Result<Vec<u8>> {
    let serializable = SerializableModel {
        fields: model
            .fields()
            .iter()
            .map(|f| SerializableField {
                name: f.name.clone(),
                kind: match f.kind {
                    FieldKind::String => SerializableKind::String,
                    FieldKind::Custom => SerializableKind::Custom,
                    FieldKind::MissingDataIndicator => SerializableKind::MissingDataIndicator,
                },
                weight: f.weight,
                has_missing: f.has_missing,
            })
            .collect(),
        bias: model.bias,
    };

    let model_section = serde_json::to_vec(&serializable)?;
    let predicate_section = serde_json::to_vec(predicates)?;

    let mut out = Vec::with_capacity(4 + 2 + 4 + model_section.len() + 4 + predicate_section.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(model_section.len() as u32).to_le_bytes());
    out.extend_from_slice(&model_section);
    out.extend_from_slice(&(predicate_section.len() as u32).to_le_bytes());
    out.extend_from_slice(&predicate_section);
    Ok(out)
}

/// Deserialize a settings file. `custom_comparators` supplies the closure
/// for every field that was `Custom` at write time, keyed by field name;
/// missing entries are a `ConfigurationError`.
pub fn read_settings(
    bytes: &[u8],
    custom_comparators: &HashMap<String, CustomComparator>,
) -> Result<(DataModel, Vec<PredicateSpec>)> {
    if bytes.len() < 10 || &bytes[0..4] != MAGIC {
        return Err(DedupeError::Configuration("settings file missing DDPE magic header".into()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(DedupeError::Configuration(format!(
            "unsupported settings file version {version}, expected {VERSION}"
        )));
    }

    let mut offset = 6;
    let (model_section, next) = read_section(bytes, offset)?;
    offset = next;
    let (predicate_section, _next) = read_section(bytes, offset)?;

    let serializable: SerializableModel = serde_json::from_slice(model_section)?;
    let predicates: Vec<PredicateSpec> = serde_json::from_slice(predicate_section)?;

    let mut fields = Vec::with_capacity(serializable.fields.len());
    for f in serializable.fields {
        let comparator = match f.kind {
            SerializableKind::String => Some(Comparator::AffineGap),
            SerializableKind::MissingDataIndicator => None,
            SerializableKind::Custom => {
                let c = custom_comparators.get(&f.name).ok_or_else(|| {
                    DedupeError::Configuration(format!(
                        "settings file references Custom field '{}' with no comparator supplied",
                        f.name
                    ))
                })?;
                Some(Comparator::Custom(c.clone()))
            }
        };
        fields.push(FieldSpec {
            name: f.name,
            kind: match f.kind {
                SerializableKind::String => FieldKind::String,
                SerializableKind::Custom => FieldKind::Custom,
                SerializableKind::MissingDataIndicator => FieldKind::MissingDataIndicator,
            },
            comparator,
            has_missing: f.has_missing,
            weight: f.weight,
        });
    }

    let model = DataModel::from_parts(fields, serializable.bias);
    Ok((model, predicates))
}

fn read_section(bytes: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    if bytes.len() < offset + 4 {
        return Err(DedupeError::Configuration("settings file truncated reading section length".into()));
    }
    let len = u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]) as usize;
    let start = offset + 4;
    if bytes.len() < start + len {
        return Err(DedupeError::Configuration("settings file truncated reading section body".into()));
    }
    Ok((&bytes[start..start + len], start + len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldDef;
    use crate::predicates::PredicateKind;

    #[test]
    fn roundtrip_string_fields() {
        let model = DataModel::new(vec![
            ("name".to_string(), FieldDef::string()),
            ("city".to_string(), FieldDef::string().with_missing(true)),
        ])
        .unwrap();
        let predicates = vec![PredicateSpec::new("name", PredicateKind::SamePrefix(3))];

        let bytes = write_settings(&model, &predicates).unwrap();
        let (read_model, read_predicates) = read_settings(&bytes, &HashMap::new()).unwrap();

        assert_eq!(read_model.num_fields(), model.num_fields());
        assert_eq!(read_model.fields()[0].name, "name");
        assert_eq!(read_predicates, predicates);
    }

    #[test]
    fn roundtrip_is_byte_identical() {
        let model = DataModel::new(vec![("name".to_string(), FieldDef::string())]).unwrap();
        let predicates = vec![PredicateSpec::new("name", PredicateKind::WholeField)];
        let bytes1 = write_settings(&model, &predicates).unwrap();
        let bytes2 = write_settings(&model, &predicates).unwrap();
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = read_settings(b"NOPE000000", &HashMap::new()).unwrap_err();
        assert!(matches!(err, DedupeError::Configuration(_)));
    }

    #[test]
    fn missing_custom_comparator_is_an_error() {
        let comparator: CustomComparator = std::sync::Arc::new(|_, _| 0.0);
        let model = DataModel::new(vec![("note".to_string(), FieldDef::custom(comparator))]).unwrap();
        let predicates = vec![];
        let bytes = write_settings(&model, &predicates).unwrap();
        let err = read_settings(&bytes, &HashMap::new()).unwrap_err();
        assert!(matches!(err, DedupeError::Configuration(_)));
    }

    #[test]
    fn preserves_field_weights() {
        let mut model = DataModel::new(vec![("name".to_string(), FieldDef::string())]).unwrap();
        model.set_weights(&[2.5], -1.0);
        let bytes = write_settings(&model, &[]).unwrap();
        let (read_model, _) = read_settings(&bytes, &HashMap::new()).unwrap();
        assert_eq!(read_model.weights(), vec![2.5]);
        assert_eq!(read_model.bias, -1.0);
    }
}
