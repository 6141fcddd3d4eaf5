//! Training file: a JSON document recording human-labeled pairs, so a
//! labeling session can be replayed without re-asking the oracle.
//!
//! Shape: `{"0": [[record_a, record_b], ...], "1": [[record_a, record_b], ...]}`,
//! where `"0"` holds distinct pairs and `"1"` holds duplicate pairs. Each
//! record is a plain field-name -> value JSON object; training-file records
//! carry no id, since training only ever needs their field content.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DedupeError, Result};
use crate::model::{Attributes, LabeledPair, Record};

#[derive(Serialize, Deserialize)]
struct TrainingFile {
    #[serde(rename = "0")]
    distinct: Vec<(Attributes, Attributes)>,
    #[serde(rename = "1")]
    duplicate: Vec<(Attributes, Attributes)>,
}

/// Serialize labeled pairs to the training-file JSON shape. Record ids are
/// dropped; only field content round-trips.
pub fn write_training(labeled: &[LabeledPair]) -> Result<String> {
    let mut file = TrainingFile { distinct: Vec::new(), duplicate: Vec::new() };
    for pair in labeled {
        let entry = ((*pair.a.attributes).clone(), (*pair.b.attributes).clone());
        match pair.label {
            0 => file.distinct.push(entry),
            1 => file.duplicate.push(entry),
            other => {
                return Err(DedupeError::Configuration(format!(
                    "label must be 0 or 1, got {other}"
                )))
            }
        }
    }
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Parse a training file into labeled pairs. Records are assigned
/// synthetic sequential ids (`a0`, `b0`, `a1`, `b1`, ...) since the file
/// format carries none.
pub fn read_training(json: &str) -> Result<Vec<LabeledPair>> {
    let value: Value = serde_json::from_str(json)?;
    let obj = value
        .as_object()
        .ok_or_else(|| DedupeError::Configuration("training file must be a JSON object".into()))?;

    let mut labeled = Vec::new();
    for (key, label) in [("0", 0u8), ("1", 1u8)] {
        let Some(pairs) = obj.get(key) else { continue };
        let pairs: Vec<(Attributes, Attributes)> = serde_json::from_value(pairs.clone())?;
        for (i, (a_attrs, b_attrs)) in pairs.into_iter().enumerate() {
            labeled.push(LabeledPair {
                a: Record::new(format!("{key}-a{i}"), a_attrs),
                b: Record::new(format!("{key}-b{i}"), b_attrs),
                label,
            });
        }
    }

    if labeled.is_empty() {
        return Err(DedupeError::EmptyInput("training file contains no labeled pairs".into()));
    }
    Ok(labeled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn roundtrip_preserves_labels() {
        let labeled = vec![
            LabeledPair {
                a: Record::new("1", attrs(&[("name", "acme")])),
                b: Record::new("2", attrs(&[("name", "acme")])),
                label: 1,
            },
            LabeledPair {
                a: Record::new("3", attrs(&[("name", "acme")])),
                b: Record::new("4", attrs(&[("name", "widget")])),
                label: 0,
            },
        ];
        let json = write_training(&labeled).unwrap();
        let read_back = read_training(&json).unwrap();
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back.iter().filter(|p| p.label == 1).count(), 1);
        assert_eq!(read_back.iter().filter(|p| p.label == 0).count(), 1);
    }

    #[test]
    fn empty_training_file_is_an_error() {
        let err = read_training(r#"{"0": [], "1": []}"#).unwrap_err();
        assert!(matches!(err, DedupeError::EmptyInput(_)));
    }

    #[test]
    fn non_object_json_is_a_configuration_error() {
        let err = read_training("[1,2,3]").unwrap_err();
        assert!(matches!(err, DedupeError::Configuration(_)));
    }

    #[test]
    fn preserves_field_content() {
        let labeled = vec![LabeledPair {
            a: Record::new("1", attrs(&[("name", "acme"), ("city", "nyc")])),
            b: Record::new("2", attrs(&[("name", "acme"), ("city", "nyc")])),
            label: 1,
        }];
        let json = write_training(&labeled).unwrap();
        let read_back = read_training(&json).unwrap();
        assert_eq!(read_back[0].a.get("city"), Some("nyc"));
    }
}
