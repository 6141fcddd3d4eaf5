//! Feature extraction: turns a pair of records into a distance vector, one
//! entry per `DataModel` field.

use rayon::prelude::*;

use crate::model::{DataModel, FeatureVector, FieldKind, Record};

/// Computes the feature vector for a single record pair against a model.
/// Synthetic `:not_missing` fields are `1.0` when both records have the
/// base field present and non-empty, `0.0` otherwise.
pub fn feature_vector(model: &DataModel, a: &Record, b: &Record) -> FeatureVector {
    model
        .fields()
        .iter()
        .map(|field| match field.kind {
            FieldKind::MissingDataIndicator => {
                let base = field.name.strip_suffix(":not_missing").unwrap_or(&field.name);
                let a_present = a.get(base).is_some_and(|v| !v.is_empty());
                let b_present = b.get(base).is_some_and(|v| !v.is_empty());
                if a_present && b_present {
                    1.0
                } else {
                    0.0
                }
            }
            _ => {
                let comparator = field
                    .comparator
                    .as_ref()
                    .expect("non-missing-indicator fields always carry a comparator");
                let av = a.get(&field.name).unwrap_or("");
                let bv = b.get(&field.name).unwrap_or("");
                comparator.distance(av, bv)
            }
        })
        .collect()
}

/// Feature vectors for every pair, computed in parallel but returned in the
/// same order as `pairs` — parallelism is an implementation detail, never
/// visible in the output.
pub fn feature_vectors(
    model: &DataModel,
    pairs: &[(Record, Record)],
) -> Vec<FeatureVector> {
    pairs
        .par_iter()
        .map(|(a, b)| feature_vector(model, a, b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attributes, FieldDef};

    fn model_with_missing() -> DataModel {
        DataModel::new(vec![("city".to_string(), FieldDef::string().with_missing(true))]).unwrap()
    }

    fn record(id: &str, city: Option<&str>) -> Record {
        let mut attrs = Attributes::new();
        if let Some(c) = city {
            attrs.insert("city".to_string(), c.to_string());
        }
        Record::new(id, attrs)
    }

    #[test]
    fn missing_indicator_agrees_when_both_present() {
        let model = model_with_missing();
        let fv = feature_vector(&model, &record("1", Some("nyc")), &record("2", Some("nyc")));
        assert_eq!(fv[1], 1.0);
    }

    #[test]
    fn missing_indicator_disagrees_when_one_absent() {
        let model = model_with_missing();
        let fv = feature_vector(&model, &record("1", Some("nyc")), &record("2", None));
        assert_eq!(fv[1], 0.0);
    }

    #[test]
    fn missing_indicator_treats_empty_string_as_absent() {
        let model = model_with_missing();
        let fv = feature_vector(&model, &record("1", Some("nyc")), &record("2", Some("")));
        assert_eq!(fv[1], 0.0);
    }

    #[test]
    fn distance_field_identical_is_zero() {
        let model = DataModel::new(vec![("name".to_string(), FieldDef::string())]).unwrap();
        let fv = feature_vector(&model, &record_name("1", "acme"), &record_name("2", "acme"));
        assert_eq!(fv[0], 0.0);
    }

    fn record_name(id: &str, name: &str) -> Record {
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), name.to_string());
        Record::new(id, attrs)
    }

    #[test]
    fn feature_vectors_preserve_order() {
        let model = DataModel::new(vec![("name".to_string(), FieldDef::string())]).unwrap();
        let pairs = vec![
            (record_name("1", "acme"), record_name("2", "zzzzz")),
            (record_name("3", "acme"), record_name("4", "acme")),
        ];
        let vectors = feature_vectors(&model, &pairs);
        assert_eq!(vectors.len(), 2);
        assert!(vectors[0][0] > vectors[1][0]);
    }
}
