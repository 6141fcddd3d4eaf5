//! Active learning: uncertainty sampling over candidate pairs, driven by an
//! oracle (a human, or a test double) that labels the pairs the current
//! provisional model is least sure about.

use tracing::{info, instrument};

use crate::algo::sampling;
use crate::error::{DedupeError, Result};
use crate::features::feature_vector;
use crate::model::{DataModel, FieldKind, LabeledPair, Record};
use crate::train;

const UNCERTAINTY_BATCH: usize = 10;
const BOOTSTRAP_NON_DUPES: usize = 10;
/// Bottom decile of max-field-similarity counts as "confidently not a
/// duplicate" for bootstrap purposes.
const NON_DUPLICATE_QUANTILE: f64 = 0.1;

/// What the oracle hands back for one batch of presented pairs.
pub struct OracleResponse {
    pub duplicates: Vec<(Record, Record)>,
    pub distinct: Vec<(Record, Record)>,
    pub finished: bool,
}

/// A source of ground truth for pair labels — a human reviewer in the real
/// system, a scripted responder in tests.
pub trait Oracle {
    fn label(&mut self, pairs: &[(Record, Record)], model: &DataModel) -> Result<OracleResponse>;
}

/// Drives the uncertainty-sampling loop until the oracle signals it is
/// finished or the candidate pool is exhausted.
pub struct ActiveLearner<'a> {
    model: &'a DataModel,
    seed: u64,
}

impl<'a> ActiveLearner<'a> {
    pub fn new(model: &'a DataModel, seed: u64) -> Self {
        Self { model, seed }
    }

    /// Run the loop. `candidates` is the full unlabeled pair pool (typically
    /// every pair within a data sample, not the blocked candidate set).
    #[instrument(skip(self, candidates, oracle), fields(n_candidates = candidates.len()))]
    pub fn learn(
        &self,
        candidates: Vec<(Record, Record)>,
        oracle: &mut dyn Oracle,
    ) -> Result<Vec<LabeledPair>> {
        let mut labeled: Vec<LabeledPair> = Vec::new();
        let mut remaining = candidates;

        if remaining.is_empty() {
            return Err(DedupeError::EmptyInput("no candidate pairs to learn from".into()));
        }

        loop {
            let n_pos = labeled.iter().filter(|p| p.label == 1).count();
            let n_neg = labeled.iter().filter(|p| p.label == 0).count();

            let mut training_set = labeled.clone();
            if n_neg < 1 {
                training_set.extend(self.bootstrap_non_duplicates(&remaining));
            }
            if n_pos < 1 && n_neg < 1 {
                // Nothing to train a provisional model on yet; present an
                // arbitrary first batch so the oracle can seed both classes.
                let take = UNCERTAINTY_BATCH.min(remaining.len());
                let batch: Vec<(Record, Record)> = remaining.drain(..take).collect();
                let response = oracle.label(&batch, self.model)?;
                self.absorb_response(&mut labeled, &mut remaining, response.duplicates, response.distinct);
                if response.finished || remaining.is_empty() {
                    return Ok(labeled);
                }
                continue;
            }

            let features: Vec<Vec<f64>> = training_set
                .iter()
                .map(|p| feature_vector(self.model, &p.a, &p.b))
                .collect();
            let labels: Vec<u8> = training_set.iter().map(|p| p.label).collect();

            let provisional = train::bootstrap(&features, &labels)?;

            let mut scored: Vec<(usize, f64)> = remaining
                .iter()
                .enumerate()
                .map(|(i, (a, b))| {
                    let fv = feature_vector(self.model, a, b);
                    let p = provisional.predict_proba(&fv);
                    (i, (p - 0.5).abs())
                })
                .collect();
            // Smallest distance to 0.5 first; ties keep input order (stable sort).
            scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            let batch_indices: Vec<usize> = scored.iter().take(UNCERTAINTY_BATCH).map(|(i, _)| *i).collect();
            if batch_indices.is_empty() {
                return Ok(labeled);
            }
            let batch: Vec<(Record, Record)> = batch_indices.iter().map(|&i| remaining[i].clone()).collect();

            let response = oracle.label(&batch, self.model)?;
            info!(
                n_duplicates = response.duplicates.len(),
                n_distinct = response.distinct.len(),
                finished = response.finished,
                "oracle responded"
            );

            // Remove the presented batch from the pool regardless of how
            // the oracle classified it — it has been adjudicated.
            let mut to_remove: std::collections::HashSet<usize> = batch_indices.into_iter().collect();
            remaining = remaining
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !to_remove.remove(i))
                .map(|(_, pair)| pair)
                .collect();

            self.absorb_response(&mut labeled, &mut remaining, response.duplicates, response.distinct);

            if response.finished || remaining.is_empty() {
                return Ok(labeled);
            }
        }
    }

    fn absorb_response(
        &self,
        labeled: &mut Vec<LabeledPair>,
        _remaining: &mut [(Record, Record)],
        duplicates: Vec<(Record, Record)>,
        distinct: Vec<(Record, Record)>,
    ) {
        for (a, b) in duplicates {
            labeled.push(LabeledPair { a, b, label: 1 });
        }
        for (a, b) in distinct {
            labeled.push(LabeledPair { a, b, label: 0 });
        }
    }

    /// Semi-supervised non-duplicates: pairs whose maximum field similarity
    /// falls in the bottom decile of the pool, sampled from that low-
    /// similarity subset and assumed non-duplicate. Used only to seed the
    /// zero class before any oracle-confirmed negative exists — a pair with
    /// no similar field at all is confidently distinct without needing to
    /// ask the oracle.
    fn bootstrap_non_duplicates(&self, pool: &[(Record, Record)]) -> Vec<LabeledPair> {
        let n = pool.len();
        if n == 0 {
            return vec![];
        }

        let max_similarity: Vec<f64> = pool
            .iter()
            .map(|(a, b)| {
                feature_vector(self.model, a, b)
                    .iter()
                    .zip(self.model.fields())
                    .filter(|(_, field)| !matches!(field.kind, FieldKind::MissingDataIndicator))
                    .map(|(distance, _)| 1.0 - distance)
                    .fold(f64::NEG_INFINITY, f64::max)
            })
            .collect();

        let take = BOOTSTRAP_NON_DUPES.min(n);
        sampling::low_quantile_sample(&max_similarity, NON_DUPLICATE_QUANTILE, take, self.seed)
            .into_iter()
            .map(|i| {
                let (a, b) = pool[i].clone();
                LabeledPair { a, b, label: 0 }
            })
            .collect()
    }
}
