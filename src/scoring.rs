//! Scoring candidate pairs against a trained model, and choosing a
//! decision threshold.

use tracing::instrument;

use crate::features::feature_vector;
use crate::model::{DataModel, Record, RecordId};
use crate::train::LogisticModel;

/// A scored candidate pair: `probability` is `P(duplicate)` under the
/// trained model.
#[derive(Debug, Clone)]
pub struct ScoredPair {
    pub a: RecordId,
    pub b: RecordId,
    pub probability: f64,
}

pub struct Scorer<'a> {
    model: &'a DataModel,
    logistic: &'a LogisticModel,
}

impl<'a> Scorer<'a> {
    pub fn new(model: &'a DataModel, logistic: &'a LogisticModel) -> Self {
        Self { model, logistic }
    }

    /// Score one candidate pair.
    pub fn score_pair(&self, a: &Record, b: &Record) -> f64 {
        let fv = feature_vector(self.model, a, b);
        self.logistic.predict_proba(&fv)
    }

    /// Score every candidate pair, streaming rather than materializing all
    /// feature vectors at once — candidates are consumed one at a time.
    #[instrument(skip(self, pairs), fields(n = pairs.len()))]
    pub fn score_duplicates(&self, pairs: &[(Record, Record)]) -> Vec<ScoredPair> {
        pairs
            .iter()
            .map(|(a, b)| ScoredPair {
                a: a.id.clone(),
                b: b.id.clone(),
                probability: self.score_pair(a, b),
            })
            .collect()
    }

    /// Only pairs scoring at or above `threshold`.
    pub fn score_above(&self, pairs: &[(Record, Record)], threshold: f64) -> Vec<ScoredPair> {
        self.score_duplicates(pairs)
            .into_iter()
            .filter(|p| p.probability >= threshold)
            .collect()
    }
}

/// Choose the probability threshold maximizing the F-beta score, where
/// `beta^2 = recall_weight^2` — recall_weight > 1 favors recall over
/// precision. Evaluated over the sorted descending probabilities using a
/// cumulative-sum proxy: at each candidate cut point, everything at or
/// above it is predicted positive.
///
/// Requires ground truth for candidates (typically from a held-out labeled
/// sample against which the trained model's scores are compared). Ties in
/// the F-beta score favor the *smaller* probability cut point (more
/// inclusive), matching the source's `argmax` over an ascending cut list.
pub fn good_threshold(scored: &[(f64, u8)], recall_weight: f64) -> f64 {
    if scored.is_empty() {
        return 0.5;
    }
    let mut sorted = scored.to_vec();
    sorted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let total_positive = sorted.iter().filter(|(_, y)| *y == 1).count() as f64;
    if total_positive == 0.0 {
        return sorted.last().map(|(p, _)| *p).unwrap_or(0.5);
    }

    let beta2 = recall_weight * recall_weight;
    let mut true_positives = 0.0;
    let mut best_score = f64::NEG_INFINITY;
    let mut best_threshold = sorted[0].0;

    for (i, &(p, y)) in sorted.iter().enumerate() {
        if y == 1 {
            true_positives += 1.0;
        }
        let predicted_positive = (i + 1) as f64;
        let precision = true_positives / predicted_positive;
        let recall = true_positives / total_positive;
        let score = if recall + beta2 * precision > 0.0 {
            recall * precision / (recall + beta2 * precision)
        } else {
            0.0
        };
        // `>=` walks cut points in descending-probability order, so a tie
        // overwrites with the smaller probability — ties favor the smaller
        // threshold at the argmax.
        if score >= best_score {
            best_score = score;
            best_threshold = p;
        }
    }

    best_threshold
}

/// The primary threshold-selection algorithm: a label-free cumulative-sum
/// proxy over scored probabilities alone, with no ground truth required.
/// Mirrors the source's `goodThreshold`: sort probabilities descending, treat
/// their cumulative sum as the expected count of true duplicates among the
/// top-`i` candidates, and derive recall/precision from that running total
/// rather than from labels. Ties in the F-beta score favor the *first*
/// (highest-probability) cut point encountered, matching `numpy.argmax`.
pub fn good_threshold_unlabeled(scored_probs: &[f64], recall_weight: f64) -> f64 {
    if scored_probs.is_empty() {
        return 0.5;
    }
    let mut sorted = scored_probs.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let total_expected: f64 = sorted.iter().sum();
    if total_expected <= 0.0 {
        return *sorted.last().unwrap();
    }

    let beta2 = recall_weight * recall_weight;
    let mut expected_dupes = 0.0;
    let mut best_score = f64::NEG_INFINITY;
    let mut best_threshold = sorted[0];

    for (i, &p) in sorted.iter().enumerate() {
        expected_dupes += p;
        let predicted_positive = (i + 1) as f64;
        let precision = expected_dupes / predicted_positive;
        let recall = expected_dupes / total_expected;
        let score = if recall + beta2 * precision > 0.0 {
            recall * precision / (recall + beta2 * precision)
        } else {
            0.0
        };
        // Strict `>` so the first (highest-probability) cut point wins a
        // tie, matching `numpy.argmax`'s first-occurrence semantics.
        if score > best_score {
            best_score = score;
            best_threshold = p;
        }
    }

    best_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn good_threshold_perfect_separation() {
        // Positives all score high, negatives all score low: any cut in the
        // gap maximizes F-beta, and the proxy should land at or above the
        // lowest positive score.
        let scored = vec![(0.95, 1), (0.9, 1), (0.3, 0), (0.1, 0)];
        let t = good_threshold(&scored, 1.0);
        assert!((0.9..=0.95).contains(&t));
    }

    #[test]
    fn good_threshold_empty_is_midpoint() {
        assert_eq!(good_threshold(&[], 1.0), 0.5);
    }

    #[test]
    fn good_threshold_all_negative() {
        let scored = vec![(0.8, 0), (0.2, 0)];
        let t = good_threshold(&scored, 1.0);
        assert_eq!(t, 0.2);
    }

    #[test]
    fn higher_recall_weight_favors_lower_threshold() {
        let scored = vec![(0.9, 1), (0.7, 1), (0.5, 0), (0.3, 1), (0.1, 0)];
        let low_recall_weight = good_threshold(&scored, 0.5);
        let high_recall_weight = good_threshold(&scored, 3.0);
        assert!(high_recall_weight <= low_recall_weight);
    }

    #[test]
    fn good_threshold_unlabeled_empty_is_midpoint() {
        assert_eq!(good_threshold_unlabeled(&[], 1.0), 0.5);
    }

    #[test]
    fn good_threshold_unlabeled_all_zero_is_the_lowest_probability() {
        let probs = vec![0.0, 0.0, 0.0];
        assert_eq!(good_threshold_unlabeled(&probs, 1.0), 0.0);
    }

    #[test]
    fn good_threshold_unlabeled_picks_a_threshold_within_the_scored_range() {
        let probs = vec![0.95, 0.9, 0.85, 0.3, 0.2, 0.1];
        let t = good_threshold_unlabeled(&probs, 1.0);
        assert!((0.1..=0.95).contains(&t));
    }

    #[test]
    fn good_threshold_unlabeled_higher_recall_weight_favors_lower_threshold() {
        let probs = vec![0.9, 0.8, 0.7, 0.4, 0.2, 0.1];
        let low_recall_weight = good_threshold_unlabeled(&probs, 0.5);
        let high_recall_weight = good_threshold_unlabeled(&probs, 3.0);
        assert!(high_recall_weight <= low_recall_weight);
    }
}
