//! The top-level facade: a pure, synchronous wrapper over every other
//! module, mirroring the shape of the system this crate reimplements —
//! `train`, `learn_blocking`, `good_threshold`, `duplicate_clusters`,
//! `write_settings`/`read_settings`, `write_training`/`read_training`.

use std::collections::HashMap;

use tracing::instrument;

use crate::active_learning::{ActiveLearner, Oracle};
use crate::blocking::Blocker;
use crate::blocking_learn::BlockingLearner;
use crate::cluster::{self, Cluster};
use crate::error::Result;
use crate::features::feature_vector;
use crate::model::{CustomComparator, DataModel, LabeledPair, Record};
use crate::predicates::PredicateSpec;
use crate::scoring::{self, Scorer};
use crate::settings;
use crate::train::{self, LogisticModel};
use crate::training_file;

/// A deduplication session: a data model, its learned weights, and its
/// learned blocking predicates, built up by calling `train` and
/// `learn_blocking` in sequence.
pub struct Dedupe {
    model: DataModel,
    logistic: Option<LogisticModel>,
    predicates: Vec<PredicateSpec>,
}

impl Dedupe {
    pub fn new(model: DataModel) -> Self {
        Self { model, logistic: None, predicates: Vec::new() }
    }

    pub fn data_model(&self) -> &DataModel {
        &self.model
    }

    /// Run active learning to convergence, then fit the final logistic
    /// regression by grid-searched cross-validation.
    #[instrument(skip(self, candidates, oracle))]
    pub fn train(
        &mut self,
        candidates: Vec<(Record, Record)>,
        oracle: &mut dyn Oracle,
        cv_folds: Option<usize>,
    ) -> Result<Vec<LabeledPair>> {
        let learner = ActiveLearner::new(&self.model, 0);
        let labeled = learner.learn(candidates, oracle)?;
        self.fit(&labeled, cv_folds)?;
        Ok(labeled)
    }

    /// Fit the final model from an already-labeled set (e.g. one read back
    /// from a training file), skipping active learning entirely.
    pub fn fit(&mut self, labeled: &[LabeledPair], cv_folds: Option<usize>) -> Result<()> {
        let features: Vec<Vec<f64>> = labeled.iter().map(|p| feature_vector(&self.model, &p.a, &p.b)).collect();
        let labels: Vec<u8> = labeled.iter().map(|p| p.label).collect();

        let alpha = train::grid_search(&features, &labels, cv_folds)?;
        let fitted = train::train(&features, &labels, alpha)?;
        self.model.set_weights(&fitted.weights, fitted.bias);
        self.logistic = Some(fitted);
        Ok(())
    }

    /// Learn a predicate disjunction from labeled pairs via Red-Blue set
    /// cover, and keep it for subsequent blocking. `sample` is the record
    /// collection blocking will actually run over — its size bounds the
    /// `ppc` pair-coverage cap, per-labeled-pair counts would not.
    pub fn learn_blocking(
        &mut self,
        labeled: &[LabeledPair],
        sample: &[Record],
        ppc: f64,
        epsilon: f64,
    ) -> Vec<PredicateSpec> {
        let learner = BlockingLearner { ppc, epsilon };
        let chosen = learner.learn(&self.model, labeled, sample);
        self.predicates = chosen.clone();
        chosen
    }

    /// Block `records` using the learned predicates and score every
    /// resulting candidate pair.
    pub fn score(&self, records: &[Record]) -> Result<Vec<scoring::ScoredPair>> {
        let logistic = self
            .logistic
            .as_ref()
            .ok_or_else(|| crate::error::DedupeError::Configuration("model has not been trained".into()))?;

        let mut blocker = Blocker::new(self.predicates.clone());
        blocker.index_tfidf(records);
        let pairs = blocker.candidate_pairs(records);

        let by_id: HashMap<&str, &Record> = records.iter().map(|r| (r.id.as_str(), r)).collect();
        let record_pairs: Vec<(Record, Record)> = pairs
            .into_iter()
            .filter_map(|(a, b)| Some(((*by_id.get(a.as_str())?).clone(), (*by_id.get(b.as_str())?).clone())))
            .collect();

        let scorer = Scorer::new(&self.model, logistic);
        Ok(scorer.score_duplicates(&record_pairs))
    }

    /// The probability threshold maximizing F-beta on a held-out labeled
    /// sample (`recall_weight` trades recall for precision; > 1 favors
    /// recall).
    pub fn good_threshold(&self, held_out: &[LabeledPair], recall_weight: f64) -> Result<f64> {
        let logistic = self
            .logistic
            .as_ref()
            .ok_or_else(|| crate::error::DedupeError::Configuration("model has not been trained".into()))?;
        let scorer = Scorer::new(&self.model, logistic);
        let scored: Vec<(f64, u8)> = held_out
            .iter()
            .map(|p| (scorer.score_pair(&p.a, &p.b), p.label))
            .collect();
        Ok(scoring::good_threshold(&scored, recall_weight))
    }

    /// The primary threshold-selection algorithm: a label-free cumulative-sum
    /// proxy over blocked-and-scored candidate probabilities, needing no
    /// held-out ground truth (`recall_weight` trades recall for precision;
    /// > 1 favors recall).
    pub fn good_threshold_unlabeled(&self, records: &[Record], recall_weight: f64) -> Result<f64> {
        let scored = self.score(records)?;
        let probs: Vec<f64> = scored.iter().map(|p| p.probability).collect();
        Ok(scoring::good_threshold_unlabeled(&probs, recall_weight))
    }

    /// Score and cluster `records` in one pass.
    pub fn duplicate_clusters(&self, records: &[Record], threshold: f64) -> Result<Vec<Cluster>> {
        let scored = self.score(records)?;
        Ok(cluster::duplicate_clusters(&scored, threshold))
    }

    pub fn write_settings(&self) -> Result<Vec<u8>> {
        settings::write_settings(&self.model, &self.predicates)
    }

    pub fn read_settings(bytes: &[u8], custom_comparators: &HashMap<String, CustomComparator>) -> Result<Self> {
        let (model, predicates) = settings::read_settings(bytes, custom_comparators)?;
        let logistic = LogisticModel { weights: model.weights(), bias: model.bias };
        Ok(Self { model, logistic: Some(logistic), predicates })
    }

    pub fn write_training(labeled: &[LabeledPair]) -> Result<String> {
        training_file::write_training(labeled)
    }

    pub fn read_training(json: &str) -> Result<Vec<LabeledPair>> {
        training_file::read_training(json)
    }
}
