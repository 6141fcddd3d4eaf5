use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A corpus of documents for TF-IDF and BM25 scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corpus {
    /// document_id -> term -> count
    doc_terms: Vec<HashMap<String, u32>>,
    /// term -> number of documents containing it
    doc_freq: HashMap<String, u32>,
    /// total number of documents
    num_docs: u32,
    /// average document length (in tokens)
    avg_dl: f64,
}

impl Corpus {
    pub fn new() -> Self {
        Self {
            doc_terms: Vec::new(),
            doc_freq: HashMap::new(),
            num_docs: 0,
            avg_dl: 0.0,
        }
    }

    /// Add a document (as pre-tokenized terms) to the corpus.
    pub fn add_document(&mut self, tokens: &[String]) {
        let mut term_counts: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *term_counts.entry(token.clone()).or_insert(0) += 1;
        }
        for term in term_counts.keys() {
            *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
        }
        self.doc_terms.push(term_counts);
        self.num_docs += 1;

        // Recompute average document length
        let total_len: usize = self.doc_terms.iter().map(|d| d.values().sum::<u32>() as usize).sum();
        self.avg_dl = total_len as f64 / self.num_docs as f64;
    }

    /// Compute IDF for a term: log((N - df + 0.5) / (df + 0.5) + 1)
    pub fn idf(&self, term: &str) -> f64 {
        let df = *self.doc_freq.get(term).unwrap_or(&0) as f64;
        let n = self.num_docs as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Compute TF-IDF vector for a document by index.
    pub fn tfidf_vector(&self, doc_idx: usize) -> HashMap<String, f64> {
        let doc = &self.doc_terms[doc_idx];
        let dl: u32 = doc.values().sum();
        let mut result = HashMap::new();
        for (term, &count) in doc {
            let tf = count as f64 / dl as f64;
            let idf = self.idf(term);
            result.insert(term.clone(), tf * idf);
        }
        result
    }

    /// BM25 score for a query (list of terms) against document at doc_idx.
    /// k1 = 1.2, b = 0.75 (standard parameters)
    pub fn bm25_score(&self, doc_idx: usize, query_terms: &[String]) -> f64 {
        self.bm25_score_params(doc_idx, query_terms, 1.2, 0.75)
    }

    /// BM25 score with custom k1 and b parameters.
    pub fn bm25_score_params(
        &self,
        doc_idx: usize,
        query_terms: &[String],
        k1: f64,
        b: f64,
    ) -> f64 {
        let doc = &self.doc_terms[doc_idx];
        let dl: f64 = doc.values().sum::<u32>() as f64;
        let mut score = 0.0;

        for term in query_terms {
            let tf = *doc.get(term).unwrap_or(&0) as f64;
            if tf == 0.0 {
                continue;
            }
            let idf = self.idf(term);
            let numerator = tf * (k1 + 1.0);
            let denominator = tf + k1 * (1.0 - b + b * dl / self.avg_dl);
            score += idf * numerator / denominator;
        }
        score
    }

    /// Extract top-N terms by TF-IDF weight for a document.
    pub fn top_terms(&self, doc_idx: usize, n: usize) -> Vec<(String, f64)> {
        let mut tfidf: Vec<(String, f64)> = self.tfidf_vector(doc_idx).into_iter().collect();
        tfidf.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        tfidf.truncate(n);
        tfidf
    }

    /// Compute TF-IDF weights for each token in a single document against this corpus.
    /// Used by SimHash to weight token contributions.
    pub fn token_weights(&self, tokens: &[String]) -> HashMap<String, f64> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for t in tokens {
            *counts.entry(t.clone()).or_insert(0) += 1;
        }
        let dl = tokens.len() as f64;
        let mut weights = HashMap::new();
        for (term, count) in counts {
            let tf = count as f64 / dl;
            let idf = self.idf(&term);
            weights.insert(term, tf * idf);
        }
        weights
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new()
    }
}

use crate::model::RecordId;

/// An inverted TF-IDF index over record ids, supporting cosine-similarity
/// canopy queries: given a record's tokens, return every indexed record
/// sharing at least one term whose cosine similarity clears a threshold.
/// Candidates are drawn from term postings rather than a full cross product,
/// so a query costs time proportional to the postings of its own terms.
#[derive(Debug, Clone, Default)]
pub struct TfIdfIndex {
    corpus: Corpus,
    ids: Vec<RecordId>,
    vectors: Vec<HashMap<String, f64>>,
    norms: Vec<f64>,
    postings: HashMap<String, Vec<usize>>,
}

impl TfIdfIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record's tokens. Call `build` once every record has been
    /// added; vectors and postings are only valid after that.
    pub fn add(&mut self, id: RecordId, tokens: &[String]) {
        self.corpus.add_document(tokens);
        self.ids.push(id);
    }

    /// Finalize document-frequency statistics and build the term postings.
    /// Must run after all `add` calls and before any `query`.
    pub fn build(&mut self) {
        self.vectors.clear();
        self.norms.clear();
        self.postings.clear();

        for doc_idx in 0..self.corpus.num_docs() as usize {
            let vector = self.corpus.tfidf_vector(doc_idx);
            let norm = vector.values().map(|v| v * v).sum::<f64>().sqrt();
            for term in vector.keys() {
                self.postings.entry(term.clone()).or_default().push(doc_idx);
            }
            self.vectors.push(vector);
            self.norms.push(norm);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Records whose cosine similarity to `tokens` is `>= threshold`,
    /// paired with their similarity score, ordered by descending score.
    pub fn query(&self, tokens: &[String], threshold: f64) -> Vec<(RecordId, f64)> {
        let mut query_terms: HashMap<String, u32> = HashMap::new();
        for t in tokens {
            *query_terms.entry(t.clone()).or_insert(0) += 1;
        }
        if query_terms.is_empty() {
            return Vec::new();
        }
        let ql: u32 = query_terms.values().sum();
        let mut query_vec: HashMap<String, f64> = HashMap::new();
        for (term, &count) in &query_terms {
            let tf = count as f64 / ql as f64;
            query_vec.insert(term.clone(), tf * self.corpus.idf(term));
        }
        let query_norm = query_vec.values().map(|v| v * v).sum::<f64>().sqrt();
        if query_norm == 0.0 {
            return Vec::new();
        }

        let mut candidates: std::collections::HashSet<usize> = std::collections::HashSet::new();
        for term in query_vec.keys() {
            if let Some(docs) = self.postings.get(term) {
                candidates.extend(docs.iter().copied());
            }
        }

        let mut results: Vec<(RecordId, f64)> = candidates
            .into_iter()
            .filter_map(|doc_idx| {
                let doc_vec = &self.vectors[doc_idx];
                let doc_norm = self.norms[doc_idx];
                if doc_norm == 0.0 {
                    return None;
                }
                let dot: f64 = query_vec
                    .iter()
                    .filter_map(|(term, w)| doc_vec.get(term).map(|dw| w * dw))
                    .sum();
                let cosine = dot / (query_norm * doc_norm);
                if cosine >= threshold {
                    Some((self.ids[doc_idx].clone(), cosine))
                } else {
                    None
                }
            })
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results
    }
}
