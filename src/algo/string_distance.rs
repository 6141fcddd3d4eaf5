//! String distance kernels.
//!
//! `normalized_affine_gap` is the default comparator for `String` fields: an
//! affine-gap edit distance (match = -5, mismatch = 5, gap open = 4, gap
//! extend = 1) rescaled to `[0, 1]`. The Levenshtein/Jaro-Winkler/Cosine
//! kernels below remain available as explicit `Custom`-field comparators.

use std::collections::HashMap;

use strsim::{jaro_winkler, normalized_levenshtein};

const MATCH_WEIGHT: f64 = -5.0;
const MISMATCH_WEIGHT: f64 = 5.0;
const GAP_OPEN: f64 = 4.0;
const GAP_EXTEND: f64 = 1.0;

/// Raw affine-gap alignment cost between `a` and `b` (Gotoh's algorithm,
/// three-state DP: match/mismatch, gap-in-a, gap-in-b). Lower is more
/// similar; an exact match of length `n` scores `-5n`.
pub fn affine_gap_distance(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());

    if n == 0 && m == 0 {
        return 0.0;
    }

    const INF: f64 = f64::INFINITY;
    let mut mat = vec![vec![INF; m + 1]; n + 1];
    let mut gap_a = vec![vec![INF; m + 1]; n + 1]; // gap in b, consuming a[i-1]
    let mut gap_b = vec![vec![INF; m + 1]; n + 1]; // gap in a, consuming b[j-1]

    mat[0][0] = 0.0;
    for i in 1..=n {
        gap_a[i][0] = GAP_OPEN + GAP_EXTEND * (i as f64 - 1.0);
    }
    for j in 1..=m {
        gap_b[0][j] = GAP_OPEN + GAP_EXTEND * (j as f64 - 1.0);
    }

    for i in 1..=n {
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] {
                MATCH_WEIGHT
            } else {
                MISMATCH_WEIGHT
            };
            mat[i][j] = min3(mat[i - 1][j - 1], gap_a[i - 1][j - 1], gap_b[i - 1][j - 1]) + cost;

            gap_a[i][j] = min3(
                mat[i - 1][j] + GAP_OPEN,
                gap_a[i - 1][j] + GAP_EXTEND,
                gap_b[i - 1][j] + GAP_OPEN,
            );

            gap_b[i][j] = min3(
                mat[i][j - 1] + GAP_OPEN,
                gap_b[i][j - 1] + GAP_EXTEND,
                gap_a[i][j - 1] + GAP_OPEN,
            );
        }
    }

    min3(mat[n][m], gap_a[n][m], gap_b[n][m])
}

fn min3(a: f64, b: f64, c: f64) -> f64 {
    a.min(b).min(c)
}

/// `affine_gap_distance` rescaled to `[0, 1]`: 0 for identical strings, 1
/// for a maximally-mismatched pair over their shared length (or for any pair
/// where one side is empty and the other isn't — there's only one possible
/// alignment in that case, a pure gap, so it counts as the maximum distance
/// rather than whatever that gap happens to cost). Symmetric, and clamped so
/// unusual inputs never escape the unit interval.
pub fn normalized_affine_gap(a: &str, b: &str) -> f64 {
    let n = a.chars().count();
    let m = b.chars().count();
    if n == 0 && m == 0 {
        return 0.0;
    }
    if n == 0 || m == 0 {
        return 1.0;
    }

    let raw = affine_gap_distance(a, b);
    let min_len = n.min(m) as f64;
    let diff = (n as i64 - m as i64).unsigned_abs() as f64;
    let gap_cost = if diff == 0.0 { 0.0 } else { GAP_OPEN + GAP_EXTEND * (diff - 1.0) };
    // Best (most similar) and worst (least similar) cost an alignment of
    // these two lengths could possibly have: the shared length aligned as
    // all-match or all-mismatch, plus the fixed cost of gapping the
    // remainder. The gap term cancels out of the range width, so it only
    // shifts the scale rather than stretching it.
    let best = MATCH_WEIGHT * min_len + gap_cost;
    let worst = MISMATCH_WEIGHT * min_len + gap_cost;
    ((raw - best) / (worst - best)).clamp(0.0, 1.0)
}

/// Legacy similarity metrics, kept available for `Custom` field comparators
/// that want something other than affine gap.
#[derive(Debug, Clone, Copy)]
pub enum Metric {
    Levenshtein,
    JaroWinkler,
    Cosine,
}

/// Compute string similarity (0.0 = no match, 1.0 = identical) using the specified metric.
pub fn similarity(a: &str, b: &str, metric: Metric) -> f64 {
    match metric {
        Metric::Levenshtein => normalized_levenshtein(a, b),
        Metric::JaroWinkler => jaro_winkler(a, b),
        Metric::Cosine => cosine_similarity(a, b),
    }
}

/// Cosine similarity on character bigrams.
fn cosine_similarity(a: &str, b: &str) -> f64 {
    let bigrams_a = char_bigrams(a);
    let bigrams_b = char_bigrams(b);

    if bigrams_a.is_empty() || bigrams_b.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    let all_keys: std::collections::HashSet<&String> =
        bigrams_a.keys().chain(bigrams_b.keys()).collect();

    for key in all_keys {
        let va = *bigrams_a.get(key).unwrap_or(&0) as f64;
        let vb = *bigrams_b.get(key).unwrap_or(&0) as f64;
        dot += va * vb;
        norm_a += va * va;
        norm_b += vb * vb;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn char_bigrams(s: &str) -> HashMap<String, u32> {
    let chars: Vec<char> = s.to_lowercase().chars().collect();
    let mut map = HashMap::new();
    for pair in chars.windows(2) {
        let bigram: String = pair.iter().collect();
        *map.entry(bigram).or_insert(0) += 1;
    }
    map
}

impl Metric {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "levenshtein" | "lev" => Some(Self::Levenshtein),
            "jaro-winkler" | "jaro_winkler" | "jw" => Some(Self::JaroWinkler),
            "cosine" | "cos" => Some(Self::Cosine),
            _ => None,
        }
    }

    pub fn all_names() -> &'static [&'static str] {
        &["levenshtein", "jaro-winkler", "cosine"]
    }
}
