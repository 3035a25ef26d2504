//! Value distributions: how often each cell value occurs in a matrix.
//!
//! Values are bucketed by exact equality. Corpora come from simulations with
//! a small fixed alphabet of outputs, so no tolerance-based binning is done.
//! An optional sentinel (conventionally `-1`, "no edge") is dropped before
//! counting.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::corpus::{Corpus, Matrix};

/// A cell value used as a map key, ordered by `f64::total_cmp`.
///
/// `-0.0` is stored as `0.0` so both zeros share one bucket, matching
/// numeric equality.
#[derive(Debug, Clone, Copy)]
pub struct ValueKey(f64);

impl ValueKey {
    pub fn new(value: f64) -> Self {
        Self(if value == 0.0 { 0.0 } else { value })
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ValueKey {}

impl PartialOrd for ValueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ValueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Mapping from cell value to occurrence count within one matrix.
///
/// Two distributions are equal iff they have the same key set and the same
/// count for every key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueDistribution {
    counts: BTreeMap<ValueKey, usize>,
}

impl ValueDistribution {
    /// Tally a matrix, skipping cells equal to `sentinel` when one is given.
    pub fn from_matrix(matrix: &Matrix, sentinel: Option<f64>) -> Self {
        included_values(matrix, sentinel).collect()
    }

    /// Occurrences of `value` (zero when absent).
    pub fn count(&self, value: f64) -> usize {
        self.counts.get(&ValueKey::new(value)).copied().unwrap_or(0)
    }

    /// Number of counted cells.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Number of distinct values.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `(value, count)` pairs in ascending value order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, usize)> + '_ {
        self.counts.iter().map(|(k, &c)| (k.value(), c))
    }

    pub fn entries(&self) -> Vec<(f64, usize)> {
        self.iter().collect()
    }

    /// Counts scaled by the largest count, so the most frequent value maps
    /// to `1.0`. Empty distributions yield an empty series.
    pub fn normalized(&self) -> Vec<(f64, f64)> {
        let max = self.counts.values().copied().max().unwrap_or(0).max(1) as f64;
        self.iter().map(|(v, c)| (v, c as f64 / max)).collect()
    }
}

impl FromIterator<f64> for ValueDistribution {
    fn from_iter<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut counts = BTreeMap::new();
        for value in values {
            *counts.entry(ValueKey::new(value)).or_insert(0) += 1;
        }
        Self { counts }
    }
}

impl Serialize for ValueDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// The cells of `matrix` that take part in analysis, in row-major order.
pub fn included_values(matrix: &Matrix, sentinel: Option<f64>) -> impl Iterator<Item = f64> + '_ {
    matrix
        .values()
        .iter()
        .copied()
        .filter(move |&v| sentinel.map_or(true, |s| v != s))
}

/// One distribution per matrix, in corpus order.
pub fn build_distributions(corpus: &Corpus, sentinel: Option<f64>) -> Vec<ValueDistribution> {
    corpus
        .matrices()
        .iter()
        .map(|m| ValueDistribution::from_matrix(m, sentinel))
        .collect()
}
