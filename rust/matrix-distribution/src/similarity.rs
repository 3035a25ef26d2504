//! Pairwise similarity of matrices from the 1-D optimal transport
//! (earth mover's / Wasserstein-1) distance between their value samples.
//!
//! similarity = 1 / (1 + distance)
//!
//! so a matrix compared with itself scores exactly 1 and every score lies in
//! (0, 1], falling strictly as the distance grows. Unlike equivalence
//! grouping this is a continuous score with no threshold.

use rayon::prelude::*;
use serde::Serialize;

use crate::corpus::Corpus;
use crate::distribution::included_values;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimilarityError {
    #[error("matrix {matrix} has no values left after sentinel exclusion")]
    EmptySample { matrix: usize },
}

/// Transport distance between two samples treated as empirical
/// distributions. Sample sizes may differ. Returns `None` if either sample
/// is empty.
pub fn transport_distance(u: &[f64], v: &[f64]) -> Option<f64> {
    if u.is_empty() || v.is_empty() {
        return None;
    }
    Some(transport_distance_sorted(&sorted(u), &sorted(v)))
}

/// Transport distance for samples already sorted ascending and non-empty.
///
/// Integrates |F_u(x) - F_v(x)| over the merged support, where F is the
/// empirical CDF. Overflows to infinity only when the samples span more
/// than `f64::MAX`; [`SimilarityMatrix`] scores stay finite regardless.
pub fn transport_distance_sorted(u: &[f64], v: &[f64]) -> f64 {
    2.0 * half_transport_distance(u, v)
}

/// Half the transport distance. Gaps are taken between halved values, so
/// neither a gap nor the running total can overflow for finite inputs.
fn half_transport_distance(u: &[f64], v: &[f64]) -> f64 {
    let (nu, nv) = (u.len() as f64, v.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut prev: Option<f64> = None;
    let mut total = 0.0;

    loop {
        let next = match (u.get(i), v.get(j)) {
            (Some(&a), Some(&b)) => a.min(b),
            (Some(&a), None) => a,
            (None, Some(&b)) => b,
            (None, None) => break,
        };
        if let Some(p) = prev {
            // i and j count the values <= p in each sample.
            total += (i as f64 / nu - j as f64 / nv).abs() * (0.5 * next - 0.5 * p);
        }
        while i < u.len() && u[i] == next {
            i += 1;
        }
        while j < v.len() && v[j] == next {
            j += 1;
        }
        prev = Some(next);
    }
    total
}

pub fn similarity_from_distance(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// `1 / (1 + 2h)` written as `0.5 / (0.5 + h)`, positive for any finite `h`.
fn similarity_from_half_distance(half: f64) -> f64 {
    0.5 / (0.5 + half)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

/// Symmetric n x n table of similarity scores, indexed by 0-based matrix
/// position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SimilarityMatrix {
    scores: Vec<Vec<f64>>,
}

impl SimilarityMatrix {
    /// Scores for every pair of samples. Every sample must be non-empty.
    ///
    /// Only the upper triangle is computed (one row per task when
    /// `parallel` is set); the diagonal is 1 and the lower triangle is
    /// mirrored.
    pub fn compute(samples: &[Vec<f64>], parallel: bool) -> Result<Self, SimilarityError> {
        if let Some(pos) = samples.iter().position(|s| s.is_empty()) {
            return Err(SimilarityError::EmptySample { matrix: pos + 1 });
        }
        let sorted_samples: Vec<Vec<f64>> = samples.iter().map(|s| sorted(s)).collect();
        Ok(Self::from_sorted(&sorted_samples, parallel))
    }

    fn from_sorted(sorted_samples: &[Vec<f64>], parallel: bool) -> Self {
        let n = sorted_samples.len();

        let upper_row = |i: usize| -> Vec<f64> {
            ((i + 1)..n)
                .map(|j| {
                    let h = half_transport_distance(&sorted_samples[i], &sorted_samples[j]);
                    similarity_from_half_distance(h)
                })
                .collect()
        };
        let upper: Vec<Vec<f64>> = if parallel {
            (0..n).into_par_iter().map(upper_row).collect()
        } else {
            (0..n).map(upper_row).collect()
        };

        let mut scores = vec![vec![1.0; n]; n];
        for (i, row) in upper.iter().enumerate() {
            for (offset, &score) in row.iter().enumerate() {
                let j = i + 1 + offset;
                scores[i][j] = score;
                scores[j][i] = score;
            }
        }
        log::debug!("Computed {}x{} similarity matrix", n, n);
        Self { scores }
    }

    /// Scores for a corpus, skipping cells equal to `sentinel` when given.
    ///
    /// A matrix made only of sentinel cells (a graph with no edges) keeps
    /// its raw cells as its sample, i.e. a point mass at the sentinel. Two
    /// such matrices score 1; against any other matrix the score is the
    /// usual transform of the distance to that point mass.
    pub fn from_corpus(corpus: &Corpus, sentinel: Option<f64>, parallel: bool) -> Self {
        let samples: Vec<Vec<f64>> = corpus
            .matrices()
            .iter()
            .map(|m| {
                let included: Vec<f64> = included_values(m, sentinel).collect();
                let mut sample = if included.is_empty() {
                    m.values().to_vec()
                } else {
                    included
                };
                sample.sort_by(f64::total_cmp);
                sample
            })
            .collect();
        Self::from_sorted(&samples, parallel)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.scores.get(i)?.get(j).copied()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Matrix;

    #[test]
    fn test_identical_samples_zero_distance() {
        assert_eq!(transport_distance(&[1.0, 2.0, 3.0, 4.0], &[4.0, 3.0, 2.0, 1.0]), Some(0.0));
    }

    #[test]
    fn test_equal_size_is_mean_sorted_gap() {
        let d = transport_distance(&[0.0, 1.0], &[1.0, 2.0]).unwrap();
        assert!((d - 1.0).abs() < 1e-12);
        let d = transport_distance(&[0.0, 0.0, 0.0], &[0.0, 0.0, 0.3]).unwrap();
        assert!((d - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_unequal_sample_sizes() {
        // F_u jumps to 1 at 0, F_v reaches 1/2 at 0 and 1 at 1.
        let d = transport_distance(&[0.0], &[0.0, 1.0]).unwrap();
        assert!((d - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sample_has_no_distance() {
        assert_eq!(transport_distance(&[], &[1.0]), None);
        assert_eq!(
            SimilarityMatrix::compute(&[vec![1.0], vec![]], false),
            Err(SimilarityError::EmptySample { matrix: 2 })
        );
    }

    #[test]
    fn test_distance_is_symmetric() {
        let u = [0.1, 0.5, 0.5, 0.9];
        let v = [0.0, 0.2, 0.7];
        assert_eq!(transport_distance(&u, &v), transport_distance(&v, &u));
    }

    #[test]
    fn test_similarity_transform() {
        assert_eq!(similarity_from_distance(0.0), 1.0);
        assert_eq!(similarity_from_distance(1.0), 0.5);
        assert!(similarity_from_distance(1e9) > 0.0);
    }

    #[test]
    fn test_matrix_diagonal_and_symmetry() {
        let samples = vec![
            vec![0.1, 0.2, 0.3, 0.4],
            vec![0.4, 0.3, 0.2, 0.1],
            vec![0.9, 0.9, 0.9, 0.9],
            vec![0.0, 0.5, 0.5, 1.0],
        ];
        let sim = SimilarityMatrix::compute(&samples, false).unwrap();
        assert_eq!(sim.len(), 4);
        for i in 0..4 {
            assert_eq!(sim.get(i, i), Some(1.0));
            for j in 0..4 {
                assert_eq!(sim.get(i, j), sim.get(j, i));
                let s = sim.get(i, j).unwrap();
                assert!(s > 0.0 && s <= 1.0);
            }
        }
        assert_eq!(sim.get(0, 1), Some(1.0));
        assert!(sim.get(0, 2).unwrap() < 1.0);
        assert_eq!(sim.get(4, 0), None);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let samples: Vec<Vec<f64>> = (0..12)
            .map(|i| (0..9).map(|k| ((i * 31 + k * 17) % 11) as f64 / 10.0).collect())
            .collect();
        let a = SimilarityMatrix::compute(&samples, false).unwrap();
        let b = SimilarityMatrix::compute(&samples, true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shift_away_lowers_similarity() {
        let c = vec![0.0, 0.1, 0.1, 0.2];
        let b = vec![0.1, 0.2, 0.2, 0.3];
        let a: Vec<f64> = b.iter().map(|v| v + 0.5).collect();
        let sim = SimilarityMatrix::compute(&[a, b, c], true).unwrap();
        assert!(sim.get(0, 2).unwrap() < sim.get(1, 2).unwrap());
    }

    #[test]
    fn test_extreme_values_keep_score_positive() {
        let sim = SimilarityMatrix::compute(&[vec![-1.5e308], vec![1.5e308]], false).unwrap();
        let s = sim.get(0, 1).unwrap();
        assert!(s > 0.0 && s < 1.0, "score {s} outside (0, 1)");
        assert_eq!(sim.get(1, 0), Some(s));

        let spread: Vec<f64> = (0..8).map(|k| if k % 2 == 0 { -1.7e308 } else { 1.7e308 }).collect();
        let sim = SimilarityMatrix::compute(&[spread, vec![0.0; 3]], true).unwrap();
        assert!(sim.get(0, 1).unwrap() > 0.0);
    }

    #[test]
    fn test_halving_keeps_ordinary_scores() {
        let sim = SimilarityMatrix::compute(&[vec![0.0, 1.0], vec![1.0, 2.0]], false).unwrap();
        assert!((sim.get(0, 1).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_all_sentinel_matrix_compared_as_point_mass() {
        let corpus = Corpus::new(vec![
            Matrix::from_rows(vec![vec![0.5, -1.0], vec![-1.0, 0.5]]).unwrap(),
            Matrix::from_rows(vec![vec![-1.0, -1.0], vec![-1.0, -1.0]]).unwrap(),
            Matrix::from_rows(vec![vec![-1.0, -1.0], vec![-1.0, -1.0]]).unwrap(),
        ])
        .unwrap();
        let sim = SimilarityMatrix::from_corpus(&corpus, Some(-1.0), false);
        assert_eq!(sim.get(1, 2), Some(1.0));
        // Sample {0.5, 0.5} against a point mass at -1: distance 1.5.
        assert!((sim.get(0, 1).unwrap() - 1.0 / 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_corpus_gives_empty_matrix() {
        let sim = SimilarityMatrix::compute(&[], true).unwrap();
        assert!(sim.is_empty());
    }
}
