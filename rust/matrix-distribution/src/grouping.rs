//! Partitioning of matrices into groups with identical value distributions.
//!
//! Two matrices share a group iff their distributions are exactly equal.
//! Matrices without a twin are left out of the output. Exact map equality is
//! an equivalence relation, so the partition does not depend on scan order.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::distribution::ValueDistribution;

/// 1-based matrix indices with pairwise-equal distributions, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EquivalenceGroup {
    members: Vec<usize>,
}

impl EquivalenceGroup {
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.binary_search(&index).is_ok()
    }
}

/// Outcome of grouping a corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "groups", rename_all = "snake_case")]
pub enum Grouping {
    /// Fewer than two matrices: nothing to compare.
    TooFewMatrices,
    /// Groups ordered by smallest member; empty when every matrix is unique.
    Groups(Vec<EquivalenceGroup>),
}

impl Grouping {
    /// Emitted groups, empty for [`Grouping::TooFewMatrices`].
    pub fn groups(&self) -> &[EquivalenceGroup] {
        match self {
            Grouping::TooFewMatrices => &[],
            Grouping::Groups(groups) => groups,
        }
    }

    /// Position (0-based) of the group holding the 1-based matrix `index`.
    pub fn group_of(&self, index: usize) -> Option<usize> {
        self.groups().iter().position(|g| g.contains(index))
    }
}

/// Group matrices (given by their distributions, in corpus order) by exact
/// distribution equality.
///
/// With `parallel` set, the pair scan is spread over the Rayon pool; the
/// result is identical to the sequential scan.
pub fn group_equivalent(distributions: &[ValueDistribution], parallel: bool) -> Grouping {
    if distributions.len() <= 1 {
        return Grouping::TooFewMatrices;
    }
    let groups = if parallel {
        group_parallel(distributions)
    } else {
        group_sequential(distributions)
    };
    log::debug!(
        "Grouped {} distributions into {} equivalence groups",
        distributions.len(),
        groups.len()
    );
    Grouping::Groups(groups)
}

/// Left-to-right scan: each unconsumed index collects every later
/// unconsumed index with an equal distribution.
fn group_sequential(distributions: &[ValueDistribution]) -> Vec<EquivalenceGroup> {
    let n = distributions.len();
    let mut consumed = vec![false; n];
    let mut groups = Vec::new();

    for i in 0..n {
        if consumed[i] {
            continue;
        }
        let mut members = vec![i + 1];
        for j in (i + 1)..n {
            if !consumed[j] && distributions[i] == distributions[j] {
                members.push(j + 1);
                consumed[j] = true;
            }
        }
        if members.len() > 1 {
            consumed[i] = true;
            groups.push(EquivalenceGroup { members });
        }
    }
    groups
}

/// Each index independently finds its representative (the smallest index
/// with an equal distribution); groups are then merged in index order.
fn group_parallel(distributions: &[ValueDistribution]) -> Vec<EquivalenceGroup> {
    let representatives: Vec<usize> = (0..distributions.len())
        .into_par_iter()
        .map(|i| {
            (0..i)
                .find(|&k| distributions[k] == distributions[i])
                .unwrap_or(i)
        })
        .collect();

    let mut by_representative: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, rep) in representatives.into_iter().enumerate() {
        by_representative.entry(rep).or_default().push(i + 1);
    }

    by_representative
        .into_values()
        .filter(|members| members.len() > 1)
        .map(|members| EquivalenceGroup { members })
        .collect()
}
