//! Full analysis pipeline: parse, build distributions, group, score.
//!
//! Presentation layers only read an [`Analysis`]; nothing flows back into
//! the engine. [`write_report`] renders the deterministic textual summary.

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::corpus::{read_corpus, Corpus, CorpusError, CountMismatchWarning, ParsedCorpus};
use crate::distribution::{build_distributions, ValueDistribution};
use crate::grouping::{group_equivalent, Grouping};
use crate::similarity::SimilarityMatrix;

/// Configuration for an analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Cell value meaning "no data". Excluded from both distributions and
    /// similarity samples; `None` keeps every cell.
    pub sentinel: Option<f64>,
    /// Fan the pairwise scans out over the Rayon pool.
    pub parallel: bool,
    /// Treat a short corpus as fatal instead of a warning.
    pub strict_count: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sentinel: Some(-1.0),
            parallel: true,
            strict_count: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("corpus is incomplete: {0}")]
    CountMismatch(CountMismatchWarning),
}

/// Everything derived from one corpus.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub corpus: Corpus,
    pub warning: Option<CountMismatchWarning>,
    pub distributions: Vec<ValueDistribution>,
    pub grouping: Grouping,
    pub similarity: SimilarityMatrix,
}

/// Serializable view of an [`Analysis`].
#[derive(Debug, Serialize)]
pub struct AnalysisReport<'a> {
    pub matrix_size: usize,
    pub declared_count: usize,
    pub matrix_count: usize,
    pub sentinel: Option<f64>,
    pub warning: Option<&'a CountMismatchWarning>,
    pub distributions: &'a [ValueDistribution],
    pub grouping: &'a Grouping,
    pub similarity: &'a SimilarityMatrix,
}

impl Analysis {
    pub fn report<'a>(&'a self, config: &AnalysisConfig) -> AnalysisReport<'a> {
        AnalysisReport {
            matrix_size: self.corpus.size(),
            declared_count: self.corpus.declared_count(),
            matrix_count: self.corpus.len(),
            sentinel: config.sentinel,
            warning: self.warning.as_ref(),
            distributions: &self.distributions,
            grouping: &self.grouping,
            similarity: &self.similarity,
        }
    }
}

/// Analyze an already parsed corpus.
pub fn analyze(parsed: ParsedCorpus, config: &AnalysisConfig) -> Result<Analysis, AnalysisError> {
    let ParsedCorpus { corpus, warning } = parsed;
    if let Some(w) = &warning {
        if config.strict_count {
            return Err(AnalysisError::CountMismatch(w.clone()));
        }
    }

    let distributions = build_distributions(&corpus, config.sentinel);
    let grouping = group_equivalent(&distributions, config.parallel);
    let similarity = SimilarityMatrix::from_corpus(&corpus, config.sentinel, config.parallel);

    log::info!(
        "Analyzed {} matrices ({}x{}): {} equivalence groups",
        corpus.len(),
        corpus.size(),
        corpus.size(),
        grouping.groups().len()
    );

    Ok(Analysis {
        corpus,
        warning,
        distributions,
        grouping,
        similarity,
    })
}

/// Read a corpus file and analyze it.
pub fn run(path: impl AsRef<Path>, config: &AnalysisConfig) -> Result<Analysis, AnalysisError> {
    let path = path.as_ref();
    log::info!("Reading corpus from {}", path.display());
    let parsed = read_corpus(path)?;
    analyze(parsed, config)
}

/// Corpus header and optional warning.
pub fn write_header<W: Write>(out: &mut W, analysis: &Analysis, config: &AnalysisConfig) -> io::Result<()> {
    let size = analysis.corpus.size();
    let sentinel = match config.sentinel {
        Some(s) => format!("sentinel {} excluded", s),
        None => "no sentinel".to_string(),
    };
    writeln!(
        out,
        "Corpus: {} matrices of size {}x{} ({})",
        analysis.corpus.len(),
        size,
        size,
        sentinel
    )?;
    if let Some(w) = &analysis.warning {
        writeln!(out, "Warning: {}", w)?;
    }
    Ok(())
}

/// Equivalence group listing.
pub fn write_groups<W: Write>(out: &mut W, grouping: &Grouping) -> io::Result<()> {
    writeln!(out, "Equivalence groups:")?;
    match grouping {
        Grouping::TooFewMatrices => {
            writeln!(out, "  At least two matrices are required for comparison.")
        }
        Grouping::Groups(groups) if groups.is_empty() => {
            writeln!(out, "  All value distributions are unique.")
        }
        Grouping::Groups(groups) => {
            for (k, group) in groups.iter().enumerate() {
                writeln!(out, "  Group {}: matrices {:?}", k + 1, group.members())?;
            }
            Ok(())
        }
    }
}

/// Similarity table with 1-based row and column labels.
pub fn write_similarity<W: Write>(out: &mut W, similarity: &SimilarityMatrix) -> io::Result<()> {
    writeln!(out, "Similarity matrix:")?;
    write!(out, "{:>6}", "")?;
    for j in 1..=similarity.len() {
        write!(out, " {:>7}", j)?;
    }
    writeln!(out)?;
    for (i, row) in similarity.rows().iter().enumerate() {
        write!(out, "{:>6}", i + 1)?;
        for score in row {
            write!(out, " {:>7.4}", score)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Sorted `(value, count)` pairs and normalized frequencies per matrix.
pub fn write_distributions<W: Write>(out: &mut W, distributions: &[ValueDistribution]) -> io::Result<()> {
    for (i, dist) in distributions.iter().enumerate() {
        writeln!(
            out,
            "Matrix {}: {} values, {} distinct",
            i + 1,
            dist.total(),
            dist.distinct()
        )?;
        for ((value, count), (_, norm)) in dist.iter().zip(dist.normalized()) {
            writeln!(out, "  {:>12} {:>8} {:>8.4}", value, count, norm)?;
        }
    }
    Ok(())
}

/// The full textual summary: header, groups, similarity matrix.
pub fn write_report<W: Write>(out: &mut W, analysis: &Analysis, config: &AnalysisConfig) -> io::Result<()> {
    write_header(out, analysis, config)?;
    writeln!(out)?;
    write_groups(out, &analysis.grouping)?;
    writeln!(out)?;
    write_similarity(out, &analysis.similarity)
}
