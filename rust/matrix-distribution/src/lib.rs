/// Distribution comparison for corpora of simulation matrices.
///
/// A corpus is a file of equally sized square matrices whose cells are edge
/// weights or path probabilities, with an optional sentinel (usually -1)
/// marking "no edge". Two questions are answered:
///
///   - which matrices hold exactly the same multiset of values
///     (equivalence groups over exact value -> count maps), and
///   - how close any two matrices' value distributions are, scored as
///     1 / (1 + transport distance).
///
/// Pipeline: corpus -> distribution -> {grouping, similarity} -> analysis.

pub mod analysis;
pub mod corpus;
pub mod distribution;
pub mod grouping;
pub mod similarity;

pub use analysis::{analyze, run, Analysis, AnalysisConfig, AnalysisError};
pub use corpus::{parse_corpus, read_corpus, Corpus, CorpusError, CountMismatchWarning, Matrix};
pub use distribution::ValueDistribution;
pub use grouping::{EquivalenceGroup, Grouping};
pub use similarity::SimilarityMatrix;
