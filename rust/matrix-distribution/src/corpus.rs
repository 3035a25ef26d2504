//! Corpus parsing for the line-oriented matrix file format.
//!
//! ```text
//! <n>                              matrix count, > 0
//! <size>                           matrix dimension, > 0
//! <size rows of size floats>       matrix 1
//! <blank line>
//! <size rows of size floats>       matrix 2
//! ...                              (no separator after the last matrix)
//! ```
//!
//! Parsing is strict: a malformed header, row or separator aborts with a
//! [`CorpusError`] naming the matrix, row and source line. Running out of
//! input exactly at a matrix boundary, once at least one matrix is complete,
//! is not fatal: the matrices read so far are returned together with a
//! [`CountMismatchWarning`] and the caller decides whether to continue.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Errors that can occur while reading a corpus.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("corpus source {} could not be read: {source}", .path.display())]
    MissingSource {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("line {line}: {field} must be a positive integer, found '{found}'")]
    MalformedHeader {
        field: HeaderField,
        line: usize,
        found: String,
    },

    #[error("line {line}: matrix {matrix} row {row} has {found} values, expected {expected}")]
    RowCountMismatch {
        matrix: usize,
        row: usize,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: matrix {matrix} row {row} contains non-numeric token '{token}'")]
    NonNumericToken {
        matrix: usize,
        row: usize,
        line: usize,
        token: String,
    },

    #[error("line {line}: input ended while reading matrix {matrix} row {row}")]
    PrematureEnd { matrix: usize, row: usize, line: usize },

    #[error(
        "line {line}: expected a blank separator between matrix {after_matrix} and matrix {}, found '{found}'",
        .after_matrix + 1
    )]
    SeparatorExpected {
        after_matrix: usize,
        line: usize,
        found: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which of the two header lines failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    Count,
    Size,
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderField::Count => write!(f, "matrix count"),
            HeaderField::Size => write!(f, "matrix size"),
        }
    }
}

/// Fewer complete matrices were present than the header declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountMismatchWarning {
    pub declared: usize,
    pub parsed: usize,
}

impl CountMismatchWarning {
    /// Number of declared matrices that were never read.
    pub fn deficit(&self) -> usize {
        self.declared - self.parsed
    }
}

impl fmt::Display for CountMismatchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read {} of {} declared matrices ({} missing)",
            self.parsed,
            self.declared,
            self.deficit()
        )
    }
}

/// A square grid of cell values stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matrix {
    size: usize,
    cells: Vec<f64>,
}

impl Matrix {
    /// Build a matrix from rows. Returns `None` unless the rows form a
    /// non-empty square grid.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let size = rows.len();
        if size == 0 || rows.iter().any(|r| r.len() != size) {
            return None;
        }
        Some(Self {
            size,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.size && col < self.size {
            Some(self.cells[row * self.size + col])
        } else {
            None
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.cells.chunks(self.size)
    }

    /// All cells, flattened row by row.
    pub fn values(&self) -> &[f64] {
        &self.cells
    }
}

/// An ordered collection of equally sized matrices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Corpus {
    size: usize,
    declared_count: usize,
    matrices: Vec<Matrix>,
}

impl Corpus {
    /// Assemble a corpus from matrices that all share one dimension.
    pub fn new(matrices: Vec<Matrix>) -> Option<Self> {
        let size = matrices.first()?.size();
        if matrices.iter().any(|m| m.size() != size) {
            return None;
        }
        Some(Self {
            size,
            declared_count: matrices.len(),
            matrices,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The matrix count stated by the source header.
    pub fn declared_count(&self) -> usize {
        self.declared_count
    }

    pub fn matrices(&self) -> &[Matrix] {
        &self.matrices
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Serialize back to the corpus file format. The header states the
    /// number of matrices actually held, so the output always re-parses
    /// without a count warning.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.matrices.len())?;
        writeln!(f, "{}", self.size)?;
        for (i, matrix) in self.matrices.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for row in matrix.rows() {
                let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                writeln!(f, "{}", line.join(" "))?;
            }
        }
        Ok(())
    }
}

/// Result of a successful parse: the corpus plus an optional count warning.
#[derive(Debug, Clone)]
pub struct ParsedCorpus {
    pub corpus: Corpus,
    pub warning: Option<CountMismatchWarning>,
}

/// Read and parse a corpus file.
pub fn read_corpus(path: impl AsRef<Path>) -> Result<ParsedCorpus, CorpusError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| CorpusError::MissingSource {
        path: path.to_path_buf(),
        source,
    })?;
    parse_corpus(&text)
}

/// Read a whole stream into memory, then parse it.
pub fn parse_reader<R: Read>(mut reader: R) -> Result<ParsedCorpus, CorpusError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    parse_corpus(&text)
}

/// Parse corpus text already held in memory.
pub fn parse_corpus(text: &str) -> Result<ParsedCorpus, CorpusError> {
    let mut cursor = LineCursor::new(text);
    let count = parse_header(&mut cursor, HeaderField::Count)?;
    let size = parse_header(&mut cursor, HeaderField::Size)?;
    log::debug!("Corpus header: {} matrices of size {}x{}", count, size, size);

    let mut matrices = Vec::with_capacity(count.min(1024));
    'matrices: for index in 1..=count {
        if index > 1 {
            match cursor.next_line() {
                None => break,
                Some((_, sep)) if sep.trim().is_empty() => {}
                Some((line, sep)) => {
                    return Err(CorpusError::SeparatorExpected {
                        after_matrix: index - 1,
                        line,
                        found: sep.trim().to_string(),
                    });
                }
            }
        }

        let mut cells = Vec::with_capacity(size.saturating_mul(size).min(1 << 16));
        for row in 1..=size {
            match cursor.next_line() {
                Some((line, row_text)) => cells.extend(parse_row(row_text, size, index, row, line)?),
                // A short corpus needs at least one complete matrix.
                None if row == 1 && index > 1 => break 'matrices,
                None => {
                    return Err(CorpusError::PrematureEnd {
                        matrix: index,
                        row,
                        line: cursor.next_line_number(),
                    });
                }
            }
        }
        matrices.push(Matrix { size, cells });
    }

    if matrices.len() == count {
        while let Some((line, rest)) = cursor.next_line() {
            if !rest.trim().is_empty() {
                log::warn!("Ignoring content after the last matrix, starting at line {}", line);
                break;
            }
        }
    }

    let warning = if matrices.len() < count {
        let warning = CountMismatchWarning {
            declared: count,
            parsed: matrices.len(),
        };
        log::warn!("Corpus is short: {}", warning);
        Some(warning)
    } else {
        None
    };

    Ok(ParsedCorpus {
        corpus: Corpus {
            size,
            declared_count: count,
            matrices,
        },
        warning,
    })
}

struct LineCursor<'a> {
    lines: std::str::Lines<'a>,
    consumed: usize,
}

impl<'a> LineCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            consumed: 0,
        }
    }

    /// Next line with its 1-based line number.
    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        let text = self.lines.next()?;
        self.consumed += 1;
        Some((self.consumed, text))
    }

    fn next_line_number(&self) -> usize {
        self.consumed + 1
    }
}

fn parse_header(cursor: &mut LineCursor<'_>, field: HeaderField) -> Result<usize, CorpusError> {
    let Some((line, text)) = cursor.next_line() else {
        return Err(CorpusError::MalformedHeader {
            field,
            line: cursor.next_line_number(),
            found: "<end of input>".to_string(),
        });
    };
    match text.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(CorpusError::MalformedHeader {
            field,
            line,
            found: text.trim().to_string(),
        }),
    }
}

fn parse_row(
    text: &str,
    size: usize,
    matrix: usize,
    row: usize,
    line: usize,
) -> Result<Vec<f64>, CorpusError> {
    let mut values = Vec::with_capacity(size.min(4096));
    for token in text.split_whitespace() {
        match token.parse::<f64>() {
            Ok(v) if v.is_finite() => values.push(v),
            _ => {
                return Err(CorpusError::NonNumericToken {
                    matrix,
                    row,
                    line,
                    token: token.to_string(),
                });
            }
        }
    }
    if values.len() != size {
        return Err(CorpusError::RowCountMismatch {
            matrix,
            row,
            line,
            expected: size,
            found: values.len(),
        });
    }
    Ok(values)
}
