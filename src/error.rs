//! Error types for ingestion, operators and template replay.
//!
//! Each layer has its own enum so a caller can tell a failed load apart from
//! a failed transform or a failed replay step.

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Failures while reading a source into a [`crate::Dataset`].
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The source could not be opened or read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No row survived parsing and cleaning.
    #[error("no valid rows in {source_name} (read {rows_read}, skipped {rows_skipped}, cleaned {rows_cleaned})")]
    EmptyDataset {
        source_name: String,
        rows_read: usize,
        rows_skipped: usize,
        rows_cleaned: usize,
    },

    /// A binary source is missing a required column.
    #[error("{path}: missing '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },

    /// A binary source has a column of the wrong type.
    #[error("{path}: column '{column}' must be Float64 or Float32, found {found}")]
    ColumnType {
        path: PathBuf,
        column: &'static str,
        found: String,
    },

    #[error("{path}: {source}")]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("{path}: {source}")]
    Arrow {
        path: PathBuf,
        #[source]
        source: arrow::error::ArrowError,
    },

    #[error("{path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `chunk_size` of zero was requested.
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Failures of the transform operators (`slice` never fails).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OperatorError {
    /// The fit degree needs more distinct x samples than the dataset has.
    #[error("degree {degree} fit needs at least {} distinct x values, found {distinct}", .degree + 1)]
    InsufficientData { degree: usize, distinct: usize },

    /// Fitting needs every sample finite; clean the dataset first.
    #[error("cannot fit '{title}': {count} sample(s) hold NaN or infinite values")]
    NonFiniteInput { title: String, count: usize },

    /// Only degrees 1 (linear) through 4 (quartic) are offered.
    #[error("unsupported fit degree {0}; expected 1..=4")]
    UnsupportedDegree(usize),

    /// `combine` operands do not share the same x samples.
    #[error("cannot combine '{left}' ({left_len} samples) with '{right}' ({right_len} samples): x values differ")]
    MisalignedDatasets {
        left: String,
        right: String,
        left_len: usize,
        right_len: usize,
    },

    /// `x` and `y` handed to a constructor differ in length.
    #[error("x has {x} values but y has {y}")]
    LengthMismatch { x: usize, y: usize },

    /// The least-squares system could not be solved.
    #[error("failed to solve fit: {0}")]
    Solve(&'static str),
}

// ---------------------------------------------------------------------------
// Template evaluation
// ---------------------------------------------------------------------------

/// Why a single operation could not be evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unbound variable '{0}'")]
    UnboundVariable(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("'{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error(transparent)]
    Operator(#[from] OperatorError),

    #[error("{function}: {source}")]
    Function {
        function: String,
        #[source]
        source: FunctionError,
    },

    /// Raised only in strict mode.
    #[error("result '{0}' contains non-finite values")]
    NonFinite(String),
}

/// Failure raised by a namespace function.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FunctionError {
    #[error("expected {expected} argument(s), got {found}")]
    Arity { expected: usize, found: usize },

    #[error("argument {index} must be a {expected}")]
    Argument { index: usize, expected: &'static str },

    #[error("empty dataset")]
    Empty,

    #[error(transparent)]
    Operator(#[from] OperatorError),
}

/// Failures of a bound template.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainError {
    /// Binding requires at least one seed variable.
    #[error("a template needs at least one seed variable to be bound")]
    NoSeeds,

    /// Step `index` failed; steps `0..index` completed and stay bound.
    #[error("step {} ('{result}') failed: {source}", .index + 1)]
    Step {
        index: usize,
        result: String,
        #[source]
        source: EvalError,
    },
}

impl ChainError {
    /// Number of steps that completed before the failure.
    pub fn completed_steps(&self) -> usize {
        match self {
            ChainError::NoSeeds => 0,
            ChainError::Step { index, .. } => *index,
        }
    }
}

/// Failures while persisting or loading a template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("cannot access template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed template: {0}")]
    Format(#[from] serde_json::Error),

    #[error("unsupported template version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}
