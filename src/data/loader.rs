use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::LazyLock;

use arrow::array::{ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type};
use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use regex::Regex;

use super::model::{Dataset, RAW_DATA_TITLE};
use crate::error::IngestError;

/// Permissive float literal: sign, decimal point, exponent, plus the
/// `inf` / `infinity` / `nan` spellings so dirty exports can be cleaned.
static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[+-]?(?:(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?|(?i:\binf(?:inity)?\b|\bnan\b))")
        .expect("number pattern is valid")
});

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How a source is turned into a [`Dataset`].
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOptions {
    /// Zero-based token index used for x.
    pub x_column: usize,
    /// Zero-based token index used for y.
    pub y_column: usize,
    /// Skip the first line of a text source.
    pub has_header: bool,
    /// Drop rows whose x or y is NaN or infinite.
    pub clean: bool,
    /// Read text in windows of this many lines (`None` reads everything at
    /// once). For binary sources this is the record batch size.
    pub chunk_size: Option<usize>,
    /// Title of the resulting dataset.
    pub title: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            x_column: 0,
            y_column: 1,
            has_header: false,
            clean: true,
            chunk_size: None,
            title: RAW_DATA_TITLE.to_string(),
        }
    }
}

/// Row accounting for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowStats {
    pub read: usize,
    pub skipped: usize,
    pub cleaned: usize,
}

impl RowStats {
    pub fn kept(&self) -> usize {
        self.read - self.skipped - self.cleaned
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` / `.pq` – Float64 (or Float32) columns `x` and `y`
/// * `.json`           – `{ "title": "...", "x": [...], "y": [...] }`
/// * anything else     – delimited text, numbers picked by column index
pub fn ingest(path: &Path, options: &IngestOptions) -> Result<Dataset, IngestError> {
    if options.chunk_size == Some(0) {
        return Err(IngestError::ZeroChunkSize);
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path, options)?,
        "json" => load_json(path, options)?,
        _ => {
            let file = File::open(path).map_err(|source| IngestError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            ingest_reader(BufReader::new(file), options, &path.display().to_string())?
        }
    };

    log::info!(
        "Ingested {} samples from {}",
        dataset.len(),
        path.display()
    );
    Ok(dataset)
}

/// Ingest delimited text from any buffered reader.
///
/// `source_name` only appears in errors and logs.
pub fn ingest_reader<R: BufRead>(
    mut reader: R,
    options: &IngestOptions,
    source_name: &str,
) -> Result<Dataset, IngestError> {
    let io_err = |source| IngestError::Io {
        path: source_name.into(),
        source,
    };

    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut stats = RowStats::default();

    match options.chunk_size {
        Some(0) => return Err(IngestError::ZeroChunkSize),
        Some(chunk_size) => {
            let mut lines = reader.lines();
            if options.has_header {
                lines.next().transpose().map_err(io_err)?;
            }
            let mut chunk: Vec<String> = Vec::with_capacity(chunk_size);
            let mut chunks = 0usize;
            for line in lines {
                chunk.push(line.map_err(io_err)?);
                if chunk.len() == chunk_size {
                    parse_lines(chunk.iter().map(String::as_str), options, &mut x, &mut y, &mut stats);
                    chunk.clear();
                    chunks += 1;
                }
            }
            if !chunk.is_empty() {
                parse_lines(chunk.iter().map(String::as_str), options, &mut x, &mut y, &mut stats);
                chunks += 1;
            }
            log::debug!("{source_name}: read {chunks} chunk(s) of up to {chunk_size} lines");
        }
        None => {
            let mut text = String::new();
            reader.read_to_string(&mut text).map_err(io_err)?;
            let skip = usize::from(options.has_header);
            parse_lines(text.lines().skip(skip), options, &mut x, &mut y, &mut stats);
        }
    }

    log::debug!(
        "{source_name}: {} rows read, {} skipped, {} cleaned",
        stats.read,
        stats.skipped,
        stats.cleaned
    );

    if x.is_empty() {
        return Err(IngestError::EmptyDataset {
            source_name: source_name.to_string(),
            rows_read: stats.read,
            rows_skipped: stats.skipped,
            rows_cleaned: stats.cleaned,
        });
    }

    Ok(Dataset::from_parts(options.title.clone(), x, y))
}

/// Numeric tokens of one line, in order.
pub fn tokenize(line: &str) -> impl Iterator<Item = &str> {
    NUMBER.find_iter(line).map(|m| m.as_str())
}

/// One line of a text source shown before choosing columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewLine {
    pub text: String,
    pub tokens: Vec<String>,
}

/// The first `n` lines of a text source with their numeric tokens.
pub fn peek_lines(path: &Path, n: usize) -> Result<Vec<PreviewLine>, IngestError> {
    let io_err = |source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    BufReader::new(file)
        .lines()
        .take(n)
        .map(|line| {
            let text = line.map_err(io_err)?;
            let tokens = tokenize(&text).map(str::to_string).collect();
            Ok(PreviewLine { text, tokens })
        })
        .collect()
}

/// The first `n` rows of a parquet source rendered as a table.
pub fn peek_parquet(path: &Path, n: usize) -> Result<String, IngestError> {
    let parquet_err = |source| IngestError::Parquet {
        path: path.to_path_buf(),
        source,
    };
    let arrow_err = |source| IngestError::Arrow {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(parquet_err)?
        .with_batch_size(n.max(1))
        .with_limit(n)
        .build()
        .map_err(parquet_err)?;
    let batches = reader.collect::<Result<Vec<_>, _>>().map_err(arrow_err)?;
    let table = pretty_format_batches(&batches).map_err(arrow_err)?;
    Ok(table.to_string())
}

// ---------------------------------------------------------------------------
// Text parsing
// ---------------------------------------------------------------------------

/// Parse `lines` and append the selected columns.
///
/// A row without enough tokens, or whose selected tokens do not parse, is
/// skipped. With `clean` set, rows holding NaN/∞ are dropped afterwards.
fn parse_lines<'a>(
    lines: impl Iterator<Item = &'a str>,
    options: &IngestOptions,
    x: &mut Vec<f64>,
    y: &mut Vec<f64>,
    stats: &mut RowStats,
) {
    let mut tokens: Vec<&str> = Vec::new();
    for line in lines {
        stats.read += 1;
        tokens.clear();
        tokens.extend(tokenize(line));

        let parsed = tokens
            .get(options.x_column)
            .zip(tokens.get(options.y_column))
            .and_then(|(xs, ys)| Some((xs.parse::<f64>().ok()?, ys.parse::<f64>().ok()?)));

        let Some((xv, yv)) = parsed else {
            stats.skipped += 1;
            continue;
        };
        if options.clean && !(xv.is_finite() && yv.is_finite()) {
            stats.cleaned += 1;
            continue;
        }
        x.push(xv);
        y.push(yv);
    }
}

// ---------------------------------------------------------------------------
// Pre-serialized sources
// ---------------------------------------------------------------------------

fn finish_binary(path: &Path, dataset: Dataset, options: &IngestOptions) -> Result<Dataset, IngestError> {
    let read = dataset.len();
    let dataset = if options.clean { dataset.clean() } else { dataset };
    if dataset.is_empty() {
        return Err(IngestError::EmptyDataset {
            source_name: path.display().to_string(),
            rows_read: read,
            rows_skipped: 0,
            rows_cleaned: read,
        });
    }
    Ok(dataset)
}

/// Expected JSON shape (the serde form of [`Dataset`]):
///
/// ```json
/// { "title": "Raw Data", "x": [0.0, 1.0, ...], "y": [0.5, 0.7, ...] }
/// ```
fn load_json(path: &Path, options: &IngestOptions) -> Result<Dataset, IngestError> {
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset: Dataset = serde_json::from_str(&text).map_err(|source| IngestError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    finish_binary(path, dataset, options)
}

/// Parquet file with flat numeric `x` and `y` columns, read batch by batch.
fn load_parquet(path: &Path, options: &IngestOptions) -> Result<Dataset, IngestError> {
    let parquet_err = |source| IngestError::Parquet {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(parquet_err)?;
    if let Some(batch_size) = options.chunk_size {
        builder = builder.with_batch_size(batch_size);
    }
    let reader = builder.build().map_err(parquet_err)?;

    let mut x = Vec::new();
    let mut y = Vec::new();
    for batch_result in reader {
        let batch = batch_result.map_err(|source| IngestError::Arrow {
            path: path.to_path_buf(),
            source,
        })?;
        let schema = batch.schema();
        let x_idx = schema.index_of("x").map_err(|_| IngestError::MissingColumn {
            path: path.to_path_buf(),
            column: "x",
        })?;
        let y_idx = schema.index_of("y").map_err(|_| IngestError::MissingColumn {
            path: path.to_path_buf(),
            column: "y",
        })?;
        extend_f64(path, "x", batch.column(x_idx), &mut x)?;
        extend_f64(path, "y", batch.column(y_idx), &mut y)?;
    }

    let title = options.title.clone();
    finish_binary(path, Dataset::from_parts(title, x, y), options)
}

/// Append a Float64/Float32 column; nulls become NaN.
fn extend_f64(
    path: &Path,
    column: &'static str,
    array: &ArrayRef,
    out: &mut Vec<f64>,
) -> Result<(), IngestError> {
    match array.data_type() {
        DataType::Float64 => {
            let values = array.as_primitive::<Float64Type>();
            out.extend(values.iter().map(|v| v.unwrap_or(f64::NAN)));
        }
        DataType::Float32 => {
            let values = array.as_primitive::<Float32Type>();
            out.extend(values.iter().map(|v| v.map_or(f64::NAN, f64::from)));
        }
        other => {
            return Err(IngestError::ColumnType {
                path: path.to_path_buf(),
                column,
                found: format!("{other:?}"),
            })
        }
    }
    Ok(())
}
