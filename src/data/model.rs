use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::OperatorError;

/// Title given to freshly ingested data.
pub const RAW_DATA_TITLE: &str = "Raw Data";

// ---------------------------------------------------------------------------
// Dataset – one named (x, y) series
// ---------------------------------------------------------------------------

/// A titled pair of equal-length sample arrays.
///
/// Operators never mutate a dataset; they return a new one, so a caller that
/// wants to compare before/after simply keeps both values.
///
/// `x` is expected to be non-decreasing. Nothing enforces this, but
/// slicing by value relies on it and silently picks the wrong bounds on
/// unsorted input (see [`Dataset::is_sorted`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct Dataset {
    title: String,
    x: Vec<f64>,
    y: Vec<f64>,
}

#[derive(Deserialize)]
struct RawDataset {
    #[serde(default = "default_title")]
    title: String,
    x: Vec<f64>,
    y: Vec<f64>,
}

fn default_title() -> String {
    RAW_DATA_TITLE.to_string()
}

impl TryFrom<RawDataset> for Dataset {
    type Error = OperatorError;

    fn try_from(raw: RawDataset) -> Result<Self, Self::Error> {
        Dataset::new(raw.title, raw.x, raw.y)
    }
}

impl Dataset {
    /// Build a dataset, rejecting arrays of different length.
    pub fn new(title: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Result<Self, OperatorError> {
        if x.len() != y.len() {
            return Err(OperatorError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        Ok(Self {
            title: title.into(),
            x,
            y,
        })
    }

    /// Operators build results from arrays they already know to be paired.
    pub(crate) fn from_parts(title: String, x: Vec<f64>, y: Vec<f64>) -> Self {
        debug_assert_eq!(x.len(), y.len());
        Self { title, x, y }
    }

    pub fn empty(title: impl Into<String>) -> Self {
        Self::from_parts(title.into(), Vec::new(), Vec::new())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Same samples under a different title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the dataset holds no samples.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Iterate `(x, y)` pairs in stored order.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }

    /// First and last x value (the domain when `x` is sorted).
    pub fn x_range(&self) -> Option<RangeInclusive<f64>> {
        Some(*self.x.first()?..=*self.x.last()?)
    }

    /// Whether `x` is non-decreasing, the precondition of value slicing.
    pub fn is_sorted(&self) -> bool {
        self.x.windows(2).all(|w| w[0] <= w[1])
    }

    /// Whether every x and y sample is finite.
    pub fn is_finite(&self) -> bool {
        self.points().all(|(x, y)| x.is_finite() && y.is_finite())
    }

    /// Copy without the samples whose x or y is NaN or infinite.
    pub fn clean(&self) -> Dataset {
        let (x, y) = self
            .points()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .unzip();
        Dataset::from_parts(self.title.clone(), x, y)
    }

    /// Evenly strided copy holding at most `max_points` samples.
    ///
    /// The first and last samples are always kept so the displayed domain
    /// matches the full series.
    pub fn preview(&self, max_points: usize) -> Dataset {
        let n = self.len();
        if n <= max_points {
            return self.clone();
        }
        if max_points < 2 {
            let take = max_points.min(n);
            return Dataset::from_parts(
                self.title.clone(),
                self.x[..take].to_vec(),
                self.y[..take].to_vec(),
            );
        }
        let step = (n - 1) as f64 / (max_points - 1) as f64;
        let (x, y) = (0..max_points)
            .map(|i| {
                let idx = ((i as f64 * step).round() as usize).min(n - 1);
                (self.x[idx], self.y[idx])
            })
            .unzip();
        Dataset::from_parts(self.title.clone(), x, y)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.x_range() {
            Some(range) => write!(
                f,
                "{} ({} samples, x {} → {})",
                self.title,
                self.len(),
                range.start(),
                range.end()
            ),
            None => write!(f, "{} (empty)", self.title),
        }
    }
}

// ---------------------------------------------------------------------------
// Value – anything a template step can bind
// ---------------------------------------------------------------------------

/// A bound template variable: a series or a plain number.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Dataset(Dataset),
    Scalar(f64),
}

impl Value {
    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Value::Dataset(d) => Some(d),
            Value::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Dataset(_) => None,
        }
    }

    pub fn into_dataset(self) -> Option<Dataset> {
        match self {
            Value::Dataset(d) => Some(d),
            Value::Scalar(_) => None,
        }
    }

    /// Human name of the variant, used in type-mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Dataset(_) => "dataset",
            Value::Scalar(_) => "scalar",
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            Value::Dataset(d) => d.is_finite(),
            Value::Scalar(v) => v.is_finite(),
        }
    }
}

impl From<Dataset> for Value {
    fn from(d: Dataset) -> Self {
        Value::Dataset(d)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Dataset(d) => write!(f, "{d}"),
            Value::Scalar(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Dataset {
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y = x.iter().map(|v| v * 10.0).collect();
        Dataset::new("ramp", x, y).unwrap()
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let err = Dataset::new("bad", vec![1.0, 2.0], vec![1.0]).unwrap_err();
        assert_eq!(err, OperatorError::LengthMismatch { x: 2, y: 1 });
    }

    #[test]
    fn clean_drops_non_finite_rows() {
        let d = Dataset::new(
            "dirty",
            vec![0.0, 1.0, f64::NAN, 3.0, 4.0],
            vec![0.0, f64::INFINITY, 2.0, 3.0, f64::NEG_INFINITY],
        )
        .unwrap();
        let cleaned = d.clean();
        assert_eq!(cleaned.x(), &[0.0, 3.0]);
        assert_eq!(cleaned.y(), &[0.0, 3.0]);
        assert_eq!(cleaned.title(), "dirty");
        // input untouched
        assert_eq!(d.len(), 5);
    }

    #[test]
    fn preview_keeps_endpoints() {
        let d = ramp(1001);
        let p = d.preview(11);
        assert_eq!(p.len(), 11);
        assert_eq!(p.x()[0], 0.0);
        assert_eq!(p.x()[10], 1000.0);
        assert_eq!(p.x()[5], 500.0);
    }

    #[test]
    fn preview_of_short_series_is_a_copy() {
        let d = ramp(5);
        assert_eq!(d.preview(100), d);
    }

    #[test]
    fn sortedness() {
        assert!(ramp(4).is_sorted());
        let d = Dataset::new("u", vec![0.0, 2.0, 1.0], vec![0.0; 3]).unwrap();
        assert!(!d.is_sorted());
    }

    #[test]
    fn deserialize_validates_lengths() {
        let ok: Dataset = serde_json::from_str(r#"{"x":[1,2],"y":[3,4]}"#).unwrap();
        assert_eq!(ok.title(), RAW_DATA_TITLE);
        assert!(serde_json::from_str::<Dataset>(r#"{"x":[1,2],"y":[3]}"#).is_err());
    }
}
