use std::fmt;

use serde::{Deserialize, Serialize};

use super::model::Dataset;
use crate::error::OperatorError;

// ---------------------------------------------------------------------------
// Slice
// ---------------------------------------------------------------------------

/// How slice bounds are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceMode {
    /// Bounds are positions in stored order, half-open `[begin, end)`.
    #[default]
    ByIndex,
    /// Bounds are x values, resolved to the first position whose x is not
    /// less than the bound. Requires sorted x.
    ByValue,
}

/// Position of the first x that is `>= value` (lower bound).
///
/// Only meaningful when `x` is non-decreasing; on unsorted input the result
/// is some partition point, not an error.
pub fn lower_bound(x: &[f64], value: f64) -> usize {
    x.partition_point(|&v| v < value)
}

/// Index bound from a float: truncated toward zero, negatives and NaN
/// become 0, anything past the end clamps to `len`.
fn index_bound(value: f64, len: usize) -> usize {
    // float → usize casts saturate, NaN maps to 0
    (value as usize).min(len)
}

/// Resolve `begin`/`end` to clamped positions for `mode`.
pub fn resolve_bounds(dataset: &Dataset, begin: f64, end: f64, mode: SliceMode) -> (usize, usize) {
    let len = dataset.len();
    match mode {
        SliceMode::ByIndex => (index_bound(begin, len), index_bound(end, len)),
        SliceMode::ByValue => (
            lower_bound(dataset.x(), begin),
            lower_bound(dataset.x(), end),
        ),
    }
}

/// Contiguous sub-range of `dataset`.
///
/// Out-of-range bounds clamp to the data; `begin > end` after resolution
/// yields an empty dataset. Never fails.
pub fn slice(dataset: &Dataset, begin: f64, end: f64, mode: SliceMode) -> Dataset {
    let (lo, hi) = resolve_bounds(dataset, begin, end, mode);
    let title = format!("Slice of {}", dataset.title());
    if lo >= hi {
        return Dataset::empty(title);
    }
    Dataset::from_parts(
        title,
        dataset.x()[lo..hi].to_vec(),
        dataset.y()[lo..hi].to_vec(),
    )
}

// ---------------------------------------------------------------------------
// Combine
// ---------------------------------------------------------------------------

/// Element-wise arithmetic between two aligned datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl CombineOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            CombineOp::Add => a + b,
            CombineOp::Subtract => a - b,
            CombineOp::Multiply => a * b,
            CombineOp::Divide => a / b,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            CombineOp::Add => '+',
            CombineOp::Subtract => '-',
            CombineOp::Multiply => '×',
            CombineOp::Divide => '÷',
        }
    }
}

impl fmt::Display for CombineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Two x arrays are aligned when they hold the same values in the same
/// order. NaN positions must coincide.
pub fn aligned(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(p, q)| p == q || (p.is_nan() && q.is_nan()))
}

/// `y = a.y op b.y` over the shared x of `a` and `b`.
///
/// Division by zero yields ±∞ or NaN as data; clean the result if that
/// is unwanted.
pub fn combine(a: &Dataset, b: &Dataset, op: CombineOp) -> Result<Dataset, OperatorError> {
    if !aligned(a.x(), b.x()) {
        return Err(OperatorError::MisalignedDatasets {
            left: a.title().to_string(),
            right: b.title().to_string(),
            left_len: a.len(),
            right_len: b.len(),
        });
    }
    let y = a
        .y()
        .iter()
        .zip(b.y())
        .map(|(&p, &q)| op.apply(p, q))
        .collect();
    Ok(Dataset::from_parts(
        format!("{} {op} {}", a.title(), b.title()),
        a.x().to_vec(),
        y,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            "sample",
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0],
        )
        .unwrap()
    }

    #[test]
    fn slice_by_index_is_half_open() {
        let s = slice(&sample(), 1.0, 3.0, SliceMode::ByIndex);
        assert_eq!(s.x(), &[1.0, 2.0]);
        assert_eq!(s.y(), &[11.0, 12.0]);
    }

    #[test]
    fn slice_by_value_matches_index() {
        let d = sample();
        let by_value = slice(&d, 2.0, 4.0, SliceMode::ByValue);
        let by_index = slice(&d, 2.0, 4.0, SliceMode::ByIndex);
        assert_eq!(by_value, by_index);
    }

    #[test]
    fn slice_by_value_uses_lower_bound() {
        let d = sample();
        // 1.5 → first x >= 1.5 is 2.0 (index 2); 10.0 → past the end
        let s = slice(&d, 1.5, 10.0, SliceMode::ByValue);
        assert_eq!(s.x(), &[2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn slice_clamps_out_of_range_bounds() {
        let d = sample();
        assert_eq!(slice(&d, -4.0, 100.0, SliceMode::ByIndex).len(), 6);
        assert_eq!(slice(&d, f64::NAN, 2.0, SliceMode::ByIndex).len(), 2);
        assert_eq!(slice(&d, -10.0, -1.0, SliceMode::ByValue).len(), 0);
    }

    #[test]
    fn reversed_bounds_give_empty_result() {
        let s = slice(&sample(), 4.0, 1.0, SliceMode::ByIndex);
        assert!(s.is_empty());
        let s = slice(&sample(), 4.0, 1.0, SliceMode::ByValue);
        assert!(s.is_empty());
    }

    #[test]
    fn slice_is_idempotent() {
        let d = sample();
        let once = slice(&d, 0.0, 5.0, SliceMode::ByIndex);
        let twice = slice(&once, 0.0, 5.0, SliceMode::ByIndex);
        assert_eq!(once.x(), twice.x());
        assert_eq!(once.y(), twice.y());
    }

    #[test]
    fn combine_is_element_wise() {
        let a = sample();
        let b = Dataset::new("b", a.x().to_vec(), vec![1.0, 2.0, 0.0, -1.0, 0.5, 3.0]).unwrap();
        let sum = combine(&a, &b, CombineOp::Add).unwrap();
        for i in 0..a.len() {
            assert_eq!(sum.y()[i], a.y()[i] + b.y()[i]);
        }
        assert_eq!(sum.x(), a.x());
        assert_eq!(sum.title(), "sample + b");

        let diff = combine(&a, &b, CombineOp::Subtract).unwrap();
        assert_eq!(diff.y()[3], 14.0);
        let prod = combine(&a, &b, CombineOp::Multiply).unwrap();
        assert_eq!(prod.y()[4], 7.0);
    }

    #[test]
    fn divide_by_zero_is_data_not_error() {
        let a = sample();
        let b = Dataset::new("zeros", a.x().to_vec(), vec![0.0; 6]).unwrap();
        let q = combine(&a, &b, CombineOp::Divide).unwrap();
        assert!(q.y().iter().all(|v| v.is_infinite()));
        let zero_over_zero = combine(&b, &b, CombineOp::Divide).unwrap();
        assert!(zero_over_zero.y().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn combine_rejects_misaligned_series() {
        let a = sample();
        let shorter = slice(&a, 0.0, 3.0, SliceMode::ByIndex);
        assert!(matches!(
            combine(&a, &shorter, CombineOp::Add),
            Err(OperatorError::MisalignedDatasets {
                left_len: 6,
                right_len: 3,
                ..
            })
        ));
        let shifted = Dataset::new("shifted", a.x().iter().map(|x| x + 0.5).collect(), a.y().to_vec())
            .unwrap();
        assert!(combine(&a, &shifted, CombineOp::Multiply).is_err());
    }
}
