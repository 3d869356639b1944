use nalgebra::{DMatrix, DVector, SVD};

use super::model::Dataset;
use crate::error::OperatorError;

/// Highest degree offered by the fit operator (quartic).
pub const MAX_DEGREE: usize = 4;

/// Least-squares polynomial fitted to a dataset.
///
/// Internally the polynomial is kept in a normalised variable
/// `t = (x - center) / scale` which maps the fitted x-range onto `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    center: f64,
    scale: f64,
    /// Ascending coefficients in `t`.
    normalized: Vec<f64>,
}

impl Polynomial {
    pub fn degree(&self) -> usize {
        self.normalized.len() - 1
    }

    /// Evaluate at `x` (Horner's scheme in the normalised variable).
    pub fn evaluate(&self, x: f64) -> f64 {
        let t = (x - self.center) / self.scale;
        self.normalized.iter().rev().fold(0.0, |acc, &c| acc * t + c)
    }

    /// Ascending coefficients in plain `x`: `c[0] + c[1] x + c[2] x² + …`.
    pub fn coefficients(&self) -> Vec<f64> {
        let k = self.normalized.len();
        let mut raw = vec![0.0; k];
        for (j, &a) in self.normalized.iter().enumerate() {
            // a * ((x - center) / scale)^j, expanded binomially
            let factor = a / self.scale.powi(j as i32);
            let mut binom = 1.0;
            for m in 0..=j {
                let term = binom * (-self.center).powi((j - m) as i32);
                raw[m] += factor * term;
                binom = binom * (j - m) as f64 / (m + 1) as f64;
            }
        }
        raw
    }
}

/// Count distinct finite x values (exact comparison).
fn distinct_count(x: &[f64]) -> usize {
    let mut sorted: Vec<f64> = x.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

/// Fit a polynomial of `degree` (1 = linear … 4 = quartic) by least squares.
pub fn fit_polynomial(dataset: &Dataset, degree: usize) -> Result<Polynomial, OperatorError> {
    if !(1..=MAX_DEGREE).contains(&degree) {
        return Err(OperatorError::UnsupportedDegree(degree));
    }
    let non_finite = dataset
        .points()
        .filter(|(x, y)| !(x.is_finite() && y.is_finite()))
        .count();
    if non_finite > 0 {
        return Err(OperatorError::NonFiniteInput {
            title: dataset.title().to_string(),
            count: non_finite,
        });
    }
    let distinct = distinct_count(dataset.x());
    if distinct == 0 || degree > distinct - 1 {
        return Err(OperatorError::InsufficientData { degree, distinct });
    }

    let (lo, hi) = dataset
        .x()
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let center = (lo + hi) / 2.0;
    let half_width = (hi - lo) / 2.0;
    let scale = if half_width > 0.0 { half_width } else { 1.0 };

    let n = dataset.len();
    let k = degree + 1;
    let mut design = DMatrix::<f64>::zeros(n, k);
    for (mut row, &x) in design.row_iter_mut().zip(dataset.x()) {
        let t = (x - center) / scale;
        let mut power = 1.0;
        for j in 0..k {
            row[j] = power;
            power *= t;
        }
    }
    let b = DVector::from_column_slice(dataset.y());

    let decomp = SVD::new(design, true, true);
    let sigma_max = decomp.singular_values.max();
    let epsilon = f64::EPSILON * n.max(k) as f64 * sigma_max;
    let solution = decomp.solve(&b, epsilon).map_err(OperatorError::Solve)?;
    let normalized: Vec<f64> = solution.iter().copied().collect();

    if normalized.iter().any(|c| c.is_nan()) {
        return Err(OperatorError::Solve("NaN in coefficients"));
    }

    log::debug!(
        "fitted degree {degree} polynomial to '{}' ({n} samples)",
        dataset.title()
    );

    Ok(Polynomial {
        center,
        scale,
        normalized,
    })
}

/// Fitted curve sampled at the input's x values.
///
/// The result keeps the input's x; only y is replaced by the polynomial.
pub fn fit(dataset: &Dataset, degree: usize) -> Result<Dataset, OperatorError> {
    let poly = fit_polynomial(dataset, degree)?;
    let y = dataset.x().iter().map(|&x| poly.evaluate(x)).collect();
    Ok(Dataset::from_parts(
        format!("{} fit of {}", degree_name(degree), dataset.title()),
        dataset.x().to_vec(),
        y,
    ))
}

fn degree_name(degree: usize) -> &'static str {
    match degree {
        1 => "Linear",
        2 => "Quadratic",
        3 => "Cubic",
        4 => "Quartic",
        _ => "Polynomial",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn from_fn(n: usize, f: impl Fn(f64) -> f64) -> Dataset {
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y = x.iter().map(|&v| f(v)).collect();
        Dataset::new("generated", x, y).unwrap()
    }

    #[test]
    fn linear_fit_is_exact_on_a_line() {
        let d = from_fn(20, |x| 3.0 * x + 2.0);
        let fitted = fit(&d, 1).unwrap();
        assert_eq!(fitted.x(), d.x());
        for (got, want) in fitted.y().iter().zip(d.y()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-9);
        }
        let coefs = fit_polynomial(&d, 1).unwrap().coefficients();
        assert_abs_diff_eq!(coefs[0], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(coefs[1], 3.0, epsilon = 1e-9);
    }

    #[test]
    fn quartic_recovers_coefficients() {
        let d = from_fn(40, |x| 0.5 * x.powi(4) - 2.0 * x.powi(3) + x - 7.0);
        let poly = fit_polynomial(&d, 4).unwrap();
        assert_eq!(poly.degree(), 4);
        let c = poly.coefficients();
        let want = [-7.0, 1.0, 0.0, -2.0, 0.5];
        for (got, want) in c.iter().zip(want) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-5);
        }
    }

    #[test]
    fn quadratic_fit_of_noisy_data_has_smaller_residual_than_linear() {
        let d = from_fn(50, |x| x * x + if (x as usize) % 2 == 0 { 0.3 } else { -0.3 });
        let sse = |f: &Dataset| -> f64 {
            f.y().iter().zip(d.y()).map(|(a, b)| (a - b).powi(2)).sum()
        };
        assert!(sse(&fit(&d, 2).unwrap()) < sse(&fit(&d, 1).unwrap()));
    }

    #[test]
    fn degree_must_leave_a_spare_distinct_sample() {
        let d = Dataset::new("short", vec![1.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]).unwrap();
        assert!(fit(&d, 1).is_ok());
        assert_eq!(
            fit(&d, 2).unwrap_err(),
            OperatorError::InsufficientData {
                degree: 2,
                distinct: 2
            }
        );
        assert!(matches!(
            fit(&Dataset::empty("none"), 1),
            Err(OperatorError::InsufficientData { distinct: 0, .. })
        ));
    }

    #[test]
    fn nan_x_is_rejected() {
        let d = Dataset::new("gap", vec![0.0, 1.0, f64::NAN, 3.0], vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(
            fit(&d, 1).unwrap_err(),
            OperatorError::NonFiniteInput {
                title: "gap".into(),
                count: 1
            }
        );
    }

    #[test]
    fn infinite_x_is_rejected() {
        let d = Dataset::new(
            "edge",
            vec![0.0, 1.0, 2.0, f64::INFINITY, f64::NEG_INFINITY],
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        assert!(matches!(
            fit_polynomial(&d, 1),
            Err(OperatorError::NonFiniteInput { count: 2, .. })
        ));
        // the cleaned copy fits fine
        assert!(fit(&d.clean(), 1).is_ok());
    }

    #[test]
    fn non_finite_y_is_rejected() {
        let d = Dataset::new("y", vec![0.0, 1.0, 2.0], vec![0.0, f64::NAN, 2.0]).unwrap();
        assert!(matches!(fit(&d, 1), Err(OperatorError::NonFiniteInput { .. })));
    }

    #[test]
    fn distinct_count_ignores_non_finite() {
        assert_eq!(distinct_count(&[1.0, f64::NAN, 1.0, f64::INFINITY, 2.0]), 2);
    }

    #[test]
    fn unsupported_degrees() {
        let d = from_fn(10, |x| x);
        assert_eq!(fit(&d, 0).unwrap_err(), OperatorError::UnsupportedDegree(0));
        assert_eq!(fit(&d, 5).unwrap_err(), OperatorError::UnsupportedDegree(5));
    }

    #[test]
    fn fit_does_not_touch_input() {
        let d = from_fn(10, |x| x.sin());
        let before = d.clone();
        let _ = fit(&d, 3).unwrap();
        assert_eq!(d, before);
    }
}
