//! External functions visible to `call` steps.
//!
//! A bound template carries an ordered list of namespaces. A bare function
//! name is looked up in each namespace in turn; `namespace.function` only
//! looks in the named one. Nothing outside the bound variables and these
//! functions is reachable from a step.

use crate::data::model::{Dataset, Value};
use crate::error::FunctionError;

/// Signature of every namespace function.
pub type NamespaceFn = fn(&[Value]) -> Result<Value, FunctionError>;

/// A fixed table of named functions.
pub trait Namespace {
    /// Prefix used for qualified calls (`math.sqrt`).
    fn name(&self) -> &'static str;

    /// Look up `function` by its unqualified name.
    fn resolve(&self, function: &str) -> Option<NamespaceFn>;

    /// Names this namespace provides, for listing in a UI.
    fn functions(&self) -> Vec<&'static str>;
}

/// The namespaces bound by default: [`MathNamespace`] then [`DatasetNamespace`].
pub fn default_namespaces() -> Vec<Box<dyn Namespace>> {
    vec![Box::new(MathNamespace), Box::new(DatasetNamespace)]
}

/// Resolve `function` against `namespaces`.
pub fn lookup(namespaces: &[Box<dyn Namespace>], function: &str) -> Option<NamespaceFn> {
    match function.split_once('.') {
        Some((prefix, name)) => namespaces
            .iter()
            .find(|ns| ns.name() == prefix)
            .and_then(|ns| ns.resolve(name)),
        None => namespaces.iter().find_map(|ns| ns.resolve(function)),
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn arity(args: &[Value], expected: usize) -> Result<(), FunctionError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(FunctionError::Arity {
            expected,
            found: args.len(),
        })
    }
}

fn scalar_arg(args: &[Value], index: usize) -> Result<f64, FunctionError> {
    args[index].as_scalar().ok_or(FunctionError::Argument {
        index,
        expected: "scalar",
    })
}

fn dataset_arg(args: &[Value], index: usize) -> Result<&Dataset, FunctionError> {
    args[index].as_dataset().ok_or(FunctionError::Argument {
        index,
        expected: "dataset",
    })
}

/// Apply `f` to a scalar, or to every y of a dataset (x kept).
fn map_value(value: &Value, label: &str, f: impl Fn(f64) -> f64) -> Value {
    match value {
        Value::Scalar(v) => Value::Scalar(f(*v)),
        Value::Dataset(d) => {
            let y = d.y().iter().map(|&v| f(v)).collect();
            Value::Dataset(Dataset::from_parts(
                format!("{label}({})", d.title()),
                d.x().to_vec(),
                y,
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// math
// ---------------------------------------------------------------------------

/// Numeric functions. Unary ones work on scalars and element-wise on the
/// y values of a dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathNamespace;

macro_rules! unary {
    ($name:ident, $label:literal, $f:expr) => {
        fn $name(args: &[Value]) -> Result<Value, FunctionError> {
            arity(args, 1)?;
            Ok(map_value(&args[0], $label, $f))
        }
    };
}

unary!(math_abs, "abs", f64::abs);
unary!(math_sqrt, "sqrt", f64::sqrt);
unary!(math_exp, "exp", f64::exp);
unary!(math_ln, "ln", f64::ln);
unary!(math_log10, "log10", f64::log10);
unary!(math_sin, "sin", f64::sin);
unary!(math_cos, "cos", f64::cos);
unary!(math_tan, "tan", f64::tan);
unary!(math_neg, "neg", |v: f64| -v);

fn math_pow(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 2)?;
    let exponent = scalar_arg(args, 1)?;
    Ok(map_value(&args[0], "pow", |v| v.powf(exponent)))
}

fn math_scale(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 2)?;
    let factor = scalar_arg(args, 1)?;
    Ok(map_value(&args[0], "scale", |v| v * factor))
}

fn math_offset(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 2)?;
    let delta = scalar_arg(args, 1)?;
    Ok(map_value(&args[0], "offset", |v| v + delta))
}

fn math_pi(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 0)?;
    Ok(Value::Scalar(std::f64::consts::PI))
}

fn math_e(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 0)?;
    Ok(Value::Scalar(std::f64::consts::E))
}

const MATH_FUNCTIONS: &[(&str, NamespaceFn)] = &[
    ("abs", math_abs),
    ("sqrt", math_sqrt),
    ("exp", math_exp),
    ("ln", math_ln),
    ("log10", math_log10),
    ("sin", math_sin),
    ("cos", math_cos),
    ("tan", math_tan),
    ("neg", math_neg),
    ("pow", math_pow),
    ("scale", math_scale),
    ("offset", math_offset),
    ("pi", math_pi),
    ("e", math_e),
];

impl Namespace for MathNamespace {
    fn name(&self) -> &'static str {
        "math"
    }

    fn resolve(&self, function: &str) -> Option<NamespaceFn> {
        table_lookup(MATH_FUNCTIONS, function)
    }

    fn functions(&self) -> Vec<&'static str> {
        MATH_FUNCTIONS.iter().map(|(name, _)| *name).collect()
    }
}

// ---------------------------------------------------------------------------
// dataset
// ---------------------------------------------------------------------------

/// Reductions and helpers over whole datasets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetNamespace;

fn non_empty(args: &[Value]) -> Result<&Dataset, FunctionError> {
    arity(args, 1)?;
    let d = dataset_arg(args, 0)?;
    if d.is_empty() {
        return Err(FunctionError::Empty);
    }
    Ok(d)
}

fn ds_len(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1)?;
    Ok(Value::Scalar(dataset_arg(args, 0)?.len() as f64))
}

fn ds_sum(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1)?;
    Ok(Value::Scalar(dataset_arg(args, 0)?.y().iter().sum()))
}

fn ds_mean(args: &[Value]) -> Result<Value, FunctionError> {
    let d = non_empty(args)?;
    Ok(Value::Scalar(d.y().iter().sum::<f64>() / d.len() as f64))
}

fn ds_min(args: &[Value]) -> Result<Value, FunctionError> {
    let d = non_empty(args)?;
    Ok(Value::Scalar(d.y().iter().copied().fold(f64::INFINITY, f64::min)))
}

fn ds_max(args: &[Value]) -> Result<Value, FunctionError> {
    let d = non_empty(args)?;
    Ok(Value::Scalar(d.y().iter().copied().fold(f64::NEG_INFINITY, f64::max)))
}

fn ds_x_first(args: &[Value]) -> Result<Value, FunctionError> {
    let d = non_empty(args)?;
    Ok(Value::Scalar(d.x()[0]))
}

fn ds_x_last(args: &[Value]) -> Result<Value, FunctionError> {
    let d = non_empty(args)?;
    Ok(Value::Scalar(d.x()[d.len() - 1]))
}

fn ds_clean(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1)?;
    Ok(Value::Dataset(dataset_arg(args, 0)?.clean()))
}

const DATASET_FUNCTIONS: &[(&str, NamespaceFn)] = &[
    ("len", ds_len),
    ("sum", ds_sum),
    ("mean", ds_mean),
    ("min", ds_min),
    ("max", ds_max),
    ("x_first", ds_x_first),
    ("x_last", ds_x_last),
    ("clean", ds_clean),
];

impl Namespace for DatasetNamespace {
    fn name(&self) -> &'static str {
        "dataset"
    }

    fn resolve(&self, function: &str) -> Option<NamespaceFn> {
        table_lookup(DATASET_FUNCTIONS, function)
    }

    fn functions(&self) -> Vec<&'static str> {
        DATASET_FUNCTIONS.iter().map(|(name, _)| *name).collect()
    }
}

fn table_lookup(table: &[(&str, NamespaceFn)], function: &str) -> Option<NamespaceFn> {
    table
        .iter()
        .find(|(name, _)| *name == function)
        .map(|(_, f)| *f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ds() -> Value {
        Value::Dataset(Dataset::new("d", vec![1.0, 2.0, 3.0], vec![4.0, -9.0, 16.0]).unwrap())
    }

    #[test]
    fn bare_and_qualified_lookup() {
        let ns = default_namespaces();
        assert!(lookup(&ns, "sqrt").is_some());
        assert!(lookup(&ns, "math.sqrt").is_some());
        assert!(lookup(&ns, "dataset.mean").is_some());
        assert!(lookup(&ns, "dataset.sqrt").is_none());
        assert!(lookup(&ns, "nope.sqrt").is_none());
        assert!(lookup(&ns, "eval").is_none());
        assert!(lookup(&[], "sqrt").is_none());
    }

    #[test]
    fn unary_math_maps_y_only() {
        let out = math_abs(&[ds()]).unwrap();
        let d = out.as_dataset().unwrap();
        assert_eq!(d.x(), &[1.0, 2.0, 3.0]);
        assert_eq!(d.y(), &[4.0, 9.0, 16.0]);
        assert_eq!(d.title(), "abs(d)");
        assert_eq!(math_sqrt(&[Value::Scalar(9.0)]).unwrap(), Value::Scalar(3.0));
    }

    #[test]
    fn binary_math_needs_scalar_second_argument() {
        assert_eq!(math_pow(&[Value::Scalar(2.0), Value::Scalar(3.0)]).unwrap(), Value::Scalar(8.0));
        assert_eq!(
            math_scale(&[ds(), ds()]).unwrap_err(),
            FunctionError::Argument {
                index: 1,
                expected: "scalar"
            }
        );
        assert_eq!(
            math_offset(&[ds()]).unwrap_err(),
            FunctionError::Arity {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn reductions() {
        assert_eq!(ds_len(&[ds()]).unwrap(), Value::Scalar(3.0));
        assert_eq!(ds_sum(&[ds()]).unwrap(), Value::Scalar(11.0));
        assert_eq!(ds_min(&[ds()]).unwrap(), Value::Scalar(-9.0));
        assert_eq!(ds_max(&[ds()]).unwrap(), Value::Scalar(16.0));
        assert_eq!(ds_x_last(&[ds()]).unwrap(), Value::Scalar(3.0));
        let empty = Value::Dataset(Dataset::empty("e"));
        assert_eq!(ds_mean(&[empty]).unwrap_err(), FunctionError::Empty);
    }

    #[test]
    fn function_listing_matches_tables() {
        assert!(MathNamespace.functions().contains(&"pow"));
        assert_eq!(DatasetNamespace.functions().len(), DATASET_FUNCTIONS.len());
    }
}
