use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::transform::{CombineOp, SliceMode};
use crate::error::TemplateError;

/// Version written into every persisted template.
pub const TEMPLATE_VERSION: u32 = 1;

/// File extension used for persisted templates.
pub const TEMPLATE_EXTENSION: &str = "wizt";

// ---------------------------------------------------------------------------
// Operands and operations
// ---------------------------------------------------------------------------

/// A step argument: a literal number or the name of a bound variable.
///
/// Serialized untagged, so `2.5` is a number and `"ORIGINAL"` a name.
/// JSON has no literal for NaN or ±∞, so those are written as
/// `{ "number": "inf" }` (or `"-inf"`, `"NaN"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "OperandRepr", try_from = "OperandRepr")]
pub enum Operand {
    Number(f64),
    Variable(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OperandRepr {
    Number(f64),
    Variable(String),
    NonFinite { number: String },
}

impl From<Operand> for OperandRepr {
    fn from(operand: Operand) -> Self {
        match operand {
            Operand::Number(v) if v.is_finite() => OperandRepr::Number(v),
            Operand::Number(v) => OperandRepr::NonFinite {
                number: v.to_string(),
            },
            Operand::Variable(name) => OperandRepr::Variable(name),
        }
    }
}

impl TryFrom<OperandRepr> for Operand {
    type Error = String;

    fn try_from(repr: OperandRepr) -> Result<Self, Self::Error> {
        match repr {
            OperandRepr::Number(v) => Ok(Operand::Number(v)),
            OperandRepr::Variable(name) => Ok(Operand::Variable(name)),
            OperandRepr::NonFinite { number } => number
                .parse::<f64>()
                .map(Operand::Number)
                .map_err(|_| format!("'{number}' is not a number")),
        }
    }
}

impl Operand {
    pub fn variable(&self) -> Option<&str> {
        match self {
            Operand::Variable(name) => Some(name.as_str()),
            Operand::Number(_) => None,
        }
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Number(v)
    }
}

impl From<&str> for Operand {
    fn from(name: &str) -> Self {
        Operand::Variable(name.to_string())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Number(v) => write!(f, "{v}"),
            Operand::Variable(name) => write!(f, "{name}"),
        }
    }
}

/// One recorded transform invocation. Each variant names the variables it
/// reads; the name it writes lives on the enclosing [`Step`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// Re-bind an existing variable under the step's name.
    Seed { name: String },
    Slice {
        source: String,
        begin: Operand,
        end: Operand,
        #[serde(default)]
        mode: SliceMode,
    },
    Fit { source: String, degree: usize },
    Combine {
        left: String,
        right: String,
        op: CombineOp,
    },
    Clean { source: String },
    /// Invoke a namespace function.
    Call {
        function: String,
        #[serde(default)]
        args: Vec<Operand>,
    },
}

impl Operation {
    /// Variable names this operation reads, in argument order.
    pub fn reads(&self) -> Vec<&str> {
        match self {
            Operation::Seed { name } => vec![name.as_str()],
            Operation::Slice {
                source, begin, end, ..
            } => std::iter::once(source.as_str())
                .chain(begin.variable())
                .chain(end.variable())
                .collect(),
            Operation::Fit { source, .. } | Operation::Clean { source } => vec![source.as_str()],
            Operation::Combine { left, right, .. } => vec![left.as_str(), right.as_str()],
            Operation::Call { args, .. } => args.iter().filter_map(Operand::variable).collect(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Seed { name } => write!(f, "{name}"),
            Operation::Slice {
                source,
                begin,
                end,
                mode,
            } => {
                let mode = match mode {
                    SliceMode::ByIndex => "index",
                    SliceMode::ByValue => "value",
                };
                write!(f, "slice({source}, {begin}, {end}, {mode})")
            }
            Operation::Fit { source, degree } => write!(f, "fit({source}, {degree})"),
            Operation::Combine { left, right, op } => write!(f, "{left} {op} {right}"),
            Operation::Clean { source } => write!(f, "clean({source})"),
            Operation::Call { function, args } => {
                write!(f, "{function}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// An operation plus the name its result is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub operation: Operation,
    pub result: String,
}

impl Step {
    pub fn new(operation: Operation, result: impl Into<String>) -> Self {
        Self {
            operation,
            result: result.into(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.result, self.operation)
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// An ordered, named chain of steps, not yet bound to any data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    name: String,
    steps: Vec<Step>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    name: &'a str,
    steps: &'a [Step],
}

#[derive(Deserialize)]
struct Document {
    version: u32,
    #[serde(default)]
    name: String,
    steps: Vec<Step>,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps a replay will evaluate.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append a step.
    pub fn push(&mut self, operation: Operation, result: impl Into<String>) -> &mut Self {
        self.steps.push(Step::new(operation, result));
        self
    }

    /// Builder form of [`Template::push`].
    pub fn with_step(mut self, operation: Operation, result: impl Into<String>) -> Self {
        self.push(operation, result);
        self
    }

    /// First step reading a name that is neither a seed nor the result of
    /// an earlier step, as `(step index, name)`.
    pub fn first_unbound<'a>(
        &'a self,
        seeds: impl IntoIterator<Item = &'a str>,
    ) -> Option<(usize, &'a str)> {
        let mut bound: BTreeSet<&str> = seeds.into_iter().collect();
        for (index, step) in self.steps.iter().enumerate() {
            if let Some(name) = step.operation.reads().into_iter().find(|n| !bound.contains(n)) {
                return Some((index, name));
            }
            bound.insert(&step.result);
        }
        None
    }

    // -- persistence --

    pub fn to_json(&self) -> Result<String, TemplateError> {
        let doc = DocumentRef {
            version: TEMPLATE_VERSION,
            name: &self.name,
            steps: &self.steps,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    pub fn from_json(text: &str) -> Result<Self, TemplateError> {
        let doc: Document = serde_json::from_str(text)?;
        if doc.version != TEMPLATE_VERSION {
            return Err(TemplateError::UnsupportedVersion {
                found: doc.version,
                expected: TEMPLATE_VERSION,
            });
        }
        Ok(Self {
            name: doc.name,
            steps: doc.steps,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), TemplateError> {
        let text = self.to_json()?;
        std::fs::write(path, text).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Saved template '{}' ({} steps) to {}", self.name, self.steps.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let template = Self::from_json(&text)?;
        log::info!(
            "Loaded template '{}' ({} steps) from {}",
            template.name,
            template.steps.len(),
            path.display()
        );
        Ok(template)
    }
}
