use std::collections::BTreeMap;
use std::fmt;
use std::iter::FusedIterator;

use super::namespace::{lookup, Namespace};
use super::step::{Operand, Operation, Step, Template};
use crate::data::fit::fit;
use crate::data::model::{Dataset, Value};
use crate::data::transform::{combine, slice};
use crate::error::{ChainError, EvalError};

/// Variable bindings visible to a step: name → value.
pub type Environment = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn variable<'e>(env: &'e Environment, name: &str) -> Result<&'e Value, EvalError> {
    env.get(name)
        .ok_or_else(|| EvalError::UnboundVariable(name.to_string()))
}

fn dataset<'e>(env: &'e Environment, name: &str) -> Result<&'e Dataset, EvalError> {
    variable(env, name)?
        .as_dataset()
        .ok_or_else(|| EvalError::TypeMismatch {
            name: name.to_string(),
            expected: "dataset",
        })
}

fn scalar(env: &Environment, operand: &Operand) -> Result<f64, EvalError> {
    match operand {
        Operand::Number(v) => Ok(*v),
        Operand::Variable(name) => {
            variable(env, name)?
                .as_scalar()
                .ok_or_else(|| EvalError::TypeMismatch {
                    name: name.clone(),
                    expected: "scalar",
                })
        }
    }
}

/// Evaluate one operation against `env` and `namespaces` only.
pub fn evaluate(
    operation: &Operation,
    env: &Environment,
    namespaces: &[Box<dyn Namespace>],
) -> Result<Value, EvalError> {
    let value = match operation {
        Operation::Seed { name } => variable(env, name)?.clone(),
        Operation::Slice {
            source,
            begin,
            end,
            mode,
        } => {
            let d = dataset(env, source)?;
            let begin = scalar(env, begin)?;
            let end = scalar(env, end)?;
            Value::Dataset(slice(d, begin, end, *mode))
        }
        Operation::Fit { source, degree } => Value::Dataset(fit(dataset(env, source)?, *degree)?),
        Operation::Combine { left, right, op } => {
            Value::Dataset(combine(dataset(env, left)?, dataset(env, right)?, *op)?)
        }
        Operation::Clean { source } => Value::Dataset(dataset(env, source)?.clean()),
        Operation::Call { function, args } => {
            let f = lookup(namespaces, function)
                .ok_or_else(|| EvalError::UnknownFunction(function.clone()))?;
            let args = args
                .iter()
                .map(|arg| match arg {
                    Operand::Number(v) => Ok(Value::Scalar(*v)),
                    Operand::Variable(name) => variable(env, name).cloned(),
                })
                .collect::<Result<Vec<_>, _>>()?;
            f(&args).map_err(|source| EvalError::Function {
                function: function.clone(),
                source,
            })?
        }
    };
    Ok(value)
}

/// Evaluate `step`, apply strict checking and title the result after the
/// step's name. Does not bind anything.
pub(crate) fn run_step(
    step: &Step,
    env: &Environment,
    namespaces: &[Box<dyn Namespace>],
    strict: bool,
) -> Result<Value, EvalError> {
    let mut value = evaluate(&step.operation, env, namespaces)?;
    if strict && !value.is_finite() {
        return Err(EvalError::NonFinite(step.result.clone()));
    }
    if let Value::Dataset(d) = &mut value {
        d.set_title(step.result.clone());
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Bound template
// ---------------------------------------------------------------------------

/// A template with namespaces and seed variables attached, ready to replay.
///
/// Replaying never changes the bound state, so the same `BoundTemplate`
/// can be replayed any number of times with identical results.
pub struct BoundTemplate {
    template: Template,
    namespaces: Vec<Box<dyn Namespace>>,
    seeds: Environment,
    strict: bool,
}

impl fmt::Debug for BoundTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundTemplate")
            .field("template", &self.template.name())
            .field("steps", &self.template.step_count())
            .field(
                "namespaces",
                &self.namespaces.iter().map(|ns| ns.name()).collect::<Vec<_>>(),
            )
            .field("seeds", &self.seeds.keys().collect::<Vec<_>>())
            .field("strict", &self.strict)
            .finish()
    }
}

impl Template {
    /// Attach namespaces and seed variables. At least one seed is required.
    pub fn bind<I, S, V>(
        self,
        namespaces: Vec<Box<dyn Namespace>>,
        seeds: I,
    ) -> Result<BoundTemplate, ChainError>
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        let seeds: Environment = seeds
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        if seeds.is_empty() {
            return Err(ChainError::NoSeeds);
        }
        Ok(BoundTemplate {
            template: self,
            namespaces,
            seeds,
            strict: false,
        })
    }
}

impl BoundTemplate {
    /// Add or replace a seed variable before replaying.
    pub fn add_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.seeds.insert(name.into(), value.into());
    }

    /// Fail steps whose result holds NaN or infinite values.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Total number of steps, known before replay starts.
    pub fn step_count(&self) -> usize {
        self.template.step_count()
    }

    pub fn seeds(&self) -> &Environment {
        &self.seeds
    }

    /// Drop the bindings and get the plain template back.
    pub fn unbind(self) -> Template {
        self.template
    }

    /// Start a replay. Steps are evaluated lazily, one per `next()`.
    pub fn replay(&self) -> Replay<'_> {
        log::debug!(
            "replaying '{}' ({} steps)",
            self.template.name(),
            self.template.step_count()
        );
        Replay {
            bound: self,
            variables: self.seeds.clone(),
            next: 0,
            state: if self.template.is_empty() {
                ReplayState::Complete
            } else {
                ReplayState::Replaying
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// Where a replay is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Replaying,
    Complete,
    Failed,
}

/// Lazy, finite evaluation of a bound template.
///
/// Yields `(result, step name)` per step in order. After the first error
/// the replay stops; bindings made by earlier steps stay inspectable
/// through [`Replay::variable`].
pub struct Replay<'a> {
    bound: &'a BoundTemplate,
    variables: Environment,
    next: usize,
    state: ReplayState,
}

impl<'a> Replay<'a> {
    pub fn state(&self) -> ReplayState {
        self.state
    }

    /// Steps evaluated successfully so far.
    pub fn completed(&self) -> usize {
        self.next
    }

    /// Total steps in the template.
    pub fn total(&self) -> usize {
        self.bound.step_count()
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> &Environment {
        &self.variables
    }

    pub fn into_variables(self) -> Environment {
        self.variables
    }
}

impl Iterator for Replay<'_> {
    type Item = Result<(Value, String), ChainError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != ReplayState::Replaying {
            return None;
        }
        let steps = self.bound.template.steps();
        let index = self.next;
        let step = &steps[index];

        match run_step(step, &self.variables, &self.bound.namespaces, self.bound.strict) {
            Ok(value) => {
                log::debug!("step {}/{}: {step}", index + 1, steps.len());
                self.variables.insert(step.result.clone(), value.clone());
                self.next += 1;
                if self.next == steps.len() {
                    self.state = ReplayState::Complete;
                }
                Some(Ok((value, step.result.clone())))
            }
            Err(source) => {
                log::warn!("step {}/{} ({step}) failed: {source}", index + 1, steps.len());
                self.state = ReplayState::Failed;
                Some(Err(ChainError::Step {
                    index,
                    result: step.result.clone(),
                    source,
                }))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.state {
            ReplayState::Replaying => (0, Some(self.total() - self.next)),
            _ => (0, Some(0)),
        }
    }
}

impl FusedIterator for Replay<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::transform::{CombineOp, SliceMode};
    use crate::template::namespace::default_namespaces;
    use crate::ORIGINAL;

    fn line(n: usize) -> Dataset {
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y = x.iter().map(|v| 2.0 * v + 1.0).collect();
        Dataset::new("line", x, y).unwrap()
    }

    fn slice_then_fit() -> Template {
        Template::new("slice-fit")
            .with_step(
                Operation::Slice {
                    source: ORIGINAL.into(),
                    begin: 0.0.into(),
                    end: 10.0.into(),
                    mode: SliceMode::ByIndex,
                },
                "step1",
            )
            .with_step(
                Operation::Fit {
                    source: "step1".into(),
                    degree: 1,
                },
                "step2",
            )
    }

    #[test]
    fn replay_yields_named_results_in_order() {
        let bound = slice_then_fit()
            .bind(default_namespaces(), [(ORIGINAL, line(20))])
            .unwrap();
        assert_eq!(bound.step_count(), 2);

        let mut replay = bound.replay();
        let (first, name) = replay.next().unwrap().unwrap();
        assert_eq!(name, "step1");
        assert_eq!(first.as_dataset().unwrap().len(), 10);
        assert_eq!(first.as_dataset().unwrap().title(), "step1");
        assert_eq!(replay.completed(), 1);

        let (_, name) = replay.next().unwrap().unwrap();
        assert_eq!(name, "step2");
        assert_eq!(replay.state(), ReplayState::Complete);
        assert!(replay.next().is_none());
    }

    #[test]
    fn replaying_twice_is_bit_identical() {
        let bound = slice_then_fit()
            .bind(default_namespaces(), [(ORIGINAL, line(20))])
            .unwrap();
        let run = || -> Vec<(Value, String)> { bound.replay().map(Result::unwrap).collect() };
        let first = run();
        let second = run();
        assert_eq!(first.len(), 2);
        for ((a, na), (b, nb)) in first.iter().zip(&second) {
            assert_eq!(na, nb);
            let (a, b) = (a.as_dataset().unwrap(), b.as_dataset().unwrap());
            let bits = |d: &Dataset| d.y().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
            assert_eq!(bits(a), bits(b));
            assert_eq!(a.x(), b.x());
        }
    }

    #[test]
    fn failure_stops_replay_and_keeps_earlier_bindings() {
        let mut template = Template::new("partial");
        template
            .push(slice_then_fit().steps()[0].operation.clone(), "step1")
            .push(
                Operation::Fit {
                    source: "missing".into(),
                    degree: 1,
                },
                "step2",
            )
            .push(
                Operation::Fit {
                    source: "step1".into(),
                    degree: 1,
                },
                "step3",
            );
        let bound = template
            .bind(default_namespaces(), [(ORIGINAL, line(20))])
            .unwrap();

        let mut replay = bound.replay();
        assert!(replay.next().unwrap().is_ok());
        let err = replay.next().unwrap().unwrap_err();
        assert_eq!(err.completed_steps(), 1);
        assert_eq!(
            err,
            ChainError::Step {
                index: 1,
                result: "step2".into(),
                source: EvalError::UnboundVariable("missing".into()),
            }
        );
        assert_eq!(replay.state(), ReplayState::Failed);
        assert!(replay.next().is_none());
        assert!(replay.variable("step1").is_some());
        assert!(replay.variable("step3").is_none());
        assert_eq!(replay.total(), 3);
        assert_eq!(bound.step_count(), 3);
    }

    #[test]
    fn binding_needs_a_seed() {
        let seeds: Vec<(String, Value)> = Vec::new();
        let err = slice_then_fit().bind(default_namespaces(), seeds).unwrap_err();
        assert_eq!(err, ChainError::NoSeeds);
    }

    #[test]
    fn scalar_results_feed_later_steps() {
        let template = Template::new("scalars")
            .with_step(
                Operation::Call {
                    function: "dataset.len".into(),
                    args: vec![ORIGINAL.into()],
                },
                "n",
            )
            .with_step(
                Operation::Call {
                    function: "scale".into(),
                    args: vec!["n".into(), 0.5.into()],
                },
                "half",
            )
            .with_step(
                Operation::Slice {
                    source: ORIGINAL.into(),
                    begin: "half".into(),
                    end: "n".into(),
                    mode: SliceMode::ByIndex,
                },
                "back_half",
            );
        let bound = template
            .bind(default_namespaces(), [(ORIGINAL, line(8))])
            .unwrap();
        let results: Vec<_> = bound.replay().collect::<Result<_, _>>().unwrap();
        assert_eq!(results[0].0, Value::Scalar(8.0));
        assert_eq!(results[1].0, Value::Scalar(4.0));
        assert_eq!(results[2].0.as_dataset().unwrap().x(), &[4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn type_mismatch_is_reported() {
        let template = Template::new("bad").with_step(
            Operation::Fit {
                source: "k".into(),
                degree: 1,
            },
            "f",
        );
        let bound = template.bind(default_namespaces(), [("k", 3.0)]).unwrap();
        let err = bound.replay().next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            ChainError::Step {
                source: EvalError::TypeMismatch { expected: "dataset", .. },
                ..
            }
        ));
    }

    #[test]
    fn calls_need_bound_namespaces() {
        let template = Template::new("calls").with_step(
            Operation::Call {
                function: "sqrt".into(),
                args: vec![ORIGINAL.into()],
            },
            "root",
        );
        let bound = template.bind(Vec::new(), [(ORIGINAL, line(4))]).unwrap();
        let err = bound.replay().next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            ChainError::Step {
                source: EvalError::UnknownFunction(_),
                ..
            }
        ));
    }

    #[test]
    fn strict_mode_rejects_non_finite_results() {
        let zeros = Dataset::new("zeros", line(4).x().to_vec(), vec![0.0; 4]).unwrap();
        let template = Template::new("divide").with_step(
            Operation::Combine {
                left: ORIGINAL.into(),
                right: "zeros".into(),
                op: CombineOp::Divide,
            },
            "ratio",
        );
        let mut bound = template
            .bind(default_namespaces(), [(ORIGINAL, line(4))])
            .unwrap();
        bound.add_variable("zeros", zeros);

        // lenient: infinities flow through as data
        let lenient: Vec<_> = bound.replay().collect();
        assert!(lenient[0].is_ok());

        let bound = bound.with_strict(true);
        let err = bound.replay().next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            ChainError::Step {
                source: EvalError::NonFinite(ref name),
                ..
            } if name == "ratio"
        ));
    }

    #[test]
    fn empty_template_is_complete_immediately() {
        let bound = Template::new("empty")
            .bind(default_namespaces(), [(ORIGINAL, line(2))])
            .unwrap();
        let mut replay = bound.replay();
        assert_eq!(replay.state(), ReplayState::Complete);
        assert!(replay.next().is_none());
    }
}
