use super::namespace::{default_namespaces, Namespace};
use super::replay::{run_step, Environment};
use super::step::{Operation, Step, Template};
use crate::data::model::{Dataset, Value};
use crate::error::EvalError;
use crate::ORIGINAL;

/// Interactive template composition.
///
/// Every operation is applied to the live bindings straight away so the
/// caller can look at the result; only operations that succeed are
/// recorded. The recorded template replays the same chain on new data.
pub struct Session {
    template: Template,
    variables: Environment,
    namespaces: Vec<Box<dyn Namespace>>,
    strict: bool,
}

impl Session {
    pub fn new(name: impl Into<String>, namespaces: Vec<Box<dyn Namespace>>) -> Self {
        Self {
            template: Template::new(name),
            variables: Environment::new(),
            namespaces,
            strict: false,
        }
    }

    /// Session over `original` bound as [`ORIGINAL`], with the default namespaces.
    pub fn with_original(name: impl Into<String>, original: Dataset) -> Self {
        let mut session = Self::new(name, default_namespaces());
        session.seed(ORIGINAL, original);
        session
    }

    /// Bind an input variable. Seeds are not recorded as steps.
    pub fn seed(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Apply `operation`, bind its result under `result` and record it.
    ///
    /// On error nothing is bound or recorded.
    pub fn apply(&mut self, operation: Operation, result: impl Into<String>) -> Result<&Value, EvalError> {
        let step = Step::new(operation, result);
        let value = run_step(&step, &self.variables, &self.namespaces, self.strict)?;
        log::debug!("session '{}': {step}", self.template.name());
        let name = step.result.clone();
        self.template.push(step.operation, step.result);
        self.variables.insert(name.clone(), value);
        Ok(&self.variables[name.as_str()])
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> &Environment {
        &self.variables
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Stop composing and keep the recorded template.
    pub fn finish(self) -> Template {
        self.template
    }
}
