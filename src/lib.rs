//! Rusty Wiz: load numeric (x, y) series, transform them, and record the
//! transformations as templates that can be replayed on new data.
//!
//! The engine is synchronous and single-threaded. Every operator takes its
//! input by reference and returns a new [`Dataset`], so keeping the input
//! around for comparison is just a matter of not dropping it.

pub mod data;
pub mod error;
pub mod gallery;
pub mod settings;
pub mod template;

pub use data::fit::{fit, fit_polynomial, Polynomial};
pub use data::loader::{ingest, ingest_reader, IngestOptions};
pub use data::model::{Dataset, Value};
pub use data::transform::{combine, slice, CombineOp, SliceMode};
pub use error::{ChainError, EvalError, FunctionError, IngestError, OperatorError, TemplateError};
pub use gallery::Gallery;
pub use settings::Settings;
pub use template::namespace::{default_namespaces, Namespace};
pub use template::replay::{BoundTemplate, Replay, ReplayState};
pub use template::session::Session;
pub use template::step::{Operand, Operation, Step, Template};

/// Reserved seed name for the raw dataset a template is replayed against.
pub const ORIGINAL: &str = "ORIGINAL";
