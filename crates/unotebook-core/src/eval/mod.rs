//! Script evaluator boundary.
//!
//! The cell engine never talks to an embedded language directly; it drives
//! a [`ScriptEvaluator`], which owns the language-specific parsing, the
//! environment representation and the mapping of results to
//! [`Represent`](crate::render::Represent) values.
//!
//! # Module Structure
//!
//! - `rhai_engine` - Evaluator backed by the Rhai scripting language

mod rhai_engine;

pub use rhai_engine::{RhaiEnv, RhaiEvaluator, RhaiValue, RichValue};

use crate::error::Result;
use crate::render::Represent;

/// Outcome of trying to evaluate a line as an expression.
#[derive(Debug)]
pub enum Evaluated<V> {
    /// The line was an expression and produced this value.
    Value(V),
    /// The line does not parse as an expression; run it as a statement.
    NotAnExpression,
}

/// Executes script source against a persistent environment.
///
/// Output produced by scripts goes to the ambient
/// [`OutputStream`](crate::output::OutputStream) the evaluator was built
/// with. Failures leave whatever the script already changed in `env`.
pub trait ScriptEvaluator: Send + Sync {
    /// Mutable name-to-value environment of one notebook.
    type Env: Default + Send;

    /// Result of an expression.
    type Value: Represent;

    /// Run `source` as statements.
    fn run_statements(&self, env: &mut Self::Env, source: &str) -> Result<()>;

    /// Evaluate `source` as a single expression.
    fn evaluate_expression(
        &self,
        env: &mut Self::Env,
        source: &str,
    ) -> Result<Evaluated<Self::Value>>;
}
