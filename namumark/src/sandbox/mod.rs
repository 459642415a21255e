//! Sandboxed evaluation of `#!if` conditions and placeholder expressions.
//!
//! The language is a small, side-effect free expression subset: literals,
//! variables bound to include parameters, arithmetic, comparison, logic,
//! the ternary operator and a fixed set of read-only string and array
//! methods. Anything else is rejected before evaluation, and evaluation is
//! bounded by a step counter and a wall-clock budget.
use std::{
  sync::{Arc, atomic::AtomicBool},
  time::Duration,
};

use indexmap::IndexMap;

use crate::{deadline::Deadline, error::SandboxError};

pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::Value;

/// Default wall-clock budget per expression.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(50);

const DEFAULT_MAX_STEPS: usize = 10_000;
const MAX_NESTING: usize = 64;
const MAX_LEXEMES: usize = 1024;

/// One sandbox per render call.
#[derive(Debug, Clone)]
pub struct Sandbox {
  timeout:   Duration,
  max_steps: usize,
  cancel:    Option<Arc<AtomicBool>>,
}

impl Default for Sandbox {
  fn default() -> Self {
    Self::new(DEFAULT_TIMEOUT)
  }
}

impl Sandbox {
  #[must_use]
  pub const fn new(timeout: Duration) -> Self {
    Self {
      timeout,
      max_steps: DEFAULT_MAX_STEPS,
      cancel: None,
    }
  }

  #[must_use]
  pub const fn with_max_steps(mut self, max_steps: usize) -> Self {
    self.max_steps = max_steps;
    self
  }

  /// Abort evaluation once `flag` is raised.
  #[must_use]
  pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
    self.cancel = Some(flag);
    self
  }

  /// Evaluate `source` with `vars` bound as string variables.
  ///
  /// # Errors
  ///
  /// Returns a [`SandboxError`] when the expression is rejected, malformed,
  /// refers to unknown names or exhausts its budget.
  pub fn evaluate(
    &self,
    source: &str,
    vars: &IndexMap<String, String>,
  ) -> Result<Value, SandboxError> {
    let lexemes = lexer::tokenize(source)?;
    if lexemes.len() > MAX_LEXEMES {
      return Err(SandboxError::Rejected(format!(
        "expression longer than {MAX_LEXEMES} tokens"
      )));
    }
    let expr = parser::ExprParser::new(&lexemes, source.len(), MAX_NESTING).parse()?;
    let mut deadline = Deadline::after(self.timeout);
    if let Some(flag) = &self.cancel {
      deadline = deadline.with_cancel(Arc::clone(flag));
    }
    let value = eval::Evaluator::new(vars, &deadline, self.max_steps).eval(&expr)?;
    if deadline.is_expired() || deadline.is_cancelled() {
      return Err(SandboxError::Timeout);
    }
    Ok(value)
  }

  /// Truthiness of a condition. Every failure counts as false.
  #[must_use]
  pub fn condition(&self, source: &str, vars: &IndexMap<String, String>) -> bool {
    match self.evaluate(source, vars) {
      Ok(value) => value.is_truthy(),
      Err(e) => {
        log::warn!("condition {source:?} evaluated as false: {e}");
        false
      },
    }
  }

  /// String value of an expression, or `None` if it fails or is
  /// `undefined`/`null`.
  #[must_use]
  pub fn lookup(&self, source: &str, vars: &IndexMap<String, String>) -> Option<String> {
    match self.evaluate(source, vars) {
      Ok(Value::Undefined | Value::Null) => None,
      Ok(value) => Some(value.to_string()),
      Err(e) => {
        log::debug!("placeholder expression {source:?} failed: {e}");
        None
      },
    }
  }
}
