//! Wall-clock budgets shared by the parser, the renderer and the sandbox.
use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::{Duration, Instant},
};

/// A point in time after which work must stop, plus an optional external
/// cancellation flag raised by the worker pool.
#[derive(Debug, Clone)]
pub struct Deadline {
  expires: Option<Instant>,
  budget:  Duration,
  cancel:  Option<Arc<AtomicBool>>,
}

impl Deadline {
  /// A deadline `budget` from now.
  #[must_use]
  pub fn after(budget: Duration) -> Self {
    Self {
      expires: Instant::now().checked_add(budget),
      budget,
      cancel: None,
    }
  }

  /// A deadline that never expires.
  #[must_use]
  pub const fn unbounded() -> Self {
    Self {
      expires: None,
      budget:  Duration::MAX,
      cancel:  None,
    }
  }

  /// Also stop once `flag` is raised.
  #[must_use]
  pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
    self.cancel = Some(flag);
    self
  }

  #[must_use]
  pub const fn budget(&self) -> Duration {
    self.budget
  }

  #[must_use]
  pub fn is_cancelled(&self) -> bool {
    self
      .cancel
      .as_ref()
      .is_some_and(|flag| flag.load(Ordering::Relaxed))
  }

  #[must_use]
  pub fn is_expired(&self) -> bool {
    self.expires.is_some_and(|at| Instant::now() >= at)
  }

  /// The earlier of this deadline and another budget from now.
  #[must_use]
  pub fn capped(&self, budget: Duration) -> Self {
    let other = Instant::now().checked_add(budget);
    let expires = match (self.expires, other) {
      (Some(a), Some(b)) => Some(a.min(b)),
      (a, b) => a.or(b),
    };
    Self {
      expires,
      budget: self.budget.min(budget),
      cancel: self.cancel.clone(),
    }
  }
}

impl Default for Deadline {
  fn default() -> Self {
    Self::unbounded()
  }
}
