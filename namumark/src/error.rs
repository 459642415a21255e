use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deadline::Deadline;

/// Errors that abort a parse. Malformed markup never does; it degrades to
/// text instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
  #[error("Parse exceeded its time budget of {0:?}")]
  Timeout(Duration),

  #[error("Parse was cancelled")]
  Cancelled,
}

impl ParseError {
  /// The error for work stopped by `deadline`.
  pub(crate) fn stopped_by(deadline: &Deadline) -> Self {
    if deadline.is_cancelled() {
      Self::Cancelled
    } else {
      log::warn!("parse deadline of {:?} exceeded", deadline.budget());
      Self::Timeout(deadline.budget())
    }
  }
}

/// Errors that abort a render and surface as an [`ErrorCode`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
  #[error("Rendered output exceeded {limit} bytes")]
  TooLong { limit: usize },

  #[error("Render exceeded its time budget of {0:?}")]
  Timeout(Duration),

  #[error("Render was cancelled")]
  Cancelled,

  #[error("Transcluded document failed to parse: {0}")]
  Parse(#[from] ParseError),
}

impl RenderError {
  /// Structured code reported to callers.
  #[must_use]
  pub const fn code(&self) -> ErrorCode {
    match self {
      Self::TooLong { .. } => ErrorCode::RenderTooLong,
      Self::Timeout(_) | Self::Cancelled | Self::Parse(_) => {
        ErrorCode::RenderTimeout
      },
    }
  }
}

/// Failures inside the expression sandbox. These never leave the renderer:
/// every one of them makes a condition false.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SandboxError {
  #[error("Expression rejected: {0}")]
  Rejected(String),

  #[error("Syntax error at offset {offset}: {message}")]
  Syntax { offset: usize, message: String },

  #[error("Expression exceeded its time budget")]
  Timeout,

  #[error("Expression exceeded {0} evaluation steps")]
  StepLimit(usize),

  #[error("Expression nests deeper than {0} levels")]
  TooDeep(usize),

  #[error("Unknown identifier: {0}")]
  UnknownIdentifier(String),

  #[error("Type error: {0}")]
  Type(String),
}

/// Top-level error type for the crate.
#[derive(Debug, Error)]
pub enum Error {
  #[error("Parse error: {0}")]
  Parse(#[from] ParseError),

  #[error("Render error: {0}")]
  Render(#[from] RenderError),

  #[error("Worker pool error: {0}")]
  Pool(String),
}

/// Error codes carried by render results.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
  #[default]
  None,
  RenderTooLong,
  RenderTimeout,
  RenderFailed,
  ParseTimeout,
  ParseFailed,
}

impl ErrorCode {
  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::None => "none",
      Self::RenderTooLong => "render_too_long",
      Self::RenderTimeout => "render_timeout",
      Self::RenderFailed => "render_failed",
      Self::ParseTimeout => "parse_timeout",
      Self::ParseFailed => "parse_failed",
    }
  }

  #[must_use]
  pub const fn is_error(self) -> bool {
    !matches!(self, Self::None)
  }
}

impl From<&ParseError> for ErrorCode {
  fn from(_: &ParseError) -> Self {
    Self::ParseTimeout
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]

  use super::*;

  #[test]
  fn test_error_codes_serialize_snake_case() {
    let json = serde_json::to_string(&ErrorCode::RenderTooLong).unwrap();
    assert_eq!(json, "\"render_too_long\"");
    assert_eq!(ErrorCode::ParseFailed.as_str(), "parse_failed");
  }

  #[test]
  fn test_render_error_codes() {
    assert_eq!(
      RenderError::TooLong { limit: 10 }.code(),
      ErrorCode::RenderTooLong
    );
    assert_eq!(RenderError::Cancelled.code(), ErrorCode::RenderTimeout);
    assert!(!ErrorCode::None.is_error());
  }
}
