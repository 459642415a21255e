//! Type definitions for the markup processor.
//!
//! Contains the configuration (`MarkupOptions` and its parts), the
//! per-call `RenderRequest` and the processor struct itself.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use namumark::{MarkupOptionsBuilder, MarkupProcessor};
//!
//! let options = MarkupOptionsBuilder::new()
//!   .max_depth(16)
//!   .render_timeout(Duration::from_secs(2))
//!   .document_prefix("/wiki/")
//!   .build();
//!
//! let processor = MarkupProcessor::new(options);
//! ```
use std::{sync::Arc, time::Duration};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
  document::{DocumentRef, NamespaceConfig},
  error::ErrorCode,
  lookup::{DocumentLookup, EmptyLookup},
  parser::DEFAULT_MAX_DEPTH,
  render::macros::MacroRegistry,
  sandbox,
};

/// Resource caps applied to every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
  /// Shared nesting budget of inline, block and transclusion nesting.
  pub max_depth:       usize,
  /// Upper bound of rendered HTML, in bytes.
  pub max_output_len:  usize,
  pub parse_timeout:   Duration,
  pub render_timeout:  Duration,
  /// Budget of one `#!if` condition or placeholder expression.
  pub sandbox_timeout: Duration,
  /// Invocations of one macro per render before it renders literally.
  pub max_macro_calls: usize,
}

impl Default for Limits {
  fn default() -> Self {
    Self {
      max_depth:       DEFAULT_MAX_DEPTH,
      max_output_len:  2 * 1024 * 1024,
      parse_timeout:   Duration::from_secs(5),
      render_timeout:  Duration::from_secs(10),
      sandbox_timeout: sandbox::DEFAULT_TIMEOUT,
      max_macro_calls: 2048,
    }
  }
}

/// User-facing texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
  pub render_too_long: String,
  pub render_timeout:  String,
  pub render_failed:   String,
  pub parse_timeout:   String,
  pub parse_failed:    String,
  /// Summary of a `#!folding` block written without one.
  pub folding:         String,
  pub toc_title:       String,
}

impl Default for Messages {
  fn default() -> Self {
    Self {
      render_too_long: "문서 렌더링 결과가 너무 깁니다.".to_string(),
      render_timeout:  "문서 렌더링 시간이 초과되었습니다.".to_string(),
      render_failed:   "문서를 렌더링하는 중 오류가 발생했습니다.".to_string(),
      parse_timeout:   "문서 파싱 시간이 초과되었습니다.".to_string(),
      parse_failed:    "문서를 파싱하는 중 오류가 발생했습니다.".to_string(),
      folding:         "[ 펼치기 · 접기 ]".to_string(),
      toc_title:       "목차".to_string(),
    }
  }
}

impl Messages {
  /// The message shown for an error code. `None` has no message.
  #[must_use]
  pub fn for_code(&self, code: ErrorCode) -> Option<&str> {
    let message = match code {
      ErrorCode::None => return None,
      ErrorCode::RenderTooLong => &self.render_too_long,
      ErrorCode::RenderTimeout => &self.render_timeout,
      ErrorCode::RenderFailed => &self.render_failed,
      ErrorCode::ParseTimeout => &self.parse_timeout,
      ErrorCode::ParseFailed => &self.parse_failed,
    };
    Some(message)
  }
}

/// URL layout of generated links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkOptions {
  /// Prefix of document URLs; the encoded title follows.
  pub document_prefix: String,
  /// Prefix of file URLs; the storage key follows.
  pub file_prefix:     String,
}

impl Default for LinkOptions {
  fn default() -> Self {
    Self {
      document_prefix: "/w/".to_string(),
      file_prefix:     "/file/".to_string(),
    }
  }
}

/// Options for configuring the markup processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupOptions {
  pub limits:     Limits,
  pub namespaces: NamespaceConfig,
  pub links:      LinkOptions,
  pub messages:   Messages,
}

/// Builder for constructing `MarkupOptions` with method chaining.
#[derive(Debug, Clone, Default)]
pub struct MarkupOptionsBuilder {
  options: MarkupOptions,
}

impl MarkupOptionsBuilder {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn limits(mut self, limits: Limits) -> Self {
    self.options.limits = limits;
    self
  }

  #[must_use]
  pub const fn max_depth(mut self, depth: usize) -> Self {
    self.options.limits.max_depth = depth;
    self
  }

  #[must_use]
  pub const fn max_output_len(mut self, len: usize) -> Self {
    self.options.limits.max_output_len = len;
    self
  }

  #[must_use]
  pub const fn parse_timeout(mut self, timeout: Duration) -> Self {
    self.options.limits.parse_timeout = timeout;
    self
  }

  #[must_use]
  pub const fn render_timeout(mut self, timeout: Duration) -> Self {
    self.options.limits.render_timeout = timeout;
    self
  }

  #[must_use]
  pub const fn sandbox_timeout(mut self, timeout: Duration) -> Self {
    self.options.limits.sandbox_timeout = timeout;
    self
  }

  #[must_use]
  pub const fn max_macro_calls(mut self, calls: usize) -> Self {
    self.options.limits.max_macro_calls = calls;
    self
  }

  #[must_use]
  pub fn namespaces(mut self, namespaces: NamespaceConfig) -> Self {
    self.options.namespaces = namespaces;
    self
  }

  #[must_use]
  pub fn document_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
    self.options.links.document_prefix = prefix.into();
    self
  }

  #[must_use]
  pub fn file_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
    self.options.links.file_prefix = prefix.into();
    self
  }

  #[must_use]
  pub fn messages(mut self, messages: Messages) -> Self {
    self.options.messages = messages;
    self
  }

  /// Build the final `MarkupOptions`.
  #[must_use]
  pub fn build(self) -> MarkupOptions {
    self.options
  }
}

/// Everything one render call needs besides the text.
#[derive(Clone)]
pub struct RenderRequest {
  /// The document being rendered. Self links and relative links resolve
  /// against it.
  pub document:           DocumentRef,
  pub lookup:             Arc<dyn DocumentLookup>,
  /// Parameters when rendering a template directly: placeholders are
  /// substituted and `#!if` conditions see them.
  pub include_parameters: Option<IndexMap<String, String>>,
  /// Replaces the processor's limits for this call.
  pub limits:             Option<Limits>,
  pub thread:             bool,
  pub comment_source:     bool,
  /// Clock used by date macros. Defaults to the system clock.
  pub now:                Option<jiff::Zoned>,
}

impl std::fmt::Debug for RenderRequest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RenderRequest")
      .field("document", &self.document)
      .field("include_parameters", &self.include_parameters)
      .field("limits", &self.limits)
      .field("thread", &self.thread)
      .field("comment_source", &self.comment_source)
      .field("now", &self.now)
      .finish_non_exhaustive()
  }
}

impl RenderRequest {
  #[must_use]
  pub fn new(document: DocumentRef, lookup: Arc<dyn DocumentLookup>) -> Self {
    Self {
      document,
      lookup,
      include_parameters: None,
      limits: None,
      thread: false,
      comment_source: false,
      now: None,
    }
  }

  /// A request for `title` in the default namespace with no stored
  /// documents.
  #[must_use]
  pub fn standalone(title: &str) -> Self {
    let document = DocumentRef::new(NamespaceConfig::default().default, title);
    Self::new(document, Arc::new(EmptyLookup))
  }

  #[must_use]
  pub fn with_parameters(mut self, params: IndexMap<String, String>) -> Self {
    self.include_parameters = Some(params);
    self
  }

  #[must_use]
  pub fn with_limits(mut self, limits: Limits) -> Self {
    self.limits = Some(limits);
    self
  }

  #[must_use]
  pub const fn thread(mut self, thread: bool) -> Self {
    self.thread = thread;
    self
  }

  #[must_use]
  pub const fn comment_source(mut self, comment_source: bool) -> Self {
    self.comment_source = comment_source;
    self
  }

  #[must_use]
  pub fn with_now(mut self, now: jiff::Zoned) -> Self {
    self.now = Some(now);
    self
  }
}

/// Main markup processor.
///
/// Can be cheaply cloned since the macro registry is shared through an
/// `Arc`. Holds no per-call state, so one processor serves any number of
/// threads.
#[derive(Clone)]
pub struct MarkupProcessor {
  pub(crate) options:  MarkupOptions,
  pub(crate) registry: Arc<MacroRegistry>,
}

impl std::fmt::Debug for MarkupProcessor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MarkupProcessor")
      .field("options", &self.options)
      .field("macros", &self.registry.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builder() {
    let options = MarkupOptionsBuilder::new()
      .max_depth(4)
      .max_output_len(100)
      .document_prefix("/wiki/")
      .build();
    assert_eq!(options.limits.max_depth, 4);
    assert_eq!(options.limits.max_output_len, 100);
    assert_eq!(options.links.document_prefix, "/wiki/");
    assert_eq!(options.links.file_prefix, "/file/");
  }

  #[test]
  fn test_messages_per_code() {
    let messages = Messages::default();
    assert!(messages.for_code(ErrorCode::None).is_none());
    assert_eq!(
      messages.for_code(ErrorCode::RenderTooLong),
      Some(messages.render_too_long.as_str())
    );
  }
}
