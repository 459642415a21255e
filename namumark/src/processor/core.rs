//! Core implementation of the markup processor.
use std::sync::{Arc, atomic::AtomicBool};

use super::types::{Limits, MarkupOptions, MarkupProcessor, RenderRequest};
use crate::{
  deadline::Deadline,
  error::{ErrorCode, ParseError, RenderError},
  parser::{ParseOptions, ParseOutput, Parser},
  render::{MacroRegistry, RenderContext, placeholder},
  sandbox::Sandbox,
  types::{RenderResult, RenderedHeading},
};

impl MarkupProcessor {
  /// Create a new processor with the built-in macros.
  #[must_use]
  pub fn new(options: MarkupOptions) -> Self {
    Self {
      options,
      registry: MacroRegistry::builtins(),
    }
  }

  /// Use a custom macro registry.
  #[must_use]
  pub fn with_registry(mut self, registry: Arc<MacroRegistry>) -> Self {
    self.registry = registry;
    self
  }

  #[must_use]
  pub const fn options(&self) -> &MarkupOptions {
    &self.options
  }

  #[must_use]
  pub fn registry(&self) -> &MacroRegistry {
    &self.registry
  }

  /// Limits in effect for `request`.
  #[must_use]
  pub fn limits<'r>(&'r self, request: &'r RenderRequest) -> &'r Limits {
    request.limits.as_ref().unwrap_or(&self.options.limits)
  }

  fn parse_options(&self, request: &RenderRequest) -> ParseOptions {
    ParseOptions {
      comment_source: request.comment_source,
      thread: request.thread,
      max_depth: self.limits(request).max_depth,
      ..ParseOptions::default()
    }
  }

  fn sandbox(&self, request: &RenderRequest, cancel: Option<&Arc<AtomicBool>>) -> Sandbox {
    let sandbox = Sandbox::new(self.limits(request).sandbox_timeout);
    match cancel {
      Some(flag) => sandbox.with_cancel(Arc::clone(flag)),
      None => sandbox,
    }
  }

  fn deadline(budget: std::time::Duration, cancel: Option<&Arc<AtomicBool>>) -> Deadline {
    let deadline = Deadline::after(budget);
    match cancel {
      Some(flag) => deadline.with_cancel(Arc::clone(flag)),
      None => deadline,
    }
  }

  /// Parse `text` for `request` within the parse budget.
  ///
  /// Parameters of the request (if any) are substituted before parsing.
  ///
  /// # Errors
  ///
  /// Returns a [`ParseError`] when the budget runs out or the call is
  /// cancelled.
  pub fn parse(&self, text: &str, request: &RenderRequest) -> Result<ParseOutput, ParseError> {
    self.parse_cancellable(text, request, None)
  }

  pub(crate) fn parse_cancellable(
    &self,
    text: &str,
    request: &RenderRequest,
    cancel: Option<&Arc<AtomicBool>>,
  ) -> Result<ParseOutput, ParseError> {
    let limits = self.limits(request);
    let deadline = Self::deadline(limits.parse_timeout, cancel);
    let mut parser = Parser::new(self.parse_options(request), &self.options.namespaces);
    match &request.include_parameters {
      Some(params) => {
        let text = placeholder::substitute(text, params, &self.sandbox(request, cancel));
        parser.parse_document(&text, deadline)
      },
      None => parser.parse_document(text, deadline),
    }
  }

  /// Render an already parsed document. Failures become an error result.
  #[must_use]
  pub fn render(&self, parsed: &ParseOutput, request: &RenderRequest) -> RenderResult {
    self.render_cancellable(parsed, request, None)
  }

  pub(crate) fn render_cancellable(
    &self,
    parsed: &ParseOutput,
    request: &RenderRequest,
    cancel: Option<&Arc<AtomicBool>>,
  ) -> RenderResult {
    match self.try_render(parsed, request, cancel) {
      Ok(result) => result,
      Err(e) => {
        log::warn!("rendering {} failed: {e}", request.document);
        self.failure(e.code())
      },
    }
  }

  /// Render within the render budget.
  ///
  /// # Errors
  ///
  /// Returns a [`RenderError`] when a limit is hit.
  pub fn try_render(
    &self,
    parsed: &ParseOutput,
    request: &RenderRequest,
    cancel: Option<&Arc<AtomicBool>>,
  ) -> Result<RenderResult, RenderError> {
    let limits = self.limits(request);
    let deadline = Self::deadline(limits.render_timeout, cancel);
    let output = RenderContext::new(
      &request.document,
      request.lookup.as_ref(),
      &self.registry,
      &self.options,
      limits,
      deadline,
    )
    .with_sandbox(self.sandbox(request, cancel))
    .with_now(request.now.clone())
    .with_thread(request.thread)
    .with_params(request.include_parameters.clone())
    .render_document(parsed)?;

    let headings = parsed
      .metadata
      .headings
      .iter()
      .map(|heading| {
        RenderedHeading {
          line:      heading.line,
          level:     heading.level,
          section:   heading.section,
          numbering: heading.numbering.clone(),
          anchor:    format!("s-{}", heading.numbering),
          title:     heading.link_text.trim().to_string(),
        }
      })
      .collect();

    Ok(RenderResult {
      html: output.html,
      links: output.links,
      files: output.files,
      categories: output.categories,
      headings,
      embed: output.embed,
      redirect: parsed.metadata.redirect.clone(),
      ..RenderResult::default()
    })
  }

  /// Parse and render `text`. Every failure is reported in the result.
  #[must_use]
  pub fn process(&self, text: &str, request: &RenderRequest) -> RenderResult {
    self.process_cancellable(text, request, None)
  }

  pub(crate) fn process_cancellable(
    &self,
    text: &str,
    request: &RenderRequest,
    cancel: Option<&Arc<AtomicBool>>,
  ) -> RenderResult {
    match self.parse_cancellable(text, request, cancel) {
      Ok(parsed) => self.render_cancellable(&parsed, request, cancel),
      Err(e) => {
        log::warn!("parsing {} failed: {e}", request.document);
        self.failure(ErrorCode::from(&e))
      },
    }
  }

  /// The error result for `code`, with the configured message.
  #[must_use]
  pub fn failure(&self, code: ErrorCode) -> RenderResult {
    RenderResult::failed(code, self.options.messages.for_code(code))
  }
}
