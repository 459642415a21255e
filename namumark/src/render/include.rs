//! Transclusion.
//!
//! An included document renders with its own table of contents, footnotes
//! and parameters: the including document's [`IncludeFrame`] is swapped out
//! for the duration and restored afterwards, also on error. Links, files
//! and categories accumulate across both.
use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;

use super::{FootnoteEntry, RenderContext, placeholder};
use crate::{
  document::{DocumentRef, resolve_relative},
  error::RenderError,
  lookup::Entry,
  parser::{HeadingInfo, ParseOptions, ParseOutput, Parser, ast::IncludeCall},
};

/// Render state that belongs to one document rather than the whole call.
#[derive(Debug, Clone, Default)]
pub struct IncludeFrame {
  pub(crate) toc:              Vec<HeadingInfo>,
  pub(crate) footnotes:        Vec<FootnoteEntry>,
  /// Footnote name to its index in `footnotes`.
  pub(crate) footnote_names:   HashMap<String, usize>,
  pub(crate) footnote_counter: usize,
  pub(crate) params:           Option<IndexMap<String, String>>,
  /// Prepended to heading anchors so an included document's sections do not
  /// collide with the host's. Empty for the host document.
  pub(crate) anchor_prefix:    String,
}

impl RenderContext<'_> {
  /// Render the document an `include` call points at.
  ///
  /// Missing targets, cycles and calls past the depth limit render nothing.
  ///
  /// # Errors
  ///
  /// Returns a [`RenderError`] when the included document fails to parse or
  /// its rendering hits a limit.
  pub fn render_include(&mut self, include: &IncludeCall) -> Result<String, RenderError> {
    let namespaces = &self.options().namespaces;
    let target = resolve_relative(&include.target, self.document(), namespaces);
    let target = DocumentRef::parse(&target, namespaces).document;
    if target == *self.document() || self.include_stack.contains(&target) {
      log::debug!("skipping include cycle through {target}");
      return Ok(String::new());
    }
    let depth = include.depth + 1;
    if depth >= self.limits().max_depth {
      log::warn!("include of {target} exceeds depth {}", self.limits().max_depth);
      return Ok(String::new());
    }
    let Some(Entry::Document(stored)) = self.lookup().lookup(&target) else {
      log::debug!("include target {target} not found");
      return Ok(String::new());
    };

    let parsed = match stored.parsed {
      Some(parsed) if !placeholder::has_placeholders(&stored.content) => {
        log::debug!("reusing cached parse of {target}");
        parsed
      },
      _ => {
        let text = placeholder::substitute(&stored.content, &include.params, self.sandbox());
        Arc::new(self.parse_included(&text, depth)?)
      },
    };

    self.includes_rendered += 1;
    let frame = IncludeFrame {
      toc: parsed.metadata.headings.clone(),
      params: Some(include.params.clone()),
      anchor_prefix: format!("include-{}-", self.includes_rendered),
      ..IncludeFrame::default()
    };
    let saved = std::mem::replace(&mut self.frame, frame);
    self.include_stack.push(target);
    let mut html = String::new();
    let result = self.render_included(&parsed, &mut html);
    self.include_stack.pop();
    self.frame = saved;
    result.map(|()| html)
  }

  fn parse_included(&self, text: &str, depth: usize) -> Result<ParseOutput, RenderError> {
    let options = ParseOptions {
      max_depth: self.limits().max_depth,
      ..ParseOptions::default()
    };
    let mut parser = Parser::new(options, &self.options().namespaces);
    Ok(parser.parse_document_at(text, self.deadline.clone(), depth)?)
  }

  fn render_included(&mut self, parsed: &ParseOutput, out: &mut String) -> Result<(), RenderError> {
    for category in &parsed.metadata.categories {
      self.record_category(category.clone());
    }
    self.put(out, "<div class=\"wiki-include\">")?;
    self.render_blocks(&parsed.ast, out)?;
    self.flush_footnotes(out)?;
    self.put(out, "</div>")
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]

  use crate::{
    deadline::Deadline,
    document::DocumentRef,
    lookup::MemoryLookup,
    parser::Parser,
    processor::types::MarkupOptions,
    render::{MacroRegistry, RenderContext, RenderOutput},
  };

  fn render(text: &str, lookup: &MemoryLookup) -> RenderOutput {
    let options = MarkupOptions::default();
    let parsed = Parser::new(Default::default(), &options.namespaces)
      .parse_document(text, Deadline::unbounded())
      .unwrap();
    let document = DocumentRef::new("문서", "Host");
    let registry = MacroRegistry::with_builtins();
    RenderContext::new(
      &document,
      lookup,
      &registry,
      &options,
      &options.limits,
      Deadline::unbounded(),
    )
    .render_document(&parsed)
    .unwrap()
  }

  #[test]
  fn test_included_headings_get_own_anchors() {
    let mut lookup = MemoryLookup::new();
    lookup.insert_document(DocumentRef::new("틀", "Part"), "[목차]\n= Part =\nbody");
    let out = render("= Host =\n[include(틀:Part)]\n[include(틀:Part)]", &lookup);
    assert_eq!(out.html.matches("id=\"s-1\"").count(), 1);
    assert!(out.html.contains("id=\"include-1-s-1\""));
    assert!(out.html.contains("id=\"include-2-s-1\""));
    assert!(out.html.contains("<a href=\"#include-1-s-1\">1</a>. Part"));
  }

  #[test]
  fn test_include_substitutes_parameters() {
    let mut lookup = MemoryLookup::new();
    lookup.insert_document(
      DocumentRef::new("틀", "Greeting"),
      "Hello @name=stranger@![* note]\n[[분류:Greeted]]",
    );
    let out = render("[include(틀:Greeting, name=위키)][* host]", &lookup);
    assert!(out.html.contains("<div class=\"wiki-include\">"));
    assert!(out.html.contains("Hello 위키!"));
    assert_eq!(out.categories.len(), 1);
    assert_eq!(out.categories[0].document, "분류:Greeted");
    // Both documents number their footnotes from 1.
    assert_eq!(out.html.matches("id=\"rfn-1\"").count(), 2);
  }

  #[test]
  fn test_include_cycles_are_skipped() {
    let mut lookup = MemoryLookup::new();
    lookup
      .insert_document(DocumentRef::new("틀", "A"), "a[include(틀:B)]")
      .insert_document(DocumentRef::new("틀", "B"), "b[include(틀:A)][include(Host)]");
    let out = render("[include(틀:A)]", &lookup);
    assert_eq!(out.html.matches("<div class=\"wiki-include\">").count(), 2);
  }

  #[test]
  fn test_missing_include_renders_nothing() {
    let out = render("x[include(틀:Nope)]y", &MemoryLookup::new());
    assert!(out.html.contains("xy"));
  }
}
