//! HTML rendering of the syntax tree.
//!
//! A [`RenderContext`] is created per top-level render call and walks the
//! tree once. Every byte written goes through [`RenderContext::put`], which
//! enforces the output cap, and the deadline is polled every few nodes.
//! Failures propagate as [`RenderError`] and abort the whole render.
use std::{borrow::Cow, collections::HashMap, fmt::Write as _};

use indexmap::{IndexMap, IndexSet};
use jiff::Zoned;

use crate::{
  deadline::Deadline,
  document::DocumentRef,
  error::RenderError,
  lookup::DocumentLookup,
  parser::{
    Category,
    ParseOutput,
    ast::{CategoryMarker, Footnote, MacroCall, Node, flatten_text},
  },
  processor::types::{Limits, MarkupOptions},
  sandbox::Sandbox,
  types::Embed,
  utils::{
    collapse_whitespace,
    css::{ThemedColor, sanitize_style},
    encode_title,
    escape_html,
    truncate_chars,
  },
};

mod heading;
pub mod include;
pub mod link;
pub mod macros;
pub mod placeholder;
mod table;

pub use include::IncludeFrame;
pub use link::ImageOptions;
pub use macros::{Macro, MacroRegistry};

/// Leading characters of visible text kept for the embed preview.
const EMBED_TEXT_LEN: usize = 200;

/// Nodes rendered between two deadline checks.
const CHECK_INTERVAL: usize = 32;

/// What a successful render produces besides headings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
  pub html:       String,
  pub links:      Vec<String>,
  pub files:      Vec<String>,
  pub categories: Vec<Category>,
  pub embed:      Embed,
}

/// Inline `style` plus the dark-mode `data-dark-style` companion.
#[derive(Debug, Default)]
pub(crate) struct StyleAttr {
  light: Vec<String>,
  dark:  Vec<String>,
}

impl StyleAttr {
  pub(crate) fn push(&mut self, declaration: String) {
    self.light.push(declaration);
  }

  pub(crate) fn color(&mut self, property: &str, color: Option<&ThemedColor>) {
    let Some(color) = color else {
      return;
    };
    let (light, dark) = color.declarations(property);
    self.light.push(light);
    if let Some(dark) = dark {
      self.dark.push(dark);
    }
  }

  pub(crate) fn raw(&mut self, style: Option<&str>, dark_style: Option<&str>) {
    for (list, style) in [(&mut self.light, style), (&mut self.dark, dark_style)] {
      if let Some(style) = style {
        let clean = sanitize_style(style);
        if !clean.is_empty() {
          list.push(clean);
        }
      }
    }
  }

  /// The attributes, each with a leading space, or nothing.
  pub(crate) fn attrs(&self) -> String {
    let mut out = String::new();
    if !self.light.is_empty() {
      let _ = write!(out, " style=\"{}\"", escape_html(&self.light.join(";")));
    }
    if !self.dark.is_empty() {
      let _ = write!(
        out,
        " data-dark-style=\"{}\"",
        escape_html(&self.dark.join(";"))
      );
    }
    out
  }
}

/// One footnote waiting to be listed.
#[derive(Debug, Clone)]
pub(crate) struct FootnoteEntry {
  label: String,
  /// Numbers of every reference pointing here.
  refs:  Vec<usize>,
  title: String,
  html:  String,
}

/// Per-call render state.
pub struct RenderContext<'a> {
  document:          &'a DocumentRef,
  lookup:            &'a dyn DocumentLookup,
  registry:          &'a MacroRegistry,
  options:           &'a MarkupOptions,
  limits:            &'a Limits,
  deadline:          Deadline,
  sandbox:           Sandbox,
  now:               Option<Zoned>,
  thread:            bool,
  output_len:        usize,
  checks:            usize,
  links:             IndexSet<String>,
  files:             IndexSet<String>,
  categories:        IndexMap<String, Category>,
  embed_text:        String,
  embed_image:       Option<String>,
  macro_calls:       HashMap<&'static str, usize>,
  frame:             IncludeFrame,
  include_stack:     Vec<DocumentRef>,
  /// Include calls rendered so far, numbering their anchor prefixes.
  includes_rendered: usize,
}

impl std::fmt::Debug for RenderContext<'_> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RenderContext")
      .field("document", &self.document)
      .field("output_len", &self.output_len)
      .field("include_stack", &self.include_stack)
      .finish_non_exhaustive()
  }
}

impl<'a> RenderContext<'a> {
  #[must_use]
  pub fn new(
    document: &'a DocumentRef,
    lookup: &'a dyn DocumentLookup,
    registry: &'a MacroRegistry,
    options: &'a MarkupOptions,
    limits: &'a Limits,
    deadline: Deadline,
  ) -> Self {
    Self {
      document,
      lookup,
      registry,
      options,
      limits,
      deadline,
      sandbox: Sandbox::new(limits.sandbox_timeout),
      now: None,
      thread: false,
      output_len: 0,
      checks: 0,
      links: IndexSet::new(),
      files: IndexSet::new(),
      categories: IndexMap::new(),
      embed_text: String::new(),
      embed_image: None,
      macro_calls: HashMap::new(),
      frame: IncludeFrame::default(),
      include_stack: Vec::new(),
      includes_rendered: 0,
    }
  }

  #[must_use]
  pub fn with_sandbox(mut self, sandbox: Sandbox) -> Self {
    self.sandbox = sandbox;
    self
  }

  #[must_use]
  pub fn with_now(mut self, now: Option<Zoned>) -> Self {
    self.now = now;
    self
  }

  #[must_use]
  pub const fn with_thread(mut self, thread: bool) -> Self {
    self.thread = thread;
    self
  }

  /// Parameters visible to `#!if` conditions of the top-level document.
  #[must_use]
  pub fn with_params(mut self, params: Option<IndexMap<String, String>>) -> Self {
    self.frame.params = params;
    self
  }

  #[must_use]
  pub const fn document(&self) -> &'a DocumentRef {
    self.document
  }

  #[must_use]
  pub const fn lookup(&self) -> &'a dyn DocumentLookup {
    self.lookup
  }

  #[must_use]
  pub const fn options(&self) -> &'a MarkupOptions {
    self.options
  }

  #[must_use]
  pub const fn limits(&self) -> &'a Limits {
    self.limits
  }

  #[must_use]
  pub const fn sandbox(&self) -> &Sandbox {
    &self.sandbox
  }

  #[must_use]
  pub const fn is_thread(&self) -> bool {
    self.thread
  }

  /// The clock for date macros.
  #[must_use]
  pub fn now(&self) -> Zoned {
    self.now.clone().unwrap_or_else(Zoned::now)
  }

  /// How often `name` was invoked so far, this call included.
  #[must_use]
  pub fn macro_count(&self, name: &str) -> usize {
    self.macro_calls.get(name).copied().unwrap_or(0)
  }

  /// Render a whole document, flushing unlisted footnotes at the end.
  ///
  /// # Errors
  ///
  /// Returns a [`RenderError`] when the output cap or the deadline is hit,
  /// or a transcluded document fails to parse.
  pub fn render_document(mut self, parsed: &ParseOutput) -> Result<RenderOutput, RenderError> {
    self.frame.toc.clone_from(&parsed.metadata.headings);
    for category in &parsed.metadata.categories {
      self.record_category(category.clone());
    }
    let mut html = String::new();
    self.render_blocks(&parsed.ast, &mut html)?;
    self.flush_footnotes(&mut html)?;
    log::debug!(
      "rendered {} bytes, {} links, {} files",
      html.len(),
      self.links.len(),
      self.files.len()
    );
    let text = collapse_whitespace(&self.embed_text);
    Ok(RenderOutput {
      html,
      links: self.links.into_iter().collect(),
      files: self.files.into_iter().collect(),
      categories: self.categories.into_values().collect(),
      embed: Embed {
        text:  truncate_chars(&text, EMBED_TEXT_LEN).to_string(),
        image: self.embed_image,
      },
    })
  }

  /// Write `html`, charging it against the output cap.
  ///
  /// # Errors
  ///
  /// Returns [`RenderError::TooLong`] once the cap is exceeded.
  pub fn put(&mut self, out: &mut String, html: &str) -> Result<(), RenderError> {
    self.charge(html.len())?;
    out.push_str(html);
    Ok(())
  }

  fn charge(&mut self, len: usize) -> Result<(), RenderError> {
    self.output_len = self.output_len.saturating_add(len);
    if self.output_len > self.limits.max_output_len {
      log::debug!("output cap of {} bytes reached", self.limits.max_output_len);
      return Err(RenderError::TooLong {
        limit: self.limits.max_output_len,
      });
    }
    Ok(())
  }

  /// Escape and write text, feeding the embed preview.
  ///
  /// # Errors
  ///
  /// Returns [`RenderError::TooLong`] once the cap is exceeded.
  pub fn put_text(&mut self, out: &mut String, text: &str) -> Result<(), RenderError> {
    self.note_text(text);
    self.put(out, &escape_html(text))
  }

  fn note_text(&mut self, text: &str) {
    if self.include_stack.is_empty() && self.embed_text.len() < EMBED_TEXT_LEN * 4 {
      self.embed_text.push_str(text);
    }
  }

  fn tick(&mut self) -> Result<(), RenderError> {
    self.checks = self.checks.wrapping_add(1);
    if !self.checks.is_multiple_of(CHECK_INTERVAL) {
      return Ok(());
    }
    self.check_deadline()
  }

  /// Fail if the call was cancelled or ran out of time.
  ///
  /// # Errors
  ///
  /// Returns [`RenderError::Cancelled`] or [`RenderError::Timeout`].
  pub fn check_deadline(&self) -> Result<(), RenderError> {
    if self.deadline.is_cancelled() {
      return Err(RenderError::Cancelled);
    }
    if self.deadline.is_expired() {
      log::warn!("render deadline of {:?} exceeded", self.deadline.budget());
      return Err(RenderError::Timeout(self.deadline.budget()));
    }
    Ok(())
  }

  fn record_category(&mut self, category: Category) {
    self
      .categories
      .entry(category.document.clone())
      .or_insert(category);
  }

  pub(crate) fn record_link(&mut self, title: String) {
    self.links.insert(title);
  }

  pub(crate) fn record_file(&mut self, title: String) {
    self.files.insert(title);
  }

  pub(crate) fn note_image(&mut self, url: &str) {
    if self.embed_image.is_none() {
      self.embed_image = Some(url.to_string());
    }
  }

  /// Render a node list in order.
  ///
  /// # Errors
  ///
  /// Propagates the first [`RenderError`].
  pub fn render_nodes(&mut self, nodes: &[Node], out: &mut String) -> Result<(), RenderError> {
    for node in nodes {
      self.render_node(node, out)?;
    }
    Ok(())
  }

  fn wrap(
    &mut self,
    open: &str,
    children: &[Node],
    close: &str,
    out: &mut String,
  ) -> Result<(), RenderError> {
    self.put(out, open)?;
    self.render_nodes(children, out)?;
    self.put(out, close)
  }

  fn render_node(&mut self, node: &Node, out: &mut String) -> Result<(), RenderError> {
    self.tick()?;
    match node {
      Node::Paragraph { children } => {
        self.wrap("<div class=\"wiki-paragraph\">", children, "</div>", out)
      },
      Node::Heading(heading) => self.render_heading(heading, out),
      Node::HorizontalRule => self.put(out, "<hr>"),
      Node::Table(table) => self.render_table(table, out),
      Node::List {
        marker,
        start,
        items,
      } => {
        let (tag, kind) = marker.html();
        let mut open = format!("<{tag} class=\"wiki-list\"");
        if let Some(kind) = kind {
          let _ = write!(open, " type=\"{kind}\"");
        }
        if let Some(start) = start {
          let _ = write!(open, " start=\"{start}\"");
        }
        open.push('>');
        self.put(out, &open)?;
        for item in items {
          self.wrap("<li>", item, "</li>", out)?;
        }
        self.put(out, &format!("</{tag}>"))
      },
      Node::Indent { children } => {
        self.wrap("<div class=\"wiki-indent\">", children, "</div>", out)
      },
      Node::BlockQuote { children } => {
        self.wrap(
          "<blockquote class=\"wiki-quote\">",
          children,
          "</blockquote>",
          out,
        )
      },
      Node::Literal { text, block } => {
        let (open, close) = if *block {
          ("<pre class=\"wiki-pre\">", "</pre>")
        } else {
          ("<code>", "</code>")
        };
        self.put(out, open)?;
        self.put_text(out, text)?;
        self.put(out, close)
      },
      Node::Syntax { lang, code } => {
        self.put(
          out,
          &format!(
            "<pre class=\"wiki-code\"><code class=\"language-{}\">",
            escape_html(lang)
          ),
        )?;
        self.put(out, &escape_html(code))?;
        self.put(out, "</code></pre>")
      },
      Node::Html { html } => self.put(out, &sanitize_html(html)),
      Node::Wiki {
        style,
        dark_style,
        children,
      } => {
        let mut attr = StyleAttr::default();
        attr.raw(style.as_deref(), dark_style.as_deref());
        let open = format!("<div class=\"wiki-block\"{}>", attr.attrs());
        self.wrap(&open, children, "</div>", out)
      },
      Node::Folding { summary, children } => {
        let summary = if summary.trim().is_empty() {
          self.options.messages.folding.clone()
        } else {
          summary.clone()
        };
        let open = format!(
          "<details class=\"wiki-folding\"><summary>{}</summary><div \
           class=\"wiki-folding-content\">",
          escape_html(&summary)
        );
        self.wrap(&open, children, "</div></details>", out)
      },
      Node::Conditional { expr, children } => {
        let empty = IndexMap::new();
        let params = self.frame.params.as_ref().unwrap_or(&empty);
        if self.sandbox.condition(expr, params) {
          self.render_nodes(children, out)
        } else {
          Ok(())
        }
      },
      Node::Color { color, children } => {
        let mut attr = StyleAttr::default();
        attr.color("color", Some(color));
        let open = format!("<span class=\"wiki-color\"{}>", attr.attrs());
        self.wrap(&open, children, "</span>", out)
      },
      Node::Size { level, children } => {
        let class = if *level >= 0 {
          format!("size-up-{level}")
        } else {
          format!("size-down-{}", level.unsigned_abs())
        };
        let open = format!("<span class=\"wiki-size {class}\">");
        self.wrap(&open, children, "</span>", out)
      },
      Node::Styled { style, children } => {
        let tag = style.tag();
        self.wrap(&format!("<{tag}>"), children, &format!("</{tag}>"), out)
      },
      Node::Link(link) => self.render_link(link, out),
      Node::Category(CategoryMarker {
        document,
        text,
        blur,
      }) => {
        self.record_category(Category {
          document: document.clone(),
          text:     text.clone(),
          blur:     *blur,
        });
        Ok(())
      },
      Node::Footnote(footnote) => self.render_footnote(footnote, out),
      Node::Macro(call) => self.render_macro(call, out),
      Node::CommentNumber { number } => {
        self.put(
          out,
          &format!(
            "<a class=\"wiki-comment-number\" \
             href=\"#comment-{number}\">#{number}</a>"
          ),
        )
      },
      Node::Mention { user } => {
        let namespaces = &self.options.namespaces;
        let target = DocumentRef::new(namespaces.user.as_str(), user.as_str());
        let href = format!(
          "{}{}",
          self.options.links.document_prefix,
          encode_title(&target.full_title(namespaces))
        );
        self.put(
          out,
          &format!(
            "<a class=\"wiki-mention\" href=\"{}\">@{}</a>",
            escape_html(&href),
            escape_html(user)
          ),
        )
      },
      Node::Text { text } => self.put_text(out, text),
      Node::LineBreak => self.put(out, "<br>"),
    }
  }

  fn render_macro(&mut self, call: &MacroCall, out: &mut String) -> Result<(), RenderError> {
    let registry = self.registry;
    let Some(handler) = registry.get(&call.name) else {
      return self.put_text(out, &call.raw);
    };
    if self.thread && !handler.allowed_in_thread() {
      log::debug!("macro {} is not available in threads", handler.name());
      return self.put_text(out, &call.raw);
    }
    let count = self.macro_calls.entry(handler.name()).or_insert(0);
    *count += 1;
    if *count > self.limits.max_macro_calls {
      log::warn!(
        "macro {} called more than {} times, rendering literally",
        handler.name(),
        self.limits.max_macro_calls
      );
      return self.put_text(out, &call.raw);
    }
    let before = self.output_len;
    let html = handler.format(call.raw_args.as_deref(), self, call)?;
    let charged = self.output_len.saturating_sub(before);
    self.charge(html.len().saturating_sub(charged))?;
    out.push_str(&html);
    Ok(())
  }

  fn render_footnote(&mut self, footnote: &Footnote, out: &mut String) -> Result<(), RenderError> {
    self.frame.footnote_counter += 1;
    let number = self.frame.footnote_counter;
    let reused = footnote
      .name
      .as_ref()
      .filter(|_| footnote.reuse)
      .and_then(|name| self.frame.footnote_names.get(name))
      .copied();
    let index = if let Some(index) = reused {
      index
    } else {
      // Bodies are charged when the list is flushed.
      let before = self.output_len;
      let mut body = String::new();
      self.render_nodes(&footnote.children, &mut body)?;
      self.output_len = before;
      let mut title = String::new();
      flatten_text(&footnote.children, true, &mut title);
      let label = footnote
        .name
        .clone()
        .unwrap_or_else(|| number.to_string());
      self.frame.footnotes.push(FootnoteEntry {
        label,
        refs: Vec::new(),
        title: collapse_whitespace(&title),
        html: body,
      });
      let index = self.frame.footnotes.len() - 1;
      if let Some(name) = &footnote.name {
        self.frame.footnote_names.insert(name.clone(), index);
      }
      index
    };
    let Some(entry) = self.frame.footnotes.get_mut(index) else {
      return Ok(());
    };
    entry.refs.push(number);
    let html = format!(
      "<a class=\"wiki-fn-content\" href=\"#fn-{}\" title=\"{}\"><span \
       id=\"rfn-{number}\"></span>[{}]</a>",
      escape_html(&crate::utils::anchor_id(&entry.label)),
      escape_html(&entry.title),
      escape_html(&entry.label)
    );
    self.put(out, &html)
  }

  /// Write the pending footnote list and start a new one.
  ///
  /// # Errors
  ///
  /// Returns [`RenderError::TooLong`] once the cap is exceeded.
  pub fn flush_footnotes(&mut self, out: &mut String) -> Result<(), RenderError> {
    let entries = std::mem::take(&mut self.frame.footnotes);
    self.frame.footnote_names.clear();
    if entries.is_empty() {
      return Ok(());
    }
    self.put(out, "<div class=\"wiki-macro-footnote\">")?;
    for entry in entries {
      let id = escape_html(&crate::utils::anchor_id(&entry.label));
      let label = escape_html(&entry.label);
      let mut head = format!("<span class=\"footnote-list\"><span id=\"fn-{id}\"></span>");
      match entry.refs.as_slice() {
        [single] => {
          let _ = write!(head, "<a href=\"#rfn-{single}\">[{label}]</a>");
        },
        refs => {
          let _ = write!(head, "[{label}]");
          for (i, number) in refs.iter().enumerate() {
            let _ = write!(head, " <sup><a href=\"#rfn-{number}\">{}</a></sup>", i + 1);
          }
        },
      }
      head.push(' ');
      self.put(out, &head)?;
      self.put(out, &entry.html)?;
      self.put(out, "</span>")?;
    }
    self.put(out, "</div>")
  }
}

/// Keep `style` values that pass the style sanitizer.
fn filter_attribute<'u>(_element: &str, attribute: &str, value: &'u str) -> Option<Cow<'u, str>> {
  if attribute == "style" {
    let clean = sanitize_style(value);
    return (!clean.is_empty()).then_some(Cow::Owned(clean));
  }
  Some(Cow::Borrowed(value))
}

/// Sanitize a `#!html` block with ammonia's default allowlist plus
/// `class` and filtered `style`.
#[must_use]
pub fn sanitize_html(html: &str) -> String {
  let mut builder = ammonia::Builder::default();
  builder
    .add_generic_attributes(["class", "style"])
    .attribute_filter(filter_attribute)
    .link_rel(Some("nofollow noopener ugc"));
  builder.clean(html).to_string()
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]

  use super::*;
  use crate::{lookup::EmptyLookup, parser::Parser};

  fn render(text: &str) -> RenderOutput {
    let options = MarkupOptions::default();
    let parsed = Parser::new(Default::default(), &options.namespaces)
      .parse_document(text, Deadline::unbounded())
      .unwrap();
    let document = DocumentRef::new("문서", "Test");
    let registry = MacroRegistry::with_builtins();
    RenderContext::new(
      &document,
      &EmptyLookup,
      &registry,
      &options,
      &options.limits,
      Deadline::unbounded(),
    )
    .render_document(&parsed)
    .unwrap()
  }

  #[test]
  fn test_styles_and_paragraphs() {
    let out = render("'''bold''' and ''it''");
    assert_eq!(
      out.html,
      "<div class=\"wiki-paragraph\"><strong>bold</strong> and \
       <em>it</em></div>"
    );
  }

  #[test]
  fn test_html_block_is_sanitized() {
    let out = render("{{{#!html <b onclick=\"x()\">hi</b><script>alert(1)</script>}}}");
    assert!(out.html.contains("<b>hi</b>"));
    assert!(!out.html.contains("script"));
    assert!(!out.html.contains("onclick"));
  }

  #[test]
  fn test_footnotes_listed_at_end() {
    let out = render("a[* one] b[*N two] c[*N]");
    assert!(out.html.contains("href=\"#fn-1\""));
    assert!(out.html.contains("<span id=\"rfn-3\"></span>[N]"));
    assert!(out.html.contains("class=\"wiki-macro-footnote\""));
    assert!(out.html.contains("[N] <sup><a href=\"#rfn-2\">1</a></sup>"));
  }

  #[test]
  fn test_embed_text() {
    let out = render("hello   {{{world}}}\t again");
    assert_eq!(out.embed.text, "hello world again");
  }

  #[test]
  fn test_unknown_macro_is_literal() {
    let out = render("[nosuchmacro(1)]");
    assert!(out.html.contains("[nosuchmacro(1)]"));
  }

  #[test]
  fn test_output_cap() {
    let options = MarkupOptions::default();
    let limits = Limits {
      max_output_len: 16,
      ..Limits::default()
    };
    let parsed = Parser::new(Default::default(), &options.namespaces)
      .parse_document(&"text ".repeat(20), Deadline::unbounded())
      .unwrap();
    let document = DocumentRef::new("문서", "Test");
    let registry = MacroRegistry::with_builtins();
    let result = RenderContext::new(
      &document,
      &EmptyLookup,
      &registry,
      &options,
      &limits,
      Deadline::unbounded(),
    )
    .render_document(&parsed);
    assert_eq!(result, Err(RenderError::TooLong { limit: 16 }));
  }
}
