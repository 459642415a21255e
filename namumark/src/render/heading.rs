//! Heading sections and the table of contents.
use std::fmt::Write as _;

use super::RenderContext;
use crate::{
  error::RenderError,
  parser::ast::{Heading, Node},
  utils::escape_html,
};

impl RenderContext<'_> {
  /// Render top-level blocks, wrapping the content after each heading in a
  /// section that runs until the next heading of the same or a higher
  /// level.
  pub(crate) fn render_blocks(
    &mut self,
    nodes: &[Node],
    out: &mut String,
  ) -> Result<(), RenderError> {
    let mut open: Vec<u8> = Vec::new();
    for node in nodes {
      let Node::Heading(heading) = node else {
        self.render_node(node, out)?;
        continue;
      };
      while open.last().is_some_and(|level| *level >= heading.level) {
        open.pop();
        self.put(out, "</div>")?;
      }
      self.render_heading(heading, out)?;
      let content = if heading.closed {
        "<div class=\"wiki-heading-content wiki-heading-folded\">"
      } else {
        "<div class=\"wiki-heading-content\">"
      };
      self.put(out, content)?;
      open.push(heading.level);
    }
    for _ in open {
      self.put(out, "</div>")?;
    }
    Ok(())
  }

  pub(crate) fn render_heading(
    &mut self,
    heading: &Heading,
    out: &mut String,
  ) -> Result<(), RenderError> {
    let level = heading.level.clamp(1, 6);
    let folded = if heading.closed {
      " wiki-heading-folded"
    } else {
      ""
    };
    let numbering = escape_html(&heading.numbering);
    let prefix = escape_html(&self.frame.anchor_prefix);
    self.put(
      out,
      &format!(
        "<h{level} class=\"wiki-heading{folded}\" id=\"{prefix}s-{numbering}\"><a \
         class=\"wiki-heading-number\" href=\"#toc\">{numbering}.</a> <span \
         class=\"wiki-heading-text\">"
      ),
    )?;
    self.render_nodes(&heading.children, out)?;
    self.put(out, &format!("</span></h{level}>"))
  }

  /// Table of contents of the document being rendered, nested by
  /// numbering depth. Empty when the document has no headings.
  #[must_use]
  pub fn toc_html(&self) -> String {
    if self.frame.toc.is_empty() {
      return String::new();
    }
    let mut html = format!(
      "<div class=\"wiki-macro-toc\" id=\"toc\"><div class=\"toc-title\">{}</div>",
      escape_html(&self.options.messages.toc_title)
    );
    let prefix = escape_html(&self.frame.anchor_prefix);
    let mut depth = 0;
    for heading in &self.frame.toc {
      let target = heading.numbering.split('.').count();
      while depth < target {
        html.push_str("<div class=\"toc-indent\">");
        depth += 1;
      }
      while depth > target {
        html.push_str("</div>");
        depth -= 1;
      }
      let numbering = escape_html(&heading.numbering);
      let _ = write!(
        html,
        "<span class=\"toc-item\"><a href=\"#{prefix}s-{numbering}\">{numbering}</a>. \
         {}</span>",
        escape_html(heading.link_text.trim())
      );
    }
    for _ in 0..depth {
      html.push_str("</div>");
    }
    html.push_str("</div>");
    html
  }
}
