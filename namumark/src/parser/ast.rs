//! Typed syntax tree produced by the parser.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
  document::DocumentRef,
  table::Table,
  tokenizer::{ListMarker, TextStyle},
  utils::css::ThemedColor,
};

/// One block or inline construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
  Paragraph {
    children: Vec<Self>,
  },
  Heading(Heading),
  HorizontalRule,
  Table(Table),
  List {
    marker: ListMarker,
    start:  Option<u32>,
    items:  Vec<Vec<Self>>,
  },
  Indent {
    children: Vec<Self>,
  },
  BlockQuote {
    children: Vec<Self>,
  },
  Literal {
    text:  String,
    block: bool,
  },
  Syntax {
    lang: String,
    code: String,
  },
  /// Raw HTML, sanitized when rendered.
  Html {
    html: String,
  },
  /// Custom-style block (`#!wiki`).
  Wiki {
    style:      Option<String>,
    dark_style: Option<String>,
    children:   Vec<Self>,
  },
  Folding {
    summary:  String,
    children: Vec<Self>,
  },
  Conditional {
    expr:     String,
    children: Vec<Self>,
  },
  Color {
    color:    ThemedColor,
    children: Vec<Self>,
  },
  Size {
    level:    i8,
    children: Vec<Self>,
  },
  Styled {
    style:    TextStyle,
    children: Vec<Self>,
  },
  Link(Link),
  Category(CategoryMarker),
  Footnote(Footnote),
  Macro(MacroCall),
  CommentNumber {
    number: u64,
  },
  Mention {
    user: String,
  },
  Text {
    text: String,
  },
  LineBreak,
}

impl Node {
  pub fn text(text: impl Into<String>) -> Self {
    Self::Text { text: text.into() }
  }

  /// Child nodes of containers, in document order.
  #[must_use]
  pub fn children(&self) -> &[Self] {
    match self {
      Self::Paragraph { children }
      | Self::Indent { children }
      | Self::BlockQuote { children }
      | Self::Wiki { children, .. }
      | Self::Folding { children, .. }
      | Self::Conditional { children, .. }
      | Self::Color { children, .. }
      | Self::Size { children, .. }
      | Self::Styled { children, .. } => children,
      Self::Heading(heading) => &heading.children,
      Self::Footnote(footnote) => &footnote.children,
      Self::Link(link) => link.display.as_deref().unwrap_or_default(),
      _ => &[],
    }
  }
}

/// A section heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
  pub level:      u8,
  /// Folded by default.
  pub closed:     bool,
  /// Position of the heading in document order, starting at 1.
  pub section:    usize,
  /// Dotted numbering path such as `1.2`.
  pub numbering:  String,
  /// Line in the original source, 1-based.
  pub line:       usize,
  pub children:   Vec<Node>,
  /// Text and link display text only.
  pub link_text:  String,
  /// Text only.
  pub plain_text: String,
}

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkTarget {
  External {
    url: String,
  },
  Anchor {
    fragment: String,
  },
  Document {
    document: DocumentRef,
    fragment: Option<String>,
  },
  /// A file embed. `options` is the raw option string after `|`.
  File {
    document: DocumentRef,
    options:  String,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
  pub target:     LinkTarget,
  /// Target text as written, used when the link has no display text.
  pub raw_target: String,
  pub display:    Option<Vec<Node>>,
  /// The namespace was written explicitly (`[[문서:A]]`).
  pub explicit:   bool,
}

/// A `[[분류:X]]` assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMarker {
  pub document: String,
  pub text:     Option<String>,
  pub blur:     bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footnote {
  /// Explicit name (`[*A ...]`); numbered otherwise.
  pub name:     Option<String>,
  pub children: Vec<Node>,
  /// The footnote had no content, so it refers to an earlier one with the
  /// same name.
  pub reuse:    bool,
}

/// A `[name(args)]` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroCall {
  /// Lowercased macro name.
  pub name:     String,
  pub raw_args: Option<String>,
  /// Arguments split on unescaped commas, unescaped and trimmed.
  pub args:     Vec<String>,
  /// Source text, rendered as-is when no handler exists.
  pub raw:      String,
  pub include:  Option<IncludeCall>,
  /// Inline-parsed arguments of a `vote` call.
  pub vote:     Option<Vec<Vec<Node>>>,
}

impl MacroCall {
  /// Value of a `key=value` argument.
  #[must_use]
  pub fn named_arg(&self, key: &str) -> Option<&str> {
    self.args.iter().find_map(|arg| {
      let (k, v) = arg.split_once('=')?;
      (k.trim() == key).then(|| v.trim())
    })
  }

  /// Arguments that are not `key=value` pairs.
  pub fn positional_args(&self) -> impl Iterator<Item = &str> {
    self
      .args
      .iter()
      .filter(|arg| !arg.contains('='))
      .map(String::as_str)
  }
}

/// Transclusion recorded at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeCall {
  pub target: String,
  pub params: IndexMap<String, String>,
  /// Parse depth of the call site. The included document parses below it.
  pub depth:  usize,
}

/// Concatenate the text a node shows, optionally including link display
/// text.
pub fn flatten_text(nodes: &[Node], with_links: bool, out: &mut String) {
  for node in nodes {
    match node {
      Node::Text { text } => out.push_str(text),
      Node::Literal { text, .. } => out.push_str(text),
      Node::LineBreak => out.push(' '),
      Node::Link(link) => {
        if !with_links {
          continue;
        }
        match &link.display {
          Some(display) => flatten_text(display, with_links, out),
          None => out.push_str(&link.raw_target),
        }
      },
      Node::Footnote(_) | Node::Macro(_) | Node::Category(_) => {},
      other => flatten_text(other.children(), with_links, out),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_flatten_projections() {
    let nodes = vec![
      Node::text("a "),
      Node::Link(Link {
        target:     LinkTarget::Anchor {
          fragment: "x".into(),
        },
        raw_target: "#x".into(),
        display:    Some(vec![Node::text("b")]),
        explicit:   false,
      }),
      Node::Styled {
        style:    TextStyle::Bold,
        children: vec![Node::text(" c")],
      },
    ];
    let mut with_links = String::new();
    flatten_text(&nodes, true, &mut with_links);
    let mut plain = String::new();
    flatten_text(&nodes, false, &mut plain);
    assert_eq!(with_links, "a b c");
    assert_eq!(plain, "a  c");
  }

  #[test]
  fn test_macro_named_args() {
    let call = MacroCall {
      name:     "ruby".into(),
      raw_args: Some("x, ruby=y".into()),
      args:     vec!["x".into(), "ruby=y".into()],
      raw:      "[ruby(x, ruby=y)]".into(),
      include:  None,
      vote:     None,
    };
    assert_eq!(call.named_arg("ruby"), Some("y"));
    assert_eq!(call.positional_args().collect::<Vec<_>>(), vec!["x"]);
  }
}
