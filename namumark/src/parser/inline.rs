//! Inline assembly: turns inline tokens into span nodes.
use std::sync::LazyLock;

use regex::Regex;

use super::{
  Parser,
  args::{parse_include, split_args},
  ast::{CategoryMarker, Footnote, IncludeCall, Link, LinkTarget, MacroCall, Node},
  context::{Category, Parent, ParseContext},
  push_node,
};
use crate::{
  document::DocumentRef,
  error::ParseError,
  tokenizer::{BraceHead, Gates, Mode, Token, TokenKind, scan::find_unescaped},
  utils::{never_matching_regex, unescape_markup},
};

/// `style="..."` and `dark-style="..."` in a `#!wiki` head.
static WIKI_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?i)(dark-style|style)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap_or_else(
    |e| {
      log::error!("Failed to compile WIKI_STYLE_RE regex: {e}");
      never_matching_regex()
    },
  )
});

const EXTERNAL_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

/// Style attributes of a `#!wiki` head.
fn wiki_styles(attrs: &str) -> (Option<String>, Option<String>) {
  let mut style = None;
  let mut dark_style = None;
  for caps in WIKI_STYLE_RE.captures_iter(attrs) {
    let value = caps
      .get(2)
      .or_else(|| caps.get(3))
      .map(|m| m.as_str().to_string());
    if caps[1].eq_ignore_ascii_case("dark-style") {
      dark_style = dark_style.or(value);
    } else {
      style = style.or(value);
    }
  }
  (style, dark_style)
}

fn external_url(target: &str) -> Option<String> {
  let url = url::Url::parse(target.trim()).ok()?;
  EXTERNAL_SCHEMES
    .contains(&url.scheme())
    .then(|| target.trim().to_string())
}

impl Parser<'_> {
  pub(super) fn inline_nodes(
    &mut self,
    ctx: &mut ParseContext,
    text: &str,
  ) -> Result<Vec<Node>, ParseError> {
    let gates = Gates {
      thread: ctx.in_parent(Parent::Thread),
    };
    let tokens = self.lex(ctx, text, Mode::Inline, gates)?;
    let mut nodes = Vec::new();
    let mut result = Ok(());
    for token in &tokens {
      if let Err(e) = ctx
        .check_deadline()
        .and_then(|()| self.inline_token(ctx, text, token))
        .map(|node| push_node(&mut nodes, node))
      {
        result = Err(e);
        break;
      }
    }
    self.release(ctx.depth, tokens);
    result.map(|()| nodes)
  }

  fn inline_token(
    &mut self,
    ctx: &mut ParseContext,
    source: &str,
    token: &Token,
  ) -> Result<Node, ParseError> {
    let raw = source.get(token.span.clone()).unwrap_or_default();
    let node = match &token.kind {
      TokenKind::Text(text) => Node::text(text.as_str()),
      TokenKind::Escaped(ch) => Node::text(ch.to_string()),
      TokenKind::LineBreak => Node::LineBreak,
      TokenKind::Styled { style, inner } => {
        Node::Styled {
          style:    *style,
          children: self.parse_inline_fragment(ctx, inner)?,
        }
      },
      TokenKind::Literal { head, body } => self.literal(ctx, head, body)?,
      TokenKind::Link { target, display } => {
        self.link(ctx, raw, target, display.as_deref())?
      },
      TokenKind::Footnote { name, content } => {
        if ctx.in_parent(Parent::Footnote) {
          return Ok(Node::text(raw));
        }
        ctx.push_parent(Parent::Footnote);
        let children = self.parse_inline_fragment(ctx, content);
        ctx.pop_parent();
        Node::Footnote(Footnote {
          name:     name.clone(),
          children: children?,
          reuse:    name.is_some() && content.trim().is_empty(),
        })
      },
      TokenKind::Macro { name, args } => self.macro_call(ctx, raw, name, args.as_deref())?,
      TokenKind::CommentNumber(number) => Node::CommentNumber { number: *number },
      TokenKind::Mention(user) => Node::Mention { user: user.clone() },
      // Block and cell tokens never come out of an inline lexer.
      _ => Node::text(raw),
    };
    Ok(node)
  }

  fn literal(
    &mut self,
    ctx: &mut ParseContext,
    head: &BraceHead,
    body: &str,
  ) -> Result<Node, ParseError> {
    let node = match head {
      BraceHead::Plain => {
        Node::Literal {
          text:  body.to_string(),
          block: body.contains('\n'),
        }
      },
      BraceHead::Syntax { lang } => {
        Node::Syntax {
          lang: lang.clone(),
          code: body.to_string(),
        }
      },
      BraceHead::Html => {
        Node::Html {
          html: body.to_string(),
        }
      },
      BraceHead::Wiki { attrs } => {
        let (style, dark_style) = wiki_styles(attrs);
        Node::Wiki {
          style,
          dark_style,
          children: self.parse_block_fragment(ctx, body, true)?,
        }
      },
      BraceHead::Folding { summary } => {
        Node::Folding {
          summary:  summary.clone(),
          children: self.parse_block_fragment(ctx, body, true)?,
        }
      },
      BraceHead::If { expr } => {
        Node::Conditional {
          expr:     expr.clone(),
          children: self.parse_block_fragment(ctx, body, true)?,
        }
      },
      BraceHead::Size(level) => {
        Node::Size {
          level:    *level,
          children: self.spanned(ctx, body)?,
        }
      },
      BraceHead::Color(color) => {
        Node::Color {
          color:    color.clone(),
          children: self.spanned(ctx, body)?,
        }
      },
    };
    Ok(node)
  }

  /// Size and color spans hold blocks once they cross a line.
  fn spanned(&mut self, ctx: &mut ParseContext, body: &str) -> Result<Vec<Node>, ParseError> {
    if body.contains('\n') {
      self.parse_block_fragment(ctx, body, true)
    } else {
      self.parse_inline_fragment(ctx, body)
    }
  }

  fn link(
    &mut self,
    ctx: &mut ParseContext,
    raw: &str,
    target: &str,
    display: Option<&str>,
  ) -> Result<Node, ParseError> {
    let in_link = ctx.in_parent(Parent::Link);
    let target_text = unescape_markup(target.trim()).into_owned();

    if let Some(url) = external_url(&target_text) {
      if in_link {
        return Ok(Node::text(raw));
      }
      let display = self.link_display(ctx, display)?;
      return Ok(Node::Link(Link {
        target: LinkTarget::External { url },
        raw_target: target_text,
        display,
        explicit: false,
      }));
    }

    if let Some(fragment) = target_text.strip_prefix('#') {
      if in_link {
        return Ok(Node::text(raw));
      }
      let display = self.link_display(ctx, display)?;
      return Ok(Node::Link(Link {
        target: LinkTarget::Anchor {
          fragment: fragment.to_string(),
        },
        raw_target: target_text.clone(),
        display,
        explicit: false,
      }));
    }

    let (title, fragment) = match find_unescaped(target, "#") {
      Some(i) => {
        (
          unescape_markup(target[..i].trim()).into_owned(),
          Some(unescape_markup(target[i + 1..].trim()).into_owned()),
        )
      },
      None => (target_text.clone(), None),
    };
    let resolved = DocumentRef::parse(&title, self.namespaces());
    let namespaces = self.namespaces();
    let thread = ctx.in_parent(Parent::Thread);

    if !resolved.forced && resolved.document.namespace == namespaces.file {
      return Ok(Node::Link(Link {
        target: LinkTarget::File {
          document: resolved.document,
          options:  display.unwrap_or_default().to_string(),
        },
        raw_target: target_text,
        display: None,
        explicit: true,
      }));
    }
    if in_link {
      return Ok(Node::text(raw));
    }
    if !resolved.forced && !thread && resolved.document.namespace == namespaces.category {
      let document = resolved.document.full_title(namespaces);
      let text = display.map(ToString::to_string);
      let blur = fragment.as_deref() == Some("blur");
      ctx.record_category(Category {
        document: document.clone(),
        text:     text.clone(),
        blur,
      });
      return Ok(Node::Category(CategoryMarker {
        document,
        text,
        blur,
      }));
    }

    let relative = title.starts_with('/') || title.starts_with("../");
    if !relative && !resolved.document.title.is_empty() {
      ctx.record_link(resolved.document.full_title(namespaces));
    }
    let display = self.link_display(ctx, display)?;
    Ok(Node::Link(Link {
      target: LinkTarget::Document {
        document: resolved.document,
        fragment,
      },
      raw_target: target_text,
      display,
      explicit: resolved.explicit,
    }))
  }

  fn link_display(
    &mut self,
    ctx: &mut ParseContext,
    display: Option<&str>,
  ) -> Result<Option<Vec<Node>>, ParseError> {
    let Some(display) = display else {
      return Ok(None);
    };
    ctx.push_parent(Parent::Link);
    let nodes = self.parse_inline_fragment(ctx, display);
    ctx.pop_parent();
    nodes.map(Some)
  }

  fn macro_call(
    &mut self,
    ctx: &mut ParseContext,
    raw: &str,
    name: &str,
    raw_args: Option<&str>,
  ) -> Result<Node, ParseError> {
    let name = name.to_lowercase();
    let args = raw_args.map(split_args).unwrap_or_default();
    let mut call = MacroCall {
      name,
      raw_args: raw_args.map(ToString::to_string),
      args,
      raw: raw.to_string(),
      include: None,
      vote: None,
    };
    match call.name.as_str() {
      "include" => {
        if let Some((target, params)) = parse_include(&call.args) {
          log::debug!("include of {target} with {} parameters", params.len());
          ctx.record_include(&target, params.clone());
          call.include = Some(IncludeCall {
            target,
            params,
            depth: ctx.depth,
          });
        }
      },
      "vote" => {
        let mut options = Vec::with_capacity(call.args.len());
        for arg in &call.args {
          options.push(self.parse_inline_fragment(ctx, arg)?);
        }
        call.vote = Some(options);
      },
      _ => {},
    }
    Ok(Node::Macro(call))
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, clippy::panic, reason = "Fine in tests")]

  use super::super::ParseOptions;
  use super::*;
  use crate::{deadline::Deadline, document::NamespaceConfig};

  fn parse_with(text: &str, options: ParseOptions) -> super::super::ParseOutput {
    let namespaces = NamespaceConfig::default();
    Parser::new(options, &namespaces)
      .parse_document(text, Deadline::unbounded())
      .unwrap()
  }

  fn inline(text: &str) -> Vec<Node> {
    let output = parse_with(text, ParseOptions::default());
    match output.ast.into_iter().next() {
      Some(Node::Paragraph { children }) => children,
      other => panic!("expected paragraph, got {other:?}"),
    }
  }

  #[test]
  fn test_link_classification() {
    let nodes = inline("[[https://example.com|text]] [[#top]] [[Doc#sec|d]]");
    let Node::Link(external) = &nodes[0] else {
      panic!("expected link");
    };
    assert!(matches!(external.target, LinkTarget::External { .. }));
    let Node::Link(anchor) = &nodes[2] else {
      panic!("expected link");
    };
    assert_eq!(anchor.target, LinkTarget::Anchor {
      fragment: "top".into(),
    });
    let Node::Link(internal) = &nodes[4] else {
      panic!("expected link");
    };
    let LinkTarget::Document { document, fragment } = &internal.target else {
      panic!("expected document target");
    };
    assert_eq!(document.title, "Doc");
    assert_eq!(fragment.as_deref(), Some("sec"));
  }

  #[test]
  fn test_unknown_scheme_is_internal() {
    let nodes = inline("[[javascript:alert(1)]]");
    let Node::Link(link) = &nodes[0] else {
      panic!("expected link");
    };
    assert!(matches!(link.target, LinkTarget::Document { .. }));
  }

  #[test]
  fn test_category_recorded_once() {
    let output = parse_with("[[분류:Foo]][[분류:Foo]][[:분류:Foo]]", ParseOptions::default());
    assert_eq!(output.metadata.categories.len(), 1);
    assert_eq!(output.metadata.categories[0].document, "분류:Foo");
    assert_eq!(output.metadata.links, vec!["분류:Foo".to_string()]);
  }

  #[test]
  fn test_category_in_thread_is_link() {
    let output = parse_with("[[분류:Foo]]", ParseOptions {
      thread: true,
      ..ParseOptions::default()
    });
    assert!(output.metadata.categories.is_empty());
  }

  #[test]
  fn test_nested_link_becomes_text_but_file_embeds() {
    let nodes = inline("[[A|[[B]] [[파일:x.png|width=10]]]]");
    let Node::Link(link) = &nodes[0] else {
      panic!("expected link");
    };
    let display = link.display.as_ref().unwrap();
    assert_eq!(display[0], Node::text("[[B]] "));
    let Node::Link(file) = &display[1] else {
      panic!("expected file link");
    };
    assert!(matches!(&file.target, LinkTarget::File { options, .. } if options == "width=10"));
  }

  #[test]
  fn test_nested_footnote_literal() {
    let nodes = inline("[* outer [* inner]]");
    let Node::Footnote(footnote) = &nodes[0] else {
      panic!("expected footnote");
    };
    assert!(footnote.children.contains(&Node::text("outer [* inner]")));
  }

  #[test]
  fn test_named_footnote_reuse() {
    let nodes = inline("[*A text][*A]");
    let (Node::Footnote(first), Node::Footnote(second)) = (&nodes[0], &nodes[1]) else {
      panic!("expected footnotes");
    };
    assert!(!first.reuse);
    assert!(second.reuse);
  }

  #[test]
  fn test_include_recorded_with_params() {
    let output = parse_with("[include(틀:T, a=1)][include(틀:T, a=2)]", ParseOptions::default());
    assert_eq!(output.metadata.includes, vec!["틀:T".to_string()]);
    assert_eq!(output.metadata.include_parameters["틀:T"].len(), 2);
  }

  #[test]
  fn test_vote_args_parsed_inline() {
    let nodes = inline("[vote('''a''', b)]");
    let Node::Macro(call) = &nodes[0] else {
      panic!("expected macro");
    };
    let vote = call.vote.as_ref().unwrap();
    assert!(matches!(vote[0][0], Node::Styled { .. }));
  }

  #[test]
  fn test_wiki_styles() {
    let (style, dark) = wiki_styles(r#"style="color:red" dark-style='color:blue'"#);
    assert_eq!(style.as_deref(), Some("color:red"));
    assert_eq!(dark.as_deref(), Some("color:blue"));
  }

  #[test]
  fn test_thread_tokens() {
    let output = parse_with("see #12 and @user.", ParseOptions {
      thread: true,
      ..ParseOptions::default()
    });
    let Node::Paragraph { children } = &output.ast[0] else {
      panic!("expected paragraph");
    };
    assert!(children.contains(&Node::CommentNumber { number: 12 }));
    assert!(children.contains(&Node::Mention {
      user: "user".into(),
    }));
  }
}
