//! Block assembly: groups top-level tokens into paragraphs, lists, tables
//! and sections.
use super::{
  Parser,
  ast::{Heading, Node, flatten_text},
  context::{HeadingInfo, Parent, ParseContext},
  push_node,
};
use crate::{
  error::ParseError,
  table::{Cell, Row, Table, TableAttrParser, apply_space_alignment},
  tokenizer::{Gates, ListMarker, Mode, Token, TokenKind},
};

impl Parser<'_> {
  /// Turn block tokens into nodes. With `wrap`, text runs become
  /// paragraphs; otherwise their inline content is spliced in directly.
  pub(super) fn blocks(
    &mut self,
    ctx: &mut ParseContext,
    tokens: &[Token],
    wrap: bool,
  ) -> Result<Vec<Node>, ParseError> {
    let mut nodes = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
      ctx.check_deadline()?;
      let token = &tokens[i];
      match &token.kind {
        TokenKind::Redirect { target } => {
          ctx.redirect = Some(target.clone());
          i += 1;
        },
        TokenKind::Heading {
          level,
          closed,
          content,
        } => {
          let heading = self.heading(ctx, *level, *closed, content, token.start_line)?;
          nodes.push(Node::Heading(heading));
          i += 1;
        },
        TokenKind::HorizontalRule => {
          nodes.push(Node::HorizontalRule);
          i += 1;
        },
        TokenKind::BlockQuote { content } => {
          let children = self.parse_block_fragment(ctx, content, false)?;
          nodes.push(Node::BlockQuote { children });
          i += 1;
        },
        TokenKind::Indent { content } => {
          let children = self.parse_block_fragment(ctx, content, true)?;
          nodes.push(Node::Indent { children });
          i += 1;
        },
        TokenKind::ListItem { .. } => {
          let consumed = self.list(ctx, &tokens[i..], &mut nodes)?;
          i += consumed;
        },
        TokenKind::TableRow { .. } => {
          let consumed = self.table(ctx, &tokens[i..], &mut nodes)?;
          i += consumed;
        },
        TokenKind::TextLine { .. } | TokenKind::BlankLine => {
          let consumed = self.paragraph(ctx, &tokens[i..], wrap, &mut nodes)?;
          i += consumed;
        },
        // Inline and cell tokens never come out of a block lexer.
        _ => i += 1,
      }
    }
    Ok(nodes)
  }

  fn heading(
    &mut self,
    ctx: &mut ParseContext,
    level: u8,
    closed: bool,
    content: &str,
    line: usize,
  ) -> Result<Heading, ParseError> {
    ctx.push_parent(Parent::Heading);
    let children = self.parse_inline_fragment(ctx, content);
    ctx.pop_parent();
    let children = children?;
    let mut link_text = String::new();
    flatten_text(&children, true, &mut link_text);
    let mut plain_text = String::new();
    flatten_text(&children, false, &mut plain_text);
    let (section, numbering) = ctx.next_section(level);
    let line = ctx.original_line(line);
    log::trace!("heading {section} ({numbering}) at line {line}");
    ctx.headings.push(HeadingInfo {
      line,
      level,
      closed,
      section,
      numbering: numbering.clone(),
      text: content.to_string(),
      link_text: link_text.clone(),
      plain_text: plain_text.clone(),
    });
    Ok(Heading {
      level,
      closed,
      section,
      numbering,
      line,
      children,
      link_text,
      plain_text,
    })
  }

  /// A run of list items with the same indent and marker family.
  fn list(
    &mut self,
    ctx: &mut ParseContext,
    tokens: &[Token],
    nodes: &mut Vec<Node>,
  ) -> Result<usize, ParseError> {
    let Some(TokenKind::ListItem {
      indent: first_indent,
      marker: first_marker,
      start,
      ..
    }) = tokens.first().map(|t| &t.kind)
    else {
      return Ok(1);
    };
    let mut items = Vec::new();
    let mut consumed = 0;
    for token in tokens {
      let TokenKind::ListItem {
        indent,
        marker,
        content,
        ..
      } = &token.kind
      else {
        break;
      };
      if indent != first_indent || marker != first_marker {
        break;
      }
      items.push(self.parse_block_fragment(ctx, content, true)?);
      consumed += 1;
    }
    let start = match first_marker {
      ListMarker::Bullet => None,
      _ => *start,
    };
    nodes.push(Node::List {
      marker: *first_marker,
      start,
      items,
    });
    Ok(consumed)
  }

  /// Consecutive table rows. A caption on a later row starts a new table.
  fn table(
    &mut self,
    ctx: &mut ParseContext,
    tokens: &[Token],
    nodes: &mut Vec<Node>,
  ) -> Result<usize, ParseError> {
    let mut attrs = TableAttrParser::new();
    let mut table = Table::default();
    ctx.push_parent(Parent::Table);
    let consumed = self.table_rows(ctx, tokens, &mut attrs, &mut table);
    ctx.pop_parent();
    let consumed = consumed?;
    table.props = attrs.into_props();
    nodes.push(Node::Table(table));
    Ok(consumed.max(1))
  }

  fn table_rows(
    &mut self,
    ctx: &mut ParseContext,
    tokens: &[Token],
    attrs: &mut TableAttrParser,
    table: &mut Table,
  ) -> Result<usize, ParseError> {
    let mut consumed = 0;
    for token in tokens {
      let TokenKind::TableRow { caption, raw } = &token.kind else {
        break;
      };
      if consumed > 0 && caption.is_some() {
        break;
      }
      if let Some(caption) = caption {
        table.caption = Some(self.parse_inline_fragment(ctx, caption)?);
      }
      let row = self.row(ctx, raw, attrs)?;
      table.rows.push(row);
      consumed += 1;
    }
    Ok(consumed)
  }

  fn row(
    &mut self,
    ctx: &mut ParseContext,
    raw: &str,
    attrs: &mut TableAttrParser,
  ) -> Result<Row, ParseError> {
    let tokens = self.lex(ctx, raw, Mode::TableCell, Gates::default())?;
    let mut row = Row::default();
    let mut pending_span = 0;
    let mut result = Ok(());
    for token in &tokens {
      let TokenKind::Cell { content } = &token.kind else {
        continue;
      };
      // Every empty cell before a cell widens it by one column.
      if content.is_empty() {
        pending_span += 1;
        continue;
      }
      let (mut cell_attrs, rest) = attrs.parse_cell(content);
      let (align, rest) = apply_space_alignment(rest, cell_attrs.align);
      cell_attrs.align = align;
      if pending_span > 0 && cell_attrs.colspan == 1 {
        cell_attrs.colspan += pending_span;
      }
      pending_span = 0;
      match self.parse_block_fragment(ctx, rest, true) {
        Ok(children) => {
          row.cells.push(Cell {
            attrs: cell_attrs,
            children,
          });
        },
        Err(e) => {
          result = Err(e);
          break;
        },
      }
    }
    self.release(ctx.depth, tokens);
    result.map(|()| row)
  }

  /// A run of text and blank lines. Leading and trailing blank lines are
  /// dropped; line breaks inside become [`Node::LineBreak`].
  fn paragraph(
    &mut self,
    ctx: &mut ParseContext,
    tokens: &[Token],
    wrap: bool,
    nodes: &mut Vec<Node>,
  ) -> Result<usize, ParseError> {
    let mut lines: Vec<&str> = Vec::new();
    let mut consumed = 0;
    for token in tokens {
      match &token.kind {
        TokenKind::TextLine { content } => lines.push(content),
        TokenKind::BlankLine => lines.push(""),
        _ => break,
      }
      consumed += 1;
    }
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let (Some(first), Some(last)) = (first, last) else {
      return Ok(consumed.max(1));
    };
    let text = lines[first..=last].join("\n");
    let children = self.parse_inline_fragment(ctx, &text)?;
    if wrap {
      nodes.push(Node::Paragraph { children });
    } else {
      if matches!(nodes.last(), Some(Node::Text { .. } | Node::LineBreak)) {
        nodes.push(Node::LineBreak);
      }
      for child in children {
        push_node(nodes, child);
      }
    }
    Ok(consumed.max(1))
  }
}
