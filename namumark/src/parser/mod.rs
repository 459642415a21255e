//! Recursive-descent parser from tokens to the [`Node`] tree.
//!
//! Every nested construct (link text, list items, table cells, styled
//! spans, transcluded documents) re-lexes its own text one level deeper.
//! A [`Parser`] owns an arena of token buffers indexed by that depth, so
//! each level reuses its buffer instead of allocating, and nothing is
//! shared between parsers. Past `max_depth`, nested text degrades to plain
//! lines.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
  deadline::Deadline,
  document::NamespaceConfig,
  error::ParseError,
  tokenizer::{Gates, Lexer, Mode, Token},
  utils::literal::LiteralTracker,
};

pub mod args;
pub mod ast;
mod block;
pub mod context;
mod inline;

pub use ast::Node;
pub use context::{Category, HeadingInfo, Parent, ParseContext};

/// Default nesting limit shared by inline, block and transclusion nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Options for one parse call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(
  clippy::struct_excessive_bools,
  reason = "Independent parse switches"
)]
pub struct ParseOptions {
  /// Parse as a comment: no heading tokens.
  pub comment_source:   bool,
  /// Discussion-thread context: comment numbers and mentions are live.
  pub thread:           bool,
  /// Do not wrap top-level text in paragraphs.
  pub no_top_paragraph: bool,
  pub max_depth:        usize,
  /// Return the top-level token stream for a later [`Parser::parse_tokens`].
  pub keep_tokens:      bool,
}

impl Default for ParseOptions {
  fn default() -> Self {
    Self {
      comment_source:   false,
      thread:           false,
      no_top_paragraph: false,
      max_depth:        DEFAULT_MAX_DEPTH,
      keep_tokens:      false,
    }
  }
}

/// Metadata discovered while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseMetadata {
  pub links:              Vec<String>,
  pub categories:         Vec<Category>,
  pub includes:           Vec<String>,
  pub include_parameters: IndexMap<String, Vec<IndexMap<String, String>>>,
  pub headings:           Vec<HeadingInfo>,
  pub redirect:           Option<String>,
}

/// Everything a parse produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOutput {
  pub tokens:   Option<Vec<Token>>,
  /// Stripped line index to original 1-based line.
  pub line_map: Vec<usize>,
  pub ast:      Vec<Node>,
  pub metadata: ParseMetadata,
}

/// Drop `##` comment lines outside literal regions. Returns the remaining
/// text and, per remaining line, its original 1-based line number.
#[must_use]
pub fn strip_comments(text: &str) -> (String, Vec<usize>) {
  let text = text.replace("\r\n", "\n");
  let mut out = String::with_capacity(text.len());
  let mut line_map = Vec::new();
  let mut tracker = LiteralTracker::new();
  for (index, line) in text.split('\n').enumerate() {
    let was_open = tracker.is_open();
    tracker = tracker.process_line(line);
    if !was_open && line.starts_with("##") {
      continue;
    }
    if !line_map.is_empty() {
      out.push('\n');
    }
    out.push_str(line);
    line_map.push(index + 1);
  }
  (out, line_map)
}

/// Line-split plain text, used once the depth limit is reached.
#[must_use]
pub fn plain_text(text: &str) -> Vec<Node> {
  let mut nodes = Vec::new();
  for (i, line) in text.split('\n').enumerate() {
    if i > 0 {
      nodes.push(Node::LineBreak);
    }
    if !line.is_empty() {
      nodes.push(Node::text(line));
    }
  }
  nodes
}

/// Append a node, merging adjacent text runs.
pub(crate) fn push_node(nodes: &mut Vec<Node>, node: Node) {
  if let Node::Text { text } = &node
    && let Some(Node::Text { text: last }) = nodes.last_mut()
  {
    last.push_str(text);
    return;
  }
  nodes.push(node);
}

/// A reentrant parser for one execution unit.
#[derive(Debug)]
pub struct Parser<'n> {
  options:    ParseOptions,
  namespaces: &'n NamespaceConfig,
  /// Token scratch buffers, one per nesting depth.
  frames:     Vec<Vec<Token>>,
}

impl<'n> Parser<'n> {
  #[must_use]
  pub const fn new(options: ParseOptions, namespaces: &'n NamespaceConfig) -> Self {
    Self {
      options,
      namespaces,
      frames: Vec::new(),
    }
  }

  #[must_use]
  pub const fn options(&self) -> &ParseOptions {
    &self.options
  }

  #[must_use]
  pub const fn namespaces(&self) -> &'n NamespaceConfig {
    self.namespaces
  }

  /// Parse a whole document.
  ///
  /// # Errors
  ///
  /// Only the deadline can fail a parse; malformed markup degrades to text.
  pub fn parse_document(
    &mut self,
    text: &str,
    deadline: Deadline,
  ) -> Result<ParseOutput, ParseError> {
    self.parse_document_at(text, deadline, 0)
  }

  /// Parse a document whose nesting starts at `depth`, as transclusion
  /// does.
  ///
  /// # Errors
  ///
  /// Returns an error if the deadline passes.
  pub fn parse_document_at(
    &mut self,
    text: &str,
    deadline: Deadline,
    depth: usize,
  ) -> Result<ParseOutput, ParseError> {
    let (stripped, line_map) = strip_comments(text);
    if depth >= self.options.max_depth {
      log::warn!("document starts at depth {depth}, rendering as plain text");
      return Ok(ParseOutput {
        tokens: None,
        line_map,
        ast: plain_text(&stripped),
        metadata: ParseMetadata::default(),
      });
    }
    let mode = if self.options.comment_source {
      Mode::BlockNoHeading
    } else {
      Mode::Block
    };
    let mut lexer = Lexer::new(&stripped, mode).with_deadline(deadline.clone());
    let tokens: Vec<Token> = lexer.by_ref().collect();
    if lexer.interrupted() {
      return Err(ParseError::stopped_by(&deadline));
    }
    log::trace!("lexed {} top-level tokens", tokens.len());
    let mut output = self.parse_tokens_at(&tokens, line_map, deadline, depth)?;
    if self.options.keep_tokens {
      output.tokens = Some(tokens);
    }
    Ok(output)
  }

  /// Rebuild the tree from a top-level token stream kept by an earlier
  /// parse.
  ///
  /// # Errors
  ///
  /// Returns an error if the deadline passes.
  pub fn parse_tokens(
    &mut self,
    tokens: &[Token],
    line_map: Vec<usize>,
    deadline: Deadline,
  ) -> Result<ParseOutput, ParseError> {
    self.parse_tokens_at(tokens, line_map, deadline, 0)
  }

  fn parse_tokens_at(
    &mut self,
    tokens: &[Token],
    line_map: Vec<usize>,
    deadline: Deadline,
    depth: usize,
  ) -> Result<ParseOutput, ParseError> {
    let mut ctx = ParseContext::new(deadline).with_depth(depth);
    ctx.line_map.clone_from(&line_map);
    if self.options.thread {
      ctx.push_parent(Parent::Thread);
    }
    let ast = self.blocks(&mut ctx, tokens, !self.options.no_top_paragraph)?;
    Ok(ParseOutput {
      tokens: None,
      line_map,
      ast,
      metadata: ParseMetadata {
        links:              ctx.links.into_iter().collect(),
        categories:         ctx.categories.into_values().collect(),
        includes:           ctx.includes.into_iter().collect(),
        include_parameters: ctx.include_parameters,
        headings:           ctx.headings,
        redirect:           ctx.redirect,
      },
    })
  }

  /// Parse inline text one level deeper.
  ///
  /// # Errors
  ///
  /// Returns an error if the deadline passes.
  pub fn parse_inline_fragment(
    &mut self,
    ctx: &mut ParseContext,
    text: &str,
  ) -> Result<Vec<Node>, ParseError> {
    self.descend(ctx, text, Self::inline_nodes)
  }

  /// Parse block text one level deeper, without heading tokens.
  /// `no_wrap` splices paragraph content instead of wrapping it.
  ///
  /// # Errors
  ///
  /// Returns an error if the deadline passes.
  pub fn parse_block_fragment(
    &mut self,
    ctx: &mut ParseContext,
    text: &str,
    no_wrap: bool,
  ) -> Result<Vec<Node>, ParseError> {
    self.descend(ctx, text, |parser, ctx, text| {
      let tokens =
        parser.lex(ctx, text, Mode::BlockNoHeading, Gates::default())?;
      let result = parser.blocks(ctx, &tokens, !no_wrap);
      parser.release(ctx.depth, tokens);
      result
    })
  }

  fn descend<F>(
    &mut self,
    ctx: &mut ParseContext,
    text: &str,
    parse: F,
  ) -> Result<Vec<Node>, ParseError>
  where
    F: FnOnce(&mut Self, &mut ParseContext, &str) -> Result<Vec<Node>, ParseError>,
  {
    ctx.check_deadline()?;
    if ctx.depth >= self.options.max_depth {
      log::warn!(
        "nesting depth {} reached, degrading to plain text",
        self.options.max_depth
      );
      return Ok(plain_text(text));
    }
    ctx.depth += 1;
    let result = parse(self, ctx, text);
    ctx.depth -= 1;
    result
  }

  /// Lex `text` into the scratch buffer of the current depth.
  fn lex(
    &mut self,
    ctx: &ParseContext,
    text: &str,
    mode: Mode,
    gates: Gates,
  ) -> Result<Vec<Token>, ParseError> {
    let depth = ctx.depth;
    if self.frames.len() <= depth {
      self.frames.resize_with(depth + 1, Vec::new);
    }
    let mut tokens = std::mem::take(&mut self.frames[depth]);
    tokens.clear();
    let mut lexer = Lexer::new(text, mode)
      .with_gates(gates)
      .with_deadline(ctx.deadline().clone());
    tokens.extend(lexer.by_ref());
    if lexer.interrupted() {
      self.release(depth, tokens);
      return Err(ParseError::stopped_by(ctx.deadline()));
    }
    Ok(tokens)
  }

  /// Hand a scratch buffer back to its depth slot.
  fn release(&mut self, depth: usize, tokens: Vec<Token>) {
    if let Some(slot) = self.frames.get_mut(depth) {
      *slot = tokens;
    }
  }
}
