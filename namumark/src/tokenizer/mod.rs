//! Context-sensitive tokenizer.
//!
//! A [`Lexer`] turns text into a lazy stream of [`Token`]s. The token set
//! depends on the [`Mode`]: block lexing works line by line and only matches
//! line-start constructs, inline lexing recognises spans inside a line, and
//! table-cell lexing splits a row into cells. Matchers are tried in priority
//! order and the first success wins.
//!
//! Closers are looked up in indexes built once per lexed text (see
//! [`scan::Scanner`]), so a lexer runs in time linear in its input. A lexer
//! given a [`Deadline`] also stops early once it expires.
use std::{cell::OnceCell, ops::Range};

use serde::{Deserialize, Serialize};

use self::{
  block::BlockIndex,
  scan::{Delimiter, Scanner},
};
use crate::{deadline::Deadline, utils::css::ThemedColor};

mod block;
mod cell;
mod inline;
pub mod scan;

pub use block::{is_heading_line, parse_heading_line};
pub use inline::parse_brace;

/// Which token set a [`Lexer`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
  /// Top-level block context.
  Block,
  /// Block context without heading tokens (containers, comment sources).
  BlockNoHeading,
  /// Inline spans only.
  Inline,
  /// One table row split into cells.
  TableCell,
}

/// Context gates consulted by context-sensitive matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gates {
  /// Comment numbers (`#12`) and mentions (`@name`) are recognised.
  pub thread: bool,
}

/// List marker families. Mixing families breaks a list run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListMarker {
  Bullet,
  Decimal,
  LowerAlpha,
  UpperAlpha,
  LowerRoman,
  UpperRoman,
}

impl ListMarker {
  /// HTML list tag and `type` attribute for the marker.
  #[must_use]
  pub const fn html(self) -> (&'static str, Option<&'static str>) {
    match self {
      Self::Bullet => ("ul", None),
      Self::Decimal => ("ol", Some("1")),
      Self::LowerAlpha => ("ol", Some("a")),
      Self::UpperAlpha => ("ol", Some("A")),
      Self::LowerRoman => ("ol", Some("i")),
      Self::UpperRoman => ("ol", Some("I")),
    }
  }
}

/// Inline text decorations written with doubled delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextStyle {
  Bold,
  Italic,
  Underline,
  Strike,
  Superscript,
  Subscript,
}

impl TextStyle {
  /// Delimiters in matcher priority order.
  pub const DELIMITERS: [(&'static str, Self); 7] = [
    ("'''", Self::Bold),
    ("''", Self::Italic),
    ("__", Self::Underline),
    ("~~", Self::Strike),
    ("--", Self::Strike),
    ("^^", Self::Superscript),
    (",,", Self::Subscript),
  ];

  #[must_use]
  pub const fn tag(self) -> &'static str {
    match self {
      Self::Bold => "strong",
      Self::Italic => "em",
      Self::Underline => "u",
      Self::Strike => "del",
      Self::Superscript => "sup",
      Self::Subscript => "sub",
    }
  }
}

/// The head of a `{{{ ... }}}` construct, deciding what the body means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BraceHead {
  /// Preformatted literal text.
  Plain,
  /// `#!syntax lang` code block.
  Syntax { lang: String },
  /// `#!html` raw HTML, sanitized on output.
  Html,
  /// `#!wiki style="..."` custom-style block.
  Wiki { attrs: String },
  /// `#!folding summary` collapsible block.
  Folding { summary: String },
  /// `#!if expr` conditional block.
  If { expr: String },
  /// `+N` / `-N` scaled text.
  Size(i8),
  /// `#color` or `#light,#dark` colored text.
  Color(ThemedColor),
}

/// Typed token payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
  // Block.
  Redirect {
    target: String,
  },
  Heading {
    level:   u8,
    closed:  bool,
    content: String,
  },
  HorizontalRule,
  BlockQuote {
    content: String,
  },
  ListItem {
    indent:  usize,
    marker:  ListMarker,
    start:   Option<u32>,
    content: String,
  },
  Indent {
    content: String,
  },
  TableRow {
    caption: Option<String>,
    raw:     String,
  },
  TextLine {
    content: String,
  },
  BlankLine,

  // Inline.
  Text(String),
  Escaped(char),
  Styled {
    style: TextStyle,
    inner: String,
  },
  Literal {
    head: BraceHead,
    body: String,
  },
  Link {
    target:  String,
    display: Option<String>,
  },
  Footnote {
    name:    Option<String>,
    content: String,
  },
  Macro {
    name: String,
    args: Option<String>,
  },
  LineBreak,
  CommentNumber(u64),
  Mention(String),

  // Table cell.
  Cell {
    content: String,
  },
}

/// A matched token: payload, byte span and the (0-based, inclusive) lines
/// it covers within the lexed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
  pub kind:       TokenKind,
  pub span:       Range<usize>,
  pub start_line: usize,
  pub end_line:   usize,
}

/// Tokens lexed between two deadline checks.
const CHECK_EVERY: u32 = 32;

/// A lazy token stream over one piece of text.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
  text:        &'a str,
  pos:         usize,
  line:        usize,
  mode:        Mode,
  gates:       Gates,
  scanner:     Scanner<'a>,
  blocks:      OnceCell<BlockIndex>,
  deadline:    Option<Deadline>,
  steps:       u32,
  interrupted: bool,
}

impl<'a> Lexer<'a> {
  #[must_use]
  pub const fn new(text: &'a str, mode: Mode) -> Self {
    Self {
      text,
      pos: 0,
      line: 0,
      mode,
      gates: Gates { thread: false },
      scanner: Scanner::new(text),
      blocks: OnceCell::new(),
      deadline: None,
      steps: 0,
      interrupted: false,
    }
  }

  #[must_use]
  pub const fn with_gates(mut self, gates: Gates) -> Self {
    self.gates = gates;
    self
  }

  /// Stop the stream once `deadline` expires or is cancelled.
  #[must_use]
  pub fn with_deadline(mut self, deadline: Deadline) -> Self {
    self.deadline = Some(deadline);
    self
  }

  /// True if the stream ended because its deadline ran out rather than at
  /// the end of the text.
  #[must_use]
  pub const fn interrupted(&self) -> bool {
    self.interrupted
  }

  #[must_use]
  pub const fn mode(&self) -> Mode {
    self.mode
  }

  /// The text not consumed yet.
  #[must_use]
  pub fn remaining(&self) -> &'a str {
    &self.text[self.pos..]
  }

  fn emit(&mut self, kind: TokenKind, end: usize, lines: usize) -> Token {
    let token = Token {
      kind,
      span: self.pos..end,
      start_line: self.line,
      end_line: self.line + lines,
    };
    self.pos = end;
    self.line += lines;
    token
  }

  fn block_index(&self, headings: bool) -> &BlockIndex {
    self.blocks.get_or_init(|| {
      BlockIndex::build(
        self.text,
        self.scanner.index(Delimiter::Literal),
        headings,
      )
    })
  }

  fn out_of_time(&mut self) -> bool {
    let check = self.steps.is_multiple_of(CHECK_EVERY);
    self.steps = self.steps.wrapping_add(1);
    if check
      && let Some(deadline) = &self.deadline
      && (deadline.is_cancelled() || deadline.is_expired())
    {
      log::debug!("lexer stopped at byte {} of {}", self.pos, self.text.len());
      self.interrupted = true;
    }
    self.interrupted
  }
}

impl Iterator for Lexer<'_> {
  type Item = Token;

  fn next(&mut self) -> Option<Token> {
    if self.pos >= self.text.len() || self.out_of_time() {
      return None;
    }
    let token = match self.mode {
      Mode::Block => self.next_block(true),
      Mode::BlockNoHeading => self.next_block(false),
      Mode::Inline => self.next_inline(),
      Mode::TableCell => self.next_cell(),
    };
    log::trace!("token {:?} at {:?}", token.kind, token.span);
    Some(token)
  }
}
