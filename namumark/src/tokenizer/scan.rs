//! Nested-delimiter scanning shared by the token matchers.
//!
//! All delimiters are ASCII, so scanning works on bytes and every offset
//! returned lands on a `char` boundary.
//!
//! [`find_closing`] scans forward from a single opener. A [`Scanner`] answers
//! the same question for every opener of one text: each [`PairIndex`] pairs
//! all openers of a [`Delimiter`] in one pass, so a run of openers that never
//! close costs linear time instead of one rescan per opener.
use std::{cell::OnceCell, collections::HashMap};

use super::block::is_heading_line;

/// Behaviour switches for [`find_closing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
  /// Allow the span to cross line breaks.
  pub allow_newline:    bool,
  /// Jump over `{{{ ... }}}` regions so their content cannot close the span.
  pub skip_literal:     bool,
  /// Give up when a heading-like line appears inside the span.
  pub abort_on_heading: bool,
}

impl ScanOptions {
  pub const INLINE: Self = Self {
    allow_newline:    false,
    skip_literal:     true,
    abort_on_heading: false,
  };
  pub const MULTILINE: Self = Self {
    allow_newline:    true,
    skip_literal:     true,
    abort_on_heading: true,
  };
  pub const LITERAL: Self = Self {
    allow_newline:    true,
    skip_literal:     false,
    abort_on_heading: false,
  };
}

/// The delimiter pairs the inline matchers look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
  /// `{{{ ... }}}`, may span lines.
  Literal,
  /// `[[ ... ]]` on one line.
  Link,
  /// `[ ... ]` on one line.
  Macro,
  /// `[* ... ]`, may span lines but not headings.
  Footnote,
  /// `( ... )` of a macro call.
  Args,
}

impl Delimiter {
  const COUNT: usize = 5;

  #[must_use]
  pub const fn open(self) -> &'static str {
    match self {
      Self::Literal => "{{{",
      Self::Link => "[[",
      Self::Macro | Self::Footnote => "[",
      Self::Args => "(",
    }
  }

  #[must_use]
  pub const fn close(self) -> &'static str {
    match self {
      Self::Literal => "}}}",
      Self::Link => "]]",
      Self::Macro | Self::Footnote => "]",
      Self::Args => ")",
    }
  }

  #[must_use]
  pub const fn options(self) -> ScanOptions {
    match self {
      Self::Literal => ScanOptions::LITERAL,
      Self::Footnote => ScanOptions::MULTILINE,
      Self::Link | Self::Macro | Self::Args => ScanOptions::INLINE,
    }
  }

  const fn slot(self) -> usize {
    match self {
      Self::Literal => 0,
      Self::Link => 1,
      Self::Macro => 2,
      Self::Footnote => 3,
      Self::Args => 4,
    }
  }
}

/// Byte length of the escape sequence starting at `i` (a backslash and the
/// character after it).
fn escape_len(text: &str, i: usize) -> usize {
  1 + text[i + 1..].chars().next().map_or(0, char::len_utf8)
}

/// Find the close delimiter matching an already consumed `open`.
///
/// `text` starts right after the opener. Returns the byte offset of the
/// matching `close` within `text`, i.e. the first point where the
/// open-count would go negative.
#[must_use]
pub fn find_closing(
  text: &str,
  open: &str,
  close: &str,
  options: ScanOptions,
) -> Option<usize> {
  let bytes = text.as_bytes();
  let mut depth = 0usize;
  let mut i = 0;
  while i < bytes.len() {
    match bytes[i] {
      b'\\' => {
        i += escape_len(text, i);
        continue;
      },
      b'\n' => {
        if !options.allow_newline {
          return None;
        }
        if options.abort_on_heading && heading_follows(text, i) {
          return None;
        }
        i += 1;
        continue;
      },
      _ => {},
    }
    let rest = &bytes[i..];
    if options.skip_literal && open != "{{{" && rest.starts_with(b"{{{") {
      if let Some(end) =
        find_closing(&text[i + 3..], "{{{", "}}}", ScanOptions::LITERAL)
      {
        let skipped = &text[i..i + 3 + end];
        if !options.allow_newline && skipped.contains('\n') {
          return None;
        }
        i += 3 + end + 3;
        continue;
      }
      i += 3;
      continue;
    }
    if rest.starts_with(close.as_bytes()) {
      if depth == 0 {
        return Some(i);
      }
      depth -= 1;
      i += close.len();
      continue;
    }
    if rest.starts_with(open.as_bytes()) {
      depth += 1;
      i += open.len();
      continue;
    }
    i += 1;
  }
  None
}

/// Whether the line after the newline at `i` looks like a heading.
fn heading_follows(text: &str, i: usize) -> bool {
  let line = text[i + 1..].split('\n').next().unwrap_or_default();
  is_heading_line(line)
}

/// Answer of a [`PairIndex`] lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
  /// The opener closes at this offset.
  Closed(usize),
  Unclosed,
  /// The offset is not inside an opener run the pass saw.
  Unknown,
}

/// Where every opener of one [`Delimiter`] closes.
///
/// Built by a single pass that tokenizes like [`find_closing`] and keeps the
/// pending openers on a stack, so the closer of each opener is the one that
/// pops it.
#[derive(Debug, Clone, Default)]
pub struct PairIndex {
  width:   usize,
  /// Maximal runs of the opener byte met by the pass, as `(start, end)`.
  runs:    Vec<(usize, usize)>,
  closers: HashMap<usize, usize>,
}

impl PairIndex {
  /// Pair the openers of `delimiter` in `text`. `literals` is the literal
  /// index of the same text, consulted when literal regions are skipped.
  #[must_use]
  pub fn build(
    text: &str,
    delimiter: Delimiter,
    literals: Option<&Self>,
  ) -> Self {
    let options = delimiter.options();
    let open = delimiter.open().as_bytes();
    let close = delimiter.close().as_bytes();
    let bytes = text.as_bytes();
    let mut index = Self {
      width: open.len(),
      ..Self::default()
    };
    let mut pending: Vec<usize> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
      match bytes[i] {
        b'\\' => {
          i += escape_len(text, i);
          continue;
        },
        b'\n' => {
          if !options.allow_newline
            || (options.abort_on_heading && heading_follows(text, i))
          {
            pending.clear();
          }
          i += 1;
          continue;
        },
        _ => {},
      }
      let rest = &bytes[i..];
      if options.skip_literal
        && delimiter != Delimiter::Literal
        && rest.starts_with(b"{{{")
      {
        let end = match literals.map_or(Lookup::Unknown, |l| l.lookup(i)) {
          Lookup::Closed(end) => Some(end),
          Lookup::Unclosed => None,
          Lookup::Unknown => {
            find_closing(&text[i + 3..], "{{{", "}}}", ScanOptions::LITERAL)
              .map(|end| i + 3 + end)
          },
        };
        match end {
          Some(end) => {
            if !options.allow_newline && text[i..end].contains('\n') {
              pending.clear();
            }
            i = end + 3;
          },
          None => i += 3,
        }
        continue;
      }
      if rest.starts_with(close) {
        if let Some(opener) = pending.pop() {
          index.closers.insert(opener, i);
        }
        i += close.len();
        continue;
      }
      if rest.starts_with(open) {
        let run = rest.iter().take_while(|b| **b == open[0]).count();
        index.runs.push((i, i + run));
        pending.extend((0..run / index.width).map(|k| i + k * index.width));
        i += run;
        continue;
      }
      i += 1;
    }
    index
  }

  /// Where the opener starting at `at` closes.
  #[must_use]
  pub fn lookup(&self, at: usize) -> Lookup {
    let slot = self.runs.partition_point(|(start, _)| *start <= at);
    let Some(&(start, end)) = slot.checked_sub(1).and_then(|s| self.runs.get(s))
    else {
      return Lookup::Unknown;
    };
    if at + self.width > end {
      return Lookup::Unknown;
    }
    // A scan from `at` tokenizes the rest of the run like the pass did, so it
    // pairs like the pass's opener with as many openers left behind it.
    let left = (end - at - self.width) / self.width;
    let total = (end - start - self.width) / self.width;
    let opener = start + self.width * (total - left);
    self
      .closers
      .get(&opener)
      .map_or(Lookup::Unclosed, |close| Lookup::Closed(*close))
  }

  /// Every opener the pass pushed, with its closer if it has one.
  pub fn openers(&self) -> impl Iterator<Item = (usize, Option<usize>)> + '_ {
    self.runs.iter().flat_map(move |&(start, end)| {
      (start..=end - self.width)
        .step_by(self.width)
        .map(|opener| (opener, self.closers.get(&opener).copied()))
    })
  }
}

/// Lazily built delimiter indexes over one text.
///
/// Offsets taken and returned are absolute within the text.
#[derive(Debug, Clone, Default)]
pub struct Scanner<'a> {
  text:     &'a str,
  pairs:    [OnceCell<PairIndex>; Delimiter::COUNT],
  newlines: OnceCell<Vec<usize>>,
}

impl<'a> Scanner<'a> {
  #[must_use]
  pub const fn new(text: &'a str) -> Self {
    Self {
      text,
      pairs: [const { OnceCell::new() }; Delimiter::COUNT],
      newlines: OnceCell::new(),
    }
  }

  #[must_use]
  pub fn index(&self, delimiter: Delimiter) -> &PairIndex {
    self.pairs[delimiter.slot()].get_or_init(|| {
      let literals = (delimiter != Delimiter::Literal
        && delimiter.options().skip_literal)
        .then(|| self.index(Delimiter::Literal));
      PairIndex::build(self.text, delimiter, literals)
    })
  }

  /// Offset of the closer matching the `delimiter` opener at `at`.
  #[must_use]
  pub fn closing(&self, delimiter: Delimiter, at: usize) -> Option<usize> {
    match self.index(delimiter).lookup(at) {
      Lookup::Closed(close) => Some(close),
      Lookup::Unclosed => None,
      Lookup::Unknown => {
        let body = at + delimiter.open().len();
        find_closing(
          self.text.get(body..)?,
          delimiter.open(),
          delimiter.close(),
          delimiter.options(),
        )
        .map(|end| body + end)
      },
    }
  }

  /// Whether `start..end` lies on one line.
  fn same_line(&self, start: usize, end: usize) -> bool {
    let newlines = self.newlines.get_or_init(|| {
      self.text.match_indices('\n').map(|(i, _)| i).collect()
    });
    newlines.partition_point(|n| *n < start)
      == newlines.partition_point(|n| *n < end)
  }

  /// Find a same-character delimiter (`'''`, `~~`, ...) at or after `from`
  /// on the same line. Literal regions are skipped and escapes respected.
  #[must_use]
  pub fn find_on_line(&self, from: usize, delimiter: &str) -> Option<usize> {
    let bytes = self.text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
      match bytes[i] {
        b'\\' => {
          i += escape_len(self.text, i);
          continue;
        },
        b'\n' => return None,
        _ => {},
      }
      let rest = &bytes[i..];
      if rest.starts_with(b"{{{") {
        match self.closing(Delimiter::Literal, i) {
          Some(end) if self.same_line(i, end) => {
            i = end + 3;
            continue;
          },
          _ => return None,
        }
      }
      if rest.starts_with(delimiter.as_bytes()) {
        return Some(i);
      }
      i += 1;
    }
    None
  }

  /// Find the first unescaped `needle` in `from..to` outside literal regions
  /// that close before `to`.
  #[must_use]
  pub fn find_unescaped(
    &self,
    from: usize,
    to: usize,
    needle: &str,
  ) -> Option<usize> {
    let bytes = &self.text.as_bytes()[..to];
    let mut i = from;
    while i < to {
      if bytes[i] == b'\\' {
        i += escape_len(self.text, i);
        continue;
      }
      if bytes[i..].starts_with(b"{{{")
        && let Some(end) = self.closing(Delimiter::Literal, i)
        && end + 3 <= to
      {
        i = end + 3;
        continue;
      }
      if bytes[i..].starts_with(needle.as_bytes()) {
        return Some(i);
      }
      i += 1;
    }
    None
  }
}

/// Find a same-character delimiter (`'''`, `~~`, ...) later on the same
/// line. Literal regions are skipped and escapes respected.
#[must_use]
pub fn find_on_line(text: &str, delimiter: &str) -> Option<usize> {
  Scanner::new(text).find_on_line(0, delimiter)
}

/// Split on an unescaped separator that is outside literal regions and
/// outside any `[[`/`]]` or `(`/`)` nesting. Used for macro arguments and
/// link display text.
#[must_use]
pub fn split_unescaped<'a>(text: &'a str, separator: char) -> Vec<&'a str> {
  let scanner = Scanner::new(text);
  let bytes = text.as_bytes();
  let mut parts = Vec::new();
  let mut start = 0;
  let mut nesting = 0usize;
  let mut i = 0;
  while i < bytes.len() {
    match bytes[i] {
      b'\\' => {
        i += escape_len(text, i);
        continue;
      },
      b'{' if bytes[i..].starts_with(b"{{{") => {
        if let Some(end) = scanner.closing(Delimiter::Literal, i) {
          i = end + 3;
          continue;
        }
      },
      b'[' | b'(' => nesting += 1,
      b']' | b')' => nesting = nesting.saturating_sub(1),
      byte if nesting == 0 && char::from(byte) == separator => {
        parts.push(&text[start..i]);
        start = i + 1;
      },
      _ => {},
    }
    i += 1;
  }
  parts.push(&text[start..]);
  parts
}

/// Find the first unescaped occurrence of `needle` outside literal regions.
#[must_use]
pub fn find_unescaped(text: &str, needle: &str) -> Option<usize> {
  Scanner::new(text).find_unescaped(0, text.len(), needle)
}
#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_find_closing_nested() {
    let text = "a [[b]] c]] tail";
    assert_eq!(find_closing(text, "[[", "]]", ScanOptions::INLINE), Some(9));
  }

  #[test]
  fn test_find_closing_respects_escape() {
    assert_eq!(
      find_closing(r"a\]]b]]", "[[", "]]", ScanOptions::INLINE),
      Some(5)
    );
    // An even run of backslashes does not escape.
    assert_eq!(
      find_closing(r"a\\]]b]]", "[[", "]]", ScanOptions::INLINE),
      Some(3)
    );
  }

  #[test]
  fn test_find_closing_newline_policy() {
    assert_eq!(find_closing("a\nb]]", "[[", "]]", ScanOptions::INLINE), None);
    assert_eq!(
      find_closing("a\nb}}}", "{{{", "}}}", ScanOptions::LITERAL),
      Some(3)
    );
  }

  #[test]
  fn test_find_closing_aborts_on_heading() {
    let text = "body\n== Heading ==\nmore]]";
    assert_eq!(find_closing(text, "[[", "]]", ScanOptions::MULTILINE), None);
  }

  #[test]
  fn test_find_closing_skips_literal() {
    let text = "x {{{]]}}} y]]";
    assert_eq!(find_closing(text, "[[", "]]", ScanOptions::INLINE), Some(12));
  }

  #[test]
  fn test_unclosed_returns_none() {
    assert_eq!(find_closing("never", "[[", "]]", ScanOptions::INLINE), None);
  }

  #[test]
  fn test_find_on_line() {
    assert_eq!(find_on_line("bold''' rest", "'''"), Some(4));
    assert_eq!(find_on_line("no\nclose'''", "'''"), None);
    assert_eq!(find_on_line("{{{'''}}}x'''", "'''"), Some(10));
  }

  #[test]
  fn test_split_unescaped() {
    assert_eq!(split_unescaped(r"a, b\, c, [[x,y]]", ','), vec![
      "a",
      r" b\, c",
      " [[x,y]]"
    ]);
  }

  fn assert_index_agrees(text: &str, delimiter: Delimiter) {
    let scanner = Scanner::new(text);
    let open = delimiter.open();
    let openers = (0..text.len())
      .filter(|i| text.is_char_boundary(*i) && text[*i..].starts_with(open));
    for at in openers {
      let body = at + open.len();
      let direct = find_closing(
        &text[body..],
        open,
        delimiter.close(),
        delimiter.options(),
      )
      .map(|end| body + end);
      assert_eq!(
        scanner.closing(delimiter, at),
        direct,
        "{delimiter:?} opener at {at} in {text:?}"
      );
    }
  }

  #[test]
  fn test_pair_index_matches_direct_scan() {
    let texts = [
      "[[a[[b]]c]] [[x\n]] [[[[[y]] {{{[[}}}]] \\[[z]] [[[",
      "[a[b]c] [[d] [e\n] [* f {{{\n]}}} g] ]",
      "[*a\n[b]\n== h ==\n] [*c\nd]",
      "{{{{a}}}}}} {{{ \\}}} }}} {{{{{{ x }}} {{{\n}}}",
      "(a(b)c) (( {{{)}}} ) (\n) ((((x)",
    ];
    for text in texts {
      for delimiter in [
        Delimiter::Literal,
        Delimiter::Link,
        Delimiter::Macro,
        Delimiter::Footnote,
        Delimiter::Args,
      ] {
        assert_index_agrees(text, delimiter);
      }
    }
  }

  #[test]
  fn test_long_opener_runs() {
    let text = "[[".repeat(5000);
    let scanner = Scanner::new(&text);
    assert!(
      (0..text.len() - 1)
        .all(|at| scanner.closing(Delimiter::Link, at).is_none())
    );

    let text = format!("{}{}", "[".repeat(300), "]".repeat(300));
    assert_index_agrees(&text, Delimiter::Macro);
    assert_index_agrees(&text, Delimiter::Link);
  }

  #[test]
  fn test_scanner_find_unescaped_bounds() {
    let scanner = Scanner::new("a{{{|}}}b|c {{{ | d}}}");
    assert_eq!(scanner.find_unescaped(0, 22, "|"), Some(9));
    // A literal that closes past the bound does not hide the needle.
    assert_eq!(scanner.find_unescaped(12, 18, "|"), Some(16));
    assert_eq!(find_unescaped(r"a\|b|", "|"), Some(4));
  }
}
