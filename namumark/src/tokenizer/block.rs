//! Line-start matchers for block-mode lexing.
use super::{Lexer, ListMarker, TokenKind, scan::PairIndex};
use crate::utils::literal::LiteralTracker;

/// Parse a full heading line: `== text ==` (levels 1-6), `==# text #==` for
/// a closed (folded) heading. Returns level, closed flag and content.
#[must_use]
pub fn parse_heading_line(line: &str) -> Option<(u8, bool, &str)> {
  let line = line.trim_end();
  let level = line.bytes().take_while(|b| *b == b'=').count();
  if !(1..=6).contains(&level) {
    return None;
  }
  let rest = &line[level..];
  let (closed, rest) = rest
    .strip_prefix('#')
    .map_or((false, rest), |stripped| (true, stripped));
  let inner = rest.strip_prefix(' ')?;
  let closing = format!("{}{}", if closed { "#" } else { "" }, "=".repeat(level));
  let content = inner.strip_suffix(closing.as_str())?.strip_suffix(' ')?;
  let content = content.trim();
  if content.is_empty() || content.ends_with('=') {
    return None;
  }
  u8::try_from(level).ok().map(|level| (level, closed, content))
}

/// True if `line` would be lexed as a heading in block mode.
#[must_use]
pub fn is_heading_line(line: &str) -> bool {
  parse_heading_line(line).is_some()
}

fn is_horizontal_rule(line: &str) -> bool {
  let line = line.trim_end();
  (4..=9).contains(&line.len()) && line.bytes().all(|b| b == b'-')
}

/// A parsed list marker line: indent, marker, explicit start and the byte
/// offset where the item content begins.
pub(super) struct ListLine {
  pub indent:        usize,
  pub marker:        ListMarker,
  pub start:         Option<u32>,
  pub content_start: usize,
}

const ORDERED_MARKERS: [(&str, ListMarker); 5] = [
  ("1.", ListMarker::Decimal),
  ("a.", ListMarker::LowerAlpha),
  ("A.", ListMarker::UpperAlpha),
  ("i.", ListMarker::LowerRoman),
  ("I.", ListMarker::UpperRoman),
];

pub(super) fn parse_list_line(line: &str) -> Option<ListLine> {
  let indent = line.bytes().take_while(|b| *b == b' ').count();
  if indent == 0 {
    return None;
  }
  let rest = &line[indent..];
  if let Some(after) = rest.strip_prefix('*') {
    let skip = usize::from(after.starts_with(' '));
    return Some(ListLine {
      indent,
      marker: ListMarker::Bullet,
      start: None,
      content_start: indent + 1 + skip,
    });
  }
  for (prefix, marker) in ORDERED_MARKERS {
    let Some(after) = rest.strip_prefix(prefix) else {
      continue;
    };
    let mut consumed = indent + prefix.len();
    let mut start = None;
    let mut after = after;
    if let Some(number) = after.strip_prefix('#') {
      let digits = number.bytes().take_while(u8::is_ascii_digit).count();
      if digits > 0 {
        start = number[..digits].parse().ok();
        consumed += 1 + digits;
        after = &number[digits..];
      }
    }
    if after.is_empty() {
      return Some(ListLine {
        indent,
        marker,
        start,
        content_start: consumed,
      });
    }
    if after.starts_with(' ') {
      return Some(ListLine {
        indent,
        marker,
        start,
        content_start: consumed + 1,
      });
    }
  }
  None
}

fn leading_spaces(line: &str) -> usize {
  line.bytes().take_while(|b| *b == b' ').count()
}

impl Lexer<'_> {
  fn line_at(&self, start: usize) -> (&str, usize) {
    let end = self.text[start..]
      .find('\n')
      .map_or(self.text.len(), |i| start + i);
    (&self.text[start..end], end)
  }

  /// Lines after the current one, as `(text, end offset)` pairs.
  fn following_lines(&self, from_end: usize) -> FollowingLines<'_> {
    FollowingLines {
      text: self.text,
      pos:  from_end,
    }
  }

  pub(super) fn next_block(&mut self, headings: bool) -> super::Token {
    let start = self.pos;
    let (line, line_end) = self.line_at(start);
    let (kind, end, extra) = self.match_block_line(line, line_end, headings);
    let token = self.emit(kind, end, extra);
    if self.text.as_bytes().get(self.pos) == Some(&b'\n') {
      self.pos += 1;
      self.line += 1;
    }
    token
  }

  /// Try the block matchers on the line starting at `self.pos`. Returns the
  /// token, the end offset (exclusive) and the number of extra lines
  /// consumed.
  fn match_block_line(
    &self,
    line: &str,
    line_end: usize,
    headings: bool,
  ) -> (TokenKind, usize, usize) {
    if self.pos == 0
      && headings
      && let Some(target) = parse_redirect(line)
    {
      return (TokenKind::Redirect { target }, line_end, 0);
    }
    if line.trim().is_empty() {
      return (TokenKind::BlankLine, line_end, 0);
    }
    if headings && let Some((level, closed, content)) = parse_heading_line(line)
    {
      return (
        TokenKind::Heading {
          level,
          closed,
          content: content.to_string(),
        },
        line_end,
        0,
      );
    }
    if is_horizontal_rule(line) {
      return (TokenKind::HorizontalRule, line_end, 0);
    }
    if line.starts_with('>') {
      return self.match_quote(line, line_end, headings);
    }
    if line.starts_with('|')
      && let Some(row) = self.match_table_row(line, line_end, headings)
    {
      return row;
    }
    if let Some(item) = parse_list_line(line) {
      return self.match_list_item(line, line_end, &item, headings);
    }
    if line.starts_with(' ') {
      return self.match_indent(line, line_end, headings);
    }
    self.match_text_line(line_end, headings)
  }

  fn match_quote(
    &self,
    line: &str,
    line_end: usize,
    headings: bool,
  ) -> (TokenKind, usize, usize) {
    let strip = |l: &str| -> String {
      let l = l.strip_prefix('>').unwrap_or(l);
      l.strip_prefix(' ').unwrap_or(l).to_string()
    };
    let mut content = strip(line);
    let mut tracker = LiteralTracker::new().process_line(line);
    let mut end = line_end;
    let mut extra = 0;
    for (next, next_end) in self.following_lines(line_end) {
      let continues = if tracker.is_open() {
        !(headings && is_heading_line(next))
      } else {
        next.starts_with('>')
      };
      if !continues {
        break;
      }
      content.push('\n');
      if tracker.is_open() {
        content.push_str(next);
      } else {
        content.push_str(&strip(next));
      }
      tracker = tracker.process_line(next);
      end = next_end;
      extra += 1;
    }
    (TokenKind::BlockQuote { content }, end, extra)
  }

  fn match_table_row(
    &self,
    line: &str,
    line_end: usize,
    headings: bool,
  ) -> Option<(TokenKind, usize, usize)> {
    let (caption, body_start) = if line.starts_with("||") {
      (None, 2)
    } else {
      let close = line[1..].find('|')? + 1;
      if close == 1 {
        return None;
      }
      (Some(line[1..close].to_string()), close + 1)
    };
    let start = self.pos;
    let lines = self.block_index(headings);
    let first = lines.line_of(start);
    let last = lines.row_end(first, row_closes(line, body_start))?;
    let end = if last == first { line_end } else { lines.end_of(last) };
    let extra = last - first;
    let span = &self.text[start + body_start..end];
    let raw = span.trim_end();
    let raw = raw.strip_suffix("||").unwrap_or(raw);
    Some((
      TokenKind::TableRow {
        caption,
        raw: raw.to_string(),
      },
      end,
      extra,
    ))
  }

  fn match_list_item(
    &self,
    line: &str,
    line_end: usize,
    item: &ListLine,
    headings: bool,
  ) -> (TokenKind, usize, usize) {
    let mut content = line[item.content_start..].to_string();
    let mut tracker = LiteralTracker::new().process_line(line);
    let mut end = line_end;
    let mut extra = 0;
    for (next, next_end) in self.following_lines(line_end) {
      let open = tracker.is_open();
      if open && headings && is_heading_line(next) {
        break;
      }
      if !open && (next.trim().is_empty() || leading_spaces(next) <= item.indent)
      {
        break;
      }
      content.push('\n');
      if open {
        content.push_str(next);
      } else {
        let stripped = &next[item.indent..];
        if parse_list_line(stripped).is_some() {
          content.push_str(stripped);
        } else {
          content.push_str(&stripped[1..]);
        }
      }
      tracker = tracker.process_line(next);
      end = next_end;
      extra += 1;
    }
    (
      TokenKind::ListItem {
        indent: item.indent,
        marker: item.marker,
        start: item.start,
        content,
      },
      end,
      extra,
    )
  }

  fn match_indent(
    &self,
    line: &str,
    line_end: usize,
    headings: bool,
  ) -> (TokenKind, usize, usize) {
    let mut content = line[1..].to_string();
    let mut tracker = LiteralTracker::new().process_line(line);
    let mut end = line_end;
    let mut extra = 0;
    for (next, next_end) in self.following_lines(line_end) {
      let continues = if tracker.is_open() {
        !(headings && is_heading_line(next))
      } else {
        next.starts_with(' ')
          && !next.trim().is_empty()
          && parse_list_line(next).is_none_or(|l| l.indent > 1)
      };
      if !continues {
        break;
      }
      content.push('\n');
      if tracker.is_open() {
        content.push_str(next);
      } else {
        content.push_str(&next[1..]);
      }
      tracker = tracker.process_line(next);
      end = next_end;
      extra += 1;
    }
    (TokenKind::Indent { content }, end, extra)
  }

  fn match_text_line(
    &self,
    line_end: usize,
    headings: bool,
  ) -> (TokenKind, usize, usize) {
    let lines = self.block_index(headings);
    let first = lines.line_of(self.pos);
    let last = lines.text_end(first);
    let end = if last == first { line_end } else { lines.end_of(last) };
    let extra = last - first;
    let content = self.text[self.pos..end].to_string();
    (TokenKind::TextLine { content }, end, extra)
  }
}

const NEVER: usize = usize::MAX;

/// Per-line answers for the two matchers that look ahead past an open
/// literal region: text lines and table rows. Built once per lexed text
/// from the literal [`PairIndex`], so the lookahead never rescans lines.
///
/// A "span" from line `j` is the lines a fresh [`LiteralTracker`] started
/// at `j` walks before it is closed again.
#[derive(Debug, Clone, Default)]
pub(super) struct BlockIndex {
  starts:    Vec<usize>,
  ends:      Vec<usize>,
  /// Latest line on which a literal opened on the line closes, `NEVER`
  /// when one of them never closes.
  reach:     Vec<usize>,
  /// Last line of the span from each line, with heading lines acting as
  /// barriers. `NEVER` when the span does not close.
  text_span: Vec<usize>,
  /// Last line of the span from each line, ignoring headings.
  span:      Vec<usize>,
  /// Line ends with `||`.
  bars:      Vec<bool>,
  /// Line on which a table row scan entered with a closed tracker finds its
  /// closing `||`.
  row_end:   Vec<usize>,
}

impl BlockIndex {
  pub(super) fn build(
    text: &str,
    literals: &PairIndex,
    headings: bool,
  ) -> Self {
    let mut starts = vec![0];
    starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
    let ends: Vec<usize> = starts
      .iter()
      .skip(1)
      .map(|next| next - 1)
      .chain(std::iter::once(text.len()))
      .collect();
    let line_of =
      |offset: usize| starts.partition_point(|s| *s <= offset) - 1;

    let mut reach: Vec<usize> = (0..starts.len()).collect();
    for (opener, close) in literals.openers() {
      let line = line_of(opener);
      reach[line] =
        close.map_or(NEVER, |close| reach[line].max(line_of(close)));
    }
    let lines = || starts.iter().zip(&ends).map(|(s, e)| &text[*s..*e]);
    let heading: Vec<bool> =
      lines().map(|line| headings && is_heading_line(line)).collect();
    let bars: Vec<bool> =
      lines().map(|line| line.trim_end().ends_with("||")).collect();

    let span = spans(&reach);
    let barred: Vec<usize> = reach
      .iter()
      .zip(&heading)
      .map(|(reach, heading)| if *heading { NEVER } else { *reach })
      .collect();
    let text_span = spans(&barred);

    let mut row_end = vec![NEVER; starts.len()];
    for line in (0..starts.len()).rev() {
      let after =
        |line: usize| row_end.get(line + 1).copied().unwrap_or(NEVER);
      let last = if heading[line] {
        NEVER
      } else if reach[line] <= line {
        if bars[line] { line } else { after(line) }
      } else {
        match span[line] {
          NEVER => NEVER,
          last if bars[last] => last,
          last => after(last),
        }
      };
      row_end[line] = last;
    }

    Self {
      starts,
      ends,
      reach,
      text_span,
      span,
      bars,
      row_end,
    }
  }

  pub(super) fn line_of(&self, offset: usize) -> usize {
    self.starts.partition_point(|s| *s <= offset).saturating_sub(1)
  }

  pub(super) fn end_of(&self, line: usize) -> usize {
    self.ends[line]
  }

  /// Last line of a text line starting at `line`. It only extends when a
  /// literal opened on it closes before any heading.
  pub(super) fn text_end(&self, line: usize) -> usize {
    if self.reach[line] <= line {
      return line;
    }
    match self.text_span[line] {
      NEVER => line,
      last => last,
    }
  }

  /// Last line of a table row starting at `line`, if the row closes.
  /// `closes_here` tells whether the first line alone is a complete row.
  pub(super) fn row_end(
    &self,
    line: usize,
    closes_here: bool,
  ) -> Option<usize> {
    let after = |line: usize| self.row_end.get(line + 1).copied();
    let last = if self.reach[line] <= line {
      if closes_here { Some(line) } else { after(line) }
    } else {
      match self.span[line] {
        NEVER => None,
        last if self.bars[last] => Some(last),
        last => after(last),
      }
    };
    last.filter(|last| *last != NEVER)
  }
}

/// Last line of the span from every line, given each line's `reach`.
///
/// Walks right to left and hops over whole spans, so every line is stepped
/// over a bounded number of times.
fn spans(reach: &[usize]) -> Vec<usize> {
  let mut spans = vec![NEVER; reach.len()];
  for line in (0..reach.len()).rev() {
    let target = reach[line];
    spans[line] = if target == NEVER {
      NEVER
    } else if target <= line {
      line
    } else {
      let mut next = line + 1;
      loop {
        match spans.get(next).copied() {
          None | Some(NEVER) => break NEVER,
          Some(last) if last >= target => break last,
          Some(last) => next = last + 1,
        }
      }
    };
  }
  spans
}

/// Whether a single-line table row ends with its closing `||`.
fn row_closes(line: &str, body_start: usize) -> bool {
  let trimmed = line.trim_end();
  trimmed.len() >= body_start + 2 && trimmed.ends_with("||")
}

fn parse_redirect(line: &str) -> Option<String> {
  const REDIRECT: &str = "#redirect ";
  let line = line.trim();
  let english = line
    .get(..REDIRECT.len())
    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(REDIRECT));
  let rest = if english {
    &line[REDIRECT.len()..]
  } else {
    line.strip_prefix("#넘겨주기 ")?
  };
  let target = rest.trim();
  (!target.is_empty()).then(|| target.to_string())
}

pub(super) struct FollowingLines<'a> {
  text: &'a str,
  pos:  usize,
}

impl<'a> Iterator for FollowingLines<'a> {
  type Item = (&'a str, usize);

  fn next(&mut self) -> Option<Self::Item> {
    if self.pos >= self.text.len() {
      return None;
    }
    // `pos` sits on the newline that ends the previous line.
    let start = self.pos + 1;
    if start > self.text.len() {
      return None;
    }
    let end = self.text[start..]
      .find('\n')
      .map_or(self.text.len(), |i| start + i);
    self.pos = end;
    Some((&self.text[start..end], end))
  }
}

#[cfg(test)]
mod tests {
  use super::super::{Lexer, Mode, TokenKind};
  use super::*;

  #[test]
  fn test_heading_levels() {
    assert_eq!(parse_heading_line("= a ="), Some((1, false, "a")));
    assert_eq!(parse_heading_line("====== a ======"), Some((6, false, "a")));
    assert_eq!(parse_heading_line("==# folded #=="), Some((2, true, "folded")));
    assert_eq!(parse_heading_line("======= a ======="), None);
    assert_eq!(parse_heading_line("== a ==="), None);
    assert_eq!(parse_heading_line("==a=="), None);
  }

  #[test]
  fn test_list_markers() {
    let item = parse_list_line(" 1.#3 three").map(|l| (l.marker, l.start));
    assert_eq!(item, Some((ListMarker::Decimal, Some(3))));
    assert!(parse_list_line("* no indent").is_none());
    assert!(parse_list_line(" 1.x").is_none());
  }

  #[test]
  fn test_list_continuation() {
    let tokens: Vec<TokenKind> =
      Lexer::new(" * a\n  * b\n * c", Mode::Block)
        .map(|t| t.kind)
        .collect();
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0], TokenKind::ListItem {
      indent:  1,
      marker:  ListMarker::Bullet,
      start:   None,
      content: "a\n * b".into(),
    });
  }

  #[test]
  fn test_list_consumes_open_literal() {
    let tokens: Vec<TokenKind> =
      Lexer::new(" * {{{#!wiki\nbody\n}}}\ntext", Mode::Block)
        .map(|t| t.kind)
        .collect();
    assert_eq!(tokens.len(), 2);
    assert!(matches!(
      &tokens[0],
      TokenKind::ListItem { content, .. } if content == "{{{#!wiki\nbody\n}}}"
    ));
  }

  #[test]
  fn test_multiline_table_row() {
    let tokens: Vec<TokenKind> =
      Lexer::new("||a\nb||c||\n||d||", Mode::Block)
        .map(|t| t.kind)
        .collect();
    assert_eq!(tokens, vec![
      TokenKind::TableRow {
        caption: None,
        raw:     "a\nb||c".into(),
      },
      TokenKind::TableRow {
        caption: None,
        raw:     "d".into(),
      },
    ]);
  }

  #[test]
  fn test_table_caption() {
    let tokens: Vec<TokenKind> = Lexer::new("|Caption|a||b||", Mode::Block)
      .map(|t| t.kind)
      .collect();
    assert_eq!(tokens, vec![TokenKind::TableRow {
      caption: Some("Caption".into()),
      raw:     "a||b".into(),
    }]);
  }

  #[test]
  fn test_text_line_spans_literal() {
    let tokens: Vec<TokenKind> =
      Lexer::new("x {{{#!folding more\n * inside\n}}} y\nz", Mode::Block)
        .map(|t| t.kind)
        .collect();
    assert_eq!(tokens[0], TokenKind::TextLine {
      content: "x {{{#!folding more\n * inside\n}}} y".into(),
    });
  }

  #[test]
  fn test_text_line_literal_aborts_on_heading() {
    let tokens: Vec<TokenKind> =
      Lexer::new("x {{{\n== H ==\n}}}", Mode::Block)
        .map(|t| t.kind)
        .collect();
    assert_eq!(tokens[0], TokenKind::TextLine {
      content: "x {{{".into(),
    });
    assert!(matches!(tokens[1], TokenKind::Heading { .. }));
  }

  #[test]
  fn test_redirect_first_line_only() {
    let tokens: Vec<TokenKind> = Lexer::new("#redirect Target", Mode::Block)
      .map(|t| t.kind)
      .collect();
    assert_eq!(tokens, vec![TokenKind::Redirect {
      target: "Target".into(),
    }]);
  }

  fn block_kinds(text: &str) -> Vec<TokenKind> {
    Lexer::new(text, Mode::Block).map(|t| t.kind).collect()
  }

  #[test]
  fn test_row_closes_after_literal_lines() {
    assert_eq!(block_kinds("||{{{a\n||b}}}||\ntext")[0], TokenKind::TableRow {
      caption: None,
      raw:     "{{{a\n||b}}}".into(),
    });
    assert_eq!(block_kinds("||{{{a\n}}} b\nc||")[0], TokenKind::TableRow {
      caption: None,
      raw:     "{{{a\n}}} b\nc".into(),
    });
  }

  #[test]
  fn test_unclosed_rows_stay_text() {
    let tokens = block_kinds(&"||x\n".repeat(3));
    assert_eq!(tokens, vec![
      TokenKind::TextLine {
        content: "||x".into(),
      };
      3
    ]);
    let tokens = block_kinds("||a\n== H ==\nb||");
    assert_eq!(tokens[0], TokenKind::TextLine {
      content: "||a".into(),
    });
    assert!(matches!(tokens[1], TokenKind::Heading { .. }));
  }

  #[test]
  fn test_text_line_waits_for_outer_literal() {
    let tokens = block_kinds("a {{{ {{{\nb }}}\nc }}}\nd");
    assert_eq!(tokens, vec![
      TokenKind::TextLine {
        content: "a {{{ {{{\nb }}}\nc }}}".into(),
      },
      TokenKind::TextLine {
        content: "d".into(),
      },
    ]);
  }
}
