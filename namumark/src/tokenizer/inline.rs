//! Inline matchers.
use super::{
  BraceHead,
  Lexer,
  TextStyle,
  Token,
  TokenKind,
  scan::Delimiter,
};
use crate::utils::css::ThemedColor;

/// Bytes at which some inline matcher may start. Text runs stop in front of
/// them.
const TRIGGERS: &[u8] = b"\\\n{['_~-^,#@";

/// Split the inside of a `{{{ ... }}}` construct into its head and body.
#[must_use]
pub fn parse_brace(inner: &str) -> (BraceHead, String) {
  if let Some(rest) = inner.strip_prefix("#!") {
    let (first, body) = rest.split_once('\n').unwrap_or((rest, ""));
    let (directive, argument) =
      first.split_once(char::is_whitespace).unwrap_or((first, ""));
    let argument = argument.trim().to_string();
    let head = match directive.to_ascii_lowercase().as_str() {
      "syntax" => Some(BraceHead::Syntax { lang: argument }),
      "wiki" => Some(BraceHead::Wiki { attrs: argument }),
      "folding" => Some(BraceHead::Folding { summary: argument }),
      "if" => Some(BraceHead::If { expr: argument }),
      "html" => {
        let body = rest["html".len().min(rest.len())..]
          .trim_start_matches([' ', '\t'])
          .trim_start_matches('\n');
        return (BraceHead::Html, body.to_string());
      },
      _ => None,
    };
    if let Some(head) = head {
      return (head, body.to_string());
    }
  }
  if let Some(size) = parse_size_prefix(inner) {
    return (BraceHead::Size(size), inner[3..].to_string());
  }
  if inner.starts_with('#')
    && let Some((raw, body)) = inner.split_once([' ', '\t', '\n'])
    && let Some(color) = ThemedColor::parse(raw)
  {
    return (BraceHead::Color(color), body.to_string());
  }
  (BraceHead::Plain, inner.to_string())
}

/// `+N ` / `-N ` with N in 1..=5, followed by whitespace.
fn parse_size_prefix(inner: &str) -> Option<i8> {
  let bytes = inner.as_bytes();
  if bytes.len() < 3 || !bytes[2].is_ascii_whitespace() {
    return None;
  }
  let magnitude = match bytes[1] {
    digit @ b'1'..=b'5' => i8::try_from(digit - b'0').ok()?,
    _ => return None,
  };
  match bytes[0] {
    b'+' => Some(magnitude),
    b'-' => Some(-magnitude),
    _ => None,
  }
}

fn is_name_char(c: char) -> bool {
  c.is_alphanumeric() || c == '_' || c == '-'
}

fn is_macro_name(name: &str) -> bool {
  !name.is_empty() && name.chars().all(is_name_char)
}

fn is_user_char(c: char) -> bool {
  c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

impl Lexer<'_> {
  fn previous_char(&self) -> Option<char> {
    self.text[..self.pos].chars().next_back()
  }

  fn at_word_start(&self) -> bool {
    self.previous_char().is_none_or(|c| !c.is_alphanumeric())
  }

  pub(super) fn next_inline(&mut self) -> Token {
    let rest = self.remaining();
    if let Some((kind, len)) = self.match_inline(rest) {
      let lines = rest[..len].matches('\n').count();
      return self.emit(kind, self.pos + len, lines);
    }
    // Plain text run: the current char, then everything up to the next
    // trigger byte.
    let first = rest.chars().next().map_or(1, char::len_utf8);
    let len = rest.as_bytes()[first..]
      .iter()
      .position(|b| TRIGGERS.contains(b))
      .map_or(rest.len(), |i| first + i);
    let text = rest[..len].to_string();
    self.emit(TokenKind::Text(text), self.pos + len, 0)
  }

  fn match_inline(&self, rest: &str) -> Option<(TokenKind, usize)> {
    let bytes = rest.as_bytes();
    match bytes.first()? {
      b'\\' => {
        let ch = rest[1..].chars().next()?;
        if ch == '\n' {
          return None;
        }
        Some((TokenKind::Escaped(ch), 1 + ch.len_utf8()))
      },
      b'\n' => Some((TokenKind::LineBreak, 1)),
      b'{' if rest.starts_with("{{{") => {
        let close = self.scanner.closing(Delimiter::Literal, self.pos)?;
        let (head, body) = parse_brace(&self.text[self.pos + 3..close]);
        Some((TokenKind::Literal { head, body }, close + 3 - self.pos))
      },
      b'[' if rest.starts_with("[[") => self.match_link(),
      b'[' if rest.starts_with("[*") => self.match_footnote(),
      b'[' => self.match_macro(),
      b'#' if self.gates.thread && self.at_word_start() => {
        let digits = bytes[1..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 || bytes.get(1 + digits).is_some_and(u8::is_ascii_alphanumeric)
        {
          return None;
        }
        let number = rest[1..=digits].parse().ok()?;
        Some((TokenKind::CommentNumber(number), 1 + digits))
      },
      b'@' if self.gates.thread && self.at_word_start() => {
        let len: usize = rest[1..]
          .chars()
          .take_while(|c| is_user_char(*c))
          .map(char::len_utf8)
          .sum();
        if len == 0 || rest[1 + len..].starts_with('@') {
          return None;
        }
        let name = rest[1..=len].trim_end_matches('.');
        if name.is_empty() {
          return None;
        }
        Some((TokenKind::Mention(name.to_string()), 1 + name.len()))
      },
      _ => self.match_styled(rest),
    }
  }

  fn match_link(&self) -> Option<(TokenKind, usize)> {
    let start = self.pos;
    let close = self.scanner.closing(Delimiter::Link, start)?;
    let body = start + 2;
    let (target, display) = match self.link_pipe(body, close) {
      Some(pipe) => (
        &self.text[body..pipe],
        Some(self.text[pipe + 1..close].to_string()),
      ),
      None => (&self.text[body..close], None),
    };
    if target.trim().is_empty() {
      return None;
    }
    Some((
      TokenKind::Link {
        target: target.to_string(),
        display,
      },
      close + 2 - start,
    ))
  }

  /// The display separator of a link body `from..to`: the first unescaped
  /// `|` that is not nested inside another link or literal.
  fn link_pipe(&self, from: usize, to: usize) -> Option<usize> {
    let mut from = from;
    loop {
      let pipe = self.scanner.find_unescaped(from, to, "|")?;
      let Some(open) = self.text[from..pipe].find("[[").map(|i| from + i)
      else {
        return Some(pipe);
      };
      from = self.scanner.closing(Delimiter::Link, open)? + 2;
    }
  }

  fn match_footnote(&self) -> Option<(TokenKind, usize)> {
    let start = self.pos;
    let close = self.scanner.closing(Delimiter::Footnote, start)?;
    let inner = &self.text[start + 2..close];
    let (name, content) = match inner.split_once(' ') {
      Some((name, content)) => (name, content),
      None => (inner, ""),
    };
    let name = (!name.is_empty()).then(|| name.to_string());
    Some((
      TokenKind::Footnote {
        name,
        content: content.to_string(),
      },
      close + 1 - start,
    ))
  }

  fn match_macro(&self) -> Option<(TokenKind, usize)> {
    let start = self.pos;
    let close = self.scanner.closing(Delimiter::Macro, start)?;
    let inner = &self.text[start + 1..close];
    // The name runs up to the first char that cannot be part of it, which
    // must then open the argument list.
    let head = inner
      .find(|c: char| !(c.is_whitespace() || is_name_char(c)))
      .unwrap_or(inner.len());
    let (name, args) = if head == inner.len() {
      (inner, None)
    } else {
      if inner.as_bytes()[head] != b'(' {
        return None;
      }
      let open = start + 1 + head;
      if self.scanner.closing(Delimiter::Args, open)? + 1 != close {
        return None;
      }
      (&inner[..head], Some(self.text[open + 1..close - 1].to_string()))
    };
    let name = name.trim();
    if !is_macro_name(name) {
      return None;
    }
    Some((
      TokenKind::Macro {
        name: name.to_string(),
        args,
      },
      close + 1 - start,
    ))
  }

  fn match_styled(&self, rest: &str) -> Option<(TokenKind, usize)> {
    let start = self.pos;
    if rest.starts_with("'''''")
      && let Some(end) = self.scanner.find_on_line(start + 5, "'''''")
      && end > start + 5
    {
      let inner = format!("''{}''", &self.text[start + 5..end]);
      return Some((
        TokenKind::Styled {
          style: TextStyle::Bold,
          inner,
        },
        end + 5 - start,
      ));
    }
    for (delimiter, style) in TextStyle::DELIMITERS {
      if !rest.starts_with(delimiter) {
        continue;
      }
      let body = start + delimiter.len();
      let end = self.scanner.find_on_line(body, delimiter)?;
      if end == body {
        return None;
      }
      return Some((
        TokenKind::Styled {
          style,
          inner: self.text[body..end].to_string(),
        },
        end + delimiter.len() - start,
      ));
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::super::Mode;
  use super::*;

  fn lex(text: &str) -> Vec<TokenKind> {
    Lexer::new(text, Mode::Inline).map(|t| t.kind).collect()
  }

  #[test]
  fn test_parse_brace_heads() {
    assert_eq!(
      parse_brace("#!syntax rust\nfn main() {}"),
      (
        BraceHead::Syntax {
          lang: "rust".into(),
        },
        "fn main() {}".into()
      )
    );
    assert_eq!(parse_brace("+2 big").0, BraceHead::Size(2));
    assert_eq!(parse_brace("-1 small").1, "small");
    assert!(matches!(parse_brace("#red text").0, BraceHead::Color(_)));
    assert_eq!(parse_brace("#nocolor text").0, BraceHead::Plain);
    assert_eq!(parse_brace("#!html <b>x</b>"), (
      BraceHead::Html,
      "<b>x</b>".into()
    ));
    assert_eq!(parse_brace("+9 x").0, BraceHead::Plain);
  }

  #[test]
  fn test_escape_wins() {
    assert_eq!(lex(r"\'''a'''")[0], TokenKind::Escaped('\''));
  }

  #[test]
  fn test_bold_italic_combined() {
    assert_eq!(lex("'''''x'''''"), vec![TokenKind::Styled {
      style: TextStyle::Bold,
      inner: "''x''".into(),
    }]);
  }

  #[test]
  fn test_link_with_nested_display() {
    assert_eq!(lex("[[A|[[파일:b.png|width=10]]]]"), vec![TokenKind::Link {
      target:  "A".into(),
      display: Some("[[파일:b.png|width=10]]".into()),
    }]);
  }

  #[test]
  fn test_footnote_forms() {
    assert_eq!(lex("[* note [br] here]"), vec![TokenKind::Footnote {
      name:    None,
      content: "note [br] here".into(),
    }]);
    assert_eq!(lex("[*A]"), vec![TokenKind::Footnote {
      name:    Some("A".into()),
      content: String::new(),
    }]);
  }

  #[test]
  fn test_macro_args() {
    assert_eq!(lex("[include(틀:x, a=b)]"), vec![TokenKind::Macro {
      name: "include".into(),
      args: Some("틀:x, a=b".into()),
    }]);
    assert_eq!(lex("[not a macro]")[0], TokenKind::Text("[not a macro]".into()));
  }

  #[test]
  fn test_macro_name_must_open_args() {
    assert_eq!(lex("[ br ]"), vec![TokenKind::Macro {
      name: "br".into(),
      args: None,
    }]);
    assert_eq!(lex("[a(b)c]")[0], TokenKind::Text("[a(b)c]".into()));
    assert_eq!(lex("[a b(c)]")[0], TokenKind::Text("[a b(c)]".into()));
    assert_eq!(lex("[age(2000-01-01)]"), vec![TokenKind::Macro {
      name: "age".into(),
      args: Some("2000-01-01".into()),
    }]);
  }

  #[test]
  fn test_link_pipe_skips_literal_and_nested_link() {
    assert_eq!(lex("[[A{{{|}}}B|c]]"), vec![TokenKind::Link {
      target:  "A{{{|}}}B".into(),
      display: Some("c".into()),
    }]);
    assert_eq!(lex("[[[[x|y]]z|w]]"), vec![TokenKind::Link {
      target:  "[[x|y]]z".into(),
      display: Some("w".into()),
    }]);
  }

  #[test]
  fn test_unclosed_falls_back_to_text() {
    let tokens = lex("'''open [[link");
    assert!(tokens.iter().all(|t| matches!(t, TokenKind::Text(_))));
  }
}
