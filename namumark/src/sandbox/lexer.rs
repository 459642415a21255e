//! Tokens of the expression language, with static rejection of everything
//! outside it.
use crate::error::SandboxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
  Number(f64),
  Str(String),
  Ident(String),
  Punct(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
  pub tok:    Tok,
  pub offset: usize,
}

/// Longest first, so `===` wins over `==`.
const PUNCTUATION: [&str; 25] = [
  "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "??", "(", ")", "[", "]",
  ",", ".", "?", ":", "!", "+", "-", "*", "/", "%", "<", ">",
];

/// Operators that mutate state or define functions.
const REJECTED_OPERATORS: [&str; 17] = [
  "=>", "++", "--", "**=", "<<=", ">>=", "??=", "&&=", "||=", "+=", "-=", "*=",
  "/=", "%=", "&=", "|=", "^=",
];

/// Words whose mere presence rejects an expression.
const REJECTED_WORDS: [&str; 35] = [
  "function", "class", "while", "for", "do", "new", "this", "eval", "import",
  "export", "return", "var", "let", "const", "async", "await", "yield",
  "with", "delete", "void", "throw", "try", "catch", "finally", "debugger",
  "constructor", "prototype", "__proto__", "globalThis", "window", "Function",
  "arguments", "require", "process", "super",
];

fn ident_start(c: char) -> bool {
  c.is_alphabetic() || c == '_' || c == '$'
}

fn ident_continue(c: char) -> bool {
  c.is_alphanumeric() || c == '_' || c == '$'
}

/// Split `source` into lexemes.
///
/// # Errors
///
/// Returns [`SandboxError::Rejected`] for forbidden words and operators and
/// [`SandboxError::Syntax`] for anything unreadable.
pub fn tokenize(source: &str) -> Result<Vec<Lexeme>, SandboxError> {
  let mut out = Vec::new();
  let mut chars = source.char_indices().peekable();
  while let Some(&(offset, c)) = chars.peek() {
    if c.is_whitespace() {
      chars.next();
      continue;
    }
    let rest = &source[offset..];
    if c.is_ascii_digit() {
      let (value, len) = number(rest).ok_or_else(|| {
        SandboxError::Syntax {
          offset,
          message: "malformed number".to_string(),
        }
      })?;
      out.push(Lexeme {
        tok: Tok::Number(value),
        offset,
      });
      advance(&mut chars, offset + len);
      continue;
    }
    if c == '"' || c == '\'' {
      let (value, len) = string(rest, c).ok_or_else(|| {
        SandboxError::Syntax {
          offset,
          message: "unterminated string".to_string(),
        }
      })?;
      out.push(Lexeme {
        tok: Tok::Str(value),
        offset,
      });
      advance(&mut chars, offset + len);
      continue;
    }
    if ident_start(c) {
      let len: usize = rest
        .chars()
        .take_while(|c| ident_continue(*c))
        .map(char::len_utf8)
        .sum();
      let word = &rest[..len];
      if REJECTED_WORDS.contains(&word) {
        return Err(SandboxError::Rejected(word.to_string()));
      }
      out.push(Lexeme {
        tok: Tok::Ident(word.to_string()),
        offset,
      });
      advance(&mut chars, offset + len);
      continue;
    }
    if let Some(op) = REJECTED_OPERATORS.iter().find(|op| rest.starts_with(**op)) {
      return Err(SandboxError::Rejected((*op).to_string()));
    }
    if let Some(op) = PUNCTUATION.iter().find(|op| rest.starts_with(**op)) {
      out.push(Lexeme {
        tok: Tok::Punct(*op),
        offset,
      });
      advance(&mut chars, offset + op.len());
      continue;
    }
    return Err(match c {
      '=' => SandboxError::Rejected("assignment".to_string()),
      ';' | '{' | '}' | '`' => SandboxError::Rejected(c.to_string()),
      _ => {
        SandboxError::Syntax {
          offset,
          message: format!("unexpected character {c:?}"),
        }
      },
    });
  }
  Ok(out)
}

fn advance(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, to: usize) {
  while chars.peek().is_some_and(|(i, _)| *i < to) {
    chars.next();
  }
}

/// Decimal (with fraction and exponent) or `0x` hex literal.
fn number(text: &str) -> Option<(f64, usize)> {
  if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
    let len = hex.chars().take_while(char::is_ascii_hexdigit).count();
    let value = u64::from_str_radix(&hex[..len], 16).ok()?;
    #[allow(clippy::cast_precision_loss, reason = "Numbers are doubles")]
    let value = value as f64;
    return Some((value, 2 + len));
  }
  let bytes = text.as_bytes();
  let mut len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
  if bytes.get(len) == Some(&b'.') && bytes.get(len + 1).is_some_and(u8::is_ascii_digit) {
    len += 1;
    len += bytes[len..].iter().take_while(|b| b.is_ascii_digit()).count();
  }
  if matches!(bytes.get(len), Some(b'e' | b'E')) {
    let mut exp = len + 1;
    if matches!(bytes.get(exp), Some(b'+' | b'-')) {
      exp += 1;
    }
    let digits = bytes[exp.min(bytes.len())..]
      .iter()
      .take_while(|b| b.is_ascii_digit())
      .count();
    if digits > 0 {
      len = exp + digits;
    }
  }
  if bytes.get(len).is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_') {
    return None;
  }
  text[..len].parse().ok().map(|value| (value, len))
}

fn string(text: &str, quote: char) -> Option<(String, usize)> {
  let mut out = String::new();
  let mut chars = text.char_indices().skip(1);
  while let Some((i, c)) = chars.next() {
    match c {
      '\\' => {
        let (_, escaped) = chars.next()?;
        match escaped {
          'n' => out.push('\n'),
          't' => out.push('\t'),
          'r' => out.push('\r'),
          '0' => out.push('\0'),
          'u' => {
            let mut code = String::with_capacity(4);
            for _ in 0..4 {
              code.push(chars.next()?.1);
            }
            out.push(char::from_u32(u32::from_str_radix(&code, 16).ok()?)?);
          },
          other => out.push(other),
        }
      },
      '\n' => return None,
      c if c == quote => return Some((out, i + c.len_utf8())),
      c => out.push(c),
    }
  }
  None
}
