use super::{Lexer, Token, TokenKind};

impl Lexer<'_> {
  /// One cell of a row whose outer `||` delimiters were already removed.
  /// Separators inside literal regions or escaped do not split.
  pub(super) fn next_cell(&mut self) -> Token {
    let rest = self.remaining();
    let separator =
      self.scanner.find_unescaped(self.pos, self.text.len(), "||");
    let (len, consumed) = match separator.map(|i| i - self.pos) {
      Some(i) => (i, i + 2),
      None => (rest.len(), rest.len()),
    };
    let content = rest[..len].to_string();
    let lines = rest[..consumed].matches('\n').count();
    self.emit(TokenKind::Cell { content }, self.pos + consumed, lines)
  }
}
