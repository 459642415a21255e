//! Recursive-descent parser for the expression language.
use super::{
  eval::Value,
  lexer::{Lexeme, Tok},
};
use crate::error::SandboxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Not,
  Neg,
  Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  Lt,
  Gt,
  Le,
  Ge,
  LooseEq,
  LooseNe,
  StrictEq,
  StrictNe,
  And,
  Or,
  Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Literal(Value),
  Var(String),
  Array(Vec<Self>),
  Unary(UnaryOp, Box<Self>),
  Binary(BinaryOp, Box<Self>, Box<Self>),
  Ternary(Box<Self>, Box<Self>, Box<Self>),
  Member(Box<Self>, String),
  Index(Box<Self>, Box<Self>),
  Call(Box<Self>, Vec<Self>),
}

/// Binding power of each binary operator; higher binds tighter.
fn precedence(op: &str) -> Option<(u8, BinaryOp)> {
  let entry = match op {
    "||" => (1, BinaryOp::Or),
    "??" => (1, BinaryOp::Nullish),
    "&&" => (2, BinaryOp::And),
    "==" => (3, BinaryOp::LooseEq),
    "!=" => (3, BinaryOp::LooseNe),
    "===" => (3, BinaryOp::StrictEq),
    "!==" => (3, BinaryOp::StrictNe),
    "<" => (4, BinaryOp::Lt),
    ">" => (4, BinaryOp::Gt),
    "<=" => (4, BinaryOp::Le),
    ">=" => (4, BinaryOp::Ge),
    "+" => (5, BinaryOp::Add),
    "-" => (5, BinaryOp::Sub),
    "*" => (6, BinaryOp::Mul),
    "/" => (6, BinaryOp::Div),
    "%" => (6, BinaryOp::Rem),
    _ => return None,
  };
  Some(entry)
}

pub struct ExprParser<'a> {
  lexemes:   &'a [Lexeme],
  pos:       usize,
  depth:     usize,
  max_depth: usize,
  end:       usize,
}

impl<'a> ExprParser<'a> {
  #[must_use]
  pub fn new(lexemes: &'a [Lexeme], source_len: usize, max_depth: usize) -> Self {
    Self {
      lexemes,
      pos: 0,
      depth: 0,
      max_depth,
      end: source_len,
    }
  }

  /// Parse one complete expression.
  ///
  /// # Errors
  ///
  /// Returns [`SandboxError::Syntax`] on malformed input and
  /// [`SandboxError::TooDeep`] past the nesting limit.
  pub fn parse(mut self) -> Result<Expr, SandboxError> {
    if self.lexemes.is_empty() {
      return Err(self.syntax("empty expression"));
    }
    let expr = self.ternary()?;
    if self.pos < self.lexemes.len() {
      return Err(self.syntax("unexpected trailing input"));
    }
    Ok(expr)
  }

  fn peek(&self) -> Option<&'a Tok> {
    self.lexemes.get(self.pos).map(|l| &l.tok)
  }

  fn peek_punct(&self) -> Option<&'static str> {
    match self.peek() {
      Some(Tok::Punct(p)) => Some(*p),
      _ => None,
    }
  }

  fn eat(&mut self, punct: &str) -> bool {
    if self.peek_punct() == Some(punct) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn expect(&mut self, punct: &str) -> Result<(), SandboxError> {
    if self.eat(punct) {
      Ok(())
    } else {
      Err(self.syntax(&format!("expected `{punct}`")))
    }
  }

  fn syntax(&self, message: &str) -> SandboxError {
    SandboxError::Syntax {
      offset:  self.lexemes.get(self.pos).map_or(self.end, |l| l.offset),
      message: message.to_string(),
    }
  }

  fn enter(&mut self) -> Result<(), SandboxError> {
    self.depth += 1;
    if self.depth > self.max_depth {
      return Err(SandboxError::TooDeep(self.max_depth));
    }
    Ok(())
  }

  fn ternary(&mut self) -> Result<Expr, SandboxError> {
    self.enter()?;
    let condition = self.binary(1)?;
    let expr = if self.eat("?") {
      let then = self.ternary()?;
      self.expect(":")?;
      let otherwise = self.ternary()?;
      Expr::Ternary(Box::new(condition), Box::new(then), Box::new(otherwise))
    } else {
      condition
    };
    self.depth -= 1;
    Ok(expr)
  }

  /// Precedence climbing over the left-associative binary operators.
  fn binary(&mut self, min: u8) -> Result<Expr, SandboxError> {
    let mut left = self.unary()?;
    while let Some((power, op)) = self.peek_punct().and_then(precedence) {
      if power < min {
        break;
      }
      self.pos += 1;
      let right = self.binary(power + 1)?;
      left = Expr::Binary(op, Box::new(left), Box::new(right));
    }
    Ok(left)
  }

  fn unary(&mut self) -> Result<Expr, SandboxError> {
    let op = match self.peek_punct() {
      Some("!") => UnaryOp::Not,
      Some("-") => UnaryOp::Neg,
      Some("+") => UnaryOp::Plus,
      _ => return self.postfix(),
    };
    self.pos += 1;
    self.enter()?;
    let operand = self.unary()?;
    self.depth -= 1;
    Ok(Expr::Unary(op, Box::new(operand)))
  }

  fn postfix(&mut self) -> Result<Expr, SandboxError> {
    let mut expr = self.primary()?;
    loop {
      if self.eat(".") {
        let Some(Tok::Ident(name)) = self.peek() else {
          return Err(self.syntax("expected a property name"));
        };
        self.pos += 1;
        expr = Expr::Member(Box::new(expr), name.clone());
      } else if self.eat("[") {
        let index = self.ternary()?;
        self.expect("]")?;
        expr = Expr::Index(Box::new(expr), Box::new(index));
      } else if self.eat("(") {
        let args = self.list(")")?;
        expr = Expr::Call(Box::new(expr), args);
      } else {
        return Ok(expr);
      }
    }
  }

  /// Comma-separated expressions up to `close`, which is consumed.
  fn list(&mut self, close: &str) -> Result<Vec<Expr>, SandboxError> {
    let mut items = Vec::new();
    if self.eat(close) {
      return Ok(items);
    }
    loop {
      items.push(self.ternary()?);
      if self.eat(close) {
        return Ok(items);
      }
      self.expect(",")?;
    }
  }

  fn primary(&mut self) -> Result<Expr, SandboxError> {
    let Some(tok) = self.peek() else {
      return Err(self.syntax("unexpected end of expression"));
    };
    self.pos += 1;
    match tok {
      Tok::Number(n) => Ok(Expr::Literal(Value::Number(*n))),
      Tok::Str(s) => Ok(Expr::Literal(Value::Str(s.clone()))),
      Tok::Ident(name) => {
        Ok(match name.as_str() {
          "true" => Expr::Literal(Value::Bool(true)),
          "false" => Expr::Literal(Value::Bool(false)),
          "null" => Expr::Literal(Value::Null),
          "undefined" => Expr::Literal(Value::Undefined),
          "NaN" => Expr::Literal(Value::Number(f64::NAN)),
          "Infinity" => Expr::Literal(Value::Number(f64::INFINITY)),
          _ => Expr::Var(name.clone()),
        })
      },
      Tok::Punct("(") => {
        self.enter()?;
        let inner = self.ternary()?;
        self.expect(")")?;
        self.depth -= 1;
        Ok(inner)
      },
      Tok::Punct("[") => {
        self.enter()?;
        let items = self.list("]")?;
        self.depth -= 1;
        Ok(Expr::Array(items))
      },
      Tok::Punct(p) => {
        self.pos -= 1;
        Err(self.syntax(&format!("unexpected `{p}`")))
      },
    }
  }
}
