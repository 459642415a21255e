//! Expression evaluator.
//!
//! Values follow the loose semantics wiki authors expect from script-like
//! conditions: strings concatenate with `+`, empty strings are falsy and
//! numeric comparisons coerce. Nothing outside the allowlists is reachable.
use std::fmt;

use indexmap::IndexMap;

use super::parser::{BinaryOp, Expr, UnaryOp};
use crate::{deadline::Deadline, error::SandboxError};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  Str(String),
  Array(Vec<Self>),
}

impl Value {
  #[must_use]
  pub fn is_truthy(&self) -> bool {
    match self {
      Self::Undefined | Self::Null => false,
      Self::Bool(b) => *b,
      Self::Number(n) => *n != 0.0 && !n.is_nan(),
      Self::Str(s) => !s.is_empty(),
      Self::Array(_) => true,
    }
  }

  #[must_use]
  pub const fn type_name(&self) -> &'static str {
    match self {
      Self::Undefined => "undefined",
      Self::Null => "null",
      Self::Bool(_) => "boolean",
      Self::Number(_) => "number",
      Self::Str(_) => "string",
      Self::Array(_) => "array",
    }
  }

  #[must_use]
  pub fn to_number(&self) -> f64 {
    match self {
      Self::Undefined => f64::NAN,
      Self::Null => 0.0,
      Self::Bool(b) => f64::from(u8::from(*b)),
      Self::Number(n) => *n,
      Self::Str(s) => {
        let s = s.trim();
        if s.is_empty() {
          0.0
        } else {
          s.parse().unwrap_or(f64::NAN)
        }
      },
      Self::Array(items) => {
        match items.as_slice() {
          [] => 0.0,
          [only] => only.to_number(),
          _ => f64::NAN,
        }
      },
    }
  }

  const fn is_nullish(&self) -> bool {
    matches!(self, Self::Undefined | Self::Null)
  }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
  if n.is_nan() {
    f.write_str("NaN")
  } else if n.is_infinite() {
    f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
  } else if n == 0.0 {
    f.write_str("0")
  } else {
    write!(f, "{n}")
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Undefined => f.write_str("undefined"),
      Self::Null => f.write_str("null"),
      Self::Bool(b) => write!(f, "{b}"),
      Self::Number(n) => format_number(*n, f),
      Self::Str(s) => f.write_str(s),
      Self::Array(items) => {
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            f.write_str(",")?;
          }
          if !item.is_nullish() {
            write!(f, "{item}")?;
          }
        }
        Ok(())
      },
    }
  }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
    (Value::Bool(x), Value::Bool(y)) => x == y,
    #[allow(clippy::float_cmp, reason = "Equality is exact by definition")]
    (Value::Number(x), Value::Number(y)) => x == y,
    (Value::Str(x), Value::Str(y)) => x == y,
    _ => false,
  }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (x, y) if x.is_nullish() || y.is_nullish() => x.is_nullish() && y.is_nullish(),
    (Value::Str(x), Value::Str(y)) => x == y,
    (Value::Array(_), Value::Array(_)) => false,
    (Value::Array(_), other) | (other, Value::Array(_)) => {
      let text = if matches!(a, Value::Array(_)) { a } else { b }.to_string();
      loose_eq(&Value::Str(text), other)
    },
    #[allow(clippy::float_cmp, reason = "Equality is exact by definition")]
    (x, y) => x.to_number() == y.to_number(),
  }
}

fn compare(a: &Value, b: &Value, op: BinaryOp) -> bool {
  if let (Value::Str(x), Value::Str(y)) = (a, b) {
    return match op {
      BinaryOp::Lt => x < y,
      BinaryOp::Gt => x > y,
      BinaryOp::Le => x <= y,
      _ => x >= y,
    };
  }
  let (x, y) = (a.to_number(), b.to_number());
  match op {
    BinaryOp::Lt => x < y,
    BinaryOp::Gt => x > y,
    BinaryOp::Le => x <= y,
    _ => x >= y,
  }
}

/// Relative index as used by `slice` and `at`: negative counts from the end.
fn relative_index(value: Option<&Value>, len: usize, default: usize) -> usize {
  let Some(value) = value.filter(|v| !matches!(v, Value::Undefined)) else {
    return default;
  };
  let n = value.to_number();
  if n.is_nan() {
    return 0;
  }
  #[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "Clamped to the sequence length first"
  )]
  let index = if n < 0.0 {
    (len as f64 + n.trunc()).max(0.0) as usize
  } else {
    n.trunc().min(len as f64) as usize
  };
  index
}

/// Clamped absolute index as used by `substring` and `charAt`.
fn absolute_index(value: Option<&Value>, len: usize, default: usize) -> usize {
  let Some(value) = value.filter(|v| !matches!(v, Value::Undefined)) else {
    return default;
  };
  let n = value.to_number();
  #[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "Clamped to the sequence length first"
  )]
  let index = if n.is_nan() || n < 0.0 {
    0
  } else {
    n.trunc().min(len as f64) as usize
  };
  index
}

#[allow(clippy::cast_precision_loss, reason = "Indices are small")]
fn position(index: Option<usize>) -> Value {
  Value::Number(index.map_or(-1.0, |i| i as f64))
}

/// Evaluates one parsed expression against string variables.
pub struct Evaluator<'a> {
  vars:      &'a IndexMap<String, String>,
  deadline:  &'a Deadline,
  steps:     usize,
  max_steps: usize,
}

impl<'a> Evaluator<'a> {
  #[must_use]
  pub const fn new(
    vars: &'a IndexMap<String, String>,
    deadline: &'a Deadline,
    max_steps: usize,
  ) -> Self {
    Self {
      vars,
      deadline,
      steps: 0,
      max_steps,
    }
  }

  fn step(&mut self) -> Result<(), SandboxError> {
    self.steps += 1;
    if self.steps > self.max_steps {
      return Err(SandboxError::StepLimit(self.max_steps));
    }
    if self.steps.is_multiple_of(64)
      && (self.deadline.is_expired() || self.deadline.is_cancelled())
    {
      return Err(SandboxError::Timeout);
    }
    Ok(())
  }

  /// Evaluate an expression to a value.
  ///
  /// # Errors
  ///
  /// Returns a [`SandboxError`] for unknown names, disallowed members, type
  /// errors and exhausted budgets.
  pub fn eval(&mut self, expr: &Expr) -> Result<Value, SandboxError> {
    self.step()?;
    match expr {
      Expr::Literal(value) => Ok(value.clone()),
      Expr::Var(name) => {
        self
          .vars
          .get(name)
          .map(|v| Value::Str(v.clone()))
          .ok_or_else(|| SandboxError::UnknownIdentifier(name.clone()))
      },
      Expr::Array(items) => {
        let items = items
          .iter()
          .map(|item| self.eval(item))
          .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(items))
      },
      Expr::Unary(op, operand) => {
        let value = self.eval(operand)?;
        Ok(match op {
          UnaryOp::Not => Value::Bool(!value.is_truthy()),
          UnaryOp::Neg => Value::Number(-value.to_number()),
          UnaryOp::Plus => Value::Number(value.to_number()),
        })
      },
      Expr::Binary(op, left, right) => self.eval_binary(*op, left, right),
      Expr::Ternary(condition, then, otherwise) => {
        if self.eval(condition)?.is_truthy() {
          self.eval(then)
        } else {
          self.eval(otherwise)
        }
      },
      Expr::Member(object, name) => {
        let object = self.eval(object)?;
        match (&object, name.as_str()) {
          #[allow(clippy::cast_precision_loss, reason = "Lengths are small")]
          (Value::Str(s), "length") => Ok(Value::Number(s.chars().count() as f64)),
          #[allow(clippy::cast_precision_loss, reason = "Lengths are small")]
          (Value::Array(items), "length") => Ok(Value::Number(items.len() as f64)),
          _ => {
            Err(SandboxError::Rejected(format!(
              "property {name} of {}",
              object.type_name()
            )))
          },
        }
      },
      Expr::Index(object, index) => {
        let object = self.eval(object)?;
        let index = self.eval(index)?.to_number();
        if index.is_nan() || index < 0.0 || index.fract() != 0.0 {
          return Ok(Value::Undefined);
        }
        #[allow(
          clippy::cast_possible_truncation,
          clippy::cast_sign_loss,
          reason = "Checked non-negative integer"
        )]
        let index = index as usize;
        Ok(match object {
          Value::Str(s) => {
            s.chars()
              .nth(index)
              .map_or(Value::Undefined, |c| Value::Str(c.to_string()))
          },
          Value::Array(items) => items.get(index).cloned().unwrap_or(Value::Undefined),
          other => {
            return Err(SandboxError::Type(format!(
              "cannot index {}",
              other.type_name()
            )));
          },
        })
      },
      Expr::Call(callee, args) => self.eval_call(callee, args),
    }
  }

  fn eval_binary(
    &mut self,
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
  ) -> Result<Value, SandboxError> {
    // Short-circuit operators yield an operand, not a boolean.
    match op {
      BinaryOp::And => {
        let left = self.eval(left)?;
        return if left.is_truthy() { self.eval(right) } else { Ok(left) };
      },
      BinaryOp::Or => {
        let left = self.eval(left)?;
        return if left.is_truthy() { Ok(left) } else { self.eval(right) };
      },
      BinaryOp::Nullish => {
        let left = self.eval(left)?;
        return if left.is_nullish() { self.eval(right) } else { Ok(left) };
      },
      _ => {},
    }
    let left = self.eval(left)?;
    let right = self.eval(right)?;
    Ok(match op {
      BinaryOp::Add => {
        if matches!(left, Value::Str(_) | Value::Array(_))
          || matches!(right, Value::Str(_) | Value::Array(_))
        {
          Value::Str(format!("{left}{right}"))
        } else {
          Value::Number(left.to_number() + right.to_number())
        }
      },
      BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
      BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
      BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
      BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
      BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
        Value::Bool(compare(&left, &right, op))
      },
      BinaryOp::LooseEq => Value::Bool(loose_eq(&left, &right)),
      BinaryOp::LooseNe => Value::Bool(!loose_eq(&left, &right)),
      BinaryOp::StrictEq => Value::Bool(strict_eq(&left, &right)),
      BinaryOp::StrictNe => Value::Bool(!strict_eq(&left, &right)),
      BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => Value::Undefined,
    })
  }

  fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, SandboxError> {
    let values = args
      .iter()
      .map(|arg| self.eval(arg))
      .collect::<Result<Vec<_>, _>>()?;
    match callee {
      Expr::Var(name) => call_function(name, &values),
      Expr::Member(object, method) => {
        let object = self.eval(object)?;
        match object {
          Value::Str(s) => string_method(&s, method, &values),
          Value::Array(items) => array_method(&items, method, &values),
          other => {
            Err(SandboxError::Rejected(format!(
              "method {method} of {}",
              other.type_name()
            )))
          },
        }
      },
      _ => Err(SandboxError::Rejected("call of a computed value".to_string())),
    }
  }
}

fn call_function(name: &str, args: &[Value]) -> Result<Value, SandboxError> {
  let first = args.first().unwrap_or(&Value::Undefined);
  Ok(match name {
    "Number" => Value::Number(if args.is_empty() { 0.0 } else { first.to_number() }),
    "String" => Value::Str(if args.is_empty() { String::new() } else { first.to_string() }),
    "Boolean" => Value::Bool(first.is_truthy()),
    "isNaN" => Value::Bool(first.to_number().is_nan()),
    "parseInt" => {
      let radix = args.get(1).map(Value::to_number);
      Value::Number(parse_int(&first.to_string(), radix))
    },
    _ => return Err(SandboxError::Rejected(format!("function {name}"))),
  })
}

/// Leading-digits integer parse. Without a radix, a `0x` prefix selects
/// hexadecimal.
fn parse_int(text: &str, radix: Option<f64>) -> f64 {
  let text = text.trim();
  let (negative, text) = match text.as_bytes().first() {
    Some(b'-') => (true, &text[1..]),
    Some(b'+') => (false, &text[1..]),
    _ => (false, text),
  };
  #[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "Out of range radixes are rejected below"
  )]
  let radix = radix.filter(|r| !r.is_nan()).map_or(0, |r| r.trunc() as u32);
  let hex = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"));
  let (radix, text) = match (radix, hex) {
    (0 | 16, Some(hex)) => (16, hex),
    (0, None) => (10, text),
    (radix, _) => (radix, text),
  };
  if !(2..=36).contains(&radix) {
    return f64::NAN;
  }
  let mut value = None;
  for digit in text.chars().map_while(|c| c.to_digit(radix)) {
    value = Some(value.unwrap_or(0.0) * f64::from(radix) + f64::from(digit));
  }
  match value {
    Some(v) if negative => -v,
    Some(v) => v,
    None => f64::NAN,
  }
}

/// Index used by `at`: negative counts from the end, out of range is none.
fn at_index(value: Option<&Value>, len: usize) -> Option<usize> {
  let n = value.map_or(0.0, Value::to_number);
  let n = if n.is_nan() { 0.0 } else { n.trunc() };
  #[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "Range checked against the length"
  )]
  let index = {
    let index = if n < 0.0 { len as f64 + n } else { n };
    (index >= 0.0 && index < len as f64).then_some(index as usize)
  };
  index
}

fn string_arg(args: &[Value], index: usize) -> String {
  args.get(index).map(ToString::to_string).unwrap_or_default()
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Result<Value, SandboxError> {
  let chars: Vec<char> = s.chars().collect();
  let len = chars.len();
  let substring = |from: usize, to: usize| -> String { chars[from..to.max(from)].iter().collect() };
  let char_index = |byte: usize| s[..byte].chars().count();
  Ok(match method {
    "includes" => {
      let from = absolute_index(args.get(1), len, 0);
      Value::Bool(substring(from, len).contains(&string_arg(args, 0)))
    },
    "startsWith" => {
      let from = absolute_index(args.get(1), len, 0);
      Value::Bool(substring(from, len).starts_with(&string_arg(args, 0)))
    },
    "endsWith" => {
      let to = absolute_index(args.get(1), len, len);
      Value::Bool(substring(0, to).ends_with(&string_arg(args, 0)))
    },
    "indexOf" => position(s.find(&string_arg(args, 0)).map(char_index)),
    "lastIndexOf" => position(s.rfind(&string_arg(args, 0)).map(char_index)),
    "toUpperCase" => Value::Str(s.to_uppercase()),
    "toLowerCase" => Value::Str(s.to_lowercase()),
    "trim" => Value::Str(s.trim().to_string()),
    "slice" => {
      let from = relative_index(args.first(), len, 0);
      let to = relative_index(args.get(1), len, len);
      Value::Str(substring(from, to))
    },
    "substring" => {
      let a = absolute_index(args.first(), len, 0);
      let b = absolute_index(args.get(1), len, len);
      Value::Str(substring(a.min(b), a.max(b)))
    },
    "charAt" => {
      let at = absolute_index(args.first(), len, 0);
      Value::Str(chars.get(at).map(ToString::to_string).unwrap_or_default())
    },
    "at" => {
      at_index(args.first(), len)
        .and_then(|at| chars.get(at))
        .map_or(Value::Undefined, |c| Value::Str(c.to_string()))
    },
    "split" => {
      let parts: Vec<Value> = match args.first() {
        None | Some(Value::Undefined) => vec![Value::Str(s.to_string())],
        Some(separator) => {
          let separator = separator.to_string();
          if separator.is_empty() {
            chars.iter().map(|c| Value::Str(c.to_string())).collect()
          } else {
            s.split(separator.as_str())
              .map(|part| Value::Str(part.to_string()))
              .collect()
          }
        },
      };
      let limit = absolute_index(args.get(1), parts.len(), parts.len());
      Value::Array(parts.into_iter().take(limit).collect())
    },
    _ => return Err(SandboxError::Rejected(format!("method {method} of string"))),
  })
}

fn array_method(items: &[Value], method: &str, args: &[Value]) -> Result<Value, SandboxError> {
  let len = items.len();
  let needle = args.first().unwrap_or(&Value::Undefined);
  Ok(match method {
    "includes" => Value::Bool(items.iter().any(|item| strict_eq(item, needle))),
    "indexOf" => position(items.iter().position(|item| strict_eq(item, needle))),
    "lastIndexOf" => position(items.iter().rposition(|item| strict_eq(item, needle))),
    "slice" => {
      let from = relative_index(args.first(), len, 0);
      let to = relative_index(args.get(1), len, len);
      Value::Array(items[from..to.max(from)].to_vec())
    },
    "at" => {
      at_index(args.first(), len)
        .and_then(|at| items.get(at))
        .cloned()
        .unwrap_or(Value::Undefined)
    },
    "join" => {
      let separator = match args.first() {
        None | Some(Value::Undefined) => ",".to_string(),
        Some(separator) => separator.to_string(),
      };
      let parts: Vec<String> = items
        .iter()
        .map(|item| if item.is_nullish() { String::new() } else { item.to_string() })
        .collect();
      Value::Str(parts.join(&separator))
    },
    _ => return Err(SandboxError::Rejected(format!("method {method} of array"))),
  })
}
