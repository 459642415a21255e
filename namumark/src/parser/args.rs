//! Macro argument handling.
use indexmap::IndexMap;

use crate::{tokenizer::scan::split_unescaped, utils::unescape_markup};

/// Split raw macro arguments on unescaped commas, then unescape and trim
/// each one. An empty argument string yields no arguments.
#[must_use]
pub fn split_args(raw: &str) -> Vec<String> {
  if raw.trim().is_empty() {
    return Vec::new();
  }
  split_unescaped(raw, ',')
    .into_iter()
    .map(|arg| unescape_markup(arg).trim().to_string())
    .collect()
}

/// Target and keyed parameters of an `include` call. The first argument
/// without `=` is the target; every `key=value` argument is a parameter.
#[must_use]
pub fn parse_include(args: &[String]) -> Option<(String, IndexMap<String, String>)> {
  let mut target = None;
  let mut params = IndexMap::new();
  for arg in args {
    match arg.split_once('=') {
      Some((key, value)) if target.is_some() => {
        let key = key.trim();
        if !key.is_empty() {
          params.insert(key.to_string(), value.trim().to_string());
        }
      },
      _ if target.is_none() && !arg.is_empty() => target = Some(arg.clone()),
      _ => {},
    }
  }
  target.map(|target| (target, params))
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]

  use super::*;

  #[test]
  fn test_split_args() {
    assert_eq!(split_args(r" a , b\,c ,d"), vec!["a", "b,c", "d"]);
    assert!(split_args("  ").is_empty());
  }

  #[test]
  fn test_parse_include() {
    let args = split_args("틀:Other, key=value, eq=a=b");
    let (target, params) = parse_include(&args).unwrap();
    assert_eq!(target, "틀:Other");
    assert_eq!(params.get("key").map(String::as_str), Some("value"));
    assert_eq!(params.get("eq").map(String::as_str), Some("a=b"));
    assert!(parse_include(&[]).is_none());
  }
}
