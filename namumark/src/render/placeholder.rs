//! `@name@` and `@name=default@` substitution in transcluded text.
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};

use crate::{sandbox::Sandbox, utils::never_matching_regex};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^@([^@=\n]+)(?:=([^@\n]*))?@").unwrap_or_else(|e| {
    log::error!("Failed to compile PLACEHOLDER_RE regex: {e}");
    never_matching_regex()
  })
});

/// Whether `text` can contain placeholders at all.
#[must_use]
pub fn has_placeholders(text: &str) -> bool {
  text.contains('@')
}

/// Replace every placeholder in `text`.
///
/// A placeholder resolves to the caller's value for its name, else to the
/// name evaluated as a sandbox expression over the parameters, else to its
/// default. Placeholders with none of those stay as written, and their
/// closing `@` may still open the next placeholder (`a@b.c @name@`).
#[must_use]
pub fn substitute(text: &str, params: &IndexMap<String, String>, sandbox: &Sandbox) -> String {
  if !has_placeholders(text) {
    return text.to_string();
  }
  let mut out = String::with_capacity(text.len());
  let mut rest = text;
  while let Some(at) = rest.find('@') {
    out.push_str(&rest[..at]);
    let candidate = &rest[at..];
    let resolved = PLACEHOLDER_RE
      .captures(candidate)
      .and_then(|caps| Some((caps.get(0)?.len(), resolve(&caps, params, sandbox)?)));
    match resolved {
      Some((len, value)) => {
        out.push_str(&value);
        rest = &candidate[len..];
      },
      None => {
        out.push('@');
        rest = &candidate[1..];
      },
    }
  }
  out.push_str(rest);
  out
}

fn resolve(
  caps: &Captures<'_>,
  params: &IndexMap<String, String>,
  sandbox: &Sandbox,
) -> Option<String> {
  let name = caps.get(1)?.as_str().trim();
  if let Some(value) = params.get(name) {
    return Some(value.clone());
  }
  if let Some(value) = sandbox.lookup(name, params) {
    return Some(value);
  }
  caps.get(2).map(|default| default.as_str().to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn params(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
      .iter()
      .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
      .collect()
  }

  #[test]
  fn test_resolution_order() {
    let sandbox = Sandbox::default();
    let p = params(&[("name", "위키"), ("n", "2")]);
    assert_eq!(substitute("@name@", &p, &sandbox), "위키");
    assert_eq!(substitute("@name=기본@", &p, &sandbox), "위키");
    assert_eq!(substitute("@missing=기본@", &p, &sandbox), "기본");
    assert_eq!(substitute("@missing@", &p, &sandbox), "@missing@");
    assert_eq!(substitute("@Number(n) * 3@", &p, &sandbox), "6");
    assert_eq!(substitute("@missing=@!", &p, &sandbox), "!");
  }

  #[test]
  fn test_stray_at_does_not_swallow_placeholder() {
    let sandbox = Sandbox::default();
    let p = params(&[("name", "위키")]);
    assert_eq!(substitute("mail a@b.c @name@", &p, &sandbox), "mail a@b.c 위키");
    assert_eq!(substitute("@x@name@", &p, &sandbox), "@x위키");
    assert_eq!(substitute("@@name@@", &p, &sandbox), "@위키@");
  }

  #[test]
  fn test_text_without_placeholders() {
    let sandbox = Sandbox::default();
    assert_eq!(
      substitute("mail me at a@b", &params(&[]), &sandbox),
      "mail me at a@b"
    );
  }
}
