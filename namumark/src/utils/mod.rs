use std::borrow::Cow;

pub mod css;
pub mod literal;

/// Error type for utility operations.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
  #[error("Regex compilation failed: {0}")]
  RegexError(#[from] regex::Error),
}

/// Escape the five HTML-sensitive characters (`& < > " '`).
///
/// The result is safe both as element text and inside a quoted attribute.
#[must_use]
pub fn escape_html(text: &str) -> String {
  html_escape::encode_quoted_attribute(text).into_owned()
}

/// Reverse [`escape_html`], decoding every HTML entity in `text`.
#[must_use]
pub fn unescape_html(text: &str) -> String {
  html_escape::decode_html_entities(text).into_owned()
}

/// Remove markup escapes: `\x` becomes `x`, a trailing lone backslash is
/// kept.
#[must_use]
pub fn unescape_markup(text: &str) -> Cow<'_, str> {
  if !text.contains('\\') {
    return Cow::Borrowed(text);
  }
  let mut out = String::with_capacity(text.len());
  let mut chars = text.chars();
  while let Some(ch) = chars.next() {
    if ch == '\\' {
      match chars.next() {
        Some(next) => out.push(next),
        None => out.push('\\'),
      }
    } else {
      out.push(ch);
    }
  }
  Cow::Owned(out)
}

/// Collapse every whitespace run into a single space and trim the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
  text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters (not bytes).
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> &str {
  match text.char_indices().nth(max) {
    Some((idx, _)) => &text[..idx],
    None => text,
  }
}

/// Percent-encode a document title for use in an `href` path segment.
#[must_use]
pub fn encode_title(title: &str) -> String {
  url::form_urlencoded::byte_serialize(title.as_bytes())
    .collect::<String>()
    .replace('+', "%20")
}

/// Turn an arbitrary anchor name into something usable as an `id`.
#[must_use]
pub fn anchor_id(name: &str) -> String {
  name
    .trim()
    .chars()
    .map(|c| if c.is_whitespace() { '_' } else { c })
    .filter(|c| !matches!(c, '"' | '\'' | '<' | '>' | '&'))
    .collect()
}

/// Create a regex that never matches anything.
///
/// This is used as a fallback pattern when a regex fails to compile.
#[must_use]
pub fn never_matching_regex() -> regex::Regex {
  regex::Regex::new(r"[^\s\S]").unwrap_or_else(|_| {
    #[allow(
      clippy::expect_used,
      reason = "This pattern is guaranteed to be valid"
    )]
    regex::Regex::new(r"^\b$").expect("regex pattern ^\\b$ should always compile")
  })
}
