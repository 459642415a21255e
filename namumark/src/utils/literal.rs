/// State tracking for triple-brace literal regions that span lines.
///
/// Line-oriented passes (comment stripping, list and indent continuation,
/// table rows) feed every line through the tracker and treat lines seen while
/// a region is open as part of the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiteralTracker {
  depth: usize,
}

impl LiteralTracker {
  /// Create a new tracker outside of any literal region.
  #[must_use]
  pub const fn new() -> Self {
    Self { depth: 0 }
  }

  /// Check if currently inside a literal region.
  #[must_use]
  pub const fn is_open(&self) -> bool {
    self.depth > 0
  }

  /// Current nesting depth of open regions.
  #[must_use]
  pub const fn depth(&self) -> usize {
    self.depth
  }

  /// Process a line and return the state after it.
  #[must_use]
  pub fn process_line(&self, line: &str) -> Self {
    let bytes = line.as_bytes();
    let mut depth = self.depth;
    let mut i = 0;
    while i < bytes.len() {
      if bytes[i] == b'\\' {
        i += 2;
        continue;
      }
      if bytes[i..].starts_with(b"{{{") {
        depth += 1;
        i += 3;
      } else if depth > 0 && bytes[i..].starts_with(b"}}}") {
        depth -= 1;
        i += 3;
      } else {
        i += 1;
      }
    }
    Self { depth }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_tracks_multiline_region() {
    let tracker = LiteralTracker::new();
    let tracker = tracker.process_line("text {{{#!wiki");
    assert!(tracker.is_open());
    let tracker = tracker.process_line(" * not a list");
    assert!(tracker.is_open());
    let tracker = tracker.process_line("}}}");
    assert!(!tracker.is_open());
  }

  #[test]
  fn test_inline_region_closes_on_same_line() {
    let tracker = LiteralTracker::new().process_line("{{{a}}} and {{{b}}}");
    assert!(!tracker.is_open());
  }

  #[test]
  fn test_escaped_braces_ignored() {
    let tracker = LiteralTracker::new().process_line(r"\{{{ stays closed");
    assert!(!tracker.is_open());
  }

  #[test]
  fn test_nested_regions() {
    let tracker = LiteralTracker::new().process_line("{{{#!wiki {{{+1");
    assert_eq!(tracker.depth(), 2);
    assert_eq!(tracker.process_line("x}}}").depth(), 1);
  }
}
