//! Request-scoped parse state.
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::{deadline::Deadline, error::ParseError};

/// Constructs that gate context-sensitive tokens while they are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
  /// Discussion thread: comment numbers and mentions are live, categories
  /// are plain links.
  Thread,
  /// Inside link display text: only file embeds may link again.
  Link,
  /// Inside a footnote: nested footnotes render literally.
  Footnote,
  Table,
  Heading,
}

/// A category assignment collected from the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub document: String,
  pub text:     Option<String>,
  pub blur:     bool,
}

/// Heading metadata reported by a parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingInfo {
  pub line:       usize,
  pub level:      u8,
  pub closed:     bool,
  pub section:    usize,
  pub numbering:  String,
  pub text:       String,
  pub link_text:  String,
  pub plain_text: String,
}

/// Dotted heading numbering from the sequence of levels seen so far.
///
/// A heading increments its own level and resets every deeper one. Leading
/// zero levels (a document whose first heading is `==`) are dropped.
#[derive(Debug, Clone, Default)]
pub struct Numbering {
  counters: [usize; 6],
}

impl Numbering {
  #[must_use]
  pub const fn new() -> Self {
    Self { counters: [0; 6] }
  }

  /// Advance for a heading of `level` (1-6) and return its path.
  pub fn next(&mut self, level: u8) -> String {
    let index = usize::from(level.clamp(1, 6)) - 1;
    self.counters[index] += 1;
    for counter in &mut self.counters[index + 1..] {
      *counter = 0;
    }
    let path = &self.counters[..=index];
    let first = path.iter().position(|c| *c != 0).unwrap_or(index);
    path[first..]
      .iter()
      .map(ToString::to_string)
      .collect::<Vec<_>>()
      .join(".")
  }
}

/// Mutable state threaded through one top-level parse.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
  pub links:              IndexSet<String>,
  pub categories:         IndexMap<String, Category>,
  pub includes:           IndexSet<String>,
  pub include_parameters: IndexMap<String, Vec<IndexMap<String, String>>>,
  pub headings:           Vec<HeadingInfo>,
  pub redirect:           Option<String>,
  /// Stripped line index (0-based) to original line number (1-based).
  pub line_map:           Vec<usize>,
  pub depth:              usize,
  section_counter:        usize,
  numbering:              Numbering,
  parents:                Vec<Parent>,
  deadline:               Deadline,
  checks:                 usize,
}

impl ParseContext {
  #[must_use]
  pub fn new(deadline: Deadline) -> Self {
    Self {
      deadline,
      ..Self::default()
    }
  }

  /// Start at `depth` instead of zero. Transcluded documents parse below
  /// the depth of their call site.
  #[must_use]
  pub const fn with_depth(mut self, depth: usize) -> Self {
    self.depth = depth;
    self
  }

  #[must_use]
  pub fn with_parent(mut self, parent: Parent) -> Self {
    self.parents.push(parent);
    self
  }

  #[must_use]
  pub fn in_parent(&self, parent: Parent) -> bool {
    self.parents.contains(&parent)
  }

  pub fn push_parent(&mut self, parent: Parent) {
    self.parents.push(parent);
  }

  pub fn pop_parent(&mut self) {
    self.parents.pop();
  }

  /// Fail once the deadline passed. The clock is only read every few calls.
  ///
  /// # Errors
  ///
  /// Returns [`ParseError::Timeout`] or [`ParseError::Cancelled`].
  pub fn check_deadline(&mut self) -> Result<(), ParseError> {
    self.checks = self.checks.wrapping_add(1);
    if !self.checks.is_multiple_of(32) {
      return Ok(());
    }
    if self.deadline.is_cancelled() || self.deadline.is_expired() {
      return Err(ParseError::stopped_by(&self.deadline));
    }
    Ok(())
  }

  #[must_use]
  pub const fn deadline(&self) -> &Deadline {
    &self.deadline
  }

  /// Original 1-based line of a stripped 0-based line.
  #[must_use]
  pub fn original_line(&self, line: usize) -> usize {
    self.line_map.get(line).copied().unwrap_or(line + 1)
  }

  pub fn record_link(&mut self, title: String) {
    self.links.insert(title);
  }

  pub fn record_category(&mut self, category: Category) {
    if !self.categories.contains_key(&category.document) {
      self.categories.insert(category.document.clone(), category);
    }
  }

  pub fn record_include(&mut self, title: &str, params: IndexMap<String, String>) {
    self.includes.insert(title.to_string());
    self
      .include_parameters
      .entry(title.to_string())
      .or_default()
      .push(params);
  }

  /// Assign the next section number and numbering path.
  pub fn next_section(&mut self, level: u8) -> (usize, String) {
    self.section_counter += 1;
    (self.section_counter, self.numbering.next(level))
  }
}
