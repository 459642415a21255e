use serde::{Deserialize, Serialize};

use crate::{error::ErrorCode, parser::Category};

/// A heading as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedHeading {
  /// Line in the original source, 1-based.
  pub line:      usize,
  pub level:     u8,
  pub section:   usize,
  pub numbering: String,
  /// Element id of the heading (`s-1.2`).
  pub anchor:    String,
  pub title:     String,
}

/// Preview data for link cards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
  /// Leading visible text, whitespace collapsed.
  pub text:  String,
  /// URL of the first image.
  pub image: Option<String>,
}

/// Result of rendering a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
  /// The rendered HTML; a short error notice when `has_error` is set.
  pub html:           String,
  /// Full titles of linked documents, in order of first appearance.
  pub links:          Vec<String>,
  /// Full titles of embedded files.
  pub files:          Vec<String>,
  pub categories:     Vec<Category>,
  pub headings:       Vec<RenderedHeading>,
  pub has_error:      bool,
  pub error_code:     ErrorCode,
  pub error_message:  Option<String>,
  /// Identifier logged alongside caught panics.
  pub correlation_id: Option<String>,
  pub embed:          Embed,
  pub redirect:       Option<String>,
}

impl RenderResult {
  /// An error result showing `message`.
  #[must_use]
  pub fn failed(code: ErrorCode, message: Option<&str>) -> Self {
    let html = message.map_or_else(String::new, |message| {
      format!(
        "<div class=\"wiki-error\">{}</div>",
        crate::utils::escape_html(message)
      )
    });
    Self {
      html,
      has_error: true,
      error_code: code,
      error_message: message.map(str::to_string),
      ..Self::default()
    }
  }
}
