//! Document identity: namespaces, titles and relative targets.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Namespaces known to the wiki and the roles some of them play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
  /// Every namespace recognised as a `prefix:` of a title.
  pub namespaces: Vec<String>,
  /// Namespace of titles without a prefix. Hidden when displayed.
  pub default:    String,
  /// Namespace whose links assign categories.
  pub category:   String,
  /// Namespace whose links embed files.
  pub file:       String,
  /// Namespace of user pages, targeted by mentions.
  pub user:       String,
}

impl Default for NamespaceConfig {
  fn default() -> Self {
    Self {
      namespaces: ["문서", "틀", "분류", "파일", "사용자", "나무위키", "휴지통"]
        .into_iter()
        .map(String::from)
        .collect(),
      default:    "문서".to_string(),
      category:   "분류".to_string(),
      file:       "파일".to_string(),
      user:       "사용자".to_string(),
    }
  }
}

impl NamespaceConfig {
  #[must_use]
  pub fn is_known(&self, namespace: &str) -> bool {
    namespace == self.default || self.namespaces.iter().any(|n| n == namespace)
  }
}

/// A document in some namespace.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DocumentRef {
  pub namespace: String,
  pub title:     String,
}

/// A raw link target after namespace detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTitle {
  pub document:  DocumentRef,
  /// The target started with `:`, so namespace semantics (category
  /// assignment, file embedding) are suppressed.
  pub forced:    bool,
  /// The namespace was written out rather than defaulted.
  pub explicit:  bool,
}

impl DocumentRef {
  pub fn new(namespace: impl Into<String>, title: impl Into<String>) -> Self {
    Self {
      namespace: namespace.into(),
      title:     title.into(),
    }
  }

  /// Split a raw title into namespace and title. Unknown prefixes stay part
  /// of the title.
  #[must_use]
  pub fn parse(raw: &str, config: &NamespaceConfig) -> ResolvedTitle {
    let raw = raw.trim();
    let (forced, raw) = raw
      .strip_prefix(':')
      .map_or((false, raw), |stripped| (true, stripped.trim_start()));
    if let Some((prefix, title)) = raw.split_once(':') {
      let prefix = prefix.trim();
      let title = title.trim();
      if !title.is_empty() && config.is_known(prefix) {
        return ResolvedTitle {
          document: Self::new(prefix, title),
          forced,
          explicit: true,
        };
      }
    }
    ResolvedTitle {
      document: Self::new(config.default.as_str(), raw),
      forced,
      explicit: false,
    }
  }

  /// The title as shown to readers. The default namespace is hidden unless
  /// `show` asks for it; other namespaces are shown unless `show` is
  /// `Some(false)`.
  #[must_use]
  pub fn display(&self, config: &NamespaceConfig, show: Option<bool>) -> String {
    let visible = if self.namespace == config.default {
      show == Some(true)
    } else {
      show != Some(false)
    };
    if visible {
      format!("{}:{}", self.namespace, self.title)
    } else {
      self.title.clone()
    }
  }

  /// Canonical full title used for metadata and URLs.
  #[must_use]
  pub fn full_title(&self, config: &NamespaceConfig) -> String {
    self.display(config, None)
  }

  /// Title of the parent page (`A/B` → `A`), if any.
  #[must_use]
  pub fn parent(&self) -> Option<Self> {
    self
      .title
      .rsplit_once('/')
      .filter(|(parent, _)| !parent.is_empty())
      .map(|(parent, _)| Self::new(self.namespace.as_str(), parent))
  }
}

impl fmt::Display for DocumentRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.namespace, self.title)
  }
}

/// Expand a relative target (`/Sub`, `../`, `../Sibling`) against the
/// current document. Absolute targets are returned unchanged.
#[must_use]
pub fn resolve_relative(
  target: &str,
  current: &DocumentRef,
  config: &NamespaceConfig,
) -> String {
  if let Some(sub) = target.strip_prefix('/') {
    return format!("{}/{sub}", current.full_title(config));
  }
  if !target.starts_with("../") {
    return target.to_string();
  }
  let mut base = current.clone();
  let mut rest = target;
  while let Some(after) = rest.strip_prefix("../") {
    base = base.parent().unwrap_or(base);
    rest = after;
  }
  if rest.is_empty() {
    base.full_title(config)
  } else {
    format!("{}/{rest}", base.full_title(config))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_known_namespace() {
    let config = NamespaceConfig::default();
    let resolved = DocumentRef::parse("분류:Foo", &config);
    assert_eq!(resolved.document, DocumentRef::new("분류", "Foo"));
    assert!(resolved.explicit);
    assert!(!resolved.forced);
  }

  #[test]
  fn test_unknown_prefix_is_title() {
    let config = NamespaceConfig::default();
    let resolved = DocumentRef::parse("Re:Zero", &config);
    assert_eq!(resolved.document, DocumentRef::new("문서", "Re:Zero"));
  }

  #[test]
  fn test_leading_colon_forces_plain_link() {
    let config = NamespaceConfig::default();
    let resolved = DocumentRef::parse(":분류:Foo", &config);
    assert!(resolved.forced);
    assert_eq!(resolved.document.namespace, "분류");
  }

  #[test]
  fn test_display_rules() {
    let config = NamespaceConfig::default();
    let plain = DocumentRef::new("문서", "A");
    let template = DocumentRef::new("틀", "B");
    assert_eq!(plain.display(&config, None), "A");
    assert_eq!(plain.display(&config, Some(true)), "문서:A");
    assert_eq!(template.display(&config, None), "틀:B");
    assert_eq!(template.display(&config, Some(false)), "B");
  }

  #[test]
  fn test_relative_targets() {
    let config = NamespaceConfig::default();
    let current = DocumentRef::new("문서", "A/B");
    assert_eq!(resolve_relative("/C", &current, &config), "A/B/C");
    assert_eq!(resolve_relative("../", &current, &config), "A");
    assert_eq!(resolve_relative("../D", &current, &config), "A/D");
    assert_eq!(resolve_relative("X", &current, &config), "X");
  }
}
