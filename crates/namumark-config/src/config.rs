use std::{
  fs,
  path::{Path, PathBuf},
  str::FromStr,
  time::Duration,
};

use namumark::{Limits, MarkupOptions, MarkupOptionsBuilder, Messages, NamespaceConfig};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the namumark renderer.
///
/// Every field is optional. Whatever a file leaves out keeps the renderer's
/// built-in default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub limits:     LimitsConfig,
  pub namespaces: NamespacesConfig,
  pub links:      LinksConfig,
  pub messages:   MessagesConfig,
}

/// Resource caps. Timeouts are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
  pub max_depth:          Option<usize>,
  pub max_output_len:     Option<usize>,
  pub parse_timeout_ms:   Option<u64>,
  pub render_timeout_ms:  Option<u64>,
  pub sandbox_timeout_ms: Option<u64>,
  pub max_macro_calls:    Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespacesConfig {
  /// Namespaces recognised in addition to the built-in ones.
  pub list:     Vec<String>,
  pub default:  Option<String>,
  pub category: Option<String>,
  pub file:     Option<String>,
  pub user:     Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
  /// Prefix of document URLs, `/w/` by default.
  pub document_prefix: Option<String>,
  /// Prefix of file URLs, `/file/` by default.
  pub file_prefix:     Option<String>,
}

/// Replacements for the user-facing texts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
  pub render_too_long: Option<String>,
  pub render_timeout:  Option<String>,
  pub render_failed:   Option<String>,
  pub parse_timeout:   Option<String>,
  pub parse_failed:    Option<String>,
  pub folding:         Option<String>,
  pub toc_title:       Option<String>,
}

/// `Some` of `other` wins over `base`.
fn merge_option<T>(base: &mut Option<T>, other: Option<T>) {
  if other.is_some() {
    *base = other;
  }
}

/// Parse an override value; an empty value clears the field.
fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<Option<T>, ConfigError>
where
  T::Err: std::fmt::Display,
{
  if value.is_empty() {
    return Ok(None);
  }
  value.parse().map(Some).map_err(|e: T::Err| {
    ConfigError::InvalidValue {
      key:     key.to_string(),
      message: e.to_string(),
    }
  })
}

fn string_value(value: &str) -> Option<String> {
  (!value.is_empty()).then(|| value.to_string())
}

impl Config {
  /// Load configuration from a file.
  ///
  /// The format follows the extension: `.toml` or `.json`.
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be read or parsed, or if the format is
  /// unsupported.
  #[allow(
    clippy::option_if_let_else,
    reason = "Clearer with explicit match on extension"
  )]
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
      ConfigError::Config(format!(
        "Failed to read config file: {}: {}",
        path.display(),
        e
      ))
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
      Some(ext) => {
        match ext.to_lowercase().as_str() {
          "json" => {
            serde_json::from_str(&content).map_err(|e| {
              ConfigError::Config(format!(
                "Failed to parse JSON config from {}: {}",
                path.display(),
                e
              ))
            })
          },
          "toml" => {
            toml::from_str(&content).map_err(|e| {
              ConfigError::Config(format!(
                "Failed to parse TOML config from {}: {}",
                path.display(),
                e
              ))
            })
          },
          _ => {
            Err(ConfigError::Config(format!(
              "Unsupported config file format: {}",
              path.display()
            )))
          },
        }
      },
      None => {
        Err(ConfigError::Config(format!(
          "Config file has no extension: {}",
          path.display()
        )))
      },
    }
  }

  /// Load and merge `config_files` in order, then apply `config_overrides`.
  ///
  /// # Errors
  ///
  /// Returns an error if a file fails to load, an override is malformed, or
  /// the result does not validate.
  pub fn load(
    config_files: &[PathBuf],
    config_overrides: &[String],
  ) -> Result<Self, ConfigError> {
    let mut config = Self::default();
    for path in config_files {
      config.merge(Self::from_file(path)?);
    }
    if config_files.len() > 1 {
      log::info!("Loaded and merged {} config files", config_files.len());
    }

    if !config_overrides.is_empty() {
      config.apply_overrides(config_overrides)?;
    }

    config.validate()?;
    Ok(config)
  }

  /// Merge another config into this one, with the other config's values taking
  /// precedence.
  ///
  /// # Merge Rules
  ///
  /// - [`Option<T>`] fields: Other's [`Some`] value replaces this config's
  ///   value
  /// - The namespace list: Other's names are appended, skipping duplicates
  pub fn merge(&mut self, other: Self) {
    let Self {
      limits,
      namespaces,
      links,
      messages,
    } = other;

    merge_option(&mut self.limits.max_depth, limits.max_depth);
    merge_option(&mut self.limits.max_output_len, limits.max_output_len);
    merge_option(&mut self.limits.parse_timeout_ms, limits.parse_timeout_ms);
    merge_option(&mut self.limits.render_timeout_ms, limits.render_timeout_ms);
    merge_option(&mut self.limits.sandbox_timeout_ms, limits.sandbox_timeout_ms);
    merge_option(&mut self.limits.max_macro_calls, limits.max_macro_calls);

    for namespace in namespaces.list {
      if !self.namespaces.list.contains(&namespace) {
        self.namespaces.list.push(namespace);
      }
    }
    merge_option(&mut self.namespaces.default, namespaces.default);
    merge_option(&mut self.namespaces.category, namespaces.category);
    merge_option(&mut self.namespaces.file, namespaces.file);
    merge_option(&mut self.namespaces.user, namespaces.user);

    merge_option(&mut self.links.document_prefix, links.document_prefix);
    merge_option(&mut self.links.file_prefix, links.file_prefix);

    merge_option(&mut self.messages.render_too_long, messages.render_too_long);
    merge_option(&mut self.messages.render_timeout, messages.render_timeout);
    merge_option(&mut self.messages.render_failed, messages.render_failed);
    merge_option(&mut self.messages.parse_timeout, messages.parse_timeout);
    merge_option(&mut self.messages.parse_failed, messages.parse_failed);
    merge_option(&mut self.messages.folding, messages.folding);
    merge_option(&mut self.messages.toc_title, messages.toc_title);
  }

  /// Apply configuration overrides from KEY=VALUE strings.
  ///
  /// Keys are dotted paths such as `limits.max_depth`. An empty value resets
  /// the field to its default; `namespaces.list` takes a comma separated
  /// list.
  ///
  /// # Errors
  ///
  /// Returns an error if:
  ///
  /// - An override string is not in KEY=VALUE format
  /// - A key is not recognized
  /// - A value cannot be parsed as the expected type
  ///
  /// # Example
  ///
  /// ```rust
  /// use namumark_config::Config;
  ///
  /// let mut config = Config::default();
  /// config
  ///   .apply_overrides(&["limits.max_depth=8".to_string()])
  ///   .unwrap();
  /// assert_eq!(config.limits.max_depth, Some(8));
  /// ```
  pub fn apply_overrides(
    &mut self,
    overrides: &[String],
  ) -> Result<(), ConfigError> {
    for override_str in overrides {
      let (key, value) = override_str.split_once('=').ok_or_else(|| {
        ConfigError::Config(format!(
          "Invalid config override format: '{override_str}'. Expected \
           KEY=VALUE"
        ))
      })?;

      self.apply_override(key.trim(), value.trim())?;
    }

    Ok(())
  }

  fn apply_override(
    &mut self,
    key: &str,
    value: &str,
  ) -> Result<(), ConfigError> {
    log::debug!("Applying config override {key}={value}");
    match key {
      "limits.max_depth" => self.limits.max_depth = parse_value(key, value)?,
      "limits.max_output_len" => {
        self.limits.max_output_len = parse_value(key, value)?;
      },
      "limits.parse_timeout_ms" => {
        self.limits.parse_timeout_ms = parse_value(key, value)?;
      },
      "limits.render_timeout_ms" => {
        self.limits.render_timeout_ms = parse_value(key, value)?;
      },
      "limits.sandbox_timeout_ms" => {
        self.limits.sandbox_timeout_ms = parse_value(key, value)?;
      },
      "limits.max_macro_calls" => {
        self.limits.max_macro_calls = parse_value(key, value)?;
      },
      "namespaces.list" => {
        self.namespaces.list = value
          .split(',')
          .map(str::trim)
          .filter(|name| !name.is_empty())
          .map(String::from)
          .collect();
      },
      "namespaces.default" => self.namespaces.default = string_value(value),
      "namespaces.category" => self.namespaces.category = string_value(value),
      "namespaces.file" => self.namespaces.file = string_value(value),
      "namespaces.user" => self.namespaces.user = string_value(value),
      "links.document_prefix" => {
        self.links.document_prefix = string_value(value);
      },
      "links.file_prefix" => self.links.file_prefix = string_value(value),
      "messages.render_too_long" => {
        self.messages.render_too_long = string_value(value);
      },
      "messages.render_timeout" => {
        self.messages.render_timeout = string_value(value);
      },
      "messages.render_failed" => {
        self.messages.render_failed = string_value(value);
      },
      "messages.parse_timeout" => {
        self.messages.parse_timeout = string_value(value);
      },
      "messages.parse_failed" => {
        self.messages.parse_failed = string_value(value);
      },
      "messages.folding" => self.messages.folding = string_value(value),
      "messages.toc_title" => self.messages.toc_title = string_value(value),
      _ => return Err(ConfigError::UnknownKey(key.to_string())),
    }
    Ok(())
  }

  /// Check values the renderer cannot work with.
  ///
  /// # Errors
  ///
  /// Returns [`ConfigError::InvalidValue`] for the first offending field.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let invalid = |key: &str, message: &str| {
      Err(ConfigError::InvalidValue {
        key:     key.to_string(),
        message: message.to_string(),
      })
    };
    if self.limits.max_depth == Some(0) {
      return invalid("limits.max_depth", "must be at least 1");
    }
    if self.limits.max_output_len == Some(0) {
      return invalid("limits.max_output_len", "must be at least 1");
    }
    if let Some(name) = self
      .namespaces
      .list
      .iter()
      .find(|name| name.trim().is_empty() || name.contains(':'))
    {
      return invalid("namespaces.list", &format!("invalid namespace '{name}'"));
    }

    let namespaces = self.namespace_config();
    for (key, role) in [
      ("namespaces.default", &self.namespaces.default),
      ("namespaces.category", &self.namespaces.category),
      ("namespaces.file", &self.namespaces.file),
      ("namespaces.user", &self.namespaces.user),
    ] {
      if let Some(name) = role
        && !namespaces.namespaces.contains(name)
      {
        return invalid(key, &format!("'{name}' is not a known namespace"));
      }
    }
    Ok(())
  }

  fn limits(&self) -> Limits {
    let defaults = Limits::default();
    let millis = |value: Option<u64>, default: Duration| value.map_or(default, Duration::from_millis);
    Limits {
      max_depth:       self.limits.max_depth.unwrap_or(defaults.max_depth),
      max_output_len:  self.limits.max_output_len.unwrap_or(defaults.max_output_len),
      parse_timeout:   millis(self.limits.parse_timeout_ms, defaults.parse_timeout),
      render_timeout:  millis(self.limits.render_timeout_ms, defaults.render_timeout),
      sandbox_timeout: millis(self.limits.sandbox_timeout_ms, defaults.sandbox_timeout),
      max_macro_calls: self.limits.max_macro_calls.unwrap_or(defaults.max_macro_calls),
    }
  }

  fn namespace_config(&self) -> NamespaceConfig {
    let mut config = NamespaceConfig::default();
    for name in &self.namespaces.list {
      if !config.namespaces.contains(name) {
        config.namespaces.push(name.clone());
      }
    }
    let roles = [
      (&mut config.default, &self.namespaces.default),
      (&mut config.category, &self.namespaces.category),
      (&mut config.file, &self.namespaces.file),
      (&mut config.user, &self.namespaces.user),
    ];
    for (target, value) in roles {
      if let Some(value) = value {
        target.clone_from(value);
      }
    }
    config
  }

  fn messages(&self) -> Messages {
    let mut messages = Messages::default();
    let replacements = [
      (&mut messages.render_too_long, &self.messages.render_too_long),
      (&mut messages.render_timeout, &self.messages.render_timeout),
      (&mut messages.render_failed, &self.messages.render_failed),
      (&mut messages.parse_timeout, &self.messages.parse_timeout),
      (&mut messages.parse_failed, &self.messages.parse_failed),
      (&mut messages.folding, &self.messages.folding),
      (&mut messages.toc_title, &self.messages.toc_title),
    ];
    for (target, value) in replacements {
      if let Some(value) = value {
        target.clone_from(value);
      }
    }
    messages
  }

  /// Options for [`namumark::MarkupProcessor`].
  #[must_use]
  pub fn markup_options(&self) -> MarkupOptions {
    let mut builder = MarkupOptionsBuilder::new()
      .limits(self.limits())
      .namespaces(self.namespace_config())
      .messages(self.messages());
    if let Some(prefix) = &self.links.document_prefix {
      builder = builder.document_prefix(prefix.as_str());
    }
    if let Some(prefix) = &self.links.file_prefix {
      builder = builder.file_prefix(prefix.as_str());
    }
    builder.build()
  }
}

impl From<Config> for MarkupOptions {
  fn from(config: Config) -> Self {
    config.markup_options()
  }
}

#[cfg(test)]
mod tests {
  #![allow(
    clippy::unwrap_used,
    clippy::field_reassign_with_default,
    reason = "Fine in tests"
  )]

  use super::*;

  #[test]
  fn test_config_merge_option_fields() {
    let mut base = Config::default();
    base.limits.max_depth = Some(10);
    base.links.document_prefix = Some("/wiki/".to_string());

    let mut other = Config::default();
    other.limits.max_depth = None; // should not replace
    other.limits.max_macro_calls = Some(5);

    base.merge(other);

    assert_eq!(base.limits.max_depth, Some(10));
    assert_eq!(base.limits.max_macro_calls, Some(5));
    assert_eq!(base.links.document_prefix.as_deref(), Some("/wiki/"));
  }

  #[test]
  fn test_config_merge_namespace_list_appends() {
    let mut base = Config::default();
    base.namespaces.list = vec!["위키".to_string()];

    let mut other = Config::default();
    other.namespaces.list = vec!["위키".to_string(), "포털".to_string()];

    base.merge(other);
    assert_eq!(base.namespaces.list, vec!["위키", "포털"]);
  }

  #[test]
  fn test_apply_overrides() {
    let mut config = Config::default();
    config
      .apply_overrides(&[
        "limits.parse_timeout_ms=250".to_string(),
        "namespaces.list=위키, 포털".to_string(),
        "messages.toc_title=Contents".to_string(),
      ])
      .unwrap();
    assert_eq!(config.limits.parse_timeout_ms, Some(250));
    assert_eq!(config.namespaces.list, vec!["위키", "포털"]);
    assert_eq!(config.messages.toc_title.as_deref(), Some("Contents"));
  }

  #[test]
  fn test_apply_overrides_every_limit() {
    let mut config = Config::default();
    config
      .apply_overrides(&[
        "limits.max_output_len=4096".to_string(),
        "limits.render_timeout_ms=300".to_string(),
        "limits.sandbox_timeout_ms=20".to_string(),
        "limits.max_macro_calls=7".to_string(),
      ])
      .unwrap();
    assert_eq!(config.limits.max_output_len, Some(4096));
    assert_eq!(config.limits.render_timeout_ms, Some(300));
    assert_eq!(config.limits.sandbox_timeout_ms, Some(20));
    assert_eq!(config.limits.max_macro_calls, Some(7));
  }

  #[test]
  fn test_apply_overrides_empty_resets() {
    let mut config = Config::default();
    config.limits.max_depth = Some(3);
    config
      .apply_overrides(&["limits.max_depth=".to_string()])
      .unwrap();
    assert_eq!(config.limits.max_depth, None);
  }

  #[test]
  fn test_apply_overrides_invalid_format() {
    let mut config = Config::default();
    let result = config.apply_overrides(&["limits.max_depth".to_string()]);
    assert!(matches!(result, Err(ConfigError::Config(_))));
  }

  #[test]
  fn test_apply_overrides_unknown_key() {
    let mut config = Config::default();
    let result = config.apply_overrides(&["limits.nope=1".to_string()]);
    assert!(matches!(result, Err(ConfigError::UnknownKey(key)) if key == "limits.nope"));
  }

  #[test]
  fn test_apply_overrides_invalid_numeric() {
    let mut config = Config::default();
    let result = config.apply_overrides(&["limits.max_depth=deep".to_string()]);
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
  }

  #[test]
  fn test_validate() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.limits.max_depth = Some(0);
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.namespaces.category = Some("없는곳".to_string());
    assert!(config.validate().is_err());

    config.namespaces.list.push("없는곳".to_string());
    assert!(config.validate().is_ok());

    config.namespaces.list.push("a:b".to_string());
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_markup_options() {
    let mut config = Config::default();
    config.limits.render_timeout_ms = Some(1500);
    config.namespaces.list = vec!["포털".to_string()];
    config.links.file_prefix = Some("https://cdn.example/".to_string());
    config.messages.render_failed = Some("failed".to_string());

    let options = MarkupOptions::from(config);
    assert_eq!(options.limits.render_timeout, Duration::from_millis(1500));
    assert_eq!(options.limits.max_depth, Limits::default().max_depth);
    assert!(options.namespaces.is_known("포털"));
    assert!(options.namespaces.is_known("틀"));
    assert_eq!(options.links.file_prefix, "https://cdn.example/");
    assert_eq!(options.links.document_prefix, "/w/");
    assert_eq!(options.messages.render_failed, "failed");
  }
}
