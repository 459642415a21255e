#![allow(clippy::expect_used, clippy::unwrap_used, reason = "Fine in tests")]
use std::{fs, time::Duration};

use namumark::{MarkupOptions, MarkupProcessor, RenderRequest};
use namumark_config::{Config, ConfigError};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_load_toml_and_json_merged() {
  let temp_dir = TempDir::new().expect("Failed to create temp dir");
  let toml_path = temp_dir.path().join("base.toml");
  fs::write(
    &toml_path,
    r#"
[limits]
max_depth = 12
parse_timeout_ms = 800

[namespaces]
list = ["포털"]

[links]
document_prefix = "/wiki/"
"#,
  )
  .expect("Failed to write base.toml");

  let json_path = temp_dir.path().join("site.json");
  let json_data = json!({
    "limits": { "parse_timeout_ms": 300 },
    "messages": { "toc_title": "Contents" }
  });
  fs::write(&json_path, json_data.to_string()).expect("Failed to write site.json");

  let config = Config::load(
    &[toml_path, json_path],
    &["links.file_prefix=https://cdn.example/".to_string()],
  )
  .expect("Failed to load config");

  assert_eq!(config.limits.max_depth, Some(12));
  assert_eq!(config.limits.parse_timeout_ms, Some(300));
  assert_eq!(config.messages.toc_title.as_deref(), Some("Contents"));

  let options = config.markup_options();
  assert_eq!(options.limits.parse_timeout, Duration::from_millis(300));
  assert_eq!(options.links.document_prefix, "/wiki/");
  assert_eq!(options.links.file_prefix, "https://cdn.example/");
  assert!(options.namespaces.is_known("포털"));
}

#[test]
fn test_loaded_options_drive_rendering() {
  let temp_dir = TempDir::new().expect("Failed to create temp dir");
  let path = temp_dir.path().join("namumark.toml");
  fs::write(&path, "[links]\ndocument_prefix = \"/wiki/\"\n").expect("Failed to write config");

  let options = MarkupOptions::from(Config::load(&[path], &[]).unwrap());
  let processor = MarkupProcessor::new(options);
  let result = processor.process("[[대문]]", &RenderRequest::standalone("Test"));
  assert!(result.html.contains("href=\"/wiki/"));
}

#[test]
fn test_empty_file_is_default() {
  let temp_dir = TempDir::new().expect("Failed to create temp dir");
  let path = temp_dir.path().join("empty.toml");
  fs::write(&path, "").expect("Failed to write config");
  assert_eq!(Config::from_file(&path).unwrap(), Config::default());
}

#[test]
fn test_unsupported_extension() {
  let temp_dir = TempDir::new().expect("Failed to create temp dir");
  let path = temp_dir.path().join("config.yaml");
  fs::write(&path, "limits: {}").expect("Failed to write config");
  assert!(matches!(
    Config::from_file(&path),
    Err(ConfigError::Config(message)) if message.contains("Unsupported")
  ));
}

#[test]
fn test_invalid_toml_reports_path() {
  let temp_dir = TempDir::new().expect("Failed to create temp dir");
  let path = temp_dir.path().join("broken.toml");
  fs::write(&path, "[limits\nmax_depth = ").expect("Failed to write config");
  let error = Config::from_file(&path).unwrap_err().to_string();
  assert!(error.contains("broken.toml"));
}

#[test]
fn test_load_validates() {
  let temp_dir = TempDir::new().expect("Failed to create temp dir");
  let path = temp_dir.path().join("bad.json");
  fs::write(&path, json!({ "limits": { "max_depth": 0 } }).to_string())
    .expect("Failed to write config");
  assert!(matches!(
    Config::load(&[path], &[]),
    Err(ConfigError::InvalidValue { key, .. }) if key == "limits.max_depth"
  ));
}
