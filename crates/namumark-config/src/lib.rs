//! Configuration for the namumark renderer.
//!
//! A [`Config`] is read from TOML or JSON files, merged, adjusted with
//! `KEY=VALUE` overrides and finally turned into
//! [`namumark::MarkupOptions`].
pub mod config;
pub mod error;

pub use config::{Config, LimitsConfig, LinksConfig, MessagesConfig, NamespacesConfig};
pub use error::ConfigError;
