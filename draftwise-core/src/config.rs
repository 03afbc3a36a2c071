//! Configuration parsing and management.

use draftwise_types::{FormatKind, OperationKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Main configuration struct matching the draftwise.yml schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum undo entries kept; 0 keeps everything.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    100
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// How the text produced by a generator is turned into document content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Text,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Per-operation overrides for the context handed to the backend,
    /// keyed by operation name ("improve", "tone-formal", ...).
    #[serde(default)]
    pub shared_contexts: HashMap<String, String>,

    /// Target language for `translate` when the caller gives none.
    #[serde(default)]
    pub translate_to: Option<String>,
}

impl AiConfig {
    pub fn shared_context(&self, kind: OperationKind) -> Option<&str> {
        self.shared_contexts.get(kind.as_str()).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_true")]
    pub pretty_json: bool,

    #[serde(default = "default_format")]
    pub default_format: FormatKind,
}

fn default_true() -> bool {
    true
}

fn default_format() -> FormatKind {
    FormatKind::Html
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            pretty_json: true,
            default_format: default_format(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Get a nested config value using dotted path (e.g., "history.max_depth")
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["history", "max_depth"] => Some(self.history.max_depth.to_string()),
            ["ai", "output_format"] => Some(
                match self.ai.output_format {
                    OutputFormat::Markdown => "markdown",
                    OutputFormat::Text => "text",
                }
                .to_string(),
            ),
            ["ai", "translate_to"] => self.ai.translate_to.clone(),
            ["ai", "shared_contexts", op] => self.ai.shared_contexts.get(*op).cloned(),
            ["export", "pretty_json"] => Some(self.export.pretty_json.to_string()),
            ["export", "default_format"] => Some(self.export.default_format.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.history.max_depth, 100);
        assert_eq!(config.ai.output_format, OutputFormat::Markdown);
        assert!(config.export.pretty_json);
        assert_eq!(config.export.default_format, FormatKind::Html);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
history:
  max_depth: 5
ai:
  output_format: text
  shared_contexts:
    improve: "Polish the prose"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.history.max_depth, 5);
        assert_eq!(config.ai.output_format, OutputFormat::Text);
        assert_eq!(
            config.ai.shared_context(OperationKind::Improve),
            Some("Polish the prose")
        );
        assert_eq!(config.ai.shared_context(OperationKind::Fix), None);
        assert!(config.export.pretty_json);
    }

    #[test]
    fn test_get_nested_value() {
        let config = Config::from_yaml("export:\n  default_format: markdown\n").unwrap();
        assert_eq!(config.get("export.default_format"), Some("markdown".into()));
        assert_eq!(config.get("history.max_depth"), Some("100".into()));
        assert_eq!(config.get("nonexistent.key"), None);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("draftwise.yml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
