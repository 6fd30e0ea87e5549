//! Configuration management for deploy.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.deploy-cli/config.json` (or `config.jsonc`)
//! 2. Environment variable: `DEPLOY_CONFIG_CONTENT`
//! 3. Project config: `deploy.json` or `deploy.jsonc` in the working directory
//!
//! Supports JSONC (JSON with comments) and variable substitution:
//! - `{env:VAR_NAME}` - Substitute environment variable
//! - `{file:path}` - Substitute file contents

use crate::error::{ConfigError, CoreResult};
use deploy_provider::groq::GROQ_API_KEY_ENV;
use deploy_provider::model::DEFAULT_MODEL;
use deploy_util::log::LogLevel;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable holding inline config content.
pub const CONFIG_CONTENT_ENV: &str = "DEPLOY_CONFIG_CONTENT";

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Be concise and professional.";

/// Default number of model calls per user message.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Default size above which referenced files are not inlined (50 KiB).
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 50 * 1024;

/// Default reasoning format requested from the provider.
pub const DEFAULT_REASONING_FORMAT: &str = "parsed";

static VAR_REGEX: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\{(env|file):([^}]+)\}").ok());

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model ID, e.g. `openai/gpt-oss-120b`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// System prompt sent with every model call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Model calls allowed per user message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,

    /// Size in bytes above which `@file` references are not inlined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_file_threshold: Option<u64>,

    /// Undo stack depth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_capacity: Option<usize>,

    /// Log level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Provider connection settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,
}

/// Provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OpenAI-compatible endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API key. Falls back to `GROQ_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Reasoning format (`parsed`, `raw`, `hidden`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_format: Option<String>,
}

impl ProviderConfig {
    /// Merge another provider config into this one (other takes precedence).
    pub fn merge(self, other: Self) -> Self {
        Self {
            base_url: other.base_url.or(self.base_url),
            api_key: other.api_key.or(self.api_key),
            reasoning_format: other.reasoning_format.or(self.reasoning_format),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Loading order (later sources override earlier):
    /// 1. Global config from `~/.deploy-cli/`
    /// 2. `DEPLOY_CONFIG_CONTENT` environment variable
    /// 3. Project config from `project_dir`
    pub async fn load(project_dir: Option<&Path>) -> CoreResult<(Self, Vec<PathBuf>)> {
        let global_dir = deploy_util::path::data_dir();
        let env_content = std::env::var(CONFIG_CONTENT_ENV).ok();
        Self::load_from(global_dir.as_deref(), env_content.as_deref(), project_dir).await
    }

    /// Load configuration from explicit sources.
    pub async fn load_from(
        global_dir: Option<&Path>,
        env_content: Option<&str>,
        project_dir: Option<&Path>,
    ) -> CoreResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        if let Some(dir) = global_dir {
            if let Some(path) = first_existing(dir, &["config.json", "config.jsonc"]) {
                config = config.merge(Self::load_file(&path).await?);
                sources.push(path);
            }
        }

        if let Some(content) = env_content {
            let content = Self::substitute_variables(content, Path::new("."))?;
            config = config.merge(Self::parse_jsonc(&content, "<env>")?);
        }

        if let Some(dir) = project_dir {
            if let Some(path) = first_existing(dir, &["deploy.jsonc", "deploy.json"]) {
                config = config.merge(Self::load_file(&path).await?);
                sources.push(path);
            }
        }

        debug!(sources = ?sources, "Loaded configuration");
        Ok((config, sources))
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::substitute_variables(&content, path)?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Parse JSONC (JSON with comments).
    pub fn parse_jsonc(content: &str, source: &str) -> CoreResult<Self> {
        let stripped = strip_comments(content);
        serde_json::from_str(&stripped).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Substitute `{env:...}` and `{file:...}` references.
    ///
    /// File references resolve relative to the config file's directory.
    fn substitute_variables(content: &str, config_path: &Path) -> CoreResult<String> {
        let Some(re) = VAR_REGEX.as_ref() else {
            return Ok(content.to_string());
        };
        let config_dir = config_path.parent().unwrap_or(Path::new("."));

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let (Some(full), Some(kind), Some(value)) = (cap.get(0), cap.get(1), cap.get(2))
            else {
                continue;
            };
            let value = value.as_str();

            let replacement = match kind.as_str() {
                "env" => std::env::var(value).map_err(|_| ConfigError::EnvVarNotFound {
                    name: value.to_string(),
                })?,
                "file" => {
                    let file_path = config_dir.join(value);
                    std::fs::read_to_string(&file_path)
                        .map_err(|_| ConfigError::FileRefNotFound {
                            path: file_path.display().to_string(),
                        })?
                        .trim()
                        .to_string()
                }
                _ => continue,
            };

            result = result.replace(full.as_str(), &replacement);
        }

        Ok(result)
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(self, other: Self) -> Self {
        Self {
            model: other.model.or(self.model),
            system_prompt: other.system_prompt.or(self.system_prompt),
            max_iterations: other.max_iterations.or(self.max_iterations),
            large_file_threshold: other.large_file_threshold.or(self.large_file_threshold),
            history_capacity: other.history_capacity.or(self.history_capacity),
            log_level: other.log_level.or(self.log_level),
            provider: match (self.provider, other.provider) {
                (Some(base), Some(other)) => Some(base.merge(other)),
                (base, other) => other.or(base),
            },
        }
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS).max(1)
    }

    pub fn large_file_threshold(&self) -> u64 {
        self.large_file_threshold
            .unwrap_or(DEFAULT_LARGE_FILE_THRESHOLD)
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
            .unwrap_or(deploy_snapshot::DEFAULT_CAPACITY)
    }

    /// Configured log level; unknown names fall back to the default.
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::parse)
            .unwrap_or_default()
    }

    /// API key from config, else from `GROQ_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.provider
            .as_ref()
            .and_then(|p| p.api_key.clone())
            .or_else(|| std::env::var(GROQ_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn base_url(&self) -> Option<&str> {
        self.provider.as_ref().and_then(|p| p.base_url.as_deref())
    }

    pub fn reasoning_format(&self) -> &str {
        self.provider
            .as_ref()
            .and_then(|p| p.reasoning_format.as_deref())
            .unwrap_or(DEFAULT_REASONING_FORMAT)
    }
}

fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names.iter().map(|n| dir.join(n)).find(|p| p.is_file())
}

/// Strip `//` and `/* */` comments outside of string literals.
fn strip_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            result.push(c);
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string {
            result.push(c);
            escape_next = true;
            continue;
        }

        if c == '"' {
            in_string = !in_string;
            result.push(c);
            continue;
        }

        if in_string {
            result.push(c);
            continue;
        }

        if c == '/' {
            match chars.peek() {
                Some('/') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if c == '\n' {
                            result.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    chars.next();
                    let mut prev = ' ';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        // Keep line numbers stable for error messages
                        if c == '\n' {
                            result.push('\n');
                        }
                        prev = c;
                    }
                    continue;
                }
                _ => {}
            }
        }

        result.push(c);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments() {
        let input = r#"{
            // Line comment
            "model": "value", // trailing comment
            /* block comment */
            "log_level": "val/*not a comment*/ue"
        }"#;

        let result = strip_comments(input);
        assert!(!result.contains("Line comment"));
        assert!(!result.contains("trailing comment"));
        assert!(!result.contains("block comment"));
        assert!(result.contains("val/*not a comment*/ue"));
    }

    #[test]
    fn test_parse_jsonc() {
        let input = r#"{
            // Pick a smaller model
            "model": "openai/gpt-oss-20b",
            "max_iterations": 4
        }"#;

        let config = Config::parse_jsonc(input, "test").unwrap();
        assert_eq!(config.model(), "openai/gpt-oss-20b");
        assert_eq!(config.max_iterations(), 4);
    }

    #[test]
    fn test_invalid_json_reports_source() {
        let err = Config::parse_jsonc("{ nope", "deploy.json").unwrap_err();
        assert!(err.to_string().contains("deploy.json"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.model(), "openai/gpt-oss-120b");
        assert_eq!(config.system_prompt(), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.max_iterations(), 10);
        assert_eq!(config.large_file_threshold(), 51_200);
        assert_eq!(config.history_capacity(), 20);
        assert_eq!(config.log_level(), LogLevel::Info);
        assert_eq!(config.reasoning_format(), "parsed");
    }

    #[test]
    fn test_merge_config() {
        let base = Config {
            model: Some("a".to_string()),
            max_iterations: Some(3),
            provider: Some(ProviderConfig {
                base_url: Some("http://base".to_string()),
                api_key: Some("k1".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let other = Config {
            model: Some("b".to_string()),
            provider: Some(ProviderConfig {
                api_key: Some("k2".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.model(), "b");
        assert_eq!(merged.max_iterations(), 3);
        assert_eq!(merged.base_url(), Some("http://base"));
        assert_eq!(merged.api_key().as_deref(), Some("k2"));
    }

    #[test]
    fn test_substitute_file_reference() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("prompt.txt"), "Be brief.\n").unwrap();
        let config_path = dir.path().join("deploy.json");

        let content = r#"{"system_prompt": "{file:prompt.txt}"}"#;
        let substituted = Config::substitute_variables(content, &config_path).unwrap();
        assert_eq!(substituted, r#"{"system_prompt": "Be brief."}"#);
    }

    #[test]
    fn test_substitute_missing_env() {
        let content = r#"{"model": "{env:DEPLOY_TEST_SURELY_UNSET_VAR}"}"#;
        let err = Config::substitute_variables(content, Path::new("x.json")).unwrap_err();
        assert!(err
            .to_string()
            .contains("environment variable not found: DEPLOY_TEST_SURELY_UNSET_VAR"));
    }
}
