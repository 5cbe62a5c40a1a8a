//! Configuration management.
//!
//! Settings are layered, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config <path>`, or `memsweep/config.toml` in the
//!    platform config directory)
//! 3. Environment variables, including those loaded from `.env`
//!
//! ```toml
//! [store]
//! base_url = "https://api.openmemory.dev/api/v1"
//!
//! [llm]
//! models = ["openai/gpt-4o-mini", "deepseek/deepseek-chat"]
//! timeout_ms = 20000
//!
//! [retention]
//! delete_threshold = 0.85
//! page_size = 50
//!
//! [observability.logging]
//! format = "json"
//! ```

use crate::gc::RetentionConfig;
use crate::llm::{LlmHttpConfig, OpenAiClient};
use crate::models::SortDirection;
use crate::storage::OpenMemoryClient;
use crate::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Base URL for OpenRouter's `OpenAI`-compatible API.
pub const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Models consulted when none are configured.
pub const DEFAULT_MODELS: [&str; 3] = [
    "google/gemini-2.0-flash-001",
    "deepseek/deepseek-chat",
    "openai/gpt-4o-mini",
];

/// Main configuration for memsweep.
#[derive(Debug, Clone, Default)]
pub struct SweepConfig {
    /// Memory store connection.
    pub store: StoreConfig,
    /// Classifier endpoint and models.
    pub llm: LlmConfig,
    /// Sweep settings.
    pub retention: RetentionConfig,
    /// Logging and metrics.
    pub observability: ObservabilitySettings,
}

/// Memory store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// API base URL.
    pub base_url: String,
    /// Bearer token.
    pub bearer_token: Option<SecretString>,
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: OpenMemoryClient::DEFAULT_BASE_URL.to_string(),
            bearer_token: None,
            timeout_ms: 30_000,
        }
    }
}

/// Classifier configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat-completions base URL.
    pub base_url: String,
    /// API key.
    pub api_key: Option<SecretString>,
    /// Model identifiers to fan out to.
    pub models: Vec<String>,
    /// `HTTP-Referer` attribution header.
    pub referer: String,
    /// `X-Title` attribution header.
    pub title: String,
    /// Timeouts for classifier requests.
    pub http: LlmHttpConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: None,
            models: DEFAULT_MODELS.iter().map(ToString::to_string).collect(),
            referer: OpenAiClient::DEFAULT_REFERER.to_string(),
            title: OpenAiClient::DEFAULT_TITLE.to_string(),
            http: LlmHttpConfig::default(),
        }
    }
}

/// Observability section, as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservabilitySettings {
    /// Logging settings.
    pub logging: Option<LoggingSettings>,
    /// Metrics settings.
    pub metrics: Option<MetricsSettings>,
}

/// Logging settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive, e.g. `memsweep=debug`.
    pub filter: Option<String>,
    /// Log file path. Logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

/// Metrics settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics are recorded.
    pub enabled: Option<bool>,
    /// File the Prometheus exposition is written to on exit.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Store section.
    pub store: Option<ConfigFileStore>,
    /// LLM section.
    pub llm: Option<ConfigFileLlm>,
    /// Retention section.
    pub retention: Option<ConfigFileRetention>,
    /// Observability section.
    pub observability: Option<ObservabilitySettings>,
}

/// Store section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStore {
    /// Base URL.
    pub base_url: Option<String>,
    /// Bearer token.
    pub bearer_token: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Base URL.
    pub base_url: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Model identifiers.
    pub models: Option<Vec<String>>,
    /// Attribution referer.
    pub referer: Option<String>,
    /// Attribution title.
    pub title: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

/// Retention section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRetention {
    /// Delete threshold.
    pub delete_threshold: Option<f32>,
    /// Page size.
    pub page_size: Option<u32>,
    /// Sort column.
    pub sort_column: Option<String>,
    /// Sort direction.
    pub sort_direction: Option<String>,
    /// Per-sweep cap.
    pub max_records: Option<usize>,
}

impl SweepConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not a valid config file.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Returns defaults when no config file exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a config file exists but is invalid.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Returns `<config_dir>/memsweep/config.toml`, if a home directory exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "memsweep")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(store) = file.store {
            if let Some(base_url) = store.base_url {
                config.store.base_url = base_url;
            }
            if let Some(token) = store.bearer_token {
                config.store.bearer_token = Some(SecretString::from(token));
            }
            if let Some(timeout_ms) = store.timeout_ms {
                config.store.timeout_ms = timeout_ms;
            }
        }
        if let Some(llm) = file.llm {
            if let Some(base_url) = llm.base_url {
                config.llm.base_url = base_url;
            }
            if let Some(key) = llm.api_key {
                config.llm.api_key = Some(SecretString::from(key));
            }
            if let Some(models) = llm.models {
                config.llm.models = models;
            }
            if let Some(referer) = llm.referer {
                config.llm.referer = referer;
            }
            if let Some(title) = llm.title {
                config.llm.title = title;
            }
            if let Some(timeout_ms) = llm.timeout_ms {
                config.llm.http.timeout_ms = timeout_ms;
            }
            if let Some(connect_timeout_ms) = llm.connect_timeout_ms {
                config.llm.http.connect_timeout_ms = connect_timeout_ms;
            }
        }
        if let Some(retention) = file.retention {
            if let Some(threshold) = retention.delete_threshold {
                config.retention.delete_threshold = threshold;
            }
            if let Some(page_size) = retention.page_size {
                config.retention.page_size = page_size;
            }
            if let Some(column) = retention.sort_column {
                config.retention.sort_column = column;
            }
            if let Some(direction) = retention.sort_direction {
                config.retention.sort_direction = SortDirection::parse(&direction);
            }
            if retention.max_records.is_some() {
                config.retention.max_records = retention.max_records;
            }
        }
        if let Some(observability) = file.observability {
            config.observability = observability;
        }

        config
    }

    /// Applies environment variable overrides.
    ///
    /// Reads:
    /// - `OPENMEMORY_BEARER_TOKEN`, `OPENMEMORY_BASE_URL`
    /// - `OPENAI_API_KEY`, `OPENAI_BASE_URL`
    /// - `MEMSWEEP_MODELS` (comma-separated)
    /// - `MEMSWEEP_REFERER`, `MEMSWEEP_TITLE`
    /// - the retention and LLM timeout variables
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Empty values are ignored.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = lookup("OPENMEMORY_BEARER_TOKEN") {
            self.store.bearer_token = Some(SecretString::from(token));
        }
        if let Some(base_url) = lookup("OPENMEMORY_BASE_URL") {
            self.store.base_url = base_url;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(SecretString::from(key));
        }
        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(models) = lookup("MEMSWEEP_MODELS") {
            self.llm.models = parse_model_list(&models);
        }
        if let Some(referer) = lookup("MEMSWEEP_REFERER") {
            self.llm.referer = referer;
        }
        if let Some(title) = lookup("MEMSWEEP_TITLE") {
            self.llm.title = title;
        }
        self.llm.http = self.llm.http.with_overrides_from(lookup);
        self.retention = self.retention.with_overrides_from(lookup);
        self
    }

    /// Checks that a sweep can start with this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.store.bearer_token.is_none() {
            return Err(Error::Config("OPENMEMORY_BEARER_TOKEN not set".to_string()));
        }
        if self.llm.api_key.is_none() {
            return Err(Error::Config("OPENAI_API_KEY not set".to_string()));
        }
        self.validate_settings()
    }

    /// Checks everything except credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first problem found.
    pub fn validate_settings(&self) -> Result<()> {
        if self.store.base_url.trim().is_empty() {
            return Err(Error::Config("memory store base URL is empty".to_string()));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(Error::Config("LLM base URL is empty".to_string()));
        }
        let threshold = self.retention.delete_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "delete threshold must be within [0, 1], got {threshold}"
            )));
        }
        if self.retention.page_size == 0 {
            return Err(Error::Config("page size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Splits a comma-separated model list, dropping blanks.
#[must_use]
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl fmt::Display for SweepConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = |s: &Option<SecretString>| {
            if s.is_some() { "[REDACTED]" } else { "(not set)" }
        };

        writeln!(f, "[store]")?;
        writeln!(f, "base_url = {}", self.store.base_url)?;
        writeln!(f, "bearer_token = {}", secret(&self.store.bearer_token))?;
        writeln!(f, "timeout_ms = {}", self.store.timeout_ms)?;
        writeln!(f)?;
        writeln!(f, "[llm]")?;
        writeln!(f, "base_url = {}", self.llm.base_url)?;
        writeln!(f, "api_key = {}", secret(&self.llm.api_key))?;
        writeln!(f, "models = {}", self.llm.models.join(", "))?;
        writeln!(f, "referer = {}", self.llm.referer)?;
        writeln!(f, "title = {}", self.llm.title)?;
        writeln!(f, "timeout_ms = {}", self.llm.http.timeout_ms)?;
        writeln!(f, "connect_timeout_ms = {}", self.llm.http.connect_timeout_ms)?;
        writeln!(f)?;
        writeln!(f, "[retention]")?;
        writeln!(f, "delete_threshold = {}", self.retention.delete_threshold)?;
        writeln!(f, "page_size = {}", self.retention.page_size)?;
        writeln!(
            f,
            "sort = {} {}",
            self.retention.sort_column,
            self.retention.sort_direction.as_str()
        )?;
        match self.retention.max_records {
            Some(max) => writeln!(f, "max_records = {max}"),
            None => writeln!(f, "max_records = (unlimited)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SweepConfig::default();
        assert_eq!(config.store.base_url, "https://api.openmemory.dev/api/v1");
        assert!(config.store.bearer_token.is_none());
        assert_eq!(config.llm.models.len(), 3);
        assert_eq!(config.llm.title, "memsweep");
        assert_eq!(config.llm.referer, "https://thesobercoder.in");
        assert_eq!(config.retention.page_size, 25);
        assert!(config.validate_settings().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
[store]
base_url = "http://localhost:8765/api/v1"
bearer_token = "om-file"

[llm]
models = ["a/one", "b/two"]
timeout_ms = 5000

[retention]
delete_threshold = 0.85
sort_direction = "asc"
max_records = 10

[observability.logging]
format = "json"
"#
        )
        .expect("write config");

        let config = SweepConfig::load_from_file(file.path()).expect("load");
        assert_eq!(config.store.base_url, "http://localhost:8765/api/v1");
        assert_eq!(
            config
                .store
                .bearer_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            Some("om-file".to_string())
        );
        assert_eq!(config.llm.models, vec!["a/one", "b/two"]);
        assert_eq!(config.llm.http.timeout_ms, 5000);
        assert_eq!(config.llm.http.connect_timeout_ms, 3000);
        assert!((config.retention.delete_threshold - 0.85).abs() < f32::EPSILON);
        assert_eq!(config.retention.sort_direction, SortDirection::Asc);
        assert_eq!(config.retention.max_records, Some(10));
        assert_eq!(
            config
                .observability
                .logging
                .and_then(|l| l.format)
                .as_deref(),
            Some("json")
        );
    }

    #[test]
    fn test_load_from_file_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "[retention]\ndelete_threshold = \"high\"\n").expect("write config");

        let err = SweepConfig::load_from_file(file.path()).expect_err("should fail");
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = SweepConfig::load_from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides_win() {
        let config = SweepConfig::from_toml("[llm]\nmodels = [\"from/file\"]\n")
            .expect("parse")
            .with_overrides_from(env(&[
                ("OPENMEMORY_BEARER_TOKEN", "om-env"),
                ("OPENAI_API_KEY", "sk-env"),
                ("OPENAI_BASE_URL", "https://example.test/v1"),
                ("MEMSWEEP_MODELS", " x/one, ,y/two "),
                ("MEMSWEEP_DELETE_THRESHOLD", "0.9"),
                ("MEMSWEEP_LLM_TIMEOUT_MS", "1000"),
            ]));

        assert_eq!(config.llm.models, vec!["x/one", "y/two"]);
        assert_eq!(config.llm.base_url, "https://example.test/v1");
        assert_eq!(config.llm.http.timeout_ms, 1000);
        assert!((config.retention.delete_threshold - 0.9).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let config = SweepConfig::default().with_overrides_from(env(&[
            ("OPENAI_BASE_URL", "  "),
            ("OPENMEMORY_BEARER_TOKEN", ""),
        ]));
        assert_eq!(config.llm.base_url, DEFAULT_LLM_BASE_URL);
        assert!(config.store.bearer_token.is_none());
    }

    #[test]
    fn test_validate_missing_credentials() {
        let config = SweepConfig::default();
        let err = config.validate().expect_err("missing token");
        assert!(err.to_string().contains("OPENMEMORY_BEARER_TOKEN"));

        let config =
            SweepConfig::default().with_overrides_from(env(&[("OPENMEMORY_BEARER_TOKEN", "t")]));
        let err = config.validate().expect_err("missing key");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_validate_threshold_range() {
        let mut config = SweepConfig::default();
        config.retention.delete_threshold = 1.5;
        assert!(matches!(config.validate_settings(), Err(Error::Config(_))));

        config.retention.delete_threshold = f32::NAN;
        assert!(config.validate_settings().is_err());
    }

    #[test]
    fn test_display_redacts_secrets() {
        let config = SweepConfig::default().with_overrides_from(env(&[
            ("OPENMEMORY_BEARER_TOKEN", "om-very-secret"),
            ("OPENAI_API_KEY", "sk-very-secret"),
        ]));
        let rendered = config.to_string();
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(rendered.contains("max_records = (unlimited)"));
    }

    #[test]
    fn test_parse_model_list() {
        assert_eq!(parse_model_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_model_list(" , ").is_empty());
    }
}
