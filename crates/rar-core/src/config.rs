//! Configuration
//!
//! Two layers:
//! - `PipelineConfig`: the run parameters handed to a `BatchOrchestrator`
//! - `RarConfig`: the on-disk file (JSON or TOML) the CLI loads, which also
//!   carries the classifier API settings and the output location

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `api.key`
pub const API_KEY_ENV: &str = "RAR_API_KEY";

/// Default number of simultaneous classifier calls
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default batch deadline in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Largest concurrency the limiter can be built with
pub const MAX_CONCURRENCY: usize = tokio::sync::Semaphore::MAX_PERMITS;

/// Run parameters for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum simultaneous classifier calls across the batch
    pub concurrency: usize,
    /// Deadline for the whole batch
    pub timeout: Duration,
    /// Process only the first `limit` records; 0 means all
    pub limit: usize,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With concurrency bound
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// With batch deadline
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// With record limit (0 = unlimited)
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Check the parameters
    ///
    /// # Errors
    /// `ConfigError::Invalid` for a concurrency outside `1..=MAX_CONCURRENCY`
    /// or a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("concurrency", "must be at least 1"));
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::invalid(
                "concurrency",
                format!("must not exceed {MAX_CONCURRENCY}"),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            limit: 0,
        }
    }
}

/// Classifier endpoint settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Bearer token
    #[serde(default)]
    pub key: String,
    /// OpenAI-compatible base URL, e.g. `https://api.deepseek.com/v1`
    pub base_url: String,
    /// Model identifier sent with each request
    pub model_name: String,
    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl ApiConfig {
    /// Per-request HTTP timeout as a duration
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.key.is_empty() { "" } else { "***" };
        f.debug_struct("ApiConfig")
            .field("key", &key)
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// `concurrency` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencySection {
    /// Maximum simultaneous classifier calls
    pub max_concurrent_requests: usize,
}

impl Default for ConcurrencySection {
    fn default() -> Self {
        Self {
            max_concurrent_requests: DEFAULT_CONCURRENCY,
        }
    }
}

/// `output` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSection {
    /// Directory receiving the report files
    pub path: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output"),
        }
    }
}

/// `pipeline` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSection {
    /// Batch deadline in seconds
    pub timeout_secs: u64,
    /// Record limit, 0 = all
    pub limit: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            limit: 0,
        }
    }
}

/// Config file contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RarConfig {
    /// Free-form note about the file
    #[serde(default)]
    pub annotation: String,
    /// Classifier endpoint
    pub api: ApiConfig,
    #[serde(default)]
    pub concurrency: ConcurrencySection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

impl RarConfig {
    /// Parse JSON text
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed input.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<json>"),
            message: e.to_string(),
        })
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed input.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<toml>"),
            message: e.to_string(),
        })
    }

    /// Read a config file, picking the format by extension
    ///
    /// # Errors
    /// Unreadable file, unknown extension or malformed contents.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let parsed = match ext.as_str() {
            "json" => Self::from_json(&text),
            "toml" => Self::from_toml(&text),
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        parsed.map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Read a config file and apply `RAR_API_KEY`, without validating
    ///
    /// For callers that layer further overrides before `validate`.
    ///
    /// # Errors
    /// See `from_file`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_api_key(std::env::var(API_KEY_ENV).ok());
        tracing::debug!(api = ?config.api, "configuration read");
        Ok(config)
    }

    /// Read a config file, apply `RAR_API_KEY` and validate
    ///
    /// # Errors
    /// See `from_file` and `validate`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the API key when an override is present and non-blank
    pub fn apply_api_key(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.api.key = key;
        }
    }

    /// Check the values
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("api.baseUrl", "must not be blank"));
        }
        if self.api.model_name.trim().is_empty() {
            return Err(ConfigError::invalid("api.modelName", "must not be blank"));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "api.requestTimeoutSecs",
                "must be greater than zero",
            ));
        }
        if self.concurrency.max_concurrent_requests == 0 {
            return Err(ConfigError::invalid(
                "concurrency.maxConcurrentRequests",
                "must be at least 1",
            ));
        }
        if self.concurrency.max_concurrent_requests > MAX_CONCURRENCY {
            return Err(ConfigError::invalid(
                "concurrency.maxConcurrentRequests",
                format!("must not exceed {MAX_CONCURRENCY}"),
            ));
        }
        if self.pipeline.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "pipeline.timeoutSecs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Run parameters derived from the file
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_concurrency(self.concurrency.max_concurrent_requests)
            .with_timeout(Duration::from_secs(self.pipeline.timeout_secs))
            .with_limit(self.pipeline.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const JSON: &str = r#"{
        "annotation": "DeepSeek 配置",
        "api": {
            "key": "sk-file",
            "baseUrl": "https://api.deepseek.com/v1",
            "modelName": "deepseek-chat"
        },
        "concurrency": { "maxConcurrentRequests": 3 },
        "output": { "path": "reports" }
    }"#;

    #[test]
    fn pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.timeout, Duration::from_secs(600));
        assert_eq!(config.limit, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn pipeline_rejects_zero_values() {
        let err = PipelineConfig::new().with_concurrency(0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "concurrency", .. }));

        let err = PipelineConfig::new()
            .with_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "timeout", .. }));
    }

    #[test]
    fn pipeline_rejects_concurrency_above_limiter_maximum() {
        assert!(PipelineConfig::new()
            .with_concurrency(MAX_CONCURRENCY)
            .validate()
            .is_ok());

        for concurrency in [MAX_CONCURRENCY + 1, usize::MAX] {
            let err = PipelineConfig::new()
                .with_concurrency(concurrency)
                .validate()
                .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { field: "concurrency", .. }));
        }
    }

    #[test]
    fn json_file_parses_with_section_defaults() {
        let config = RarConfig::from_json(JSON).unwrap();
        assert_eq!(config.api.model_name, "deepseek-chat");
        assert_eq!(config.api.request_timeout_secs, 120);
        assert_eq!(config.output.path, PathBuf::from("reports"));
        assert_eq!(config.pipeline, PipelineSection::default());

        let run = config.pipeline_config();
        assert_eq!(run.concurrency, 3);
        assert_eq!(run.timeout, Duration::from_secs(600));
    }

    #[test]
    fn toml_file_is_read_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[api]
baseUrl = "http://localhost:8000/v1"
modelName = "qwen"

[pipeline]
timeoutSecs = 30
limit = 4
"#
        )
        .unwrap();

        let config = RarConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api.key, "");
        assert_eq!(config.pipeline.limit, 4);
        assert_eq!(config.pipeline_config().timeout, Duration::from_secs(30));
        assert_eq!(config.concurrency.max_concurrent_requests, 5);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = RarConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "yaml"));
    }

    #[test]
    fn parse_error_names_the_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{ not json").unwrap();
        match RarConfig::from_file(file.path()).unwrap_err() {
            ConfigError::Parse { path, .. } => assert_eq!(path, file.path()),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn read_defers_validation_to_the_caller() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"api":{{"baseUrl":"http://localhost/v1","modelName":"m"}},
                "concurrency":{{"maxConcurrentRequests":0}}}}"#
        )
        .unwrap();

        assert!(RarConfig::load(file.path()).is_err());

        let mut config = RarConfig::read(file.path()).unwrap();
        assert_eq!(config.concurrency.max_concurrent_requests, 0);
        config.concurrency.max_concurrent_requests = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn api_key_override() {
        let mut config = RarConfig::from_json(JSON).unwrap();
        config.apply_api_key(Some("   ".to_string()));
        assert_eq!(config.api.key, "sk-file");
        config.apply_api_key(None);
        assert_eq!(config.api.key, "sk-file");
        config.apply_api_key(Some("sk-env".to_string()));
        assert_eq!(config.api.key, "sk-env");
    }

    #[test]
    fn debug_output_hides_the_key() {
        let config = RarConfig::from_json(JSON).unwrap();
        let text = format!("{config:?}");
        assert!(!text.contains("sk-file"));
        assert!(text.contains("deepseek-chat"));
    }

    #[test]
    fn validate_names_the_bad_field() {
        let mut config = RarConfig::from_json(JSON).unwrap();
        config.concurrency.max_concurrent_requests = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "concurrency.maxConcurrentRequests",
                ..
            })
        ));

        let mut config = RarConfig::from_json(JSON).unwrap();
        config.concurrency.max_concurrent_requests = usize::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "concurrency.maxConcurrentRequests",
                ..
            })
        ));

        let mut config = RarConfig::from_json(JSON).unwrap();
        config.api.model_name = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "api.modelName",
                ..
            })
        ));
    }
}
