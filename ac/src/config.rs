//! Algebra Coach configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project-local config file name
const LOCAL_CONFIG: &str = ".algebra-coach.yml";

/// Main Algebra Coach configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Hint policy and session lifetime
    pub tutoring: TutoringConfig,

    /// Retry policy for backend calls
    pub retry: RetryConfig,

    /// Document extraction backend
    pub extraction: ExtractionConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the LLM API key environment variable is set.
    /// Call this before starting a tutoring session to fail fast.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .algebra-coach.yml
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/algebra-coach/algebra-coach.yml
        if let Some(user_config) = user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed: a broken config file is reported later by `load`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => std::iter::once(PathBuf::from(LOCAL_CONFIG))
                .chain(user_config_path())
                .collect(),
        };

        candidates
            .into_iter()
            .find(|p| p.exists())
            .and_then(|p| Self::load_from_file(&p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("algebra-coach").join("algebra-coach.yml"))
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP client timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).context(format!("Environment variable {} is not set", self.api_key_env))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 1024,
            timeout_ms: 60_000,
        }
    }
}

/// Hint policy and session lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TutoringConfig {
    /// Maximum number of hints per session
    #[serde(rename = "max-hint-level")]
    pub max_hint_level: u32,

    /// Issue a hint automatically after an incorrect attempt
    #[serde(rename = "auto-hint-on-incorrect")]
    pub auto_hint_on_incorrect: bool,

    /// Require a fresh attempt before an explicitly requested hint
    #[serde(rename = "require-attempt-between-hints")]
    pub require_attempt_between_hints: bool,

    /// Abandon a session after this many idle seconds (0 disables)
    #[serde(rename = "session-timeout-secs")]
    pub session_timeout_secs: u64,

    /// Accept an exact answer match when the backend is unavailable
    #[serde(rename = "exact-match-fallback")]
    pub exact_match_fallback: bool,
}

impl TutoringConfig {
    /// Idle timeout, if enabled
    pub fn session_timeout(&self) -> Option<Duration> {
        (self.session_timeout_secs > 0).then(|| Duration::from_secs(self.session_timeout_secs))
    }
}

impl Default for TutoringConfig {
    fn default() -> Self {
        Self {
            max_hint_level: 3,
            auto_hint_on_incorrect: true,
            require_attempt_between_hints: false,
            session_timeout_secs: 1800,
            exact_match_fallback: true,
        }
    }
}

/// Retry policy for backend calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Backoff before the first retry in milliseconds (doubles per retry)
    #[serde(rename = "initial-backoff-ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on a single backoff in milliseconds
    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,

    /// Bounded wait for a single call in milliseconds
    #[serde(rename = "call-timeout-ms")]
    pub call_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            call_timeout_ms: 60_000,
        }
    }
}

/// Document extraction backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// External converter reading a PDF on stdin and writing text to stdout
    pub command: String,

    /// Arguments passed to the converter
    pub args: Vec<String>,

    /// Converter timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Lines repeated at least this many times are treated as headers/footers (0 disables)
    #[serde(rename = "repeated-line-min-occurrences")]
    pub repeated_line_min_occurrences: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            command: "pdftotext".to_string(),
            args: vec!["-layout".to_string(), "-".to_string(), "-".to_string()],
            timeout_ms: 30_000,
            repeated_line_min_occurrences: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.tutoring.max_hint_level, 3);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.extraction.command, "pdftotext");
    }

    #[test]
    fn test_session_timeout_disabled() {
        let tutoring = TutoringConfig {
            session_timeout_secs: 0,
            ..Default::default()
        };
        assert!(tutoring.session_timeout().is_none());
        assert_eq!(
            TutoringConfig::default().session_timeout(),
            Some(Duration::from_secs(1800))
        );
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
log-level: debug
tutoring:
  max-hint-level: 2
  require-attempt-between-hints: true
retry:
  max-attempts: 5
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.tutoring.max_hint_level, 2);
        assert!(config.tutoring.require_attempt_between_hints);
        // Unset keys keep their defaults
        assert!(config.tutoring.auto_hint_on_incorrect);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 500);
        assert_eq!(config.llm.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "llm:\n  provider: openai\n  model: gpt-4o").unwrap();

        let path = file.path().to_path_buf();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/algebra-coach.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_log_level() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log-level: TRACE").unwrap();

        let path = file.path().to_path_buf();
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("TRACE"));
    }
}
