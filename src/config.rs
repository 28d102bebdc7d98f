/*!
 * Configuration types for Steadfast
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use steadfast_core_resilience::RetryPolicy;

use crate::error::ConfigError;

/// Top-level configuration, loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteadfastConfig {
    /// Name of this wrapper, used to detect a remote pointing at itself
    #[serde(default = "default_name")]
    pub name: String,

    /// Root of the store the CLI reads objects from
    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub reader: ReaderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SteadfastConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            remote: default_remote(),
            retry: RetryConfig::default(),
            reader: ReaderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Reopen pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Consecutive failures tolerated per read (0 = unlimited)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Randomize delays to avoid synchronized reconnects
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// Wall-clock retry budget per read in milliseconds (0 = unlimited)
    #[serde(default)]
    pub max_elapsed_ms: u64,

    /// Give up immediately on errors that retrying cannot fix
    #[serde(default = "default_true")]
    pub fail_fast_on_permanent: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
            max_elapsed_ms: 0,
            fail_fast_on_permanent: true,
        }
    }
}

impl RetryConfig {
    /// Convert into the policy readers use
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: if self.jitter { DEFAULT_JITTER_FACTOR } else { 0.0 },
            max_elapsed: (self.max_elapsed_ms > 0).then(|| Duration::from_millis(self.max_elapsed_ms)),
            fail_fast_on_permanent: self.fail_fast_on_permanent,
        }
    }
}

const DEFAULT_JITTER_FACTOR: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Copy buffer size used by the CLI
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    /// JSON log file path (None = compact output on stderr)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_name() -> String {
    "hard".to_string()
}

fn default_remote() -> String {
    ".".to_string()
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_buffer_size() -> usize {
    64 * 1024 // 64 KB
}

impl SteadfastConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SteadfastConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        if self.remote.starts_with(&format!("{}:", self.name)) {
            return Err(ConfigError::SelfReference {
                name: self.name.clone(),
                remote: self.remote.clone(),
            });
        }
        if self.reader.buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "reader.buffer_size must be greater than 0".to_string(),
            ));
        }
        self.retry.to_policy().validate()?;
        Ok(())
    }

    /// Policy handed to every reader
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.to_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_values() {
        let config = SteadfastConfig::default();
        assert_eq!(config.name, "hard");
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.reader.buffer_size, 65536);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
            remote = "/data/objects"
            name = "hard"

            [retry]
            max_attempts = 4
            initial_backoff_ms = 50
            max_backoff_ms = 1000
            backoff_multiplier = 3.0
            jitter = false
            max_elapsed_ms = 5000

            [reader]
            buffer_size = 1024

            [logging]
            level = "debug"
            file = "/tmp/steadfast.log"
        "#;

        let config = SteadfastConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.remote, "/data/objects");
        assert_eq!(config.reader.buffer_size, 1024);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/steadfast.log")));

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, Some(4));
        assert_eq!(policy.initial_backoff, Duration::from_millis(50));
        assert_eq!(policy.max_backoff, Duration::from_secs(1));
        assert_eq!(policy.backoff_multiplier, 3.0);
        assert_eq!(policy.jitter_factor, 0.0);
        assert_eq!(policy.max_elapsed, Some(Duration::from_secs(5)));
        assert!(policy.fail_fast_on_permanent);
    }

    #[test]
    fn test_zero_means_unlimited() {
        let config = SteadfastConfig::from_toml_str("[retry]\nmax_attempts = 0\n").unwrap();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.max_elapsed, None);
        assert!(policy.is_unbounded());
    }

    #[test]
    fn test_self_reference_rejected() {
        let err = SteadfastConfig::from_toml_str("name = \"hard\"\nremote = \"hard:bucket\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::SelfReference { .. }));

        // Another remote whose name merely starts the same way is fine
        assert!(SteadfastConfig::from_toml_str("remote = \"hardware:bucket\"\n").is_ok());
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let err = SteadfastConfig::from_toml_str("[retry]\nbackoff_multiplier = 0.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Policy(_)));

        let err = SteadfastConfig::from_toml_str(
            "[retry]\ninitial_backoff_ms = 5000\nmax_backoff_ms = 10\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Policy(_)));
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let err = SteadfastConfig::from_toml_str("[reader]\nbuffer_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "remote = \"/srv\"\n[logging]\nlevel = \"warn\"").unwrap();

        let config = SteadfastConfig::from_file(file.path()).unwrap();
        assert_eq!(config.remote, "/srv");
        assert_eq!(config.logging.level, LogLevel::Warn);
        // No file configured: logs go to stderr
        assert_eq!(config.logging.file, None);

        let err = SteadfastConfig::from_file(Path::new("/nonexistent/steadfast.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = SteadfastConfig::default();
        let toml = toml::to_string(&config).unwrap();
        let deserialized: SteadfastConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
