//! Runtime configuration.
//!
//! Loaded from an optional YAML file. Every field has a default, so an empty
//! document (or no file at all) yields a working demo configuration in which
//! each integration falls back to its static tier. Credentials left out of
//! the file are read from the environment when the providers are built.
//!
//! ```yaml
//! server:
//!   bind: "0.0.0.0:3000"
//! timeouts:
//!   remote: 5s
//! cache:
//!   ttl: 30m
//!   max_entries: 128
//! archive:
//!   max_records: 256
//! images:
//!   max_bytes: 8388608
//! circuit_breaker:
//!   failure_threshold: 3
//!   recovery_timeout: 30s
//!   success_threshold: 2
//! strict_mode: false
//! providers:
//!   content_store:
//!     project_id: abc123
//!     dataset: production
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::archive::DEFAULT_ARCHIVE_CAPACITY;
use crate::providers::DEFAULT_MAX_IMAGE_BYTES;
use crate::resilience::CircuitBreakerConfig;

/// Errors loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Durations written in humantime format (`"8s"`, `"1h 30m"`).
pub(crate) mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub server: ServerConfig,
    pub timeouts: TimeoutConfig,
    pub cache: CacheConfig,
    pub archive: ArchiveConfig,
    pub images: ImageConfig,
    pub circuit_breaker: CircuitBreakerConfig,

    /// Surface fallback-sourced results as errors instead of serving them
    pub strict_mode: bool,

    pub providers: ProvidersConfig,
    pub voice: VoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bound on each remote tier
    #[serde(with = "duration_human")]
    pub remote: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            remote: Duration::from_secs(8),
        }
    }
}

/// Research-insight cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(with = "duration_human")]
    pub ttl: Duration,
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_entries: 256,
        }
    }
}

/// Local scan archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub max_records: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_ARCHIVE_CAPACITY,
        }
    }
}

/// Remote image downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub max_bytes: usize,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Credentials and endpoints for each external collaborator.
///
/// `None` credentials fall back to the matching environment variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub vision: ApiKeyConfig,
    pub search: ApiKeyConfig,
    pub content_store: ContentStoreConfig,
    pub document_generator: DocumentGeneratorConfig,
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeyConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentStoreConfig {
    pub project_id: Option<String>,
    pub dataset: Option<String>,
    pub token: Option<String>,
    pub api_version: String,
    pub base_url: Option<String>,
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            dataset: None,
            token: None,
            api_version: "2024-01-01".to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentGeneratorConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub base_url: Option<String>,
}

/// Voice agent channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub agent_url: String,
    pub model: String,
    #[serde(with = "duration_human")]
    pub connect_timeout: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            agent_url: "wss://agent.deepgram.com/v1/agent".to_string(),
            model: lumiere_core::voice::DEFAULT_VOICE_MODEL.to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = if yaml.trim().is_empty() {
            RuntimeConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeouts.remote.is_zero() {
            return Err(ConfigError::Invalid("timeouts.remote must be non-zero".to_string()));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.images.max_bytes == 0 {
            return Err(ConfigError::Invalid("images.max_bytes must be non-zero".to_string()));
        }
        if self.archive.max_records == 0 {
            return Err(ConfigError::Invalid("archive.max_records must be at least 1".to_string()));
        }
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "server.bind is not a socket address: {}",
                self.server.bind
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_yaml("").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert_eq!(config.timeouts.remote, Duration::from_secs(8));
        assert_eq!(config.cache.ttl, Duration::from_secs(3600));
        assert_eq!(config.cache.max_entries, 256);
        assert_eq!(config.archive.max_records, 256);
        assert_eq!(config.images.max_bytes, 8 * 1024 * 1024);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.recovery_timeout, Duration::from_secs(30));
        assert!(!config.strict_mode);
        assert_eq!(config.voice.model, "aura-asteria-en");
    }

    #[test]
    fn test_humantime_durations() {
        let config = RuntimeConfig::from_yaml(
            r#"
timeouts:
  remote: 2s 500ms
cache:
  ttl: 30m
circuit_breaker:
  recovery_timeout: 1m
strict_mode: true
"#,
        )
        .unwrap();

        assert_eq!(config.timeouts.remote, Duration::from_millis(2500));
        assert_eq!(config.cache.ttl, Duration::from_secs(1800));
        assert_eq!(config.circuit_breaker.recovery_timeout, Duration::from_secs(60));
        assert_eq!(config.circuit_breaker.success_threshold, 2);
        assert!(config.strict_mode);
    }

    #[test]
    fn test_provider_sections() {
        let config = RuntimeConfig::from_yaml(
            r#"
providers:
  content_store:
    project_id: abc123
    dataset: staging
  speech:
    project_id: proj-1
"#,
        )
        .unwrap();

        assert_eq!(config.providers.content_store.project_id.as_deref(), Some("abc123"));
        assert_eq!(config.providers.content_store.api_version, "2024-01-01");
        assert_eq!(config.providers.speech.project_id.as_deref(), Some("proj-1"));
        assert!(config.providers.vision.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            RuntimeConfig::from_yaml("timeouts:\n  remote: 0s\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("server:\n  bind: localhost\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("archive:\n  max_records: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("timeouts:\n  remote: soon\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = RuntimeConfig::from_yaml_file("/nonexistent/lumiere.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/lumiere.yaml"));
    }
}
