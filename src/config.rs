//! Run configuration.
//!
//! Loaded from an optional JSON file with serde defaults for everything,
//! so a bare `copymill -i in.csv -o out.csv` runs with the built-in
//! two-stage pipeline. The API key field supports `${VAR}` substitution
//! resolved against the environment at startup.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::qc::QcConfig;

const DEFAULT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_API_KEY: &str = "${OPENROUTER_API_KEY}";

/// Role a stage plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Builds a structural skeleton from the row's title and metadata.
    Outline,
    /// Expands the previous stage's output into (longer) prose.
    Rewrite,
}

/// One generation stage: model, endpoint, and its own rate-limit bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    pub kind: StageKind,
    pub model: String,
    #[serde(default = "default_url")]
    pub url: String,
    /// Calls admitted per `interval_secs` window.
    #[serde(default = "default_max_calls")]
    pub max_calls: u32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_max_calls() -> u32 {
    10
}

fn default_interval_secs() -> u64 {
    60
}

/// Explicit opt-in retry policy applied per stage call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first; values below 1 behave as 1.
    pub max_attempts: u32,
    /// Base backoff in seconds, doubled after each failed attempt.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

fn default_backoff_secs() -> u64 {
    1
}

/// Full run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Ordered stage list. The first stage's output is recorded as the
    /// outline, the last stage's output as the rewritten content.
    #[serde(default = "default_stages")]
    pub stages: Vec<StageConfig>,
    /// Hard ceiling on rows processed simultaneously.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub qc: QcConfig,
    /// Bearer credential shared by all stages; `${VAR}` resolves from the
    /// environment.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Off unless configured.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional per-stage-call deadline in seconds.
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,
}

fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig {
            name: "outline".to_string(),
            kind: StageKind::Outline,
            model: "meta-llama/llama-3.1-8b-instruct:free".to_string(),
            url: default_url(),
            max_calls: 10,
            interval_secs: 60,
        },
        StageConfig {
            name: "rewrite".to_string(),
            kind: StageKind::Rewrite,
            model: "openai/gpt-4o".to_string(),
            url: default_url(),
            max_calls: 5,
            interval_secs: 60,
        },
    ]
}

fn default_concurrency() -> usize {
    5
}

fn default_api_key() -> String {
    DEFAULT_API_KEY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stages: default_stages(),
            concurrency: default_concurrency(),
            qc: QcConfig::default(),
            api_key: default_api_key(),
            retry: None,
            stage_timeout_secs: None,
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or the built-in defaults when no
    /// file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let display = path.display().to_string();
                let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: display.clone(),
                    source,
                })?;
                serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: display,
                    source,
                })?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one generation stage is required".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolves the credential, substituting `${VAR}` from the environment.
    pub fn resolve_credential(&self) -> Result<String, ConfigError> {
        if let Some(var) = self
            .api_key
            .strip_prefix("${")
            .and_then(|s| s.strip_suffix('}'))
        {
            return std::env::var(var).map_err(|_| ConfigError::MissingCredential(var.to_string()));
        }
        if self.api_key.is_empty() {
            return Err(ConfigError::Invalid("api_key is empty".to_string()));
        }
        Ok(self.api_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_two_stage() {
        let config = Config::default();
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.stages[0].kind, StageKind::Outline);
        assert_eq!(config.stages[1].kind, StageKind::Rewrite);
        assert_eq!(config.concurrency, 5);
    }

    #[test]
    fn test_load_three_stage_file() {
        let raw = r#"{
            "stages": [
                {"name": "scaffold", "kind": "outline", "model": "m1"},
                {"name": "framework", "kind": "rewrite", "model": "m2"},
                {"name": "hydrate", "kind": "rewrite", "model": "m3", "max_calls": 5}
            ],
            "concurrency": 4
        }"#;
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(raw.as_bytes()).expect("write config");

        let config = Config::load(Some(file.path())).expect("load config");
        assert_eq!(config.stages.len(), 3);
        assert_eq!(config.stages[2].max_calls, 5);
        assert_eq!(config.stages[0].max_calls, 10);
        assert_eq!(config.stages[0].url, DEFAULT_URL);
        assert_eq!(config.qc.min_word_count, 800);
    }

    #[test]
    fn test_empty_stage_list_rejected() {
        let raw = r#"{"stages": []}"#;
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(raw.as_bytes()).expect("write config");

        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_credential_env_substitution() {
        std::env::set_var("COPYMILL_TEST_KEY", "sk-test");
        let config = Config {
            api_key: "${COPYMILL_TEST_KEY}".to_string(),
            ..Default::default()
        };
        assert_eq!(config.resolve_credential().expect("resolve"), "sk-test");
    }

    #[test]
    fn test_credential_missing_env_var() {
        let config = Config {
            api_key: "${COPYMILL_TEST_KEY_UNSET}".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve_credential(),
            Err(ConfigError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_credential_literal_passthrough() {
        let config = Config {
            api_key: "sk-literal".to_string(),
            ..Default::default()
        };
        assert_eq!(config.resolve_credential().expect("resolve"), "sk-literal");
    }
}
