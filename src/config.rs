//! Environment and config-file settings.
//!
//! The config file is JSON keyed by provider selector:
//!
//! ```json
//! {
//!   "OpenAI": { "api_key": "sk-...", "base_url": "https://api.openai.com/v1", "timeout_sec": 60 },
//!   "GoogleGenerativeAI": { "api_key": "AIza..." }
//! }
//! ```

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chat_model::ModelRegistry;
use chat_model_gemini::{register_gemini, GeminiChatModelConfig};
use chat_model_openai::{register_openai, OpenAiChatModelConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::transcript::Llm;

pub const CONFIG_PATH_ENV: &str = "RAMBLE_CONFIG_PATH";
pub const LOG_FILTER_ENV: &str = "RAMBLE_LOG";
pub const LOG_FILE_ENV: &str = "RAMBLE_LOG_FILE";

const CONFIG_DIR_NAME: &str = "ramble";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub config_path: Option<String>,
    pub xdg_config_home: Option<String>,
    pub home: Option<String>,
    pub log_filter: Option<String>,
    pub log_file: Option<String>,
    pub no_color: bool,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            config_path: env_string_opt(CONFIG_PATH_ENV),
            xdg_config_home: env_string_opt("XDG_CONFIG_HOME"),
            home: env_string_opt("HOME"),
            log_filter: env_string_opt(LOG_FILTER_ENV),
            log_file: env_string_opt(LOG_FILE_ENV),
            no_color: env_flag("NO_COLOR"),
        }
    }

    /// Config file location: the explicit override, else
    /// `$XDG_CONFIG_HOME/ramble/config.json`, else `$HOME/.config/ramble/config.json`.
    pub fn config_file_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.config_path {
            return Ok(PathBuf::from(path));
        }

        let config_dir = self
            .xdg_config_home
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| self.home.as_ref().map(|home| Path::new(home).join(".config")))
            .ok_or(ConfigError::NoConfigDir)?;

        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for '{field}' in {path}: {reason}")]
    InvalidField {
        path: PathBuf,
        field: String,
        reason: &'static str,
    },

    #[error("cannot locate a config directory; set {CONFIG_PATH_ENV}, XDG_CONFIG_HOME or HOME")]
    NoConfigDir,
}

impl ConfigError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// Credentials and transport settings for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<u64>,
}

impl ProviderConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn to_openai(&self) -> OpenAiChatModelConfig {
        let mut config = OpenAiChatModelConfig::new(self.api_key.trim());
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        if let Some(timeout_sec) = self.timeout_sec {
            config = config.with_timeout(Duration::from_secs(timeout_sec));
        }
        config
    }

    pub fn to_gemini(&self) -> GeminiChatModelConfig {
        let mut config = GeminiChatModelConfig::new(self.api_key.trim());
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        if let Some(timeout_sec) = self.timeout_sec {
            config = config.with_timeout(Duration::from_secs(timeout_sec));
        }
        config
    }

    fn validate(&self, path: &Path, selector: Llm) -> Result<(), ConfigError> {
        let invalid = |field: &str, reason| ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: format!("{selector}.{field}"),
            reason,
        };

        if self.timeout_sec == Some(0) {
            return Err(invalid("timeout_sec", "must be greater than zero"));
        }
        if self
            .base_url
            .as_deref()
            .is_some_and(|base_url| base_url.trim().is_empty())
        {
            return Err(invalid("base_url", "must not be blank when present"));
        }

        Ok(())
    }
}

/// Parsed config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(rename = "OpenAI", default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<ProviderConfig>,
    #[serde(
        rename = "GoogleGenerativeAI",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub google_generative_ai: Option<ProviderConfig>,
}

impl Config {
    /// Contents written when no config file exists yet.
    #[must_use]
    pub fn bootstrap() -> Self {
        Self {
            openai: Some(ProviderConfig::default()),
            google_generative_ai: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|error| ConfigError::io("reading config file", path, error))?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|error| ConfigError::json(path, error))?;
        config.validate(path)?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Loads `path`, first writing [`Config::bootstrap`] there if it is missing.
    pub fn load_or_bootstrap(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            Self::write_bootstrap(path)?;
        }
        Self::load(path)
    }

    fn write_bootstrap(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|error| ConfigError::io("creating config directory", parent, error))?;
        }

        let mut raw = serde_json::to_string_pretty(&Self::bootstrap())
            .map_err(|error| ConfigError::json(path, error))?;
        raw.push('\n');
        fs::write(path, raw).map_err(|error| ConfigError::io("writing config file", path, error))?;

        info!(path = %path.display(), "created default config");
        Ok(())
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        for selector in Llm::ALL {
            if let Some(provider) = self.entry(selector) {
                provider.validate(path, selector)?;
            }
        }
        Ok(())
    }

    fn entry(&self, selector: Llm) -> Option<&ProviderConfig> {
        match selector {
            Llm::OpenAI => self.openai.as_ref(),
            Llm::GoogleGenerativeAI => self.google_generative_ai.as_ref(),
        }
    }

    /// Settings for `selector`, or `None` when absent or without an API key.
    pub fn provider(&self, selector: Llm) -> Option<&ProviderConfig> {
        self.entry(selector).filter(|provider| provider.has_api_key())
    }

    /// Model registry holding every provider that has an API key.
    pub fn model_registry(&self) -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        if let Some(openai) = self.provider(Llm::OpenAI) {
            register_openai(&mut registry, openai.to_openai());
        }
        if let Some(gemini) = self.provider(Llm::GoogleGenerativeAI) {
            register_gemini(&mut registry, gemini.to_gemini());
        }

        debug!(
            selectors = ?registry.selectors().collect::<Vec<_>>(),
            "model registry ready"
        );
        registry
    }
}
