//! Configuration management for the call bridge
//!
//! Settings come from the process environment, a `.env` file, and an optional
//! TOML file in ~/.config/call-bridge/config.toml, in that order of precedence.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

const CONFIG_DIR: &str = "call-bridge";
const CONFIG_FILE: &str = "config.toml";

pub const API_KEY_VAR: &str = "OMNIDIM_API_KEY";
pub const AGENT_ID_VAR: &str = "OMNIDIM_AGENT_ID";
pub const NUMBER_ID_VAR: &str = "OMNIDIM_NUMBER_ID";
pub const BASE_URL_VAR: &str = "OMNIDIM_BASE_URL";
pub const CONFIG_PATH_VAR: &str = "CALL_BRIDGE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing OMNIDIM_API_KEY")]
    MissingApiKey,

    #[error("Missing {0}")]
    MissingVar(&'static str),

    #[error("{name} must be an integer, got {value:?}")]
    NotAnInteger { name: &'static str, value: String },

    #[error("Failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Values read from the optional config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub agent_id: Option<i64>,
    pub number_id: Option<i64>,
    pub base_url: Option<String>,
}

impl FileConfig {
    /// Get the config file path, honoring `CALL_BRIDGE_CONFIG`.
    /// `None` when the platform has no config directory.
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_VAR) {
            return Some(PathBuf::from(path));
        }

        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load the config file, or an empty config if it does not exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path())
    }

    fn load_from(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("No config directory; skipping config file");
            return Ok(Self::default());
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }
}

/// Resolved bridge configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    agent_id: Option<String>,
    number_id: Option<String>,
}

pub fn default_base_url() -> String {
    "https://backend.omnidim.io/api/v1".to_string()
}

impl Config {
    /// Load `.env`, then resolve every setting from the environment with the
    /// config file as fallback.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env is the normal case
        let _ = dotenvy::dotenv();

        let file = FileConfig::load()?;
        Self::resolve(file, |name| env::var(name).ok())
    }

    /// Merge a file config with a variable lookup; lookup wins.
    pub fn resolve<F>(file: FileConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |name: &str, fallback: Option<String>| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .or(fallback.filter(|v| !v.trim().is_empty()))
        };

        let api_key = pick(API_KEY_VAR, file.api_key).ok_or(ConfigError::MissingApiKey)?;
        let base_url = pick(BASE_URL_VAR, file.base_url).unwrap_or_else(default_base_url);

        Ok(Self {
            api_key,
            base_url,
            agent_id: pick(AGENT_ID_VAR, file.agent_id.map(|id| id.to_string())),
            number_id: pick(NUMBER_ID_VAR, file.number_id.map(|id| id.to_string())),
        })
    }

    /// Agent id used for dispatching
    pub fn agent_id(&self) -> Result<i64, ConfigError> {
        parse_id(AGENT_ID_VAR, self.agent_id.as_deref())
    }

    /// Caller number id used for dispatching
    pub fn number_id(&self) -> Result<i64, ConfigError> {
        parse_id(NUMBER_ID_VAR, self.number_id.as_deref())
    }
}

fn parse_id(name: &'static str, raw: Option<&str>) -> Result<i64, ConfigError> {
    let raw = raw.ok_or(ConfigError::MissingVar(name))?;
    raw.trim().parse().map_err(|_| ConfigError::NotAnInteger {
        name,
        value: raw.to_string(),
    })
}
