//! Runtime configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `vendorconnect.toml`, then `VC_*` environment variables (nested keys use
//! `__`, e.g. `VC_ORACLE__API_KEY`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl OracleConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `None` uses the database under the asset directory.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub assistant_timeout_secs: u64,
    /// Background deadline/repeat sweep. Disabled when unset.
    pub sweep_interval_secs: Option<u64>,
    pub uploads_dir: Option<PathBuf>,
    pub oracle: OracleConfig,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("vendorconnect.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 3000_i64)?
            .set_default("assistant_timeout_secs", 60_i64)?
            .set_default("oracle.endpoint", "https://api.openai.com/v1/chat/completions")?
            .set_default("oracle.model", "gpt-4o-mini")?
            .set_default("oracle.temperature", 0.1_f64)?
            .set_default("oracle.max_tokens", 800_i64)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let config: Config = builder
            .add_source(
                config::Environment::with_prefix("VC")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.assistant_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "assistant_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.uploads_dir.clone().unwrap_or_else(utils::assets::uploads_dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            host: "127.0.0.1".to_string(),
            port: 3000,
            assistant_timeout_secs: 60,
            sweep_interval_secs: None,
            uploads_dir: None,
            oracle: OracleConfig {
                endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                temperature: 0.1,
                max_tokens: 800,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_file() {
        let config = Config::load_from(Path::new("/nonexistent/vendorconnect.toml")).unwrap();
        assert_eq!(config.assistant_timeout_secs, 60);
        assert!(config.sweep_interval_secs.is_none());
        assert!(!Config::default().oracle.is_configured());
    }
}
