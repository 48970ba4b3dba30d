use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use sauti_core::EngineConfig;

use crate::error::{CliError, Result};

/// User-level settings persisted under the platform config dir.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub language: Option<String>,
    /// Full engine override; anything set here wins over the shorthands.
    #[serde(default)]
    pub engine: Option<EngineConfig>,
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("sauti").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

impl CliConfig {
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = path.cloned().unwrap_or_else(default_config_path);
        if !config_path.exists() {
            if path.is_some() {
                return Err(CliError::ConfigError(format!(
                    "config file not found: {}",
                    config_path.display()
                )));
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Resolve the engine configuration for one invocation. Precedence:
    /// command-line override, then config file, then environment, then the
    /// engine defaults.
    pub fn engine_config(
        &self,
        voice_override: Option<&str>,
        model_override: Option<&str>,
    ) -> EngineConfig {
        let mut config = self.engine.clone().unwrap_or_default();

        if config.cache_dir.is_none() {
            config.cache_dir = self.cache_dir.clone();
        }
        if config.language_hint.is_none() {
            config.language_hint = self.language.clone();
        }

        let api_key = self
            .api_key
            .clone()
            .or_else(|| std::env::var("SAUTI_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        if config.synthesis.api_key.is_none() {
            config.synthesis.api_key = api_key.clone();
        }
        if config.transcription.api_key.is_none() {
            config.transcription.api_key = api_key;
        }

        if let Some(voice) = voice_override.or(self.voice.as_deref()) {
            config.synthesis.voice = voice.to_string();
        }
        if let Some(model) = model_override.or(self.model.as_deref()) {
            config.synthesis.model = model.to_string();
        }

        config
    }
}
