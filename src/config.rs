use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::error::ChatError;
use crate::model::ModelChoice;

pub const TOKEN_ENV_VAR: &str = "REPLICATE_API_TOKEN";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub replicate_api_token: Option<String>,
    pub default_model: Option<String>,
    pub api_base_url: Option<String>,
}

/// A Replicate API token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// Where the token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Env,
    Config,
    /// Typed into the token popup and held in memory only.
    Session,
}

impl TokenSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSource::Env => "env var",
            TokenSource::Config => "configured",
            TokenSource::Session => "this session",
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_api_token(token: &ApiToken) -> Result<()> {
        Self::save_api_token_to(&Self::get_config_path()?, token)
    }

    /// Store the token in the config file at `path`, keeping other settings.
    pub fn save_api_token_to(path: &Path, token: &ApiToken) -> Result<()> {
        let mut config = Self::load_from(path).unwrap_or_else(|_| Self::new());
        config.replicate_api_token = Some(token.expose().to_string());
        config.save_to(path)
    }

    /// Resolve the token once at startup: the environment wins over the file.
    pub fn resolve_token(&self) -> std::result::Result<(ApiToken, TokenSource), ChatError> {
        self.resolve_token_with(std::env::var(TOKEN_ENV_VAR).ok())
    }

    pub fn resolve_token_with(
        &self,
        env_token: Option<String>,
    ) -> std::result::Result<(ApiToken, TokenSource), ChatError> {
        if let Some(token) = env_token.and_then(ApiToken::new) {
            return Ok((token, TokenSource::Env));
        }
        self.replicate_api_token
            .clone()
            .and_then(ApiToken::new)
            .map(|token| (token, TokenSource::Config))
            .ok_or(ChatError::ConfigurationMissing)
    }

    /// Model preselected in the sidebar. Unknown names fall back to the default.
    pub fn default_model(&self) -> ModelChoice {
        self.default_model
            .as_deref()
            .and_then(ModelChoice::from_str)
            .unwrap_or_default()
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("study-planner").join("config.json"))
    }
}
