//! Configuration management for Murmur

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::auth::pkce::PkceMethod;
use crate::error::{ConfigError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.x.com/2";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://x.com/i/oauth2/authorize";
pub const DEFAULT_REDIRECT_URI: &str = "https://localhost:8000/callback";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub account: AccountConfig,
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    pub persona: Persona,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub accounts_to_follow: Vec<String>,
}

/// The account the agent acts as
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Platform user id; tokens are stored under this key
    pub id: String,
    #[serde(default)]
    pub handle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Name of the environment variable holding the client secret
    #[serde(default)]
    pub client_secret_env: Option<String>,
    /// Confidential clients authenticate with HTTP Basic instead of a body `client_id`
    #[serde(default = "default_true")]
    pub confidential: bool,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub pkce_method: PkceMethod,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    /// Defaults to `{platform.api_base}/oauth2/token`
    #[serde(default)]
    pub token_url: Option<String>,
    /// Defaults to `{platform.api_base}/oauth2/revoke`
    #[serde(default)]
    pub revoke_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_rate_limit_retries")]
    pub max_rate_limit_retries: u32,
    /// When set, requests use this app-only bearer token instead of OAuth2
    #[serde(default)]
    pub bearer_token_env: Option<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout(),
            max_rate_limit_retries: default_rate_limit_retries(),
            bearer_token_env: None,
        }
    }
}

/// Traits embedded in every gate and reply prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub description: String,
    pub tone: String,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How many timeline posts to consider per pass (platform cap is 100)
    #[serde(default = "default_timeline_length")]
    pub timeline_length: usize,
    #[serde(default = "default_max_reply_chars")]
    pub max_reply_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeline_length: default_timeline_length(),
            max_reply_chars: default_max_reply_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `http://localhost:8080/v1`
    pub endpoint: String,
    pub model: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_gate_tokens")]
    pub gate_max_tokens: u32,
    #[serde(default = "default_reply_tokens")]
    pub reply_max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    Memory,
    /// JSON files, one per account
    #[default]
    File,
    /// OS-native keyring
    Keyring,
    /// The SQLite database at `storage.database_path`
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub token_backend: TokenBackend,
    #[serde(default = "default_token_path")]
    pub token_path: String,
    /// SQLite database for post records and engagement; in-memory when unset
    #[serde(default)]
    pub database_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_backend: TokenBackend::default(),
            token_path: default_token_path(),
            database_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

pub fn default_scopes() -> Vec<String> {
    [
        "tweet.read",
        "tweet.write",
        "users.read",
        "follows.read",
        "follows.write",
        "offline.access",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_authorize_url() -> String {
    DEFAULT_AUTHORIZE_URL.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_rate_limit_retries() -> u32 {
    5
}

fn default_timeline_length() -> usize {
    50
}

fn default_max_reply_chars() -> usize {
    280
}

fn default_gate_tokens() -> u32 {
    200
}

fn default_reply_tokens() -> u32 {
    300
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

fn default_token_path() -> String {
    "~/.config/murmur/tokens".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.account.id.trim().is_empty() {
            return Err(ConfigError::MissingField("account.id".to_string()).into());
        }
        if self.oauth.client_id.trim().is_empty() {
            return Err(ConfigError::MissingField("oauth.client_id".to_string()).into());
        }
        if self.oauth.confidential && self.oauth.client_secret_env.is_none() {
            return Err(ConfigError::MissingField("oauth.client_secret_env".to_string()).into());
        }
        if self.pipeline.max_reply_chars < 4 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.max_reply_chars".to_string(),
                reason: "must leave room for the ellipsis".to_string(),
            }
            .into());
        }
        if self.storage.token_backend == TokenBackend::Sqlite && self.storage.database_path.is_none()
        {
            return Err(ConfigError::MissingField("storage.database_path".to_string()).into());
        }
        Ok(())
    }

    pub fn token_url(&self) -> String {
        self.oauth
            .token_url
            .clone()
            .unwrap_or_else(|| format!("{}/oauth2/token", self.platform.api_base))
    }

    pub fn revoke_url(&self) -> String {
        self.oauth
            .revoke_url
            .clone()
            .unwrap_or_else(|| format!("{}/oauth2/revoke", self.platform.api_base))
    }
}

/// Read a secret from the environment variable named in the config
pub fn secret_from_env(var: &str) -> Result<SecretString> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(SecretString::from(value)),
        _ => Err(ConfigError::MissingEnv(var.to_string()).into()),
    }
}

/// Resolve the configuration file path following the XDG base directory layout
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("MURMUR_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("murmur").join("config.toml"))
}

/// Resolve the data directory path following the XDG base directory layout
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("murmur"))
}
