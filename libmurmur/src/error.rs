//! Error types for Murmur

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MurmurError>;

#[derive(Error, Debug)]
pub enum MurmurError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MurmurError {
    /// Whether this error needs a human before the agent can make progress
    ///
    /// Fatal errors are never retried by the crate. The outer scheduler is
    /// expected to surface them instead of looping on them.
    pub fn is_fatal(&self) -> bool {
        match self {
            MurmurError::Auth(e) => e.is_fatal(),
            MurmurError::Config(_) => true,
            MurmurError::Platform(_)
            | MurmurError::Model(_)
            | MurmurError::Store(_)
            | MurmurError::InvalidInput(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Environment variable {0} is not set")]
    MissingEnv(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    /// The `state` returned on callback differs from the one we issued
    #[error("Authorization state mismatch; the callback may be forged")]
    StateMismatch,

    #[error("PKCE verifier does not match the challenge of this authorization")]
    PkceMismatch,

    #[error("Authorization attempt expired before the callback arrived")]
    AuthorizationExpired,

    #[error("No authorization is in progress")]
    NoPendingAuthorization,

    #[error("No session; complete an authorization first")]
    NotAuthenticated,

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("Re-authorization required: {0}")]
    ReauthorizationRequired(String),

    #[error("Token revocation failed: {0}")]
    Revoke(String),
}

impl AuthError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AuthError::StateMismatch
                | AuthError::PkceMismatch
                | AuthError::TokenExchange(_)
                | AuthError::ReauthorizationRequired(_)
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("Request to {endpoint} failed with HTTP {status_code}")]
    Request { status_code: u16, endpoint: String },

    #[error("Rate limit exceeded on {endpoint} after {attempts} attempts")]
    RateLimitExceeded { endpoint: String, attempts: u32 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Request(String),

    #[error("Model returned no text")]
    EmptyResponse,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keyring error: {0}")]
    Keyring(String),
}
