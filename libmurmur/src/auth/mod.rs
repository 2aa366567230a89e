//! OAuth2 authorization code flow with PKCE, token lifecycle, and the
//! credential provider platform requests are signed with

use secrecy::SecretString;
use serde::Serialize;

use crate::config::{secret_from_env, Config};
use crate::error::Result;

pub mod credentials;
pub mod pkce;
pub mod session;

pub use credentials::CredentialProvider;
pub use pkce::{AuthorizationState, PkceChallenge, PkceMethod};
pub use session::OAuthSessionManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Unauthenticated,
    AwaitingCallback,
    Authenticated,
    Expired,
    Refreshing,
    RevocationRequested,
}

/// What the user needs to finish an authorization in the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub state_nonce: String,
    /// Must be handed back to `complete_authorization` unchanged
    pub pkce_verifier: String,
}

/// Client registration and endpoints for the OAuth2 provider
#[derive(Debug)]
pub struct OAuthClientConfig {
    pub client_id: String,
    /// Present for confidential clients, which authenticate with HTTP Basic
    pub client_secret: Option<SecretString>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub pkce_method: PkceMethod,
    pub authorize_url: String,
    pub token_url: String,
    pub revoke_url: String,
}

impl OAuthClientConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client_secret = match (&config.oauth.client_secret_env, config.oauth.confidential) {
            (Some(var), true) => Some(secret_from_env(var)?),
            _ => None,
        };

        Ok(Self {
            client_id: config.oauth.client_id.clone(),
            client_secret,
            redirect_uri: config.oauth.redirect_uri.clone(),
            scopes: config.oauth.scopes.clone(),
            pkce_method: config.oauth.pkce_method,
            authorize_url: config.oauth.authorize_url.clone(),
            token_url: config.token_url(),
            revoke_url: config.revoke_url(),
        })
    }

    pub fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }
}
