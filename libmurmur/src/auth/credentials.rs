use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::OAuthSessionManager;
use crate::error::Result;

/// Source of the bearer token attached to platform requests
pub enum CredentialProvider {
    /// App-only token; never refreshed
    StaticBearer(SecretString),
    /// User-context token managed by an OAuth2 session
    OAuth2Managed(Arc<Mutex<OAuthSessionManager>>),
}

impl CredentialProvider {
    pub fn oauth2(session: OAuthSessionManager) -> Self {
        CredentialProvider::OAuth2Managed(Arc::new(Mutex::new(session)))
    }

    /// Token for the next request
    ///
    /// The session lock is held across a refresh so concurrent callers never
    /// spend the same refresh token twice.
    pub async fn bearer_token(&self) -> Result<String> {
        match self {
            CredentialProvider::StaticBearer(token) => Ok(token.expose_secret().to_string()),
            CredentialProvider::OAuth2Managed(session) => {
                session.lock().await.ensure_valid_token().await
            }
        }
    }

    pub fn session(&self) -> Option<Arc<Mutex<OAuthSessionManager>>> {
        match self {
            CredentialProvider::StaticBearer(_) => None,
            CredentialProvider::OAuth2Managed(session) => Some(Arc::clone(session)),
        }
    }
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialProvider::StaticBearer(_) => f.write_str("StaticBearer([REDACTED])"),
            CredentialProvider::OAuth2Managed(_) => f.write_str("OAuth2Managed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_bearer_returns_token() {
        let provider = CredentialProvider::StaticBearer(SecretString::from("app-token".to_string()));
        assert_eq!(provider.bearer_token().await.unwrap(), "app-token");
        assert!(provider.session().is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let provider = CredentialProvider::StaticBearer(SecretString::from("app-token".to_string()));
        assert!(!format!("{:?}", provider).contains("app-token"));
    }
}
