//! Session lifecycle for one account
//!
//! ```text
//! Unauthenticated -> AwaitingCallback -> Authenticated
//!                                          |-> Expired -> Refreshing -> Authenticated
//!                                          `-> RevocationRequested -> Unauthenticated
//! ```

use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::auth::pkce::{AuthorizationState, PkceChallenge};
use crate::auth::{AuthorizationRequest, OAuthClientConfig, SessionState};
use crate::error::{AuthError, ConfigError, Result};
use crate::store::TokenStore;
use crate::types::{now_timestamp, TokenRecord};

/// Lifetime assumed when the token endpoint omits `expires_in`
pub const DEFAULT_EXPIRES_IN: i64 = 7200;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct PendingAuthorization {
    pkce: PkceChallenge,
    state: AuthorizationState,
}

pub struct OAuthSessionManager {
    http: reqwest::Client,
    config: OAuthClientConfig,
    account_id: String,
    store: Arc<dyn TokenStore>,
    token: Option<TokenRecord>,
    pending: Option<PendingAuthorization>,
    state: SessionState,
}

impl OAuthSessionManager {
    pub fn new(
        http: reqwest::Client,
        config: OAuthClientConfig,
        account_id: impl Into<String>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            http,
            config,
            account_id: account_id.into(),
            store,
            token: None,
            pending: None,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn token(&self) -> Option<&TokenRecord> {
        self.token.as_ref()
    }

    /// Restore the session persisted for this account, if any
    ///
    /// An expired record is kept; the next `ensure_valid_token` refreshes it.
    pub async fn load(&mut self) -> Result<SessionState> {
        self.token = self.store.load(&self.account_id).await?;
        self.state = match &self.token {
            None => SessionState::Unauthenticated,
            Some(token) if token.is_expired_at(now_timestamp()) => SessionState::Expired,
            Some(_) => SessionState::Authenticated,
        };
        tracing::debug!(account_id = %self.account_id, state = ?self.state, "Loaded session");
        Ok(self.state)
    }

    /// Start a new authorization attempt, discarding any previous one
    ///
    /// Empty `scopes` means the configured scopes. No network call is made.
    pub fn begin_authorization(&mut self, scopes: &[String]) -> Result<AuthorizationRequest> {
        let pkce = PkceChallenge::generate(self.config.pkce_method);
        let state = AuthorizationState::new();
        let scope = if scopes.is_empty() {
            self.config.scopes.join(" ")
        } else {
            scopes.join(" ")
        };

        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state.state_nonce.as_str()),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", pkce.method.as_str()),
            ],
        )
        .map_err(|e| ConfigError::InvalidValue {
            field: "oauth.authorize_url".to_string(),
            reason: e.to_string(),
        })?;

        let request = AuthorizationRequest {
            authorization_url: url.to_string(),
            state_nonce: state.state_nonce.clone(),
            pkce_verifier: pkce.verifier.clone(),
        };
        self.pending = Some(PendingAuthorization { pkce, state });
        self.state = SessionState::AwaitingCallback;
        tracing::info!(account_id = %self.account_id, "Authorization started");
        Ok(request)
    }

    /// Exchange the callback `code` for tokens
    ///
    /// The returned state must equal the nonce from `begin_authorization`
    /// exactly; otherwise the attempt is aborted before any network call.
    pub async fn complete_authorization(
        &mut self,
        code: &str,
        returned_state: &str,
        verifier: &str,
    ) -> Result<TokenRecord> {
        let pending = self.pending.take().ok_or(AuthError::NoPendingAuthorization)?;

        if returned_state != pending.state.state_nonce {
            tracing::warn!(account_id = %self.account_id, "Callback state does not match; aborting");
            self.state = SessionState::Unauthenticated;
            return Err(AuthError::StateMismatch.into());
        }
        if pending.state.is_expired_at(now_timestamp()) {
            self.state = SessionState::Unauthenticated;
            return Err(AuthError::AuthorizationExpired.into());
        }
        if !pending.pkce.verify(verifier) {
            self.state = SessionState::Unauthenticated;
            return Err(AuthError::PkceMismatch.into());
        }

        let form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("code_verifier", verifier.to_string()),
        ];
        let response = match self.post_token(form).await {
            Ok(response) => response,
            Err(reason) => {
                self.state = SessionState::Unauthenticated;
                return Err(AuthError::TokenExchange(reason).into());
            }
        };

        let record = TokenRecord {
            account_id: self.account_id.clone(),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: now_timestamp() + response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
        };
        self.install(&record).await;
        tracing::info!(account_id = %self.account_id, "Authorization completed");
        Ok(record)
    }

    /// Current access token, refreshing first when it has expired
    pub async fn ensure_valid_token(&mut self) -> Result<String> {
        let token = self.token.as_ref().ok_or_else(|| {
            AuthError::ReauthorizationRequired("no token for this account".to_string())
        })?;

        if !token.is_expired_at(now_timestamp()) {
            return Ok(token.access_token.clone());
        }

        self.state = SessionState::Expired;
        match self.refresh().await {
            Ok(record) => Ok(record.access_token),
            Err(e) => {
                tracing::warn!(account_id = %self.account_id, error = %e, "Refresh failed; re-authorization required");
                self.token = None;
                self.state = SessionState::Unauthenticated;
                Err(AuthError::ReauthorizationRequired(e.to_string()).into())
            }
        }
    }

    /// Trade the refresh token for a new access token
    ///
    /// A refresh token in the response replaces the stored one; otherwise the
    /// old one is kept.
    pub async fn refresh(&mut self) -> Result<TokenRecord> {
        let current = self.token.clone().ok_or(AuthError::NotAuthenticated)?;
        let refresh_token = current
            .refresh_token
            .clone()
            .ok_or_else(|| AuthError::Refresh("no refresh token stored".to_string()))?;

        self.state = SessionState::Refreshing;
        let form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.clone()),
        ];
        let response = match self.post_token(form).await {
            Ok(response) => response,
            Err(reason) => {
                self.state = SessionState::Expired;
                return Err(AuthError::Refresh(reason).into());
            }
        };

        let record = TokenRecord {
            account_id: self.account_id.clone(),
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(Some(refresh_token)),
            expires_at: now_timestamp() + response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
        };
        self.install(&record).await;
        tracing::info!(account_id = %self.account_id, expires_at = record.expires_at, "Access token refreshed");
        Ok(record)
    }

    /// Revoke `token`, or the current access token when `None`
    ///
    /// Without any token there is nothing to revoke and this succeeds.
    pub async fn revoke(&mut self, token: Option<&str>) -> Result<()> {
        let target = match token {
            Some(t) => t.to_string(),
            None => match &self.token {
                Some(record) => record.access_token.clone(),
                None => {
                    self.state = SessionState::Unauthenticated;
                    return Ok(());
                }
            },
        };

        let previous = self.state;
        self.state = SessionState::RevocationRequested;

        let mut form = vec![("token", target)];
        if !self.config.is_confidential() {
            form.push(("client_id", self.config.client_id.clone()));
        }
        let mut request = self.http.post(&self.config.revoke_url).form(&form);
        if let Some(secret) = &self.config.client_secret {
            request = request.basic_auth(&self.config.client_id, Some(secret.expose_secret()));
        }

        let outcome = match request.send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(format!("HTTP {}", response.status().as_u16())),
            Err(e) => Err(e.to_string()),
        };
        if let Err(reason) = outcome {
            self.state = previous;
            return Err(AuthError::Revoke(reason).into());
        }

        self.token = None;
        self.store.delete(&self.account_id).await?;
        self.state = SessionState::Unauthenticated;
        tracing::info!(account_id = %self.account_id, "Token revoked");
        Ok(())
    }

    /// Adopt a freshly issued token, then persist it
    ///
    /// The issuer has already spent the previous code or refresh token, so a
    /// failed write keeps the new record in memory and is only logged.
    async fn install(&mut self, record: &TokenRecord) {
        self.token = Some(record.clone());
        self.state = SessionState::Authenticated;
        if let Err(e) = self.store.save(record).await {
            tracing::error!(account_id = %self.account_id, error = %e, "Failed to persist token; keeping it in memory");
        }
    }

    /// POST to the token endpoint with the client authentication policy applied
    ///
    /// Errors are flattened to a message; callers pick the error variant.
    async fn post_token(
        &self,
        mut form: Vec<(&'static str, String)>,
    ) -> std::result::Result<TokenResponse, String> {
        if !self.config.is_confidential() {
            form.push(("client_id", self.config.client_id.clone()));
        }
        let mut request = self.http.post(&self.config.token_url).form(&form);
        if let Some(secret) = &self.config.client_secret {
            request = request.basic_auth(&self.config.client_id, Some(secret.expose_secret()));
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status.as_u16(), body));
        }
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| format!("malformed token response: {}", e))
    }
}
