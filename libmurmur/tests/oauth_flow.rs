//! OAuth2 session lifecycle against a fake authorization server

mod common;

use base64::{engine::general_purpose::STANDARD, Engine};
use secrecy::SecretString;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use common::{oauth_config, token, ACCOUNT_ID, CLIENT_ID};
use libmurmur::auth::{OAuthSessionManager, SessionState};
use libmurmur::error::{AuthError, MurmurError};
use libmurmur::store::{MemoryStore, TokenStore};
use libmurmur::types::now_timestamp;

fn new_session(server: &MockServer, store: Arc<MemoryStore>) -> OAuthSessionManager {
    OAuthSessionManager::new(
        reqwest::Client::new(),
        oauth_config(&server.uri()),
        ACCOUNT_ID,
        store,
    )
}

fn form_value(request: &Request, key: &str) -> Option<String> {
    url::form_urlencoded::parse(&request.body)
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[tokio::test]
async fn test_full_authorization_flow_persists_tokens() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let mut session = new_session(&server, store.clone());

    let request = session.begin_authorization(&[]).unwrap();

    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=callback-code"))
        .and(body_string_contains(format!("code_verifier={}", request.pkce_verifier)))
        .and(body_string_contains(format!("client_id={}", CLIENT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "bearer",
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 7200,
            "scope": "tweet.read offline.access"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let before = now_timestamp();
    let record = session
        .complete_authorization("callback-code", &request.state_nonce, &request.pkce_verifier)
        .await
        .unwrap();

    assert_eq!(record.access_token, "access-1");
    assert_eq!(record.refresh_token.as_deref(), Some("refresh-1"));
    assert!(record.expires_at >= before + 7200);
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(store.load(ACCOUNT_ID).await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_missing_expires_in_defaults_to_two_hours() {
    let server = MockServer::start().await;
    let mut session = new_session(&server, Arc::new(MemoryStore::new()));
    let request = session.begin_authorization(&[]).unwrap();

    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access_token": "access-1" })),
        )
        .mount(&server)
        .await;

    let before = now_timestamp();
    let record = session
        .complete_authorization("code", &request.state_nonce, &request.pkce_verifier)
        .await
        .unwrap();
    assert!(record.expires_at >= before + 7200);
    assert!(record.expires_at <= now_timestamp() + 7200);
    assert!(record.refresh_token.is_none());
}

#[tokio::test]
async fn test_state_mismatch_aborts_without_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = new_session(&server, Arc::new(MemoryStore::new()));
    let request = session.begin_authorization(&[]).unwrap();

    let err = session
        .complete_authorization("code", "forged-state", &request.pkce_verifier)
        .await
        .unwrap_err();

    assert!(matches!(err, MurmurError::Auth(AuthError::StateMismatch)));
    assert!(err.is_fatal());
    assert_eq!(session.state(), SessionState::Unauthenticated);

    // The attempt is spent; retrying with the right state does not resurrect it
    let err = session
        .complete_authorization("code", &request.state_nonce, &request.pkce_verifier)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MurmurError::Auth(AuthError::NoPendingAuthorization)
    ));
}

#[tokio::test]
async fn test_token_exchange_rejection_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_request",
            "error_description": "Value passed for the authorization code was invalid."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut session = new_session(&server, store.clone());
    let request = session.begin_authorization(&[]).unwrap();
    let err = session
        .complete_authorization("stale", &request.state_nonce, &request.pkce_verifier)
        .await
        .unwrap_err();

    match &err {
        MurmurError::Auth(AuthError::TokenExchange(reason)) => assert!(reason.contains("400")),
        other => panic!("Expected TokenExchange, got {:?}", other),
    }
    assert!(err.is_fatal());
    assert!(store.load(ACCOUNT_ID).await.unwrap().is_none());
}

#[tokio::test]
async fn test_confidential_client_uses_basic_auth() {
    let server = MockServer::start().await;
    let expected = format!("Basic {}", STANDARD.encode(format!("{}:s3cret", CLIENT_ID)));
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .and(header("authorization", expected.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access_token": "access-1" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = oauth_config(&server.uri());
    config.client_secret = Some(SecretString::from("s3cret".to_string()));
    let mut session = OAuthSessionManager::new(
        reqwest::Client::new(),
        config,
        ACCOUNT_ID,
        Arc::new(MemoryStore::new()),
    );
    let request = session.begin_authorization(&[]).unwrap();
    session
        .complete_authorization("code", &request.state_nonce, &request.pkce_verifier)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(form_value(&requests[0], "client_id"), None);
}

#[tokio::test]
async fn test_valid_token_is_not_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.save(&token("access-1", Some("refresh-1"), 3600)).await.unwrap();
    let mut session = new_session(&server, store);
    assert_eq!(session.load().await.unwrap(), SessionState::Authenticated);

    assert_eq!(session.ensure_valid_token().await.unwrap(), "access-1");
    assert_eq!(session.ensure_valid_token().await.unwrap(), "access-1");
}

#[tokio::test]
async fn test_expired_token_is_refreshed_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.save(&token("access-1", Some("refresh-1"), -60)).await.unwrap();
    let mut session = new_session(&server, store.clone());
    assert_eq!(session.load().await.unwrap(), SessionState::Expired);

    assert_eq!(session.ensure_valid_token().await.unwrap(), "access-2");
    assert_eq!(session.ensure_valid_token().await.unwrap(), "access-2");
    assert_eq!(session.state(), SessionState::Authenticated);

    // No rotation in the response: the old refresh token is kept
    let stored = store.load(ACCOUNT_ID).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "access-2");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
}

/// Token endpoint whose refresh tokens each work exactly once
struct SingleUseRefreshTokens {
    used: Mutex<HashSet<String>>,
    issued: Mutex<u32>,
}

impl SingleUseRefreshTokens {
    fn new() -> Self {
        Self {
            used: Mutex::new(HashSet::new()),
            issued: Mutex::new(1),
        }
    }
}

impl Respond for SingleUseRefreshTokens {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let presented = form_value(request, "refresh_token").unwrap_or_default();
        let mut issued = self.issued.lock().unwrap();
        let current = format!("refresh-{}", *issued);

        if presented != current || !self.used.lock().unwrap().insert(presented) {
            return ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Value passed for the token was invalid."
            }));
        }

        *issued += 1;
        ResponseTemplate::new(200).set_body_json(json!({
            "access_token": format!("access-{}", *issued),
            "refresh_token": format!("refresh-{}", *issued),
            "expires_in": 7200
        }))
    }
}

#[tokio::test]
async fn test_refresh_rotation_survives_single_use_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(SingleUseRefreshTokens::new())
        .expect(3)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.save(&token("access-1", Some("refresh-1"), -60)).await.unwrap();
    let mut session = new_session(&server, store.clone());
    session.load().await.unwrap();

    let first = session.refresh().await.unwrap();
    assert_eq!(first.refresh_token.as_deref(), Some("refresh-2"));
    let second = session.refresh().await.unwrap();
    assert_eq!(second.access_token, "access-3");
    assert_eq!(second.refresh_token.as_deref(), Some("refresh-3"));
    assert_eq!(store.load(ACCOUNT_ID).await.unwrap(), Some(second));

    // A second process still holding the spent token is refused
    let stale_store = Arc::new(MemoryStore::new());
    stale_store
        .save(&token("access-1", Some("refresh-1"), -60))
        .await
        .unwrap();
    let mut stale = new_session(&server, stale_store);
    stale.load().await.unwrap();
    assert!(stale.refresh().await.is_err());
}

#[tokio::test]
async fn test_failed_refresh_requires_reauthorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.save(&token("access-1", Some("refresh-1"), -60)).await.unwrap();
    let mut session = new_session(&server, store);
    session.load().await.unwrap();

    let err = session.ensure_valid_token().await.unwrap_err();
    assert!(matches!(
        err,
        MurmurError::Auth(AuthError::ReauthorizationRequired(_))
    ));
    assert!(err.is_fatal());
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(session.token().is_none());
}

#[tokio::test]
async fn test_expired_token_without_refresh_token_requires_reauthorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.save(&token("access-1", None, -60)).await.unwrap();
    let mut session = new_session(&server, store);
    session.load().await.unwrap();

    let err = session.ensure_valid_token().await.unwrap_err();
    assert!(matches!(
        err,
        MurmurError::Auth(AuthError::ReauthorizationRequired(_))
    ));
}

#[tokio::test]
async fn test_revoke_clears_session_and_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/revoke"))
        .and(body_string_contains("token=access-1"))
        .and(body_string_contains(format!("client_id={}", CLIENT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "revoked": true })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.save(&token("access-1", Some("refresh-1"), 3600)).await.unwrap();
    let mut session = new_session(&server, store.clone());
    session.load().await.unwrap();

    session.revoke(None).await.unwrap();
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(session.token().is_none());
    assert!(store.load(ACCOUNT_ID).await.unwrap().is_none());

    // Nothing left to revoke
    session.revoke(None).await.unwrap();
}

#[tokio::test]
async fn test_failed_revoke_keeps_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/revoke"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.save(&token("access-1", Some("refresh-1"), 3600)).await.unwrap();
    let mut session = new_session(&server, store.clone());
    session.load().await.unwrap();

    let err = session.revoke(None).await.unwrap_err();
    assert!(matches!(err, MurmurError::Auth(AuthError::Revoke(_))));
    assert_eq!(session.state(), SessionState::Authenticated);
    assert!(store.load(ACCOUNT_ID).await.unwrap().is_some());
}

/// Token store whose first `failures` saves fail like a full disk
struct FlakyStore {
    inner: MemoryStore,
    failures: Mutex<u32>,
}

impl FlakyStore {
    fn failing(failures: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures: Mutex::new(failures),
        }
    }
}

#[async_trait::async_trait]
impl TokenStore for FlakyStore {
    async fn load(&self, account_id: &str) -> libmurmur::Result<Option<libmurmur::types::TokenRecord>> {
        self.inner.load(account_id).await
    }

    async fn save(&self, record: &libmurmur::types::TokenRecord) -> libmurmur::Result<()> {
        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
                return Err(libmurmur::error::StoreError::Io(err).into());
            }
        }
        self.inner.save(record).await
    }

    async fn delete(&self, account_id: &str) -> libmurmur::Result<()> {
        self.inner.delete(account_id).await
    }
}

#[tokio::test]
async fn test_refreshed_token_survives_a_failed_store_write() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(SingleUseRefreshTokens::new())
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(FlakyStore::failing(1));
    store
        .inner
        .save(&token("access-1", Some("refresh-1"), -60))
        .await
        .unwrap();
    let mut session = OAuthSessionManager::new(
        reqwest::Client::new(),
        oauth_config(&server.uri()),
        ACCOUNT_ID,
        store.clone(),
    );
    session.load().await.unwrap();

    // The write fails but the rotated token is kept in memory
    assert_eq!(session.ensure_valid_token().await.unwrap(), "access-2");
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(
        session.token().and_then(|t| t.refresh_token.clone()).as_deref(),
        Some("refresh-2")
    );
    assert_eq!(
        store.load(ACCOUNT_ID).await.unwrap().unwrap().access_token,
        "access-1"
    );

    // The next refresh presents the rotated token and persists normally
    let record = session.refresh().await.unwrap();
    assert_eq!(record.access_token, "access-3");
    assert_eq!(store.load(ACCOUNT_ID).await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_completed_authorization_survives_a_failed_store_write() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(FlakyStore::failing(1));
    let mut session = OAuthSessionManager::new(
        reqwest::Client::new(),
        oauth_config(&server.uri()),
        ACCOUNT_ID,
        store.clone(),
    );
    let request = session.begin_authorization(&[]).unwrap();

    let record = session
        .complete_authorization("callback-code", &request.state_nonce, &request.pkce_verifier)
        .await
        .unwrap();

    assert_eq!(record.access_token, "access-1");
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(session.ensure_valid_token().await.unwrap(), "access-1");
    assert!(store.load(ACCOUNT_ID).await.unwrap().is_none());
}
