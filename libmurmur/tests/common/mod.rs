//! Shared fixtures for integration tests

#![allow(dead_code)]

use libmurmur::auth::{OAuthClientConfig, PkceMethod};
use libmurmur::config::{Config, Persona, PlatformConfig};
use libmurmur::types::{now_timestamp, Post, TokenRecord};

pub const ACCOUNT_ID: &str = "1500";
pub const CLIENT_ID: &str = "client-abc";

pub fn persona() -> Persona {
    Persona {
        name: "Ferris".to_string(),
        description: "a crab who reviews systems papers".to_string(),
        tone: "dry, curious".to_string(),
        interests: vec!["compilers".to_string(), "storage engines".to_string()],
    }
}

pub fn post(id: &str, author_id: &str, text: &str) -> Post {
    Post {
        id: id.to_string(),
        author_id: author_id.to_string(),
        text: text.to_string(),
        created_at: None,
        referenced_post_ids: vec![],
    }
}

/// Public-client OAuth config whose endpoints live on `server_uri`
pub fn oauth_config(server_uri: &str) -> OAuthClientConfig {
    OAuthClientConfig {
        client_id: CLIENT_ID.to_string(),
        client_secret: None,
        redirect_uri: "https://localhost:8000/callback".to_string(),
        scopes: vec!["tweet.read".to_string(), "offline.access".to_string()],
        pkce_method: PkceMethod::S256,
        authorize_url: format!("{}/i/oauth2/authorize", server_uri),
        token_url: format!("{}/2/oauth2/token", server_uri),
        revoke_url: format!("{}/2/oauth2/revoke", server_uri),
    }
}

pub fn platform_config(server_uri: &str, max_rate_limit_retries: u32) -> PlatformConfig {
    PlatformConfig {
        api_base: format!("{}/2", server_uri),
        request_timeout_secs: 10,
        max_rate_limit_retries,
        bearer_token_env: None,
    }
}

pub fn token(access: &str, refresh: Option<&str>, expires_in: i64) -> TokenRecord {
    TokenRecord {
        account_id: ACCOUNT_ID.to_string(),
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_at: now_timestamp() + expires_in,
    }
}

/// Full agent config talking to `server_uri` with in-memory storage
pub fn agent_config(server_uri: &str) -> Config {
    let toml = format!(
        r#"
        [account]
        id = "{account}"

        [oauth]
        client_id = "{client}"
        confidential = false

        [platform]
        api_base = "{uri}/2"
        request_timeout_secs = 10

        [persona]
        name = "Ferris"
        description = "a crab who reviews systems papers"
        tone = "dry, curious"
        interests = ["compilers"]

        [model]
        endpoint = "{uri}/v1"
        model = "test-model"

        [storage]
        token_backend = "memory"
        "#,
        account = ACCOUNT_ID,
        client = CLIENT_ID,
        uri = server_uri,
    );
    Config::from_toml(&toml).unwrap()
}
