//! X API v2 client
//!
//! Every call obtains a bearer token from the [`CredentialProvider`], sends one
//! request, and retries only on HTTP 429 after waiting out the advertised
//! rate-limit window.

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::auth::CredentialProvider;
use crate::config::PlatformConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::rate_limit::{backoff_delay, RetryPolicy, RATE_LIMIT_RESET_HEADER};
use crate::platforms::wire::{
    CreateTweet, CreatedTweet, Envelope, FollowRequest, MetricsData, RawEnvelope, ReplySettings,
    TweetData, UsersEnvelope,
};
use crate::platforms::Platform;
use crate::types::{now_timestamp, EngagementMetrics, Post, UserRecord};

const TIMELINE_FIELDS: &str = "created_at,referenced_tweets,author_id";
const METRICS_FIELDS: &str = "public_metrics,non_public_metrics,organic_metrics";
const USER_FIELDS: &str = "id,name,username,created_at,description,location,public_metrics";
const MAX_PAGE: usize = 100;

pub struct PlatformClient {
    http: reqwest::Client,
    api_base: String,
    credentials: CredentialProvider,
    self_id: String,
    retry: RetryPolicy,
}

impl PlatformClient {
    /// `self_id` is the account whose following list `follow_user` edits
    pub fn new(
        credentials: CredentialProvider,
        config: &PlatformConfig,
        self_id: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("murmur/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            credentials,
            self_id: self_id.into(),
            retry: RetryPolicy::new(config.max_rate_limit_retries),
        })
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn credentials(&self) -> &CredentialProvider {
        &self.credentials
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response> {
        let url = format!("{}{}", self.api_base, endpoint);
        let mut retries = 0;

        loop {
            let token = self.credentials.bearer_token().await?;
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(token)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| PlatformError::Network(e.to_string()))?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if !self.retry.allows_retry(retries) {
                    tracing::warn!(endpoint, attempts = retries + 1, "Rate limit retries exhausted");
                    return Err(PlatformError::RateLimitExceeded {
                        endpoint: endpoint.to_string(),
                        attempts: retries + 1,
                    }
                    .into());
                }
                let reset = response
                    .headers()
                    .get(RATE_LIMIT_RESET_HEADER)
                    .and_then(|v| v.to_str().ok());
                let delay = backoff_delay(reset, now_timestamp());
                tracing::warn!(endpoint, wait_secs = delay.as_secs(), "Rate limited; waiting for reset");
                tokio::time::sleep(delay).await;
                retries += 1;
                continue;
            }

            if !status.is_success() {
                tracing::error!(endpoint, status = status.as_u16(), "Platform request failed");
                return Err(PlatformError::Request {
                    status_code: status.as_u16(),
                    endpoint: endpoint.to_string(),
                }
                .into());
            }

            tracing::debug!(%method, endpoint, status = status.as_u16(), "Platform request succeeded");
            return Ok(response);
        }
    }

    async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T> {
        let response = self.send(method, endpoint, query, body).await?;
        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Decode(format!("{}: {}", endpoint, e)))?;
        Ok(parsed)
    }

    async fn create_tweet(&self, body: CreateTweet<'_>) -> Result<String> {
        let body = serde_json::to_value(&body).map_err(|e| PlatformError::Decode(e.to_string()))?;
        let created: Envelope<CreatedTweet> =
            self.json(Method::POST, "/tweets", &[], Some(&body)).await?;
        created
            .data
            .map(|t| t.id)
            .ok_or_else(|| PlatformError::Decode("/tweets: response has no data.id".to_string()).into())
    }

    async fn raw_list(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Vec<Value>> {
        let envelope: RawEnvelope = self.json(Method::GET, endpoint, query, None).await?;
        Ok(envelope.data.unwrap_or_default())
    }
}

#[async_trait]
impl Platform for PlatformClient {
    fn name(&self) -> &str {
        "x"
    }

    async fn get_timeline(&self, account_id: &str, max_results: usize) -> Result<Vec<Post>> {
        let endpoint = format!("/users/{}/timelines/reverse_chronological", account_id);
        let query = [
            ("max_results", max_results.clamp(1, MAX_PAGE).to_string()),
            ("tweet.fields", TIMELINE_FIELDS.to_string()),
        ];
        let envelope: Envelope<Vec<TweetData>> =
            self.json(Method::GET, &endpoint, &query, None).await?;
        let posts: Vec<Post> = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(Post::from)
            .collect();
        tracing::debug!(account_id, count = posts.len(), "Fetched timeline");
        Ok(posts)
    }

    async fn post_text(&self, text: &str) -> Result<String> {
        self.create_tweet(CreateTweet {
            text,
            reply: None,
            quote_tweet_id: None,
        })
        .await
    }

    async fn reply_to(&self, post_id: &str, text: &str) -> Result<String> {
        self.create_tweet(CreateTweet {
            text,
            reply: Some(ReplySettings {
                in_reply_to_tweet_id: post_id,
            }),
            quote_tweet_id: None,
        })
        .await
    }

    async fn quote(&self, post_id: &str, text: &str) -> Result<String> {
        self.create_tweet(CreateTweet {
            text,
            reply: None,
            quote_tweet_id: Some(post_id),
        })
        .await
    }

    async fn get_engagement_metrics(&self, post_id: &str) -> Result<EngagementMetrics> {
        let query = [
            ("ids", post_id.to_string()),
            ("tweet.fields", METRICS_FIELDS.to_string()),
        ];
        let envelope: Envelope<Vec<MetricsData>> =
            self.json(Method::GET, "/tweets", &query, None).await?;
        envelope
            .data
            .and_then(|mut data| if data.is_empty() { None } else { Some(data.remove(0)) })
            .map(MetricsData::merged)
            .ok_or_else(|| PlatformError::NotFound(format!("post {}", post_id)).into())
    }

    async fn get_quotes(&self, post_id: &str) -> Result<Vec<Value>> {
        let endpoint = format!("/tweets/{}/quote_tweets", post_id);
        let query = [
            ("max_results", MAX_PAGE.to_string()),
            ("tweet.fields", TIMELINE_FIELDS.to_string()),
        ];
        self.raw_list(&endpoint, &query).await
    }

    async fn get_comments(&self, post_id: &str) -> Result<Vec<Value>> {
        let query = [
            ("query", format!("conversation_id:{}", post_id)),
            ("max_results", MAX_PAGE.to_string()),
            ("tweet.fields", TIMELINE_FIELDS.to_string()),
        ];
        self.raw_list("/tweets/search/recent", &query).await
    }

    async fn follow_user(&self, target_id: &str) -> Result<bool> {
        let endpoint = format!("/users/{}/following", self.self_id);
        let body = serde_json::to_value(FollowRequest {
            target_user_id: target_id,
        })
        .map_err(|e| PlatformError::Decode(e.to_string()))?;
        self.send(Method::POST, &endpoint, &[], Some(&body)).await?;
        tracing::info!(target_id, "Followed user");
        Ok(true)
    }

    async fn unfollow_user(&self, target_id: &str) -> Result<bool> {
        let endpoint = format!("/users/{}/following/{}", self.self_id, target_id);
        self.send(Method::DELETE, &endpoint, &[], None).await?;
        tracing::info!(target_id, "Unfollowed user");
        Ok(true)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let username = username.strip_prefix('@').unwrap_or(username);
        let query = [
            ("usernames", username.to_string()),
            ("user.fields", USER_FIELDS.to_string()),
        ];
        let envelope: UsersEnvelope = self.json(Method::GET, "/users/by", &query, None).await?;
        Ok(envelope.data.and_then(|users| users.into_iter().next()))
    }

    async fn me(&self) -> Result<UserRecord> {
        let query = [("user.fields", USER_FIELDS.to_string())];
        let envelope: Envelope<UserRecord> =
            self.json(Method::GET, "/users/me", &query, None).await?;
        envelope
            .data
            .ok_or_else(|| PlatformError::NotFound("authenticated user".to_string()).into())
    }
}
