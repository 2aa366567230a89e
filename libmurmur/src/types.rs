//! Core types for Murmur

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current time as UTC unix seconds
///
/// Every expiry and retrieval timestamp in the crate uses this clock domain.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// OAuth2 tokens for one account, as persisted in a token store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub account_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) after which the access token is stale
    pub expires_at: i64,
}

impl TokenRecord {
    /// The token is expired once `now` is strictly past `expires_at`
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.expires_at
    }

    /// Whether the record can be refreshed without user interaction
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// A post fetched from the platform
///
/// Posts are never owned locally; they are read, decided on, and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub text: String,
    /// Unix timestamp, when the platform reported one
    pub created_at: Option<i64>,
    pub referenced_post_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Reply,
    Ignore,
}

/// Outcome of gating (and possibly generating for) one post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub post: Post,
    pub verdict: Verdict,
    pub reply_text: Option<String>,
}

impl Decision {
    pub fn ignore(post: Post) -> Self {
        Self {
            post,
            verdict: Verdict::Ignore,
            reply_text: None,
        }
    }

    pub fn reply(post: Post, text: String) -> Self {
        Self {
            post,
            verdict: Verdict::Reply,
            reply_text: Some(text),
        }
    }
}

/// A reply the pipeline posted, or would have posted in simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub original: Post,
    pub text: String,
    /// Platform id of the reply; `None` when simulated
    pub reply_id: Option<String>,
}

/// A post the agent itself published, as kept in the post store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: String,
    /// Prompt the content was generated from
    pub prompt: String,
    pub content: String,
    pub is_reply: bool,
    pub posted_at: i64,
}

/// Most recent engagement numbers for a post the agent published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    pub post_id: String,
    pub likes: u64,
    pub reposts: u64,
    pub retrieved_at: i64,
    pub quotes: Option<Vec<serde_json::Value>>,
    pub comments: Option<Vec<serde_json::Value>>,
}

/// Merged public and author-only metrics, keyed by platform field name
pub type EngagementMetrics = BTreeMap<String, u64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetrics {
    pub followers_count: u64,
    pub following_count: u64,
    #[serde(default)]
    pub tweet_count: u64,
    #[serde(default)]
    pub listed_count: u64,
}

/// A platform user, as returned by user lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub public_metrics: Option<UserMetrics>,
}

/// An account the agent follows, kept for later community analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityMember {
    pub user_id: String,
    pub handle: String,
    pub followers: u64,
    pub following: u64,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub followed_at: i64,
}

impl CommunityMember {
    pub fn from_user(user: &UserRecord, followed_at: i64) -> Self {
        let metrics = user.public_metrics.as_ref();
        Self {
            user_id: user.id.clone(),
            handle: user.username.clone(),
            followers: metrics.map_or(0, |m| m.followers_count),
            following: metrics.map_or(0, |m| m.following_count),
            bio: user.description.clone(),
            location: user.location.clone(),
            followed_at,
        }
    }
}
