//! JSON shapes of the X API v2 endpoints we call

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::{Post, UserRecord};

/// `{ "data": ... }` envelope; `data` is absent on empty results
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct TweetData {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub referenced_tweets: Vec<ReferencedTweet>,
}

#[derive(Debug, Deserialize)]
pub struct ReferencedTweet {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl From<TweetData> for Post {
    fn from(tweet: TweetData) -> Self {
        let created_at = tweet
            .created_at
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp());
        Post {
            id: tweet.id,
            author_id: tweet.author_id.unwrap_or_default(),
            text: tweet.text,
            created_at,
            referenced_post_ids: tweet.referenced_tweets.into_iter().map(|r| r.id).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MetricsData {
    #[serde(default)]
    pub public_metrics: BTreeMap<String, u64>,
    #[serde(default)]
    pub non_public_metrics: BTreeMap<String, u64>,
    #[serde(default)]
    pub organic_metrics: BTreeMap<String, u64>,
}

impl MetricsData {
    /// Later groups win on key collisions
    pub fn merged(self) -> BTreeMap<String, u64> {
        let mut metrics = self.public_metrics;
        metrics.extend(self.non_public_metrics);
        metrics.extend(self.organic_metrics);
        metrics
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatedTweet {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTweet<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplySettings<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_tweet_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct ReplySettings<'a> {
    pub in_reply_to_tweet_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct FollowRequest<'a> {
    pub target_user_id: &'a str,
}

pub type UsersEnvelope = Envelope<Vec<UserRecord>>;
pub type RawEnvelope = Envelope<Vec<Value>>;
