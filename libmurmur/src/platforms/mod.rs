//! Social platform abstraction
//!
//! The agent talks to the platform only through [`Platform`], so the
//! pipeline, engagement collector and follow bootstrap can run against
//! [`mock::MockPlatform`] in tests and [`x::PlatformClient`] in production.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{EngagementMetrics, Post, UserRecord};

pub mod rate_limit;
pub mod wire;
pub mod x;

// Available outside cfg(test) so integration tests can drive the pipeline
pub mod mock;

pub use x::PlatformClient;

#[async_trait]
pub trait Platform: Send + Sync {
    /// Lowercase platform identifier, e.g. "x"
    fn name(&self) -> &str;

    /// Home timeline of `account_id`, newest first
    ///
    /// `max_results` is clamped to 1..=100. An empty timeline is `Ok(vec![])`.
    async fn get_timeline(&self, account_id: &str, max_results: usize) -> Result<Vec<Post>>;

    /// Publish a standalone post, returning its id
    async fn post_text(&self, text: &str) -> Result<String>;

    /// Reply to `post_id`, returning the reply's id
    async fn reply_to(&self, post_id: &str, text: &str) -> Result<String>;

    /// Quote `post_id`, returning the quote's id
    async fn quote(&self, post_id: &str, text: &str) -> Result<String>;

    /// Public, non-public and organic metrics merged into one map
    ///
    /// Author-only groups are absent for posts we do not own.
    ///
    /// # Errors
    ///
    /// `PlatformError::NotFound` when the platform returns no such post.
    async fn get_engagement_metrics(&self, post_id: &str) -> Result<EngagementMetrics>;

    /// Raw quote posts of `post_id`
    async fn get_quotes(&self, post_id: &str) -> Result<Vec<Value>>;

    /// Raw posts in the conversation started by `post_id`
    async fn get_comments(&self, post_id: &str) -> Result<Vec<Value>>;

    async fn follow_user(&self, target_id: &str) -> Result<bool>;

    async fn unfollow_user(&self, target_id: &str) -> Result<bool>;

    /// `Ok(None)` when no such user exists; a leading `@` is ignored
    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    /// The authenticated user
    async fn me(&self) -> Result<UserRecord>;
}
