//! Mock platform for testing
//!
//! Serves a canned timeline, metrics and user directory, records every
//! mutating call, and fails on request. Clones share state, so a test can
//! keep one handle for assertions and give another to the code under test.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::{PlatformError, Result};
use crate::platforms::Platform;
use crate::types::{EngagementMetrics, Post, UserRecord};

#[derive(Debug, Default)]
struct MockState {
    timeline: Vec<Post>,
    timeline_fails: bool,
    failing_replies: HashSet<String>,
    metrics: HashMap<String, EngagementMetrics>,
    quotes: HashMap<String, Vec<Value>>,
    comments: HashMap<String, Vec<Value>>,
    failing_lookups: HashSet<String>,
    users: HashMap<String, UserRecord>,
    failing_follows: HashSet<String>,
    me: Option<UserRecord>,
    next_id: u64,

    replies: Vec<(String, String)>,
    posts: Vec<String>,
    quoted: Vec<(String, String)>,
    followed: Vec<String>,
    unfollowed: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_timeline(self, posts: Vec<Post>) -> Self {
        self.state().timeline = posts;
        self
    }

    pub fn with_failing_timeline(self) -> Self {
        self.state().timeline_fails = true;
        self
    }

    /// Replies to `post_id` fail with HTTP 403
    pub fn with_failing_reply(self, post_id: &str) -> Self {
        self.state().failing_replies.insert(post_id.to_string());
        self
    }

    pub fn with_metrics(self, post_id: &str, metrics: &[(&str, u64)]) -> Self {
        let map = metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        self.state().metrics.insert(post_id.to_string(), map);
        self
    }

    pub fn with_quotes(self, post_id: &str, quotes: Vec<Value>) -> Self {
        self.state().quotes.insert(post_id.to_string(), quotes);
        self
    }

    pub fn with_comments(self, post_id: &str, comments: Vec<Value>) -> Self {
        self.state().comments.insert(post_id.to_string(), comments);
        self
    }

    /// Quote and comment lookups for `post_id` fail with HTTP 500
    pub fn with_failing_lookups(self, post_id: &str) -> Self {
        self.state().failing_lookups.insert(post_id.to_string());
        self
    }

    pub fn with_user(self, user: UserRecord) -> Self {
        self.state().users.insert(user.username.to_lowercase(), user);
        self
    }

    /// Following `target_id` fails with HTTP 403
    pub fn with_failing_follow(self, target_id: &str) -> Self {
        self.state().failing_follows.insert(target_id.to_string());
        self
    }

    pub fn with_me(self, user: UserRecord) -> Self {
        self.state().me = Some(user);
        self
    }

    /// `(post_id, text)` for each successful reply, in call order
    pub fn replies(&self) -> Vec<(String, String)> {
        self.state().replies.clone()
    }

    pub fn posts(&self) -> Vec<String> {
        self.state().posts.clone()
    }

    pub fn quoted(&self) -> Vec<(String, String)> {
        self.state().quoted.clone()
    }

    pub fn followed(&self) -> Vec<String> {
        self.state().followed.clone()
    }

    pub fn unfollowed(&self) -> Vec<String> {
        self.state().unfollowed.clone()
    }

    fn next_id(&self) -> String {
        let mut state = self.state();
        state.next_id += 1;
        format!("mock-{}", state.next_id)
    }
}

fn forbidden(endpoint: &str) -> crate::error::MurmurError {
    PlatformError::Request {
        status_code: 403,
        endpoint: endpoint.to_string(),
    }
    .into()
}

#[async_trait]
impl Platform for MockPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_timeline(&self, account_id: &str, max_results: usize) -> Result<Vec<Post>> {
        let state = self.state();
        if state.timeline_fails {
            return Err(PlatformError::Request {
                status_code: 503,
                endpoint: format!("/users/{}/timelines/reverse_chronological", account_id),
            }
            .into());
        }
        Ok(state
            .timeline
            .iter()
            .take(max_results.clamp(1, 100))
            .cloned()
            .collect())
    }

    async fn post_text(&self, text: &str) -> Result<String> {
        let id = self.next_id();
        self.state().posts.push(text.to_string());
        Ok(id)
    }

    async fn reply_to(&self, post_id: &str, text: &str) -> Result<String> {
        if self.state().failing_replies.contains(post_id) {
            return Err(forbidden("/tweets"));
        }
        let id = self.next_id();
        self.state()
            .replies
            .push((post_id.to_string(), text.to_string()));
        Ok(id)
    }

    async fn quote(&self, post_id: &str, text: &str) -> Result<String> {
        let id = self.next_id();
        self.state()
            .quoted
            .push((post_id.to_string(), text.to_string()));
        Ok(id)
    }

    async fn get_engagement_metrics(&self, post_id: &str) -> Result<EngagementMetrics> {
        self.state()
            .metrics
            .get(post_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("post {}", post_id)).into())
    }

    async fn get_quotes(&self, post_id: &str) -> Result<Vec<Value>> {
        let state = self.state();
        if state.failing_lookups.contains(post_id) {
            return Err(PlatformError::Request {
                status_code: 500,
                endpoint: format!("/tweets/{}/quote_tweets", post_id),
            }
            .into());
        }
        Ok(state.quotes.get(post_id).cloned().unwrap_or_default())
    }

    async fn get_comments(&self, post_id: &str) -> Result<Vec<Value>> {
        let state = self.state();
        if state.failing_lookups.contains(post_id) {
            return Err(PlatformError::Request {
                status_code: 500,
                endpoint: "/tweets/search/recent".to_string(),
            }
            .into());
        }
        Ok(state.comments.get(post_id).cloned().unwrap_or_default())
    }

    async fn follow_user(&self, target_id: &str) -> Result<bool> {
        let mut state = self.state();
        if state.failing_follows.contains(target_id) {
            return Err(forbidden("/users/following"));
        }
        state.followed.push(target_id.to_string());
        Ok(true)
    }

    async fn unfollow_user(&self, target_id: &str) -> Result<bool> {
        self.state().unfollowed.push(target_id.to_string());
        Ok(true)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let username = username.strip_prefix('@').unwrap_or(username).to_lowercase();
        Ok(self.state().users.get(&username).cloned())
    }

    async fn me(&self) -> Result<UserRecord> {
        self.state()
            .me
            .clone()
            .ok_or_else(|| PlatformError::NotFound("authenticated user".to_string()).into())
    }
}
