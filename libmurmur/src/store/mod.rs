//! Persistence seams for tokens, the agent's own posts, engagement and the
//! followed community
//!
//! Each concern is a trait so the agent can run against the in-memory store in
//! tests, and against files, the OS keyring, or SQLite in production. The
//! SQLite implementation lives in [`crate::db`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;
use crate::types::{CommunityMember, EngagementSnapshot, PostRecord, TokenRecord};

pub mod file;
pub mod keyring;

pub use file::FileTokenStore;
pub use self::keyring::KeyringTokenStore;

/// Token persistence keyed by account id
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self, account_id: &str) -> Result<Option<TokenRecord>>;

    /// Replace whatever is stored for `record.account_id`
    async fn save(&self, record: &TokenRecord) -> Result<()>;

    /// Remove the entry; deleting a missing entry is not an error
    async fn delete(&self, account_id: &str) -> Result<()>;
}

/// Posts the agent itself published
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn add(&self, record: &PostRecord) -> Result<()>;

    async fn get(&self, post_id: &str) -> Result<Option<PostRecord>>;

    /// All records, oldest first
    async fn all(&self) -> Result<Vec<PostRecord>>;
}

#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// Insert or overwrite the snapshot for `snapshot.post_id`
    async fn upsert(&self, snapshot: &EngagementSnapshot) -> Result<()>;

    async fn get(&self, post_id: &str) -> Result<Option<EngagementSnapshot>>;

    async fn all(&self) -> Result<Vec<EngagementSnapshot>>;
}

/// Accounts the agent followed, keyed by user id
#[async_trait]
pub trait CommunityStore: Send + Sync {
    /// Insert or refresh the member for `member.user_id`
    async fn upsert(&self, member: &CommunityMember) -> Result<()>;

    async fn get(&self, user_id: &str) -> Result<Option<CommunityMember>>;

    async fn all(&self) -> Result<Vec<CommunityMember>>;
}

/// Process-local store implementing every store trait
#[derive(Default)]
pub struct MemoryStore {
    tokens: Mutex<HashMap<String, TokenRecord>>,
    posts: Mutex<Vec<PostRecord>>,
    engagement: Mutex<HashMap<String, EngagementSnapshot>>,
    community: Mutex<HashMap<String, CommunityMember>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn load(&self, account_id: &str) -> Result<Option<TokenRecord>> {
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tokens.get(account_id).cloned())
    }

    async fn save(&self, record: &TokenRecord) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.insert(record.account_id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, account_id: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.remove(account_id);
        Ok(())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn add(&self, record: &PostRecord) -> Result<()> {
        let mut posts = self.posts.lock().unwrap_or_else(|e| e.into_inner());
        posts.retain(|p| p.post_id != record.post_id);
        posts.push(record.clone());
        Ok(())
    }

    async fn get(&self, post_id: &str) -> Result<Option<PostRecord>> {
        let posts = self.posts.lock().unwrap_or_else(|e| e.into_inner());
        Ok(posts.iter().find(|p| p.post_id == post_id).cloned())
    }

    async fn all(&self) -> Result<Vec<PostRecord>> {
        let posts = self.posts.lock().unwrap_or_else(|e| e.into_inner());
        Ok(posts.clone())
    }
}

#[async_trait]
impl EngagementStore for MemoryStore {
    async fn upsert(&self, snapshot: &EngagementSnapshot) -> Result<()> {
        let mut engagement = self.engagement.lock().unwrap_or_else(|e| e.into_inner());
        engagement.insert(snapshot.post_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn get(&self, post_id: &str) -> Result<Option<EngagementSnapshot>> {
        let engagement = self.engagement.lock().unwrap_or_else(|e| e.into_inner());
        Ok(engagement.get(post_id).cloned())
    }

    async fn all(&self) -> Result<Vec<EngagementSnapshot>> {
        let engagement = self.engagement.lock().unwrap_or_else(|e| e.into_inner());
        let mut snapshots: Vec<_> = engagement.values().cloned().collect();
        snapshots.sort_by(|a, b| a.post_id.cmp(&b.post_id));
        Ok(snapshots)
    }
}

#[async_trait]
impl CommunityStore for MemoryStore {
    async fn upsert(&self, member: &CommunityMember) -> Result<()> {
        let mut community = self.community.lock().unwrap_or_else(|e| e.into_inner());
        community.insert(member.user_id.clone(), member.clone());
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<CommunityMember>> {
        let community = self.community.lock().unwrap_or_else(|e| e.into_inner());
        Ok(community.get(user_id).cloned())
    }

    async fn all(&self) -> Result<Vec<CommunityMember>> {
        let community = self.community.lock().unwrap_or_else(|e| e.into_inner());
        let mut members: Vec<_> = community.values().cloned().collect();
        members.sort_by(|a, b| a.handle.cmp(&b.handle));
        Ok(members)
    }
}
