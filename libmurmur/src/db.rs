//! SQLite persistence for posts, engagement snapshots, tokens and community

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::store::{CommunityStore, EngagementStore, PostStore, TokenStore};
use crate::types::{CommunityMember, EngagementSnapshot, PostRecord, TokenRecord};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and migrate it
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::Io)?;
        }

        // mode=rwc creates the file on first open
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));
        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        Self::migrate(pool).await
    }

    /// Private in-memory database, gone when the value is dropped
    pub async fn in_memory() -> Result<Self> {
        // Every connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::SqlxError)?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;
        Ok(Self { pool })
    }
}

fn to_json(values: &Option<Vec<serde_json::Value>>) -> Result<Option<String>> {
    values
        .as_ref()
        .map(|v| serde_json::to_string(v).map_err(|e| StoreError::Serialization(e).into()))
        .transpose()
}

fn from_json(text: Option<String>) -> Result<Option<Vec<serde_json::Value>>> {
    text.map(|t| serde_json::from_str(&t).map_err(|e| StoreError::Serialization(e).into()))
        .transpose()
}

fn snapshot_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<EngagementSnapshot> {
    Ok(EngagementSnapshot {
        post_id: row.get("post_id"),
        likes: row.get::<i64, _>("likes").max(0) as u64,
        reposts: row.get::<i64, _>("reposts").max(0) as u64,
        retrieved_at: row.get("retrieved_at"),
        quotes: from_json(row.get("quotes"))?,
        comments: from_json(row.get("comments"))?,
    })
}

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> CommunityMember {
    CommunityMember {
        user_id: row.get("user_id"),
        handle: row.get("handle"),
        followers: row.get::<i64, _>("followers").max(0) as u64,
        following: row.get::<i64, _>("following").max(0) as u64,
        bio: row.get("bio"),
        location: row.get("location"),
        followed_at: row.get("followed_at"),
    }
}

fn post_from_row(row: &sqlx::sqlite::SqliteRow) -> PostRecord {
    PostRecord {
        post_id: row.get("post_id"),
        prompt: row.get("prompt"),
        content: row.get("content"),
        is_reply: row.get::<i64, _>("is_reply") != 0,
        posted_at: row.get("posted_at"),
    }
}

#[async_trait]
impl PostStore for Database {
    async fn add(&self, record: &PostRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO posts (post_id, prompt, content, is_reply, posted_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.post_id)
        .bind(&record.prompt)
        .bind(&record.content)
        .bind(record.is_reply as i64)
        .bind(record.posted_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    async fn get(&self, post_id: &str) -> Result<Option<PostRecord>> {
        let row = sqlx::query(
            r#"
            SELECT post_id, prompt, content, is_reply, posted_at
            FROM posts WHERE post_id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.as_ref().map(post_from_row))
    }

    async fn all(&self) -> Result<Vec<PostRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT post_id, prompt, content, is_reply, posted_at
            FROM posts ORDER BY posted_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(rows.iter().map(post_from_row).collect())
    }
}

#[async_trait]
impl EngagementStore for Database {
    async fn upsert(&self, snapshot: &EngagementSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO engagement (post_id, likes, reposts, retrieved_at, quotes, comments)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(post_id) DO UPDATE SET
                likes = excluded.likes,
                reposts = excluded.reposts,
                retrieved_at = excluded.retrieved_at,
                quotes = excluded.quotes,
                comments = excluded.comments
            "#,
        )
        .bind(&snapshot.post_id)
        .bind(snapshot.likes as i64)
        .bind(snapshot.reposts as i64)
        .bind(snapshot.retrieved_at)
        .bind(to_json(&snapshot.quotes)?)
        .bind(to_json(&snapshot.comments)?)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    async fn get(&self, post_id: &str) -> Result<Option<EngagementSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT post_id, likes, reposts, retrieved_at, quotes, comments
            FROM engagement WHERE post_id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        row.as_ref().map(snapshot_from_row).transpose()
    }

    async fn all(&self) -> Result<Vec<EngagementSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT post_id, likes, reposts, retrieved_at, quotes, comments
            FROM engagement ORDER BY post_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.iter().map(snapshot_from_row).collect()
    }
}

#[async_trait]
impl CommunityStore for Database {
    async fn upsert(&self, member: &CommunityMember) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO community (user_id, handle, followers, following, bio, location, followed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                handle = excluded.handle,
                followers = excluded.followers,
                following = excluded.following,
                bio = excluded.bio,
                location = excluded.location,
                followed_at = excluded.followed_at
            "#,
        )
        .bind(&member.user_id)
        .bind(&member.handle)
        .bind(member.followers as i64)
        .bind(member.following as i64)
        .bind(&member.bio)
        .bind(&member.location)
        .bind(member.followed_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<CommunityMember>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, handle, followers, following, bio, location, followed_at
            FROM community WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.as_ref().map(member_from_row))
    }

    async fn all(&self) -> Result<Vec<CommunityMember>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, handle, followers, following, bio, location, followed_at
            FROM community ORDER BY handle
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(rows.iter().map(member_from_row).collect())
    }
}

#[async_trait]
impl TokenStore for Database {
    async fn load(&self, account_id: &str) -> Result<Option<TokenRecord>> {
        let row = sqlx::query(
            r#"
            SELECT account_id, access_token, refresh_token, expires_at
            FROM oauth_tokens WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.map(|row| TokenRecord {
            account_id: row.get("account_id"),
            access_token: row.get("access_token"),
            refresh_token: row.get("refresh_token"),
            expires_at: row.get("expires_at"),
        }))
    }

    async fn save(&self, record: &TokenRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_tokens (account_id, access_token, refresh_token, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&record.account_id)
        .bind(&record.access_token)
        .bind(&record.refresh_token)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    async fn delete(&self, account_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM oauth_tokens WHERE account_id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(())
    }
}
