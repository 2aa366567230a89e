//! Engagement collection for posts the agent published

use std::sync::Arc;

use crate::error::Result;
use crate::platforms::Platform;
use crate::store::{EngagementStore, PostStore};
use crate::types::{now_timestamp, EngagementSnapshot};

/// Counts from one collection run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub tracked: usize,
    pub updated: usize,
    pub failed: usize,
}

pub struct EngagementCollector {
    platform: Arc<dyn Platform>,
    posts: Arc<dyn PostStore>,
    engagement: Arc<dyn EngagementStore>,
}

impl EngagementCollector {
    pub fn new(
        platform: Arc<dyn Platform>,
        posts: Arc<dyn PostStore>,
        engagement: Arc<dyn EngagementStore>,
    ) -> Self {
        Self {
            platform,
            posts,
            engagement,
        }
    }

    /// Take a fresh snapshot of one post
    ///
    /// Quotes and comments are best effort; an empty or failed lookup is
    /// stored as `None`.
    pub async fn snapshot(&self, post_id: &str) -> Result<EngagementSnapshot> {
        let metrics = self.platform.get_engagement_metrics(post_id).await?;

        let quotes = match self.platform.get_quotes(post_id).await {
            Ok(quotes) if !quotes.is_empty() => Some(quotes),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(post_id, error = %e, "Could not fetch quotes");
                None
            }
        };
        let comments = match self.platform.get_comments(post_id).await {
            Ok(comments) if !comments.is_empty() => Some(comments),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(post_id, error = %e, "Could not fetch comments");
                None
            }
        };

        Ok(EngagementSnapshot {
            post_id: post_id.to_string(),
            likes: metrics.get("like_count").copied().unwrap_or(0),
            reposts: metrics.get("retweet_count").copied().unwrap_or(0),
            retrieved_at: now_timestamp(),
            quotes,
            comments,
        })
    }

    /// Refresh snapshots for every post in the post store
    ///
    /// One post failing does not stop the run.
    pub async fn collect(&self) -> Result<CollectionSummary> {
        let records = self.posts.all().await?;
        let mut summary = CollectionSummary {
            tracked: records.len(),
            ..Default::default()
        };

        for record in &records {
            let snapshot = match self.snapshot(&record.post_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::error!(post_id = %record.post_id, error = %e, "Engagement lookup failed");
                    summary.failed += 1;
                    continue;
                }
            };
            match self.engagement.upsert(&snapshot).await {
                Ok(()) => summary.updated += 1,
                Err(e) => {
                    tracing::error!(post_id = %record.post_id, error = %e, "Failed to store engagement");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            tracked = summary.tracked,
            updated = summary.updated,
            failed = summary.failed,
            "Engagement collection finished"
        );
        Ok(summary)
    }
}
