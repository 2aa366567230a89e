//! Follow bootstrap for a fresh account

use crate::platforms::Platform;
use crate::store::CommunityStore;
use crate::types::{now_timestamp, CommunityMember};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowStatus {
    Followed { user_id: String },
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowOutcome {
    pub handle: String,
    pub status: FollowStatus,
}

/// Resolve and follow each handle in order, recording followed users
///
/// Every handle gets an outcome; one failure never stops the rest. A user
/// that was followed but could not be recorded still counts as followed.
pub async fn follow_accounts(
    platform: &dyn Platform,
    community: &dyn CommunityStore,
    handles: &[String],
) -> Vec<FollowOutcome> {
    let mut outcomes = Vec::with_capacity(handles.len());

    for handle in handles {
        let status = match platform.get_user_by_username(handle).await {
            Ok(Some(user)) => match platform.follow_user(&user.id).await {
                Ok(_) => {
                    let member = CommunityMember::from_user(&user, now_timestamp());
                    if let Err(e) = community.upsert(&member).await {
                        tracing::error!(%handle, error = %e, "Failed to record community member");
                    }
                    FollowStatus::Followed { user_id: user.id }
                }
                Err(e) => FollowStatus::Failed(e.to_string()),
            },
            Ok(None) => FollowStatus::NotFound,
            Err(e) => FollowStatus::Failed(e.to_string()),
        };

        match &status {
            FollowStatus::Followed { user_id } => tracing::info!(%handle, %user_id, "Followed"),
            FollowStatus::NotFound => tracing::warn!(%handle, "No such user"),
            FollowStatus::Failed(reason) => tracing::error!(%handle, %reason, "Follow failed"),
        }
        outcomes.push(FollowOutcome {
            handle: handle.clone(),
            status,
        });
    }

    outcomes
}
