use std::sync::Arc;
use tracing::info;

use crate::db::Repository;
use crate::error::Result;
use crate::metrics::FOLLOW_CHANGES_TOTAL;

/// Follow and unfollow on behalf of the logged in user.
#[derive(Clone)]
pub struct FollowService {
    repo: Arc<dyn Repository>,
}

impl FollowService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Idempotent follow; returns true if a new edge was created.
    /// Following yourself is silently ignored.
    pub async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        if user_id == author_id {
            return Ok(false);
        }

        let created = self.repo.get_or_create_follow(user_id, author_id).await?;
        if created {
            FOLLOW_CHANGES_TOTAL.with_label_values(&["follow"]).inc();
            info!(user_id, author_id, "User followed author");
        }
        Ok(created)
    }

    /// Idempotent unfollow; returns true if an edge was removed.
    pub async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let removed = self.repo.delete_follow(user_id, author_id).await?;
        if removed {
            FOLLOW_CHANGES_TOTAL.with_label_values(&["unfollow"]).inc();
            info!(user_id, author_id, "User unfollowed author");
        }
        Ok(removed)
    }

    pub async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool> {
        if user_id == author_id {
            return Ok(false);
        }
        self.repo.is_following(user_id, author_id).await
    }
}
