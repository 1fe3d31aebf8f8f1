/// Database access layer
///
/// `Repository` is the seam between handlers and storage. `PgRepository` is the
/// production implementation; `MemoryRepository` enforces the same constraints in
/// process and backs local runs without PostgreSQL and the test suite.
pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

use crate::error::Result;
use crate::models::{
    Comment, CommentView, Follow, Group, NewComment, NewGroup, NewPost, NewUser, Post,
    PostChanges, PostFilter, PostView, User,
};

#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// Create a user; a taken username is an integrity error
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>>;

    /// Create a group; a taken slug is an integrity error
    async fn create_group(&self, group: NewGroup) -> Result<Group>;

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>>;

    async fn find_group(&self, group_id: i64) -> Result<Option<Group>>;

    /// All groups ordered by title
    async fn list_groups(&self) -> Result<Vec<Group>>;

    /// Delete a group, detaching (not deleting) its posts
    async fn delete_group(&self, group_id: i64) -> Result<bool>;

    async fn create_post(&self, post: NewPost) -> Result<Post>;

    async fn find_post(&self, post_id: i64) -> Result<Option<PostView>>;

    async fn update_post(&self, post_id: i64, changes: PostChanges) -> Result<bool>;

    /// Delete a post together with its comments
    async fn delete_post(&self, post_id: i64) -> Result<bool>;

    async fn count_posts(&self, filter: PostFilter) -> Result<i64>;

    /// Posts newest first
    async fn list_posts(&self, filter: PostFilter, limit: i64, offset: i64)
        -> Result<Vec<PostView>>;

    async fn create_comment(&self, comment: NewComment) -> Result<Comment>;

    /// Comments of a post, oldest first
    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentView>>;

    /// Insert a follow edge. Duplicate pairs and self-follows are integrity errors.
    async fn create_follow(&self, user_id: i64, author_id: i64) -> Result<Follow>;

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool>;

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Ensure the edge exists. Returns `true` when it was created by this call;
    /// a concurrent insert of the same pair counts as already present.
    async fn get_or_create_follow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        if self.is_following(user_id, author_id).await? {
            return Ok(false);
        }
        match self.create_follow(user_id, author_id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_integrity() && user_id != author_id => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
