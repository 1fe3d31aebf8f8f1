use super::Repository;
use crate::error::{AppError, Result};
use crate::models::{
    Author, Comment, CommentView, Follow, Group, GroupRef, NewComment, NewGroup, NewPost,
    NewUser, Post, PostChanges, PostFilter, PostView, User,
};
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    users: BTreeMap<i64, User>,
    groups: BTreeMap<i64, Group>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    follows: BTreeMap<i64, Follow>,
    next_user_id: i64,
    next_group_id: i64,
    next_post_id: i64,
    next_comment_id: i64,
    next_follow_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl State {
    fn post_view(&self, post: &Post) -> Result<PostView> {
        let author = self.users.get(&post.author_id).ok_or_else(|| {
            AppError::Internal(format!("post {} has no author {}", post.id, post.author_id))
        })?;
        let group = post
            .group_id
            .and_then(|id| self.groups.get(&id))
            .map(GroupRef::from);

        Ok(PostView {
            id: post.id,
            text: post.text.clone(),
            pub_date: post.pub_date,
            image: post.image.clone(),
            author: Author::from(author),
            group,
        })
    }

    fn matches(&self, post: &Post, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => post.group_id == Some(group_id),
            PostFilter::Author(author_id) => post.author_id == author_id,
            PostFilter::FollowedBy(user_id) => self
                .follows
                .values()
                .any(|f| f.user_id == user_id && f.author_id == post.author_id),
        }
    }

    /// Matching posts, newest first
    fn filtered(&self, filter: PostFilter) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self
            .posts
            .values()
            .filter(|p| self.matches(p, filter))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }
}

/// In-process repository holding every table in memory.
///
/// Enforces the same constraints as the PostgreSQL schema: unique usernames and
/// group slugs, unique follow pairs, no self-follows, existing foreign keys.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Integrity(format!(
                "username {} already exists",
                user.username
            )));
        }

        let id = next_id(&mut state.next_user_id);
        let created = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            date_joined: Utc::now(),
        };
        state.users.insert(id, created.clone());
        Ok(created)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn create_group(&self, group: NewGroup) -> Result<Group> {
        let mut state = self.state.write().await;
        if state.groups.values().any(|g| g.slug == group.slug) {
            return Err(AppError::Integrity(format!(
                "group slug {} already exists",
                group.slug
            )));
        }

        let id = next_id(&mut state.next_group_id);
        let created = Group {
            id,
            title: group.title,
            slug: group.slug,
            description: group.description,
        };
        state.groups.insert(id, created.clone());
        Ok(created)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let state = self.state.read().await;
        Ok(state.groups.values().find(|g| g.slug == slug).cloned())
    }

    async fn find_group(&self, group_id: i64) -> Result<Option<Group>> {
        let state = self.state.read().await;
        Ok(state.groups.get(&group_id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let state = self.state.read().await;
        let mut groups: Vec<Group> = state.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn delete_group(&self, group_id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.groups.remove(&group_id).is_none() {
            return Ok(false);
        }
        for post in state.posts.values_mut() {
            if post.group_id == Some(group_id) {
                post.group_id = None;
            }
        }
        Ok(true)
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&post.author_id) {
            return Err(AppError::Integrity(format!(
                "author {} does not exist",
                post.author_id
            )));
        }
        if let Some(group_id) = post.group_id {
            if !state.groups.contains_key(&group_id) {
                return Err(AppError::Integrity(format!(
                    "group {} does not exist",
                    group_id
                )));
            }
        }

        // pub_date never goes backwards, even if the wall clock does
        let now = Utc::now();
        let pub_date = state
            .posts
            .values()
            .map(|p| p.pub_date)
            .max()
            .map_or(now, |latest| latest.max(now));

        let id = next_id(&mut state.next_post_id);
        let created = Post {
            id,
            text: post.text,
            pub_date,
            author_id: post.author_id,
            group_id: post.group_id,
            image: post.image,
        };
        state.posts.insert(id, created.clone());
        Ok(created)
    }

    async fn find_post(&self, post_id: i64) -> Result<Option<PostView>> {
        let state = self.state.read().await;
        state
            .posts
            .get(&post_id)
            .map(|post| state.post_view(post))
            .transpose()
    }

    async fn update_post(&self, post_id: i64, changes: PostChanges) -> Result<bool> {
        let mut state = self.state.write().await;
        if let Some(group_id) = changes.group_id {
            if !state.groups.contains_key(&group_id) {
                return Err(AppError::Integrity(format!(
                    "group {} does not exist",
                    group_id
                )));
            }
        }

        let Some(post) = state.posts.get_mut(&post_id) else {
            return Ok(false);
        };
        post.text = changes.text;
        post.group_id = changes.group_id;
        if changes.image.is_some() {
            post.image = changes.image;
        }
        Ok(true)
    }

    async fn delete_post(&self, post_id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.posts.remove(&post_id).is_none() {
            return Ok(false);
        }
        state.comments.retain(|_, c| c.post_id != post_id);
        Ok(true)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<i64> {
        let state = self.state.read().await;
        let count = state
            .posts
            .values()
            .filter(|p| state.matches(p, filter))
            .count();
        Ok(count as i64)
    }

    async fn list_posts(
        &self,
        filter: PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostView>> {
        let state = self.state.read().await;
        state
            .filtered(filter)
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|post| state.post_view(post))
            .collect()
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&comment.post_id) {
            return Err(AppError::Integrity(format!(
                "post {} does not exist",
                comment.post_id
            )));
        }
        if !state.users.contains_key(&comment.author_id) {
            return Err(AppError::Integrity(format!(
                "author {} does not exist",
                comment.author_id
            )));
        }

        let id = next_id(&mut state.next_comment_id);
        let created = Comment {
            id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            text: comment.text,
            created: Utc::now(),
        };
        state.comments.insert(id, created.clone());
        Ok(created)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentView>> {
        let state = self.state.read().await;
        // BTreeMap iteration is id order, which is creation order
        state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .map(|c| {
                let author = state.users.get(&c.author_id).ok_or_else(|| {
                    AppError::Internal(format!("comment {} has no author", c.id))
                })?;
                Ok(CommentView {
                    id: c.id,
                    post_id: c.post_id,
                    text: c.text.clone(),
                    created: c.created,
                    author: Author::from(author),
                })
            })
            .collect()
    }

    async fn create_follow(&self, user_id: i64, author_id: i64) -> Result<Follow> {
        let mut state = self.state.write().await;
        if user_id == author_id {
            return Err(AppError::Integrity(
                "follows_no_self_follow: user cannot follow themselves".to_string(),
            ));
        }
        if !state.users.contains_key(&user_id) || !state.users.contains_key(&author_id) {
            return Err(AppError::Integrity(format!(
                "follow references missing user ({} -> {})",
                user_id, author_id
            )));
        }
        if state
            .follows
            .values()
            .any(|f| f.user_id == user_id && f.author_id == author_id)
        {
            return Err(AppError::Integrity(format!(
                "follows_unique_pair: {} already follows {}",
                user_id, author_id
            )));
        }

        let id = next_id(&mut state.next_follow_id);
        let follow = Follow {
            id,
            user_id,
            author_id,
        };
        state.follows.insert(id, follow.clone());
        Ok(follow)
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.follows.len();
        state
            .follows
            .retain(|_, f| !(f.user_id == user_id && f.author_id == author_id));
        Ok(state.follows.len() < before)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .values()
            .any(|f| f.user_id == user_id && f.author_id == author_id))
    }
}
