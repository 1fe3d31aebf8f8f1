/// Data models for Yatube
///
/// Row types mirror the database tables. `PostView` and `CommentView` are the read
/// models handed to templates, with the author (and group) already joined in.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters of post text shown where a post is named.
pub const POST_TITLE_CHARS: usize = 15;
/// Characters of comment text shown where a comment is named.
pub const COMMENT_TITLE_CHARS: usize = 20;

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Human-facing metadata of a model field, shown next to form inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldMeta {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
}

const fn field(name: &'static str, label: &'static str, help_text: &'static str) -> FieldMeta {
    FieldMeta {
        name,
        label,
        help_text,
    }
}

fn find_field(fields: &'static [FieldMeta], name: &str) -> Option<&'static FieldMeta> {
    fields.iter().find(|f| f.name == name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// Full name, or the username when no name was given.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub group_id: Option<i64>,
    /// Path relative to the media root
    pub image: Option<String>,
}

impl Post {
    pub const FIELDS: &'static [FieldMeta] = &[
        field("text", "Текст поста", "Введите текст поста"),
        field("pub_date", "Дата публикации", ""),
        field("author", "Автор", ""),
        field("group", "Группа", "Выберите группу"),
        field("image", "Картинка", ""),
    ];

    pub fn field(name: &str) -> Option<&'static FieldMeta> {
        find_field(Self::FIELDS, name)
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&truncate_chars(&self.text, POST_TITLE_CHARS))
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// Changes applied by the edit form. `image: None` keeps the current image.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// Author as shown next to posts and comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub username: String,
    pub full_name: String,
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Author {
            id: user.id,
            username: user.username.clone(),
            full_name: user.display_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

impl From<&Group> for GroupRef {
    fn from(group: &Group) -> Self {
        GroupRef {
            id: group.id,
            title: group.title.clone(),
            slug: group.slug.clone(),
        }
    }
}

/// A post with its author and group joined in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub image: Option<String>,
    pub author: Author,
    pub group: Option<GroupRef>,
}

impl fmt::Display for PostView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&truncate_chars(&self.text, POST_TITLE_CHARS))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub created: DateTime<Utc>,
}

impl Comment {
    pub const FIELDS: &'static [FieldMeta] = &[
        field("post", "Пост", ""),
        field("text", "Текст комментария", "Введите текст комментария"),
        field("created", "Дата и время публикации", ""),
        field("author", "Автор", ""),
    ];

    pub fn field(name: &str) -> Option<&'static FieldMeta> {
        find_field(Self::FIELDS, name)
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&truncate_chars(&self.text, COMMENT_TITLE_CHARS))
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub text: String,
    pub created: DateTime<Utc>,
    pub author: Author,
}

/// `user_id` follows `author_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follow {
    pub id: i64,
    pub user_id: i64,
    pub author_id: i64,
}

/// Which posts a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows
    FollowedBy(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post(text: &str) -> Post {
        Post {
            id: 1,
            text: text.to_string(),
            pub_date: Utc::now(),
            author_id: 1,
            group_id: None,
            image: None,
        }
    }

    #[test]
    fn test_display_truncates_by_chars() {
        let post = sample_post("Тестовый текст длиннее пятнадцати символов");
        assert_eq!(post.to_string(), "Тестовый текст ");
        assert_eq!(post.to_string().chars().count(), POST_TITLE_CHARS);

        let short = sample_post("Коротко");
        assert_eq!(short.to_string(), "Коротко");
    }

    #[test]
    fn test_comment_and_group_display() {
        let comment = Comment {
            id: 1,
            post_id: 1,
            author_id: 1,
            text: "Комментарий, который точно длиннее двадцати символов".to_string(),
            created: Utc::now(),
        };
        assert_eq!(comment.to_string(), "Комментарий, который");
        assert_eq!(comment.to_string().chars().count(), COMMENT_TITLE_CHARS);

        let group = Group {
            id: 1,
            title: "Тестовая группа".to_string(),
            slug: "test-slug".to_string(),
            description: String::new(),
        };
        assert_eq!(group.to_string(), "Тестовая группа");
    }

    #[test]
    fn test_field_lookup() {
        assert_eq!(Post::field("group").unwrap().help_text, "Выберите группу");
        assert_eq!(Comment::field("created").unwrap().label, "Дата и время публикации");
        assert!(Post::field("likes").is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let mut user = User {
            id: 1,
            username: "leo".to_string(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            date_joined: Utc::now(),
        };
        assert_eq!(user.display_name(), "leo");

        user.first_name = "Лев".to_string();
        user.last_name = "Толстой".to_string();
        assert_eq!(user.display_name(), "Лев Толстой");
    }
}
