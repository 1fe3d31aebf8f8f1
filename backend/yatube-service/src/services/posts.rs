/// Post service - listing, creating and editing posts and comments
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::Repository;
use crate::error::Result;
use crate::forms::{save_post_image, CleanPost};
use crate::metrics::{COMMENTS_CREATED_TOTAL, POSTS_CREATED_TOTAL, POSTS_EDITED_TOTAL};
use crate::models::{Comment, NewComment, NewPost, Post, PostChanges, PostFilter, PostView};
use crate::pagination::{Page, Paginator};

/// One page of a post listing
pub struct PostPage {
    pub paginator: Paginator,
    pub page: Page,
    pub posts: Vec<PostView>,
}

#[derive(Clone)]
pub struct PostService {
    repo: Arc<dyn Repository>,
    media_root: PathBuf,
    per_page: i64,
}

impl PostService {
    pub fn new(repo: Arc<dyn Repository>, media_root: PathBuf, per_page: usize) -> Self {
        Self {
            repo,
            media_root,
            per_page: per_page as i64,
        }
    }

    /// Posts matching `filter`, newest first, paged by the raw `?page=` value.
    pub async fn list_page(&self, filter: PostFilter, raw_page: Option<&str>) -> Result<PostPage> {
        let count = self.repo.count_posts(filter).await?;
        let paginator = Paginator::new(count, self.per_page);
        let page = paginator.page(raw_page);

        let posts = if count == 0 {
            Vec::new()
        } else {
            self.repo
                .list_posts(filter, page.limit(), page.offset())
                .await?
        };

        Ok(PostPage {
            paginator,
            page,
            posts,
        })
    }

    /// Create a post from a valid form, storing its image first.
    pub async fn create_post(&self, author_id: i64, form: CleanPost) -> Result<Post> {
        let image = match &form.image {
            Some(image) => Some(save_post_image(&self.media_root, image).await?),
            None => None,
        };

        let result = self
            .repo
            .create_post(NewPost {
                author_id,
                text: form.text,
                group_id: form.group_id,
                image: image.clone(),
            })
            .await;
        let post = match result {
            Ok(post) => post,
            Err(e) => {
                self.discard_image(image.as_deref()).await;
                return Err(e);
            }
        };

        POSTS_CREATED_TOTAL.inc();
        info!(post_id = post.id, author_id, group_id = ?post.group_id, "Post created");
        Ok(post)
    }

    /// Apply a valid edit form. A missing image keeps the current one.
    pub async fn update_post(&self, post_id: i64, form: CleanPost) -> Result<bool> {
        let image = match &form.image {
            Some(image) => Some(save_post_image(&self.media_root, image).await?),
            None => None,
        };

        let result = self
            .repo
            .update_post(
                post_id,
                PostChanges {
                    text: form.text,
                    group_id: form.group_id,
                    image: image.clone(),
                },
            )
            .await;
        let updated = match result {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_image(image.as_deref()).await;
                return Err(e);
            }
        };

        if !updated {
            self.discard_image(image.as_deref()).await;
        } else {
            POSTS_EDITED_TOTAL.inc();
            info!(post_id, "Post updated");
        }
        Ok(updated)
    }

    // Removes an image stored for a write that did not land.
    async fn discard_image(&self, image: Option<&str>) {
        let Some(relative) = image else { return };
        match tokio::fs::remove_file(self.media_root.join(relative)).await {
            Ok(()) => info!(path = %relative, "Removed unused post image"),
            Err(e) => warn!(path = %relative, error = %e, "Failed to remove unused post image"),
        }
    }

    pub async fn add_comment(&self, post_id: i64, author_id: i64, text: String) -> Result<Comment> {
        let comment = self
            .repo
            .create_comment(NewComment {
                post_id,
                author_id,
                text,
            })
            .await?;

        COMMENTS_CREATED_TOTAL.inc();
        info!(comment_id = comment.id, post_id, author_id, "Comment created");
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRepository;
    use crate::error::AppError;
    use crate::forms::ValidImage;
    use crate::models::NewUser;
    use std::path::Path;

    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    fn form_with_image(group_id: Option<i64>) -> CleanPost {
        CleanPost {
            text: "Пост с картинкой".to_string(),
            group_id,
            image: Some(ValidImage {
                bytes: SMALL_GIF.to_vec(),
                format: image::ImageFormat::Gif,
            }),
        }
    }

    fn stored_images(media_root: &Path) -> usize {
        std::fs::read_dir(media_root.join("posts"))
            .map(|dir| dir.count())
            .unwrap_or(0)
    }

    async fn service() -> (PostService, Arc<MemoryRepository>, tempfile::TempDir) {
        let media = tempfile::tempdir().unwrap();
        let repo = Arc::new(MemoryRepository::new());
        let service = PostService::new(repo.clone(), media.path().to_path_buf(), 10);
        (service, repo, media)
    }

    async fn author(repo: &MemoryRepository) -> i64 {
        repo.create_user(NewUser {
            username: "auth".to_string(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
        })
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_create_keeps_image_on_success() {
        let (service, repo, media) = service().await;
        let author_id = author(&repo).await;

        let post = service
            .create_post(author_id, form_with_image(None))
            .await
            .unwrap();

        let image = post.image.expect("stored image");
        assert!(media.path().join(image).is_file());
        assert_eq!(stored_images(media.path()), 1);
    }

    #[tokio::test]
    async fn test_failed_create_removes_image() {
        let (service, _repo, media) = service().await;

        let err = service
            .create_post(9999, form_with_image(None))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Integrity(_)));
        assert_eq!(stored_images(media.path()), 0);
    }

    #[tokio::test]
    async fn test_failed_update_removes_image() {
        let (service, repo, media) = service().await;
        let author_id = author(&repo).await;
        let post = service
            .create_post(
                author_id,
                CleanPost {
                    text: "Без картинки".to_string(),
                    group_id: None,
                    image: None,
                },
            )
            .await
            .unwrap();

        assert!(!service
            .update_post(post.id + 100, form_with_image(None))
            .await
            .unwrap());
        assert!(service
            .update_post(post.id, form_with_image(Some(4242)))
            .await
            .is_err());
        assert_eq!(stored_images(media.path()), 0);

        assert!(service
            .update_post(post.id, form_with_image(None))
            .await
            .unwrap());
        assert_eq!(stored_images(media.path()), 1);
    }
}
