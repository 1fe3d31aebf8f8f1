//! Shared setup for the HTTP tests
//!
//! Builds the full application over the in-memory repository and page cache,
//! with uploads written to a temporary media root.

#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web, App, Error};
use std::sync::Arc;
use tempfile::TempDir;

use yatube_service::cache::MemoryPageCache;
use yatube_service::config::default_templates_dir;
use yatube_service::db::MemoryRepository;
use yatube_service::models::{Group, NewGroup, NewPost, NewUser, Post, User};
use yatube_service::security::session::session_cookie;
use yatube_service::security::{hash_password, issue_session_token};
use yatube_service::templates::{RenderedPage, Templates};
use yatube_service::{routes, AppState, Config};

pub const PASSWORD: &str = "Kd83-pw!long";

/// 2x1 GIF
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

pub struct TestContext {
    pub state: AppState,
    pub media_root: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let media_root = tempfile::tempdir().expect("media root");
        let config = Config::for_memory_backends(media_root.path().to_path_buf());
        let templates = Templates::load(&default_templates_dir()).expect("templates");
        let state = AppState::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryPageCache::new()),
            templates,
            config,
        );
        Self { state, media_root }
    }

    pub async fn app(
        &self,
    ) -> impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = Error>
    {
        let max_upload_bytes = self.state.config.media.max_upload_bytes;
        test::init_service(
            App::new()
                .app_data(web::Data::new(self.state.clone()))
                .app_data(web::PayloadConfig::new(max_upload_bytes))
                .app_data(web::FormConfig::default().limit(max_upload_bytes))
                .wrap(routes::error_handlers())
                .configure(routes::configure)
                .default_service(web::to(routes::not_found)),
        )
        .await
    }

    pub async fn create_user(&self, username: &str) -> User {
        self.state
            .repo
            .create_user(NewUser {
                username: username.to_string(),
                password_hash: hash_password(PASSWORD).expect("hash"),
                first_name: String::new(),
                last_name: String::new(),
            })
            .await
            .expect("create user")
    }

    pub async fn create_group(&self, slug: &str, title: &str) -> Group {
        self.state
            .repo
            .create_group(NewGroup {
                title: title.to_string(),
                slug: slug.to_string(),
                description: "Тестовое описание".to_string(),
            })
            .await
            .expect("create group")
    }

    pub async fn create_post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        self.state
            .repo
            .create_post(NewPost {
                author_id: author.id,
                text: text.to_string(),
                group_id: group.map(|g| g.id),
                image: None,
            })
            .await
            .expect("create post")
    }

    /// Session cookie that logs `user` in.
    pub fn login_cookie(&self, user: &User) -> Cookie<'static> {
        let token = issue_session_token(&self.state.config.auth, user).expect("token");
        session_cookie(&self.state.config.auth, token)
    }

    pub async fn clear_cache(&self) {
        self.state.cache.clear().await.expect("clear cache");
    }
}

pub fn rendered<B>(resp: &ServiceResponse<B>) -> Option<RenderedPage> {
    resp.response().extensions().get::<RenderedPage>().cloned()
}

pub fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(actix_web::http::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Text of every post in the rendered `page_obj`.
pub fn page_texts(page: &RenderedPage) -> Vec<String> {
    page.context["page_obj"]["object_list"]
        .as_array()
        .map(|posts| {
            posts
                .iter()
                .filter_map(|p| p["text"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// `multipart/form-data` body with text fields and an optional file.
pub fn multipart_body(
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> (String, Vec<u8>) {
    let boundary = format!("----yatube-test-{}", uuid::Uuid::new_v4().simple());
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((name, filename, bytes)) = file {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/gif\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    (format!("multipart/form-data; boundary={}", boundary), body)
}
