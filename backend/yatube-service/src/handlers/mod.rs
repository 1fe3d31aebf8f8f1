/// HTTP handlers
///
/// Page handlers render Tera templates. Every page context starts from
/// [`base_context`], which carries the logged in user for the site header.
pub mod about;
pub mod auth;
pub mod follow;
pub mod health;
pub mod media;
pub mod posts;

use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse};
use serde_json::json;
use tera::Context;

use crate::middleware::CurrentUser;
use crate::models::Author;
use crate::services::posts::PostPage;

pub fn base_context(req: &HttpRequest, viewer: Option<&crate::models::User>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("user", &viewer.map(Author::from));
    ctx.insert("request_path", req.path());
    ctx
}

pub fn viewer_context(req: &HttpRequest, viewer: &CurrentUser) -> Context {
    base_context(req, viewer.user())
}

/// Insert `page_obj` and `paginator` for a post listing.
pub fn insert_page(ctx: &mut Context, listing: &PostPage) {
    ctx.insert("page_obj", &listing.page.to_context(&listing.posts));
    ctx.insert(
        "paginator",
        &json!({
            "count": listing.paginator.count,
            "num_pages": listing.paginator.num_pages,
            "per_page": listing.paginator.per_page,
        }),
    );
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.to_string()))
        .finish()
}

pub fn post_detail_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}
