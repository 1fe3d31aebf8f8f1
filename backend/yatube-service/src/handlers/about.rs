use actix_web::{web, HttpRequest, HttpResponse};

use super::viewer_context;
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub const AUTHOR_TEMPLATE: &str = "about/author.html";
pub const TECH_TEMPLATE: &str = "about/tech.html";

pub async fn author(
    state: web::Data<AppState>,
    req: HttpRequest,
    viewer: CurrentUser,
) -> Result<HttpResponse> {
    let mut ctx = viewer_context(&req, &viewer);
    ctx.insert("title", "Об авторе");
    state.templates.page(AUTHOR_TEMPLATE, &ctx)
}

pub async fn tech(
    state: web::Data<AppState>,
    req: HttpRequest,
    viewer: CurrentUser,
) -> Result<HttpResponse> {
    let mut ctx = viewer_context(&req, &viewer);
    ctx.insert("title", "Технологии");
    state.templates.page(TECH_TEMPLATE, &ctx)
}
