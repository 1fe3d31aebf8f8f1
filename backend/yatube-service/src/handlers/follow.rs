/// Follow handlers - subscription feed and follow/unfollow links
use actix_web::{web, HttpRequest, HttpResponse};

use super::posts::post_service;
use super::{base_context, insert_page, profile_url, redirect};
use crate::error::{AppError, Result};
use crate::middleware::LoginRequired;
use crate::models::{PostFilter, User};
use crate::pagination::PageQuery;
use crate::services::FollowService;
use crate::state::AppState;

pub const FOLLOW_TEMPLATE: &str = "posts/follow.html";

async fn find_author(state: &AppState, username: &str) -> Result<User> {
    state
        .repo
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", username)))
}

/// Posts by every author the user follows
pub async fn follow_index(
    state: web::Data<AppState>,
    req: HttpRequest,
    user: LoginRequired,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let listing = post_service(&state)
        .list_page(PostFilter::FollowedBy(user.0.id), query.page.as_deref())
        .await?;

    let mut ctx = base_context(&req, Some(&user.0));
    ctx.insert("title", "Избранные авторы");
    insert_page(&mut ctx, &listing);

    state.templates.page(FOLLOW_TEMPLATE, &ctx)
}

pub async fn profile_follow(
    state: web::Data<AppState>,
    user: LoginRequired,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    let author = find_author(&state, &username).await?;
    FollowService::new(state.repo.clone())
        .follow(user.0.id, author.id)
        .await?;

    Ok(redirect(&profile_url(&author.username)))
}

pub async fn profile_unfollow(
    state: web::Data<AppState>,
    user: LoginRequired,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    let author = find_author(&state, &username).await?;
    FollowService::new(state.repo.clone())
        .unfollow(user.0.id, author.id)
        .await?;

    Ok(redirect(&profile_url(&author.username)))
}
