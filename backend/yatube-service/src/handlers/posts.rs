/// Post handlers - listing pages, post detail, create/edit forms and comments
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, Either, HttpRequest, HttpResponse};
use std::time::Duration;
use tracing::{debug, warn};

use super::{insert_page, post_detail_url, profile_url, redirect, viewer_context};
use crate::cache::{index_page_key, CachedPage};
use crate::error::{AppError, Result};
use crate::forms::{CommentForm, FormErrors, PostForm, PostFormInput};
use crate::metrics::PAGE_CACHE_EVENTS;
use crate::middleware::{CurrentUser, LoginRequired};
use crate::models::{Author, PostFilter, User};
use crate::pagination::PageQuery;
use crate::services::{FollowService, PostService};
use crate::state::AppState;
use crate::templates::Templates;

pub const INDEX_TEMPLATE: &str = "posts/index.html";
pub const GROUP_TEMPLATE: &str = "posts/group_list.html";
pub const PROFILE_TEMPLATE: &str = "posts/profile.html";
pub const DETAIL_TEMPLATE: &str = "posts/post_detail.html";
pub const CREATE_TEMPLATE: &str = "posts/create_post.html";

/// Submitted post form body: urlencoded without an image, multipart with one.
pub type PostFormBody = Either<web::Form<PostFormInput>, Multipart>;

pub(crate) fn post_service(state: &AppState) -> PostService {
    PostService::new(
        state.repo.clone(),
        state.config.media.root.clone(),
        state.config.posts.per_page,
    )
}

pub(crate) async fn read_post_form(body: PostFormBody, max_bytes: usize) -> Result<PostForm> {
    match body {
        Either::Left(form) => Ok(form.into_inner().into()),
        Either::Right(multipart) => PostForm::from_multipart(multipart, max_bytes).await,
    }
}

fn full_path(req: &HttpRequest) -> String {
    req.uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.path().to_string())
}

/// Main page: every post, newest first. Served from the page cache when a
/// copy for this URL and viewer is still fresh.
pub async fn index(
    state: web::Data<AppState>,
    req: HttpRequest,
    viewer: CurrentUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let key = index_page_key(&full_path(&req), viewer.id());

    match state.cache.get(&key).await {
        Ok(Some(page)) => {
            PAGE_CACHE_EVENTS.with_label_values(&["hit"]).inc();
            debug!(key = %key, "Index page cache HIT");
            let status = StatusCode::from_u16(page.status).unwrap_or(StatusCode::OK);
            return Ok(HttpResponse::build(status)
                .content_type(page.content_type)
                .body(page.body));
        }
        Ok(None) => {
            PAGE_CACHE_EVENTS.with_label_values(&["miss"]).inc();
            debug!(key = %key, "Index page cache MISS");
        }
        Err(e) => {
            PAGE_CACHE_EVENTS.with_label_values(&["error"]).inc();
            warn!(key = %key, error = %e, "Page cache read failed, rendering uncached");
        }
    }

    let listing = post_service(&state)
        .list_page(PostFilter::All, query.page.as_deref())
        .await?;

    let mut ctx = viewer_context(&req, &viewer);
    ctx.insert("title", "Последние обновления на сайте");
    insert_page(&mut ctx, &listing);

    let body = state.templates.render(INDEX_TEMPLATE, &ctx)?;
    let cached = CachedPage {
        status: StatusCode::OK.as_u16(),
        content_type: mime::TEXT_HTML_UTF_8.to_string(),
        body: body.clone(),
    };
    let ttl = Duration::from_secs(state.config.cache.page_ttl_secs);
    if let Err(e) = state.cache.set(&key, &cached, ttl).await {
        warn!(key = %key, error = %e, "Page cache write failed");
    }

    Ok(Templates::respond(StatusCode::OK, INDEX_TEMPLATE, &ctx, body))
}

/// Posts of one group
pub async fn group_posts(
    state: web::Data<AppState>,
    req: HttpRequest,
    viewer: CurrentUser,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let group = state
        .repo
        .find_group_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("group {}", slug)))?;

    let listing = post_service(&state)
        .list_page(PostFilter::Group(group.id), query.page.as_deref())
        .await?;

    let mut ctx = viewer_context(&req, &viewer);
    ctx.insert("title", &format!("Записи сообщества {}", group.title));
    ctx.insert("group", &group);
    insert_page(&mut ctx, &listing);

    state.templates.page(GROUP_TEMPLATE, &ctx)
}

/// Posts of one author, with a follow button for other users
pub async fn profile(
    state: web::Data<AppState>,
    req: HttpRequest,
    viewer: CurrentUser,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let author = state
        .repo
        .find_user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", username)))?;

    let listing = post_service(&state)
        .list_page(PostFilter::Author(author.id), query.page.as_deref())
        .await?;

    let following = match viewer.id() {
        Some(viewer_id) => {
            FollowService::new(state.repo.clone())
                .is_following(viewer_id, author.id)
                .await?
        }
        None => false,
    };

    let mut ctx = viewer_context(&req, &viewer);
    ctx.insert("title", &format!("Профайл пользователя {}", author.display_name()));
    ctx.insert("author", &Author::from(&author));
    ctx.insert("following", &following);
    ctx.insert("is_own_profile", &(viewer.id() == Some(author.id)));
    ctx.insert("post_count", &listing.paginator.count);
    insert_page(&mut ctx, &listing);

    state.templates.page(PROFILE_TEMPLATE, &ctx)
}

/// A single post with its comments and the comment form
pub async fn post_detail(
    state: web::Data<AppState>,
    req: HttpRequest,
    viewer: CurrentUser,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    let post = state
        .repo
        .find_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

    let post_count = state
        .repo
        .count_posts(PostFilter::Author(post.author.id))
        .await?;
    let comments = state.repo.list_comments(post_id).await?;

    let mut ctx = viewer_context(&req, &viewer);
    ctx.insert("title", &format!("Пост {}", post));
    ctx.insert("post", &post);
    ctx.insert("post_count", &post_count);
    ctx.insert("comments", &comments);
    ctx.insert("form", &CommentForm::default().context(&FormErrors::new()));
    ctx.insert("is_author", &(viewer.id() == Some(post.author.id)));

    state.templates.page(DETAIL_TEMPLATE, &ctx)
}

async fn render_post_form(
    state: &AppState,
    req: &HttpRequest,
    user: &User,
    form: &PostForm,
    errors: &FormErrors,
    edited_post: Option<&crate::models::PostView>,
) -> Result<HttpResponse> {
    let groups = state.repo.list_groups().await?;

    let mut ctx = viewer_context(req, &CurrentUser(Some(user.clone())));
    ctx.insert("form", &form.context(&groups, errors));
    ctx.insert("is_edit", &edited_post.is_some());
    if let Some(post) = edited_post {
        ctx.insert("post", post);
    }

    state.templates.page(CREATE_TEMPLATE, &ctx)
}

pub async fn post_create_form(
    state: web::Data<AppState>,
    req: HttpRequest,
    user: LoginRequired,
) -> Result<HttpResponse> {
    render_post_form(
        &state,
        &req,
        &user.0,
        &PostForm::default(),
        &FormErrors::new(),
        None,
    )
    .await
}

pub async fn post_create(
    state: web::Data<AppState>,
    req: HttpRequest,
    user: LoginRequired,
    body: PostFormBody,
) -> Result<HttpResponse> {
    let form = read_post_form(body, state.config.media.max_upload_bytes).await?;
    let groups = state.repo.list_groups().await?;

    match form.validate(&groups) {
        Ok(clean) => {
            post_service(&state).create_post(user.0.id, clean).await?;
            Ok(redirect(&profile_url(&user.0.username)))
        }
        Err(errors) => render_post_form(&state, &req, &user.0, &form, &errors, None).await,
    }
}

pub async fn post_edit_form(
    state: web::Data<AppState>,
    req: HttpRequest,
    user: LoginRequired,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    let post = state
        .repo
        .find_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

    if post.author.id != user.0.id {
        return Ok(redirect(&post_detail_url(post_id)));
    }

    let form = PostForm::for_post(&post.text, post.group.as_ref().map(|g| g.id));
    render_post_form(&state, &req, &user.0, &form, &FormErrors::new(), Some(&post)).await
}

pub async fn post_edit(
    state: web::Data<AppState>,
    req: HttpRequest,
    user: LoginRequired,
    post_id: web::Path<i64>,
    body: PostFormBody,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    let post = state
        .repo
        .find_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

    if post.author.id != user.0.id {
        return Ok(redirect(&post_detail_url(post_id)));
    }

    let form = read_post_form(body, state.config.media.max_upload_bytes).await?;
    let groups = state.repo.list_groups().await?;

    match form.validate(&groups) {
        Ok(clean) => {
            post_service(&state).update_post(post_id, clean).await?;
            Ok(redirect(&post_detail_url(post_id)))
        }
        Err(errors) => {
            render_post_form(&state, &req, &user.0, &form, &errors, Some(&post)).await
        }
    }
}

/// Add a comment. Invalid comments are dropped; either way the reader lands
/// back on the post.
pub async fn add_comment(
    state: web::Data<AppState>,
    user: LoginRequired,
    post_id: web::Path<i64>,
    form: web::Form<CommentForm>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    if state.repo.find_post(post_id).await?.is_none() {
        return Err(AppError::NotFound(format!("post {}", post_id)));
    }

    match form.validate() {
        Ok(text) => {
            post_service(&state)
                .add_comment(post_id, user.0.id, text)
                .await?;
        }
        Err(errors) => debug!(post_id, ?errors, "Rejected empty comment"),
    }

    Ok(redirect(&post_detail_url(post_id)))
}
