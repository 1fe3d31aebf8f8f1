/// Route table and the 404 page
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::{web, HttpRequest, HttpResponse};
use tracing::warn;

use crate::error::Result;
use crate::handlers::{self, about, auth, follow, health, media, posts};
use crate::metrics::serve_metrics;
use crate::middleware::CurrentUser;
use crate::state::AppState;
use crate::templates::RenderedPage;

pub const NOT_FOUND_TEMPLATE: &str = "core/404.html";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(posts::index))
        .route("/group/{slug}/", web::get().to(posts::group_posts))
        .route("/profile/{username}/", web::get().to(posts::profile))
        .route(
            "/profile/{username}/follow/",
            web::get().to(follow::profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            web::get().to(follow::profile_unfollow),
        )
        .route("/posts/{post_id}/", web::get().to(posts::post_detail))
        .service(
            web::resource("/posts/{post_id}/edit/")
                .route(web::get().to(posts::post_edit_form))
                .route(web::post().to(posts::post_edit)),
        )
        .route(
            "/posts/{post_id}/comment/",
            web::post().to(posts::add_comment),
        )
        .service(
            web::resource("/create/")
                .route(web::get().to(posts::post_create_form))
                .route(web::post().to(posts::post_create)),
        )
        .route("/follow/", web::get().to(follow::follow_index))
        .route("/about/author/", web::get().to(about::author))
        .route("/about/tech/", web::get().to(about::tech))
        .service(
            web::resource("/auth/login/")
                .route(web::get().to(auth::login_form))
                .route(web::post().to(auth::login)),
        )
        .service(
            web::resource("/auth/signup/")
                .route(web::get().to(auth::signup_form))
                .route(web::post().to(auth::signup)),
        )
        .route("/auth/logout/", web::get().to(auth::logout))
        .route("/media/{path:.*}", web::get().to(media::serve_media))
        .route("/health", web::get().to(health::health))
        .route("/health/ready", web::get().to(health::readiness))
        .route("/metrics", web::get().to(serve_metrics));
}

/// Fallback for unmatched routes
pub async fn not_found(
    state: web::Data<AppState>,
    req: HttpRequest,
    viewer: CurrentUser,
) -> Result<HttpResponse> {
    let mut ctx = handlers::viewer_context(&req, &viewer);
    ctx.insert("path", req.path());
    state
        .templates
        .render_response(StatusCode::NOT_FOUND, NOT_FOUND_TEMPLATE, &ctx)
}

/// Replace bare 404 responses (missing objects, bad path parameters) with the
/// site's 404 page.
pub fn error_handlers<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new().handler(StatusCode::NOT_FOUND, render_not_found)
}

fn render_not_found<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let already_rendered = res.response().extensions().get::<RenderedPage>().is_some();
    if already_rendered {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }

    let Some(state) = res.request().app_data::<web::Data<AppState>>().cloned() else {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    };

    let mut ctx = handlers::base_context(res.request(), None);
    ctx.insert("path", res.request().path());

    match state
        .templates
        .render_response(StatusCode::NOT_FOUND, NOT_FOUND_TEMPLATE, &ctx)
    {
        Ok(page) => {
            let (req, _) = res.into_parts();
            Ok(ErrorHandlerResponse::Response(
                ServiceResponse::new(req, page).map_into_right_body(),
            ))
        }
        Err(e) => {
            warn!(error = %e, "Failed to render 404 page");
            Ok(ErrorHandlerResponse::Response(res.map_into_left_body()))
        }
    }
}
