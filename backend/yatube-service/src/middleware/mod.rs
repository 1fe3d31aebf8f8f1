/// Request extractors for the logged in user
///
/// `CurrentUser` resolves the session cookie to a user, or to nobody when the
/// cookie is missing, invalid, expired or names a deleted user.
/// `LoginRequired` additionally redirects anonymous visitors to the login page.
use actix_web::dev::Payload;
use actix_web::error::InternalError;
use actix_web::http::header;
use actix_web::{web, Error, FromRequest, HttpRequest, HttpResponse};
use futures_util::future::LocalBoxFuture;
use tracing::debug;

use crate::error::AppError;
use crate::models::User;
use crate::security::validate_session_token;
use crate::state::AppState;

pub const LOGIN_URL: &str = "/auth/login/";

/// The logged in user, if any.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

impl CurrentUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }

    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// A logged in user; anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct LoginRequired(pub User);

/// `/auth/login/?next=<path>` for the given path and query.
pub fn login_redirect_url(next: &str) -> String {
    let encoded = urlencoding::encode(next).replace("%2F", "/");
    format!("{}?next={}", LOGIN_URL, encoded)
}

fn full_path(req: &HttpRequest) -> String {
    req.uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.path().to_string())
}

async fn resolve_user(req: HttpRequest) -> Result<Option<User>, AppError> {
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        return Err(AppError::Internal("application state missing".to_string()));
    };
    let Some(cookie) = req.cookie(&state.config.auth.cookie_name) else {
        return Ok(None);
    };

    let claims = match validate_session_token(&state.config.auth, cookie.value()) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "Ignoring invalid session cookie");
            return Ok(None);
        }
    };
    let Some(user_id) = claims.user_id() else {
        return Ok(None);
    };

    state.repo.find_user_by_id(user_id).await
}

impl FromRequest for CurrentUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let user = resolve_user(req).await?;
            Ok(CurrentUser(user))
        })
    }
}

impl FromRequest for LoginRequired {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            match resolve_user(req.clone()).await? {
                Some(user) => Ok(LoginRequired(user)),
                None => {
                    let location = login_redirect_url(&full_path(&req));
                    let response = HttpResponse::Found()
                        .insert_header((header::LOCATION, location))
                        .finish();
                    Err(InternalError::from_response("login required", response).into())
                }
            }
        })
    }
}
