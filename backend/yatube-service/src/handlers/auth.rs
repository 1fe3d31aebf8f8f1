/// Account handlers - login, signup and logout
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::info;

use super::{base_context, redirect};
use crate::error::{AppError, Result};
use crate::forms::{invalid_login_errors, FormErrors, LoginForm, SignupForm};
use crate::middleware::CurrentUser;
use crate::models::{NewUser, User};
use crate::security::session::{expired_session_cookie, session_cookie};
use crate::security::{hash_password, issue_session_token, verify_password};
use crate::state::AppState;

pub const LOGIN_TEMPLATE: &str = "users/login.html";
pub const SIGNUP_TEMPLATE: &str = "users/signup.html";

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

/// Redirect to `location` with a fresh session cookie for `user`.
fn login_response(state: &AppState, user: &User, location: &str) -> Result<HttpResponse> {
    let token = issue_session_token(&state.config.auth, user)?;
    let mut response = redirect(location);
    response
        .add_cookie(&session_cookie(&state.config.auth, token))
        .map_err(|e| AppError::Internal(format!("Failed to set session cookie: {}", e)))?;
    Ok(response)
}

fn render_login(
    state: &AppState,
    req: &HttpRequest,
    form: &LoginForm,
    errors: &FormErrors,
) -> Result<HttpResponse> {
    let mut ctx = base_context(req, None);
    ctx.insert("title", "Войти");
    ctx.insert("form", &form.context(errors));
    ctx.insert("next", safe_next(Some(&form.next)));
    state.templates.page(LOGIN_TEMPLATE, &ctx)
}

pub async fn login_form(
    state: web::Data<AppState>,
    req: HttpRequest,
    viewer: CurrentUser,
    query: web::Query<NextQuery>,
) -> Result<HttpResponse> {
    let next = safe_next(query.next.as_deref());
    if viewer.user().is_some() {
        return Ok(redirect(next));
    }

    let form = LoginForm {
        next: next.to_string(),
        ..Default::default()
    };
    render_login(&state, &req, &form, &FormErrors::new())
}

pub async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<NextQuery>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse> {
    let mut form = form.into_inner();
    if form.next.is_empty() {
        form.next = query.next.clone().unwrap_or_default();
    }

    if let Err(errors) = form.validate() {
        return render_login(&state, &req, &form, &errors);
    }

    let user = state
        .repo
        .find_user_by_username(form.username.trim())
        .await?
        .filter(|user| verify_password(&form.password, &user.password_hash));

    match user {
        Some(user) => {
            info!(user_id = user.id, "User logged in");
            login_response(&state, &user, safe_next(Some(&form.next)))
        }
        None => render_login(&state, &req, &form, &invalid_login_errors()),
    }
}

fn render_signup(
    state: &AppState,
    req: &HttpRequest,
    form: &SignupForm,
    errors: &FormErrors,
) -> Result<HttpResponse> {
    let mut ctx = base_context(req, None);
    ctx.insert("title", "Зарегистрироваться");
    ctx.insert("form", &form.context(errors));
    state.templates.page(SIGNUP_TEMPLATE, &ctx)
}

pub async fn signup_form(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    render_signup(&state, &req, &SignupForm::default(), &FormErrors::new())
}

/// Create an account and log it in.
pub async fn signup(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<SignupForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let clean = match form.validate_fields() {
        Ok(clean) => clean,
        Err(errors) => return render_signup(&state, &req, &form, &errors),
    };

    if state
        .repo
        .find_user_by_username(&clean.username)
        .await?
        .is_some()
    {
        return render_signup(&state, &req, &form, &SignupForm::username_taken_errors());
    }

    let created = state
        .repo
        .create_user(NewUser {
            username: clean.username,
            password_hash: hash_password(&clean.password)?,
            first_name: clean.first_name,
            last_name: clean.last_name,
        })
        .await;

    let user = match created {
        Ok(user) => user,
        // Lost a race for the same username
        Err(e) if e.is_integrity() => {
            return render_signup(&state, &req, &form, &SignupForm::username_taken_errors())
        }
        Err(e) => return Err(e),
    };

    info!(user_id = user.id, username = %user.username, "User signed up");
    login_response(&state, &user, "/")
}

pub async fn logout(state: web::Data<AppState>) -> Result<HttpResponse> {
    let mut response = redirect("/");
    response
        .add_cookie(&expired_session_cookie(&state.config.auth))
        .map_err(|e| AppError::Internal(format!("Failed to clear session cookie: {}", e)))?;
    Ok(response)
}
