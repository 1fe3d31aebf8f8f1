/// Session tokens
///
/// The session cookie holds an HS256 JWT whose subject is the user id. Tokens
/// are signed with `auth.secret_key` and expire after `auth.session_ttl_hours`.
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::{AppError, Result};
use crate::models::User;

const SESSION_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Subject (user id)
    pub sub: String,
    pub username: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

pub fn issue_session_token(auth: &AuthConfig, user: &User) -> Result<String> {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(auth.session_ttl_hours)).timestamp(),
    };

    encode(
        &Header::new(SESSION_ALGORITHM),
        &claims,
        &EncodingKey::from_secret(auth.secret_key.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to issue session token: {}", e)))
}

pub fn validate_session_token(auth: &AuthConfig, token: &str) -> Result<SessionClaims> {
    let validation = Validation::new(SESSION_ALGORITHM);
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(auth.secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid session: {}", e)))
}

pub fn session_cookie(auth: &AuthConfig, token: String) -> Cookie<'static> {
    Cookie::build(auth.cookie_name.clone(), token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(auth.secure_cookie)
        .max_age(CookieDuration::hours(auth.session_ttl_hours))
        .finish()
}

/// Cookie that replaces the session cookie and expires immediately.
pub fn expired_session_cookie(auth: &AuthConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build(auth.cookie_name.clone(), "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish();
    cookie.make_removal();
    cookie
}
