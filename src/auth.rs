use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use cookie::{Cookie, SameSite};

use crate::{AppState, entities::user, error::AppError};

pub const SESSION_COOKIE: &str = "session";

/// The signed-in user, resolved from the session cookie. Rejects with 401.
pub struct CurrentUser(pub user::Model);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()).ok_or(AppError::Unauthorized)?;
        let user = state.accounts.user_for_token(&token).await?.ok_or(AppError::Unauthorized)?;
        Ok(Self(user))
    }
}

/// A signed-in staff member. Rejects with 401 or 403.
pub struct StaffUser(pub user::Model);

impl FromRequestParts<Arc<AppState>> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(AppError::Forbidden("staff access required".to_string()));
        }
        Ok(Self(user))
    }
}

pub fn session_cookie(token: String, ttl_seconds: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(ttl_seconds))
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
