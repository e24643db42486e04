//! Session based authentication.
//!
//! A successful login stores a [`SessionUser`] in the in-memory session cache
//! under a random token. The browser receives the token in an HMAC-signed
//! cookie keyed from the application secret, so a forged or truncated cookie
//! is rejected before the cache is consulted.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use chrono::Utc;
use model::entities::user::{self, Role};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sha2::{Digest, Sha256};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;
use validator::ValidationError;

use crate::schemas::{ApiError, AppState, api_error};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sketchdesk_session";

/// What the session cache remembers about a logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: i32,
    pub username: String,
    pub full_name: String,
    pub badge_number: String,
    pub role: Role,
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn display_name(&self) -> String {
        if self.full_name.trim().is_empty() {
            self.username.clone()
        } else {
            self.full_name.clone()
        }
    }
}

impl From<&user::Model> for SessionUser {
    fn from(model: &user::Model) -> Self {
        Self {
            user_id: model.id,
            username: model.username.clone(),
            full_name: model.full_name.clone(),
            badge_number: model.badge_number.clone(),
            role: model.role,
        }
    }
}

/// Hash a password with bcrypt at the given cost.
pub fn hash_password(password: &str, cost: u32) -> anyhow::Result<String> {
    Ok(bcrypt::hash(password, cost)?)
}

/// Verify a password against a stored bcrypt hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(valid) => valid,
        Err(e) => {
            warn!("Stored password hash could not be verified: {}", e);
            false
        }
    }
}

/// Signing key for session cookies, expanded from the application secret.
pub fn cookie_key(secret: &str) -> Key {
    Key::derive_from(&Sha256::digest(secret.as_bytes()))
}

/// The signed session cookie carrying `token`.
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Removal counterpart of [`session_cookie`].
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Token of the session cookie, if one is present and its signature verifies.
pub fn session_token(jar: &SignedCookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string())
}

/// Open a new session and return its token.
pub async fn start_session(state: &AppState, user: SessionUser) -> String {
    let token = Uuid::new_v4().simple().to_string();
    debug!("Opening session for user ID {}", user.user_id);
    state.sessions.insert(token.clone(), user).await;
    token
}

/// Drop the session referenced by the request's cookie, if any.
pub async fn end_session(state: &AppState, jar: &SignedCookieJar) -> bool {
    let Some(token) = session_token(jar) else {
        return false;
    };
    let existed = state.sessions.contains_key(&token);
    state.sessions.invalidate(&token).await;
    existed
}

/// Extractor for any logged-in user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        trace!("Resolving session for {}", parts.uri.path());
        let unauthorized = || {
            api_error(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Please log in to access this page.",
            )
        };

        let jar = SignedCookieJar::from_headers(&parts.headers, state.cookie_key.clone());
        let Some(token) = session_token(&jar) else {
            debug!("No session cookie with a valid signature");
            return Err(unauthorized());
        };

        match state.sessions.get(&token).await {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                debug!("Session token not found or expired");
                Err(unauthorized())
            }
        }
    }
}

/// Extractor that only lets administrators through.
#[derive(Debug, Clone)]
pub struct AdminUser(pub SessionUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            warn!("User {} denied access to admin route {}", user.username, parts.uri.path());
            return Err(api_error(StatusCode::FORBIDDEN, "PERMISSION_DENIED", "Permission denied."));
        }
        Ok(AdminUser(user))
    }
}

/// Rejects values that are empty once surrounding whitespace is removed.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Create the `admin` account if it does not exist yet. Returns true when created.
pub async fn ensure_admin_user(db: &DatabaseConnection, password: &str, cost: u32) -> anyhow::Result<bool> {
    trace!("Checking for bootstrap admin account");
    let existing = user::Entity::find()
        .filter(user::Column::Username.eq("admin"))
        .one(db)
        .await?;
    if existing.is_some() {
        debug!("Admin account already present");
        return Ok(false);
    }

    let password_hash = hash_password(password, cost)?;
    user::ActiveModel {
        username: Set("admin".to_string()),
        password: Set(password_hash),
        full_name: Set("Admin User".to_string()),
        badge_number: Set("0000".to_string()),
        role: Set(Role::Admin),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created bootstrap admin account");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{COOKIE, SET_COOKIE};
    use axum::http::{HeaderMap, HeaderValue};
    use axum::response::IntoResponse;

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("hunter22", 4).expect("hash");
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-bcrypt-hash"));
    }

    #[test]
    fn test_session_cookie_signature() {
        let token = Uuid::new_v4().simple().to_string();
        let signed = SignedCookieJar::new(cookie_key("secret")).add(session_cookie(token.clone()));
        let raw = signed.get(SESSION_COOKIE).expect("cookie in jar");
        assert_eq!(raw.value(), token);

        let signed_value = match signed.clone().into_response().headers().get(SET_COOKIE) {
            Some(value) => value.to_str().unwrap().split(';').next().unwrap().to_string(),
            None => panic!("signed jar should emit a cookie"),
        };
        assert!(signed_value.starts_with("sketchdesk_session="));
        assert_ne!(signed_value, format!("sketchdesk_session={}", token));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&signed_value).unwrap());
        let same_key = SignedCookieJar::from_headers(&headers, cookie_key("secret"));
        assert_eq!(session_token(&same_key), Some(token.clone()));
        let other_key = SignedCookieJar::from_headers(&headers, cookie_key("other-secret"));
        assert_eq!(session_token(&other_key), None);

        let mut unsigned = HeaderMap::new();
        unsigned.insert(COOKIE, HeaderValue::from_str(&format!("sketchdesk_session={}", token)).unwrap());
        let jar = SignedCookieJar::from_headers(&unsigned, cookie_key("secret"));
        assert_eq!(session_token(&jar), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("tok".to_string());
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(removal_cookie().name(), SESSION_COOKIE);
    }
}
