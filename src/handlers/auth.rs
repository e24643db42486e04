use crate::auth::{
    CurrentUser, SessionUser, end_session, removal_cookie, session_cookie, start_session,
    verify_password,
};
use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse, api_error, database_error};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::cookie::SignedCookieJar;
use model::entities::user;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;

/// Login form. `username` may also be a badge number.
#[derive(Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// The logged-in user as seen by the client
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionUserResponse {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub badge_number: String,
    /// `officer` or `admin`
    pub role: String,
}

impl From<SessionUser> for SessionUserResponse {
    fn from(user: SessionUser) -> Self {
        Self {
            id: user.user_id,
            username: user.username,
            full_name: user.full_name,
            badge_number: user.badge_number,
            role: user.role.as_str().to_string(),
        }
    }
}

type CookieResponse<T> = (SignedCookieJar, Json<ApiResponse<T>>);

/// Log in with username or badge number
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, session cookie set", body = ApiResponse<SessionUserResponse>),
        (status = 400, description = "Username or password missing", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, jar, request))]
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<CookieResponse<SessionUserResponse>, ApiError> {
    trace!("Entering login function");
    let login_name = request.username.trim().to_string();
    if login_name.is_empty() || request.password.is_empty() {
        debug!("Login rejected: missing username or password");
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "FIELDS_REQUIRED",
            "Please enter both username and password.",
        ));
    }

    let found = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(login_name.as_str()))
                .add(user::Column::BadgeNumber.eq(login_name.as_str())),
        )
        .one(&state.db)
        .await
        .map_err(|e| {
            error!("Failed to look up user '{}': {}", login_name, e);
            database_error()
        })?;

    let invalid = || {
        api_error(
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
            "Invalid username or password.",
        )
    };

    let Some(user_model) = found else {
        warn!("Login failed: no user '{}'", login_name);
        return Err(invalid());
    };

    let password = request.password;
    let hash = user_model.password.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| {
            error!("Password verification task failed: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal server error")
        })?;
    if !valid {
        warn!("Login failed: wrong password for '{}'", login_name);
        return Err(invalid());
    }

    let session_user = SessionUser::from(&user_model);
    let token = start_session(&state, session_user.clone()).await;
    info!("User {} logged in", session_user.username);

    let welcome = format!("Welcome back, {}!", session_user.display_name());
    Ok((
        jar.add(session_cookie(token)),
        Json(ApiResponse::ok(SessionUserResponse::from(session_user), welcome)),
    ))
}

/// Log out and clear the session cookie
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out", body = ApiResponse<bool>)
    )
)]
#[instrument(skip(state, jar))]
pub async fn logout(State(state): State<AppState>, jar: SignedCookieJar) -> CookieResponse<bool> {
    trace!("Entering logout function");
    let had_session = end_session(&state, &jar).await;
    debug!("Session present on logout: {}", had_session);
    (
        jar.remove(removal_cookie()),
        Json(ApiResponse::ok(had_session, "You have been logged out.")),
    )
}

/// Get the logged-in user
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current session user", body = ApiResponse<SessionUserResponse>),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
#[instrument(skip(user))]
pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<ApiResponse<SessionUserResponse>> {
    trace!("Entering current_user function");
    Json(ApiResponse::ok(SessionUserResponse::from(user), "Session is active"))
}
