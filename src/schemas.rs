use std::sync::Arc;

use axum::{Json, extract::FromRef, http::StatusCode};
use axum_extra::extract::cookie::Key;
use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use sketch::SketchGenerator;
use utoipa::{OpenApi, ToSchema};

use crate::auth::SessionUser;
use crate::config::AppConfig;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Logged-in sessions keyed by session token
    pub sessions: Cache<String, SessionUser>,
    /// The one sketch generator of the process
    pub generator: Arc<SketchGenerator>,
    /// Signs the session cookie
    pub cookie_key: Key,
    pub config: Arc<AppConfig>,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// API response wrapper
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Build an error tuple with a machine readable code.
pub fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.to_string(),
            success: false,
        }),
    )
}

/// Generic 500 used when the database fails underneath a handler.
pub fn database_error() -> ApiError {
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "DATABASE_ERROR",
        "Database error, please try again later",
    )
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
    /// Whether the diffusion model has been loaded yet
    pub model_loaded: bool,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::current_user,
        crate::handlers::users::register_user,
        crate::handlers::users::get_users,
        crate::handlers::dashboard::get_dashboard,
        crate::handlers::cases::get_cases,
        crate::handlers::cases::create_case,
        crate::handlers::cases::get_case,
        crate::handlers::composites::get_case_composites,
        crate::handlers::composites::create_composite,
        crate::handlers::composites::get_composite,
        crate::handlers::composites::mark_composite_accurate,
        crate::handlers::composites::request_revision,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::SessionUserResponse,
            crate::handlers::users::RegisterUserRequest,
            crate::handlers::users::UserResponse,
            crate::handlers::cases::CreateCaseRequest,
            crate::handlers::cases::CaseResponse,
            crate::handlers::cases::CaseDetailResponse,
            crate::handlers::composites::CreateCompositeRequest,
            crate::handlers::composites::RevisionRequest,
            crate::handlers::composites::CompositeResponse,
            crate::handlers::composites::CompositeDetailResponse,
            crate::handlers::composites::RevisionResponse,
            crate::handlers::composites::GenerationTicket,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Login and session endpoints"),
        (name = "users", description = "User administration (admin only)"),
        (name = "cases", description = "Case records"),
        (name = "composites", description = "Composite sketches and revisions"),
    ),
    info(
        title = "SketchDesk API",
        description = "Case management and forensic composite sketch generation",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
