use crate::auth::{AdminUser, hash_password};
use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse, api_error, database_error};
use axum::{extract::State, http::StatusCode, response::Json};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::user::{self, Role};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set, SqlErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for registering a new user. Every field except `role` is required.
#[derive(Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterUserRequest {
    /// Username (must be unique)
    #[serde(default)]
    #[validate(length(min = 1, max = 50), custom(function = "crate::auth::not_blank"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 255), custom(function = "crate::auth::not_blank"))]
    pub password: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 100), custom(function = "crate::auth::not_blank"))]
    pub full_name: String,
    /// Badge number, also usable as a login name
    #[serde(default)]
    #[validate(length(min = 1, max = 20), custom(function = "crate::auth::not_blank"))]
    pub badge_number: String,
    /// `officer` (default) or `admin`
    pub role: Option<String>,
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub badge_number: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            full_name: model.full_name,
            badge_number: model.badge_number,
            role: model.role.as_str().to_string(),
            created_at: model.created_at,
        }
    }
}

/// Register a new user (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User registered successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
        (status = 409, description = "Username already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, admin, request))]
pub async fn register_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Valid(Json(request)): Valid<Json<RegisterUserRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    trace!("Entering register_user function");
    let username = request.username.trim().to_string();
    debug!("Admin {} registering user '{}'", admin.username, username);

    let role = match request.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        None => Role::Officer,
        Some(name) => Role::parse(name).ok_or_else(|| {
            warn!("Rejected unknown role '{}'", name);
            api_error(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("Unknown role '{}'", name),
            )
        })?,
    };

    let cost = state.config.bcrypt_cost;
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| e.to_string())
        .and_then(|hashed| hashed.map_err(|e| e.to_string()))
        .map_err(|e| {
            error!("Failed to hash password: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal server error")
        })?;

    let new_user = user::ActiveModel {
        username: Set(username.clone()),
        password: Set(password_hash),
        full_name: Set(request.full_name.trim().to_string()),
        badge_number: Set(request.badge_number.trim().to_string()),
        role: Set(role),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    trace!("Attempting to insert new user into database");
    match new_user.insert(&state.db).await {
        Ok(user_model) => {
            info!("User registered with ID: {}, username: {}", user_model.id, user_model.username);
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::ok(
                    UserResponse::from(user_model),
                    format!("User {} registered successfully!", username),
                )),
            ))
        }
        Err(db_error) => match db_error.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                warn!("Username '{}' already exists", username);
                Err(api_error(
                    StatusCode::CONFLICT,
                    "USERNAME_ALREADY_EXISTS",
                    format!("Username '{}' already exists", username),
                ))
            }
            _ => {
                error!("Failed to register user '{}': {}", username, db_error);
                Err(database_error())
            }
        },
    }
}

/// List all users (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _admin))]
pub async fn get_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    trace!("Entering get_users function");

    match user::Entity::find().order_by_asc(user::Column::Id).all(&state.db).await {
        Ok(users) => {
            let user_count = users.len();
            debug!("Retrieved {} users from database", user_count);
            let data: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
            info!("Successfully retrieved {} users", user_count);
            Ok(Json(ApiResponse::ok(data, "Users retrieved successfully")))
        }
        Err(db_error) => {
            error!("Failed to retrieve users from database: {}", db_error);
            Err(database_error())
        }
    }
}
