use crate::access::{load_visible_case, visible_cases};
use crate::auth::{CurrentUser, SessionUser};
use crate::handlers::composites::{CompositeResponse, case_composites};
use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse, api_error, database_error};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, NaiveDate, Utc};
use model::entities::{case, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Request body for opening a case
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateCaseRequest {
    /// Case number (must be unique)
    #[validate(length(min = 1, max = 50), custom(function = "crate::auth::not_blank"))]
    pub case_number: String,
    #[validate(custom(function = "crate::auth::not_blank"))]
    pub description: String,
    #[validate(length(min = 1, max = 100), custom(function = "crate::auth::not_blank"))]
    pub location: String,
    pub incident_date: NaiveDate,
}

/// Case listing entry
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CaseResponse {
    pub id: i32,
    pub case_number: String,
    pub description: String,
    pub location: String,
    pub incident_date: NaiveDate,
    pub created_by: i32,
    /// Display name of the officer who opened the case
    pub creator_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CaseResponse {
    pub fn new(model: case::Model, creator: Option<&user::Model>) -> Self {
        Self {
            id: model.id,
            case_number: model.case_number,
            description: model.description,
            location: model.location,
            incident_date: model.incident_date,
            created_by: model.created_by,
            creator_name: creator.map(user::Model::display_name),
            created_at: model.created_at,
        }
    }
}

/// A case with its composites, newest first
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CaseDetailResponse {
    pub case: CaseResponse,
    pub composites: Vec<CompositeResponse>,
}

/// Query parameters for listing cases
#[derive(Debug, Deserialize, IntoParams)]
pub struct CaseSearchQuery {
    /// Matches anywhere in case number, description or location
    pub search: Option<String>,
}

/// Visible cases with their creators, newest first, optionally limited.
pub async fn list_visible_cases(
    state: &AppState,
    user: &SessionUser,
    search: Option<&str>,
    limit: Option<u64>,
) -> Result<Vec<CaseResponse>, ApiError> {
    let mut query = visible_cases(user);
    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        debug!("Filtering cases by '{}'", term);
        query = query.filter(
            Condition::any()
                .add(case::Column::CaseNumber.contains(term))
                .add(case::Column::Description.contains(term))
                .add(case::Column::Location.contains(term)),
        );
    }
    let mut query = query
        .find_also_related(user::Entity)
        .order_by_desc(case::Column::CreatedAt)
        .order_by_desc(case::Column::Id);
    if let Some(limit) = limit {
        query = query.limit(limit);
    }

    let rows = query.all(&state.db).await.map_err(|e| {
        error!("Failed to list cases: {}", e);
        database_error()
    })?;
    Ok(rows
        .into_iter()
        .map(|(case_model, creator)| CaseResponse::new(case_model, creator.as_ref()))
        .collect())
}

/// List visible cases
#[utoipa::path(
    get,
    path = "/api/v1/cases",
    tag = "cases",
    params(CaseSearchQuery),
    responses(
        (status = 200, description = "Cases retrieved successfully", body = ApiResponse<Vec<CaseResponse>>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user))]
pub async fn get_cases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CaseSearchQuery>,
) -> Result<Json<ApiResponse<Vec<CaseResponse>>>, ApiError> {
    trace!("Entering get_cases function");
    let cases = list_visible_cases(&state, &user, query.search.as_deref(), None).await?;
    info!("Retrieved {} cases for {}", cases.len(), user.username);
    Ok(Json(ApiResponse::ok(cases, "Cases retrieved successfully")))
}

/// Open a new case
#[utoipa::path(
    post,
    path = "/api/v1/cases",
    tag = "cases",
    request_body = CreateCaseRequest,
    responses(
        (status = 201, description = "Case created successfully", body = ApiResponse<CaseResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 409, description = "Case number already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user))]
pub async fn create_case(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Valid(Json(request)): Valid<Json<CreateCaseRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<CaseResponse>>), ApiError> {
    trace!("Entering create_case function");
    let case_number = request.case_number.trim().to_string();

    let new_case = case::ActiveModel {
        case_number: Set(case_number.clone()),
        description: Set(request.description.trim().to_string()),
        location: Set(request.location.trim().to_string()),
        incident_date: Set(request.incident_date),
        created_by: Set(user.user_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    match new_case.insert(&state.db).await {
        Ok(case_model) => {
            info!("Case {} created with ID {} by {}", case_model.case_number, case_model.id, user.username);
            let mut response = CaseResponse::new(case_model, None);
            response.creator_name = Some(user.display_name());
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::ok(response, "Case created successfully!")),
            ))
        }
        Err(db_error) => match db_error.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                warn!("Case number '{}' already exists", case_number);
                Err(api_error(
                    StatusCode::CONFLICT,
                    "CASE_NUMBER_ALREADY_EXISTS",
                    format!("Case number '{}' already exists", case_number),
                ))
            }
            _ => {
                error!("Failed to create case '{}': {}", case_number, db_error);
                Err(database_error())
            }
        },
    }
}

/// Get a case with its composites
#[utoipa::path(
    get,
    path = "/api/v1/cases/{case_id}",
    tag = "cases",
    params(
        ("case_id" = i32, Path, description = "Case ID"),
    ),
    responses(
        (status = 200, description = "Case retrieved successfully", body = ApiResponse<CaseDetailResponse>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 403, description = "Case belongs to another officer", body = ErrorResponse),
        (status = 404, description = "Case not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user))]
pub async fn get_case(
    Path(case_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<CaseDetailResponse>>, ApiError> {
    trace!("Entering get_case function for case_id: {}", case_id);
    let case_model = load_visible_case(&state.db, &user, case_id).await?;

    let creator = user::Entity::find_by_id(case_model.created_by)
        .one(&state.db)
        .await
        .map_err(|e| {
            error!("Failed to load creator of case {}: {}", case_id, e);
            database_error()
        })?;
    let composites = case_composites(&state, case_id).await?;
    debug!("Case {} has {} composites", case_id, composites.len());

    let detail = CaseDetailResponse {
        case: CaseResponse::new(case_model, creator.as_ref()),
        composites,
    };
    Ok(Json(ApiResponse::ok(detail, "Case retrieved successfully")))
}
