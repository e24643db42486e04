use crate::access::{load_visible_case, load_visible_composite};
use crate::auth::CurrentUser;
use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse, database_error};
use crate::worker::{CompositeJob, RevisionJob, spawn_composite_job, spawn_revision_job};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::{composite, revision, user};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

/// URL prefix generated images are served under.
pub const IMAGE_URL_PREFIX: &str = "/static/generated";

fn image_url(file_name: &str) -> String {
    format!("{}/{}", IMAGE_URL_PREFIX, file_name)
}

/// Suspect description for a new sketch
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateCompositeRequest {
    #[validate(custom(function = "crate::auth::not_blank"))]
    pub description: String,
}

/// Adjustments to apply to an existing sketch
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RevisionRequest {
    #[validate(custom(function = "crate::auth::not_blank"))]
    pub adjustment: String,
}

/// A generated sketch
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompositeResponse {
    pub id: i32,
    pub case_id: i32,
    pub user_id: i32,
    /// Display name of the requesting officer
    pub author_name: Option<String>,
    pub description: String,
    /// File name inside the upload folder
    pub image_path: String,
    pub image_url: String,
    pub is_accurate: bool,
    pub created_at: DateTime<Utc>,
}

impl CompositeResponse {
    fn new(model: composite::Model, author: Option<&user::Model>) -> Self {
        Self {
            id: model.id,
            case_id: model.case_id,
            user_id: model.user_id,
            author_name: author.map(user::Model::display_name),
            description: model.description,
            image_url: image_url(&model.image_path),
            image_path: model.image_path,
            is_accurate: model.is_accurate,
            created_at: model.created_at,
        }
    }
}

/// A regenerated sketch
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RevisionResponse {
    pub id: i32,
    pub composite_id: i32,
    pub user_id: Option<i32>,
    /// Display name of whoever asked for the revision
    pub requested_by: Option<String>,
    pub adjustment_text: String,
    pub revised_image_path: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

impl RevisionResponse {
    fn new(model: revision::Model, requester: Option<&user::Model>) -> Self {
        Self {
            id: model.id,
            composite_id: model.composite_id,
            user_id: model.user_id,
            requested_by: requester.map(user::Model::display_name),
            adjustment_text: model.adjustment_text,
            image_url: image_url(&model.revised_image_path),
            revised_image_path: model.revised_image_path,
            created_at: model.created_at,
        }
    }
}

/// A composite with author details and its revisions, newest first
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompositeDetailResponse {
    pub composite: CompositeResponse,
    pub author_badge_number: Option<String>,
    pub case_number: String,
    pub revisions: Vec<RevisionResponse>,
}

/// Returned when a generation has been queued
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerationTicket {
    pub case_id: i32,
    /// Set for revisions: the composite being redrawn
    pub composite_id: Option<i32>,
    pub status: String,
}

/// Composites of a case with their authors, newest first.
pub async fn case_composites(state: &AppState, case_id: i32) -> Result<Vec<CompositeResponse>, ApiError> {
    let rows = composite::Entity::find()
        .filter(composite::Column::CaseId.eq(case_id))
        .find_also_related(user::Entity)
        .order_by_desc(composite::Column::CreatedAt)
        .order_by_desc(composite::Column::Id)
        .all(&state.db)
        .await
        .map_err(|e| {
            error!("Failed to load composites of case {}: {}", case_id, e);
            database_error()
        })?;
    Ok(rows
        .into_iter()
        .map(|(model, author)| CompositeResponse::new(model, author.as_ref()))
        .collect())
}

/// List composites of a case
#[utoipa::path(
    get,
    path = "/api/v1/cases/{case_id}/composites",
    tag = "composites",
    params(
        ("case_id" = i32, Path, description = "Case ID"),
    ),
    responses(
        (status = 200, description = "Composites retrieved successfully", body = ApiResponse<Vec<CompositeResponse>>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 403, description = "Case belongs to another officer", body = ErrorResponse),
        (status = 404, description = "Case not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user))]
pub async fn get_case_composites(
    Path(case_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<CompositeResponse>>>, ApiError> {
    trace!("Entering get_case_composites function for case_id: {}", case_id);
    load_visible_case(&state.db, &user, case_id).await?;
    let composites = case_composites(&state, case_id).await?;
    debug!("Retrieved {} composites for case {}", composites.len(), case_id);
    Ok(Json(ApiResponse::ok(composites, "Composites retrieved successfully")))
}

/// Start generating a sketch for a case
#[utoipa::path(
    post,
    path = "/api/v1/cases/{case_id}/composites",
    tag = "composites",
    params(
        ("case_id" = i32, Path, description = "Case ID"),
    ),
    request_body = CreateCompositeRequest,
    responses(
        (status = 202, description = "Sketch generation started", body = ApiResponse<GenerationTicket>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 403, description = "Case belongs to another officer", body = ErrorResponse),
        (status = 404, description = "Case not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user))]
pub async fn create_composite(
    Path(case_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Valid(Json(request)): Valid<Json<CreateCompositeRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<GenerationTicket>>), ApiError> {
    trace!("Entering create_composite function for case_id: {}", case_id);
    load_visible_case(&state.db, &user, case_id).await?;

    let job = CompositeJob {
        case_id,
        user_id: user.user_id,
        description: request.description.trim().to_string(),
    };
    spawn_composite_job(state.clone(), job);
    info!("Queued sketch generation for case {} by {}", case_id, user.username);

    let ticket = GenerationTicket {
        case_id,
        composite_id: None,
        status: "generating".to_string(),
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(
            ticket,
            "Sketch generation started. This may take a minute.",
        )),
    ))
}

/// Get a composite with its author and revisions
#[utoipa::path(
    get,
    path = "/api/v1/composites/{composite_id}",
    tag = "composites",
    params(
        ("composite_id" = i32, Path, description = "Composite ID"),
    ),
    responses(
        (status = 200, description = "Composite retrieved successfully", body = ApiResponse<CompositeDetailResponse>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 403, description = "Case belongs to another officer", body = ErrorResponse),
        (status = 404, description = "Composite not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user))]
pub async fn get_composite(
    Path(composite_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<CompositeDetailResponse>>, ApiError> {
    trace!("Entering get_composite function for composite_id: {}", composite_id);
    let (composite_model, case_model) = load_visible_composite(&state.db, &user, composite_id).await?;

    let author = user::Entity::find_by_id(composite_model.user_id)
        .one(&state.db)
        .await
        .map_err(|e| {
            error!("Failed to load author of composite {}: {}", composite_id, e);
            database_error()
        })?;

    let revisions = revision::Entity::find()
        .filter(revision::Column::CompositeId.eq(composite_id))
        .find_also_related(user::Entity)
        .order_by_desc(revision::Column::CreatedAt)
        .order_by_desc(revision::Column::Id)
        .all(&state.db)
        .await
        .map_err(|e| {
            error!("Failed to load revisions of composite {}: {}", composite_id, e);
            database_error()
        })?;
    debug!("Composite {} has {} revisions", composite_id, revisions.len());

    let detail = CompositeDetailResponse {
        author_badge_number: author.as_ref().map(|a| a.badge_number.clone()),
        composite: CompositeResponse::new(composite_model, author.as_ref()),
        case_number: case_model.case_number,
        revisions: revisions
            .into_iter()
            .map(|(model, requester)| RevisionResponse::new(model, requester.as_ref()))
            .collect(),
    };
    Ok(Json(ApiResponse::ok(detail, "Composite retrieved successfully")))
}

/// Mark a composite as an accurate likeness
#[utoipa::path(
    post,
    path = "/api/v1/composites/{composite_id}/accurate",
    tag = "composites",
    params(
        ("composite_id" = i32, Path, description = "Composite ID"),
    ),
    responses(
        (status = 200, description = "Composite marked accurate", body = ApiResponse<CompositeResponse>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 403, description = "Case belongs to another officer", body = ErrorResponse),
        (status = 404, description = "Composite not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user))]
pub async fn mark_composite_accurate(
    Path(composite_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<CompositeResponse>>, ApiError> {
    trace!("Entering mark_composite_accurate function for composite_id: {}", composite_id);
    let (composite_model, _) = load_visible_composite(&state.db, &user, composite_id).await?;

    let mut active = composite_model.into_active_model();
    active.is_accurate = Set(true);
    let updated = active.update(&state.db).await.map_err(|e| {
        error!("Failed to mark composite {} accurate: {}", composite_id, e);
        database_error()
    })?;

    let author = user::Entity::find_by_id(updated.user_id)
        .one(&state.db)
        .await
        .map_err(|e| {
            error!("Failed to load author of composite {}: {}", composite_id, e);
            database_error()
        })?;

    info!("Composite {} marked accurate by {}", composite_id, user.username);
    Ok(Json(ApiResponse::ok(
        CompositeResponse::new(updated, author.as_ref()),
        "Composite marked as accurate.",
    )))
}

/// Start generating a revised sketch
#[utoipa::path(
    post,
    path = "/api/v1/composites/{composite_id}/revisions",
    tag = "composites",
    params(
        ("composite_id" = i32, Path, description = "Composite ID"),
    ),
    request_body = RevisionRequest,
    responses(
        (status = 202, description = "Revision generation started", body = ApiResponse<GenerationTicket>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 403, description = "Case belongs to another officer", body = ErrorResponse),
        (status = 404, description = "Composite not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user))]
pub async fn request_revision(
    Path(composite_id): Path<i32>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Valid(Json(request)): Valid<Json<RevisionRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<GenerationTicket>>), ApiError> {
    trace!("Entering request_revision function for composite_id: {}", composite_id);
    let (composite_model, case_model) = load_visible_composite(&state.db, &user, composite_id).await?;

    let job = RevisionJob {
        composite_id,
        user_id: user.user_id,
        description: composite_model.description,
        adjustment: request.adjustment.trim().to_string(),
    };
    spawn_revision_job(state.clone(), job);
    info!("Queued revision of composite {} by {}", composite_id, user.username);

    let ticket = GenerationTicket {
        case_id: case_model.id,
        composite_id: Some(composite_id),
        status: "generating".to_string(),
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(
            ticket,
            "Revision generation started. This may take a minute.",
        )),
    ))
}
