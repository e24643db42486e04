use crate::auth::CurrentUser;
use crate::handlers::cases::{CaseResponse, list_visible_cases};
use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{extract::State, response::Json};
use tracing::{info, instrument, trace};

/// Number of cases shown on the dashboard.
pub const RECENT_CASES: u64 = 5;

/// Most recent cases visible to the user
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "cases",
    responses(
        (status = 200, description = "Recent cases", body = ApiResponse<Vec<CaseResponse>>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user))]
pub async fn get_dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<CaseResponse>>>, ApiError> {
    trace!("Entering get_dashboard function");
    let cases = list_visible_cases(&state, &user, None, Some(RECENT_CASES)).await?;
    info!("Dashboard for {} lists {} cases", user.username, cases.len());
    Ok(Json(ApiResponse::ok(cases, "Recent cases")))
}
