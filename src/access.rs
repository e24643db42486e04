//! Case visibility rules.
//!
//! Admins see every case. Officers only see the cases they opened; composites
//! and revisions inherit the visibility of their case.

use axum::http::StatusCode;
use model::entities::{case, composite};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Select};
use tracing::{error, trace, warn};

use crate::auth::SessionUser;
use crate::schemas::{ApiError, api_error, database_error};

/// Base query over the cases `user` may see.
pub fn visible_cases(user: &SessionUser) -> Select<case::Entity> {
    let query = case::Entity::find();
    if user.is_admin() {
        query
    } else {
        query.filter(case::Column::CreatedBy.eq(user.user_id))
    }
}

pub fn can_view(user: &SessionUser, case: &case::Model) -> bool {
    user.is_admin() || case.created_by == user.user_id
}

fn permission_denied() -> ApiError {
    api_error(StatusCode::FORBIDDEN, "PERMISSION_DENIED", "Permission denied.")
}

/// Load a case, answering 404 when it does not exist and 403 when the user may not see it.
pub async fn load_visible_case(
    db: &DatabaseConnection,
    user: &SessionUser,
    case_id: i32,
) -> Result<case::Model, ApiError> {
    trace!("Loading case {} for user {}", case_id, user.user_id);
    let case_model = case::Entity::find_by_id(case_id)
        .one(db)
        .await
        .map_err(|e| {
            error!("Failed to load case {}: {}", case_id, e);
            database_error()
        })?
        .ok_or_else(|| {
            warn!("Case {} not found", case_id);
            api_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Case not found.")
        })?;

    if !can_view(user, &case_model) {
        warn!("User {} denied access to case {}", user.username, case_id);
        return Err(permission_denied());
    }
    Ok(case_model)
}

/// Load a composite together with its case, applying the case's visibility.
pub async fn load_visible_composite(
    db: &DatabaseConnection,
    user: &SessionUser,
    composite_id: i32,
) -> Result<(composite::Model, case::Model), ApiError> {
    trace!("Loading composite {} for user {}", composite_id, user.user_id);
    let not_found = || {
        warn!("Composite {} not found", composite_id);
        api_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Composite not found.")
    };

    let (composite_model, case_model) = composite::Entity::find_by_id(composite_id)
        .find_also_related(case::Entity)
        .one(db)
        .await
        .map_err(|e| {
            error!("Failed to load composite {}: {}", composite_id, e);
            database_error()
        })?
        .ok_or_else(not_found)?;
    let case_model = case_model.ok_or_else(not_found)?;

    if !can_view(user, &case_model) {
        warn!("User {} denied access to composite {}", user.username, composite_id);
        return Err(permission_denied());
    }
    Ok((composite_model, case_model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use model::entities::user::Role;

    fn session(user_id: i32, role: Role) -> SessionUser {
        SessionUser {
            user_id,
            username: format!("user{}", user_id),
            full_name: format!("User {}", user_id),
            badge_number: format!("B-{}", user_id),
            role,
        }
    }

    fn case_by(created_by: i32) -> case::Model {
        case::Model {
            id: 1,
            case_number: "C-1".to_string(),
            description: "Burglary".to_string(),
            location: "Main St".to_string(),
            incident_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            created_by,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_officer_sees_only_own_cases() {
        let officer = session(2, Role::Officer);
        assert!(can_view(&officer, &case_by(2)));
        assert!(!can_view(&officer, &case_by(3)));
    }

    #[test]
    fn test_admin_sees_everything() {
        let admin = session(1, Role::Admin);
        assert!(can_view(&admin, &case_by(2)));
        assert!(can_view(&admin, &case_by(3)));
    }
}
