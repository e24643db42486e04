use crate::handlers::{
    auth::{current_user, login, logout},
    cases::{create_case, get_case, get_cases},
    composites::{
        IMAGE_URL_PREFIX, create_composite, get_case_composites, get_composite,
        mark_composite_accurate, request_revision,
    },
    dashboard::get_dashboard,
    health::health_check,
    users::{get_users, register_user},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let images = ServeDir::new(&state.config.upload_folder);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Session routes
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/me", get(current_user))
        // User administration
        .route("/api/v1/users", post(register_user).get(get_users))
        .route("/api/v1/dashboard", get(get_dashboard))
        // Case routes
        .route("/api/v1/cases", get(get_cases).post(create_case))
        .route("/api/v1/cases/:case_id", get(get_case))
        .route(
            "/api/v1/cases/:case_id/composites",
            get(get_case_composites).post(create_composite),
        )
        // Composite routes
        .route("/api/v1/composites/:composite_id", get(get_composite))
        .route(
            "/api/v1/composites/:composite_id/accurate",
            post(mark_composite_accurate),
        )
        .route(
            "/api/v1/composites/:composite_id/revisions",
            post(request_revision),
        )
        // Generated sketches
        .nest_service(IMAGE_URL_PREFIX, images)
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
