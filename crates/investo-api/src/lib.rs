//! # investo-api
//!
//! HTTP API for investo: hierarchy-filtered project listing, class and
//! location tree maintenance, project groups and the SAP aggregate tables.

pub mod handlers;
pub mod query;

use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use investo_db::Database;
use investo_sap::HttpSapBackend;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sap: HttpSapBackend,
}

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Origins from `CORS_ALLOWED_ORIGINS` (comma-separated).
///
/// Defaults to `http://localhost:3000` when unset or empty.
pub fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins = std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default();
    let parsed: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    if parsed.is_empty() {
        vec![HeaderValue::from_static("http://localhost:3000")]
    } else {
        parsed
    }
}

pub fn build_router(state: AppState) -> Router {
    use handlers::{groups, hierarchy, projects, sap};

    Router::new()
        .route("/health", get(health_check))
        // Projects
        .route(
            "/api/v1/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/api/v1/projects/:id",
            get(projects::get_project).patch(projects::update_project),
        )
        // Class hierarchy
        .route(
            "/api/v1/classes",
            get(hierarchy::list_classes).post(hierarchy::create_class),
        )
        .route("/api/v1/classes/verify-paths", get(hierarchy::verify_class_paths))
        .route(
            "/api/v1/classes/:id",
            get(hierarchy::get_class).patch(hierarchy::update_class),
        )
        // Location hierarchy
        .route(
            "/api/v1/locations",
            get(hierarchy::list_locations).post(hierarchy::create_location),
        )
        .route(
            "/api/v1/locations/verify-paths",
            get(hierarchy::verify_location_paths),
        )
        .route(
            "/api/v1/locations/:id",
            get(hierarchy::get_location).patch(hierarchy::update_location),
        )
        // Project groups
        .route(
            "/api/v1/project-groups",
            get(groups::list_groups).post(groups::create_group),
        )
        .route("/api/v1/project-groups/:id", get(groups::get_group))
        // SAP aggregates
        .route("/api/v1/sap-costs", get(sap::list_sap_costs))
        .route("/api/v1/sap-current-year", get(sap::list_sap_current_year))
        .route("/api/v1/sap/sync", post(sap::run_sync))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parse_allowed_origins()))
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    Internal(investo_core::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    /// Per-field validation messages, keyed by query or body field name.
    Fields(BTreeMap<String, String>),
}

impl ApiError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        ApiError::Fields(BTreeMap::from([(field.to_string(), message.into())]))
    }
}

impl From<investo_core::Error> for ApiError {
    fn from(err: investo_core::Error) -> Self {
        use investo_core::Error;

        match &err {
            Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            Error::NodeNotFound(_) | Error::ProjectNotFound(_) => ApiError::NotFound(err.to_string()),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            Error::Database(sqlx_err) => {
                let msg = sqlx_err.to_string();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    return ApiError::Conflict(msg);
                }
                if msg.contains("foreign key") || msg.contains("check constraint") {
                    return ApiError::BadRequest(msg);
                }
                ApiError::Internal(err)
            }
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ApiError::Internal(err) => {
                tracing::error!(subsystem = "api", error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": err.to_string() }),
                )
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, serde_json::json!({ "error": msg })),
            ApiError::Fields(errors) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "errors": errors }))
            }
        };

        (status, Json(body)).into_response()
    }
}
