//! Project group HTTP handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use investo_core::{CreateProjectGroupRequest, ProjectGroup};

use crate::{ApiError, AppState};

pub async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<ProjectGroup>>, ApiError> {
    Ok(Json(state.db.groups.list().await?))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectGroup>, ApiError> {
    let group = state
        .db
        .groups
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Project group {} not found", id)))?;
    Ok(Json(group))
}

pub async fn create_group(
    State(state): State<AppState>,
    Json(body): Json<CreateProjectGroupRequest>,
) -> Result<(StatusCode, Json<ProjectGroup>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::field("name", "must not be empty"));
    }
    let group = state.db.groups.create(body).await?;
    Ok((StatusCode::CREATED, Json(group)))
}
