//! Project HTTP handlers.
//!
//! `GET /api/v1/projects` is the hierarchy-filtered listing: class and
//! location level parameters are resolved to node id sets first, then
//! applied together with the plain column filters.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use investo_core::{
    CreateProjectRequest, HierarchyKind, ListProjectsResponse, Project, ProjectFilter,
};

use crate::query::ProjectQuery;
use crate::{ApiError, AppState};

/// List projects matching hierarchy and column filters.
///
/// # Query Parameters
/// - `masterClass`, `class`, `subClass`, `collectiveSubLevel`,
///   `otherClassification`, `district`, `division`, `subDivision`,
///   `subLevelDistrict`: repeatable node ids
/// - `direct`: match only the named nodes, not their subtrees
/// - `forCoordinator`: query the coordinator trees
/// - `programmed`, `phase`, `group`, `sapProject`, `limit`, `offset`
///
/// # Returns
/// - 200 OK with the page and the total match count
/// - 400 Bad Request with `{"errors": {param: message}}` for malformed values
pub async fn list_projects(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ListProjectsResponse>, ApiError> {
    let query = ProjectQuery::parse(&pairs).map_err(ApiError::Fields)?;
    let resolver = state.db.resolver();

    let class = match query.hierarchy_filter(HierarchyKind::Class) {
        Some(filter) => Some(resolver.resolve(&filter).await?),
        None => None,
    };
    let location = match query.hierarchy_filter(HierarchyKind::Location) {
        Some(filter) => Some(resolver.resolve(&filter).await?),
        None => None,
    };

    let filter = ProjectFilter {
        class,
        location,
        programmed: query.programmed,
        phase: query.phase,
        group_id: query.group_id,
        sap_project: query.sap_project,
        limit: query.limit,
        offset: query.offset,
    };

    let page = state.db.projects.list(&filter).await?;
    debug!(
        subsystem = "api",
        component = "projects",
        op = "list",
        result_count = page.projects.len(),
        total = page.total,
        "Listed projects"
    );
    Ok(Json(page))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, ApiError> {
    let project = state
        .db
        .projects
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Project {} not found", id)))?;
    Ok(Json(project))
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(body): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::field("name", "must not be empty"));
    }
    let project = state.db.projects.create(body).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// Request body for moving a project between groups.
#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    /// New group, or `null` to leave every group.
    pub group_id: Option<Uuid>,
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    let project = state.db.projects.update_group(id, body.group_id).await?;
    Ok(Json(project))
}
