//! Class and location hierarchy HTTP handlers.
//!
//! Both trees share one implementation; the route decides the kind.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use investo_core::{
    CreateNodeRequest, HierarchyKind, HierarchyNode, Partition, PathMismatch, UpdateNodeRequest,
};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ListNodesQuery {
    /// `planning` or `coordinator`; both when absent.
    pub partition: Option<String>,
}

async fn list_nodes(
    state: &AppState,
    kind: HierarchyKind,
    query: ListNodesQuery,
) -> Result<Json<Vec<HierarchyNode>>, ApiError> {
    let partition = query
        .partition
        .map(|p| p.parse::<Partition>())
        .transpose()
        .map_err(|e| ApiError::field("partition", e.to_string()))?;
    Ok(Json(state.db.hierarchy.list(kind, partition).await?))
}

async fn create_node(
    state: &AppState,
    kind: HierarchyKind,
    body: CreateNodeRequest,
) -> Result<(StatusCode, Json<HierarchyNode>), ApiError> {
    let node = state.db.hierarchy.create(kind, body).await?;
    Ok((StatusCode::CREATED, Json(node)))
}

/// Fetch a node, answering 404 when it belongs to the other hierarchy.
async fn node_of_kind(
    state: &AppState,
    kind: HierarchyKind,
    id: Uuid,
) -> Result<HierarchyNode, ApiError> {
    state
        .db
        .hierarchy
        .get(id)
        .await?
        .filter(|node| node.kind == kind)
        .ok_or_else(|| ApiError::NotFound(format!("{} {} not found", kind, id)))
}

async fn update_node(
    state: &AppState,
    kind: HierarchyKind,
    id: Uuid,
    body: UpdateNodeRequest,
) -> Result<Json<HierarchyNode>, ApiError> {
    node_of_kind(state, kind, id).await?;
    Ok(Json(state.db.hierarchy.update(id, body).await?))
}

pub async fn list_classes(
    State(state): State<AppState>,
    Query(query): Query<ListNodesQuery>,
) -> Result<Json<Vec<HierarchyNode>>, ApiError> {
    list_nodes(&state, HierarchyKind::Class, query).await
}

pub async fn create_class(
    State(state): State<AppState>,
    Json(body): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<HierarchyNode>), ApiError> {
    create_node(&state, HierarchyKind::Class, body).await
}

pub async fn get_class(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HierarchyNode>, ApiError> {
    Ok(Json(node_of_kind(&state, HierarchyKind::Class, id).await?))
}

/// Reparent a class or change its coordinator link.
pub async fn update_class(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateNodeRequest>,
) -> Result<Json<HierarchyNode>, ApiError> {
    update_node(&state, HierarchyKind::Class, id, body).await
}

pub async fn verify_class_paths(
    State(state): State<AppState>,
) -> Result<Json<Vec<PathMismatch>>, ApiError> {
    Ok(Json(state.db.hierarchy.verify_paths(HierarchyKind::Class).await?))
}

pub async fn list_locations(
    State(state): State<AppState>,
    Query(query): Query<ListNodesQuery>,
) -> Result<Json<Vec<HierarchyNode>>, ApiError> {
    list_nodes(&state, HierarchyKind::Location, query).await
}

pub async fn create_location(
    State(state): State<AppState>,
    Json(body): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<HierarchyNode>), ApiError> {
    create_node(&state, HierarchyKind::Location, body).await
}

pub async fn get_location(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HierarchyNode>, ApiError> {
    Ok(Json(node_of_kind(&state, HierarchyKind::Location, id).await?))
}

/// Reparent a location or change its coordinator link.
pub async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateNodeRequest>,
) -> Result<Json<HierarchyNode>, ApiError> {
    update_node(&state, HierarchyKind::Location, id, body).await
}

pub async fn verify_location_paths(
    State(state): State<AppState>,
) -> Result<Json<Vec<PathMismatch>>, ApiError> {
    Ok(Json(
        state
            .db
            .hierarchy
            .verify_paths(HierarchyKind::Location)
            .await?,
    ))
}
