//! SAP aggregate HTTP handlers.
//!
//! The aggregate tables are read-only over HTTP; rows are written only by a
//! sync run, which can be triggered here and runs inline.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Datelike;
use serde::Deserialize;
use tracing::info;

use investo_core::{SapCostRecord, SapCostRepository, SapCostScope};
use investo_sap::{SapSyncService, SyncReport};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<String>,
}

impl YearQuery {
    /// Requested year, defaulting to the current one.
    fn resolve(&self) -> Result<i32, ApiError> {
        match self.year.as_deref() {
            None | Some("") => Ok(chrono::Local::now().year()),
            Some(raw) => raw
                .parse::<i32>()
                .ok()
                .filter(|y| (1900..=9999).contains(y))
                .ok_or_else(|| ApiError::field("year", format!("'{}' is not a valid year", raw))),
        }
    }
}

async fn list_rows(
    state: &AppState,
    scope: SapCostScope,
    query: YearQuery,
) -> Result<Json<Vec<SapCostRecord>>, ApiError> {
    let year = query.resolve()?;
    Ok(Json(state.db.sap_costs.list_for_year(scope, year).await?))
}

/// Cumulative SAP aggregates for a year.
pub async fn list_sap_costs(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<SapCostRecord>>, ApiError> {
    list_rows(&state, SapCostScope::Cumulative, query).await
}

/// Current-year SAP aggregates for a year.
pub async fn list_sap_current_year(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<SapCostRecord>>, ApiError> {
    list_rows(&state, SapCostScope::CurrentYear, query).await
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    /// `cumulative` (default) or `current_year`.
    #[serde(default)]
    pub scope: Option<String>,
    /// Only sync projects with this SAP id.
    #[serde(default, rename = "sapId", alias = "sap_id")]
    pub sap_id: Option<String>,
}

/// Run a SAP sync inline and return its report.
pub async fn run_sync(
    State(state): State<AppState>,
    Json(body): Json<SyncRequest>,
) -> Result<Json<SyncReport>, ApiError> {
    let scope = match body.scope.as_deref() {
        None => SapCostScope::Cumulative,
        Some(raw) => raw
            .parse::<SapCostScope>()
            .map_err(|e| ApiError::field("scope", e.to_string()))?,
    };

    let projects = state
        .db
        .projects
        .list_with_sap_id(body.sap_id.as_deref())
        .await?;
    info!(
        subsystem = "api",
        component = "sap",
        op = "sync",
        scope = scope.as_str(),
        result_count = projects.len(),
        "Starting SAP sync"
    );

    let service = SapSyncService::new(state.sap.clone(), state.db.sap_costs.clone());
    let today = chrono::Local::now().date_naive();
    let report = service.sync(&projects, scope, today).await?;
    investo_db::log_pool_usage(state.db.pool(), "sap_sync");
    Ok(Json(report))
}
