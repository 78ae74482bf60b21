//! Domain models for projects, project groups and SAP cost rows.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::sap::SapTotals;

// =============================================================================
// PROJECTS
// =============================================================================

/// Lifecycle phase of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPhase {
    Proposal,
    Design,
    Programming,
    DraftInitiation,
    DraftApproval,
    ConstructionPlan,
    ConstructionWait,
    Construction,
    WarrantyPeriod,
    Completed,
}

impl ProjectPhase {
    pub const ALL: [ProjectPhase; 10] = [
        ProjectPhase::Proposal,
        ProjectPhase::Design,
        ProjectPhase::Programming,
        ProjectPhase::DraftInitiation,
        ProjectPhase::DraftApproval,
        ProjectPhase::ConstructionPlan,
        ProjectPhase::ConstructionWait,
        ProjectPhase::Construction,
        ProjectPhase::WarrantyPeriod,
        ProjectPhase::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectPhase::Proposal => "proposal",
            ProjectPhase::Design => "design",
            ProjectPhase::Programming => "programming",
            ProjectPhase::DraftInitiation => "draft_initiation",
            ProjectPhase::DraftApproval => "draft_approval",
            ProjectPhase::ConstructionPlan => "construction_plan",
            ProjectPhase::ConstructionWait => "construction_wait",
            ProjectPhase::Construction => "construction",
            ProjectPhase::WarrantyPeriod => "warranty_period",
            ProjectPhase::Completed => "completed",
        }
    }
}

impl fmt::Display for ProjectPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectPhase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown project phase '{}'", s)))
    }
}

/// A capital project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub class_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub programmed: bool,
    pub phase: Option<ProjectPhase>,
    pub planning_start_year: Option<i32>,
    pub construction_end_year: Option<i32>,
    pub sap_project: Option<String>,
    pub sap_network: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Trimmed SAP project id, `None` when missing or blank.
    pub fn sap_id(&self) -> Option<&str> {
        self.sap_project
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Request for creating a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub class_id: Option<Uuid>,
    #[serde(default)]
    pub location_id: Option<Uuid>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub programmed: bool,
    #[serde(default)]
    pub phase: Option<ProjectPhase>,
    #[serde(default)]
    pub planning_start_year: Option<i32>,
    #[serde(default)]
    pub construction_end_year: Option<i32>,
    #[serde(default)]
    pub sap_project: Option<String>,
    #[serde(default)]
    pub sap_network: Option<String>,
}

/// Page of projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListProjectsResponse {
    pub projects: Vec<Project>,
    pub total: i64,
}

// =============================================================================
// PROJECT GROUPS
// =============================================================================

/// A group of projects rolled up together, e.g. for SAP costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGroup {
    pub id: Uuid,
    pub name: String,
    pub class_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProjectGroupRequest {
    pub name: String,
    #[serde(default)]
    pub class_id: Option<Uuid>,
    #[serde(default)]
    pub location_id: Option<Uuid>,
}

// =============================================================================
// SAP COSTS
// =============================================================================

/// Which SAP aggregate table a sync writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SapCostScope {
    /// Everything since the earliest planning start year.
    Cumulative,
    /// The current calendar year only.
    CurrentYear,
}

impl SapCostScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SapCostScope::Cumulative => "cumulative",
            SapCostScope::CurrentYear => "current_year",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            SapCostScope::Cumulative => "sap_cost",
            SapCostScope::CurrentYear => "sap_current_year",
        }
    }
}

impl FromStr for SapCostScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cumulative" => Ok(SapCostScope::Cumulative),
            "current_year" | "current-year" => Ok(SapCostScope::CurrentYear),
            other => Err(Error::InvalidInput(format!("unknown SAP scope '{}'", other))),
        }
    }
}

/// Owner of a SAP aggregate row: a project or a project group, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum SapCostOwner {
    Project(Uuid),
    Group(Uuid),
}

/// A stored SAP aggregate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SapCostRecord {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub project_group_id: Option<Uuid>,
    pub sap_id: String,
    pub year: i32,
    pub project_task_costs: BigDecimal,
    pub project_task_commitments: BigDecimal,
    pub production_task_costs: BigDecimal,
    pub production_task_commitments: BigDecimal,
    pub updated_at: DateTime<Utc>,
}

impl SapCostRecord {
    pub fn totals(&self) -> SapTotals {
        SapTotals {
            project_task_costs: self.project_task_costs.clone(),
            project_task_commitments: self.project_task_commitments.clone(),
            production_task_costs: self.production_task_costs.clone(),
            production_task_commitments: self.production_task_commitments.clone(),
        }
    }
}

/// One row to upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct SapCostWrite {
    pub owner: SapCostOwner,
    /// SAP id(s) the totals came from, comma-joined for multi-id groups.
    pub sap_id: String,
    pub totals: SapTotals,
}
