//! SAP cost aggregation.
//!
//! A sync run fetches cost and commitment line items once per distinct SAP
//! id, buckets them by task group and writes one batch per project group:
//! a row for every member project plus, for real groups, one group row.
//! Projects outside any group form a batch of their own.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use investo_core::{
    combine_group, summarize, Project, Result, SapBackend, SapCostOwner, SapCostRepository,
    SapCostScope, SapCostWrite, SapTotals, SapWindow,
};

/// Why a project was left out of a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingPlanningStart,
    FuturePlanningStart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedProject {
    pub project_id: Uuid,
    pub reason: SkipReason,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub scope: Option<SapCostScope>,
    pub year: i32,
    pub synced_projects: usize,
    pub synced_groups: usize,
    pub skipped: Vec<SkippedProject>,
    /// Remote calls that answered non-200 and counted as zero.
    pub failed_fetches: usize,
}

/// Aggregates SAP line items into stored totals.
pub struct SapSyncService<B, R> {
    backend: B,
    repository: R,
}

impl<B: SapBackend, R: SapCostRepository> SapSyncService<B, R> {
    pub fn new(backend: B, repository: R) -> Self {
        Self {
            backend,
            repository,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Sync `projects` for `scope`, writing rows for the year of `today`.
    pub async fn sync(
        &self,
        projects: &[Project],
        scope: SapCostScope,
        today: NaiveDate,
    ) -> Result<SyncReport> {
        let start = Instant::now();
        let year = today.year();
        let mut report = SyncReport {
            scope: Some(scope),
            year,
            ..Default::default()
        };

        let eligible = select_eligible(projects, year, &mut report.skipped);

        // Earliest planning start per SAP id decides its query window.
        let mut earliest: BTreeMap<&str, i32> = BTreeMap::new();
        for (_, sap_id, start_year) in &eligible {
            earliest
                .entry(*sap_id)
                .and_modify(|y| *y = (*y).min(*start_year))
                .or_insert(*start_year);
        }

        let mut totals: HashMap<&str, SapTotals> = HashMap::new();
        for (sap_id, start_year) in &earliest {
            let window = SapWindow::for_scope(scope, *start_year, today)?;
            let (sap_totals, failed) = self.fetch_totals(sap_id, &window).await?;
            report.failed_fetches += failed;
            totals.insert(*sap_id, sap_totals);
        }

        // group -> sap id -> member projects
        let mut groups: BTreeMap<Option<Uuid>, BTreeMap<&str, Vec<&Project>>> = BTreeMap::new();
        for (project, sap_id, _) in &eligible {
            groups
                .entry(project.group_id)
                .or_default()
                .entry(*sap_id)
                .or_default()
                .push(*project);
        }

        for (group_id, by_sap_id) in &groups {
            let mut batch = Vec::new();
            for (sap_id, members) in by_sap_id {
                let sap_totals = totals.get(sap_id).cloned().unwrap_or_default();
                for project in members {
                    batch.push(SapCostWrite {
                        owner: SapCostOwner::Project(project.id),
                        sap_id: sap_id.to_string(),
                        totals: sap_totals.clone(),
                    });
                }
            }
            let project_rows = batch.len();

            if let Some(group_id) = group_id {
                let contributions: Vec<SapTotals> = by_sap_id
                    .keys()
                    .map(|sap_id| totals.get(sap_id).cloned().unwrap_or_default())
                    .collect();
                batch.push(SapCostWrite {
                    owner: SapCostOwner::Group(*group_id),
                    sap_id: by_sap_id.keys().copied().collect::<Vec<_>>().join(","),
                    totals: combine_group(&contributions),
                });
                report.synced_groups += 1;
            }

            self.repository.upsert_batch(scope, year, &batch).await?;
            report.synced_projects += project_rows;

            debug!(
                subsystem = "sap",
                component = "sync",
                op = "write_group",
                group_id = ?group_id,
                result_count = batch.len(),
                "Wrote SAP group batch"
            );
        }

        info!(
            subsystem = "sap",
            component = "sync",
            op = "sync",
            scope = scope.as_str(),
            year = year,
            synced_projects = report.synced_projects,
            synced_groups = report.synced_groups,
            skipped = report.skipped.len(),
            failed_fetches = report.failed_fetches,
            duration_ms = start.elapsed().as_millis() as u64,
            "SAP sync finished"
        );

        Ok(report)
    }

    async fn fetch_totals(&self, sap_id: &str, window: &SapWindow) -> Result<(SapTotals, usize)> {
        let costs = self.backend.fetch_costs(sap_id, window).await?;
        let commitments = self.backend.fetch_commitments(sap_id, window).await?;
        let failed = usize::from(costs.is_failed()) + usize::from(commitments.is_failed());

        Ok((
            summarize(sap_id, costs.items(), commitments.items()),
            failed,
        ))
    }
}

/// Projects with a SAP id and a planning start that is not in the future.
fn select_eligible<'a>(
    projects: &'a [Project],
    year: i32,
    skipped: &mut Vec<SkippedProject>,
) -> Vec<(&'a Project, &'a str, i32)> {
    let mut eligible = Vec::new();
    for project in projects {
        let Some(sap_id) = project.sap_id() else {
            continue;
        };
        let reason = match project.planning_start_year {
            None => SkipReason::MissingPlanningStart,
            Some(start_year) if start_year > year => SkipReason::FuturePlanningStart,
            Some(start_year) => {
                eligible.push((project, sap_id, start_year));
                continue;
            }
        };
        debug!(
            subsystem = "sap",
            component = "sync",
            project_id = %project.id,
            sap_id = %sap_id,
            reason = ?reason,
            "Skipping project in SAP sync"
        );
        skipped.push(SkippedProject {
            project_id: project.id,
            reason,
        });
    }
    eligible
}
