//! SAP aggregate repository implementation.
//!
//! Both scopes share one row layout; [`SapCostScope::table`] picks the table.
//! Each owner has at most one row per year, enforced by partial unique
//! indexes that the upserts target.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};
use uuid::Uuid;

use investo_core::{
    Error, Result, SapCostOwner, SapCostRecord, SapCostRepository, SapCostScope, SapCostWrite,
};

const RECORD_COLUMNS: &str = "id, project_id, project_group_id, sap_id, year, \
     project_task_costs, project_task_commitments, production_task_costs, \
     production_task_commitments, updated_at";

/// PostgreSQL implementation of [`SapCostRepository`].
#[derive(Clone)]
pub struct PgSapCostRepository {
    pool: Pool<Postgres>,
}

fn row_to_record(row: &PgRow) -> SapCostRecord {
    SapCostRecord {
        id: row.get("id"),
        project_id: row.get("project_id"),
        project_group_id: row.get("project_group_id"),
        sap_id: row.get("sap_id"),
        year: row.get("year"),
        project_task_costs: row.get("project_task_costs"),
        project_task_commitments: row.get("project_task_commitments"),
        production_task_costs: row.get("production_task_costs"),
        production_task_commitments: row.get("production_task_commitments"),
        updated_at: row.get("updated_at"),
    }
}

/// Upsert statement for one owner column of one table.
fn upsert_sql(table: &str, owner_column: &str) -> String {
    format!(
        "INSERT INTO {table} (id, {owner_column}, sap_id, year,
             project_task_costs, project_task_commitments,
             production_task_costs, production_task_commitments)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT ({owner_column}, year) WHERE {owner_column} IS NOT NULL
         DO UPDATE SET
             sap_id = EXCLUDED.sap_id,
             project_task_costs = EXCLUDED.project_task_costs,
             project_task_commitments = EXCLUDED.project_task_commitments,
             production_task_costs = EXCLUDED.production_task_costs,
             production_task_commitments = EXCLUDED.production_task_commitments,
             updated_at = now()"
    )
}

fn owner_column(owner: &SapCostOwner) -> (&'static str, Uuid) {
    match owner {
        SapCostOwner::Project(id) => ("project_id", *id),
        SapCostOwner::Group(id) => ("project_group_id", *id),
    }
}

impl PgSapCostRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SapCostRepository for PgSapCostRepository {
    async fn upsert_batch(
        &self,
        scope: SapCostScope,
        year: i32,
        rows: &[SapCostWrite],
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let start = Instant::now();
        let table = scope.table();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for row in rows {
            let (column, owner_id) = owner_column(&row.owner);
            let totals = row.totals.rescaled();
            sqlx::query(&upsert_sql(table, column))
                .bind(Uuid::now_v7())
                .bind(owner_id)
                .bind(&row.sap_id)
                .bind(year)
                .bind(&totals.project_task_costs)
                .bind(&totals.project_task_commitments)
                .bind(&totals.production_task_costs)
                .bind(&totals.production_task_commitments)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;

            debug!(
                subsystem = "database",
                component = "sap_costs",
                db_table = table,
                owner = column,
                owner_id = %owner_id,
                sap_id = %row.sap_id,
                "Upserted SAP aggregate"
            );
        }
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "sap_costs",
            op = "upsert_batch",
            db_table = table,
            year = year,
            result_count = rows.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Committed SAP aggregate batch"
        );
        Ok(())
    }

    async fn list_for_year(&self, scope: SapCostScope, year: i32) -> Result<Vec<SapCostRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE year = $1 ORDER BY id",
            RECORD_COLUMNS,
            scope.table()
        ))
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn get(
        &self,
        scope: SapCostScope,
        owner: SapCostOwner,
        year: i32,
    ) -> Result<Option<SapCostRecord>> {
        let (column, owner_id) = owner_column(&owner);
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE {} = $1 AND year = $2",
            RECORD_COLUMNS,
            scope.table(),
            column
        ))
        .bind(owner_id)
        .bind(year)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(row_to_record))
    }
}
