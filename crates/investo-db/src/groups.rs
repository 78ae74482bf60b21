//! Project group repository implementation.

use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use investo_core::{CreateProjectGroupRequest, Error, ProjectGroup, Result};

/// PostgreSQL implementation of project group storage.
#[derive(Clone)]
pub struct PgProjectGroupRepository {
    pool: Pool<Postgres>,
}

fn row_to_group(row: sqlx::postgres::PgRow) -> ProjectGroup {
    ProjectGroup {
        id: row.get("id"),
        name: row.get("name"),
        class_id: row.get("class_id"),
        location_id: row.get("location_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl PgProjectGroupRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, req: CreateProjectGroupRequest) -> Result<ProjectGroup> {
        if req.name.trim().is_empty() {
            return Err(Error::InvalidInput("group name must not be empty".to_string()));
        }

        let row = sqlx::query(
            "INSERT INTO project_group (id, name, class_id, location_id)
             VALUES ($1, $2, $3, $4)
             RETURNING id, name, class_id, location_id, created_at, updated_at",
        )
        .bind(Uuid::now_v7())
        .bind(&req.name)
        .bind(req.class_id)
        .bind(req.location_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row_to_group(row))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ProjectGroup>> {
        let row = sqlx::query(
            "SELECT id, name, class_id, location_id, created_at, updated_at
             FROM project_group WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(row_to_group))
    }

    pub async fn list(&self) -> Result<Vec<ProjectGroup>> {
        let rows = sqlx::query(
            "SELECT id, name, class_id, location_id, created_at, updated_at
             FROM project_group ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(row_to_group).collect())
    }
}
