//! Project repository implementation.

use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use investo_core::defaults::{PAGE_LIMIT, PAGE_LIMIT_MAX, PAGE_OFFSET};
use investo_core::{
    CreateProjectRequest, Error, ListProjectsResponse, Project, ProjectFilter, ResolvedFilter,
    Result,
};

const PROJECT_COLUMNS: &str = "p.id, p.name, p.description, p.class_id, p.location_id, \
     p.group_id, p.programmed, p.phase, p.planning_start_year, p.construction_end_year, \
     p.sap_project, p.sap_network, p.created_at, p.updated_at";

/// Join that exposes the coordinator links of a project's class and location.
const LINK_JOINS: &str = "LEFT JOIN hierarchy_node cn ON cn.id = p.class_id \
     LEFT JOIN hierarchy_node ln ON ln.id = p.location_id";

/// PostgreSQL implementation of project storage.
#[derive(Clone)]
pub struct PgProjectRepository {
    pool: Pool<Postgres>,
}

fn row_to_project(row: &PgRow) -> Result<Project> {
    let phase: Option<String> = row.get("phase");
    Ok(Project {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        class_id: row.get("class_id"),
        location_id: row.get("location_id"),
        group_id: row.get("group_id"),
        programmed: row.get("programmed"),
        phase: phase.map(|p| p.parse()).transpose()?,
        planning_start_year: row.get("planning_start_year"),
        construction_end_year: row.get("construction_end_year"),
        sap_project: row.get("sap_project"),
        sap_network: row.get("sap_network"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Append the clause for one resolved hierarchy filter.
fn add_hierarchy_clause(
    query: &mut String,
    param_idx: &mut usize,
    column: &str,
    alias: &str,
    resolved: &ResolvedFilter,
) {
    if resolved.via_coordinator_link {
        query.push_str(&format!(
            "AND (p.{} = ANY(${}) OR {}.coordinator_link_id = ANY(${})) ",
            column, param_idx, alias, param_idx
        ));
    } else {
        query.push_str(&format!("AND p.{} = ANY(${}) ", column, param_idx));
    }
    *param_idx += 1;
}

/// Append the WHERE clauses for `filter`, numbering parameters from
/// `param_idx`. Binding must follow [`bind_filter`] in the same order.
fn add_project_filters(query: &mut String, param_idx: &mut usize, filter: &ProjectFilter) {
    if let Some(class) = &filter.class {
        add_hierarchy_clause(query, param_idx, "class_id", "cn", class);
    }
    if let Some(location) = &filter.location {
        add_hierarchy_clause(query, param_idx, "location_id", "ln", location);
    }
    if filter.programmed.is_some() {
        query.push_str(&format!("AND p.programmed = ${} ", param_idx));
        *param_idx += 1;
    }
    if filter.phase.is_some() {
        query.push_str(&format!("AND p.phase = ${} ", param_idx));
        *param_idx += 1;
    }
    if filter.group_id.is_some() {
        query.push_str(&format!("AND p.group_id = ${} ", param_idx));
        *param_idx += 1;
    }
    if filter.sap_project.is_some() {
        query.push_str(&format!("AND btrim(p.sap_project) = ${} ", param_idx));
        *param_idx += 1;
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>;

fn bind_filter<'q>(mut q: PgQuery<'q>, filter: &'q ProjectFilter) -> PgQuery<'q> {
    if let Some(class) = &filter.class {
        q = q.bind(class.ids());
    }
    if let Some(location) = &filter.location {
        q = q.bind(location.ids());
    }
    if let Some(programmed) = filter.programmed {
        q = q.bind(programmed);
    }
    if let Some(phase) = filter.phase {
        q = q.bind(phase.as_str());
    }
    if let Some(group_id) = filter.group_id {
        q = q.bind(group_id);
    }
    if let Some(sap) = &filter.sap_project {
        q = q.bind(sap.trim());
    }
    q
}

impl PgProjectRepository {
    /// Create a new PgProjectRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, req: CreateProjectRequest) -> Result<Project> {
        if req.name.trim().is_empty() {
            return Err(Error::InvalidInput("project name must not be empty".to_string()));
        }

        let id = Uuid::now_v7();
        let row = sqlx::query(&format!(
            "INSERT INTO project AS p (id, name, description, class_id, location_id, group_id,
                 programmed, phase, planning_start_year, construction_end_year, sap_project, sap_network)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.class_id)
        .bind(req.location_id)
        .bind(req.group_id)
        .bind(req.programmed)
        .bind(req.phase.map(|p| p.as_str()))
        .bind(req.planning_start_year)
        .bind(req.construction_end_year)
        .bind(&req.sap_project)
        .bind(&req.sap_network)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        row_to_project(&row)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Project>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM project p WHERE p.id = $1",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(row_to_project).transpose()
    }

    /// List projects matching `filter`, ordered by name.
    pub async fn list(&self, filter: &ProjectFilter) -> Result<ListProjectsResponse> {
        if filter.matches_nothing() {
            return Ok(ListProjectsResponse {
                projects: Vec::new(),
                total: 0,
            });
        }

        let limit = filter.limit.unwrap_or(PAGE_LIMIT).clamp(1, PAGE_LIMIT_MAX);
        let offset = filter.offset.unwrap_or(PAGE_OFFSET).max(0);

        let mut where_clause = String::from("WHERE TRUE ");
        let mut param_idx = 1;
        add_project_filters(&mut where_clause, &mut param_idx, filter);

        let count_query = format!("SELECT COUNT(*) FROM project p {} {}", LINK_JOINS, where_clause);
        let total: i64 = bind_filter(sqlx::query(&count_query), filter)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?
            .get(0);

        let list_query = format!(
            "SELECT {} FROM project p {} {} ORDER BY p.name, p.id LIMIT ${} OFFSET ${}",
            PROJECT_COLUMNS,
            LINK_JOINS,
            where_clause,
            param_idx,
            param_idx + 1
        );
        let rows = bind_filter(sqlx::query(&list_query), filter)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let projects = rows.iter().map(row_to_project).collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "database",
            component = "projects",
            op = "list",
            result_count = projects.len(),
            total = total,
            "Listed projects"
        );

        Ok(ListProjectsResponse { projects, total })
    }

    /// Projects with a non-blank SAP id, optionally only the given one.
    pub async fn list_with_sap_id(&self, sap_id: Option<&str>) -> Result<Vec<Project>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM project p
             WHERE p.sap_project IS NOT NULL AND btrim(p.sap_project) <> ''
               AND ($1::text IS NULL OR btrim(p.sap_project) = $1)
             ORDER BY p.group_id NULLS LAST, p.id",
            PROJECT_COLUMNS
        ))
        .bind(sap_id.map(str::trim))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(row_to_project).collect()
    }

    /// Move a project into a group, or out of any group.
    pub async fn update_group(&self, id: Uuid, group_id: Option<Uuid>) -> Result<Project> {
        let row = sqlx::query(&format!(
            "UPDATE project AS p SET group_id = $1, updated_at = now() WHERE p.id = $2 RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(group_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::ProjectNotFound(id))?;

        row_to_project(&row)
    }
}
