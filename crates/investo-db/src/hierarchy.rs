//! Hierarchy node repository implementation.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use investo_core::{
    child_path, validate_node_name, CreateNodeRequest, Error, HierarchyKind, HierarchyNode,
    HierarchySource, Partition, PathMismatch, Result, UpdateNodeRequest,
};

use crate::escape_like;

/// Recursion cap for ancestry walks; deeper trees indicate a cycle.
const MAX_TREE_DEPTH: i32 = 32;

const NODE_COLUMNS: &str = "n.id, n.kind, n.name, n.parent_id, n.path, n.partition, \
     n.coordinator_link_id, n.created_at, n.updated_at";

/// PostgreSQL implementation of the class and location hierarchies.
#[derive(Clone)]
pub struct PgHierarchyRepository {
    pool: Pool<Postgres>,
}

fn row_to_node(row: &PgRow) -> Result<HierarchyNode> {
    let kind: String = row.get("kind");
    let partition: String = row.get("partition");
    Ok(HierarchyNode {
        id: row.get("id"),
        kind: kind.parse()?,
        name: row.get("name"),
        parent_id: row.get("parent_id"),
        path: row.get("path"),
        partition: partition.parse()?,
        coordinator_link_id: row.get("coordinator_link_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl PgHierarchyRepository {
    /// Create a new PgHierarchyRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create a node; its path is derived from the parent.
    pub async fn create(&self, kind: HierarchyKind, req: CreateNodeRequest) -> Result<HierarchyNode> {
        validate_node_name(&req.name)?;

        let parent_path = match req.parent_id {
            Some(parent_id) => {
                let parent = self
                    .get(parent_id)
                    .await?
                    .ok_or(Error::NodeNotFound(parent_id))?;
                if parent.kind != kind {
                    return Err(Error::InvalidInput(format!(
                        "parent {} is a {} node, expected {}",
                        parent_id, parent.kind, kind
                    )));
                }
                if parent.partition != req.partition {
                    return Err(Error::InvalidInput(format!(
                        "parent {} belongs to the {} tree, not {}",
                        parent_id, parent.partition, req.partition
                    )));
                }
                Some(parent.path)
            }
            None => None,
        };

        if let Some(link_id) = req.coordinator_link_id {
            self.check_coordinator_target(kind, link_id).await?;
        }

        let id = Uuid::now_v7();
        let path = child_path(parent_path.as_deref(), &req.name);

        let row = sqlx::query(&format!(
            "INSERT INTO hierarchy_node AS n (id, kind, name, parent_id, path, partition, coordinator_link_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            NODE_COLUMNS
        ))
        .bind(id)
        .bind(kind.as_str())
        .bind(&req.name)
        .bind(req.parent_id)
        .bind(&path)
        .bind(req.partition.as_str())
        .bind(req.coordinator_link_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "hierarchy",
            op = "create",
            node_id = %id,
            kind = %kind,
            path = %path,
            "Created hierarchy node"
        );

        row_to_node(&row)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<HierarchyNode>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM hierarchy_node n WHERE n.id = $1",
            NODE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(row_to_node).transpose()
    }

    /// All nodes of one hierarchy, optionally limited to a partition, in path order.
    pub async fn list(
        &self,
        kind: HierarchyKind,
        partition: Option<Partition>,
    ) -> Result<Vec<HierarchyNode>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM hierarchy_node n
             WHERE n.kind = $1 AND ($2::text IS NULL OR n.partition = $2)
             ORDER BY n.path",
            NODE_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(partition.map(|p| p.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(row_to_node).collect()
    }

    /// Move a node under `new_parent` (or to the root), rewriting the path of
    /// the node and of its whole subtree in one transaction.
    pub async fn reparent(&self, id: Uuid, new_parent: Option<Uuid>) -> Result<HierarchyNode> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        self.reparent_in(&mut tx, id, new_parent).await?;
        tx.commit().await.map_err(Error::Database)?;

        self.get(id).await?.ok_or(Error::NodeNotFound(id))
    }

    async fn reparent_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        new_parent: Option<Uuid>,
    ) -> Result<()> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM hierarchy_node n WHERE n.id = $1 FOR UPDATE",
            NODE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::NodeNotFound(id))?;
        let node = row_to_node(&row)?;

        let parent_path = match new_parent {
            Some(parent_id) => {
                if parent_id == id {
                    return Err(Error::InvalidInput("a node cannot be its own parent".to_string()));
                }
                let row = sqlx::query(&format!(
                    "SELECT {} FROM hierarchy_node n WHERE n.id = $1",
                    NODE_COLUMNS
                ))
                .bind(parent_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(Error::Database)?
                .ok_or(Error::NodeNotFound(parent_id))?;
                let parent = row_to_node(&row)?;

                if parent.kind != node.kind || parent.partition != node.partition {
                    return Err(Error::InvalidInput(format!(
                        "node {} cannot move under {}: different hierarchy or tree",
                        id, parent_id
                    )));
                }

                let is_descendant: bool = sqlx::query_scalar(
                    "WITH RECURSIVE up AS (
                         SELECT id, parent_id, 0 AS depth FROM hierarchy_node WHERE id = $1
                         UNION ALL
                         SELECT h.id, h.parent_id, up.depth + 1
                         FROM hierarchy_node h JOIN up ON h.id = up.parent_id
                         WHERE up.depth < $3
                     )
                     SELECT EXISTS(SELECT 1 FROM up WHERE id = $2)",
                )
                .bind(parent_id)
                .bind(id)
                .bind(MAX_TREE_DEPTH)
                .fetch_one(&mut **tx)
                .await
                .map_err(Error::Database)?;
                if is_descendant {
                    return Err(Error::InvalidInput(format!(
                        "node {} cannot move under its own descendant {}",
                        id, parent_id
                    )));
                }
                Some(parent.path)
            }
            None => None,
        };

        let new_path = child_path(parent_path.as_deref(), &node.name);

        sqlx::query("UPDATE hierarchy_node SET parent_id = $1, updated_at = now() WHERE id = $2")
            .bind(new_parent)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        // The subtree is found through parent links, never by path prefix.
        let moved = sqlx::query(
            "WITH RECURSIVE subtree AS (
                 SELECT id, 0 AS depth FROM hierarchy_node WHERE id = $3
                 UNION ALL
                 SELECT c.id, s.depth + 1
                 FROM hierarchy_node c JOIN subtree s ON c.parent_id = s.id
                 WHERE s.depth < $4
             )
             UPDATE hierarchy_node
             SET path = $1 || substr(path, char_length($2) + 1), updated_at = now()
             WHERE id IN (SELECT id FROM subtree)",
        )
        .bind(&new_path)
        .bind(&node.path)
        .bind(id)
        .bind(MAX_TREE_DEPTH)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        info!(
            subsystem = "database",
            component = "hierarchy",
            op = "reparent",
            node_id = %id,
            old_path = %node.path,
            new_path = %new_path,
            result_count = moved,
            "Moved hierarchy subtree"
        );

        Ok(())
    }

    /// Set or clear the coordinator mirror of a planning node.
    pub async fn set_coordinator_link(
        &self,
        id: Uuid,
        link: Option<Uuid>,
    ) -> Result<HierarchyNode> {
        let node = self.get(id).await?.ok_or(Error::NodeNotFound(id))?;
        if let Some(link_id) = link {
            self.check_coordinator_target(node.kind, link_id).await?;
        }

        sqlx::query(
            "UPDATE hierarchy_node SET coordinator_link_id = $1, updated_at = now() WHERE id = $2",
        )
        .bind(link)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.get(id).await?.ok_or(Error::NodeNotFound(id))
    }

    /// Apply a partial update; absent fields stay unchanged.
    ///
    /// The move and the link change commit together or not at all.
    pub async fn update(&self, id: Uuid, req: UpdateNodeRequest) -> Result<HierarchyNode> {
        let node = self.get(id).await?.ok_or(Error::NodeNotFound(id))?;
        if let Some(Some(link_id)) = req.coordinator_link_id {
            self.check_coordinator_target(node.kind, link_id).await?;
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        if let Some(parent_id) = req.parent_id {
            if parent_id != node.parent_id {
                self.reparent_in(&mut tx, id, parent_id).await?;
            }
        }
        if let Some(link) = req.coordinator_link_id {
            sqlx::query(
                "UPDATE hierarchy_node SET coordinator_link_id = $1, updated_at = now() WHERE id = $2",
            )
            .bind(link)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;

        self.get(id).await?.ok_or(Error::NodeNotFound(id))
    }

    /// Nodes whose stored path differs from the one their ancestry implies.
    pub async fn verify_paths(&self, kind: HierarchyKind) -> Result<Vec<PathMismatch>> {
        let rows = sqlx::query(
            "WITH RECURSIVE expected AS (
                 SELECT id, name::text AS expected_path, 0 AS depth
                 FROM hierarchy_node
                 WHERE kind = $1 AND parent_id IS NULL
                 UNION ALL
                 SELECT c.id, e.expected_path || '/' || c.name, e.depth + 1
                 FROM hierarchy_node c JOIN expected e ON c.parent_id = e.id
                 WHERE e.depth < $2
             )
             SELECT n.id, n.path AS stored_path, e.expected_path
             FROM hierarchy_node n JOIN expected e ON e.id = n.id
             WHERE n.path <> e.expected_path
             ORDER BY e.expected_path",
        )
        .bind(kind.as_str())
        .bind(MAX_TREE_DEPTH)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| PathMismatch {
                id: r.get("id"),
                stored_path: r.get("stored_path"),
                expected_path: r.get("expected_path"),
            })
            .collect())
    }

    async fn check_coordinator_target(&self, kind: HierarchyKind, link_id: Uuid) -> Result<()> {
        let target = self
            .get(link_id)
            .await?
            .ok_or(Error::NodeNotFound(link_id))?;
        if target.kind != kind || target.partition != Partition::Coordinator {
            return Err(Error::InvalidInput(format!(
                "coordinator link {} must be a coordinator {} node",
                link_id, kind
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl HierarchySource for PgHierarchyRepository {
    async fn nodes_at_level(
        &self,
        kind: HierarchyKind,
        ids: &[Uuid],
        ancestor_count: usize,
        partition: Partition,
    ) -> Result<Vec<HierarchyNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "WITH RECURSIVE chain AS (
                 SELECT h.id AS node_id, h.parent_id, 0 AS depth
                 FROM hierarchy_node h
                 WHERE h.id = ANY($1) AND h.kind = $2 AND h.partition = $3
                 UNION ALL
                 SELECT c.node_id, p.parent_id, c.depth + 1
                 FROM chain c JOIN hierarchy_node p ON p.id = c.parent_id
                 WHERE c.depth < $5
             ),
             ancestors AS (
                 SELECT node_id, MAX(depth) AS ancestor_count FROM chain GROUP BY node_id
             )
             SELECT {} FROM hierarchy_node n
             JOIN ancestors a ON a.node_id = n.id
             WHERE a.ancestor_count = $4",
            NODE_COLUMNS
        ))
        .bind(ids)
        .bind(kind.as_str())
        .bind(partition.as_str())
        .bind(ancestor_count as i32)
        .bind(MAX_TREE_DEPTH)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(row_to_node).collect()
    }

    async fn ids_under_paths(&self, kind: HierarchyKind, prefixes: &[String]) -> Result<Vec<Uuid>> {
        if prefixes.is_empty() {
            return Ok(Vec::new());
        }

        let patterns: Vec<String> = prefixes
            .iter()
            .map(|p| format!("{}/%", escape_like(p)))
            .collect();

        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM hierarchy_node
             WHERE kind = $1 AND (path = ANY($2) OR path LIKE ANY($3))",
        )
        .bind(kind.as_str())
        .bind(prefixes)
        .bind(&patterns)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn ids_linked_within(
        &self,
        kind: HierarchyKind,
        ids: &[Uuid],
        levels: usize,
    ) -> Result<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_scalar::<_, Uuid>(
            "WITH RECURSIVE up AS (
                 SELECT h.id AS node_id, h.id AS ancestor_id, 0 AS distance
                 FROM hierarchy_node h
                 WHERE h.kind = $1
                 UNION ALL
                 SELECT up.node_id, p.parent_id, up.distance + 1
                 FROM up JOIN hierarchy_node p ON p.id = up.ancestor_id
                 WHERE p.parent_id IS NOT NULL AND up.distance < $3
             )
             SELECT DISTINCT up.node_id
             FROM up JOIN hierarchy_node a ON a.id = up.ancestor_id
             WHERE a.coordinator_link_id = ANY($2)",
        )
        .bind(kind.as_str())
        .bind(ids)
        .bind(levels as i32)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }
}
