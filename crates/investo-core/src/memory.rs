//! In-memory implementations of the storage traits.
//!
//! Used by unit tests across the workspace and as the reference behaviour
//! the PostgreSQL repositories are checked against.
//!
//! ## Usage
//!
//! ```rust
//! use investo_core::memory::MemoryHierarchy;
//! use investo_core::{HierarchyKind, Partition};
//!
//! let mut tree = MemoryHierarchy::new();
//! let district = tree.add_root(HierarchyKind::Location, "Itäinen", Partition::Planning);
//! let division = tree.add_child(district, "Herttoniemi");
//! assert_eq!(tree.ancestor_count(division), Some(1));
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::hierarchy::{child_path, path_under, HierarchyKind, HierarchyNode, Partition};
use crate::models::{SapCostOwner, SapCostRecord, SapCostScope, SapCostWrite};
use crate::traits::{HierarchySource, SapCostRepository};

/// A hierarchy held in a map.
#[derive(Debug, Clone, Default)]
pub struct MemoryHierarchy {
    nodes: HashMap<Uuid, HierarchyNode>,
}

impl MemoryHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, kind: HierarchyKind, name: &str, partition: Partition) -> Uuid {
        self.insert(kind, name, None, partition)
    }

    /// Add a child inheriting kind and partition from `parent`.
    ///
    /// # Panics
    ///
    /// Panics when `parent` is not in the hierarchy.
    pub fn add_child(&mut self, parent: Uuid, name: &str) -> Uuid {
        let (kind, partition) = {
            let parent_node = self.nodes.get(&parent).expect("parent node must exist");
            (parent_node.kind, parent_node.partition)
        };
        self.insert(kind, name, Some(parent), partition)
    }

    /// Point a planning node at its coordinator mirror.
    pub fn link(&mut self, node: Uuid, coordinator: Uuid) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.coordinator_link_id = Some(coordinator);
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&HierarchyNode> {
        self.nodes.get(&id)
    }

    pub fn link_of(&self, id: Uuid) -> Option<Uuid> {
        self.nodes.get(&id).and_then(|n| n.coordinator_link_id)
    }

    pub fn ancestor_count(&self, id: Uuid) -> Option<usize> {
        let mut node = self.nodes.get(&id)?;
        let mut count = 0;
        while let Some(parent) = node.parent_id.and_then(|p| self.nodes.get(&p)) {
            count += 1;
            node = parent;
        }
        Some(count)
    }

    fn insert(
        &mut self,
        kind: HierarchyKind,
        name: &str,
        parent_id: Option<Uuid>,
        partition: Partition,
    ) -> Uuid {
        let id = Uuid::now_v7();
        let parent_path = parent_id
            .and_then(|p| self.nodes.get(&p))
            .map(|p| p.path.clone());
        let now = Utc::now();
        self.nodes.insert(
            id,
            HierarchyNode {
                id,
                kind,
                name: name.to_string(),
                parent_id,
                path: child_path(parent_path.as_deref(), name),
                partition,
                coordinator_link_id: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    fn ancestors(&self, id: Uuid, levels: usize) -> Vec<&HierarchyNode> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);
        while let Some(parent_id) = current {
            if out.len() == levels {
                break;
            }
            match self.nodes.get(&parent_id) {
                Some(parent) => {
                    out.push(parent);
                    current = parent.parent_id;
                }
                None => break,
            }
        }
        out
    }
}

#[async_trait]
impl HierarchySource for MemoryHierarchy {
    async fn nodes_at_level(
        &self,
        kind: HierarchyKind,
        ids: &[Uuid],
        ancestor_count: usize,
        partition: Partition,
    ) -> Result<Vec<HierarchyNode>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|n| n.kind == kind && n.partition == partition)
            .filter(|n| self.ancestor_count(n.id) == Some(ancestor_count))
            .cloned()
            .collect())
    }

    async fn ids_under_paths(&self, kind: HierarchyKind, prefixes: &[String]) -> Result<Vec<Uuid>> {
        Ok(self
            .nodes
            .values()
            .filter(|n| n.kind == kind)
            .filter(|n| prefixes.iter().any(|p| path_under(&n.path, p)))
            .map(|n| n.id)
            .collect())
    }

    async fn ids_linked_within(
        &self,
        kind: HierarchyKind,
        ids: &[Uuid],
        levels: usize,
    ) -> Result<Vec<Uuid>> {
        let wanted: HashSet<Uuid> = ids.iter().copied().collect();
        let hit = |n: &HierarchyNode| n.coordinator_link_id.is_some_and(|l| wanted.contains(&l));

        Ok(self
            .nodes
            .values()
            .filter(|n| n.kind == kind)
            .filter(|n| hit(n) || self.ancestors(n.id, levels).into_iter().any(|a| hit(a)))
            .map(|n| n.id)
            .collect())
    }
}

/// SAP aggregate rows held in a map keyed by scope, owner and year.
#[derive(Debug, Clone, Default)]
pub struct MemorySapCostRepository {
    rows: Arc<Mutex<HashMap<(SapCostScope, SapCostOwner, i32), SapCostRecord>>>,
    batches: Arc<Mutex<usize>>,
}

impl MemorySapCostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `upsert_batch` calls so far.
    pub fn batch_count(&self) -> usize {
        self.batches.lock().map(|b| *b).unwrap_or(0)
    }

    fn lock_err() -> Error {
        Error::Internal("memory SAP cost store poisoned".to_string())
    }
}

#[async_trait]
impl SapCostRepository for MemorySapCostRepository {
    async fn upsert_batch(
        &self,
        scope: SapCostScope,
        year: i32,
        rows: &[SapCostWrite],
    ) -> Result<()> {
        let mut store = self.rows.lock().map_err(|_| Self::lock_err())?;
        for row in rows {
            let key = (scope, row.owner, year);
            let totals = row.totals.rescaled();
            let id = store.get(&key).map(|r| r.id).unwrap_or_else(Uuid::now_v7);
            let (project_id, project_group_id) = match row.owner {
                SapCostOwner::Project(id) => (Some(id), None),
                SapCostOwner::Group(id) => (None, Some(id)),
            };
            store.insert(
                key,
                SapCostRecord {
                    id,
                    project_id,
                    project_group_id,
                    sap_id: row.sap_id.clone(),
                    year,
                    project_task_costs: totals.project_task_costs,
                    project_task_commitments: totals.project_task_commitments,
                    production_task_costs: totals.production_task_costs,
                    production_task_commitments: totals.production_task_commitments,
                    updated_at: Utc::now(),
                },
            );
        }
        *self.batches.lock().map_err(|_| Self::lock_err())? += 1;
        Ok(())
    }

    async fn list_for_year(&self, scope: SapCostScope, year: i32) -> Result<Vec<SapCostRecord>> {
        let store = self.rows.lock().map_err(|_| Self::lock_err())?;
        let mut rows: Vec<SapCostRecord> = store
            .iter()
            .filter(|((s, _, y), _)| *s == scope && *y == year)
            .map(|(_, r)| r.clone())
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn get(
        &self,
        scope: SapCostScope,
        owner: SapCostOwner,
        year: i32,
    ) -> Result<Option<SapCostRecord>> {
        let store = self.rows.lock().map_err(|_| Self::lock_err())?;
        Ok(store.get(&(scope, owner, year)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sap::SapTotals;

    #[test]
    fn test_paths_follow_ancestry() {
        let mut tree = MemoryHierarchy::new();
        let root = tree.add_root(HierarchyKind::Class, "Kadut", Partition::Planning);
        let child = tree.add_child(root, "Uudis");
        let grandchild = tree.add_child(child, "Itä");

        assert_eq!(tree.get(grandchild).unwrap().path, "Kadut/Uudis/Itä");
        assert_eq!(tree.ancestor_count(grandchild), Some(2));
        assert_eq!(tree.get(child).unwrap().partition, Partition::Planning);
    }

    #[tokio::test]
    async fn test_nodes_at_level_filters_kind() {
        let mut tree = MemoryHierarchy::new();
        let class = tree.add_root(HierarchyKind::Class, "Kadut", Partition::Planning);
        let found = tree
            .nodes_at_level(HierarchyKind::Location, &[class], 0, Partition::Planning)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_memory_sap_upsert_replaces() {
        let repo = MemorySapCostRepository::new();
        let owner = SapCostOwner::Project(Uuid::new_v4());
        let write = SapCostWrite {
            owner,
            sap_id: "2814I00708".to_string(),
            totals: SapTotals::zero(),
        };

        repo.upsert_batch(SapCostScope::Cumulative, 2026, &[write.clone()])
            .await
            .unwrap();
        repo.upsert_batch(SapCostScope::Cumulative, 2026, &[write])
            .await
            .unwrap();

        let rows = repo.list_for_year(SapCostScope::Cumulative, 2026).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(repo.batch_count(), 2);
        assert!(repo
            .get(SapCostScope::CurrentYear, owner, 2026)
            .await
            .unwrap()
            .is_none());
    }
}
