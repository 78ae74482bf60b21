//! Hierarchical filter resolution.
//!
//! Turns requested class or location ids into the set of node ids a project
//! must reference to match. Unless `direct` is set, the set covers each
//! requested node's whole subtree, found by path prefix.
//!
//! ## Resolution Order
//!
//! 1. `direct`, coordinator location: the ids plus every planning node whose
//!    own, parent's or grandparent's coordinator link is one of the ids
//! 2. `direct`, otherwise: exactly the ids
//! 3. not `direct`: keep the ids that sit at the requested level in the
//!    requested partition, then take every node under their paths
//!
//! Unknown ids never fail; they match nothing.

use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::defaults::COORDINATOR_LOCATION_LINK_LEVELS;
use crate::error::Result;
use crate::hierarchy::{HierarchyKind, HierarchyLevel, Partition};
use crate::models::{Project, ProjectPhase};
use crate::traits::HierarchySource;

/// Requested ids at one hierarchy level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyFilter {
    pub level: HierarchyLevel,
    pub ids: Vec<Uuid>,
    pub direct: bool,
    pub for_coordinator: bool,
}

impl HierarchyFilter {
    pub fn new(level: HierarchyLevel, ids: Vec<Uuid>) -> Self {
        Self {
            level,
            ids,
            direct: false,
            for_coordinator: false,
        }
    }

    pub fn direct(mut self, direct: bool) -> Self {
        self.direct = direct;
        self
    }

    pub fn for_coordinator(mut self, for_coordinator: bool) -> Self {
        self.for_coordinator = for_coordinator;
        self
    }

    pub fn kind(&self) -> HierarchyKind {
        self.level.kind()
    }

    /// Pick the deepest level that has ids.
    ///
    /// When a request supplies several levels of the same hierarchy, the
    /// most specific one decides.
    pub fn deepest(
        levels: impl IntoIterator<Item = (HierarchyLevel, Vec<Uuid>)>,
        direct: bool,
        for_coordinator: bool,
    ) -> Option<Self> {
        levels
            .into_iter()
            .filter(|(_, ids)| !ids.is_empty())
            .max_by_key(|(level, _)| level.ancestor_count())
            .map(|(level, ids)| {
                HierarchyFilter::new(level, ids)
                    .direct(direct)
                    .for_coordinator(for_coordinator)
            })
    }
}

/// Node ids a project's class or location must hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFilter {
    pub kind: HierarchyKind,
    pub node_ids: HashSet<Uuid>,
    /// Also match projects whose node's coordinator link is in the set.
    pub via_coordinator_link: bool,
}

impl ResolvedFilter {
    pub fn empty(kind: HierarchyKind) -> Self {
        Self {
            kind,
            node_ids: HashSet::new(),
            via_coordinator_link: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    /// Node ids in a stable order, for binding as a query parameter.
    pub fn ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.node_ids.iter().copied().collect();
        ids.sort();
        ids
    }

    /// Whether a project referencing `node_id` (whose coordinator link is
    /// `node_link`) matches.
    pub fn matches(&self, node_id: Option<Uuid>, node_link: Option<Uuid>) -> bool {
        if node_id.is_some_and(|id| self.node_ids.contains(&id)) {
            return true;
        }
        self.via_coordinator_link && node_link.is_some_and(|link| self.node_ids.contains(&link))
    }
}

/// Resolves [`HierarchyFilter`]s against a [`HierarchySource`].
#[derive(Clone)]
pub struct HierarchyResolver<S> {
    source: S,
}

impl<S: HierarchySource> HierarchyResolver<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn resolve(&self, filter: &HierarchyFilter) -> Result<ResolvedFilter> {
        let start = Instant::now();
        let kind = filter.kind();

        if filter.ids.is_empty() {
            return Ok(ResolvedFilter::empty(kind));
        }

        let resolved = if filter.direct {
            self.resolve_direct(filter).await?
        } else {
            self.resolve_subtree(filter).await?
        };

        debug!(
            subsystem = "resolver",
            component = "hierarchy",
            op = "resolve",
            kind = %kind,
            level = filter.level.query_param(),
            direct = filter.direct,
            for_coordinator = filter.for_coordinator,
            requested = filter.ids.len(),
            result_count = resolved.node_ids.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Resolved hierarchy filter"
        );

        Ok(resolved)
    }

    async fn resolve_direct(&self, filter: &HierarchyFilter) -> Result<ResolvedFilter> {
        let kind = filter.kind();
        let mut node_ids: HashSet<Uuid> = filter.ids.iter().copied().collect();

        // Coordinator locations only exist at district level; planning nodes
        // reach them through their own or an ancestor's link.
        if filter.for_coordinator && kind == HierarchyKind::Location {
            let linked = self
                .source
                .ids_linked_within(kind, &filter.ids, COORDINATOR_LOCATION_LINK_LEVELS)
                .await?;
            node_ids.extend(linked);
            return Ok(ResolvedFilter {
                kind,
                node_ids,
                via_coordinator_link: false,
            });
        }

        Ok(ResolvedFilter {
            kind,
            node_ids,
            via_coordinator_link: filter.for_coordinator,
        })
    }

    async fn resolve_subtree(&self, filter: &HierarchyFilter) -> Result<ResolvedFilter> {
        let kind = filter.kind();
        let roots = self
            .source
            .nodes_at_level(
                kind,
                &filter.ids,
                filter.level.ancestor_count(),
                Partition::for_coordinator(filter.for_coordinator),
            )
            .await?;

        let prefixes: Vec<String> = roots.into_iter().map(|node| node.path).collect();
        if prefixes.is_empty() {
            return Ok(ResolvedFilter::empty(kind));
        }

        let node_ids = self
            .source
            .ids_under_paths(kind, &prefixes)
            .await?
            .into_iter()
            .collect();

        Ok(ResolvedFilter {
            kind,
            node_ids,
            via_coordinator_link: filter.for_coordinator,
        })
    }
}

/// Everything a project listing can filter on.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub class: Option<ResolvedFilter>,
    pub location: Option<ResolvedFilter>,
    pub programmed: Option<bool>,
    pub phase: Option<ProjectPhase>,
    pub group_id: Option<Uuid>,
    pub sap_project: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ProjectFilter {
    /// A hierarchy filter resolved to no nodes rules out every project.
    pub fn matches_nothing(&self) -> bool {
        self.class.as_ref().is_some_and(ResolvedFilter::is_empty)
            || self.location.as_ref().is_some_and(ResolvedFilter::is_empty)
    }

    /// In-memory evaluation of the filter, given the coordinator links of
    /// the project's class and location.
    pub fn matches(
        &self,
        project: &Project,
        class_link: Option<Uuid>,
        location_link: Option<Uuid>,
    ) -> bool {
        if let Some(class) = &self.class {
            if !class.matches(project.class_id, class_link) {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if !location.matches(project.location_id, location_link) {
                return false;
            }
        }
        if self.programmed.is_some_and(|p| p != project.programmed) {
            return false;
        }
        if self.phase.is_some() && self.phase != project.phase {
            return false;
        }
        if self.group_id.is_some() && self.group_id != project.group_id {
            return false;
        }
        if let Some(sap) = &self.sap_project {
            if project.sap_id() != Some(sap.as_str()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHierarchy;
    use chrono::Utc;

    fn project(name: &str, class_id: Option<Uuid>, location_id: Option<Uuid>) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            class_id,
            location_id,
            group_id: None,
            programmed: true,
            phase: None,
            planning_start_year: None,
            construction_end_year: None,
            sap_project: None,
            sap_network: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn location_matches(
        tree: &MemoryHierarchy,
        resolved: &ResolvedFilter,
        projects: &[Project],
    ) -> HashSet<String> {
        let filter = ProjectFilter {
            location: Some(resolved.clone()),
            ..Default::default()
        };
        projects
            .iter()
            .filter(|p| {
                let link = p.location_id.and_then(|id| tree.link_of(id));
                filter.matches(p, None, link)
            })
            .map(|p| p.name.clone())
            .collect()
    }

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_district_scenario_direct_and_subtree() {
        let mut tree = MemoryHierarchy::new();
        let d1 = tree.add_root(HierarchyKind::Location, "Itäinen", Partition::Planning);
        let s1 = tree.add_child(d1, "Herttoniemi");
        let _s2 = tree.add_child(d1, "Vartiokylä");
        let d2 = tree.add_root(HierarchyKind::Location, "Läntinen", Partition::Planning);

        let projects = vec![
            project("P1", None, Some(d1)),
            project("P2", None, Some(s1)),
            project("P3", None, Some(d2)),
        ];

        let resolver = HierarchyResolver::new(tree.clone());

        let subtree = resolver
            .resolve(&HierarchyFilter::new(HierarchyLevel::District, vec![d1, d2]))
            .await
            .unwrap();
        assert_eq!(
            location_matches(&tree, &subtree, &projects),
            names(&["P1", "P2", "P3"])
        );

        let direct = resolver
            .resolve(&HierarchyFilter::new(HierarchyLevel::District, vec![d1, d2]).direct(true))
            .await
            .unwrap();
        assert_eq!(
            location_matches(&tree, &direct, &projects),
            names(&["P1", "P3"])
        );
    }

    #[tokio::test]
    async fn test_subtree_equals_explicit_descendant_list() {
        let mut tree = MemoryHierarchy::new();
        let master = tree.add_root(HierarchyKind::Class, "8 03 Kadut", Partition::Planning);
        let class_a = tree.add_child(master, "Uudisrakentaminen");
        let class_b = tree.add_child(master, "Perusparantaminen");
        let sub_a = tree.add_child(class_a, "Koillinen");

        let resolver = HierarchyResolver::new(tree.clone());
        let subtree = resolver
            .resolve(&HierarchyFilter::new(HierarchyLevel::MasterClass, vec![master]))
            .await
            .unwrap();
        let explicit = resolver
            .resolve(
                &HierarchyFilter::new(
                    HierarchyLevel::MasterClass,
                    vec![master, class_a, class_b, sub_a],
                )
                .direct(true),
            )
            .await
            .unwrap();

        assert_eq!(subtree.node_ids, explicit.node_ids);
    }

    #[tokio::test]
    async fn test_sibling_name_prefix_is_not_a_descendant() {
        let mut tree = MemoryHierarchy::new();
        let kadut = tree.add_root(HierarchyKind::Class, "Kadut", Partition::Planning);
        let kadut2 = tree.add_root(HierarchyKind::Class, "Kadut2", Partition::Planning);

        let resolver = HierarchyResolver::new(tree);
        let resolved = resolver
            .resolve(&HierarchyFilter::new(HierarchyLevel::MasterClass, vec![kadut]))
            .await
            .unwrap();

        assert!(resolved.node_ids.contains(&kadut));
        assert!(!resolved.node_ids.contains(&kadut2));
    }

    #[tokio::test]
    async fn test_wrong_level_resolves_to_empty_set() {
        let mut tree = MemoryHierarchy::new();
        let master = tree.add_root(HierarchyKind::Class, "8 03 Kadut", Partition::Planning);
        let class = tree.add_child(master, "Uudisrakentaminen");

        let resolver = HierarchyResolver::new(tree);
        let resolved = resolver
            .resolve(&HierarchyFilter::new(HierarchyLevel::SubClass, vec![master, class]))
            .await
            .unwrap();

        assert!(resolved.is_empty());
        let filter = ProjectFilter {
            class: Some(resolved),
            ..Default::default()
        };
        assert!(filter.matches_nothing());
    }

    #[tokio::test]
    async fn test_wrong_partition_resolves_to_empty_set() {
        let mut tree = MemoryHierarchy::new();
        let planning = tree.add_root(HierarchyKind::Class, "8 03 Kadut", Partition::Planning);

        let resolver = HierarchyResolver::new(tree);
        let resolved = resolver
            .resolve(
                &HierarchyFilter::new(HierarchyLevel::MasterClass, vec![planning])
                    .for_coordinator(true),
            )
            .await
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_ids_match_nothing() {
        let tree = MemoryHierarchy::new();
        let resolver = HierarchyResolver::new(tree);

        let subtree = resolver
            .resolve(&HierarchyFilter::new(HierarchyLevel::Class, vec![Uuid::new_v4()]))
            .await
            .unwrap();
        assert!(subtree.is_empty());

        let p = project("P", Some(Uuid::new_v4()), None);
        let direct = resolver
            .resolve(&HierarchyFilter::new(HierarchyLevel::Class, vec![Uuid::new_v4()]).direct(true))
            .await
            .unwrap();
        assert!(!direct.matches(p.class_id, None));
    }

    #[tokio::test]
    async fn test_coordinator_class_query_matches_through_link() {
        let mut tree = MemoryHierarchy::new();
        let coord_master = tree.add_root(HierarchyKind::Class, "Kadut (K)", Partition::Coordinator);
        let coord_class = tree.add_child(coord_master, "Uudis (K)");
        let planning_master = tree.add_root(HierarchyKind::Class, "8 03 Kadut", Partition::Planning);
        let planning_class = tree.add_child(planning_master, "Uudisrakentaminen");
        tree.link(planning_class, coord_class);

        let linked = project("linked", Some(planning_class), None);
        let unlinked = project("unlinked", Some(planning_master), None);

        let resolver = HierarchyResolver::new(tree.clone());
        let resolved = resolver
            .resolve(
                &HierarchyFilter::new(HierarchyLevel::MasterClass, vec![coord_master])
                    .for_coordinator(true),
            )
            .await
            .unwrap();

        assert!(resolved.via_coordinator_link);
        assert!(resolved.matches(linked.class_id, tree.link_of(planning_class)));
        assert!(!resolved.matches(unlinked.class_id, tree.link_of(planning_master)));
    }

    #[tokio::test]
    async fn test_direct_coordinator_location_follows_two_ancestor_links() {
        let mut tree = MemoryHierarchy::new();
        let coord_district =
            tree.add_root(HierarchyKind::Location, "Itäinen (K)", Partition::Coordinator);
        let district = tree.add_root(HierarchyKind::Location, "Itäinen", Partition::Planning);
        let division = tree.add_child(district, "Herttoniemi");
        let sub_division = tree.add_child(division, "Roihuvuori");
        let sub_level = tree.add_child(sub_division, "Kettutie");
        tree.link(district, coord_district);

        let resolver = HierarchyResolver::new(tree);
        let resolved = resolver
            .resolve(
                &HierarchyFilter::new(HierarchyLevel::District, vec![coord_district])
                    .direct(true)
                    .for_coordinator(true),
            )
            .await
            .unwrap();

        assert!(!resolved.via_coordinator_link);
        assert!(resolved.node_ids.contains(&coord_district));
        assert!(resolved.node_ids.contains(&district));
        assert!(resolved.node_ids.contains(&division));
        assert!(resolved.node_ids.contains(&sub_division));
        assert!(!resolved.node_ids.contains(&sub_level));
    }

    #[test]
    fn test_deepest_level_wins() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let filter = HierarchyFilter::deepest(
            [
                (HierarchyLevel::MasterClass, vec![a]),
                (HierarchyLevel::SubClass, vec![b]),
                (HierarchyLevel::Class, vec![]),
            ],
            true,
            false,
        )
        .unwrap();
        assert_eq!(filter.level, HierarchyLevel::SubClass);
        assert_eq!(filter.ids, vec![b]);
        assert!(filter.direct);

        assert!(HierarchyFilter::deepest([(HierarchyLevel::District, vec![])], false, false).is_none());
    }

    #[test]
    fn test_project_filter_scalar_fields() {
        let mut p = project("P", None, None);
        p.phase = Some(ProjectPhase::Construction);
        p.sap_project = Some("2814I00708".to_string());

        let filter = ProjectFilter {
            programmed: Some(true),
            phase: Some(ProjectPhase::Construction),
            sap_project: Some("2814I00708".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&p, None, None));

        let filter = ProjectFilter {
            programmed: Some(false),
            ..Default::default()
        };
        assert!(!filter.matches(&p, None, None));
    }
}
