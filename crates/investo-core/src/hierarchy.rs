//! Class and location hierarchies.
//!
//! Both hierarchies are self-referential trees sharing one node shape. Every
//! node stores its materialized `path` (ancestor names joined with `/`), so
//! a subtree is exactly the set of nodes whose path lies under the root's
//! path. Each tree is further split into a planning partition and a coarser
//! coordinator partition; planning nodes may point at their coordinator
//! mirror through `coordinator_link_id`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::PATH_SEPARATOR;
use crate::error::{Error, Result};

/// Which of the two hierarchies a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyKind {
    Class,
    Location,
}

impl HierarchyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyKind::Class => "class",
            HierarchyKind::Location => "location",
        }
    }
}

impl fmt::Display for HierarchyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HierarchyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "class" => Ok(HierarchyKind::Class),
            "location" => Ok(HierarchyKind::Location),
            other => Err(Error::InvalidInput(format!(
                "unknown hierarchy kind '{}'",
                other
            ))),
        }
    }
}

/// Planning tree or coordinator tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    #[default]
    Planning,
    Coordinator,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Planning => "planning",
            Partition::Coordinator => "coordinator",
        }
    }

    /// Partition selected by a coordinator flag.
    pub fn for_coordinator(for_coordinator: bool) -> Self {
        if for_coordinator {
            Partition::Coordinator
        } else {
            Partition::Planning
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "planning" => Ok(Partition::Planning),
            "coordinator" => Ok(Partition::Coordinator),
            other => Err(Error::InvalidInput(format!("unknown partition '{}'", other))),
        }
    }
}

/// Named depth of a node inside its hierarchy.
///
/// The depth of a node is the number of ancestors it has. Class levels run
/// from `MasterClass` (no parent) down to `OtherClassification` (four
/// ancestors); location levels from `District` down to `SubLevelDistrict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HierarchyLevel {
    MasterClass,
    Class,
    SubClass,
    CollectiveSubLevel,
    OtherClassification,
    District,
    Division,
    SubDivision,
    SubLevelDistrict,
}

impl HierarchyLevel {
    /// Class levels, shallowest first.
    pub const CLASS_LEVELS: [HierarchyLevel; 5] = [
        HierarchyLevel::MasterClass,
        HierarchyLevel::Class,
        HierarchyLevel::SubClass,
        HierarchyLevel::CollectiveSubLevel,
        HierarchyLevel::OtherClassification,
    ];

    /// Location levels, shallowest first.
    pub const LOCATION_LEVELS: [HierarchyLevel; 4] = [
        HierarchyLevel::District,
        HierarchyLevel::Division,
        HierarchyLevel::SubDivision,
        HierarchyLevel::SubLevelDistrict,
    ];

    pub fn kind(&self) -> HierarchyKind {
        match self {
            HierarchyLevel::MasterClass
            | HierarchyLevel::Class
            | HierarchyLevel::SubClass
            | HierarchyLevel::CollectiveSubLevel
            | HierarchyLevel::OtherClassification => HierarchyKind::Class,
            HierarchyLevel::District
            | HierarchyLevel::Division
            | HierarchyLevel::SubDivision
            | HierarchyLevel::SubLevelDistrict => HierarchyKind::Location,
        }
    }

    /// Exact number of ancestors a node at this level has.
    pub fn ancestor_count(&self) -> usize {
        match self {
            HierarchyLevel::MasterClass | HierarchyLevel::District => 0,
            HierarchyLevel::Class | HierarchyLevel::Division => 1,
            HierarchyLevel::SubClass | HierarchyLevel::SubDivision => 2,
            HierarchyLevel::CollectiveSubLevel | HierarchyLevel::SubLevelDistrict => 3,
            HierarchyLevel::OtherClassification => 4,
        }
    }

    /// Name of the HTTP query parameter carrying ids for this level.
    pub fn query_param(&self) -> &'static str {
        match self {
            HierarchyLevel::MasterClass => "masterClass",
            HierarchyLevel::Class => "class",
            HierarchyLevel::SubClass => "subClass",
            HierarchyLevel::CollectiveSubLevel => "collectiveSubLevel",
            HierarchyLevel::OtherClassification => "otherClassification",
            HierarchyLevel::District => "district",
            HierarchyLevel::Division => "division",
            HierarchyLevel::SubDivision => "subDivision",
            HierarchyLevel::SubLevelDistrict => "subLevelDistrict",
        }
    }

    pub fn from_query_param(param: &str) -> Option<Self> {
        Self::CLASS_LEVELS
            .iter()
            .chain(Self::LOCATION_LEVELS.iter())
            .copied()
            .find(|level| level.query_param() == param)
    }
}

/// A class or location node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: Uuid,
    pub kind: HierarchyKind,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub path: String,
    pub partition: Partition,
    pub coordinator_link_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for creating a hierarchy node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNodeRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub partition: Partition,
    #[serde(default)]
    pub coordinator_link_id: Option<Uuid>,
}

/// Partial update of a hierarchy node.
///
/// An absent field is left unchanged; an explicit `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNodeRequest {
    #[serde(default, deserialize_with = "explicit_null")]
    pub parent_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub coordinator_link_id: Option<Option<Uuid>>,
}

fn explicit_null<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A node whose stored path disagrees with the path derived from its ancestry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMismatch {
    pub id: Uuid,
    pub stored_path: String,
    pub expected_path: String,
}

/// Reject names that would corrupt the materialized path.
pub fn validate_node_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("node name must not be empty".to_string()));
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(Error::InvalidInput(format!(
            "node name '{}' must not contain '{}'",
            name, PATH_SEPARATOR
        )));
    }
    Ok(())
}

/// Path of a child named `name` under `parent_path` (or a root when `None`).
pub fn child_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        Some(parent) => format!("{}{}{}", parent, PATH_SEPARATOR, name),
        None => name.to_string(),
    }
}

/// Whether `path` is `prefix` itself or lies below it.
///
/// Matching is aligned on path segments: `"A/B"` is under `"A"`, but
/// `"AB"` is not.
pub fn path_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with(PATH_SEPARATOR),
        None => false,
    }
}

/// Rewrite a descendant path after its subtree root moved from `old_root`
/// to `new_root`. Returns `None` when `path` is not under `old_root`.
pub fn rebase_path(path: &str, old_root: &str, new_root: &str) -> Option<String> {
    if !path_under(path, old_root) {
        return None;
    }
    Some(format!("{}{}", new_root, &path[old_root.len()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ancestor_counts() {
        assert_eq!(HierarchyLevel::MasterClass.ancestor_count(), 0);
        assert_eq!(HierarchyLevel::Class.ancestor_count(), 1);
        assert_eq!(HierarchyLevel::SubClass.ancestor_count(), 2);
        assert_eq!(HierarchyLevel::CollectiveSubLevel.ancestor_count(), 3);
        assert_eq!(HierarchyLevel::OtherClassification.ancestor_count(), 4);
        assert_eq!(HierarchyLevel::District.ancestor_count(), 0);
        assert_eq!(HierarchyLevel::SubLevelDistrict.ancestor_count(), 3);
    }

    #[test]
    fn test_level_kinds() {
        for level in HierarchyLevel::CLASS_LEVELS {
            assert_eq!(level.kind(), HierarchyKind::Class);
        }
        for level in HierarchyLevel::LOCATION_LEVELS {
            assert_eq!(level.kind(), HierarchyKind::Location);
        }
    }

    #[test]
    fn test_query_param_round_trip() {
        for level in HierarchyLevel::CLASS_LEVELS
            .iter()
            .chain(HierarchyLevel::LOCATION_LEVELS.iter())
        {
            assert_eq!(
                HierarchyLevel::from_query_param(level.query_param()),
                Some(*level)
            );
        }
        assert_eq!(HierarchyLevel::from_query_param("direct"), None);
    }

    #[test]
    fn test_path_under_is_segment_aligned() {
        assert!(path_under("Kadut", "Kadut"));
        assert!(path_under("Kadut/Uudis", "Kadut"));
        assert!(path_under("Kadut/Uudis/Itä", "Kadut/Uudis"));
        assert!(!path_under("Kadut2", "Kadut"));
        assert!(!path_under("Kadu", "Kadut"));
        assert!(!path_under("Puistot/Kadut", "Kadut"));
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path(None, "Kadut"), "Kadut");
        assert_eq!(child_path(Some("Kadut"), "Uudis"), "Kadut/Uudis");
    }

    #[test]
    fn test_rebase_path() {
        assert_eq!(
            rebase_path("Old/Node/Leaf", "Old/Node", "New/Node").as_deref(),
            Some("New/Node/Leaf")
        );
        assert_eq!(rebase_path("Other/Leaf", "Old/Node", "New/Node"), None);
    }

    #[test]
    fn test_validate_node_name() {
        assert!(validate_node_name("Koillinen suurpiiri").is_ok());
        assert!(validate_node_name("").is_err());
        assert!(validate_node_name("   ").is_err());
        assert!(validate_node_name("a/b").is_err());
    }

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let absent: UpdateNodeRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.parent_id, None);

        let cleared: UpdateNodeRequest =
            serde_json::from_str(r#"{"parent_id": null}"#).unwrap();
        assert_eq!(cleared.parent_id, Some(None));

        let id = Uuid::new_v4();
        let set: UpdateNodeRequest =
            serde_json::from_value(serde_json::json!({ "coordinator_link_id": id })).unwrap();
        assert_eq!(set.coordinator_link_id, Some(Some(id)));
    }

    #[test]
    fn test_kind_and_partition_parse() {
        assert_eq!("class".parse::<HierarchyKind>().unwrap(), HierarchyKind::Class);
        assert!("region".parse::<HierarchyKind>().is_err());
        assert_eq!(
            "coordinator".parse::<Partition>().unwrap(),
            Partition::Coordinator
        );
        assert_eq!(Partition::for_coordinator(false), Partition::Planning);
    }
}
