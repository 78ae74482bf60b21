//! Query string parsing for the project listing.
//!
//! Hierarchy ids are repeatable (`?district=a&district=b`), so the raw pairs
//! are parsed by hand instead of through a `Deserialize` struct. Every bad
//! value is reported under its parameter name.

use std::collections::BTreeMap;

use uuid::Uuid;

use investo_core::defaults::PAGE_LIMIT_MAX;
use investo_core::{HierarchyFilter, HierarchyKind, HierarchyLevel, ProjectPhase};

/// Parsed `GET /api/v1/projects` parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectQuery {
    pub levels: Vec<(HierarchyLevel, Vec<Uuid>)>,
    pub direct: bool,
    pub for_coordinator: bool,
    pub programmed: Option<bool>,
    pub phase: Option<ProjectPhase>,
    pub group_id: Option<Uuid>,
    pub sap_project: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Boolean-ish flag: `true`/`True` or `false`/`False`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "true" | "True" => Some(true),
        "false" | "False" => Some(false),
        _ => None,
    }
}

impl ProjectQuery {
    pub fn parse(pairs: &[(String, String)]) -> Result<Self, BTreeMap<String, String>> {
        let mut query = ProjectQuery::default();
        let mut errors = BTreeMap::new();
        let mut levels: BTreeMap<&'static str, (HierarchyLevel, Vec<Uuid>)> = BTreeMap::new();

        for (key, value) in pairs {
            if let Some(level) = HierarchyLevel::from_query_param(key) {
                match Uuid::parse_str(value.trim()) {
                    Ok(id) => levels
                        .entry(level.query_param())
                        .or_insert_with(|| (level, Vec::new()))
                        .1
                        .push(id),
                    Err(_) => {
                        errors
                            .entry(key.clone())
                            .or_insert_with(|| format!("'{}' is not a valid UUID", value));
                    }
                }
                continue;
            }

            match key.as_str() {
                "direct" | "forCoordinator" | "programmed" => match parse_flag(value) {
                    Some(flag) => match key.as_str() {
                        "direct" => query.direct = flag,
                        "forCoordinator" => query.for_coordinator = flag,
                        _ => query.programmed = Some(flag),
                    },
                    None => {
                        errors.insert(
                            key.clone(),
                            format!("'{}' is not one of true, True, false, False", value),
                        );
                    }
                },
                "phase" => match value.parse::<ProjectPhase>() {
                    Ok(phase) => query.phase = Some(phase),
                    Err(e) => {
                        errors.insert(key.clone(), e.to_string());
                    }
                },
                "group" => match Uuid::parse_str(value.trim()) {
                    Ok(id) => query.group_id = Some(id),
                    Err(_) => {
                        errors.insert(key.clone(), format!("'{}' is not a valid UUID", value));
                    }
                },
                "sapProject" => {
                    let trimmed = value.trim();
                    if !trimmed.is_empty() {
                        query.sap_project = Some(trimmed.to_string());
                    }
                }
                "limit" => match value.parse::<i64>() {
                    Ok(n) if (1..=PAGE_LIMIT_MAX).contains(&n) => query.limit = Some(n),
                    _ => {
                        errors.insert(
                            key.clone(),
                            format!("must be an integer between 1 and {}", PAGE_LIMIT_MAX),
                        );
                    }
                },
                "offset" => match value.parse::<i64>() {
                    Ok(n) if n >= 0 => query.offset = Some(n),
                    _ => {
                        errors.insert(key.clone(), "must be a non-negative integer".to_string());
                    }
                },
                _ => {}
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        query.levels = levels.into_values().collect();
        Ok(query)
    }

    /// Filter for one hierarchy, using its deepest supplied level.
    pub fn hierarchy_filter(&self, kind: HierarchyKind) -> Option<HierarchyFilter> {
        HierarchyFilter::deepest(
            self.levels
                .iter()
                .filter(|(level, _)| level.kind() == kind)
                .cloned(),
            self.direct,
            self.for_coordinator,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_repeated_ids_collect_per_level() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let query = ProjectQuery::parse(&pairs(&[
            ("district", &a.to_string()),
            ("district", &b.to_string()),
            ("direct", "True"),
        ]))
        .unwrap();

        let filter = query.hierarchy_filter(HierarchyKind::Location).unwrap();
        assert_eq!(filter.level, HierarchyLevel::District);
        assert_eq!(filter.ids, vec![a, b]);
        assert!(filter.direct);
        assert!(query.hierarchy_filter(HierarchyKind::Class).is_none());
    }

    #[test]
    fn test_deepest_level_of_a_kind_wins() {
        let master = Uuid::new_v4();
        let sub = Uuid::new_v4();
        let query = ProjectQuery::parse(&pairs(&[
            ("subClass", &sub.to_string()),
            ("masterClass", &master.to_string()),
        ]))
        .unwrap();

        let filter = query.hierarchy_filter(HierarchyKind::Class).unwrap();
        assert_eq!(filter.level, HierarchyLevel::SubClass);
        assert_eq!(filter.ids, vec![sub]);
    }

    #[test]
    fn test_errors_are_keyed_by_parameter() {
        let errors = ProjectQuery::parse(&pairs(&[
            ("district", "not-a-uuid"),
            ("direct", "yes"),
            ("limit", "0"),
            ("phase", "demolition"),
        ]))
        .unwrap_err();

        assert_eq!(errors.len(), 4);
        assert!(errors["district"].contains("not-a-uuid"));
        assert!(errors.contains_key("direct"));
        assert!(errors.contains_key("limit"));
        assert!(errors.contains_key("phase"));
    }

    #[test]
    fn test_flag_spellings() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag("False"), Some(false));
        assert_eq!(parse_flag("TRUE"), None);
        assert_eq!(parse_flag("1"), None);
    }

    #[test]
    fn test_unknown_parameters_are_ignored() {
        let query = ProjectQuery::parse(&pairs(&[("ordering", "name")])).unwrap();
        assert_eq!(query, ProjectQuery::default());
    }
}
