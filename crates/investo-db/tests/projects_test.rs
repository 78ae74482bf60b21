//! Integration tests for project listing and SAP aggregate storage.
//!
//! Skipped when no test database is reachable.

use bigdecimal::BigDecimal;
use investo_db::test_fixtures::TestDatabase;
use investo_db::{
    CreateNodeRequest, CreateProjectGroupRequest, CreateProjectRequest, HierarchyFilter,
    HierarchyKind, HierarchyLevel, Partition, ProjectFilter, SapCostOwner, SapCostRepository,
    SapCostScope, SapCostWrite, SapTotals,
};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

async fn location(test_db: &TestDatabase, name: &str, parent: Option<Uuid>) -> Uuid {
    test_db
        .db
        .hierarchy
        .create(
            HierarchyKind::Location,
            CreateNodeRequest {
                name: name.to_string(),
                parent_id: parent,
                partition: Partition::Planning,
                coordinator_link_id: None,
            },
        )
        .await
        .unwrap()
        .id
}

async fn class(
    test_db: &TestDatabase,
    name: &str,
    parent: Option<Uuid>,
    partition: Partition,
    link: Option<Uuid>,
) -> Uuid {
    test_db
        .db
        .hierarchy
        .create(
            HierarchyKind::Class,
            CreateNodeRequest {
                name: name.to_string(),
                parent_id: parent,
                partition,
                coordinator_link_id: link,
            },
        )
        .await
        .unwrap()
        .id
}

async fn class_project(test_db: &TestDatabase, name: &str, class_id: Uuid) -> Uuid {
    test_db
        .db
        .projects
        .create(CreateProjectRequest {
            name: name.to_string(),
            class_id: Some(class_id),
            programmed: true,
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

async fn listed_ids(test_db: &TestDatabase, filter: ProjectFilter) -> HashSet<Uuid> {
    test_db
        .db
        .projects
        .list(&filter)
        .await
        .unwrap()
        .projects
        .into_iter()
        .map(|p| p.id)
        .collect()
}

async fn project(test_db: &TestDatabase, name: &str, location_id: Uuid) -> Uuid {
    test_db
        .db
        .projects
        .create(CreateProjectRequest {
            name: name.to_string(),
            location_id: Some(location_id),
            programmed: true,
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_district_filter_direct_and_subtree() {
    let Some(test_db) = TestDatabase::connect().await else {
        return;
    };
    let district = location(&test_db, &test_db.unique_name("Eteläinen"), None).await;
    let division = location(&test_db, "Kamppi", Some(district)).await;
    let sub = location(&test_db, "Etu-Töölö", Some(division)).await;

    project(&test_db, "Project P", district).await;
    project(&test_db, "Project Q", division).await;
    project(&test_db, "Project R", sub).await;

    let resolver = test_db.db.resolver();
    let names = |filter: ProjectFilter| {
        let db = test_db.db.clone();
        async move {
            let mut names: Vec<String> = db
                .projects
                .list(&filter)
                .await
                .unwrap()
                .projects
                .into_iter()
                .map(|p| p.name)
                .collect();
            names.sort();
            names
        }
    };

    let direct = resolver
        .resolve(&HierarchyFilter::new(HierarchyLevel::District, vec![district]).direct(true))
        .await
        .unwrap();
    assert_eq!(
        names(ProjectFilter {
            location: Some(direct),
            ..Default::default()
        })
        .await,
        vec!["Project P"]
    );

    let subtree = resolver
        .resolve(&HierarchyFilter::new(HierarchyLevel::District, vec![district]))
        .await
        .unwrap();
    assert_eq!(
        names(ProjectFilter {
            location: Some(subtree),
            ..Default::default()
        })
        .await,
        vec!["Project P", "Project Q", "Project R"]
    );
}

#[tokio::test]
async fn test_empty_resolution_lists_nothing() {
    let Some(test_db) = TestDatabase::connect().await else {
        return;
    };
    let page = test_db
        .db
        .projects
        .list(&ProjectFilter {
            class: Some(investo_db::ResolvedFilter::empty(HierarchyKind::Class)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(page.projects.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_sap_upsert_is_idempotent_per_owner_and_year() {
    let Some(test_db) = TestDatabase::connect().await else {
        return;
    };
    let group = test_db
        .db
        .groups
        .create(CreateProjectGroupRequest {
            name: test_db.unique_name("Kruunusillat"),
            ..Default::default()
        })
        .await
        .unwrap();

    let totals = SapTotals {
        project_task_costs: BigDecimal::from_str("111.000").unwrap(),
        project_task_commitments: BigDecimal::from_str("333.000").unwrap(),
        ..SapTotals::zero()
    };
    let write = SapCostWrite {
        owner: SapCostOwner::Group(group.id),
        sap_id: "2814I00708".to_string(),
        totals: totals.clone(),
    };

    let repo = &test_db.db.sap_costs;
    repo.upsert_batch(SapCostScope::Cumulative, 2026, &[write.clone()])
        .await
        .unwrap();
    repo.upsert_batch(SapCostScope::Cumulative, 2026, &[write])
        .await
        .unwrap();

    let rows: Vec<_> = repo
        .list_for_year(SapCostScope::Cumulative, 2026)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.project_group_id == Some(group.id))
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].totals(), totals);

    let current = repo
        .get(SapCostScope::CurrentYear, SapCostOwner::Group(group.id), 2026)
        .await
        .unwrap();
    assert!(current.is_none());
}

#[tokio::test]
async fn test_subtree_filter_equals_direct_filter_over_descendants() {
    let Some(test_db) = TestDatabase::connect().await else {
        return;
    };
    let p = Partition::Planning;
    let master = class(&test_db, &test_db.unique_name("8 03 Kadut"), None, p, None).await;
    let new_build = class(&test_db, "Uudisrakentaminen", Some(master), p, None).await;
    let renovation = class(&test_db, "Perusparantaminen", Some(master), p, None).await;
    let north = class(&test_db, "Koillinen suurpiiri", Some(new_build), p, None).await;
    let collective = class(&test_db, "Kokoojakadut", Some(north), p, None).await;
    let other = class(&test_db, &test_db.unique_name("8 04 Puistot"), None, p, None).await;

    let mut expected = HashSet::new();
    for (i, node) in [master, new_build, renovation, north, collective].into_iter().enumerate() {
        expected.insert(class_project(&test_db, &format!("Project {}", i), node).await);
    }
    let outside = class_project(&test_db, "Project outside", other).await;

    let resolver = test_db.db.resolver();
    let subtree = resolver
        .resolve(&HierarchyFilter::new(HierarchyLevel::MasterClass, vec![master]))
        .await
        .unwrap();
    let explicit = resolver
        .resolve(
            &HierarchyFilter::new(
                HierarchyLevel::MasterClass,
                vec![master, new_build, renovation, north, collective],
            )
            .direct(true),
        )
        .await
        .unwrap();
    assert_eq!(subtree.node_ids, explicit.node_ids);

    let by_subtree = listed_ids(
        &test_db,
        ProjectFilter {
            class: Some(subtree),
            ..Default::default()
        },
    )
    .await;
    let by_explicit = listed_ids(
        &test_db,
        ProjectFilter {
            class: Some(explicit),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(by_subtree, expected);
    assert_eq!(by_subtree, by_explicit);
    assert!(!by_subtree.contains(&outside));
}

#[tokio::test]
async fn test_coordinator_class_filter_matches_through_links() {
    let Some(test_db) = TestDatabase::connect().await else {
        return;
    };
    let coordinator_master = class(
        &test_db,
        &test_db.unique_name("Kadut"),
        None,
        Partition::Coordinator,
        None,
    )
    .await;
    let coordinator_child = class(
        &test_db,
        "Uudisrakentaminen",
        Some(coordinator_master),
        Partition::Coordinator,
        None,
    )
    .await;
    let planning_master = class(
        &test_db,
        &test_db.unique_name("8 03 Kadut"),
        None,
        Partition::Planning,
        None,
    )
    .await;
    let linked = class(
        &test_db,
        "Koillinen",
        Some(planning_master),
        Partition::Planning,
        Some(coordinator_child),
    )
    .await;
    let unlinked = class(&test_db, "Eteläinen", Some(planning_master), Partition::Planning, None).await;

    let linked_project = class_project(&test_db, "Linked", linked).await;
    let unlinked_project = class_project(&test_db, "Unlinked", unlinked).await;

    let resolved = test_db
        .db
        .resolver()
        .resolve(
            &HierarchyFilter::new(HierarchyLevel::MasterClass, vec![coordinator_master])
                .for_coordinator(true),
        )
        .await
        .unwrap();
    assert!(resolved.via_coordinator_link);

    let ids = listed_ids(
        &test_db,
        ProjectFilter {
            class: Some(resolved),
            ..Default::default()
        },
    )
    .await;
    assert!(ids.contains(&linked_project));
    assert!(!ids.contains(&unlinked_project));
}
