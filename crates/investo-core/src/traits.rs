//! Core traits for investo abstractions.
//!
//! These traits define the seams between the domain logic and its
//! collaborators (PostgreSQL, the SAP gateway), so the resolver and the SAP
//! aggregator can run against in-memory implementations in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::hierarchy::{HierarchyKind, HierarchyNode, Partition};
use crate::models::{SapCostOwner, SapCostRecord, SapCostScope, SapCostWrite};
use crate::sap::{SapFetch, SapWindow};

// =============================================================================
// HIERARCHY
// =============================================================================

/// Read access to a class or location hierarchy, as needed by the filter
/// resolver.
#[async_trait]
pub trait HierarchySource: Send + Sync {
    /// Nodes among `ids` that have exactly `ancestor_count` ancestors and
    /// belong to `partition`.
    async fn nodes_at_level(
        &self,
        kind: HierarchyKind,
        ids: &[Uuid],
        ancestor_count: usize,
        partition: Partition,
    ) -> Result<Vec<HierarchyNode>>;

    /// Ids of all nodes whose path equals or lies below any of `prefixes`.
    async fn ids_under_paths(&self, kind: HierarchyKind, prefixes: &[String]) -> Result<Vec<Uuid>>;

    /// Ids of nodes whose own coordinator link, or that of one of their
    /// nearest `levels` ancestors, is in `ids`.
    async fn ids_linked_within(
        &self,
        kind: HierarchyKind,
        ids: &[Uuid],
        levels: usize,
    ) -> Result<Vec<Uuid>>;
}

// =============================================================================
// SAP
// =============================================================================

/// Remote source of SAP line items.
///
/// Implementations report every call that yields no usable line items as
/// [`SapFetch::Failed`]: non-200 responses, unreachable hosts, malformed
/// bodies. A failed call counts as zero and never aborts a sync.
#[async_trait]
pub trait SapBackend: Send + Sync {
    async fn fetch_costs(&self, sap_id: &str, window: &SapWindow) -> Result<SapFetch>;

    async fn fetch_commitments(&self, sap_id: &str, window: &SapWindow) -> Result<SapFetch>;
}

/// Storage for SAP aggregate rows.
#[async_trait]
pub trait SapCostRepository: Send + Sync {
    /// Upsert all rows of one batch atomically.
    async fn upsert_batch(&self, scope: SapCostScope, year: i32, rows: &[SapCostWrite])
        -> Result<()>;

    /// All rows for `year`.
    async fn list_for_year(&self, scope: SapCostScope, year: i32) -> Result<Vec<SapCostRecord>>;

    /// The row of one owner for `year`.
    async fn get(
        &self,
        scope: SapCostScope,
        owner: SapCostOwner,
        year: i32,
    ) -> Result<Option<SapCostRecord>>;
}
