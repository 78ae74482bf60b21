//! # investo-core
//!
//! Core types, traits, and domain logic for the investo infrastructure
//! investment programming backend.
//!
//! This crate provides the hierarchy model and filter resolver, the SAP task
//! classification and cost arithmetic, and the trait seams that the database
//! and SAP crates implement.

pub mod defaults;
pub mod error;
pub mod hierarchy;
pub mod logging;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod models;
pub mod resolver;
pub mod sap;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use hierarchy::{
    child_path, path_under, rebase_path, validate_node_name, CreateNodeRequest, HierarchyKind,
    HierarchyLevel, HierarchyNode, PathMismatch, Partition, UpdateNodeRequest,
};
pub use models::*;
pub use resolver::{HierarchyFilter, HierarchyResolver, ProjectFilter, ResolvedFilter};
pub use sap::{
    classify_task, combine_group, parse_amount, summarize, SapFetch, SapLineItem, SapTotals,
    SapWindow, TaskGroup,
};
pub use traits::*;
