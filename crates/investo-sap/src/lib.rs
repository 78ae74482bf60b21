//! # investo-sap
//!
//! SAP integration for investo: an HTTP backend for the SAP gateway's cost
//! and commitment endpoints, and the sync service that aggregates line items
//! into the per-project and per-group SAP tables.
//!
//! ```rust,ignore
//! use investo_sap::{HttpSapBackend, SapConfig, SapSyncService};
//!
//! let backend = HttpSapBackend::new(SapConfig::from_env()?)?;
//! let service = SapSyncService::new(backend, db.sap_costs.clone());
//! let report = service.sync(&projects, SapCostScope::Cumulative, today).await?;
//! ```

pub mod client;
pub mod sync;

pub use client::{HttpSapBackend, SapConfig};
pub use sync::{SapSyncService, SkipReason, SkippedProject, SyncReport};
