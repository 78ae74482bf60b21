//! Centralized default constants for investo.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for project listings.
pub const PAGE_LIMIT: i64 = 50;

/// Upper bound accepted for the `limit` query parameter.
pub const PAGE_LIMIT_MAX: i64 = 1000;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;

// =============================================================================
// DATABASE
// =============================================================================

/// Default database URL when `DATABASE_URL` is not set.
pub const DATABASE_URL: &str = "postgres://localhost/investo";

/// Default maximum number of pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default pool acquire timeout in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

// =============================================================================
// SERVER
// =============================================================================

/// Default bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const SERVER_PORT: u16 = 3000;

// =============================================================================
// SAP
// =============================================================================

/// Default SAP gateway base URL.
pub const SAP_API_URL: &str = "http://localhost:8080";

/// Default cost endpoint template.
pub const SAP_COSTS_PATH: &str =
    "/sap/opu/odata/sap/ZPS_PROJECT_COSTS_SRV/Costs?$format=json&$filter=Posid eq '{sap_id}' and Budat ge datetime'{start}' and Budat le datetime'{end}'";

/// Default commitment endpoint template.
pub const SAP_COMMITMENTS_PATH: &str =
    "/sap/opu/odata/sap/ZPS_PROJECT_COSTS_SRV/Commitments?$format=json&$filter=Posid eq '{sap_id}' and Budat ge datetime'{start}' and Budat le datetime'{end}'";

/// SAP request timeout in seconds. SAP calls are not retried.
pub const SAP_TIMEOUT_SECS: u64 = 120;

/// Date-time format of the SAP query window.
pub const SAP_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Decimal scale of stored SAP amounts.
pub const SAP_DECIMAL_SCALE: i64 = 3;

// =============================================================================
// HIERARCHY
// =============================================================================

/// Separator between node names in a materialized path.
pub const PATH_SEPARATOR: char = '/';

/// How many ancestor levels a coordinator location link is followed upwards.
pub const COORDINATOR_LOCATION_LINK_LEVELS: usize = 2;
