//! Structured logging schema and field name constants for investo.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded result, e.g. a SAP call answered non-200 and counted as zero |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), sync summaries |
//! | DEBUG | Decision points: skipped projects, resolved filter sizes |
//! | TRACE | Per-item iteration (SAP line items) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated through a request.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "database", "sap", "resolver"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "client", "sync", "hierarchy"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "fetch", "resolve", "upsert", "reparent"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Project UUID being operated on.
pub const PROJECT_ID: &str = "project_id";

/// Project group UUID being operated on.
pub const GROUP_ID: &str = "group_id";

/// SAP project identifier.
pub const SAP_ID: &str = "sap_id";

/// Hierarchy node UUID.
pub const NODE_ID: &str = "node_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows or ids returned.
pub const RESULT_COUNT: &str = "result_count";

/// HTTP status code of a remote call.
pub const STATUS: &str = "status";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_are_unique() {
        let fields = [
            REQUEST_ID,
            SUBSYSTEM,
            COMPONENT,
            OPERATION,
            PROJECT_ID,
            GROUP_ID,
            SAP_ID,
            NODE_ID,
            DURATION_MS,
            RESULT_COUNT,
            STATUS,
            POOL_SIZE,
            POOL_IDLE,
            DB_TABLE,
            SUCCESS,
            ERROR_MSG,
        ];
        let unique: std::collections::HashSet<_> = fields.iter().collect();
        assert_eq!(unique.len(), fields.len());
    }

    #[test]
    fn test_field_names_are_snake_case() {
        for field in [PROJECT_ID, SAP_ID, DURATION_MS, RESULT_COUNT] {
            assert!(field.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
