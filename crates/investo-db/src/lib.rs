//! # investo-db
//!
//! PostgreSQL database layer for investo.
//!
//! This crate provides:
//! - Connection pool management
//! - The class and location hierarchies, with materialized paths
//! - Project and project group storage with hierarchy-aware listing
//! - SAP aggregate tables for both sync scopes
//!
//! ## Example
//!
//! ```rust,ignore
//! use investo_db::{Database, HierarchyFilter, HierarchyLevel, ProjectFilter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/investo").await?;
//!
//!     let filter = HierarchyFilter::new(HierarchyLevel::District, vec![district_id]);
//!     let location = db.resolver().resolve(&filter).await?;
//!     let page = db
//!         .projects
//!         .list(&ProjectFilter { location: Some(location), ..Default::default() })
//!         .await?;
//!
//!     println!("{} projects in the district", page.total);
//!     Ok(())
//! }
//! ```
pub mod groups;
pub mod hierarchy;
pub mod pool;
pub mod projects;
pub mod sap_costs;

// Always compiled so integration tests (in tests/) can use it
pub mod test_fixtures;

// Re-export core types
pub use investo_core::*;

pub use groups::PgProjectGroupRepository;
pub use hierarchy::PgHierarchyRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_usage, PoolConfig};
pub use projects::PgProjectRepository;
pub use sap_costs::PgSapCostRepository;

/// Escape LIKE wildcard characters (`%`, `_`, `\`) in a literal prefix.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Class and location hierarchy nodes.
    pub hierarchy: PgHierarchyRepository,
    pub projects: PgProjectRepository,
    pub groups: PgProjectGroupRepository,
    /// SAP aggregate rows of both scopes.
    pub sap_costs: PgSapCostRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            hierarchy: PgHierarchyRepository::new(pool.clone()),
            projects: PgProjectRepository::new(pool.clone()),
            groups: PgProjectGroupRepository::new(pool.clone()),
            sap_costs: PgSapCostRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Filter resolver backed by the hierarchy table.
    pub fn resolver(&self) -> HierarchyResolver<PgHierarchyRepository> {
        HierarchyResolver::new(self.hierarchy.clone())
    }
}
