//! Investo SAP sync
//!
//! Pull SAP costs and commitments for every project with a SAP id and store
//! the per-project and per-group totals.
//!
//! Usage:
//!   investo-sap-sync --scope cumulative
//!   investo-sap-sync --scope current-year --sap-id 2814I00708

use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use investo_db::{log_pool_usage, Database, PoolConfig, SapCostScope};
use investo_sap::{HttpSapBackend, SapConfig, SapSyncService};

#[derive(Parser)]
#[command(name = "investo-sap-sync")]
#[command(author, version, about = "Sync SAP costs and commitments into investo")]
struct Cli {
    /// Aggregate table to fill: cumulative or current-year
    #[arg(short, long, default_value = "cumulative", value_parser = parse_scope)]
    scope: SapCostScope,

    /// Only sync projects with this SAP id
    #[arg(long)]
    sap_id: Option<String>,

    /// Database URL (default: DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

fn parse_scope(raw: &str) -> Result<SapCostScope, String> {
    raw.parse().map_err(|e: investo_db::Error| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "investo_sap=info,investo_db=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| investo_db::defaults::DATABASE_URL.to_string());

    let db = Database::connect_with_config(&database_url, PoolConfig::from_env()).await?;
    let backend = HttpSapBackend::new(SapConfig::from_env()?)?;
    let service = SapSyncService::new(backend, db.sap_costs.clone());

    let projects = db.projects.list_with_sap_id(cli.sap_id.as_deref()).await?;
    info!(
        subsystem = "sap",
        component = "cli",
        scope = cli.scope.as_str(),
        result_count = projects.len(),
        "Starting SAP sync"
    );

    let today = chrono::Local::now().date_naive();
    let report = service.sync(&projects, cli.scope, today).await?;
    log_pool_usage(db.pool(), "sap_sync");

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
