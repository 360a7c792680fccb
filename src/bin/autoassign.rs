//! autoassign CLI: runs the conversation auto-assignment engine.

use clap::{Parser, Subcommand};
use helpdesk_autoassign::assign::{Engine, Registry};
use helpdesk_autoassign::config::Config;
use helpdesk_autoassign::config::secrets::ExposeSecret;
use helpdesk_autoassign::db::Db;
use helpdesk_autoassign::telemetry::{TelemetryConfig, init_telemetry};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "autoassign", about = "Round-robin conversation auto-assignment")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine until interrupted
    Serve {
        /// Seconds between ticks (overrides AUTOASSIGN_INTERVAL_SECS)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Reload teams and run a single assignment cycle
    Once {
        /// Print the cycle report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the round-robin pools built from current team data
    Pools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let guard = init_telemetry(TelemetryConfig::for_service("autoassign", &config))?;

    let db = Arc::new(Db::connect(config.database_url.expose_secret()).await?);
    db.health_check().await?;

    let result = match cli.command {
        Command::Serve { interval } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or(config.autoassign_interval);
            cmd_serve(db, &config, interval).await
        }
        Command::Once { json } => cmd_once(db, &config, json).await,
        Command::Pools => cmd_pools(&db).await,
    };

    guard.force_flush();
    result
}

async fn engine(db: Arc<Db>, config: &Config) -> anyhow::Result<Engine> {
    let system_user = db.system_user(&config.system_user_email).await?;
    Ok(Engine::new(db.clone(), db, system_user).await?)
}

async fn cmd_serve(db: Arc<Db>, config: &Config, interval: Duration) -> anyhow::Result<()> {
    let engine = engine(db, config).await?;
    engine.start(interval)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, stopping");
    engine.stop().await;
    Ok(())
}

async fn cmd_once(db: Arc<Db>, config: &Config, json: bool) -> anyhow::Result<()> {
    let engine = engine(db, config).await?;
    let report = engine.run_cycle().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Fetched:          {}", report.fetched);
    println!("Assigned:         {}", report.assigned);
    println!("No pool:          {}", report.skipped_no_pool);
    println!("Empty pool:       {}", report.skipped_empty_pool);
    println!("At capacity:      {}", report.skipped_capacity);
    println!("Failed:           {}", report.failed);
    Ok(())
}

async fn cmd_pools(db: &Db) -> anyhow::Result<()> {
    let registry = Registry::load(db).await?;

    if registry.is_empty() {
        println!("No round-robin teams.");
        return Ok(());
    }

    println!("{:<8}  {:<8}  {:<8}  MEMBERS", "TEAM", "SIZE", "CAP");
    println!("{}", "-".repeat(60));
    for team_id in registry.team_ids() {
        let entry = registry.get(team_id)?;
        let members: Vec<String> = entry
            .pool
            .members()
            .iter()
            .map(|id| id.to_string())
            .collect();
        println!(
            "{:<8}  {:<8}  {:<8}  {}",
            team_id,
            entry.pool.len(),
            entry.max_auto_assigned_conversations,
            members.join(", ")
        );
    }

    println!("\n{} team(s)", registry.len());
    Ok(())
}
