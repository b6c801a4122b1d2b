//! # Publisher Main Entry Point
//!
//! CLI entry point for the publishing service. `serve` runs the API with
//! both dispatch triggers; `scan` runs a single due-post sweep for
//! cron-style hosting; `worker` runs only the delayed-job consumer;
//! `migrate` applies pending migrations.

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use migration::{Migrator, MigratorTrait};
use publisher::config::ConfigLoader;
use publisher::server::{build_pipeline, run_server};
use publisher::{db, telemetry};

#[derive(Parser)]
#[command(name = "publisher", about = "Scheduled social publishing pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server with the scanner and dispatch worker
    Serve,
    /// Run one due-post sweep, then exit
    Scan,
    /// Run only the delayed-job worker
    Worker,
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new().load()?;
    config.validate()?;
    telemetry::init_tracing(&config)?;

    if let Ok(redacted_json) = config.redacted_json() {
        tracing::info!(profile = %config.profile, "Loaded configuration: {}", redacted_json);
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config).await,
        Command::Scan => {
            let pool = db::init_pool(&config).await?;
            let pipeline = build_pipeline(&config, &pool)?;
            let stats = pipeline.scanner.sweep().await?;
            tracing::info!(
                due_seen = stats.due_seen,
                published = stats.published,
                retried = stats.retried,
                failed = stats.failed,
                claims_lost = stats.claims_lost,
                errors = stats.errors,
                "Sweep completed"
            );
            Ok(())
        }
        Command::Worker => {
            let pool = db::init_pool(&config).await?;
            let pipeline = build_pipeline(&config, &pool)?;
            let shutdown = CancellationToken::new();

            let worker_token = shutdown.clone();
            let handle = tokio::spawn(pipeline.worker.run(worker_token));

            tokio::signal::ctrl_c().await?;
            shutdown.cancel();
            let _ = handle.await;
            Ok(())
        }
        Command::Migrate => {
            let pool = db::init_pool(&config).await?;
            Migrator::up(&pool, None).await?;
            tracing::info!("Migrations applied");
            Ok(())
        }
    }
}
