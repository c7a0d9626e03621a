use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use purchasing_engine::{
    config,
    db,
    migrator::Migrator,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

#[derive(Parser)]
#[command(name = "migration", about = "Apply or roll back the purchasing schema", version)]
struct Cli {
    /// Overrides the configured database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Option<MigrationCommand>,
}

#[derive(Subcommand)]
enum MigrationCommand {
    /// Apply all pending migrations (default)
    Up,
    /// Roll back the given number of migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Print applied and pending migrations
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut app_config = config::load_config().context("failed to load application config")?;
    config::init_tracing(&app_config.log_level, app_config.log_json);

    if let Some(url) = cli.database_url {
        app_config.database_url = url;
    }

    info!("Starting database migration");
    let pool = db::establish_connection_from_app_config(&app_config)
        .await
        .context("failed to connect to database")?;

    match cli.command.unwrap_or(MigrationCommand::Up) {
        MigrationCommand::Up => {
            db::run_migrations(&pool)
                .await
                .context("failed to apply migrations")?;
        }
        MigrationCommand::Down { steps } => {
            Migrator::down(&pool, Some(steps))
                .await
                .context("failed to roll back migrations")?;
            info!(steps, "Rolled back migrations");
        }
        MigrationCommand::Status => {
            Migrator::status(&pool)
                .await
                .context("failed to read migration status")?;
        }
    }

    info!("Migration completed successfully");
    Ok(())
}
