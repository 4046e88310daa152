//! services/api/src/bin/admin.rs
//!
//! Maintenance commands that operate directly on the database.

use api_lib::{adapters::DbAdapter, error::ApiError};
use cim_analyzer_core::ports::DatabaseService;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "admin", about = "CIM analyzer database maintenance")]
struct Cli {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every registered user.
    ListUsers,
    /// Delete all analysis results and all users.
    Purge {
        /// Required; there is no undo.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&cli.database_url)
        .await?;
    let db = DbAdapter::new(pool);
    db.run_migrations().await?;

    match cli.command {
        Command::ListUsers => {
            for user in db.list_users().await? {
                println!(
                    "{}\t{}",
                    user.id,
                    user.email.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Purge { yes } => {
            if !yes {
                return Err(ApiError::Internal(
                    "refusing to purge without --yes".to_string(),
                ));
            }
            let (results, users) = db.purge_all().await?;
            info!(results, users, "Purged all analysis results and users");
        }
    }
    Ok(())
}
