#[macro_use]
extern crate diesel;

use clap::Parser;
use tracing::{error, info, warn};

mod cli;
mod competition;
mod config;
mod error;
mod models;
mod schema;
mod store;
mod telemetry;

use cli::Cli;
use store::{pg::PgUnitOfWork, UnitOfWork};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = config::load_config(&cli.config).map_err(|e| format!("Failed to load {}: {}", cli.config, e))?;
    let _guard = telemetry::install(config.tracing_config.as_ref())?;

    // Connect to database
    info!("Connecting to postgres...");
    let pool = store::pg::connect(&config.db_config)?;

    let mut uow = PgUnitOfWork::begin(&pool).await?;
    match cli::run(&cli.command, &mut uow).await {
        Ok(output) => {
            uow.commit().await?;
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            if e.is_not_found() {
                warn!("{:?}: {}", cli.command, e);
            } else {
                error!("{:?} failed: {}", cli.command, e);
            }
            uow.rollback().await?;
            Err(e.into())
        }
    }
}
