//! Load the ingredient catalogue from a JSON or CSV fixture.
//!
//! ```bash
//! load-ingredients --file data/ingredients.json
//! load-ingredients -f config.yaml --file data/ingredients.csv --clear
//! ```
//!
//! Existing (name, unit) pairs are skipped, so the command can be re-run safely.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use foodgram::{
    config::{self, Config},
    db::{self, handlers::Ingredients},
    ingredients_import, migrator, telemetry,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load ingredients from a JSON or CSV fixture", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "FOODGRAM_CONFIG", default_value = "config.yaml")]
    config: String,

    /// Fixture to load (.json or .csv)
    #[arg(long, default_value = "data/ingredients.json")]
    file: PathBuf,

    /// Delete every ingredient before loading. Recipe lines using them are removed too.
    #[arg(long)]
    clear: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&config::Args {
        config: args.config.clone(),
        validate: false,
    })?;

    telemetry::init_telemetry()?;

    let parsed = ingredients_import::parse_file(&args.file)?;
    info!("Parsed {} ingredients from {}", parsed.records.len(), args.file.display());

    let pool = db::connect_with_retry(&config.database).await?;
    migrator().run(&pool).await.context("Failed to run database migrations")?;

    let mut tx = pool.begin().await?;
    if args.clear {
        let removed = Ingredients::new(&mut tx).delete_all().await?;
        info!("Removed {} existing ingredients", removed);
    }
    let summary = ingredients_import::load(&mut tx, &parsed).await?;
    tx.commit().await?;

    info!("Loaded {} ingredients, skipped {}", summary.loaded, summary.skipped);
    pool.close().await;
    Ok(())
}
