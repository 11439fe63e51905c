//! campaignd_init - One-time database initialization tool
//!
//! Creates a campaign database and loads its catalog from a TOML seed file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Campaign database initialization tool
#[derive(Parser, Debug)]
#[command(
    name = "campaignd_init",
    version,
    about = "Initialize a campaign database"
)]
struct Args {
    /// Path to SQLite database file to create
    #[arg(short, long)]
    database: PathBuf,

    /// Catalog seed file (items, abilities, monsters)
    #[arg(short, long)]
    seed: Option<PathBuf>,

    /// Seed into an existing database instead of refusing
    #[arg(long)]
    reseed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaignd=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let seed = match &args.seed {
        Some(path) => {
            let seed = campaignd::init::load_seed(path)?;
            info!(
                "Loaded seed {}: {} items, {} abilities, {} monsters",
                path.display(),
                seed.items.len(),
                seed.abilities.len(),
                seed.monsters.len()
            );
            Some(seed)
        }
        None => None,
    };

    campaignd::init::init_database(&args.database, seed.as_ref(), args.reseed).await?;

    Ok(())
}
