//! Database initialization module
//!
//! One-time setup for the campaignd_init tool: create the database and
//! fill the catalog from a seed file.

use std::path::Path;

use anyhow::{bail, Context, Result};
use figment::providers::{Format, Toml};
use figment::Figment;
use tracing::info;

use crate::catalog::{CatalogSeed, CatalogStore};
use crate::db::Database;

/// Read a catalog seed file.
///
/// ```toml
/// [[items]]
/// name = "Potion"
/// category = "consumable"
/// price = 10
/// effect = "heal:10"
///
/// [[monsters]]
/// name = "Goblin"
/// max_health = 7
/// damage_dice = "1d6"
/// defense = 13
/// ```
pub fn load_seed(path: &Path) -> Result<CatalogSeed> {
    if !path.exists() {
        bail!("Seed file not found: {}", path.display());
    }
    Figment::from(Toml::file(path))
        .extract()
        .with_context(|| format!("Failed to parse seed file {}", path.display()))
}

/// Create a database and optionally seed its catalog
///
/// # Errors
/// * Database file already exists and `existing_ok` is false
/// * A seed entry is invalid (bad dice, empty name)
/// * Database creation fails
pub async fn init_database(
    path: &Path,
    seed: Option<&CatalogSeed>,
    existing_ok: bool,
) -> Result<()> {
    if path.exists() && !existing_ok {
        bail!(
            "Database file already exists: {}. Remove it first or pass --reseed.",
            path.display()
        );
    }

    let path_str = path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", path.display()))?;

    info!("Opening database at {}", path.display());
    let db = Database::new(Some(path_str)).await?;

    if let Some(seed) = seed {
        CatalogStore::new(db.pool().clone()).seed(seed).await?;
    }

    db.pool().close().await;
    info!("Database initialization complete");
    Ok(())
}
