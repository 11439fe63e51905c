//! campaignd - tabletop RPG campaign server
//!
//! Characters, a catalog of items, abilities and monsters, and turn-based
//! battles played over WebSocket.

pub mod api;
pub mod catalog;
pub mod character;
pub mod combat;
pub mod db;
pub mod init;
pub mod shop;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use character::{ExperienceCurve, Progression, DEFAULT_CREATION_POINTS};
use db::Database;

/// Game rules that vary between campaigns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub experience_curve: ExperienceCurve,
    /// Added to `max(1, conMod)` on every level-up
    pub level_up_health_bonus: i32,
    /// Attribute points handed out at creation
    pub creation_points: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        let progression = Progression::default();
        Self {
            experience_curve: progression.curve,
            level_up_health_bonus: progression.health_bonus,
            creation_points: DEFAULT_CREATION_POINTS,
        }
    }
}

impl RulesConfig {
    pub fn progression(&self) -> Progression {
        Progression {
            curve: self.experience_curve,
            health_bonus: self.level_up_health_bonus,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// None = in-memory
    pub db_path: Option<String>,
    /// Fixed seed for reproducible battles
    pub dice_seed: Option<u64>,
    pub log_json: bool,
    pub rules: RulesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: None,
            dice_seed: None,
            log_json: false,
            rules: RulesConfig::default(),
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `CAMPAIGND_*` environment variables
    pub fn load(file: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed("CAMPAIGND_").split("__"))
            .extract()
    }
}

/// The campaignd server instance
pub struct Server {
    config: Config,
    db: Arc<Database>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::new(config.db_path.as_deref()).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            db: Arc::new(db),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the database handle
    pub fn db(&self) -> Arc<Database> {
        self.db.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.db.clone(), &self.config)
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run on an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("campaignd listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("campaignd shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
