//! HTTP API module - REST endpoints and WebSocket

mod catalog;
mod characters;
mod error;
mod websocket;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::catalog::CatalogStore;
use crate::character::CharacterStore;
use crate::combat::{BattleManager, DiceRoller};
use crate::db::Database;
use crate::shop::Shop;
use crate::{Config, RulesConfig};
pub use error::{ApiError, ErrorResponse};
pub use websocket::{ClientMessage, ConnectionManager, PlayerSession, ServerMessage};

/// Hands out a die roller per battle
///
/// With a base seed every battle gets the next seed in sequence, so a
/// whole server run can be replayed.
#[derive(Debug, Default)]
pub struct DiceSource {
    base_seed: Option<u64>,
    issued: AtomicU64,
}

impl DiceSource {
    pub fn new(base_seed: Option<u64>) -> Self {
        Self {
            base_seed,
            issued: AtomicU64::new(0),
        }
    }

    pub fn roller(&self) -> DiceRoller {
        match self.base_seed {
            Some(seed) => {
                let n = self.issued.fetch_add(1, Ordering::Relaxed);
                DiceRoller::seeded(seed.wrapping_add(n))
            }
            None => DiceRoller::from_entropy(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub characters: Arc<CharacterStore>,
    pub catalog: Arc<CatalogStore>,
    pub shop: Arc<Shop>,
    pub battles: Arc<BattleManager>,
    pub connections: Arc<ConnectionManager>,
    pub rules: Arc<RulesConfig>,
    pub dice: Arc<DiceSource>,
}

impl AppState {
    pub fn new(db: Arc<Database>, config: &Config) -> Self {
        let pool = db.pool().clone();
        Self {
            characters: Arc::new(CharacterStore::new(pool.clone())),
            catalog: Arc::new(CatalogStore::new(pool.clone())),
            shop: Arc::new(Shop::new(pool)),
            battles: BattleManager::shared(),
            connections: Arc::new(ConnectionManager::new()),
            rules: Arc::new(config.rules.clone()),
            dice: Arc::new(DiceSource::new(config.dice_seed)),
            db,
        }
    }

    /// Run `work` while holding an exclusive claim on a character.
    ///
    /// Fails with 409 if the character is in a battle or another change
    /// is in flight. The claim goes away with the future, even if the
    /// request is dropped before `work` completes.
    pub async fn exclusive<T>(
        &self,
        name: &str,
        work: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, ApiError> {
        let _claim = self.battles.claim(name).await?;
        work.await
    }
}

/// Build the API router
pub fn router(db: Arc<Database>, config: &Config) -> Router {
    let state = AppState::new(db, config);

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .route("/ws", get(websocket::ws_handler))
        .merge(characters::router())
        .merge(catalog::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Root endpoint
async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(RootResponse {
        name: "campaignd",
        version: env!("CARGO_PKG_VERSION"),
        connections: state.connections.count().await,
        battles: state.battles.active_count().await,
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
    connections: usize,
    battles: usize,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "ok",
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                database: "error",
            }),
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}
