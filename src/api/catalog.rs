//! Catalog API - master tools for items, abilities and monsters

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};

use super::{ApiError, AppState};
use crate::catalog::{AbilityRecord, CatalogKind, ItemRecord, MonsterRecord};

/// Build the catalog router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/catalog/items", get(list_items).post(upsert_item))
        .route("/catalog/abilities", get(list_abilities).post(upsert_ability))
        .route("/catalog/monsters", get(list_monsters).post(upsert_monster))
        .route("/catalog/{kind}/{name}", delete(delete_entry))
}

/// GET /catalog/items
/// Shop listing, cheapest first
async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<ItemRecord>>, ApiError> {
    Ok(Json(state.shop.stock().await?))
}

/// POST /catalog/items
async fn upsert_item(
    State(state): State<AppState>,
    Json(item): Json<ItemRecord>,
) -> Result<impl IntoResponse, ApiError> {
    state.catalog.upsert_item(&item).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /catalog/abilities
async fn list_abilities(
    State(state): State<AppState>,
) -> Result<Json<Vec<AbilityRecord>>, ApiError> {
    Ok(Json(state.catalog.list_abilities().await?))
}

/// POST /catalog/abilities
async fn upsert_ability(
    State(state): State<AppState>,
    Json(ability): Json<AbilityRecord>,
) -> Result<impl IntoResponse, ApiError> {
    state.catalog.upsert_ability(&ability).await?;
    Ok((StatusCode::CREATED, Json(ability)))
}

/// GET /catalog/monsters
async fn list_monsters(
    State(state): State<AppState>,
) -> Result<Json<Vec<MonsterRecord>>, ApiError> {
    Ok(Json(state.catalog.list_monsters().await?))
}

/// POST /catalog/monsters
async fn upsert_monster(
    State(state): State<AppState>,
    Json(monster): Json<MonsterRecord>,
) -> Result<impl IntoResponse, ApiError> {
    state.catalog.upsert_monster(&monster).await?;
    Ok((StatusCode::CREATED, Json(monster)))
}

/// DELETE /catalog/{kind}/{name}
async fn delete_entry(
    State(state): State<AppState>,
    Path((kind, name)): Path<(CatalogKind, String)>,
) -> Result<StatusCode, ApiError> {
    if state.catalog.delete(kind, &name).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("catalog entry not found: {}", name)))
    }
}
