//! Character sheet API: creation, listing, awards, abilities, rest and shopping

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, AppState};
use crate::character::{Attribute, Character, CharacterDraft, CharacterSummary, LevelUp};
use crate::shop::Receipt;

/// Build the character router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/characters", get(list_characters).post(create_character))
        .route(
            "/characters/{name}",
            get(get_character).delete(delete_character),
        )
        .route("/characters/{name}/experience", post(award_experience))
        .route("/characters/{name}/attributes", post(assign_attribute))
        .route("/characters/{name}/abilities", post(learn_ability))
        .route("/characters/{name}/rest", post(rest))
        .route("/characters/{name}/purchase", post(purchase))
}

/// Character creation request
#[derive(Debug, Deserialize)]
struct CreateRequest {
    name: String,
    class: String,
    /// One entry per creation point, in the order they are spent
    #[serde(default)]
    points: Vec<Attribute>,
}

#[derive(Debug, Deserialize)]
struct ExperienceRequest {
    amount: u32,
}

#[derive(Debug, Serialize)]
struct ExperienceResponse {
    leveled_up: bool,
    levels: Vec<LevelUp>,
    character: Character,
}

#[derive(Debug, Deserialize)]
struct AttributeRequest {
    attribute: Attribute,
}

#[derive(Debug, Deserialize)]
struct AbilityRequest {
    ability: String,
}

#[derive(Debug, Deserialize)]
struct PurchaseRequest {
    item: String,
}

#[derive(Debug, Serialize)]
struct PurchaseResponse {
    receipt: Receipt,
    character: Character,
}

/// GET /characters
async fn list_characters(
    State(state): State<AppState>,
) -> Result<Json<Vec<CharacterSummary>>, ApiError> {
    Ok(Json(state.characters.list().await?))
}

/// POST /characters
/// Spends every creation point, then stores the new level 1 character
async fn create_character(
    State(state): State<AppState>,
    Json(req): Json<CreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut draft = CharacterDraft::new(&req.name, req.class, state.rules.creation_points)?;
    draft.assign_all(&req.points)?;
    let character = draft.finish(&state.rules.experience_curve)?;

    state.characters.create(&character).await?;
    info!("Created character {} ({})", character.name, character.class);

    Ok((StatusCode::CREATED, Json(character)))
}

/// GET /characters/{name}
async fn get_character(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Character>, ApiError> {
    Ok(Json(state.characters.load(&name).await?))
}

/// DELETE /characters/{name}
async fn delete_character(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .exclusive(&name, async {
            state.characters.delete(&name).await.map_err(ApiError::from)
        })
        .await?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("character not found: {}", name)))
    }
}

/// POST /characters/{name}/experience
/// Master award; may cascade several level-ups
async fn award_experience(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<ExperienceRequest>,
) -> Result<Json<ExperienceResponse>, ApiError> {
    let progression = state.rules.progression();
    let response = state
        .exclusive(&name, async {
            let mut character = state.characters.load(&name).await?;
            let levels = character.gain_experience(req.amount, &progression);
            state.characters.save(&character).await?;
            Ok::<_, ApiError>(ExperienceResponse {
                leveled_up: !levels.is_empty(),
                levels,
                character,
            })
        })
        .await?;

    Ok(Json(response))
}

/// POST /characters/{name}/attributes
/// Spend a point left over from a level-up
async fn assign_attribute(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<AttributeRequest>,
) -> Result<Json<Character>, ApiError> {
    let character = state
        .exclusive(&name, async {
            let mut character = state.characters.load(&name).await?;
            character.assign_attribute_point(req.attribute)?;
            state.characters.save(&character).await?;
            Ok::<_, ApiError>(character)
        })
        .await?;

    Ok(Json(character))
}

/// POST /characters/{name}/abilities
/// Master grant of a catalog ability; learning a known one changes nothing
async fn learn_ability(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<AbilityRequest>,
) -> Result<Json<Character>, ApiError> {
    let character = state
        .exclusive(&name, async {
            let mut character = state.characters.load(&name).await?;
            let ability = state
                .catalog
                .get_ability(&req.ability)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("ability not found: {}", req.ability)))?;

            if character.learn_ability(ability.name) {
                state.characters.save(&character).await?;
                info!("{} learned {}", character.name, req.ability);
            }
            Ok::<_, ApiError>(character)
        })
        .await?;

    Ok(Json(character))
}

/// POST /characters/{name}/rest
async fn rest(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Character>, ApiError> {
    let character = state
        .exclusive(&name, async {
            let mut character = state.characters.load(&name).await?;
            character.rest();
            state.characters.save(&character).await?;
            Ok::<_, ApiError>(character)
        })
        .await?;

    Ok(Json(character))
}

/// POST /characters/{name}/purchase
async fn purchase(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let (character, receipt) = state
        .exclusive(&name, async {
            state
                .shop
                .buy(&name, &req.item)
                .await
                .map_err(ApiError::from)
        })
        .await?;

    Ok(Json(PurchaseResponse { receipt, character }))
}
