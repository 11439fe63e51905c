//! Character persistence
//!
//! Scalars live in their own columns; attributes, inventory and known
//! abilities are stored as JSON text.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

use super::Character;

/// Character storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("character not found: {0}")]
    NotFound(String),

    #[error("character already exists: {0}")]
    AlreadyExists(String),

    #[error("corrupt character record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Listing entry for a stored character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CharacterSummary {
    pub name: String,
    pub class: String,
    pub level: i64,
    pub updated_at: String,
}

/// Character storage with database backing
pub struct CharacterStore {
    pool: SqlitePool,
}

impl CharacterStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new character; the name must be unused
    pub async fn create(&self, character: &Character) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO characters (
                name, class, level, attributes, health, max_health, mana, max_mana,
                gold, experience, experience_to_next, inventory, abilities,
                unspent_attribute_points, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&character.name)
        .bind(&character.class)
        .bind(i64::from(character.level))
        .bind(serde_json::to_string(&character.attributes)?)
        .bind(character.health)
        .bind(character.max_health)
        .bind(character.mana)
        .bind(character.max_mana)
        .bind(character.gold)
        .bind(i64::from(character.experience))
        .bind(i64::from(character.experience_to_next))
        .bind(serde_json::to_string(&character.inventory)?)
        .bind(serde_json::to_string(&character.abilities)?)
        .bind(i64::from(character.unspent_attribute_points))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!("Created character {}", character.name);
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::AlreadyExists(character.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write back a character that already exists
    pub async fn save(&self, character: &Character) -> Result<(), StoreError> {
        let updated_at = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE characters
            SET class = ?, level = ?, attributes = ?, health = ?, max_health = ?,
                mana = ?, max_mana = ?, gold = ?, experience = ?, experience_to_next = ?,
                inventory = ?, abilities = ?, unspent_attribute_points = ?, updated_at = ?
            WHERE name = ?
            "#,
        )
        .bind(&character.class)
        .bind(i64::from(character.level))
        .bind(serde_json::to_string(&character.attributes)?)
        .bind(character.health)
        .bind(character.max_health)
        .bind(character.mana)
        .bind(character.max_mana)
        .bind(character.gold)
        .bind(i64::from(character.experience))
        .bind(i64::from(character.experience_to_next))
        .bind(serde_json::to_string(&character.inventory)?)
        .bind(serde_json::to_string(&character.abilities)?)
        .bind(i64::from(character.unspent_attribute_points))
        .bind(&updated_at)
        .bind(&character.name)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(character.name.clone()));
        }
        debug!("Saved character {}", character.name);
        Ok(())
    }

    /// Get a character by name
    pub async fn get(&self, name: &str) -> Result<Option<Character>, StoreError> {
        let row: Option<CharacterRow> = sqlx::query_as(
            r#"
            SELECT name, class, level, attributes, health, max_health, mana, max_mana,
                   gold, experience, experience_to_next, inventory, abilities,
                   unspent_attribute_points
            FROM characters WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CharacterRow::into_character).transpose()
    }

    /// Get a character by name, treating absence as an error
    pub async fn load(&self, name: &str) -> Result<Character, StoreError> {
        self.get(name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    pub async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM characters WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All characters, by name
    pub async fn list(&self) -> Result<Vec<CharacterSummary>, StoreError> {
        let rows: Vec<CharacterSummary> = sqlx::query_as(
            "SELECT name, class, level, updated_at FROM characters ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[derive(sqlx::FromRow)]
struct CharacterRow {
    name: String,
    class: String,
    level: i64,
    attributes: String,
    health: i64,
    max_health: i64,
    mana: i64,
    max_mana: i64,
    gold: i64,
    experience: i64,
    experience_to_next: i64,
    inventory: String,
    abilities: String,
    unspent_attribute_points: i64,
}

impl CharacterRow {
    fn into_character(self) -> Result<Character, StoreError> {
        Ok(Character {
            name: self.name,
            class: self.class,
            level: to_u32(self.level).max(1),
            attributes: serde_json::from_str(&self.attributes)?,
            health: to_i32(self.health),
            max_health: to_i32(self.max_health),
            mana: to_i32(self.mana),
            max_mana: to_i32(self.max_mana),
            gold: to_i32(self.gold),
            experience: to_u32(self.experience),
            experience_to_next: to_u32(self.experience_to_next),
            inventory: serde_json::from_str(&self.inventory)?,
            abilities: serde_json::from_str(&self.abilities)?,
            unspent_attribute_points: to_u32(self.unspent_attribute_points),
        })
    }
}

fn to_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn to_u32(v: i64) -> u32 {
    v.clamp(0, i64::from(u32::MAX)) as u32
}
