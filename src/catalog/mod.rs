//! Catalog reference data: items, abilities and monsters looked up by name

mod store;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combat::Effect;

pub use store::{CatalogKind, CatalogSeed, CatalogStore};

/// Item category that marks an item as a weapon
pub const WEAPON_CATEGORY: &str = "weapon";

/// Catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog entry not found: {0}")]
    NotFound(String),

    #[error("invalid catalog entry: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Item definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: i32,
    #[serde(default)]
    pub damage_dice: Option<String>,
    #[serde(default)]
    pub attack_bonus: i32,
    /// Effect descriptor, `type:value`
    #[serde(default)]
    pub effect: Option<String>,
}

impl ItemRecord {
    pub fn is_weapon(&self) -> bool {
        self.category.eq_ignore_ascii_case(WEAPON_CATEGORY)
    }

    /// Parsed effect, if the item has a well-formed one
    pub fn parsed_effect(&self) -> Option<Effect> {
        self.effect.as_deref().and_then(|e| e.parse().ok())
    }
}

/// Ability (spell, technique) definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityRecord {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Effect descriptor, `type:value[:extra]`
    pub effect: String,
    #[serde(default)]
    pub mana_cost: i32,
}

impl AbilityRecord {
    pub fn parsed_effect(&self) -> Option<Effect> {
        self.effect.parse().ok()
    }
}

/// Monster definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterRecord {
    pub name: String,
    pub max_health: i32,
    #[serde(default)]
    pub attack_bonus: i32,
    pub damage_dice: String,
    pub defense: i32,
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub gold: i32,
}

/// Name resolution used by the combat engine.
///
/// Both lookups return one record per distinct resolvable name, in the
/// order the names first appear. Unknown names are skipped.
pub trait Catalog {
    fn lookup_items(&self, names: &[String]) -> Vec<ItemRecord>;

    fn lookup_abilities(&self, names: &[String]) -> Vec<AbilityRecord>;
}

/// In-memory catalog, loaded from the store for the length of a battle
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    items: HashMap<String, ItemRecord>,
    abilities: HashMap<String, AbilityRecord>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: ItemRecord) -> Self {
        self.insert_item(item);
        self
    }

    pub fn with_ability(mut self, ability: AbilityRecord) -> Self {
        self.insert_ability(ability);
        self
    }

    pub fn insert_item(&mut self, item: ItemRecord) {
        self.items.insert(item.name.clone(), item);
    }

    pub fn insert_ability(&mut self, ability: AbilityRecord) {
        self.abilities.insert(ability.name.clone(), ability);
    }
}

/// Pick the records matching `names`, once each, in first-seen order
fn resolve<T: Clone>(names: &[String], table: &HashMap<String, T>) -> Vec<T> {
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for name in names {
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);
        if let Some(record) = table.get(name) {
            out.push(record.clone());
        }
    }
    out
}

impl Catalog for CatalogSnapshot {
    fn lookup_items(&self, names: &[String]) -> Vec<ItemRecord> {
        resolve(names, &self.items)
    }

    fn lookup_abilities(&self, names: &[String]) -> Vec<AbilityRecord> {
        resolve(names, &self.abilities)
    }
}
