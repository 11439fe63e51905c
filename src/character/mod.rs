//! Player characters
//!
//! A character holds identity, the six core attributes, health, mana,
//! gold, inventory, known abilities and progression. Level-ups grant
//! attribute points that must be spent through an explicit choice.

mod creation;
mod progression;
mod store;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use creation::{validate_name, CharacterDraft, DEFAULT_CREATION_POINTS};
pub use progression::{ExperienceCurve, LevelUp, Progression};
pub use store::{CharacterStore, CharacterSummary, StoreError};

/// Score every attribute starts at
pub const BASE_ATTRIBUTE: i32 = 10;

/// Character errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CharacterError {
    #[error("invalid character name: {0:?}")]
    InvalidName(String),

    #[error("unknown attribute: {0:?}")]
    UnknownAttribute(String),

    #[error("no attribute points to spend")]
    NoAttributePoints,

    #[error("{0} attribute points still unassigned")]
    PointsRemaining(u32),
}

/// Attribute modifier: `floor((score - 10) / 2)`
pub fn modifier(score: i32) -> i32 {
    (score - BASE_ATTRIBUTE).div_euclid(2)
}

/// The six core attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Attribute {
    /// All attributes in sheet order
    pub const ALL: [Attribute; 6] = [
        Attribute::Strength,
        Attribute::Dexterity,
        Attribute::Constitution,
        Attribute::Intelligence,
        Attribute::Wisdom,
        Attribute::Charisma,
    ];

    /// Attribute for a 1-based menu position
    pub fn from_menu_index(index: usize) -> Option<Attribute> {
        index.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }
}

impl FromStr for Attribute {
    type Err = CharacterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strength" | "str" => Ok(Attribute::Strength),
            "dexterity" | "dex" => Ok(Attribute::Dexterity),
            "constitution" | "con" => Ok(Attribute::Constitution),
            "intelligence" | "int" => Ok(Attribute::Intelligence),
            "wisdom" | "wis" => Ok(Attribute::Wisdom),
            "charisma" | "cha" => Ok(Attribute::Charisma),
            other => Err(CharacterError::UnknownAttribute(other.to_string())),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Attribute::Strength => "strength",
            Attribute::Dexterity => "dexterity",
            Attribute::Constitution => "constitution",
            Attribute::Intelligence => "intelligence",
            Attribute::Wisdom => "wisdom",
            Attribute::Charisma => "charisma",
        };
        write!(f, "{}", s)
    }
}

/// Attribute scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            strength: BASE_ATTRIBUTE,
            dexterity: BASE_ATTRIBUTE,
            constitution: BASE_ATTRIBUTE,
            intelligence: BASE_ATTRIBUTE,
            wisdom: BASE_ATTRIBUTE,
            charisma: BASE_ATTRIBUTE,
        }
    }
}

impl Attributes {
    pub fn get(&self, attribute: Attribute) -> i32 {
        match attribute {
            Attribute::Strength => self.strength,
            Attribute::Dexterity => self.dexterity,
            Attribute::Constitution => self.constitution,
            Attribute::Intelligence => self.intelligence,
            Attribute::Wisdom => self.wisdom,
            Attribute::Charisma => self.charisma,
        }
    }

    pub fn get_mut(&mut self, attribute: Attribute) -> &mut i32 {
        match attribute {
            Attribute::Strength => &mut self.strength,
            Attribute::Dexterity => &mut self.dexterity,
            Attribute::Constitution => &mut self.constitution,
            Attribute::Intelligence => &mut self.intelligence,
            Attribute::Wisdom => &mut self.wisdom,
            Attribute::Charisma => &mut self.charisma,
        }
    }

    pub fn modifier(&self, attribute: Attribute) -> i32 {
        modifier(self.get(attribute))
    }
}

/// A player character sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Unique name, also the persistence key
    pub name: String,
    pub class: String,
    pub level: u32,
    pub attributes: Attributes,
    /// Current health; at or below zero means defeated
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub gold: i32,
    /// Experience accumulated toward the next level
    pub experience: u32,
    pub experience_to_next: u32,
    /// Item names in acquisition order, duplicates allowed
    pub inventory: Vec<String>,
    /// Known ability names
    pub abilities: BTreeSet<String>,
    /// Points granted by level-ups and not yet assigned
    pub unspent_attribute_points: u32,
}

impl Character {
    /// Create a level 1 character; health and mana derive from the attributes
    pub fn new(
        name: impl Into<String>,
        class: impl Into<String>,
        attributes: Attributes,
        curve: &ExperienceCurve,
    ) -> Self {
        let max_health = (10 + attributes.modifier(Attribute::Constitution)).max(1);
        let max_mana = (10 + attributes.modifier(Attribute::Intelligence) * 2).max(0);

        Self {
            name: name.into(),
            class: class.into(),
            level: 1,
            attributes,
            health: max_health,
            max_health,
            mana: max_mana,
            max_mana,
            gold: 0,
            experience: 0,
            experience_to_next: curve.initial_requirement(),
            inventory: Vec::new(),
            abilities: BTreeSet::new(),
            unspent_attribute_points: 0,
        }
    }

    /// Modifier for one of this character's attributes
    pub fn attribute_modifier(&self, attribute: Attribute) -> i32 {
        self.attributes.modifier(attribute)
    }

    /// Target number a monster's attack must meet
    pub fn defense(&self) -> i32 {
        10 + self.attribute_modifier(Attribute::Dexterity)
    }

    pub fn is_defeated(&self) -> bool {
        self.health <= 0
    }

    /// Add experience, levelling up as many times as the total allows.
    /// Returns every level gained.
    pub fn gain_experience(&mut self, amount: u32, progression: &Progression) -> Vec<LevelUp> {
        self.experience = self.experience.saturating_add(amount);
        debug!("{} gained {} experience", self.name, amount);

        let mut gained = Vec::new();
        while self.experience >= self.experience_to_next && !self.at_level_cap(progression) {
            gained.push(self.level_up(progression));
        }
        gained
    }

    fn at_level_cap(&self, progression: &Progression) -> bool {
        progression
            .curve
            .max_level()
            .is_some_and(|max| self.level >= max)
    }

    /// Advance one level.
    ///
    /// Carries excess experience, raises maximum health by
    /// `max(1, conMod) + health_bonus`, restores health and grants one
    /// attribute point to spend with [`Character::assign_attribute_point`].
    pub fn level_up(&mut self, progression: &Progression) -> LevelUp {
        self.level += 1;
        self.experience = self.experience.saturating_sub(self.experience_to_next);
        if let Some(next) = progression
            .curve
            .requirement_after(self.level, self.experience_to_next)
        {
            self.experience_to_next = next;
        }

        let health_gain =
            self.attribute_modifier(Attribute::Constitution).max(1) + progression.health_bonus;
        self.max_health += health_gain;
        self.health = self.max_health;
        self.unspent_attribute_points += 1;

        info!(
            "{} reached level {} (max health {})",
            self.name, self.level, self.max_health
        );

        LevelUp {
            level: self.level,
            health_gain,
            max_health: self.max_health,
            experience_to_next: self.experience_to_next,
        }
    }

    /// Spend one level-up point on an attribute, returning the new score
    pub fn assign_attribute_point(&mut self, attribute: Attribute) -> Result<i32, CharacterError> {
        if self.unspent_attribute_points == 0 {
            return Err(CharacterError::NoAttributePoints);
        }
        self.unspent_attribute_points -= 1;
        let score = self.attributes.get_mut(attribute);
        *score += 1;
        debug!("{} raised {} to {}", self.name, attribute, *score);
        Ok(*score)
    }

    /// Heal up to maximum health. Non-positive amounts do nothing.
    /// Returns the health actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        if amount <= 0 || self.health >= self.max_health {
            return 0;
        }
        let before = self.health;
        self.health = self.health.saturating_add(amount).min(self.max_health);
        self.health - before
    }

    /// Lose health. The result is not floored at zero.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        self.health = self.health.saturating_sub(amount);
        amount
    }

    /// Deduct mana if enough is available
    pub fn spend_mana(&mut self, amount: i32) -> bool {
        if amount < 0 || self.mana < amount {
            return false;
        }
        self.mana -= amount;
        true
    }

    /// Restore health and mana to their maxima
    pub fn rest(&mut self) {
        self.health = self.max_health;
        self.mana = self.max_mana;
    }

    pub fn add_item(&mut self, name: impl Into<String>) {
        self.inventory.push(name.into());
    }

    /// Remove the first matching item. Returns false if none was carried.
    pub fn remove_item(&mut self, name: &str) -> bool {
        match self.inventory.iter().position(|i| i == name) {
            Some(pos) => {
                self.inventory.remove(pos);
                true
            }
            None => {
                debug!("{} has no {:?} to remove", self.name, name);
                false
            }
        }
    }

    pub fn learn_ability(&mut self, name: impl Into<String>) -> bool {
        self.abilities.insert(name.into())
    }
}
