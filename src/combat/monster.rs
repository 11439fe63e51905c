//! Battle-scoped monsters

use serde::{Deserialize, Serialize};

use crate::catalog::MonsterRecord;

/// A monster instance for one encounter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monster {
    pub name: String,
    pub health: i32,
    pub max_health: i32,
    pub attack_bonus: i32,
    pub damage_dice: String,
    pub defense: i32,
    /// Experience awarded when defeated
    pub experience: u32,
    /// Gold dropped when defeated
    pub gold: i32,
}

impl Monster {
    /// Fresh instance at full health
    pub fn from_record(record: &MonsterRecord) -> Self {
        Self {
            name: record.name.clone(),
            health: record.max_health,
            max_health: record.max_health,
            attack_bonus: record.attack_bonus,
            damage_dice: record.damage_dice.clone(),
            defense: record.defense,
            experience: record.experience,
            gold: record.gold,
        }
    }

    pub fn is_defeated(&self) -> bool {
        self.health <= 0
    }

    pub fn take_damage(&mut self, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        self.health = self.health.saturating_sub(amount);
        amount
    }
}
