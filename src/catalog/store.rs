//! Catalog persistence and lookups

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::{AbilityRecord, CatalogError, CatalogSnapshot, ItemRecord, MonsterRecord};
use crate::character::Character;
use crate::combat::parse_dice;

/// Catalog contents loaded from a seed file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub items: Vec<ItemRecord>,
    #[serde(default)]
    pub abilities: Vec<AbilityRecord>,
    #[serde(default)]
    pub monsters: Vec<MonsterRecord>,
}

/// Catalog storage with database backing
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace an item definition
    pub async fn upsert_item(&self, item: &ItemRecord) -> Result<(), CatalogError> {
        if item.name.trim().is_empty() {
            return Err(CatalogError::Invalid("item name is empty".into()));
        }
        if let Some(dice) = &item.damage_dice {
            parse_dice(dice)
                .map_err(|e| CatalogError::Invalid(format!("{}: {}", item.name, e)))?;
        }

        sqlx::query(
            r#"
            INSERT INTO items (name, category, description, price, damage_dice, attack_bonus, effect)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                category = excluded.category,
                description = excluded.description,
                price = excluded.price,
                damage_dice = excluded.damage_dice,
                attack_bonus = excluded.attack_bonus,
                effect = excluded.effect
            "#,
        )
        .bind(&item.name)
        .bind(&item.category)
        .bind(&item.description)
        .bind(item.price)
        .bind(&item.damage_dice)
        .bind(item.attack_bonus)
        .bind(&item.effect)
        .execute(&self.pool)
        .await?;

        debug!("Stored item {}", item.name);
        Ok(())
    }

    /// Insert or replace an ability definition
    pub async fn upsert_ability(&self, ability: &AbilityRecord) -> Result<(), CatalogError> {
        if ability.name.trim().is_empty() {
            return Err(CatalogError::Invalid("ability name is empty".into()));
        }
        if ability.mana_cost < 0 {
            return Err(CatalogError::Invalid(format!(
                "{}: negative mana cost",
                ability.name
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO abilities (name, description, effect, mana_cost)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                description = excluded.description,
                effect = excluded.effect,
                mana_cost = excluded.mana_cost
            "#,
        )
        .bind(&ability.name)
        .bind(&ability.description)
        .bind(&ability.effect)
        .bind(ability.mana_cost)
        .execute(&self.pool)
        .await?;

        debug!("Stored ability {}", ability.name);
        Ok(())
    }

    /// Insert or replace a monster definition
    pub async fn upsert_monster(&self, monster: &MonsterRecord) -> Result<(), CatalogError> {
        if monster.name.trim().is_empty() {
            return Err(CatalogError::Invalid("monster name is empty".into()));
        }
        if monster.max_health <= 0 {
            return Err(CatalogError::Invalid(format!(
                "{}: max health must be positive",
                monster.name
            )));
        }
        parse_dice(&monster.damage_dice)
            .map_err(|e| CatalogError::Invalid(format!("{}: {}", monster.name, e)))?;

        sqlx::query(
            r#"
            INSERT INTO monsters (name, max_health, attack_bonus, damage_dice, defense, experience, gold)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                max_health = excluded.max_health,
                attack_bonus = excluded.attack_bonus,
                damage_dice = excluded.damage_dice,
                defense = excluded.defense,
                experience = excluded.experience,
                gold = excluded.gold
            "#,
        )
        .bind(&monster.name)
        .bind(monster.max_health)
        .bind(monster.attack_bonus)
        .bind(&monster.damage_dice)
        .bind(monster.defense)
        .bind(i64::from(monster.experience))
        .bind(monster.gold)
        .execute(&self.pool)
        .await?;

        debug!("Stored monster {}", monster.name);
        Ok(())
    }

    /// Load every entry of a seed file
    pub async fn seed(&self, seed: &CatalogSeed) -> Result<(), CatalogError> {
        for item in &seed.items {
            self.upsert_item(item).await?;
        }
        for ability in &seed.abilities {
            self.upsert_ability(ability).await?;
        }
        for monster in &seed.monsters {
            self.upsert_monster(monster).await?;
        }
        info!(
            "Seeded catalog: {} items, {} abilities, {} monsters",
            seed.items.len(),
            seed.abilities.len(),
            seed.monsters.len()
        );
        Ok(())
    }

    /// All items, cheapest first
    pub async fn list_items(&self) -> Result<Vec<ItemRecord>, CatalogError> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            "SELECT name, category, description, price, damage_dice, attack_bonus, effect
             FROM items ORDER BY price, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ItemRow::into_record).collect())
    }

    pub async fn get_item(&self, name: &str) -> Result<Option<ItemRecord>, CatalogError> {
        let row: Option<ItemRow> = sqlx::query_as(
            "SELECT name, category, description, price, damage_dice, attack_bonus, effect
             FROM items WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ItemRow::into_record))
    }

    pub async fn list_abilities(&self) -> Result<Vec<AbilityRecord>, CatalogError> {
        let rows: Vec<AbilityRow> = sqlx::query_as(
            "SELECT name, description, effect, mana_cost FROM abilities ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AbilityRow::into_record).collect())
    }

    pub async fn get_ability(&self, name: &str) -> Result<Option<AbilityRecord>, CatalogError> {
        let row: Option<AbilityRow> = sqlx::query_as(
            "SELECT name, description, effect, mana_cost FROM abilities WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AbilityRow::into_record))
    }

    pub async fn list_monsters(&self) -> Result<Vec<MonsterRecord>, CatalogError> {
        let rows: Vec<MonsterRow> = sqlx::query_as(
            "SELECT name, max_health, attack_bonus, damage_dice, defense, experience, gold
             FROM monsters ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MonsterRow::into_record).collect())
    }

    pub async fn get_monster(&self, name: &str) -> Result<Option<MonsterRecord>, CatalogError> {
        let row: Option<MonsterRow> = sqlx::query_as(
            "SELECT name, max_health, attack_bonus, damage_dice, defense, experience, gold
             FROM monsters WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MonsterRow::into_record))
    }

    /// Pick a random monster for an encounter; `None` when the catalog has none
    pub async fn fetch_random_monster(&self) -> Result<Option<MonsterRecord>, CatalogError> {
        let row: Option<MonsterRow> = sqlx::query_as(
            "SELECT name, max_health, attack_bonus, damage_dice, defense, experience, gold
             FROM monsters ORDER BY RANDOM() LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MonsterRow::into_record))
    }

    /// Resolve item names; unknown names are skipped
    pub async fn lookup_items(&self, names: &[String]) -> Result<Vec<ItemRecord>, CatalogError> {
        let mut out: Vec<ItemRecord> = Vec::new();
        for name in names {
            if out.iter().any(|i| &i.name == name) {
                continue;
            }
            if let Some(item) = self.get_item(name).await? {
                out.push(item);
            }
        }
        Ok(out)
    }

    /// Resolve ability names; unknown names are skipped
    pub async fn lookup_abilities(
        &self,
        names: &[String],
    ) -> Result<Vec<AbilityRecord>, CatalogError> {
        let mut out: Vec<AbilityRecord> = Vec::new();
        for name in names {
            if out.iter().any(|a| &a.name == name) {
                continue;
            }
            if let Some(ability) = self.get_ability(name).await? {
                out.push(ability);
            }
        }
        Ok(out)
    }

    /// Everything a battle can reference for this character
    pub async fn snapshot_for(&self, character: &Character) -> Result<CatalogSnapshot, CatalogError> {
        let mut snapshot = CatalogSnapshot::new();
        for item in self.lookup_items(&character.inventory).await? {
            snapshot.insert_item(item);
        }
        let abilities: Vec<String> = character.abilities.iter().cloned().collect();
        for ability in self.lookup_abilities(&abilities).await? {
            snapshot.insert_ability(ability);
        }
        Ok(snapshot)
    }

    /// Delete an entry from one of the catalog tables
    pub async fn delete(&self, kind: CatalogKind, name: &str) -> Result<bool, CatalogError> {
        let sql = match kind {
            CatalogKind::Items => "DELETE FROM items WHERE name = ?",
            CatalogKind::Abilities => "DELETE FROM abilities WHERE name = ?",
            CatalogKind::Monsters => "DELETE FROM monsters WHERE name = ?",
        };
        let result = sqlx::query(sql).bind(name).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

/// The three catalog tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Items,
    Abilities,
    Monsters,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    name: String,
    category: String,
    description: Option<String>,
    price: i64,
    damage_dice: Option<String>,
    attack_bonus: i64,
    effect: Option<String>,
}

impl ItemRow {
    fn into_record(self) -> ItemRecord {
        ItemRecord {
            name: self.name,
            category: self.category,
            description: self.description,
            price: clamp_i32(self.price),
            damage_dice: self.damage_dice,
            attack_bonus: clamp_i32(self.attack_bonus),
            effect: self.effect,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AbilityRow {
    name: String,
    description: Option<String>,
    effect: String,
    mana_cost: i64,
}

impl AbilityRow {
    fn into_record(self) -> AbilityRecord {
        AbilityRecord {
            name: self.name,
            description: self.description,
            effect: self.effect,
            mana_cost: clamp_i32(self.mana_cost),
        }
    }
}

#[derive(sqlx::FromRow)]
struct MonsterRow {
    name: String,
    max_health: i64,
    attack_bonus: i64,
    damage_dice: String,
    defense: i64,
    experience: i64,
    gold: i64,
}

impl MonsterRow {
    fn into_record(self) -> MonsterRecord {
        MonsterRecord {
            name: self.name,
            max_health: clamp_i32(self.max_health),
            attack_bonus: clamp_i32(self.attack_bonus),
            damage_dice: self.damage_dice,
            defense: clamp_i32(self.defense),
            experience: u32::try_from(self.experience.max(0)).unwrap_or(u32::MAX),
            gold: clamp_i32(self.gold),
        }
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
