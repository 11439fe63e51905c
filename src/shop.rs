//! Buying catalog items with gold

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::{CatalogError, CatalogStore, ItemRecord};
use crate::character::{Character, CharacterStore, StoreError};

/// Shop errors
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("not enough gold: {item} costs {price}, {available} available")]
    InsufficientGold {
        item: String,
        price: i32,
        available: i32,
    },

    #[error("no such item for sale: {0}")]
    UnknownItem(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A completed purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub item: String,
    pub price: i32,
    pub gold_remaining: i32,
}

/// Charge the character for an item and add it to the inventory.
/// Nothing changes when the character cannot pay.
pub fn purchase(character: &mut Character, item: &ItemRecord) -> Result<Receipt, ShopError> {
    let price = item.price.max(0);
    if character.gold < price {
        debug!(
            "{} cannot afford {} ({} < {})",
            character.name, item.name, character.gold, price
        );
        return Err(ShopError::InsufficientGold {
            item: item.name.clone(),
            price,
            available: character.gold,
        });
    }

    character.gold -= price;
    character.add_item(item.name.clone());

    Ok(Receipt {
        item: item.name.clone(),
        price,
        gold_remaining: character.gold,
    })
}

/// Shop backed by the catalog and character tables
pub struct Shop {
    catalog: CatalogStore,
    characters: CharacterStore,
}

impl Shop {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            catalog: CatalogStore::new(pool.clone()),
            characters: CharacterStore::new(pool),
        }
    }

    /// Items for sale, cheapest first
    pub async fn stock(&self) -> Result<Vec<ItemRecord>, ShopError> {
        Ok(self.catalog.list_items().await?)
    }

    /// Buy one item for a stored character and persist the result
    pub async fn buy(
        &self,
        character_name: &str,
        item_name: &str,
    ) -> Result<(Character, Receipt), ShopError> {
        let item = self
            .catalog
            .get_item(item_name)
            .await?
            .ok_or_else(|| ShopError::UnknownItem(item_name.to_string()))?;
        let mut character = self.characters.load(character_name).await?;

        let receipt = purchase(&mut character, &item)?;
        self.characters.save(&character).await?;

        info!(
            "{} bought {} for {} gold",
            character.name, receipt.item, receipt.price
        );
        Ok((character, receipt))
    }
}
