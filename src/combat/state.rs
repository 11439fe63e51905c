//! Battle session tracking
//!
//! Holds in-progress battles by id and makes sure a character is never
//! in two places at once:
//! - one battle per character
//! - no sheet, shop or award changes while a battle owns the character

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::engine::{Battle, BattleError, BattleOutcome, TurnReport};
use crate::catalog::CatalogSnapshot;
use crate::character::Character;

/// Battles as the server runs them
pub type LiveBattle = Battle<CatalogSnapshot>;

/// What a submitted input led to
#[derive(Debug)]
pub enum BattleStep {
    /// Still going; the report carries the next decision
    Continue(TurnReport),
    /// Over; the character is handed back for persistence
    Finished {
        report: TurnReport,
        outcome: BattleOutcome,
        character: Character,
    },
}

#[derive(Default)]
struct Sessions {
    battles: HashMap<String, LiveBattle>,
    /// Character name to battle id; `None` while a claim is being set up
    engaged: HashMap<String, Option<String>>,
}

/// Battle manager for the server
#[derive(Default)]
pub struct BattleManager {
    sessions: RwLock<Sessions>,
}

impl BattleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared instance
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Claim a character for exclusive use. Fails if it is already claimed.
    async fn reserve(&self, name: &str) -> Result<(), BattleError> {
        let mut sessions = self.sessions.write().await;
        if sessions.engaged.contains_key(name) {
            return Err(BattleError::CharacterBusy(name.to_string()));
        }
        sessions.engaged.insert(name.to_string(), None);
        Ok(())
    }

    /// Drop a claim taken with [`BattleManager::reserve`] that never became a battle
    async fn release(&self, name: &str) {
        let mut sessions = self.sessions.write().await;
        Self::release_locked(&mut sessions, name);
    }

    /// Reserve a character for as long as the returned [`Claim`] lives.
    ///
    /// The claim is released on drop, including when the future holding it
    /// is cancelled.
    pub async fn claim(self: &Arc<Self>, name: &str) -> Result<Claim, BattleError> {
        self.reserve(name).await?;
        Ok(Claim {
            manager: Arc::clone(self),
            name: name.to_string(),
        })
    }

    fn release_locked(sessions: &mut Sessions, name: &str) {
        if let Some(None) = sessions.engaged.get(name) {
            sessions.engaged.remove(name);
            debug!("Released claim on {}", name);
        }
    }

    /// Whether a character is claimed or fighting
    pub async fn is_engaged(&self, name: &str) -> bool {
        self.sessions.read().await.engaged.contains_key(name)
    }

    /// Register a new battle. The character may already be reserved by the caller.
    pub async fn start(&self, battle: LiveBattle) -> Result<TurnReport, BattleError> {
        let mut sessions = self.sessions.write().await;
        let name = battle.character().name.clone();

        if let Some(Some(_)) = sessions.engaged.get(&name) {
            return Err(BattleError::CharacterBusy(name));
        }

        let id = battle.id().to_string();
        let report = battle.opening();
        sessions.engaged.insert(name.clone(), Some(id.clone()));
        sessions.battles.insert(id.clone(), battle);

        info!("Battle {} started for {}", id, name);
        Ok(report)
    }

    /// Feed player text to a battle
    pub async fn submit(&self, battle_id: &str, input: &str) -> Result<BattleStep, BattleError> {
        let mut sessions = self.sessions.write().await;
        let battle = sessions
            .battles
            .get_mut(battle_id)
            .ok_or_else(|| BattleError::NotFound(battle_id.to_string()))?;

        let report = battle.submit(input)?;
        match battle.outcome() {
            None => Ok(BattleStep::Continue(report)),
            Some(outcome) => {
                let character = Self::remove(&mut sessions, battle_id)?;
                Ok(BattleStep::Finished {
                    report,
                    outcome,
                    character,
                })
            }
        }
    }

    /// End a battle early and hand the character back
    pub async fn abandon(&self, battle_id: &str) -> Result<(BattleOutcome, Character), BattleError> {
        let mut sessions = self.sessions.write().await;
        let outcome = sessions
            .battles
            .get_mut(battle_id)
            .ok_or_else(|| BattleError::NotFound(battle_id.to_string()))?
            .abandon();

        let character = Self::remove(&mut sessions, battle_id)?;
        Ok((outcome, character))
    }

    /// Number of battles in progress
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.battles.len()
    }

    fn remove(sessions: &mut Sessions, battle_id: &str) -> Result<Character, BattleError> {
        let battle = sessions
            .battles
            .remove(battle_id)
            .ok_or_else(|| BattleError::NotFound(battle_id.to_string()))?;
        let character = battle.into_character();
        sessions.engaged.remove(&character.name);
        debug!("Battle {} closed", battle_id);
        Ok(character)
    }
}

/// Exclusive hold on a character, released when dropped.
///
/// Once a battle is registered for the character the claim no longer
/// owns the entry and dropping it leaves the battle alone.
pub struct Claim {
    manager: Arc<BattleManager>,
    name: String,
}

impl Drop for Claim {
    fn drop(&mut self) {
        match self.manager.sessions.try_write() {
            Ok(mut sessions) => BattleManager::release_locked(&mut sessions, &self.name),
            Err(_) => {
                // Lock is busy; finish the release on the runtime
                let manager = Arc::clone(&self.manager);
                let name = std::mem::take(&mut self.name);
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move { manager.release(&name).await });
                }
            }
        }
    }
}
