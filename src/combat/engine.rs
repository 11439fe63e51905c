//! Turn-based battle state machine
//!
//! A [`Battle`] never blocks waiting for the player. Every call returns a
//! [`TurnReport`] describing what happened and the [`Decision`] the battle
//! is now waiting on; the caller feeds the choice back in whenever it
//! arrives, from whatever transport.
//!
//! ```text
//! ChooseAction ──(item|ability)──> ChooseItem | ChooseAbility
//!      │                                   │
//!      └─────────── turn consumed <────────┘
//!                        │
//!        monster down? ──┴── monster attacks ── character down? ── next round
//!              │                                     │
//!        ChooseAttribute* ── Finished(Won)     Finished(Lost)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::dice::{DiceRoller, UNARMED_DICE};
use super::effects::{Effect, EffectKind};
use super::monster::Monster;
use crate::catalog::{AbilityRecord, Catalog, ItemRecord};
use crate::character::{Attribute, Character, LevelUp, Progression};

/// Battle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BattleError {
    #[error("{0} has no health left to fight with")]
    CombatantDown(String),

    #[error("battle is already over")]
    Finished,

    #[error("battle is not waiting for {0}")]
    UnexpectedInput(&'static str),

    #[error("battle not found: {0}")]
    NotFound(String),

    /// Claimed by a battle or by a change in flight
    #[error("{0} is busy")]
    CharacterBusy(String),
}

/// How a battle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleOutcome {
    Won,
    Lost,
    Fled,
}

impl fmt::Display for BattleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BattleOutcome::Won => "won",
            BattleOutcome::Lost => "lost",
            BattleOutcome::Fled => "fled",
        };
        write!(f, "{}", s)
    }
}

/// Main menu entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Attack,
    UseItem,
    UseAbility,
    Flee,
}

impl Action {
    pub const MENU: [Action; 4] = [
        Action::Attack,
        Action::UseItem,
        Action::UseAbility,
        Action::Flee,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Action::Attack => "Attack",
            Action::UseItem => "Use Item",
            Action::UseAbility => "Use Ability",
            Action::Flee => "Flee",
        }
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "a" | "attack" => Ok(Action::Attack),
            "2" | "i" | "item" | "use item" => Ok(Action::UseItem),
            "3" | "c" | "cast" | "ability" | "use ability" => Ok(Action::UseAbility),
            "4" | "f" | "flee" | "run" => Ok(Action::Flee),
            _ => Err(()),
        }
    }
}

/// One line of a numbered sub-menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub name: String,
    pub effect: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mana_cost: Option<i32>,
}

/// What the battle is waiting for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    ChooseAction { options: Vec<String> },
    ChooseItem { options: Vec<MenuEntry> },
    ChooseAbility { options: Vec<MenuEntry>, mana: i32 },
    ChooseAttribute { points: u32, options: Vec<Attribute> },
    Finished { outcome: BattleOutcome },
}

/// Something that happened during a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleEvent {
    Started {
        character: String,
        monster: String,
        monster_health: i32,
    },
    PlayerAttack {
        weapon: String,
        roll: u32,
        total: i32,
        defense: i32,
        hit: bool,
        damage: i32,
        monster_health: i32,
    },
    ItemUsed {
        item: String,
    },
    AbilityCast {
        ability: String,
        mana_cost: i32,
        mana: i32,
    },
    EffectApplied {
        kind: EffectKind,
        amount: i32,
        rolls: Vec<u32>,
        target: String,
        target_health: i32,
    },
    NoUsableItems,
    NoAbilities,
    InsufficientMana {
        ability: String,
        mana_cost: i32,
        mana: i32,
    },
    InvalidSelection {
        input: String,
    },
    MonsterAttack {
        roll: u32,
        total: i32,
        defense: i32,
        hit: bool,
        damage: i32,
        health: i32,
    },
    MonsterDefeated {
        monster: String,
    },
    CharacterDefeated {
        character: String,
    },
    Rewards {
        gold: i32,
        experience: u32,
    },
    LeveledUp(LevelUp),
    AttributeRaised {
        attribute: Attribute,
        score: i32,
    },
    Fled,
}

/// Result of feeding one input to a battle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    pub events: Vec<BattleEvent>,
    pub decision: Decision,
}

enum Phase {
    Action,
    Item(Vec<ItemRecord>),
    Ability(Vec<AbilityRecord>),
    Attribute { pending: u32 },
    Finished(BattleOutcome),
}

/// A single encounter between one character and one monster
pub struct Battle<C: Catalog> {
    id: String,
    character: Character,
    monster: Monster,
    catalog: C,
    dice: DiceRoller,
    progression: Progression,
    phase: Phase,
    round: u32,
}

impl<C: Catalog> Battle<C> {
    /// Start an encounter. Both combatants must have positive health.
    pub fn new(
        character: Character,
        monster: Monster,
        catalog: C,
        dice: DiceRoller,
        progression: Progression,
    ) -> Result<Self, BattleError> {
        if character.is_defeated() {
            return Err(BattleError::CombatantDown(character.name));
        }
        if monster.is_defeated() {
            return Err(BattleError::CombatantDown(monster.name));
        }

        info!("{} engages {}", character.name, monster.name);

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            character,
            monster,
            catalog,
            dice,
            progression,
            phase: Phase::Action,
            round: 1,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn monster(&self) -> &Monster {
        &self.monster
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        match self.phase {
            Phase::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome().is_some()
    }

    /// Hand the character back once the battle is over
    pub fn into_character(self) -> Character {
        self.character
    }

    /// Report for the opening of the battle
    pub fn opening(&self) -> TurnReport {
        TurnReport {
            events: vec![BattleEvent::Started {
                character: self.character.name.clone(),
                monster: self.monster.name.clone(),
                monster_health: self.monster.health,
            }],
            decision: self.decision(),
        }
    }

    /// The decision the battle is currently waiting on
    pub fn decision(&self) -> Decision {
        match &self.phase {
            Phase::Action => Decision::ChooseAction {
                options: Action::MENU.iter().map(|a| a.label().to_string()).collect(),
            },
            Phase::Item(items) => Decision::ChooseItem {
                options: items
                    .iter()
                    .map(|i| MenuEntry {
                        name: i.name.clone(),
                        effect: i.effect.clone().unwrap_or_default(),
                        mana_cost: None,
                    })
                    .collect(),
            },
            Phase::Ability(abilities) => Decision::ChooseAbility {
                options: abilities
                    .iter()
                    .map(|a| MenuEntry {
                        name: a.name.clone(),
                        effect: a.effect.clone(),
                        mana_cost: Some(a.mana_cost),
                    })
                    .collect(),
                mana: self.character.mana,
            },
            Phase::Attribute { pending } => Decision::ChooseAttribute {
                points: *pending,
                options: Attribute::ALL.to_vec(),
            },
            Phase::Finished(outcome) => Decision::Finished { outcome: *outcome },
        }
    }

    /// Feed raw player text, interpreted against the pending decision.
    ///
    /// Unrecognised text is reported as an invalid selection and never
    /// consumes the turn.
    pub fn submit(&mut self, input: &str) -> Result<TurnReport, BattleError> {
        match &self.phase {
            Phase::Finished(_) => Err(BattleError::Finished),
            Phase::Action => match input.parse::<Action>() {
                Ok(action) => self.act(action),
                Err(()) => Ok(self.invalid(input)),
            },
            Phase::Item(_) | Phase::Ability(_) => match input.trim().parse::<usize>() {
                Ok(index) => self.choose(index),
                Err(_) => {
                    self.phase = Phase::Action;
                    Ok(self.invalid(input))
                }
            },
            Phase::Attribute { .. } => {
                let trimmed = input.trim();
                let attribute = trimmed
                    .parse::<usize>()
                    .ok()
                    .and_then(Attribute::from_menu_index)
                    .or_else(|| trimmed.parse::<Attribute>().ok());
                match attribute {
                    Some(attribute) => self.choose_attribute(attribute),
                    None => Ok(self.invalid(input)),
                }
            }
        }
    }

    /// Take a main menu action
    pub fn act(&mut self, action: Action) -> Result<TurnReport, BattleError> {
        self.expect_phase(matches!(self.phase, Phase::Action), "an action")?;

        let mut events = Vec::new();
        match action {
            Action::Attack => {
                self.player_attack(&mut events);
                self.end_player_turn(&mut events);
            }
            Action::UseItem => {
                let items: Vec<ItemRecord> = self
                    .catalog
                    .lookup_items(&self.character.inventory)
                    .into_iter()
                    .filter(|i| i.parsed_effect().is_some())
                    .collect();
                if items.is_empty() {
                    events.push(BattleEvent::NoUsableItems);
                } else {
                    self.phase = Phase::Item(items);
                }
            }
            Action::UseAbility => {
                let known: Vec<String> = self.character.abilities.iter().cloned().collect();
                let abilities: Vec<AbilityRecord> = self
                    .catalog
                    .lookup_abilities(&known)
                    .into_iter()
                    .filter(|a| a.parsed_effect().is_some())
                    .collect();
                if abilities.is_empty() {
                    events.push(BattleEvent::NoAbilities);
                } else {
                    self.phase = Phase::Ability(abilities);
                }
            }
            Action::Flee => {
                info!("{} fled from {}", self.character.name, self.monster.name);
                events.push(BattleEvent::Fled);
                self.phase = Phase::Finished(BattleOutcome::Fled);
            }
        }

        Ok(self.report(events))
    }

    /// Pick a 1-based entry from the item or ability menu.
    ///
    /// An out-of-range choice, or an ability the character cannot pay
    /// for, returns to the main menu without using the turn.
    pub fn choose(&mut self, index: usize) -> Result<TurnReport, BattleError> {
        let phase = std::mem::replace(&mut self.phase, Phase::Action);
        let mut events = Vec::new();

        match phase {
            Phase::Item(items) => match index.checked_sub(1).and_then(|i| items.get(i)) {
                Some(item) => {
                    self.use_item(item, &mut events);
                    self.end_player_turn(&mut events);
                }
                None => events.push(invalid_event(index)),
            },
            Phase::Ability(abilities) => {
                match index.checked_sub(1).and_then(|i| abilities.get(i)) {
                    Some(ability) => {
                        if self.cast(ability, &mut events) {
                            self.end_player_turn(&mut events);
                        }
                    }
                    None => events.push(invalid_event(index)),
                }
            }
            other => {
                self.phase = other;
                return Err(BattleError::UnexpectedInput("a menu choice"));
            }
        }

        Ok(self.report(events))
    }

    /// Spend a level-up point gained from this battle
    pub fn choose_attribute(&mut self, attribute: Attribute) -> Result<TurnReport, BattleError> {
        let pending = match self.phase {
            Phase::Attribute { pending } => pending,
            Phase::Finished(_) => return Err(BattleError::Finished),
            _ => return Err(BattleError::UnexpectedInput("an attribute choice")),
        };

        let mut events = Vec::new();
        match self.character.assign_attribute_point(attribute) {
            Ok(score) => {
                events.push(BattleEvent::AttributeRaised { attribute, score });
                let pending = pending.saturating_sub(1);
                self.phase = if pending == 0 || self.character.unspent_attribute_points == 0 {
                    Phase::Finished(BattleOutcome::Won)
                } else {
                    Phase::Attribute { pending }
                };
            }
            Err(_) => self.phase = Phase::Finished(BattleOutcome::Won),
        }

        Ok(self.report(events))
    }

    /// End the battle early, e.g. on disconnect.
    ///
    /// A battle already won keeps its rewards; unspent attribute points stay
    /// on the character. Anything still in progress counts as fleeing.
    pub fn abandon(&mut self) -> BattleOutcome {
        let outcome = match self.phase {
            Phase::Finished(outcome) => outcome,
            Phase::Attribute { .. } => BattleOutcome::Won,
            _ => {
                debug!("Battle {} abandoned", self.id);
                BattleOutcome::Fled
            }
        };
        self.phase = Phase::Finished(outcome);
        outcome
    }

    fn expect_phase(&self, ok: bool, wanted: &'static str) -> Result<(), BattleError> {
        if ok {
            return Ok(());
        }
        match self.phase {
            Phase::Finished(_) => Err(BattleError::Finished),
            _ => Err(BattleError::UnexpectedInput(wanted)),
        }
    }

    fn report(&self, events: Vec<BattleEvent>) -> TurnReport {
        TurnReport {
            events,
            decision: self.decision(),
        }
    }

    fn invalid(&self, input: &str) -> TurnReport {
        debug!("Invalid selection {:?} in battle {}", input, self.id);
        self.report(vec![BattleEvent::InvalidSelection {
            input: input.trim().to_string(),
        }])
    }

    /// Highest attack bonus wins; the earliest carried weapon wins ties
    fn best_weapon(&self) -> Option<ItemRecord> {
        self.catalog
            .lookup_items(&self.character.inventory)
            .into_iter()
            .filter(ItemRecord::is_weapon)
            .fold(None, |best: Option<ItemRecord>, item| match best {
                Some(b) if item.attack_bonus <= b.attack_bonus => Some(b),
                _ => Some(item),
            })
    }

    fn player_attack(&mut self, events: &mut Vec<BattleEvent>) {
        let weapon = self.best_weapon();
        let (weapon_name, weapon_dice, weapon_bonus) = match &weapon {
            Some(w) => (
                w.name.clone(),
                w.damage_dice.clone().unwrap_or_else(|| UNARMED_DICE.to_string()),
                w.attack_bonus,
            ),
            None => ("unarmed".to_string(), UNARMED_DICE.to_string(), 0),
        };

        let str_mod = self.character.attribute_modifier(Attribute::Strength);
        let roll = self.dice.d20();
        let total = roll as i32 + str_mod + weapon_bonus;
        let hit = total >= self.monster.defense;

        let mut damage = 0;
        if hit {
            let damage_roll = self.dice.roll(&weapon_dice);
            if !damage_roll.is_failure() {
                damage = (damage_roll.amount() + str_mod).max(1);
            }
            self.monster.take_damage(damage);
        }

        events.push(BattleEvent::PlayerAttack {
            weapon: weapon_name,
            roll,
            total,
            defense: self.monster.defense,
            hit,
            damage,
            monster_health: self.monster.health,
        });
    }

    fn use_item(&mut self, item: &ItemRecord, events: &mut Vec<BattleEvent>) {
        events.push(BattleEvent::ItemUsed {
            item: item.name.clone(),
        });
        if let Some(effect) = item.parsed_effect() {
            self.apply_effect(&effect, events);
        }
        self.character.remove_item(&item.name);
    }

    /// Returns false when the ability could not be paid for
    fn cast(&mut self, ability: &AbilityRecord, events: &mut Vec<BattleEvent>) -> bool {
        let cost = ability.mana_cost.max(0);
        if !self.character.spend_mana(cost) {
            events.push(BattleEvent::InsufficientMana {
                ability: ability.name.clone(),
                mana_cost: cost,
                mana: self.character.mana,
            });
            return false;
        }

        events.push(BattleEvent::AbilityCast {
            ability: ability.name.clone(),
            mana_cost: cost,
            mana: self.character.mana,
        });
        if let Some(effect) = ability.parsed_effect() {
            self.apply_effect(&effect, events);
        }
        true
    }

    fn apply_effect(&mut self, effect: &Effect, events: &mut Vec<BattleEvent>) {
        let (amount, roll) = effect.amount.resolve(&mut self.dice);
        let (target, target_health, applied) = match effect.kind {
            EffectKind::Heal => {
                let healed = self.character.heal(amount);
                (self.character.name.clone(), self.character.health, healed)
            }
            EffectKind::Damage => {
                let dealt = self.monster.take_damage(amount);
                (self.monster.name.clone(), self.monster.health, dealt)
            }
        };

        events.push(BattleEvent::EffectApplied {
            kind: effect.kind,
            amount: applied,
            rolls: roll.rolls,
            target,
            target_health,
        });
    }

    /// Monster reply and round bookkeeping after a consumed turn
    fn end_player_turn(&mut self, events: &mut Vec<BattleEvent>) {
        if self.monster.is_defeated() {
            events.push(BattleEvent::MonsterDefeated {
                monster: self.monster.name.clone(),
            });
            self.award_victory(events);
            return;
        }

        self.monster_attack(events);

        if self.character.is_defeated() {
            info!("{} was defeated by {}", self.character.name, self.monster.name);
            events.push(BattleEvent::CharacterDefeated {
                character: self.character.name.clone(),
            });
            self.phase = Phase::Finished(BattleOutcome::Lost);
            return;
        }

        self.round += 1;
        self.phase = Phase::Action;
    }

    fn monster_attack(&mut self, events: &mut Vec<BattleEvent>) {
        let roll = self.dice.d20();
        let total = roll as i32 + self.monster.attack_bonus;
        let defense = self.character.defense();
        let hit = total >= defense;

        let mut damage = 0;
        if hit {
            let damage_roll = self.dice.roll(&self.monster.damage_dice);
            damage = damage_roll.amount().max(0);
            self.character.take_damage(damage);
        }

        events.push(BattleEvent::MonsterAttack {
            roll,
            total,
            defense,
            hit,
            damage,
            health: self.character.health,
        });
    }

    /// Applied once, on the transition out of the fighting phases
    fn award_victory(&mut self, events: &mut Vec<BattleEvent>) {
        let gold = self.monster.gold.max(0);
        let experience = self.monster.experience;

        self.character.gold = self.character.gold.saturating_add(gold);
        events.push(BattleEvent::Rewards { gold, experience });

        let levels = self
            .character
            .gain_experience(experience, &self.progression);
        let pending = levels.len() as u32;
        events.extend(levels.into_iter().map(BattleEvent::LeveledUp));

        info!(
            "{} defeated {} (+{} gold, +{} xp)",
            self.character.name, self.monster.name, gold, experience
        );

        self.phase = if pending > 0 {
            Phase::Attribute { pending }
        } else {
            Phase::Finished(BattleOutcome::Won)
        };
    }
}

fn invalid_event(index: usize) -> BattleEvent {
    BattleEvent::InvalidSelection {
        input: index.to_string(),
    }
}
