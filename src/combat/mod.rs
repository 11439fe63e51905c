//! Combat system module
//!
//! One character against one monster, resolved in turns:
//! - Dice rolling (e.g., "2d6", "d20") from an injectable source
//! - Item and ability effect descriptors
//! - The battle state machine and its pending decisions
//! - Live battle sessions and character ownership

mod dice;
mod effects;
mod engine;
mod monster;
mod state;

pub use dice::{
    parse_dice, DiceCommand, DiceError, DiceRoller, DieSource, Roll, RngSource, ScriptedDice,
    UNARMED_DICE,
};
pub use effects::{Effect, EffectAmount, EffectError, EffectKind};
pub use engine::{
    Action, Battle, BattleError, BattleEvent, BattleOutcome, Decision, MenuEntry, TurnReport,
};
pub use monster::Monster;
pub use state::{BattleManager, BattleStep, Claim, LiveBattle};
