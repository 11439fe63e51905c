//! Dice rolling system
//!
//! Parses and rolls dice notation like "2d6", "d20", "3D8".
//! Randomness comes from an injected [`DieSource`] so battles can be
//! replayed with a seed or driven by scripted rolls.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Notation used for unarmed attacks
pub const UNARMED_DICE: &str = "1d2";

/// Dice parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("missing 'd' in dice notation: {0:?}")]
    MissingSeparator(String),

    #[error("invalid dice count: {0:?}")]
    InvalidCount(String),

    #[error("invalid die sides: {0:?}")]
    InvalidSides(String),

    #[error("dice count must be at least 1")]
    ZeroCount,

    #[error("die sides must be at least 1")]
    ZeroSides,
}

/// A parsed `[N]dY` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceCommand {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
}

impl DiceCommand {
    pub fn new(count: u32, sides: u32) -> Self {
        Self { count, sides }
    }
}

impl FromStr for DiceCommand {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl fmt::Display for DiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)
    }
}

/// Parse a dice notation string like "2d6" or "d20"
pub fn parse_dice(notation: &str) -> Result<DiceCommand, DiceError> {
    let notation = notation.trim().to_lowercase();

    let (count_str, sides_str) = notation
        .split_once('d')
        .ok_or_else(|| DiceError::MissingSeparator(notation.clone()))?;

    // "d6" means "1d6"
    let count: u32 = if count_str.is_empty() {
        1
    } else {
        count_str
            .parse()
            .map_err(|_| DiceError::InvalidCount(count_str.to_string()))?
    };

    if count == 0 {
        return Err(DiceError::ZeroCount);
    }

    // A second separator ("2d6d4") leaves a non-numeric right side and is rejected here
    let sides: u32 = sides_str
        .parse()
        .map_err(|_| DiceError::InvalidSides(sides_str.to_string()))?;

    if sides == 0 {
        return Err(DiceError::ZeroSides);
    }

    Ok(DiceCommand { count, sides })
}

/// Outcome of a roll: the total and every individual die in roll order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Roll {
    pub total: i64,
    pub rolls: Vec<u32>,
}

impl Roll {
    /// The sentinel returned for malformed commands
    pub fn failed() -> Self {
        Self::default()
    }

    /// Whether this is the malformed-command sentinel
    pub fn is_failure(&self) -> bool {
        self.rolls.is_empty()
    }

    /// Total clamped into `i32` for applying to hit points
    pub fn amount(&self) -> i32 {
        i32::try_from(self.total).unwrap_or(i32::MAX)
    }
}

/// A source of single die results
pub trait DieSource: Send + Sync {
    /// Return a value in `[1, sides]`
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// Uniform die source backed by any `rand` generator
#[derive(Debug, Clone)]
pub struct RngSource<R>(pub R);

impl<R: Rng + Send + Sync> DieSource for RngSource<R> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.0.random_range(1..=sides)
    }
}

/// Die source that replays a fixed sequence of results.
///
/// Each value is clamped into `[1, sides]` of the die it answers. Once the
/// script runs out every further die rolls 1.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    script: VecDeque<u32>,
}

impl ScriptedDice {
    pub fn new(script: impl IntoIterator<Item = u32>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl DieSource for ScriptedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.script.pop_front().unwrap_or(1).clamp(1, sides.max(1))
    }
}

/// Rolls dice commands against an injected source
pub struct DiceRoller {
    source: Box<dyn DieSource>,
}

impl fmt::Debug for DiceRoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiceRoller").finish_non_exhaustive()
    }
}

impl DiceRoller {
    /// Create a roller over any die source
    pub fn new(source: impl DieSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Roller seeded from the operating system
    pub fn from_entropy() -> Self {
        Self::new(RngSource(StdRng::from_os_rng()))
    }

    /// Deterministic roller for reproducible battles
    pub fn seeded(seed: u64) -> Self {
        Self::new(RngSource(StdRng::seed_from_u64(seed)))
    }

    /// Roller replaying fixed results
    pub fn scripted(script: impl IntoIterator<Item = u32>) -> Self {
        Self::new(ScriptedDice::new(script))
    }

    /// Roll an already parsed command
    pub fn roll_command(&mut self, command: DiceCommand) -> Roll {
        let mut rolls = Vec::with_capacity(command.count.min(1024) as usize);
        let mut total: i64 = 0;

        for _ in 0..command.count {
            let die = self.source.roll_die(command.sides);
            total = total.saturating_add(i64::from(die));
            rolls.push(die);
        }

        Roll { total, rolls }
    }

    /// Roll a notation string. Malformed notation yields [`Roll::failed`].
    pub fn roll(&mut self, notation: &str) -> Roll {
        match self.try_roll(notation) {
            Ok(roll) => roll,
            Err(e) => {
                warn!("Invalid dice command {:?}: {}", notation, e);
                Roll::failed()
            }
        }
    }

    /// Roll a notation string, surfacing parse errors
    pub fn try_roll(&mut self, notation: &str) -> Result<Roll, DiceError> {
        let command = parse_dice(notation)?;
        Ok(self.roll_command(command))
    }

    /// Roll a single d20
    pub fn d20(&mut self) -> u32 {
        self.source.roll_die(20)
    }
}

impl Default for DiceRoller {
    fn default() -> Self {
        Self::from_entropy()
    }
}
