//! Effect descriptors carried by items and abilities
//!
//! Catalog entries encode their effect as `type:value[:extra]`, e.g.
//! `heal:10`, `damage:2d6`, `damage:3d4:fire`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::dice::{parse_dice, DiceCommand, DiceRoller, Roll};

/// Effect descriptor parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    #[error("missing ':' in effect descriptor: {0:?}")]
    MissingSeparator(String),

    #[error("unknown effect type: {0:?}")]
    UnknownKind(String),

    #[error("invalid effect value: {0:?}")]
    InvalidValue(String),
}

/// What an effect does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    /// Restores health to the user
    Heal,
    /// Damages the opponent
    Damage,
}

impl FromStr for EffectKind {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heal" | "healing" => Ok(EffectKind::Heal),
            "damage" | "dmg" => Ok(EffectKind::Damage),
            other => Err(EffectError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EffectKind::Heal => "heal",
            EffectKind::Damage => "damage",
        };
        write!(f, "{}", s)
    }
}

/// Magnitude of an effect: a flat number or dice to roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum EffectAmount {
    Flat(i32),
    Dice(DiceCommand),
}

impl EffectAmount {
    /// Resolve the amount, rolling when it is dice
    pub fn resolve(&self, dice: &mut DiceRoller) -> (i32, Roll) {
        match self {
            EffectAmount::Flat(n) => (*n, Roll::default()),
            EffectAmount::Dice(cmd) => {
                let roll = dice.roll_command(*cmd);
                (roll.amount(), roll)
            }
        }
    }
}

impl FromStr for EffectAmount {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i32>() {
            return Ok(EffectAmount::Flat(n));
        }
        parse_dice(s)
            .map(EffectAmount::Dice)
            .map_err(|_| EffectError::InvalidValue(s.to_string()))
    }
}

impl fmt::Display for EffectAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectAmount::Flat(n) => write!(f, "{}", n),
            EffectAmount::Dice(cmd) => write!(f, "{}", cmd),
        }
    }
}

/// A parsed effect descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub amount: EffectAmount,
    /// Free-form trailing data (damage flavour, notes)
    pub extra: Option<String>,
}

impl FromStr for Effect {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let kind = parts.next().unwrap_or_default();
        let value = parts
            .next()
            .ok_or_else(|| EffectError::MissingSeparator(s.to_string()))?;
        let extra = parts
            .next()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        Ok(Effect {
            kind: kind.parse()?,
            amount: value.parse()?,
            extra,
        })
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.amount)?;
        if let Some(extra) = &self.extra {
            write!(f, ":{}", extra)?;
        }
        Ok(())
    }
}
