//! Experience requirements and level-up rules

use serde::{Deserialize, Serialize};

/// Cumulative experience needed to reach each level (index 0 = level 1)
const DND_THRESHOLDS: [u32; 20] = [
    0, 300, 900, 2_700, 6_500, 14_000, 23_000, 34_000, 48_000, 64_000, 85_000, 100_000, 120_000,
    140_000, 165_000, 195_000, 225_000, 265_000, 305_000, 355_000,
];

/// How much experience each level requires.
///
/// Requirements are per level: experience resets to the carried-over
/// excess on every level-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExperienceCurve {
    /// Each requirement is the previous one scaled by `percent`, rounded down
    Geometric { start: u32, percent: u32 },
    /// Gaps between the D&D 5e level thresholds, capped at level 20
    Table,
}

impl Default for ExperienceCurve {
    fn default() -> Self {
        ExperienceCurve::Geometric {
            start: 100,
            percent: 150,
        }
    }
}

impl ExperienceCurve {
    /// Requirement for a fresh level 1 character
    pub fn initial_requirement(&self) -> u32 {
        match self {
            ExperienceCurve::Geometric { start, .. } => (*start).max(1),
            ExperienceCurve::Table => DND_THRESHOLDS[1] - DND_THRESHOLDS[0],
        }
    }

    /// Requirement to leave `level`, given the requirement to leave the level before.
    /// `None` once `level` is the cap.
    pub fn requirement_after(&self, level: u32, previous: u32) -> Option<u32> {
        match self {
            ExperienceCurve::Geometric { percent, .. } => {
                let next = u64::from(previous) * u64::from(*percent) / 100;
                Some(u32::try_from(next).unwrap_or(u32::MAX).max(1))
            }
            ExperienceCurve::Table => {
                let level = level as usize;
                if level == 0 || level >= DND_THRESHOLDS.len() {
                    return None;
                }
                Some(DND_THRESHOLDS[level] - DND_THRESHOLDS[level - 1])
            }
        }
    }

    /// Highest reachable level, if any
    pub fn max_level(&self) -> Option<u32> {
        match self {
            ExperienceCurve::Geometric { .. } => None,
            ExperienceCurve::Table => Some(DND_THRESHOLDS.len() as u32),
        }
    }
}

/// Rules applied when a character gains levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub curve: ExperienceCurve,
    /// Flat health added on top of the Constitution modifier per level
    pub health_bonus: i32,
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            curve: ExperienceCurve::default(),
            health_bonus: 5,
        }
    }
}

/// A single level gained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub level: u32,
    pub health_gain: i32,
    pub max_health: i32,
    pub experience_to_next: u32,
}
