//! New character drafts
//!
//! A draft starts with every attribute at 10 and a pool of points that
//! must be fully assigned before it becomes a [`Character`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Attribute, Attributes, Character, CharacterError, ExperienceCurve};

/// Points handed out at creation
pub const DEFAULT_CREATION_POINTS: u32 = 6;

const MAX_NAME_LEN: usize = 40;

/// Letters, digits, spaces, hyphens and apostrophes; must start with a letter or digit
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}][\p{L}\p{N} '\-]*$").unwrap());

/// Validate and normalize a character name
pub fn validate_name(name: &str) -> Result<String, CharacterError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN || !NAME_REGEX.is_match(name) {
        return Err(CharacterError::InvalidName(name.to_string()));
    }
    Ok(name.to_string())
}

/// A character under construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterDraft {
    pub name: String,
    pub class: String,
    pub attributes: Attributes,
    pub points_remaining: u32,
}

impl CharacterDraft {
    pub fn new(
        name: &str,
        class: impl Into<String>,
        points: u32,
    ) -> Result<Self, CharacterError> {
        Ok(Self {
            name: validate_name(name)?,
            class: class.into(),
            attributes: Attributes::default(),
            points_remaining: points,
        })
    }

    /// Put one pool point into an attribute
    pub fn assign_point(&mut self, attribute: Attribute) -> Result<i32, CharacterError> {
        if self.points_remaining == 0 {
            return Err(CharacterError::NoAttributePoints);
        }
        self.points_remaining -= 1;
        let score = self.attributes.get_mut(attribute);
        *score += 1;
        Ok(*score)
    }

    /// Assign several points in order
    pub fn assign_all<'a>(
        &mut self,
        attributes: impl IntoIterator<Item = &'a Attribute>,
    ) -> Result<(), CharacterError> {
        for attribute in attributes {
            self.assign_point(*attribute)?;
        }
        Ok(())
    }

    /// Finish the draft. Every pool point must have been spent.
    pub fn finish(self, curve: &ExperienceCurve) -> Result<Character, CharacterError> {
        if self.points_remaining > 0 {
            return Err(CharacterError::PointsRemaining(self.points_remaining));
        }
        Ok(Character::new(self.name, self.class, self.attributes, curve))
    }
}
