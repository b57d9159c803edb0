//! Skill levels and the derived combat level
//!
//! Levels are stored in a fixed array indexed by [`Skill`], so every skill
//! is always present.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Trained skills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Skill {
    Offence,
    Defence,
    Healthpoints,
}

impl Skill {
    /// Number of skills
    pub const COUNT: usize = 3;

    /// All skills in index order
    pub const ALL: [Skill; Skill::COUNT] = [Skill::Offence, Skill::Defence, Skill::Healthpoints];

    fn index(self) -> usize {
        self as usize
    }
}

/// Level of every skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillLevels([u32; Skill::COUNT]);

impl SkillLevels {
    /// Create from explicit levels
    pub fn new(offence: u32, defence: u32, healthpoints: u32) -> Self {
        Self([offence, defence, healthpoints])
    }

    /// Level of a skill
    pub fn get(&self, skill: Skill) -> u32 {
        self.0[skill.index()]
    }

    /// Set the level of a skill
    pub fn set(&mut self, skill: Skill, level: u32) {
        self.0[skill.index()] = level;
    }

    /// Iterate `(skill, level)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (Skill, u32)> + '_ {
        Skill::ALL.iter().map(move |s| (*s, self.get(*s)))
    }

    /// Combat level: `(offence + defence + healthpoints) / 2.25`, rounded down
    pub fn combat_level(&self) -> u32 {
        let total = self.get(Skill::Offence) + self.get(Skill::Defence) + self.get(Skill::Healthpoints);
        // total / 2.25 == total * 4 / 9
        total * 4 / 9
    }
}

impl Default for SkillLevels {
    fn default() -> Self {
        Self::new(1, 1, 10)
    }
}

impl Index<Skill> for SkillLevels {
    type Output = u32;

    fn index(&self, skill: Skill) -> &u32 {
        &self.0[skill.index()]
    }
}

impl IndexMut<Skill> for SkillLevels {
    fn index_mut(&mut self, skill: Skill) -> &mut u32 {
        &mut self.0[skill.index()]
    }
}
