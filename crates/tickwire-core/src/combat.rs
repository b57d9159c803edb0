//! Combat state machine: `Idle ⇄ InCombat`
//!
//! Transitions are returned as values instead of being fired as callbacks.
//! The owning role decides whether to dispatch them to observers and
//! entity hooks, so replaying commands during reconciliation can never
//! re-fire combat side effects.

use serde::{Deserialize, Serialize};

/// Combat state of an entity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum CombatState {
    #[default]
    Idle,
    /// In combat, leaving when `remaining` reaches zero
    InCombat { remaining: f32 },
}

/// A change of combat state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombatTransition {
    Entered,
    Left,
}

impl CombatTransition {
    /// Whether the entity is in combat after this transition
    pub fn in_combat(&self) -> bool {
        matches!(self, CombatTransition::Entered)
    }
}

impl CombatState {
    /// Whether the entity is in combat
    pub fn in_combat(&self) -> bool {
        matches!(self, CombatState::InCombat { .. })
    }

    /// Seconds left before leaving combat
    pub fn remaining(&self) -> Option<f32> {
        match self {
            CombatState::InCombat { remaining } => Some(*remaining),
            CombatState::Idle => None,
        }
    }

    /// Enter combat, restarting the timer
    ///
    /// Returns `Entered` only when the entity was idle.
    pub fn enter(&mut self, timeout: f32) -> Option<CombatTransition> {
        let was_idle = !self.in_combat();
        *self = CombatState::InCombat { remaining: timeout };
        was_idle.then_some(CombatTransition::Entered)
    }

    /// Leave combat immediately
    pub fn leave(&mut self) -> Option<CombatTransition> {
        let was_in_combat = self.in_combat();
        *self = CombatState::Idle;
        was_in_combat.then_some(CombatTransition::Left)
    }

    /// Count the combat timer down by one tick
    pub fn tick(&mut self, delta: f32) -> Option<CombatTransition> {
        match self {
            CombatState::InCombat { remaining } => {
                *remaining -= delta;
                if *remaining <= 0.0 {
                    *self = CombatState::Idle;
                    Some(CombatTransition::Left)
                } else {
                    None
                }
            }
            CombatState::Idle => None,
        }
    }
}

/// A cooldown that becomes ready once `duration` seconds have accumulated
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cooldown {
    duration: f32,
    elapsed: f32,
}

impl Cooldown {
    /// Create a cooldown that starts ready
    pub fn new(duration: f32) -> Self {
        Self {
            duration,
            elapsed: duration,
        }
    }

    /// Whether the cooldown has elapsed
    pub fn is_ready(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Restart the cooldown
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    /// Accumulate elapsed time
    pub fn tick(&mut self, delta: f32) {
        if self.elapsed < self.duration {
            self.elapsed += delta;
        }
    }
}
