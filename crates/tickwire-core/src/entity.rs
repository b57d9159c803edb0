//! Entity state and the deterministic step function
//!
//! [`step`] is the one movement step shared by client prediction, client
//! replay and the authoritative server. Its output depends only on the
//! state, the command and the fixed [`StepParams`]: no randomness, no
//! clock, no side effects. Reconciliation relies on that.

use crate::{
    combat::{CombatState, CombatTransition},
    Command, MovementKeys, NetConfig, Observers, Skill, SkillLevels, Vec2,
};
use serde::{Deserialize, Serialize};

/// Parameters of the movement step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    /// Units per second
    pub speed: f32,
    /// Fixed tick duration in seconds
    pub delta: f32,
}

impl StepParams {
    /// Derive step parameters from a config
    pub fn from_config(config: &NetConfig) -> Self {
        Self {
            speed: config.movement.speed,
            delta: config.tick_duration(),
        }
    }
}

/// Apply one command's movement and facing to `state`
pub fn step(state: &mut EntityState, command: &Command, params: StepParams) {
    let keys = command.keys;
    let mut velocity = Vec2::ZERO;

    if keys.contains(MovementKeys::UP) {
        velocity.y = -1.0;
    }
    if keys.contains(MovementKeys::DOWN) {
        velocity.y = 1.0;
    }
    if keys.contains(MovementKeys::LEFT) {
        velocity.x = -1.0;
    }
    if keys.contains(MovementKeys::RIGHT) {
        velocity.x = 1.0;
    }

    state.position += velocity.normalized() * (params.speed * params.delta);
    state.facing = command.facing;
}

/// Mutable state of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub position: Vec2,
    pub facing: f32,
    pub health: u32,
    pub max_health: u32,
    pub combat: CombatState,
    pub skills: SkillLevels,
}

/// Result of [`EntityState::take_damage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    /// Health reached zero; health has already been restored to max
    pub died: bool,
    pub transition: Option<CombatTransition>,
}

impl EntityState {
    /// Create a fresh entity at `position`
    pub fn new(position: Vec2, max_health: u32) -> Self {
        Self {
            position,
            facing: 0.0,
            health: max_health,
            max_health,
            combat: CombatState::Idle,
            skills: SkillLevels::default(),
        }
    }

    /// Create a fresh entity at the configured spawn position
    pub fn from_config(config: &NetConfig) -> Self {
        Self::new(config.spawn_position, config.combat.max_health)
    }

    /// Whether health is above zero
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Direction an attack travels: left when facing is zero, right otherwise
    pub fn face_direction(&self) -> Vec2 {
        if self.facing == 0.0 {
            Vec2::LEFT
        } else {
            Vec2::RIGHT
        }
    }

    /// Take damage and enter combat
    pub fn take_damage(&mut self, amount: u8, combat_timeout: f32) -> DamageOutcome {
        self.health = self.health.saturating_sub(u32::from(amount));
        let died = self.health == 0;
        if died {
            self.health = self.max_health;
        }
        DamageOutcome {
            died,
            transition: self.combat.enter(combat_timeout),
        }
    }

    /// Place the entity at `position` with full health, facing 0 and out of combat
    pub fn spawn(&mut self, position: Vec2) -> Option<CombatTransition> {
        self.position = position;
        self.facing = 0.0;
        self.health = self.max_health;
        self.combat.leave()
    }

    /// Advance per-tick timers
    pub fn advance(&mut self, delta: f32) -> Option<CombatTransition> {
        self.combat.tick(delta)
    }

    /// Set a skill level, returning the new combat level if it changed
    ///
    /// Healthpoints also caps health: max health follows the level and
    /// current health grows by one, never past the new maximum.
    pub fn set_skill_level(&mut self, skill: Skill, level: u32) -> Option<u32> {
        let before = self.skills.combat_level();
        self.skills.set(skill, level);
        if skill == Skill::Healthpoints {
            self.max_health = level;
            self.health = (self.health + 1).min(level);
        }
        let after = self.skills.combat_level();
        (after != before).then_some(after)
    }
}

/// Notifications emitted by an entity to its observers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityEvent {
    HealthChanged { max: u32, current: u32 },
    CombatStateChanged(bool),
    CombatLevelChanged(u32),
}

/// Behaviour specific to a concrete entity kind
///
/// Called when the combat state machine changes state. Server players
/// use these to close dialogues and release combat targets.
pub trait EntityHooks {
    /// The entity entered combat
    fn on_combat_entered(&mut self) {}

    /// The entity left combat
    fn on_combat_left(&mut self) {}

    /// The authoritative position changed this tick
    fn on_moved(&mut self, _position: Vec2) {}
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl EntityHooks for NoHooks {}

/// Deliver a combat transition to observers, then to the entity hooks
pub fn dispatch_transition(
    transition: CombatTransition,
    hooks: &mut dyn EntityHooks,
    observers: &mut Observers<EntityEvent>,
) {
    observers.notify(&EntityEvent::CombatStateChanged(transition.in_combat()));
    match transition {
        CombatTransition::Entered => hooks.on_combat_entered(),
        CombatTransition::Left => hooks.on_combat_left(),
    }
}
