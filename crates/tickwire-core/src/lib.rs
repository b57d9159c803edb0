//! Tickwire Core - Shared model for tick-driven state synchronization
//!
//! This crate provides the pieces that client and server must agree on
//! bit-for-bit:
//! - Wraparound-safe sequence arithmetic (`SequenceSpace`, `SequenceId`)
//! - The wire data model (`Command`, `Snapshot`, `MovementKeys`, `Vec2`)
//! - Entity state and the deterministic movement `step`
//! - The `Idle ⇄ InCombat` state machine and skill levels
//! - Observer lists for synchronous, ordered notifications
//! - Injected configuration (`NetConfig`, loadable from RON)
//!
//! Prediction, reconciliation, interpolation and the authoritative stepper
//! live in `tickwire-netcode`.

pub mod combat;
mod command;
mod config;
pub mod entity;
mod error;
mod math;
mod observer;
pub mod sequence;
mod skills;
mod snapshot;

pub use combat::{CombatState, CombatTransition, Cooldown};
pub use command::{Command, InputState, MovementKeys};
pub use config::{CombatConfig, MovementConfig, NetConfig};
pub use entity::{
    dispatch_transition, step, DamageOutcome, EntityEvent, EntityHooks, EntityState, NoHooks,
    StepParams,
};
pub use error::{Error, Result};
pub use math::Vec2;
pub use observer::{Observers, SubscriberId};
pub use sequence::{circular_diff, SequenceId, SequenceSpace};
pub use skills::{Skill, SkillLevels};
pub use snapshot::{EntityId, Snapshot, Stamped};
