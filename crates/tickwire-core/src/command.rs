//! Player commands: one tick of intent
//!
//! A [`Command`] is immutable once built. The client stamps it with the
//! next sequence id, predicts it locally and resends it until the server
//! acknowledges it.

use crate::{SequenceId, Stamped, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitmask of movement and action keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementKeys(u8);

impl MovementKeys {
    pub const NONE: MovementKeys = MovementKeys(0);
    pub const UP: MovementKeys = MovementKeys(1 << 0);
    pub const DOWN: MovementKeys = MovementKeys(1 << 1);
    pub const LEFT: MovementKeys = MovementKeys(1 << 2);
    pub const RIGHT: MovementKeys = MovementKeys(1 << 3);
    pub const FIRE: MovementKeys = MovementKeys(1 << 4);

    /// Build from raw bits
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get the raw bits
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Check whether every key in `other` is pressed
    pub fn contains(&self, other: MovementKeys) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Press the keys in `other`
    pub fn insert(&mut self, other: MovementKeys) {
        self.0 |= other.0;
    }

    /// Check if no key is pressed
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for MovementKeys {
    type Output = MovementKeys;

    fn bitor(self, rhs: MovementKeys) -> MovementKeys {
        MovementKeys(self.0 | rhs.0)
    }
}

impl BitOrAssign for MovementKeys {
    fn bitor_assign(&mut self, rhs: MovementKeys) {
        self.0 |= rhs.0;
    }
}

/// Raw input sampled from the local device for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputState {
    /// Stick / key direction, each axis in `[-1, 1]`
    pub velocity: Vec2,
    /// Facing value to send with the command
    pub facing: f32,
    /// Whether the attack button is held
    pub fire: bool,
}

impl InputState {
    /// Dead zone applied per axis before a key counts as pressed
    pub const DEAD_ZONE: f32 = 0.5;

    /// Create a new input sample
    pub fn new(velocity: Vec2, facing: f32, fire: bool) -> Self {
        Self {
            velocity,
            facing,
            fire,
        }
    }

    /// Convert to a key bitmask
    pub fn keys(&self) -> MovementKeys {
        let mut keys = MovementKeys::NONE;
        if self.fire {
            keys |= MovementKeys::FIRE;
        }
        if self.velocity.x < -Self::DEAD_ZONE {
            keys |= MovementKeys::LEFT;
        }
        if self.velocity.x > Self::DEAD_ZONE {
            keys |= MovementKeys::RIGHT;
        }
        if self.velocity.y < -Self::DEAD_ZONE {
            keys |= MovementKeys::UP;
        }
        if self.velocity.y > Self::DEAD_ZONE {
            keys |= MovementKeys::DOWN;
        }
        keys
    }
}

/// One tick's worth of player intent
///
/// Wire shape: `{ id: u16, server_tick: u16, keys: u8, facing: f32 }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Sequence id, increasing by one per client tick
    pub id: SequenceId,
    /// Last server tick the client knew of when it built this command
    pub server_tick: SequenceId,
    /// Pressed keys
    pub keys: MovementKeys,
    /// Facing value
    pub facing: f32,
}

impl Command {
    /// Create a new command
    pub fn new(id: SequenceId, server_tick: SequenceId, keys: MovementKeys, facing: f32) -> Self {
        Self {
            id,
            server_tick,
            keys,
            facing,
        }
    }

    /// Whether this command asks for an attack
    pub fn wants_attack(&self) -> bool {
        self.keys.contains(MovementKeys::FIRE)
    }
}

impl Stamped for Command {
    fn stamp(&self) -> SequenceId {
        self.id
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd{}[keys={:#07b}]", self.id, self.keys.bits())
    }
}
