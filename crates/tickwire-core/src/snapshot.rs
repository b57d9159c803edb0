//! Authoritative entity snapshots

use crate::{SequenceId, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a networked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u8);

impl EntityId {
    /// Create a new entity ID
    pub fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// Items that carry a sequence stamp (command id or snapshot tick)
pub trait Stamped {
    /// The sequence stamp of this item
    fn stamp(&self) -> SequenceId;
}

/// A piece of authoritative, broadcastable entity state
///
/// Produced only by the server. Wire shape:
/// `{ entity_id: u8, tick: u16, last_processed_command: u16, position: (f32, f32), facing: f32 }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entity_id: EntityId,
    /// Entity tick this snapshot describes
    pub tick: SequenceId,
    /// Last command id the server applied for this entity
    pub last_processed_command: SequenceId,
    pub position: Vec2,
    pub facing: f32,
}

impl Snapshot {
    /// Create a new snapshot
    pub fn new(
        entity_id: EntityId,
        tick: SequenceId,
        last_processed_command: SequenceId,
        position: Vec2,
        facing: f32,
    ) -> Self {
        Self {
            entity_id,
            tick,
            last_processed_command,
            position,
            facing,
        }
    }
}

impl Stamped for Snapshot {
    fn stamp(&self) -> SequenceId {
        self.tick
    }
}
