//! Error types for tickwire-netcode
//!
//! [`Error`] covers misuse and codec failures. The expected, non-fatal
//! conditions of an unreliable network are [`Diagnostic`]s: they travel
//! inside operation outcomes and are logged, never returned as `Err`.

use thiserror::Error;
use tickwire_core::{EntityId, SequenceId};

/// Netcode error type
#[derive(Debug, Error)]
pub enum Error {
    /// No entity with this id is registered
    #[error("Unknown entity {0}")]
    UnknownEntity(EntityId),

    /// An entity with this id is already registered
    #[error("Entity {0} already exists")]
    DuplicateEntity(EntityId),

    /// Packet could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Core error (usually configuration)
    #[error("Core error: {0}")]
    Core(#[from] tickwire_core::Error),
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal synchronization conditions, each handled by local state reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Diagnostic {
    /// Command id not newer than the last processed one; expected under resends
    #[error("stale input {command} (last processed {last_processed})")]
    StaleInput {
        command: SequenceId,
        last_processed: SequenceId,
    },

    /// Snapshot tick or ack not newer than the last accepted one
    #[error("stale snapshot tick {tick} ack {ack}")]
    StaleSnapshot { tick: SequenceId, ack: SequenceId },

    /// Unacknowledged commands no longer fit; predictions were abandoned
    #[error("prediction overrun: dropped {dropped} commands, resuming at {resumed_at}")]
    PredictionOverrun {
        dropped: usize,
        resumed_at: SequenceId,
    },

    /// Remote snapshot buffer was full on arrival and was cleared
    #[error("interpolation overrun: dropped {dropped} snapshots")]
    InterpolationOverrun { dropped: usize },

    /// Server ack is behind the oldest buffered command
    #[error("anomalous ack {ack} against oldest command {oldest} (diff {diff})")]
    AnomalousAck {
        ack: SequenceId,
        oldest: SequenceId,
        diff: i32,
    },
}
