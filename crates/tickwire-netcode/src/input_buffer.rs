//! Buffer of predicted commands awaiting acknowledgement
//!
//! Holds the commands the client has applied locally but the server has not
//! yet confirmed, oldest first with strictly increasing ids. The buffer
//! never overwrites: a full buffer is reported to the caller, which
//! resynchronizes.

use tickwire_core::{Command, SequenceId};
use tickwire_ring_buffer::{BufferStats, RingBuffer};

/// Unacknowledged commands of one client-controlled entity
#[derive(Debug, Clone)]
pub struct PredictionBuffer {
    commands: RingBuffer<Command>,
}

impl PredictionBuffer {
    /// Create a new prediction buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            commands: RingBuffer::new(capacity),
        }
    }

    /// Add a command at the back
    ///
    /// Returns the command back as `Err` if the buffer is full.
    pub fn push(&mut self, command: Command) -> Result<(), Command> {
        self.commands.push(command)
    }

    /// Id of the oldest unacknowledged command
    pub fn oldest_id(&self) -> Option<SequenceId> {
        self.commands.first().map(|c| c.id)
    }

    /// Id of the newest command
    pub fn newest_id(&self) -> Option<SequenceId> {
        self.commands.last().map(|c| c.id)
    }

    /// Evict the `count` oldest commands, returning how many were evicted
    pub fn acknowledge(&mut self, count: usize) -> usize {
        self.commands.remove_from_start(count)
    }

    /// Iterate over pending commands, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Command> + '_ {
        self.commands.iter()
    }

    /// Copy of every pending command, oldest first, for resending
    pub fn batch(&self) -> Vec<Command> {
        self.commands.to_vec()
    }

    /// Get the number of pending commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Check if the buffer is full
    pub fn is_full(&self) -> bool {
        self.commands.is_full()
    }

    /// Drop every pending command
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Get the capacity
    pub fn capacity(&self) -> usize {
        self.commands.capacity()
    }

    /// Get buffer statistics
    pub fn stats(&self) -> BufferStats {
        self.commands.stats()
    }
}
