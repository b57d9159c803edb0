//! Snapshot interpolation for remote entities
//!
//! Remote entities arrive as discrete, delayed snapshots. The interpolator
//! buffers them and renders a position a little in the past, blending the
//! two oldest buffered snapshots so motion stays smooth even when packets
//! arrive unevenly.

use crate::{Diagnostic, Result};
use tickwire_core::{
    dispatch_transition, CombatConfig, EntityEvent, EntityHooks, EntityId, EntityState,
    NetConfig, NoHooks, Observers, SequenceSpace, Snapshot, Vec2,
};
use tickwire_ring_buffer::RingBuffer;
use tracing::{debug, trace};

/// What happened to a pushed snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended to the buffer
    Buffered,
    /// Not newer than the newest buffered snapshot; dropped
    Stale(Diagnostic),
    /// The buffer was full; history was discarded before appending
    Overrun(Diagnostic),
}

/// Interpolated view of one remote entity
pub struct RemoteInterpolator<H: EntityHooks = NoHooks> {
    id: EntityId,
    state: EntityState,
    buffer: RingBuffer<Snapshot>,
    space: SequenceSpace,
    tick_duration: f32,
    delay: f32,
    combat: CombatConfig,
    /// Seconds of snapshot history received but not yet played back
    received_time: f32,
    /// Playback position between the two oldest snapshots
    timer: f32,
    hooks: H,
    events: Observers<EntityEvent>,
}

impl RemoteInterpolator<NoHooks> {
    /// Create an interpolator seeded with the entity's initial snapshot
    pub fn new(initial: Snapshot, config: &NetConfig) -> Result<Self> {
        Self::with_hooks(initial, config, NoHooks)
    }
}

impl<H: EntityHooks> RemoteInterpolator<H> {
    /// Create an interpolator with entity-specific hooks
    pub fn with_hooks(initial: Snapshot, config: &NetConfig, hooks: H) -> Result<Self> {
        config.validate()?;
        let mut state = EntityState::from_config(config);
        state.position = initial.position;
        state.facing = initial.facing;

        let mut buffer = RingBuffer::new(config.remote_buffer_capacity);
        let pushed = buffer.push(initial);
        debug_assert!(pushed.is_ok(), "validated capacity holds at least two snapshots");

        Ok(Self {
            id: initial.entity_id,
            state,
            buffer,
            space: config.sequence_space()?,
            tick_duration: config.tick_duration(),
            delay: config.interpolation_delay_secs,
            combat: config.combat,
            received_time: 0.0,
            timer: 0.0,
            hooks,
            events: Observers::new(),
        })
    }

    /// Buffer a snapshot received from the server
    pub fn push(&mut self, snapshot: Snapshot) -> PushOutcome {
        if let Some(last) = self.buffer.last() {
            let diff = self.space.diff(snapshot.tick, last.tick);
            if diff <= 0 {
                trace!(entity = %self.id, tick = %snapshot.tick, "stale remote snapshot dropped");
                return PushOutcome::Stale(Diagnostic::StaleSnapshot {
                    tick: snapshot.tick,
                    ack: snapshot.last_processed_command,
                });
            }
            self.received_time += diff as f32 * self.tick_duration;
        }

        let mut outcome = PushOutcome::Buffered;
        if self.buffer.is_full() {
            let dropped = self.buffer.len();
            debug!(entity = %self.id, dropped, "remote snapshot buffer full, clearing");
            self.received_time = 0.0;
            self.buffer.clear();
            outcome = PushOutcome::Overrun(Diagnostic::InterpolationOverrun { dropped });
        }
        let pushed = self.buffer.push(snapshot);
        debug_assert!(pushed.is_ok(), "snapshot buffer is cleared when full");
        outcome
    }

    /// Advance playback by `delta` seconds
    ///
    /// Returns the rendered position, or `None` while still buffering.
    pub fn update(&mut self, delta: f32) -> Option<Vec2> {
        if self.received_time < self.delay || self.buffer.len() < 2 {
            return None;
        }
        let (a, b) = (*self.buffer.first()?, *self.buffer.get(1)?);

        let span = self.space.diff(b.tick, a.tick) as f32 * self.tick_duration;
        let t = if span > 0.0 { self.timer / span } else { 1.0 };

        self.state.position = Vec2::lerp(a.position, b.position, t);
        // Facing snaps instead of blending.
        self.state.facing = a.facing;

        self.timer += delta;
        if self.timer > span {
            self.received_time -= span;
            self.buffer.remove_from_start(1);
            self.timer -= span;
        }
        Some(self.state.position)
    }

    /// Apply damage reported by the server
    pub fn take_damage(&mut self, amount: u8) {
        let outcome = self
            .state
            .take_damage(amount, self.combat.combat_timeout_secs);
        self.events.notify(&EntityEvent::HealthChanged {
            max: self.state.max_health,
            current: self.state.health,
        });
        if let Some(transition) = outcome.transition {
            dispatch_transition(transition, &mut self.hooks, &mut self.events);
        }
    }

    /// Advance the combat timer by one tick
    pub fn advance(&mut self, delta: f32) {
        if let Some(transition) = self.state.advance(delta) {
            dispatch_transition(transition, &mut self.hooks, &mut self.events);
        }
    }

    /// Respawn at `position`, discarding buffered history
    pub fn spawn(&mut self, position: Vec2) {
        self.clear_history();
        if let Some(transition) = self.state.spawn(position) {
            dispatch_transition(transition, &mut self.hooks, &mut self.events);
        }
        self.events.notify(&EntityEvent::HealthChanged {
            max: self.state.max_health,
            current: self.state.health,
        });
    }

    /// Return buffers and combat state to their initial values
    pub fn reset(&mut self) {
        self.clear_history();
        if let Some(transition) = self.state.combat.leave() {
            dispatch_transition(transition, &mut self.hooks, &mut self.events);
        }
    }

    fn clear_history(&mut self) {
        self.buffer.clear();
        self.received_time = 0.0;
        self.timer = 0.0;
    }

    /// Id of the remote entity
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Current rendered state
    pub fn state(&self) -> &EntityState {
        &self.state
    }

    /// Number of buffered snapshots
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Seconds of history waiting to be played back
    pub fn received_time(&self) -> f32 {
        self.received_time
    }

    /// Observers of this entity's events
    pub fn events_mut(&mut self) -> &mut Observers<EntityEvent> {
        &mut self.events
    }
}

impl<H: EntityHooks> std::fmt::Debug for RemoteInterpolator<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteInterpolator")
            .field("id", &self.id)
            .field("position", &self.state.position)
            .field("buffered", &self.buffer.len())
            .field("received_time", &self.received_time)
            .finish()
    }
}
