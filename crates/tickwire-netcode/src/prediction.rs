//! Client-side prediction
//!
//! Applies the local player's input immediately, records each command for
//! replay and periodically resends every unacknowledged command to the
//! server over the unreliable channel.

use crate::{
    Channel, Diagnostic, Outbox, Packet, PredictionBuffer, ReconcileOutcome, Reconciler, Result,
};
use tickwire_core::{
    dispatch_transition, step, CombatConfig, Command, EntityEvent, EntityHooks, EntityId,
    EntityState, InputState, MovementKeys, NetConfig, NoHooks, Observers, SequenceId,
    SequenceSpace, Skill, Snapshot, StepParams, Vec2,
};
use tracing::debug;

/// Result of one [`LocalPredictor::tick`]
#[derive(Debug, Clone, PartialEq)]
pub struct PredictTick {
    /// The command created and applied this tick
    pub command: Command,
    /// Set when the buffer was full and predictions were abandoned
    pub overrun: Option<Diagnostic>,
    /// Whether the pending batch was handed to the outbox
    pub sent: bool,
}

/// Predicted execution of the locally controlled entity
///
/// Owns the entity state, its prediction buffer and the reconciler. The
/// owning client tick is the only writer.
pub struct LocalPredictor<H: EntityHooks = NoHooks> {
    id: EntityId,
    state: EntityState,
    /// Position before the last tick, for render blending
    previous: Vec2,
    buffer: PredictionBuffer,
    reconciler: Reconciler,
    space: SequenceSpace,
    params: StepParams,
    combat: CombatConfig,
    send_interval: u32,
    ticks_since_send: u32,
    /// Id of the newest command created
    last_issued: SequenceId,
    keys: MovementKeys,
    facing: f32,
    typing: bool,
    hooks: H,
    events: Observers<EntityEvent>,
}

impl LocalPredictor<NoHooks> {
    /// Create a predictor with no entity-specific hooks
    pub fn new(id: EntityId, config: &NetConfig) -> Result<Self> {
        Self::with_hooks(id, config, NoHooks)
    }
}

impl<H: EntityHooks> LocalPredictor<H> {
    /// Create a predictor for entity `id`
    pub fn with_hooks(id: EntityId, config: &NetConfig, hooks: H) -> Result<Self> {
        config.validate()?;
        let space = config.sequence_space()?;
        let params = StepParams::from_config(config);
        let state = EntityState::from_config(config);
        Ok(Self {
            id,
            previous: state.position,
            state,
            buffer: PredictionBuffer::new(config.prediction_capacity),
            reconciler: Reconciler::new(space, params),
            space,
            params,
            combat: config.combat,
            send_interval: config.send_interval,
            ticks_since_send: 0,
            last_issued: SequenceId::ZERO,
            keys: MovementKeys::NONE,
            facing: 0.0,
            typing: false,
            hooks,
            events: Observers::new(),
        })
    }

    /// Sample the player's input for the next tick
    ///
    /// Ignored while typing; the previous intent is kept.
    pub fn set_input(&mut self, input: InputState) {
        if self.typing {
            return;
        }
        self.keys = input.keys();
        self.facing = input.facing;
    }

    /// Suppress input sampling while a text field has focus
    pub fn set_typing(&mut self, typing: bool) {
        self.typing = typing;
    }

    /// Run one client tick
    pub fn tick<O: Outbox + ?Sized>(&mut self, outbox: &mut O) -> PredictTick {
        self.previous = self.state.position;

        let mut command = Command::new(
            self.space.next(self.last_issued),
            self.last_server_tick(),
            self.keys,
            self.facing,
        );
        step(&mut self.state, &command, self.params);

        let mut overrun = None;
        if self.buffer.is_full() {
            let dropped = self.buffer.len();
            self.buffer.clear();
            let resume_from = self.reconciler.last_ack().unwrap_or(SequenceId::ZERO);
            command.id = self.space.next(resume_from);
            debug!(
                entity = %self.id,
                dropped,
                resumed_at = %command.id,
                "prediction buffer full, resynchronizing"
            );
            overrun = Some(Diagnostic::PredictionOverrun {
                dropped,
                resumed_at: command.id,
            });
        }
        let pushed = self.buffer.push(command);
        debug_assert!(pushed.is_ok(), "prediction buffer is cleared when full");
        self.last_issued = command.id;

        self.ticks_since_send += 1;
        let sent = self.ticks_since_send >= self.send_interval;
        if sent {
            self.ticks_since_send = 0;
            outbox.send(Packet::Inputs(self.buffer.batch()), Channel::Unreliable);
        }

        if let Some(transition) = self.state.advance(self.params.delta) {
            dispatch_transition(transition, &mut self.hooks, &mut self.events);
        }

        PredictTick {
            command,
            overrun,
            sent,
        }
    }

    /// Feed an authoritative snapshot of this entity to the reconciler
    pub fn receive_state(&mut self, snapshot: &Snapshot) -> ReconcileOutcome {
        self.reconciler.reconcile(
            snapshot,
            &mut self.state,
            &mut self.buffer,
            &mut self.last_issued,
        )
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

    /// Place the entity at `position` with full health and out of combat
    pub fn spawn(&mut self, position: Vec2) {
        if let Some(transition) = self.state.spawn(position) {
            dispatch_transition(transition, &mut self.hooks, &mut self.events);
        }
        self.previous = self.state.position;
        self.events.notify(&EntityEvent::HealthChanged {
            max: self.state.max_health,
            current: self.state.health,
        });
    }

    /// Update a skill level and notify a combat level change
    pub fn set_skill_level(&mut self, skill: Skill, level: u32) {
        if let Some(combat_level) = self.state.set_skill_level(skill, level) {
            self.events
                .notify(&EntityEvent::CombatLevelChanged(combat_level));
        }
    }

    /// Return buffers, counters and combat state to their initial values
    pub fn reset(&mut self) {
        if let Some(transition) = self.state.combat.leave() {
            dispatch_transition(transition, &mut self.hooks, &mut self.events);
        }
        self.buffer.clear();
        self.reconciler.reset();
        self.last_issued = SequenceId::ZERO;
        self.ticks_since_send = 0;
        self.keys = MovementKeys::NONE;
        self.typing = false;
    }

    /// Position blended between the last two ticks
    ///
    /// `alpha` is the fraction of the current tick elapsed, 0.0 to 1.0.
    pub fn render_position(&self, alpha: f32) -> Vec2 {
        Vec2::lerp(self.previous, self.state.position, alpha)
    }

    /// Id of the controlled entity
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Current predicted state
    pub fn state(&self) -> &EntityState {
        &self.state
    }

    /// Pending commands
    pub fn buffer(&self) -> &PredictionBuffer {
        &self.buffer
    }

    /// Id of the newest command created
    pub fn last_issued(&self) -> SequenceId {
        self.last_issued
    }

    /// Last server tick accepted, or zero before the first snapshot
    pub fn last_server_tick(&self) -> SequenceId {
        self.reconciler
            .last_server_tick()
            .unwrap_or(SequenceId::ZERO)
    }

    /// Observers of this entity's events
    pub fn events_mut(&mut self) -> &mut Observers<EntityEvent> {
        &mut self.events
    }

    /// Entity-specific hooks
    pub fn hooks(&self) -> &H {
        &self.hooks
    }
}

impl<H: EntityHooks> std::fmt::Debug for LocalPredictor<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPredictor")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("pending", &self.buffer.len())
            .field("last_issued", &self.last_issued)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn config() -> NetConfig {
        NetConfig::default()
            .with_tick_rate(10)
            .with_prediction_capacity(60)
            .with_send_interval(3)
    }

    fn predictor() -> LocalPredictor {
        LocalPredictor::new(EntityId(1), &config()).unwrap()
    }

    fn sink() -> Vec<(Packet, Channel)> {
        Vec::new()
    }

    fn ids(predictor: &LocalPredictor) -> Vec<u16> {
        predictor.buffer().iter().map(|c| c.id.raw()).collect()
    }

    #[test]
    fn test_tick_applies_and_records() {
        let mut predictor = predictor();
        predictor.set_input(InputState::new(Vec2::new(1.0, 0.0), 1.0, false));
        let mut outbox: Vec<(Packet, Channel)> = Vec::new();

        let result = predictor.tick(&mut outbox);

        assert_eq!(result.command.id, SequenceId(1));
        assert_eq!(result.command.keys, MovementKeys::RIGHT);
        assert!(result.overrun.is_none());
        // speed 3.0 at 10Hz
        assert!((predictor.state().position.x - 0.3).abs() < 1e-6);
        assert_eq!(ids(&predictor), vec![1]);
    }

    #[test]
    fn test_sends_batch_every_interval() {
        let mut predictor = predictor();
        let mut outbox: Vec<(Packet, Channel)> = Vec::new();

        let sent: Vec<bool> = (0..6).map(|_| predictor.tick(&mut outbox).sent).collect();

        assert_eq!(sent, vec![false, false, true, false, false, true]);
        assert_eq!(outbox.len(), 2);
        match &outbox[1] {
            (Packet::Inputs(batch), Channel::Unreliable) => {
                let batch_ids: Vec<u16> = batch.iter().map(|c| c.id.raw()).collect();
                assert_eq!(batch_ids, vec![1, 2, 3, 4, 5, 6]);
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn test_full_buffer_resumes_after_last_ack() {
        let mut predictor = predictor();
        let mut outbox: Vec<(Packet, Channel)> = Vec::new();

        // First acknowledged command is 4; ids 5..=64 stay pending.
        for _ in 0..4 {
            predictor.tick(&mut outbox);
        }
        let snapshot = Snapshot::new(EntityId(1), SequenceId(4), SequenceId(4), Vec2::ZERO, 0.0);
        assert!(predictor.receive_state(&snapshot).accepted());
        assert!(predictor.buffer().is_empty());

        for _ in 0..60 {
            assert!(predictor.tick(&mut outbox).overrun.is_none());
        }
        assert!(predictor.buffer().is_full());
        assert_eq!(predictor.buffer().oldest_id(), Some(SequenceId(5)));
        assert_eq!(predictor.buffer().newest_id(), Some(SequenceId(64)));

        let result = predictor.tick(&mut outbox);
        assert_eq!(result.command.id, SequenceId(5));
        assert_eq!(
            result.overrun,
            Some(Diagnostic::PredictionOverrun {
                dropped: 60,
                resumed_at: SequenceId(5)
            })
        );
        assert_eq!(ids(&predictor), vec![5]);
        assert_eq!(predictor.last_issued(), SequenceId(5));
    }

    #[test]
    fn test_typing_keeps_previous_intent() {
        let mut predictor = predictor();
        predictor.set_input(InputState::new(Vec2::new(0.0, 1.0), 0.0, false));
        predictor.set_typing(true);
        predictor.set_input(InputState::new(Vec2::new(-1.0, 0.0), 1.0, true));

        let result = predictor.tick(&mut sink());
        assert_eq!(result.command.keys, MovementKeys::DOWN);
        assert_eq!(result.command.facing, 0.0);
    }

    #[test]
    fn test_fire_is_recorded_but_not_resolved() {
        let mut predictor = predictor();
        predictor.set_input(InputState::new(Vec2::ZERO, 0.0, true));
        let result = predictor.tick(&mut sink());

        assert!(result.command.wants_attack());
        assert!(!predictor.state().combat.in_combat());
        assert_eq!(predictor.state().position, Vec2::ZERO);
    }

    #[test]
    fn test_damage_notifies_and_combat_expires() {
        let mut predictor = predictor();
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorded = events.clone();
        predictor
            .events_mut()
            .subscribe(move |e: &EntityEvent| recorded.lock().unwrap().push(*e));

        predictor.take_damage(3);
        predictor.take_damage(1);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                EntityEvent::HealthChanged { max: 10, current: 7 },
                EntityEvent::CombatStateChanged(true),
                EntityEvent::HealthChanged { max: 10, current: 6 },
            ]
        );

        // 2.5s timeout at 10Hz
        for _ in 0..26 {
            predictor.tick(&mut sink());
        }
        assert!(!predictor.state().combat.in_combat());
        assert_eq!(
            events.lock().unwrap().last(),
            Some(&EntityEvent::CombatStateChanged(false))
        );
    }

    #[test]
    fn test_hooks_on_combat_left() {
        #[derive(Default)]
        struct DialogueHooks {
            closed: u32,
        }
        impl EntityHooks for DialogueHooks {
            fn on_combat_left(&mut self) {
                self.closed += 1;
            }
        }

        let mut predictor =
            LocalPredictor::with_hooks(EntityId(2), &config(), DialogueHooks::default()).unwrap();
        predictor.take_damage(1);
        predictor.spawn(Vec2::new(3.0, 3.0));

        assert_eq!(predictor.hooks().closed, 1);
        assert_eq!(predictor.state().position, Vec2::new(3.0, 3.0));
    }

    #[test]
    fn test_combat_level_notification() {
        let mut predictor = predictor();
        let levels = Arc::new(Mutex::new(Vec::new()));
        let recorded = levels.clone();
        predictor.events_mut().subscribe(move |e: &EntityEvent| {
            if let EntityEvent::CombatLevelChanged(level) = e {
                recorded.lock().unwrap().push(*level);
            }
        });

        predictor.set_skill_level(Skill::Offence, 2);
        predictor.set_skill_level(Skill::Offence, 10);
        assert_eq!(*levels.lock().unwrap(), vec![9]);
    }

    #[test]
    fn test_reset() {
        let mut predictor = predictor();
        for _ in 0..5 {
            predictor.tick(&mut sink());
        }
        predictor.take_damage(1);
        predictor.reset();

        assert!(predictor.buffer().is_empty());
        assert_eq!(predictor.last_issued(), SequenceId::ZERO);
        assert!(!predictor.state().combat.in_combat());
        assert_eq!(predictor.tick(&mut sink()).command.id, SequenceId(1));
    }

    #[test]
    fn test_render_position_blends_last_step() {
        let mut predictor = predictor();
        predictor.set_input(InputState::new(Vec2::new(1.0, 0.0), 1.0, false));
        predictor.tick(&mut sink());
        predictor.tick(&mut sink());

        let start = predictor.render_position(0.0);
        let end = predictor.render_position(1.0);
        assert!((start.x - 0.3).abs() < 1e-5);
        assert_eq!(end, predictor.state().position);
        assert!((predictor.render_position(0.5).x - 0.45).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = NetConfig::default().with_send_interval(0);
        assert!(LocalPredictor::new(EntityId(1), &config).is_err());
    }
}
