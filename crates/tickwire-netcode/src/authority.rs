//! Authoritative simulation
//!
//! The server is the single source of truth. Incoming commands pass a
//! monotonic filter per entity, which is the only defence against the
//! duplicates and reordering the resend strategy produces. Accepted
//! commands run through the same step function the clients predict with.
//! Once per tick every entity yields one snapshot for the broadcast layer.

use crate::{Broadcast, Diagnostic, Error, Inbound, Inbox, Packet, Result};
use indexmap::IndexMap;
use tickwire_core::{
    dispatch_transition, step, CombatConfig, Command, Cooldown, DamageOutcome, EntityEvent,
    EntityHooks, EntityId, EntityState, NetConfig, NoHooks, Observers, SequenceId,
    SequenceSpace, Skill, Snapshot, StepParams, Vec2,
};
use tracing::{debug, trace};

/// An attack the combat collaborator should resolve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackRequest {
    pub attacker: EntityId,
    pub origin: Vec2,
    /// Unit direction the attack travels
    pub direction: Vec2,
    pub reach: f32,
}

/// What [`AuthoritativeStepper::apply_command`] did with a command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplyOutcome {
    /// The command was applied
    Applied {
        /// Position changed
        moved: bool,
        /// An attack was requested and the cooldown allowed it
        attack: Option<AttackRequest>,
    },
    /// Not newer than the last processed command; dropped
    Stale(Diagnostic),
}

impl ApplyOutcome {
    /// Whether the command was applied
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

/// Server-side record of one entity
struct ServerEntity<H> {
    state: EntityState,
    last_processed: SequenceId,
    attack_cooldown: Cooldown,
    region_dirty: bool,
    hooks: H,
    events: Observers<EntityEvent>,
}

impl<H: EntityHooks> ServerEntity<H> {
    fn respawn(&mut self, position: Vec2) {
        if let Some(transition) = self.state.spawn(position) {
            dispatch_transition(transition, &mut self.hooks, &mut self.events);
        }
        self.region_dirty = true;
        self.events.notify(&EntityEvent::HealthChanged {
            max: self.state.max_health,
            current: self.state.health,
        });
    }
}

/// Canonical simulation of every connected entity
///
/// Entities are kept in insertion order, so snapshots are produced in a
/// deterministic order.
pub struct AuthoritativeStepper<H: EntityHooks = NoHooks> {
    space: SequenceSpace,
    params: StepParams,
    combat: CombatConfig,
    spawn_position: Vec2,
    base_state: EntityState,
    entities: IndexMap<EntityId, ServerEntity<H>>,
    attacks: Vec<AttackRequest>,
    dirty_regions: Vec<EntityId>,
}

impl<H: EntityHooks> AuthoritativeStepper<H> {
    /// Create an empty stepper
    pub fn new(config: &NetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            space: config.sequence_space()?,
            params: StepParams::from_config(config),
            combat: config.combat,
            spawn_position: config.spawn_position,
            base_state: EntityState::from_config(config),
            entities: IndexMap::new(),
            attacks: Vec::new(),
            dirty_regions: Vec::new(),
        })
    }

    /// Register a new entity at the spawn position
    pub fn spawn(&mut self, id: EntityId, hooks: H) -> Result<()> {
        if self.entities.contains_key(&id) {
            return Err(Error::DuplicateEntity(id));
        }
        debug!(entity = %id, "entity spawned");
        self.entities.insert(
            id,
            ServerEntity {
                state: self.base_state.clone(),
                last_processed: SequenceId::ZERO,
                attack_cooldown: Cooldown::new(self.combat.attack_cooldown_secs),
                region_dirty: true,
                hooks,
                events: Observers::new(),
            },
        );
        Ok(())
    }

    /// Remove an entity, returning its final state
    pub fn despawn(&mut self, id: EntityId) -> Result<EntityState> {
        let entity = self
            .entities
            .shift_remove(&id)
            .ok_or(Error::UnknownEntity(id))?;
        debug!(entity = %id, "entity removed");
        Ok(entity.state)
    }

    /// Return an entity to its initial state after its client disconnected
    pub fn reset_entity(&mut self, id: EntityId) -> Result<()> {
        let spawn_position = self.spawn_position;
        let cooldown = self.combat.attack_cooldown_secs;
        let entity = self.entity_record(id)?;
        entity.respawn(spawn_position);
        entity.last_processed = SequenceId::ZERO;
        entity.attack_cooldown = Cooldown::new(cooldown);
        debug!(entity = %id, "entity reset");
        Ok(())
    }

    fn entity_record(&mut self, id: EntityId) -> Result<&mut ServerEntity<H>> {
        self.entities.get_mut(&id).ok_or(Error::UnknownEntity(id))
    }

    /// Apply one command to its entity
    pub fn apply_command(&mut self, id: EntityId, command: &Command) -> Result<ApplyOutcome> {
        let space = self.space;
        let params = self.params;
        let reach = self.combat.attack_reach;
        let entity = self.entity_record(id)?;

        if space.diff(command.id, entity.last_processed) <= 0 {
            trace!(
                entity = %id,
                command = %command.id,
                last_processed = %entity.last_processed,
                "stale input dropped"
            );
            return Ok(ApplyOutcome::Stale(Diagnostic::StaleInput {
                command: command.id,
                last_processed: entity.last_processed,
            }));
        }
        entity.last_processed = command.id;

        let before = entity.state.position;
        step(&mut entity.state, command, params);
        let moved = entity.state.position != before;
        if moved {
            entity.region_dirty = true;
        }

        let mut attack = None;
        if command.wants_attack() && entity.attack_cooldown.is_ready() {
            entity.attack_cooldown.reset();
            attack = Some(AttackRequest {
                attacker: id,
                origin: entity.state.position,
                direction: entity.state.face_direction(),
                reach,
            });
        }
        if let Some(request) = attack {
            self.attacks.push(request);
        }

        Ok(ApplyOutcome::Applied { moved, attack })
    }

    /// Apply a batch of commands, oldest first, returning how many were applied
    pub fn receive_commands(&mut self, id: EntityId, commands: &[Command]) -> Result<usize> {
        let mut applied = 0;
        for command in commands {
            if self.apply_command(id, command)?.is_applied() {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Apply everything network callbacks staged since the last drain
    ///
    /// Returns the number of commands applied. Packets from unknown
    /// entities are dropped.
    pub fn drain_inbox(&mut self, inbox: &mut Inbox<Inbound>) -> usize {
        let mut applied = 0;
        for inbound in inbox.drain() {
            match inbound.packet {
                Packet::Inputs(commands) => match self.receive_commands(inbound.from, &commands) {
                    Ok(n) => applied += n,
                    Err(err) => debug!(entity = %inbound.from, %err, "inputs dropped"),
                },
                other => trace!(entity = %inbound.from, packet = ?other, "unexpected packet from client"),
            }
        }
        applied
    }

    /// Damage an entity, respawning it if it died
    pub fn apply_damage(&mut self, id: EntityId, amount: u8) -> Result<DamageOutcome> {
        let timeout = self.combat.combat_timeout_secs;
        let spawn_position = self.spawn_position;
        let entity = self.entity_record(id)?;

        let outcome = entity.state.take_damage(amount, timeout);
        entity.events.notify(&EntityEvent::HealthChanged {
            max: entity.state.max_health,
            current: entity.state.health,
        });
        if let Some(transition) = outcome.transition {
            dispatch_transition(transition, &mut entity.hooks, &mut entity.events);
        }
        if outcome.died {
            debug!(entity = %id, "entity died, respawning");
            entity.respawn(spawn_position);
        }
        Ok(outcome)
    }

    /// Update a skill level, notifying observers when the combat level changes
    pub fn set_skill_level(&mut self, id: EntityId, skill: Skill, level: u32) -> Result<()> {
        let entity = self.entity_record(id)?;
        if let Some(combat_level) = entity.state.set_skill_level(skill, level) {
            entity
                .events
                .notify(&EntityEvent::CombatLevelChanged(combat_level));
        }
        Ok(())
    }

    /// Advance timers and broadcast one snapshot per entity
    ///
    /// Returns the number of snapshots produced.
    pub fn tick<B: Broadcast + ?Sized>(&mut self, broadcast: &mut B) -> usize {
        let delta = self.params.delta;
        for (id, entity) in &mut self.entities {
            entity.attack_cooldown.tick(delta);
            if let Some(transition) = entity.state.advance(delta) {
                dispatch_transition(transition, &mut entity.hooks, &mut entity.events);
            }

            if entity.region_dirty {
                entity.region_dirty = false;
                entity.hooks.on_moved(entity.state.position);
                self.dirty_regions.push(*id);
            }

            let snapshot = Snapshot::new(
                *id,
                entity.last_processed,
                entity.last_processed,
                entity.state.position,
                entity.state.facing,
            );
            broadcast.to_owner(&snapshot);
            broadcast.to_observers(&snapshot);
        }
        self.entities.len()
    }

    /// Take the attacks requested since the last call
    pub fn take_attacks(&mut self) -> Vec<AttackRequest> {
        std::mem::take(&mut self.attacks)
    }

    /// Take the ids of entities whose region must be recomputed
    pub fn take_dirty_regions(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.dirty_regions)
    }

    /// Current state of an entity
    pub fn entity(&self, id: EntityId) -> Option<&EntityState> {
        self.entities.get(&id).map(|e| &e.state)
    }

    /// Last command applied for an entity
    pub fn last_processed(&self, id: EntityId) -> Option<SequenceId> {
        self.entities.get(&id).map(|e| e.last_processed)
    }

    /// Observers of an entity's events
    pub fn events_mut(&mut self, id: EntityId) -> Option<&mut Observers<EntityEvent>> {
        self.entities.get_mut(&id).map(|e| &mut e.events)
    }

    /// Hooks of an entity
    pub fn hooks(&self, id: EntityId) -> Option<&H> {
        self.entities.get(&id).map(|e| &e.hooks)
    }

    /// Ids of every entity, in spawn order
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if there are no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<H: EntityHooks> std::fmt::Debug for AuthoritativeStepper<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthoritativeStepper")
            .field("entities", &self.entities.len())
            .field("pending_attacks", &self.attacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Channel, InboxSender};
    use proptest::prelude::*;
    use tickwire_core::MovementKeys;

    fn config() -> NetConfig {
        NetConfig::default().with_tick_rate(10)
    }

    fn stepper() -> AuthoritativeStepper {
        let mut stepper = AuthoritativeStepper::new(&config()).unwrap();
        stepper.spawn(EntityId(1), NoHooks).unwrap();
        stepper
    }

    fn command(id: u16, keys: MovementKeys) -> Command {
        Command::new(SequenceId(id), SequenceId(0), keys, 1.0)
    }

    #[test]
    fn test_applies_in_order_and_drops_stale() {
        let mut stepper = stepper();
        let batch = [
            command(1, MovementKeys::RIGHT),
            command(2, MovementKeys::RIGHT),
            command(3, MovementKeys::RIGHT),
        ];
        assert_eq!(stepper.receive_commands(EntityId(1), &batch).unwrap(), 3);
        // the resend carries the same commands plus one new
        let resend = [
            command(2, MovementKeys::RIGHT),
            command(3, MovementKeys::RIGHT),
            command(4, MovementKeys::RIGHT),
        ];
        assert_eq!(stepper.receive_commands(EntityId(1), &resend).unwrap(), 1);
        assert_eq!(stepper.last_processed(EntityId(1)), Some(SequenceId(4)));

        let x = stepper.entity(EntityId(1)).unwrap().position.x;
        assert!((x - 1.2).abs() < 1e-5);
    }

    #[test]
    fn test_stale_outcome() {
        let mut stepper = stepper();
        stepper
            .apply_command(EntityId(1), &command(5, MovementKeys::NONE))
            .unwrap();
        let outcome = stepper
            .apply_command(EntityId(1), &command(5, MovementKeys::UP))
            .unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Stale(Diagnostic::StaleInput {
                command: SequenceId(5),
                last_processed: SequenceId(5)
            })
        );
    }

    #[test]
    fn test_unknown_entity() {
        let mut stepper = stepper();
        let err = stepper
            .apply_command(EntityId(9), &command(1, MovementKeys::UP))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEntity(EntityId(9))));
        assert!(matches!(
            stepper.spawn(EntityId(1), NoHooks),
            Err(Error::DuplicateEntity(_))
        ));
    }

    #[test]
    fn test_attack_respects_cooldown() {
        let mut stepper = stepper();
        let first = stepper
            .apply_command(EntityId(1), &command(1, MovementKeys::FIRE))
            .unwrap();
        let ApplyOutcome::Applied { attack: Some(request), moved } = first else {
            panic!("expected an attack, got {first:?}");
        };
        assert!(!moved);
        assert_eq!(request.direction, Vec2::RIGHT);
        assert_eq!(request.reach, 1.0);

        let second = stepper
            .apply_command(EntityId(1), &command(2, MovementKeys::FIRE))
            .unwrap();
        assert_eq!(
            second,
            ApplyOutcome::Applied {
                moved: false,
                attack: None
            }
        );

        // 0.6s cooldown at 10Hz
        let mut sink: Vec<(Snapshot, Channel)> = Vec::new();
        for _ in 0..7 {
            stepper.tick(&mut sink);
        }
        let third = stepper
            .apply_command(EntityId(1), &command(3, MovementKeys::FIRE))
            .unwrap();
        assert!(matches!(third, ApplyOutcome::Applied { attack: Some(_), .. }));
        assert_eq!(stepper.take_attacks().len(), 2);
        assert!(stepper.take_attacks().is_empty());
    }

    #[test]
    fn test_tick_broadcasts_snapshot() {
        let mut stepper = stepper();
        stepper.spawn(EntityId(2), NoHooks).unwrap();
        stepper
            .receive_commands(EntityId(2), &[command(7, MovementKeys::DOWN)])
            .unwrap();

        let mut sent: Vec<(Snapshot, Channel)> = Vec::new();
        assert_eq!(stepper.tick(&mut sent), 2);

        assert_eq!(sent.len(), 4);
        let (owner, channel) = sent[2];
        assert_eq!(channel, Channel::ReliableUnordered);
        assert_eq!(owner.entity_id, EntityId(2));
        assert_eq!(owner.tick, SequenceId(7));
        assert_eq!(owner.last_processed_command, SequenceId(7));
        assert!(owner.position.y > 0.0);
        assert_eq!(sent[3].1, Channel::Unreliable);
    }

    #[test]
    fn test_dirty_regions() {
        let mut stepper = stepper();
        let mut sent: Vec<(Snapshot, Channel)> = Vec::new();
        stepper.tick(&mut sent);
        // freshly spawned entities need a region
        assert_eq!(stepper.take_dirty_regions(), vec![EntityId(1)]);

        stepper
            .apply_command(EntityId(1), &command(1, MovementKeys::NONE))
            .unwrap();
        stepper.tick(&mut sent);
        assert!(stepper.take_dirty_regions().is_empty());

        stepper
            .apply_command(EntityId(1), &command(2, MovementKeys::LEFT))
            .unwrap();
        stepper.tick(&mut sent);
        assert_eq!(stepper.take_dirty_regions(), vec![EntityId(1)]);
    }

    #[test]
    fn test_lethal_damage_respawns() {
        let config = config();
        let mut stepper = stepper();
        stepper
            .receive_commands(EntityId(1), &[command(1, MovementKeys::RIGHT)])
            .unwrap();

        let outcome = stepper.apply_damage(EntityId(1), 50).unwrap();
        assert!(outcome.died);
        let state = stepper.entity(EntityId(1)).unwrap();
        assert_eq!(state.position, config.spawn_position);
        assert_eq!(state.health, config.combat.max_health);
        assert!(!state.combat.in_combat());
    }

    #[test]
    fn test_combat_hooks_on_server() {
        #[derive(Default)]
        struct Counting {
            entered: u32,
            left: u32,
            moved: u32,
        }
        impl EntityHooks for Counting {
            fn on_combat_entered(&mut self) {
                self.entered += 1;
            }
            fn on_combat_left(&mut self) {
                self.left += 1;
            }
            fn on_moved(&mut self, _position: Vec2) {
                self.moved += 1;
            }
        }

        let mut stepper: AuthoritativeStepper<Counting> =
            AuthoritativeStepper::new(&config()).unwrap();
        stepper.spawn(EntityId(3), Counting::default()).unwrap();
        stepper.apply_damage(EntityId(3), 1).unwrap();
        stepper.apply_damage(EntityId(3), 1).unwrap();

        let mut sent: Vec<(Snapshot, Channel)> = Vec::new();
        for _ in 0..30 {
            stepper.tick(&mut sent);
        }
        let hooks = stepper.hooks(EntityId(3)).unwrap();
        assert_eq!(hooks.entered, 1);
        assert_eq!(hooks.left, 1);
        assert_eq!(hooks.moved, 1);
    }

    #[test]
    fn test_drain_inbox() {
        let mut stepper = stepper();
        let (sender, mut inbox): (InboxSender<Inbound>, _) = Inbox::channel();
        sender.stage(Inbound::new(
            EntityId(1),
            Packet::Inputs(vec![command(1, MovementKeys::UP), command(2, MovementKeys::UP)]),
        ));
        sender.stage(Inbound::new(
            EntityId(1),
            Packet::Inputs(vec![command(2, MovementKeys::UP)]),
        ));
        sender.stage(Inbound::new(
            EntityId(8),
            Packet::Inputs(vec![command(1, MovementKeys::UP)]),
        ));

        assert_eq!(stepper.drain_inbox(&mut inbox), 2);
        assert_eq!(stepper.last_processed(EntityId(1)), Some(SequenceId(2)));
    }

    #[test]
    fn test_reset_and_despawn() {
        let mut stepper = stepper();
        stepper
            .receive_commands(EntityId(1), &[command(40, MovementKeys::UP)])
            .unwrap();
        stepper.apply_damage(EntityId(1), 1).unwrap();

        stepper.reset_entity(EntityId(1)).unwrap();
        assert_eq!(stepper.last_processed(EntityId(1)), Some(SequenceId::ZERO));
        assert!(!stepper.entity(EntityId(1)).unwrap().combat.in_combat());
        // a reconnecting client starts over at id 1
        let outcome = stepper
            .apply_command(EntityId(1), &command(1, MovementKeys::UP))
            .unwrap();
        assert!(outcome.is_applied());

        stepper.despawn(EntityId(1)).unwrap();
        assert!(stepper.is_empty());
        assert!(stepper.despawn(EntityId(1)).is_err());
    }

    proptest! {
        #[test]
        fn prop_only_newer_commands_are_applied(
            ids in prop::collection::vec(1u16..400, 0..80),
        ) {
            let mut stepper = stepper();
            let mut newest = 0u16;
            let mut expected = 0usize;
            for &id in &ids {
                if id > newest {
                    newest = id;
                    expected += 1;
                }
            }

            let batch: Vec<Command> = ids.iter().map(|&id| command(id, MovementKeys::UP)).collect();
            let applied = stepper.receive_commands(EntityId(1), &batch).unwrap();

            prop_assert_eq!(applied, expected);
            prop_assert_eq!(stepper.last_processed(EntityId(1)), Some(SequenceId(newest)));
            // a full resend changes nothing
            prop_assert_eq!(stepper.receive_commands(EntityId(1), &batch).unwrap(), 0);
        }
    }
}
