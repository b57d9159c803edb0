//! Capability traits for the three execution roles
//!
//! One entity model, three ways of driving it. A role type implements the
//! capability it offers instead of inheriting from a shared base; code that
//! only needs one capability can be generic over it.

use crate::{
    ApplyOutcome, AuthoritativeStepper, Broadcast, LocalPredictor, Outbox, PredictTick,
    PushOutcome, ReconcileOutcome, RemoteInterpolator, Result,
};
use tickwire_core::{
    Command, EntityEvent, EntityHooks, EntityId, EntityState, Observers, Snapshot, Vec2,
};

/// An entity whose state is synchronized over the network
pub trait Synced {
    /// Entity id
    fn id(&self) -> EntityId;

    /// Current state as this role sees it
    fn state(&self) -> &EntityState;

    /// Observers of this entity's events
    fn events_mut(&mut self) -> &mut Observers<EntityEvent>;
}

/// Client-controlled: applies input immediately and reconciles later
pub trait Predicted: Synced {
    /// Run one prediction tick
    fn predict(&mut self, outbox: &mut dyn Outbox) -> PredictTick;

    /// Correct local state from an authoritative snapshot
    fn reconcile(&mut self, snapshot: &Snapshot) -> ReconcileOutcome;
}

/// Remote on this client: rendered from buffered snapshots
pub trait Interpolated: Synced {
    /// Buffer a snapshot
    fn buffer_snapshot(&mut self, snapshot: Snapshot) -> PushOutcome;

    /// Advance playback and return the rendered position
    fn interpolate(&mut self, delta: f32) -> Option<Vec2>;
}

/// Server-side: filters, applies and broadcasts
pub trait Authoritative {
    /// Apply one command for `id`
    fn apply(&mut self, id: EntityId, command: &Command) -> Result<ApplyOutcome>;

    /// Advance one server tick and broadcast snapshots
    fn step_all(&mut self, broadcast: &mut dyn Broadcast) -> usize;
}

impl<H: EntityHooks> Synced for LocalPredictor<H> {
    fn id(&self) -> EntityId {
        LocalPredictor::id(self)
    }

    fn state(&self) -> &EntityState {
        LocalPredictor::state(self)
    }

    fn events_mut(&mut self) -> &mut Observers<EntityEvent> {
        LocalPredictor::events_mut(self)
    }
}

impl<H: EntityHooks> Predicted for LocalPredictor<H> {
    fn predict(&mut self, outbox: &mut dyn Outbox) -> PredictTick {
        self.tick(outbox)
    }

    fn reconcile(&mut self, snapshot: &Snapshot) -> ReconcileOutcome {
        self.receive_state(snapshot)
    }
}

impl<H: EntityHooks> Synced for RemoteInterpolator<H> {
    fn id(&self) -> EntityId {
        RemoteInterpolator::id(self)
    }

    fn state(&self) -> &EntityState {
        RemoteInterpolator::state(self)
    }

    fn events_mut(&mut self) -> &mut Observers<EntityEvent> {
        RemoteInterpolator::events_mut(self)
    }
}

impl<H: EntityHooks> Interpolated for RemoteInterpolator<H> {
    fn buffer_snapshot(&mut self, snapshot: Snapshot) -> PushOutcome {
        self.push(snapshot)
    }

    fn interpolate(&mut self, delta: f32) -> Option<Vec2> {
        self.update(delta)
    }
}

impl<H: EntityHooks> Authoritative for AuthoritativeStepper<H> {
    fn apply(&mut self, id: EntityId, command: &Command) -> Result<ApplyOutcome> {
        self.apply_command(id, command)
    }

    fn step_all(&mut self, broadcast: &mut dyn Broadcast) -> usize {
        self.tick(broadcast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Channel, Packet};
    use tickwire_core::{InputState, NetConfig, NoHooks, SequenceId};

    fn config() -> NetConfig {
        NetConfig::default().with_tick_rate(10).with_send_interval(1)
    }

    // Drives any predicted entity against any authority, the way a
    // loopback test harness would.
    fn round_trip(
        client: &mut dyn Predicted,
        server: &mut dyn Authoritative,
        ticks: usize,
    ) -> Vec<ReconcileOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..ticks {
            let mut outbox: Vec<(Packet, Channel)> = Vec::new();
            client.predict(&mut outbox);
            for (packet, _) in outbox {
                if let Packet::Inputs(commands) = packet {
                    for command in &commands {
                        server.apply(client.id(), command).unwrap();
                    }
                }
            }
            let mut sent: Vec<(Snapshot, Channel)> = Vec::new();
            server.step_all(&mut sent);
            for (snapshot, channel) in sent {
                if channel == Channel::ReliableUnordered && snapshot.entity_id == client.id() {
                    outcomes.push(client.reconcile(&snapshot));
                }
            }
        }
        outcomes
    }

    #[test]
    fn test_predicted_and_authoritative_agree() {
        let config = config();
        let mut client = LocalPredictor::new(EntityId(1), &config).unwrap();
        client.set_input(InputState::new(Vec2::new(1.0, 1.0), 1.0, false));
        let mut server: AuthoritativeStepper<NoHooks> = AuthoritativeStepper::new(&config).unwrap();
        server.spawn(EntityId(1), NoHooks).unwrap();

        let outcomes = round_trip(&mut client, &mut server, 10);

        assert!(outcomes.iter().all(|o| o.accepted()));
        let server_state = server.entity(EntityId(1)).unwrap();
        assert_eq!(Synced::state(&client).position, server_state.position);
        assert_eq!(client.buffer().len(), 0);
        assert_eq!(server.last_processed(EntityId(1)), Some(SequenceId(10)));
    }

    #[test]
    fn test_interpolated_capability() {
        let snapshot = |tick: u16, x: f32| {
            Snapshot::new(EntityId(4), SequenceId(tick), SequenceId(tick), Vec2::new(x, 0.0), 0.0)
        };
        let mut remote = RemoteInterpolator::new(snapshot(1, 0.0), &config()).unwrap();
        let view: &mut dyn Interpolated = &mut remote;

        assert_eq!(view.buffer_snapshot(snapshot(3, 2.0)), PushOutcome::Buffered);
        assert!(view.interpolate(0.1).is_some());
        assert_eq!(view.id(), EntityId(4));
    }
}
