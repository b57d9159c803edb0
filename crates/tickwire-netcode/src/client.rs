//! Client world
//!
//! Routes everything the server sends to the right role: snapshots of the
//! local entity go to its reconciler, snapshots of other entities to their
//! interpolators. Packets arrive through an [`Inbox`] filled by the network
//! callback and are only applied inside [`ClientWorld::tick`].

use crate::{
    Diagnostic, Error, Inbox, InboxSender, LocalPredictor, Outbox, Packet, PredictTick,
    PushOutcome, ReconcileOutcome, RemoteInterpolator, Result,
};
use indexmap::IndexMap;
use tickwire_core::{EntityId, NetConfig, Snapshot, Vec2};
use tracing::{debug, trace};

/// Summary of one [`ClientWorld::tick`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// The local prediction step, if logged in
    pub predicted: Option<PredictTick>,
    /// Snapshots accepted (reconciled or buffered)
    pub accepted: usize,
    /// Remote entities created from their first snapshot
    pub spawned: Vec<EntityId>,
    /// Non-fatal conditions met this tick
    pub diagnostics: Vec<Diagnostic>,
}

/// Client-side view of the synchronized world
#[derive(Debug)]
pub struct ClientWorld {
    config: NetConfig,
    local: Option<LocalPredictor>,
    remotes: IndexMap<EntityId, RemoteInterpolator>,
    inbox: Inbox<Packet>,
    sender: InboxSender<Packet>,
}

impl ClientWorld {
    /// Create an empty world
    pub fn new(config: NetConfig) -> Result<Self> {
        config.validate()?;
        let (sender, inbox) = Inbox::channel();
        Ok(Self {
            config,
            local: None,
            remotes: IndexMap::new(),
            inbox,
            sender,
        })
    }

    /// Handle for the network callback to stage received packets
    pub fn sender(&self) -> InboxSender<Packet> {
        self.sender.clone()
    }

    /// Take control of entity `id`
    pub fn login(&mut self, id: EntityId) -> Result<()> {
        self.remotes.shift_remove(&id);
        self.local = Some(LocalPredictor::new(id, &self.config)?);
        debug!(entity = %id, "logged in");
        Ok(())
    }

    /// Track a remote entity from its initial snapshot
    pub fn add_remote(&mut self, initial: Snapshot) -> Result<()> {
        let id = initial.entity_id;
        if self.remotes.contains_key(&id) || self.local_id() == Some(id) {
            return Err(Error::DuplicateEntity(id));
        }
        self.remotes
            .insert(id, RemoteInterpolator::new(initial, &self.config)?);
        debug!(entity = %id, "remote entity added");
        Ok(())
    }

    /// Stop tracking a remote entity
    pub fn remove_remote(&mut self, id: EntityId) -> Result<()> {
        let mut remote = self
            .remotes
            .shift_remove(&id)
            .ok_or(Error::UnknownEntity(id))?;
        remote.reset();
        debug!(entity = %id, "remote entity removed");
        Ok(())
    }

    /// Reset the local entity and forget every remote one
    pub fn disconnect(&mut self) {
        if let Some(local) = self.local.as_mut() {
            local.reset();
        }
        for (_, mut remote) in self.remotes.drain(..) {
            remote.reset();
        }
        // Packets staged before the disconnect belong to the old session.
        for _ in self.inbox.drain() {}
        debug!("disconnected");
    }

    /// Apply staged packets, then run the local prediction step
    pub fn tick<O: Outbox + ?Sized>(&mut self, outbox: &mut O) -> TickReport {
        let mut report = TickReport::default();
        let packets: Vec<Packet> = self.inbox.drain().collect();
        for packet in packets {
            self.route(packet, &mut report);
        }

        let delta = self.config.tick_duration();
        for remote in self.remotes.values_mut() {
            remote.advance(delta);
        }

        if let Some(local) = self.local.as_mut() {
            let predicted = local.tick(outbox);
            if let Some(diagnostic) = predicted.overrun {
                report.diagnostics.push(diagnostic);
            }
            report.predicted = Some(predicted);
        }
        report
    }

    fn route(&mut self, packet: Packet, report: &mut TickReport) {
        match packet {
            Packet::State(snapshot) => self.route_snapshot(snapshot, report),
            Packet::Damage { entity, amount } => {
                if let Some(local) = self.local.as_mut().filter(|l| l.id() == entity) {
                    local.take_damage(amount);
                } else if let Some(remote) = self.remotes.get_mut(&entity) {
                    remote.take_damage(amount);
                } else {
                    trace!(%entity, "damage for unknown entity dropped");
                }
            }
            Packet::Inputs(_) => trace!("inputs packet ignored on client"),
        }
    }

    fn route_snapshot(&mut self, snapshot: Snapshot, report: &mut TickReport) {
        let id = snapshot.entity_id;
        if let Some(local) = self.local.as_mut().filter(|l| l.id() == id) {
            let outcome = local.receive_state(&snapshot);
            if outcome.accepted() {
                report.accepted += 1;
            }
            if let Some(diagnostic) = outcome.diagnostic() {
                report.diagnostics.push(diagnostic);
            }
            if let ReconcileOutcome::Replayed { replayed, .. } = outcome {
                trace!(entity = %id, replayed, "reconciled");
            }
            return;
        }

        match self.remotes.get_mut(&id) {
            Some(remote) => match remote.push(snapshot) {
                PushOutcome::Buffered => report.accepted += 1,
                PushOutcome::Overrun(diagnostic) => {
                    report.accepted += 1;
                    report.diagnostics.push(diagnostic);
                }
                PushOutcome::Stale(diagnostic) => report.diagnostics.push(diagnostic),
            },
            None => match self.add_remote(snapshot) {
                Ok(()) => {
                    report.accepted += 1;
                    report.spawned.push(id);
                }
                Err(err) => debug!(entity = %id, %err, "remote entity not created"),
            },
        }
    }

    /// Advance interpolation of every remote entity by `delta` seconds
    ///
    /// Returns the positions rendered this frame.
    pub fn render(&mut self, delta: f32) -> Vec<(EntityId, Vec2)> {
        self.remotes
            .iter_mut()
            .filter_map(|(id, remote)| remote.update(delta).map(|p| (*id, p)))
            .collect()
    }

    /// Id of the locally controlled entity
    pub fn local_id(&self) -> Option<EntityId> {
        self.local.as_ref().map(|l| l.id())
    }

    /// The local predictor, if logged in
    pub fn local(&self) -> Option<&LocalPredictor> {
        self.local.as_ref()
    }

    /// Mutable access to the local predictor, for input sampling
    pub fn local_mut(&mut self) -> Option<&mut LocalPredictor> {
        self.local.as_mut()
    }

    /// A remote entity's interpolator
    pub fn remote(&self, id: EntityId) -> Option<&RemoteInterpolator> {
        self.remotes.get(&id)
    }

    /// Ids of tracked remote entities, in arrival order
    pub fn remote_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.remotes.keys().copied()
    }

    /// The active configuration
    pub fn config(&self) -> &NetConfig {
        &self.config
    }
}
