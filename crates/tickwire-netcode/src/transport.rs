//! Transport boundary
//!
//! The engine does not own sockets. It hands packets to an [`Outbox`] or a
//! [`Broadcast`] implementation and reads packets that a network callback
//! staged into an [`Inbox`]. Network callbacks may run on any thread, but
//! they only stage; the owning tick drains the inbox and is the single
//! writer of entity state.

use crate::Result;
use serde::{Deserialize, Serialize};
use tickwire_core::{Command, EntityId, Snapshot};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Delivery guarantee requested for a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Best effort; may be lost, duplicated or reordered
    Unreliable,
    /// Guaranteed delivery, any order
    ReliableUnordered,
    /// Guaranteed delivery in send order
    ReliableOrdered,
}

/// Packets exchanged by the synchronization engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    /// Client to server: every unacknowledged command, oldest first
    Inputs(Vec<Command>),
    /// Server to client: authoritative state of one entity
    State(Snapshot),
    /// Server to client: an entity took damage
    Damage { entity: EntityId, amount: u8 },
}

/// Encode a packet with bincode
pub fn encode(packet: &Packet) -> Result<Vec<u8>> {
    Ok(bincode::serialize(packet)?)
}

/// Decode a packet with bincode
pub fn decode(bytes: &[u8]) -> Result<Packet> {
    Ok(bincode::deserialize(bytes)?)
}

/// Fire-and-forget sending side of a connection
pub trait Outbox {
    /// Queue a packet for delivery
    fn send(&mut self, packet: Packet, channel: Channel);
}

impl Outbox for Vec<(Packet, Channel)> {
    fn send(&mut self, packet: Packet, channel: Channel) {
        self.push((packet, channel));
    }
}

/// Server-side snapshot fan-out
pub trait Broadcast {
    /// Deliver a snapshot to the client controlling the entity (reconciliation)
    fn to_owner(&mut self, snapshot: &Snapshot);

    /// Deliver a snapshot to every other client observing the entity (interpolation)
    fn to_observers(&mut self, snapshot: &Snapshot);
}

impl Broadcast for Vec<(Snapshot, Channel)> {
    fn to_owner(&mut self, snapshot: &Snapshot) {
        self.push((*snapshot, Channel::ReliableUnordered));
    }

    fn to_observers(&mut self, snapshot: &Snapshot) {
        self.push((*snapshot, Channel::Unreliable));
    }
}

/// A packet received by the server from the client owning `from`
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub from: EntityId,
    pub packet: Packet,
}

impl Inbound {
    /// Create a new inbound packet
    pub fn new(from: EntityId, packet: Packet) -> Self {
        Self { from, packet }
    }
}

/// Staging side of an inbox, handed to network callbacks
#[derive(Debug)]
pub struct InboxSender<T> {
    sender: UnboundedSender<T>,
}

impl<T> InboxSender<T> {
    /// Stage an item for the next tick
    ///
    /// Returns false if the inbox no longer exists.
    pub fn stage(&self, item: T) -> bool {
        self.sender.send(item).is_ok()
    }
}

impl<T> Clone for InboxSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Single-consumer queue drained by the owning tick
#[derive(Debug)]
pub struct Inbox<T> {
    receiver: UnboundedReceiver<T>,
}

impl<T> Inbox<T> {
    /// Create an inbox and its staging handle
    pub fn channel() -> (InboxSender<T>, Inbox<T>) {
        let (sender, receiver) = unbounded_channel();
        (InboxSender { sender }, Inbox { receiver })
    }

    /// Take everything staged so far without blocking
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.receiver.try_recv().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickwire_core::{MovementKeys, SequenceId, Vec2};

    #[test]
    fn test_codec_roundtrip_inputs() {
        let packet = Packet::Inputs(vec![
            Command::new(SequenceId(7), SequenceId(3), MovementKeys::UP, 0.0),
            Command::new(SequenceId(8), SequenceId(3), MovementKeys::UP | MovementKeys::FIRE, 1.0),
        ]);
        let bytes = encode(&packet).unwrap();
        assert_eq!(decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_snapshot_wire_size() {
        let snapshot = Snapshot::new(
            EntityId(4),
            SequenceId(10),
            SequenceId(10),
            Vec2::new(1.0, 2.0),
            1.0,
        );
        let bytes = encode(&Packet::State(snapshot)).unwrap();
        // variant tag (4) + id (1) + tick (2) + ack (2) + position (8) + facing (4)
        assert_eq!(bytes.len(), 21);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode(&[0xff, 0xff, 0xff, 0xff, 0x01]).is_err());
    }

    #[test]
    fn test_inbox_from_another_thread() {
        let (sender, mut inbox) = Inbox::channel();
        let handle = std::thread::spawn(move || {
            for i in 0..3u8 {
                assert!(sender.stage(i));
            }
        });
        handle.join().unwrap();

        let drained: Vec<u8> = inbox.drain().collect();
        assert_eq!(drained, vec![0, 1, 2]);
        assert_eq!(inbox.drain().count(), 0);
    }

    #[test]
    fn test_stage_after_inbox_dropped() {
        let (sender, inbox) = Inbox::<u8>::channel();
        drop(inbox);
        assert!(!sender.stage(1));
    }

    #[test]
    fn test_broadcast_channels() {
        let snapshot = Snapshot::new(EntityId(1), SequenceId(1), SequenceId(1), Vec2::ZERO, 0.0);
        let mut sent: Vec<(Snapshot, Channel)> = Vec::new();
        sent.to_owner(&snapshot);
        sent.to_observers(&snapshot);
        assert_eq!(sent[0].1, Channel::ReliableUnordered);
        assert_eq!(sent[1].1, Channel::Unreliable);
    }
}
