//! Tickwire Netcode - Client prediction and server authority over lossy links
//!
//! This crate keeps player entities in sync between one authoritative
//! server and many clients:
//!
//! - **Prediction**: The local entity moves the moment input is sampled
//! - **Reconciliation**: Acknowledged commands are dropped, the rest replayed on server truth
//! - **Interpolation**: Remote entities render slightly in the past, blended between snapshots
//! - **Authority**: The server filters resent commands and broadcasts one snapshot per entity per tick
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────── Client ─────────────────────────┐
//! │  ┌──────────────┐  ┌───────────────┐  ┌──────────────┐  │
//! │  │    Input     │─▶│LocalPredictor │─▶│    Outbox    │──┼──┐
//! │  └──────────────┘  └───────────────┘  └──────────────┘  │  │ Inputs (every B ticks,
//! │                        ▲                                │  │ unreliable)
//! │                        │ Reconciler                     │  │
//! │  ┌──────────────┐      │            ┌────────────────┐  │  │
//! │  │    Inbox     │──────┴───────────▶│RemoteInterpol. │  │  │
//! │  └──────────────┘                   └────────────────┘  │  │
//! └────────▲────────────────────────────────────────────────┘  │
//!          │ State (owner: reliable, observers: unreliable)     │
//! ┌────────┴──────────────── Server ─────────────────────────┐ │
//! │  ┌──────────────┐  ┌─────────────────────┐  ┌─────────┐  │ │
//! │  │  Broadcast   │◀─│AuthoritativeStepper │◀─│  Inbox  │◀─┼─┘
//! │  └──────────────┘  └─────────────────────┘  └─────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use tickwire_core::{EntityId, InputState, NetConfig, NoHooks, Snapshot, Vec2};
//! use tickwire_netcode::{AuthoritativeStepper, Channel, ClientWorld, Packet};
//!
//! let config = NetConfig::default().with_send_interval(1);
//! let mut server: AuthoritativeStepper = AuthoritativeStepper::new(&config).unwrap();
//! server.spawn(EntityId(1), NoHooks).unwrap();
//!
//! let mut client = ClientWorld::new(config).unwrap();
//! client.login(EntityId(1)).unwrap();
//! client
//!     .local_mut()
//!     .unwrap()
//!     .set_input(InputState::new(Vec2::new(1.0, 0.0), 1.0, false));
//!
//! // client tick: predict and send
//! let mut outbox: Vec<(Packet, Channel)> = Vec::new();
//! client.tick(&mut outbox);
//!
//! // server tick: apply and broadcast
//! for (packet, _) in outbox.drain(..) {
//!     if let Packet::Inputs(commands) = packet {
//!         server.receive_commands(EntityId(1), &commands).unwrap();
//!     }
//! }
//! let mut snapshots: Vec<(Snapshot, Channel)> = Vec::new();
//! server.tick(&mut snapshots);
//!
//! // back on the client, the owner snapshot reconciles the prediction
//! let sender = client.sender();
//! sender.stage(Packet::State(snapshots[0].0));
//! let report = client.tick(&mut outbox);
//! assert_eq!(report.accepted, 1);
//! ```

mod authority;
mod client;
mod error;
mod input_buffer;
mod interpolation;
mod prediction;
mod reconciliation;
pub mod role;
mod transport;

pub use authority::{ApplyOutcome, AttackRequest, AuthoritativeStepper};
pub use client::{ClientWorld, TickReport};
pub use error::{Diagnostic, Error, Result};
pub use input_buffer::PredictionBuffer;
pub use interpolation::{PushOutcome, RemoteInterpolator};
pub use prediction::{LocalPredictor, PredictTick};
pub use reconciliation::{ReconcileOutcome, Reconciler};
pub use role::{Authoritative, Interpolated, Predicted, Synced};
pub use transport::{
    decode, encode, Broadcast, Channel, Inbound, Inbox, InboxSender, Outbox, Packet,
};

// Re-export the shared model for convenience
pub use tickwire_core::{Command, EntityId, NetConfig, SequenceId, Snapshot};
