//! State reconciliation
//!
//! Corrects the locally predicted entity when authoritative state arrives.
//! The snapshot's position is taken as truth, acknowledged commands are
//! evicted from the prediction buffer and the rest are replayed on top of
//! the corrected base with the same step function the server runs.
//!
//! Replay only moves the entity. Combat transitions are never produced
//! here, so reconciliation cannot re-fire observers or hooks.

use crate::{Diagnostic, PredictionBuffer};
use tickwire_core::{step, EntityState, SequenceId, SequenceSpace, Snapshot, StepParams};
use tracing::{debug, trace, warn};

/// What a call to [`Reconciler::reconcile`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The server has not processed any command yet; state ignored
    AwaitingFirstCommand,
    /// Tick or ack not newer than the last accepted snapshot; ignored
    Stale(Diagnostic),
    /// Position overwritten; there was nothing left to replay against
    Resynced,
    /// Acknowledged commands evicted and the remainder replayed
    Replayed { acknowledged: usize, replayed: usize },
    /// The ack is beyond what the buffer can explain; predictions abandoned
    Desync(Diagnostic),
    /// The ack is behind the oldest buffered command; position overwritten only
    Anomalous(Diagnostic),
}

impl ReconcileOutcome {
    /// Whether the snapshot was accepted
    pub fn accepted(&self) -> bool {
        !matches!(
            self,
            ReconcileOutcome::AwaitingFirstCommand | ReconcileOutcome::Stale(_)
        )
    }

    /// The diagnostic carried by this outcome, if any
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        match self {
            ReconcileOutcome::Stale(d)
            | ReconcileOutcome::Desync(d)
            | ReconcileOutcome::Anomalous(d) => Some(*d),
            _ => None,
        }
    }
}

/// Client-side reconciler for the locally controlled entity
#[derive(Debug, Clone)]
pub struct Reconciler {
    space: SequenceSpace,
    params: StepParams,
    /// Tick of the last accepted snapshot
    last_tick: Option<SequenceId>,
    /// Ack of the last accepted snapshot
    last_ack: Option<SequenceId>,
    /// Set once the server has acknowledged a command
    first_state_received: bool,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(space: SequenceSpace, params: StepParams) -> Self {
        Self {
            space,
            params,
            last_tick: None,
            last_ack: None,
            first_state_received: false,
        }
    }

    /// Reconcile local state with an authoritative snapshot
    ///
    /// `last_issued` is the id of the newest command the predictor created;
    /// it is rewound to the ack when predictions are abandoned so the next
    /// command continues right after what the server processed.
    pub fn reconcile(
        &mut self,
        snapshot: &Snapshot,
        state: &mut EntityState,
        buffer: &mut PredictionBuffer,
        last_issued: &mut SequenceId,
    ) -> ReconcileOutcome {
        let tick = snapshot.tick;
        let ack = snapshot.last_processed_command;

        if !self.first_state_received {
            if ack == SequenceId::ZERO {
                return ReconcileOutcome::AwaitingFirstCommand;
            }
            self.first_state_received = true;
        }

        if self.is_stale(tick, ack) {
            let diagnostic = Diagnostic::StaleSnapshot { tick, ack };
            trace!(entity = %snapshot.entity_id, %tick, %ack, "stale snapshot dropped");
            return ReconcileOutcome::Stale(diagnostic);
        }
        self.last_tick = Some(tick);
        self.last_ack = Some(ack);

        state.position = snapshot.position;
        state.facing = snapshot.facing;

        let Some(oldest) = buffer.oldest_id() else {
            return ReconcileOutcome::Resynced;
        };
        let count = buffer.len();
        let diff = self.space.diff(ack, oldest);

        if diff < 0 {
            let diagnostic = Diagnostic::AnomalousAck { ack, oldest, diff };
            warn!(entity = %snapshot.entity_id, %ack, %oldest, diff, "anomalous ack");
            return ReconcileOutcome::Anomalous(diagnostic);
        }

        let acknowledged = diff as usize + 1;
        if acknowledged > count {
            buffer.clear();
            *last_issued = ack;
            let diagnostic = Diagnostic::PredictionOverrun {
                dropped: count,
                resumed_at: self.space.next(ack),
            };
            debug!(
                entity = %snapshot.entity_id,
                %ack,
                dropped = count,
                "lag detected, predictions abandoned"
            );
            return ReconcileOutcome::Desync(diagnostic);
        }

        buffer.acknowledge(acknowledged);
        for command in buffer.iter() {
            step(state, command, self.params);
        }
        ReconcileOutcome::Replayed {
            acknowledged,
            replayed: buffer.len(),
        }
    }

    fn is_stale(&self, tick: SequenceId, ack: SequenceId) -> bool {
        let tick_stale = self
            .last_tick
            .is_some_and(|last| self.space.diff(tick, last) <= 0);
        let ack_stale = self
            .last_ack
            .is_some_and(|last| self.space.diff(ack, last) <= 0);
        tick_stale || ack_stale
    }

    /// Tick of the last accepted snapshot
    pub fn last_server_tick(&self) -> Option<SequenceId> {
        self.last_tick
    }

    /// Ack of the last accepted snapshot
    pub fn last_ack(&self) -> Option<SequenceId> {
        self.last_ack
    }

    /// Forget everything accepted so far
    pub fn reset(&mut self) {
        self.last_tick = None;
        self.last_ack = None;
        self.first_state_received = false;
    }
}
