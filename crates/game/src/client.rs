//! Client-side prediction.
//!
//! The controlling side simulates every tick immediately, records the move
//! in a [`ReplayBuffer`], and sends it to the authority. Acknowledged moves
//! are pruned; a correction snaps the state to the authority's values and
//! replays the moves the authority has not answered yet.

use std::cmp::Ordering;

use glam::Vec3;
use log::{debug, trace, warn};
use vaultline_physics::{GeometryProbe, MoveInput, MovementController, MovementMode, MovementState};
use vaultline_protocol::{CorrectionMessage, MoveMessage, NetMessage, QuantizedInput};

use crate::config::NetworkConfig;
use crate::replay::{move_input_from_wire, simulate_ticks, MoveStatus, ReplayBuffer, SavedMove};

/// Counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub ticks: u32,
    pub moves_sent: u32,
    pub moves_combined: u32,
    pub acks: u32,
    pub corrections: u32,
    pub replayed_moves: u32,
    pub evicted: u32,
}

/// Locally controlled character with prediction and reconciliation.
#[derive(Debug)]
pub struct PredictedClient {
    controller: MovementController,
    state: MovementState,
    buffer: ReplayBuffer,
    network: NetworkConfig,
    stats: ClientStats,
    last_corrected: Option<SavedMove>,
}

impl PredictedClient {
    pub fn new(controller: MovementController, network: NetworkConfig) -> Self {
        let buffer = ReplayBuffer::new(network.replay_buffer_capacity);
        Self {
            controller,
            state: MovementState::default(),
            buffer,
            network,
            stats: ClientStats::default(),
            last_corrected: None,
        }
    }

    pub fn spawn_at(&mut self, position: Vec3, yaw: f32, world: &dyn GeometryProbe) {
        self.state = MovementState::default();
        self.state.yaw = yaw;
        self.state.input.yaw = yaw;
        self.controller.spawn_at(&mut self.state, position, world);
        self.buffer.clear();
    }

    pub fn state(&self) -> &MovementState {
        &self.state
    }

    pub fn stats(&self) -> ClientStats {
        self.stats
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    /// The most recent move the authority corrected, as originally predicted.
    pub fn last_corrected(&self) -> Option<&SavedMove> {
        self.last_corrected.as_ref()
    }

    /// Simulate one tick of local input.
    ///
    /// Input is quantized before simulating so the authority sees exactly
    /// what was predicted. Returns a move to send, if one became ready.
    /// With combining enabled the newest move is held back so the next tick
    /// can extend it. Ticks that do not advance the clock are ignored.
    pub fn tick(&mut self, input: &MoveInput, delta_time: f32, world: &dyn GeometryProbe) -> Option<MoveMessage> {
        if delta_time.partial_cmp(&0.0) != Some(Ordering::Greater) {
            trace!("ignoring tick of {delta_time} s");
            return None;
        }
        self.stats.ticks += 1;

        let quantized = QuantizedInput::new(input.vector(), input.yaw);
        let flags = input.flags.sanitized();
        let wire_input = move_input_from_wire(quantized, flags);

        let start = self.state.clone();
        let mut end = start.clone();
        simulate_ticks(&self.controller, &mut end, &wire_input, delta_time, 1, world);
        let timestamp = end.simulation_clock;
        self.state = end.clone();

        if self.network.combine_moves {
            if let Some(pending) = self.buffer.pending_mut() {
                let max_combined = self.network.max_combined_delta_time;
                if pending.can_combine_with(quantized, flags, delta_time, timestamp, max_combined) {
                    pending.extend(end);
                    self.stats.moves_combined += 1;
                    trace!("combined tick into move ending t={timestamp:.3}");
                    return None;
                }
            }
        }

        let flushed = self.flush();

        let status = if self.network.combine_moves {
            MoveStatus::Recording
        } else {
            MoveStatus::Sent
        };
        let saved = SavedMove {
            timestamp,
            tick_delta_time: delta_time,
            ticks: 1,
            input: quantized,
            flags,
            start,
            end,
            status,
        };
        let sent = (status == MoveStatus::Sent).then(|| saved.to_message());
        if sent.is_some() {
            self.stats.moves_sent += 1;
        }
        if let Some(evicted) = self.buffer.push(saved) {
            warn!("replay buffer full, dropped unacknowledged move t={:.3}", evicted.timestamp);
            self.stats.evicted += 1;
        }

        flushed.or(sent)
    }

    /// Close the pending move and return it for sending.
    pub fn flush(&mut self) -> Option<MoveMessage> {
        let pending = self.buffer.pending_mut()?;
        pending.status = MoveStatus::Sent;
        self.stats.moves_sent += 1;
        Some(pending.to_message())
    }

    /// Handle a message from the authority.
    pub fn receive(&mut self, message: NetMessage, world: &dyn GeometryProbe) {
        match message {
            NetMessage::Ack(ack) => {
                let pruned = self.buffer.acknowledge(ack.timestamp);
                self.stats.acks += 1;
                trace!("ack t={:.3} pruned {pruned} moves", ack.timestamp);
            }
            NetMessage::Correction(correction) => self.reconcile(&correction, world),
            NetMessage::Move(m) => {
                warn!("client received a move message (t={:.3}), ignoring", m.timestamp);
            }
        }
    }

    /// Snap to the authoritative state of one move and replay the rest.
    fn reconcile(&mut self, correction: &CorrectionMessage, world: &dyn GeometryProbe) {
        let Some(mode) = MovementMode::from_index(correction.mode) else {
            warn!("correction with unknown mode index {}", correction.mode);
            return;
        };
        let Some(mut corrected) = self.buffer.take_through(correction.timestamp) else {
            debug!("correction for unknown move t={:.3}", correction.timestamp);
            return;
        };
        corrected.status = MoveStatus::Corrected;

        let mut state = corrected.end.clone();
        self.controller
            .apply_correction(&mut state, correction.position, correction.velocity, mode, world);
        debug!(
            "corrected at t={:.3}: {:?} -> {:?}, replaying {} moves",
            correction.timestamp,
            self.state.position,
            state.position,
            self.buffer.len()
        );

        for saved in self.buffer.iter_unacknowledged_mut() {
            saved.start = state.clone();
            let input = saved.move_input();
            simulate_ticks(&self.controller, &mut state, &input, saved.tick_delta_time, saved.ticks, world);
            debug_assert_eq!(state.simulation_clock, saved.timestamp, "replayed move ended off its timestamp");
            saved.end = state.clone();
            self.stats.replayed_moves += 1;
        }

        self.state = state;
        self.stats.corrections += 1;
        self.last_corrected = Some(corrected);
    }
}
