//! Authoritative simulation of a remotely controlled character.
//!
//! The authority re-simulates every received move through the same
//! controller the client predicted with, starting from its own state, and
//! answers with an acknowledgement or a correction.

use std::cmp::Ordering;

use glam::Vec3;
use log::{debug, warn};
use thiserror::Error;
use vaultline_physics::{ActionFlags, GeometryProbe, MovementController, MovementMode, MovementState};
use vaultline_protocol::{AckMessage, CorrectionMessage, MoveMessage, NetMessage, Timestamp};

use crate::config::NetworkConfig;
use crate::replay::{move_input_from_wire, simulate_ticks};

/// Why a received move was not simulated.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RejectReason {
    #[error("non-finite value in move")]
    NonFinite,

    #[error("move at {timestamp} is not after the last processed move at {last}")]
    Stale { timestamp: Timestamp, last: Timestamp },

    #[error("move spans {0} s, more than allowed")]
    DeltaTooLarge(f32),

    #[error("claimed displacement of {distance} m in {delta_time} s")]
    Implausible { distance: f32, delta_time: f32 },

    #[error("unknown movement mode index {0}")]
    UnknownMode(u8),

    #[error("malformed tick layout: {ticks} ticks of {tick_delta_time} s")]
    MalformedTicks { ticks: u8, tick_delta_time: f32 },
}

/// Counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthorityStats {
    pub moves_received: u32,
    pub acks: u32,
    pub corrections: u32,
    pub rejected: u32,
    pub dropped: u32,
}

/// Authoritative side of one controlled character.
#[derive(Debug)]
pub struct Authority {
    controller: MovementController,
    state: MovementState,
    network: NetworkConfig,
    stats: AuthorityStats,
}

impl Authority {
    pub fn new(controller: MovementController, network: NetworkConfig) -> Self {
        Self {
            controller,
            state: MovementState::default(),
            network,
            stats: AuthorityStats::default(),
        }
    }

    pub fn spawn_at(&mut self, position: Vec3, yaw: f32, world: &dyn GeometryProbe) {
        self.state = MovementState::default();
        self.state.yaw = yaw;
        self.state.input.yaw = yaw;
        self.controller.spawn_at(&mut self.state, position, world);
    }

    pub fn state(&self) -> &MovementState {
        &self.state
    }

    pub fn stats(&self) -> AuthorityStats {
        self.stats
    }

    /// Clock at the end of the last processed move.
    pub fn last_processed(&self) -> Timestamp {
        self.state.simulation_clock
    }

    /// Check a move against the current state, returning its delta time.
    pub fn validate(&self, message: &MoveMessage) -> Result<f32, RejectReason> {
        let last = self.state.simulation_clock;
        if message.timestamp.partial_cmp(&last) != Some(Ordering::Greater) {
            return Err(RejectReason::Stale {
                timestamp: message.timestamp,
                last,
            });
        }
        if !message.timestamp.is_finite()
            || !message.tick_delta_time.is_finite()
            || !message.claimed_position.is_finite()
        {
            return Err(RejectReason::NonFinite);
        }
        if MovementMode::from_index(message.claimed_mode).is_none() {
            return Err(RejectReason::UnknownMode(message.claimed_mode));
        }

        if message.ticks == 0 || message.tick_delta_time <= 0.0 {
            return Err(RejectReason::MalformedTicks {
                ticks: message.ticks,
                tick_delta_time: message.tick_delta_time,
            });
        }

        let delta_time = message.timestamp - last;
        if delta_time > self.network.max_move_delta_time {
            return Err(RejectReason::DeltaTooLarge(delta_time));
        }

        let distance = message.claimed_position.distance(self.state.position);
        if distance > self.network.max_plausible_speed * delta_time + self.network.position_tolerance {
            return Err(RejectReason::Implausible { distance, delta_time });
        }

        Ok(delta_time)
    }

    /// Process one move, returning the reply to send, if any.
    ///
    /// Stale and duplicate moves are dropped without a reply. Moves that
    /// fail validation are not simulated; the clock advances to the move's
    /// timestamp and the current state goes back as a correction.
    pub fn receive(&mut self, message: &MoveMessage, world: &dyn GeometryProbe) -> Option<NetMessage> {
        self.stats.moves_received += 1;

        match self.validate(message) {
            Ok(_) => {}
            Err(reason @ RejectReason::Stale { .. }) => {
                debug!("dropping move: {reason}");
                self.stats.dropped += 1;
                return None;
            }
            Err(reason) => {
                warn!("rejected move at t={:.3}: {reason}", message.timestamp);
                self.stats.rejected += 1;
                self.state.simulation_clock = message.timestamp;
                return Some(self.correction(message.timestamp));
            }
        }

        self.state = self.replay(&self.state, message, world);

        let distance = self.state.position.distance(message.claimed_position);
        let mode_matches = self.state.mode().index() == message.claimed_mode;
        if distance <= self.network.position_tolerance && mode_matches {
            self.stats.acks += 1;
            Some(NetMessage::Ack(AckMessage {
                timestamp: message.timestamp,
            }))
        } else {
            debug!(
                "correcting move at t={:.3}: off by {:.4} m, mode {:?} vs claimed {}",
                message.timestamp,
                distance,
                self.state.mode(),
                message.claimed_mode
            );
            self.stats.corrections += 1;
            Some(self.correction(message.timestamp))
        }
    }

    /// Re-simulate `message` from `saved` without touching the authority.
    ///
    /// When the record starts where `saved` ends, it runs tick by tick
    /// exactly as it was predicted. After lost records it starts later, and
    /// the whole gap is covered by one move instead. Either way replaying
    /// the same record against the same saved state gives the same result.
    pub fn replay(&self, saved: &MovementState, message: &MoveMessage, world: &dyn GeometryProbe) -> MovementState {
        let mut state = saved.clone();
        let input = move_input_from_wire(message.input, ActionFlags(message.flags));
        if message.end_clock(saved.simulation_clock) == message.timestamp {
            simulate_ticks(
                &self.controller,
                &mut state,
                &input,
                message.tick_delta_time,
                message.ticks,
                world,
            );
        } else {
            debug!("move at t={:.3} does not follow t={:.3}, covering the gap", message.timestamp, saved.simulation_clock);
            let delta_time = message.timestamp - saved.simulation_clock;
            self.controller
                .perform_move(&mut state, &input, world, delta_time, message.timestamp);
        }
        state
    }

    fn correction(&self, timestamp: Timestamp) -> NetMessage {
        NetMessage::Correction(CorrectionMessage {
            timestamp,
            position: self.state.position,
            velocity: self.state.velocity,
            mode: self.state.mode().index(),
        })
    }
}
