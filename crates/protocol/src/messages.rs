//! Network message types.
//!
//! Messages exchanged between a predicting client and the authority.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::quantize::QuantizedInput;

/// Version byte prefixed to every encoded message.
pub const PROTOCOL_VERSION: u8 = 2;

/// Simulation clock value, seconds.
pub type Timestamp = f32;

/// All possible messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NetMessage {
    /// Client to authority: one (possibly combined) move.
    Move(MoveMessage),

    /// Authority to client: the move ending at this timestamp matched.
    Ack(AckMessage),

    /// Authority to client: the move diverged; here is the authoritative state.
    Correction(CorrectionMessage),
}

/// One move as sent by the controlling side.
///
/// A move is `ticks` ticks of the same input, each `tick_delta_time` long.
/// Every tick's clock is the previous clock plus the tick length, so the
/// timestamp is the clock after the last tick and the authority reproduces
/// every intermediate clock exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveMessage {
    pub timestamp: Timestamp,
    pub tick_delta_time: f32,
    pub ticks: u8,
    pub input: QuantizedInput,
    /// Held actions as a compressed bit set.
    pub flags: u8,
    /// Position the client ended up at.
    pub claimed_position: Vec3,
    /// Mode the client ended up in, as a wire index.
    pub claimed_mode: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AckMessage {
    pub timestamp: Timestamp,
}

/// Authoritative state at the end of the move with this timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionMessage {
    pub timestamp: Timestamp,
    pub position: Vec3,
    pub velocity: Vec3,
    pub mode: u8,
}

impl MoveMessage {
    /// Clock after running the move's ticks from `start`.
    pub fn end_clock(&self, start: Timestamp) -> Timestamp {
        tick_clock(start, self.tick_delta_time, self.ticks)
    }
}

/// Advance `start` by `ticks` ticks of `tick_delta_time`, one addition per tick.
pub fn tick_clock(start: Timestamp, tick_delta_time: f32, ticks: u8) -> Timestamp {
    (0..ticks).fold(start, |clock, _| clock + tick_delta_time)
}

impl NetMessage {
    /// Timestamp of the move the message is about.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            NetMessage::Move(m) => m.timestamp,
            NetMessage::Ack(m) => m.timestamp,
            NetMessage::Correction(m) => m.timestamp,
        }
    }
}
