//! In-process link between client and authority.
//!
//! Frames are encoded with the wire codec, held for a fixed number of ticks,
//! and optionally dropped on a deterministic pattern.

use std::collections::VecDeque;

use log::{trace, warn};
use vaultline_protocol::{decode, encode, CodecError, NetMessage};

/// Which way a frame travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToAuthority,
    ToClient,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_sent: u32,
    pub frames_delivered: u32,
    pub frames_dropped: u32,
    pub frames_undecodable: u32,
    pub bytes_sent: usize,
}

#[derive(Debug)]
struct Frame {
    deliver_at: u64,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct Lane {
    frames: VecDeque<Frame>,
    sent: u32,
}

/// Delayed, optionally lossy, in-order link.
#[derive(Debug)]
pub struct LoopbackLink {
    latency_ticks: u32,
    drop_every: Option<u32>,
    tick: u64,
    to_authority: Lane,
    to_client: Lane,
    stats: LinkStats,
}

impl LoopbackLink {
    /// Create a link delivering frames `latency_ticks` ticks after sending.
    ///
    /// With `drop_every = Some(n)`, every n-th frame in each direction is
    /// lost.
    pub fn new(latency_ticks: u32, drop_every: Option<u32>) -> Self {
        Self {
            latency_ticks,
            drop_every: drop_every.filter(|&n| n > 0),
            tick: 0,
            to_authority: Lane::default(),
            to_client: Lane::default(),
            stats: LinkStats::default(),
        }
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Frames still in flight in both directions.
    pub fn in_flight(&self) -> usize {
        self.to_authority.frames.len() + self.to_client.frames.len()
    }

    pub fn send(&mut self, direction: Direction, message: &NetMessage) -> Result<(), CodecError> {
        let bytes = encode(message)?;
        let size = bytes.len();
        let deliver_at = self.tick + u64::from(self.latency_ticks);
        let drop_every = self.drop_every;

        let lane = self.lane_mut(direction);
        lane.sent += 1;
        let dropped = drop_every.is_some_and(|n| lane.sent % n == 0);
        if !dropped {
            lane.frames.push_back(Frame { deliver_at, bytes });
        }

        if dropped {
            trace!("dropping {direction:?} frame at t={:.3}", message.timestamp());
            self.stats.frames_dropped += 1;
        } else {
            self.stats.frames_sent += 1;
            self.stats.bytes_sent += size;
        }
        Ok(())
    }

    /// Decode every frame in `direction` that is due by now.
    ///
    /// Frames that fail to decode are logged and skipped.
    pub fn receive(&mut self, direction: Direction) -> Vec<NetMessage> {
        let now = self.tick;
        let mut messages = Vec::new();
        let mut undecodable = 0;
        let lane = self.lane_mut(direction);
        while lane.frames.front().is_some_and(|f| f.deliver_at <= now) {
            let Some(frame) = lane.frames.pop_front() else {
                break;
            };
            match decode(&frame.bytes) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    warn!("skipping {direction:?} frame of {} bytes: {e}", frame.bytes.len());
                    undecodable += 1;
                }
            }
        }
        self.stats.frames_delivered += messages.len() as u32;
        self.stats.frames_undecodable += undecodable;
        messages
    }

    /// Advance link time by one tick.
    pub fn advance(&mut self) {
        self.tick += 1;
    }

    fn lane_mut(&mut self, direction: Direction) -> &mut Lane {
        match direction {
            Direction::ToAuthority => &mut self.to_authority,
            Direction::ToClient => &mut self.to_client,
        }
    }
}
