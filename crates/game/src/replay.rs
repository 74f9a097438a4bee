//! Replay buffer of predicted moves.
//!
//! The controlling side keeps every move it simulated until the authority
//! acknowledges it. On a correction the remaining moves are replayed from
//! the corrected state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use vaultline_physics::{ActionFlags, GeometryProbe, MoveInput, MovementController, MovementState};
use vaultline_protocol::{MoveMessage, QuantizedInput, Timestamp};

/// Lifecycle of a saved move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveStatus {
    /// Simulated, still open for combining with the next tick.
    Recording,
    /// Sent to the authority, waiting for an answer.
    Sent,
    /// The authority agreed. Pruned right away.
    Acknowledged,
    /// The authority disagreed and sent its own state.
    Corrected,
}

/// One predicted move: one or more ticks of identical input.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedMove {
    /// Clock at the end of the last tick.
    pub timestamp: Timestamp,
    pub tick_delta_time: f32,
    pub ticks: u8,
    pub input: QuantizedInput,
    pub flags: ActionFlags,
    /// State the move was simulated from.
    pub start: MovementState,
    /// State the move ended in.
    pub end: MovementState,
    pub status: MoveStatus,
}

impl SavedMove {
    /// Input as the simulation sees it.
    pub fn move_input(&self) -> MoveInput {
        move_input_from_wire(self.input, self.flags)
    }

    /// The move as sent to the authority.
    pub fn to_message(&self) -> MoveMessage {
        MoveMessage {
            timestamp: self.timestamp,
            tick_delta_time: self.tick_delta_time,
            ticks: self.ticks,
            input: self.input,
            flags: self.flags.0,
            claimed_position: self.end.position,
            claimed_mode: self.end.mode().index(),
        }
    }

    /// Whether the next tick can be folded into this move.
    ///
    /// Only moves still recording, with the exact same quantized input,
    /// flags and tick length, that did not change mode, and that stay within
    /// `max_combined_delta_time` once extended to `timestamp`. The tick is
    /// still simulated on its own; combining only changes what is sent.
    pub fn can_combine_with(
        &self,
        input: QuantizedInput,
        flags: ActionFlags,
        tick_delta_time: f32,
        timestamp: Timestamp,
        max_combined_delta_time: f32,
    ) -> bool {
        self.status == MoveStatus::Recording
            && self.input == input
            && self.flags == flags
            && self.tick_delta_time == tick_delta_time
            && self.ticks < u8::MAX
            && self.start.mode() == self.end.mode()
            && timestamp - self.start.simulation_clock <= max_combined_delta_time
    }

    /// Fold one more tick, already simulated, into this move.
    pub fn extend(&mut self, end: MovementState) {
        self.timestamp = end.simulation_clock;
        self.ticks += 1;
        self.end = end;
    }
}

/// Rebuild the simulation input from its wire form.
pub fn move_input_from_wire(input: QuantizedInput, flags: ActionFlags) -> MoveInput {
    let vector = input.vector();
    MoveInput {
        forward: vector.x,
        right: vector.y,
        up: vector.z,
        yaw: input.yaw_radians(),
        flags: flags.sanitized(),
    }
}

/// Run `ticks` ticks of `input`, each `tick_delta_time` long.
///
/// Each tick ends at the previous clock plus the tick length. The client
/// predicts and replays through here and the authority re-simulates through
/// here, so both sides pass identical clocks and delta times to the
/// controller.
pub fn simulate_ticks(
    controller: &MovementController,
    state: &mut MovementState,
    input: &MoveInput,
    tick_delta_time: f32,
    ticks: u8,
    world: &dyn GeometryProbe,
) {
    for _ in 0..ticks {
        let timestamp = state.simulation_clock + tick_delta_time;
        let delta_time = timestamp - state.simulation_clock;
        controller.perform_move(state, input, world, delta_time, timestamp);
    }
}

/// Ordered, bounded log of unacknowledged moves.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    moves: VecDeque<SavedMove>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            moves: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a move. When full, the oldest move is evicted and returned.
    pub fn push(&mut self, saved: SavedMove) -> Option<SavedMove> {
        debug_assert!(
            self.moves.back().is_none_or(|last| last.timestamp < saved.timestamp),
            "moves must be pushed in timestamp order"
        );
        let evicted = if self.moves.len() >= self.capacity {
            self.moves.pop_front()
        } else {
            None
        };
        self.moves.push_back(saved);
        evicted
    }

    /// The newest move if it is still recording.
    pub fn pending_mut(&mut self) -> Option<&mut SavedMove> {
        self.moves.back_mut().filter(|m| m.status == MoveStatus::Recording)
    }

    /// Drop every move up to and including `timestamp`. Returns how many.
    pub fn acknowledge(&mut self, timestamp: Timestamp) -> usize {
        let mut count = 0;
        while self.moves.front().is_some_and(|m| m.timestamp <= timestamp) {
            if let Some(mut saved) = self.moves.pop_front() {
                saved.status = MoveStatus::Acknowledged;
                count += 1;
            }
        }
        count
    }

    /// Remove every move up to and including `timestamp`, returning the one
    /// that ends exactly at it.
    pub fn take_through(&mut self, timestamp: Timestamp) -> Option<SavedMove> {
        if !self.moves.iter().any(|m| m.timestamp == timestamp) {
            return None;
        }
        let mut found = None;
        while self.moves.front().is_some_and(|m| m.timestamp <= timestamp) {
            found = self.moves.pop_front();
        }
        found
    }

    pub fn iter_unacknowledged(&self) -> impl Iterator<Item = &SavedMove> {
        self.moves.iter()
    }

    pub fn iter_unacknowledged_mut(&mut self) -> impl Iterator<Item = &mut SavedMove> {
        self.moves.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn clear(&mut self) {
        self.moves.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use vaultline_physics::{Action, MovementConfig, MovementMode};

    fn saved(timestamp: f32) -> SavedMove {
        let mut start = MovementState::default();
        start.simulation_clock = timestamp - 0.01;
        let mut end = start.clone();
        end.simulation_clock = timestamp;
        SavedMove {
            timestamp,
            tick_delta_time: 0.01,
            ticks: 1,
            input: QuantizedInput::new(Vec3::X, 0.0),
            flags: ActionFlags::NONE,
            start,
            end,
            status: MoveStatus::Sent,
        }
    }

    #[test]
    fn test_acknowledge_prunes_through_timestamp() {
        let mut buffer = ReplayBuffer::new(8);
        for ts in [0.01, 0.02, 0.03, 0.04] {
            buffer.push(saved(ts));
        }

        assert_eq!(buffer.acknowledge(0.02), 2);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.iter_unacknowledged().next().map(|m| m.timestamp), Some(0.03));

        // Old acks do nothing.
        assert_eq!(buffer.acknowledge(0.01), 0);
    }

    #[test]
    fn test_take_through_returns_corrected_move() {
        let mut buffer = ReplayBuffer::new(8);
        for ts in [0.01, 0.02, 0.03] {
            buffer.push(saved(ts));
        }

        let taken = buffer.take_through(0.02);
        assert_eq!(taken.map(|m| m.timestamp), Some(0.02));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_take_through_unknown_timestamp_keeps_moves() {
        let mut buffer = ReplayBuffer::new(8);
        buffer.push(saved(0.01));
        buffer.push(saved(0.03));

        assert!(buffer.take_through(0.02).is_none());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut buffer = ReplayBuffer::new(2);
        assert!(buffer.push(saved(0.01)).is_none());
        assert!(buffer.push(saved(0.02)).is_none());
        let evicted = buffer.push(saved(0.03));
        assert_eq!(evicted.map(|m| m.timestamp), Some(0.01));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_pending_only_while_recording() {
        let mut buffer = ReplayBuffer::new(4);
        let mut recording = saved(0.01);
        recording.status = MoveStatus::Recording;
        buffer.push(recording);
        assert!(buffer.pending_mut().is_some());

        if let Some(pending) = buffer.pending_mut() {
            pending.status = MoveStatus::Sent;
        }
        assert!(buffer.pending_mut().is_none());
    }

    #[test]
    fn test_combine_rules() {
        let mut pending = saved(0.02);
        pending.status = MoveStatus::Recording;
        let same = pending.input;

        assert!(pending.can_combine_with(same, ActionFlags::NONE, 0.01, 0.03, 0.05));

        // Different flags, input, tick length, or too long.
        let jump = ActionFlags::from_actions(&[Action::Jump]);
        assert!(!pending.can_combine_with(same, jump, 0.01, 0.03, 0.05));
        assert!(!pending.can_combine_with(QuantizedInput::new(Vec3::Y, 0.0), ActionFlags::NONE, 0.01, 0.03, 0.05));
        assert!(!pending.can_combine_with(same, ActionFlags::NONE, 0.02, 0.04, 0.05));
        assert!(!pending.can_combine_with(same, ActionFlags::NONE, 0.01, 0.2, 0.05));

        // A full tick counter closes the move.
        pending.ticks = u8::MAX;
        assert!(!pending.can_combine_with(same, ActionFlags::NONE, 0.01, 0.03, 0.05));
        pending.ticks = 1;

        // A move that changed mode stays on its own.
        pending.end.set_mode(MovementMode::Walking, &MovementConfig::default());
        assert!(!pending.can_combine_with(same, ActionFlags::NONE, 0.01, 0.03, 0.05));
    }

    #[test]
    fn test_extend_takes_tick_end_state() {
        let mut pending = saved(0.02);
        let mut end = pending.end.clone();
        end.simulation_clock = 0.03;
        end.position = Vec3::new(0.5, 0.0, 0.0);

        pending.extend(end);
        assert_eq!(pending.ticks, 2);
        assert_eq!(pending.timestamp, 0.03);
        assert_eq!(pending.end.position, Vec3::new(0.5, 0.0, 0.0));

        let message = pending.to_message();
        assert_eq!(message.ticks, 2);
        assert_eq!(message.claimed_position, Vec3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_message_carries_end_state() {
        let mut m = saved(0.5);
        m.end.position = Vec3::new(1.0, 2.0, 3.0);
        m.flags = ActionFlags::from_actions(&[Action::WallJump]);

        let message = m.to_message();
        assert_eq!(message.timestamp, 0.5);
        assert_eq!(message.claimed_position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(message.claimed_mode, MovementMode::Falling.index());
        assert_eq!(message.flags, 0x80);
    }

    #[test]
    fn test_wire_input_is_sanitized() {
        let input = move_input_from_wire(QuantizedInput::new(Vec3::new(0.5, -1.0, 0.0), 1.0), ActionFlags(0xFF));
        assert_eq!(input.forward, 0.5);
        assert_eq!(input.right, -1.0);
        assert_eq!(input.flags, ActionFlags(0xFF).sanitized());
    }
}
