//! Jump state management.
//!
//! Handles jump cooldown and jump queuing against the simulation clock. A
//! press shortly before landing is queued and fires on touchdown, which is
//! what keeps bunny-hop chains responsive.

use serde::{Deserialize, Serialize};

/// Jump state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JumpState {
    /// Clock time before which no jump may start.
    cooldown_until: f32,

    /// Clock time until which a queued press stays valid.
    queued_until: Option<f32>,

    /// Previous move's jump input, for edge detection.
    prev_pressed: bool,
}

/// Jump timing parameters, taken from the movement config.
#[derive(Debug, Clone, Copy)]
pub struct JumpRules {
    pub cooldown: f32,
    pub queue_window: f32,
    pub auto_hop: bool,
}

impl JumpState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update jump state for this move.
    ///
    /// # Arguments
    ///
    /// * `pressed` - Whether jump is held this move
    /// * `on_ground` - Whether the character can jump from where it stands
    /// * `clock` - Simulation clock of this move
    /// * `rules` - Cooldown, queue window and auto hop
    ///
    /// # Returns
    ///
    /// Whether a jump should start now.
    pub fn update(&mut self, pressed: bool, on_ground: bool, clock: f32, rules: JumpRules) -> bool {
        let just_pressed = pressed && !self.prev_pressed;
        self.prev_pressed = pressed;

        if self.queued_until.is_some_and(|until| clock > until) {
            self.queued_until = None;
        }

        let can_jump = on_ground && clock >= self.cooldown_until;

        if just_pressed && !can_jump {
            self.queued_until = Some(clock + rules.queue_window);
        }

        let should_jump =
            can_jump && (just_pressed || self.queued_until.is_some() || (rules.auto_hop && pressed));

        if should_jump {
            self.cooldown_until = clock + rules.cooldown;
            self.queued_until = None;
        }

        should_jump
    }

    pub fn is_queued(&self) -> bool {
        self.queued_until.is_some()
    }

    pub fn on_cooldown(&self, clock: f32) -> bool {
        clock < self.cooldown_until
    }

    pub fn clear_queue(&mut self) {
        self.queued_until = None;
    }
}

// ============================================================================
// Tests
// ============================================================================
