//! Player input handling.
//!
//! Converts held keys and mouse motion into the [`MoveInput`] the movement
//! controller consumes, and provides scripted input for headless runs.

use serde::{Deserialize, Serialize};
use vaultline_physics::{Action, ActionFlags, MoveInput};

/// Raw player input for a single frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Movement keys pressed.
    pub movement: MovementInput,

    /// Horizontal mouse delta this frame (pixels).
    pub mouse_delta_x: f32,

    /// Action buttons pressed.
    pub actions: ActionInput,

    /// Frame number this input was generated.
    pub frame: u32,
}

/// Movement key states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

/// Action button states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInput {
    pub jump: bool,
    pub crouch: bool,
    pub sprint: bool,
    pub mantle: bool,
    pub aim: bool,
    pub wall_jump: bool,
}

impl ActionInput {
    pub fn to_flags(self) -> ActionFlags {
        let mut flags = ActionFlags::NONE;
        flags.set(Action::Jump, self.jump);
        flags.set(Action::Crouch, self.crouch);
        flags.set(Action::Sprint, self.sprint);
        flags.set(Action::Mantle, self.mantle);
        flags.set(Action::Aim, self.aim);
        flags.set(Action::WallJump, self.wall_jump);
        flags
    }
}

impl PlayerInput {
    /// Convert to a movement input facing `yaw`.
    pub fn to_move_input(&self, yaw: f32) -> MoveInput {
        let mut input = MoveInput {
            yaw,
            flags: self.actions.to_flags(),
            ..Default::default()
        };

        if self.movement.forward {
            input.forward += 1.0;
        }
        if self.movement.backward {
            input.forward -= 1.0;
        }
        if self.movement.right {
            input.right += 1.0;
        }
        if self.movement.left {
            input.right -= 1.0;
        }

        // Normalize diagonal movement
        let magnitude = (input.forward.powi(2) + input.right.powi(2)).sqrt();
        if magnitude > 1.0 {
            input.forward /= magnitude;
            input.right /= magnitude;
        }

        input
    }

    /// Yaw change in radians for this frame's mouse motion.
    ///
    /// Moving the mouse right turns right, which is increasing yaw.
    pub fn yaw_delta(&self, mouse_sensitivity: f32) -> f32 {
        self.mouse_delta_x * mouse_sensitivity * 0.001
    }

    /// Check if any movement input is active.
    pub fn has_movement(&self) -> bool {
        self.movement.forward || self.movement.backward || self.movement.left || self.movement.right
    }
}

/// Input held for a number of ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSegment {
    pub ticks: u32,
    pub input: PlayerInput,
}

/// Sequence of held inputs, played back one tick at a time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputScript {
    segments: Vec<InputSegment>,
}

impl InputScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment holding `input` for `ticks` ticks.
    pub fn hold(mut self, ticks: u32, input: PlayerInput) -> Self {
        if ticks > 0 {
            self.segments.push(InputSegment { ticks, input });
        }
        self
    }

    /// Append a segment with no keys held.
    pub fn idle(self, ticks: u32) -> Self {
        self.hold(ticks, PlayerInput::default())
    }

    /// Total length in ticks.
    pub fn len(&self) -> u32 {
        self.segments.iter().map(|s| s.ticks).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Input for each tick in order, with frame numbers filled in.
    pub fn frames(&self) -> impl Iterator<Item = PlayerInput> + '_ {
        self.segments
            .iter()
            .flat_map(|segment| std::iter::repeat_n(&segment.input, segment.ticks as usize))
            .enumerate()
            .map(|(frame, input)| PlayerInput {
                frame: frame as u32,
                ..input.clone()
            })
    }
}
