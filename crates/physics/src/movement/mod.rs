//! Character movement system.
//!
//! This module implements kinematic bunny-hop movement with:
//!
//! - Ground movement with friction, braking and stair stepping
//! - Air strafing with a capped gain, and sway after wall jumps
//! - Sliding with slope-dependent friction
//! - Wall jumping, wall climbing, wall running
//! - Mantling and ledge climbing
//!
//! # Design
//!
//! Movement is driven by the [`MovementController`], which takes one
//! [`MoveInput`] per move and advances a [`MovementState`] through a
//! [`GeometryProbe`](crate::collision::GeometryProbe).
//!
//! Exactly one [`MovementMode`] is active at a time. Modes change only
//! through [`MovementState::set_mode`], which runs exit and enter hooks.
//!
//! All movement is deterministic: the same start state, inputs and geometry
//! give bit-identical results, which client prediction relies on.

mod config;
mod controller;
mod integrator;
mod jump;
mod slide_move;
mod state;
mod walls;

pub use config::{MovementConfig, StrafeProfile};
pub use controller::{max_speed, MovementController, MAX_FLOOR_DIST, MIN_FLOOR_DIST};
pub use integrator::{
    apply_velocity_braking, calc_ground_velocity, calc_slide_velocity, new_fall_velocity, slide_friction,
    strafe_gain, wall_climb_velocity, wall_run_velocity, Braking, BRAKE_TO_STOP_VELOCITY,
};
pub use jump::{JumpRules, JumpState};
pub use slide_move::{compute_slide_vector, plane_project, two_wall_adjust};
pub use state::{
    forward_from_yaw, horizontal, right_from_yaw, Action, ActionFlags, MantleMemory, ModeLedger, MoveInput,
    MovementMode, MovementState, StrafeSway, WallClimbMemory, WallJumpMemory, WallRunMemory, ACTION_BITS,
};
pub use walls::{find_ledge, reflect_trajectory, LedgeTarget, WallJumpKind, FLOOR_HOVER};
