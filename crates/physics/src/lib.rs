//! Vaultline Physics Engine
//!
//! A deterministic kinematic character controller for bunny-hop movement
//! against static geometry. The same code runs on the predicting client and
//! on the authority, so the same inputs must give bit-identical results.
//!
//! # Architecture
//!
//! The physics engine is split into two main systems:
//!
//! - **Collision**: Sweeps capsules and rays through the world, returns hit information
//! - **Movement**: Uses those queries to run the movement mode state machine
//!
//! # Conventions
//!
//! Y is up, units are metres and seconds. A character's position is the
//! bottom-centre of its capsule. Yaw 0 faces +X.

pub mod collision;
pub mod movement;
pub mod random;

/// Moves and sub-steps shorter than this are skipped.
pub const MIN_TICK_TIME: f32 = 1.0e-6;

// Re-export commonly used types
pub use collision::{
    CollisionWorld, ContentFlags, EmptyWorld, FloorResult, GeometryProbe, HitResult, SurfaceFlags, TraceShape,
};
pub use movement::{
    Action, ActionFlags, MoveInput, MovementConfig, MovementController, MovementMode, MovementState,
};
pub use random::SeededRandom;
