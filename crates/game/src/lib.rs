//! Vaultline networked movement.
//!
//! This crate runs the movement controller on both ends of a
//! client-predicted, server-authoritative connection:
//!
//! - Input sampling and scripted input
//! - Courses (collision, spawn points, checkpoints)
//! - Replay buffer of predicted moves with move combining
//! - Predicting client and validating authority
//! - An in-process lossy link and a session harness
//!
//! # Architecture
//!
//! Both sides simulate with the same controller and step every record tick
//! by tick with the same clock arithmetic, so replaying a record reproduces
//! the same state bit for bit. Combining ticks into one record changes what
//! is sent, never what is simulated.
//!
//! ```text
//! ┌──────────────────────────┐   Move    ┌───────────────────────────┐
//! │ PredictedClient          │──────────►│ Authority                 │
//! │  input ─► quantize ─►    │           │  validate ─► replay ─►    │
//! │  perform_move ─► buffer  │◄──────────│  compare claimed state    │
//! │  (replay on correction)  │ Ack/Corr. │                           │
//! └──────────────────────────┘           └───────────────────────────┘
//!               ▲          LoopbackLink (latency, drops)       ▲
//!               └──────────────── Session ─────────────────────┘
//! ```

pub mod authority;
pub mod client;
pub mod config;
pub mod input;
pub mod level;
pub mod link;
pub mod replay;
pub mod session;

// Re-export main types
pub use authority::{Authority, AuthorityStats, RejectReason};
pub use client::{ClientStats, PredictedClient};
pub use config::{NetworkConfig, SessionConfig};
pub use input::{InputScript, PlayerInput};
pub use level::Course;
pub use link::{Direction, LoopbackLink};
pub use replay::{MoveStatus, ReplayBuffer, SavedMove};
pub use session::{Session, SessionReport};

// Re-export physics types for convenience
pub use vaultline_physics::{
    CollisionWorld, ContentFlags, MoveInput, MovementConfig, MovementController, MovementMode, MovementState,
};
