//! Session and network configuration.

use serde::{Deserialize, Serialize};
use vaultline_physics::MovementConfig;

/// Prediction and validation settings shared by client and authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Largest distance between claimed and authoritative position that
    /// still counts as a match (metres).
    pub position_tolerance: f32,

    /// Merge consecutive ticks with identical input into one move.
    pub combine_moves: bool,

    /// Longest move that combining may produce (seconds).
    pub max_combined_delta_time: f32,

    /// Longest move the authority accepts (seconds).
    pub max_move_delta_time: f32,

    /// Speed bound for claimed displacement (m/s).
    pub max_plausible_speed: f32,

    /// Unacknowledged moves kept before the oldest is evicted.
    pub replay_buffer_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            position_tolerance: 1.0e-3,
            combine_moves: true,
            max_combined_delta_time: 0.05,
            max_move_delta_time: 0.25,
            max_plausible_speed: 100.0,
            replay_buffer_capacity: 96,
        }
    }
}

/// Headless session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Simulation tick rate (ticks per second).
    pub tick_rate: u32,

    /// One-way link latency in ticks.
    pub latency_ticks: u32,

    /// Drop every n-th frame in each direction.
    pub drop_every: Option<u32>,

    /// Mouse sensitivity.
    pub mouse_sensitivity: f32,

    /// Movement physics configuration.
    pub movement: MovementConfig,

    pub network: NetworkConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            latency_ticks: 3,
            drop_every: None,
            mouse_sensitivity: 2.0,
            movement: MovementConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Get the time step per tick in seconds.
    pub fn delta_time(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}
