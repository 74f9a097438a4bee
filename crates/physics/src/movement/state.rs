//! Movement state and per-move input.

use glam::Vec3;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use super::config::MovementConfig;
use super::jump::JumpState;
use crate::collision::{FloorResult, SurfaceId};

/// Movement modes. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum MovementMode {
    Walking = 0,
    #[default]
    Falling = 1,
    Sliding = 2,
    WallClimbing = 3,
    WallRunning = 4,
    Mantling = 5,
    LedgeClimbing = 6,
}

impl MovementMode {
    pub const COUNT: usize = 7;

    pub const ALL: [MovementMode; Self::COUNT] = [
        Self::Walking,
        Self::Falling,
        Self::Sliding,
        Self::WallClimbing,
        Self::WallRunning,
        Self::Mantling,
        Self::LedgeClimbing,
    ];

    /// Stable index, also used on the wire.
    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Walking or sliding: the floor supports the character.
    #[inline]
    pub fn is_moving_on_ground(self) -> bool {
        matches!(self, Self::Walking | Self::Sliding)
    }

    /// Modes layered on top of the basic walk/fall pair.
    #[inline]
    pub fn is_custom(self) -> bool {
        !matches!(self, Self::Walking | Self::Falling)
    }
}

/// Discrete actions sampled once per move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Jump = 0,
    Crouch = 1,
    Sprint = 2,
    Mantle = 3,
    Aim = 4,
    WallJump = 5,
}

/// Bit assigned to each action in a compressed flags byte.
///
/// Indexed by the action's discriminant.
pub const ACTION_BITS: [(Action, u8); 6] = [
    (Action::Jump, 0x01),
    (Action::Crouch, 0x02),
    (Action::Sprint, 0x10),
    (Action::Mantle, 0x20),
    (Action::Aim, 0x40),
    (Action::WallJump, 0x80),
];

impl Action {
    pub const ALL: [Action; 6] = [
        Self::Jump,
        Self::Crouch,
        Self::Sprint,
        Self::Mantle,
        Self::Aim,
        Self::WallJump,
    ];

    #[inline]
    pub fn bit(self) -> u8 {
        ACTION_BITS[self as usize].1
    }
}

/// Compressed set of held actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionFlags(pub u8);

impl ActionFlags {
    pub const NONE: Self = Self(0);

    pub fn from_actions(actions: &[Action]) -> Self {
        let mut flags = Self::NONE;
        for action in actions {
            flags.set(*action, true);
        }
        flags
    }

    #[inline]
    pub fn has(self, action: Action) -> bool {
        self.0 & action.bit() != 0
    }

    #[inline]
    pub fn set(&mut self, action: Action, value: bool) {
        if value {
            self.0 |= action.bit();
        } else {
            self.0 &= !action.bit();
        }
    }

    /// Drop bits that map to no action.
    pub fn sanitized(self) -> Self {
        let known = ACTION_BITS.iter().fold(0u8, |acc, (_, bit)| acc | bit);
        Self(self.0 & known)
    }
}

/// Input for one move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveInput {
    /// Forward axis in [-1, 1].
    pub forward: f32,
    /// Right axis in [-1, 1].
    pub right: f32,
    /// Up axis in [-1, 1]; unused by the ground and air modes.
    pub up: f32,
    /// Facing yaw in radians.
    pub yaw: f32,
    pub flags: ActionFlags,
}

impl MoveInput {
    /// The player input vector `(forward, right, up)`.
    #[inline]
    pub fn vector(&self) -> Vec3 {
        Vec3::new(self.forward, self.right, self.up)
    }

    #[inline]
    pub fn has(&self, action: Action) -> bool {
        self.flags.has(action)
    }

    pub fn has_movement_input(&self) -> bool {
        self.forward != 0.0 || self.right != 0.0
    }
}

/// Forward direction on the horizontal plane for a yaw.
#[inline]
pub fn forward_from_yaw(yaw: f32) -> Vec3 {
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    Vec3::new(cos_yaw, 0.0, sin_yaw)
}

/// Right direction on the horizontal plane for a yaw.
#[inline]
pub fn right_from_yaw(yaw: f32) -> Vec3 {
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    Vec3::new(-sin_yaw, 0.0, cos_yaw)
}

/// Extra air control granted after a wall jump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StrafeSway {
    pub active: bool,
    pub start_time: f32,
}

/// Wall jump bookkeeping, cleared on landing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WallJumpMemory {
    /// Where the character last left the ground.
    pub previous_ground_location: Vec3,
    /// Normal of the wall used by the last wall jump.
    pub previous_normal: Option<Vec3>,
    /// Wall jumps since the last landing.
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WallClimbMemory {
    pub start_time: f32,
    /// When the last climb ended. `None` once the ground was touched.
    pub last_end_time: Option<f32>,
    /// Outward normal of the wall being climbed.
    pub wall_normal: Vec3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WallRunMemory {
    pub start_time: f32,
    pub surface: Option<SurfaceId>,
    /// Outward normal of the wall being run along.
    pub normal: Vec3,
    pub location: Vec3,
    /// Horizontal direction of travel along the wall.
    pub direction: Vec3,
    /// Wall and height of the previous run, to stop instant re-latching.
    pub last_surface: Option<SurfaceId>,
    pub last_height: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MantleMemory {
    pub start_time: f32,
    /// Position level with the ledge, still in front of the wall.
    pub anchor: Vec3,
    /// Standing position on top of the ledge.
    pub target: Vec3,
    pub wall_normal: Vec3,
}

/// Counts enter/exit hook invocations per mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeLedger {
    pub entered: [u32; MovementMode::COUNT],
    pub exited: [u32; MovementMode::COUNT],
}

impl ModeLedger {
    /// Every mode has been exited as often as entered, except the current
    /// one which has one outstanding enter.
    pub fn is_consistent(&self, current: MovementMode) -> bool {
        MovementMode::ALL.iter().all(|&mode| {
            let i = mode as usize;
            let open = u32::from(mode == current);
            self.entered[i] == self.exited[i] + open
        })
    }

    pub fn transitions(&self) -> u32 {
        self.exited.iter().sum()
    }
}

/// Complete movement state for one controlled character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementState {
    /// Changed only through [`MovementState::set_mode`].
    mode: MovementMode,

    /// Bottom-centre of the capsule.
    pub position: Vec3,

    pub velocity: Vec3,

    /// Input acceleration, derived fresh every move.
    pub acceleration: Vec3,

    /// Clock of the last simulated move, seconds.
    pub simulation_clock: f32,

    /// Facing yaw in radians.
    pub yaw: f32,

    /// Input of the last simulated move.
    pub input: MoveInput,

    pub floor: FloorResult,

    pub crouched: bool,

    pub jump: JumpState,

    pub sway: StrafeSway,
    pub wall_jump: WallJumpMemory,
    pub wall_climb: WallClimbMemory,
    pub wall_run: WallRunMemory,
    pub mantle: MantleMemory,

    pub ledger: ModeLedger,
}

impl Default for MovementState {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl MovementState {
    /// Create a falling character at `position`.
    pub fn new(position: Vec3) -> Self {
        let mut ledger = ModeLedger::default();
        ledger.entered[MovementMode::Falling as usize] = 1;

        Self {
            mode: MovementMode::Falling,
            position,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            simulation_clock: 0.0,
            yaw: 0.0,
            input: MoveInput::default(),
            floor: FloorResult::default(),
            crouched: false,
            jump: JumpState::default(),
            sway: StrafeSway::default(),
            wall_jump: WallJumpMemory {
                previous_ground_location: position,
                ..Default::default()
            },
            wall_climb: WallClimbMemory::default(),
            wall_run: WallRunMemory::default(),
            mantle: MantleMemory::default(),
            ledger,
        }
    }

    #[inline]
    pub fn mode(&self) -> MovementMode {
        self.mode
    }

    /// Switch modes, running the old mode's exit hook then the new mode's
    /// enter hook. Setting the current mode again does nothing.
    pub fn set_mode(&mut self, mode: MovementMode, config: &MovementConfig) {
        if mode == self.mode {
            return;
        }
        debug_assert!(
            self.ledger.is_consistent(self.mode),
            "mode hooks out of balance before leaving {:?}",
            self.mode
        );

        let old = self.mode;
        self.exit_mode(old);
        self.mode = mode;
        self.enter_mode(mode, config);

        debug!(
            "movement mode {:?} -> {:?} at t={:.3} pos={:?}",
            old, mode, self.simulation_clock, self.position
        );
    }

    fn exit_mode(&mut self, mode: MovementMode) {
        self.ledger.exited[mode as usize] += 1;
        match mode {
            MovementMode::Walking => {
                self.wall_jump.previous_ground_location = self.position;
                self.wall_climb.last_end_time = None;
            }
            MovementMode::Falling => {
                self.wall_jump.previous_normal = None;
            }
            MovementMode::WallClimbing => {
                self.wall_climb.last_end_time = Some(self.simulation_clock);
            }
            MovementMode::WallRunning => {
                self.wall_run.last_surface = self.wall_run.surface.take();
                self.wall_run.last_height = self.wall_run.location.y;
            }
            MovementMode::LedgeClimbing => {
                self.mantle = MantleMemory::default();
            }
            MovementMode::Sliding | MovementMode::Mantling => {}
        }
    }

    fn enter_mode(&mut self, mode: MovementMode, config: &MovementConfig) {
        self.ledger.entered[mode as usize] += 1;
        match mode {
            MovementMode::Walking => {
                self.velocity.y = 0.0;
                self.wall_jump.count = 0;
                self.wall_jump.previous_normal = None;
                self.wall_run.last_surface = None;
                self.mantle = MantleMemory::default();
            }
            MovementMode::Sliding => {
                let direction = horizontal(self.velocity).normalize_or_zero();
                self.velocity += direction * config.slide_enter_impulse;
                trace!("slide impulse {:?}", direction * config.slide_enter_impulse);
            }
            MovementMode::WallClimbing => {
                self.wall_climb.start_time = self.simulation_clock;
            }
            MovementMode::WallRunning => {
                self.wall_run.start_time = self.simulation_clock;
            }
            MovementMode::Mantling | MovementMode::LedgeClimbing => {
                self.mantle.start_time = self.simulation_clock;
            }
            MovementMode::Falling => {}
        }
    }

    // ========================================================================
    // Queries for animation, UI and abilities
    // ========================================================================

    #[inline]
    pub fn current_mode(&self) -> MovementMode {
        self.mode
    }

    pub fn current_speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn horizontal_speed(&self) -> f32 {
        horizontal(self.velocity).length()
    }

    pub fn player_input_vector(&self) -> Vec3 {
        self.input.vector()
    }

    pub fn forward_direction(&self) -> Vec3 {
        forward_from_yaw(self.yaw)
    }

    pub fn right_direction(&self) -> Vec3 {
        right_from_yaw(self.yaw)
    }

    pub fn is_moving_on_ground(&self) -> bool {
        self.mode.is_moving_on_ground()
    }

    pub fn is_falling(&self) -> bool {
        self.mode == MovementMode::Falling
    }

    pub fn is_sliding(&self) -> bool {
        self.mode == MovementMode::Sliding
    }

    pub fn is_wall_climbing(&self) -> bool {
        self.mode == MovementMode::WallClimbing
    }

    pub fn is_wall_running(&self) -> bool {
        self.mode == MovementMode::WallRunning
    }

    pub fn is_mantling(&self) -> bool {
        self.mode == MovementMode::Mantling
    }

    pub fn is_ledge_climbing(&self) -> bool {
        self.mode == MovementMode::LedgeClimbing
    }

    pub fn is_strafe_swaying(&self) -> bool {
        self.sway.active
    }

    pub fn is_sprinting(&self) -> bool {
        self.input.has(Action::Sprint)
    }

    pub fn is_aiming(&self) -> bool {
        self.input.has(Action::Aim)
    }

    pub fn is_crouched(&self) -> bool {
        self.crouched
    }
}

/// Drop the vertical component.
#[inline]
pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_table_matches_discriminants() {
        for (i, (action, _)) in ACTION_BITS.iter().enumerate() {
            assert_eq!(*action as usize, i);
        }
        assert_eq!(Action::WallJump.bit(), 0x80);
        assert_eq!(Action::Aim.bit(), 0x40);
        assert_eq!(Action::Mantle.bit(), 0x20);
        assert_eq!(Action::Sprint.bit(), 0x10);
    }

    #[test]
    fn test_action_flags_set_and_clear() {
        let mut flags = ActionFlags::from_actions(&[Action::Sprint, Action::WallJump]);
        assert_eq!(flags.0, 0x90);
        assert!(flags.has(Action::Sprint));

        flags.set(Action::Sprint, false);
        assert!(!flags.has(Action::Sprint));
        assert_eq!(ActionFlags(0xFF).sanitized().0, 0xF3);
    }

    #[test]
    fn test_mode_index_round_trip() {
        for mode in MovementMode::ALL {
            assert_eq!(MovementMode::from_index(mode.index()), Some(mode));
        }
        assert_eq!(MovementMode::from_index(7), None);
    }

    #[test]
    fn test_hooks_balance_across_transitions() {
        let config = MovementConfig::default();
        let mut state = MovementState::new(Vec3::ZERO);
        let path = [
            MovementMode::Walking,
            MovementMode::Sliding,
            MovementMode::Walking,
            MovementMode::Falling,
            MovementMode::WallClimbing,
            MovementMode::Mantling,
            MovementMode::LedgeClimbing,
            MovementMode::Walking,
            MovementMode::Falling,
            MovementMode::WallRunning,
            MovementMode::Falling,
        ];

        for mode in path {
            state.set_mode(mode, &config);
            assert_eq!(state.mode(), mode);
            assert!(state.ledger.is_consistent(mode));
        }
        assert_eq!(state.ledger.transitions(), path.len() as u32);
    }

    #[test]
    fn test_same_mode_runs_no_hooks() {
        let config = MovementConfig::default();
        let mut state = MovementState::new(Vec3::ZERO);
        state.set_mode(MovementMode::Falling, &config);
        assert_eq!(state.ledger.transitions(), 0);
    }

    #[test]
    fn test_slide_entry_adds_impulse_along_travel() {
        let config = MovementConfig {
            slide_enter_threshold: 600.0,
            slide_enter_impulse: 50.0,
            ..Default::default()
        };
        let mut state = MovementState::new(Vec3::ZERO);
        state.set_mode(MovementMode::Walking, &config);
        state.velocity = Vec3::new(0.0, 0.0, 700.0);

        state.set_mode(MovementMode::Sliding, &config);
        assert_eq!(state.velocity, Vec3::new(0.0, 0.0, 750.0));
    }

    #[test]
    fn test_leaving_ground_remembers_location() {
        let config = MovementConfig::default();
        let mut state = MovementState::new(Vec3::ZERO);
        state.set_mode(MovementMode::Walking, &config);
        state.position = Vec3::new(3.0, 1.0, -2.0);
        state.wall_climb.last_end_time = Some(1.0);

        state.set_mode(MovementMode::Falling, &config);
        assert_eq!(state.wall_jump.previous_ground_location, Vec3::new(3.0, 1.0, -2.0));
        assert_eq!(state.wall_climb.last_end_time, None);
    }

    #[test]
    fn test_landing_resets_wall_jumps() {
        let config = MovementConfig::default();
        let mut state = MovementState::new(Vec3::ZERO);
        state.wall_jump.count = 2;
        state.wall_jump.previous_normal = Some(Vec3::X);

        state.set_mode(MovementMode::Walking, &config);
        assert_eq!(state.wall_jump.count, 0);
        assert_eq!(state.wall_jump.previous_normal, None);
    }

    #[test]
    fn test_wall_run_exit_records_last_wall() {
        let config = MovementConfig::default();
        let mut state = MovementState::new(Vec3::ZERO);
        state.set_mode(MovementMode::WallRunning, &config);
        state.wall_run.surface = Some(4);
        state.wall_run.location = Vec3::new(0.0, 2.5, 0.0);

        state.set_mode(MovementMode::Falling, &config);
        assert_eq!(state.wall_run.last_surface, Some(4));
        assert_eq!(state.wall_run.last_height, 2.5);
        assert_eq!(state.wall_run.surface, None);
    }
}
