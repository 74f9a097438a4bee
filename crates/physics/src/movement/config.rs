//! Movement configuration constants.
//!
//! All movement parameters are grouped here for easy tuning. Values use
//! metres and seconds; Y is up.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::collision::TraceShape;

/// Parameters for one flavour of the strafe-gain algorithm.
///
/// Plain air strafing, post-wall-jump sway and sliding each carry their own
/// instance; the integrator is the same.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrafeProfile {
    /// Scales the speed cap derived from max acceleration.
    pub gain_multiplier: f32,

    /// Scales how quickly acceleration turns the velocity.
    pub rotation_rate: f32,

    /// Input pointing further back than this (dot with current horizontal
    /// velocity direction) adds nothing. `None` accepts any direction.
    pub min_turn_dot: Option<f32>,
}

/// Configuration for character movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementConfig {
    // ========================================================================
    // Dimensions
    // ========================================================================
    /// Capsule radius.
    pub capsule_radius: f32,

    /// Capsule height when standing.
    pub standing_height: f32,

    /// Capsule height when crouched or sliding.
    pub crouched_height: f32,

    // ========================================================================
    // Ground
    // ========================================================================
    /// Max speed walking.
    pub max_walk_speed: f32,

    /// Max speed walking crouched.
    pub max_walk_speed_crouched: f32,

    pub sprint_speed_multiplier: f32,

    /// Applied to crouched speed while sprint is held.
    pub crouch_sprint_speed_multiplier: f32,

    pub aim_speed_multiplier: f32,

    /// Max input acceleration on the ground.
    pub max_acceleration: f32,

    /// Friction while accelerating; higher turns faster.
    pub ground_friction: f32,

    /// Friction used while braking (no input or above max speed).
    pub braking_friction: f32,

    /// Multiplies braking friction.
    pub braking_friction_factor: f32,

    /// Constant deceleration while braking on the ground.
    pub braking_deceleration_walking: f32,

    /// Braking is sub-stepped at this interval, clamped to [1/75, 1/20].
    pub braking_sub_step_time: f32,

    /// Friction scale on [`SurfaceFlags::SLICK`](crate::collision::SurfaceFlags::SLICK) floors.
    pub slick_friction_scale: f32,

    /// Max obstacle height the character steps over.
    pub max_step_height: f32,

    /// Min floor normal Y to be walkable. 0.69 ≈ 46 degrees.
    pub walkable_floor_y: f32,

    // ========================================================================
    // Jumping
    // ========================================================================
    /// Vertical speed given by a jump.
    pub jump_z_velocity: f32,

    /// Minimum time between jumps.
    pub jump_cooldown: f32,

    /// A press this long before landing still jumps on touchdown.
    pub jump_queue_window: f32,

    /// Holding jump re-jumps on every landing.
    pub auto_hop: bool,

    // ========================================================================
    // Sliding
    // ========================================================================
    /// Min horizontal speed to start or keep sliding.
    pub slide_enter_threshold: f32,

    /// Speed added along the direction of travel when a slide begins.
    pub slide_enter_impulse: f32,

    /// Max speed while sliding.
    pub slide_speed_limit: f32,

    /// Base slide friction on flat ground.
    pub slide_friction: f32,

    /// How strongly slope alignment lowers slide friction.
    pub slide_angle_friction_multiplier: f32,

    /// Braking friction applied when a slope would speed the slide up.
    pub slide_braking_friction: f32,

    /// Forward speed added by jumping out of a slide.
    pub slide_jump_speed: f32,

    /// Lateral steering during a slide.
    pub slide_strafe: StrafeProfile,

    // ========================================================================
    // Air
    // ========================================================================
    /// Gravity acceleration (magnitude, pulls toward -Y).
    pub gravity: f32,

    /// Max falling speed.
    pub terminal_velocity: f32,

    /// Scales air strafe acceleration (0 = none, 1 = full).
    pub air_control: f32,

    /// Max input acceleration while airborne.
    pub strafing_max_acceleration: f32,

    /// Braking deceleration airborne.
    pub braking_deceleration_falling: f32,

    /// Regular air strafing.
    pub air_strafe: StrafeProfile,

    /// Air strafing shortly after a wall jump.
    pub strafe_sway: StrafeProfile,

    /// How long sway lasts after a wall jump.
    pub strafe_sway_duration: f32,

    /// Max speed in custom modes without a dedicated limit.
    pub max_custom_speed: f32,

    // ========================================================================
    // Wall jump
    // ========================================================================
    /// Minimum horizontal speed after a wall jump.
    pub wall_jump_speed: f32,

    /// Per-axis boost added along the jump direction.
    pub wall_jump_boost: Vec3,

    /// Boost used when jumping out of a wall climb.
    pub wall_jump_climb_boost: Vec3,

    /// Boost used when jumping out of a wall run.
    pub wall_jump_run_boost: Vec3,

    /// Reach of the wall probes.
    pub wall_jump_valid_distance: f32,

    /// Must be at least this far from where the ground was left.
    pub wall_jump_ground_clearance: f32,

    /// Max consecutive wall jumps before touching the ground.
    pub wall_jump_limit: u32,

    /// Per-component tolerance treating two wall normals as the same wall.
    pub wall_jump_normal_tolerance: f32,

    /// Vertical component of the jump direction.
    pub wall_jump_up: f32,

    /// Vertical component when the jump starts while descending.
    pub wall_jump_up_descending: f32,

    /// Trajectories shallower than this (dot with normal) blend instead of reflect.
    pub wall_jump_shallow_dot: f32,

    /// Previous ground closer than this to the wall is pushed off it.
    pub wall_jump_ground_nudge: f32,

    // ========================================================================
    // Wall climb
    // ========================================================================
    pub wall_climb_duration: f32,

    /// Cooldown from the end of one climb to the next.
    pub wall_climb_interval: f32,

    /// Max speed while climbing.
    pub wall_climb_speed: f32,

    pub wall_climb_acceleration: f32,

    /// Per-axis scale of the climb acceleration (Y = up).
    pub wall_climb_multiplier: Vec3,

    /// Braking friction while sliding down a wall.
    pub wall_climb_friction: f32,

    /// Climb acceleration applies only above this vertical speed.
    pub wall_climb_add_speed_threshold: f32,

    /// Min dot between facing and the direction into the wall.
    pub wall_climb_min_facing: f32,

    pub braking_deceleration_wall_climb: f32,

    // ========================================================================
    // Wall run
    // ========================================================================
    pub wall_run_duration: f32,

    /// Target speed along the wall.
    pub wall_run_speed: f32,

    pub wall_run_acceleration: f32,

    /// Min horizontal speed to latch onto a wall.
    pub wall_run_min_speed: f32,

    /// Half-width of the window around perpendicular-to-facing, degrees.
    pub wall_run_angle_window: f32,

    /// How far sideways the run probe reaches for the wall.
    pub wall_run_probe_distance: f32,

    /// Same wall may be re-used only this much higher or lower.
    pub wall_run_height_difference: f32,

    /// Fraction of gravity applied while running.
    pub wall_run_gravity_scale: f32,

    /// Braking friction on downward speed while running.
    pub wall_run_friction: f32,

    /// Speed pressing the character into the wall.
    pub wall_run_stick_speed: f32,

    // ========================================================================
    // Walls (shared)
    // ========================================================================
    /// Min forward/lateral input for wall climbing and wall running.
    pub wall_min_input: f32,

    /// Wall normals with |Y| above this are slopes, not walls.
    pub max_wall_normal_y: f32,

    // ========================================================================
    // Mantle and ledge climb
    // ========================================================================
    /// Forward reach of the mantle wall probe.
    pub mantle_reach: f32,

    /// Ledge must be at least this far above the feet.
    pub mantle_min_height: f32,

    /// Ledge must be at most this far above the feet.
    pub mantle_max_height: f32,

    /// Vertical speed while pulling up to the ledge.
    pub mantle_speed: f32,

    pub mantle_max_duration: f32,

    /// Speed moving over the ledge to the stand location.
    pub ledge_climb_speed: f32,

    pub ledge_climb_max_duration: f32,

    // ========================================================================
    // Simulation
    // ========================================================================
    /// Max sub-steps per move.
    pub max_simulation_iterations: u32,

    /// Max length of one sub-step.
    pub max_simulation_time_step: f32,

    /// Max times a falling sub-step is split at the jump apex.
    pub max_jump_apex_attempts: u32,

    /// Near-motionless falling within this radius of a ledge gets nudged free.
    pub perch_radius_threshold: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            capsule_radius: 0.34,
            standing_height: 1.76,
            crouched_height: 1.2,

            max_walk_speed: 3.4,
            max_walk_speed_crouched: 2.0,
            sprint_speed_multiplier: 2.0,
            crouch_sprint_speed_multiplier: 2.0,
            aim_speed_multiplier: 1.0,
            max_acceleration: 12.0,
            ground_friction: 11.0,
            braking_friction: 2.5,
            braking_friction_factor: 2.0,
            braking_deceleration_walking: 2.0,
            braking_sub_step_time: 1.0 / 33.0,
            slick_friction_scale: 0.1,
            max_step_height: 0.45,
            walkable_floor_y: 0.690_251,

            jump_z_velocity: 7.4,
            jump_cooldown: 0.05,
            jump_queue_window: 0.1,
            auto_hop: false,

            slide_enter_threshold: 4.5,
            slide_enter_impulse: 4.5,
            slide_speed_limit: 90.0,
            slide_friction: 1.0,
            slide_angle_friction_multiplier: 3.4,
            slide_braking_friction: 2.0,
            slide_jump_speed: 1.0,
            slide_strafe: StrafeProfile {
                gain_multiplier: 1.0,
                rotation_rate: 1.0,
                min_turn_dot: None,
            },

            gravity: 19.894,
            terminal_velocity: 40.0,
            air_control: 1.0,
            strafing_max_acceleration: 64.0,
            braking_deceleration_falling: 3.4,
            air_strafe: StrafeProfile {
                gain_multiplier: 1.45,
                rotation_rate: 2.64,
                min_turn_dot: None,
            },
            strafe_sway: StrafeProfile {
                gain_multiplier: 1.0,
                rotation_rate: 6.4,
                min_turn_dot: Some(-0.34),
            },
            strafe_sway_duration: 0.1,
            max_custom_speed: 6.0,

            wall_jump_speed: 6.4,
            wall_jump_boost: Vec3::new(1.0, 0.74, 1.0),
            wall_jump_climb_boost: Vec3::new(2.0, 5.0, 2.0),
            wall_jump_run_boost: Vec3::new(2.5, 4.5, 2.5),
            wall_jump_valid_distance: 0.45,
            wall_jump_ground_clearance: 0.64,
            wall_jump_limit: 3,
            wall_jump_normal_tolerance: 0.1,
            wall_jump_up: 0.54,
            wall_jump_up_descending: 0.25,
            wall_jump_shallow_dot: -0.45,
            wall_jump_ground_nudge: 0.25,

            wall_climb_duration: 2.0,
            wall_climb_interval: 0.64,
            wall_climb_speed: 2.0,
            wall_climb_acceleration: 12.0,
            wall_climb_multiplier: Vec3::new(0.64, 1.0, 0.64),
            wall_climb_friction: 2.5,
            wall_climb_add_speed_threshold: -0.1,
            wall_climb_min_facing: 0.5,
            braking_deceleration_wall_climb: 3.4,

            wall_run_duration: 1.6,
            wall_run_speed: 7.0,
            wall_run_acceleration: 8.0,
            wall_run_min_speed: 4.0,
            wall_run_angle_window: 30.0,
            wall_run_probe_distance: 0.6,
            wall_run_height_difference: 1.0,
            wall_run_gravity_scale: 0.2,
            wall_run_friction: 4.0,
            wall_run_stick_speed: 0.5,

            wall_min_input: 0.1,
            max_wall_normal_y: 0.3,

            mantle_reach: 0.7,
            mantle_min_height: 0.5,
            mantle_max_height: 2.2,
            mantle_speed: 3.5,
            mantle_max_duration: 1.0,
            ledge_climb_speed: 2.5,
            ledge_climb_max_duration: 1.0,

            max_simulation_iterations: 8,
            max_simulation_time_step: 0.05,
            max_jump_apex_attempts: 2,
            perch_radius_threshold: 0.1,
        }
    }
}

impl MovementConfig {
    /// Looser tuning: more air control, longer sway, more wall jumps.
    pub fn arcade() -> Self {
        Self {
            air_strafe: StrafeProfile {
                gain_multiplier: 2.0,
                rotation_rate: 3.5,
                min_turn_dot: None,
            },
            strafe_sway_duration: 0.35,
            wall_jump_limit: 5,
            wall_run_duration: 2.5,
            jump_cooldown: 0.0,
            auto_hop: true,
            ..Default::default()
        }
    }

    /// Tighter tuning: less gain, one wall jump, no auto hop.
    pub fn competitive() -> Self {
        Self {
            air_strafe: StrafeProfile {
                gain_multiplier: 1.2,
                rotation_rate: 2.2,
                min_turn_dot: None,
            },
            wall_jump_limit: 1,
            slide_enter_impulse: 3.0,
            jump_cooldown: 0.1,
            ..Default::default()
        }
    }

    /// Speed a strafe profile can add along the input direction.
    pub fn air_speed_cap(&self, max_acceleration: f32, profile: &StrafeProfile) -> f32 {
        (max_acceleration / 100.0) * profile.gain_multiplier
    }

    pub fn capsule(&self, crouched: bool) -> TraceShape {
        let height = if crouched {
            self.crouched_height
        } else {
            self.standing_height
        };
        TraceShape::capsule(self.capsule_radius, height)
    }

    /// Max |dot(facing, wall normal)| accepted for a wall run.
    pub fn wall_run_max_facing_dot(&self) -> f32 {
        self.wall_run_angle_window.to_radians().sin()
    }
}
