//! Character movement controller.
//!
//! This is the main entry point for character movement. It takes one move
//! (input, delta time, simulation clock) and advances the movement state
//! through the geometry probe.
//!
//! Each move runs in two phases:
//!
//! 1. State updates that happen once per move: strafe sway expiry,
//!    crouching, slide entry, jumping.
//! 2. The stepped physics loop. [`Stepper`] dispatches on the current mode
//!    to that mode's physics function. Each function consumes time in
//!    bounded sub-steps and may hand the rest of the time to another mode.

use glam::Vec3;
use log::{debug, trace, warn};

use crate::collision::{FloorResult, GeometryProbe, HitResult, SurfaceFlags, TraceShape};
use crate::random::SeededRandom;
use crate::MIN_TICK_TIME;

use super::config::MovementConfig;
use super::integrator::{
    calc_ground_velocity, calc_slide_velocity, new_fall_velocity, slide_friction, strafe_gain,
    wall_climb_velocity, wall_run_velocity, Braking,
};
use super::jump::JumpRules;
use super::slide_move::{
    compute_slide_vector, ground_movement_delta, ground_two_wall_adjust, plane_project, two_wall_adjust,
    KINDA_SMALL,
};
use super::state::{horizontal, Action, MoveInput, MovementMode, MovementState};
use super::walls::{
    can_wall_climb, can_wall_run, find_ledge, find_wall_jump_surface, perform_wall_jump,
    probe_wall_climb_surface, probe_wall_run_surface, wall_run_direction, LedgeTarget, WallJumpKind,
    FLOOR_HOVER,
};

/// Walking keeps the capsule between these heights above the floor.
pub const MIN_FLOOR_DIST: f32 = 0.019;
pub const MAX_FLOOR_DIST: f32 = 0.024;

/// Backs a blocked sweep off the surface it hit.
const PULLBACK_DISTANCE: f32 = 0.001_25;

/// Mode changes allowed within one move before the rest is dropped.
const MAX_PHYSICS_RESTARTS: u32 = 16;

/// Apex sub-steps shorter than this are not worth taking.
const APEX_TIME_MINIMUM: f32 = 1.0e-4;

/// Surfaces with a normal Y above this are not vertical.
const VERTICAL_SLOPE_NORMAL_Y: f32 = 0.001;

/// Side step used to get unstuck between two surfaces.
const STUCK_SIDE_STEP: f32 = 0.01;

/// Mantle and ledge climb targets count as reached within this distance.
const ARRIVE_TOLERANCE: f32 = 1.0e-3;

/// Character movement controller.
///
/// Stateless apart from its configuration: every per-character value lives
/// in [`MovementState`], so one controller drives any number of characters.
///
/// # Example
///
/// ```ignore
/// let controller = MovementController::new(MovementConfig::default());
/// let mut state = MovementState::default();
/// controller.spawn_at(&mut state, spawn_position, &world);
///
/// // Each tick:
/// controller.perform_move(&mut state, &input, &world, delta_time, clock);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MovementController {
    pub config: MovementConfig,
}

impl MovementController {
    pub fn new(config: MovementConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self::new(MovementConfig::default())
    }

    /// Place a character at `spawn_pos`, standing on the floor below it if
    /// there is one within reach.
    pub fn spawn_at(&self, state: &mut MovementState, spawn_pos: Vec3, world: &dyn GeometryProbe) {
        let config = &self.config;
        let shape = config.capsule(state.crouched);
        let start = spawn_pos + Vec3::Y;
        let hit = world.sweep(start, Vec3::NEG_Y * 3.0, shape);

        state.velocity = Vec3::ZERO;
        if hit.is_valid_blocking_hit() && hit.impact_normal.y >= config.walkable_floor_y {
            state.position = hit.location + Vec3::Y * FLOOR_HOVER;
            state.floor = world.find_floor(
                state.position,
                shape,
                config.max_step_height + MAX_FLOOR_DIST,
                config.walkable_floor_y,
            );
            state.set_mode(MovementMode::Walking, config);
        } else {
            state.position = spawn_pos;
            state.floor = FloorResult::default();
            state.set_mode(MovementMode::Falling, config);
        }
        state.wall_jump.previous_ground_location = state.position;
        debug!("spawned at {:?} in {:?}", state.position, state.mode());
    }

    /// Simulate one move.
    ///
    /// This is the main entry point that should be called each simulation
    /// tick, on the predicting client and on the authority alike.
    ///
    /// # Arguments
    ///
    /// * `state` - The character's movement state (will be modified)
    /// * `input` - Input for this move
    /// * `world` - Geometry to move against
    /// * `delta_time` - Length of the move in seconds
    /// * `simulation_clock` - Clock at the end of this move; never decreases
    pub fn perform_move(
        &self,
        state: &mut MovementState,
        input: &MoveInput,
        world: &dyn GeometryProbe,
        delta_time: f32,
        simulation_clock: f32,
    ) {
        debug_assert!(
            simulation_clock >= state.simulation_clock,
            "simulation clock went backwards: {} -> {}",
            state.simulation_clock,
            simulation_clock
        );
        state.simulation_clock = simulation_clock;
        state.input = sanitize_input(input);
        state.yaw = state.input.yaw;

        if delta_time < MIN_TICK_TIME {
            return;
        }

        self.resolve_penetration(state, world);
        self.update_state_before_movement(state, world);
        state.acceleration = self.input_acceleration(state);

        let mut stepper = Stepper::new(&self.config, state, world);
        stepper.start_new_physics(delta_time, 0);

        debug_assert!(
            state.ledger.is_consistent(state.mode()),
            "mode hooks out of balance after move"
        );
    }

    /// Overwrite position, velocity and mode with authoritative values.
    ///
    /// The mode changes through [`MovementState::set_mode`], so hooks run as
    /// usual; velocity is written afterwards so enter hooks cannot alter it.
    pub fn apply_correction(
        &self,
        state: &mut MovementState,
        position: Vec3,
        velocity: Vec3,
        mode: MovementMode,
        world: &dyn GeometryProbe,
    ) {
        state.position = position;
        state.set_mode(mode, &self.config);
        state.velocity = velocity;
        state.floor = if mode.is_moving_on_ground() {
            world.find_floor(
                position,
                self.config.capsule(state.crouched),
                self.config.max_step_height + MAX_FLOOR_DIST,
                self.config.walkable_floor_y,
            )
        } else {
            FloorResult::default()
        };
    }

    /// Max speed for the character's mode and stance.
    pub fn max_speed(&self, state: &MovementState) -> f32 {
        max_speed(&self.config, state)
    }

    /// Max input acceleration in `mode`.
    pub fn max_acceleration(&self, mode: MovementMode) -> f32 {
        match mode {
            MovementMode::Falling => self.config.strafing_max_acceleration,
            _ => self.config.max_acceleration,
        }
    }

    // ========================================================================
    // Per-move state
    // ========================================================================

    fn resolve_penetration(&self, state: &mut MovementState, world: &dyn GeometryProbe) {
        let shape = self.config.capsule(state.crouched);
        if !world.overlaps(state.position, shape) {
            return;
        }
        let fixed = world.depenetrate(state.position, shape);
        if world.overlaps(fixed, shape) {
            warn!("could not resolve penetration at {:?}", state.position);
        }
        state.position = fixed;
    }

    fn update_state_before_movement(&self, state: &mut MovementState, world: &dyn GeometryProbe) {
        let config = &self.config;
        let clock = state.simulation_clock;

        if state.sway.active && state.sway.start_time + config.strafe_sway_duration <= clock {
            state.sway.active = false;
            trace!("strafe sway expired at t={:.3}", clock);
        }

        // Crouch
        let wants_crouch = state.input.has(Action::Crouch);
        let can_crouch_here = matches!(
            state.mode(),
            MovementMode::Walking | MovementMode::Sliding | MovementMode::Falling
        );
        if wants_crouch && !state.crouched && can_crouch_here {
            state.crouched = true;
        } else if !wants_crouch && state.crouched && self.can_stand_up(state, world) {
            state.crouched = false;
        }

        // Slide
        if state.is_sliding() && !state.crouched {
            state.set_mode(MovementMode::Walking, config);
        }
        if state.mode() == MovementMode::Walking
            && state.crouched
            && state.horizontal_speed() >= config.slide_enter_threshold
        {
            state.set_mode(MovementMode::Sliding, config);
        }

        // Jump
        let rules = JumpRules {
            cooldown: config.jump_cooldown,
            queue_window: config.jump_queue_window,
            auto_hop: config.auto_hop,
        };
        let pressed = state.input.has(Action::Jump);
        let on_ground = state.is_moving_on_ground();
        if state.jump.update(pressed, on_ground, clock, rules) {
            self.do_jump(state);
        }
    }

    fn do_jump(&self, state: &mut MovementState) {
        let config = &self.config;
        if state.is_sliding() {
            state.velocity += state.forward_direction() * config.slide_jump_speed;
        }
        state.velocity.y = (state.velocity.y + 0.01).max(config.jump_z_velocity);
        state.set_mode(MovementMode::Falling, config);
        debug!("jump at t={:.3} velocity {:?}", state.simulation_clock, state.velocity);
    }

    fn can_stand_up(&self, state: &MovementState, world: &dyn GeometryProbe) -> bool {
        !world.overlaps(state.position, self.config.capsule(false))
    }

    fn input_acceleration(&self, state: &MovementState) -> Vec3 {
        let input = state.forward_direction() * state.input.forward + state.right_direction() * state.input.right;
        input.clamp_length_max(1.0) * self.max_acceleration(state.mode())
    }
}

/// Clamp axes into range and drop unknown flag bits.
fn sanitize_input(input: &MoveInput) -> MoveInput {
    let axis = |v: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
    MoveInput {
        forward: axis(input.forward),
        right: axis(input.right),
        up: axis(input.up),
        yaw: if input.yaw.is_finite() { input.yaw } else { 0.0 },
        flags: input.flags.sanitized(),
    }
}

/// Max speed for the character's mode and stance.
pub fn max_speed(config: &MovementConfig, state: &MovementState) -> f32 {
    match state.mode() {
        MovementMode::Sliding => config.slide_speed_limit,
        MovementMode::Walking => {
            let sprinting = state.is_sprinting();
            if state.crouched {
                if sprinting {
                    config.max_walk_speed_crouched * config.crouch_sprint_speed_multiplier
                } else {
                    config.max_walk_speed_crouched
                }
            } else if sprinting {
                config.max_walk_speed * config.sprint_speed_multiplier
            } else if state.is_aiming() {
                config.max_walk_speed * config.aim_speed_multiplier
            } else {
                config.max_walk_speed
            }
        }
        MovementMode::Falling => config.max_walk_speed,
        MovementMode::WallClimbing => config.wall_climb_speed,
        MovementMode::WallRunning => config.wall_run_speed,
        MovementMode::Mantling | MovementMode::LedgeClimbing => config.max_custom_speed,
    }
}

/// Stepped physics for one move.
///
/// Mode physics functions are private to this type and only reachable
/// through [`Stepper::start_new_physics`].
struct Stepper<'a> {
    config: &'a MovementConfig,
    state: &'a mut MovementState,
    world: &'a dyn GeometryProbe,
    apex_attempts: u32,
    restarts: u32,
}

impl<'a> Stepper<'a> {
    fn new(config: &'a MovementConfig, state: &'a mut MovementState, world: &'a dyn GeometryProbe) -> Self {
        Self {
            config,
            state,
            world,
            apex_attempts: 0,
            restarts: 0,
        }
    }

    /// Run the current mode's physics for `delta_time`.
    fn start_new_physics(&mut self, delta_time: f32, iterations: u32) {
        if delta_time < MIN_TICK_TIME || iterations >= self.config.max_simulation_iterations {
            return;
        }
        if self.restarts >= MAX_PHYSICS_RESTARTS {
            trace!("dropping {:.5}s after {} mode changes", delta_time, self.restarts);
            return;
        }
        self.restarts += 1;

        match self.state.mode() {
            MovementMode::Walking => self.phys_walking(delta_time, iterations),
            MovementMode::Sliding => self.phys_sliding(delta_time, iterations),
            MovementMode::Falling => self.phys_falling(delta_time, iterations),
            MovementMode::WallClimbing => self.phys_wall_climbing(delta_time, iterations),
            MovementMode::WallRunning => self.phys_wall_running(delta_time, iterations),
            MovementMode::Mantling => self.phys_mantling(delta_time, iterations),
            MovementMode::LedgeClimbing => self.phys_ledge_climbing(delta_time, iterations),
        }
    }

    /// Length of the next sub-step.
    ///
    /// Long remainders are halved (up to the max step) while iterations are
    /// left; the last iteration takes everything.
    fn simulation_time_step(&self, remaining: f32, iterations: u32) -> f32 {
        let max_step = self.config.max_simulation_time_step;
        let mut step = remaining;
        if remaining > max_step && iterations < self.config.max_simulation_iterations {
            step = max_step.min(remaining * 0.5);
        }
        step.max(MIN_TICK_TIME)
    }

    fn set_mode(&mut self, mode: MovementMode) {
        self.state.set_mode(mode, self.config);
    }

    // ========================================================================
    // Geometry helpers
    // ========================================================================

    fn shape(&self) -> TraceShape {
        self.config.capsule(self.state.crouched)
    }

    fn is_walkable(&self, normal: Vec3) -> bool {
        normal.y >= self.config.walkable_floor_y
    }

    /// Sweep the capsule by `delta` and move it as far as it gets.
    fn safe_move(&mut self, delta: Vec3) -> HitResult {
        let shape = self.shape();
        let start = self.state.position;
        if delta.length_squared() < 1.0e-12 {
            return HitResult::miss(start, start);
        }

        let mut hit = self.world.sweep(start, delta, shape);
        if hit.start_penetrating {
            let fixed = self.world.depenetrate(start, shape);
            if fixed != start {
                trace!("depenetrated {:?} -> {:?}", start, fixed);
                self.state.position = fixed;
                hit = self.world.sweep(fixed, delta, shape);
            }
        }
        if hit.start_penetrating {
            return hit;
        }

        if hit.blocking {
            let backed_off = hit.location + hit.normal * PULLBACK_DISTANCE;
            self.state.position = if self.world.overlaps(backed_off, shape) {
                hit.location
            } else {
                backed_off
            };
        } else {
            self.state.position = hit.location;
        }
        hit
    }

    fn find_floor(&self) -> FloorResult {
        self.world.find_floor(
            self.state.position,
            self.shape(),
            self.config.max_step_height + MAX_FLOOR_DIST,
            self.config.walkable_floor_y,
        )
    }

    /// Keep the capsule hovering within the floor distance band.
    fn adjust_floor_height(&mut self) {
        let floor = self.state.floor;
        if !floor.is_walkable_floor() {
            return;
        }
        let distance = floor.floor_distance;
        if (MIN_FLOOR_DIST..=MAX_FLOOR_DIST).contains(&distance) {
            return;
        }

        let move_y = FLOOR_HOVER - distance;
        let hit = self.safe_move(Vec3::Y * move_y);
        self.state.floor.floor_distance = if hit.blocking {
            distance + move_y * hit.time
        } else {
            FLOOR_HOVER
        };
    }

    /// A hit the character can land on: walkable, on the lower hemisphere,
    /// with a walkable floor underneath.
    fn is_valid_landing_spot(&self, hit: &HitResult) -> bool {
        if !hit.is_valid_blocking_hit() || !self.is_walkable(hit.impact_normal) {
            return false;
        }
        let lower_hemisphere_y = hit.location.y + self.config.capsule_radius;
        if hit.impact_point.y >= lower_hemisphere_y {
            return false;
        }
        self.find_floor().is_walkable_floor()
    }

    fn process_landed(&mut self, remaining: f32, iterations: u32) {
        self.state.floor = self.find_floor();
        self.set_mode(MovementMode::Walking);
        self.adjust_floor_height();
        trace!("landed at {:?}, {:.5}s left", self.state.position, remaining);
        self.start_new_physics(remaining, iterations);
    }

    // ========================================================================
    // Walking and sliding
    // ========================================================================

    fn phys_walking(&mut self, delta_time: f32, iterations: u32) {
        self.ground_movement(delta_time, iterations);
    }

    fn phys_sliding(&mut self, delta_time: f32, iterations: u32) {
        if self.state.horizontal_speed() < self.config.slide_enter_threshold {
            self.set_mode(MovementMode::Walking);
            self.start_new_physics(delta_time, iterations);
            return;
        }
        self.ground_movement(delta_time, iterations);
    }

    fn ground_movement(&mut self, delta_time: f32, mut iterations: u32) {
        let mut remaining = delta_time;

        while remaining >= MIN_TICK_TIME && iterations < self.config.max_simulation_iterations {
            iterations += 1;
            let time_tick = self.simulation_time_step(remaining, iterations);
            remaining -= time_tick;

            let old_location = self.state.position;

            self.state.velocity.y = 0.0;
            self.state.acceleration.y = 0.0;
            if self.state.is_sliding() {
                self.update_slide_velocity(time_tick);
            } else {
                self.update_walk_velocity(time_tick);
            }

            let delta = self.state.velocity * time_tick;
            let zero_delta = delta.abs().max_element() <= 1.0e-6;
            if zero_delta {
                remaining = 0.0;
            } else {
                self.move_along_floor(delta);
            }

            self.state.floor = self.find_floor();
            if self.state.floor.is_walkable_floor() {
                self.adjust_floor_height();
            } else if self.state.floor.hit.start_penetrating && remaining <= 0.0 {
                let shape = self.shape();
                self.state.position = self.world.depenetrate(self.state.position, shape);
            } else {
                // Walked off a ledge; refund whatever part of the step was not moved.
                let desired = delta.length();
                if desired > KINDA_SMALL {
                    let actual = horizontal(self.state.position - old_location).length();
                    remaining += time_tick * (1.0 - (actual / desired).min(1.0));
                }
                self.set_mode(MovementMode::Falling);
                self.start_new_physics(remaining, iterations);
                return;
            }

            self.state.velocity.y = 0.0;

            if self.state.position == old_location {
                break;
            }
        }
    }

    fn update_walk_velocity(&mut self, time_tick: f32) {
        let config = self.config;
        let mut friction = config.ground_friction;
        let mut braking_friction = config.braking_friction;
        if self.state.floor.hit.surface_flags.contains(SurfaceFlags::SLICK) {
            friction *= config.slick_friction_scale;
            braking_friction *= config.slick_friction_scale;
        }

        let braking = Braking::new(braking_friction, config.braking_deceleration_walking, config);
        self.state.velocity = calc_ground_velocity(
            self.state.velocity,
            self.state.acceleration,
            time_tick,
            friction,
            braking,
            max_speed(config, self.state),
            config.max_acceleration,
        );
    }

    fn update_slide_velocity(&mut self, time_tick: f32) {
        let config = self.config;
        let state = &mut *self.state;

        // Only the strafe axis steers a slide.
        let lateral = (state.right_direction() * state.input.right).normalize_or_zero()
            * horizontal(state.acceleration).length();

        let floor_normal = if state.floor.is_walkable_floor() {
            state.floor.hit.impact_normal
        } else {
            Vec3::Y
        };
        let friction = slide_friction(floor_normal, state.forward_direction(), config);
        let cap = config.air_speed_cap(config.max_acceleration, &config.slide_strafe);
        let braking = Braking::new(config.slide_braking_friction, config.braking_deceleration_walking, config);

        let velocity = calc_slide_velocity(
            state.velocity,
            lateral,
            time_tick,
            friction,
            cap,
            &config.slide_strafe,
            braking,
        );
        let planar = horizontal(velocity);
        state.velocity = if planar.length() > config.slide_speed_limit {
            planar.normalize_or_zero() * config.slide_speed_limit
        } else {
            velocity
        };
    }

    /// Move along the floor, following ramps, stepping over low obstacles
    /// and sliding along walls.
    fn move_along_floor(&mut self, delta: Vec3) {
        let floor_normal = if self.state.floor.is_walkable_floor() {
            self.state.floor.hit.impact_normal
        } else {
            Vec3::Y
        };

        let mut hit = self.safe_move(ground_movement_delta(delta, floor_normal));
        let mut percent_applied = hit.time;

        if hit.start_penetrating {
            self.slide_along_surface(delta, 1.0, hit.normal, &hit);
            return;
        }
        if !hit.is_valid_blocking_hit() {
            return;
        }

        if hit.time > 0.0 && hit.impact_normal.y > KINDA_SMALL && self.is_walkable(hit.impact_normal) {
            // Ran onto a ramp.
            let remaining_percent = 1.0 - percent_applied;
            hit = self.safe_move(ground_movement_delta(delta * remaining_percent, hit.impact_normal));
            percent_applied = (percent_applied + hit.time * remaining_percent).clamp(0.0, 1.0);
        }

        if hit.is_valid_blocking_hit() {
            let remaining = delta * (1.0 - percent_applied);
            if !(self.can_step_up(&hit) && self.step_up(remaining, &hit)) {
                self.slide_along_surface(delta, 1.0 - percent_applied, hit.normal, &hit);
            }
        }
    }

    fn can_step_up(&self, hit: &HitResult) -> bool {
        if self.is_walkable(hit.impact_normal) {
            return false;
        }
        let height = hit.impact_point.y - self.state.position.y;
        height > 0.0 && height <= self.config.max_step_height
    }

    /// Try to step up and over an obstacle: up, forward, back down.
    fn step_up(&mut self, delta: Vec3, hit: &HitResult) -> bool {
        let shape = self.shape();
        let start = self.state.position;
        let step = self.config.max_step_height;

        let up = self.world.sweep(start, Vec3::Y * step, shape);
        if up.start_penetrating {
            return false;
        }
        let raised = up.location;

        let forward = self.world.sweep(raised, horizontal(delta), shape);
        if forward.start_penetrating || (forward.blocking && forward.time <= 0.0) {
            return false;
        }
        let moved = forward.location;

        let down = self.world.sweep(moved, Vec3::NEG_Y * (raised.y - start.y + MAX_FLOOR_DIST), shape);
        if down.start_penetrating {
            return false;
        }
        if down.blocking && !self.is_walkable(down.impact_normal) {
            return false;
        }
        let landed = down.location;

        if horizontal(landed - start).length_squared() <= 1.0e-8 {
            return false;
        }

        trace!(
            "stepped up {:.3} over obstacle at {:?}",
            landed.y - start.y,
            hit.impact_point
        );
        self.state.position = landed + Vec3::Y * PULLBACK_DISTANCE;
        true
    }

    fn slide_along_surface(&mut self, delta: Vec3, time: f32, normal: Vec3, _hit: &HitResult) {
        let on_ground = self.state.is_moving_on_ground();
        let mut normal = normal;
        if on_ground {
            if normal.y > 0.0 && !self.is_walkable(normal) {
                // Unwalkable slopes act as vertical walls.
                normal = horizontal(normal).normalize_or(normal);
            } else if normal.y < -KINDA_SMALL && self.state.floor.floor_distance < MAX_FLOOR_DIST {
                // Ceiling while on the floor; never push down into the floor.
                normal = horizontal(normal).normalize_or(normal);
            }
        }

        let slide = compute_slide_vector(delta, time, normal, !on_ground);
        if slide.dot(delta) <= 0.0 {
            return;
        }

        let second = self.safe_move(slide);
        if !second.is_valid_blocking_hit() {
            return;
        }

        let mut adjusted = two_wall_adjust(slide, second.normal, second.time, normal, !on_ground);
        if on_ground {
            adjusted = ground_two_wall_adjust(
                slide,
                adjusted,
                second.normal,
                second.time,
                self.config.walkable_floor_y,
                self.config.max_step_height,
                self.state.floor.floor_distance < MAX_FLOOR_DIST,
            );
        }
        if adjusted.length_squared() > 1.0e-12 && adjusted.dot(delta) > 0.0 {
            self.safe_move(adjusted);
        }
    }

    // ========================================================================
    // Falling
    // ========================================================================

    fn phys_falling(&mut self, delta_time: f32, mut iterations: u32) {
        let config = self.config;
        let gravity = Vec3::NEG_Y * config.gravity;
        let mut remaining = delta_time;

        while remaining >= MIN_TICK_TIME && iterations < config.max_simulation_iterations {
            iterations += 1;
            let mut time_tick = self.simulation_time_step(remaining, iterations);
            remaining -= time_tick;

            let old_location = self.state.position;
            let old_velocity = self.state.velocity;

            self.apply_air_strafe(time_tick);
            self.state.velocity = new_fall_velocity(self.state.velocity, gravity, time_tick, config.terminal_velocity);

            // Sub-step to land exactly on the apex so frame rate never cuts it off.
            if old_velocity.y > 0.0
                && self.state.velocity.y <= 0.0
                && self.apex_attempts < config.max_jump_apex_attempts
            {
                let derived = (self.state.velocity - old_velocity) / time_tick;
                if derived.y.abs() > 1.0e-8 {
                    let time_to_apex = -old_velocity.y / derived.y;
                    if time_to_apex >= APEX_TIME_MINIMUM && time_to_apex < time_tick {
                        let mut apex_velocity = old_velocity + derived * time_to_apex;
                        apex_velocity.y = 0.0;
                        self.state.velocity = apex_velocity;

                        remaining += time_tick - time_to_apex;
                        time_tick = time_to_apex;
                        iterations -= 1;
                        self.apex_attempts += 1;
                        trace!("apex sub-step {:.5}s at {:?}", time_to_apex, self.state.position);
                    }
                }
            }

            // Midpoint integration.
            let adjusted = 0.5 * (old_velocity + self.state.velocity) * time_tick;
            let hit = self.safe_move(adjusted);
            let mut sub_time_remaining = time_tick * (1.0 - hit.time);

            if hit.blocking && self.is_valid_landing_spot(&hit) {
                remaining += sub_time_remaining;
                self.process_landed(remaining, iterations);
                return;
            }

            let known = hit.blocking.then_some(hit);
            if let Some(wall) = find_wall_jump_surface(self.state, config, self.world, known.as_ref()) {
                perform_wall_jump(self.state, config, &wall, WallJumpKind::Airborne);
            } else if hit.blocking {
                let adjusted = self.state.velocity * time_tick;

                // A ledge edge under the capsule can still be landed on.
                if !hit.start_penetrating && adjusted.y < 0.0 && hit.normal.y > VERTICAL_SLOPE_NORMAL_Y {
                    let floor = self.find_floor();
                    if floor.is_walkable_floor() && self.is_valid_landing_spot(&floor.hit) {
                        remaining += sub_time_remaining;
                        self.process_landed(remaining, iterations);
                        return;
                    }
                }

                if self.try_start_wall_mode(&hit) {
                    remaining += sub_time_remaining;
                    self.start_new_physics(remaining, iterations);
                    return;
                }

                let old_hit_normal = hit.normal;
                let old_hit_impact_normal = hit.impact_normal;
                let mut delta = compute_slide_vector(adjusted, 1.0 - hit.time, old_hit_normal, true);

                if sub_time_remaining > KINDA_SMALL {
                    self.state.velocity = delta / sub_time_remaining;
                }

                if sub_time_remaining > KINDA_SMALL && delta.dot(adjusted) > 0.0 {
                    // Deflection drops the gravity of this step; put back a share of it.
                    let max_speed = max_speed(config, self.state);
                    let gravity_factor = map_range_clamped(
                        self.state.horizontal_speed(),
                        max_speed,
                        max_speed * 4.0,
                        1.0,
                        0.5,
                    );
                    let with_gravity =
                        new_fall_velocity(self.state.velocity, gravity * gravity_factor, time_tick, config.terminal_velocity);
                    self.state.velocity.y = with_gravity.y;

                    let second = self.safe_move(delta);
                    if second.blocking {
                        sub_time_remaining *= 1.0 - second.time;

                        if self.is_valid_landing_spot(&second) {
                            remaining += sub_time_remaining;
                            self.process_landed(remaining, iterations);
                            return;
                        }

                        delta = two_wall_adjust(delta, second.normal, second.time, old_hit_normal, true);
                        if sub_time_remaining > KINDA_SMALL {
                            self.state.velocity = delta / sub_time_remaining;
                        }

                        // Straddling two slopes, neither walkable.
                        let ditch = old_hit_impact_normal.y > 0.0
                            && second.impact_normal.y > 0.0
                            && delta.y.abs() <= KINDA_SMALL
                            && second.impact_normal.dot(old_hit_impact_normal) < 0.0;

                        let mut third = self.safe_move(delta);
                        let stuck = third.blocking && third.time == 0.0;
                        if stuck {
                            let mut side = horizontal(old_hit_normal + third.impact_normal).normalize_or_zero();
                            if side == Vec3::ZERO {
                                side = Vec3::new(old_hit_normal.z, 0.0, -old_hit_normal.x).normalize_or_zero();
                            }
                            third = self.safe_move(side * STUCK_SIDE_STEP);
                        }

                        if self.is_valid_landing_spot(&third) {
                            self.process_landed(0.0, iterations);
                            return;
                        } else if ditch || stuck {
                            if self.find_floor().is_walkable_floor() {
                                self.process_landed(0.0, iterations);
                            } else {
                                self.come_to_rest();
                            }
                            return;
                        } else if config.perch_radius_threshold > 0.0
                            && !third.blocking
                            && self.is_walkable(old_hit_impact_normal)
                        {
                            self.perch_nudge(old_location, time_tick, iterations);
                        }
                    }
                }
            }

            if horizontal(self.state.velocity).length_squared() <= 1.0e-7 {
                self.state.velocity.x = 0.0;
                self.state.velocity.z = 0.0;
            }
        }
    }

    fn apply_air_strafe(&mut self, time_tick: f32) {
        let config = self.config;
        let profile = if self.state.sway.active {
            &config.strafe_sway
        } else {
            &config.air_strafe
        };
        let cap = config.air_speed_cap(config.strafing_max_acceleration, profile);
        self.state.velocity = strafe_gain(
            self.state.velocity,
            self.state.acceleration,
            time_tick,
            cap,
            profile,
            config.air_control,
        );
    }

    /// Stop dead while wedged with no walkable floor underneath. The mode
    /// stays Falling.
    fn come_to_rest(&mut self) {
        trace!("wedged at {:?}, stopping", self.state.position);
        self.state.velocity = Vec3::ZERO;
    }

    /// Nudge a character stuck on a seam with a small replicated-random push.
    fn perch_nudge(&mut self, old_location: Vec3, time_tick: f32, iterations: u32) {
        let moved = self.state.position - old_location;
        let stuck = moved.y.abs() <= 0.002 * time_tick && horizontal(moved).length_squared() <= 4.0e-4 * time_tick;
        if !stuck {
            return;
        }

        let config = self.config;
        let max_speed = max_speed(config, self.state);
        let mut rng = SeededRandom::for_substep(self.state.simulation_clock, iterations);
        self.state.velocity.x += 0.25 * max_speed * (rng.next_unit() - 0.5);
        self.state.velocity.z += 0.25 * max_speed * (rng.next_unit() - 0.5);
        self.state.velocity.y = (config.jump_z_velocity * 0.25).max(0.01);

        debug!("perch nudge at {:?} -> {:?}", self.state.position, self.state.velocity);
        self.safe_move(self.state.velocity * time_tick);
    }

    /// Start mantling, wall climbing or wall running off a wall hit while
    /// falling. Returns whether the mode changed.
    fn try_start_wall_mode(&mut self, hit: &HitResult) -> bool {
        let config = self.config;

        if self.state.input.has(Action::Mantle) {
            if let Some(ledge) = find_ledge(self.state, config, self.world) {
                self.begin_mantle(ledge);
                return true;
            }
        }

        if can_wall_climb(self.state, config, hit) {
            self.state.wall_climb.wall_normal = horizontal(hit.impact_normal).normalize_or_zero();
            self.set_mode(MovementMode::WallClimbing);
            return true;
        }

        if can_wall_run(self.state, config, hit) {
            let normal = horizontal(hit.impact_normal).normalize_or_zero();
            let state = &mut *self.state;
            state.wall_run.surface = hit.surface;
            state.wall_run.normal = normal;
            state.wall_run.location = state.position;
            state.wall_run.direction = wall_run_direction(state.velocity, state.forward_direction(), normal);
            state.velocity.y = state.velocity.y.max(0.0);
            self.set_mode(MovementMode::WallRunning);
            return true;
        }

        false
    }

    // ========================================================================
    // Wall climbing
    // ========================================================================

    fn phys_wall_climbing(&mut self, delta_time: f32, mut iterations: u32) {
        let config = self.config;
        if self.state.wall_climb.start_time + config.wall_climb_duration < self.state.simulation_clock {
            self.set_mode(MovementMode::Falling);
            self.start_new_physics(delta_time, iterations);
            return;
        }

        let mut remaining = delta_time;
        while remaining >= MIN_TICK_TIME && iterations < config.max_simulation_iterations {
            iterations += 1;
            let time_tick = self.simulation_time_step(remaining, iterations);
            remaining -= time_tick;

            let wall = probe_wall_climb_surface(self.state, config, self.world);
            if let Some(jump) = find_wall_jump_surface(self.state, config, self.world, wall.as_ref()) {
                perform_wall_jump(self.state, config, &jump, WallJumpKind::Climbing);
                self.set_mode(MovementMode::Falling);
                self.start_new_physics(remaining + time_tick, iterations);
                return;
            }

            // Let go of the wall.
            if self.state.input.forward <= 0.0 {
                self.set_mode(MovementMode::Falling);
                self.start_new_physics(remaining + time_tick, iterations);
                return;
            }

            if let Some(ledge) = find_ledge(self.state, config, self.world) {
                self.begin_mantle(ledge);
                self.start_new_physics(remaining + time_tick, iterations);
                return;
            }

            self.state.velocity = wall_climb_velocity(
                self.state.velocity,
                self.state.acceleration,
                self.state.input.forward,
                time_tick,
                config,
            );

            let adjusted = self.state.velocity * time_tick;
            let hit = self.safe_move(adjusted);
            if hit.is_valid_blocking_hit() {
                if self.is_valid_landing_spot(&hit) {
                    remaining += time_tick * (1.0 - hit.time);
                    self.process_landed(remaining, iterations);
                    return;
                }
                self.state.velocity = plane_project(self.state.velocity, hit.normal);
                let delta = compute_slide_vector(adjusted, 1.0 - hit.time, hit.normal, true);
                self.safe_move(delta);
            }

            match probe_wall_climb_surface(self.state, config, self.world) {
                Some(wall) => {
                    self.state.wall_climb.wall_normal = horizontal(wall.impact_normal).normalize_or_zero();
                }
                None => {
                    self.set_mode(MovementMode::Falling);
                    self.start_new_physics(remaining, iterations);
                    return;
                }
            }
        }
    }

    // ========================================================================
    // Wall running
    // ========================================================================

    fn phys_wall_running(&mut self, delta_time: f32, mut iterations: u32) {
        let config = self.config;
        if self.state.wall_run.start_time + config.wall_run_duration < self.state.simulation_clock {
            self.set_mode(MovementMode::Falling);
            self.start_new_physics(delta_time, iterations);
            return;
        }

        let mut remaining = delta_time;
        while remaining >= MIN_TICK_TIME && iterations < config.max_simulation_iterations {
            iterations += 1;
            let time_tick = self.simulation_time_step(remaining, iterations);
            remaining -= time_tick;

            let wall = probe_wall_run_surface(self.state, config, self.world);
            if let Some(jump) = find_wall_jump_surface(self.state, config, self.world, wall.as_ref()) {
                perform_wall_jump(self.state, config, &jump, WallJumpKind::Running);
                self.set_mode(MovementMode::Falling);
                self.start_new_physics(remaining + time_tick, iterations);
                return;
            }

            let Some(wall) = wall.filter(|_| self.state.input.right.abs() >= config.wall_min_input) else {
                self.set_mode(MovementMode::Falling);
                self.start_new_physics(remaining + time_tick, iterations);
                return;
            };

            let normal = horizontal(wall.impact_normal).normalize_or_zero();
            let state = &mut *self.state;
            state.wall_run.normal = normal;
            state.wall_run.location = state.position;
            state.wall_run.direction = wall_run_direction(state.velocity, state.forward_direction(), normal);
            state.velocity = wall_run_velocity(state.velocity, state.wall_run.direction, normal, time_tick, config);

            let adjusted = self.state.velocity * time_tick;
            let hit = self.safe_move(adjusted);
            if hit.is_valid_blocking_hit() {
                if self.is_valid_landing_spot(&hit) {
                    remaining += time_tick * (1.0 - hit.time);
                    self.process_landed(remaining, iterations);
                    return;
                }
                if horizontal(hit.impact_normal).normalize_or_zero().dot(normal) < 0.9 {
                    // Ran into something other than the wall.
                    self.set_mode(MovementMode::Falling);
                    self.start_new_physics(remaining, iterations);
                    return;
                }
                let delta = compute_slide_vector(adjusted, 1.0 - hit.time, hit.normal, true);
                self.safe_move(delta);
            }
        }
    }

    // ========================================================================
    // Mantling and ledge climbing
    // ========================================================================

    fn begin_mantle(&mut self, ledge: LedgeTarget) {
        let state = &mut *self.state;
        state.mantle.anchor = ledge.anchor;
        state.mantle.target = ledge.target;
        state.mantle.wall_normal = ledge.wall_normal;
        state.velocity = Vec3::ZERO;
        debug!("mantle: anchor {:?} target {:?}", ledge.anchor, ledge.target);
        self.set_mode(MovementMode::Mantling);
    }

    fn phys_mantling(&mut self, delta_time: f32, mut iterations: u32) {
        let config = self.config;
        if self.state.simulation_clock - self.state.mantle.start_time > config.mantle_max_duration {
            self.set_mode(MovementMode::Falling);
            self.start_new_physics(delta_time, iterations);
            return;
        }

        let mut remaining = delta_time;
        while remaining >= MIN_TICK_TIME && iterations < config.max_simulation_iterations {
            iterations += 1;
            let time_tick = self.simulation_time_step(remaining, iterations);
            remaining -= time_tick;

            let to_anchor = self.state.mantle.anchor.y - self.state.position.y;
            if to_anchor <= ARRIVE_TOLERANCE {
                self.state.velocity = Vec3::ZERO;
                if self.state.input.forward > 0.0 {
                    self.set_mode(MovementMode::LedgeClimbing);
                    self.start_new_physics(remaining + time_tick, iterations);
                }
                return;
            }

            self.state.velocity = Vec3::Y * config.mantle_speed;
            let rise = (config.mantle_speed * time_tick).min(to_anchor);
            let hit = self.safe_move(Vec3::Y * rise);
            if hit.blocking {
                self.set_mode(MovementMode::Falling);
                self.start_new_physics(remaining, iterations);
                return;
            }
        }
    }

    fn phys_ledge_climbing(&mut self, delta_time: f32, mut iterations: u32) {
        let config = self.config;
        if self.state.simulation_clock - self.state.mantle.start_time > config.ledge_climb_max_duration {
            self.set_mode(MovementMode::Falling);
            self.start_new_physics(delta_time, iterations);
            return;
        }

        let mut remaining = delta_time;
        while remaining >= MIN_TICK_TIME && iterations < config.max_simulation_iterations {
            iterations += 1;
            let time_tick = self.simulation_time_step(remaining, iterations);
            remaining -= time_tick;

            let to_target = self.state.mantle.target - self.state.position;
            let distance = to_target.length();
            if distance <= ARRIVE_TOLERANCE {
                self.state.velocity = Vec3::ZERO;
                self.process_landed(remaining + time_tick, iterations);
                return;
            }

            let direction = to_target / distance;
            self.state.velocity = direction * config.ledge_climb_speed;
            let step = (config.ledge_climb_speed * time_tick).min(distance);
            let hit = self.safe_move(direction * step);
            if hit.blocking && hit.time <= 0.0 {
                self.set_mode(MovementMode::Falling);
                self.start_new_physics(remaining, iterations);
                return;
            }
        }
    }
}

/// Map `value` from `[in_a, in_b]` onto `[out_a, out_b]`, clamped.
fn map_range_clamped(value: f32, in_a: f32, in_b: f32, out_a: f32, out_b: f32) -> f32 {
    if (in_b - in_a).abs() <= f32::EPSILON {
        return if value < in_a { out_a } else { out_b };
    }
    let t = ((value - in_a) / (in_b - in_a)).clamp(0.0, 1.0);
    out_a + (out_b - out_a) * t
}

// ============================================================================
// Tests
// ============================================================================
