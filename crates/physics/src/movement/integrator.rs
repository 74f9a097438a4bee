//! Velocity integrators.
//!
//! Each function maps the current velocity plus this sub-step's inputs to a
//! new velocity. They are pure: same inputs, same bits out, on every
//! machine that runs the simulation.

use glam::Vec3;

use super::config::{MovementConfig, StrafeProfile};
use super::state::horizontal;
use crate::MIN_TICK_TIME;

/// Below this speed braking snaps velocity to zero.
pub const BRAKE_TO_STOP_VELOCITY: f32 = 0.1;

/// Squared speeds below this count as zero.
const ZERO_SPEED_SQUARED: f32 = 1.0e-4;

/// Braking parameters for one mode.
#[derive(Debug, Clone, Copy)]
pub struct Braking {
    pub friction: f32,
    pub deceleration: f32,
    pub friction_factor: f32,
    pub sub_step_time: f32,
}

impl Braking {
    pub fn new(friction: f32, deceleration: f32, config: &MovementConfig) -> Self {
        Self {
            friction,
            deceleration,
            friction_factor: config.braking_friction_factor,
            sub_step_time: config.braking_sub_step_time,
        }
    }
}

/// Slow `velocity` down by friction and constant deceleration.
///
/// Sub-stepped so low frame rates brake like high ones. Never reverses the
/// direction of travel.
pub fn apply_velocity_braking(velocity: Vec3, delta_time: f32, braking: Braking) -> Vec3 {
    if velocity == Vec3::ZERO || delta_time < MIN_TICK_TIME {
        return velocity;
    }

    let friction = (braking.friction * braking.friction_factor.max(0.0)).max(0.0);
    let deceleration = braking.deceleration.max(0.0);
    let zero_friction = friction == 0.0;
    let zero_braking = deceleration == 0.0;
    if zero_friction && zero_braking {
        return velocity;
    }

    let old = velocity;
    let mut velocity = velocity;
    let max_step = braking.sub_step_time.clamp(1.0 / 75.0, 1.0 / 20.0);
    let reverse_accel = if zero_braking {
        Vec3::ZERO
    } else {
        -deceleration * velocity.normalize_or_zero()
    };

    let mut remaining = delta_time;
    while remaining >= MIN_TICK_TIME {
        // Constant deceleration needs no sub-stepping.
        let dt = if remaining > max_step && !zero_friction {
            max_step.min(remaining * 0.5)
        } else {
            remaining
        };
        remaining -= dt;

        velocity += (-friction * velocity + reverse_accel) * dt;

        if velocity.dot(old) <= 0.0 {
            return Vec3::ZERO;
        }
    }

    let speed_squared = velocity.length_squared();
    if speed_squared <= ZERO_SPEED_SQUARED
        || (!zero_braking && speed_squared <= BRAKE_TO_STOP_VELOCITY * BRAKE_TO_STOP_VELOCITY)
    {
        return Vec3::ZERO;
    }
    velocity
}

/// Ground velocity update.
///
/// Without input, or above `max_speed`, the velocity brakes. With input,
/// friction turns the velocity toward the input direction (higher friction
/// turns faster), then acceleration is added up to the analog-scaled max
/// speed.
pub fn calc_ground_velocity(
    velocity: Vec3,
    acceleration: Vec3,
    delta_time: f32,
    friction: f32,
    braking: Braking,
    max_speed: f32,
    max_acceleration: f32,
) -> Vec3 {
    let mut velocity = velocity;
    let zero_acceleration = acceleration.length_squared() < ZERO_SPEED_SQUARED;
    let analog = if zero_acceleration || max_acceleration <= 0.0 {
        0.0
    } else {
        (acceleration.length() / max_acceleration).clamp(0.0, 1.0)
    };
    let max_input_speed = max_speed * analog;
    let over_max = velocity.length_squared() > max_speed * max_speed * 1.01;

    if zero_acceleration || over_max {
        let old = velocity;
        velocity = apply_velocity_braking(velocity, delta_time, braking);
        // Braking never drops below max speed while still pushing forward.
        if over_max
            && velocity.length_squared() < max_speed * max_speed
            && acceleration.dot(old) > 0.0
        {
            velocity = old.normalize_or_zero() * max_speed;
        }
    } else {
        let direction = acceleration.normalize_or_zero();
        let speed = velocity.length();
        velocity -= (velocity - direction * speed) * (delta_time * friction).min(1.0);
    }

    if !zero_acceleration {
        let limit = if velocity.length_squared() > max_input_speed * max_input_speed * 1.01 {
            velocity.length()
        } else {
            max_input_speed
        };
        velocity += acceleration * delta_time;
        velocity = velocity.clamp_length_max(limit);
    }

    velocity
}

/// Strafe gain, the air-strafe acceleration curve.
///
/// Adds acceleration only while the horizontal velocity projected onto the
/// input direction is below `cap`. Turning without reducing that projection
/// lets speed grow past the ground max speed; at a fixed angle `θ` between
/// input and velocity the speed converges to `cap / cos θ`.
///
/// Only the horizontal components change.
pub fn strafe_gain(
    velocity: Vec3,
    acceleration: Vec3,
    delta_time: f32,
    cap: f32,
    profile: &StrafeProfile,
    air_control: f32,
) -> Vec3 {
    let accel = horizontal(acceleration);
    let accel_dir = accel.normalize_or_zero();
    if accel_dir == Vec3::ZERO {
        return velocity;
    }

    let planar = horizontal(velocity);
    if let Some(min_dot) = profile.min_turn_dot {
        let travel = planar.normalize_or_zero();
        if travel != Vec3::ZERO && travel.dot(accel_dir) <= min_dot {
            return velocity;
        }
    }

    let projected = planar.dot(accel_dir);
    let add_speed = accel.clamp_length_max(cap).length() - projected;
    if add_speed <= 0.0 {
        return velocity;
    }

    let added = (accel * profile.rotation_rate * air_control * delta_time).clamp_length_max(add_speed);
    velocity + added
}

/// Slide friction for a floor normal and facing.
///
/// Facing down a slope tilts the floor normal toward `forward`, which
/// lowers friction; facing uphill raises it. Clamped to
/// `[0, 3 * slide_friction]`.
pub fn slide_friction(floor_normal: Vec3, forward: Vec3, config: &MovementConfig) -> f32 {
    let base = config.slide_friction;
    (base - floor_normal.dot(forward) * config.slide_angle_friction_multiplier).clamp(0.0, 3.0 * base)
}

/// Sliding velocity update.
///
/// `lateral_acceleration` has already had its forward component removed.
/// Friction pulls the velocity toward the steering direction (or simply
/// decays it without steering). Steering adds speed through the strafe
/// gain; if the horizontal speed would exceed the speed before the update
/// it is clamped back and braked.
pub fn calc_slide_velocity(
    velocity: Vec3,
    lateral_acceleration: Vec3,
    delta_time: f32,
    friction: f32,
    cap: f32,
    profile: &StrafeProfile,
    braking: Braking,
) -> Vec3 {
    let old_speed = horizontal(velocity).length();
    let direction = horizontal(lateral_acceleration).normalize_or_zero();
    let speed = velocity.length();

    let mut velocity = velocity - (velocity - direction * speed) * (delta_time * friction).min(1.0);
    velocity = strafe_gain(velocity, lateral_acceleration, delta_time, cap, profile, 1.0);

    let planar = horizontal(velocity);
    if planar.length() > old_speed {
        let clamped = planar.normalize_or_zero() * old_speed;
        velocity = Vec3::new(clamped.x, velocity.y, clamped.z);
        velocity = apply_velocity_braking(velocity, delta_time, braking);
    }
    velocity
}

/// Gravity integration with a terminal speed clamp.
pub fn new_fall_velocity(velocity: Vec3, gravity: Vec3, delta_time: f32, terminal_velocity: f32) -> Vec3 {
    if delta_time <= 0.0 {
        return velocity;
    }
    (velocity + gravity * delta_time).clamp_length_max(terminal_velocity)
}

/// Wall climb velocity update.
///
/// Downward speed is braked. Above `wall_climb_add_speed_threshold` the
/// climb accelerates upward in proportion to forward input, with the input
/// direction pressing into the wall, clamped to `wall_climb_speed`.
pub fn wall_climb_velocity(
    velocity: Vec3,
    acceleration: Vec3,
    forward_input: f32,
    delta_time: f32,
    config: &MovementConfig,
) -> Vec3 {
    let mut velocity = velocity;

    if velocity.y < 0.0 {
        let braking = Braking::new(config.wall_climb_friction, config.braking_deceleration_wall_climb, config);
        velocity = apply_velocity_braking(velocity, delta_time, braking);
    }

    if velocity.y > config.wall_climb_add_speed_threshold {
        let direction = horizontal(acceleration).normalize_or_zero();
        let m = config.wall_climb_multiplier;
        let climb = Vec3::new(
            direction.x * m.x,
            forward_input.clamp(0.0, 1.0) * m.y,
            direction.z * m.z,
        );
        velocity = (velocity + climb * config.wall_climb_acceleration * delta_time)
            .clamp_length_max(config.wall_climb_speed);
    }

    velocity
}

/// Wall run velocity update.
///
/// Speed along the wall accelerates toward `wall_run_speed` (faster entries
/// keep their speed). Reduced gravity pulls down and downward speed is
/// braked. A small speed presses into the wall to keep contact.
pub fn wall_run_velocity(
    velocity: Vec3,
    along: Vec3,
    wall_normal: Vec3,
    delta_time: f32,
    config: &MovementConfig,
) -> Vec3 {
    let mut along_speed = horizontal(velocity).dot(along);
    if along_speed < config.wall_run_speed {
        along_speed = (along_speed + config.wall_run_acceleration * delta_time).min(config.wall_run_speed);
    }

    let mut vertical = velocity.y - config.gravity * config.wall_run_gravity_scale * delta_time;
    if vertical < 0.0 {
        vertical -= vertical * (config.wall_run_friction * delta_time).min(1.0);
    }

    let into_wall = -horizontal(wall_normal).normalize_or_zero() * config.wall_run_stick_speed;
    along * along_speed + into_wall + Vec3::Y * vertical
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn ground_braking(config: &MovementConfig) -> Braking {
        Braking::new(config.braking_friction, config.braking_deceleration_walking, config)
    }

    #[test]
    fn test_braking_never_reverses() {
        let config = MovementConfig::default();
        let braking = Braking::new(50.0, 100.0, &config);
        let slowed = apply_velocity_braking(Vec3::new(1.0, 0.0, 0.0), 0.5, braking);
        assert_eq!(slowed, Vec3::ZERO);
    }

    #[test]
    fn test_braking_reduces_speed() {
        let config = MovementConfig::default();
        let v = Vec3::new(5.0, 0.0, 0.0);
        let slowed = apply_velocity_braking(v, DT, ground_braking(&config));
        assert!(slowed.x < 5.0 && slowed.x > 4.0);
        assert_eq!(slowed.z, 0.0);
    }

    #[test]
    fn test_ground_acceleration_reaches_max_speed() {
        let config = MovementConfig::default();
        let accel = Vec3::X * config.max_acceleration;
        let mut v = Vec3::ZERO;
        for _ in 0..600 {
            v = calc_ground_velocity(
                v,
                accel,
                DT,
                config.ground_friction,
                ground_braking(&config),
                config.max_walk_speed,
                config.max_acceleration,
            );
        }
        assert!((v.length() - config.max_walk_speed).abs() < 1.0e-3);
    }

    #[test]
    fn test_ground_friction_turns_velocity() {
        let config = MovementConfig::default();
        let v = Vec3::new(3.0, 0.0, 0.0);
        let turned = calc_ground_velocity(
            v,
            Vec3::Z * config.max_acceleration,
            DT,
            config.ground_friction,
            ground_braking(&config),
            config.max_walk_speed,
            config.max_acceleration,
        );
        assert!(turned.z > 0.0);
        assert!(turned.x < 3.0);
    }

    #[test]
    fn test_strafe_gain_converges_at_fixed_angle() {
        let config = MovementConfig::default();
        let profile = config.air_strafe;
        let cap = config.air_speed_cap(config.strafing_max_acceleration, &profile);
        let angle = 60.0_f32.to_radians();
        let bound = cap / angle.cos();

        let mut v = Vec3::new(0.1, 0.0, 0.0);
        for _ in 0..5000 {
            // Input held at a fixed angle to the current velocity.
            let travel = horizontal(v).normalize();
            let (s, c) = angle.sin_cos();
            let dir = Vec3::new(travel.x * c - travel.z * s, 0.0, travel.x * s + travel.z * c);
            v = strafe_gain(v, dir * config.strafing_max_acceleration, DT, cap, &profile, config.air_control);
            assert!(v.length().is_finite());
            assert!(v.length() <= bound * (1.0 + 1.0e-3));
        }
        assert!(v.length() > bound * 0.99);
    }

    #[test]
    fn test_strafe_gain_cap_blocks_forward_gain() {
        let config = MovementConfig::default();
        let profile = config.air_strafe;
        let cap = config.air_speed_cap(config.strafing_max_acceleration, &profile);

        // Already faster than the cap along the input direction.
        let v = Vec3::new(5.0, -1.0, 0.0);
        let out = strafe_gain(v, Vec3::X * 64.0, DT, cap, &profile, 1.0);
        assert_eq!(out, v);
    }

    #[test]
    fn test_sway_rejects_backward_input() {
        let config = MovementConfig::default();
        let profile = config.strafe_sway;
        let cap = config.air_speed_cap(config.strafing_max_acceleration, &profile);

        let v = Vec3::new(5.0, 0.0, 0.0);
        let out = strafe_gain(v, Vec3::NEG_X * 64.0, DT, cap, &profile, 1.0);
        assert_eq!(out, v);

        let plain = strafe_gain(v, Vec3::NEG_X * 64.0, DT, cap, &config.air_strafe, 1.0);
        assert!(plain.x < 5.0);
    }

    #[test]
    fn test_slide_friction_monotonic_in_slope() {
        let config = MovementConfig::default();
        let forward = Vec3::X;
        // Floors sloping down toward +X; the normal tilts toward +X.
        let gentle = Vec3::new(0.2, 1.0, 0.0).normalize();
        let steep = Vec3::new(0.6, 1.0, 0.0).normalize();

        let flat = slide_friction(Vec3::Y, forward, &config);
        let gentle_f = slide_friction(gentle, forward, &config);
        let steep_f = slide_friction(steep, forward, &config);

        assert_eq!(flat, config.slide_friction);
        assert!(gentle_f <= flat);
        assert!(steep_f <= gentle_f);

        // Uphill raises friction, up to three times the base.
        let uphill = slide_friction(Vec3::new(-0.9, 0.4, 0.0).normalize(), forward, &config);
        assert!(uphill > flat);
        assert!(uphill <= 3.0 * config.slide_friction);
    }

    #[test]
    fn test_slide_never_gains_speed_from_steering() {
        let config = MovementConfig::default();
        let cap = config.air_speed_cap(config.max_acceleration, &config.slide_strafe);
        let braking = Braking::new(config.slide_braking_friction, config.braking_deceleration_walking, &config);

        let v = Vec3::new(8.0, 0.0, 0.0);
        let out = calc_slide_velocity(v, Vec3::Z * config.max_acceleration, DT, 0.0, cap, &config.slide_strafe, braking);
        assert!(horizontal(out).length() <= 8.0 + 1.0e-4);
        assert!(out.z > 0.0);
    }

    #[test]
    fn test_fall_velocity_clamped_to_terminal() {
        let v = new_fall_velocity(Vec3::new(0.0, -39.9, 0.0), Vec3::new(0.0, -20.0, 0.0), 1.0, 40.0);
        assert!((v.length() - 40.0).abs() < 1.0e-4);
    }

    #[test]
    fn test_wall_climb_accelerates_up_to_limit() {
        let config = MovementConfig::default();
        let mut v = Vec3::ZERO;
        for _ in 0..240 {
            v = wall_climb_velocity(v, Vec3::X * 12.0, 1.0, DT, &config);
        }
        assert!(v.y > 0.0);
        assert!(v.length() <= config.wall_climb_speed + 1.0e-4);
    }

    #[test]
    fn test_wall_climb_brakes_descent() {
        let config = MovementConfig::default();
        let v = wall_climb_velocity(Vec3::new(0.0, -3.0, 0.0), Vec3::ZERO, 0.0, DT, &config);
        assert!(v.y > -3.0 && v.y < 0.0);
    }

    #[test]
    fn test_wall_run_reaches_run_speed() {
        let config = MovementConfig::default();
        let along = Vec3::Z;
        let normal = Vec3::X;
        let mut v = Vec3::new(0.0, 0.0, config.wall_run_min_speed);
        for _ in 0..120 {
            v = wall_run_velocity(v, along, normal, DT, &config);
        }
        assert!((v.z - config.wall_run_speed).abs() < 1.0e-4);
        assert!(v.x < 0.0);
    }
}
