//! Wall and ledge detection.
//!
//! Predicates deciding whether a wall jump, wall climb, wall run or mantle
//! may start, and the wall jump trajectory. All geometry access goes through
//! [`GeometryProbe`]; a probe that finds nothing simply fails the predicate.

use glam::Vec3;
use log::{debug, trace};

use crate::collision::{GeometryProbe, HitResult, SurfaceFlags, TraceShape};

use super::config::MovementConfig;
use super::slide_move::plane_project;
use super::state::{horizontal, Action, MovementState};

/// Target hover above a floor, kept in the middle of the allowed band.
pub const FLOOR_HOVER: f32 = 0.0215;

/// Extra room beyond the capsule radius when standing on a ledge.
const LEDGE_STAND_MARGIN: f32 = 0.05;

/// Where a wall jump is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallJumpKind {
    /// Off a wall touched while falling.
    Airborne,
    /// Out of a wall climb.
    Climbing,
    /// Out of a wall run.
    Running,
}

impl WallJumpKind {
    pub fn boost(self, config: &MovementConfig) -> Vec3 {
        match self {
            Self::Airborne => config.wall_jump_boost,
            Self::Climbing => config.wall_jump_climb_boost,
            Self::Running => config.wall_jump_run_boost,
        }
    }
}

/// A mantle found by the ledge probes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgeTarget {
    /// Level with the ledge, still in front of the wall.
    pub anchor: Vec3,
    /// Standing position on top of the ledge.
    pub target: Vec3,
    /// Outward horizontal normal of the wall below the ledge.
    pub wall_normal: Vec3,
}

/// Mirror `trajectory` about the plane with normal `normal`.
///
/// For unit inputs with `trajectory · normal < 0` the result is a unit
/// vector pointing away from the wall.
#[inline]
pub fn reflect_trajectory(trajectory: Vec3, normal: Vec3) -> Vec3 {
    (trajectory - 2.0 * trajectory.dot(normal) * normal).normalize_or_zero()
}

/// Per-component comparison used to tell walls apart.
fn same_normal(a: Vec3, b: Option<Vec3>, tolerance: f32) -> bool {
    b.is_some_and(|b| (a - b).abs().max_element() <= tolerance)
}

/// A surface steep enough to count as a wall.
#[inline]
pub fn is_wall(normal: Vec3, config: &MovementConfig) -> bool {
    normal.y.abs() < config.max_wall_normal_y && horizontal(normal).length_squared() > 1.0e-6
}

/// Horizontal input direction in world space, or zero without input.
pub fn input_direction(state: &MovementState) -> Vec3 {
    (state.forward_direction() * state.input.forward + state.right_direction() * state.input.right)
        .normalize_or_zero()
}

// ============================================================================
// Wall jump
// ============================================================================

/// Find the wall a wall jump would push off, if a wall jump is allowed now.
///
/// # Arguments
///
/// * `known` - Blocking hit from the current sweep; used before probing
///
/// # Returns
///
/// The wall to jump off, or `None` when the jump is not valid.
pub fn find_wall_jump_surface(
    state: &MovementState,
    config: &MovementConfig,
    world: &dyn GeometryProbe,
    known: Option<&HitResult>,
) -> Option<HitResult> {
    if !state.input.has(Action::WallJump) {
        return None;
    }
    if state.wall_jump.count >= config.wall_jump_limit {
        return None;
    }
    // Distance rather than height, so ledges count too.
    if (state.position - state.wall_jump.previous_ground_location).length() < config.wall_jump_ground_clearance {
        return None;
    }

    let previous = state.wall_jump.previous_normal;
    let tolerance = config.wall_jump_normal_tolerance;

    if let Some(hit) = known.filter(|hit| hit.blocking) {
        if !same_normal(hit.impact_normal, previous, tolerance)
            && !hit.surface_flags.contains(SurfaceFlags::NO_WALL_JUMP)
        {
            return Some(*hit);
        }
    }

    let shape = config.capsule(state.crouched);
    let start = state.position + shape.center_offset();
    let reach = config.wall_jump_valid_distance;

    let mut hit = world.probe(start, start + input_direction(state) * reach, TraceShape::Point);
    if !hit.is_valid_blocking_hit() {
        hit = world.probe(start, start + state.forward_direction() * reach, TraceShape::Point);
        if !hit.is_valid_blocking_hit() {
            return None;
        }
    }

    if same_normal(hit.impact_normal, previous, tolerance) {
        return None;
    }
    if hit.surface_flags.contains(SurfaceFlags::NO_WALL_JUMP) {
        return None;
    }
    Some(hit)
}

/// Direction of a wall jump off `wall`.
///
/// The path from where the ground was left to the wall is reflected about
/// the wall. When that ground lies behind the wall plane it is mirrored in
/// front first. Grazing paths blend the current travel direction with the
/// wall normal instead. Returns the direction and the (possibly nudged)
/// previous ground location.
pub fn wall_jump_direction(
    previous_ground: Vec3,
    velocity: Vec3,
    wall: &HitResult,
    config: &MovementConfig,
) -> (Vec3, Vec3) {
    let normal = horizontal(wall.impact_normal).normalize_or_zero();
    let wall_point = horizontal(wall.impact_point);
    let mut previous_ground = previous_ground;

    let coincident = (horizontal(previous_ground) - wall_point).abs().max_element() <= config.wall_jump_ground_nudge;
    if coincident {
        previous_ground += normal * config.wall_jump_ground_nudge;
    }
    let previous = horizontal(previous_ground);

    let trajectory = (wall_point - previous).normalize_or_zero();
    let wall_angle = normal.dot(trajectory);

    let mut direction = if wall_angle > 0.0 {
        // Ground left behind the wall: mirror it to the front before reflecting.
        let mirrored = previous - 2.0 * (previous - wall_point).dot(normal) * normal;
        reflect_trajectory((wall_point - mirrored).normalize_or_zero(), normal)
    } else if wall_angle > config.wall_jump_shallow_dot {
        (horizontal(velocity).normalize_or_zero() + normal).normalize_or(normal)
    } else {
        reflect_trajectory(trajectory, normal)
    };

    if direction == Vec3::ZERO {
        direction = normal;
    }
    direction.y = if velocity.normalize_or_zero().y < 0.0 {
        config.wall_jump_up_descending
    } else {
        config.wall_jump_up
    };

    (direction, previous_ground)
}

/// Redirect the character off `wall` and record the jump.
///
/// Enables strafe sway and counts towards the wall jump limit.
pub fn perform_wall_jump(state: &mut MovementState, config: &MovementConfig, wall: &HitResult, kind: WallJumpKind) {
    let boost = kind.boost(config);

    match kind {
        WallJumpKind::Airborne => {
            let (direction, previous_ground) =
                wall_jump_direction(state.wall_jump.previous_ground_location, state.velocity, wall, config);
            state.wall_jump.previous_ground_location = previous_ground;

            let speed = state.horizontal_speed().max(config.wall_jump_speed);
            state.velocity = horizontal(direction) * speed + direction * boost;
        }
        WallJumpKind::Climbing | WallJumpKind::Running => {
            let normal = horizontal(wall.impact_normal).normalize_or_zero();
            let direction = Vec3::new(normal.x, config.wall_jump_up, normal.z);
            let along_wall = plane_project(horizontal(state.velocity), normal);
            state.velocity = along_wall + direction * boost;
        }
    }

    state.wall_jump.previous_normal = Some(wall.impact_normal);
    state.wall_jump.count += 1;
    state.sway.active = true;
    state.sway.start_time = state.simulation_clock;

    debug!(
        "wall jump {:?} #{} off {:?} -> velocity {:?}",
        kind, state.wall_jump.count, wall.impact_normal, state.velocity
    );
}

// ============================================================================
// Wall climb and wall run
// ============================================================================

/// Whether hitting `wall` while falling starts a wall climb.
pub fn can_wall_climb(state: &MovementState, config: &MovementConfig, wall: &HitResult) -> bool {
    if let Some(end) = state.wall_climb.last_end_time {
        if state.simulation_clock < end + config.wall_climb_interval {
            return false;
        }
    }
    if state.input.forward < config.wall_min_input {
        return false;
    }
    if !is_wall(wall.impact_normal, config) || wall.surface_flags.contains(SurfaceFlags::NO_WALL_CLIMB) {
        return false;
    }

    let into_wall = -horizontal(wall.impact_normal).normalize_or_zero();
    state.forward_direction().dot(into_wall) > config.wall_climb_min_facing
}

/// Whether hitting `wall` while falling starts a wall run.
pub fn can_wall_run(state: &MovementState, config: &MovementConfig, wall: &HitResult) -> bool {
    if state.input.right.abs() < config.wall_min_input {
        return false;
    }
    if !is_wall(wall.impact_normal, config) || wall.surface_flags.contains(SurfaceFlags::NO_WALL_RUN) {
        return false;
    }

    let normal = horizontal(wall.impact_normal).normalize_or_zero();
    if state.forward_direction().dot(normal).abs() > config.wall_run_max_facing_dot() {
        return false;
    }
    if state.horizontal_speed() < config.wall_run_min_speed {
        return false;
    }

    let same_wall = wall.surface.is_some() && wall.surface == state.wall_run.last_surface;
    !same_wall || (state.position.y - state.wall_run.last_height).abs() >= config.wall_run_height_difference
}

/// Direction along `normal`'s wall closest to the current travel.
pub fn wall_run_direction(velocity: Vec3, facing: Vec3, normal: Vec3) -> Vec3 {
    let normal = horizontal(normal).normalize_or_zero();
    let along = plane_project(horizontal(velocity), normal).normalize_or_zero();
    if along != Vec3::ZERO {
        return along;
    }
    plane_project(facing, normal).normalize_or_zero()
}

/// Look sideways for the wall being run along.
pub fn probe_wall_run_surface(
    state: &MovementState,
    config: &MovementConfig,
    world: &dyn GeometryProbe,
) -> Option<HitResult> {
    let shape = config.capsule(state.crouched);
    let start = state.position + shape.center_offset();
    let into_wall = -horizontal(state.wall_run.normal).normalize_or_zero();
    let reach = config.capsule_radius + config.wall_run_probe_distance;

    let hit = world.probe(start, start + into_wall * reach, TraceShape::Point);
    (hit.is_valid_blocking_hit() && is_wall(hit.impact_normal, config)).then_some(hit)
}

/// Look ahead for the wall being climbed.
pub fn probe_wall_climb_surface(
    state: &MovementState,
    config: &MovementConfig,
    world: &dyn GeometryProbe,
) -> Option<HitResult> {
    let shape = config.capsule(state.crouched);
    let start = state.position + shape.center_offset();
    let into_wall = -horizontal(state.wall_climb.wall_normal).normalize_or_zero();
    let reach = config.capsule_radius + config.wall_jump_valid_distance;

    let hit = world.probe(start, start + into_wall * reach, TraceShape::Point);
    (hit.is_valid_blocking_hit() && is_wall(hit.impact_normal, config)).then_some(hit)
}

// ============================================================================
// Mantle
// ============================================================================

/// Run the four chained ledge probes in front of the character.
///
/// 1. A forward ray finds a wall.
/// 2. A downward ray from above that wall finds a walkable ledge top within
///    the mantle height range.
/// 3. The capsule can rise from its position to ledge height (headroom).
/// 4. The capsule fits standing on top of the ledge.
pub fn find_ledge(state: &MovementState, config: &MovementConfig, world: &dyn GeometryProbe) -> Option<LedgeTarget> {
    let shape = config.capsule(state.crouched);
    let forward = state.forward_direction();
    let feet = state.position;

    let wall_start = feet + Vec3::Y * (config.mantle_min_height * 0.5);
    let wall = world.probe(wall_start, wall_start + forward * config.mantle_reach, TraceShape::Point);
    if !wall.is_valid_blocking_hit() || !is_wall(wall.impact_normal, config) {
        return None;
    }
    if wall.surface_flags.contains(SurfaceFlags::NO_MANTLE) {
        return None;
    }
    let wall_normal = horizontal(wall.impact_normal).normalize_or_zero();

    let over_ledge = horizontal(wall.impact_point) - wall_normal * config.capsule_radius;
    let top = Vec3::new(over_ledge.x, feet.y + config.mantle_max_height, over_ledge.z);
    let bottom = Vec3::new(over_ledge.x, feet.y + config.mantle_min_height, over_ledge.z);
    let ledge = world.probe(top, bottom, TraceShape::Point);
    if !ledge.is_valid_blocking_hit() || ledge.impact_normal.y < config.walkable_floor_y {
        trace!("ledge probe failed: {:?}", ledge.blocking);
        return None;
    }
    let ledge_y = ledge.impact_point.y;

    let anchor = Vec3::new(feet.x, ledge_y + FLOOR_HOVER, feet.z);
    let rise = world.sweep(feet, anchor - feet, shape);
    if rise.blocking {
        return None;
    }

    let stand = horizontal(wall.impact_point) - wall_normal * (config.capsule_radius + LEDGE_STAND_MARGIN);
    let target = Vec3::new(stand.x, ledge_y + FLOOR_HOVER, stand.z);
    if world.overlaps(target, config.capsule(false)) {
        return None;
    }

    Some(LedgeTarget {
        anchor,
        target,
        wall_normal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionWorld, ContentFlags, EmptyWorld};
    use crate::movement::state::{ActionFlags, MovementMode, MoveInput};

    fn wall_hit(normal: Vec3, point: Vec3) -> HitResult {
        HitResult {
            blocking: true,
            time: 0.5,
            impact_point: point,
            location: point + normal * 0.34,
            normal,
            impact_normal: normal,
            surface: Some(1),
            ..HitResult::default()
        }
    }

    fn airborne_state(flags: ActionFlags) -> MovementState {
        let mut state = MovementState::new(Vec3::new(0.0, 3.0, 0.0));
        state.wall_jump.previous_ground_location = Vec3::ZERO;
        state.input = MoveInput {
            forward: 1.0,
            flags,
            ..Default::default()
        };
        state
    }

    #[test]
    fn test_reflection_points_away_from_wall() {
        let normals = [Vec3::X, Vec3::NEG_Z, Vec3::new(1.0, 0.0, 1.0).normalize()];
        for normal in normals {
            for i in 0..16 {
                let angle = i as f32 / 16.0 * std::f32::consts::TAU;
                let d = Vec3::new(angle.cos(), 0.0, angle.sin());
                if d.dot(normal) >= 0.0 {
                    continue;
                }
                let out = reflect_trajectory(d, normal);
                assert!((out.length() - 1.0).abs() < 1.0e-5);
                assert!(out.dot(normal) >= 0.0);
            }
        }
    }

    #[test]
    fn test_wall_jump_limit_bounds_consecutive_jumps() {
        let config = MovementConfig {
            wall_jump_limit: 2,
            ..Default::default()
        };
        let mut state = airborne_state(ActionFlags::from_actions(&[Action::WallJump]));
        state.velocity = Vec3::new(5.0, 1.0, 0.0);

        let walls = [
            wall_hit(Vec3::X, Vec3::new(-0.4, 3.5, 0.0)),
            wall_hit(Vec3::NEG_X, Vec3::new(0.4, 3.5, 0.0)),
            wall_hit(Vec3::Z, Vec3::new(0.0, 3.5, -0.4)),
        ];

        let mut redirected = 0;
        for wall in &walls {
            if let Some(hit) = find_wall_jump_surface(&state, &config, &EmptyWorld, Some(wall)) {
                perform_wall_jump(&mut state, &config, &hit, WallJumpKind::Airborne);
                redirected += 1;
            }
        }

        assert_eq!(redirected, 2);
        assert_eq!(state.wall_jump.count, 2);
        assert!(find_wall_jump_surface(&state, &config, &EmptyWorld, Some(&walls[2])).is_none());
    }

    #[test]
    fn test_wall_jump_needs_request_and_clearance() {
        let config = MovementConfig::default();
        let wall = wall_hit(Vec3::X, Vec3::new(-0.4, 3.5, 0.0));

        let state = airborne_state(ActionFlags::NONE);
        assert!(find_wall_jump_surface(&state, &config, &EmptyWorld, Some(&wall)).is_none());

        let mut state = airborne_state(ActionFlags::from_actions(&[Action::WallJump]));
        state.wall_jump.previous_ground_location = state.position - Vec3::Y * 0.3;
        assert!(find_wall_jump_surface(&state, &config, &EmptyWorld, Some(&wall)).is_none());
    }

    #[test]
    fn test_same_wall_is_rejected() {
        let config = MovementConfig::default();
        let wall = wall_hit(Vec3::X, Vec3::new(-0.4, 3.5, 0.0));
        let mut state = airborne_state(ActionFlags::from_actions(&[Action::WallJump]));
        state.wall_jump.previous_normal = Some(Vec3::new(0.95, 0.05, 0.0));

        assert!(find_wall_jump_surface(&state, &config, &EmptyWorld, Some(&wall)).is_none());
    }

    #[test]
    fn test_wall_jump_probes_for_wall_in_front() {
        let config = MovementConfig::default();
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(0.6, 3.0, 0.0), Vec3::new(0.1, 3.0, 2.0), ContentFlags::SOLID);

        let state = airborne_state(ActionFlags::from_actions(&[Action::WallJump]));
        let hit = find_wall_jump_surface(&state, &config, &world, None);
        let hit = hit.map(|h| h.impact_normal);
        assert!(hit.is_some_and(|n| n.x < -0.99));
    }

    #[test]
    fn test_no_wall_jump_surface_flag() {
        let config = MovementConfig::default();
        let mut wall = wall_hit(Vec3::X, Vec3::new(-0.4, 3.5, 0.0));
        wall.surface_flags = SurfaceFlags::NO_WALL_JUMP;
        let state = airborne_state(ActionFlags::from_actions(&[Action::WallJump]));

        assert!(find_wall_jump_surface(&state, &config, &EmptyWorld, Some(&wall)).is_none());
    }

    #[test]
    fn test_wall_jump_reflects_approach() {
        let config = MovementConfig::default();
        // Left the ground at the origin, hit a wall facing -X at 45 degrees.
        let wall = wall_hit(Vec3::NEG_X, Vec3::new(4.0, 1.0, 4.0));
        let (direction, _) = wall_jump_direction(Vec3::ZERO, Vec3::new(3.0, 0.5, 3.0), &wall, &config);

        assert!(direction.x < 0.0);
        assert!(direction.z > 0.0);
        assert_eq!(direction.y, config.wall_jump_up);
    }

    #[test]
    fn test_wall_jump_from_ground_behind_wall() {
        let config = MovementConfig::default();
        // Ground was left on the far side of the wall plane.
        let wall = wall_hit(Vec3::NEG_X, Vec3::new(4.0, 1.0, 4.0));
        let (direction, _) = wall_jump_direction(Vec3::new(6.0, 0.0, 0.0), Vec3::new(0.0, -1.0, 3.0), &wall, &config);

        assert!(direction.x < 0.0);
        assert_eq!(direction.y, config.wall_jump_up_descending);
    }

    #[test]
    fn test_grazing_wall_jump_blends_with_normal() {
        let config = MovementConfig::default();
        // Running almost parallel to a wall facing -X.
        let wall = wall_hit(Vec3::NEG_X, Vec3::new(4.0, 1.0, 10.0));
        let (direction, _) = wall_jump_direction(Vec3::new(3.9, 0.0, 0.0), Vec3::new(0.0, 0.0, 6.0), &wall, &config);

        let flat = horizontal(direction).normalize();
        assert!(flat.x < 0.0 && flat.z > 0.0);
        assert!((flat.dot(Vec3::new(-1.0, 0.0, 1.0).normalize()) - 1.0).abs() < 1.0e-4);
    }

    #[test]
    fn test_coincident_ground_is_nudged() {
        let config = MovementConfig::default();
        let wall = wall_hit(Vec3::NEG_X, Vec3::new(4.0, 1.0, 0.0));
        let (direction, ground) = wall_jump_direction(Vec3::new(4.0, 0.0, 0.0), Vec3::ZERO, &wall, &config);

        assert!((ground.x - (4.0 - config.wall_jump_ground_nudge)).abs() < 1.0e-5);
        assert!(direction.x < 0.0);
    }

    #[test]
    fn test_perform_wall_jump_enables_sway() {
        let config = MovementConfig::default();
        let mut state = airborne_state(ActionFlags::from_actions(&[Action::WallJump]));
        state.simulation_clock = 2.0;
        state.velocity = Vec3::new(2.0, -1.0, 0.0);
        let wall = wall_hit(Vec3::NEG_X, Vec3::new(0.4, 3.5, 0.0));

        perform_wall_jump(&mut state, &config, &wall, WallJumpKind::Airborne);
        assert!(state.is_strafe_swaying());
        assert_eq!(state.sway.start_time, 2.0);
        assert!(state.horizontal_speed() >= config.wall_jump_speed);
        assert!(state.velocity.x < 0.0);
        assert_eq!(state.wall_jump.previous_normal, Some(Vec3::NEG_X));
    }

    #[test]
    fn test_wall_climb_requires_facing_and_cooldown() {
        let config = MovementConfig::default();
        let mut state = airborne_state(ActionFlags::NONE);
        state.simulation_clock = 5.0;
        let facing_wall = wall_hit(Vec3::NEG_X, Vec3::new(0.4, 3.5, 0.0));
        let side_wall = wall_hit(Vec3::NEG_Z, Vec3::new(0.0, 3.5, 0.4));

        assert!(can_wall_climb(&state, &config, &facing_wall));
        assert!(!can_wall_climb(&state, &config, &side_wall));

        state.wall_climb.last_end_time = Some(4.8);
        assert!(!can_wall_climb(&state, &config, &facing_wall));

        state.wall_climb.last_end_time = Some(4.0);
        state.input.forward = 0.0;
        assert!(!can_wall_climb(&state, &config, &facing_wall));
    }

    #[test]
    fn test_wall_run_window_and_relatch() {
        let config = MovementConfig::default();
        let mut state = airborne_state(ActionFlags::NONE);
        state.input.right = 1.0;
        state.velocity = Vec3::new(6.0, 0.0, 0.0);
        let side_wall = wall_hit(Vec3::NEG_Z, Vec3::new(0.0, 3.5, 0.4));
        let facing_wall = wall_hit(Vec3::NEG_X, Vec3::new(0.4, 3.5, 0.0));

        assert!(can_wall_run(&state, &config, &side_wall));
        assert!(!can_wall_run(&state, &config, &facing_wall));

        // Same wall at nearly the same height is refused.
        state.wall_run.last_surface = Some(1);
        state.wall_run.last_height = 2.6;
        assert!(!can_wall_run(&state, &config, &side_wall));
        state.wall_run.last_height = 1.5;
        assert!(can_wall_run(&state, &config, &side_wall));

        state.velocity = Vec3::new(2.0, 0.0, 0.0);
        assert!(!can_wall_run(&state, &config, &side_wall));
    }

    #[test]
    fn test_wall_run_direction_follows_travel() {
        let along = wall_run_direction(Vec3::new(3.0, 0.0, 1.0), Vec3::X, Vec3::NEG_Z);
        assert!((along - Vec3::X).length() < 1.0e-5);

        let still = wall_run_direction(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0).normalize(), Vec3::NEG_Z);
        assert!((still - Vec3::X).length() < 1.0e-5);
    }

    fn ledge_world(height: f32) -> CollisionWorld {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(0.0, -0.5, 0.0), Vec3::new(20.0, 0.5, 20.0), ContentFlags::SOLID);
        // Block in front (+X) whose top is at `height`.
        world.add_box(Vec3::new(2.0, height * 0.5, 0.0), Vec3::new(1.0, height * 0.5, 3.0), ContentFlags::SOLID);
        world
    }

    #[test]
    fn test_find_ledge_on_reachable_block() {
        let config = MovementConfig::default();
        let world = ledge_world(1.4);
        let mut state = MovementState::new(Vec3::new(0.62, FLOOR_HOVER, 0.0));
        state.set_mode(MovementMode::WallClimbing, &config);

        let ledge = find_ledge(&state, &config, &world);
        let ledge = ledge.map(|l| (l.anchor, l.target, l.wall_normal));
        let (anchor, target, normal) = ledge.unwrap_or_default();
        assert!((anchor.y - (1.4 + FLOOR_HOVER)).abs() < 1.0e-3);
        assert!(target.x > 1.0 + config.capsule_radius);
        assert!(normal.x < -0.99);
    }

    #[test]
    fn test_find_ledge_rejects_tall_wall() {
        let config = MovementConfig::default();
        let world = ledge_world(4.0);
        let state = MovementState::new(Vec3::new(0.62, FLOOR_HOVER, 0.0));
        assert!(find_ledge(&state, &config, &world).is_none());
    }

    #[test]
    fn test_find_ledge_rejects_blocked_top() {
        let config = MovementConfig::default();
        let mut world = ledge_world(1.4);
        // Low ceiling over the ledge.
        world.add_box(Vec3::new(2.0, 2.2, 0.0), Vec3::new(1.0, 0.2, 3.0), ContentFlags::SOLID);
        let state = MovementState::new(Vec3::new(0.62, FLOOR_HOVER, 0.0));
        assert!(find_ledge(&state, &config, &world).is_none());
    }

    #[test]
    fn test_no_mantle_surface_flag() {
        let config = MovementConfig::default();
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(0.0, -0.5, 0.0), Vec3::new(20.0, 0.5, 20.0), ContentFlags::SOLID);
        let block = world.add_box(Vec3::new(2.0, 0.7, 0.0), Vec3::new(1.0, 0.7, 3.0), ContentFlags::SOLID);
        world.set_surface_flags(block, SurfaceFlags::NO_MANTLE);

        let state = MovementState::new(Vec3::new(0.62, FLOOR_HOVER, 0.0));
        assert!(find_ledge(&state, &config, &world).is_none());
    }
}
