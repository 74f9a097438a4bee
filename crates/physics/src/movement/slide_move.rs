//! Deflection of blocked motion along surfaces.
//!
//! Pure vector functions used by the stepped loop after a sweep hits
//! something: sliding along one surface, slope-boost prevention, the
//! two-surface adjustment, and ramp projection for ground movement.

use glam::Vec3;

/// Tolerance for "nearly zero" comparisons on deltas and normals.
pub const KINDA_SMALL: f32 = 1.0e-4;

/// Nudge away from a wall that was hit twice in a row.
const SAME_WALL_NUDGE: f32 = 0.0001;

/// Remove the component of `v` along the plane normal `normal`.
#[inline]
pub fn plane_project(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Motion left over after hitting a surface, slid along it.
///
/// # Arguments
///
/// * `delta` - The attempted motion
/// * `time` - Fraction of `delta` still to be applied
/// * `normal` - Normal of the surface that blocked the motion
/// * `falling` - Airborne motion must not be boosted up slopes
pub fn compute_slide_vector(delta: Vec3, time: f32, normal: Vec3, falling: bool) -> Vec3 {
    let result = plane_project(delta, normal) * time;
    if falling {
        handle_slope_boosting(result, delta, time, normal)
    } else {
        result
    }
}

/// Stop a deflection from carrying the character higher than it meant to go.
///
/// Any upward part of `slide` beyond the upward part of the original motion
/// is cut, and the remainder is redirected horizontally along the surface.
pub fn handle_slope_boosting(slide: Vec3, delta: Vec3, time: f32, normal: Vec3) -> Vec3 {
    let mut result = slide;
    if result.y <= 0.0 {
        return result;
    }

    let y_limit = delta.y * time;
    if result.y - y_limit > KINDA_SMALL {
        if y_limit > 0.0 {
            // Rescale the whole vector; changing direction would aim back into the surface.
            result *= y_limit / result.y;
        } else {
            result = Vec3::ZERO;
        }

        let remainder = slide - result;
        let remainder_xz = Vec3::new(remainder.x, 0.0, remainder.z);
        let normal_xz = Vec3::new(normal.x, 0.0, normal.z).normalize_or_zero();
        result += plane_project(remainder_xz, normal_xz);
    }
    result
}

/// Adjust motion after a second surface was hit while sliding along the first.
///
/// Corners of 90 degrees or less (normals facing each other) force motion
/// along the crease between the two surfaces. Wider corners slide along the
/// plane of the averaged normal.
pub fn two_wall_adjust(delta: Vec3, hit_normal: Vec3, hit_time: f32, old_normal: Vec3, falling: bool) -> Vec3 {
    let desired = delta;

    if old_normal.dot(hit_normal) <= 0.0 {
        let crease = hit_normal.cross(old_normal).normalize_or_zero();
        let mut adjusted = crease * delta.dot(crease) * (1.0 - hit_time);
        if desired.dot(adjusted) < 0.0 {
            adjusted = -adjusted;
        }
        return adjusted;
    }

    let average = (hit_normal + old_normal).normalize_or(hit_normal);
    let mut adjusted = compute_slide_vector(delta, 1.0 - hit_time, average, falling);
    if adjusted.dot(desired) <= 0.0 {
        return Vec3::ZERO;
    }
    if (hit_normal.dot(old_normal) - 1.0).abs() < KINDA_SMALL {
        // Same wall again after sliding along it; floating point drift.
        adjusted += hit_normal * SAME_WALL_NUDGE;
    }
    adjusted
}

/// Extra rules for the two-surface adjustment while on the ground.
///
/// Motion may climb walkable surfaces, keeping its horizontal speed, but
/// never more than `max_step_height`. Unwalkable surfaces act as vertical
/// barriers, and motion never pushes down into the floor being stood on.
pub fn ground_two_wall_adjust(
    in_delta: Vec3,
    adjusted: Vec3,
    hit_normal: Vec3,
    hit_time: f32,
    walkable_floor_y: f32,
    max_step_height: f32,
    touching_floor: bool,
) -> Vec3 {
    let mut out = adjusted;
    if out.y > 0.0 {
        if hit_normal.y >= walkable_floor_y && hit_normal.y > KINDA_SMALL {
            let time = 1.0 - hit_time;
            let scaled = out.normalize_or_zero() * in_delta.length();
            out = Vec3::new(in_delta.x, scaled.y / hit_normal.y, in_delta.z) * time;
            if out.y > max_step_height {
                out *= max_step_height / out.y;
            }
        } else {
            out.y = 0.0;
        }
    } else if out.y < 0.0 && touching_floor {
        out.y = 0.0;
    }
    out
}

/// Project horizontal motion onto a walkable floor so the character follows
/// ramps without losing horizontal speed.
pub fn ground_movement_delta(delta: Vec3, floor_normal: Vec3) -> Vec3 {
    if floor_normal.y <= KINDA_SMALL || floor_normal.y >= 1.0 - KINDA_SMALL {
        return delta;
    }
    let floor_dot_delta = floor_normal.dot(delta);
    Vec3::new(delta.x, -floor_dot_delta / floor_normal.y, delta.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slide_vector_along_wall() {
        // Moving into a wall on the +X side at an angle.
        let delta = Vec3::new(10.0, 0.0, 5.0);
        let wall_normal = Vec3::NEG_X;

        let slid = compute_slide_vector(delta, 0.5, wall_normal, false);
        assert!(slid.x.abs() < 1.0e-6);
        assert!((slid.z - 2.5).abs() < 1.0e-6);
    }

    #[test]
    fn test_falling_slide_never_boosts_upward() {
        // Falling straight into a 45 degree ramp facing -X.
        let normal = Vec3::new(-1.0, 1.0, 0.0).normalize();
        let delta = Vec3::new(2.0, -0.5, 0.0);

        let ground = compute_slide_vector(delta, 1.0, normal, false);
        assert!(ground.y > 0.0);

        let airborne = compute_slide_vector(delta, 1.0, normal, true);
        assert!(airborne.y <= 0.0);
    }

    #[test]
    fn test_slope_boosting_rescales_when_rising() {
        let normal = Vec3::new(-1.0, 1.0, 0.0).normalize();
        let delta = Vec3::new(2.0, 0.2, 0.0);

        let result = compute_slide_vector(delta, 1.0, normal, true);
        assert!(result.y <= 0.2 + KINDA_SMALL);
    }

    #[test]
    fn test_two_wall_crease() {
        // Inside corner formed by walls facing -X and -Z.
        let delta = Vec3::new(1.0, 0.0, 1.0);
        let adjusted = two_wall_adjust(delta, Vec3::NEG_Z, 0.0, Vec3::NEG_X, false);

        // The crease is vertical; no horizontal motion survives.
        assert!(adjusted.x.abs() < 1.0e-6);
        assert!(adjusted.z.abs() < 1.0e-6);
    }

    #[test]
    fn test_two_wall_wide_corner_uses_average_normal() {
        let a = Vec3::new(-1.0, 0.0, 0.3).normalize();
        let b = Vec3::new(-1.0, 0.0, -0.3).normalize();
        let delta = Vec3::new(1.0, 0.0, 0.5);

        let adjusted = two_wall_adjust(delta, b, 0.0, a, false);
        // The average normal is -X, so only the Z motion is kept.
        assert!(adjusted.x.abs() < 1.0e-5);
        assert!((adjusted.z - 0.5).abs() < 1.0e-5);
    }

    #[test]
    fn test_two_wall_reversal_stops() {
        let delta = Vec3::new(1.0, 0.0, 0.0);
        let adjusted = two_wall_adjust(delta, Vec3::NEG_X, 0.0, Vec3::NEG_X, false);
        assert_eq!(adjusted, Vec3::ZERO);
    }

    #[test]
    fn test_ground_adjust_blocks_unwalkable_climb() {
        let steep = Vec3::new(-0.9, 0.43, 0.0).normalize();
        let out = ground_two_wall_adjust(Vec3::X, Vec3::new(0.2, 0.4, 0.0), steep, 0.0, 0.69, 0.45, true);
        assert_eq!(out.y, 0.0);
    }

    #[test]
    fn test_ground_adjust_keeps_floor_contact() {
        let out = ground_two_wall_adjust(Vec3::X, Vec3::new(0.5, -0.1, 0.0), Vec3::NEG_X, 0.0, 0.69, 0.45, true);
        assert_eq!(out.y, 0.0);
    }

    #[test]
    fn test_ramp_projection_keeps_horizontal_motion() {
        // Ramp rising toward +X.
        let normal = Vec3::new(-1.0, 2.0, 0.0).normalize();
        let projected = ground_movement_delta(Vec3::new(1.0, 0.0, 0.0), normal);

        assert_eq!(projected.x, 1.0);
        assert!((projected.y - 0.5).abs() < 1.0e-5);
        assert!(projected.dot(normal).abs() < 1.0e-5);
    }
}
