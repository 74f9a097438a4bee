//! Collision world containing all static geometry.
//!
//! The world stores brushes and answers sweep, ray and overlap queries
//! against them. It implements [`GeometryProbe`] so movement code never
//! touches parry3d directly.

use glam::{Quat, Vec3};
use parry3d::math::{Isometry, Point, Real, Vector};
use parry3d::query::{contact, Ray};
use parry3d::shape::SharedShape;

use super::flags::{ContentFlags, SurfaceFlags};
use super::probe::GeometryProbe;
use super::trace::{HitResult, SurfaceId, TraceShape};

/// Iterations of the binary search that refines a blocking fraction.
const BINARY_SEARCH_ITERATIONS: u32 = 12;

/// Shortest march step; keeps point-like shapes from stalling the sweep.
const MIN_MARCH_STEP: f32 = 0.01;

/// Upper bound on march steps for a single sweep.
const MAX_MARCH_STEPS: u32 = 512;

/// Sweeps shorter than this only test the start position.
const MIN_TRACE_DISTANCE: f32 = 1.0e-5;

/// Extra distance added when pushing out of geometry.
const PENETRATION_PULLBACK: f32 = 0.001;

const MAX_DEPENETRATION_PASSES: u32 = 4;

/// A piece of collision geometry.
#[derive(Debug, Clone)]
pub struct CollisionBrush {
    pub id: SurfaceId,
    pub shape: SharedShape,
    pub transform: Isometry<Real>,
    pub contents: ContentFlags,
    pub surface: SurfaceFlags,
}

/// Overlap between a query shape and one brush.
#[derive(Debug, Clone, Copy)]
struct Penetration {
    depth: f32,
    /// Outward normal of the brush.
    normal: Vec3,
    point: Vec3,
    surface: SurfaceId,
    flags: SurfaceFlags,
}

/// The collision world.
///
/// Immutable during simulation, so the client and the authority can each
/// hold their own copy built from the same course description.
#[derive(Debug, Default)]
pub struct CollisionWorld {
    brushes: Vec<CollisionBrush>,
    next_id: SurfaceId,
}

impl CollisionWorld {
    pub fn new() -> Self {
        Self {
            brushes: Vec::new(),
            next_id: 0,
        }
    }

    /// Add an axis-aligned box.
    ///
    /// # Arguments
    ///
    /// * `center` - Centre of the box in world space
    /// * `half_extents` - Half-size in each axis
    /// * `contents` - Content flags for query filtering
    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3, contents: ContentFlags) -> SurfaceId {
        self.add_rotated_box(center, half_extents, Quat::IDENTITY, contents)
    }

    /// Add a box rotated about its centre, used for ramps and angled walls.
    pub fn add_rotated_box(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
        contents: ContentFlags,
    ) -> SurfaceId {
        let shape = SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z);
        let (axis, angle) = rotation.to_axis_angle();
        let axis_angle = if angle.abs() > f32::EPSILON { axis * angle } else { Vec3::ZERO };
        let transform = Isometry::new(
            Vector::new(center.x, center.y, center.z),
            Vector::new(axis_angle.x, axis_angle.y, axis_angle.z),
        );
        self.push_brush(shape, transform, contents)
    }

    /// Add a convex hull.
    ///
    /// Returns `None` if the hull couldn't be computed.
    pub fn add_convex_hull(&mut self, points: &[Vec3], contents: ContentFlags) -> Option<SurfaceId> {
        let parry_points: Vec<Point<Real>> =
            points.iter().map(|p| Point::new(p.x, p.y, p.z)).collect();
        let shape = SharedShape::convex_hull(&parry_points)?;
        Some(self.push_brush(shape, Isometry::identity(), contents))
    }

    /// Add a triangle mesh.
    ///
    /// Returns `None` if the mesh is degenerate.
    pub fn add_triangle_mesh(
        &mut self,
        vertices: &[Vec3],
        indices: &[[u32; 3]],
        contents: ContentFlags,
    ) -> Option<SurfaceId> {
        let parry_vertices: Vec<Point<Real>> =
            vertices.iter().map(|v| Point::new(v.x, v.y, v.z)).collect();
        let shape = SharedShape::trimesh(parry_vertices, indices.to_vec()).ok()?;
        Some(self.push_brush(shape, Isometry::identity(), contents))
    }

    /// Attach surface flags to a brush. Unknown ids are ignored.
    pub fn set_surface_flags(&mut self, id: SurfaceId, flags: SurfaceFlags) {
        if let Some(brush) = self.brushes.iter_mut().find(|b| b.id == id) {
            brush.surface = flags;
        }
    }

    pub fn clear(&mut self) {
        self.brushes.clear();
    }

    pub fn brush_count(&self) -> usize {
        self.brushes.len()
    }

    /// Sweep a shape from `start` to `end` and report the first blocking hit.
    ///
    /// The path is marched in steps no longer than half the shape's smallest
    /// extent so thin walls are never skipped, then the first overlapping
    /// step is refined by binary search.
    pub fn trace(&self, start: Vec3, end: Vec3, shape: TraceShape, mask: ContentFlags) -> HitResult {
        if shape.is_point() {
            return self.raycast(start, end, mask);
        }

        if let Some(pen) = self.deepest_penetration(start, shape, mask) {
            return HitResult {
                blocking: true,
                time: 0.0,
                trace_start: start,
                trace_end: end,
                location: start,
                impact_point: pen.point,
                normal: pen.normal,
                impact_normal: pen.normal,
                start_penetrating: true,
                penetration_depth: pen.depth,
                surface: Some(pen.surface),
                surface_flags: pen.flags,
            };
        }

        let delta = end - start;
        let distance = delta.length();
        if distance < MIN_TRACE_DISTANCE {
            return HitResult::miss(start, end);
        }

        let max_step = (shape.min_extent() * 0.5).max(MIN_MARCH_STEP);
        let steps = ((distance / max_step).ceil() as u32).clamp(1, MAX_MARCH_STEPS);

        let mut clear = 0.0_f32;
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            if self.point_in_solid(start + delta * t, shape, mask) {
                return self.refine_hit(start, end, shape, mask, clear, t);
            }
            clear = t;
        }

        HitResult::miss(start, end)
    }

    /// Cast a ray from `start` to `end`.
    pub fn raycast(&self, start: Vec3, end: Vec3, mask: ContentFlags) -> HitResult {
        let delta = end - start;
        let max_distance = delta.length();
        if max_distance < MIN_TRACE_DISTANCE {
            return HitResult::miss(start, end);
        }
        let dir = delta / max_distance;

        let ray = Ray::new(
            Point::new(start.x, start.y, start.z),
            Vector::new(dir.x, dir.y, dir.z),
        );

        let mut closest: Option<(f32, &CollisionBrush)> = None;
        for brush in &self.brushes {
            if !mask.intersects(brush.contents) {
                continue;
            }
            if let Some(toi) = brush.shape.cast_ray(&brush.transform, &ray, max_distance, true) {
                if closest.map_or(true, |(best, _)| toi < best) {
                    closest = Some((toi, brush));
                }
            }
        }

        let Some((toi, brush)) = closest else {
            return HitResult::miss(start, end);
        };

        let normal = if toi <= 0.0 {
            -dir
        } else {
            self.ray_normal(&ray, toi, brush).unwrap_or(-dir)
        };
        let impact = start + dir * toi;

        HitResult {
            blocking: true,
            time: toi / max_distance,
            trace_start: start,
            trace_end: end,
            location: impact,
            impact_point: impact,
            normal,
            impact_normal: normal,
            start_penetrating: toi <= 0.0,
            penetration_depth: 0.0,
            surface: Some(brush.id),
            surface_flags: brush.surface,
        }
    }

    /// Check whether a shape at `position` overlaps any brush in `mask`.
    pub fn point_in_solid(&self, position: Vec3, shape: TraceShape, mask: ContentFlags) -> bool {
        let test_shape = create_parry_shape(shape);
        let test_transform = shape_transform(position, shape);

        self.brushes.iter().any(|brush| {
            mask.intersects(brush.contents)
                && matches!(
                    contact(
                        &test_transform,
                        test_shape.as_ref(),
                        &brush.transform,
                        brush.shape.as_ref(),
                        0.0,
                    ),
                    Ok(Some(_))
                )
        })
    }

    /// Push a shape out of solid geometry.
    ///
    /// Returns the corrected position. Runs a few passes so corners formed
    /// by two brushes resolve too.
    pub fn resolve_penetration(&self, position: Vec3, shape: TraceShape, mask: ContentFlags) -> Vec3 {
        let mut corrected = position;
        for _ in 0..MAX_DEPENETRATION_PASSES {
            let Some(pen) = self.deepest_penetration(corrected, shape, mask) else {
                break;
            };
            corrected += pen.normal * (pen.depth + PENETRATION_PULLBACK);
        }
        corrected
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    fn push_brush(&mut self, shape: SharedShape, transform: Isometry<Real>, contents: ContentFlags) -> SurfaceId {
        let id = self.next_id;
        self.next_id += 1;
        self.brushes.push(CollisionBrush {
            id,
            shape,
            transform,
            contents,
            surface: SurfaceFlags::NONE,
        });
        id
    }

    /// Binary search between a clear fraction and a blocked fraction.
    fn refine_hit(
        &self,
        start: Vec3,
        end: Vec3,
        shape: TraceShape,
        mask: ContentFlags,
        clear: f32,
        blocked: f32,
    ) -> HitResult {
        let delta = end - start;
        let mut lo = clear;
        let mut hi = blocked;

        for _ in 0..BINARY_SEARCH_ITERATIONS {
            let mid = (lo + hi) * 0.5;
            if self.point_in_solid(start + delta * mid, shape, mask) {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let location = start + delta * lo;
        let fallback = -delta.normalize_or_zero();

        match self.deepest_penetration(start + delta * hi, shape, mask) {
            Some(pen) => HitResult {
                blocking: true,
                time: lo,
                trace_start: start,
                trace_end: end,
                location,
                impact_point: pen.point,
                normal: pen.normal,
                impact_normal: pen.normal,
                start_penetrating: false,
                penetration_depth: 0.0,
                surface: Some(pen.surface),
                surface_flags: pen.flags,
            },
            None => HitResult {
                blocking: true,
                time: lo,
                trace_start: start,
                trace_end: end,
                location,
                impact_point: location,
                normal: fallback,
                impact_normal: fallback,
                start_penetrating: false,
                penetration_depth: 0.0,
                surface: None,
                surface_flags: SurfaceFlags::NONE,
            },
        }
    }

    fn deepest_penetration(&self, position: Vec3, shape: TraceShape, mask: ContentFlags) -> Option<Penetration> {
        let test_shape = create_parry_shape(shape);
        let test_transform = shape_transform(position, shape);

        let mut deepest: Option<Penetration> = None;
        for brush in &self.brushes {
            if !mask.intersects(brush.contents) {
                continue;
            }
            let Ok(Some(found)) = contact(
                &test_transform,
                test_shape.as_ref(),
                &brush.transform,
                brush.shape.as_ref(),
                0.0,
            ) else {
                continue;
            };

            let depth = (-found.dist).max(0.0);
            if deepest.as_ref().map_or(true, |d| depth > d.depth) {
                // normal2 points out of the brush, toward the query shape.
                let normal = Vec3::new(found.normal2.x, found.normal2.y, found.normal2.z);
                deepest = Some(Penetration {
                    depth,
                    normal,
                    point: Vec3::new(found.point2.x, found.point2.y, found.point2.z),
                    surface: brush.id,
                    flags: brush.surface,
                });
            }
        }
        deepest
    }

    fn ray_normal(&self, ray: &Ray, toi: f32, brush: &CollisionBrush) -> Option<Vec3> {
        brush
            .shape
            .cast_ray_and_get_normal(&brush.transform, ray, toi + 0.01, true)
            .map(|intersection| {
                Vec3::new(intersection.normal.x, intersection.normal.y, intersection.normal.z)
            })
    }
}

impl GeometryProbe for CollisionWorld {
    fn sweep(&self, start: Vec3, delta: Vec3, shape: TraceShape) -> HitResult {
        self.trace(start, start + delta, shape, ContentFlags::MASK_MOVEMENT)
    }

    fn probe(&self, start: Vec3, end: Vec3, shape: TraceShape) -> HitResult {
        self.trace(start, end, shape, ContentFlags::MASK_PROBE)
    }

    fn overlaps(&self, position: Vec3, shape: TraceShape) -> bool {
        self.point_in_solid(position, shape, ContentFlags::MASK_MOVEMENT)
    }

    fn depenetrate(&self, position: Vec3, shape: TraceShape) -> Vec3 {
        self.resolve_penetration(position, shape, ContentFlags::MASK_MOVEMENT)
    }
}

fn create_parry_shape(shape: TraceShape) -> SharedShape {
    match shape {
        TraceShape::Capsule { radius, height } => {
            // Parry capsules are defined by the half-height of the cylinder part.
            let cylinder_half_height = (height - 2.0 * radius).max(0.0) / 2.0;
            SharedShape::capsule_y(cylinder_half_height, radius)
        }
        TraceShape::Box { half_extents } => {
            SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }
        TraceShape::Point => SharedShape::ball(0.001),
    }
}

/// Positions sit at the bottom-centre of the shape.
fn shape_transform(position: Vec3, shape: TraceShape) -> Isometry<Real> {
    let center = position + shape.center_offset();
    Isometry::translation(center.x, center.y, center.z)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_world() -> CollisionWorld {
        let mut world = CollisionWorld::new();

        // Floor at y=0
        world.add_box(
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(50.0, 0.5, 50.0),
            ContentFlags::SOLID,
        );

        // Wall face at x=9.5
        world.add_box(
            Vec3::new(10.0, 2.5, 0.0),
            Vec3::new(0.5, 2.5, 10.0),
            ContentFlags::SOLID,
        );

        world
    }

    const CAPSULE: TraceShape = TraceShape::Capsule {
        radius: 0.4,
        height: 1.8,
    };

    #[test]
    fn test_raycast_hit() {
        let world = create_test_world();
        let hit = world.raycast(Vec3::new(0.0, 1.0, 0.0), Vec3::new(100.0, 1.0, 0.0), ContentFlags::SOLID);

        assert!(hit.blocking);
        assert!((hit.location.x - 9.5).abs() < 0.01);
        assert!((hit.impact_normal - Vec3::NEG_X).length() < 0.01);
        assert_eq!(hit.surface, Some(1));
    }

    #[test]
    fn test_raycast_miss() {
        let world = create_test_world();
        let hit = world.raycast(Vec3::new(0.0, 1.0, 0.0), Vec3::new(-100.0, 1.0, 0.0), ContentFlags::SOLID);

        assert!(!hit.blocking);
        assert_eq!(hit.time, 1.0);
    }

    #[test]
    fn test_sweep_capsule_stops_before_wall() {
        let world = create_test_world();
        let hit = world.sweep(Vec3::new(0.0, 0.1, 0.0), Vec3::new(15.0, 0.0, 0.0), CAPSULE);

        assert!(hit.is_valid_blocking_hit());
        // Capsule surface stops at the wall face.
        assert!((hit.location.x - 9.1).abs() < 0.01);
        assert!(hit.impact_normal.x < -0.99);
    }

    #[test]
    fn test_sweep_does_not_tunnel_through_thin_wall() {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(5.0, 1.0, 0.0), Vec3::new(0.02, 1.0, 5.0), ContentFlags::SOLID);

        // The end position is clear on the far side of the wall.
        let hit = world.sweep(Vec3::new(0.0, 0.1, 0.0), Vec3::new(10.0, 0.0, 0.0), CAPSULE);
        assert!(hit.blocking);
        assert!(hit.location.x < 5.0);
    }

    #[test]
    fn test_sweep_reports_start_penetration() {
        let world = create_test_world();
        let hit = world.sweep(Vec3::new(0.0, -0.2, 0.0), Vec3::X, CAPSULE);

        assert!(hit.start_penetrating);
        assert!(hit.penetration_depth > 0.1);
        assert!(hit.normal.y > 0.99);
    }

    #[test]
    fn test_depenetrate_pushes_out_of_floor() {
        let world = create_test_world();
        let fixed = world.depenetrate(Vec3::new(0.0, -0.2, 0.0), CAPSULE);

        assert!(fixed.y >= 0.0);
        assert!(!world.overlaps(fixed, CAPSULE));
    }

    #[test]
    fn test_find_floor_measures_gap() {
        let world = create_test_world();
        let floor = world.find_floor(Vec3::new(0.0, 0.02, 0.0), CAPSULE, 0.5, 0.69);

        assert!(floor.is_walkable_floor());
        assert!((floor.floor_distance - 0.02).abs() < 0.005);
    }

    #[test]
    fn test_content_mask_filtering() {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(5.0, 1.0, 0.0), Vec3::new(0.5, 1.0, 5.0), ContentFlags::SOLID);
        world.add_box(Vec3::new(3.0, 1.0, 0.0), Vec3::new(0.5, 1.0, 5.0), ContentFlags::PLAYER_CLIP);

        // Probes ignore player clip, sweeps do not.
        let probe = world.probe(Vec3::new(0.0, 1.0, 0.0), Vec3::new(10.0, 1.0, 0.0), TraceShape::Point);
        assert!((probe.location.x - 4.5).abs() < 0.01);

        let sweep = world.sweep(Vec3::new(0.0, 0.5, 0.0), Vec3::new(10.0, 0.0, 0.0), CAPSULE);
        assert!(sweep.location.x < 2.5);
    }

    #[test]
    fn test_surface_flags_reported_on_hit() {
        let mut world = create_test_world();
        world.set_surface_flags(1, SurfaceFlags::NO_WALL_RUN);

        let hit = world.probe(Vec3::new(0.0, 1.0, 0.0), Vec3::new(20.0, 1.0, 0.0), TraceShape::Point);
        assert!(hit.surface_flags.contains(SurfaceFlags::NO_WALL_RUN));
    }
}
