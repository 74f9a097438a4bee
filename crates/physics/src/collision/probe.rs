//! The query interface movement code runs against.

use glam::Vec3;

use super::trace::{FloorResult, HitResult, TraceShape};

/// Lift applied before a floor search so a shape resting on the floor does
/// not start the sweep already touching it.
pub const FLOOR_SEARCH_LIFT: f32 = 0.01;

/// Geometry queries consumed by the movement simulation.
///
/// All queries are pure: no state, no failure. A world with nothing in it
/// answers "no hit" to everything.
pub trait GeometryProbe {
    /// Sweep `shape` from `start` by `delta` against geometry that blocks
    /// movement.
    fn sweep(&self, start: Vec3, delta: Vec3, shape: TraceShape) -> HitResult;

    /// Query between two points against geometry that wall and ledge
    /// detection may use. A [`TraceShape::Point`] shape casts a ray.
    fn probe(&self, start: Vec3, end: Vec3, shape: TraceShape) -> HitResult;

    /// Whether `shape` at `position` overlaps blocking geometry.
    fn overlaps(&self, position: Vec3, shape: TraceShape) -> bool;

    /// Push `shape` out of blocking geometry, returning the fixed position.
    fn depenetrate(&self, position: Vec3, shape: TraceShape) -> Vec3;

    /// Search below `position` for a floor within `max_distance`.
    fn find_floor(
        &self,
        position: Vec3,
        shape: TraceShape,
        max_distance: f32,
        walkable_floor_y: f32,
    ) -> FloorResult {
        let start = position + Vec3::Y * FLOOR_SEARCH_LIFT;
        let hit = self.sweep(start, Vec3::NEG_Y * (max_distance + FLOOR_SEARCH_LIFT), shape);

        if !hit.blocking {
            return FloorResult {
                hit,
                ..FloorResult::default()
            };
        }

        if hit.start_penetrating {
            return FloorResult {
                blocking: true,
                walkable: hit.impact_normal.y >= walkable_floor_y,
                floor_distance: 0.0,
                hit,
            };
        }

        FloorResult {
            blocking: true,
            walkable: hit.impact_normal.y >= walkable_floor_y,
            floor_distance: (start.y - hit.location.y) - FLOOR_SEARCH_LIFT,
            hit,
        }
    }
}

impl<T: GeometryProbe + ?Sized> GeometryProbe for &T {
    fn sweep(&self, start: Vec3, delta: Vec3, shape: TraceShape) -> HitResult {
        (**self).sweep(start, delta, shape)
    }

    fn probe(&self, start: Vec3, end: Vec3, shape: TraceShape) -> HitResult {
        (**self).probe(start, end, shape)
    }

    fn overlaps(&self, position: Vec3, shape: TraceShape) -> bool {
        (**self).overlaps(position, shape)
    }

    fn depenetrate(&self, position: Vec3, shape: TraceShape) -> Vec3 {
        (**self).depenetrate(position, shape)
    }

    fn find_floor(
        &self,
        position: Vec3,
        shape: TraceShape,
        max_distance: f32,
        walkable_floor_y: f32,
    ) -> FloorResult {
        (**self).find_floor(position, shape, max_distance, walkable_floor_y)
    }
}

/// A world with no geometry. Every query misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyWorld;

impl GeometryProbe for EmptyWorld {
    fn sweep(&self, start: Vec3, delta: Vec3, _shape: TraceShape) -> HitResult {
        HitResult::miss(start, start + delta)
    }

    fn probe(&self, start: Vec3, end: Vec3, _shape: TraceShape) -> HitResult {
        HitResult::miss(start, end)
    }

    fn overlaps(&self, _position: Vec3, _shape: TraceShape) -> bool {
        false
    }

    fn depenetrate(&self, position: Vec3, _shape: TraceShape) -> Vec3 {
        position
    }
}
