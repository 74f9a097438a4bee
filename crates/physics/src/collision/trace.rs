//! Hit results and shapes for geometry queries.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::flags::SurfaceFlags;

/// Stable identifier of a brush in a collision world.
pub type SurfaceId = u32;

/// Result of a sweep or probe through the world.
///
/// Sweeps move a shape from `trace_start` toward `trace_end` and report the
/// first blocking surface along the way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    /// Whether a blocking surface was hit.
    pub blocking: bool,

    /// Fraction of the requested motion completed before the hit.
    ///
    /// - `1.0` = travelled the full distance
    /// - `0.0` = blocked at the start
    pub time: f32,

    pub trace_start: Vec3,
    pub trace_end: Vec3,

    /// Where the shape ended up (bottom-centre for capsules).
    pub location: Vec3,

    /// Contact point on the surface that was hit.
    pub impact_point: Vec3,

    /// Direction the shape is pushed away from the surface.
    pub normal: Vec3,

    /// Normal of the surface itself at the impact point.
    pub impact_normal: Vec3,

    /// The query started overlapping geometry.
    ///
    /// Movement code should depenetrate when this is set.
    pub start_penetrating: bool,

    /// Overlap depth at the start when `start_penetrating` is set.
    pub penetration_depth: f32,

    /// Brush that was hit.
    pub surface: Option<SurfaceId>,

    pub surface_flags: SurfaceFlags,
}

impl Default for HitResult {
    fn default() -> Self {
        Self::miss(Vec3::ZERO, Vec3::ZERO)
    }
}

impl HitResult {
    /// A query that travelled the whole way without touching anything.
    pub fn miss(start: Vec3, end: Vec3) -> Self {
        Self {
            blocking: false,
            time: 1.0,
            trace_start: start,
            trace_end: end,
            location: end,
            impact_point: end,
            normal: Vec3::ZERO,
            impact_normal: Vec3::ZERO,
            start_penetrating: false,
            penetration_depth: 0.0,
            surface: None,
            surface_flags: SurfaceFlags::NONE,
        }
    }

    /// Blocking hit that did not start inside geometry.
    #[inline]
    pub fn is_valid_blocking_hit(&self) -> bool {
        self.blocking && !self.start_penetrating
    }

    /// Distance travelled before the hit.
    #[inline]
    pub fn distance(&self) -> f32 {
        (self.trace_end - self.trace_start).length() * self.time
    }
}

/// Result of a downward floor search.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FloorResult {
    /// Something was found below within the search distance.
    pub blocking: bool,

    /// The surface found is flat enough to stand on.
    pub walkable: bool,

    /// Gap between the bottom of the shape and the floor.
    pub floor_distance: f32,

    pub hit: HitResult,
}

impl FloorResult {
    #[inline]
    pub fn is_walkable_floor(&self) -> bool {
        self.blocking && self.walkable
    }
}

/// Shape used for geometry queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TraceShape {
    /// A vertical capsule whose position is the bottom of its lower cap.
    Capsule {
        radius: f32,
        /// Total height from bottom of lower cap to top of upper cap.
        height: f32,
    },

    /// An axis-aligned box resting on its position.
    Box { half_extents: Vec3 },

    /// A ray.
    Point,
}

impl TraceShape {
    pub fn capsule(radius: f32, height: f32) -> Self {
        Self::Capsule {
            radius,
            height: height.max(radius * 2.0),
        }
    }

    pub fn radius(&self) -> f32 {
        match self {
            Self::Capsule { radius, .. } => *radius,
            Self::Box { half_extents } => half_extents.x.max(half_extents.z),
            Self::Point => 0.0,
        }
    }

    pub fn height(&self) -> f32 {
        match self {
            Self::Capsule { height, .. } => *height,
            Self::Box { half_extents } => half_extents.y * 2.0,
            Self::Point => 0.0,
        }
    }

    /// Offset from the shape's position to its centre.
    pub fn center_offset(&self) -> Vec3 {
        Vec3::Y * (self.height() * 0.5)
    }

    /// Smallest half-extent, bounds the distance a sweep may skip.
    pub fn min_extent(&self) -> f32 {
        match self {
            Self::Capsule { radius, .. } => *radius,
            Self::Box { half_extents } => half_extents.min_element(),
            Self::Point => 0.0,
        }
    }

    #[inline]
    pub fn is_point(&self) -> bool {
        matches!(self, Self::Point)
    }
}
