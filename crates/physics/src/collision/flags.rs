//! Content and surface flags for collision filtering.
//!
//! Content flags decide which brushes a query can hit. Surface flags carry
//! per-brush movement properties that the wall and ledge predicates honour.

use serde::{Deserialize, Serialize};

/// What kind of volume a brush is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContentFlags(pub u32);

impl ContentFlags {
    /// Empty space.
    pub const EMPTY: Self = Self(0);

    /// Solid world geometry: walls, floors, ledges.
    pub const SOLID: Self = Self(1 << 0);

    /// Invisible blocker that stops characters but is ignored by probes
    /// looking for climbable walls.
    pub const PLAYER_CLIP: Self = Self(1 << 1);

    /// Trigger volume, never blocks movement.
    pub const TRIGGER: Self = Self(1 << 2);

    /// Mask used by capsule sweeps and floor searches.
    pub const MASK_MOVEMENT: Self = Self(Self::SOLID.0 | Self::PLAYER_CLIP.0);

    /// Mask used by wall and ledge probes.
    pub const MASK_PROBE: Self = Self::SOLID;

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any of the given flags are set.
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }
}

impl std::ops::BitOr for ContentFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Movement properties of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SurfaceFlags(pub u32);

impl SurfaceFlags {
    /// No special properties.
    pub const NONE: Self = Self(0);

    /// Slippery floor, ground friction is scaled down.
    pub const SLICK: Self = Self(1 << 0);

    /// Wall jumps may not use this surface.
    pub const NO_WALL_JUMP: Self = Self(1 << 1);

    /// Wall climbing may not start on this surface.
    pub const NO_WALL_CLIMB: Self = Self(1 << 2);

    /// Wall running may not latch onto this surface.
    pub const NO_WALL_RUN: Self = Self(1 << 3);

    /// Ledges on top of this surface cannot be mantled.
    pub const NO_MANTLE: Self = Self(1 << 4);

    /// Every wall interaction disabled.
    pub const NO_WALL_ACTIONS: Self = Self(
        Self::NO_WALL_JUMP.0 | Self::NO_WALL_CLIMB.0 | Self::NO_WALL_RUN.0 | Self::NO_MANTLE.0,
    );

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for SurfaceFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
