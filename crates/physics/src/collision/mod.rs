//! Geometry probe service.
//!
//! Movement runs against static geometry only, approximated as "sweep a
//! capsule and get the first blocking surface".
//!
//! # Key Types
//!
//! - [`GeometryProbe`]: the query interface the movement code consumes
//! - [`CollisionWorld`]: parry3d-backed brush world implementing it
//! - [`HitResult`] / [`FloorResult`]: query output
//! - [`TraceShape`]: capsule, box or ray

mod flags;
mod probe;
mod trace;
mod world;

pub use flags::{ContentFlags, SurfaceFlags};
pub use probe::{EmptyWorld, GeometryProbe, FLOOR_SEARCH_LIFT};
pub use trace::{FloorResult, HitResult, SurfaceId, TraceShape};
pub use world::{CollisionBrush, CollisionWorld};
