//! Courses: collision geometry, spawn points and checkpoints.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use vaultline_physics::{CollisionWorld, ContentFlags, SurfaceFlags};

/// A course containing collision geometry and spawn points.
#[derive(Debug)]
pub struct Course {
    /// Course identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Collision world for physics.
    pub collision: CollisionWorld,

    /// Player spawn points.
    pub spawn_points: Vec<SpawnPoint>,

    /// Checkpoint volumes along the route.
    pub checkpoints: Vec<Checkpoint>,
}

/// A spawn point for the player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Position in world space.
    pub position: Vec3,

    /// Initial facing direction (yaw in radians).
    pub facing: f32,
}

/// A box that records when the player first passes through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Center position.
    pub position: Vec3,

    /// Half-extents of the box.
    pub half_extents: Vec3,

    /// Checkpoint identifier.
    pub id: String,

    /// Whether the player has reached this checkpoint.
    pub reached: bool,
}

impl Checkpoint {
    pub fn contains(&self, point: Vec3) -> bool {
        let min = self.position - self.half_extents;
        let max = self.position + self.half_extents;
        point.cmpge(min).all() && point.cmple(max).all()
    }
}

impl Course {
    /// Create an empty course.
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            collision: CollisionWorld::new(),
            spawn_points: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    /// A flat floor enclosed by walls that allow no wall actions.
    pub fn flat_arena() -> Self {
        let mut course = Self::new("flat_arena", "Flat Arena");
        course.add_floor_and_boundary(50.0);

        course.spawn_points.push(SpawnPoint {
            position: Vec3::new(0.0, 0.0, 0.0),
            facing: 0.0,
        });

        course
    }

    /// A route exercising every movement mode, running along +X.
    ///
    /// Start, run up to a climbable wall with a ledge, mantle onto a
    /// platform, drop off into a corridor with a side wall for wall running,
    /// then a pair of facing walls for wall jumps.
    pub fn parkour() -> Self {
        let mut course = Self::new("parkour", "Parkour Route");
        course.add_floor_and_boundary(60.0);

        // Climb wall. Front face at x=12, top at 1.8 m, deep enough to stand on.
        course.collision.add_box(
            Vec3::new(15.0, 0.9, 0.0),
            Vec3::new(3.0, 0.9, 4.0),
            ContentFlags::SOLID,
        );

        // Step down from the platform.
        course.collision.add_box(
            Vec3::new(18.5, 0.2, 0.0),
            Vec3::new(0.5, 0.2, 4.0),
            ContentFlags::SOLID,
        );

        // Wall-run wall on the right-hand side of the corridor.
        course.collision.add_box(
            Vec3::new(32.0, 3.0, 2.5),
            Vec3::new(10.0, 3.0, 0.5),
            ContentFlags::SOLID,
        );

        // Slick ramp at the end of the corridor.
        let ramp = course.collision.add_rotated_box(
            Vec3::new(44.0, 0.0, 0.0),
            Vec3::new(3.0, 0.5, 2.0),
            Quat::from_rotation_z(0.2),
            ContentFlags::SOLID,
        );
        course.collision.set_surface_flags(ramp, SurfaceFlags::SLICK);

        // Wall-jump shaft: two walls facing each other across z.
        for z in [-6.0, -10.0] {
            course.collision.add_box(
                Vec3::new(30.0, 5.0, z),
                Vec3::new(4.0, 5.0, 0.5),
                ContentFlags::SOLID,
            );
        }

        course.spawn_points.push(SpawnPoint {
            position: Vec3::new(0.0, 0.0, 0.0),
            facing: 0.0,
        });
        course.spawn_points.push(SpawnPoint {
            position: Vec3::new(30.0, 0.0, -8.0),
            facing: std::f32::consts::FRAC_PI_2,
        });

        course.checkpoints.push(Checkpoint {
            position: Vec3::new(15.0, 2.8, 0.0),
            half_extents: Vec3::new(3.0, 1.0, 4.0),
            id: "platform".to_string(),
            reached: false,
        });
        course.checkpoints.push(Checkpoint {
            position: Vec3::new(32.0, 2.0, 1.0),
            half_extents: Vec3::new(10.0, 2.0, 1.0),
            id: "corridor".to_string(),
            reached: false,
        });

        course
    }

    fn add_floor_and_boundary(&mut self, half_size: f32) {
        self.collision.add_box(
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(half_size, 0.5, half_size),
            ContentFlags::SOLID,
        );

        let wall_height = 5.0;
        let wall_thickness = 0.5;
        let walls = [
            (Vec3::new(0.0, wall_height / 2.0, -half_size), Vec3::new(half_size, wall_height / 2.0, wall_thickness)),
            (Vec3::new(0.0, wall_height / 2.0, half_size), Vec3::new(half_size, wall_height / 2.0, wall_thickness)),
            (Vec3::new(half_size, wall_height / 2.0, 0.0), Vec3::new(wall_thickness, wall_height / 2.0, half_size)),
            (Vec3::new(-half_size, wall_height / 2.0, 0.0), Vec3::new(wall_thickness, wall_height / 2.0, half_size)),
        ];
        for (center, half_extents) in walls {
            let id = self.collision.add_box(center, half_extents, ContentFlags::SOLID);
            self.collision.set_surface_flags(id, SurfaceFlags::NO_WALL_ACTIONS);
        }
    }

    /// Get a player spawn point.
    pub fn spawn_point(&self, index: usize) -> Option<&SpawnPoint> {
        self.spawn_points.get(index)
    }

    pub fn spawn_count(&self) -> usize {
        self.spawn_points.len()
    }

    /// Mark checkpoints containing `position` as reached, returning the ids
    /// reached for the first time.
    pub fn check_checkpoints(&mut self, position: Vec3) -> Vec<String> {
        let mut reached = Vec::new();

        for checkpoint in &mut self.checkpoints {
            if !checkpoint.reached && checkpoint.contains(position) {
                checkpoint.reached = true;
                reached.push(checkpoint.id.clone());
            }
        }

        reached
    }

    pub fn reached_count(&self) -> usize {
        self.checkpoints.iter().filter(|c| c.reached).count()
    }
}
