//! Headless session: one predicted client, one authority, one link.
//!
//! Each tick the client simulates local input, moves go out over the link,
//! the authority answers, and the client applies whatever arrived.

use glam::Vec3;
use log::info;
use vaultline_physics::{MovementController, MovementState};
use vaultline_protocol::{CodecError, NetMessage};

use crate::authority::{Authority, AuthorityStats};
use crate::client::{ClientStats, PredictedClient};
use crate::config::SessionConfig;
use crate::input::PlayerInput;
use crate::level::Course;
use crate::link::{Direction, LinkStats, LoopbackLink};

/// Summary of a run.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub ticks: u64,
    pub client: ClientStats,
    pub authority: AuthorityStats,
    pub link: LinkStats,
    pub client_position: Vec3,
    pub authority_position: Vec3,
    pub checkpoints_reached: usize,
}

impl SessionReport {
    /// Distance between the predicted and authoritative positions.
    pub fn divergence(&self) -> f32 {
        self.client_position.distance(self.authority_position)
    }
}

/// Client and authority ticking together over a loopback link.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    course: Course,
    client: PredictedClient,
    authority: Authority,
    link: LoopbackLink,
    yaw: f32,
    tick: u64,
}

impl Session {
    /// Create a session with both sides spawned at the course's first spawn point.
    pub fn new(config: SessionConfig, course: Course) -> Self {
        let spawn = course.spawn_point(0);
        let position = spawn.map(|s| s.position).unwrap_or(Vec3::ZERO);
        let yaw = spawn.map(|s| s.facing).unwrap_or(0.0);

        let controller = MovementController::new(config.movement.clone());
        let mut client = PredictedClient::new(controller.clone(), config.network.clone());
        let mut authority = Authority::new(controller, config.network.clone());
        client.spawn_at(position, yaw, &course.collision);
        authority.spawn_at(position, yaw, &course.collision);

        let link = LoopbackLink::new(config.latency_ticks, config.drop_every);

        Self {
            config,
            course,
            client,
            authority,
            link,
            yaw,
            tick: 0,
        }
    }

    pub fn client(&self) -> &PredictedClient {
        &self.client
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn client_state(&self) -> &MovementState {
        self.client.state()
    }

    /// Advance the session by one tick.
    pub fn tick(&mut self, input: &PlayerInput) -> Result<(), CodecError> {
        self.yaw += input.yaw_delta(self.config.mouse_sensitivity);
        let move_input = input.to_move_input(self.yaw);

        let sent = self
            .client
            .tick(&move_input, self.config.delta_time(), &self.course.collision);
        if let Some(message) = sent {
            self.link.send(Direction::ToAuthority, &NetMessage::Move(message))?;
        }

        self.exchange()?;

        let position = self.client.state().position;
        for id in self.course.check_checkpoints(position) {
            info!("checkpoint {id} reached at tick {} ({position:?})", self.tick);
        }

        self.tick += 1;
        Ok(())
    }

    /// Send the pending move and let the link empty without new input.
    pub fn settle(&mut self) -> Result<(), CodecError> {
        if let Some(message) = self.client.flush() {
            self.link.send(Direction::ToAuthority, &NetMessage::Move(message))?;
        }

        // Each round trip needs two latencies; corrections can trigger one more.
        let limit = 4 * (u64::from(self.config.latency_ticks) + 1);
        for _ in 0..limit {
            self.exchange()?;
            if self.link.in_flight() == 0 {
                break;
            }
        }
        Ok(())
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            ticks: self.tick,
            client: self.client.stats(),
            authority: self.authority.stats(),
            link: self.link.stats(),
            client_position: self.client.state().position,
            authority_position: self.authority.state().position,
            checkpoints_reached: self.course.reached_count(),
        }
    }

    /// Deliver due frames both ways, then advance link time.
    fn exchange(&mut self) -> Result<(), CodecError> {
        let world = &self.course.collision;

        for message in self.link.receive(Direction::ToAuthority) {
            if let NetMessage::Move(m) = message {
                if let Some(reply) = self.authority.receive(&m, world) {
                    self.link.send(Direction::ToClient, &reply)?;
                }
            }
        }

        for message in self.link.receive(Direction::ToClient) {
            self.client.receive(message, world);
        }

        self.link.advance();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk_forward() -> PlayerInput {
        let mut input = PlayerInput::default();
        input.movement.forward = true;
        input
    }

    #[test]
    fn test_session_spawns_both_sides_together() {
        let session = Session::new(SessionConfig::default(), Course::flat_arena());
        assert_eq!(session.client_state(), session.authority().state());
        assert!(session.client_state().is_moving_on_ground());
    }

    #[test]
    fn test_session_tick_moves_client() {
        let mut session = Session::new(SessionConfig::default(), Course::flat_arena());
        for _ in 0..30 {
            session.tick(&walk_forward()).unwrap();
        }
        session.settle().unwrap();

        let report = session.report();
        assert_eq!(report.ticks, 30);
        assert!(report.client_position.x > 1.0);
        assert!(report.authority.acks > 0);
        assert_eq!(report.client.corrections, 0);
        assert_eq!(report.divergence(), 0.0);
    }

    #[test]
    fn test_mouse_turns_facing() {
        let mut session = Session::new(SessionConfig::default(), Course::flat_arena());
        let input = PlayerInput {
            mouse_delta_x: 50.0,
            ..Default::default()
        };
        session.tick(&input).unwrap();
        assert!((session.yaw() - 0.1).abs() < 1.0e-6);
    }
}
