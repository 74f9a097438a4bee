//! Vaultline - headless run
//!
//! Drives a predicted client through the parkour course against an
//! authoritative simulation over a delayed link, then logs how the run went.
//!
//! Usage: `vaultline [session.toml]`

use std::path::Path;

use anyhow::Context;
use log::info;
use vaultline_game::input::{ActionInput, MovementInput};
use vaultline_game::{Course, InputScript, PlayerInput, Session, SessionConfig};
use vaultline_physics::MovementMode;
use vaultline_protocol::PROTOCOL_VERSION;

fn load_config(path: Option<&Path>) -> anyhow::Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn hold(movement: MovementInput, actions: ActionInput, mouse_delta_x: f32) -> PlayerInput {
    PlayerInput {
        movement,
        mouse_delta_x,
        actions,
        frame: 0,
    }
}

/// Run at the climb wall, mantle up, drop into the corridor and wall run
/// along its right-hand wall.
fn route() -> InputScript {
    let forward = MovementInput {
        forward: true,
        ..Default::default()
    };
    let forward_right = MovementInput {
        forward: true,
        right: true,
        ..Default::default()
    };
    let sprint = ActionInput {
        sprint: true,
        ..Default::default()
    };
    let mantle = ActionInput {
        mantle: true,
        ..Default::default()
    };
    let jump = ActionInput {
        jump: true,
        ..Default::default()
    };

    InputScript::new()
        .hold(70, hold(forward, sprint, 0.0))
        .hold(150, hold(forward, mantle, 0.0))
        .hold(60, hold(forward, sprint, 0.0))
        .hold(8, hold(forward_right, jump, 0.0))
        .hold(120, hold(forward_right, sprint, 0.0))
        .hold(30, hold(forward, ActionInput::default(), 0.0))
        .idle(60)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args().nth(1);
    let config = load_config(path.as_deref().map(Path::new))?;
    info!(
        "protocol v{PROTOCOL_VERSION}, {} Hz, latency {} ticks, drop every {:?}",
        config.tick_rate, config.latency_ticks, config.drop_every
    );

    let mut session = Session::new(config, Course::parkour());
    let mut ticks_in_mode = [0u32; MovementMode::COUNT];
    let mut last_mode = session.client_state().mode();

    for input in route().frames() {
        session.tick(&input).context("link codec failed")?;
        let mode = session.client_state().mode();
        ticks_in_mode[mode.index() as usize] += 1;
        if mode != last_mode {
            info!(
                "frame {}: {:?} -> {:?} at {:?}, speed {:.2}",
                input.frame,
                last_mode,
                mode,
                session.client_state().position,
                session.client_state().current_speed()
            );
            last_mode = mode;
        }
    }
    session.settle().context("link codec failed")?;

    let report = session.report();
    for mode in MovementMode::ALL {
        let ticks = ticks_in_mode[mode.index() as usize];
        if ticks > 0 {
            info!("{mode:?}: {ticks} ticks");
        }
    }
    info!(
        "{} ticks, {} moves sent ({} combined), {} acks, {} corrections, {} frames dropped, {} bytes",
        report.ticks,
        report.client.moves_sent,
        report.client.moves_combined,
        report.authority.acks,
        report.client.corrections,
        report.link.frames_dropped,
        report.link.bytes_sent
    );
    info!(
        "checkpoints {}/{}, final divergence {:.4} m",
        report.checkpoints_reached,
        session.course().checkpoints.len(),
        report.divergence()
    );

    Ok(())
}
