//! Wall-running along vertical surfaces to the character's side, and kicking off them.

use bevy_time::Stopwatch;
use core::time::Duration;
use tracing::debug;

use crate::{
    CharacterControllerState,
    detection::{Probes, WallHit, wall_forward},
    input::AccumulatedInput,
    locomotion::Ctx,
    motor::{apply_force, apply_impulse},
    prelude::*,
};

/// Lets the character run along walls while airborne and holding forward.
///
/// While running, [`Sprint`](crate::input::Sprint) runs upwards and
/// [`Crouch`](crate::input::Crouch) runs downwards.
#[derive(Component, Clone, Reflect, Debug)]
#[reflect(Component)]
pub struct WallRunning {
    pub wall_run_force: f32,
    /// Force pressing the character into the wall.
    pub wall_stick_force: f32,
    pub wall_run_speed: f32,
    pub jump_up_force: f32,
    pub jump_side_force: f32,
    pub max_wall_run_time: Duration,
    pub wall_climb_speed: f32,
    pub wall_check_distance: f32,
    /// Clearance below the character needed to start a run.
    pub min_jump_height: f32,
    pub exit_wall_time: Duration,
    /// Gravity applied while running, 0 sticks to the wall's height.
    pub gravity_scale: f32,
}

impl Default for WallRunning {
    fn default() -> Self {
        Self {
            wall_run_force: 200.0,
            wall_stick_force: 100.0,
            wall_run_speed: 12.0,
            jump_up_force: 7.0,
            jump_side_force: 7.0,
            max_wall_run_time: Duration::from_secs(1),
            wall_climb_speed: 3.0,
            wall_check_distance: 0.7,
            min_jump_height: 1.5,
            exit_wall_time: Duration::from_millis(200),
            gravity_scale: 0.0,
        }
    }
}

impl WallRunning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::ensure_positive("wall_run_speed", self.wall_run_speed)?;
        ConfigError::ensure_positive("wall_check_distance", self.wall_check_distance)
    }
}

#[derive(Clone, Reflect, Default, Debug)]
pub struct WallRunState {
    /// Time spent on the current wall.
    pub running: Option<Stopwatch>,
    pub wall: Option<Entity>,
    pub wall_normal: Vec3,
    /// Time since leaving the wall. No new run starts until it is cleared.
    pub exiting: Option<Stopwatch>,
}

impl WallRunState {
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting.is_some()
    }

    fn current_wall(&self) -> Option<WallHit> {
        self.wall.map(|entity| WallHit {
            entity,
            normal: self.wall_normal,
        })
    }

    fn stop(&mut self) {
        if self.running.take().is_some() {
            debug!("wall run stopped");
        }
    }

    fn exit(&mut self) {
        self.stop();
        self.exiting = Some(Stopwatch::new());
    }
}

pub(crate) fn update(
    velocity: &mut Vec3,
    input: &mut AccumulatedInput,
    state: &mut CharacterControllerState,
    probes: &Probes,
    cfg: &WallRunning,
    ctx: &Ctx,
) {
    let run = &mut state.wall_run;
    let wall = probes.side_wall(run.current_wall());

    if let Some(wall) = wall
        && input.forward() > 0.0
        && probes.above_ground
        && !run.is_exiting()
    {
        if !run.is_running() {
            run.running = Some(Stopwatch::new());
            velocity.y = 0.0;
            debug!("wall run started on {}", wall.entity);
        }
        run.wall = Some(wall.entity);
        run.wall_normal = wall.normal;

        let elapsed = run
            .running
            .as_mut()
            .map(|running| running.tick(ctx.dt_duration).elapsed())
            .unwrap_or_default();
        if elapsed >= cfg.max_wall_run_time {
            run.exit();
        } else if input.take_jump(ctx.cfg.jump_input_buffer) {
            run.exit();
            velocity.y = 0.0;
            apply_impulse(
                velocity,
                Vec3::Y * cfg.jump_up_force + wall.normal * cfg.jump_side_force,
                ctx.cfg.mass,
            );
            debug!("wall jump off {}", wall.entity);
        }
    } else if let Some(exiting) = run.exiting.as_mut() {
        let done = exiting.tick(ctx.dt_duration).elapsed() >= cfg.exit_wall_time;
        run.stop();
        if done {
            run.exiting = None;
        }
    } else {
        run.stop();
    }
}

/// Carries the character along the wall and handles running up or down it.
pub(crate) fn apply(
    velocity: &mut Vec3,
    input: &AccumulatedInput,
    state: &CharacterControllerState,
    cfg: &WallRunning,
    ctx: &Ctx,
) {
    let normal = state.wall_run.wall_normal;
    let along = wall_forward(normal, ctx.orientation.forward);
    apply_force(velocity, along * cfg.wall_run_force, ctx.cfg.mass, ctx.dt);
    apply_force(velocity, -normal * cfg.wall_stick_force, ctx.cfg.mass, ctx.dt);

    if input.sprinting {
        velocity.y = cfg.wall_climb_speed;
    }
    if input.crouched {
        velocity.y = -cfg.wall_climb_speed;
    }
}
