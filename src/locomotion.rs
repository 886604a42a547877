//! The per-step traversal state machine: ability transitions, jumps, mode resolution and
//! the velocity shaping of the resolved mode. Collision and integration live in `kcc`.

use bevy_time::Stopwatch;
use core::time::Duration;
use tracing::trace;

use crate::{
    CharacterControllerState, LocomotionMode, climb,
    detection::{Orientation, Probes},
    input::AccumulatedInput,
    ledge,
    motor::{apply_drag, apply_force, apply_impulse, clamp_flat_speed},
    prelude::*,
    slide, wall_run,
};

/// Optional abilities present on the character.
#[derive(Clone, Default, Debug)]
pub(crate) struct Abilities {
    pub(crate) slide: Option<Sliding>,
    pub(crate) wall_run: Option<WallRunning>,
    pub(crate) climb: Option<Climbing>,
    pub(crate) ledge: Option<LedgeGrabbing>,
}

#[derive(Debug)]
pub(crate) struct Ctx {
    pub(crate) orientation: Orientation,
    pub(crate) cfg: CharacterController,
    pub(crate) abilities: Abilities,
    pub(crate) dt: f32,
    pub(crate) dt_duration: Duration,
}

/// Runs one step of the state machine and shapes `velocity` for the resulting mode.
pub(crate) fn update(
    velocity: &mut Vec3,
    input: &mut AccumulatedInput,
    state: &mut CharacterControllerState,
    probes: &Probes,
    ctx: &Ctx,
) {
    // Ledges go first so that hanging suppresses climbing in the same step,
    // and each kind of jump gets a chance to consume the press before the ground jump.
    if let Some(cfg) = &ctx.abilities.ledge {
        ledge::update(velocity, input, state, probes, cfg, ctx);
    }
    if let Some(cfg) = &ctx.abilities.climb {
        climb::update(velocity, input, state, probes, cfg, ctx);
    }
    if let Some(cfg) = &ctx.abilities.wall_run {
        wall_run::update(velocity, input, state, probes, cfg, ctx);
    }
    if let Some(cfg) = &ctx.abilities.slide {
        slide::update(velocity, input, state, cfg, ctx);
    }
    handle_jump(velocity, input, state, ctx);

    state.mode = resolve_mode(state, input);
    if let Some(speed) = mode_speed(state.mode, &ctx.cfg) {
        state.move_speed = speed;
    }
    shape_velocity(velocity, input, state, probes, ctx);
}

pub(crate) fn resolve_mode(
    state: &CharacterControllerState,
    input: &AccumulatedInput,
) -> LocomotionMode {
    if state.ledge.is_holding() {
        LocomotionMode::LedgeHold
    } else if state.climb.climbing {
        LocomotionMode::Climbing
    } else if state.wall_run.is_running() {
        LocomotionMode::WallRunning
    } else if state.slide.is_sliding() {
        LocomotionMode::Sliding
    } else if state.grounded.is_none() {
        LocomotionMode::Airborne
    } else if state.crouching {
        LocomotionMode::Crouching
    } else if input.sprinting {
        LocomotionMode::Sprinting
    } else {
        LocomotionMode::Walking
    }
}

/// The flat speed cap a ground mode sets. Other modes keep the previous one.
fn mode_speed(mode: LocomotionMode, cfg: &CharacterController) -> Option<f32> {
    match mode {
        LocomotionMode::Walking => Some(cfg.walk_speed),
        LocomotionMode::Sprinting => Some(cfg.sprint_speed),
        LocomotionMode::Crouching => Some(cfg.crouch_speed),
        _ => None,
    }
}

pub(crate) fn gravity_scale(state: &CharacterControllerState, ctx: &Ctx) -> f32 {
    match state.mode {
        LocomotionMode::LedgeHold | LocomotionMode::Climbing => 0.0,
        LocomotionMode::WallRunning => ctx
            .abilities
            .wall_run
            .as_ref()
            .map_or(1.0, |wall_run| wall_run.gravity_scale),
        _ => 1.0,
    }
}

fn shape_velocity(
    velocity: &mut Vec3,
    input: &AccumulatedInput,
    state: &CharacterControllerState,
    probes: &Probes,
    ctx: &Ctx,
) {
    let abilities = &ctx.abilities;
    match state.mode {
        LocomotionMode::LedgeHold => {
            if let Some(cfg) = &abilities.ledge {
                ledge::hold(velocity, state, probes, cfg, ctx);
            }
        }
        LocomotionMode::Sliding => {
            if let Some(cfg) = &abilities.slide {
                slide::apply(velocity, input, cfg, ctx);
            }
        }
        LocomotionMode::Climbing => {
            base_movement(velocity, input, state, ctx);
            if let Some(cfg) = &abilities.climb {
                climb::apply(velocity, cfg);
            }
        }
        LocomotionMode::WallRunning => {
            base_movement(velocity, input, state, ctx);
            if let Some(cfg) = &abilities.wall_run {
                wall_run::apply(velocity, input, state, cfg, ctx);
            }
        }
        LocomotionMode::Walking
        | LocomotionMode::Sprinting
        | LocomotionMode::Crouching
        | LocomotionMode::Airborne => base_movement(velocity, input, state, ctx),
    }
}

/// Pushes towards the input direction, damps on the ground and caps the flat speed.
fn base_movement(
    velocity: &mut Vec3,
    input: &AccumulatedInput,
    state: &CharacterControllerState,
    ctx: &Ctx,
) {
    let cfg = &ctx.cfg;
    if !state.is_restricted() {
        let wish_dir = ctx.orientation.wish_dir(input.movement());
        let mut force = wish_dir * state.move_speed * cfg.move_force_scale;
        if state.mode == LocomotionMode::Airborne {
            force *= cfg.air_multiplier;
        }
        apply_force(velocity, force, cfg.mass, ctx.dt);
    }

    if state.mode.is_grounded() {
        apply_drag(velocity, cfg.ground_drag, ctx.dt);
    }

    let cap = match (state.mode, &ctx.abilities.wall_run) {
        (LocomotionMode::WallRunning, Some(wall_run)) => wall_run.wall_run_speed,
        _ => state.move_speed,
    };
    clamp_flat_speed(velocity, cap);
}

fn handle_jump(
    velocity: &mut Vec3,
    input: &mut AccumulatedInput,
    state: &mut CharacterControllerState,
    ctx: &Ctx,
) {
    let cfg = &ctx.cfg;
    if !input.has_jump(cfg.jump_input_buffer) {
        return;
    }
    if state.grounded.is_none() && state.last_ground.elapsed() > cfg.coyote_time {
        trace!("jump pressed but not grounded");
        return;
    }
    if state
        .last_jump
        .as_ref()
        .is_some_and(|last_jump| last_jump.elapsed() < cfg.jump_cooldown)
    {
        trace!("jump pressed but not ready");
        return;
    }

    input.take_jump(cfg.jump_input_buffer);
    state.grounded = None;
    state.last_ground.set_elapsed(cfg.coyote_time);
    state.last_jump = Some(Stopwatch::new());
    // walking into a wall starts a climb, which would swallow the jump
    state.climb.exit();

    velocity.y = 0.0;
    apply_impulse(velocity, Vec3::Y * cfg.jump_force, cfg.mass);
}
