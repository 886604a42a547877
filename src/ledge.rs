//! Grabbing [`Ledge`](crate::Ledge)s in front of the camera, hanging on them and jumping off.

use bevy_time::Stopwatch;
use core::time::Duration;
use tracing::debug;

use crate::{
    CharacterControllerState,
    detection::Probes,
    input::AccumulatedInput,
    locomotion::Ctx,
    motor::apply_impulse,
    prelude::*,
};

/// Scales [`LedgeGrabbing::move_to_ledge_speed`] into a per-second velocity change.
const PULL_GAIN: f32 = 50.0;

#[derive(Component, Clone, Reflect, Debug)]
#[reflect(Component)]
pub struct LedgeGrabbing {
    pub move_to_ledge_speed: f32,
    pub max_ledge_grab_distance: f32,
    /// Hanging closer than this to the ledge's origin holds still instead of pulling.
    pub pull_distance: f32,
    /// Movement input only lets go after hanging this long.
    pub min_time_on_ledge: Duration,
    pub ledge_jump_forward_force: f32,
    pub ledge_jump_upward_force: f32,
    /// Delay between letting go and the jump impulse.
    pub ledge_jump_delay: Duration,
    pub detection_length: f32,
    pub sphere_cast_radius: f32,
    pub exit_ledge_time: Duration,
    /// The ledge last let go of cannot be grabbed again for this long.
    pub regrab_delay: Duration,
}

impl Default for LedgeGrabbing {
    fn default() -> Self {
        Self {
            move_to_ledge_speed: 5.0,
            max_ledge_grab_distance: 1.2,
            pull_distance: 1.0,
            min_time_on_ledge: Duration::from_millis(200),
            ledge_jump_forward_force: 5.0,
            ledge_jump_upward_force: 6.0,
            ledge_jump_delay: Duration::from_millis(50),
            detection_length: 1.5,
            sphere_cast_radius: 0.3,
            exit_ledge_time: Duration::from_millis(200),
            regrab_delay: Duration::from_secs(1),
        }
    }
}

impl LedgeGrabbing {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::ensure_positive("max_ledge_grab_distance", self.max_ledge_grab_distance)?;
        ConfigError::ensure_positive("detection_length", self.detection_length)
    }
}

#[derive(Clone, Reflect, Debug)]
pub struct LedgeHold {
    pub ledge: Entity,
    /// Where the character is pulled to while hanging.
    pub anchor: Vec3,
    pub time_on_ledge: Stopwatch,
}

#[derive(Clone, Reflect, Default, Debug)]
pub struct LedgeState {
    pub holding: Option<LedgeHold>,
    pub last_ledge: Option<Entity>,
    /// Time since letting go of [`Self::last_ledge`].
    pub since_release: Option<Stopwatch>,
    pub exiting: Option<Stopwatch>,
    /// Time since a ledge jump let go, until its impulse is applied.
    pub pending_jump: Option<Stopwatch>,
}

impl LedgeState {
    pub fn is_holding(&self) -> bool {
        self.holding.is_some()
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting.is_some()
    }

    fn release(&mut self) {
        if let Some(hold) = self.holding.take() {
            debug!("let go of ledge {}", hold.ledge);
        }
        self.exiting = Some(Stopwatch::new());
        self.since_release = Some(Stopwatch::new());
    }
}

pub(crate) fn update(
    velocity: &mut Vec3,
    input: &mut AccumulatedInput,
    state: &mut CharacterControllerState,
    probes: &Probes,
    cfg: &LedgeGrabbing,
    ctx: &Ctx,
) {
    tick_timers(velocity, &mut state.ledge, cfg, ctx);
    let ledge = &mut state.ledge;

    if let Some(hit) = probes.ledge
        && ledge.last_ledge != Some(hit.entity)
        && hit.point.distance(probes.position) < cfg.max_ledge_grab_distance
        && !ledge.is_holding()
        && !ledge.is_exiting()
    {
        ledge.holding = Some(LedgeHold {
            ledge: hit.entity,
            anchor: hit.anchor,
            time_on_ledge: Stopwatch::new(),
        });
        ledge.last_ledge = Some(hit.entity);
        ledge.since_release = None;
        *velocity = Vec3::ZERO;
        debug!("grabbed ledge {}", hit.entity);
    }

    let Some(hold) = ledge.holding.as_mut() else {
        return;
    };
    let time_on_ledge = hold.time_on_ledge.tick(ctx.dt_duration).elapsed();
    if input.take_jump(ctx.cfg.jump_input_buffer) {
        ledge.release();
        ledge.pending_jump = Some(Stopwatch::new());
    } else if time_on_ledge > cfg.min_time_on_ledge && input.has_movement() {
        ledge.release();
    }
}

fn tick_timers(velocity: &mut Vec3, ledge: &mut LedgeState, cfg: &LedgeGrabbing, ctx: &Ctx) {
    if let Some(exiting) = ledge.exiting.as_mut()
        && exiting.tick(ctx.dt_duration).elapsed() >= cfg.exit_ledge_time
    {
        ledge.exiting = None;
    }
    if let Some(since_release) = ledge.since_release.as_mut()
        && since_release.tick(ctx.dt_duration).elapsed() >= cfg.regrab_delay
    {
        ledge.since_release = None;
        ledge.last_ledge = None;
    }
    if let Some(pending) = ledge.pending_jump.as_mut()
        && pending.tick(ctx.dt_duration).elapsed() >= cfg.ledge_jump_delay
    {
        ledge.pending_jump = None;
        *velocity = Vec3::ZERO;
        apply_impulse(
            velocity,
            ctx.orientation.look * cfg.ledge_jump_forward_force
                + Vec3::Y * cfg.ledge_jump_upward_force,
            ctx.cfg.mass,
        );
        debug!("ledge jump");
    }
}

/// Pulls the character towards the ledge until it is close enough to hang still.
pub(crate) fn hold(
    velocity: &mut Vec3,
    state: &CharacterControllerState,
    probes: &Probes,
    cfg: &LedgeGrabbing,
    ctx: &Ctx,
) {
    let Some(hold) = state.ledge.holding.as_ref() else {
        return;
    };
    let to_ledge = hold.anchor - probes.position;
    if to_ledge.length() > cfg.pull_distance {
        *velocity += to_ledge.normalize() * cfg.move_to_ledge_speed * PULL_GAIN * ctx.dt;
    } else {
        *velocity = Vec3::ZERO;
    }
}
