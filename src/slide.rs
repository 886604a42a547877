//! Sliding: a short, crouched burst of speed started from a sprint.

use bevy_time::Stopwatch;
use core::time::Duration;
use tracing::debug;

use crate::{
    CharacterControllerState,
    input::AccumulatedInput,
    locomotion::Ctx,
    motor::{apply_force, apply_impulse, clamp_flat_speed, flat_speed},
    prelude::*,
};

/// Lets the character slide by pressing [`Crouch`](crate::input::Crouch) at sprinting speed.
#[derive(Component, Clone, Reflect, Debug)]
#[reflect(Component)]
pub struct Sliding {
    /// Impulse on start, and force applied every step of the slide.
    pub slide_force: f32,
    pub slide_duration: Duration,
    pub slide_cooldown: Duration,
    pub max_slide_speed: f32,
    /// How much strafing bends the slide. 0 slides straight, 1 steers like walking.
    pub steering: f32,
    /// How far below sprint speed the character may be and still start a slide.
    pub speed_margin: f32,
}

impl Default for Sliding {
    fn default() -> Self {
        Self {
            slide_force: 20.0,
            slide_duration: Duration::from_millis(750),
            slide_cooldown: Duration::from_secs(1),
            max_slide_speed: 12.0,
            steering: 0.3,
            speed_margin: 0.5,
        }
    }
}

impl Sliding {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::ensure_positive("slide_force", self.slide_force)?;
        ConfigError::ensure_positive("max_slide_speed", self.max_slide_speed)
    }
}

#[derive(Clone, Reflect, Default, Debug)]
pub struct SlideState {
    /// Time spent in the current slide.
    pub sliding: Option<Stopwatch>,
    /// Time since the last slide ended. `None` once a new slide may start.
    pub cooldown: Option<Stopwatch>,
}

impl SlideState {
    pub fn is_sliding(&self) -> bool {
        self.sliding.is_some()
    }

    fn stop(&mut self) {
        self.sliding = None;
        self.cooldown = Some(Stopwatch::new());
    }
}

pub(crate) fn update(
    velocity: &mut Vec3,
    input: &AccumulatedInput,
    state: &mut CharacterControllerState,
    cfg: &Sliding,
    ctx: &Ctx,
) {
    if let Some(cooldown) = state.slide.cooldown.as_mut()
        && cooldown.tick(ctx.dt_duration).elapsed() >= cfg.slide_cooldown
    {
        state.slide.cooldown = None;
    }

    if input.crouch_pressed && can_start(velocity, state, cfg, ctx) {
        state.slide.sliding = Some(Stopwatch::new());
        apply_impulse(
            velocity,
            ctx.orientation.forward * cfg.slide_force,
            ctx.cfg.mass,
        );
        debug!("slide started at {:.2} m/s", flat_speed(*velocity));
    }

    if let Some(sliding) = state.slide.sliding.as_mut()
        && sliding.tick(ctx.dt_duration).elapsed() >= cfg.slide_duration
    {
        state.slide.stop();
    }
}

fn can_start(velocity: &Vec3, state: &CharacterControllerState, cfg: &Sliding, ctx: &Ctx) -> bool {
    !state.slide.is_sliding()
        && state.slide.cooldown.is_none()
        && state.grounded.is_some()
        && flat_speed(*velocity) >= ctx.cfg.sprint_speed - cfg.speed_margin
}

/// Pushes the slide along the facing, bent slightly by strafing.
pub(crate) fn apply(velocity: &mut Vec3, input: &AccumulatedInput, cfg: &Sliding, ctx: &Ctx) {
    let steer = (ctx.orientation.forward
        + ctx.orientation.right * input.movement().x * cfg.steering)
        .normalize_or_zero();
    apply_force(velocity, steer * cfg.slide_force, ctx.cfg.mass, ctx.dt);
    clamp_flat_speed(velocity, cfg.max_slide_speed);
}
