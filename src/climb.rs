//! Climbing straight up a wall the character faces, and jumping back off it.

use bevy_time::Stopwatch;
use core::time::Duration;
use tracing::{debug, trace};

use crate::{
    CharacterControllerState,
    detection::{Probes, look_angle},
    input::AccumulatedInput,
    locomotion::Ctx,
    motor::apply_impulse,
    prelude::*,
};

#[derive(Component, Clone, Reflect, Debug)]
#[reflect(Component)]
pub struct Climbing {
    pub climb_speed: f32,
    /// Climbing time available per wall. Refilled on the ground or on a new wall.
    pub max_climb_time: Duration,
    pub climb_jump_up_force: f32,
    pub climb_jump_back_force: f32,
    /// Jumps off the wall available per wall.
    pub climb_jumps: u32,
    pub detection_length: f32,
    pub sphere_cast_radius: f32,
    /// In degrees.
    pub max_wall_look_angle: f32,
    pub exit_wall_time: Duration,
}

impl Default for Climbing {
    fn default() -> Self {
        Self {
            climb_speed: 3.0,
            max_climb_time: Duration::from_secs(2),
            climb_jump_up_force: 6.0,
            climb_jump_back_force: 4.0,
            climb_jumps: 1,
            detection_length: 1.0,
            sphere_cast_radius: 0.3,
            max_wall_look_angle: 60.0,
            exit_wall_time: Duration::from_millis(200),
        }
    }
}

impl Climbing {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::ensure_positive("climb_speed", self.climb_speed)?;
        ConfigError::ensure_positive("detection_length", self.detection_length)?;
        ConfigError::ensure_positive("max_wall_look_angle", self.max_wall_look_angle)
    }
}

#[derive(Clone, Reflect, Default, Debug)]
pub struct ClimbState {
    pub climbing: bool,
    /// Climbing time used on the current wall.
    pub climb_time: Stopwatch,
    pub jumps_left: u32,
    pub last_wall: Option<Entity>,
    pub exiting: Option<Stopwatch>,
}

impl ClimbState {
    fn stop(&mut self) {
        if self.climbing {
            self.climbing = false;
            debug!("climb stopped");
        }
    }

    /// Stops climbing and keeps the character off the wall for [`Climbing::exit_wall_time`].
    pub(crate) fn exit(&mut self) {
        if self.climbing {
            self.stop();
            self.exiting = Some(Stopwatch::new());
        }
    }
}

pub(crate) fn update(
    velocity: &mut Vec3,
    input: &mut AccumulatedInput,
    state: &mut CharacterControllerState,
    probes: &Probes,
    cfg: &Climbing,
    ctx: &Ctx,
) {
    let new_wall = probes
        .wall_front
        .is_some_and(|wall| state.climb.last_wall != Some(wall.entity));
    if new_wall || state.grounded.is_some() {
        state.climb.climb_time.reset();
        state.climb.jumps_left = cfg.climb_jumps;
    }
    if let Some(wall) = probes.wall_front {
        state.climb.last_wall = Some(wall.entity);
    }

    if state.ledge.is_holding() {
        state.climb.stop();
        return;
    }

    let facing_wall = probes.wall_front.is_some_and(|wall| {
        look_angle(ctx.orientation.forward, wall.normal) < cfg.max_wall_look_angle
    });
    let climb = &mut state.climb;
    if facing_wall && input.forward() > 0.0 && climb.exiting.is_none() {
        if !climb.climbing && climb.climb_time.elapsed() < cfg.max_climb_time {
            climb.climbing = true;
            debug!("climb started");
        }
        if climb.climb_time.tick(ctx.dt_duration).elapsed() >= cfg.max_climb_time {
            climb.stop();
        }
    } else if let Some(exiting) = climb.exiting.as_mut() {
        let done = exiting.tick(ctx.dt_duration).elapsed() >= cfg.exit_wall_time;
        climb.stop();
        if done {
            climb.exiting = None;
        }
    } else {
        climb.stop();
    }

    if let Some(wall) = probes.wall_front
        && state.climb.jumps_left > 0
        && input.has_jump(ctx.cfg.jump_input_buffer)
    {
        if state.grounded.is_some() {
            trace!("climb jump skipped, grounded jump takes over");
            return;
        }
        if state.ledge.is_holding() || state.ledge.is_exiting() {
            return;
        }
        input.take_jump(ctx.cfg.jump_input_buffer);
        let climb = &mut state.climb;
        climb.stop();
        climb.exiting = Some(Stopwatch::new());
        climb.jumps_left = climb.jumps_left.saturating_sub(1);
        velocity.y = 0.0;
        apply_impulse(
            velocity,
            Vec3::Y * cfg.climb_jump_up_force + wall.normal * cfg.climb_jump_back_force,
            ctx.cfg.mass,
        );
        debug!("climb jump, {} left", climb.jumps_left);
    }
}

pub(crate) fn apply(velocity: &mut Vec3, cfg: &Climbing) {
    velocity.y = cfg.climb_speed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detection::WallHit,
        ledge::LedgeHold,
        locomotion::tests::{airborne_state, ctx, grounded_state, step},
    };

    fn facing_wall(entity: Entity) -> Probes {
        Probes {
            wall_front: Some(WallHit {
                entity,
                normal: Vec3::Z,
            }),
            ..default()
        }
    }

    fn forward() -> AccumulatedInput {
        AccumulatedInput {
            last_movement: Some(Vec2::Y),
            ..default()
        }
    }

    #[test]
    fn climbs_while_facing_the_wall() {
        let mut world = World::new();
        let ctx = ctx();
        let cfg = Climbing::default();
        let probes = facing_wall(world.spawn_empty().id());
        let mut state = grounded_state();
        let mut velocity = Vec3::ZERO;

        update(&mut velocity, &mut forward(), &mut state, &probes, &cfg, &ctx);
        assert!(state.climb.climbing);
        assert_eq!(state.climb.jumps_left, cfg.climb_jumps);

        apply(&mut velocity, &cfg);
        assert_eq!(velocity.y, cfg.climb_speed);
    }

    #[test]
    fn looking_away_does_not_climb() {
        let mut world = World::new();
        let ctx = ctx();
        let cfg = Climbing::default();
        let probes = Probes {
            wall_front: Some(WallHit {
                entity: world.spawn_empty().id(),
                normal: vec3(1.0, 0.0, 0.3).normalize(),
            }),
            ..default()
        };
        let mut state = grounded_state();
        update(&mut Vec3::ZERO, &mut forward(), &mut state, &probes, &cfg, &ctx);
        assert!(!state.climb.climbing);
    }

    #[test]
    fn climb_time_runs_out_on_the_same_wall() {
        let mut world = World::new();
        let ctx = ctx();
        let cfg = Climbing::default();
        let wall = world.spawn_empty().id();
        let probes = facing_wall(wall);
        let mut state = airborne_state();
        let mut velocity = Vec3::ZERO;
        let mut input = forward();

        let steps = (cfg.max_climb_time.as_secs_f32() / ctx.dt).ceil() as usize + 1;
        step(steps, || {
            update(&mut velocity, &mut input, &mut state, &probes, &cfg, &ctx);
        });
        assert!(!state.climb.climbing);

        // a different wall refills the timer
        let other = facing_wall(world.spawn_empty().id());
        update(&mut velocity, &mut input, &mut state, &other, &cfg, &ctx);
        assert!(state.climb.climbing);
    }

    #[test]
    fn climb_jump_uses_up_a_jump() {
        let mut world = World::new();
        let ctx = ctx();
        let cfg = Climbing::default();
        let probes = facing_wall(world.spawn_empty().id());
        let mut state = airborne_state();
        let mut velocity = vec3(0.0, 3.0, 0.0);

        update(&mut velocity, &mut forward(), &mut state, &probes, &cfg, &ctx);
        assert_eq!(state.climb.jumps_left, 1);

        let mut input = AccumulatedInput {
            jumped: Some(Stopwatch::new()),
            ..forward()
        };
        update(&mut velocity, &mut input, &mut state, &probes, &cfg, &ctx);
        assert!(input.jumped.is_none());
        assert!(!state.climb.climbing);
        assert_eq!(state.climb.jumps_left, 0);
        assert_eq!(
            velocity,
            vec3(0.0, cfg.climb_jump_up_force, cfg.climb_jump_back_force)
        );

        // no jumps left on this wall
        let mut input = AccumulatedInput {
            jumped: Some(Stopwatch::new()),
            ..default()
        };
        update(&mut velocity, &mut input, &mut state, &probes, &cfg, &ctx);
        assert!(input.jumped.is_some());
    }

    #[test]
    fn grounded_jump_is_left_alone() {
        let mut world = World::new();
        let ctx = ctx();
        let cfg = Climbing::default();
        let probes = facing_wall(world.spawn_empty().id());
        let mut state = grounded_state();
        let mut input = AccumulatedInput {
            jumped: Some(Stopwatch::new()),
            ..default()
        };
        update(&mut Vec3::ZERO, &mut input, &mut state, &probes, &cfg, &ctx);
        assert!(input.jumped.is_some());
    }

    #[test]
    fn holding_a_ledge_stops_climbing() {
        let mut world = World::new();
        let ctx = ctx();
        let cfg = Climbing::default();
        let probes = facing_wall(world.spawn_empty().id());
        let mut state = airborne_state();

        update(&mut Vec3::ZERO, &mut forward(), &mut state, &probes, &cfg, &ctx);
        assert!(state.climb.climbing);

        state.ledge.holding = Some(LedgeHold {
            ledge: world.spawn_empty().id(),
            anchor: Vec3::Y,
            time_on_ledge: Stopwatch::new(),
        });
        update(&mut Vec3::ZERO, &mut forward(), &mut state, &probes, &cfg, &ctx);
        assert!(!state.climb.climbing);
    }
}
