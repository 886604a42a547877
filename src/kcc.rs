use bevy_ecs::{intern::Interned, schedule::ScheduleLabel};
use tracing::{debug, warn};

use crate::{
    CharacterControllerState, GroundHit, Ledge, LocomotionChanged, LocomotionMode,
    detection::{self, Orientation, ProbeSettings, is_moving_up_rapidly},
    input::AccumulatedInput,
    locomotion::{self, Abilities, Ctx},
    prelude::*,
};

pub(super) fn plugin(schedule: Interned<dyn ScheduleLabel>) -> impl Fn(&mut App) {
    move |app: &mut App| {
        app.add_systems(schedule, run_kcc.in_set(ParkourSystems::MoveCharacters));
    }
}

fn run_kcc(
    mut kccs: Query<(
        Entity,
        &CharacterController,
        &mut CharacterControllerState,
        &mut AccumulatedInput,
        &mut Transform,
        &mut LinearVelocity,
        Option<&CharacterControllerCamera>,
        Option<&Sliding>,
        Option<&WallRunning>,
        Option<&Climbing>,
        Option<&LedgeGrabbing>,
    )>,
    cams: Query<&Transform, Without<CharacterController>>,
    ledges: Query<&Position, With<Ledge>>,
    time: Res<Time>,
    move_and_slide: MoveAndSlide,
    mut commands: Commands,
) {
    for (
        entity,
        cfg,
        mut state,
        mut input,
        mut transform,
        mut velocity,
        cam,
        slide,
        wall_run,
        climb,
        ledge,
    ) in &mut kccs
    {
        state.touching_entities.clear();
        state.last_ground.tick(time.delta());
        if let Some(last_jump) = state.last_jump.as_mut() {
            last_jump.tick(time.delta());
        }

        let view = cam
            .and_then(|e| cams.get(e.get()).copied().ok())
            .unwrap_or(*transform);
        let ctx = Ctx {
            orientation: Orientation::from_transform(&view),
            cfg: cfg.clone(),
            abilities: Abilities {
                slide: slide.cloned(),
                wall_run: wall_run.cloned(),
                climb: climb.cloned(),
                ledge: ledge.cloned(),
            },
            dt: time.delta_secs(),
            dt_duration: time.delta(),
        };
        let previous_mode = state.mode;

        depenetrate_character(&mut transform, &move_and_slide, &state, &ctx);
        update_grounded(&transform, &velocity.0, &move_and_slide, &mut state, &ctx);
        handle_crouching(*transform, &input, &move_and_slide, &mut state, &ctx);
        if state.grounded.is_some() && velocity.y < 0.0 {
            velocity.y = 0.0;
        }

        let probes = detection::probe(
            transform.translation,
            &ctx.orientation,
            &ProbeSettings {
                filter: &cfg.filter,
                wall_run,
                climb,
                ledge,
            },
            &move_and_slide.spatial_query,
            &ledges,
        );
        locomotion::update(&mut velocity.0, &mut input, &mut state, &probes, &ctx);

        let gravity_scale = locomotion::gravity_scale(&state, &ctx);
        half_gravity(&mut velocity.0, gravity_scale, &ctx);

        move_character(
            &mut transform,
            &mut velocity.0,
            &move_and_slide,
            &mut state,
            &ctx,
        );

        let was_grounded = state.grounded.is_some();
        update_grounded(&transform, &velocity.0, &move_and_slide, &mut state, &ctx);
        if was_grounded && state.grounded.is_none() && state.mode.is_grounded() {
            // walked off a step or down a slope
            snap_to_ground(&mut transform, &move_and_slide, &state, &ctx);
            update_grounded(&transform, &velocity.0, &move_and_slide, &mut state, &ctx);
        }

        half_gravity(&mut velocity.0, gravity_scale, &ctx);

        if state.grounded.is_some() {
            velocity.y = velocity.y.max(0.0);
            state.last_ground.reset();
        }

        if state.mode != previous_mode {
            debug!("{entity}: {previous_mode:?} -> {:?}", state.mode);
            commands.trigger(LocomotionChanged {
                entity,
                previous: previous_mode,
                current: state.mode,
            });
        }
    }
}

fn depenetrate_character(
    transform: &mut Transform,
    move_and_slide: &MoveAndSlide,
    state: &CharacterControllerState,
    ctx: &Ctx,
) {
    let offset = move_and_slide.depenetrate(
        state.collider(),
        transform.translation,
        transform.rotation,
        &((&ctx.cfg.move_and_slide).into()),
        &ctx.cfg.filter,
    );
    transform.translation += offset;
}

fn move_character(
    transform: &mut Transform,
    velocity: &mut Vec3,
    move_and_slide: &MoveAndSlide,
    state: &mut CharacterControllerState,
    ctx: &Ctx,
) {
    let mut config = ctx.cfg.move_and_slide.clone();
    if let Some(grounded) = state.grounded {
        config.planes.push(Dir3::new_unchecked(grounded.normal));
    }

    let mut touching_entities = std::mem::take(&mut state.touching_entities);
    let out = move_and_slide.move_and_slide(
        state.collider(),
        transform.translation,
        transform.rotation,
        *velocity,
        ctx.dt_duration,
        &config,
        &ctx.cfg.filter,
        |hit| {
            touching_entities.insert(hit.entity);
            MoveAndSlideHitResponse::Accept
        },
    );
    transform.translation = out.position;
    *velocity = out.projected_velocity;
    std::mem::swap(&mut state.touching_entities, &mut touching_entities);
}

/// Pulls the character down onto walkable ground within [`CharacterController::snap_distance`].
fn snap_to_ground(
    transform: &mut Transform,
    move_and_slide: &MoveAndSlide,
    state: &CharacterControllerState,
    ctx: &Ctx,
) {
    let hit = move_and_slide.cast_move(
        state.collider(),
        transform.translation,
        transform.rotation,
        Vec3::NEG_Y * ctx.cfg.snap_distance,
        ctx.cfg.move_and_slide.skin_width,
        &ctx.cfg.filter,
    );
    let Some(hit) = hit else {
        return;
    };
    if hit.intersects() || hit.normal1.y < ctx.cfg.min_walk_cos {
        return;
    }
    transform.translation += Vec3::NEG_Y * hit.distance;
    depenetrate_character(transform, move_and_slide, state, ctx);
}

fn update_grounded(
    transform: &Transform,
    velocity: &Vec3,
    move_and_slide: &MoveAndSlide,
    state: &mut CharacterControllerState,
    ctx: &Ctx,
) {
    if is_moving_up_rapidly(*velocity, &ctx.cfg) {
        state.grounded = None;
        return;
    }

    let hit = move_and_slide.cast_move(
        state.collider(),
        transform.translation,
        transform.rotation,
        Vec3::NEG_Y * ctx.cfg.ground_distance,
        ctx.cfg.move_and_slide.skin_width,
        &ctx.cfg.filter,
    );
    state.grounded = hit
        .filter(|hit| hit.normal1.y >= ctx.cfg.min_walk_cos)
        .map(|hit| GroundHit {
            normal: hit.normal1,
            distance: hit.distance,
        });
}

/// Gravity is split around the move so the integrated height matches a parabola.
fn half_gravity(velocity: &mut Vec3, scale: f32, ctx: &Ctx) {
    velocity.y -= ctx.cfg.gravity * scale * 0.5 * ctx.dt;
    validate_velocity(velocity, ctx);
}

fn validate_velocity(velocity: &mut Vec3, ctx: &Ctx) {
    for i in 0..3 {
        if !velocity[i].is_finite() {
            warn!("velocity[{i}] is not finite: {}, setting to 0", velocity[i]);
            velocity[i] = 0.0;
        }
    }
    *velocity = velocity.clamp_length(0.0, ctx.cfg.max_speed);
}

/// Crouches on input or while sliding, and stands back up once there is room.
fn handle_crouching(
    transform: Transform,
    input: &AccumulatedInput,
    move_and_slide: &MoveAndSlide,
    state: &mut CharacterControllerState,
    ctx: &Ctx,
) {
    if wants_crouch(input, state) {
        state.crouching = true;
    } else if state.crouching {
        state.crouching = false;
        state.crouching = is_intersecting(transform, state, move_and_slide, ctx);
    }
}

fn wants_crouch(input: &AccumulatedInput, state: &CharacterControllerState) -> bool {
    // on walls the crouch input steers the wall run instead
    let on_wall = matches!(
        state.mode,
        LocomotionMode::WallRunning | LocomotionMode::Climbing | LocomotionMode::LedgeHold
    );
    (input.crouched && !on_wall) || state.slide.is_sliding()
}

#[must_use]
fn is_intersecting(
    transform: Transform,
    state: &CharacterControllerState,
    move_and_slide: &MoveAndSlide,
    ctx: &Ctx,
) -> bool {
    let mut intersecting = false;
    // Skin width is left out so standing up under a low slope still works.
    move_and_slide.spatial_query.shape_intersections_callback(
        state.collider(),
        transform.translation,
        transform.rotation,
        &ctx.cfg.filter,
        |_| {
            intersecting = true;
            false
        },
    );
    intersecting
}
