//! Runs the controller inside a headless app with real colliders, one fixed step per update.

use avian3d::prelude::*;
use bevy::{
    prelude::*,
    time::{Stopwatch, TimeUpdateStrategy},
};
use bevy_parkour::{CharacterControllerState, input::AccumulatedInput, prelude::*};
use core::time::Duration;

const FIXED_HZ: f64 = 64.0;

#[derive(Resource, Default)]
struct ModeLog(Vec<(LocomotionMode, LocomotionMode)>);

impl ModeLog {
    fn entered(&self, mode: LocomotionMode) -> bool {
        self.0.iter().any(|&(_, current)| current == mode)
    }
}

fn create_test_app() -> App {
    let mut app = App::new();
    app.add_plugins((
        MinimalPlugins,
        TransformPlugin,
        bevy::asset::AssetPlugin::default(),
        bevy::scene::ScenePlugin::default(),
    ))
    .add_plugins(
        PhysicsPlugins::default()
            .build()
            .disable::<ColliderHierarchyPlugin>(),
    )
    .add_plugins(ParkourPlugin::default())
    .init_resource::<Assets<Mesh>>()
    .init_resource::<ModeLog>()
    .insert_resource(Time::<Fixed>::from_hz(FIXED_HZ))
    .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(
        1.0 / FIXED_HZ,
    )))
    .add_observer(|changed: On<LocomotionChanged>, mut log: ResMut<ModeLog>| {
        log.0.push((changed.previous, changed.current));
    });
    app.finish();
    app.cleanup();
    app
}

fn spawn_block(app: &mut App, size: Vec3, position: Vec3) -> Entity {
    app.world_mut()
        .spawn((
            Transform::from_translation(position),
            RigidBody::Static,
            Collider::cuboid(size.x, size.y, size.z),
        ))
        .id()
}

fn spawn_floor(app: &mut App) -> Entity {
    spawn_block(app, vec3(40.0, 1.0, 40.0), vec3(0.0, -0.5, 0.0))
}

fn spawn_character(app: &mut App, position: Vec3, abilities: impl Bundle) -> Entity {
    app.world_mut()
        .spawn((
            CharacterController::default(),
            Transform::from_translation(position),
            abilities,
        ))
        .id()
}

/// Runs `frames` updates, feeding `input` before each one since it is cleared after every fixed step.
fn run(app: &mut App, character: Entity, frames: usize, input: &AccumulatedInput) {
    for _ in 0..frames {
        let mut accumulated = app
            .world_mut()
            .get_mut::<AccumulatedInput>(character)
            .expect("character has accumulated input");
        *accumulated = AccumulatedInput {
            jumped: accumulated.jumped.clone().or(input.jumped.clone()),
            ..input.clone()
        };
        app.update();
    }
}

fn idle(app: &mut App, character: Entity, frames: usize) {
    run(app, character, frames, &AccumulatedInput::default());
}

fn state(app: &App, character: Entity) -> &CharacterControllerState {
    app.world()
        .get::<CharacterControllerState>(character)
        .expect("character has state")
}

fn velocity(app: &App, character: Entity) -> Vec3 {
    app.world()
        .get::<LinearVelocity>(character)
        .expect("character has velocity")
        .0
}

fn forward() -> AccumulatedInput {
    AccumulatedInput {
        last_movement: Some(Vec2::Y),
        ..default()
    }
}

#[test]
fn falls_onto_the_floor_and_walks() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, vec3(0.0, 3.0, 0.0), ());

    idle(&mut app, character, 120);

    let state = state(&app, character);
    assert!(state.grounded.is_some(), "never landed");
    assert_eq!(state.mode, LocomotionMode::Walking);
    let log = app.world().resource::<ModeLog>();
    assert!(log.0.contains(&(LocomotionMode::Walking, LocomotionMode::Airborne)));
    assert!(log.0.contains(&(LocomotionMode::Airborne, LocomotionMode::Walking)));

    let height = app.world().get::<Transform>(character).map(|t| t.translation.y);
    assert!(height.is_some_and(|y| (y - 1.0).abs() < 0.1), "rests at {height:?}");
}

#[test]
fn ground_jump_leaves_the_floor() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, vec3(0.0, 1.1, 0.0), ());
    idle(&mut app, character, 60);
    assert!(state(&app, character).grounded.is_some());

    let jump = AccumulatedInput {
        jumped: Some(Stopwatch::new()),
        ..default()
    };
    run(&mut app, character, 1, &jump);

    assert!(velocity(&app, character).y > 6.0);
    assert!(state(&app, character).grounded.is_none());
    assert_eq!(state(&app, character).mode, LocomotionMode::Airborne);
}

#[test]
fn input_is_cleared_after_a_step_but_the_jump_stays_buffered() {
    let mut app = create_test_app();
    let character = spawn_character(&mut app, vec3(0.0, 50.0, 0.0), ());
    // fall past coyote time so the press cannot be used
    idle(&mut app, character, 20);

    let input = AccumulatedInput {
        last_movement: Some(Vec2::Y),
        crouched: true,
        sprinting: true,
        jumped: Some(Stopwatch::new()),
        ..default()
    };
    run(&mut app, character, 1, &input);

    let accumulated = app
        .world()
        .get::<AccumulatedInput>(character)
        .expect("character has accumulated input");
    assert!(accumulated.last_movement.is_none());
    assert!(!accumulated.crouched);
    assert!(!accumulated.sprinting);
    assert!(accumulated.jumped.is_some());
}

#[test]
fn crouching_derives_a_shorter_collider() {
    let mut app = create_test_app();
    let character = spawn_character(&mut app, vec3(0.0, 5.0, 0.0), ());

    let state = state(&app, character);
    let standing = state.standing_collider.aabb(Vec3::ZERO, Rotation::default());
    let crouching = state.crouching_collider.aabb(Vec3::ZERO, Rotation::default());
    let crouch_height = CharacterController::default().crouch_height;
    assert!((crouching.size().y - crouch_height).abs() < 1e-4);
    assert!((crouching.min.y - standing.min.y).abs() < 1e-4);
}

#[test]
fn low_ceiling_keeps_the_character_crouched() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, vec3(0.0, 1.1, 0.0), ());
    idle(&mut app, character, 60);

    let crouch = AccumulatedInput {
        crouched: true,
        ..default()
    };
    run(&mut app, character, 5, &crouch);
    assert!(state(&app, character).crouching);
    assert_eq!(state(&app, character).mode, LocomotionMode::Crouching);

    // clears the crouched collider, overlaps the standing one
    let ceiling = spawn_block(&mut app, vec3(4.0, 1.0, 4.0), vec3(0.0, 2.0, 0.0));
    run(&mut app, character, 5, &crouch);
    idle(&mut app, character, 10);
    assert!(state(&app, character).crouching, "stood up into the ceiling");

    app.world_mut().despawn(ceiling);
    idle(&mut app, character, 5);
    assert!(!state(&app, character).crouching);
    assert_eq!(state(&app, character).mode, LocomotionMode::Walking);
}

#[test]
fn grabs_a_ledge_in_front() {
    let mut app = create_test_app();
    let ledge = spawn_block(&mut app, vec3(2.0, 0.2, 0.3), vec3(0.0, 5.0, -0.95));
    app.world_mut().entity_mut(ledge).insert(Ledge);
    let character = spawn_character(&mut app, vec3(0.0, 5.0, 0.0), LedgeGrabbing::default());

    idle(&mut app, character, 10);

    let state = state(&app, character);
    assert_eq!(state.mode, LocomotionMode::LedgeHold);
    assert_eq!(
        state.ledge.holding.as_ref().map(|hold| hold.ledge),
        Some(ledge)
    );
    assert!(app.world().resource::<ModeLog>().entered(LocomotionMode::LedgeHold));
    assert!(velocity(&app, character).length() < 1e-4);
}

#[test]
fn plain_geometry_is_not_grabbed() {
    let mut app = create_test_app();
    spawn_block(&mut app, vec3(2.0, 0.2, 0.3), vec3(0.0, 5.0, -0.95));
    let character = spawn_character(&mut app, vec3(0.0, 5.0, 0.0), LedgeGrabbing::default());

    idle(&mut app, character, 10);

    assert_eq!(state(&app, character).mode, LocomotionMode::Airborne);
    assert!(!app.world().resource::<ModeLog>().entered(LocomotionMode::LedgeHold));
}

#[test]
fn runs_along_a_wall_high_above_the_ground() {
    let mut app = create_test_app();
    // the wall's face is 0.65 to the right of the character's center
    spawn_block(&mut app, vec3(0.2, 10.0, 40.0), vec3(0.75, 5.0, 0.0));
    let character = spawn_character(&mut app, vec3(0.0, 5.0, 0.0), WallRunning::default());

    run(&mut app, character, 10, &forward());

    assert_eq!(state(&app, character).mode, LocomotionMode::WallRunning);
    assert!(state(&app, character).wall_run.is_running());
}

#[test]
fn no_wall_run_close_to_the_ground() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    spawn_block(&mut app, vec3(0.2, 10.0, 40.0), vec3(0.75, 5.0, 0.0));
    let character = spawn_character(&mut app, vec3(0.0, 1.1, 0.0), WallRunning::default());
    idle(&mut app, character, 30);

    run(&mut app, character, 20, &forward());

    assert_eq!(state(&app, character).mode, LocomotionMode::Walking);
    assert!(!app.world().resource::<ModeLog>().entered(LocomotionMode::WallRunning));
}
