use avian3d::prelude::*;
use bevy::{
    input::common_conditions::input_just_pressed,
    prelude::*,
    window::{CursorGrabMode, CursorOptions},
};
use bevy_enhanced_input::prelude::*;
use bevy_parkour::prelude::*;

fn main() -> AppExit {
    App::new()
        .add_plugins((
            DefaultPlugins,
            PhysicsPlugins::default(),
            EnhancedInputPlugin,
            ParkourPlugin::default(),
        ))
        .add_input_context::<PlayerInput>()
        .add_systems(Startup, (setup, setup_course, setup_ui))
        .add_systems(
            Update,
            (
                update_speed_text,
                capture_cursor.run_if(input_just_pressed(MouseButton::Left)),
                release_cursor.run_if(input_just_pressed(KeyCode::Escape)),
            ),
        )
        .add_observer(show_mode)
        .run()
}

fn setup(mut commands: Commands) {
    let player = commands
        .spawn((
            CharacterController::default(),
            Collider::capsule(0.5, 1.0),
            // Every ability is optional. Leave one out to disable it.
            Sliding::default(),
            WallRunning::default(),
            Climbing::default(),
            LedgeGrabbing::default(),
            Transform::from_xyz(0.0, 2.0, 0.0),
            PlayerInput,
            actions!(PlayerInput[
                (
                    Action::<Movement>::new(),
                    DeadZone::default(),
                    Bindings::spawn((Cardinal::wasd_keys(), Axial::left_stick())),
                ),
                (
                    Action::<Jump>::new(),
                    bindings![KeyCode::Space, GamepadButton::South],
                ),
                (
                    Action::<Crouch>::new(),
                    bindings![KeyCode::ControlLeft, GamepadButton::East],
                ),
                (
                    Action::<Sprint>::new(),
                    bindings![KeyCode::ShiftLeft, GamepadButton::LeftThumb],
                ),
                (
                    Action::<RotateCamera>::new(),
                    Bindings::spawn((
                        Spawn((Binding::mouse_motion(), Scale::splat(0.07))),
                        Axial::right_stick().with((Scale::splat(4.0), DeadZone::default())),
                    )),
                ),
            ]),
        ))
        .id();

    commands.spawn((Camera3d::default(), CharacterControllerCameraOf(player)));

    commands.spawn((
        Transform::from_xyz(0.0, 1.0, 0.0).looking_at(vec3(1.0, -2.0, -2.0), Vec3::Y),
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
    ));
}

/// A floor, a long wall to run along, a tall wall to climb and a platform with a grabbable edge.
fn setup_course(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let ground = materials.add(Color::srgb(0.3, 0.5, 0.3));
    let wall = materials.add(Color::srgb(0.6, 0.6, 0.65));
    let ledge = materials.add(Color::srgb(0.8, 0.5, 0.2));

    let mut block = |size: Vec3, position: Vec3, material: &Handle<StandardMaterial>| {
        commands
            .spawn((
                Mesh3d(meshes.add(Cuboid::from_size(size))),
                MeshMaterial3d(material.clone()),
                Transform::from_translation(position),
                RigidBody::Static,
                Collider::cuboid(size.x, size.y, size.z),
            ))
            .id()
    };

    block(vec3(80.0, 1.0, 80.0), vec3(0.0, -0.5, 0.0), &ground);
    // run along this one after jumping towards it
    block(vec3(0.5, 6.0, 24.0), vec3(4.0, 3.0, -16.0), &wall);
    // climb this one, then grab the top
    block(vec3(8.0, 5.0, 0.5), vec3(-8.0, 2.5, -12.0), &wall);
    block(vec3(8.0, 0.5, 6.0), vec3(-8.0, 5.25, -15.0), &wall);
    let edge = block(vec3(8.0, 0.2, 0.3), vec3(-8.0, 5.1, -11.9), &ledge);
    commands.entity(edge).insert(Ledge);
}

#[derive(Component)]
struct ModeText;

#[derive(Component)]
struct SpeedText;

fn setup_ui(mut commands: Commands) {
    commands.spawn((
        Node {
            position_type: PositionType::Absolute,
            top: px(12.0),
            left: px(12.0),
            flex_direction: FlexDirection::Column,
            ..default()
        },
        children![
            (Text::new("Walking"), ModeText),
            (Text::new("Speed: 0.0"), SpeedText),
        ],
    ));
}

fn show_mode(changed: On<LocomotionChanged>, mut text: Single<&mut Text, With<ModeText>>) {
    text.0 = format!("{:?}", changed.current);
}

fn update_speed_text(
    mut text: Single<&mut Text, With<SpeedText>>,
    velocity: Single<&LinearVelocity, With<CharacterController>>,
) {
    let flat = velocity.xz().length();
    text.0 = format!("Speed: {flat:.1}");
}

#[derive(Component, Default)]
struct PlayerInput;

fn capture_cursor(mut cursor: Single<&mut CursorOptions>) {
    cursor.grab_mode = CursorGrabMode::Locked;
    cursor.visible = false;
}

fn release_cursor(mut cursor: Single<&mut CursorOptions>) {
    cursor.visible = true;
    cursor.grab_mode = CursorGrabMode::None;
}
