use crate::{CharacterControllerState, input::RotateCamera, prelude::*};
use core::f32::consts::FRAC_PI_2;

/// Keeps the view just short of straight up or down so yaw stays well defined.
const MAX_PITCH: f32 = FRAC_PI_2 - 0.01;

pub(super) fn plugin(app: &mut App) {
    app.add_systems(
        RunFixedMainLoop,
        sync_camera_transform.after(TransformEasingSystems::UpdateEasingTick),
    )
    .add_observer(rotate_camera);
}

/// Put this on the camera entity to make it follow and steer a character.
#[derive(Component, Clone, Copy)]
#[relationship(relationship_target = CharacterControllerCamera)]
pub struct CharacterControllerCameraOf(pub Entity);

/// The camera a character looks through. Its facing decides where the character moves.
#[derive(Component, Clone, Copy)]
#[relationship_target(relationship = CharacterControllerCameraOf)]
pub struct CharacterControllerCamera(Entity);

impl CharacterControllerCamera {
    pub fn get(self) -> Entity {
        self.0
    }
}

fn sync_camera_transform(
    mut cameras: Query<(&mut Transform, &CharacterControllerCameraOf), Without<CharacterControllerState>>,
    kccs: Query<(&Transform, &CharacterController, &CharacterControllerState)>,
) {
    for (mut camera_transform, camera_of) in &mut cameras {
        let Ok((kcc_transform, cfg, state)) = kccs.get(camera_of.0) else {
            continue;
        };
        // Crouching keeps the feet in place, so measure from the standing collider's bottom.
        let height = state
            .standing_collider
            .aabb(Vec3::default(), Rotation::default())
            .size()
            .y;
        camera_transform.translation =
            kcc_transform.translation + Vec3::Y * (-height / 2.0 + view_height(cfg, state));
    }
}

/// Sliding shrinks the collider too, so it shares the crouching view.
fn view_height(cfg: &CharacterController, state: &CharacterControllerState) -> f32 {
    if state.crouching {
        cfg.crouch_view_height
    } else {
        cfg.standing_view_height
    }
}

fn rotate_camera(
    rotate: On<Fire<RotateCamera>>,
    cameras: Query<&CharacterControllerCamera>,
    mut transforms: Query<&mut Transform>,
) {
    let Ok(camera) = cameras.get(rotate.context) else {
        return;
    };
    let Ok([mut camera_transform, mut body_transform]) =
        transforms.get_many_mut([camera.get(), rotate.context])
    else {
        return;
    };
    let (yaw, pitch) = look(camera_transform.rotation, rotate.value);
    camera_transform.rotation = Quat::from_euler(EulerRot::YXZ, yaw, pitch, 0.0);
    body_transform.rotation = Quat::from_rotation_y(yaw);
}

/// Applies a look delta in degrees to `rotation`, returning the new yaw and pitch in radians.
fn look(rotation: Quat, delta: Vec2) -> (f32, f32) {
    let (yaw, pitch, _) = rotation.to_euler(EulerRot::YXZ);
    let delta = -delta;
    let yaw = yaw + delta.x.to_radians();
    let pitch = (pitch + delta.y.to_radians()).clamp(-MAX_PITCH, MAX_PITCH);
    (yaw, pitch)
}
