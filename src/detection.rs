use crate::{Ledge, prelude::*};

/// Surfaces with a steeper normal than this count as walls.
const MAX_WALL_NORMAL_Y: f32 = 0.3;

/// The character's facing. Flat vectors have no vertical component.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Orientation {
    pub(crate) forward: Vec3,
    pub(crate) right: Vec3,
    pub(crate) look: Vec3,
}

impl Orientation {
    pub(crate) fn from_transform(transform: &Transform) -> Self {
        let flatten = |v: Vec3| vec3(v.x, 0.0, v.z).normalize_or_zero();
        Self {
            forward: flatten(transform.forward().into()),
            right: flatten(transform.right().into()),
            look: transform.forward().into(),
        }
    }

    /// World-space direction for a `(strafe, forward)` input.
    pub(crate) fn wish_dir(&self, movement: Vec2) -> Vec3 {
        (self.forward * movement.y + self.right * movement.x).normalize_or_zero()
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            forward: Vec3::NEG_Z,
            right: Vec3::X,
            look: Vec3::NEG_Z,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct WallHit {
    pub(crate) entity: Entity,
    pub(crate) normal: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LedgeHit {
    pub(crate) entity: Entity,
    pub(crate) point: Vec3,
    pub(crate) anchor: Vec3,
}

/// What the character sees around it this step.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Probes {
    pub(crate) position: Vec3,
    /// No ground within the wall run's minimum height.
    pub(crate) above_ground: bool,
    pub(crate) wall_left: Option<WallHit>,
    pub(crate) wall_right: Option<WallHit>,
    pub(crate) wall_front: Option<WallHit>,
    pub(crate) ledge: Option<LedgeHit>,
}

impl Probes {
    /// The side wall to run along, preferring the side we are already on.
    pub(crate) fn side_wall(&self, previous: Option<WallHit>) -> Option<WallHit> {
        match (self.wall_left, self.wall_right) {
            (Some(left), Some(right)) => {
                if previous.is_some_and(|wall| wall.entity == left.entity) {
                    Some(left)
                } else {
                    Some(right)
                }
            }
            (left, right) => right.or(left),
        }
    }
}

pub(crate) fn is_wall(normal: Vec3) -> bool {
    normal.y.abs() < MAX_WALL_NORMAL_Y
}

/// The direction along the wall that is closest to where the character faces.
pub(crate) fn wall_forward(normal: Vec3, forward: Vec3) -> Vec3 {
    let along = normal.cross(Vec3::Y).normalize_or_zero();
    if (forward - along).length() > (forward + along).length() {
        -along
    } else {
        along
    }
}

/// Angle in degrees between the facing and the direction into the wall.
pub(crate) fn look_angle(forward: Vec3, normal: Vec3) -> f32 {
    forward.angle_between(-normal).to_degrees()
}

pub(crate) struct ProbeSettings<'a> {
    pub(crate) filter: &'a SpatialQueryFilter,
    pub(crate) wall_run: Option<&'a WallRunning>,
    pub(crate) climb: Option<&'a Climbing>,
    pub(crate) ledge: Option<&'a LedgeGrabbing>,
}

pub(crate) fn probe(
    position: Vec3,
    orientation: &Orientation,
    settings: &ProbeSettings,
    pipeline: &SpatialQuery,
    ledges: &Query<&Position, With<Ledge>>,
) -> Probes {
    let mut probes = Probes {
        position,
        above_ground: true,
        ..default()
    };

    if let Some(wall_run) = settings.wall_run {
        probes.above_ground = pipeline
            .cast_ray(
                position,
                Dir3::NEG_Y,
                wall_run.min_jump_height,
                true,
                settings.filter,
            )
            .is_none();

        let side_ray = |direction: Vec3| {
            let direction = Dir3::new(direction).ok()?;
            let hit = pipeline.cast_ray(
                position,
                direction,
                wall_run.wall_check_distance,
                true,
                settings.filter,
            )?;
            is_wall(hit.normal).then_some(WallHit {
                entity: hit.entity,
                normal: hit.normal,
            })
        };
        probes.wall_right = side_ray(orientation.right);
        probes.wall_left = side_ray(-orientation.right);
    }

    if let Some(climb) = settings.climb
        && let Ok(forward) = Dir3::new(orientation.forward)
    {
        probes.wall_front = pipeline
            .cast_shape(
                &Collider::sphere(climb.sphere_cast_radius),
                position,
                Quat::IDENTITY,
                forward,
                &ShapeCastConfig::from_max_distance(climb.detection_length),
                settings.filter,
            )
            .filter(|hit| is_wall(hit.normal1))
            .map(|hit| WallHit {
                entity: hit.entity,
                normal: hit.normal1,
            });
    }

    if let Some(ledge) = settings.ledge
        && let Ok(look) = Dir3::new(orientation.look)
    {
        probes.ledge = pipeline
            .cast_shape_predicate(
                &Collider::sphere(ledge.sphere_cast_radius),
                position,
                Quat::IDENTITY,
                look,
                &ShapeCastConfig::from_max_distance(ledge.detection_length),
                settings.filter,
                &|entity| ledges.contains(entity),
            )
            .and_then(|hit| {
                let anchor = ledges.get(hit.entity).ok()?;
                Some(LedgeHit {
                    entity: hit.entity,
                    point: hit.point1,
                    anchor: anchor.0,
                })
            });
    }

    probes
}

/// Used by the ground probe to decide whether the character should keep sticking to the floor.
pub(crate) fn is_moving_up_rapidly(velocity: Vec3, cfg: &CharacterController) -> bool {
    velocity.y > cfg.unground_speed
}
