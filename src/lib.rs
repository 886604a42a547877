#![doc = include_str!("../readme.md")]

/// Everything you need to get started with `bevy_parkour`
pub mod prelude {
    pub(crate) use {
        avian3d::prelude::*,
        bevy_app::prelude::*,
        bevy_derive::{Deref, DerefMut},
        bevy_ecs::prelude::*,
        bevy_enhanced_input::prelude::*,
        bevy_math::prelude::*,
        bevy_reflect::prelude::*,
        bevy_time::prelude::*,
        bevy_transform::prelude::*,
        bevy_utils::prelude::*,
    };

    pub use crate::{
        CharacterController, CharacterControllerState, GroundHit, Ledge, LocomotionChanged, LocomotionMode,
        ParkourPlugin, ParkourSystems,
        camera::{CharacterControllerCamera, CharacterControllerCameraOf},
        climb::Climbing,
        error::ConfigError,
        input::{Crouch, Jump, Movement, RotateCamera, Sprint},
        ledge::LedgeGrabbing,
        slide::Sliding,
        wall_run::WallRunning,
    };
}

use crate::{input::AccumulatedInput, prelude::*};
use avian3d::parry::shape::{Capsule, SharedShape};
use bevy_ecs::{
    entity::EntityHashSet, intern::Interned, lifecycle::HookContext,
    relationship::RelationshipSourceCollection as _, schedule::ScheduleLabel, world::DeferredWorld,
};
use bevy_time::Stopwatch;
use core::time::Duration;
use std::sync::Arc;
use tracing::warn;

pub mod camera;
pub mod climb;
mod detection;
pub mod error;
pub mod input;
mod kcc;
pub mod ledge;
mod locomotion;
mod motor;
pub mod slide;
pub mod wall_run;

/// Also requires you to add [`PhysicsPlugins`] and [`EnhancedInputPlugin`] to work properly.
pub struct ParkourPlugin {
    schedule: Interned<dyn ScheduleLabel>,
}

impl ParkourPlugin {
    /// Create a new plugin in the given schedule. The default is [`FixedPostUpdate`].
    pub fn new(schedule: impl ScheduleLabel) -> Self {
        Self {
            schedule: schedule.intern(),
        }
    }
}

impl Default for ParkourPlugin {
    fn default() -> Self {
        Self {
            schedule: FixedPostUpdate.intern(),
        }
    }
}

impl Plugin for ParkourPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            self.schedule,
            (ParkourSystems::MoveCharacters)
                .chain()
                .in_set(PhysicsSystems::First),
        )
        .add_plugins((camera::plugin, input::plugin, kcc::plugin(self.schedule)));
    }
}

/// System set used by all systems of `bevy_parkour`.
#[derive(SystemSet, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ParkourSystems {
    MoveCharacters,
}

/// Base locomotion settings. Abilities are opted into by inserting [`Sliding`],
/// [`WallRunning`], [`Climbing`] and [`LedgeGrabbing`] on the same entity.
///
/// Forces and impulses are expressed the way a rigid body would receive them,
/// so they are divided by [`CharacterController::mass`] before touching the velocity.
#[derive(Component, Clone, Reflect, Debug)]
#[reflect(Component)]
#[require(
    AccumulatedInput,
    CharacterControllerState,
    TranslationInterpolation,
    RigidBody = RigidBody::Kinematic,
    Collider = Collider::capsule(0.5, 1.0),
    CustomPositionIntegration,
    Transform,
    SpeculativeMargin::ZERO,
)]
#[component(on_add=CharacterController::on_add)]
pub struct CharacterController {
    pub filter: SpatialQueryFilter,
    pub crouch_height: f32,
    pub standing_view_height: f32,
    pub crouch_view_height: f32,
    pub ground_distance: f32,
    pub min_walk_cos: f32,
    pub mass: f32,
    pub gravity: f32,
    pub walk_speed: f32,
    pub sprint_speed: f32,
    pub crouch_speed: f32,
    /// Converts a target speed into the force that pushes the character towards it.
    pub move_force_scale: f32,
    pub ground_drag: f32,
    pub air_multiplier: f32,
    /// Upward impulse of a grounded jump.
    pub jump_force: f32,
    pub jump_cooldown: Duration,
    pub coyote_time: Duration,
    pub jump_input_buffer: Duration,
    pub unground_speed: f32,
    pub snap_distance: f32,
    pub max_speed: f32,
    pub move_and_slide: MoveAndSlideConfig,
}

impl Default for CharacterController {
    fn default() -> Self {
        Self {
            filter: SpatialQueryFilter::default(),
            crouch_height: 1.0,
            standing_view_height: 1.6,
            crouch_view_height: 0.9,
            ground_distance: 0.05,
            min_walk_cos: 0.766,
            mass: 1.0,
            gravity: 9.81,
            walk_speed: 7.0,
            sprint_speed: 10.0,
            crouch_speed: 3.5,
            move_force_scale: 10.0,
            ground_drag: 5.0,
            air_multiplier: 0.4,
            jump_force: 7.0,
            jump_cooldown: Duration::from_millis(250),
            coyote_time: Duration::from_millis(120),
            jump_input_buffer: Duration::from_millis(150),
            unground_speed: 2.5,
            snap_distance: 0.5,
            max_speed: 100.0,
            move_and_slide: MoveAndSlideConfig {
                skin_width: 0.0075,
                ..default()
            },
        }
    }
}

impl CharacterController {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::ensure_positive("mass", self.mass)?;
        ConfigError::ensure_positive("jump_force", self.jump_force)?;
        ConfigError::ensure_positive("crouch_height", self.crouch_height)?;
        ConfigError::ensure_positive("walk_speed", self.walk_speed)?;
        if self.sprint_speed < self.walk_speed {
            return Err(ConfigError::SprintSlowerThanWalk {
                walk: self.walk_speed,
                sprint: self.sprint_speed,
            });
        }
        Ok(())
    }

    pub fn on_add(mut world: DeferredWorld, ctx: HookContext) {
        {
            let Some(mut kcc) = world.get_mut::<Self>(ctx.entity) else {
                return;
            };
            kcc.filter.excluded_entities.add(ctx.entity);
        }

        let Some(cfg) = world.get::<Self>(ctx.entity).cloned() else {
            return;
        };
        let entity = world.entity(ctx.entity);
        let checks = [
            Some(cfg.validate()),
            entity.get::<Sliding>().map(Sliding::validate),
            entity.get::<WallRunning>().map(WallRunning::validate),
            entity.get::<Climbing>().map(Climbing::validate),
            entity.get::<LedgeGrabbing>().map(LedgeGrabbing::validate),
        ];
        for err in checks.into_iter().flatten().filter_map(Result::err) {
            warn!("character controller {}: {err}", ctx.entity);
        }

        let Some(collider) = world.entity(ctx.entity).get::<Collider>().cloned() else {
            return;
        };
        let standing_aabb = collider.aabb(default(), Rotation::default());
        let standing_height = standing_aabb.max.y - standing_aabb.min.y;
        if cfg.crouch_height >= standing_height {
            warn!(
                "character controller {}: {}",
                ctx.entity,
                ConfigError::CrouchTooTall {
                    crouch: cfg.crouch_height,
                    standing: standing_height,
                }
            );
        }

        let Some(mut state) = world.get_mut::<CharacterControllerState>(ctx.entity) else {
            return;
        };
        state.move_speed = cfg.walk_speed;
        state.crouching_collider = crouching_collider(&collider, cfg.crouch_height, standing_height);
        state.standing_collider = collider;
    }
}

/// Shrinks the standing collider to `crouch_height`, keeping the feet where they were.
fn crouching_collider(standing: &Collider, crouch_height: f32, standing_height: f32) -> Collider {
    let mut crouching = Collider::from(SharedShape(Arc::from(standing.shape().clone_dyn())));

    if let Some(radius) = crouching.shape().as_capsule().map(|capsule| capsule.radius)
        && let Some(capsule) = crouching.shape_mut().make_mut().as_capsule_mut()
    {
        let segment = (crouch_height - 2.0 * radius).max(0.0);
        *capsule = Capsule::new_y(segment / 2.0, radius);
    } else {
        // cylinders and cuboids scale without subdividing
        crouching.set_scale(vec3(1.0, crouch_height / standing_height, 1.0), 16);
    }
    Collider::compound(vec![(
        Vec3::Y * (crouch_height - standing_height) / 2.0,
        Rotation::default(),
        crouching,
    )])
}

/// Marks a collider the character can grab onto with [`LedgeGrabbing`].
#[derive(Component, Clone, Copy, Reflect, Default, Debug)]
#[reflect(Component)]
pub struct Ledge;

/// Which traversal mode the character is in. Exactly one is active per fixed step.
#[derive(Clone, Copy, Reflect, Default, Debug, PartialEq, Eq, Hash)]
pub enum LocomotionMode {
    #[default]
    Walking,
    Sprinting,
    Crouching,
    Sliding,
    WallRunning,
    Climbing,
    LedgeHold,
    Airborne,
}

impl LocomotionMode {
    /// Whether the character moves along the ground in this mode.
    pub fn is_grounded(self) -> bool {
        matches!(
            self,
            Self::Walking | Self::Sprinting | Self::Crouching | Self::Sliding
        )
    }
}

/// The walkable surface below the character.
#[derive(Clone, Copy, Reflect, Debug, PartialEq)]
pub struct GroundHit {
    pub normal: Vec3,
    pub distance: f32,
}

/// Triggered on the character whenever its [`LocomotionMode`] changes.
#[derive(EntityEvent, Clone, Copy, Debug)]
pub struct LocomotionChanged {
    pub entity: Entity,
    pub previous: LocomotionMode,
    pub current: LocomotionMode,
}

#[derive(Component, Clone, Reflect, Default, Debug)]
#[reflect(Component)]
pub struct CharacterControllerState {
    pub mode: LocomotionMode,
    #[reflect(ignore)]
    pub standing_collider: Collider,
    #[reflect(ignore)]
    pub crouching_collider: Collider,
    pub grounded: Option<GroundHit>,
    pub crouching: bool,
    pub touching_entities: EntityHashSet,
    pub last_ground: Stopwatch,
    /// `None` until the first jump.
    pub last_jump: Option<Stopwatch>,
    /// Flat speed cap of the last ground mode, carried into the air.
    pub move_speed: f32,
    pub slide: slide::SlideState,
    pub wall_run: wall_run::WallRunState,
    pub climb: climb::ClimbState,
    pub ledge: ledge::LedgeState,
}

impl CharacterControllerState {
    pub fn collider(&self) -> &Collider {
        if self.crouching {
            &self.crouching_collider
        } else {
            &self.standing_collider
        }
    }

    /// Base movement input is ignored while holding a ledge or kicking off a wall.
    pub fn is_restricted(&self) -> bool {
        self.ledge.is_holding() || self.wall_run.is_exiting()
    }
}
