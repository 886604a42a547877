use bevy_time::Stopwatch;

use crate::prelude::*;

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<FixedStepRanThisFrame>()
        .add_observer(apply_movement)
        .add_observer(apply_jump)
        .add_observer(apply_crouch)
        .add_observer(apply_crouch_press)
        .add_observer(apply_sprint)
        .add_systems(PreUpdate, clear_fixed_step_flag)
        .add_systems(FixedPreUpdate, set_fixed_step_flag)
        .add_systems(
            RunFixedMainLoop,
            clear_accumulated_input
                .run_if(fixed_step_ran_this_frame)
                .in_set(RunFixedMainLoopSystems::AfterFixedMainLoop),
        )
        .add_systems(PreUpdate, tick_timers.in_set(EnhancedInputSystems::Update));
}

#[derive(Debug, InputAction)]
#[action_output(Vec2)]
pub struct Movement;

#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct Jump;

/// Crouches while held. Pressing it at sprinting speed starts a slide.
#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct Crouch;

/// Sprints while held. Also runs up the wall during a wall run.
#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct Sprint;

#[derive(Debug, InputAction)]
#[action_output(Vec2)]
pub struct RotateCamera;

/// Input accumulated since the last fixed update loop. Is cleared after every fixed update loop.
#[derive(Component, Clone, Reflect, Default, Debug)]
#[reflect(Component)]
pub struct AccumulatedInput {
    // The last non-zero move that was input since the last fixed update loop
    pub last_movement: Option<Vec2>,
    // Time since the last jump press. Will be `None` once the jump was processed.
    pub jumped: Option<Stopwatch>,
    // Whether any frame since the last fixed update loop held crouch
    pub crouched: bool,
    // Whether crouch went down since the last fixed update loop
    pub crouch_pressed: bool,
    pub sprinting: bool,
}

impl AccumulatedInput {
    pub fn movement(&self) -> Vec2 {
        self.last_movement.unwrap_or_default()
    }

    pub fn forward(&self) -> f32 {
        self.movement().y
    }

    pub fn has_movement(&self) -> bool {
        self.movement() != Vec2::ZERO
    }

    /// Consumes a jump press that is younger than `buffer`. Stale presses are dropped.
    pub(crate) fn take_jump(&mut self, buffer: core::time::Duration) -> bool {
        match self.jumped.take() {
            Some(jumped) => jumped.elapsed() <= buffer,
            None => false,
        }
    }

    pub(crate) fn has_jump(&self, buffer: core::time::Duration) -> bool {
        self.jumped
            .as_ref()
            .is_some_and(|jumped| jumped.elapsed() <= buffer)
    }
}

fn apply_movement(
    movement: On<Fire<Movement>>,
    mut accumulated_inputs: Query<&mut AccumulatedInput>,
) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(movement.context) {
        accumulated_inputs.last_movement = Some(movement.value);
    }
}

fn apply_jump(jump: On<Start<Jump>>, mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(jump.context) {
        accumulated_inputs.jumped = Some(Stopwatch::new());
    }
}

fn apply_crouch(crouch: On<Fire<Crouch>>, mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(crouch.context) {
        accumulated_inputs.crouched = true;
    }
}

fn apply_crouch_press(
    crouch: On<Start<Crouch>>,
    mut accumulated_inputs: Query<&mut AccumulatedInput>,
) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(crouch.context) {
        accumulated_inputs.crouch_pressed = true;
    }
}

fn apply_sprint(sprint: On<Fire<Sprint>>, mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    if let Ok(mut accumulated_inputs) = accumulated_inputs.get_mut(sprint.context) {
        accumulated_inputs.sprinting = true;
    }
}

fn clear_accumulated_input(mut accumulated_inputs: Query<&mut AccumulatedInput>) {
    for mut accumulated_input in &mut accumulated_inputs {
        *accumulated_input = AccumulatedInput {
            jumped: accumulated_input.jumped.clone(),
            ..default()
        }
    }
}

fn tick_timers(mut inputs: Query<&mut AccumulatedInput>, time: Res<Time>) {
    for mut input in inputs.iter_mut() {
        if let Some(jumped) = input.jumped.as_mut() {
            jumped.tick(time.delta());
        }
    }
}

/// Whether the fixed main loop ran at least once during the current frame.
#[derive(Resource, Debug, Deref, DerefMut, Default)]
struct FixedStepRanThisFrame(bool);

fn clear_fixed_step_flag(mut ran: ResMut<FixedStepRanThisFrame>) {
    **ran = false;
}

fn set_fixed_step_flag(mut ran: ResMut<FixedStepRanThisFrame>) {
    **ran = true;
}

fn fixed_step_ran_this_frame(ran: Res<FixedStepRanThisFrame>) -> bool {
    **ran
}
