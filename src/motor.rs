//! Velocity changes expressed the way a rigid body receives them.

use crate::prelude::*;

/// Continuous force over one step.
pub(crate) fn apply_force(velocity: &mut Vec3, force: Vec3, mass: f32, dt: f32) {
    *velocity += force / mass * dt;
}

/// Instantaneous change of momentum.
pub(crate) fn apply_impulse(velocity: &mut Vec3, impulse: Vec3, mass: f32) {
    *velocity += impulse / mass;
}

/// Linear damping, never reversing the direction of travel.
pub(crate) fn apply_drag(velocity: &mut Vec3, drag: f32, dt: f32) {
    *velocity *= (1.0 - drag * dt).max(0.0);
}

/// Limits the horizontal speed to `max` while leaving the vertical speed untouched.
pub(crate) fn clamp_flat_speed(velocity: &mut Vec3, max: f32) {
    let flat = velocity.xz();
    if flat.length_squared() > max * max {
        let limited = flat.normalize() * max;
        velocity.x = limited.x;
        velocity.z = limited.y;
    }
}

pub(crate) fn flat_speed(velocity: Vec3) -> f32 {
    velocity.xz().length()
}
