use thiserror::Error;

/// A tuning value that would make the controller misbehave.
///
/// Returned by the `validate` methods of the configuration components and logged
/// when a [`CharacterController`](crate::CharacterController) is added.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("`{field}` must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("sprint speed {sprint} is slower than walk speed {walk}")]
    SprintSlowerThanWalk { walk: f32, sprint: f32 },
    #[error("crouch height {crouch} does not fit below the standing height {standing}")]
    CrouchTooTall { crouch: f32, standing: f32 },
}

impl ConfigError {
    pub(crate) fn ensure_positive(field: &'static str, value: f32) -> Result<(), Self> {
        if value > 0.0 {
            Ok(())
        } else {
            Err(Self::NonPositive { field, value })
        }
    }
}
