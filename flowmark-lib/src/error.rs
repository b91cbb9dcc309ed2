use flowmark_meter::MeterError;
use thiserror::Error;

/// Errors surfaced by the table-action control plane.
///
/// The data plane has no error category: undefined input produces undefined
/// metering, never an error return.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("invalid argument: {0}")]
    Invalid(&'static str),

    #[error("unsupported configuration: {0}")]
    Unsupported(&'static str),

    #[error("profile is already frozen")]
    Frozen,

    #[error("profile is not frozen")]
    NotFrozen,

    #[error("meter profile {0} already exists")]
    Exists(u32),

    #[error("meter profile table is full")]
    NoSpace,

    #[error("meter error: {0}")]
    Meter(#[from] MeterError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ActionError {
    /// Negative errno value for embedders speaking the pipeline's C-style
    /// convention.
    pub fn errno(&self) -> i32 {
        match self {
            ActionError::Invalid(_) | ActionError::Config(_) | ActionError::Meter(_) => -22,
            ActionError::Unsupported(_) => -95,
            ActionError::Frozen | ActionError::NotFrozen => -16,
            ActionError::Exists(_) => -17,
            ActionError::NoSpace => -28,
        }
    }
}

pub type Result<T> = std::result::Result<T, ActionError>;
