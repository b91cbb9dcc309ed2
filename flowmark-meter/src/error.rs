use thiserror::Error;

/// Errors raised while building a meter profile.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterError {
    #[error("peak rate is below the committed rate")]
    PeakBelowCommitted,

    #[error("timer frequency cannot be zero")]
    ZeroFrequency,
}
