use thiserror::Error;

/// Failures that end a run before the trigger loop starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("invalid region: LT=({left},{top}) must be above/left of BR=({right},{bottom})")]
    InvalidRegion {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },
    #[error("cancelled by operator")]
    Cancelled,
}
