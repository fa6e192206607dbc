//! Error types for the vibrator engine.
//!
//! Cancellation is not represented here: a cancelled playback is a clean stop
//! and is reported through `PlaybackOutcome::Cancelled`.

use thiserror::Error;

/// Public error code for invalid parameters.
pub const PARAMETER_ERROR: i32 = 401;
/// Public error code for capabilities absent on this device or build.
pub const IS_NOT_SUPPORTED: i32 = 801;
/// Public error code for a failed hardware operation.
pub const DEVICE_OPERATION_FAILED: i32 = 14600101;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VibratorError {
    /// Malformed request, event or mode.
    #[error("Invalid parameter: {0}")]
    Parameter(String),

    /// Events overlap, or a batch mixes effect kinds.
    #[error("Sequencing error: {0}")]
    Sequencing(String),

    /// The hardware driver returned non-success.
    #[error("Device operation {op} failed with status {code}")]
    DeviceOperationFailed { op: &'static str, code: i32 },

    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A custom vibration file could not be decoded.
    #[error("Failed to decode vibration package: {0}")]
    Decode(String),
}

impl VibratorError {
    /// Error code surfaced to the requesting caller.
    pub fn code(&self) -> i32 {
        match self {
            VibratorError::Parameter(_)
            | VibratorError::Sequencing(_)
            | VibratorError::Decode(_) => PARAMETER_ERROR,
            VibratorError::NotSupported(_) => IS_NOT_SUPPORTED,
            VibratorError::DeviceOperationFailed { .. } => DEVICE_OPERATION_FAILED,
        }
    }
}

pub type Result<T> = std::result::Result<T, VibratorError>;
