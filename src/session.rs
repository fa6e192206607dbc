//! Vibration session: the record shared by the request-accepting path and
//! the playback worker.
//!
//! Two independent locks:
//!   `current`: the active request and its playback state
//!   `exit`: the cancellation flag; every timed wait blocks on its condvar
//!
//! Cancellation is level-triggered: once raised the flag stays raised until
//! the next request clears it.

use crate::error::VibratorError;
use crate::pattern::VibratorPackage;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Why the caller is vibrating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VibratorUsage {
    #[default]
    Unknown,
    Alarm,
    Ring,
    Notification,
    Communication,
    Touch,
    Media,
    PhysicalFeedback,
    SimulateReality,
}

impl TryFrom<i32> for VibratorUsage {
    type Error = VibratorError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => VibratorUsage::Unknown,
            1 => VibratorUsage::Alarm,
            2 => VibratorUsage::Ring,
            3 => VibratorUsage::Notification,
            4 => VibratorUsage::Communication,
            5 => VibratorUsage::Touch,
            6 => VibratorUsage::Media,
            7 => VibratorUsage::PhysicalFeedback,
            8 => VibratorUsage::SimulateReality,
            _ => return Err(VibratorError::Parameter(format!("invalid usage: {value}"))),
        })
    }
}

/// How a custom package is rendered on the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomKind {
    /// Whole patterns handed to an HD haptic driver.
    Hd,
    /// Events matched to predefined primitive waveforms.
    Predefined,
    /// Events rendered as time-sampled pieces.
    Time,
}

impl CustomKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hd" => Some(CustomKind::Hd),
            "predefined" => Some(CustomKind::Predefined),
            "time" => Some(CustomKind::Time),
            _ => None,
        }
    }
}

/// The requested playback strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VibrateMode {
    /// Single fixed-duration vibration.
    Time { duration_ms: u32 },
    /// A named preset effect, repeated `count` times.
    Preset { effect: String, duration_ms: u32, count: u32 },
    Custom { kind: CustomKind, package: Arc<VibratorPackage> },
}

impl VibrateMode {
    /// Public mode tag, as used in logs and stop requests.
    pub fn tag(&self) -> &'static str {
        match self {
            VibrateMode::Time { .. } => "time",
            VibrateMode::Preset { .. } => "preset",
            VibrateMode::Custom { kind: CustomKind::Hd, .. } => "custom.hd",
            VibrateMode::Custom { kind: CustomKind::Predefined, .. } => "custom.predefined",
            VibrateMode::Custom { kind: CustomKind::Time, .. } => "custom.time",
        }
    }
}

/// One vibration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VibrateInfo {
    pub mode: VibrateMode,
    pub package_name: String,
    pub usage: VibratorUsage,
}

impl VibrateInfo {
    pub fn new(mode: VibrateMode, package_name: impl Into<String>) -> Self {
        Self { mode, package_name: package_name.into(), usage: VibratorUsage::Unknown }
    }

    pub fn with_usage(mut self, usage: VibratorUsage) -> Self {
        self.usage = usage;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing(&'static str),
    Completed,
    Cancelled,
    Failed,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => f.write_str("idle"),
            PlaybackState::Playing(mode) => write!(f, "playing({mode})"),
            PlaybackState::Completed => f.write_str("completed"),
            PlaybackState::Cancelled => f.write_str("cancelled"),
            PlaybackState::Failed => f.write_str("failed"),
        }
    }
}

struct Current {
    info: Option<VibrateInfo>,
    state: PlaybackState,
}

pub struct VibrationSession {
    current: Mutex<Current>,
    exit: Mutex<bool>,
    cv: Condvar,
}

impl Default for VibrationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl VibrationSession {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Current { info: None, state: PlaybackState::Idle }),
            exit: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    /// Replace the current request wholesale. Playback state returns to Idle.
    pub fn update_vibrator_effect(&self, info: VibrateInfo) {
        let mut current = self.current.lock();
        current.info = Some(info);
        current.state = PlaybackState::Idle;
    }

    /// Copy of the current request.
    pub fn current_vibrate_info(&self) -> Option<VibrateInfo> {
        self.current.lock().info.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.current.lock().state
    }

    pub(crate) fn set_state(&self, state: PlaybackState) {
        self.current.lock().state = state;
    }

    /// Raise or clear the cancellation flag. Raising wakes any pending wait.
    pub fn set_exit_status(&self, status: bool) {
        let mut exit = self.exit.lock();
        *exit = status;
        if status {
            self.cv.notify_all();
        }
    }

    pub fn is_exiting(&self) -> bool {
        *self.exit.lock()
    }

    /// Sleep up to `ms`, returning early when the exit flag is raised.
    /// Returns true if the flag is raised on return.
    pub fn wait_for(&self, ms: u64) -> bool {
        let mut exit = self.exit.lock();
        if ms > 0 && !*exit {
            self.cv.wait_while_for(&mut exit, |exit| !*exit, Duration::from_millis(ms));
        }
        *exit
    }
}
