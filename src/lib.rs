//! Vibrator playback engine.
//!
//! Converts structured vibration descriptions into driver primitives and
//! plays them on a single worker thread, cancellable at every wait.

pub mod batcher;
pub mod config;
pub mod decoder;
pub mod device;
pub mod effect;
pub mod error;
pub mod matcher;
pub mod pattern;
pub mod scheduler;
pub mod service;
pub mod session;

pub use error::{Result, VibratorError};
pub use scheduler::{PlaybackOutcome, PlaybackScheduler};
pub use service::{VibrateAttribute, VibratorService};
