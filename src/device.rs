//! Hardware driver boundary.
//!
//! The playback worker is the only caller of a `VibratorDevice`; calls are
//! issued serially and are not preemptible. Implementations return
//! `VibratorError::DeviceOperationFailed` when the driver reports non-success.

use crate::config::PresetConfig;
use crate::effect::HdfCompositeEffect;
use crate::error::{Result, VibratorError};
use crate::pattern::VibratePattern;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Which kind of playback a stop call ends. Must match the call that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Ends `start_once`.
    Once,
    /// Ends `start` (preset effect).
    Preset,
}

impl StopMode {
    /// Parse the public mode tag ("time" / "preset").
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "time" => Some(StopMode::Once),
            "preset" => Some(StopMode::Preset),
            _ => None,
        }
    }
}

impl std::fmt::Display for StopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopMode::Once => f.write_str("once"),
            StopMode::Preset => f.write_str("preset"),
        }
    }
}

/// Driver-side description of a preset effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectInfo {
    pub duration_ms: u32,
}

pub trait VibratorDevice: Send + Sync {
    fn start_once(&self, duration_ms: u32) -> Result<()>;

    /// Start a named preset effect.
    fn start(&self, effect: &str) -> Result<()>;

    fn stop(&self, mode: StopMode) -> Result<()>;

    fn enable_composite_effect(&self, effect: &HdfCompositeEffect) -> Result<()>;

    /// HD haptic playback of a whole pattern.
    fn play_pattern(&self, _pattern: &VibratePattern) -> Result<()> {
        Err(VibratorError::NotSupported("hd haptic pattern playback".into()))
    }

    /// None when the driver does not know `effect`.
    fn effect_info(&self, effect: &str) -> Option<EffectInfo>;

    /// Start-up latency the driver adds before a vibration is felt, in ms.
    fn delay_time(&self) -> Result<u32> {
        Ok(0)
    }

    fn is_running(&self) -> bool;
}

/// Driver that performs no I/O and logs every call. Used when no real
/// vibrator is attached.
pub struct LoggingDevice {
    presets: HashMap<String, u32>,
    delay_time_ms: u32,
    running: AtomicBool,
}

impl LoggingDevice {
    pub fn new(presets: &[PresetConfig], delay_time_ms: u32) -> Self {
        Self {
            presets: presets.iter().map(|p| (p.name.clone(), p.duration_ms)).collect(),
            delay_time_ms,
            running: AtomicBool::new(false),
        }
    }
}

impl VibratorDevice for LoggingDevice {
    fn start_once(&self, duration_ms: u32) -> Result<()> {
        log::info!("StartOnce: {duration_ms}ms");
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn start(&self, effect: &str) -> Result<()> {
        if !self.presets.contains_key(effect) {
            log::warn!("Start: unknown preset effect {effect}");
            return Err(VibratorError::DeviceOperationFailed { op: "Start", code: -1 });
        }
        log::info!("Start: preset {effect}");
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self, mode: StopMode) -> Result<()> {
        log::info!("Stop: {mode}");
        self.running.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn enable_composite_effect(&self, effect: &HdfCompositeEffect) -> Result<()> {
        log::info!("EnableCompositeEffect: {} {} effect(s)", effect.len(), effect.effect_type);
        for e in &effect.effects {
            log::debug!("  {e:?}");
        }
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn play_pattern(&self, pattern: &VibratePattern) -> Result<()> {
        log::info!(
            "PlayPattern: start {}ms, {} event(s)",
            pattern.start_time,
            pattern.events.len()
        );
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn effect_info(&self, effect: &str) -> Option<EffectInfo> {
        self.presets.get(effect).map(|&duration_ms| EffectInfo { duration_ms })
    }

    fn delay_time(&self) -> Result<u32> {
        Ok(self.delay_time_ms)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}
