//! Engine configuration, read from TOML.
//! Every field has a default, so a missing file means a stock vibrator.

use crate::batcher::COMPOSITE_EFFECT_PART;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum composite effects per driver submission
    pub composite_effect_capacity: usize,
    pub custom: CustomConfig,
    /// Preset effects the driver exposes, with their playback length
    pub presets: Vec<PresetConfig>,
    /// Driver start-up latency reported to callers (ms)
    pub delay_time_ms: u32,
}

/// Which custom playback modes this device supports.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CustomConfig {
    pub hd: bool,
    pub predefined: bool,
    pub time: bool,
}

/// One named preset effect.
#[derive(Debug, Clone, Deserialize)]
pub struct PresetConfig {
    pub name: String,
    pub duration_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            composite_effect_capacity: COMPOSITE_EFFECT_PART,
            custom: CustomConfig::default(),
            presets: default_presets(),
            delay_time_ms: 0,
        }
    }
}

impl Default for CustomConfig {
    fn default() -> Self {
        Self {
            hd: false,
            predefined: true,
            time: true,
        }
    }
}

fn default_presets() -> Vec<PresetConfig> {
    [
        ("haptic.clock.timer", 2000),
        ("haptic.fail", 60),
        ("haptic.charging", 100),
        ("haptic.long_press.heavy", 80),
        ("haptic.long_press.medium", 80),
        ("haptic.long_press.light", 80),
        ("haptic.slide.light", 10),
        ("haptic.threshold", 42),
    ]
    .into_iter()
    .map(|(name, duration_ms)| PresetConfig { name: name.into(), duration_ms })
    .collect()
}

impl Config {
    /// Load config from the default config file path, or return defaults if not found.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    pub fn load_from(config_path: &str) -> Self {
        match std::fs::read_to_string(config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {config_path}");
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config file {config_path}: {e}. Using defaults.");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found at {config_path}. Using defaults.");
                Self::default()
            }
        }
    }
}

fn config_file_path() -> String {
    std::env::var("VIBRATORD_CONFIG").unwrap_or_else(|_| "vibratord.toml".into())
}
