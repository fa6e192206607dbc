//! Waveform matcher: vibration events → vendor composite effects.
//!
//! Predefined mode:
//!   Transient  → nearest primitive in a fixed waveform table (weighted L1 over intensity/frequency)
//!   Continuous → synthesized id: duration in the high 16 bits, offset frequency in the low bits
//!
//! Time mode:
//!   Every event becomes one or more `TimeEffect` pieces (curve points split a continuous event).
//!
//! Each effect's `delay` is the gap between the previous event's end and this
//! event's start. Overlapping or out-of-order events fail with a sequencing error.

use crate::effect::{CompositeEffect, EffectType, HdfCompositeEffect, PrimitiveEffect, TimeEffect};
use crate::error::{Result, VibratorError};
use crate::pattern::{VibratePattern, VibrateEvent, VibrateTag};

/// Reference waveform for transient matching.
#[derive(Debug, Clone, Copy)]
pub struct TransientWaveform {
    pub id: i32,
    pub intensity: i32,
    pub frequency: i32,
}

const fn waveform(id: i32, intensity: i32, frequency: i32) -> TransientWaveform {
    TransientWaveform { id, intensity, frequency }
}

/// Known transient primitives, ascending by id.
pub const TRANSIENT_WAVEFORMS: [TransientWaveform; 15] = [
    waveform(0x01, 0x4b, 0x35),
    waveform(0x02, 0x23, 0x32),
    waveform(0x03, 0x0d, 0x2e),
    waveform(0x04, 0x2f, 0x36),
    waveform(0x05, 0x17, 0x2f),
    waveform(0x06, 0x09, 0x26),
    waveform(0x11, 0x64, 0x32),
    waveform(0x12, 0x54, 0x3a),
    waveform(0x13, 0x2d, 0x33),
    waveform(0x14, 0x11, 0x30),
    waveform(0x15, 0x2f, 0x30),
    waveform(0x16, 0x23, 0x25),
    waveform(0x17, 0x14, 0x33),
    waveform(0x18, 0x1b, 0x2d),
    waveform(0x19, 0x11, 0x2f),
];

/// Resonant frequency of the actuator.
pub const F_RESONANCE: i32 = 245;
/// Usable band around the resonance; continuous frequencies are centred on it.
pub const BAND_WIDTH: i32 = 100;
const INTENSITY_WEIGHT: f32 = 0.5;
const FREQUENCY_WEIGHT: f32 = 0.5;
/// Playback length of a transient when rendered as a time series.
pub const TRANSIENT_VIBRATION_DURATION: i32 = 48;

/// Nearest transient waveform for (intensity, frequency), with its score.
///
/// Ties go to the later table entry (`<=` while scanning in ascending id order).
pub fn match_transient(intensity: i32, frequency: i32) -> (i32, f32) {
    let mut best = (TRANSIENT_WAVEFORMS[0].id, f32::MAX);
    for w in &TRANSIENT_WAVEFORMS {
        let score = INTENSITY_WEIGHT * (intensity - w.intensity).abs() as f32
            + FREQUENCY_WEIGHT * (frequency - w.frequency).abs() as f32;
        if score <= best.1 {
            best = (w.id, score);
        }
    }
    best
}

/// Effect id for a continuous event.
pub fn continuous_effect_id(duration: i32, frequency: i32) -> i32 {
    (duration << 16).saturating_add(frequency.saturating_add(F_RESONANCE - BAND_WIDTH / 2))
}

/// Inverse of `continuous_effect_id`: (duration, offset frequency).
pub fn decode_continuous_effect_id(effect_id: i32) -> (i32, i32) {
    (effect_id >> 16, effect_id & 0xFFFF)
}

/// Cursor over the previous event; produces delays and rejects overlaps.
#[derive(Debug, Default)]
struct Cursor {
    pre_start_time: i32,
    pre_duration: i32,
    seen: bool,
}

impl Cursor {
    /// Delay for `event` relative to the previous event's end.
    fn advance(&mut self, index: usize, event: &VibrateEvent) -> Result<i32> {
        let pre_end = self.pre_start_time.saturating_add(self.pre_duration);
        if self.seen && event.start_time < pre_end {
            log::error!(
                "Vibration events overlap: event {index} starts at {}ms, previous ends at {pre_end}ms",
                event.start_time
            );
            return Err(VibratorError::Sequencing(format!(
                "event {index} starts at {}ms before previous event ends at {pre_end}ms",
                event.start_time
            )));
        }
        let delay = event.start_time.saturating_sub(pre_end);
        self.pre_start_time = event.start_time;
        self.pre_duration = event.duration;
        self.seen = true;
        Ok(delay)
    }
}

/// Converts patterns into driver composite effects. Stateless between calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaveformMatcher;

impl WaveformMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Predefined mode: one `PrimitiveEffect` per event.
    pub fn transform_effect(&self, pattern: &VibratePattern) -> Result<HdfCompositeEffect> {
        let mut out = HdfCompositeEffect::new(EffectType::Primitive);
        let mut cursor = Cursor::default();
        for (i, event) in pattern.events.iter().enumerate() {
            let delay = cursor.advance(i, event)?;
            let primitive = match event.tag {
                VibrateTag::Continuous => PrimitiveEffect {
                    delay,
                    effect_id: continuous_effect_id(event.duration, event.frequency),
                    intensity: event.intensity,
                },
                VibrateTag::Transient => {
                    let (effect_id, score) = match_transient(event.intensity, event.frequency);
                    log::debug!(
                        "Transient ({}, {}) matched primitive 0x{effect_id:02x} (score {score})",
                        event.intensity,
                        event.frequency
                    );
                    PrimitiveEffect { delay, effect_id, intensity: event.intensity }
                }
            };
            out.effects.push(CompositeEffect::Primitive(primitive));
        }
        Ok(out)
    }

    /// Time mode: time-sampled pieces, one per event or per curve segment.
    pub fn transform_time(&self, pattern: &VibratePattern) -> Result<HdfCompositeEffect> {
        let mut out = HdfCompositeEffect::new(EffectType::Time);
        let mut cursor = Cursor::default();
        for (i, event) in pattern.events.iter().enumerate() {
            let delay = cursor.advance(i, event)?;
            match event.tag {
                VibrateTag::Transient => out.effects.push(CompositeEffect::Time(TimeEffect {
                    delay,
                    time: TRANSIENT_VIBRATION_DURATION,
                    intensity: event.intensity,
                    frequency: event.frequency,
                })),
                VibrateTag::Continuous if event.points.len() < 2 => {
                    out.effects.push(CompositeEffect::Time(TimeEffect {
                        delay,
                        time: event.duration,
                        intensity: event.intensity,
                        frequency: event.frequency,
                    }))
                }
                VibrateTag::Continuous => {
                    let mut piece_delay = delay;
                    for pair in event.points.windows(2) {
                        let time = pair[1].time.saturating_sub(pair[0].time);
                        out.effects.push(CompositeEffect::Time(TimeEffect {
                            delay: piece_delay,
                            time,
                            intensity: event.intensity.saturating_mul(pair[0].intensity) / 100,
                            frequency: event.frequency.saturating_add(pair[0].frequency),
                        }));
                        piece_delay = time;
                    }
                }
            }
        }
        Ok(out)
    }
}
