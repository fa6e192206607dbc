//! Vibration patterns: events, curve points, packages and the pattern builder.
//!
//! A pattern is an ordered list of events. Events must be time-ordered and
//! non-overlapping; the builder validates per-event ranges, the matcher
//! enforces ordering when the pattern is converted.

use crate::error::{Result, VibratorError};
use serde::Deserialize;

pub const EVENT_START_TIME_MAX: i32 = 1_800_000;
pub const EVENT_NUM_MAX: usize = 128;
pub const INTENSITY_MIN: i32 = 0;
pub const INTENSITY_MAX: i32 = 100;
pub const FREQUENCY_MIN: i32 = 0;
pub const FREQUENCY_MAX: i32 = 100;
pub const CONTINUOUS_DURATION_MAX: i32 = 5000;
pub const CURVE_POINT_NUM_MIN: usize = 4;
pub const CURVE_POINT_NUM_MAX: usize = 16;
pub const CURVE_POINT_INTENSITY_MAX: i32 = 100;
pub const CURVE_FREQUENCY_MIN: i32 = -100;
pub const CURVE_FREQUENCY_MAX: i32 = 100;
/// Curve point intensities are given as a 0.0–1.0 ratio.
const CURVE_INTENSITY_SCALE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VibrateTag {
    Continuous,
    Transient,
}

impl std::fmt::Display for VibrateTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VibrateTag::Continuous => f.write_str("continuous"),
            VibrateTag::Transient => f.write_str("transient"),
        }
    }
}

/// One sample of a continuous event's envelope. `time` is relative to the event start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct CurvePoint {
    pub time: i32,
    pub intensity: i32,
    pub frequency: i32,
}

/// One atomic waveform instruction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VibrateEvent {
    #[serde(rename = "type")]
    pub tag: VibrateTag,
    /// Offset from the start of the containing pattern, in ms.
    pub start_time: i32,
    /// 0 for transient events.
    #[serde(default)]
    pub duration: i32,
    #[serde(default)]
    pub intensity: i32,
    #[serde(default)]
    pub frequency: i32,
    #[serde(default)]
    pub points: Vec<CurvePoint>,
}

impl VibrateEvent {
    pub fn continuous(start_time: i32, duration: i32, intensity: i32, frequency: i32) -> Self {
        Self {
            tag: VibrateTag::Continuous,
            start_time,
            duration,
            intensity,
            frequency,
            points: Vec::new(),
        }
    }

    pub fn transient(start_time: i32, intensity: i32, frequency: i32) -> Self {
        Self {
            tag: VibrateTag::Transient,
            start_time,
            duration: 0,
            intensity,
            frequency,
            points: Vec::new(),
        }
    }

    pub fn with_points(mut self, points: Vec<CurvePoint>) -> Self {
        self.points = points;
        self
    }

    /// End of the event relative to the pattern start.
    pub fn end_time(&self) -> i32 {
        self.start_time.saturating_add(self.duration)
    }
}

/// An ordered sequence of events plus its offset inside a package.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VibratePattern {
    #[serde(default)]
    pub start_time: i32,
    pub events: Vec<VibrateEvent>,
}

impl VibratePattern {
    pub fn new(start_time: i32, events: Vec<VibrateEvent>) -> Self {
        Self { start_time, events }
    }

    /// End time of the last event, relative to the pattern start.
    /// Returns None for an empty pattern.
    pub fn end_time(&self) -> Option<i32> {
        self.events.last().map(VibrateEvent::end_time)
    }
}

/// Ordered patterns, typically decoded from a custom vibration file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct VibratorPackage {
    pub patterns: Vec<VibratePattern>,
}

impl VibratorPackage {
    pub fn new(patterns: Vec<VibratePattern>) -> Self {
        Self { patterns }
    }

    /// Reject packages the scheduler cannot play: no patterns, a pattern
    /// without events, or any event outside the builder's ranges.
    pub fn validate(&self) -> Result<()> {
        if self.patterns.is_empty() {
            return Err(VibratorError::Parameter("package has no patterns".into()));
        }
        for (i, pattern) in self.patterns.iter().enumerate() {
            if pattern.events.is_empty() {
                return Err(VibratorError::Parameter(format!("pattern {i} has no events")));
            }
            if !(0..=EVENT_START_TIME_MAX).contains(&pattern.start_time) {
                return Err(out_of_range("pattern time", pattern.start_time));
            }
            pattern.events.iter().try_for_each(check_event)?;
        }
        Ok(())
    }
}

/// Optional envelope point for `PatternBuilder::add_continuous_event`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointOptions {
    pub time: i32,
    /// 0.0–1.0
    pub intensity: f64,
    pub frequency: i32,
}

/// Optional parameters for `PatternBuilder::add_continuous_event`.
#[derive(Debug, Clone, Default)]
pub struct ContinuousOptions {
    pub intensity: i32,
    pub frequency: i32,
    pub points: Vec<PointOptions>,
}

/// Accumulates events and produces a validated `VibratePattern`.
#[derive(Debug, Default)]
pub struct PatternBuilder {
    events: Vec<VibrateEvent>,
}

impl PatternBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_continuous_event(
        &mut self,
        time: i32,
        duration: i32,
        options: ContinuousOptions,
    ) -> Result<&mut Self> {
        let points = options
            .points
            .iter()
            .map(|p| CurvePoint {
                time: p.time,
                intensity: (p.intensity * CURVE_INTENSITY_SCALE) as i32,
                frequency: p.frequency,
            })
            .collect();
        let event = VibrateEvent::continuous(time, duration, options.intensity, options.frequency)
            .with_points(points);
        check_event(&event)?;
        self.events.push(event);
        Ok(self)
    }

    /// `intensity` defaults to 0 when the caller omits it, as with continuous events.
    pub fn add_transient_event(
        &mut self,
        time: i32,
        frequency: i32,
        intensity: Option<i32>,
    ) -> Result<&mut Self> {
        let event = VibrateEvent::transient(time, intensity.unwrap_or(0), frequency);
        check_event(&event)?;
        self.events.push(event);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Produce the pattern. The builder is left empty so it can be reused.
    pub fn build(&mut self) -> Result<VibratePattern> {
        if self.events.is_empty() {
            return Err(VibratorError::Parameter("pattern has no events".into()));
        }
        if self.events.len() > EVENT_NUM_MAX {
            return Err(VibratorError::Parameter(format!(
                "too many events: {} (max {EVENT_NUM_MAX})",
                self.events.len()
            )));
        }
        Ok(VibratePattern::new(0, std::mem::take(&mut self.events)))
    }
}

fn out_of_range(what: &str, value: i32) -> VibratorError {
    log::error!("The event {what} is out of range, {what}:{value}");
    VibratorError::Parameter(format!("{what} out of range: {value}"))
}

/// Range checks applied to every event added through the builder.
fn check_event(event: &VibrateEvent) -> Result<()> {
    if !(0..=EVENT_START_TIME_MAX).contains(&event.start_time) {
        return Err(out_of_range("time", event.start_time));
    }
    if !(FREQUENCY_MIN..=FREQUENCY_MAX).contains(&event.frequency) {
        return Err(out_of_range("frequency", event.frequency));
    }
    if !(INTENSITY_MIN..=INTENSITY_MAX).contains(&event.intensity) {
        return Err(out_of_range("intensity", event.intensity));
    }
    if event.tag == VibrateTag::Transient {
        return Ok(());
    }
    if !(1..=CONTINUOUS_DURATION_MAX).contains(&event.duration) {
        return Err(out_of_range("duration", event.duration));
    }
    if event.points.is_empty() {
        return Ok(());
    }
    let count = event.points.len();
    if !(CURVE_POINT_NUM_MIN..=CURVE_POINT_NUM_MAX).contains(&count) {
        return Err(out_of_range("points size", count as i32));
    }
    if event.points.windows(2).any(|w| w[1].time < w[0].time) {
        log::error!("The curve point times are not ascending");
        return Err(VibratorError::Parameter("curve point times are not ascending".into()));
    }
    for point in &event.points {
        if !(0..=event.duration).contains(&point.time) {
            return Err(out_of_range("point time", point.time));
        }
        if !(0..=CURVE_POINT_INTENSITY_MAX).contains(&point.intensity) {
            return Err(out_of_range("point intensity", point.intensity));
        }
        if !(CURVE_FREQUENCY_MIN..=CURVE_FREQUENCY_MAX).contains(&point.frequency) {
            return Err(out_of_range("point frequency", point.frequency));
        }
    }
    Ok(())
}
