//! Playback scheduler: drives the current request to completion on the device.
//!
//! Strategies by mode:
//!   time              → start_once, wait duration, stop(Once)
//!   preset            → count × (start, wait duration, stop(Preset))
//!   custom.hd         → per pattern: play_pattern, wait until the next pattern starts
//!   custom.predefined → per pattern: matcher → batcher → submit + wait per batch
//!   custom.time       → same as predefined with the time-series transform
//!
//! Every wait is a bounded condvar wait on the session's exit flag. The flag
//! is checked before each hardware submission; an in-flight driver call is
//! never interrupted. Cancellation ends playback cleanly with
//! `PlaybackOutcome::Cancelled`; errors abort the whole request.

use crate::batcher::{EffectBatch, EffectBatcher};
use crate::device::{StopMode, VibratorDevice};
use crate::effect::HdfCompositeEffect;
use crate::error::{Result, VibratorError};
use crate::matcher::WaveformMatcher;
use crate::pattern::{VibratePattern, VibratorPackage};
use crate::session::{CustomKind, PlaybackState, VibrateInfo, VibrateMode, VibrationSession};
use std::sync::Arc;

/// How a playback that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Cancelled,
}

pub struct PlaybackScheduler {
    session: Arc<VibrationSession>,
    device: Arc<dyn VibratorDevice>,
    matcher: WaveformMatcher,
    batcher: EffectBatcher,
}

impl PlaybackScheduler {
    pub fn new(session: Arc<VibrationSession>, device: Arc<dyn VibratorDevice>, batcher: EffectBatcher) -> Self {
        Self {
            session,
            device,
            matcher: WaveformMatcher::new(),
            batcher,
        }
    }

    /// Play the session's current request.
    pub fn run(&self) -> Result<PlaybackOutcome> {
        let Some(info) = self.session.current_vibrate_info() else {
            log::error!("No vibration request to play");
            return Err(VibratorError::Parameter("no vibration request".into()));
        };
        let tag = info.mode.tag();
        self.session.set_state(PlaybackState::Playing(tag));
        log::debug!("Playing {tag} vibration, package:{}", info.package_name);

        let result = match &info.mode {
            VibrateMode::Time { duration_ms } => self.play_once(&info, *duration_ms),
            VibrateMode::Preset { effect, duration_ms, count } => {
                self.play_effect(&info, effect, *duration_ms, *count)
            }
            VibrateMode::Custom { kind: CustomKind::Hd, package } => self.play_custom_hd(&info, package),
            VibrateMode::Custom { kind: CustomKind::Predefined, package } => {
                self.play_custom_composite(&info, package, |p| self.matcher.transform_effect(p))
            }
            VibrateMode::Custom { kind: CustomKind::Time, package } => {
                self.play_custom_composite(&info, package, |p| self.matcher.transform_time(p))
            }
        };

        let state = match &result {
            Ok(PlaybackOutcome::Completed) => PlaybackState::Completed,
            Ok(PlaybackOutcome::Cancelled) => PlaybackState::Cancelled,
            Err(e) => {
                log::error!("Play {tag} vibration fail, package:{}: {e}", info.package_name);
                PlaybackState::Failed
            }
        };
        self.session.set_state(state);
        result
    }

    fn play_once(&self, info: &VibrateInfo, duration_ms: u32) -> Result<PlaybackOutcome> {
        if let Err(e) = self.device.start_once(duration_ms) {
            log::error!("StartOnce fail, duration:{duration_ms}");
            return Err(e);
        }
        let cancelled = self.session.wait_for(u64::from(duration_ms));
        self.stop(StopMode::Once);
        if cancelled {
            log::info!("Stop duration:{duration_ms}, package:{}", info.package_name);
            return Ok(PlaybackOutcome::Cancelled);
        }
        Ok(PlaybackOutcome::Completed)
    }

    fn play_effect(&self, info: &VibrateInfo, effect: &str, duration_ms: u32, count: u32) -> Result<PlaybackOutcome> {
        for _ in 0..count {
            if self.session.is_exiting() {
                return Ok(PlaybackOutcome::Cancelled);
            }
            if let Err(e) = self.device.start(effect) {
                log::error!("Vibrate effect {effect} failed");
                return Err(e);
            }
            let cancelled = self.session.wait_for(u64::from(duration_ms));
            self.stop(StopMode::Preset);
            if cancelled {
                log::info!("Stop effect:{effect}, package:{}", info.package_name);
                return Ok(PlaybackOutcome::Cancelled);
            }
        }
        Ok(PlaybackOutcome::Completed)
    }

    fn play_custom_hd(&self, info: &VibrateInfo, package: &VibratorPackage) -> Result<PlaybackOutcome> {
        package.validate()?;
        let patterns = &package.patterns;
        for (i, pattern) in patterns.iter().enumerate() {
            if self.session.is_exiting() {
                log::info!("Stop hd haptic, package:{}", info.package_name);
                return Ok(PlaybackOutcome::Cancelled);
            }
            if let Err(e) = self.device.play_pattern(pattern) {
                log::error!("Vibrate custom vibration by hd haptic failed");
                return Err(e);
            }
            let delay = hd_pattern_delay(patterns, i);
            if self.session.wait_for(delay) {
                log::info!("Stop hd haptic, package:{}", info.package_name);
                return Ok(PlaybackOutcome::Cancelled);
            }
        }
        Ok(PlaybackOutcome::Completed)
    }

    fn play_custom_composite<F>(&self, info: &VibrateInfo, package: &VibratorPackage, transform: F) -> Result<PlaybackOutcome>
    where
        F: Fn(&VibratePattern) -> Result<HdfCompositeEffect>,
    {
        package.validate()?;
        let patterns = &package.patterns;
        // Convert everything up front: a bad segment fails before the device is touched.
        let mut segments: Vec<Vec<EffectBatch>> = Vec::with_capacity(patterns.len());
        for (i, pattern) in patterns.iter().enumerate() {
            let effect = transform(pattern).inspect_err(|_| {
                log::error!("Transform pattern {i} fail, mode:{}", info.mode.tag());
            })?;
            segments.push(self.batcher.split(&effect)?);
        }

        for (i, batches) in segments.iter().enumerate() {
            if self.play_composite_effect(batches)? == PlaybackOutcome::Cancelled {
                log::info!("Stop composite effect, package:{}", info.package_name);
                return Ok(PlaybackOutcome::Cancelled);
            }
            let waited = batches.iter().fold(0i32, |acc, b| acc.saturating_add(b.delay_ms));
            if self.session.wait_for(composite_pattern_delay(patterns, i, waited)) {
                log::info!("Stop composite effect, package:{}", info.package_name);
                return Ok(PlaybackOutcome::Cancelled);
            }
        }
        Ok(PlaybackOutcome::Completed)
    }

    /// Submit each batch, then wait out its accumulated delay.
    fn play_composite_effect(&self, batches: &[EffectBatch]) -> Result<PlaybackOutcome> {
        for batch in batches {
            if self.session.is_exiting() {
                return Ok(PlaybackOutcome::Cancelled);
            }
            if let Err(e) = self.device.enable_composite_effect(&batch.effect) {
                log::error!("EnableCompositeEffect failed");
                return Err(e);
            }
            if self.session.wait_for(ms(batch.delay_ms)) {
                log::info!("Stop composite effect part");
                return Ok(PlaybackOutcome::Cancelled);
            }
        }
        Ok(PlaybackOutcome::Completed)
    }

    /// Stop failures are logged, not propagated: the vibration is over either way.
    fn stop(&self, mode: StopMode) {
        if let Err(e) = self.device.stop(mode) {
            log::warn!("Stop {mode} failed: {e}");
        }
    }
}

fn ms(value: i32) -> u64 {
    value.max(0) as u64
}

/// HD patterns play asynchronously on the driver: wait start-to-start, or the
/// last pattern's length.
fn hd_pattern_delay(patterns: &[VibratePattern], i: usize) -> u64 {
    match patterns.get(i + 1) {
        Some(next) => ms(next.start_time.saturating_sub(patterns[i].start_time)),
        None => ms(patterns[i].end_time().unwrap_or(0)),
    }
}

/// Same spacing as hd, less the `waited` ms already spent in pattern `i`'s
/// batch waits. The last pattern still waits its full length.
fn composite_pattern_delay(patterns: &[VibratePattern], i: usize, waited: i32) -> u64 {
    match patterns.get(i + 1) {
        Some(next) => ms(next.start_time.saturating_sub(patterns[i].start_time).saturating_sub(waited)),
        None => ms(patterns[i].end_time().unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::{Call, RecordingDevice};
    use crate::pattern::VibrateEvent;
    use std::time::{Duration, Instant};

    fn setup(device: RecordingDevice) -> (Arc<VibrationSession>, Arc<RecordingDevice>, PlaybackScheduler) {
        let session = Arc::new(VibrationSession::new());
        let device = Arc::new(device);
        let scheduler = PlaybackScheduler::new(Arc::clone(&session), device.clone(), EffectBatcher::default());
        (session, device, scheduler)
    }

    fn custom(kind: CustomKind, patterns: Vec<VibratePattern>) -> VibrateInfo {
        let package = Arc::new(VibratorPackage::new(patterns));
        VibrateInfo::new(VibrateMode::Custom { kind, package }, "com.example.test")
    }

    fn scenario_pattern(start_time: i32) -> VibratePattern {
        VibratePattern::new(
            start_time,
            vec![VibrateEvent::continuous(0, 20, 50, 0), VibrateEvent::transient(30, 75, 53)],
        )
    }

    /// Raise the exit flag after `after` on a helper thread.
    fn cancel_after(session: &Arc<VibrationSession>, after: Duration) -> std::thread::JoinHandle<Instant> {
        let session = Arc::clone(session);
        std::thread::spawn(move || {
            std::thread::sleep(after);
            session.set_exit_status(true);
            Instant::now()
        })
    }

    #[test]
    fn run_without_request_fails() {
        let (_, _, scheduler) = setup(RecordingDevice::new());
        assert!(matches!(scheduler.run(), Err(VibratorError::Parameter(_))));
    }

    #[test]
    fn time_mode_completes_and_stops_once() {
        let (session, device, scheduler) = setup(RecordingDevice::new());
        session.update_vibrator_effect(VibrateInfo::new(VibrateMode::Time { duration_ms: 30 }, "pkg"));
        assert_eq!(scheduler.run().unwrap(), PlaybackOutcome::Completed);
        assert_eq!(device.calls(), vec![Call::StartOnce(30), Call::Stop(StopMode::Once)]);
        assert_eq!(session.state(), PlaybackState::Completed);
    }

    #[test]
    fn time_mode_cancel_cuts_wait_short() {
        let (session, device, scheduler) = setup(RecordingDevice::new());
        session.update_vibrator_effect(VibrateInfo::new(VibrateMode::Time { duration_ms: 10_000 }, "pkg"));
        let start = Instant::now();
        let canceller = cancel_after(&session, Duration::from_millis(50));
        assert_eq!(scheduler.run().unwrap(), PlaybackOutcome::Cancelled);
        canceller.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        // Hardware is still stopped on cancellation
        assert_eq!(device.calls().last(), Some(&Call::Stop(StopMode::Once)));
        assert_eq!(session.state(), PlaybackState::Cancelled);
    }

    #[test]
    fn time_mode_start_failure_is_reported() {
        let device = RecordingDevice::new();
        device.fail_start_once();
        let (session, device, scheduler) = setup(device);
        session.update_vibrator_effect(VibrateInfo::new(VibrateMode::Time { duration_ms: 30 }, "pkg"));
        let err = scheduler.run().unwrap_err();
        assert!(matches!(err, VibratorError::DeviceOperationFailed { op: "StartOnce", .. }));
        assert!(device.calls().is_empty());
        assert_eq!(session.state(), PlaybackState::Failed);
    }

    #[test]
    fn preset_loops_with_preset_stop_tag() {
        let (session, device, scheduler) = setup(RecordingDevice::new());
        let mode = VibrateMode::Preset { effect: "haptic.fail".into(), duration_ms: 10, count: 3 };
        session.update_vibrator_effect(VibrateInfo::new(mode, "pkg"));
        assert_eq!(scheduler.run().unwrap(), PlaybackOutcome::Completed);
        let calls = device.calls();
        assert_eq!(calls.len(), 6);
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::Start(_))).count(), 3);
        assert_eq!(calls.iter().filter(|c| **c == Call::Stop(StopMode::Preset)).count(), 3);
        assert!(!calls.contains(&Call::Stop(StopMode::Once)));
    }

    #[test]
    fn preset_cancel_stops_loop() {
        let (session, device, scheduler) = setup(RecordingDevice::new());
        let mode = VibrateMode::Preset { effect: "haptic.clock.timer".into(), duration_ms: 5_000, count: 5 };
        session.update_vibrator_effect(VibrateInfo::new(mode, "pkg"));
        let canceller = cancel_after(&session, Duration::from_millis(50));
        assert_eq!(scheduler.run().unwrap(), PlaybackOutcome::Cancelled);
        canceller.join().unwrap();
        assert_eq!(
            device.calls(),
            vec![Call::Start("haptic.clock.timer".into()), Call::Stop(StopMode::Preset)]
        );
    }

    #[test]
    fn preset_start_failure_aborts() {
        let device = RecordingDevice::new();
        device.fail_start();
        let (session, _, scheduler) = setup(device);
        let mode = VibrateMode::Preset { effect: "haptic.fail".into(), duration_ms: 10, count: 2 };
        session.update_vibrator_effect(VibrateInfo::new(mode, "pkg"));
        assert!(scheduler.run().is_err());
        assert_eq!(session.state(), PlaybackState::Failed);
    }

    #[test]
    fn predefined_submits_each_pattern_in_order() {
        let (session, device, scheduler) = setup(RecordingDevice::new());
        session.update_vibrator_effect(custom(
            CustomKind::Predefined,
            vec![scenario_pattern(0), scenario_pattern(60)],
        ));
        assert_eq!(scheduler.run().unwrap(), PlaybackOutcome::Completed);
        let calls = device.calls();
        assert_eq!(calls.len(), 2);
        for call in &calls {
            let Call::Composite(effect) = call else { panic!("unexpected call {call:?}") };
            assert_eq!(effect.len(), 2);
            assert_eq!(effect.effects[1].delay(), 10);
        }
    }

    #[test]
    fn time_series_mode_uses_time_effects() {
        let (session, device, scheduler) = setup(RecordingDevice::new());
        session.update_vibrator_effect(custom(CustomKind::Time, vec![scenario_pattern(0)]));
        assert_eq!(scheduler.run().unwrap(), PlaybackOutcome::Completed);
        let calls = device.calls();
        let Some(Call::Composite(effect)) = calls.first() else { panic!("no composite submission") };
        assert_eq!(effect.effect_type, crate::effect::EffectType::Time);
    }

    #[test]
    fn large_pattern_is_batched_and_waits_between_batches() {
        let (session, device, scheduler) = setup(RecordingDevice::new());
        let events = (0..300).map(|t| VibrateEvent::transient(t, 50, 50)).collect();
        session.update_vibrator_effect(custom(CustomKind::Predefined, vec![VibratePattern::new(0, events)]));
        assert_eq!(scheduler.run().unwrap(), PlaybackOutcome::Completed);

        let submissions: Vec<(Instant, usize)> = device
            .timed_calls()
            .into_iter()
            .filter_map(|(at, c)| match c {
                Call::Composite(e) => Some((at, e.len())),
                _ => None,
            })
            .collect();
        let sizes: Vec<usize> = submissions.iter().map(|(_, n)| *n).collect();
        assert_eq!(sizes, vec![128, 128, 44]);
        // First batch carries 127ms of delay (first event has none)
        assert!(submissions[1].0.duration_since(submissions[0].0) >= Duration::from_millis(120));
        assert!(submissions[2].0.duration_since(submissions[1].0) >= Duration::from_millis(120));
    }

    #[test]
    fn no_submission_after_cancel() {
        let (session, device, scheduler) = setup(RecordingDevice::new());
        let patterns = (0..20).map(|i| scenario_pattern(i * 200)).collect();
        session.update_vibrator_effect(custom(CustomKind::Predefined, patterns));
        let canceller = cancel_after(&session, Duration::from_millis(250));
        assert_eq!(scheduler.run().unwrap(), PlaybackOutcome::Cancelled);
        let cancelled_at = canceller.join().unwrap();
        let count = device.composite_count();
        assert!(count >= 1 && count < 20);
        assert!(device.timed_calls().iter().all(|(at, _)| *at <= cancelled_at));
    }

    #[test]
    fn submission_failure_aborts_whole_package() {
        let device = RecordingDevice::new();
        device.fail_composite_at(1);
        let (session, device, scheduler) = setup(device);
        session.update_vibrator_effect(custom(
            CustomKind::Predefined,
            vec![scenario_pattern(0), scenario_pattern(60), scenario_pattern(120)],
        ));
        let err = scheduler.run().unwrap_err();
        assert!(matches!(err, VibratorError::DeviceOperationFailed { .. }));
        assert_eq!(device.composite_count(), 1);
        assert_eq!(session.state(), PlaybackState::Failed);
    }

    #[test]
    fn overlapping_segment_fails_before_any_submission() {
        let (session, device, scheduler) = setup(RecordingDevice::new());
        let bad = VibratePattern::new(
            100,
            vec![VibrateEvent::continuous(0, 50, 50, 0), VibrateEvent::continuous(40, 50, 50, 0)],
        );
        session.update_vibrator_effect(custom(CustomKind::Predefined, vec![scenario_pattern(0), bad]));
        let err = scheduler.run().unwrap_err();
        assert!(matches!(err, VibratorError::Sequencing(_)));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn empty_package_is_a_parameter_error() {
        let (session, _, scheduler) = setup(RecordingDevice::new());
        session.update_vibrator_effect(custom(CustomKind::Predefined, vec![]));
        assert!(matches!(scheduler.run(), Err(VibratorError::Parameter(_))));
    }

    #[test]
    fn hd_mode_plays_whole_patterns() {
        let (session, device, scheduler) = setup(RecordingDevice::new());
        session.update_vibrator_effect(custom(CustomKind::Hd, vec![scenario_pattern(0), scenario_pattern(40)]));
        assert_eq!(scheduler.run().unwrap(), PlaybackOutcome::Completed);
        let calls = device.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| matches!(c, Call::Pattern(_))));
    }

    /// Instants of every submission matching `pick`.
    fn submitted_at(device: &RecordingDevice, pick: fn(&Call) -> bool) -> Vec<Instant> {
        device.timed_calls().into_iter().filter(|(_, c)| pick(c)).map(|(at, _)| at).collect()
    }

    fn long_then_gap() -> Vec<VibratePattern> {
        vec![
            VibratePattern::new(0, vec![VibrateEvent::continuous(0, 500, 50, 0)]),
            VibratePattern::new(600, vec![VibrateEvent::transient(0, 50, 50)]),
        ]
    }

    #[test]
    fn composite_segments_are_spaced_by_start_time() {
        for kind in [CustomKind::Predefined, CustomKind::Time, CustomKind::Hd] {
            let (session, device, scheduler) = setup(RecordingDevice::new());
            session.update_vibrator_effect(custom(kind, long_then_gap()));
            assert_eq!(scheduler.run().unwrap(), PlaybackOutcome::Completed);
            let at = submitted_at(&device, |c| matches!(c, Call::Composite(_) | Call::Pattern(_)));
            assert_eq!(at.len(), 2, "{kind:?}");
            let gap = at[1].duration_since(at[0]);
            assert!(gap >= Duration::from_millis(580), "{kind:?}: second segment after {gap:?}");
            assert!(gap < Duration::from_millis(1500), "{kind:?}: second segment after {gap:?}");
        }
    }

    #[test]
    fn hd_cancel_cuts_segment_wait_short() {
        let (session, device, scheduler) = setup(RecordingDevice::new());
        let patterns = (0..5).map(|i| scenario_pattern(i * 5_000)).collect();
        session.update_vibrator_effect(custom(CustomKind::Hd, patterns));
        let start = Instant::now();
        let canceller = cancel_after(&session, Duration::from_millis(100));
        assert_eq!(scheduler.run().unwrap(), PlaybackOutcome::Cancelled);
        let cancelled_at = canceller.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        let played = submitted_at(&device, |c| matches!(c, Call::Pattern(_)));
        assert_eq!(played.len(), 1);
        assert!(played.iter().all(|at| *at <= cancelled_at));
        assert_eq!(session.state(), PlaybackState::Cancelled);
    }

    #[test]
    fn segment_delays() {
        let patterns = vec![scenario_pattern(0), scenario_pattern(100)];
        // scenario pattern ends at 30 (transient at 30, duration 0)
        assert_eq!(hd_pattern_delay(&patterns, 0), 100);
        assert_eq!(hd_pattern_delay(&patterns, 1), 30);
        // Batch waits of the scenario pattern sum to 10ms
        assert_eq!(composite_pattern_delay(&patterns, 0, 10), 90);
        assert_eq!(composite_pattern_delay(&patterns, 1, 10), 30);
        // Segments closer than the batch waits never produce a negative wait
        let tight = vec![scenario_pattern(0), scenario_pattern(5)];
        assert_eq!(composite_pattern_delay(&tight, 0, 10), 0);
    }
}
