//! Vibrator service: the request-accepting side of the engine.
//!
//! One playback worker thread at a time. A new request raises the exit flag,
//! joins the in-flight worker, installs the new request in the session and
//! spawns a fresh worker. Callers receive a oneshot receiver that resolves
//! with the playback result.
//!
//! Request methods block until the previous playback has stopped. From async
//! code, call them through `tokio::task::spawn_blocking`.

use crate::batcher::EffectBatcher;
use crate::config::Config;
use crate::device::{StopMode, VibratorDevice};
use crate::error::{Result, VibratorError};
use crate::pattern::{VibratePattern, VibratorPackage};
use crate::scheduler::{PlaybackOutcome, PlaybackScheduler};
use crate::session::{CustomKind, PlaybackState, VibrateInfo, VibrateMode, VibrationSession, VibratorUsage};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;

/// Resolves when the playback started by a request ends.
pub type Completion = oneshot::Receiver<Result<PlaybackOutcome>>;

/// Who is vibrating, and why.
#[derive(Debug, Clone, Default)]
pub struct VibrateAttribute {
    pub package_name: String,
    pub usage: VibratorUsage,
}

impl VibrateAttribute {
    pub fn new(package_name: impl Into<String>, usage: VibratorUsage) -> Self {
        Self { package_name: package_name.into(), usage }
    }
}

pub struct VibratorService {
    session: Arc<VibrationSession>,
    device: Arc<dyn VibratorDevice>,
    config: Config,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl VibratorService {
    pub fn new(device: Arc<dyn VibratorDevice>, config: Config) -> Self {
        Self {
            session: Arc::new(VibrationSession::new()),
            device,
            config,
            worker: Mutex::new(None),
        }
    }

    /// Vibrate for a fixed duration.
    pub fn vibrate(&self, duration_ms: i32, attr: &VibrateAttribute) -> Result<Completion> {
        if duration_ms <= 0 {
            return Err(VibratorError::Parameter(format!("invalid duration: {duration_ms}")));
        }
        let mode = VibrateMode::Time { duration_ms: duration_ms as u32 };
        Ok(self.start(self.request(mode, attr)))
    }

    /// Play a named preset effect `count` times.
    pub fn play_effect(&self, effect: &str, count: i32, attr: &VibrateAttribute) -> Result<Completion> {
        if count < 1 {
            return Err(VibratorError::Parameter(format!("invalid loop count: {count}")));
        }
        let Some(info) = self.device.effect_info(effect) else {
            log::warn!("Effect {effect} not supported, package:{}", attr.package_name);
            return Err(VibratorError::NotSupported(format!("effect {effect}")));
        };
        let mode = VibrateMode::Preset {
            effect: effect.into(),
            duration_ms: info.duration_ms,
            count: count as u32,
        };
        Ok(self.start(self.request(mode, attr)))
    }

    /// Play a decoded custom vibration package.
    pub fn play_custom(&self, package: VibratorPackage, kind: CustomKind, attr: &VibrateAttribute) -> Result<Completion> {
        if !self.supports(kind) {
            return Err(VibratorError::NotSupported(format!("custom vibration mode {kind:?}")));
        }
        package.validate()?;
        let mode = VibrateMode::Custom { kind, package: Arc::new(package) };
        Ok(self.start(self.request(mode, attr)))
    }

    /// Play a single pattern on an HD haptic driver.
    pub fn play_pattern(&self, pattern: VibratePattern, attr: &VibrateAttribute) -> Result<Completion> {
        self.play_custom(VibratorPackage::new(vec![pattern]), CustomKind::Hd, attr)
    }

    /// Stop the active vibration if it was started with `mode`.
    pub fn stop(&self, mode: StopMode) -> Result<()> {
        let matches = match self.session.current_vibrate_info().map(|i| i.mode) {
            Some(VibrateMode::Time { .. }) => mode == StopMode::Once,
            Some(VibrateMode::Preset { .. }) => mode == StopMode::Preset,
            _ => false,
        };
        if !matches || !matches!(self.session.state(), PlaybackState::Playing(_)) {
            log::debug!("Stop {mode}: no matching vibration in progress");
            return Ok(());
        }
        self.cancel();
        Ok(())
    }

    /// Cancel whatever is playing and wait for the worker to finish.
    pub fn cancel(&self) {
        let mut worker = self.worker.lock();
        self.session.set_exit_status(true);
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                log::error!("Playback worker panicked");
            }
        }
    }

    pub fn is_support_effect(&self, effect: &str) -> bool {
        self.device.effect_info(effect).is_some()
    }

    pub fn is_support_custom(&self) -> bool {
        [CustomKind::Hd, CustomKind::Predefined, CustomKind::Time]
            .into_iter()
            .any(|k| self.supports(k))
    }

    pub fn delay_time(&self) -> Result<u32> {
        self.device.delay_time()
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state()
    }

    pub fn current(&self) -> Option<VibrateInfo> {
        self.session.current_vibrate_info()
    }

    fn supports(&self, kind: CustomKind) -> bool {
        match kind {
            CustomKind::Hd => self.config.custom.hd,
            CustomKind::Predefined => self.config.custom.predefined,
            CustomKind::Time => self.config.custom.time,
        }
    }

    fn request(&self, mode: VibrateMode, attr: &VibrateAttribute) -> VibrateInfo {
        VibrateInfo::new(mode, attr.package_name.clone()).with_usage(attr.usage)
    }

    /// Supersede the in-flight playback with `info`.
    fn start(&self, info: VibrateInfo) -> Completion {
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            self.session.set_exit_status(true);
            if handle.join().is_err() {
                log::error!("Playback worker panicked");
            }
        }

        log::info!(
            "Vibrate {} ({:?}), package:{}",
            info.mode.tag(),
            info.usage,
            info.package_name
        );
        self.session.update_vibrator_effect(info);
        self.session.set_exit_status(false);

        let (tx, rx) = oneshot::channel();
        let scheduler = PlaybackScheduler::new(
            Arc::clone(&self.session),
            Arc::clone(&self.device),
            EffectBatcher::new(self.config.composite_effect_capacity),
        );
        let spawned = std::thread::Builder::new()
            .name("vibrator-playback".into())
            .spawn(move || {
                let result = scheduler.run();
                // Receiver may have been dropped; nobody is waiting then.
                let _ = tx.send(result);
            });
        match spawned {
            Ok(handle) => *worker = Some(handle),
            Err(e) => {
                log::error!("Failed to spawn playback worker: {e}");
                self.session.set_state(PlaybackState::Failed);
                let (tx, rx) = oneshot::channel();
                let _ = tx.send(Err(VibratorError::DeviceOperationFailed { op: "SpawnPlayback", code: -1 }));
                return rx;
            }
        }
        rx
    }
}

impl Drop for VibratorService {
    fn drop(&mut self) {
        self.cancel();
    }
}
