//! Effect batcher: splits a composite effect into driver-sized chunks.
//!
//! The driver accepts at most `capacity` effects per submission. Each chunk
//! carries the sum of its members' delays, which the scheduler waits out
//! after submitting the chunk.

use crate::effect::HdfCompositeEffect;
use crate::error::{Result, VibratorError};

/// Maximum composite effects per driver call.
pub const COMPOSITE_EFFECT_PART: usize = 128;

/// One driver submission plus the wait that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectBatch {
    pub effect: HdfCompositeEffect,
    pub delay_ms: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct EffectBatcher {
    capacity: usize,
}

impl Default for EffectBatcher {
    fn default() -> Self {
        Self::new(COMPOSITE_EFFECT_PART)
    }
}

impl EffectBatcher {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Partition `effect` into consecutive chunks of at most `capacity` effects.
    ///
    /// Every member must match the declared `effect_type`; a mismatch fails the
    /// whole split before anything reaches the driver.
    pub fn split(&self, effect: &HdfCompositeEffect) -> Result<Vec<EffectBatch>> {
        let mut batches = Vec::with_capacity(effect.len().div_ceil(self.capacity));
        let mut part = HdfCompositeEffect::new(effect.effect_type);
        let mut delay_ms: i32 = 0;

        for (i, e) in effect.effects.iter().enumerate() {
            if e.effect_type() != effect.effect_type {
                log::error!(
                    "Effect type mismatch at {i}: expected {}, found {}",
                    effect.effect_type,
                    e.effect_type()
                );
                return Err(VibratorError::Sequencing(format!(
                    "effect {i} is {} inside a {} batch",
                    e.effect_type(),
                    effect.effect_type
                )));
            }
            part.effects.push(*e);
            delay_ms = delay_ms.saturating_add(e.delay());
            if part.len() >= self.capacity {
                batches.push(EffectBatch {
                    effect: std::mem::replace(&mut part, HdfCompositeEffect::new(effect.effect_type)),
                    delay_ms: std::mem::take(&mut delay_ms),
                });
            }
        }
        if !part.is_empty() {
            batches.push(EffectBatch { effect: part, delay_ms });
        }
        log::debug!(
            "Split {} {} effects into {} batch(es) of <= {}",
            effect.len(),
            effect.effect_type,
            batches.len(),
            self.capacity
        );
        Ok(batches)
    }
}
