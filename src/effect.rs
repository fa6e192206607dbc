//! Composite effects: the vendor-facing representation handed to the driver.

/// A vendor primitive waveform referenced by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrimitiveEffect {
    /// ms before this effect starts, relative to the previous one in the batch
    pub delay: i32,
    pub effect_id: i32,
    pub intensity: i32,
}

/// A time-sampled piece of waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeEffect {
    pub delay: i32,
    /// Length of this piece in ms.
    pub time: i32,
    pub intensity: i32,
    pub frequency: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeEffect {
    Primitive(PrimitiveEffect),
    Time(TimeEffect),
}

impl CompositeEffect {
    pub fn delay(&self) -> i32 {
        match self {
            CompositeEffect::Primitive(e) => e.delay,
            CompositeEffect::Time(e) => e.delay,
        }
    }

    pub fn effect_type(&self) -> EffectType {
        match self {
            CompositeEffect::Primitive(_) => EffectType::Primitive,
            CompositeEffect::Time(_) => EffectType::Time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectType {
    Time,
    Primitive,
}

impl std::fmt::Display for EffectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectType::Time => f.write_str("time"),
            EffectType::Primitive => f.write_str("primitive"),
        }
    }
}

/// One driver submission: effects of a single declared kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdfCompositeEffect {
    pub effect_type: EffectType,
    pub effects: Vec<CompositeEffect>,
}

impl HdfCompositeEffect {
    pub fn new(effect_type: EffectType) -> Self {
        Self { effect_type, effects: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
