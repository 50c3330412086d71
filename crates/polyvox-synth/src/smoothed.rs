//! Per-voice smoothed, modulated parameter.

use std::sync::Arc;

use polyvox_core::{LinearSmoother, SkewTable};

use crate::hook::{HookTable, ParameterHook, SourceBank};
use crate::params::{AtomicParam, ParamHandle};

/// One (parameter, voice) value as the audio thread sees it.
///
/// Each [`tick`](Self::tick):
///
/// 1. reads the raw automation value once (relaxed);
/// 2. target = raw + Σ smoothed hooks;
/// 3. advances a linear ramp toward target;
/// 4. adds Σ instant hooks (audio-rate sources that must not be smoothed).
///
/// With no hooks bound, once the ramp lands exactly on the raw value the
/// parameter is *settled* and [`needs_tick`](Self::needs_tick) stays false
/// until the raw value changes.
///
/// For skewed parameters each hook value is clipped to 0..1 and warped
/// through the parameter's [`SkewTable`] before it is added.
#[derive(Debug, Clone)]
pub struct SmoothedParameter {
    raw: Arc<AtomicParam>,
    hooks: Arc<HookTable>,
    bank: SourceBank,
    skew: Option<Arc<SkewTable>>,
    smoother: LinearSmoother,
    value: f32,
    last_raw: f32,
    settled: bool,
}

impl SmoothedParameter {
    /// Wrap a parameter handle with its hook slots.
    pub fn new(handle: &ParamHandle, hooks: Arc<HookTable>, bank: SourceBank) -> Self {
        let value = handle.get();
        Self {
            raw: Arc::clone(&handle.raw),
            hooks,
            bank,
            skew: handle.skew.clone(),
            smoother: LinearSmoother::new(value),
            value,
            last_raw: f32::NAN,
            settled: false,
        }
    }

    /// Configure the ramp for a new sample rate. The value jumps to the
    /// current target.
    pub fn prepare_to_play(&mut self, sample_rate: f32, ramp_seconds: f32) {
        self.smoother.reset(sample_rate, ramp_seconds);
        self.value = self.smoother.value();
    }

    #[inline]
    fn hook_term(&self, hook: ParameterHook) -> f32 {
        let v = hook.value(&self.bank);
        match &self.skew {
            Some(table) => table.warp(v),
            None => v,
        }
    }

    /// Advance one step with hooks applied.
    #[inline]
    pub fn tick(&mut self) -> f32 {
        let raw = self.raw.get();
        let smoothed = self.hooks.smoothed_mask();
        let instant = self.hooks.instant_mask();

        let mut target = raw;
        for hook in self.hooks.hooks_in(smoothed) {
            target += self.hook_term(hook);
        }
        self.smoother.set_target(target);
        let mut value = self.smoother.advance();
        for hook in self.hooks.hooks_in(instant) {
            value += self.hook_term(hook);
        }

        self.value = value;
        self.last_raw = raw;
        self.settled = (smoothed | instant) == 0 && self.smoother.is_settled();
        value
    }

    /// Advance one step ignoring hooks.
    ///
    /// Used where modulation is applied elsewhere (e.g. filter send).
    #[inline]
    pub fn tick_no_hooks(&mut self) -> f32 {
        let raw = self.raw.get();
        self.smoother.set_target(raw);
        self.value = self.smoother.advance();
        self.last_raw = raw;
        self.settled = self.smoother.is_settled();
        self.value
    }

    /// Jump straight to the raw value.
    #[inline]
    pub fn tick_no_smoothing(&mut self) -> f32 {
        let raw = self.raw.get();
        self.smoother.set_immediate(raw);
        self.value = raw;
        self.last_raw = raw;
        self.settled = true;
        raw
    }

    /// Snap value and target to the raw value.
    pub fn set_value_to_raw(&mut self) {
        let raw = self.raw.get();
        self.smoother.set_immediate(raw);
        self.value = raw;
        self.last_raw = raw;
        self.settled = !self.hooks.has_hooks();
    }

    /// True if the next tick can change the value.
    #[inline]
    pub fn needs_tick(&self) -> bool {
        !self.settled || self.hooks.has_hooks() || self.raw.get().to_bits() != self.last_raw.to_bits()
    }

    /// Last computed value.
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Current raw automation value.
    #[inline]
    pub fn raw(&self) -> f32 {
        self.raw.get()
    }

    /// Current smoothing target (raw plus smoothed hooks).
    #[inline]
    pub fn target(&self) -> f32 {
        self.smoother.target()
    }

    /// True once the ramp has landed and no hooks are bound.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Shared hook slots.
    pub fn hooks(&self) -> &Arc<HookTable> {
        &self.hooks
    }
}
