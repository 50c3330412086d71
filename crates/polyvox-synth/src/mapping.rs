//! Modulation routing graph.
//!
//! - [`MappingSourceModel`] - a named producer (oscillator, LFO, envelope,
//!   noise, macro) whose output lives in a range of [`SourceBank`] cells
//! - [`SourceOutput`] - the audio-side writer for those cells, held by the
//!   module that generates the signal
//! - [`MappingTargetModel`] - one of three hook slots of a parameter, across
//!   every voice
//! - [`ModulationRegistry`] - owns the models and the bank, performs every
//!   binding change on the control thread
//!
//! Each source keeps an active-mapping count. Binding increments it and
//! unbinding decrements it, and modules read it in `frame()` to skip
//! computing sources nobody listens to.
//!
//! ## Skew variants
//!
//! A source publishes one copy of its output per hook exponent in the
//! parameter store: variant 0 is the plain normalized value, variant *i* is
//! `norm^exponent_i`. A target binds the variant that matches its own
//! range's curve, so a full-depth mapping sweeps the parameter the same way
//! its knob does.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use libm::powf;
use polyvox_core::ParamRange;

use crate::error::MappingError;
use crate::hook::{CellId, HookTable, SourceBank};
use crate::params::{AtomicParam, ParamHandle};

/// How a new source publishes its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    /// Unique source name, e.g. `"LFO1"`.
    pub name: String,
    /// One value per voice, or a single global value.
    pub per_voice: bool,
    /// Output is -1..1 (published as `(x + 1) / 2`) rather than 0..1.
    pub bipolar: bool,
    /// Output changes at audio rate; hooks bypass smoothing.
    pub audio_rate: bool,
    /// UI colour, 0xRRGGBB.
    pub colour: u32,
}

/// Control-side description of a registered source.
#[derive(Debug, Clone)]
pub struct MappingSourceModel {
    /// Source name.
    pub name: String,
    /// One value per voice.
    pub per_voice: bool,
    /// Bipolar output.
    pub bipolar: bool,
    /// Audio-rate output.
    pub audio_rate: bool,
    /// UI colour, 0xRRGGBB.
    pub colour: u32,
    base: u32,
    voices: usize,
    variants: usize,
    count: Arc<AtomicU32>,
}

impl MappingSourceModel {
    /// Cell holding `variant` for `voice`. Voices wrap modulo the source's
    /// voice count, so a global source serves every voice.
    pub fn cell(&self, variant: usize, voice: usize) -> CellId {
        let variant = variant.min(self.variants.saturating_sub(1));
        CellId(self.base + (variant * self.voices + voice % self.voices) as u32)
    }

    /// Values published per variant.
    pub fn voices(&self) -> usize {
        self.voices
    }

    /// Number of active mappings (targets plus scalars).
    pub fn mapping_count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Audio-side writer for a source's cells.
#[derive(Debug, Clone)]
pub struct SourceOutput {
    bank: SourceBank,
    base: u32,
    voices: usize,
    exponents: Arc<[f32]>,
    bipolar: bool,
    count: Arc<AtomicU32>,
}

impl SourceOutput {
    /// Publish a voice's sample to every variant.
    #[inline]
    pub fn write(&self, voice: usize, sample: f32) {
        if voice >= self.voices {
            return;
        }
        let norm = if self.bipolar { (sample + 1.0) * 0.5 } else { sample };
        for (i, &exponent) in self.exponents.iter().enumerate() {
            let value = if i == 0 { norm } else { powf(norm.max(0.0), exponent) };
            self.bank.set(CellId(self.base + (i * self.voices + voice) as u32), value);
        }
    }

    /// Read back a published value.
    pub fn read(&self, variant: usize, voice: usize) -> f32 {
        if variant >= self.exponents.len() || voice >= self.voices {
            return 0.0;
        }
        self.bank.get(CellId(self.base + (variant * self.voices + voice) as u32))
    }

    /// True if at least one mapping uses this source.
    #[inline]
    pub fn is_used(&self) -> bool {
        self.count.load(Ordering::Relaxed) > 0
    }

    /// Active mapping count.
    pub fn mapping_count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Values published per variant.
    pub fn voices(&self) -> usize {
        self.voices
    }
}

/// One modulation slot of one parameter, across all voices.
#[derive(Debug, Clone)]
pub struct MappingTargetModel {
    /// `"<component> <param> T<n>"`.
    pub name: String,
    /// Owning component.
    pub component: String,
    /// Full parameter name.
    pub param: String,
    /// Hook slot, 0..3.
    pub slot: usize,
    hooks: Vec<Arc<HookTable>>,
    raw: Arc<AtomicParam>,
    range: ParamRange,
    variant: usize,
    current_source: Option<String>,
    current_scalar: Option<String>,
    start: f32,
    end: f32,
    bipolar: bool,
}

impl MappingTargetModel {
    /// Build slot `slot` of `param` over its per-voice hook tables.
    pub fn new(
        component: &str,
        param: &str,
        slot: usize,
        hooks: Vec<Arc<HookTable>>,
        handle: &ParamHandle,
    ) -> Self {
        Self {
            name: format!("{param} T{}", slot + 1),
            component: component.to_string(),
            param: param.to_string(),
            slot,
            hooks,
            raw: Arc::clone(&handle.raw),
            range: handle.range,
            variant: 0,
            current_source: None,
            current_scalar: None,
            start: 0.0,
            end: 0.0,
            bipolar: false,
        }
    }

    /// Bound source, if any.
    pub fn current_source(&self) -> Option<&str> {
        self.current_source.as_deref()
    }

    /// Bound scalar source, if any.
    pub fn current_scalar(&self) -> Option<&str> {
        self.current_scalar.as_deref()
    }

    /// Resolved start offset.
    pub fn start(&self) -> f32 {
        self.start
    }

    /// End offset.
    pub fn end(&self) -> f32 {
        self.end
    }

    /// True if the bound source is bipolar.
    pub fn is_bipolar(&self) -> bool {
        self.bipolar
    }

    /// Skew variant this target reads.
    pub fn variant(&self) -> usize {
        self.variant
    }

    /// Target parameter range.
    pub fn range(&self) -> ParamRange {
        self.range
    }

    fn resolve_start(&self, end: f32, bipolar: bool) -> f32 {
        if bipolar { bipolar_start(&self.range, self.raw.get(), end) } else { 0.0 }
    }
}

/// Start offset that keeps `center` fixed with a symmetric excursion in
/// normalized space.
pub fn bipolar_start(range: &ParamRange, center: f32, end: f32) -> f32 {
    let p_center = range.normalize(center);
    let p_offset = range.normalize(range.clamp(center + end)) - p_center;
    range.denormalize((p_center - p_offset).clamp(0.0, 1.0)) - center
}

/// A routing change, passed to the registry listener.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingChange {
    /// A source was bound to a target.
    Bound {
        /// Target name.
        target: String,
        /// Source name.
        source: String,
        /// Mapping depth.
        end: f32,
    },
    /// The depth of an existing mapping changed.
    RangeChanged {
        /// Target name.
        target: String,
        /// New depth.
        end: f32,
    },
    /// A mapping was removed.
    Removed {
        /// Target name.
        target: String,
        /// Source that was bound.
        source: String,
    },
    /// A scalar gate was bound.
    ScalarBound {
        /// Target name.
        target: String,
        /// Scalar source name.
        scalar: String,
    },
    /// A scalar gate was removed.
    ScalarRemoved {
        /// Target name.
        target: String,
        /// Scalar source that was bound.
        scalar: String,
    },
}

type Listener = Box<dyn FnMut(&MappingChange) + Send>;

/// Owner of every source and target model.
///
/// The registry does not own modules; modules register themselves at
/// construction and the engine deregisters them on teardown. All methods
/// run on the control thread.
///
/// # Example
///
/// ```rust
/// use polyvox_synth::{ModulationRegistry, SourceSpec};
///
/// let mut registry = ModulationRegistry::new(256, vec![1.0]);
/// let lfo = registry
///     .register_source(SourceSpec {
///         name: "LFO1".into(),
///         per_voice: true,
///         bipolar: true,
///         audio_rate: false,
///         colour: 0x7fff00,
///     })
///     .unwrap();
/// assert!(!lfo.is_used());
/// assert_eq!(registry.mapping_count("LFO1").unwrap(), 0);
/// ```
pub struct ModulationRegistry {
    bank: SourceBank,
    next_cell: usize,
    exponents: Arc<[f32]>,
    sources: BTreeMap<String, MappingSourceModel>,
    targets: BTreeMap<String, MappingTargetModel>,
    listener: Option<Listener>,
}

impl fmt::Debug for ModulationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModulationRegistry")
            .field("capacity", &self.bank.capacity())
            .field("next_cell", &self.next_cell)
            .field("exponents", &self.exponents)
            .field("sources", &self.sources.len())
            .field("targets", &self.targets.len())
            .finish_non_exhaustive()
    }
}

fn acquire(sources: &BTreeMap<String, MappingSourceModel>, name: &str) {
    if let Some(source) = sources.get(name) {
        source.count.fetch_add(1, Ordering::Relaxed);
    }
}

fn release(sources: &BTreeMap<String, MappingSourceModel>, name: &str) {
    if let Some(source) = sources.get(name) {
        let _ = source.count.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| c.checked_sub(1));
    }
}

impl ModulationRegistry {
    /// Create with a bank of `capacity` cells and the store's hook
    /// exponents (1.0 is forced to the front).
    pub fn new(capacity: usize, exponents: Vec<f32>) -> Self {
        let mut variants = vec![1.0];
        variants.extend(exponents.into_iter().filter(|e| *e != 1.0));
        Self {
            bank: SourceBank::new(capacity),
            next_cell: SourceBank::RESERVED,
            exponents: variants.into(),
            sources: BTreeMap::new(),
            targets: BTreeMap::new(),
            listener: None,
        }
    }

    /// Shared source bank.
    pub fn bank(&self) -> &SourceBank {
        &self.bank
    }

    /// Skew variants published by every source.
    pub fn exponents(&self) -> &[f32] {
        &self.exponents
    }

    /// Variant index a target with `range` reads.
    pub fn variant_for(&self, range: &ParamRange) -> usize {
        let exponent = range.hook_exponent();
        self.exponents.iter().position(|e| *e == exponent).unwrap_or(0)
    }

    /// Install the change listener (the UI's mapping-change callback).
    pub fn set_listener(&mut self, listener: Listener) {
        self.listener = Some(listener);
    }

    fn emit(&mut self, notify: bool, change: MappingChange) {
        if notify && let Some(listener) = self.listener.as_mut() {
            listener(&change);
        }
    }

    /// Reserve cells for a new source and return its writer.
    pub fn register_source(&mut self, spec: SourceSpec) -> Result<SourceOutput, MappingError> {
        if self.sources.contains_key(&spec.name) {
            return Err(MappingError::DuplicateName(spec.name));
        }
        let voices = if spec.per_voice { crate::component::MAX_VOICES } else { 1 };
        let requested = voices * self.exponents.len();
        let available = self.bank.capacity() - self.next_cell;
        if requested > available {
            return Err(MappingError::SourceBankFull { requested, available });
        }
        let base = self.next_cell as u32;
        self.next_cell += requested;

        let count = Arc::new(AtomicU32::new(0));
        tracing::debug!(source = %spec.name, base, cells = requested, "source registered");
        let output = SourceOutput {
            bank: self.bank.clone(),
            base,
            voices,
            exponents: Arc::clone(&self.exponents),
            bipolar: spec.bipolar,
            count: Arc::clone(&count),
        };
        self.sources.insert(
            spec.name.clone(),
            MappingSourceModel {
                name: spec.name,
                per_voice: spec.per_voice,
                bipolar: spec.bipolar,
                audio_rate: spec.audio_rate,
                colour: spec.colour,
                base,
                voices,
                variants: self.exponents.len(),
                count,
            },
        );
        Ok(output)
    }

    /// Add a target slot.
    pub fn register_target(&mut self, mut target: MappingTargetModel) -> Result<(), MappingError> {
        if self.targets.contains_key(&target.name) {
            return Err(MappingError::DuplicateName(target.name));
        }
        target.variant = self.variant_for(&target.range);
        tracing::debug!(target = %target.name, variant = target.variant, "target registered");
        self.targets.insert(target.name.clone(), target);
        Ok(())
    }

    /// Remove a source after unbinding every mapping and scalar that uses it.
    ///
    /// Its cells are not reused.
    pub fn deregister_source(&mut self, name: &str) -> Result<(), MappingError> {
        if !self.sources.contains_key(name) {
            return Err(MappingError::UnknownSource(name.to_string()));
        }
        let bound: Vec<String> = self
            .targets
            .values()
            .filter(|t| t.current_source() == Some(name))
            .map(|t| t.name.clone())
            .collect();
        for target in bound {
            self.remove_mapping(&target, false)?;
        }
        let gated: Vec<String> = self
            .targets
            .values()
            .filter(|t| t.current_scalar() == Some(name))
            .map(|t| t.name.clone())
            .collect();
        for target in gated {
            self.remove_scalar(&target, false)?;
        }
        self.sources.remove(name);
        tracing::debug!(source = %name, "source deregistered");
        Ok(())
    }

    /// Remove every target of `component` after clearing its bindings.
    pub fn deregister_component(&mut self, component: &str) -> Result<(), MappingError> {
        let owned: Vec<String> = self
            .targets
            .values()
            .filter(|t| t.component == component)
            .map(|t| t.name.clone())
            .collect();
        for target in &owned {
            self.remove_mapping(target, false)?;
            self.remove_scalar(target, false)?;
            self.targets.remove(target);
        }
        tracing::debug!(component = %component, targets = owned.len(), "component deregistered");
        Ok(())
    }

    /// Bind `source` to `target` with depth `end`.
    ///
    /// Unipolar sources sweep `0..end`. Bipolar sources sweep `start..end`,
    /// where `start` mirrors `end` around the parameter's current value in
    /// normalized space.
    pub fn set_mapping(
        &mut self,
        target: &str,
        source: &str,
        end: f32,
        notify: bool,
    ) -> Result<(), MappingError> {
        let src = self
            .sources
            .get(source)
            .ok_or_else(|| MappingError::UnknownSource(source.to_string()))?;
        let tgt = self
            .targets
            .get_mut(target)
            .ok_or_else(|| MappingError::UnknownTarget(target.to_string()))?;

        if let Some(old) = tgt.current_source.take() {
            release(&self.sources, &old);
        }
        let start = tgt.resolve_start(end, src.bipolar);
        tgt.start = start;
        tgt.end = end;
        tgt.bipolar = src.bipolar;
        tgt.current_source = Some(source.to_string());
        for (voice, hooks) in tgt.hooks.iter().enumerate() {
            hooks.set_hook(tgt.slot, src.cell(tgt.variant, voice), start, end, src.audio_rate);
        }
        acquire(&self.sources, source);

        tracing::debug!(target = %target, source = %source, start, end, "mapping bound");
        self.emit(
            notify,
            MappingChange::Bound { target: target.to_string(), source: source.to_string(), end },
        );
        Ok(())
    }

    /// Change the depth of a bound mapping. No-op when nothing is bound.
    pub fn set_mapping_range(
        &mut self,
        target: &str,
        end: f32,
        notify: bool,
    ) -> Result<(), MappingError> {
        let tgt = self
            .targets
            .get_mut(target)
            .ok_or_else(|| MappingError::UnknownTarget(target.to_string()))?;
        if tgt.current_source.is_none() {
            tracing::debug!(target = %target, "range change on unbound target ignored");
            return Ok(());
        }
        let start = tgt.resolve_start(end, tgt.bipolar);
        tgt.start = start;
        tgt.end = end;
        for hooks in &tgt.hooks {
            hooks.set_hook_range(tgt.slot, start, end);
        }
        tracing::debug!(target = %target, start, end, "mapping range changed");
        self.emit(notify, MappingChange::RangeChanged { target: target.to_string(), end });
        Ok(())
    }

    /// Gate `target` by the plain value of `source`.
    pub fn set_mapping_scalar(
        &mut self,
        target: &str,
        source: &str,
        notify: bool,
    ) -> Result<(), MappingError> {
        let src = self
            .sources
            .get(source)
            .ok_or_else(|| MappingError::UnknownSource(source.to_string()))?;
        let tgt = self
            .targets
            .get_mut(target)
            .ok_or_else(|| MappingError::UnknownTarget(target.to_string()))?;

        if let Some(old) = tgt.current_scalar.take() {
            release(&self.sources, &old);
        }
        tgt.current_scalar = Some(source.to_string());
        for (voice, hooks) in tgt.hooks.iter().enumerate() {
            hooks.set_hook_scalar(tgt.slot, src.cell(0, voice));
        }
        acquire(&self.sources, source);

        tracing::debug!(target = %target, scalar = %source, "scalar bound");
        self.emit(
            notify,
            MappingChange::ScalarBound { target: target.to_string(), scalar: source.to_string() },
        );
        Ok(())
    }

    /// Unbind `target`, releasing its scalar as well. No-op when unbound.
    pub fn remove_mapping(&mut self, target: &str, notify: bool) -> Result<(), MappingError> {
        let tgt = self
            .targets
            .get_mut(target)
            .ok_or_else(|| MappingError::UnknownTarget(target.to_string()))?;
        let Some(source) = tgt.current_source.take() else {
            tracing::debug!(target = %target, "remove on unbound target ignored");
            return self.remove_scalar(target, notify);
        };
        tgt.start = 0.0;
        tgt.end = 0.0;
        tgt.bipolar = false;
        for hooks in &tgt.hooks {
            hooks.reset_hook(tgt.slot);
        }
        release(&self.sources, &source);

        tracing::debug!(target = %target, source = %source, "mapping removed");
        self.remove_scalar(target, false)?;
        self.emit(notify, MappingChange::Removed { target: target.to_string(), source });
        Ok(())
    }

    /// Remove the scalar gate of `target`. No-op when none is bound.
    pub fn remove_scalar(&mut self, target: &str, notify: bool) -> Result<(), MappingError> {
        let tgt = self
            .targets
            .get_mut(target)
            .ok_or_else(|| MappingError::UnknownTarget(target.to_string()))?;
        let Some(scalar) = tgt.current_scalar.take() else {
            return Ok(());
        };
        for hooks in &tgt.hooks {
            hooks.reset_hook_scalar(tgt.slot);
        }
        release(&self.sources, &scalar);

        tracing::debug!(target = %target, scalar = %scalar, "scalar removed");
        self.emit(notify, MappingChange::ScalarRemoved { target: target.to_string(), scalar });
        Ok(())
    }

    /// Active mapping count of `source`.
    pub fn mapping_count(&self, source: &str) -> Result<u32, MappingError> {
        self.sources
            .get(source)
            .map(MappingSourceModel::mapping_count)
            .ok_or_else(|| MappingError::UnknownSource(source.to_string()))
    }

    /// Source model by name.
    pub fn source(&self, name: &str) -> Option<&MappingSourceModel> {
        self.sources.get(name)
    }

    /// Target model by name.
    pub fn target(&self, name: &str) -> Option<&MappingTargetModel> {
        self.targets.get(name)
    }

    /// All sources, by name.
    pub fn sources(&self) -> impl Iterator<Item = &MappingSourceModel> {
        self.sources.values()
    }

    /// All targets, by name.
    pub fn targets(&self) -> impl Iterator<Item = &MappingTargetModel> {
        self.targets.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::MAX_VOICES;
    use polyvox_core::ParamScale;
    use std::sync::Mutex;

    fn source_spec(name: &str, per_voice: bool, bipolar: bool) -> SourceSpec {
        SourceSpec { name: name.into(), per_voice, bipolar, audio_rate: false, colour: 0 }
    }

    fn handle(range: ParamRange, value: f32) -> ParamHandle {
        ParamHandle { raw: Arc::new(AtomicParam::new(value)), range, default: value, skew: None }
    }

    fn hooks() -> Vec<Arc<HookTable>> {
        (0..MAX_VOICES).map(|_| Arc::new(HookTable::new())).collect()
    }

    struct Fixture {
        registry: ModulationRegistry,
        hooks: Vec<Arc<HookTable>>,
        lfo: SourceOutput,
        env: SourceOutput,
    }

    fn fixture(range: ParamRange, value: f32) -> Fixture {
        let mut registry = ModulationRegistry::new(1024, vec![1.0, 2.0]);
        let lfo = registry.register_source(source_spec("LFO1", true, true)).unwrap();
        let env = registry.register_source(source_spec("Envelope2", true, false)).unwrap();
        let hooks = hooks();
        for slot in 0..3 {
            let target = MappingTargetModel::new(
                "Filter1",
                "Filter1 Cutoff",
                slot,
                hooks.clone(),
                &handle(range, value),
            );
            registry.register_target(target).unwrap();
        }
        Fixture { registry, hooks, lfo, env }
    }

    #[test]
    fn test_bind_and_remove_counts() {
        let mut f = fixture(ParamRange::linear(0.0, 127.0), 60.0);
        f.registry.set_mapping("Filter1 Cutoff T1", "LFO1", 12.0, false).unwrap();
        assert_eq!(f.registry.mapping_count("LFO1").unwrap(), 1);
        f.registry.set_mapping("Filter1 Cutoff T2", "LFO1", 12.0, false).unwrap();
        assert_eq!(f.registry.mapping_count("LFO1").unwrap(), 2);
        assert!(f.lfo.is_used());
        f.registry.remove_mapping("Filter1 Cutoff T1", false).unwrap();
        assert_eq!(f.registry.mapping_count("LFO1").unwrap(), 1);
        f.registry.remove_mapping("Filter1 Cutoff T1", false).unwrap();
        assert_eq!(f.registry.mapping_count("LFO1").unwrap(), 1, "second remove is a no-op");
    }

    #[test]
    fn test_rebind_moves_count() {
        let mut f = fixture(ParamRange::linear(0.0, 127.0), 60.0);
        f.registry.set_mapping("Filter1 Cutoff T1", "LFO1", 12.0, false).unwrap();
        f.registry.set_mapping("Filter1 Cutoff T1", "Envelope2", 12.0, false).unwrap();
        assert_eq!(f.registry.mapping_count("LFO1").unwrap(), 0);
        assert_eq!(f.registry.mapping_count("Envelope2").unwrap(), 1);
        assert!(f.env.is_used());
    }

    #[test]
    fn test_bipolar_start_is_symmetric() {
        let mut f = fixture(ParamRange::linear(0.0, 127.0), 60.0);
        f.registry.set_mapping("Filter1 Cutoff T1", "LFO1", 24.0, false).unwrap();
        let t = f.registry.target("Filter1 Cutoff T1").unwrap();
        assert!((t.start() + 24.0).abs() < 1e-3, "start = {}", t.start());
        assert!(t.is_bipolar());

        f.registry.set_mapping("Filter1 Cutoff T2", "Envelope2", 24.0, false).unwrap();
        assert_eq!(f.registry.target("Filter1 Cutoff T2").unwrap().start(), 0.0);
    }

    #[test]
    fn test_bipolar_start_clips_at_range_edge() {
        let range = ParamRange::linear(0.0, 127.0);
        let start = bipolar_start(&range, 120.0, 24.0);
        assert!((start + 7.0).abs() < 1e-3, "end clips at 127 so start mirrors 7: {start}");
    }

    #[test]
    fn test_hooks_follow_source_values() {
        let mut f = fixture(ParamRange::linear(0.0, 127.0), 60.0);
        f.registry.set_mapping("Filter1 Cutoff T1", "LFO1", 24.0, false).unwrap();
        let bank = f.registry.bank().clone();
        f.lfo.write(3, 1.0);
        let v = f.hooks[3].hook(0).value(&bank);
        assert!((v - 24.0).abs() < 1e-4, "peak = {v}");
        f.lfo.write(3, 0.0);
        let v = f.hooks[3].hook(0).value(&bank);
        assert!(v.abs() < 1e-4, "center = {v}");
    }

    #[test]
    fn test_skewed_target_reads_matching_variant() {
        let mut f = fixture(ParamRange::new(0.0, 30.0, ParamScale::Power(2.0)), 0.0);
        let t = f.registry.target("Filter1 Cutoff T1").unwrap();
        assert_eq!(t.variant(), 1);
        f.registry.set_mapping("Filter1 Cutoff T1", "Envelope2", 30.0, false).unwrap();
        f.env.write(0, 0.5);
        assert_eq!(f.env.read(1, 0), 0.25);
        let v = f.hooks[0].hook(0).value(f.registry.bank());
        assert!((v - 7.5).abs() < 1e-4, "skewed depth = {v}");
    }

    #[test]
    fn test_global_source_serves_every_voice() {
        let mut registry = ModulationRegistry::new(256, vec![1.0]);
        let m1 = registry.register_source(source_spec("M1", false, false)).unwrap();
        let hooks = hooks();
        let target = MappingTargetModel::new(
            "Osc1",
            "Osc1 Shape",
            0,
            hooks.clone(),
            &handle(ParamRange::linear(0.0, 1.0), 0.0),
        );
        registry.register_target(target).unwrap();
        registry.set_mapping("Osc1 Shape T1", "M1", 1.0, false).unwrap();
        m1.write(0, 0.75);
        for voice in [0, 5, MAX_VOICES - 1] {
            assert_eq!(hooks[voice].hook(0).value(registry.bank()), 0.75);
        }
    }

    #[test]
    fn test_scalar_counts_and_release() {
        let mut f = fixture(ParamRange::linear(0.0, 127.0), 60.0);
        f.registry.set_mapping("Filter1 Cutoff T1", "LFO1", 12.0, false).unwrap();
        f.registry.set_mapping_scalar("Filter1 Cutoff T1", "Envelope2", false).unwrap();
        assert_eq!(f.registry.mapping_count("Envelope2").unwrap(), 1);
        f.registry.remove_scalar("Filter1 Cutoff T1", false).unwrap();
        assert_eq!(f.registry.mapping_count("Envelope2").unwrap(), 0);
        f.registry.remove_scalar("Filter1 Cutoff T1", false).unwrap();
        assert_eq!(f.registry.mapping_count("Envelope2").unwrap(), 0);

        f.registry.set_mapping_scalar("Filter1 Cutoff T1", "Envelope2", false).unwrap();
        f.registry.remove_mapping("Filter1 Cutoff T1", false).unwrap();
        assert_eq!(f.registry.mapping_count("Envelope2").unwrap(), 0);
        assert_eq!(f.registry.mapping_count("LFO1").unwrap(), 0);
        assert_eq!(f.hooks[0].hook(0).scalar, CellId::ONE);
    }

    #[test]
    fn test_range_change_keeps_source() {
        let mut f = fixture(ParamRange::linear(0.0, 127.0), 60.0);
        f.registry.set_mapping_range("Filter1 Cutoff T1", 5.0, false).unwrap();
        f.registry.set_mapping("Filter1 Cutoff T1", "Envelope2", 12.0, false).unwrap();
        f.registry.set_mapping_range("Filter1 Cutoff T1", 6.0, false).unwrap();
        assert_eq!(f.hooks[2].hook(0).length, 6.0);
        assert_eq!(f.registry.mapping_count("Envelope2").unwrap(), 1);
    }

    #[test]
    fn test_unknown_names() {
        let mut f = fixture(ParamRange::linear(0.0, 127.0), 60.0);
        assert_eq!(
            f.registry.set_mapping("Filter1 Cutoff T1", "LFO9", 1.0, false),
            Err(MappingError::UnknownSource("LFO9".into()))
        );
        assert_eq!(
            f.registry.remove_mapping("Nope T1", false),
            Err(MappingError::UnknownTarget("Nope T1".into()))
        );
        assert!(matches!(
            f.registry.register_source(source_spec("LFO1", true, true)),
            Err(MappingError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_bank_full() {
        let mut registry = ModulationRegistry::new(SourceBank::RESERVED + 4, vec![1.0]);
        let err = registry.register_source(source_spec("LFO1", true, true)).unwrap_err();
        assert_eq!(err, MappingError::SourceBankFull { requested: MAX_VOICES, available: 4 });
    }

    #[test]
    fn test_deregister_source_unbinds() {
        let mut f = fixture(ParamRange::linear(0.0, 127.0), 60.0);
        f.registry.set_mapping("Filter1 Cutoff T1", "LFO1", 12.0, false).unwrap();
        f.registry.set_mapping_scalar("Filter1 Cutoff T2", "LFO1", false).unwrap();
        f.registry.deregister_source("LFO1").unwrap();
        assert!(f.registry.source("LFO1").is_none());
        assert!(!f.hooks[0].is_bound(0));
        assert_eq!(f.registry.target("Filter1 Cutoff T2").unwrap().current_scalar(), None);
        assert!(!f.lfo.is_used());
    }

    #[test]
    fn test_deregister_component_removes_targets() {
        let mut f = fixture(ParamRange::linear(0.0, 127.0), 60.0);
        f.registry.set_mapping("Filter1 Cutoff T3", "LFO1", 12.0, false).unwrap();
        f.registry.deregister_component("Filter1").unwrap();
        assert_eq!(f.registry.targets().count(), 0);
        assert_eq!(f.registry.mapping_count("LFO1").unwrap(), 0);
    }

    #[test]
    fn test_listener_receives_changes() {
        let mut f = fixture(ParamRange::linear(0.0, 127.0), 60.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        f.registry.set_listener(Box::new(move |change| {
            sink.lock().unwrap().push(change.clone());
        }));
        f.registry.set_mapping("Filter1 Cutoff T1", "LFO1", 3.0, true).unwrap();
        f.registry.set_mapping_range("Filter1 Cutoff T1", 4.0, false).unwrap();
        f.registry.remove_mapping("Filter1 Cutoff T1", true).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2, "silent changes are not reported: {seen:?}");
        assert!(matches!(seen[0], MappingChange::Bound { ref source, .. } if source == "LFO1"));
        assert!(matches!(seen[1], MappingChange::Removed { .. }));
    }
}
