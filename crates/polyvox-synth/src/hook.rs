//! Modulation hooks and the shared source bank.
//!
//! A modulation source publishes its per-voice output into cells of a
//! [`SourceBank`]. A [`ParameterHook`] reads one cell, maps it onto an
//! affine range and multiplies by an optional scalar cell:
//!
//! ```text
//! value = ((source * length) + min) * scalar
//! ```
//!
//! ## Concurrency contract
//!
//! [`HookTable`] is written by the control thread and read by the audio
//! thread without locks. Hook fields are individual atomics, so a reader can
//! observe a half-updated hook (new source with the old range, or the
//! reverse) for one block. That is tolerated. What can never happen is a read
//! of invalid memory: every [`CellId`] ever published refers to a cell that
//! lives as long as the bank, and reads past the end yield 0.0.
//!
//! Slot membership is published through two bitmasks (`smoothed` and
//! `instant`). Writers store the fields first and the mask last with
//! `Release`; readers load the mask with `Acquire`, so a newly bound slot is
//! never visible before its fields.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

/// Hook slots per parameter.
pub const NUM_HOOKS: usize = 3;

/// Index of a cell in a [`SourceBank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub u32);

impl CellId {
    /// Constant 0.0.
    pub const ZERO: CellId = CellId(0);
    /// Constant 1.0.
    pub const ONE: CellId = CellId(1);

    /// Cell index as `usize`.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Fixed-capacity arena of f32 cells shared between threads.
///
/// Cells 0 and 1 hold the constants 0.0 and 1.0 and cannot be written.
/// Clones share the same storage.
#[derive(Debug, Clone)]
pub struct SourceBank {
    cells: Arc<[AtomicU32]>,
}

impl SourceBank {
    /// Cells taken by the constants.
    pub const RESERVED: usize = 2;

    /// Allocate `capacity` cells (at least [`RESERVED`](Self::RESERVED)).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(Self::RESERVED);
        let cells: Vec<AtomicU32> = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        cells[CellId::ONE.index()].store(1.0_f32.to_bits(), Ordering::Relaxed);
        Self { cells: cells.into() }
    }

    /// Total cells, constants included.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Read a cell. Out-of-range cells read as 0.0.
    #[inline]
    pub fn get(&self, cell: CellId) -> f32 {
        self.cells
            .get(cell.index())
            .map_or(0.0, |c| f32::from_bits(c.load(Ordering::Relaxed)))
    }

    /// Write a cell. Writes to the constants or out of range are ignored.
    #[inline]
    pub fn set(&self, cell: CellId, value: f32) {
        if cell.index() < Self::RESERVED {
            return;
        }
        if let Some(c) = self.cells.get(cell.index()) {
            c.store(value.to_bits(), Ordering::Relaxed);
        }
    }
}

/// One modulation tap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterHook {
    /// Source cell.
    pub source: CellId,
    /// Offset added after scaling.
    pub min: f32,
    /// Scale applied to the source.
    pub length: f32,
    /// Gate cell multiplied into the result.
    pub scalar: CellId,
}

impl ParameterHook {
    /// A hook that contributes exactly zero.
    pub const UNSET: ParameterHook =
        ParameterHook { source: CellId::ZERO, min: 0.0, length: 0.0, scalar: CellId::ONE };

    /// Hook spanning `start..end` over a 0..1 source, ungated.
    pub fn new(source: CellId, start: f32, end: f32) -> Self {
        Self { source, min: start, length: end - start, scalar: CellId::ONE }
    }

    /// `((source * length) + min) * scalar`.
    #[inline]
    pub fn value(&self, bank: &SourceBank) -> f32 {
        ((bank.get(self.source) * self.length) + self.min) * bank.get(self.scalar)
    }
}

impl Default for ParameterHook {
    fn default() -> Self {
        Self::UNSET
    }
}

#[derive(Debug)]
struct HookSlot {
    source: AtomicU32,
    min: AtomicU32,
    length: AtomicU32,
    scalar: AtomicU32,
}

impl HookSlot {
    fn new() -> Self {
        let unset = ParameterHook::UNSET;
        Self {
            source: AtomicU32::new(unset.source.0),
            min: AtomicU32::new(unset.min.to_bits()),
            length: AtomicU32::new(unset.length.to_bits()),
            scalar: AtomicU32::new(unset.scalar.0),
        }
    }

    fn store(&self, hook: ParameterHook) {
        self.source.store(hook.source.0, Ordering::Relaxed);
        self.min.store(hook.min.to_bits(), Ordering::Relaxed);
        self.length.store(hook.length.to_bits(), Ordering::Relaxed);
        self.scalar.store(hook.scalar.0, Ordering::Relaxed);
    }

    fn load(&self) -> ParameterHook {
        ParameterHook {
            source: CellId(self.source.load(Ordering::Relaxed)),
            min: f32::from_bits(self.min.load(Ordering::Relaxed)),
            length: f32::from_bits(self.length.load(Ordering::Relaxed)),
            scalar: CellId(self.scalar.load(Ordering::Relaxed)),
        }
    }
}

/// The three hook slots of one (parameter, voice).
///
/// Shared through `Arc` between the mapping target (writer) and the
/// [`SmoothedParameter`](crate::SmoothedParameter) (reader).
#[derive(Debug)]
pub struct HookTable {
    slots: [HookSlot; NUM_HOOKS],
    smoothed: AtomicU8,
    instant: AtomicU8,
}

impl Default for HookTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HookTable {
    /// All slots unset.
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| HookSlot::new()),
            smoothed: AtomicU8::new(0),
            instant: AtomicU8::new(0),
        }
    }

    /// Bind `slot` to `source` over `start..end`.
    ///
    /// `instant` hooks bypass the smoother. The slot's scalar is kept.
    pub fn set_hook(&self, slot: usize, source: CellId, start: f32, end: f32, instant: bool) {
        let Some(s) = self.slots.get(slot) else { return };
        let scalar = CellId(s.scalar.load(Ordering::Relaxed));
        s.store(ParameterHook { scalar, ..ParameterHook::new(source, start, end) });
        let bit = 1u8 << slot;
        if instant {
            self.smoothed.fetch_and(!bit, Ordering::Release);
            self.instant.fetch_or(bit, Ordering::Release);
        } else {
            self.instant.fetch_and(!bit, Ordering::Release);
            self.smoothed.fetch_or(bit, Ordering::Release);
        }
    }

    /// Change the range of a bound slot.
    pub fn set_hook_range(&self, slot: usize, start: f32, end: f32) {
        let Some(s) = self.slots.get(slot) else { return };
        s.min.store(start.to_bits(), Ordering::Relaxed);
        s.length.store((end - start).to_bits(), Ordering::Relaxed);
    }

    /// Gate `slot` by a scalar cell.
    pub fn set_hook_scalar(&self, slot: usize, scalar: CellId) {
        if let Some(s) = self.slots.get(slot) {
            s.scalar.store(scalar.0, Ordering::Release);
        }
    }

    /// Remove the gate from `slot`.
    pub fn reset_hook_scalar(&self, slot: usize) {
        self.set_hook_scalar(slot, CellId::ONE);
    }

    /// Unbind `slot`. No-op when the slot is not bound.
    pub fn reset_hook(&self, slot: usize) {
        if !self.is_bound(slot) {
            return;
        }
        let bit = 1u8 << slot;
        self.smoothed.fetch_and(!bit, Ordering::Release);
        self.instant.fetch_and(!bit, Ordering::Release);
        self.slots[slot].store(ParameterHook::UNSET);
    }

    /// True if `slot` is in either set.
    pub fn is_bound(&self, slot: usize) -> bool {
        if slot >= NUM_HOOKS {
            return false;
        }
        let bit = 1u8 << slot;
        (self.smoothed_mask() | self.instant_mask()) & bit != 0
    }

    /// True if any slot is bound.
    #[inline]
    pub fn has_hooks(&self) -> bool {
        (self.smoothed_mask() | self.instant_mask()) != 0
    }

    /// Bitmask of slots applied before smoothing.
    #[inline]
    pub fn smoothed_mask(&self) -> u8 {
        self.smoothed.load(Ordering::Acquire)
    }

    /// Bitmask of slots added after smoothing.
    #[inline]
    pub fn instant_mask(&self) -> u8 {
        self.instant.load(Ordering::Acquire)
    }

    /// Snapshot of one slot.
    #[inline]
    pub fn hook(&self, slot: usize) -> ParameterHook {
        self.slots.get(slot).map_or(ParameterHook::UNSET, HookSlot::load)
    }

    /// Iterate the hooks whose bit is set in `mask`.
    #[inline]
    pub fn hooks_in(&self, mask: u8) -> impl Iterator<Item = ParameterHook> + '_ {
        (0..NUM_HOOKS).filter(move |i| mask & (1 << i) != 0).map(|i| self.slots[i].load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_constants() {
        let bank = SourceBank::new(8);
        assert_eq!(bank.get(CellId::ZERO), 0.0);
        assert_eq!(bank.get(CellId::ONE), 1.0);
        bank.set(CellId::ONE, 5.0);
        assert_eq!(bank.get(CellId::ONE), 1.0, "constants are read-only");
        assert_eq!(bank.get(CellId(999)), 0.0);
        bank.set(CellId(999), 3.0);
    }

    #[test]
    fn test_unset_hook_contributes_zero() {
        let bank = SourceBank::new(4);
        assert_eq!(ParameterHook::UNSET.value(&bank), 0.0);
    }

    #[test]
    fn test_hook_endpoints() {
        let bank = SourceBank::new(4);
        let at_zero = ParameterHook::new(CellId::ZERO, -3.0, 5.0);
        let at_one = ParameterHook::new(CellId::ONE, -3.0, 5.0);
        assert_eq!(at_zero.value(&bank), -3.0);
        assert_eq!(at_one.value(&bank), 5.0);
    }

    #[test]
    fn test_scalar_gates_hook() {
        let bank = SourceBank::new(4);
        bank.set(CellId(2), 0.5);
        bank.set(CellId(3), 0.25);
        let hook = ParameterHook { scalar: CellId(3), ..ParameterHook::new(CellId(2), 0.0, 8.0) };
        let v = hook.value(&bank);
        assert!((v - 1.0).abs() < 1e-6, "value = {v}");
    }

    #[test]
    fn test_table_masks() {
        let table = HookTable::new();
        assert!(!table.has_hooks());
        table.set_hook(0, CellId(2), 0.0, 1.0, false);
        table.set_hook(2, CellId(3), 0.0, 1.0, true);
        assert_eq!(table.smoothed_mask(), 0b001);
        assert_eq!(table.instant_mask(), 0b100);
        table.set_hook(0, CellId(4), 0.0, 1.0, true);
        assert_eq!(table.smoothed_mask(), 0);
        assert_eq!(table.instant_mask(), 0b101);
    }

    #[test]
    fn test_reset_hook_restores_unset() {
        let table = HookTable::new();
        table.set_hook(1, CellId(2), -1.0, 1.0, false);
        table.set_hook_scalar(1, CellId(3));
        table.reset_hook(1);
        assert!(!table.is_bound(1));
        assert_eq!(table.hook(1), ParameterHook::UNSET);
    }

    #[test]
    fn test_reset_unbound_is_noop() {
        let table = HookTable::new();
        table.set_hook_scalar(2, CellId(5));
        table.reset_hook(2);
        assert_eq!(table.hook(2).scalar, CellId(5), "unbound reset must not touch fields");
        table.reset_hook(7);
    }

    #[test]
    fn test_set_hook_keeps_scalar_and_range_update() {
        let table = HookTable::new();
        table.set_hook_scalar(0, CellId(6));
        table.set_hook(0, CellId(2), 1.0, 3.0, false);
        table.set_hook_range(0, 0.0, 10.0);
        let hook = table.hook(0);
        assert_eq!(hook.scalar, CellId(6));
        assert_eq!(hook.min, 0.0);
        assert_eq!(hook.length, 10.0);
    }

    #[test]
    fn test_hooks_in_mask() {
        let table = HookTable::new();
        table.set_hook(0, CellId(2), 0.0, 1.0, false);
        table.set_hook(1, CellId(3), 0.0, 1.0, false);
        let sources: Vec<CellId> = table.hooks_in(table.smoothed_mask()).map(|h| h.source).collect();
        assert_eq!(sources, vec![CellId(2), CellId(3)]);
    }
}
