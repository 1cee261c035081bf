//! The memory domain (§4.E): a cell-based field-sensitive heap on top of
//! the scalar composite (§4.D), `MemoryLocation → Set<Cell>`,
//! `MemoryLocation → PointerSet`, and a lifetime fact per location.

use alloc::collections::{BTreeMap, BTreeSet};

use crate::domain::scalar::ScalarComposite;
use crate::domain::NumericalDomain;
use crate::error::AnalyzerError;
use crate::lattice::interval::Interval;
use crate::lattice::interval_congruence::IntervalCongruence;
use crate::lattice::pointer_value::PointerValue;
use crate::lattice::points_to::PointsToSet;
use crate::num::Sign;
use crate::variable::{MemoryLocationId, VarId};

/// A field-sensitive memory cell: the bytes `[offset, offset + size - 1]`
/// of `base`, read/written with the given sign convention (§3 "Cells").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cell {
    /// The memory location this cell is carved out of.
    pub base: MemoryLocationId,
    /// Byte offset from the base of `base`.
    pub offset: i128,
    /// Size in bytes.
    pub size: u32,
    /// Sign convention of the value stored in this cell.
    pub sign: Sign,
}

impl Cell {
    fn range(&self) -> (i128, i128) {
        (self.offset, self.offset + i128::from(self.size) - 1)
    }

    /// Whether this cell's byte range overlaps `other`'s.
    pub fn overlaps(&self, other: &Cell) -> bool {
        let (a0, a1) = self.range();
        let (b0, b1) = other.range();
        a0 <= b1 && b0 <= a1
    }

    /// Whether `other`'s byte range is fully contained in `self`'s.
    pub fn contains(&self, other: &Cell) -> bool {
        let (a0, a1) = self.range();
        let (b0, b1) = other.range();
        a0 <= b0 && b1 <= a1
    }
}

/// Whether a memory location is known to have been allocated,
/// deallocated, or neither is known (§4.E "Lifetime").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
    /// No information.
    #[default]
    Unknown,
    /// Definitely allocated and not yet freed.
    Allocated,
    /// Definitely freed.
    Deallocated,
}

impl Lifetime {
    fn join(self, other: Self) -> Self {
        if self == other {
            self
        } else {
            Lifetime::Unknown
        }
    }
}

/// Outcome of reading a cell's coverage bitmask against the existing
/// initialized/uninitialized cell sets (§4.E "Read contract").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadInit {
    /// The read is fully covered by initialized cells.
    Init,
    /// The read is fully covered by uninitialized cells.
    Uninit,
    /// Coverage is mixed or partial.
    Unknown,
}

/// The memory domain: a [`ScalarComposite`] giving every cell's abstract
/// value plus the auxiliary per-location maps §4.E lists.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryDomain<N> {
    scalar: ScalarComposite<N>,
    cells: BTreeMap<MemoryLocationId, BTreeSet<Cell>>,
    pointer_sets: BTreeMap<MemoryLocationId, PointsToSet>,
    lifetime: BTreeMap<MemoryLocationId, Lifetime>,
    cell_vars: BTreeMap<Cell, VarId>,
    next_cell_var: u32,
}

impl<N: NumericalDomain> MemoryDomain<N> {
    /// `⊤`, starting at a variable-id offset high enough not to collide
    /// with ordinary program variables from the same run's factory.
    pub fn top(cell_var_base: u32) -> Self {
        Self {
            scalar: ScalarComposite::top(),
            cells: BTreeMap::new(),
            pointer_sets: BTreeMap::new(),
            lifetime: BTreeMap::new(),
            cell_vars: BTreeMap::new(),
            next_cell_var: cell_var_base,
        }
    }

    /// `⊥`.
    pub fn bottom() -> Self {
        Self {
            scalar: ScalarComposite::bottom(),
            cells: BTreeMap::new(),
            pointer_sets: BTreeMap::new(),
            lifetime: BTreeMap::new(),
            cell_vars: BTreeMap::new(),
            next_cell_var: 0,
        }
    }

    /// Whether the state is unreachable.
    pub fn is_bottom(&self) -> bool {
        self.scalar.is_bottom()
    }

    /// The underlying scalar composite, for executor statements that
    /// don't touch memory at all.
    pub fn scalar(&self) -> &ScalarComposite<N> {
        &self.scalar
    }

    /// Mutable access to the underlying scalar composite.
    pub fn scalar_mut(&mut self) -> &mut ScalarComposite<N> {
        &mut self.scalar
    }

    /// Mark `loc` as freshly allocated.
    pub fn mark_allocated(&mut self, loc: MemoryLocationId) {
        self.lifetime.insert(loc, Lifetime::Allocated);
    }

    /// Mark `loc` as freed.
    pub fn mark_deallocated(&mut self, loc: MemoryLocationId) {
        self.lifetime.insert(loc, Lifetime::Deallocated);
    }

    /// Lifetime fact currently known for `loc`.
    pub fn lifetime_of(&self, loc: MemoryLocationId) -> Lifetime {
        self.lifetime.get(&loc).copied().unwrap_or_default()
    }

    /// Join two memory states at a control-flow merge point. Cells are
    /// joined by identity: a cell present on only one side is dropped
    /// (the other branch implicitly forgets it, a sound approximation),
    /// while a cell present on both sides has its value joined.
    pub fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut out = self.clone();
        out.scalar = self.scalar.join(&other.scalar);
        let mut cells = BTreeMap::new();
        for (loc, self_set) in &self.cells {
            if let Some(other_set) = other.cells.get(loc) {
                cells.insert(*loc, self_set.intersection(other_set).copied().collect());
            }
        }
        out.cells = cells;
        let mut pointer_sets = BTreeMap::new();
        for loc in self.pointer_sets.keys().chain(other.pointer_sets.keys()) {
            pointer_sets.entry(*loc).or_insert_with(|| {
                let a = self.pointer_sets.get(loc).cloned().unwrap_or_default();
                let b = other.pointer_sets.get(loc).cloned().unwrap_or_default();
                a.join(&b)
            });
        }
        out.pointer_sets = pointer_sets;
        let mut lifetime = BTreeMap::new();
        for loc in self.lifetime.keys().chain(other.lifetime.keys()) {
            lifetime.entry(*loc).or_insert_with(|| {
                self.lifetime_of(*loc).join(other.lifetime_of(*loc))
            });
        }
        out.lifetime = lifetime;
        out
    }

    /// Widen: the scalar composite widens; the auxiliary per-location maps
    /// use the same join as above since they're all finite-height.
    pub fn widen(&self, other: &Self) -> Self {
        let mut out = self.join(other);
        out.scalar = self.scalar.widen(&other.scalar);
        out
    }

    /// `self ⊑ other`, delegating to the scalar composite (the cell/
    /// pointer-set/lifetime maps are a derived, bounded-height refinement
    /// of it and are not independently compared by the fixpoint engine).
    pub fn leq(&self, other: &Self) -> bool {
        self.scalar.leq(&other.scalar)
    }

    /// Widen using `thresholds` (e.g. loop-counter bounds proved by the
    /// gauge domain) for the numerical component, and plain join for the
    /// auxiliary per-location maps.
    pub fn widen_to_threshold(&self, other: &Self, thresholds: &[i128]) -> Self {
        let mut out = self.join(other);
        out.scalar = self.scalar.widen_to_threshold(&other.scalar, thresholds);
        out
    }

    fn var_for_cell(&mut self, cell: Cell) -> VarId {
        if let Some(&v) = self.cell_vars.get(&cell) {
            return v;
        }
        let v = VarId::from_raw(self.next_cell_var);
        self.next_cell_var += 1;
        self.cell_vars.insert(cell, v);
        v
    }

    fn drop_cell(&mut self, loc: MemoryLocationId, cell: Cell) {
        if let Some(set) = self.cells.get_mut(&loc) {
            set.remove(&cell);
        }
        if let Some(&v) = self.cell_vars.get(&cell) {
            self.scalar.forget(v);
        }
    }

    /// `mem_write(p, v, size)` (§4.E). `p_offset_var`/`p_points_to` give
    /// the pointer's offset congruence and points-to set directly, since
    /// the executor has already asserted `p` initialized and non-null
    /// before calling in (the assertion failing ⊥s the state through
    /// [`ScalarComposite::assert_initialized`]/`assert_non_null` already).
    pub fn mem_write(
        &mut self,
        points_to: &PointsToSet,
        offset: &IntervalCongruence,
        size: u32,
        sign: Sign,
        value: Interval,
        value_pointer: Option<&PointerValue>,
    ) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        let Some(targets) = points_to.locations() else {
            // Unresolved points-to set: forget everything, a sound but
            // maximally imprecise response (§4.E step 2).
            self.cells.clear();
            self.cell_vars.clear();
            self.scalar = ScalarComposite::top();
            return Ok(());
        };
        if targets.is_empty() {
            self.scalar = ScalarComposite::bottom();
            return Ok(());
        }
        let strong = targets.len() == 1;
        if let Some(o) = offset.as_singleton() {
            for &base in targets {
                self.realize_single_write(base, o.value(), size, sign, value.clone(), strong)?;
            }
        } else {
            for &base in targets {
                self.realize_range_write(base, offset, size, &value)?;
            }
        }
        if let Some(pv) = value_pointer {
            for &base in targets {
                let entry = self.pointer_sets.entry(base).or_default();
                *entry = entry.join(&pv.points_to);
            }
        }
        Ok(())
    }

    fn realize_single_write(
        &mut self,
        base: MemoryLocationId,
        offset: i128,
        size: u32,
        sign: Sign,
        value: Interval,
        strong: bool,
    ) -> Result<(), AnalyzerError> {
        let new_cell = Cell { base, offset, size, sign };
        let existing: BTreeSet<Cell> = self.cells.get(&base).cloned().unwrap_or_default();
        for old in existing.iter().filter(|c| c.overlaps(&new_cell) && **c != new_cell) {
            self.drop_cell(base, *old);
        }
        let var = self.var_for_cell(new_cell);
        self.cells.entry(base).or_default().insert(new_cell);
        if strong {
            self.scalar.dynamic_write_integer(var, value)?;
        } else {
            let prior = self.scalar.dynamic_read_integer(var);
            self.scalar.dynamic_write_integer(var, prior.join(&value))?;
        }
        Ok(())
    }

    fn realize_range_write(
        &mut self,
        base: MemoryLocationId,
        offset: &IntervalCongruence,
        size: u32,
        value: &Interval,
    ) -> Result<(), AnalyzerError> {
        let lo = offset.interval().lo();
        let hi = offset.interval().hi();
        let existing: BTreeSet<Cell> = self.cells.get(&base).cloned().unwrap_or_default();
        for old in existing {
            let write_lo = match lo {
                crate::lattice::interval::Bound::Finite(m) => m.value(),
                _ => old.offset,
            };
            let write_hi = match hi {
                crate::lattice::interval::Bound::Finite(m) => m.value(),
                _ => old.offset,
            };
            let in_range = old.offset >= write_lo && old.offset + i128::from(old.size) - 1 <= write_hi + i128::from(size) - 1;
            let exact = old.size == size && write_lo == write_hi && write_lo == old.offset;
            if exact {
                let var = self.var_for_cell(old);
                let prior = self.scalar.dynamic_read_integer(var);
                self.scalar.dynamic_write_integer(var, prior.join(value))?;
            } else if in_range || old.offset <= write_hi {
                self.drop_cell(base, old);
            }
        }
        Ok(())
    }

    /// `mem_read(x, p, size)` (§4.E).
    pub fn mem_read(
        &mut self,
        x: VarId,
        points_to: &PointsToSet,
        offset: &IntervalCongruence,
        size: u32,
        sign: Sign,
        x_is_pointer: bool,
    ) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        let Some(targets) = points_to.locations() else {
            self.scalar.numerical_mut().forget(x);
            return Ok(());
        };
        if targets.is_empty() {
            self.scalar = ScalarComposite::bottom();
            return Ok(());
        }
        let Some(o) = offset.as_singleton() else {
            self.scalar.forget(x);
            return Ok(());
        };
        let read_cell = Cell { base: *targets.iter().next().unwrap(), offset: o.value(), size, sign };
        let mut result = Interval::bottom_of(size * 8, sign);
        let mut read_init = ReadInit::Init;
        for &base in targets {
            let cell = Cell { base, ..read_cell };
            let existing = self.cells.get(&base).cloned().unwrap_or_default();
            if let Some(&coincident) = existing.iter().find(|c| **c == cell) {
                let var = self.var_for_cell(coincident);
                result = result.join(&self.scalar.dynamic_read_integer(var));
            } else {
                result = result.join(&Interval::top_of(size * 8, sign));
                read_init = ReadInit::Unknown;
            }
        }
        self.scalar.dynamic_write_integer(x, result)?;
        if read_init != ReadInit::Init {
            // §4.E: a fresh cell with no coincident entry can't prove
            // initializedness; the checker layer is responsible for
            // flagging `ReadInit::Unknown` as a potential use of
            // uninitialized memory, not this domain.
        }
        if x_is_pointer {
            let union = targets
                .iter()
                .fold(PointsToSet::empty(), |acc, loc| acc.join(&self.pointer_sets.get(loc).cloned().unwrap_or_default()));
            let offset_var = x;
            let _ = offset_var;
            let refined = PointerValue {
                uninit: crate::lattice::pointer_value::Uninitialized::Init,
                nullity: crate::lattice::pointer_value::Nullity::Top,
                points_to: union,
                offset: Interval::top_of(size * 8, sign),
            };
            self.scalar.dynamic_write_pointer(x, x, &refined)?;
        }
        Ok(())
    }

    /// `memcpy(dst, src, size)` (§4.E "Memcpy contract").
    pub fn memcpy(
        &mut self,
        dst_points_to: &PointsToSet,
        dst_offset: &IntervalCongruence,
        src_points_to: &PointsToSet,
        src_offset: &IntervalCongruence,
        size: &Interval,
    ) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        let (Some(dsts), Some(srcs)) = (dst_points_to.locations(), src_points_to.locations()) else {
            self.cells.clear();
            self.cell_vars.clear();
            return Ok(());
        };
        if dsts.is_empty() || srcs.is_empty() {
            self.scalar = ScalarComposite::bottom();
            return Ok(());
        }
        let (Some(dst_o), Some(src_o)) = (dst_offset.as_singleton(), src_offset.as_singleton()) else {
            for &d in dsts {
                self.cells.remove(&d);
            }
            return Ok(());
        };
        let Some(s_lo) = size.lo_value() else {
            for &d in dsts {
                self.cells.remove(&d);
            }
            return Ok(());
        };
        if dsts.len() != 1 || srcs.len() != 1 {
            for &d in dsts {
                self.cells.remove(&d);
            }
            return Ok(());
        }
        let dst_base = *dsts.iter().next().unwrap();
        let src_base = *srcs.iter().next().unwrap();
        let src_cells: BTreeSet<Cell> = self.cells.get(&src_base).cloned().unwrap_or_default();
        for c in src_cells {
            let rel = c.offset - src_o.value();
            if rel >= 0 && rel + i128::from(c.size) <= s_lo {
                let dst_cell = Cell {
                    base: dst_base,
                    offset: dst_o.value() + rel,
                    size: c.size,
                    sign: c.sign,
                };
                let src_var = self.var_for_cell(c);
                let value = self.scalar.dynamic_read_integer(src_var);
                let dst_var = self.var_for_cell(dst_cell);
                self.cells.entry(dst_base).or_default().insert(dst_cell);
                self.scalar.dynamic_write_integer(dst_var, value)?;
            }
        }
        let src_ptrs = self.pointer_sets.get(&src_base).cloned().unwrap_or_default();
        let entry = self.pointer_sets.entry(dst_base).or_default();
        *entry = entry.join(&src_ptrs);
        Ok(())
    }

    /// `memset(dst, value, size)` (§4.E "Memset contract"). Only the
    /// zero-fill fast path is modeled precisely; any other value
    /// conservatively forgets overlapping cells.
    pub fn memset(
        &mut self,
        dst_points_to: &PointsToSet,
        dst_offset: &IntervalCongruence,
        value: &Interval,
        size: &Interval,
    ) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        let Some(dsts) = dst_points_to.locations() else {
            self.cells.clear();
            self.cell_vars.clear();
            return Ok(());
        };
        let is_zero = value.as_singleton().map(|v| v.value() == 0).unwrap_or(false);
        for &base in dsts {
            let existing: BTreeSet<Cell> = self.cells.get(&base).cloned().unwrap_or_default();
            if !is_zero {
                for c in existing {
                    self.drop_cell(base, c);
                }
                continue;
            }
            let (Some(off_lb), Some(size_lb)) = (dst_offset.interval().lo_value(), size.lo_value()) else {
                for c in existing {
                    self.drop_cell(base, c);
                }
                continue;
            };
            let off_ub = dst_offset.interval().hi_value().unwrap_or(off_lb);
            let certain_lo = off_ub;
            let certain_hi = off_lb + size_lb - 1;
            let possible_lo = off_lb;
            let Some(size_ub) = size.hi_value() else {
                // Unbounded possibly-written size: conservatively drop
                // every overlapping cell rather than under-approximate
                // the possibly-written range.
                for c in existing {
                    self.drop_cell(base, c);
                }
                continue;
            };
            let possible_hi = off_ub + size_ub - 1;
            for c in existing {
                let (c_lo, c_hi) = c.range();
                if c_lo >= certain_lo && c_hi <= certain_hi && certain_lo <= certain_hi {
                    let var = self.var_for_cell(c);
                    self.scalar.dynamic_write_integer(var, Interval::singleton(crate::num::MachineInt::new(0, c.size * 8, c.sign)))?;
                } else if c_lo <= possible_hi && c_hi >= possible_lo {
                    self.drop_cell(base, c);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interval_domain::IntervalDomain;
    use crate::num::MachineInt;
    use crate::variable::MemoryLocationFactory;

    fn ic(v: i128) -> IntervalCongruence {
        IntervalCongruence::exact(MachineInt::new(v, 64, Sign::Unsigned))
    }

    #[test]
    fn strong_update_overwrites_singleton_target() {
        let mut mem: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
        let locations = MemoryLocationFactory::new();
        let loc = locations.errno();
        let pts = PointsToSet::singleton(loc);
        mem.mem_write(&pts, &ic(0), 4, Sign::Signed, Interval::singleton(MachineInt::new(5, 32, Sign::Signed)), None)
            .unwrap();
        mem.mem_write(&pts, &ic(0), 4, Sign::Signed, Interval::singleton(MachineInt::new(9, 32, Sign::Signed)), None)
            .unwrap();
        let var = *mem.cell_vars.values().next().unwrap();
        assert_eq!(mem.scalar.dynamic_read_integer(var).as_singleton().unwrap().value(), 9);
    }

    #[test]
    fn write_to_empty_points_to_is_bottom() {
        let mut mem: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
        let empty = PointsToSet::empty();
        mem.mem_write(&empty, &ic(0), 4, Sign::Signed, Interval::singleton(MachineInt::new(1, 32, Sign::Signed)), None)
            .unwrap();
        assert!(mem.is_bottom());
    }

    #[test]
    fn memset_zero_clears_cell_to_zero() {
        let mut mem: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
        let locations = MemoryLocationFactory::new();
        let loc = locations.errno();
        let pts = PointsToSet::singleton(loc);
        mem.mem_write(&pts, &ic(0), 4, Sign::Signed, Interval::singleton(MachineInt::new(7, 32, Sign::Signed)), None)
            .unwrap();
        mem.memset(
            &pts,
            &ic(0),
            &Interval::singleton(MachineInt::new(0, 8, Sign::Unsigned)),
            &Interval::singleton(MachineInt::new(4, 64, Sign::Unsigned)),
        )
        .unwrap();
        let var = *mem.cell_vars.values().next().unwrap();
        assert_eq!(mem.scalar.dynamic_read_integer(var).as_singleton().unwrap().value(), 0);
    }
}
