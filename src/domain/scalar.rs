//! The scalar composite domain (§4.D): a product over one variable
//! universe of uninitializedness, nullity, points-to, and a generic
//! numerical domain, with the dynamic-type helpers the memory domain
//! (§4.E) builds on.

use alloc::collections::BTreeMap;

use crate::domain::{ApplyOp, NumericalDomain};
use crate::error::AnalyzerError;
use crate::lattice::interval::Interval;
use crate::lattice::pointer_value::{Nullity, PointerValue, Uninitialized};
use crate::lattice::points_to::PointsToSet;
use crate::lattice::Lattice;
use crate::variable::{MemoryLocationFactory, VarId, VariableFactory};

/// `(uninit, nullity, points-to) × numerical`, generic in the numerical
/// domain `N` so the fixpoint engine can run the same scalar logic over
/// an interval, DBM, or packed configuration (§6 "selected at analysis
/// start, the same scalar/memory code runs regardless").
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarComposite<N> {
    bottom: bool,
    uninit: BTreeMap<VarId, Uninitialized>,
    nullity: BTreeMap<VarId, Nullity>,
    points_to: BTreeMap<VarId, PointsToSet>,
    numerical: N,
}

impl<N: NumericalDomain> ScalarComposite<N> {
    /// `⊥`.
    pub fn bottom() -> Self {
        Self {
            bottom: true,
            uninit: BTreeMap::new(),
            nullity: BTreeMap::new(),
            points_to: BTreeMap::new(),
            numerical: N::bottom(),
        }
    }

    /// `⊤`.
    pub fn top() -> Self {
        Self {
            bottom: false,
            uninit: BTreeMap::new(),
            nullity: BTreeMap::new(),
            points_to: BTreeMap::new(),
            numerical: N::top(),
        }
    }

    /// Whether the composite is unreachable.
    pub fn is_bottom(&self) -> bool {
        self.bottom || self.numerical.is_bottom()
    }

    fn uninit_of(&self, x: VarId) -> Uninitialized {
        self.uninit.get(&x).copied().unwrap_or_default()
    }

    fn nullity_of(&self, x: VarId) -> Nullity {
        self.nullity.get(&x).copied().unwrap_or_default()
    }

    fn points_to_of(&self, x: VarId) -> PointsToSet {
        self.points_to.get(&x).cloned().unwrap_or_default()
    }

    /// Pointwise join across all four components.
    pub fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut uninit = BTreeMap::new();
        let mut nullity = BTreeMap::new();
        let mut points_to = BTreeMap::new();
        for key in self.uninit.keys().chain(other.uninit.keys()) {
            uninit.entry(*key).or_insert_with(|| self.uninit_of(*key).join(&other.uninit_of(*key)));
        }
        for key in self.nullity.keys().chain(other.nullity.keys()) {
            nullity.entry(*key).or_insert_with(|| self.nullity_of(*key).join(&other.nullity_of(*key)));
        }
        for key in self.points_to.keys().chain(other.points_to.keys()) {
            points_to
                .entry(*key)
                .or_insert_with(|| self.points_to_of(*key).join(&other.points_to_of(*key)));
        }
        Self {
            bottom: false,
            uninit,
            nullity,
            points_to,
            numerical: self.numerical.join(&other.numerical),
        }
    }

    /// Pointwise meet; any component collapsing to `⊥` makes the whole
    /// composite `⊥`, observable via [`Self::is_bottom`].
    pub fn meet(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        let mut uninit = BTreeMap::new();
        let mut nullity = BTreeMap::new();
        let mut points_to = BTreeMap::new();
        for key in self.uninit.keys().chain(other.uninit.keys()) {
            uninit.entry(*key).or_insert_with(|| self.uninit_of(*key).meet(&other.uninit_of(*key)));
        }
        for key in self.nullity.keys().chain(other.nullity.keys()) {
            nullity.entry(*key).or_insert_with(|| self.nullity_of(*key).meet(&other.nullity_of(*key)));
        }
        for key in self.points_to.keys().chain(other.points_to.keys()) {
            points_to
                .entry(*key)
                .or_insert_with(|| self.points_to_of(*key).meet(&other.points_to_of(*key)));
        }
        Self {
            bottom: false,
            uninit,
            nullity,
            points_to,
            numerical: self.numerical.meet(&other.numerical),
        }
    }

    /// `self ⊑ other`.
    pub fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        other.uninit.keys().all(|k| self.uninit_of(*k).leq(&other.uninit_of(*k)))
            && other.nullity.keys().all(|k| self.nullity_of(*k).leq(&other.nullity_of(*k)))
            && other.points_to.keys().all(|k| self.points_to_of(*k).leq(&other.points_to_of(*k)))
            && self.numerical.leq(&other.numerical)
    }

    /// Widen: booleans/points-to components have finite height and widen
    /// via join; the numerical component uses `N::widen`.
    pub fn widen(&self, other: &Self) -> Self {
        let joined = self.join(other);
        Self {
            numerical: self.numerical.widen(&other.numerical),
            ..joined
        }
    }

    /// Widen with threshold hints for the numerical component (§4.H
    /// "widening-to-threshold if threshold information is available").
    pub fn widen_to_threshold(&self, other: &Self, thresholds: &[i128]) -> Self {
        let joined = self.join(other);
        Self {
            numerical: self.numerical.widen_to_threshold(&other.numerical, thresholds),
            ..joined
        }
    }

    /// Narrow, dual of [`Self::widen`].
    pub fn narrow(&self, other: &Self) -> Self {
        let met = self.meet(other);
        Self {
            numerical: self.numerical.narrow(&other.numerical),
            ..met
        }
    }

    /// Remove `x` from every component (§4.D, used when a variable goes
    /// out of scope or its cell is overwritten).
    pub fn forget(&mut self, x: VarId) {
        self.uninit.remove(&x);
        self.nullity.remove(&x);
        self.points_to.remove(&x);
        self.numerical.forget(x);
    }

    /// Write an integer value (§4.D `dynamic_write_integer`).
    pub fn dynamic_write_integer(&mut self, x: VarId, value: Interval) -> Result<(), AnalyzerError> {
        self.uninit.insert(x, Uninitialized::Init);
        self.nullity.remove(&x);
        self.points_to.remove(&x);
        self.numerical.set(x, value);
        Ok(())
    }

    /// Write a pointer value (§4.D `dynamic_write_pointer`). Requires the
    /// pointer's derived offset variable (see [`VariableFactory::offset_of`])
    /// to route the offset component into the numerical domain.
    pub fn dynamic_write_pointer(
        &mut self,
        x: VarId,
        offset_var: VarId,
        value: &PointerValue,
    ) -> Result<(), AnalyzerError> {
        self.uninit.insert(x, value.uninit);
        self.nullity.insert(x, value.nullity);
        self.points_to.insert(x, value.points_to.clone());
        self.numerical.set(offset_var, value.offset.clone());
        Ok(())
    }

    /// Read back an integer value (§4.D `dynamic_read_integer`). Per
    /// §4.D's implicit coercion, a definitely-null pointer read through an
    /// integer-typed access yields the constant zero.
    pub fn dynamic_read_integer(&self, x: VarId) -> Interval {
        if self.nullity_of(x) == Nullity::Null {
            return Interval::singleton(crate::num::MachineInt::new(0, 64, crate::num::Sign::Signed));
        }
        self.numerical.to_interval(x)
    }

    /// Read back a pointer value (§4.D `dynamic_read_pointer`). Per §4.D's
    /// symmetric coercion, an integer known to be exactly zero reads back
    /// as null with an empty points-to set.
    pub fn dynamic_read_pointer(&self, x: VarId, offset_var: VarId) -> PointerValue {
        if self.dynamic_is_zero(x) {
            return PointerValue {
                uninit: self.uninit_of(x),
                nullity: Nullity::Null,
                points_to: PointsToSet::empty(),
                offset: Interval::singleton(crate::num::MachineInt::new(0, 64, crate::num::Sign::Unsigned)),
            };
        }
        PointerValue {
            uninit: self.uninit_of(x),
            nullity: self.nullity_of(x),
            points_to: self.points_to_of(x),
            offset: self.numerical.to_interval(offset_var),
        }
    }

    /// Whether `x`'s numerical value is definitely the constant zero.
    pub fn dynamic_is_zero(&self, x: VarId) -> bool {
        self.numerical.to_interval(x).as_singleton().map(|v| v.value() == 0).unwrap_or(false)
    }

    /// Whether `x` is definitely null.
    pub fn dynamic_is_null(&self, x: VarId) -> bool {
        self.nullity_of(x) == Nullity::Null
    }

    /// Bridge a pointer to its integer representation (§4.D
    /// `pointer_to_int`): the offset becomes the integer value when the
    /// pointer targets the absolute-zero sentinel, otherwise the result is
    /// an opaque (top) integer since the concrete address is unknown.
    pub fn pointer_to_int(&mut self, dst: VarId, src: VarId, offset_var: VarId, locations: &MemoryLocationFactory) {
        let pts = self.points_to_of(src);
        if pts.locations().is_some_and(|ls| ls.len() == 1 && ls.contains(&locations.absolute_zero())) {
            let off = self.numerical.to_interval(offset_var);
            self.numerical.set(dst, off);
        } else {
            self.numerical.forget(dst);
        }
        self.uninit.insert(dst, self.uninit_of(src));
    }

    /// Bridge an integer to a pointer representation (§4.D
    /// `int_to_pointer`): `(T*)0` maps to "points-to = {absolute_zero},
    /// offset = 0"; any other constant maps conservatively to `⊤`'s
    /// points-to set since the hardware-address allowlist (if any) is
    /// applied by the checker, not here.
    pub fn int_to_pointer(
        &mut self,
        dst: VarId,
        dst_offset_var: VarId,
        src: VarId,
        vars: &VariableFactory,
        locations: &MemoryLocationFactory,
    ) {
        let _ = vars;
        if self.dynamic_is_zero(src) {
            self.points_to.insert(dst, PointsToSet::singleton(locations.absolute_zero()));
            self.nullity.insert(dst, Nullity::Null);
            self.numerical
                .set(dst_offset_var, Interval::singleton(crate::num::MachineInt::new(0, 64, crate::num::Sign::Unsigned)));
        } else {
            self.points_to.insert(dst, PointsToSet::top());
            self.nullity.insert(dst, Nullity::Top);
            self.numerical.forget(dst_offset_var);
        }
        self.uninit.insert(dst, self.uninit_of(src));
    }

    /// Intersect `x`'s initializedness with `Init`; `⊥` proves a
    /// use-of-uninitialized-value error at the call site (§4.D).
    pub fn assert_initialized(&mut self, x: VarId) {
        let refined = self.uninit_of(x).meet(&Uninitialized::Init);
        self.uninit.insert(x, refined);
        if refined.is_bottom() {
            self.bottom = true;
        }
    }

    /// Intersect `x`'s nullity with `NonNull`; `⊥` proves a null-pointer
    /// dereference (§4.D).
    pub fn assert_non_null(&mut self, x: VarId) {
        let refined = self.nullity_of(x).meet(&Nullity::NonNull);
        self.nullity.insert(x, refined);
        if refined.is_bottom() {
            self.bottom = true;
        }
    }

    /// Intersect `x`'s nullity with `Null`.
    pub fn assert_null(&mut self, x: VarId) {
        let refined = self.nullity_of(x).meet(&Nullity::Null);
        self.nullity.insert(x, refined);
        if refined.is_bottom() {
            self.bottom = true;
        }
    }

    /// Access the inner numerical domain, e.g. for `apply`/`add_constraint`
    /// calls the executor issues directly.
    pub fn numerical_mut(&mut self) -> &mut N {
        &mut self.numerical
    }

    /// Read-only access to the inner numerical domain.
    pub fn numerical(&self) -> &N {
        &self.numerical
    }

    /// `z = x op y` over the numerical component, forgetting the
    /// non-numerical components of `z` (an arithmetic result is never a
    /// pointer, per the AR type system §6 the executor relies on).
    pub fn apply(&mut self, op: ApplyOp, z: VarId, x: VarId, y: VarId) -> Result<(), AnalyzerError> {
        self.nullity.remove(&z);
        self.points_to.remove(&z);
        self.uninit.insert(z, Uninitialized::Init);
        self.numerical.apply(op, z, x, y)
    }
}
