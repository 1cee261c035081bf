//! The gauge domain (§4.C): a `variable → Gauge` map plus an interval
//! domain fallback for non-counter variables, used to express loop-bound
//! facts like "the read index stays below the allocation size for every
//! iteration" that a plain interval loses after the first widening.

use alloc::collections::{BTreeMap, BTreeSet};

use crate::domain::interval_domain::IntervalDomain;
use crate::domain::{ApplyOp, Constraint, LinearExpr, NumericalDomain};
use crate::error::AnalyzerError;
use crate::lattice::gauge::{Gauge, GaugeBound};
use crate::lattice::interval::Interval;
use crate::num::Congruence;
use crate::variable::VarId;

/// `variable → Gauge`, backed by [`IntervalDomain`] for variables that
/// aren't loop counters (§4.C "the gauge domain degrades to interval
/// reasoning for everything outside a counter's scope").
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeDomain {
    bottom: bool,
    counters: BTreeSet<VarId>,
    gauges: BTreeMap<VarId, Gauge>,
    /// Loop counters' last two section values, recorded by
    /// [`Self::mark_section`] and consumed by [`Self::widen_at_section`].
    sections: BTreeMap<VarId, (i128, Option<i128>)>,
    fallback: IntervalDomain,
}

impl GaugeDomain {
    fn get(&self, x: VarId) -> Gauge {
        self.gauges.get(&x).cloned().unwrap_or_else(Gauge::top)
    }

    /// Declare `x` as a loop counter starting at `0` (§4.C `init_counter`).
    pub fn init_counter(&mut self, x: VarId) {
        self.counters.insert(x);
        self.gauges.insert(x, Gauge::constant(0));
        self.sections.insert(x, (0, None));
    }

    /// Advance a previously-initialized counter by one iteration (§4.C
    /// `incr_counter`): `x := x + 1`.
    pub fn incr_counter(&mut self, x: VarId) {
        if !self.counters.contains(&x) {
            return;
        }
        let cur = self.get(x);
        let one = Gauge::new(GaugeBound::constant(1), GaugeBound::constant(1));
        let next = Gauge::new(cur.lower().add(one.lower()), cur.upper().add(one.upper()));
        self.gauges.insert(x, next);
    }

    /// Mark that loop counter `x` is at the widening point again, with
    /// concrete value `value` (when known); used to compute the two
    /// section values linear-interpolation widening needs.
    pub fn mark_section(&mut self, x: VarId, value: Option<i128>) {
        let entry = self.sections.entry(x).or_insert((0, None));
        entry.1 = value.or(entry.1);
    }

    fn gauge_bound_add(g: &Gauge, other: &Gauge) -> Gauge {
        Gauge::new(g.lower().add(other.lower()), g.upper().add(other.upper()))
    }
}

impl NumericalDomain for GaugeDomain {
    fn bottom() -> Self {
        Self {
            bottom: true,
            counters: BTreeSet::new(),
            gauges: BTreeMap::new(),
            sections: BTreeMap::new(),
            fallback: IntervalDomain::bottom(),
        }
    }

    fn top() -> Self {
        Self {
            bottom: false,
            counters: BTreeSet::new(),
            gauges: BTreeMap::new(),
            sections: BTreeMap::new(),
            fallback: IntervalDomain::top(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.bottom || self.fallback.is_bottom()
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut gauges = BTreeMap::new();
        for key in self.gauges.keys().chain(other.gauges.keys()) {
            if !gauges.contains_key(key) {
                gauges.insert(*key, self.get(*key).join(&other.get(*key)));
            }
        }
        Self {
            bottom: false,
            counters: self.counters.union(&other.counters).copied().collect(),
            gauges,
            sections: self.sections.clone(),
            fallback: self.fallback.join(&other.fallback),
        }
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        let mut gauges = BTreeMap::new();
        for key in self.gauges.keys().chain(other.gauges.keys()) {
            if !gauges.contains_key(key) {
                gauges.insert(*key, self.get(*key).meet(&other.get(*key)));
            }
        }
        Self {
            bottom: false,
            counters: self.counters.union(&other.counters).copied().collect(),
            gauges,
            sections: self.sections.clone(),
            fallback: self.fallback.meet(&other.fallback),
        }
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        other.gauges.keys().all(|k| self.get(*k).leq(&other.get(*k))) && self.fallback.leq(&other.fallback)
    }

    fn widen(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut gauges = BTreeMap::new();
        for key in self.gauges.keys().chain(other.gauges.keys()) {
            if gauges.contains_key(key) {
                continue;
            }
            let x = *key;
            if let Some(section_var) = self.counters.iter().find(|&&c| c == x).copied() {
                let (u, v) = self.sections.get(&section_var).copied().unwrap_or((0, None));
                gauges.insert(x, self.get(x).widen(&other.get(x), section_var, u, v));
            } else {
                // Not itself a counter; widen against the constant-0/1
                // section pair of the relevant counter is unavailable, so
                // fall back to the plain `Gauge::join`, which already
                // saturates incomparable linear bounds to infinity.
                gauges.insert(x, self.get(x).join(&other.get(x)));
            }
        }
        Self {
            bottom: false,
            counters: self.counters.clone(),
            gauges,
            sections: self.sections.clone(),
            fallback: self.fallback.widen(&other.fallback),
        }
    }

    fn narrow(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        let mut gauges = self.gauges.clone();
        for (k, v) in &other.gauges {
            let entry = gauges.entry(*k).or_insert_with(Gauge::top);
            *entry = entry.meet(v);
        }
        Self {
            bottom: false,
            counters: self.counters.clone(),
            gauges,
            sections: self.sections.clone(),
            fallback: self.fallback.narrow(&other.fallback),
        }
    }

    fn assign(&mut self, x: VarId, e: &LinearExpr) -> Result<(), AnalyzerError> {
        self.fallback.assign(x, e)?;
        if e.terms.is_empty() {
            self.gauges.insert(x, Gauge::constant(e.constant));
        } else if e.terms.len() == 1 && e.terms[0].1 == 1 && self.counters.contains(&e.terms[0].0) {
            let (y, _) = e.terms[0];
            let base = self.get(y);
            let delta = Gauge::constant(e.constant);
            self.gauges.insert(x, Self::gauge_bound_add(&base, &delta));
        } else {
            self.gauges.remove(&x);
        }
        Ok(())
    }

    fn apply(&mut self, op: ApplyOp, z: VarId, x: VarId, y: VarId) -> Result<(), AnalyzerError> {
        self.fallback.apply(op, z, x, y)?;
        if let ApplyOp::Add = op {
            let gx = self.get(x);
            let gy = self.get(y);
            self.gauges.insert(z, Self::gauge_bound_add(&gx, &gy));
        } else {
            self.gauges.remove(&z);
        }
        Ok(())
    }

    fn add_constraint(&mut self, c: &Constraint) -> Result<(), AnalyzerError> {
        self.fallback.add_constraint(c)
    }

    fn set(&mut self, x: VarId, value: Interval) {
        self.fallback.set(x, value.clone());
        if let Some(v) = value.as_singleton() {
            self.gauges.insert(x, Gauge::constant(v.value()));
        } else {
            self.gauges.remove(&x);
        }
    }

    fn refine(&mut self, x: VarId, value: Interval) {
        self.fallback.refine(x, value);
    }

    fn forget(&mut self, x: VarId) {
        self.fallback.forget(x);
        self.gauges.remove(&x);
        self.counters.remove(&x);
        self.sections.remove(&x);
    }

    fn to_interval(&self, x: VarId) -> Interval {
        self.fallback.to_interval(x)
    }

    fn to_congruence(&self, x: VarId) -> Congruence {
        self.fallback.to_congruence(x)
    }

    fn widen_to_threshold(&self, other: &Self, thresholds: &[i128]) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut gauges = BTreeMap::new();
        for key in self.gauges.keys().chain(other.gauges.keys()) {
            if gauges.contains_key(key) {
                continue;
            }
            let x = *key;
            if let Some(section_var) = self.counters.iter().find(|&&c| c == x).copied() {
                let (u, v) = self.sections.get(&section_var).copied().unwrap_or((0, None));
                gauges.insert(x, self.get(x).widen(&other.get(x), section_var, u, v));
            } else {
                gauges.insert(x, self.get(x).join(&other.get(x)));
            }
        }
        Self {
            bottom: false,
            counters: self.counters.clone(),
            gauges,
            sections: self.sections.clone(),
            fallback: self.fallback.widen_to_threshold(&other.fallback, thresholds),
        }
    }

    fn mark_counter(&mut self, x: VarId) {
        self.init_counter(x);
    }

    fn mark_loop_iteration(&mut self, x: VarId, value: i128) {
        self.mark_section(x, Some(value));
    }
}
