//! The interval domain (§4.C): a non-relational map `variable → interval`.

use alloc::collections::BTreeMap;

use crate::domain::{ApplyOp, Constraint, LinearExpr, NumericalDomain};
use crate::error::AnalyzerError;
use crate::lattice::interval::Interval;
use crate::lattice::Lattice;
use crate::num::{Congruence, MachineInt, Sign};
use crate::variable::VarId;

/// Bit width/sign used for variables not yet seen by the domain; new
/// variables default to `⊤` at this width until an `assign`/`set`
/// narrows them, mirroring the teacher's convention of a fixed machine
/// word size for untyped register slots.
const DEFAULT_WIDTH: u32 = 64;
const DEFAULT_SIGN: Sign = Sign::Signed;

/// `variable → interval`, bottom represented by an explicit flag so an
/// empty map (no variables constrained yet) is distinguishable from
/// "unreachable".
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalDomain {
    bottom: bool,
    values: BTreeMap<VarId, Interval>,
}

impl IntervalDomain {
    fn get(&self, x: VarId) -> Interval {
        self.values
            .get(&x)
            .cloned()
            .unwrap_or_else(|| Interval::top_of(DEFAULT_WIDTH, DEFAULT_SIGN))
    }

    fn eval(&self, e: &LinearExpr) -> Interval {
        let mut acc = Interval::singleton(MachineInt::new(e.constant, DEFAULT_WIDTH, DEFAULT_SIGN));
        for (x, k) in &e.terms {
            let term = self
                .get(*x)
                .mul(&Interval::singleton(MachineInt::new(*k, DEFAULT_WIDTH, DEFAULT_SIGN)));
            acc = acc.add(&term);
        }
        acc
    }
}

impl NumericalDomain for IntervalDomain {
    fn bottom() -> Self {
        Self {
            bottom: true,
            values: BTreeMap::new(),
        }
    }

    fn top() -> Self {
        Self {
            bottom: false,
            values: BTreeMap::new(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.bottom || self.values.values().any(Lattice::is_bottom)
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut values = BTreeMap::new();
        for key in self.values.keys().chain(other.values.keys()) {
            if !values.contains_key(key) {
                values.insert(*key, self.get(*key).join(&other.get(*key)));
            }
        }
        Self { bottom: false, values }
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        let mut values = BTreeMap::new();
        for key in self.values.keys().chain(other.values.keys()) {
            if !values.contains_key(key) {
                values.insert(*key, self.get(*key).meet(&other.get(*key)));
            }
        }
        Self { bottom: false, values }
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        other.values.keys().all(|k| self.get(*k).leq(&other.get(*k)))
    }

    fn widen(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut values = BTreeMap::new();
        for key in self.values.keys().chain(other.values.keys()) {
            if !values.contains_key(key) {
                values.insert(*key, self.get(*key).widen(&other.get(*key)));
            }
        }
        Self { bottom: false, values }
    }

    fn widen_to_threshold(&self, other: &Self, thresholds: &[i128]) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut values = BTreeMap::new();
        for key in self.values.keys().chain(other.values.keys()) {
            if !values.contains_key(key) {
                values.insert(*key, self.get(*key).widen_to_threshold(&other.get(*key), thresholds));
            }
        }
        Self { bottom: false, values }
    }

    fn narrow(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        let mut values = self.values.clone();
        for (k, v) in &other.values {
            let entry = values.entry(*k).or_insert_with(|| Interval::top_of(DEFAULT_WIDTH, DEFAULT_SIGN));
            *entry = entry.narrow(v);
        }
        Self { bottom: false, values }
    }

    fn assign(&mut self, x: VarId, e: &LinearExpr) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        let v = self.eval(e);
        self.values.insert(x, v);
        Ok(())
    }

    fn apply(&mut self, op: ApplyOp, z: VarId, x: VarId, y: VarId) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        let (a, b) = (self.get(x), self.get(y));
        let result = match op {
            ApplyOp::Add => a.add(&b),
            ApplyOp::Sub => a.sub(&b),
            ApplyOp::Mul => a.mul(&b),
            ApplyOp::Div | ApplyOp::Rem => {
                // Interval division is not tracked precisely here; the
                // gauge/DBM domains below don't implement it either, and
                // the spec leaves exact div/rem abstraction to the scalar
                // composite's use of `MachineInt::div`. Forgetting to top
                // is sound.
                Interval::top_of(DEFAULT_WIDTH, DEFAULT_SIGN)
            }
        };
        self.values.insert(z, result);
        Ok(())
    }

    fn add_constraint(&mut self, c: &Constraint) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        // Only single-variable constraints are refined precisely by a
        // non-relational domain; anything else is a sound no-op here
        // (relational domains below handle the general case).
        let (expr, strengthen) = match c {
            Constraint::Equal(e) => (e, 0i128),
            Constraint::LessEqual(e) => (e, 0),
            Constraint::LessThan(e) => (e, 1),
        };
        if expr.terms.len() == 1 {
            let (x, k) = expr.terms[0];
            if k == 1 || k == -1 {
                let bound = -expr.constant * k - strengthen * k;
                let cur = self.get(x);
                let refined = match (c, k) {
                    (Constraint::Equal(_), _) => Interval::singleton(MachineInt::new(
                        bound,
                        cur.bit_width(),
                        cur.sign(),
                    )),
                    (_, 1) => cur.meet(&Interval::new(
                        *cur.lo(),
                        crate::lattice::interval::Bound::Finite(MachineInt::new(
                            bound,
                            cur.bit_width(),
                            cur.sign(),
                        )),
                        cur.bit_width(),
                        cur.sign(),
                    )),
                    (_, -1) => cur.meet(&Interval::new(
                        crate::lattice::interval::Bound::Finite(MachineInt::new(
                            bound,
                            cur.bit_width(),
                            cur.sign(),
                        )),
                        *cur.hi(),
                        cur.bit_width(),
                        cur.sign(),
                    )),
                    _ => cur,
                };
                self.values.insert(x, refined);
            }
        }
        Ok(())
    }

    fn set(&mut self, x: VarId, value: Interval) {
        self.values.insert(x, value);
    }

    fn refine(&mut self, x: VarId, value: Interval) {
        let cur = self.get(x);
        self.values.insert(x, cur.meet(&value));
    }

    fn forget(&mut self, x: VarId) {
        self.values.remove(&x);
    }

    fn to_interval(&self, x: VarId) -> Interval {
        if self.is_bottom() {
            Interval::bottom_of(DEFAULT_WIDTH, DEFAULT_SIGN)
        } else {
            self.get(x)
        }
    }

    fn to_congruence(&self, _x: VarId) -> Congruence {
        Congruence::top()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_and_read_back() {
        let mut dom = IntervalDomain::top();
        let x = VarId::from_raw(0);
        dom.assign(x, &LinearExpr::constant(5)).unwrap();
        assert_eq!(dom.to_interval(x).as_singleton().unwrap().value(), 5);
    }

    #[test]
    fn forget_returns_to_top() {
        let mut dom = IntervalDomain::top();
        let x = VarId::from_raw(0);
        dom.assign(x, &LinearExpr::constant(5)).unwrap();
        dom.forget(x);
        assert!(dom.to_interval(x).is_top());
    }

    #[test]
    fn join_of_disjoint_assignments_covers_both() {
        let mut a = IntervalDomain::top();
        let mut b = IntervalDomain::top();
        let x = VarId::from_raw(0);
        a.assign(x, &LinearExpr::constant(5)).unwrap();
        b.assign(x, &LinearExpr::constant(10)).unwrap();
        let joined = a.join(&b);
        let iv = joined.to_interval(x);
        assert!(iv.leq(&Interval::new(
            crate::lattice::interval::Bound::Finite(MachineInt::new(5, DEFAULT_WIDTH, DEFAULT_SIGN)),
            crate::lattice::interval::Bound::Finite(MachineInt::new(10, DEFAULT_WIDTH, DEFAULT_SIGN)),
            DEFAULT_WIDTH,
            DEFAULT_SIGN,
        )));
    }
}
