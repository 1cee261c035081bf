//! The DBM+congruence reduced product (§4.C, Configuration: `DbmCongruence`):
//! a [`DbmDomain`] paired with a per-variable [`Congruence`] map, recovering
//! the stride information a plain DBM can't express (e.g. `i` stepping by 4
//! in a strided loop) while keeping the DBM's relational precision on
//! differences. Follows the same "primary map + relational fallback" shape
//! as [`crate::domain::gauge_domain::GaugeDomain`], and reduces the way
//! [`crate::lattice::interval_congruence::IntervalCongruence`] reduces an
//! interval against a congruence, just with a DBM standing in for the
//! interval.

use alloc::collections::BTreeMap;

use crate::domain::dbm::DbmDomain;
use crate::domain::{ApplyOp, Constraint, LinearExpr, NumericalDomain};
use crate::error::AnalyzerError;
use crate::lattice::interval::Interval;
use crate::num::Congruence;
use crate::variable::VarId;

/// `DbmDomain ⨯ (VarId -> Congruence)`, reduced on read through
/// [`Self::to_congruence`] and [`Self::to_interval`].
#[derive(Debug, Clone, PartialEq)]
pub struct DbmCongruenceDomain {
    dbm: DbmDomain,
    congruences: BTreeMap<VarId, Congruence>,
}

impl DbmCongruenceDomain {
    fn congruence_of(&self, x: VarId) -> Congruence {
        self.congruences.get(&x).copied().unwrap_or_else(Congruence::top)
    }

    /// Congruence of a linear expression, as precise as the stored
    /// per-variable congruences allow: exact for constants and single
    /// variables with a unit coefficient, `top` for anything else.
    fn congruence_of_expr(&self, e: &LinearExpr) -> Congruence {
        if e.terms.is_empty() {
            return Congruence::exact(e.constant);
        }
        if e.terms.len() == 1 && e.terms[0].1 == 1 {
            return self.congruence_of(e.terms[0].0).add(&Congruence::exact(e.constant));
        }
        Congruence::top()
    }
}

impl NumericalDomain for DbmCongruenceDomain {
    fn bottom() -> Self {
        Self {
            dbm: DbmDomain::bottom(),
            congruences: BTreeMap::new(),
        }
    }

    fn top() -> Self {
        Self {
            dbm: DbmDomain::top(),
            congruences: BTreeMap::new(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.dbm.is_bottom()
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut congruences = BTreeMap::new();
        for (&x, c) in &self.congruences {
            if let Some(oc) = other.congruences.get(&x) {
                congruences.insert(x, c.join(oc));
            }
        }
        Self {
            dbm: self.dbm.join(&other.dbm),
            congruences,
        }
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        let mut congruences = self.congruences.clone();
        for (&x, oc) in &other.congruences {
            let merged = match congruences.get(&x) {
                Some(c) => c.meet(oc),
                None => Some(*oc),
            };
            match merged {
                Some(c) => {
                    congruences.insert(x, c);
                }
                None => return Self::bottom(),
            }
        }
        Self {
            dbm: self.dbm.meet(&other.dbm),
            congruences,
        }
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        if !self.dbm.leq(&other.dbm) {
            return false;
        }
        other.congruences.iter().all(|(x, oc)| self.congruence_of(*x).leq(oc))
    }

    fn widen(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut congruences = BTreeMap::new();
        for (&x, c) in &self.congruences {
            if let Some(oc) = other.congruences.get(&x) {
                if c == oc {
                    congruences.insert(x, *c);
                }
            }
        }
        Self {
            dbm: self.dbm.widen(&other.dbm),
            congruences,
        }
    }

    fn narrow(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        self.meet(other)
    }

    fn assign(&mut self, x: VarId, e: &LinearExpr) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        let c = self.congruence_of_expr(e);
        self.dbm.assign(x, e)?;
        self.congruences.insert(x, c);
        Ok(())
    }

    fn apply(&mut self, op: ApplyOp, z: VarId, x: VarId, y: VarId) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        self.dbm.apply(op, z, x, y)?;
        let cx = self.congruence_of(x);
        let cy = self.congruence_of(y);
        let cz = match op {
            ApplyOp::Add => cx.add(&cy),
            ApplyOp::Sub => cx.sub(&cy),
            ApplyOp::Mul => cx.mul(&cy),
            ApplyOp::Div | ApplyOp::Rem => Congruence::top(),
        };
        self.congruences.insert(z, cz);
        Ok(())
    }

    fn add_constraint(&mut self, c: &Constraint) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        self.dbm.add_constraint(c)
    }

    fn set(&mut self, x: VarId, value: Interval) {
        self.dbm.set(x, value);
        self.congruences.remove(&x);
        if let Some(v) = value.as_singleton() {
            self.congruences.insert(x, Congruence::exact(v.value()));
        }
    }

    fn refine(&mut self, x: VarId, value: Interval) {
        self.dbm.refine(x, value);
        if let Some(v) = value.as_singleton() {
            let exact = Congruence::exact(v.value());
            let refined = self.congruence_of(x).meet(&exact).unwrap_or(exact);
            self.congruences.insert(x, refined);
        }
    }

    fn forget(&mut self, x: VarId) {
        self.dbm.forget(x);
        self.congruences.remove(&x);
    }

    fn to_interval(&self, x: VarId) -> Interval {
        self.dbm.to_interval(x)
    }

    fn to_congruence(&self, x: VarId) -> Congruence {
        self.congruence_of(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::{MachineInt, Sign};

    #[test]
    fn constant_assignment_is_an_exact_congruence() {
        let mut dom = DbmCongruenceDomain::top();
        let x = VarId::from_raw(0);
        dom.assign(x, &LinearExpr::constant(4)).unwrap();
        assert_eq!(dom.to_congruence(x), Congruence::exact(4));
    }

    #[test]
    fn strided_increment_is_tracked_as_a_congruence() {
        let mut dom = DbmCongruenceDomain::top();
        let x = VarId::from_raw(0);
        let y = VarId::from_raw(1);
        dom.assign(x, &LinearExpr::constant(0)).unwrap();
        dom.assign(y, &LinearExpr { constant: 4, terms: alloc::vec![(x, 1)] }).unwrap();
        let c = dom.to_congruence(y);
        assert!(c.contains(4));
        assert!(!c.contains(5));
    }

    #[test]
    fn dbm_bound_survives_the_product() {
        let mut dom = DbmCongruenceDomain::top();
        let x = VarId::from_raw(0);
        dom.set(x, Interval::singleton(MachineInt::new(10, 64, Sign::Signed)));
        let iv = dom.to_interval(x);
        assert_eq!(iv.lo_value(), Some(10));
        assert_eq!(iv.hi_value(), Some(10));
    }
}
