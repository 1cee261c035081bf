//! The polymorphic domain (§4.F): a type-erased wrapper over whichever
//! concrete numerical configuration the driver selected (interval, DBM,
//! packed DBM, ...), so the executor and fixpoint engine are written once
//! against [`PolyDomain`] instead of being generic over every concrete
//! domain combination.

use alloc::boxed::Box;

use crate::domain::dbm::DbmDomain;
use crate::domain::dbm_congruence::DbmCongruenceDomain;
use crate::domain::gauge_domain::GaugeDomain;
use crate::domain::interval_domain::IntervalDomain;
use crate::domain::packing::PackingDomain;
use crate::domain::scalar::ScalarComposite;
use crate::domain::{ApplyOp, Constraint, LinearExpr, NumericalDomain};
use crate::error::AnalyzerError;
use crate::lattice::interval::Interval;
use crate::num::Congruence;
use crate::variable::VarId;

/// Which concrete numerical domain a [`PolyDomain`] wraps (§6 "domain:
/// Interval | Dbm | DbmPacked | Gauge | DbmCongruence").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    /// [`IntervalDomain`].
    Interval,
    /// [`DbmDomain`].
    Dbm,
    /// [`DbmDomain`] behind a [`PackingDomain`].
    DbmPacked,
    /// [`GaugeDomain`].
    Gauge,
    /// [`DbmCongruenceDomain`].
    DbmCongruence,
}

impl DomainKind {
    fn name(self) -> &'static str {
        match self {
            DomainKind::Interval => "Interval",
            DomainKind::Dbm => "Dbm",
            DomainKind::DbmPacked => "DbmPacked",
            DomainKind::Gauge => "Gauge",
            DomainKind::DbmCongruence => "DbmCongruence",
        }
    }
}

/// The concrete scalar-composite configuration boxed inside a
/// [`PolyDomain`]. Boxing (rather than an enum without indirection) keeps
/// `PolyDomain` itself a small, `Clone`-cheap handle, matching the
/// teacher's own boxed-trait-object pattern for its polymorphic storage
/// backend.
#[derive(Debug, Clone, PartialEq)]
enum Inner {
    Interval(Box<ScalarComposite<IntervalDomain>>),
    Dbm(Box<ScalarComposite<DbmDomain>>),
    DbmPacked(Box<ScalarComposite<PackingDomain<DbmDomain>>>),
    Gauge(Box<ScalarComposite<GaugeDomain>>),
    DbmCongruence(Box<ScalarComposite<DbmCongruenceDomain>>),
}

/// A value-typed, type-erased scalar composite. All binary operations
/// require both operands to hold the same concrete kind; mismatches are
/// reported as [`AnalyzerError::MismatchedPolymorphicKind`] rather than a
/// panic, since a well-formed analysis run only ever constructs one kind
/// but the type system can't prove it statically across call-graph edges.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyDomain {
    inner: Inner,
}

impl PolyDomain {
    /// `⊤` for the given concrete kind.
    pub fn top(kind: DomainKind) -> Self {
        let inner = match kind {
            DomainKind::Interval => Inner::Interval(Box::new(ScalarComposite::top())),
            DomainKind::Dbm => Inner::Dbm(Box::new(ScalarComposite::top())),
            DomainKind::DbmPacked => Inner::DbmPacked(Box::new(ScalarComposite::top())),
            DomainKind::Gauge => Inner::Gauge(Box::new(ScalarComposite::top())),
            DomainKind::DbmCongruence => Inner::DbmCongruence(Box::new(ScalarComposite::top())),
        };
        Self { inner }
    }

    /// `⊥` for the given concrete kind.
    pub fn bottom(kind: DomainKind) -> Self {
        let inner = match kind {
            DomainKind::Interval => Inner::Interval(Box::new(ScalarComposite::bottom())),
            DomainKind::Dbm => Inner::Dbm(Box::new(ScalarComposite::bottom())),
            DomainKind::DbmPacked => Inner::DbmPacked(Box::new(ScalarComposite::bottom())),
            DomainKind::Gauge => Inner::Gauge(Box::new(ScalarComposite::bottom())),
            DomainKind::DbmCongruence => Inner::DbmCongruence(Box::new(ScalarComposite::bottom())),
        };
        Self { inner }
    }

    /// The concrete kind this value currently holds.
    pub fn kind(&self) -> DomainKind {
        match &self.inner {
            Inner::Interval(_) => DomainKind::Interval,
            Inner::Dbm(_) => DomainKind::Dbm,
            Inner::DbmPacked(_) => DomainKind::DbmPacked,
            Inner::Gauge(_) => DomainKind::Gauge,
            Inner::DbmCongruence(_) => DomainKind::DbmCongruence,
        }
    }

    fn mismatch(&self, other: &Self) -> AnalyzerError {
        AnalyzerError::MismatchedPolymorphicKind {
            lhs: self.kind().name().into(),
            rhs: other.kind().name().into(),
        }
    }

    /// Whether the state is unreachable.
    pub fn is_bottom(&self) -> bool {
        match &self.inner {
            Inner::Interval(s) => s.is_bottom(),
            Inner::Dbm(s) => s.is_bottom(),
            Inner::DbmPacked(s) => s.is_bottom(),
            Inner::Gauge(s) => s.is_bottom(),
            Inner::DbmCongruence(s) => s.is_bottom(),
        }
    }

    /// Least upper bound; `Err` if `self` and `other` hold different
    /// concrete kinds.
    pub fn join(&self, other: &Self) -> Result<Self, AnalyzerError> {
        let inner = match (&self.inner, &other.inner) {
            (Inner::Interval(a), Inner::Interval(b)) => Inner::Interval(Box::new(a.join(b))),
            (Inner::Dbm(a), Inner::Dbm(b)) => Inner::Dbm(Box::new(a.join(b))),
            (Inner::DbmPacked(a), Inner::DbmPacked(b)) => Inner::DbmPacked(Box::new(a.join(b))),
            (Inner::Gauge(a), Inner::Gauge(b)) => Inner::Gauge(Box::new(a.join(b))),
            (Inner::DbmCongruence(a), Inner::DbmCongruence(b)) => Inner::DbmCongruence(Box::new(a.join(b))),
            _ => return Err(self.mismatch(other)),
        };
        Ok(Self { inner })
    }

    /// Greatest lower bound; `Err` on kind mismatch.
    pub fn meet(&self, other: &Self) -> Result<Self, AnalyzerError> {
        let inner = match (&self.inner, &other.inner) {
            (Inner::Interval(a), Inner::Interval(b)) => Inner::Interval(Box::new(a.meet(b))),
            (Inner::Dbm(a), Inner::Dbm(b)) => Inner::Dbm(Box::new(a.meet(b))),
            (Inner::DbmPacked(a), Inner::DbmPacked(b)) => Inner::DbmPacked(Box::new(a.meet(b))),
            (Inner::Gauge(a), Inner::Gauge(b)) => Inner::Gauge(Box::new(a.meet(b))),
            (Inner::DbmCongruence(a), Inner::DbmCongruence(b)) => Inner::DbmCongruence(Box::new(a.meet(b))),
            _ => return Err(self.mismatch(other)),
        };
        Ok(Self { inner })
    }

    /// `self ⊑ other`; `Err` on kind mismatch.
    pub fn leq(&self, other: &Self) -> Result<bool, AnalyzerError> {
        match (&self.inner, &other.inner) {
            (Inner::Interval(a), Inner::Interval(b)) => Ok(a.leq(b)),
            (Inner::Dbm(a), Inner::Dbm(b)) => Ok(a.leq(b)),
            (Inner::DbmPacked(a), Inner::DbmPacked(b)) => Ok(a.leq(b)),
            (Inner::Gauge(a), Inner::Gauge(b)) => Ok(a.leq(b)),
            (Inner::DbmCongruence(a), Inner::DbmCongruence(b)) => Ok(a.leq(b)),
            _ => Err(self.mismatch(other)),
        }
    }

    /// Widening; `Err` on kind mismatch.
    pub fn widen(&self, other: &Self) -> Result<Self, AnalyzerError> {
        let inner = match (&self.inner, &other.inner) {
            (Inner::Interval(a), Inner::Interval(b)) => Inner::Interval(Box::new(a.widen(b))),
            (Inner::Dbm(a), Inner::Dbm(b)) => Inner::Dbm(Box::new(a.widen(b))),
            (Inner::DbmPacked(a), Inner::DbmPacked(b)) => Inner::DbmPacked(Box::new(a.widen(b))),
            (Inner::Gauge(a), Inner::Gauge(b)) => Inner::Gauge(Box::new(a.widen(b))),
            (Inner::DbmCongruence(a), Inner::DbmCongruence(b)) => Inner::DbmCongruence(Box::new(a.widen(b))),
            _ => return Err(self.mismatch(other)),
        };
        Ok(Self { inner })
    }

    /// Widening to a threshold set; `Err` on kind mismatch. Domains without
    /// a native threshold notion (see [`NumericalDomain::widen_to_threshold`])
    /// fall back to plain widening internally.
    pub fn widen_to_threshold(&self, other: &Self, thresholds: &[i128]) -> Result<Self, AnalyzerError> {
        let inner = match (&self.inner, &other.inner) {
            (Inner::Interval(a), Inner::Interval(b)) => Inner::Interval(Box::new(a.widen_to_threshold(b, thresholds))),
            (Inner::Dbm(a), Inner::Dbm(b)) => Inner::Dbm(Box::new(a.widen_to_threshold(b, thresholds))),
            (Inner::DbmPacked(a), Inner::DbmPacked(b)) => Inner::DbmPacked(Box::new(a.widen_to_threshold(b, thresholds))),
            (Inner::Gauge(a), Inner::Gauge(b)) => Inner::Gauge(Box::new(a.widen_to_threshold(b, thresholds))),
            (Inner::DbmCongruence(a), Inner::DbmCongruence(b)) => {
                Inner::DbmCongruence(Box::new(a.widen_to_threshold(b, thresholds)))
            }
            _ => return Err(self.mismatch(other)),
        };
        Ok(Self { inner })
    }

    /// Narrowing; `Err` on kind mismatch.
    pub fn narrow(&self, other: &Self) -> Result<Self, AnalyzerError> {
        let inner = match (&self.inner, &other.inner) {
            (Inner::Interval(a), Inner::Interval(b)) => Inner::Interval(Box::new(a.narrow(b))),
            (Inner::Dbm(a), Inner::Dbm(b)) => Inner::Dbm(Box::new(a.narrow(b))),
            (Inner::DbmPacked(a), Inner::DbmPacked(b)) => Inner::DbmPacked(Box::new(a.narrow(b))),
            (Inner::Gauge(a), Inner::Gauge(b)) => Inner::Gauge(Box::new(a.narrow(b))),
            (Inner::DbmCongruence(a), Inner::DbmCongruence(b)) => Inner::DbmCongruence(Box::new(a.narrow(b))),
            _ => return Err(self.mismatch(other)),
        };
        Ok(Self { inner })
    }

    /// `z := x op y` over the numerical component.
    pub fn apply(&mut self, op: ApplyOp, z: VarId, x: VarId, y: VarId) -> Result<(), AnalyzerError> {
        match &mut self.inner {
            Inner::Interval(s) => s.apply(op, z, x, y),
            Inner::Dbm(s) => s.apply(op, z, x, y),
            Inner::DbmPacked(s) => s.apply(op, z, x, y),
            Inner::Gauge(s) => s.apply(op, z, x, y),
            Inner::DbmCongruence(s) => s.apply(op, z, x, y),
        }
    }

    /// `x := e`.
    pub fn assign(&mut self, x: VarId, e: &LinearExpr) -> Result<(), AnalyzerError> {
        match &mut self.inner {
            Inner::Interval(s) => s.numerical_mut().assign(x, e),
            Inner::Dbm(s) => s.numerical_mut().assign(x, e),
            Inner::DbmPacked(s) => s.numerical_mut().assign(x, e),
            Inner::Gauge(s) => s.numerical_mut().assign(x, e),
            Inner::DbmCongruence(s) => s.numerical_mut().assign(x, e),
        }
    }

    /// Intersect with a linear constraint.
    pub fn add_constraint(&mut self, c: &Constraint) -> Result<(), AnalyzerError> {
        match &mut self.inner {
            Inner::Interval(s) => s.numerical_mut().add_constraint(c),
            Inner::Dbm(s) => s.numerical_mut().add_constraint(c),
            Inner::DbmPacked(s) => s.numerical_mut().add_constraint(c),
            Inner::Gauge(s) => s.numerical_mut().add_constraint(c),
            Inner::DbmCongruence(s) => s.numerical_mut().add_constraint(c),
        }
    }

    /// Forget `x` entirely.
    pub fn forget(&mut self, x: VarId) {
        match &mut self.inner {
            Inner::Interval(s) => s.forget(x),
            Inner::Dbm(s) => s.forget(x),
            Inner::DbmPacked(s) => s.forget(x),
            Inner::Gauge(s) => s.forget(x),
            Inner::DbmCongruence(s) => s.forget(x),
        }
    }

    /// Project `x` to an interval.
    pub fn to_interval(&self, x: VarId) -> Interval {
        match &self.inner {
            Inner::Interval(s) => s.numerical().to_interval(x),
            Inner::Dbm(s) => s.numerical().to_interval(x),
            Inner::DbmPacked(s) => s.numerical().to_interval(x),
            Inner::Gauge(s) => s.numerical().to_interval(x),
            Inner::DbmCongruence(s) => s.numerical().to_interval(x),
        }
    }

    /// Project `x` to a congruence.
    pub fn to_congruence(&self, x: VarId) -> Congruence {
        match &self.inner {
            Inner::Interval(s) => s.numerical().to_congruence(x),
            Inner::Dbm(s) => s.numerical().to_congruence(x),
            Inner::DbmPacked(s) => s.numerical().to_congruence(x),
            Inner::Gauge(s) => s.numerical().to_congruence(x),
            Inner::DbmCongruence(s) => s.numerical().to_congruence(x),
        }
    }

    /// Promote `x` to a loop counter in the wrapped domain, when it has a
    /// gauge component; a no-op otherwise.
    pub fn mark_counter(&mut self, x: VarId) {
        match &mut self.inner {
            Inner::Interval(s) => s.numerical_mut().mark_counter(x),
            Inner::Dbm(s) => s.numerical_mut().mark_counter(x),
            Inner::DbmPacked(s) => s.numerical_mut().mark_counter(x),
            Inner::Gauge(s) => s.numerical_mut().mark_counter(x),
            Inner::DbmCongruence(s) => s.numerical_mut().mark_counter(x),
        }
    }

    /// Record `x`'s bound at the current loop section, feeding gauge
    /// widening; a no-op for domains without a gauge component.
    pub fn mark_loop_iteration(&mut self, x: VarId, value: i128) {
        match &mut self.inner {
            Inner::Interval(s) => s.numerical_mut().mark_loop_iteration(x, value),
            Inner::Dbm(s) => s.numerical_mut().mark_loop_iteration(x, value),
            Inner::DbmPacked(s) => s.numerical_mut().mark_loop_iteration(x, value),
            Inner::Gauge(s) => s.numerical_mut().mark_loop_iteration(x, value),
            Inner::DbmCongruence(s) => s.numerical_mut().mark_loop_iteration(x, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_kinds_error_on_join() {
        let a = PolyDomain::top(DomainKind::Interval);
        let b = PolyDomain::top(DomainKind::Dbm);
        assert!(a.join(&b).is_err());
    }

    #[test]
    fn same_kind_joins_successfully() {
        let a = PolyDomain::top(DomainKind::Interval);
        let b = PolyDomain::bottom(DomainKind::Interval);
        assert!(a.join(&b).is_ok());
    }

    #[test]
    fn assign_and_project_round_trip() {
        let mut a = PolyDomain::top(DomainKind::Interval);
        let x = VarId::from_raw(0);
        a.assign(x, &LinearExpr::constant(3)).unwrap();
        assert_eq!(a.to_interval(x).as_singleton().unwrap().value(), 3);
    }
}
