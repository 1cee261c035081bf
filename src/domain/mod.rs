//! Numerical domains (§4.C): interval, DBM, gauge, and the variable
//! packing wrapper, all implementing the same [`NumericalDomain`]
//! contract so the scalar composite (§4.D) and the polymorphic wrapper
//! (§4.F) can be generic over "whichever concrete domain configuration
//! was selected".

pub mod dbm;
pub mod dbm_congruence;
pub mod gauge_domain;
pub mod interval_domain;
pub mod memory;
pub mod packing;
pub mod poly;
pub mod scalar;

use crate::error::AnalyzerError;
use crate::lattice::interval::Interval;
use crate::lattice::interval_congruence::IntervalCongruence;
use crate::num::Congruence;
use crate::variable::VarId;

/// A linear arithmetic expression `c + Σ kᵢ·xᵢ` over abstract variables,
/// the common currency `assign`/`add` operate on (§4.C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearExpr {
    /// Constant term.
    pub constant: i128,
    /// `(variable, coefficient)` pairs; zero coefficients are omitted.
    pub terms: alloc::vec::Vec<(VarId, i128)>,
}

impl LinearExpr {
    /// The constant expression `c`.
    pub fn constant(c: i128) -> Self {
        Self {
            constant: c,
            terms: alloc::vec::Vec::new(),
        }
    }

    /// The single-variable expression `x`.
    pub fn var(x: VarId) -> Self {
        Self {
            constant: 0,
            terms: alloc::vec![(x, 1)],
        }
    }
}

/// A linear constraint `expr ⋈ 0` for `⋈ ∈ {=, ≤, <}`, the form `add`
/// takes (§4.C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `expr == 0`.
    Equal(LinearExpr),
    /// `expr <= 0`.
    LessEqual(LinearExpr),
    /// `expr < 0`.
    LessThan(LinearExpr),
}

/// Arithmetic/comparison operator `apply` dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOp {
    /// `z = x + y`.
    Add,
    /// `z = x - y`.
    Sub,
    /// `z = x * y`.
    Mul,
    /// `z = x / y` (no-wrap semantics; `⊥` on overflow/div-by-zero).
    Div,
    /// `z = x % y`.
    Rem,
}

/// The common contract every numerical domain implements (§4.C): assign,
/// apply, add constraint, set/refine, forget, and projections back to
/// the simpler lattice values.
pub trait NumericalDomain: Sized + Clone {
    /// `⊥`.
    fn bottom() -> Self;
    /// `⊤`.
    fn top() -> Self;
    /// Whether this value is `⊥`.
    fn is_bottom(&self) -> bool;
    /// Least upper bound.
    #[must_use]
    fn join(&self, other: &Self) -> Self;
    /// Greatest lower bound.
    #[must_use]
    fn meet(&self, other: &Self) -> Self;
    /// `self ⊑ other`.
    fn leq(&self, other: &Self) -> bool;
    /// Widening.
    #[must_use]
    fn widen(&self, other: &Self) -> Self;
    /// Widening to a threshold set, when the domain supports one; domains
    /// without a natural notion of threshold fall back to [`Self::widen`].
    #[must_use]
    fn widen_to_threshold(&self, other: &Self, thresholds: &[i128]) -> Self {
        let _ = thresholds;
        self.widen(other)
    }
    /// Narrowing.
    #[must_use]
    fn narrow(&self, other: &Self) -> Self;

    /// `x := e`.
    fn assign(&mut self, x: VarId, e: &LinearExpr) -> Result<(), AnalyzerError>;
    /// `z := x op y`.
    fn apply(&mut self, op: ApplyOp, z: VarId, x: VarId, y: VarId) -> Result<(), AnalyzerError>;
    /// Intersect the domain with a linear constraint.
    fn add_constraint(&mut self, c: &Constraint) -> Result<(), AnalyzerError>;
    /// Replace `x`'s abstract value outright.
    fn set(&mut self, x: VarId, value: Interval);
    /// Intersect `x`'s abstract value with `value` (a narrowing
    /// refinement, e.g. from an assertion).
    fn refine(&mut self, x: VarId, value: Interval);
    /// Remove `x` from the domain entirely (forget all relational
    /// information involving it).
    fn forget(&mut self, x: VarId);
    /// Project `x` to an interval.
    fn to_interval(&self, x: VarId) -> Interval;
    /// Project `x` to a congruence.
    fn to_congruence(&self, x: VarId) -> Congruence;
    /// Project `x` to the reduced interval∧congruence product.
    fn to_interval_congruence(&self, x: VarId) -> IntervalCongruence {
        IntervalCongruence::new(self.to_interval(x), self.to_congruence(x))
    }

    /// Promote `x` to a nonnegative loop counter. Domains without a gauge
    /// component ignore this; the gauge domain uses it to start tracking
    /// a per-section linear bound on `x`.
    fn mark_counter(&mut self, x: VarId) {
        let _ = x;
    }
    /// Record that `x`'s bound at the current loop section is `value`,
    /// feeding the gauge domain's section-interpolation widening. A no-op
    /// for domains without a gauge component.
    fn mark_loop_iteration(&mut self, x: VarId, value: i128) {
        let (_, _) = (x, value);
    }
}
