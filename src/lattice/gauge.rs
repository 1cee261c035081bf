//! Gauges: bounds of the form `c + Σ kᵢ·xᵢ` over nonnegative loop
//! counters, used by the gauge numerical domain (§4.B, §4.C) to express
//! per-iteration growth (e.g. "the loop counter `i` at the loop head is
//! bounded above by `n`") more precisely than a plain interval can.

use alloc::collections::BTreeMap;
use alloc::fmt;
use core::cmp::Ordering;

use crate::variable::VarId;

/// `c + Σ kᵢ·xᵢ`, or one of the two infinities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GaugeBound {
    /// `-∞`.
    NegInf,
    /// `+∞`.
    PosInf,
    /// A linear expression over nonnegative loop counters.
    Linear {
        /// The constant term `c`.
        constant: i128,
        /// Coefficients `kᵢ`, keyed by counter variable; zero
        /// coefficients are not stored.
        coeffs: BTreeMap<VarId, i128>,
    },
}

impl fmt::Display for GaugeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GaugeBound::NegInf => write!(f, "-oo"),
            GaugeBound::PosInf => write!(f, "+oo"),
            GaugeBound::Linear { constant, coeffs } => {
                write!(f, "{constant}")?;
                for (x, k) in coeffs {
                    write!(f, " + {k}*x{}", x.raw())?;
                }
                Ok(())
            }
        }
    }
}

impl GaugeBound {
    /// The constant gauge bound `c`.
    pub fn constant(c: i128) -> Self {
        GaugeBound::Linear {
            constant: c,
            coeffs: BTreeMap::new(),
        }
    }

    /// `c + k*x`.
    pub fn linear(constant: i128, counter: VarId, coeff: i128) -> Self {
        let mut coeffs = BTreeMap::new();
        if coeff != 0 {
            coeffs.insert(counter, coeff);
        }
        GaugeBound::Linear { constant, coeffs }
    }

    /// Sum of the constant and all coefficients; the heuristic score used
    /// to compare syntactically-incomparable bounds (§4.B "meet uses a
    /// syntactic heuristic ... pick the end with larger/smaller
    /// constant+Σcoeffs").
    fn heuristic_score(&self) -> Option<i128> {
        match self {
            GaugeBound::Linear { constant, coeffs } => {
                Some(*constant + coeffs.values().sum::<i128>())
            }
            _ => None,
        }
    }

    /// Partial order: `self ⊑ other` iff `other - self` is a
    /// nonnegative-everywhere linear expression (here: same coefficient
    /// map, and `self.constant <= other.constant`, or either side is an
    /// infinity consistent with the direction).
    pub fn leq(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (GaugeBound::NegInf, _) => Some(true),
            (_, GaugeBound::PosInf) => Some(true),
            (GaugeBound::PosInf, GaugeBound::PosInf) => Some(true),
            (GaugeBound::PosInf, _) => Some(false),
            (_, GaugeBound::NegInf) => Some(false),
            (GaugeBound::Linear { constant: c1, coeffs: k1 }, GaugeBound::Linear { constant: c2, coeffs: k2 }) => {
                if k1 == k2 {
                    Some(c1 <= c2)
                } else {
                    None
                }
            }
        }
    }

    /// Pointwise `+`.
    pub fn add(&self, other: &Self) -> Self {
        match (self, other) {
            (GaugeBound::NegInf, GaugeBound::PosInf) | (GaugeBound::PosInf, GaugeBound::NegInf) => {
                GaugeBound::PosInf // indeterminate; callers never rely on this
            }
            (GaugeBound::NegInf, _) | (_, GaugeBound::NegInf) => GaugeBound::NegInf,
            (GaugeBound::PosInf, _) | (_, GaugeBound::PosInf) => GaugeBound::PosInf,
            (GaugeBound::Linear { constant: c1, coeffs: k1 }, GaugeBound::Linear { constant: c2, coeffs: k2 }) => {
                let mut coeffs = k1.clone();
                for (x, k) in k2 {
                    *coeffs.entry(*x).or_insert(0) += k;
                }
                coeffs.retain(|_, k| *k != 0);
                GaugeBound::Linear {
                    constant: c1 + c2,
                    coeffs,
                }
            }
        }
    }

    /// Negation.
    pub fn neg(&self) -> Self {
        match self {
            GaugeBound::NegInf => GaugeBound::PosInf,
            GaugeBound::PosInf => GaugeBound::NegInf,
            GaugeBound::Linear { constant, coeffs } => GaugeBound::Linear {
                constant: -constant,
                coeffs: coeffs.iter().map(|(x, k)| (*x, -k)).collect(),
            },
        }
    }

    /// Pointwise `-`.
    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    /// Scalar multiplication. A negative scalar flips the bound's role
    /// (callers combining a lower/upper-bound pair are expected to swap
    /// accordingly).
    pub fn mul_scalar(&self, scalar: i128) -> Self {
        match self {
            GaugeBound::NegInf => {
                if scalar >= 0 {
                    GaugeBound::NegInf
                } else {
                    GaugeBound::PosInf
                }
            }
            GaugeBound::PosInf => {
                if scalar >= 0 {
                    GaugeBound::PosInf
                } else {
                    GaugeBound::NegInf
                }
            }
            GaugeBound::Linear { constant, coeffs } => GaugeBound::Linear {
                constant: constant * scalar,
                coeffs: coeffs.iter().map(|(x, k)| (*x, k * scalar)).collect(),
            },
        }
    }

    /// `min`, used when combining two lower-bound gauges (either by
    /// partial order, or — when incomparable — by the syntactic
    /// heuristic).
    pub fn min(&self, other: &Self) -> Self {
        match self.leq(other) {
            Some(true) => self.clone(),
            Some(false) => other.clone(),
            None => {
                match (self.heuristic_score(), other.heuristic_score()) {
                    (Some(a), Some(b)) if a <= b => self.clone(),
                    (Some(_), Some(_)) => other.clone(),
                    _ => GaugeBound::NegInf,
                }
            }
        }
    }

    /// `max`, dual of [`Self::min`].
    pub fn max(&self, other: &Self) -> Self {
        match self.leq(other) {
            Some(true) => other.clone(),
            Some(false) => self.clone(),
            None => {
                match (self.heuristic_score(), other.heuristic_score()) {
                    (Some(a), Some(b)) if a >= b => self.clone(),
                    (Some(_), Some(_)) => other.clone(),
                    _ => GaugeBound::PosInf,
                }
            }
        }
    }

    /// Evaluate at a concrete counter assignment (used by widening at a
    /// section value).
    fn eval(&self, section_var: VarId, section_value: i128) -> Option<i128> {
        match self {
            GaugeBound::Linear { constant, coeffs } => {
                let mut total = *constant;
                for (x, k) in coeffs {
                    if *x == section_var {
                        total += k * section_value;
                    } else {
                        // Only single-counter gauges are evaluated by this
                        // simplified widening; a nonzero coefficient on a
                        // different counter makes the bound non-constant
                        // at this section, so bail out.
                        return None;
                    }
                }
                Some(total)
            }
            _ => None,
        }
    }

    /// Widening by linear interpolation (§4.C "widen by linear
    /// interpolation at a section value"): given the value `g(u)` of
    /// `self` and `g'(v)` of `other`, both evaluated at two section values
    /// of the loop counter `k`, compute the slope `(g'(v) - g(u)) / (v -
    /// u)` rounded outward and build a new linear bound in `k` with that
    /// slope. Falls back to copying `other`'s coefficient on `k` when `v`
    /// is not itself a constant (the counter hasn't been bounded yet).
    pub fn widen_linear_interpolation(
        &self,
        other: &Self,
        section_var: VarId,
        u: i128,
        v: Option<i128>,
    ) -> Self {
        let v = match v {
            Some(v) => v,
            None => return other.clone(),
        };
        if v == u {
            return other.clone();
        }
        match (self.eval(section_var, u), other.eval(section_var, v)) {
            (Some(gu), Some(gv)) => {
                let num = gv - gu;
                let den = v - u;
                // Round outward: away from zero when away-ness matters for
                // soundness of the resulting upper/lower bound; here we
                // just use Euclidean rounding with a ceiling/floor split
                // on sign, matching the widen direction callers expect.
                let slope = if num.signum() == den.signum() || num == 0 {
                    num.div_euclid(den) + i128::from(num.rem_euclid(den) != 0)
                } else {
                    num / den
                };
                let constant = gu - slope * u;
                GaugeBound::linear(constant, section_var, slope)
            }
            _ => other.clone(),
        }
    }

    /// Widening by interval extrapolation: if the bound moved compared to
    /// `self`, extrapolate to the matching infinity, exactly like plain
    /// interval widening (§4.C).
    pub fn widen_interval_extrapolation(&self, other: &Self, grows_up: bool) -> Self {
        match self.leq(other) {
            Some(true) if grows_up => {
                if *self == *other {
                    self.clone()
                } else {
                    GaugeBound::PosInf
                }
            }
            Some(false) if !grows_up => {
                if *self == *other {
                    self.clone()
                } else {
                    GaugeBound::NegInf
                }
            }
            _ => other.clone(),
        }
    }
}

/// A gauge: the pair of gauge bounds approximating a variable's lower and
/// upper bound over a loop's iteration space (§4.B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gauge {
    lower: GaugeBound,
    upper: GaugeBound,
}

impl fmt::Display for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

impl Gauge {
    /// Build from explicit lower/upper gauge bounds.
    pub fn new(lower: GaugeBound, upper: GaugeBound) -> Self {
        Self { lower, upper }
    }

    /// `[c, c]`.
    pub fn constant(c: i128) -> Self {
        Self {
            lower: GaugeBound::constant(c),
            upper: GaugeBound::constant(c),
        }
    }

    /// `⊤`: `[-∞, +∞]`.
    pub fn top() -> Self {
        Self {
            lower: GaugeBound::NegInf,
            upper: GaugeBound::PosInf,
        }
    }

    /// The lower gauge bound.
    pub const fn lower(&self) -> &GaugeBound {
        &self.lower
    }

    /// The upper gauge bound.
    pub const fn upper(&self) -> &GaugeBound {
        &self.upper
    }

    /// Join: widen the range outward, taking the min of lowers and max of
    /// uppers.
    pub fn join(&self, other: &Self) -> Self {
        Self {
            lower: self.lower.min(&other.lower),
            upper: self.upper.max(&other.upper),
        }
    }

    /// Meet: narrow the range, taking the max of lowers and min of
    /// uppers. Uses the syntactic heuristic of [`GaugeBound::min`] /
    /// [`GaugeBound::max`] when bounds are incomparable, per §4.B.
    pub fn meet(&self, other: &Self) -> Self {
        Self {
            lower: self.lower.max(&other.lower),
            upper: self.upper.min(&other.upper),
        }
    }

    /// `self ⊑ other`: `other.lower <= self.lower` and `self.upper <=
    /// other.upper`, treating an incomparable bound pair as `false` (a
    /// conservative answer the fixpoint iterator's stabilization check can
    /// always fall back to).
    pub fn leq(&self, other: &Self) -> bool {
        matches!(other.lower.leq(&self.lower), Some(true))
            && matches!(self.upper.leq(&other.upper), Some(true))
    }

    /// Widen, parameterized by the section variable and the two section
    /// values the loop counter took (§4.C): lower bound widens downward,
    /// upper bound widens upward.
    pub fn widen(&self, other: &Self, section_var: VarId, u: i128, v: Option<i128>) -> Self {
        Self {
            lower: self.lower.widen_linear_interpolation(&other.lower, section_var, u, v),
            upper: self.upper.widen_linear_interpolation(&other.upper, section_var, u, v),
        }
    }
}
