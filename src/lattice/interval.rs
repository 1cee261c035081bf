//! Signed/unsigned intervals `[lo, hi]` with `±∞` bounds (§4.B, §4.C).

use alloc::fmt;
use core::cmp::Ordering;

use crate::lattice::Lattice;
use crate::num::{MachineInt, Sign};

/// One end of an [`Interval`]: a finite machine integer, or an unbounded
/// extension in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// `-∞`.
    NegInf,
    /// A finite value.
    Finite(MachineInt),
    /// `+∞`.
    PosInf,
}

impl Bound {
    fn order_key(&self) -> (i8, i128) {
        match self {
            Bound::NegInf => (-1, 0),
            Bound::Finite(m) => (0, m.value()),
            Bound::PosInf => (1, 0),
        }
    }

    fn is_finite(&self) -> bool {
        matches!(self, Bound::Finite(_))
    }
}

impl PartialOrd for Bound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.order_key().cmp(&other.order_key()))
    }
}

impl Ord for Bound {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}
impl Eq for Bound {}

/// A sign-aware interval `[lo, hi]` over machine integers of a fixed
/// `bit_width`/`sign`. The empty interval (`⊥`) is represented by `lo >
/// hi`; callers should prefer [`Interval::is_bottom`] over comparing
/// bounds directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    bit_width: u32,
    sign: Sign,
    lo: Bound,
    hi: Bound,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            return write!(f, "⊥");
        }
        fn show(b: &Bound) -> alloc::string::String {
            match b {
                Bound::NegInf => "-oo".into(),
                Bound::PosInf => "+oo".into(),
                Bound::Finite(m) => alloc::format!("{}", m.value()),
            }
        }
        write!(f, "[{}, {}]", show(&self.lo), show(&self.hi))
    }
}

impl Interval {
    /// The singleton interval `[v, v]`.
    pub fn singleton(v: MachineInt) -> Self {
        Self {
            bit_width: v.bit_width(),
            sign: v.sign(),
            lo: Bound::Finite(v),
            hi: Bound::Finite(v),
        }
    }

    /// `[lo, hi]`, or `⊥` if `lo > hi`.
    pub fn new(lo: Bound, hi: Bound, bit_width: u32, sign: Sign) -> Self {
        Self { bit_width, sign, lo, hi }
    }

    /// `⊥` for the given width/sign (distinct instances compare equal via
    /// [`Lattice::is_bottom`], not `==`, since the exact empty range they
    /// encode isn't canonicalized).
    pub fn bottom_of(bit_width: u32, sign: Sign) -> Self {
        Self {
            bit_width,
            sign,
            lo: Bound::PosInf,
            hi: Bound::NegInf,
        }
    }

    /// `⊤` (`[-∞, +∞]`) for the given width/sign.
    pub fn top_of(bit_width: u32, sign: Sign) -> Self {
        Self {
            bit_width,
            sign,
            lo: Bound::NegInf,
            hi: Bound::PosInf,
        }
    }

    /// The bit width this interval's finite bounds are expressed in.
    pub const fn bit_width(&self) -> u32 {
        self.bit_width
    }

    /// The sign convention this interval's finite bounds are expressed
    /// under.
    pub const fn sign(&self) -> Sign {
        self.sign
    }

    /// The lower bound.
    pub const fn lo(&self) -> &Bound {
        &self.lo
    }

    /// The upper bound.
    pub const fn hi(&self) -> &Bound {
        &self.hi
    }

    /// Whether this interval is exactly `[v, v]` for some finite `v`.
    pub fn as_singleton(&self) -> Option<MachineInt> {
        match (&self.lo, &self.hi) {
            (Bound::Finite(a), Bound::Finite(b)) if a == b => Some(*a),
            _ => None,
        }
    }

    /// The finite lower bound's value, if not `-∞`.
    pub fn lo_value(&self) -> Option<i128> {
        match self.lo {
            Bound::Finite(m) => Some(m.value()),
            _ => None,
        }
    }

    /// The finite upper bound's value, if not `+∞`.
    pub fn hi_value(&self) -> Option<i128> {
        match self.hi {
            Bound::Finite(m) => Some(m.value()),
            _ => None,
        }
    }

    fn is_bottom_impl(&self) -> bool {
        self.lo > self.hi
    }

    fn is_top_impl(&self) -> bool {
        self.lo == Bound::NegInf && self.hi == Bound::PosInf
    }

    fn bound_add(a: &Bound, b: &Bound) -> Bound {
        match (a, b) {
            (Bound::NegInf, Bound::PosInf) | (Bound::PosInf, Bound::NegInf) => {
                // Indeterminate; callers never form this for our use (we
                // only add a finite interval's bound to another bound of
                // the same polarity or a finite one).
                Bound::PosInf
            }
            (Bound::NegInf, _) | (_, Bound::NegInf) => Bound::NegInf,
            (Bound::PosInf, _) | (_, Bound::PosInf) => Bound::PosInf,
            (Bound::Finite(x), Bound::Finite(y)) => {
                Bound::Finite(MachineInt::new(x.value() + y.value(), x.bit_width(), x.sign()))
            }
        }
    }

    fn bound_neg(a: &Bound) -> Bound {
        match a {
            Bound::NegInf => Bound::PosInf,
            Bound::PosInf => Bound::NegInf,
            Bound::Finite(x) => Bound::Finite(MachineInt::new(-x.value(), x.bit_width(), x.sign())),
        }
    }

    /// `self + other` (no overflow saturation beyond `±∞`; the interval
    /// domain already abstracts away wrap-around by widening to `⊤` when
    /// operands span the full range — see [`crate::domain::interval_domain`]).
    pub fn add(&self, other: &Self) -> Self {
        if self.is_bottom_impl() || other.is_bottom_impl() {
            return Self::bottom_of(self.bit_width, self.sign);
        }
        Self {
            bit_width: self.bit_width,
            sign: self.sign,
            lo: Self::bound_add(&self.lo, &other.lo),
            hi: Self::bound_add(&self.hi, &other.hi),
        }
    }

    /// `self - other`.
    pub fn sub(&self, other: &Self) -> Self {
        let neg_other = Self {
            bit_width: other.bit_width,
            sign: other.sign,
            lo: Self::bound_neg(&other.hi),
            hi: Self::bound_neg(&other.lo),
        };
        self.add(&neg_other)
    }

    /// `self * other`, computed from the four corner products.
    pub fn mul(&self, other: &Self) -> Self {
        if self.is_bottom_impl() || other.is_bottom_impl() {
            return Self::bottom_of(self.bit_width, self.sign);
        }
        let corners = [
            Self::bound_mul(&self.lo, &other.lo),
            Self::bound_mul(&self.lo, &other.hi),
            Self::bound_mul(&self.hi, &other.lo),
            Self::bound_mul(&self.hi, &other.hi),
        ];
        let lo = corners.iter().cloned().min().unwrap();
        let hi = corners.into_iter().max().unwrap();
        Self {
            bit_width: self.bit_width,
            sign: self.sign,
            lo,
            hi,
        }
    }

    fn bound_mul(a: &Bound, b: &Bound) -> Bound {
        match (a, b) {
            (Bound::Finite(x), Bound::Finite(y)) => {
                Bound::Finite(MachineInt::new(x.value() * y.value(), x.bit_width(), x.sign()))
            }
            (Bound::Finite(x), inf) | (inf, Bound::Finite(x)) => {
                match x.value().cmp(&0) {
                    Ordering::Equal => Bound::Finite(*x),
                    Ordering::Greater => *inf,
                    Ordering::Less => Self::bound_neg(inf),
                }
            }
            (Bound::NegInf, Bound::PosInf) | (Bound::PosInf, Bound::NegInf) => Bound::NegInf,
            (Bound::NegInf, Bound::NegInf) | (Bound::PosInf, Bound::PosInf) => Bound::PosInf,
        }
    }

    /// Standard interval widening: a bound that moved between `self` and
    /// `other` extrapolates to `±∞`; a stable bound is kept.
    pub fn widen(&self, other: &Self) -> Self {
        if self.is_bottom_impl() {
            return other.clone();
        }
        if other.is_bottom_impl() {
            return self.clone();
        }
        let lo = if other.lo < self.lo { Bound::NegInf } else { self.lo };
        let hi = if other.hi > self.hi { Bound::PosInf } else { self.hi };
        Self {
            bit_width: self.bit_width,
            sign: self.sign,
            lo,
            hi,
        }
    }

    /// Widening to a fixed set of thresholds: a bound that moved
    /// saturates to the nearest threshold beyond the new value rather
    /// than jumping straight to `±∞`; only once no threshold bounds it
    /// does it fall back to infinity.
    pub fn widen_to_threshold(&self, other: &Self, thresholds: &[i128]) -> Self {
        if self.is_bottom_impl() {
            return other.clone();
        }
        if other.is_bottom_impl() {
            return self.clone();
        }
        let lo = if other.lo < self.lo {
            match other.lo {
                Bound::Finite(m) => thresholds
                    .iter()
                    .filter(|&&t| t <= m.value())
                    .max()
                    .map(|&t| Bound::Finite(MachineInt::new(t, self.bit_width, self.sign)))
                    .unwrap_or(Bound::NegInf),
                _ => Bound::NegInf,
            }
        } else {
            self.lo
        };
        let hi = if other.hi > self.hi {
            match other.hi {
                Bound::Finite(m) => thresholds
                    .iter()
                    .filter(|&&t| t >= m.value())
                    .min()
                    .map(|&t| Bound::Finite(MachineInt::new(t, self.bit_width, self.sign)))
                    .unwrap_or(Bound::PosInf),
                _ => Bound::PosInf,
            }
        } else {
            self.hi
        };
        Self {
            bit_width: self.bit_width,
            sign: self.sign,
            lo,
            hi,
        }
    }
}

impl Lattice for Interval {
    fn bottom() -> Self {
        Self::bottom_of(64, Sign::Signed)
    }

    fn top() -> Self {
        Self::top_of(64, Sign::Signed)
    }

    fn is_bottom(&self) -> bool {
        self.is_bottom_impl()
    }

    fn is_top(&self) -> bool {
        self.is_top_impl()
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom_impl() {
            return other.clone();
        }
        if other.is_bottom_impl() {
            return self.clone();
        }
        Self {
            bit_width: self.bit_width,
            sign: self.sign,
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }

    fn meet(&self, other: &Self) -> Self {
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        Self {
            bit_width: self.bit_width,
            sign: self.sign,
            lo,
            hi,
        }
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom_impl() {
            return true;
        }
        if other.is_bottom_impl() {
            return false;
        }
        other.lo <= self.lo && self.hi <= other.hi
    }

    fn widen(&self, other: &Self) -> Self {
        Interval::widen(self, other)
    }

    fn narrow(&self, other: &Self) -> Self {
        if self.lo == Bound::NegInf && other.lo.is_finite() {
            let lo = other.lo;
            let hi = if self.hi == Bound::PosInf && other.hi.is_finite() {
                other.hi
            } else {
                self.hi
            };
            return Self {
                bit_width: self.bit_width,
                sign: self.sign,
                lo,
                hi,
            };
        }
        if self.hi == Bound::PosInf && other.hi.is_finite() {
            return Self {
                bit_width: self.bit_width,
                sign: self.sign,
                lo: self.lo,
                hi: other.hi,
            };
        }
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(lo: i128, hi: i128) -> Interval {
        Interval::new(
            Bound::Finite(MachineInt::new(lo, 32, Sign::Signed)),
            Bound::Finite(MachineInt::new(hi, 32, Sign::Signed)),
            32,
            Sign::Signed,
        )
    }

    #[test]
    fn join_is_commutative() {
        let a = iv(0, 5);
        let b = iv(3, 10);
        assert_eq!(a.join(&b), b.join(&a));
    }

    #[test]
    fn bottom_join_identity() {
        let a = iv(0, 5);
        let bot = Interval::bottom_of(32, Sign::Signed);
        assert_eq!(bot.join(&a), a);
    }

    #[test]
    fn widen_is_inflationary() {
        let a = iv(0, 5);
        let b = iv(0, 10);
        let w = a.widen(&b);
        assert!(a.leq(&w));
        assert!(b.leq(&w));
    }

    #[test]
    fn narrow_is_reductive() {
        let a = Interval::top_of(32, Sign::Signed);
        let b = iv(0, 10);
        let n = a.narrow(&b);
        assert!(a.meet(&b).leq(&n));
        assert!(n.leq(&a));
    }

    #[test]
    fn widen_to_threshold_saturates_at_nearest_bound() {
        let a = iv(0, 5);
        let b = iv(0, 7);
        let thresholds = [0, 10, 100];
        let w = a.widen_to_threshold(&b, &thresholds);
        assert_eq!(w.hi(), &Bound::Finite(MachineInt::new(10, 32, Sign::Signed)));
    }

    #[test]
    fn array_index_scenario_range() {
        // §8 scenario 1: x in {&a[0], &a[1]}, values 5 and 10.
        let v0 = Interval::singleton(MachineInt::new(5, 32, Sign::Signed));
        let v1 = Interval::singleton(MachineInt::new(10, 32, Sign::Signed));
        let joined = v0.join(&v1);
        assert_eq!(joined, iv(5, 10));
    }
}
