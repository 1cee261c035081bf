//! The reduced product of [`Interval`] and [`Congruence`] (§4.B): each
//! refines the other until a fixed point, so e.g. `[0, 10] ⊓ 2ℤ` reduces
//! to `[0, 10] ⊓ 2ℤ+0` with the interval's odd values pruned away by
//! shrinking the bounds to the nearest even ones, not merely conjoined.

use alloc::fmt;

use crate::lattice::interval::{Bound, Interval};
use crate::lattice::Lattice;
use crate::num::{Congruence, MachineInt, Sign};

/// `Interval ⊓ Congruence`, kept in reduced form: the interval's bounds
/// are always themselves representable in the congruence class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalCongruence {
    interval: Interval,
    congruence: Congruence,
}

impl fmt::Display for IntervalCongruence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ⊓ {}", self.interval, self.congruence)
    }
}

impl IntervalCongruence {
    /// Build from independent interval and congruence components,
    /// reducing to a fixed point.
    pub fn new(interval: Interval, congruence: Congruence) -> Self {
        Self { interval, congruence }.reduce()
    }

    /// The exact value, as a degenerate interval-congruence.
    pub fn exact(v: MachineInt) -> Self {
        Self::new(Interval::singleton(v), Congruence::exact(v.value()))
    }

    /// The interval projection (§4.C `to_interval`).
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// The congruence projection (§4.C `to_congruence`).
    pub fn congruence(&self) -> &Congruence {
        &self.congruence
    }

    /// The unique value this interval-congruence denotes, if it is a
    /// singleton.
    pub fn as_singleton(&self) -> Option<MachineInt> {
        self.interval.as_singleton()
    }

    fn reduce(mut self) -> Self {
        if self.interval.is_bottom() {
            return self;
        }
        if self.congruence.modulus() == 0 {
            let residue = self.congruence.residue();
            let width = self.interval.bit_width();
            let sign = self.interval.sign();
            let v = MachineInt::new(residue, width, sign);
            self.interval = self.interval.meet(&Interval::singleton(v));
            return self;
        }
        // Shrink lo up, hi down, to the nearest values satisfying the
        // congruence.
        if let Bound::Finite(lo) = self.interval.lo() {
            let mut v = lo.value();
            let m = self.congruence.modulus();
            while !self.congruence.contains(v) {
                v += 1;
                if let Bound::Finite(hi) = self.interval.hi() {
                    if v > hi.value() {
                        self.interval = Interval::bottom_of(lo.bit_width(), lo.sign());
                        return self;
                    }
                } else if v - lo.value() > m {
                    break;
                }
            }
            self.interval = Interval::new(
                Bound::Finite(MachineInt::new(v, lo.bit_width(), lo.sign())),
                *self.interval.hi(),
                lo.bit_width(),
                lo.sign(),
            );
        }
        if let Bound::Finite(hi) = self.interval.hi() {
            let mut v = hi.value();
            let m = self.congruence.modulus();
            while !self.congruence.contains(v) {
                v -= 1;
                if let Bound::Finite(lo) = self.interval.lo() {
                    if v < lo.value() {
                        self.interval = Interval::bottom_of(hi.bit_width(), hi.sign());
                        return self;
                    }
                } else if hi.value() - v > m {
                    break;
                }
            }
            self.interval = Interval::new(
                *self.interval.lo(),
                Bound::Finite(MachineInt::new(v, hi.bit_width(), hi.sign())),
                hi.bit_width(),
                hi.sign(),
            );
        }
        self
    }
}

impl Lattice for IntervalCongruence {
    fn bottom() -> Self {
        Self {
            interval: Interval::bottom_of(64, Sign::Signed),
            congruence: Congruence::top(),
        }
    }

    fn top() -> Self {
        Self {
            interval: Interval::top_of(64, Sign::Signed),
            congruence: Congruence::top(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.interval.is_bottom()
    }

    fn is_top(&self) -> bool {
        self.interval.is_top() && self.congruence.modulus() == 1
    }

    fn join(&self, other: &Self) -> Self {
        Self::new(self.interval.join(&other.interval), self.congruence.join(&other.congruence))
    }

    fn meet(&self, other: &Self) -> Self {
        match self.congruence.meet(&other.congruence) {
            Some(c) => Self::new(self.interval.meet(&other.interval), c),
            None => Self {
                interval: Interval::bottom_of(self.interval.bit_width(), self.interval.sign()),
                congruence: Congruence::top(),
            },
        }
    }

    fn leq(&self, other: &Self) -> bool {
        self.interval.leq(&other.interval)
    }

    fn widen(&self, other: &Self) -> Self {
        Self {
            interval: self.interval.widen(&other.interval),
            congruence: other.congruence,
        }
    }

    fn narrow(&self, other: &Self) -> Self {
        Self::new(self.interval.narrow(&other.interval), other.congruence)
    }
}
