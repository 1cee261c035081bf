//! The pointer abstract value (§4.B): `(uninitialized, nullity, points-to,
//! offset-interval)`. Used both as the value a pointer-typed cell holds in
//! the memory domain, and standalone wherever the executor needs to reason
//! about a pointer without the rest of the scalar composite.

use alloc::fmt;

use crate::lattice::interval::Interval;
use crate::lattice::points_to::PointsToSet;
use crate::lattice::Lattice;

/// Initializedness of a variable or cell (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Uninitialized {
    /// Unreachable.
    Bottom,
    /// Definitely initialized.
    Init,
    /// Definitely uninitialized.
    Uninit,
    /// Unknown.
    #[default]
    Top,
}

impl Lattice for Uninitialized {
    fn bottom() -> Self {
        Uninitialized::Bottom
    }
    fn top() -> Self {
        Uninitialized::Top
    }
    fn is_bottom(&self) -> bool {
        matches!(self, Uninitialized::Bottom)
    }
    fn is_top(&self) -> bool {
        matches!(self, Uninitialized::Top)
    }
    fn join(&self, other: &Self) -> Self {
        use Uninitialized::*;
        match (self, other) {
            (Bottom, x) | (x, Bottom) => *x,
            (a, b) if a == b => *a,
            _ => Top,
        }
    }
    fn meet(&self, other: &Self) -> Self {
        use Uninitialized::*;
        match (self, other) {
            (Top, x) | (x, Top) => *x,
            (a, b) if a == b => *a,
            _ => Bottom,
        }
    }
    fn leq(&self, other: &Self) -> bool {
        use Uninitialized::*;
        matches!(
            (self, other),
            (Bottom, _) | (_, Top) | (Init, Init) | (Uninit, Uninit)
        )
    }
    fn widen(&self, other: &Self) -> Self {
        self.join(other)
    }
    fn narrow(&self, other: &Self) -> Self {
        self.meet(other)
    }
}

/// Nullity of a pointer (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Nullity {
    /// Unreachable.
    Bottom,
    /// Definitely null.
    Null,
    /// Definitely non-null.
    NonNull,
    /// Unknown.
    #[default]
    Top,
}

impl Lattice for Nullity {
    fn bottom() -> Self {
        Nullity::Bottom
    }
    fn top() -> Self {
        Nullity::Top
    }
    fn is_bottom(&self) -> bool {
        matches!(self, Nullity::Bottom)
    }
    fn is_top(&self) -> bool {
        matches!(self, Nullity::Top)
    }
    fn join(&self, other: &Self) -> Self {
        use Nullity::*;
        match (self, other) {
            (Bottom, x) | (x, Bottom) => *x,
            (a, b) if a == b => *a,
            _ => Top,
        }
    }
    fn meet(&self, other: &Self) -> Self {
        use Nullity::*;
        match (self, other) {
            (Top, x) | (x, Top) => *x,
            (a, b) if a == b => *a,
            _ => Bottom,
        }
    }
    fn leq(&self, other: &Self) -> bool {
        use Nullity::*;
        matches!(
            (self, other),
            (Bottom, _) | (_, Top) | (Null, Null) | (NonNull, NonNull)
        )
    }
    fn widen(&self, other: &Self) -> Self {
        self.join(other)
    }
    fn narrow(&self, other: &Self) -> Self {
        self.meet(other)
    }
}

/// `(uninitialized, nullity, points-to, offset)` for one pointer-typed
/// value.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerValue {
    /// Initializedness of the pointer itself.
    pub uninit: Uninitialized,
    /// Null-ness of the pointer.
    pub nullity: Nullity,
    /// Candidate memory locations.
    pub points_to: PointsToSet,
    /// Byte offset from the base of each pointed-to location.
    pub offset: Interval,
}

impl fmt::Display for PointerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ptr(uninit={:?}, null={:?}, pts={}, off={})",
            self.uninit, self.nullity, self.points_to, self.offset
        )
    }
}

impl PointerValue {
    /// `⊥`.
    pub fn bottom(offset_width: u32) -> Self {
        Self {
            uninit: Uninitialized::Bottom,
            nullity: Nullity::Bottom,
            points_to: PointsToSet::bottom(),
            offset: Interval::bottom_of(offset_width, crate::num::Sign::Unsigned),
        }
    }

    /// `⊤`.
    pub fn top(offset_width: u32) -> Self {
        Self {
            uninit: Uninitialized::Top,
            nullity: Nullity::Top,
            points_to: PointsToSet::top(),
            offset: Interval::top_of(offset_width, crate::num::Sign::Unsigned),
        }
    }

    /// Whether the overall value is unreachable: any component being
    /// `⊥` makes the whole product `⊥`.
    pub fn is_bottom(&self) -> bool {
        self.uninit.is_bottom() || self.nullity.is_bottom() || self.points_to.is_bottom() || self.offset.is_bottom()
    }

    /// Pointwise join across the four components.
    pub fn join(&self, other: &Self) -> Self {
        Self {
            uninit: self.uninit.join(&other.uninit),
            nullity: self.nullity.join(&other.nullity),
            points_to: self.points_to.join(&other.points_to),
            offset: self.offset.join(&other.offset),
        }
    }

    /// Pointwise meet; callers should check [`Self::is_bottom`] afterward
    /// since any one component going to `⊥` makes the whole value `⊥`.
    pub fn meet(&self, other: &Self) -> Self {
        Self {
            uninit: self.uninit.meet(&other.uninit),
            nullity: self.nullity.meet(&other.nullity),
            points_to: self.points_to.meet(&other.points_to),
            offset: self.offset.meet(&other.offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meet_null_and_nonnull_is_bottom() {
        let mut a = PointerValue::top(64);
        a.nullity = Nullity::Null;
        let mut b = PointerValue::top(64);
        b.nullity = Nullity::NonNull;
        assert!(a.meet(&b).is_bottom());
    }
}
