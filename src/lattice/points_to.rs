//! Points-to sets (§4.B): a finite set of memory locations a pointer may
//! name, or `⊤` when the analysis gives up tracking it precisely.

use alloc::collections::BTreeSet;
use alloc::fmt;

use crate::lattice::Lattice;
use crate::variable::MemoryLocationId;

/// A finite set of candidate [`MemoryLocationId`]s, or `⊤`. There is
/// deliberately no finite "all locations" representation of `⊤` — callers
/// that need to forget precise points-to information use `⊤` directly
/// rather than enumerating every location in the factory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PointsToSet {
    /// No information; the pointer may point anywhere.
    Top,
    /// Exactly the locations in this set (empty means `⊥`: the pointer
    /// cannot point anywhere, i.e. the program point is unreachable).
    #[default]
    Locations(BTreeSet<MemoryLocationId>),
}

impl fmt::Display for PointsToSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointsToSet::Top => write!(f, "⊤"),
            PointsToSet::Locations(set) if set.is_empty() => write!(f, "⊥"),
            PointsToSet::Locations(set) => {
                write!(f, "{{")?;
                for (i, loc) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{loc:?}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl PointsToSet {
    /// The singleton points-to set `{loc}`.
    pub fn singleton(loc: MemoryLocationId) -> Self {
        let mut set = BTreeSet::new();
        set.insert(loc);
        PointsToSet::Locations(set)
    }

    /// The empty set (`⊥`: the pointer cannot refer to any location).
    pub fn empty() -> Self {
        PointsToSet::Locations(BTreeSet::new())
    }

    /// Whether this set, if finite, contains `loc`.
    pub fn may_point_to(&self, loc: MemoryLocationId) -> bool {
        match self {
            PointsToSet::Top => true,
            PointsToSet::Locations(set) => set.contains(&loc),
        }
    }

    /// The finite set of locations, if not `⊤`.
    pub fn locations(&self) -> Option<&BTreeSet<MemoryLocationId>> {
        match self {
            PointsToSet::Top => None,
            PointsToSet::Locations(set) => Some(set),
        }
    }

    /// Add a location to the set (a no-op on `⊤`).
    pub fn insert(&mut self, loc: MemoryLocationId) {
        if let PointsToSet::Locations(set) = self {
            set.insert(loc);
        }
    }
}

impl Lattice for PointsToSet {
    fn bottom() -> Self {
        PointsToSet::empty()
    }

    fn top() -> Self {
        PointsToSet::Top
    }

    fn is_bottom(&self) -> bool {
        matches!(self, PointsToSet::Locations(set) if set.is_empty())
    }

    fn is_top(&self) -> bool {
        matches!(self, PointsToSet::Top)
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (PointsToSet::Top, _) | (_, PointsToSet::Top) => PointsToSet::Top,
            (PointsToSet::Locations(a), PointsToSet::Locations(b)) => {
                PointsToSet::Locations(a.union(b).copied().collect())
            }
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (PointsToSet::Top, x) | (x, PointsToSet::Top) => x.clone(),
            (PointsToSet::Locations(a), PointsToSet::Locations(b)) => {
                PointsToSet::Locations(a.intersection(b).copied().collect())
            }
        }
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (_, PointsToSet::Top) => true,
            (PointsToSet::Top, PointsToSet::Locations(_)) => false,
            (PointsToSet::Locations(a), PointsToSet::Locations(b)) => a.is_subset(b),
        }
    }

    fn widen(&self, other: &Self) -> Self {
        // Finite-height lattice below `⊤` only up to the number of
        // memory locations in the factory; join is already a sound,
        // terminating widening here.
        self.join(other)
    }

    fn narrow(&self, other: &Self) -> Self {
        self.meet(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_commutative_and_absorbs_top() {
        let a = PointsToSet::singleton(MemoryLocationId::from_raw(1));
        let top = PointsToSet::top();
        assert_eq!(a.join(&top), top);
        assert_eq!(top.join(&a), a.join(&top));
    }

    #[test]
    fn empty_is_bottom() {
        assert!(PointsToSet::empty().is_bottom());
    }
}
