//! Lattice values (§4.B): interval, congruence, interval∧congruence,
//! gauge, points-to set, and the composite pointer abstract value. Each is
//! a complete lattice with `⊥`, `⊤`, join, meet, widening, narrowing, and
//! a partial order, per the [`Lattice`] contract below.

pub mod gauge;
pub mod interval;
pub mod interval_congruence;
pub mod pointer_value;
pub mod points_to;

/// The contract every lattice value in this crate implements. Kept as a
/// trait (rather than duck-typed inherent methods) so the numerical
/// domains and the fixpoint iterator (§4.H) can be generic over "whichever
/// lattice value the configured domain produces".
pub trait Lattice: Sized + Clone + PartialEq {
    /// The bottom element: the analysis has proven the current program
    /// point unreachable, or the value has no valid interpretation.
    fn bottom() -> Self;

    /// The top element: no information.
    fn top() -> Self;

    /// Whether `self` is exactly `⊥`.
    fn is_bottom(&self) -> bool;

    /// Whether `self` is exactly `⊤`.
    fn is_top(&self) -> bool;

    /// Least upper bound.
    #[must_use]
    fn join(&self, other: &Self) -> Self;

    /// Greatest lower bound.
    #[must_use]
    fn meet(&self, other: &Self) -> Self;

    /// `self ⊑ other`.
    fn leq(&self, other: &Self) -> bool;

    /// Widening: `self ⊑ self.widen(other)` and `other ⊑ self.widen(other)`,
    /// guaranteeing termination of ascending iteration sequences.
    #[must_use]
    fn widen(&self, other: &Self) -> Self;

    /// Narrowing: `self.meet(other) ⊑ self.narrow(other) ⊑ self`.
    #[must_use]
    fn narrow(&self, other: &Self) -> Self;
}
