//! Fatal, internal-invariant-violation errors (§7.2 of the design).
//!
//! `⊥` is not represented here: every domain operation that can reach an
//! unreachable abstract state returns it as an ordinary value (usually
//! `Option::None` or a dedicated `Bottom` marker), never as an `Err`. This
//! type is reserved for bugs in the analyzer itself — a mismatched operand
//! kind, two operands of a relational domain built over different variable
//! universes, two polymorphic-domain values of different concrete kind.

use alloc::string::String;

/// An internal invariant violation. Propagated with `?`; never caught and
/// downgraded to a warning — see the diagnostics module for the separate,
/// non-fatal "unsoundness warning" channel.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// Two [`crate::num::MachineInt`] operands disagreed on bit width (the
    /// sign mismatch case collapses into the same report; width is the
    /// more informative field for debugging).
    #[error("machine integers of width {lhs_width} and {rhs_width} are not comparable")]
    MismatchedMachineInt {
        /// Bit width of the left operand.
        lhs_width: u32,
        /// Bit width of the right operand.
        rhs_width: u32,
    },

    /// A binary operation on the polymorphic domain (§4.F) was given two
    /// operands backed by different concrete domain kinds.
    #[error("polymorphic domain operands have mismatched concrete kinds: {lhs} vs {rhs}")]
    MismatchedPolymorphicKind {
        /// Debug name of the left operand's concrete kind.
        lhs: String,
        /// Debug name of the right operand's concrete kind.
        rhs: String,
    },

    /// A variable or memory location index referenced a factory slot that
    /// does not exist. This can only happen if a stable index outlived the
    /// factory that produced it, which is itself a bug.
    #[error("unknown variable or memory-location index: {0}")]
    UnknownIndex(u32),

    /// The symbolic executor was asked to execute an AR statement kind
    /// that has no transfer function registered (an unhandled statement
    /// kind reaching the core, not a front-end parse failure).
    #[error("no transfer function registered for statement kind: {0}")]
    UnhandledStatementKind(String),

    /// Value-summary composition (§9 Open Question ii) was asked to
    /// compose over a cell universe so disjoint that the approximation
    /// could not even produce an identity mapping.
    #[error("summary composition failed: {0}")]
    SummaryComposition(String),

    /// The fixpoint iterator exceeded its configured narrowing iteration
    /// cap without reaching a descending fixpoint; the orchestrator is
    /// expected to catch this and fall back to the last stable value, but
    /// an unhandled one surfaces as a fatal condition since it indicates a
    /// non-reductive narrowing operator was plugged in.
    #[error("narrowing failed to converge within {0} iterations")]
    NarrowingDidNotConverge(u32),
}
