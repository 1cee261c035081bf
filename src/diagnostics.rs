//! The non-fatal "unsoundness warning" channel (§4.G, §6 Logging): records
//! the places where the executor or summarization passes had to fall back
//! to an unsound assumption (an unresolved indirect call, a `narrow`
//! iteration cap, an externally-modeled function with no real contract).
//!
//! Distinct from [`crate::error::AnalyzerError`]: an `AnalyzerError` means
//! the analyzer itself hit a bug. A [`Diagnostic`] means the analyzer ran
//! fine but the soundness guarantee for that one program point rests on an
//! assumption the driver should surface to the user.

use alloc::string::String;
use alloc::vec::Vec;

/// What kind of unsound assumption was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A call site's callee could not be resolved; the call's effect on
    /// the caller's state was modeled as "forget everything reachable".
    UnresolvedIndirectCall,
    /// An external or intrinsic function had no contract registered; its
    /// return value and every pointer argument's target were forgotten.
    UnmodeledExternalCall,
    /// The narrowing sequence hit its iteration cap before reaching a
    /// fixed point and was cut short at the last computed value.
    NarrowingCutShort,
    /// A hardware address fell outside every configured allowed range but
    /// was still treated as potentially valid because the allowlist
    /// itself was empty (nothing to check against).
    UncheckedHardwareAddress,
    /// A call targeted a callee still under analysis (a recursion cycle
    /// not yet summarized); the call's effect was forgotten rather than
    /// spliced in, per §4.I's bottom-up summarization order.
    RecursionCycleForgotten,
}

impl DiagnosticKind {
    fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::UnresolvedIndirectCall => "unresolved indirect call",
            DiagnosticKind::UnmodeledExternalCall => "unmodeled external call",
            DiagnosticKind::NarrowingCutShort => "narrowing cut short",
            DiagnosticKind::UncheckedHardwareAddress => "unchecked hardware address",
            DiagnosticKind::RecursionCycleForgotten => "recursion cycle forgotten",
        }
    }
}

/// One recorded unsoundness warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// What kind of assumption was made.
    pub kind: DiagnosticKind,
    /// Where in the analyzer this was raised from, e.g. `"exec_call"`.
    pub context: String,
    /// The AR source location of the statement that triggered it, or
    /// `"<unknown>"` if none was available.
    pub site: String,
}

/// An ordered log of [`Diagnostic`]s collected over one analysis run.
/// Every push is also emitted as a `tracing::warn!` event so a driver
/// that only wired up `tracing-subscriber` still sees them without
/// reading this struct back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and emit it through `tracing`.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(
            kind = diagnostic.kind.as_str(),
            context = %diagnostic.context,
            site = %diagnostic.site,
            "unsound assumption"
        );
        self.entries.push(diagnostic);
    }

    /// All diagnostics recorded so far, in emission order.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Whether any diagnostic was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_records_in_order() {
        let mut log = Diagnostics::new();
        log.push(Diagnostic {
            kind: DiagnosticKind::UnresolvedIndirectCall,
            context: "exec_call".into(),
            site: "a.c:1".into(),
        });
        log.push(Diagnostic {
            kind: DiagnosticKind::NarrowingCutShort,
            context: "fixpoint".into(),
            site: "a.c:2".into(),
        });
        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[0].kind, DiagnosticKind::UnresolvedIndirectCall);
    }
}
