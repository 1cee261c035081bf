//! Analysis configuration (§6 "Configuration"): a plain options struct
//! passed by shared reference, never read from a global or static.

use alloc::vec::Vec;
use core::ops::RangeInclusive;

use crate::cfg::FunctionId;
use crate::domain::poly::DomainKind;

/// How much of the state the analysis tracks (§6 `precision`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Precision {
    /// Track scalar integers only; pointers are opaque.
    IntegersOnly,
    /// Track scalar integers plus pointer nullity/points-to, but not cell
    /// contents.
    PointerTracking,
    /// Full cell-based memory domain (§4.E).
    FullMemory,
}

impl Default for Precision {
    fn default() -> Self {
        Precision::FullMemory
    }
}

/// Which concrete numerical domain the polymorphic wrapper (§4.F) should
/// hold (§6 `domain`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumericalDomainKind {
    /// [`crate::domain::interval_domain::IntervalDomain`].
    Interval,
    /// [`crate::domain::dbm::DbmDomain`].
    Dbm,
    /// [`crate::domain::dbm::DbmDomain`] behind variable packing.
    DbmPacked,
    /// [`crate::domain::gauge_domain::GaugeDomain`].
    Gauge,
    /// [`crate::domain::dbm_congruence::DbmCongruenceDomain`].
    DbmCongruence,
}

impl Default for NumericalDomainKind {
    fn default() -> Self {
        NumericalDomainKind::Interval
    }
}

impl From<NumericalDomainKind> for DomainKind {
    fn from(k: NumericalDomainKind) -> Self {
        match k {
            NumericalDomainKind::Interval => DomainKind::Interval,
            NumericalDomainKind::Dbm => DomainKind::Dbm,
            NumericalDomainKind::DbmPacked => DomainKind::DbmPacked,
            NumericalDomainKind::Gauge => DomainKind::Gauge,
            NumericalDomainKind::DbmCongruence => DomainKind::DbmCongruence,
        }
    }
}

/// The options table of §6.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Options {
    /// Which state layers to track.
    pub precision: Precision,
    /// Concrete numerical domain backing the polymorphic wrapper.
    pub domain: NumericalDomainKind,
    /// At the checker pass, whether to join all calling contexts per
    /// callee instead of keeping per-path contexts.
    pub merge_call_contexts: bool,
    /// Fixed addresses treated as valid pointer targets (e.g. MMIO).
    pub hardware_addresses: Vec<RangeInclusive<u64>>,
    /// Functions treated as program entries, analyzed with a `⊤` calling
    /// context.
    pub entry_points: Vec<FunctionId>,
    /// Number of fixpoint iterations at an SCC head before switching from
    /// plain join to widening.
    pub widening_delay: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            precision: Precision::default(),
            domain: NumericalDomainKind::default(),
            merge_call_contexts: false,
            hardware_addresses: Vec::new(),
            entry_points: Vec::new(),
            widening_delay: 1,
        }
    }
}

impl Options {
    /// Whether `addr` falls within a configured hardware-address range.
    pub fn is_allowed_hardware_address(&self, addr: u64) -> bool {
        self.hardware_addresses.iter().any(|r| r.contains(&addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_have_no_allowed_addresses() {
        let opts = Options::default();
        assert!(!opts.is_allowed_hardware_address(0x1000));
    }

    #[test]
    fn configured_range_is_allowed() {
        let mut opts = Options::default();
        opts.hardware_addresses.push(0x1000..=0x2000);
        assert!(opts.is_allowed_hardware_address(0x1500));
        assert!(!opts.is_allowed_hardware_address(0x3000));
    }
}
