//! Checkers (§4.J): given a statement and its pre-state, decide whether
//! the statement is safe, and if not, how. The buffer-overflow checker
//! is the one concrete checker implemented here; its four-valued outcome
//! and `CheckKind` taxonomy are shared by every other checker a driver
//! might register.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;

use crate::cfg::{Function, StatementKind};
use crate::config::Options;
use crate::domain::memory::{Lifetime, MemoryDomain};
use crate::domain::NumericalDomain;
use crate::lattice::interval::Interval;
use crate::lattice::pointer_value::{Nullity, Uninitialized};
use crate::num::Sign;
use crate::variable::{MemoryLocationFactory, MemoryLocationId, MemoryLocationKind, VarId, VariableFactory};

/// The defect class a [`CheckResult`] belongs to (§4.J, recovered
/// taxonomy from `buffer_overflow.cpp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// The pre-state was already `⊥`.
    Unreachable,
    /// The accessed pointer is proved uninitialized.
    UninitializedVariable,
    /// The accessed pointer is proved null.
    NullPointerDereference,
    /// The accessed pointer's points-to set resolved to the empty set.
    InvalidPointerDereference,
    /// The points-to set could not be resolved precisely (`⊤`).
    UnknownMemoryAccess,
    /// An operand had a kind the checker does not know how to interpret
    /// (e.g. a function-pointer value used as data).
    UnexpectedOperand,
    /// The accessed location is proved deallocated.
    UseAfterFree,
    /// The access targets a fixed address outside the configured
    /// hardware-address allowlist.
    HardwareAddresses,
    /// The access's byte range can exceed the target's allocated size.
    BufferOverflow,
    /// A call through a pointer whose target could not be resolved.
    UnknownFunctionCallPointer,
    /// A call into inline assembly, opaque to the analyzer.
    FunctionCallInlineAssembly,
}

/// The four-valued check outcome (§4.J), totally ordered by severity:
/// `Ok < Warning < Error < Unreachable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Outcome {
    /// The access is proved safe.
    Ok,
    /// The access may be unsafe; the analysis could not prove otherwise.
    Warning,
    /// The access is proved unsafe.
    Error,
    /// The statement is proved unreachable.
    Unreachable,
}

/// One checker's verdict at one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Defect class.
    pub kind: CheckKind,
    /// Severity.
    pub outcome: Outcome,
    /// Source location of the checked statement.
    pub site: String,
    /// Debug description of the calling context this result was computed
    /// under.
    pub context: String,
    /// Human-readable detail (points-to targets, offsets, bounds).
    pub info: String,
    /// Whether every target was an array of matching element type with
    /// an offset that is a multiple of the element size (§4.J step 3).
    pub array_access: bool,
}

impl CheckResult {
    fn new(kind: CheckKind, outcome: Outcome, site: &str, context: &str, info: String) -> Self {
        Self {
            kind,
            outcome,
            site: site.into(),
            context: context.into(),
            info,
            array_access: false,
        }
    }
}

/// `allocated_size(addr)` (§6): a static table from memory location to
/// its statically-known allocation size, built once from the program's
/// `Alloca` statements (§4.J's dynamically-sized allocations are outside
/// this implementation's scope; see `DESIGN.md`).
pub type AllocatedSizes = BTreeMap<MemoryLocationId, Interval>;

/// Scan every `Alloca` statement reachable from `functions` and record its
/// statically-known size. Dynamically-sized allocations (`malloc(n)` for a
/// non-constant `n`) never appear as `Alloca` in this IR and are outside
/// this table's scope.
pub fn collect_allocated_sizes(functions: &[Function]) -> AllocatedSizes {
    let mut sizes = AllocatedSizes::new();
    for f in functions {
        for block in f.cfg.blocks.values() {
            for stmt in &block.statements {
                if let StatementKind::Alloca { location, size, .. } = &stmt.kind {
                    sizes.insert(*location, Interval::singleton(crate::num::MachineInt::new(i128::from(*size), 64, Sign::Unsigned)));
                }
            }
        }
    }
    sizes
}

fn worse(a: Outcome, b: Outcome) -> Outcome {
    if a >= b {
        a
    } else {
        b
    }
}

/// The buffer-overflow checker (§4.J): checks a memory access through
/// pointer `ptr` of `size` bytes against `state`.
pub fn check_buffer_overflow<N: NumericalDomain>(
    state: &MemoryDomain<N>,
    vars: &VariableFactory,
    locations: &MemoryLocationFactory,
    allocated_sizes: &AllocatedSizes,
    options: &Options,
    ptr: VarId,
    size: u32,
    site: &str,
    context: &str,
) -> CheckResult {
    if state.is_bottom() {
        return CheckResult::new(CheckKind::Unreachable, Outcome::Unreachable, site, context, "pre-state is bottom".into());
    }
    let offset_var = vars.offset_of(ptr).unwrap_or(ptr);
    let pv = state.scalar().dynamic_read_pointer(ptr, offset_var);

    if pv.uninit == Uninitialized::Uninit {
        return CheckResult::new(
            CheckKind::UninitializedVariable,
            Outcome::Error,
            site,
            context,
            "pointer is proved uninitialized".into(),
        );
    }
    if pv.nullity == Nullity::Null {
        return CheckResult::new(CheckKind::NullPointerDereference, Outcome::Error, site, context, "pointer is proved null".into());
    }

    let Some(targets) = pv.points_to.locations() else {
        return CheckResult::new(
            CheckKind::UnknownMemoryAccess,
            Outcome::Warning,
            site,
            context,
            "points-to set could not be resolved".into(),
        );
    };
    if targets.is_empty() {
        return CheckResult::new(
            CheckKind::InvalidPointerDereference,
            Outcome::Error,
            site,
            context,
            "points-to set resolved to no locations".into(),
        );
    }

    let mut outcome = Outcome::Ok;
    let mut kind = CheckKind::BufferOverflow;
    let mut info = String::new();
    let mut array_access = true;
    let mut first_element_size: Option<u32> = None;

    for &loc in targets {
        let (target_outcome, target_kind, note) =
            check_one_target(state, locations, allocated_sizes, options, loc, pv.offset.clone(), size);
        if (target_outcome, rank(target_kind)) > (outcome, rank(kind)) {
            outcome = target_outcome;
            kind = target_kind;
        }
        info.push_str(&note);
        info.push(' ');

        match (allocated_sizes.get(&loc).and_then(|iv| iv.as_singleton()), first_element_size) {
            (Some(v), None) => first_element_size = Some(v.value() as u32),
            (Some(v), Some(prev)) if v.value() as u32 != prev => array_access = false,
            (None, _) => array_access = false,
            _ => {}
        }
    }
    if let Some(elem) = first_element_size {
        if elem == 0 || pv.offset.as_singleton().map(|v| v.value() % i128::from(elem) != 0).unwrap_or(true) {
            array_access = false;
        }
    } else {
        array_access = false;
    }

    let mut result = CheckResult::new(kind, outcome, site, context, info);
    result.array_access = array_access;
    result
}

fn rank(kind: CheckKind) -> u8 {
    kind as u8
}

fn check_one_target<N: NumericalDomain>(
    state: &MemoryDomain<N>,
    locations: &MemoryLocationFactory,
    allocated_sizes: &AllocatedSizes,
    options: &Options,
    loc: MemoryLocationId,
    offset: Interval,
    size: u32,
) -> (Outcome, CheckKind, String) {
    if let Some(info) = locations.info(loc) {
        if info.kind == MemoryLocationKind::Function {
            return (Outcome::Error, CheckKind::UnexpectedOperand, format!("{loc:?} is a function pointer"));
        }
    }
    match state.lifetime_of(loc) {
        Lifetime::Deallocated => return (Outcome::Error, CheckKind::UseAfterFree, format!("{loc:?} is deallocated")),
        Lifetime::Unknown => return (Outcome::Warning, CheckKind::UnknownMemoryAccess, format!("{loc:?} has unknown lifetime")),
        Lifetime::Allocated => {}
    }
    if loc == locations.absolute_zero() {
        let allowed = offset
            .as_singleton()
            .map(|v| options.is_allowed_hardware_address(v.value() as u64))
            .unwrap_or(false);
        return if allowed {
            (Outcome::Ok, CheckKind::HardwareAddresses, format!("{loc:?} is an allowed hardware address"))
        } else {
            (Outcome::Warning, CheckKind::HardwareAddresses, format!("{loc:?} is not in the hardware-address allowlist"))
        };
    }

    let size_var = allocated_sizes.get(&loc).cloned().unwrap_or_else(|| Interval::top_of(64, Sign::Unsigned));
    let (Some(off_lo), off_hi) = (offset.lo_value(), offset.hi_value()) else {
        return (Outcome::Warning, CheckKind::BufferOverflow, format!("{loc:?} offset is unbounded below"));
    };
    let offset_plus_size_lo = off_lo + i128::from(size);
    let offset_plus_size_hi = off_hi.map(|h| h + i128::from(size));
    let (Some(bound_lo), bound_hi) = (size_var.lo_value(), size_var.hi_value()) else {
        return (Outcome::Warning, CheckKind::BufferOverflow, format!("{loc:?} allocated size is unbounded below"));
    };

    let definitely_in_bounds = off_hi.map(|h| h <= bound_lo).unwrap_or(false)
        && offset_plus_size_hi.map(|h| h <= bound_lo).unwrap_or(false);
    if definitely_in_bounds {
        return (Outcome::Ok, CheckKind::BufferOverflow, format!("{loc:?} access within [0,{bound_lo}]"));
    }
    let definitely_out_of_bounds = bound_hi.map(|bh| off_lo > bh || offset_plus_size_lo > bh).unwrap_or(false);
    if definitely_out_of_bounds {
        return (Outcome::Error, CheckKind::BufferOverflow, format!("{loc:?} offset {off_lo} exceeds allocated size"));
    }
    (Outcome::Warning, CheckKind::BufferOverflow, format!("{loc:?} bounds not provably safe"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interval_domain::IntervalDomain;
    use crate::lattice::points_to::PointsToSet;
    use crate::num::MachineInt;
    use crate::variable::DynType;

    fn setup() -> (MemoryDomain<IntervalDomain>, VariableFactory, MemoryLocationFactory, VarId) {
        let mut vars = VariableFactory::new(64);
        let mut locations = MemoryLocationFactory::new();
        let mut state: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
        let ptr = vars.make("p", DynType::Pointer);
        let offset_var = vars.offset_of(ptr).unwrap();
        let loc = locations.make("a", MemoryLocationKind::Local);
        state.mark_allocated(loc);
        state
            .scalar_mut()
            .dynamic_write_pointer(
                ptr,
                offset_var,
                &crate::lattice::pointer_value::PointerValue {
                    uninit: Uninitialized::Init,
                    nullity: Nullity::NonNull,
                    points_to: PointsToSet::singleton(loc),
                    offset: Interval::singleton(MachineInt::new(0, 64, Sign::Unsigned)),
                },
            )
            .unwrap();
        (state, vars, locations, ptr)
    }

    #[test]
    fn in_bounds_access_is_ok() {
        let (state, vars, locations, ptr) = setup();
        let loc = *state.scalar().dynamic_read_pointer(ptr, vars.offset_of(ptr).unwrap()).points_to.locations().unwrap().iter().next().unwrap();
        let mut sizes = AllocatedSizes::new();
        sizes.insert(loc, Interval::singleton(MachineInt::new(40, 64, Sign::Unsigned)));
        let options = Options::default();
        let result = check_buffer_overflow(&state, &vars, &locations, &sizes, &options, ptr, 4, "t:1", "ctx");
        assert_eq!(result.outcome, Outcome::Ok);
    }

    #[test]
    fn null_pointer_is_error() {
        let (mut state, vars, locations, ptr) = setup();
        let offset_var = vars.offset_of(ptr).unwrap();
        state
            .scalar_mut()
            .dynamic_write_pointer(
                ptr,
                offset_var,
                &crate::lattice::pointer_value::PointerValue {
                    uninit: Uninitialized::Init,
                    nullity: Nullity::Null,
                    points_to: PointsToSet::empty(),
                    offset: Interval::singleton(MachineInt::new(0, 64, Sign::Unsigned)),
                },
            )
            .unwrap();
        let sizes = AllocatedSizes::new();
        let options = Options::default();
        let result = check_buffer_overflow(&state, &vars, &locations, &sizes, &options, ptr, 4, "t:2", "ctx");
        assert_eq!(result.outcome, Outcome::Error);
        assert_eq!(result.kind, CheckKind::NullPointerDereference);
    }

    #[test]
    fn deallocated_location_is_use_after_free() {
        let (mut state, vars, locations, ptr) = setup();
        let loc = *state.scalar().dynamic_read_pointer(ptr, vars.offset_of(ptr).unwrap()).points_to.locations().unwrap().iter().next().unwrap();
        state.mark_deallocated(loc);
        let sizes = AllocatedSizes::new();
        let options = Options::default();
        let result = check_buffer_overflow(&state, &vars, &locations, &sizes, &options, ptr, 4, "t:3", "ctx");
        assert_eq!(result.kind, CheckKind::UseAfterFree);
        assert_eq!(result.outcome, Outcome::Error);
    }

    #[test]
    fn out_of_bounds_offset_is_buffer_overflow() {
        let (state, vars, locations, ptr) = setup();
        let loc = *state.scalar().dynamic_read_pointer(ptr, vars.offset_of(ptr).unwrap()).points_to.locations().unwrap().iter().next().unwrap();
        let mut sizes = AllocatedSizes::new();
        sizes.insert(loc, Interval::singleton(MachineInt::new(4, 64, Sign::Unsigned)));
        let mut state = state;
        let offset_var = vars.offset_of(ptr).unwrap();
        state
            .scalar_mut()
            .dynamic_write_pointer(
                ptr,
                offset_var,
                &crate::lattice::pointer_value::PointerValue {
                    uninit: Uninitialized::Init,
                    nullity: Nullity::NonNull,
                    points_to: PointsToSet::singleton(loc),
                    offset: Interval::singleton(MachineInt::new(10, 64, Sign::Unsigned)),
                },
            )
            .unwrap();
        let options = Options::default();
        let result = check_buffer_overflow(&state, &vars, &locations, &sizes, &options, ptr, 4, "t:4", "ctx");
        assert_eq!(result.kind, CheckKind::BufferOverflow);
        assert_eq!(result.outcome, Outcome::Error);
    }
}
