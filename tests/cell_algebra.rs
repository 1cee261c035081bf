//! Cell-range algebra (overlap/containment) and the weak-update behavior
//! it drives in the memory domain when a points-to set resolves to more
//! than one target.

use absint_core::domain::interval_domain::IntervalDomain;
use absint_core::domain::memory::{Cell, MemoryDomain};
use absint_core::lattice::interval::Interval;
use absint_core::lattice::interval_congruence::IntervalCongruence;
use absint_core::lattice::points_to::PointsToSet;
use absint_core::lattice::Lattice;
use absint_core::num::{MachineInt, Sign};
use absint_core::variable::MemoryLocationFactory;

fn cell(base: absint_core::variable::MemoryLocationId, offset: i128, size: u32) -> Cell {
    Cell { base, offset, size, sign: Sign::Signed }
}

fn ic(v: i128) -> IntervalCongruence {
    IntervalCongruence::exact(MachineInt::new(v, 64, Sign::Unsigned))
}

#[test]
fn disjoint_cells_do_not_overlap() {
    let locations = MemoryLocationFactory::new();
    let loc = locations.errno();
    let a = cell(loc, 0, 4);
    let b = cell(loc, 4, 4);
    assert!(!a.overlaps(&b));
}

#[test]
fn overlapping_cells_with_shared_bytes_overlap() {
    let locations = MemoryLocationFactory::new();
    let loc = locations.errno();
    let a = cell(loc, 0, 8);
    let b = cell(loc, 4, 4);
    assert!(a.overlaps(&b));
    assert!(a.contains(&b));
    assert!(!b.contains(&a));
}

/// Writing a value of different size at the same base offset evicts the
/// prior overlapping cell rather than leaving two stale abstractions for
/// the same bytes.
#[test]
fn write_with_different_size_evicts_overlapping_cell() {
    let mut mem: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
    let locations = MemoryLocationFactory::new();
    let loc = locations.errno();
    let pts = PointsToSet::singleton(loc);
    mem.mem_write(&pts, &ic(0), 4, Sign::Signed, Interval::singleton(MachineInt::new(7, 32, Sign::Signed)), None).unwrap();
    mem.mem_write(&pts, &ic(0), 8, Sign::Signed, Interval::singleton(MachineInt::new(99, 64, Sign::Signed)), None).unwrap();
    let read_back = {
        let mut probe: MemoryDomain<IntervalDomain> = mem.clone();
        let x = absint_core::variable::VarId::from_raw(900);
        probe.mem_read(x, &pts, &ic(0), 8, Sign::Signed, false).unwrap();
        probe.scalar().dynamic_read_integer(x)
    };
    assert_eq!(read_back.as_singleton().unwrap().value(), 99);
}

/// A weak update (points-to set resolving to more than one location)
/// joins rather than overwrites, so neither branch's prior value is lost.
#[test]
fn weak_update_joins_instead_of_overwriting() {
    let mut mem: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
    let mut locations = MemoryLocationFactory::new();
    let a = locations.make("a", absint_core::variable::MemoryLocationKind::Local);
    let b = locations.make("b", absint_core::variable::MemoryLocationKind::Local);
    let pts_a = PointsToSet::singleton(a);
    let pts_b = PointsToSet::singleton(b);
    let pts_both = pts_a.join(&pts_b);

    mem.mem_write(&pts_a, &ic(0), 4, Sign::Signed, Interval::singleton(MachineInt::new(1, 32, Sign::Signed)), None).unwrap();
    mem.mem_write(&pts_b, &ic(0), 4, Sign::Signed, Interval::singleton(MachineInt::new(2, 32, Sign::Signed)), None).unwrap();
    mem.mem_write(&pts_both, &ic(0), 4, Sign::Signed, Interval::singleton(MachineInt::new(5, 32, Sign::Signed)), None).unwrap();

    let x = absint_core::variable::VarId::from_raw(901);
    mem.mem_read(x, &pts_a, &ic(0), 4, Sign::Signed, false).unwrap();
    let value = mem.scalar().dynamic_read_integer(x);
    assert!(value.lo_value().unwrap() <= 1 && value.hi_value().unwrap() >= 5);
}
