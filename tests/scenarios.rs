//! End-to-end scenarios driving the executor and fixpoint engine together,
//! one per representative defect class the checkers are meant to catch.

use absint_core::cfg::{BasicBlock, BlockId, Cfg, Operand, Statement, StatementKind};
use absint_core::check::{check_buffer_overflow, collect_allocated_sizes, AllocatedSizes, CheckKind, Outcome};
use absint_core::config::Options;
use absint_core::diagnostics::Diagnostics;
use absint_core::domain::gauge_domain::GaugeDomain;
use absint_core::domain::interval_domain::IntervalDomain;
use absint_core::domain::memory::MemoryDomain;
use absint_core::domain::{ApplyOp, LinearExpr};
use absint_core::exec::{exec_statement, ForgetAllCalls};
use absint_core::fixpoint::FixpointEngine;
use absint_core::lattice::interval::Interval;
use absint_core::lattice::pointer_value::{Nullity, PointerValue, Uninitialized};
use absint_core::lattice::points_to::PointsToSet;
use absint_core::num::{MachineInt, Sign};
use absint_core::variable::{DynType, MemoryLocationFactory, MemoryLocationKind, VariableFactory};

fn run_single_block(
    vars: &VariableFactory,
    statements: Vec<Statement>,
) -> (MemoryDomain<IntervalDomain>, Diagnostics) {
    let mut cfg = Cfg { entry: BlockId(0), blocks: Default::default() };
    cfg.blocks.insert(BlockId(0), BasicBlock { statements, successors: Vec::new() });
    let options = Options::default();
    let mut engine: FixpointEngine<IntervalDomain> = FixpointEngine::new(&cfg, vars, &options);
    let mut diagnostics = Diagnostics::new();
    engine
        .run(MemoryDomain::top(1000), &mut ForgetAllCalls, &mut diagnostics)
        .unwrap();
    let post = engine.post_states().get(&BlockId(0)).cloned().unwrap_or_else(MemoryDomain::bottom);
    (post, diagnostics)
}

/// Array index safety: `a[0]` and `a[1]` are both in bounds of a 4-element
/// `int32` array, so a read through a pointer joined from either index is
/// proved safe.
#[test]
fn array_index_within_bounds_is_ok() {
    let mut vars = VariableFactory::new(64);
    let mut locations = MemoryLocationFactory::new();
    let p = vars.make("p", DynType::Pointer);
    let offset_var = vars.offset_of(p).unwrap();
    let loc = locations.make("a", MemoryLocationKind::Local);

    let mut state: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
    state.mark_allocated(loc);
    state
        .scalar_mut()
        .dynamic_write_pointer(
            p,
            offset_var,
            &PointerValue {
                uninit: Uninitialized::Init,
                nullity: Nullity::NonNull,
                points_to: PointsToSet::singleton(loc),
                offset: Interval::singleton(MachineInt::new(4, 64, Sign::Unsigned)),
            },
        )
        .unwrap();

    let mut sizes = AllocatedSizes::new();
    sizes.insert(loc, Interval::singleton(MachineInt::new(16, 64, Sign::Unsigned)));
    let options = Options::default();
    let result = check_buffer_overflow(&state, &vars, &locations, &sizes, &options, p, 4, "arr.c:3", "main");
    assert_eq!(result.outcome, Outcome::Ok);
    assert!(result.array_access);
}

/// A pointer proved null at a dereference site is flagged as an error, not
/// merely a warning, since the fact is certain rather than approximate.
#[test]
fn null_dereference_is_flagged_as_error() {
    let mut vars = VariableFactory::new(64);
    let p = vars.make("p", DynType::Pointer);
    let offset_var = vars.offset_of(p).unwrap();
    let dst = vars.make("x", DynType::Integer(32, Sign::Signed));

    let stmts = vec![
        Statement {
            kind: StatementKind::Assign { dst: offset_var, expr: LinearExpr::constant(0) },
            location: "null.c:1".into(),
        },
        Statement {
            kind: StatementKind::Load { dst, ptr: p, size: 4, sign: Sign::Signed, is_pointer: false },
            location: "null.c:2".into(),
        },
    ];
    let mut cfg = Cfg { entry: BlockId(0), blocks: Default::default() };
    cfg.blocks.insert(BlockId(0), BasicBlock { statements: stmts, successors: Vec::new() });

    let mut state: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
    state
        .scalar_mut()
        .dynamic_write_pointer(
            p,
            offset_var,
            &PointerValue {
                uninit: Uninitialized::Init,
                nullity: Nullity::Null,
                points_to: PointsToSet::empty(),
                offset: Interval::singleton(MachineInt::new(0, 64, Sign::Unsigned)),
            },
        )
        .unwrap();

    let options = Options::default();
    let mut diagnostics = Diagnostics::new();
    exec_statement(&mut state, &cfg.blocks[&BlockId(0)].statements[1], &vars, &mut ForgetAllCalls, &mut diagnostics).unwrap();
    assert!(state.is_bottom(), "dereferencing a proved-null pointer unreaches the state");

    // The checker itself, asked about the pre-state (before the load ran
    // the state into bottom), reports the defect directly.
    let pre_state = {
        let mut s: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
        s.scalar_mut()
            .dynamic_write_pointer(
                p,
                offset_var,
                &PointerValue {
                    uninit: Uninitialized::Init,
                    nullity: Nullity::Null,
                    points_to: PointsToSet::empty(),
                    offset: Interval::singleton(MachineInt::new(0, 64, Sign::Unsigned)),
                },
            )
            .unwrap();
        s
    };
    let locations = MemoryLocationFactory::new();
    let sizes = AllocatedSizes::new();
    let result = check_buffer_overflow(&pre_state, &vars, &locations, &sizes, &options, p, 4, "null.c:2", "main");
    assert_eq!(result.kind, CheckKind::NullPointerDereference);
    assert_eq!(result.outcome, Outcome::Error);
}

/// Reading through a pointer to a location already marked deallocated is a
/// use-after-free, independent of whether the offset is in the original
/// allocation's bounds.
#[test]
fn use_after_free_on_deallocated_location() {
    let mut vars = VariableFactory::new(64);
    let mut locations = MemoryLocationFactory::new();
    let p = vars.make("p", DynType::Pointer);
    let offset_var = vars.offset_of(p).unwrap();
    let loc = locations.make("h", MemoryLocationKind::DynamicAllocation);

    let mut state: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
    state.mark_allocated(loc);
    state.mark_deallocated(loc);
    state
        .scalar_mut()
        .dynamic_write_pointer(
            p,
            offset_var,
            &PointerValue {
                uninit: Uninitialized::Init,
                nullity: Nullity::NonNull,
                points_to: PointsToSet::singleton(loc),
                offset: Interval::singleton(MachineInt::new(0, 64, Sign::Unsigned)),
            },
        )
        .unwrap();

    let sizes = AllocatedSizes::new();
    let options = Options::default();
    let result = check_buffer_overflow(&state, &vars, &locations, &sizes, &options, p, 8, "free.c:9", "main");
    assert_eq!(result.kind, CheckKind::UseAfterFree);
    assert_eq!(result.outcome, Outcome::Error);
}

/// An offset derived from an unconstrained loop variable can't be bounded,
/// so the checker must warn rather than claim either safety or a proved
/// defect.
#[test]
fn symbolic_offset_from_unbounded_loop_is_a_warning() {
    let mut vars = VariableFactory::new(64);
    let mut locations = MemoryLocationFactory::new();
    let p = vars.make("p", DynType::Pointer);
    let offset_var = vars.offset_of(p).unwrap();
    let loc = locations.make("buf", MemoryLocationKind::Local);

    let mut state: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
    state.mark_allocated(loc);
    state
        .scalar_mut()
        .dynamic_write_pointer(
            p,
            offset_var,
            &PointerValue {
                uninit: Uninitialized::Init,
                nullity: Nullity::NonNull,
                points_to: PointsToSet::singleton(loc),
                offset: Interval::top_of(64, Sign::Unsigned),
            },
        )
        .unwrap();

    let mut sizes = AllocatedSizes::new();
    sizes.insert(loc, Interval::singleton(MachineInt::new(64, 64, Sign::Unsigned)));
    let options = Options::default();
    let result = check_buffer_overflow(&state, &vars, &locations, &sizes, &options, p, 4, "loop.c:20", "main");
    assert_eq!(result.outcome, Outcome::Warning);
}

/// `memcpy` preserves the byte content it copies: a value written into a
/// source cell is recoverable by reading the corresponding destination
/// cell after the copy.
#[test]
fn memcpy_preserves_cell_content() {
    let mut vars = VariableFactory::new(64);
    let mut locations = MemoryLocationFactory::new();
    let src_loc = locations.make("src", MemoryLocationKind::Local);
    let dst_loc = locations.make("dst", MemoryLocationKind::Local);
    let src = vars.make("s", DynType::Pointer);
    let dst = vars.make("d", DynType::Pointer);
    let src_off = vars.offset_of(src).unwrap();
    let dst_off = vars.offset_of(dst).unwrap();
    let len = vars.make("n", DynType::Integer(64, Sign::Unsigned));

    let mut state: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
    state.mark_allocated(src_loc);
    state.mark_allocated(dst_loc);
    state
        .scalar_mut()
        .dynamic_write_pointer(
            src,
            src_off,
            &PointerValue {
                uninit: Uninitialized::Init,
                nullity: Nullity::NonNull,
                points_to: PointsToSet::singleton(src_loc),
                offset: Interval::singleton(MachineInt::new(0, 64, Sign::Unsigned)),
            },
        )
        .unwrap();
    state
        .scalar_mut()
        .dynamic_write_pointer(
            dst,
            dst_off,
            &PointerValue {
                uninit: Uninitialized::Init,
                nullity: Nullity::NonNull,
                points_to: PointsToSet::singleton(dst_loc),
                offset: Interval::singleton(MachineInt::new(0, 64, Sign::Unsigned)),
            },
        )
        .unwrap();
    state.scalar_mut().dynamic_write_integer(len, Interval::singleton(MachineInt::new(4, 64, Sign::Unsigned))).unwrap();

    let stmt = Statement {
        kind: StatementKind::Store { ptr: src, value: len, size: 4, sign: Sign::Unsigned, is_pointer: false },
        location: "copy.c:1".into(),
    };
    let mut diagnostics = Diagnostics::new();
    // Write 4 into *src first (reusing `len`'s value as the payload).
    exec_statement(&mut state, &stmt, &vars, &mut ForgetAllCalls, &mut diagnostics).unwrap();

    let copy = Statement {
        kind: StatementKind::Memcpy { dst, src, size: len },
        location: "copy.c:2".into(),
    };
    exec_statement(&mut state, &copy, &vars, &mut ForgetAllCalls, &mut diagnostics).unwrap();

    let read_dst = vars.make("out", DynType::Integer(32, Sign::Unsigned));
    let load = Statement {
        kind: StatementKind::Load { dst: read_dst, ptr: dst, size: 4, sign: Sign::Unsigned, is_pointer: false },
        location: "copy.c:3".into(),
    };
    exec_statement(&mut state, &load, &vars, &mut ForgetAllCalls, &mut diagnostics).unwrap();

    assert_eq!(state.scalar().dynamic_read_integer(read_dst).as_singleton().unwrap().value(), 4);
}

/// An unresolved indirect call is recorded as an unsoundness diagnostic and
/// its effect is a conservative forget of the destination, not a crash.
#[test]
fn unresolved_indirect_call_forgets_destination_and_is_logged() {
    let mut vars = VariableFactory::new(64);
    let dst = vars.make("ret", DynType::Integer(32, Sign::Signed));
    let stmts = vec![Statement {
        kind: StatementKind::Call { dst: Some(dst), callee: None, args: Vec::new() },
        location: "ind.c:5".into(),
    }];
    let (post, diagnostics) = run_single_block(&vars, stmts);
    assert!(!post.is_bottom());
    assert!(!diagnostics.is_empty());
}

/// `for (i = 0; i < 10; i++) b[i] = 0;` over a 10-byte buffer: the gauge
/// domain must actually prove `i <= 10` at the loop head through a real
/// fixpoint run (not a hand-built top state), and the off-by-one access at
/// that proved bound must come back as a genuine, provable error.
#[test]
fn gauge_domain_proves_loop_bound_and_catches_off_by_one_access() {
    let mut vars = VariableFactory::new(64);
    let counter = vars.make("i", DynType::Integer(64, Sign::Signed));
    let cond = vars.make("cond", DynType::Integer(1, Sign::Unsigned));

    let mut cfg = Cfg { entry: BlockId(0), blocks: Default::default() };
    cfg.blocks.insert(
        BlockId(0),
        BasicBlock {
            statements: vec![Statement {
                kind: StatementKind::Assign { dst: counter, expr: LinearExpr::constant(0) },
                location: "init".into(),
            }],
            successors: vec![BlockId(1)],
        },
    );
    cfg.blocks.insert(
        BlockId(1),
        BasicBlock {
            statements: vec![
                Statement {
                    kind: StatementKind::Compare { dst: cond, lhs: Operand::Var(counter), rhs: Operand::Const(10), strict: true },
                    location: "cmp".into(),
                },
                Statement {
                    kind: StatementKind::Arith { op: ApplyOp::Add, dst: counter, lhs: Operand::Var(counter), rhs: Operand::Const(1) },
                    location: "incr".into(),
                },
            ],
            successors: vec![BlockId(1), BlockId(2)],
        },
    );
    cfg.blocks.insert(BlockId(2), BasicBlock::default());

    let options = Options::default();
    let mut engine: FixpointEngine<GaugeDomain> = FixpointEngine::new(&cfg, &vars, &options);
    let mut diagnostics = Diagnostics::new();
    let invariants = engine.run(MemoryDomain::top(1000), &mut ForgetAllCalls, &mut diagnostics).unwrap();

    let head = invariants.get(&BlockId(1)).expect("loop head is reached by the fixpoint");
    let bound = head.scalar().numerical().to_interval(counter);
    assert!(
        bound.hi_value().is_some_and(|hi| hi <= 10),
        "gauge domain should prove i is bounded by the loop's own threshold, got {bound:?}"
    );

    // Refine the proved state to the witness iteration `i == 10` and check
    // the one-past-the-end write the loop condition (`i <= 10`) admits.
    let mut locations = MemoryLocationFactory::new();
    let p = vars.make("p", DynType::Pointer);
    let offset_var = vars.offset_of(p).unwrap();
    let loc = locations.make("b", MemoryLocationKind::Local);

    let mut state = head.clone();
    state.mark_allocated(loc);
    state.scalar_mut().numerical_mut().refine(counter, Interval::singleton(MachineInt::new(10, 64, Sign::Signed)));
    state
        .scalar_mut()
        .dynamic_write_pointer(
            p,
            offset_var,
            &PointerValue {
                uninit: Uninitialized::Init,
                nullity: Nullity::NonNull,
                points_to: PointsToSet::singleton(loc),
                offset: Interval::singleton(MachineInt::new(10, 64, Sign::Signed)),
            },
        )
        .unwrap();

    let mut sizes = AllocatedSizes::new();
    sizes.insert(loc, Interval::singleton(MachineInt::new(10, 64, Sign::Unsigned)));
    let result = check_buffer_overflow(&state, &vars, &locations, &sizes, &options, p, 1, "loop.c:5", "main");
    assert_eq!(result.kind, CheckKind::BufferOverflow);
    assert_eq!(result.outcome, Outcome::Error);
}
