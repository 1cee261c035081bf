//! Benchmarks the widening/narrowing sequence over a single-loop CFG, the
//! dominant cost of analyzing any function with a counted loop.

use absint_core::cfg::{BasicBlock, BlockId, Cfg, Operand, Statement, StatementKind};
use absint_core::config::Options;
use absint_core::diagnostics::Diagnostics;
use absint_core::domain::interval_domain::IntervalDomain;
use absint_core::domain::memory::MemoryDomain;
use absint_core::domain::ApplyOp;
use absint_core::exec::ForgetAllCalls;
use absint_core::fixpoint::FixpointEngine;
use absint_core::variable::{DynType, VariableFactory};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn counted_loop_cfg(vars: &mut VariableFactory, bound: i128) -> Cfg {
    let counter = vars.make("i", DynType::Integer(64, absint_core::num::Sign::Signed));
    let cond = vars.make("cond", DynType::Integer(1, absint_core::num::Sign::Unsigned));
    let mut cfg = Cfg { entry: BlockId(0), blocks: Default::default() };
    cfg.blocks.insert(
        BlockId(0),
        BasicBlock {
            statements: vec![Statement {
                kind: StatementKind::Assign { dst: counter, expr: absint_core::domain::LinearExpr::constant(0) },
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
                    kind: StatementKind::Compare { dst: cond, lhs: Operand::Var(counter), rhs: Operand::Const(bound), strict: true },
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
    cfg
}

fn bench_fixpoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixpoint_counted_loop");
    for bound in [10i128, 1_000, 1_000_000] {
        group.bench_with_input(BenchmarkId::from_parameter(bound), &bound, |b, &bound| {
            b.iter(|| {
                let mut vars = VariableFactory::new(64);
                let cfg = counted_loop_cfg(&mut vars, bound);
                let options = Options::default();
                let mut engine: FixpointEngine<IntervalDomain> = FixpointEngine::new(&cfg, &vars, &options);
                let mut diagnostics = Diagnostics::new();
                engine
                    .run(MemoryDomain::top(1000), &mut ForgetAllCalls, &mut diagnostics)
                    .unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fixpoint);
criterion_main!(benches);
