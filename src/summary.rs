//! Interprocedural summarization (§4.I): bottom-up numerical, pointer, and
//! value summary passes driven by the call graph's SCCs in reverse
//! topological order, followed by a top-down checker pass that replays
//! each function's statements against its summarized callees.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::vec::Vec;

use crate::callgraph::strongly_connected_components;
use crate::cfg::{Cfg, Function, FunctionId, StatementKind};
use crate::check::{check_buffer_overflow, AllocatedSizes, CheckResult};
use crate::config::Options;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::domain::memory::MemoryDomain;
use crate::domain::NumericalDomain;
use crate::error::AnalyzerError;
use crate::exec::{exec_statement, CallHandler};
use crate::fixpoint::{FixpointEngine, Invariants};
use crate::lattice::points_to::PointsToSet;
use crate::lattice::Lattice;
use crate::variable::{MemoryLocationFactory, MemoryLocationId, VarId, VariableFactory};

/// A function's summarized effect (§4.I): the entry state it was analyzed
/// under, and the state reachable at its `Return` statements, joined.
#[derive(Debug, Clone)]
pub struct FunctionSummary<N> {
    /// Formal parameters, in declaration order.
    pub params: Vec<VarId>,
    /// The (unconstrained) state the function was analyzed from.
    pub entry_state: MemoryDomain<N>,
    /// The function's return variable, if non-void.
    pub return_var: Option<VarId>,
    /// Join of the post-state at every block ending in a `Return`.
    pub return_state: MemoryDomain<N>,
}

fn return_state_of<N: NumericalDomain>(cfg: &Cfg, post: &Invariants<N>) -> MemoryDomain<N> {
    let mut acc: MemoryDomain<N> = MemoryDomain::bottom();
    for (id, block) in &cfg.blocks {
        if block.statements.iter().any(|s| matches!(s.kind, StatementKind::Return { .. })) {
            if let Some(p) = post.get(id) {
                acc = acc.join(p);
            }
        }
    }
    acc
}

/// Resolves calls against an already-summarized call graph (§4.I "at a
/// call site whose callee is already summarized, materialize the return
/// state by matching formals to actuals").
///
/// Matching is done by [`crate::domain::NumericalDomain::refine`]ing the
/// callee's return-state formals with the caller's actual-argument
/// intervals, rather than true variable substitution: sound, but only as
/// precise as `refine` is for the concrete domain in play (exact for the
/// common case where a parameter flows unchanged to the return value, a
/// no-op under a non-relational domain like plain intervals otherwise).
/// Every argument is also forgotten in the caller's state afterward, since
/// heap effects of the call are not composed across the caller/callee's
/// disjoint cell universes (see `DESIGN.md`, Open Question ii).
pub struct SummaryCallHandler<'a, N> {
    summaries: &'a BTreeMap<FunctionId, FunctionSummary<N>>,
    in_progress: &'a BTreeSet<FunctionId>,
}

impl<'a, N> SummaryCallHandler<'a, N> {
    /// A handler over the summaries computed so far, treating every
    /// callee in `in_progress` (its own SCC, not yet summarized) as an
    /// unresolved cycle.
    pub fn new(summaries: &'a BTreeMap<FunctionId, FunctionSummary<N>>, in_progress: &'a BTreeSet<FunctionId>) -> Self {
        Self { summaries, in_progress }
    }
}

impl<'a, N: NumericalDomain> CallHandler<N> for SummaryCallHandler<'a, N> {
    fn exec_call(
        &mut self,
        state: &mut MemoryDomain<N>,
        dst: Option<VarId>,
        callee: Option<FunctionId>,
        args: &[VarId],
        diagnostics: &mut Diagnostics,
    ) -> Result<(), AnalyzerError> {
        let Some(callee) = callee else {
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::UnresolvedIndirectCall,
                context: "summary::exec_call".into(),
                site: "<unknown>".into(),
            });
            forget_all(state, dst, args);
            return Ok(());
        };
        if self.in_progress.contains(&callee) {
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::RecursionCycleForgotten,
                context: "summary::exec_call".into(),
                site: format!("{callee:?}"),
            });
            forget_all(state, dst, args);
            return Ok(());
        }
        let Some(summary) = self.summaries.get(&callee) else {
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::UnmodeledExternalCall,
                context: "summary::exec_call".into(),
                site: format!("{callee:?}"),
            });
            forget_all(state, dst, args);
            return Ok(());
        };
        let mut return_state = summary.return_state.clone();
        for (&formal, &actual) in summary.params.iter().zip(args.iter()) {
            let actual_iv = state.scalar().dynamic_read_integer(actual);
            return_state.scalar_mut().numerical_mut().refine(formal, actual_iv);
        }
        if let Some(dst) = dst {
            match summary.return_var {
                Some(rv) if !return_state.is_bottom() => {
                    let result = return_state.scalar().dynamic_read_integer(rv);
                    state.scalar_mut().dynamic_write_integer(dst, result)?;
                }
                _ => state.scalar_mut().forget(dst),
            }
        }
        for &arg in args {
            state.scalar_mut().forget(arg);
        }
        Ok(())
    }
}

fn forget_all<N: NumericalDomain>(state: &mut MemoryDomain<N>, dst: Option<VarId>, args: &[VarId]) {
    if let Some(dst) = dst {
        state.scalar_mut().forget(dst);
    }
    for &arg in args {
        state.scalar_mut().forget(arg);
    }
}

/// Bottom-up numerical summarization (§4.I, first pass): one
/// [`FunctionSummary`] per function, computed in the call graph's SCCs,
/// reverse-topological order so every non-recursive callee is already
/// summarized by the time its caller is analyzed.
pub struct NumericalSummaryPass<'a> {
    vars: &'a VariableFactory,
    options: &'a Options,
}

impl<'a> NumericalSummaryPass<'a> {
    /// A pass over a variable factory and the run's configuration.
    pub fn new(vars: &'a VariableFactory, options: &'a Options) -> Self {
        Self { vars, options }
    }

    /// Summarize every function in `functions`.
    pub fn run<N: NumericalDomain>(
        &self,
        functions: &[Function],
        diagnostics: &mut Diagnostics,
    ) -> Result<BTreeMap<FunctionId, FunctionSummary<N>>, AnalyzerError> {
        let by_id: BTreeMap<FunctionId, &Function> = functions.iter().map(|f| (f.id, f)).collect();
        let sccs = strongly_connected_components(functions);
        let mut summaries: BTreeMap<FunctionId, FunctionSummary<N>> = BTreeMap::new();
        for scc in &sccs {
            let in_progress: BTreeSet<FunctionId> = scc.iter().copied().collect();
            for &id in scc {
                let Some(f) = by_id.get(&id) else { continue };
                let entry_state: MemoryDomain<N> = MemoryDomain::top(self.vars.len() as u32 + 1000);
                let mut handler = SummaryCallHandler::new(&summaries, &in_progress);
                let mut engine: FixpointEngine<N> = FixpointEngine::new(&f.cfg, self.vars, self.options);
                engine.run(entry_state.clone(), &mut handler, diagnostics)?;
                let return_state = return_state_of(&f.cfg, engine.post_states());
                summaries.insert(
                    id,
                    FunctionSummary {
                        params: f.params.clone(),
                        entry_state,
                        return_var: f.return_var,
                        return_state,
                    },
                );
            }
        }
        Ok(summaries)
    }
}

/// A simplified flow-insensitive Andersen-style points-to solver (§4.I,
/// second pass), ignoring calling context: every `Alloca` seeds a base
/// constraint, every pointer-typed `Load`/`Store` seeds a copy edge
/// between a variable and the heap cell(s) its pointer currently names.
/// The full spec calls for per-call-site contexts joined across callers
/// and reset to `⊤` within a recursive SCC; this worklist instead treats
/// the whole program as one flat constraint graph, a standard and sound
/// (if less precise) simplification of Andersen's analysis.
pub struct PointerSummaryPass;

impl PointerSummaryPass {
    /// Solve points-to constraints over every function in `functions`,
    /// returning the points-to set finally assigned to each pointer
    /// variable seen.
    pub fn run(functions: &[Function]) -> BTreeMap<VarId, PointsToSet> {
        let mut var_pts: BTreeMap<VarId, PointsToSet> = BTreeMap::new();
        let mut heap_pts: BTreeMap<MemoryLocationId, PointsToSet> = BTreeMap::new();
        loop {
            let mut changed = false;
            for f in functions {
                for block in f.cfg.blocks.values() {
                    for stmt in &block.statements {
                        match &stmt.kind {
                            StatementKind::Alloca { dst, location, .. } => {
                                changed |= merge_var(&mut var_pts, *dst, PointsToSet::singleton(*location));
                            }
                            StatementKind::Load { dst, ptr, is_pointer: true, .. } => {
                                let ptr_pts = var_pts.get(ptr).cloned().unwrap_or_default();
                                let loaded = match ptr_pts.locations() {
                                    Some(locs) => locs.iter().fold(PointsToSet::empty(), |acc, loc| {
                                        acc.join(&heap_pts.get(loc).cloned().unwrap_or_default())
                                    }),
                                    None => PointsToSet::top(),
                                };
                                changed |= merge_var(&mut var_pts, *dst, loaded);
                            }
                            StatementKind::Store { ptr, value, is_pointer: true, .. } => {
                                let ptr_pts = var_pts.get(ptr).cloned().unwrap_or_default();
                                let value_pts = var_pts.get(value).cloned().unwrap_or_default();
                                if let Some(locs) = ptr_pts.locations() {
                                    for &loc in locs {
                                        changed |= merge_loc(&mut heap_pts, loc, value_pts.clone());
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
        var_pts
    }
}

fn merge_var(map: &mut BTreeMap<VarId, PointsToSet>, var: VarId, add: PointsToSet) -> bool {
    let entry = map.entry(var).or_insert_with(PointsToSet::empty);
    let joined = entry.join(&add);
    if joined != *entry {
        *entry = joined;
        true
    } else {
        false
    }
}

fn merge_loc(map: &mut BTreeMap<MemoryLocationId, PointsToSet>, loc: MemoryLocationId, add: PointsToSet) -> bool {
    let entry = map.entry(loc).or_insert_with(PointsToSet::empty);
    let joined = entry.join(&add);
    if joined != *entry {
        *entry = joined;
        true
    } else {
        false
    }
}

/// A value summary pass (§4.I, third pass): in the original design,
/// summaries are composed rather than conjoined, reusing the disjoint
/// cell universe of each call rather than just the scalar numerical
/// state. That composition step needs a cell-level effect algebra this
/// crate's [`crate::domain::memory::MemoryDomain`] doesn't expose
/// generically, so this reuses [`NumericalSummaryPass`] as-is (Open
/// Question ii): scalar precision is preserved across calls; heap-cell
/// effects are still forgotten at each call site.
pub struct ValueSummaryPass<'a> {
    inner: NumericalSummaryPass<'a>,
}

impl<'a> ValueSummaryPass<'a> {
    /// A pass delegating entirely to [`NumericalSummaryPass`].
    pub fn new(vars: &'a VariableFactory, options: &'a Options) -> Self {
        Self { inner: NumericalSummaryPass::new(vars, options) }
    }

    /// Summarize every function in `functions`.
    pub fn run<N: NumericalDomain>(
        &self,
        functions: &[Function],
        diagnostics: &mut Diagnostics,
    ) -> Result<BTreeMap<FunctionId, FunctionSummary<N>>, AnalyzerError> {
        self.inner.run(functions, diagnostics)
    }
}

/// The top-down checker pass (§4.I, fourth pass): re-analyzes each
/// function against the already-computed summaries, running the buffer
/// overflow checker at every `Load`/`Store`. Per-call-site contexts are
/// not retained past summarization, so every function (entry point or
/// not) is checked once from `⊤`; `Options::merge_call_contexts` is
/// honored implicitly since there is only ever the one joined context.
pub struct CheckerPass<'a, N> {
    vars: &'a VariableFactory,
    locations: &'a MemoryLocationFactory,
    options: &'a Options,
    allocated_sizes: &'a AllocatedSizes,
    summaries: &'a BTreeMap<FunctionId, FunctionSummary<N>>,
}

impl<'a, N: NumericalDomain> CheckerPass<'a, N> {
    /// A checker pass over a fully summarized call graph.
    pub fn new(
        vars: &'a VariableFactory,
        locations: &'a MemoryLocationFactory,
        options: &'a Options,
        allocated_sizes: &'a AllocatedSizes,
        summaries: &'a BTreeMap<FunctionId, FunctionSummary<N>>,
    ) -> Self {
        Self { vars, locations, options, allocated_sizes, summaries }
    }

    /// Run every memory-access check over every function.
    pub fn run(&self, functions: &[Function], diagnostics: &mut Diagnostics) -> Result<Vec<CheckResult>, AnalyzerError> {
        let mut results = Vec::new();
        let empty = BTreeSet::new();
        for f in functions {
            let mut handler = SummaryCallHandler::new(self.summaries, &empty);
            let mut engine: FixpointEngine<N> = FixpointEngine::new(&f.cfg, self.vars, self.options);
            let entry_state: MemoryDomain<N> = MemoryDomain::top(self.vars.len() as u32 + 1000);
            let pre = engine.run(entry_state, &mut handler, diagnostics)?;
            for (block_id, block) in &f.cfg.blocks {
                let Some(mut state) = pre.get(block_id).cloned() else { continue };
                for stmt in &block.statements {
                    let context = format!("{:?}", f.id);
                    match &stmt.kind {
                        StatementKind::Load { ptr, size, .. } => {
                            results.push(check_buffer_overflow(
                                &state,
                                self.vars,
                                self.locations,
                                self.allocated_sizes,
                                self.options,
                                *ptr,
                                *size,
                                &stmt.location,
                                &context,
                            ));
                        }
                        StatementKind::Store { ptr, size, .. } => {
                            results.push(check_buffer_overflow(
                                &state,
                                self.vars,
                                self.locations,
                                self.allocated_sizes,
                                self.options,
                                *ptr,
                                *size,
                                &stmt.location,
                                &context,
                            ));
                        }
                        _ => {}
                    }
                    exec_statement(&mut state, stmt, self.vars, &mut handler, diagnostics)?;
                    if state.is_bottom() {
                        break;
                    }
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{BasicBlock, BlockId, Statement};
    use crate::check::{collect_allocated_sizes, CheckKind, Outcome};
    use crate::domain::interval_domain::IntervalDomain;
    use crate::domain::LinearExpr;
    use crate::num::Sign;
    use crate::variable::{DynType, MemoryLocationKind};
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn call_site_specializes_identity_summary() {
        let mut vars = VariableFactory::new(64);
        let p = vars.make("p", DynType::Integer(64, Sign::Signed));
        let arg = vars.make("arg", DynType::Integer(64, Sign::Signed));
        let z = vars.make("z", DynType::Integer(64, Sign::Signed));

        let mut callee_blocks = BTreeMap::new();
        callee_blocks.insert(
            BlockId(0),
            BasicBlock {
                statements: vec![Statement { kind: StatementKind::Return { value: Some(p) }, location: "callee:1".to_string() }],
                successors: Vec::new(),
            },
        );
        let callee = Function {
            id: FunctionId(0),
            name: "callee".to_string(),
            params: vec![p],
            return_var: Some(p),
            cfg: Cfg { entry: BlockId(0), blocks: callee_blocks },
            callees: Vec::new(),
        };

        let mut caller_blocks = BTreeMap::new();
        caller_blocks.insert(
            BlockId(0),
            BasicBlock {
                statements: vec![
                    Statement { kind: StatementKind::Assign { dst: arg, expr: LinearExpr::constant(3) }, location: "caller:1".to_string() },
                    Statement {
                        kind: StatementKind::Call { dst: Some(z), callee: Some(FunctionId(0)), args: vec![arg] },
                        location: "caller:2".to_string(),
                    },
                    Statement { kind: StatementKind::Return { value: Some(z) }, location: "caller:3".to_string() },
                ],
                successors: Vec::new(),
            },
        );
        let caller = Function {
            id: FunctionId(1),
            name: "caller".to_string(),
            params: Vec::new(),
            return_var: Some(z),
            cfg: Cfg { entry: BlockId(0), blocks: caller_blocks },
            callees: vec![FunctionId(0)],
        };

        let options = Options::default();
        let pass = NumericalSummaryPass::new(&vars, &options);
        let mut diagnostics = Diagnostics::new();
        let summaries: BTreeMap<FunctionId, FunctionSummary<IntervalDomain>> =
            pass.run(&[callee, caller], &mut diagnostics).unwrap();
        let caller_summary = &summaries[&FunctionId(1)];
        let z_value = caller_summary.return_state.scalar().dynamic_read_integer(z);
        assert_eq!(z_value.as_singleton().unwrap().value(), 3);
    }

    #[test]
    fn pointer_summary_propagates_through_store_and_load() {
        let mut vars = VariableFactory::new(64);
        let mut locations = MemoryLocationFactory::new();
        let p = vars.make("p", DynType::Pointer);
        let q = vars.make("q", DynType::Pointer);
        let out = vars.make("out", DynType::Pointer);
        let loc_a = locations.make("a", MemoryLocationKind::Local);
        let loc_b = locations.make("b", MemoryLocationKind::Local);

        let mut blocks = BTreeMap::new();
        blocks.insert(
            BlockId(0),
            BasicBlock {
                statements: vec![
                    Statement { kind: StatementKind::Alloca { dst: p, location: loc_a, size: 8 }, location: "f:1".to_string() },
                    Statement { kind: StatementKind::Alloca { dst: q, location: loc_b, size: 8 }, location: "f:2".to_string() },
                    Statement {
                        kind: StatementKind::Store { ptr: p, value: q, size: 8, sign: Sign::Unsigned, is_pointer: true },
                        location: "f:3".to_string(),
                    },
                    Statement {
                        kind: StatementKind::Load { dst: out, ptr: p, size: 8, sign: Sign::Unsigned, is_pointer: true },
                        location: "f:4".to_string(),
                    },
                ],
                successors: Vec::new(),
            },
        );
        let f = Function {
            id: FunctionId(0),
            name: "f".to_string(),
            params: Vec::new(),
            return_var: None,
            cfg: Cfg { entry: BlockId(0), blocks },
            callees: Vec::new(),
        };

        let result = PointerSummaryPass::run(&[f]);
        let out_pts = result.get(&out).cloned().unwrap_or_default();
        assert!(out_pts.may_point_to(loc_b));
    }

    #[test]
    fn checker_pass_flags_out_of_bounds_store() {
        let mut vars = VariableFactory::new(64);
        let mut locations = MemoryLocationFactory::new();
        let p = vars.make("p", DynType::Pointer);
        let offset_var = vars.offset_of(p).unwrap();
        let val = vars.make("val", DynType::Integer(32, Sign::Signed));
        let loc = locations.make("buf", MemoryLocationKind::Local);

        let mut blocks = BTreeMap::new();
        blocks.insert(
            BlockId(0),
            BasicBlock {
                statements: vec![
                    Statement { kind: StatementKind::Alloca { dst: p, location: loc, size: 4 }, location: "g:1".to_string() },
                    Statement {
                        kind: StatementKind::Assign { dst: offset_var, expr: LinearExpr::constant(10) },
                        location: "g:2".to_string(),
                    },
                    Statement {
                        kind: StatementKind::Store { ptr: p, value: val, size: 4, sign: Sign::Signed, is_pointer: false },
                        location: "g:3".to_string(),
                    },
                ],
                successors: Vec::new(),
            },
        );
        let f = Function {
            id: FunctionId(0),
            name: "g".to_string(),
            params: Vec::new(),
            return_var: None,
            cfg: Cfg { entry: BlockId(0), blocks },
            callees: Vec::new(),
        };

        let options = Options::default();
        let allocated_sizes = collect_allocated_sizes(core::slice::from_ref(&f));
        let summaries: BTreeMap<FunctionId, FunctionSummary<IntervalDomain>> = BTreeMap::new();
        let pass = CheckerPass::new(&vars, &locations, &options, &allocated_sizes, &summaries);
        let mut diagnostics = Diagnostics::new();
        let results = pass.run(&[f], &mut diagnostics).unwrap();
        let store_check = results.iter().find(|r| r.site == "g:3").expect("store check recorded");
        assert_eq!(store_check.kind, CheckKind::BufferOverflow);
        assert_eq!(store_check.outcome, Outcome::Error);
    }
}
