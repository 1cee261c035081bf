//! The weak-topological-ordering fixpoint iterator (§4.H): stabilizes
//! every strongly-connected component of a [`Cfg`] with widening, then
//! refines with narrowing, computing a pre-state for every block.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::cfg::{BlockId, Cfg, Operand, StatementKind};
use crate::config::Options;
use crate::diagnostics::Diagnostics;
use crate::domain::memory::MemoryDomain;
use crate::domain::{ApplyOp, NumericalDomain};
use crate::error::AnalyzerError;
use crate::exec::{exec_statement, CallHandler};
use crate::variable::{VarId, VariableFactory};

/// One element of a weak topological ordering: either a single block, or
/// a nested component headed by a block with at least one back edge from
/// within the component.
#[derive(Debug, Clone, PartialEq)]
pub enum WtoElement {
    /// A block outside any loop (relative to this nesting level).
    Vertex(BlockId),
    /// A loop: `head` is stabilized first each iteration, then `body` is
    /// processed, then control returns to `head` until it stabilizes.
    Component(BlockId, Vec<WtoElement>),
}

/// Bourdoncle's recursive WTO construction over `cfg`, rooted at
/// `cfg.entry`.
pub fn build_wto(cfg: &Cfg) -> Vec<WtoElement> {
    let mut builder = WtoBuilder {
        cfg,
        num: BTreeMap::new(),
        stack: Vec::new(),
        next_num: 1,
    };
    let mut partition = Vec::new();
    builder.visit(cfg.entry, &mut partition);
    partition
}

struct WtoBuilder<'a> {
    cfg: &'a Cfg,
    num: BTreeMap<BlockId, i64>,
    stack: Vec<BlockId>,
    next_num: i64,
}

impl<'a> WtoBuilder<'a> {
    fn successors(&self, b: BlockId) -> &[BlockId] {
        self.cfg.blocks.get(&b).map(|blk| blk.successors.as_slice()).unwrap_or(&[])
    }

    fn component_of(&mut self, v: BlockId, partition: &mut Vec<WtoElement>) {
        for i in 0..self.successors(v).len() {
            let succ = self.successors(v)[i];
            if !self.num.contains_key(&succ) {
                self.visit(succ, partition);
            }
        }
    }

    fn visit(&mut self, v: BlockId, partition: &mut Vec<WtoElement>) -> i64 {
        self.stack.push(v);
        let head = self.next_num;
        self.next_num += 1;
        self.num.insert(v, head);
        let mut min = head;
        let mut loop_v = false;
        for i in 0..self.successors(v).len() {
            let succ = self.successors(v)[i];
            let min_succ = match self.num.get(&succ) {
                None => self.visit(succ, partition),
                Some(&n) if n == i64::MAX => continue,
                Some(&n) => n,
            };
            if min_succ <= min {
                min = min_succ;
                loop_v = true;
            }
        }
        if min == head {
            self.num.insert(v, i64::MAX);
            let mut w = self.stack.pop().expect("v is on the stack");
            if loop_v {
                while w != v {
                    self.num.insert(w, 0);
                    w = self.stack.pop().expect("component members remain on the stack");
                }
                let mut body = Vec::new();
                self.component_of(v, &mut body);
                partition.insert(0, WtoElement::Component(v, body));
            } else {
                partition.insert(0, WtoElement::Vertex(v));
            }
        }
        min
    }
}

fn execute_block<N: NumericalDomain>(
    cfg: &Cfg,
    block: BlockId,
    mut state: MemoryDomain<N>,
    vars: &VariableFactory,
    calls: &mut dyn CallHandler<N>,
    diagnostics: &mut Diagnostics,
) -> Result<MemoryDomain<N>, AnalyzerError> {
    let Some(bb) = cfg.blocks.get(&block) else {
        return Ok(state);
    };
    for stmt in &bb.statements {
        exec_statement(&mut state, stmt, vars, calls, diagnostics)?;
        if state.is_bottom() {
            break;
        }
    }
    Ok(state)
}

/// Comparison constants appearing in a block's `Compare` statements,
/// used as widening thresholds for any loop counter compared against
/// them (§4.H "propagates `k` in widening thresholds").
fn thresholds_in_block(cfg: &Cfg, block: BlockId) -> Vec<i128> {
    let mut out = Vec::new();
    if let Some(bb) = cfg.blocks.get(&block) {
        for stmt in &bb.statements {
            if let StatementKind::Compare { lhs, rhs, .. } = &stmt.kind {
                for operand in [lhs, rhs] {
                    if let Operand::Const(c) = operand {
                        out.push(*c);
                    }
                }
            }
        }
    }
    out
}

/// Variables a loop head self-increments by a positive constant (`i := i +
/// c`, `c > 0`), the pattern that makes a variable a sound candidate for
/// gauge-domain loop-counter promotion (§4.C `mark_counter`/`incr_counter`).
fn counter_candidates(cfg: &Cfg, head: BlockId) -> Vec<VarId> {
    let mut out = Vec::new();
    if let Some(bb) = cfg.blocks.get(&head) {
        for stmt in &bb.statements {
            if let StatementKind::Arith { op: ApplyOp::Add, dst, lhs: Operand::Var(v), rhs: Operand::Const(c) } = &stmt.kind
            {
                if v == dst && *c > 0 {
                    out.push(*dst);
                }
            }
        }
    }
    out
}

/// Per-block invariants computed by one fixpoint run: the abstract value
/// true on entry to each block.
pub type Invariants<N> = BTreeMap<BlockId, MemoryDomain<N>>;

/// Drives the WTO-ordered widening/narrowing sequence over `cfg`,
/// starting `entry_state` at `cfg.entry`.
pub struct FixpointEngine<'a, N> {
    cfg: &'a Cfg,
    vars: &'a VariableFactory,
    options: &'a Options,
    pre: Invariants<N>,
    post: Invariants<N>,
}

const NARROWING_ITERATION_CAP: u32 = 100;

impl<'a, N: NumericalDomain> FixpointEngine<'a, N> {
    /// A fresh engine over `cfg`.
    pub fn new(cfg: &'a Cfg, vars: &'a VariableFactory, options: &'a Options) -> Self {
        Self {
            cfg,
            vars,
            options,
            pre: BTreeMap::new(),
            post: BTreeMap::new(),
        }
    }

    fn post_of(&self, b: BlockId) -> MemoryDomain<N> {
        self.post.get(&b).cloned().unwrap_or_else(MemoryDomain::bottom)
    }

    /// The post-state computed for every block, once [`Self::run`] has
    /// completed (used by [`crate::summary`] to read a function's return
    /// state off whichever blocks end in a `Return`).
    pub fn post_states(&self) -> &Invariants<N> {
        &self.post
    }

    fn join_predecessors(&self, b: BlockId, entry_state: &MemoryDomain<N>) -> MemoryDomain<N> {
        let mut acc = if b == self.cfg.entry {
            entry_state.clone()
        } else {
            MemoryDomain::bottom()
        };
        if let Some(preds) = self.cfg.predecessors().get(&b) {
            for &p in preds {
                acc = acc.join(&self.post_of(p));
            }
        }
        acc
    }

    /// Run the fixpoint to completion, returning the computed pre-state
    /// invariants.
    pub fn run(
        &mut self,
        entry_state: MemoryDomain<N>,
        calls: &mut dyn CallHandler<N>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Invariants<N>, AnalyzerError> {
        let wto = build_wto(self.cfg);
        self.process(&wto, &entry_state, calls, diagnostics)?;
        Ok(self.pre.clone())
    }

    fn process(
        &mut self,
        elements: &[WtoElement],
        entry_state: &MemoryDomain<N>,
        calls: &mut dyn CallHandler<N>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), AnalyzerError> {
        for el in elements {
            match el {
                WtoElement::Vertex(b) => self.stabilize_vertex(*b, entry_state, calls, diagnostics)?,
                WtoElement::Component(head, body) => {
                    self.stabilize_component(*head, body, entry_state, calls, diagnostics)?
                }
            }
        }
        Ok(())
    }

    fn stabilize_vertex(
        &mut self,
        b: BlockId,
        entry_state: &MemoryDomain<N>,
        calls: &mut dyn CallHandler<N>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), AnalyzerError> {
        let pre = self.join_predecessors(b, entry_state);
        let post = execute_block(self.cfg, b, pre.clone(), self.vars, calls, diagnostics)?;
        self.pre.insert(b, pre);
        self.post.insert(b, post);
        Ok(())
    }

    fn stabilize_component(
        &mut self,
        head: BlockId,
        body: &[WtoElement],
        entry_state: &MemoryDomain<N>,
        calls: &mut dyn CallHandler<N>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), AnalyzerError> {
        tracing::debug!(?head, "entering loop component");
        let thresholds = thresholds_in_block(self.cfg, head);
        let counters = counter_candidates(self.cfg, head);
        let mut iteration = 0u32;
        loop {
            let candidate = self.join_predecessors(head, entry_state);
            let mut widened = if iteration == 0 {
                candidate
            } else if iteration < self.options.widening_delay {
                self.pre.get(&head).cloned().unwrap_or_else(MemoryDomain::bottom).join(&candidate)
            } else {
                let mut prior = self.pre.get(&head).cloned().unwrap_or_else(MemoryDomain::bottom);
                for &x in &counters {
                    if let Some(v) = candidate.scalar().numerical().to_interval(x).hi_value() {
                        prior.scalar_mut().numerical_mut().mark_loop_iteration(x, v);
                    }
                }
                if thresholds.is_empty() {
                    prior.widen(&candidate)
                } else {
                    prior.widen_to_threshold(&candidate, &thresholds)
                }
            };
            if iteration == 0 {
                for &x in &counters {
                    widened.scalar_mut().numerical_mut().mark_counter(x);
                }
            }
            let stabilized = iteration > 0 && widened.leq(self.pre.get(&head).expect("set on iteration 0"));
            let post = execute_block(self.cfg, head, widened.clone(), self.vars, calls, diagnostics)?;
            self.pre.insert(head, widened);
            self.post.insert(head, post);
            self.process(body, entry_state, calls, diagnostics)?;
            iteration += 1;
            if stabilized {
                break;
            }
        }
        tracing::debug!(?head, iterations = iteration, "loop head stabilized by widening");
        self.narrow_component(head, body, entry_state, calls, diagnostics)?;
        Ok(())
    }

    fn narrow_component(
        &mut self,
        head: BlockId,
        body: &[WtoElement],
        entry_state: &MemoryDomain<N>,
        calls: &mut dyn CallHandler<N>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), AnalyzerError> {
        let mut iteration = 0u32;
        loop {
            let candidate = self.join_predecessors(head, entry_state);
            let prior = self.pre.get(&head).cloned().unwrap_or_else(MemoryDomain::bottom);
            let narrowed = prior.narrow(&candidate);
            let converged = narrowed.leq(&prior) && prior.leq(&narrowed);
            let post = execute_block(self.cfg, head, narrowed.clone(), self.vars, calls, diagnostics)?;
            self.pre.insert(head, narrowed);
            self.post.insert(head, post);
            self.process(body, entry_state, calls, diagnostics)?;
            iteration += 1;
            if converged {
                break;
            }
            if iteration >= NARROWING_ITERATION_CAP {
                diagnostics.push(crate::diagnostics::Diagnostic {
                    kind: crate::diagnostics::DiagnosticKind::NarrowingCutShort,
                    context: "fixpoint::narrow_component".into(),
                    site: alloc::format!("{head:?}"),
                });
                break;
            }
        }
        Ok(())
    }
}
