//! A minimal typed stand-in for the AR intermediate representation (§6
//! "the core never parses source; it sees only a typed CFG"). The real
//! front end is out of scope; this module gives the executor and
//! fixpoint iterator something concrete to walk.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::domain::{ApplyOp, LinearExpr};
use crate::num::Sign;
use crate::variable::{MemoryLocationId, VarId};

/// A stable index of a [`BasicBlock`] within a [`Cfg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

/// A stable index of a [`Function`] within a call graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub u32);

/// An operand to a statement: a variable, or an immediate constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Reads the current abstract value of a variable.
    Var(VarId),
    /// An immediate integer constant.
    Const(i128),
}

/// The set of AR statement kinds the executor dispatches on (§4.G). The
/// front end (out of scope) lowers to these; intrinsics/vararg/exception
/// control-flow statements the spec lists alongside them (`va_*`,
/// landing-pad, resume) are represented as [`StatementKind::Call`] with a
/// reserved callee name, consistent with how the rest of the pipeline
/// already treats external calls.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `dst = lhs op rhs`.
    Arith { op: ApplyOp, dst: VarId, lhs: Operand, rhs: Operand },
    /// `dst = lhs <cmp> rhs`; `strict` is true for `<`, false for `<=`.
    Compare { dst: VarId, lhs: Operand, rhs: Operand, strict: bool },
    /// `dst = e`, a direct linear assignment (covers bitwise/conversion
    /// statements once lowered to linear form by the front end).
    Assign { dst: VarId, expr: LinearExpr },
    /// Stack allocation of `size` bytes at `location`, assigning a
    /// pointer to `dst`.
    Alloca { dst: VarId, location: MemoryLocationId, size: u32 },
    /// `dst = *ptr` of `size` bytes, signed per `sign`.
    Load { dst: VarId, ptr: VarId, size: u32, sign: Sign, is_pointer: bool },
    /// `*ptr = value` of `size` bytes.
    Store { ptr: VarId, value: VarId, size: u32, sign: Sign, is_pointer: bool },
    /// `memcpy(dst, src, size)`.
    Memcpy { dst: VarId, src: VarId, size: VarId },
    /// `memset(dst, value, size)`.
    Memset { dst: VarId, value: VarId, size: VarId },
    /// A direct or indirect call; `callee` is `None` for an unresolved
    /// indirect call (§4.G "unresolved indirect call ... unsound-assumption
    /// warning").
    Call { dst: Option<VarId>, callee: Option<FunctionId>, args: Vec<VarId> },
    /// `return value`.
    Return { value: Option<VarId> },
    /// A statement control flow can never reach; reaching one proves the
    /// pre-state was already `⊥` or the analysis found a real defect.
    Unreachable,
}

/// One AR statement plus its source location, used by check records and
/// diagnostics to report a call site or access site.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// What the statement does.
    pub kind: StatementKind,
    /// Debug source location (e.g. `"file.c:42"`); opaque to the core.
    pub location: String,
}

/// A basic block: a straight-line statement sequence plus successor
/// block ids (the last statement's kind determines how many successors
/// are meaningful; the executor doesn't validate this).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasicBlock {
    /// Statements, in execution order.
    pub statements: Vec<Statement>,
    /// Control-flow successors.
    pub successors: Vec<BlockId>,
}

/// A function's control-flow graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cfg {
    /// Entry block.
    pub entry: BlockId,
    /// All blocks, keyed by id.
    pub blocks: BTreeMap<BlockId, BasicBlock>,
}

impl Cfg {
    /// Predecessors of every block, computed from `successors` (the WTO
    /// builder in [`crate::fixpoint`] needs this and the AR visitor
    /// doesn't provide it directly).
    pub fn predecessors(&self) -> BTreeMap<BlockId, Vec<BlockId>> {
        let mut preds: BTreeMap<BlockId, Vec<BlockId>> = BTreeMap::new();
        for (&id, _) in &self.blocks {
            preds.entry(id).or_default();
        }
        for (&id, block) in &self.blocks {
            for &succ in &block.successors {
                preds.entry(succ).or_default().push(id);
            }
        }
        preds
    }
}

/// A function: its CFG, formal parameters, and identity in the call
/// graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Stable id.
    pub id: FunctionId,
    /// Debug name.
    pub name: String,
    /// Formal parameter variables, in declaration order.
    pub params: Vec<VarId>,
    /// The return variable, if the function is non-void.
    pub return_var: Option<VarId>,
    /// The function's control-flow graph.
    pub cfg: Cfg,
    /// Direct callees reachable from any `Call` statement with a resolved
    /// target, used to build the call graph (§4.I).
    pub callees: Vec<FunctionId>,
}
