//! A sound abstract-interpretation core for proving the absence of
//! runtime errors in compiled programs: machine-integer arithmetic,
//! lattice values, numerical domains, the scalar/memory composites, a
//! weak-topological-order fixpoint iterator, interprocedural
//! summarization, and checkers.
//!
//! The front end that lowers real source into the [`cfg`] module's typed
//! CFG, and any driver that wires [`config::Options`], [`summary`]'s
//! passes, and [`check`]'s results into a report, are both out of scope:
//! this crate is the core an analyzer is built on top of, not a
//! command-line tool.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs)]

extern crate alloc;

pub mod callgraph;
pub mod cfg;
pub mod check;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod exec;
pub mod fixpoint;
pub mod lattice;
pub mod num;
pub mod summary;
pub mod variable;

/// Re-exports covering a typical driver's needs: build a [`context::Context`],
/// hand it a [`cfg::Function`] slice, run the three [`summary`] passes, and
/// read [`check::CheckResult`]s back out.
pub mod prelude {
    pub use crate::cfg::{BasicBlock, BlockId, Cfg, Function, FunctionId, Operand, Statement, StatementKind};
    pub use crate::check::{check_buffer_overflow, collect_allocated_sizes, CheckKind, CheckResult, Outcome};
    pub use crate::config::{NumericalDomainKind, Options, Precision};
    pub use crate::context::Context;
    pub use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
    pub use crate::domain::poly::PolyDomain;
    pub use crate::error::AnalyzerError;
    pub use crate::summary::{CheckerPass, FunctionSummary, NumericalSummaryPass, PointerSummaryPass, ValueSummaryPass};
    pub use crate::variable::{DynType, MemoryLocationFactory, MemoryLocationId, MemoryLocationKind, VarId, VariableFactory};
}
