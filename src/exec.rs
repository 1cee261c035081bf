//! The symbolic executor (§4.G): one transfer function per AR statement
//! kind, updating the current [`MemoryDomain`] abstract value in place.
//! Call handling is delegated to pluggable callbacks so the same
//! transfer function backs both summary-building passes and checker
//! passes (§4.I).

use alloc::string::ToString;

use crate::cfg::{Operand, Statement, StatementKind};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::domain::memory::MemoryDomain;
use crate::domain::NumericalDomain;
use crate::error::AnalyzerError;
use crate::lattice::interval::Interval;
use crate::lattice::pointer_value::{Nullity, Uninitialized};
use crate::variable::{VarId, VariableFactory};

/// Resolves a call's effect on the caller's state. Implementations range
/// from "forget everything reachable" (summary-building on first
/// encounter of a cycle) to "splice in the callee's materialized summary"
/// (§4.I numerical summary pass).
pub trait CallHandler<N> {
    /// Apply the effect of calling `callee` with `args`, writing the
    /// result (if any) to `dst`.
    fn exec_call(
        &mut self,
        state: &mut MemoryDomain<N>,
        dst: Option<VarId>,
        callee: Option<crate::cfg::FunctionId>,
        args: &[VarId],
        diagnostics: &mut Diagnostics,
    ) -> Result<(), AnalyzerError>;
}

/// A [`CallHandler`] that conservatively forgets the return value and
/// every reachable argument, the behavior §4.G mandates for an
/// unresolved indirect call.
pub struct ForgetAllCalls;

impl<N: NumericalDomain> CallHandler<N> for ForgetAllCalls {
    fn exec_call(
        &mut self,
        state: &mut MemoryDomain<N>,
        dst: Option<VarId>,
        callee: Option<crate::cfg::FunctionId>,
        args: &[VarId],
        diagnostics: &mut Diagnostics,
    ) -> Result<(), AnalyzerError> {
        if callee.is_none() {
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::UnresolvedIndirectCall,
                context: "exec_call".to_string(),
                site: "<unknown>".to_string(),
            });
        }
        if let Some(dst) = dst {
            state.scalar_mut().forget(dst);
        }
        for &arg in args {
            state.scalar_mut().forget(arg);
        }
        Ok(())
    }
}

fn eval_operand<N: NumericalDomain>(state: &MemoryDomain<N>, op: &Operand) -> Interval {
    match op {
        Operand::Var(v) => state.scalar().dynamic_read_integer(*v),
        Operand::Const(c) => Interval::singleton(crate::num::MachineInt::new(*c, 64, crate::num::Sign::Signed)),
    }
}

/// Execute one statement against `state`, using `vars` to resolve a
/// pointer variable's derived offset variable and `calls` to resolve any
/// `Call` statement's effect.
pub fn exec_statement<N: NumericalDomain>(
    state: &mut MemoryDomain<N>,
    stmt: &Statement,
    vars: &VariableFactory,
    calls: &mut dyn CallHandler<N>,
    diagnostics: &mut Diagnostics,
) -> Result<(), AnalyzerError> {
    if state.is_bottom() {
        return Ok(());
    }
    match &stmt.kind {
        StatementKind::Arith { op, dst, lhs, rhs } => {
            let x = materialize(state, lhs, LHS_SCRATCH);
            let y = materialize(state, rhs, RHS_SCRATCH);
            state.scalar_mut().apply(*op, *dst, x, y)
        }
        StatementKind::Compare { dst, lhs, rhs, strict } => {
            let a = eval_operand(state, lhs);
            let b = eval_operand(state, rhs);
            let definitely_true = match (a.hi_value(), b.lo_value()) {
                (Some(hi), Some(lo)) if *strict => hi < lo,
                (Some(hi), Some(lo)) => hi <= lo,
                _ => false,
            };
            let value = if definitely_true { 1 } else { 0 };
            state.scalar_mut().dynamic_write_integer(
                *dst,
                Interval::singleton(crate::num::MachineInt::new(value, 1, crate::num::Sign::Unsigned)),
            )
        }
        StatementKind::Assign { dst, expr } => state.scalar_mut().numerical_mut().assign(*dst, expr),
        StatementKind::Alloca { dst, location, size } => {
            state.mark_allocated(*location);
            let offset_var = vars.offset_of(*dst).unwrap_or(*dst);
            let value = crate::lattice::pointer_value::PointerValue {
                uninit: Uninitialized::Init,
                nullity: Nullity::NonNull,
                points_to: crate::lattice::points_to::PointsToSet::singleton(*location),
                offset: Interval::singleton(crate::num::MachineInt::new(0, 64, crate::num::Sign::Unsigned)),
            };
            let _ = size;
            state.scalar_mut().dynamic_write_pointer(*dst, offset_var, &value)
        }
        StatementKind::Load { dst, ptr, size, sign, is_pointer } => {
            let offset_var = vars.offset_of(*ptr).unwrap_or(*ptr);
            state.scalar_mut().assert_initialized(*ptr);
            state.scalar_mut().assert_non_null(*ptr);
            if state.is_bottom() {
                return Ok(());
            }
            let pv = state.scalar().dynamic_read_pointer(*ptr, offset_var);
            let offset_ic = state.scalar().numerical().to_interval_congruence(offset_var);
            state.mem_read(*dst, &pv.points_to, &offset_ic, *size, *sign, *is_pointer)
        }
        StatementKind::Store { ptr, value, size, sign, is_pointer } => {
            let offset_var = vars.offset_of(*ptr).unwrap_or(*ptr);
            state.scalar_mut().assert_initialized(*ptr);
            state.scalar_mut().assert_non_null(*ptr);
            if state.is_bottom() {
                return Ok(());
            }
            let pv = state.scalar().dynamic_read_pointer(*ptr, offset_var);
            let offset_ic = state.scalar().numerical().to_interval_congruence(offset_var);
            let value_interval = state.scalar().dynamic_read_integer(*value);
            let value_pointer = if *is_pointer {
                let v_offset = vars.offset_of(*value).unwrap_or(*value);
                Some(state.scalar().dynamic_read_pointer(*value, v_offset))
            } else {
                None
            };
            state.mem_write(&pv.points_to, &offset_ic, *size, *sign, value_interval, value_pointer.as_ref())
        }
        StatementKind::Memcpy { dst, src, size } => {
            let dst_off = vars.offset_of(*dst).unwrap_or(*dst);
            let src_off = vars.offset_of(*src).unwrap_or(*src);
            let dst_pv = state.scalar().dynamic_read_pointer(*dst, dst_off);
            let src_pv = state.scalar().dynamic_read_pointer(*src, src_off);
            let dst_ic = state.scalar().numerical().to_interval_congruence(dst_off);
            let src_ic = state.scalar().numerical().to_interval_congruence(src_off);
            let size_iv = state.scalar().dynamic_read_integer(*size);
            state.memcpy(&dst_pv.points_to, &dst_ic, &src_pv.points_to, &src_ic, &size_iv)
        }
        StatementKind::Memset { dst, value, size } => {
            let dst_off = vars.offset_of(*dst).unwrap_or(*dst);
            let dst_pv = state.scalar().dynamic_read_pointer(*dst, dst_off);
            let dst_ic = state.scalar().numerical().to_interval_congruence(dst_off);
            let value_iv = state.scalar().dynamic_read_integer(*value);
            let size_iv = state.scalar().dynamic_read_integer(*size);
            state.memset(&dst_pv.points_to, &dst_ic, &value_iv, &size_iv)
        }
        StatementKind::Call { dst, callee, args } => calls.exec_call(state, *dst, *callee, args, diagnostics),
        StatementKind::Return { .. } | StatementKind::Unreachable => Ok(()),
    }
}

/// Scratch variables `apply`'s ternary shape borrows for an immediate
/// operand. Distinct slots for the left and right operand so `dst = 2 + 3`
/// doesn't have the right write clobber the left's before `apply` reads
/// either back.
const LHS_SCRATCH: u32 = u32::MAX - 1;
const RHS_SCRATCH: u32 = u32::MAX - 2;

fn materialize<N: NumericalDomain>(state: &mut MemoryDomain<N>, op: &Operand, scratch_slot: u32) -> VarId {
    match op {
        Operand::Var(v) => *v,
        Operand::Const(c) => {
            let scratch = VarId::from_raw(scratch_slot);
            state.scalar_mut().numerical_mut().set(
                scratch,
                Interval::singleton(crate::num::MachineInt::new(*c, 64, crate::num::Sign::Signed)),
            );
            scratch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interval_domain::IntervalDomain;
    use crate::domain::ApplyOp;

    #[test]
    fn arithmetic_statement_updates_destination() {
        let mut state: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
        let vars = VariableFactory::new(64);
        let mut diagnostics = Diagnostics::default();
        let x = VarId::from_raw(0);
        let y = VarId::from_raw(1);
        let z = VarId::from_raw(2);
        state.scalar_mut().dynamic_write_integer(x, Interval::singleton(crate::num::MachineInt::new(2, 64, crate::num::Sign::Signed))).unwrap();
        state.scalar_mut().dynamic_write_integer(y, Interval::singleton(crate::num::MachineInt::new(3, 64, crate::num::Sign::Signed))).unwrap();
        let stmt = Statement {
            kind: StatementKind::Arith { op: ApplyOp::Add, dst: z, lhs: Operand::Var(x), rhs: Operand::Var(y) },
            location: "test:1".to_string(),
        };
        exec_statement(&mut state, &stmt, &vars, &mut ForgetAllCalls, &mut diagnostics).unwrap();
        assert_eq!(state.scalar().dynamic_read_integer(z).as_singleton().unwrap().value(), 5);
    }

    #[test]
    fn load_from_null_pointer_is_bottom() {
        let mut state: MemoryDomain<IntervalDomain> = MemoryDomain::top(1000);
        let mut vars = VariableFactory::new(64);
        let mut diagnostics = Diagnostics::default();
        let p = vars.make("p", crate::variable::DynType::Pointer);
        let offset_var = vars.offset_of(p).unwrap();
        state
            .scalar_mut()
            .dynamic_write_pointer(
                p,
                offset_var,
                &crate::lattice::pointer_value::PointerValue {
                    uninit: Uninitialized::Init,
                    nullity: Nullity::Null,
                    points_to: crate::lattice::points_to::PointsToSet::empty(),
                    offset: Interval::singleton(crate::num::MachineInt::new(0, 64, crate::num::Sign::Unsigned)),
                },
            )
            .unwrap();
        let dst = vars.make("dst", crate::variable::DynType::Integer(32, crate::num::Sign::Signed));
        let stmt = Statement {
            kind: StatementKind::Load { dst, ptr: p, size: 4, sign: crate::num::Sign::Signed, is_pointer: false },
            location: "test:2".to_string(),
        };
        exec_statement(&mut state, &stmt, &vars, &mut ForgetAllCalls, &mut diagnostics).unwrap();
        assert!(state.is_bottom());
    }
}
