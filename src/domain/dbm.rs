//! The difference-bound matrix domain (§4.C): tracks `x - y <= c` for
//! pairs of variables, closed under Floyd-Warshall shortest paths. More
//! precise than the interval domain for loop-bound and pointer-subtraction
//! reasoning, at `O(n^2)` space per abstract state.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::domain::{ApplyOp, Constraint, LinearExpr, NumericalDomain};
use crate::error::AnalyzerError;
use crate::lattice::interval::{Bound, Interval};
use crate::num::{Congruence, MachineInt, Sign};
use crate::variable::VarId;

const DEFAULT_WIDTH: u32 = 64;
const DEFAULT_SIGN: Sign = Sign::Signed;

/// `+∞`, the absence of a tracked `x - y <= c` edge.
const NO_BOUND: i128 = i128::MAX;

/// A difference-bound matrix over a fixed set of tracked variables. Entry
/// `(i, j)` is the tightest known bound `c` on `vars[i] - vars[j] <= c`; a
/// zeroth row/column represents the constant `0` so unary bounds `x <= c`
/// and `x >= c` are expressible as `x - 0 <= c` and `0 - x <= -c`.
#[derive(Debug, Clone, PartialEq)]
pub struct DbmDomain {
    bottom: bool,
    index: BTreeMap<VarId, usize>,
    order: Vec<VarId>,
    matrix: Vec<Vec<i128>>,
}

impl DbmDomain {
    fn dim(&self) -> usize {
        self.order.len() + 1
    }

    fn slot(&mut self, x: VarId) -> usize {
        if let Some(&i) = self.index.get(&x) {
            return i;
        }
        let i = self.dim();
        self.index.insert(x, i);
        self.order.push(x);
        for row in &mut self.matrix {
            row.push(NO_BOUND);
        }
        self.matrix.push(alloc::vec![NO_BOUND; i + 1]);
        self.matrix[i][i] = 0;
        i
    }

    fn slot_opt(&self, x: VarId) -> Option<usize> {
        self.index.get(&x).copied()
    }

    fn closure(&mut self) {
        let n = self.dim();
        for k in 0..n {
            for i in 0..n {
                if self.matrix[i][k] == NO_BOUND {
                    continue;
                }
                for j in 0..n {
                    if self.matrix[k][j] == NO_BOUND {
                        continue;
                    }
                    let via = self.matrix[i][k] + self.matrix[k][j];
                    if via < self.matrix[i][j] {
                        self.matrix[i][j] = via;
                    }
                }
            }
        }
        for i in 0..n {
            if self.matrix[i][i] < 0 {
                self.bottom = true;
            }
        }
    }

    fn tighten(&mut self, i: usize, j: usize, c: i128) {
        if c < self.matrix[i][j] {
            self.matrix[i][j] = c;
        }
    }

    /// `x - y <= c`.
    fn add_diff(&mut self, x: VarId, y: VarId, c: i128) {
        let i = self.slot(x);
        let j = self.slot(y);
        self.tighten(i, j, c);
        self.closure();
    }

    fn bound_diff(&self, i: usize, j: usize) -> Option<i128> {
        let v = self.matrix.get(i)?.get(j).copied()?;
        if v == NO_BOUND {
            None
        } else {
            Some(v)
        }
    }
}

impl NumericalDomain for DbmDomain {
    fn bottom() -> Self {
        Self {
            bottom: true,
            index: BTreeMap::new(),
            order: Vec::new(),
            matrix: alloc::vec![alloc::vec![0]],
        }
    }

    fn top() -> Self {
        Self {
            bottom: false,
            index: BTreeMap::new(),
            order: Vec::new(),
            matrix: alloc::vec![alloc::vec![0]],
        }
    }

    fn is_bottom(&self) -> bool {
        self.bottom
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut out = Self::top();
        let vars: Vec<VarId> = self
            .order
            .iter()
            .filter(|v| other.index.contains_key(v))
            .copied()
            .collect();
        for &v in &vars {
            out.slot(v);
        }
        let n = out.dim();
        out.matrix = alloc::vec![alloc::vec![NO_BOUND; n]; n];
        for i in 0..n {
            out.matrix[i][i] = 0;
        }
        for i in 0..n {
            for j in 0..n {
                let a = if i == 0 && j == 0 {
                    Some(0)
                } else if i == 0 {
                    self.bound_diff(0, self.slot_opt(out.order[j - 1])?)
                } else if j == 0 {
                    self.bound_diff(self.slot_opt(out.order[i - 1])?, 0)
                } else {
                    self.bound_diff(self.slot_opt(out.order[i - 1])?, self.slot_opt(out.order[j - 1])?)
                };
                let b = if i == 0 && j == 0 {
                    Some(0)
                } else if i == 0 {
                    other.bound_diff(0, other.slot_opt(out.order[j - 1])?)
                } else if j == 0 {
                    other.bound_diff(other.slot_opt(out.order[i - 1])?, 0)
                } else {
                    other.bound_diff(other.slot_opt(out.order[i - 1])?, other.slot_opt(out.order[j - 1])?)
                };
                if let (Some(a), Some(b)) = (a, b) {
                    out.matrix[i][j] = a.max(b);
                }
            }
        }
        out
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        let mut out = self.clone();
        for (&v, &j) in &other.index {
            out.slot(v);
            let _ = j;
        }
        for (&x, &i) in &other.index {
            for (&y, &j) in &other.index {
                if let Some(c) = other.bound_diff(i, j) {
                    out.add_diff(x, y, c);
                }
            }
        }
        out
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        for (&x, &i) in &other.index {
            for (&y, &j) in &other.index {
                if let Some(c) = other.bound_diff(i, j) {
                    let si = self.slot_opt(x);
                    let sj = self.slot_opt(y);
                    let self_bound = match (si, sj) {
                        (Some(a), Some(b)) => self.bound_diff(a, b),
                        _ => None,
                    };
                    match self_bound {
                        Some(d) if d <= c => {}
                        _ => return false,
                    }
                }
            }
        }
        true
    }

    fn widen(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut out = self.clone();
        for i in 0..out.dim().min(self.dim()) {
            for j in 0..out.dim().min(self.dim()) {
                let x = if i == 0 { None } else { Some(self.order[i - 1]) };
                let y = if j == 0 { None } else { Some(self.order[j - 1]) };
                let other_val = match (x, y) {
                    (Some(x), Some(y)) => other
                        .slot_opt(x)
                        .zip(other.slot_opt(y))
                        .and_then(|(a, b)| other.bound_diff(a, b)),
                    _ => other.bound_diff(0, 0),
                };
                if other_val != Some(self.matrix[i][j]) {
                    out.matrix[i][j] = NO_BOUND;
                }
            }
        }
        out
    }

    fn narrow(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        self.meet(other)
    }

    fn assign(&mut self, x: VarId, e: &LinearExpr) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        self.forget(x);
        if e.terms.len() == 1 && e.terms[0].1 == 1 {
            let (y, _) = e.terms[0];
            self.add_diff(x, y, e.constant);
            self.add_diff(y, x, -e.constant);
        } else if e.terms.is_empty() {
            // Constant assignment: x == c, encoded against the zero row.
            let i = self.slot(x);
            self.matrix[i][0] = e.constant;
            self.matrix[0][i] = -e.constant;
            self.closure();
        }
        Ok(())
    }

    fn apply(&mut self, op: ApplyOp, z: VarId, x: VarId, y: VarId) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        self.forget(z);
        if let ApplyOp::Add = op {
            // z = x + y is not a difference constraint; DBMs only track
            // differences precisely, so widen to no information for z
            // rather than guess. Callers run this domain packed alongside
            // the interval domain (see [`crate::domain::packing`]) which
            // recovers the sum bound.
            let _ = (x, y);
        }
        Ok(())
    }

    fn add_constraint(&mut self, c: &Constraint) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        let (expr, bound_adjust) = match c {
            Constraint::Equal(e) => (e, 0i128),
            Constraint::LessEqual(e) => (e, 0),
            Constraint::LessThan(e) => (e, 1),
        };
        if expr.terms.len() == 2 {
            let (x, kx) = expr.terms[0];
            let (y, ky) = expr.terms[1];
            if kx == 1 && ky == -1 {
                self.add_diff(x, y, -expr.constant - bound_adjust);
                if matches!(c, Constraint::Equal(_)) {
                    self.add_diff(y, x, expr.constant);
                }
            }
        }
        Ok(())
    }

    fn set(&mut self, x: VarId, value: Interval) {
        self.forget(x);
        if let (Bound::Finite(lo), Bound::Finite(hi)) = (value.lo(), value.hi()) {
            let i = self.slot(x);
            self.matrix[i][0] = hi.value();
            self.matrix[0][i] = -lo.value();
            self.closure();
        }
    }

    fn refine(&mut self, x: VarId, value: Interval) {
        if let (Bound::Finite(lo), Bound::Finite(hi)) = (value.lo(), value.hi()) {
            let i = self.slot(x);
            self.tighten(i, 0, hi.value());
            self.tighten(0, i, -lo.value());
            self.closure();
        }
    }

    fn forget(&mut self, x: VarId) {
        if let Some(&i) = self.index.get(&x) {
            let n = self.dim();
            for k in 0..n {
                self.matrix[i][k] = if k == i { 0 } else { NO_BOUND };
                self.matrix[k][i] = if k == i { 0 } else { NO_BOUND };
            }
        }
    }

    fn to_interval(&self, x: VarId) -> Interval {
        if self.is_bottom() {
            return Interval::bottom_of(DEFAULT_WIDTH, DEFAULT_SIGN);
        }
        let Some(&i) = self.index.get(&x) else {
            return Interval::top_of(DEFAULT_WIDTH, DEFAULT_SIGN);
        };
        let hi = self
            .bound_diff(i, 0)
            .map(|c| Bound::Finite(MachineInt::new(c, DEFAULT_WIDTH, DEFAULT_SIGN)))
            .unwrap_or(Bound::PosInf);
        let lo = self
            .bound_diff(0, i)
            .map(|c| Bound::Finite(MachineInt::new(-c, DEFAULT_WIDTH, DEFAULT_SIGN)))
            .unwrap_or(Bound::NegInf);
        Interval::new(lo, hi, DEFAULT_WIDTH, DEFAULT_SIGN)
    }

    fn to_congruence(&self, _x: VarId) -> Congruence {
        Congruence::top()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_constraint_bounds_both_variables() {
        let mut dom = DbmDomain::top();
        let x = VarId::from_raw(0);
        let y = VarId::from_raw(1);
        dom.set(y, Interval::singleton(MachineInt::new(10, DEFAULT_WIDTH, DEFAULT_SIGN)));
        dom.add_constraint(&Constraint::LessEqual(LinearExpr {
            constant: -3,
            terms: alloc::vec![(x, 1), (y, -1)],
        }))
        .unwrap();
        // x - y <= 3, y == 10 => x <= 13
        let iv = dom.to_interval(x);
        assert!(matches!(iv.hi(), Bound::Finite(m) if m.value() <= 13));
    }

    #[test]
    fn forget_drops_relational_information() {
        let mut dom = DbmDomain::top();
        let x = VarId::from_raw(0);
        let y = VarId::from_raw(1);
        dom.add_constraint(&Constraint::LessEqual(LinearExpr {
            constant: 0,
            terms: alloc::vec![(x, 1), (y, -1)],
        }))
        .unwrap();
        dom.forget(x);
        assert!(dom.to_interval(x).is_top());
    }

    #[test]
    fn contradictory_bounds_collapse_to_bottom() {
        let mut dom = DbmDomain::top();
        let x = VarId::from_raw(0);
        dom.refine(x, Interval::singleton(MachineInt::new(5, DEFAULT_WIDTH, DEFAULT_SIGN)));
        dom.refine(x, Interval::singleton(MachineInt::new(6, DEFAULT_WIDTH, DEFAULT_SIGN)));
        assert!(dom.is_bottom());
    }
}
