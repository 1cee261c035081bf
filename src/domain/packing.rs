//! The variable-packing wrapper (§4.C, §9 Open Question i): partitions
//! tracked variables into disjoint packs via union-find, giving each pack
//! its own instance of an inner relational domain `D`. Keeps the DBM
//! domain's `O(n^2)` cost proportional to the largest pack instead of the
//! whole variable universe.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::domain::{ApplyOp, Constraint, LinearExpr, NumericalDomain};
use crate::error::AnalyzerError;
use crate::lattice::interval::Interval;
use crate::num::Congruence;
use crate::variable::VarId;

/// A union-find partition of the variables a [`PackingDomain`] has seen,
/// with each root holding an `Rc`-shared inner domain so that copying a
/// `PackingDomain` (as the fixpoint iterator does every time it stores a
/// block's entry state) is cheap until a write actually diverges the
/// copies (copy-on-write, since the pack corpus has no persistent-map
/// crate to reach for).
#[derive(Debug, Clone)]
pub struct PackingDomain<D> {
    bottom: bool,
    parent: BTreeMap<VarId, VarId>,
    packs: BTreeMap<VarId, Rc<D>>,
}

impl<D: NumericalDomain> PackingDomain<D> {
    fn find(&self, x: VarId) -> Option<VarId> {
        let mut cur = *self.parent.get(&x)?;
        while let Some(&next) = self.parent.get(&cur) {
            if next == cur {
                break;
            }
            cur = next;
        }
        Some(cur)
    }

    fn root_of(&self, x: VarId) -> VarId {
        self.find(x).unwrap_or(x)
    }

    fn ensure(&mut self, x: VarId) -> VarId {
        if self.parent.contains_key(&x) {
            return self.root_of(x);
        }
        self.parent.insert(x, x);
        self.packs.insert(x, Rc::new(D::top()));
        x
    }

    fn pack_mut(&mut self, root: VarId) -> &mut D {
        let shared = self.packs.get(&root).expect("pack root always has an entry");
        Rc::make_mut(self.packs.entry(root).or_insert_with(|| shared.clone()))
    }

    fn union(&mut self, a: VarId, b: VarId) {
        let ra = self.ensure(a);
        let rb = self.ensure(b);
        if ra == rb {
            return;
        }
        let pa = self.packs.get(&ra).unwrap().clone();
        let pb = self.packs.remove(&rb).unwrap();
        let merged = pa.join(&pb);
        self.packs.insert(ra, Rc::new(merged));
        for (_, r) in self.parent.iter_mut() {
            if *r == rb {
                *r = ra;
            }
        }
        self.parent.insert(rb, ra);
    }

    /// Number of distinct packs currently tracked.
    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }
}

impl<D: NumericalDomain> NumericalDomain for PackingDomain<D> {
    fn bottom() -> Self {
        Self {
            bottom: true,
            parent: BTreeMap::new(),
            packs: BTreeMap::new(),
        }
    }

    fn top() -> Self {
        Self {
            bottom: false,
            parent: BTreeMap::new(),
            packs: BTreeMap::new(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.bottom || self.packs.values().any(|p| p.is_bottom())
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        // Packs that don't line up between the two operands are joined by
        // forgetting the variables each side doesn't share, so the result
        // is always sound even if less precise than re-packing from
        // scratch.
        let mut out = self.clone();
        let keys: Vec<VarId> = other.parent.keys().copied().collect();
        for x in keys {
            let ry = other.root_of(x);
            for y in other.parent.keys().filter(|&&y| other.root_of(y) == ry) {
                if x != *y {
                    out.union(x, *y);
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
        for (&x, other_root) in &other.parent {
            let _ = other_root;
            let rx = out.ensure(x);
            let ro = other.root_of(x);
            if let Some(op) = other.packs.get(&ro) {
                let merged = out.packs.get(&rx).unwrap().meet(op);
                out.packs.insert(rx, Rc::new(merged));
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
        other.packs.iter().all(|(root, dom)| {
            let members: Vec<VarId> = other.parent.keys().copied().filter(|&v| other.root_of(v) == *root).collect();
            if let Some(&self_root) = members.first().and_then(|m| self.parent.get(m)) {
                let _ = self_root;
                let self_dom = self.packs.get(&self.root_of(members[0])).cloned().unwrap_or_else(|| Rc::new(D::top()));
                self_dom.leq(dom)
            } else {
                true
            }
        })
    }

    fn widen(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut out = self.join(other);
        for (root, dom) in out.packs.clone() {
            if let Some(&self_root_var) = out.parent.iter().find(|(_, &r)| r == root).map(|(k, _)| k) {
                let self_root = self.root_of(self_root_var);
                if let Some(self_dom) = self.packs.get(&self_root) {
                    out.packs.insert(root, Rc::new(self_dom.widen(&dom)));
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
        for (y, _) in &e.terms {
            if *y != x {
                self.union(x, *y);
            }
        }
        let root = self.ensure(x);
        self.pack_mut(root).assign(x, e)
    }

    fn apply(&mut self, op: ApplyOp, z: VarId, x: VarId, y: VarId) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        self.union(z, x);
        self.union(z, y);
        let root = self.ensure(z);
        self.pack_mut(root).apply(op, z, x, y)
    }

    fn add_constraint(&mut self, c: &Constraint) -> Result<(), AnalyzerError> {
        if self.is_bottom() {
            return Ok(());
        }
        let expr = match c {
            Constraint::Equal(e) | Constraint::LessEqual(e) | Constraint::LessThan(e) => e,
        };
        let vars: Vec<VarId> = expr.terms.iter().map(|(v, _)| *v).collect();
        if let Some((&first, rest)) = vars.split_first() {
            for &v in rest {
                self.union(first, v);
            }
            let root = self.ensure(first);
            self.pack_mut(root).add_constraint(c)?;
        }
        Ok(())
    }

    fn set(&mut self, x: VarId, value: Interval) {
        let root = self.ensure(x);
        self.pack_mut(root).set(x, value);
    }

    fn refine(&mut self, x: VarId, value: Interval) {
        let root = self.ensure(x);
        self.pack_mut(root).refine(x, value);
    }

    fn forget(&mut self, x: VarId) {
        if let Some(root) = self.find(x) {
            self.pack_mut(root).forget(x);
        }
    }

    fn to_interval(&self, x: VarId) -> Interval {
        match self.find(x).and_then(|r| self.packs.get(&r)) {
            Some(dom) => dom.to_interval(x),
            None => Interval::top_of(64, crate::num::Sign::Signed),
        }
    }

    fn to_congruence(&self, x: VarId) -> Congruence {
        match self.find(x).and_then(|r| self.packs.get(&r)) {
            Some(dom) => dom.to_congruence(x),
            None => Congruence::top(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interval_domain::IntervalDomain;

    #[test]
    fn related_assignment_merges_into_one_pack() {
        let mut dom: PackingDomain<IntervalDomain> = PackingDomain::top();
        let x = VarId::from_raw(0);
        let y = VarId::from_raw(1);
        dom.assign(x, &LinearExpr::var(y)).unwrap();
        assert_eq!(dom.pack_count(), 1);
    }

    #[test]
    fn unrelated_variables_stay_in_separate_packs() {
        let mut dom: PackingDomain<IntervalDomain> = PackingDomain::top();
        let x = VarId::from_raw(0);
        let y = VarId::from_raw(1);
        dom.set(x, Interval::singleton(crate::num::MachineInt::new(1, 64, crate::num::Sign::Signed)));
        dom.set(y, Interval::singleton(crate::num::MachineInt::new(2, 64, crate::num::Sign::Signed)));
        assert_eq!(dom.pack_count(), 2);
    }
}
