//! The call graph's strongly-connected components, in reverse
//! topological order (§6 "enumerate SCCs of the call graph in reverse
//! topological order"), the traversal order every summarization pass in
//! [`crate::summary`] runs over.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::cfg::{Function, FunctionId};

/// Tarjan's algorithm over the call graph induced by each [`Function`]'s
/// `callees`, returning SCCs ordered so that a callee's SCC always comes
/// before any of its callers' (reverse topological: bottom-up).
pub fn strongly_connected_components(functions: &[Function]) -> Vec<Vec<FunctionId>> {
    let by_id: BTreeMap<FunctionId, &Function> = functions.iter().map(|f| (f.id, f)).collect();
    let mut tarjan = Tarjan {
        by_id,
        index: BTreeMap::new(),
        lowlink: BTreeMap::new(),
        on_stack: BTreeMap::new(),
        stack: Vec::new(),
        next_index: 0,
        out: Vec::new(),
    };
    for f in functions {
        if !tarjan.index.contains_key(&f.id) {
            tarjan.strong_connect(f.id);
        }
    }
    tarjan.out
}

struct Tarjan<'a> {
    by_id: BTreeMap<FunctionId, &'a Function>,
    index: BTreeMap<FunctionId, u32>,
    lowlink: BTreeMap<FunctionId, u32>,
    on_stack: BTreeMap<FunctionId, bool>,
    stack: Vec<FunctionId>,
    next_index: u32,
    out: Vec<Vec<FunctionId>>,
}

impl<'a> Tarjan<'a> {
    fn strong_connect(&mut self, v: FunctionId) {
        self.index.insert(v, self.next_index);
        self.lowlink.insert(v, self.next_index);
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack.insert(v, true);

        let callees = self.by_id.get(&v).map(|f| f.callees.clone()).unwrap_or_default();
        for w in callees {
            if !self.by_id.contains_key(&w) {
                continue;
            }
            if !self.index.contains_key(&w) {
                self.strong_connect(w);
                let w_low = self.lowlink[&w];
                let v_low = self.lowlink[&v];
                self.lowlink.insert(v, v_low.min(w_low));
            } else if *self.on_stack.get(&w).unwrap_or(&false) {
                let w_idx = self.index[&w];
                let v_low = self.lowlink[&v];
                self.lowlink.insert(v, v_low.min(w_idx));
            }
        }

        if self.lowlink[&v] == self.index[&v] {
            let mut component = Vec::new();
            loop {
                let w = self.stack.pop().expect("v's own SCC is on the stack");
                self.on_stack.insert(w, false);
                component.push(w);
                if w == v {
                    break;
                }
            }
            // Tarjan emits SCCs in reverse topological order already
            // (a callee's SCC closes before its caller's), so no
            // additional reversal is needed here.
            self.out.push(component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::Cfg;

    fn func(id: u32, callees: Vec<u32>) -> Function {
        Function {
            id: FunctionId(id),
            name: alloc::format!("f{id}"),
            params: Vec::new(),
            return_var: None,
            cfg: Cfg::default(),
            callees: callees.into_iter().map(FunctionId).collect(),
        }
    }

    #[test]
    fn acyclic_chain_orders_callee_before_caller() {
        let fns = alloc::vec![func(0, alloc::vec![1]), func(1, alloc::vec![2]), func(2, alloc::vec![])];
        let sccs = strongly_connected_components(&fns);
        let position = |id: u32| sccs.iter().position(|c| c.contains(&FunctionId(id))).unwrap();
        assert!(position(2) < position(1));
        assert!(position(1) < position(0));
    }

    #[test]
    fn mutual_recursion_forms_one_component() {
        let fns = alloc::vec![func(0, alloc::vec![1]), func(1, alloc::vec![0])];
        let sccs = strongly_connected_components(&fns);
        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].len(), 2);
    }
}
