//! Liveness analysis and interference-graph construction over a flow graph (C11, second half).
//!
//! Grounded on `liveness.c`'s `get_live_map` (the in/out fixed point) and `solve_liveness` (the
//! interference graph, move worklist and spill-cost table built from it) — the two commented-out
//! alternates in that file (`solve_liveness2`/`solve_liveness3`, a single reverse pass keeping a
//! running live set) are dead code there and have no counterpart here.

use crate::collections::UndirectedGraph;
use crate::flowgraph::{FlowGraph, FlowNode};
use crate::temp::Temp;
use std::collections::{HashMap, HashSet};
use tiger_entity::entity_impl;

/// A node in the interference graph, wrapping the temp it stands for.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterferenceNode(u32);
entity_impl!(InterferenceNode, "ig");

/// The interference graph plus the bookkeeping the allocator's coalescing and spilling passes
/// need: which moves are still coalescing candidates, which moves touch a given temp, and a
/// reference-count spill-cost estimate.
pub struct LiveGraph {
    graph: UndirectedGraph<InterferenceNode, Temp>,
    nodes_by_temp: HashMap<Temp, InterferenceNode>,
    /// Move instructions not yet coalesced or deemed uncoalesceable, as `(dst, src)` temp pairs.
    pub worklist_moves: Vec<(Temp, Temp)>,
    /// Every move touching a given temp, as `(dst, src)` pairs — the allocator consults this to
    /// find coalescing candidates for a temp it is about to simplify or freeze.
    pub move_list: HashMap<Temp, Vec<(Temp, Temp)>>,
    /// How many times each temp is referenced (defined or used) across the procedure, the
    /// allocator's spill-cost heuristic (higher reference count, costlier to spill).
    pub spill_cost: HashMap<Temp, u32>,
}

impl LiveGraph {
    /// Every temp with a node in the interference graph.
    pub fn temps(&self) -> impl Iterator<Item = Temp> + '_ {
        self.graph.nodes().map(move |n| *self.graph.payload(n))
    }

    /// Do `a` and `b` interfere?
    pub fn interferes(&self, a: Temp, b: Temp) -> bool {
        match (self.nodes_by_temp.get(&a), self.nodes_by_temp.get(&b)) {
            (Some(&na), Some(&nb)) => self.graph.adjacent_to(na, nb),
            _ => false,
        }
    }

    /// Every temp interfering with `t`.
    pub fn neighbors(&self, t: Temp) -> Vec<Temp> {
        match self.nodes_by_temp.get(&t) {
            Some(&n) => self.graph.neighbors(n).iter().map(|m| *self.graph.payload(m)).collect(),
            None => Vec::new(),
        }
    }

    /// `|neighbors(t)|`.
    pub fn degree(&self, t: Temp) -> usize {
        match self.nodes_by_temp.get(&t) {
            Some(&n) => self.graph.degree(n),
            None => 0,
        }
    }

    fn ensure_node(&mut self, t: Temp) -> InterferenceNode {
        if let Some(&n) = self.nodes_by_temp.get(&t) {
            return n;
        }
        let n = self.graph.add_node(t);
        self.nodes_by_temp.insert(t, n);
        n
    }

    fn add_edge(&mut self, a: Temp, b: Temp) {
        if a == b {
            return;
        }
        let na = self.ensure_node(a);
        let nb = self.ensure_node(b);
        self.graph.add_edge(na, nb);
    }
}

/// Backward dataflow fixed point: `in[n] = use[n] ∪ (out[n] - def[n])`, `out[n] = ∪ in[s]` over
/// every successor `s`. Iterates node-order sweeps until neither set changes anywhere, the same
/// brute-force (not worklist-ordered) convergence the original uses.
fn live_in_out(flow: &FlowGraph) -> (HashMap<FlowNode, HashSet<Temp>>, HashMap<FlowNode, HashSet<Temp>>) {
    let nodes: Vec<FlowNode> = flow.nodes().collect();
    let mut live_in: HashMap<FlowNode, HashSet<Temp>> = nodes.iter().map(|&n| (n, HashSet::new())).collect();
    let mut live_out: HashMap<FlowNode, HashSet<Temp>> = nodes.iter().map(|&n| (n, HashSet::new())).collect();

    loop {
        let mut changed = false;

        for &n in &nodes {
            let def: HashSet<Temp> = flow.def(n).into_iter().collect();
            let use_: HashSet<Temp> = flow.use_(n).into_iter().collect();

            let mut new_out = HashSet::new();
            for s in flow.succs(n) {
                new_out.extend(live_in[&s].iter().copied());
            }

            let mut new_in = use_.clone();
            new_in.extend(new_out.difference(&def).copied());

            if new_in != live_in[&n] || new_out != live_out[&n] {
                changed = true;
            }
            live_in.insert(n, new_in);
            live_out.insert(n, new_out);
        }

        if !changed {
            break;
        }
    }

    (live_in, live_out)
}

/// Run liveness analysis and build the interference graph for one procedure's flow graph.
pub fn analyze(flow: &FlowGraph) -> LiveGraph {
    let (_live_in, live_out) = live_in_out(flow);

    let mut lg = LiveGraph {
        graph: UndirectedGraph::new(),
        nodes_by_temp: HashMap::new(),
        worklist_moves: Vec::new(),
        move_list: HashMap::new(),
        spill_cost: HashMap::new(),
    };

    for n in flow.nodes() {
        let def = flow.def(n);
        let use_ = flow.use_(n);

        let defuse: HashSet<Temp> = def.iter().chain(use_.iter()).copied().collect();
        for t in &defuse {
            *lg.spill_cost.entry(*t).or_insert(0) += 1;
        }

        if flow.is_move(n) {
            // A `Move` instruction carries exactly one def and one use.
            if let (Some(&dst), Some(&src)) = (def.first(), use_.first()) {
                lg.ensure_node(dst);
                lg.ensure_node(src);
                lg.move_list.entry(dst).or_default().push((dst, src));
                lg.move_list.entry(src).or_default().push((dst, src));
                lg.worklist_moves.push((dst, src));
            }
        }

        let out = &live_out[&n];
        // The move's own source is excluded from interfering with its destination so the
        // allocator can still coalesce them; every other temp defined at `n` interferes with
        // every other temp live out of `n`. (`solve_liveness` in the original declares this same
        // exclusion but leaves the comparison variable unset, so it never actually fires there;
        // the working version of the exclusion lives in that file's unused `solve_liveness2`
        // alternate, which this follows instead of the shipped-but-dead check.)
        let move_src = if flow.is_move(n) { use_.first().copied() } else { None };

        for &d in &def {
            for &o in out {
                if o == d {
                    continue;
                }
                if lg.interferes(d, o) {
                    continue;
                }
                if move_src == Some(o) || move_src == Some(d) {
                    continue;
                }
                lg.add_edge(d, o);
            }
        }
    }

    lg
}
