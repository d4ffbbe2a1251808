//! Graph-colouring register assignment (C12, colouring phase).
//!
//! Grounded on `color.c`'s `col_color` (the Appel/George iterated-coalescing allocator, this
//! module's `IteratedCoalescing`) and its simpler sibling `col_color2` (`Simple`, no coalescing,
//! colour-and-spill-on-failure only — kept in the original for sanity-checking the real
//! allocator before coalescing was wired up, carried over here for the same purpose).

use crate::liveness::LiveGraph;
use crate::temp::Temp;
use std::collections::{HashMap, HashSet};

/// Which allocator `allocate` (in `regalloc::mod`) should run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterAllocator {
    /// The full Appel/George algorithm: simplify, coalesce, freeze, select-spill.
    IteratedCoalescing,
    /// `col_color2`: colour every non-precoloured node greedily, spill on failure, never
    /// coalesce. Cheaper, used by tests to cross-check the real allocator's output and as a
    /// fallback the spill-rewrite watchdog in `regalloc::allocate` can fall back to.
    Simple,
}

/// The result of one colouring attempt.
pub struct ColorResult {
    /// Every temp's assigned machine-register name, including the pre-coloured ones.
    pub coloring: HashMap<Temp, String>,
    /// Temps that could not be coloured and must be spilled to the frame.
    pub spills: Vec<Temp>,
    /// Moves the allocator coalesced — candidates for deletion from the final instruction list.
    pub coalesced_moves: Vec<(Temp, Temp)>,
    /// Every temp unioned into another during coalescing, and the temp it was unioned into,
    /// i.e. `alias[v] = u` for each entry. Used by the spill-rewrite loop to resolve a
    /// coalesced-away temp's effective identity before checking spill membership.
    pub alias: HashMap<Temp, Temp>,
    /// Every temp unioned into another during coalescing (the domain of `alias`).
    pub coalesced_nodes: HashSet<Temp>,
}

/// Colour `live`'s interference graph, given `initial` (the pre-colouring: machine registers
/// mapped to their own names) and `registers` (every colour available, `k = registers.len()`).
pub fn color(live: &LiveGraph, initial: &HashMap<Temp, String>, registers: &[Temp], allocator: RegisterAllocator) -> ColorResult {
    match allocator {
        RegisterAllocator::IteratedCoalescing => iterated_coalescing(live, initial, registers),
        RegisterAllocator::Simple => simple(live, initial, registers),
    }
}

/// `col_color2`: one pass, no coalescing. Every node is either coloured from the colours its
/// neighbours don't already use, or spilled if none remain.
fn simple(live: &LiveGraph, initial: &HashMap<Temp, String>, registers: &[Temp]) -> ColorResult {
    let mut colors: HashMap<Temp, String> = initial.clone();
    let mut spills = Vec::new();
    let mut colored = Vec::new();

    for t in live.temps() {
        if initial.contains_key(&t) {
            continue;
        }
        let mut ok: Vec<Temp> = registers.to_vec();
        for n in live.neighbors(t) {
            if let Some(color) = colors.get(&n) {
                ok.retain(|r| colors.get(r).map_or(true, |rc| rc != color));
            }
        }
        match ok.first() {
            Some(&r) => {
                colors.insert(t, colors[&r].clone());
                colored.push(t);
            }
            None => spills.push(t),
        }
    }

    ColorResult {
        coloring: colors,
        spills,
        coalesced_moves: Vec::new(),
        alias: HashMap::new(),
        coalesced_nodes: HashSet::new(),
    }
}

/// A sentinel degree for pre-coloured nodes: comparisons against `k` (at most the handful of
/// usable machine registers) never mistake this for a real, colourable degree. Grounded on
/// `color.c`'s own literal `999` for the same purpose.
const PRECOLORED_DEGREE: i64 = 1_000_000;

struct Ctx<'a> {
    live: &'a LiveGraph,
    precolored: &'a HashMap<Temp, String>,
    k: i64,

    degree: HashMap<Temp, i64>,
    alias: HashMap<Temp, Temp>,
    /// Edges `combine` introduces between `u` and a coalesced-away `v`'s neighbours. The
    /// interference graph `live` hands back is immutable liveness output; coalescing still
    /// needs to grow a node's effective neighbourhood, so those synthetic edges live here
    /// instead of mutating it, and every adjacency/interference query below consults both.
    extra_edges: HashMap<Temp, HashSet<Temp>>,

    simplify_work_list: HashSet<Temp>,
    freeze_work_list: HashSet<Temp>,
    spill_work_list: HashSet<Temp>,
    spilled_nodes: Vec<Temp>,
    coalesced_nodes: HashSet<Temp>,
    select_stack: Vec<Temp>,

    coalesced_moves: Vec<(Temp, Temp)>,
    constrained_moves: Vec<(Temp, Temp)>,
    frozen_moves: Vec<(Temp, Temp)>,
    worklist_moves: Vec<(Temp, Temp)>,
    active_moves: Vec<(Temp, Temp)>,

    move_list: HashMap<Temp, Vec<(Temp, Temp)>>,
    spill_cost: &'a HashMap<Temp, u32>,
}

fn remove_one(v: &mut Vec<(Temp, Temp)>, m: (Temp, Temp)) -> bool {
    match v.iter().position(|&x| x == m) {
        Some(i) => {
            v.remove(i);
            true
        }
        None => false,
    }
}

impl<'a> Ctx<'a> {
    fn is_precolored(&self, t: Temp) -> bool {
        self.precolored.contains_key(&t)
    }

    fn get_alias(&self, t: Temp) -> Temp {
        let mut cur = t;
        while self.coalesced_nodes.contains(&cur) {
            cur = self.alias[&cur];
        }
        cur
    }

    /// Do `a` and `b` interfere, counting both the original liveness-computed edges and any
    /// synthetic ones `combine` has added since?
    fn interferes_now(&self, a: Temp, b: Temp) -> bool {
        self.live.interferes(a, b) || self.extra_edges.get(&a).map_or(false, |s| s.contains(&b))
    }

    /// Every neighbour of `t` (original or coalescing-introduced) not already pushed to the
    /// select stack or coalesced away — `color.c`'s `adjacent`.
    fn adjacent(&self, t: Temp) -> Vec<Temp> {
        let mut ns: HashSet<Temp> = self.live.neighbors(t).into_iter().collect();
        if let Some(extra) = self.extra_edges.get(&t) {
            ns.extend(extra.iter().copied());
        }
        ns.into_iter().filter(|n| !self.select_stack.contains(n) && !self.coalesced_nodes.contains(n)).collect()
    }

    /// Moves still live on `worklist_moves` or `active_moves` that touch `t` — `node_moves`.
    fn node_moves(&self, t: Temp) -> Vec<(Temp, Temp)> {
        self.move_list
            .get(&t)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|m| self.worklist_moves.contains(m) || self.active_moves.contains(m))
            .collect()
    }

    fn move_related(&self, t: Temp) -> bool {
        !self.node_moves(t).is_empty()
    }

    fn make_work_list(&mut self, initial: Vec<Temp>) {
        for t in initial {
            let degree = self.degree[&t];
            if degree >= self.k {
                self.spill_work_list.insert(t);
            } else if self.move_related(t) {
                self.freeze_work_list.insert(t);
            } else {
                self.simplify_work_list.insert(t);
            }
        }
    }

    fn add_edge_degree(&mut self, u: Temp, v: Temp) {
        if !self.is_precolored(u) {
            *self.degree.get_mut(&u).unwrap() += 1;
        }
        if !self.is_precolored(v) {
            *self.degree.get_mut(&v).unwrap() += 1;
        }
    }

    fn enable_moves(&mut self, ts: &[Temp]) {
        for &t in ts {
            for m in self.node_moves(t) {
                if remove_one(&mut self.active_moves, m) {
                    self.worklist_moves.push(m);
                }
            }
        }
    }

    fn decrement_degree(&mut self, t: Temp) {
        let d = self.degree[&t];
        if self.is_precolored(t) {
            return;
        }
        self.degree.insert(t, d - 1);
        if d == self.k {
            let mut ts = vec![t];
            ts.extend(self.adjacent(t));
            self.enable_moves(&ts);
            self.spill_work_list.remove(&t);
            if self.move_related(t) {
                self.freeze_work_list.insert(t);
            } else {
                self.simplify_work_list.insert(t);
            }
        }
    }

    fn add_work_list(&mut self, t: Temp) {
        if !self.is_precolored(t) && !self.move_related(t) && self.degree[&t] < self.k {
            self.freeze_work_list.remove(&t);
            self.simplify_work_list.insert(t);
        }
    }

    /// Can `t` safely gain `r` as a neighbour without itself becoming uncolourable? George's
    /// criterion.
    fn ok(&self, t: Temp, r: Temp) -> bool {
        self.degree[&t] < self.k || self.is_precolored(t) || self.interferes_now(t, r)
    }

    /// Briggs' criterion: fewer than `k` of the combined neighbourhood are already
    /// high-degree.
    fn conservative(&self, ts: &HashSet<Temp>) -> bool {
        ts.iter().filter(|&&t| self.degree[&t] >= self.k).count() < self.k as usize
    }

    fn simplify(&mut self) {
        let t = *self.simplify_work_list.iter().next().unwrap();
        self.simplify_work_list.remove(&t);
        self.select_stack.push(t);
        for m in self.adjacent(t) {
            self.decrement_degree(m);
        }
    }

    fn combine(&mut self, u: Temp, v: Temp) {
        if self.freeze_work_list.remove(&v) {
            // already removed
        } else {
            self.spill_work_list.remove(&v);
        }
        self.coalesced_nodes.insert(v);
        self.alias.insert(v, u);

        let v_moves = self.move_list.get(&v).cloned().unwrap_or_default();
        self.move_list.entry(u).or_default().extend(v_moves);

        self.enable_moves(&[v]);

        for t in self.adjacent(v) {
            let t = self.get_alias(t);
            self.add_edge_interfere(t, u);
            self.decrement_degree(t);
        }

        if self.degree[&u] >= self.k && self.freeze_work_list.remove(&u) {
            self.spill_work_list.insert(u);
        }
    }

    /// `add_edge`: a no-op if `u` and `v` already interfere (matching `graph_add_edge`'s
    /// `graph_goes_to` dedup check), otherwise records the synthetic edge and bumps both
    /// endpoints' degree.
    fn add_edge_interfere(&mut self, u: Temp, v: Temp) {
        if u == v || self.interferes_now(u, v) {
            return;
        }
        self.extra_edges.entry(u).or_default().insert(v);
        self.extra_edges.entry(v).or_default().insert(u);
        self.add_edge_degree(u, v);
    }

    fn coalesce(&mut self) {
        let m = self.worklist_moves[0];
        self.worklist_moves.remove(0);
        let (dst, src) = m;
        let x = self.get_alias(src);
        let y = self.get_alias(dst);
        let (u, v) = if self.is_precolored(x) { (x, y) } else { (y, x) };

        if u == v {
            self.coalesced_moves.push(m);
            self.add_work_list(u);
        } else if self.is_precolored(v) || self.interferes_now(u, v) {
            self.constrained_moves.push(m);
            self.add_work_list(u);
            self.add_work_list(v);
        } else {
            let ok_to_combine = if self.is_precolored(u) {
                self.adjacent(v).into_iter().all(|t| self.ok(t, u))
            } else {
                let mut adj: HashSet<Temp> = self.adjacent(u).into_iter().collect();
                adj.extend(self.adjacent(v));
                self.conservative(&adj)
            };

            if ok_to_combine {
                self.coalesced_moves.push(m);
                self.combine(u, v);
                self.add_work_list(u);
            } else {
                self.active_moves.push(m);
            }
        }
    }

    fn freeze_moves(&mut self, u: Temp) {
        let u_alias = self.get_alias(u);
        for m @ (dst, src) in self.node_moves(u) {
            let v = if self.get_alias(dst) == u_alias { self.get_alias(src) } else { self.get_alias(dst) };

            remove_one(&mut self.active_moves, m);
            self.frozen_moves.push(m);

            if self.node_moves(v).is_empty() && self.degree[&v] < self.k {
                self.freeze_work_list.remove(&v);
                self.simplify_work_list.insert(v);
            }
        }
    }

    fn freeze(&mut self) {
        let u = *self.freeze_work_list.iter().next().unwrap();
        self.freeze_work_list.remove(&u);
        self.simplify_work_list.insert(u);
        self.freeze_moves(u);
    }

    fn select_spill(&mut self) {
        let mut best: Option<Temp> = None;
        let mut best_priority = f64::INFINITY;
        for &t in &self.spill_work_list {
            let cost = *self.spill_cost.get(&t).unwrap_or(&1) as f64;
            let degree = self.degree[&t].max(1) as f64;
            let priority = cost / degree;
            if priority < best_priority {
                best_priority = priority;
                best = Some(t);
            }
        }
        let m = best.expect("select_spill called on an empty spill work list");
        self.spill_work_list.remove(&m);
        self.simplify_work_list.insert(m);
        self.freeze_moves(m);
    }

    fn main_loop(&mut self) {
        loop {
            if !self.simplify_work_list.is_empty() {
                self.simplify();
            } else if !self.worklist_moves.is_empty() {
                self.coalesce();
            } else if !self.freeze_work_list.is_empty() {
                self.freeze();
            } else if !self.spill_work_list.is_empty() {
                self.select_spill();
            } else {
                break;
            }
        }
    }
}

/// `col_color`: the Appel/George iterated-coalescing allocator.
fn iterated_coalescing(live: &LiveGraph, initial: &HashMap<Temp, String>, registers: &[Temp]) -> ColorResult {
    let k = registers.len() as i64;

    let mut degree = HashMap::new();
    let mut work_initial = Vec::new();
    for t in live.temps() {
        if initial.contains_key(&t) {
            degree.insert(t, PRECOLORED_DEGREE);
        } else {
            degree.insert(t, live.degree(t) as i64);
            work_initial.push(t);
        }
    }

    let mut move_list = HashMap::new();
    for t in live.temps() {
        move_list.insert(t, live.move_list.get(&t).cloned().unwrap_or_default());
    }

    let mut ctx = Ctx {
        live,
        precolored: initial,
        k,
        degree,
        alias: HashMap::new(),
        extra_edges: HashMap::new(),
        simplify_work_list: HashSet::new(),
        freeze_work_list: HashSet::new(),
        spill_work_list: HashSet::new(),
        spilled_nodes: Vec::new(),
        coalesced_nodes: HashSet::new(),
        select_stack: Vec::new(),
        coalesced_moves: Vec::new(),
        constrained_moves: Vec::new(),
        frozen_moves: Vec::new(),
        worklist_moves: live.worklist_moves.clone(),
        active_moves: Vec::new(),
        move_list,
        spill_cost: &live.spill_cost,
    };

    ctx.make_work_list(work_initial);
    ctx.main_loop();

    let mut colors: HashMap<Temp, String> = initial.clone();
    let mut colored_nodes = Vec::new();

    while let Some(t) = ctx.select_stack.pop() {
        let mut ok_colors: Vec<Temp> = registers.to_vec();
        let mut neighbors: HashSet<Temp> = ctx.live.neighbors(t).into_iter().collect();
        if let Some(extra) = ctx.extra_edges.get(&t) {
            neighbors.extend(extra.iter().copied());
        }
        for w in neighbors {
            let w_alias = ctx.get_alias(w);
            if let Some(color) = colors.get(&w_alias) {
                ok_colors.retain(|r| colors.get(r).map_or(true, |rc| rc != color));
            }
        }
        match ok_colors.first() {
            Some(&r) => {
                colors.insert(t, colors[&r].clone());
                colored_nodes.push(t);
            }
            None => ctx.spilled_nodes.push(t),
        }
    }

    for &v in &ctx.coalesced_nodes {
        let alias = ctx.get_alias(v);
        if let Some(color) = colors.get(&alias).cloned() {
            colors.insert(v, color);
        }
    }

    ColorResult {
        coloring: colors,
        spills: ctx.spilled_nodes,
        coalesced_moves: ctx.coalesced_moves,
        alias: ctx.alias,
        coalesced_nodes: ctx.coalesced_nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assem::Instr;
    use crate::flowgraph::FlowGraph;
    use crate::temp::TempFactory;

    fn oper(uses: Vec<Temp>, defs: Vec<Temp>) -> Instr {
        Instr::Oper { asm: "op\n".to_string(), defs, uses, jumps: None }
    }

    fn mov(dst: Temp, src: Temp) -> Instr {
        Instr::Move { asm: "mov\n".to_string(), dst, src }
    }

    #[test]
    fn three_mutually_interfering_temps_need_three_colors() {
        let mut temps = TempFactory::new();
        let a = temps.new_temp();
        let b = temps.new_temp();
        let c = temps.new_temp();
        // a, b, c all defined then all used together: pairwise interference.
        let instrs = vec![oper(vec![], vec![a]), oper(vec![], vec![b]), oper(vec![], vec![c]), oper(vec![a, b, c], vec![])];
        let flow = FlowGraph::build(instrs);
        let live = crate::liveness::analyze(&flow);

        let r1 = temps.new_temp();
        let r2 = temps.new_temp();
        let r3 = temps.new_temp();
        let mut initial = HashMap::new();
        initial.insert(r1, "%r1".to_string());
        initial.insert(r2, "%r2".to_string());
        initial.insert(r3, "%r3".to_string());
        let registers = vec![r1, r2, r3];

        let result = color(&live, &initial, &registers, RegisterAllocator::IteratedCoalescing);
        assert!(result.spills.is_empty());
        assert_ne!(result.coloring[&a], result.coloring[&b]);
        assert_ne!(result.coloring[&b], result.coloring[&c]);
        assert_ne!(result.coloring[&a], result.coloring[&c]);
    }

    #[test]
    fn insufficient_registers_forces_a_spill() {
        let mut temps = TempFactory::new();
        let a = temps.new_temp();
        let b = temps.new_temp();
        let instrs = vec![oper(vec![], vec![a]), oper(vec![], vec![b]), oper(vec![a, b], vec![])];
        let flow = FlowGraph::build(instrs);
        let live = crate::liveness::analyze(&flow);

        let r1 = temps.new_temp();
        let mut initial = HashMap::new();
        initial.insert(r1, "%r1".to_string());
        let registers = vec![r1];

        let result = color(&live, &initial, &registers, RegisterAllocator::IteratedCoalescing);
        assert_eq!(result.spills.len(), 1);
    }

    #[test]
    fn a_move_between_non_interfering_temps_coalesces() {
        let mut temps = TempFactory::new();
        let a = temps.new_temp();
        let b = temps.new_temp();
        let instrs = vec![oper(vec![], vec![a]), mov(b, a), oper(vec![b], vec![])];
        let flow = FlowGraph::build(instrs);
        let live = crate::liveness::analyze(&flow);

        let r1 = temps.new_temp();
        let r2 = temps.new_temp();
        let mut initial = HashMap::new();
        initial.insert(r1, "%r1".to_string());
        initial.insert(r2, "%r2".to_string());
        let registers = vec![r1, r2];

        let result = color(&live, &initial, &registers, RegisterAllocator::IteratedCoalescing);
        assert_eq!(result.coalesced_moves, vec![(b, a)]);
        assert_eq!(result.coloring[&a], result.coloring[&b]);
    }

    #[test]
    fn simple_allocator_agrees_with_iterated_on_non_interfering_program() {
        let mut temps = TempFactory::new();
        let a = temps.new_temp();
        let instrs = vec![oper(vec![], vec![a]), oper(vec![a], vec![])];
        let flow = FlowGraph::build(instrs);
        let live = crate::liveness::analyze(&flow);

        let r1 = temps.new_temp();
        let mut initial = HashMap::new();
        initial.insert(r1, "%r1".to_string());
        let registers = vec![r1];

        let simple = color(&live, &initial, &registers, RegisterAllocator::Simple);
        let iterated = color(&live, &initial, &registers, RegisterAllocator::IteratedCoalescing);
        assert_eq!(simple.coloring[&a], iterated.coloring[&a]);
    }
}
