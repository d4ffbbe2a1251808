//! Directed graph and generic collection primitives (C13).
//!
//! Grounded on `graph.c`'s `graph_graph`/`graph_node` pair and on `temp_layer_map`'s map
//! overlay, reworked to use dense, index-stable arenas from `tiger_entity` instead of an
//! intrusive linked node list and a generic `tab_table`.

use std::fmt;
use tiger_entity::{EntityRef, EntitySet, PrimaryMap, SecondaryMap};

/// A directed graph over entity-keyed nodes, each carrying an opaque payload.
///
/// Edges are stored as adjacency sets on both endpoints (`succs`/`preds`) so successor,
/// predecessor, and "adjacency" (`succ ∪ pred`, used by the interference graph) queries are all
/// O(degree). `add_edge` is idempotent, mirroring `graph_add_edge`'s `graph_goes_to` dedup check.
pub struct DiGraph<N: EntityRef, T> {
    payloads: PrimaryMap<N, T>,
    succs: SecondaryMap<N, EntitySet<N>>,
    preds: SecondaryMap<N, EntitySet<N>>,
}

impl<N: EntityRef, T> DiGraph<N, T> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            payloads: PrimaryMap::new(),
            succs: SecondaryMap::new(),
            preds: SecondaryMap::new(),
        }
    }

    /// Add a node carrying `payload`, returning its key.
    pub fn add_node(&mut self, payload: T) -> N {
        self.payloads.push(payload)
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// Is this graph empty?
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// The payload attached to `n`.
    pub fn payload(&self, n: N) -> &T {
        &self.payloads[n]
    }

    /// Mutable access to the payload attached to `n`.
    pub fn payload_mut(&mut self, n: N) -> &mut T {
        &mut self.payloads[n]
    }

    /// Add a directed edge `from -> to`. A no-op if the edge already exists or `from == to`
    /// (the interference graph and CFG both forbid self-loops).
    pub fn add_edge(&mut self, from: N, to: N) {
        if from == to {
            return;
        }
        self.succs[from].insert(to);
        self.preds[to].insert(from);
    }

    /// Remove the directed edge `from -> to`, if present.
    pub fn remove_edge(&mut self, from: N, to: N) {
        self.succs[from].remove(to);
        self.preds[to].remove(from);
    }

    /// Does a directed edge `from -> to` exist?
    pub fn goes_to(&self, from: N, to: N) -> bool {
        self.succs[from].contains(to)
    }

    /// Successors of `n`.
    pub fn succs(&self, n: N) -> &EntitySet<N> {
        &self.succs[n]
    }

    /// Predecessors of `n`.
    pub fn preds(&self, n: N) -> &EntitySet<N> {
        &self.preds[n]
    }

    /// `in_degree(n) + out_degree(n)`.
    pub fn degree(&self, n: N) -> usize {
        self.preds[n].iter().count() + self.succs[n].iter().count()
    }

    /// `succ(n) ∪ pred(n)`, used by the interference graph where edges are conceptually
    /// undirected (stored once, on whichever endpoint `add_edge` was called with as `to`).
    pub fn adjacent(&self, n: N) -> EntitySet<N> {
        let mut adj = self.succs[n].clone();
        adj.union_with(&self.preds[n]);
        adj
    }

    /// Iterate over every node key in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = N> + '_ {
        self.payloads.keys()
    }
}

impl<N: EntityRef, T> Default for DiGraph<N, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A symmetric (undirected) graph built on top of `DiGraph`, used for the interference graph:
/// every `add_edge` inserts both directions so `adjacent` alone is a complete neighbour set.
pub struct UndirectedGraph<N: EntityRef, T> {
    inner: DiGraph<N, T>,
}

impl<N: EntityRef, T> UndirectedGraph<N, T> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self { inner: DiGraph::new() }
    }

    /// Add a node carrying `payload`.
    pub fn add_node(&mut self, payload: T) -> N {
        self.inner.add_node(payload)
    }

    /// The payload attached to `n`.
    pub fn payload(&self, n: N) -> &T {
        self.inner.payload(n)
    }

    /// Mutable access to the payload attached to `n`.
    pub fn payload_mut(&mut self, n: N) -> &mut T {
        self.inner.payload_mut(n)
    }

    /// Add an edge between `a` and `b`. No self-loops; idempotent.
    pub fn add_edge(&mut self, a: N, b: N) {
        if a == b {
            return;
        }
        self.inner.add_edge(a, b);
        self.inner.add_edge(b, a);
    }

    /// Remove the edge between `a` and `b`, if present.
    pub fn remove_edge(&mut self, a: N, b: N) {
        self.inner.remove_edge(a, b);
        self.inner.remove_edge(b, a);
    }

    /// Do `a` and `b` interfere (share an edge)?
    pub fn adjacent_to(&self, a: N, b: N) -> bool {
        self.inner.goes_to(a, b)
    }

    /// The full neighbour set of `n`.
    pub fn neighbors(&self, n: N) -> &EntitySet<N> {
        self.inner.succs(n)
    }

    /// `|neighbors(n)|`.
    pub fn degree(&self, n: N) -> usize {
        self.inner.succs(n).iter().count()
    }

    /// Iterate over every node key in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = N> + '_ {
        self.inner.nodes()
    }
}

impl<N: EntityRef, T> Default for UndirectedGraph<N, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A map overlaying a mutable top layer over an immutable base layer.
///
/// Lookup tries the top layer first, then falls through to the base — the same rule
/// `temp_layer_map` uses to let a colouring pass see both freshly assigned colours and the
/// frame's pre-coloured machine registers without copying the base map.
pub struct LayeredMap<K: EntityRef, V: Clone> {
    base: SecondaryMap<K, Option<V>>,
    top: SecondaryMap<K, Option<V>>,
}

impl<K: EntityRef, V: Clone> LayeredMap<K, V> {
    /// Create an empty layered map.
    pub fn new() -> Self {
        Self {
            base: SecondaryMap::new(),
            top: SecondaryMap::new(),
        }
    }

    /// Bind `k` to `v` in the base layer.
    pub fn set_base(&mut self, k: K, v: V) {
        self.base[k] = Some(v);
    }

    /// Bind `k` to `v` in the top layer, shadowing any base binding.
    pub fn set(&mut self, k: K, v: V) {
        self.top[k] = Some(v);
    }

    /// Look up `k`, preferring the top layer.
    pub fn get(&self, k: K) -> Option<&V> {
        self.top[k].as_ref().or_else(|| self.base[k].as_ref())
    }
}

impl<K: EntityRef, V: Clone> Default for LayeredMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: EntityRef + fmt::Display, T: fmt::Display> fmt::Display for DiGraph<N, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for n in self.nodes() {
            writeln!(f, "{}: {} ->", n, self.payload(n))?;
            for s in self.succs(n).iter() {
                write!(f, " {}", s)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiger_entity::entity_impl;

    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    struct N(u32);
    entity_impl!(N, "n");

    #[test]
    fn digraph_edges() {
        let mut g: DiGraph<N, &str> = DiGraph::new();
        let a = g.add_node("a");
        let b = g.add_node("b");
        g.add_edge(a, b);
        assert!(g.goes_to(a, b));
        assert!(!g.goes_to(b, a));
        assert_eq!(g.degree(b), 1);
        g.remove_edge(a, b);
        assert!(!g.goes_to(a, b));
    }

    #[test]
    fn undirected_graph_is_symmetric() {
        let mut g: UndirectedGraph<N, ()> = UndirectedGraph::new();
        let a = g.add_node(());
        let b = g.add_node(());
        g.add_edge(a, b);
        assert!(g.adjacent_to(a, b));
        assert!(g.adjacent_to(b, a));
        assert_eq!(g.degree(a), 1);
        assert_eq!(g.degree(b), 1);
    }

    #[test]
    fn layered_map_prefers_top() {
        let mut m: LayeredMap<N, &str> = LayeredMap::new();
        let k = N(0);
        m.set_base(k, "base");
        assert_eq!(m.get(k), Some(&"base"));
        m.set(k, "top");
        assert_eq!(m.get(k), Some(&"top"));
    }
}
