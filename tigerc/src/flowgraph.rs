//! Control-flow graph construction over a selected instruction list (C11, first half).
//!
//! Grounded on `flowgraph.c`'s `fgraph_assem_flow_graph`: one graph node per non-`Label`
//! instruction, with `Label` instructions folded into a label-to-node side table instead of
//! getting nodes of their own. A fall-through edge links each instruction to the next unless the
//! instruction is a true unconditional jump; a second pass adds an explicit edge for every label
//! a jump instruction names.

use crate::assem::Instr;
use crate::collections::DiGraph;
use crate::temp::{Label, Temp};
use std::collections::HashMap;
use tiger_entity::entity_impl;

/// A node in the flow graph, wrapping the instruction it stands for.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowNode(u32);
entity_impl!(FlowNode, "fg");

/// The control-flow graph of one procedure's selected instructions.
pub struct FlowGraph {
    graph: DiGraph<FlowNode, Instr>,
    /// Nodes in the order their instructions appeared in the selected list; liveness's
    /// fixed-point loop iterates in this order purely so it converges in few passes on the
    /// common case (straight-line code with a handful of backward branches).
    order: Vec<FlowNode>,
}

impl FlowGraph {
    /// Build the flow graph for one instruction list. Unresolvable jump targets (a label naming
    /// no instruction in `instrs`) are logged and the edge is skipped, mirroring the original's
    /// non-fatal treatment of the same case.
    pub fn build(instrs: Vec<Instr>) -> Self {
        let mut graph = DiGraph::new();
        let mut order = Vec::new();
        let mut label_to_node: HashMap<Label, FlowNode> = HashMap::new();
        let mut pending_labels: Vec<Label> = Vec::new();
        let mut prev: Option<FlowNode> = None;

        for instr in instrs {
            if let Instr::Label { label, .. } = &instr {
                pending_labels.push(*label);
                continue;
            }

            let node = graph.add_node(instr);
            for label in pending_labels.drain(..) {
                label_to_node.insert(label, node);
            }

            if let Some(p) = prev {
                if !graph.payload(p).is_unconditional_jump() {
                    graph.add_edge(p, node);
                }
            }

            prev = Some(node);
            order.push(node);
        }

        for &node in &order {
            let targets = match graph.payload(node).jumps() {
                Some(labels) => labels.to_vec(),
                None => continue,
            };
            for label in targets {
                match label_to_node.get(&label) {
                    Some(&target) => graph.add_edge(node, target),
                    None => log::warn!("flow graph: jump target label has no matching instruction"),
                }
            }
        }

        Self { graph, order }
    }

    /// Temps this instruction defines.
    pub fn def(&self, n: FlowNode) -> Vec<Temp> {
        self.graph.payload(n).defs()
    }

    /// Temps this instruction uses.
    pub fn use_(&self, n: FlowNode) -> Vec<Temp> {
        self.graph.payload(n).uses()
    }

    /// Is this node a register move?
    pub fn is_move(&self, n: FlowNode) -> bool {
        self.graph.payload(n).is_move()
    }

    /// The instruction a node stands for.
    pub fn instr(&self, n: FlowNode) -> &Instr {
        self.graph.payload(n)
    }

    /// Every node, in instruction order.
    pub fn nodes(&self) -> impl Iterator<Item = FlowNode> + '_ {
        self.order.iter().copied()
    }

    /// A node's control-flow successors (fall-through and/or jump targets).
    pub fn succs(&self, n: FlowNode) -> impl Iterator<Item = FlowNode> + '_ {
        self.graph.succs(n).iter()
    }

    /// A node's control-flow predecessors.
    pub fn preds(&self, n: FlowNode) -> impl Iterator<Item = FlowNode> + '_ {
        self.graph.preds(n).iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;
    use crate::temp::{LabelFactory, TempFactory};

    fn oper(uses: Vec<Temp>, defs: Vec<Temp>) -> Instr {
        Instr::Oper { asm: "nop\n".to_string(), defs, uses, jumps: None }
    }

    #[test]
    fn straight_line_code_falls_through_in_order() {
        let mut temps = TempFactory::new();
        let a = temps.new_temp();
        let b = temps.new_temp();
        let instrs = vec![oper(vec![], vec![a]), oper(vec![a], vec![b])];
        let fg = FlowGraph::build(instrs);
        let nodes: Vec<_> = fg.nodes().collect();
        assert_eq!(nodes.len(), 2);
        assert!(fg.succs(nodes[0]).any(|n| n == nodes[1]));
        assert!(fg.preds(nodes[1]).any(|n| n == nodes[0]));
    }

    #[test]
    fn unconditional_jump_has_no_fall_through_edge() {
        let mut syms = SymbolTable::new();
        let mut labels = LabelFactory::new();
        let target = labels.fresh(&mut syms);
        let instrs = vec![
            Instr::Oper { asm: "jmp `j0\n".to_string(), defs: vec![], uses: vec![], jumps: Some(vec![target]) },
            Instr::Label { asm: "skipped:\n".to_string(), label: labels.fresh(&mut syms) },
            Instr::Label { asm: "lfoo:\n".to_string(), label: target },
            oper(vec![], vec![]),
        ];
        let fg = FlowGraph::build(instrs);
        let nodes: Vec<_> = fg.nodes().collect();
        // The jmp node has no fall-through successor, only the resolved jump edge to the
        // labeled node.
        assert_eq!(fg.succs(nodes[0]).count(), 1);
        assert!(fg.succs(nodes[0]).any(|n| n == nodes[1]));
    }

    #[test]
    fn conditional_jump_keeps_its_fall_through_edge() {
        let mut syms = SymbolTable::new();
        let mut labels = LabelFactory::new();
        let target = labels.fresh(&mut syms);
        let instrs = vec![
            Instr::Oper { asm: "je `j0\n".to_string(), defs: vec![], uses: vec![], jumps: Some(vec![target]) },
            oper(vec![], vec![]),
            Instr::Label { asm: "lfoo:\n".to_string(), label: target },
            oper(vec![], vec![]),
        ];
        let fg = FlowGraph::build(instrs);
        let nodes: Vec<_> = fg.nodes().collect();
        // je falls through to the next node AND has an edge to its jump target.
        assert_eq!(fg.succs(nodes[0]).count(), 2);
    }
}
