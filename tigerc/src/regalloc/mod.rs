//! Spill-rewrite driver for register allocation (C12).
//!
//! Grounded on `regalloc.c`'s `regalloc_do`: repeatedly flow-graph, analyze liveness, colour,
//! and — if the colourer reports spills — rewrite the instruction list with frame-resident
//! temps swapped in around each spilled reference, then start over. Bounded at 7 attempts,
//! raising `CodegenError::SpillWatchdog` deterministically on what would be an 8th attempt,
//! replacing the original's non-fatal `errm_printf` give-up.

pub mod color;

use crate::assem::Instr;
use crate::error::{CodegenError, CodegenResult};
use crate::flowgraph::FlowGraph;
use crate::frame::{Access, Frame};
use crate::isa::Isa;
use crate::liveness;
use crate::temp::{Temp, TempFactory};
use color::{color, ColorResult, RegisterAllocator};
use std::collections::{HashMap, HashSet};

/// `regalloc.c`'s literal bound on spill-rewrite iterations before giving up.
const MAX_SPILL_ATTEMPTS: u32 = 7;

/// The finished product of register allocation for one procedure.
pub struct Allocation {
    /// Every temp's assigned machine-register name.
    pub coloring: HashMap<Temp, String>,
    /// The instruction list with coalesced moves dropped and any spilled temps rewritten
    /// through frame-resident reload/store pairs.
    pub instrs: Vec<Instr>,
}

/// Allocate registers for one procedure's selected instruction list, spilling and rewriting as
/// needed. `allocator` selects which colourer `color::color` runs each attempt; callers that
/// just want the full iterated-coalescing algorithm pass `RegisterAllocator::IteratedCoalescing`.
pub fn allocate(
    mut instrs: Vec<Instr>,
    frame: &mut Frame,
    isa: &dyn Isa,
    temps: &mut TempFactory,
    allocator: RegisterAllocator,
) -> CodegenResult<Allocation> {
    let initial: HashMap<Temp, String> = frame.initial_registers(isa).into_iter().collect();
    let registers = isa.usable_registers().to_vec();

    for attempt in 1..=MAX_SPILL_ATTEMPTS {
        let flow = FlowGraph::build(instrs.clone());
        let live = liveness::analyze(&flow);
        let result = color(&live, &initial, &registers, allocator);

        if result.spills.is_empty() {
            return Ok(Allocation {
                instrs: drop_coalesced_moves(instrs, &result),
                coloring: result.coloring,
            });
        }

        log::debug!("register allocator: spilling {} temp(s) on attempt {}", result.spills.len(), attempt);
        let spills: Vec<Temp> = full_spill_set(&result).into_iter().collect();
        instrs = rewrite_spills(instrs, &spills, frame, isa, temps);
    }

    Err(CodegenError::SpillWatchdog(MAX_SPILL_ATTEMPTS))
}

/// `result.spills` only ever names nodes that actually reached the assign phase — a temp
/// coalesced away during colouring can never independently fail to colour, only the node it was
/// unioned into can. Resolve every coalesced temp's alias chain so a spilling `u` also spills
/// every `v` unioned into it; the instruction list itself is rewritten using each occurrence's
/// own (unaliased) temp, since coalescing never touches the literal operand list, only the
/// colour-map lookup. (`regalloc.c`'s `aliased()` computes this same alias but then discards it
/// and returns the unaliased node either way — a no-op as actually executed. This resolves it
/// correctly instead of reproducing that.)
fn full_spill_set(result: &ColorResult) -> HashSet<Temp> {
    let base: HashSet<Temp> = result.spills.iter().copied().collect();
    let mut full = base.clone();
    for &v in &result.coalesced_nodes {
        let mut root = v;
        while result.coalesced_nodes.contains(&root) {
            root = result.alias[&root];
        }
        if base.contains(&root) {
            full.insert(v);
        }
    }
    full
}

fn drop_coalesced_moves(instrs: Vec<Instr>, result: &ColorResult) -> Vec<Instr> {
    let coalesced: HashSet<(Temp, Temp)> = result.coalesced_moves.iter().copied().collect();
    instrs
        .into_iter()
        .filter(|i| match i {
            Instr::Move { dst, src, .. } => !coalesced.contains(&(*dst, *src)),
            _ => true,
        })
        .collect()
}

fn reload(access: Access, fresh: Temp, isa: &dyn Isa) -> Instr {
    match access {
        Access::InFrame(offset) => Instr::Oper {
            asm: format!("movl {}(`s0), `d0\n", offset),
            defs: vec![fresh],
            uses: vec![isa.fp()],
            jumps: None,
        },
        Access::InReg(_) => unreachable!("a freshly allocated spill slot is always frame-resident"),
    }
}

fn store(access: Access, fresh: Temp, isa: &dyn Isa) -> Instr {
    match access {
        Access::InFrame(offset) => Instr::Oper {
            asm: format!("movl `s0, {}(`s1)\n", offset),
            defs: Vec::new(),
            uses: vec![fresh, isa.fp()],
            jumps: None,
        },
        Access::InReg(_) => unreachable!("a freshly allocated spill slot is always frame-resident"),
    }
}

/// Allocate a frame slot for each spilled temp and rewrite every occurrence: each spilled use
/// gets a reload into a fresh temp immediately before the instruction, each spilled def gets a
/// store from a fresh temp immediately after — a fresh temp per occurrence, not the same temp
/// reused for the reload and the store (the original C shares one identity between them; this
/// follows the fresh-temp rule the allocator's own design notes call for instead).
fn rewrite_spills(instrs: Vec<Instr>, spills: &[Temp], frame: &mut Frame, isa: &dyn Isa, temps: &mut TempFactory) -> Vec<Instr> {
    let mut slots: HashMap<Temp, Access> = HashMap::new();
    for &t in spills {
        slots.insert(t, frame.alloc_local(true, isa, temps));
    }

    let mut out = Vec::with_capacity(instrs.len());
    for instr in instrs {
        match instr {
            Instr::Oper { asm, defs, uses, jumps } => {
                let mut new_uses = Vec::with_capacity(uses.len());
                for u in uses {
                    match slots.get(&u) {
                        Some(&access) => {
                            let fresh = temps.new_temp();
                            out.push(reload(access, fresh, isa));
                            new_uses.push(fresh);
                        }
                        None => new_uses.push(u),
                    }
                }

                let mut new_defs = Vec::with_capacity(defs.len());
                let mut stores = Vec::new();
                for d in defs {
                    match slots.get(&d) {
                        Some(&access) => {
                            let fresh = temps.new_temp();
                            stores.push(store(access, fresh, isa));
                            new_defs.push(fresh);
                        }
                        None => new_defs.push(d),
                    }
                }

                out.push(Instr::Oper { asm, defs: new_defs, uses: new_uses, jumps });
                out.extend(stores);
            }
            Instr::Move { asm, dst, src } => {
                let mut new_src = src;
                if let Some(&access) = slots.get(&src) {
                    let fresh = temps.new_temp();
                    out.push(reload(access, fresh, isa));
                    new_src = fresh;
                }
                match slots.get(&dst) {
                    Some(&access) => {
                        let fresh = temps.new_temp();
                        out.push(Instr::Move { asm, dst: fresh, src: new_src });
                        out.push(store(access, fresh, isa));
                    }
                    None => out.push(Instr::Move { asm, dst, src: new_src }),
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::x86::X86;
    use crate::symbol::SymbolTable;
    use crate::temp::Label;

    fn oper(uses: Vec<Temp>, defs: Vec<Temp>) -> Instr {
        Instr::Oper { asm: "op\n".to_string(), defs, uses, jumps: None }
    }

    #[test]
    fn allocation_with_ample_registers_needs_no_spill() {
        let mut temps = TempFactory::new();
        let mut syms = SymbolTable::new();
        let isa = X86::new(&mut temps);
        let name = Label(syms.intern("f"));
        let mut frame = Frame::new(name, &[], &isa);

        let a = temps.new_temp();
        let b = temps.new_temp();
        let instrs = vec![oper(vec![], vec![a]), oper(vec![], vec![b]), oper(vec![a, b], vec![])];

        let alloc = allocate(instrs, &mut frame, &isa, &mut temps, RegisterAllocator::IteratedCoalescing).unwrap();
        assert!(alloc.coloring.contains_key(&a));
        assert!(alloc.coloring.contains_key(&b));
    }

    #[test]
    fn a_spilling_program_gets_reload_and_store_instructions_rewritten_in() {
        let mut temps = TempFactory::new();
        let mut syms = SymbolTable::new();
        let isa = X86::new(&mut temps);
        let name = Label(syms.intern("f"));
        let mut frame = Frame::new(name, &[], &isa);

        // More simultaneously-live temps than there are usable registers on a real x86 target
        // would force a spill; here we only need enough pressure to exercise the rewrite path,
        // so we reuse the real ISA's (small) register set as the ceiling.
        let k = isa.usable_registers().len();
        let mut defs = Vec::new();
        let mut def_instrs = Vec::new();
        for _ in 0..(k + 2) {
            let t = temps.new_temp();
            def_instrs.push(oper(vec![], vec![t]));
            defs.push(t);
        }
        let mut instrs = def_instrs;
        instrs.push(oper(defs, vec![]));

        let alloc = allocate(instrs, &mut frame, &isa, &mut temps, RegisterAllocator::IteratedCoalescing).unwrap();
        let reload_count = alloc.instrs.iter().filter(|i| matches!(i, Instr::Oper { asm, .. } if asm.contains("(`s0), `d0"))).count();
        assert!(reload_count > 0, "expected at least one spill reload to be rewritten in");
    }
}
