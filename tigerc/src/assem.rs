//! Pseudo-assembly instruction records produced by instruction selection (C10) and consumed by
//! liveness analysis, register allocation, and the (out-of-scope) emitter.
//!
//! Mirrors `assem.h`'s three-way `assem_instr` union (`OPER`/`LABEL`/`MOVE`); `MOVE` is kept
//! distinct from `OPER` (rather than folded into it as a one-def one-use operation) purely so the
//! allocator can recognise coalescing candidates without pattern-matching on the template text.

use crate::temp::{Label, Temp};
use std::fmt;

/// One pseudo-assembly instruction.
#[derive(Clone, Debug)]
pub enum Instr {
    /// A non-move operation: an `asm_template` with operand placeholders `` s<i> ``/`` d<i> ``/``
    /// j<i> `` referring by position into `uses`/`defs`/`jumps`.
    Oper {
        /// Template string; the emitter substitutes `s<i>`/`d<i>`/`j<i>`.
        asm: String,
        /// Temps defined by this instruction.
        defs: Vec<Temp>,
        /// Temps used by this instruction.
        uses: Vec<Temp>,
        /// Labels this instruction may transfer control to, if it is a jump or call; `None` for
        /// instructions with only fall-through control flow.
        jumps: Option<Vec<Label>>,
    },
    /// Defines a code address; carries no operands.
    Label {
        /// Template string, typically just `"<label>:"`.
        asm: String,
        /// The label being defined.
        label: Label,
    },
    /// A register-to-register or register-to-memory move, tagged separately from `Oper` so the
    /// allocator can treat it as a coalescing candidate.
    Move {
        /// Template string.
        asm: String,
        /// Destination temp.
        dst: Temp,
        /// Source temp.
        src: Temp,
    },
}

impl Instr {
    /// Temps defined by this instruction.
    pub fn defs(&self) -> Vec<Temp> {
        match self {
            Instr::Oper { defs, .. } => defs.clone(),
            Instr::Label { .. } => Vec::new(),
            Instr::Move { dst, .. } => vec![*dst],
        }
    }

    /// Temps used by this instruction.
    pub fn uses(&self) -> Vec<Temp> {
        match self {
            Instr::Oper { uses, .. } => uses.clone(),
            Instr::Label { .. } => Vec::new(),
            Instr::Move { src, .. } => vec![*src],
        }
    }

    /// `true` for `Move` instructions — the only ones liveness treats specially (no edge between
    /// a move's own source and destination) and the allocator tries to coalesce.
    pub fn is_move(&self) -> bool {
        matches!(self, Instr::Move { .. })
    }

    /// Labels this instruction may jump to, if any.
    pub fn jumps(&self) -> Option<&[Label]> {
        match self {
            Instr::Oper { jumps, .. } => jumps.as_deref(),
            _ => None,
        }
    }

    /// The label this instruction defines, if it is a `Label`.
    pub fn label(&self) -> Option<Label> {
        match self {
            Instr::Label { label, .. } => Some(*label),
            _ => None,
        }
    }

    /// `true` if this is an unconditional jump with no fall-through successor. Mirrors
    /// `flowgraph.c`'s check of the assembly text for a literal `jmp` prefix, which is what
    /// actually distinguishes `jmp` from the conditional `je`/`jne`/... instructions C10 emits
    /// for a `CJump` — both carry a jump target and no defs, so that alone can't tell them apart.
    pub fn is_unconditional_jump(&self) -> bool {
        match self {
            Instr::Oper { asm, defs, jumps, .. } => {
                defs.is_empty() && jumps.as_ref().map_or(false, |j| !j.is_empty()) && asm.trim_start().starts_with("jmp")
            }
            _ => false,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instr::Oper { asm, .. } | Instr::Move { asm, .. } => write!(f, "{}", asm),
            Instr::Label { asm, .. } => write!(f, "{}", asm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiger_entity::EntityRef;

    #[test]
    fn move_reports_single_def_and_use() {
        let dst = Temp::new(0);
        let src = Temp::new(1);
        let m = Instr::Move {
            asm: "movl `s0, `d0".to_string(),
            dst,
            src,
        };
        assert!(m.is_move());
        assert_eq!(m.defs(), vec![dst]);
        assert_eq!(m.uses(), vec![src]);
    }
}
