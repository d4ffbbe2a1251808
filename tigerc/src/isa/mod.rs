//! Target configuration seam (C4's calling-convention half).
//!
//! The allocator's register set and caller/callee-save partition, and the frame's word size and
//! formal-offset rule, are all target-configurable. Expressing them behind one trait means a
//! later 64-bit target only needs a new `Isa` impl plus a new instruction selector (C10); no
//! other module (canonicaliser, liveness, allocator driver) references target specifics
//! directly.

pub mod x86;

use crate::assem::Instr;
use crate::frame::Frame;
use crate::temp::Temp;
use crate::tree::Stm;

/// The output of `entry_exit_3`: the rewritten instruction list for a procedure, bracketed by
/// target-specific prologue/epilogue text the emitter substitutes verbatim (out of scope here —
/// see spec's Emitter interface).
pub struct ProcedureBody {
    /// Assembly text to emit immediately after the procedure's entry label.
    pub prologue: String,
    /// The procedure's allocated instruction list.
    pub body: Vec<Instr>,
    /// Assembly text to emit at the end of the procedure.
    pub epilogue: String,
}

/// A target machine's ABI and register file.
pub trait Isa {
    /// Bytes per word (4 for a 32-bit x86 target).
    fn word_size(&self) -> i32;

    /// The byte offset of the first formal (the static link) relative to the frame pointer.
    fn first_formal_offset(&self) -> i32;

    /// The byte offset of the first frame-resident local, accounting for the callee-save area.
    fn first_local_offset(&self) -> i32;

    /// The frame-pointer register.
    fn fp(&self) -> Temp;

    /// The stack-pointer register.
    fn sp(&self) -> Temp;

    /// The register holding a call's return value.
    fn return_value(&self) -> Temp;

    /// The register `divl`-family instructions also clobber alongside the dividend/quotient
    /// register (`return_value`) — `%edx` on x86, holding the sign extension going in and the
    /// remainder coming out.
    fn div_remainder_register(&self) -> Temp;

    /// Registers the callee may clobber without saving; the caller must save them across calls.
    fn caller_saves(&self) -> &[Temp];

    /// Registers the callee must save and restore if it clobbers them.
    fn callee_saves(&self) -> &[Temp];

    /// Every register the allocator may assign a colour to.
    fn usable_registers(&self) -> &[Temp];

    /// The allocator's pre-colouring: every machine register maps to its own debug name.
    fn initial_registers(&self) -> Vec<(Temp, String)>;

    /// Post-translate hook. Identity today; the seam exists so a future target can shuffle
    /// incoming argument registers into fresh pseudo-temps before the body runs.
    fn entry_exit_1(&self, body: Stm) -> Stm {
        body
    }

    /// Post-instruction-selection hook: append a "sink" `Oper` that uses `fp`, `sp`, the
    /// return-address temp and every callee-save register, forcing the allocator to treat them
    /// as live across the whole procedure.
    fn entry_exit_2(&self, mut instrs: Vec<Instr>) -> Vec<Instr> {
        let mut uses = vec![self.fp(), self.sp()];
        uses.extend_from_slice(self.callee_saves());
        instrs.push(Instr::Oper {
            asm: String::new(),
            defs: Vec::new(),
            uses,
            jumps: None,
        });
        instrs
    }

    /// Post-allocation hook: wrap the allocated body with the target's prologue/epilogue.
    fn entry_exit_3(&self, frame: &Frame, body: Vec<Instr>) -> ProcedureBody;

    /// Lower a frame's `StringFrag` payload into its `.ascii` emission text.
    fn string_literal(&self, label: &str, s: &str) -> String {
        format!("{}:\n\t.ascii \"{}\"\n", label, s.replace('\\', "\\\\").replace('"', "\\\""))
    }
}
