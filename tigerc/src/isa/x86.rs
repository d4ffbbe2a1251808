//! The 32-bit x86 target, the only `Isa` this compiler implements.
//!
//! Constants are grounded on `x86frame.c`: word size 4, formals starting at `fp+8`, a
//! callee-save area of 12 bytes below the frame pointer before the first local, `cdecl`-style
//! caller/callee-save partition (`eax`/`ecx`/`edx` caller-saved, `ebx`/`esi`/`edi` callee-saved).
//! Every formal is frame-resident, matching `frm_new_frame`'s real (stack-only) behaviour and
//! C10's `munch_args`, which always pushes arguments rather than loading the first few into
//! registers.

use super::{Isa, ProcedureBody};
use crate::assem::Instr;
use crate::frame::Frame;
use crate::temp::{Temp, TempFactory};
use crate::tree::Stm;

const WORD_SIZE: i32 = 4;
const FIRST_FORMAL_OFFSET: i32 = 8;
/// `-4` (saved return address slot mirrored by the caller) `- 12` (three callee-saves), matching
/// `x86frame.c`'s comment `local variables start from %ebp - 4 - 12`.
const FIRST_LOCAL_OFFSET: i32 = -16;

/// The named machine registers and special temps of the x86 target.
pub struct X86 {
    eax: Temp,
    ecx: Temp,
    edx: Temp,
    ebx: Temp,
    esi: Temp,
    edi: Temp,
    fp: Temp,
    sp: Temp,
    ra: Temp,
    usable: Vec<Temp>,
    caller_saves: Vec<Temp>,
    callee_saves: Vec<Temp>,
}

impl X86 {
    /// Create the x86 register file, interning each register's debug name into `temps`.
    pub fn new(temps: &mut TempFactory) -> Self {
        let eax = temps.named("%eax");
        let ecx = temps.named("%ecx");
        let edx = temps.named("%edx");
        let ebx = temps.named("%ebx");
        let esi = temps.named("%esi");
        let edi = temps.named("%edi");
        let fp = temps.named("%ebp");
        let sp = temps.named("%esp");
        let ra = temps.named("%ra");

        Self {
            eax,
            ecx,
            edx,
            ebx,
            esi,
            edi,
            fp,
            sp,
            ra,
            usable: vec![eax, ebx, ecx, edx, esi, edi],
            caller_saves: vec![eax, ecx, edx],
            callee_saves: vec![ebx, esi, edi],
        }
    }

    /// The return-address pseudo-register the allocator's sink keeps live.
    pub fn return_address(&self) -> Temp {
        self.ra
    }
}

impl Isa for X86 {
    fn word_size(&self) -> i32 {
        WORD_SIZE
    }

    fn first_formal_offset(&self) -> i32 {
        FIRST_FORMAL_OFFSET
    }

    fn first_local_offset(&self) -> i32 {
        FIRST_LOCAL_OFFSET
    }

    fn fp(&self) -> Temp {
        self.fp
    }

    fn sp(&self) -> Temp {
        self.sp
    }

    fn return_value(&self) -> Temp {
        self.eax
    }

    fn div_remainder_register(&self) -> Temp {
        self.edx
    }

    fn caller_saves(&self) -> &[Temp] {
        &self.caller_saves
    }

    fn callee_saves(&self) -> &[Temp] {
        &self.callee_saves
    }

    fn usable_registers(&self) -> &[Temp] {
        &self.usable
    }

    fn initial_registers(&self) -> Vec<(Temp, String)> {
        vec![
            (self.eax, "%eax".to_string()),
            (self.ebx, "%ebx".to_string()),
            (self.ecx, "%ecx".to_string()),
            (self.edx, "%edx".to_string()),
            (self.esi, "%esi".to_string()),
            (self.edi, "%edi".to_string()),
            (self.fp, "%ebp".to_string()),
            (self.sp, "%esp".to_string()),
        ]
    }

    fn entry_exit_1(&self, body: Stm) -> Stm {
        body
    }

    fn entry_exit_3(&self, frame: &Frame, body: Vec<Instr>) -> ProcedureBody {
        const CALLEE_SAVE_NAMES: [&str; 3] = ["%ebx", "%esi", "%edi"];

        let mut prologue = String::new();
        prologue.push_str("\tpushl %ebp\n");
        prologue.push_str("\tmovl %esp, %ebp\n");
        for name in CALLEE_SAVE_NAMES {
            prologue.push_str(&format!("\tpushl {}\n", name));
        }
        prologue.push_str(&format!("\tsubl ${}, %esp\n", frame.size()));

        let mut epilogue = String::new();
        epilogue.push_str(&format!("\taddl ${}, %esp\n", frame.size()));
        for name in CALLEE_SAVE_NAMES.iter().rev() {
            epilogue.push_str(&format!("\tpopl {}\n", name));
        }
        epilogue.push_str("\tleave\n");
        epilogue.push_str("\tret\n");

        ProcedureBody {
            prologue,
            body,
            epilogue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_usable_registers() {
        let mut temps = TempFactory::new();
        let isa = X86::new(&mut temps);
        assert_eq!(isa.usable_registers().len(), 6);
    }

    #[test]
    fn static_link_lands_at_first_formal_offset() {
        let mut temps = TempFactory::new();
        let isa = X86::new(&mut temps);
        assert_eq!(isa.first_formal_offset(), 8);
    }
}
