//! Target ABI: per-procedure frame layout, formal/local access, and calling convention (C4).
//!
//! The data shapes here (`Access`, `Frame`) are target-neutral; target-specific behaviour
//! (word size, the formal offset, the usable register set) lives behind the `Isa` trait in
//! `crate::isa`, whose sole implementation today is `crate::isa::x86::X86` — see the design
//! note on keeping a later 64-bit port to replacing just this module and instruction selection.

use crate::temp::{Label, Temp};
use crate::tree::Exp;

/// How to reach one variable: a register, or an offset (in bytes) from the frame pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Lives in a machine/virtual register.
    InReg(Temp),
    /// Lives on the frame, `offset` bytes from the frame pointer.
    InFrame(i32),
}

impl Access {
    /// Lower this access to an IR expression, given an expression for the frame pointer it is
    /// relative to (the caller's own frame pointer for a local access of the current frame, or a
    /// computed static-link chain for an outer one).
    pub fn exp(&self, frame_ptr: Exp) -> Exp {
        match *self {
            Access::InReg(t) => Exp::Temp(t),
            Access::InFrame(offset) => Exp::Mem(Box::new(Exp::BinOp(
                crate::tree::BinOp::Plus,
                Box::new(frame_ptr),
                Box::new(Exp::Const(offset)),
            ))),
        }
    }
}

/// Per-procedure activation record: entry label, the ordered formal and local accesses handed
/// out so far, and a running frame-size counter.
///
/// Invariant: no two accesses in the same frame share an offset, and the offsets of
/// frame-resident locals decrease strictly as more are allocated (the stack grows down).
pub struct Frame {
    /// The procedure's entry label.
    pub name: Label,
    /// Accesses for every formal parameter, in declaration order. Index 0 is always the static
    /// link for every frame but the outermost level's.
    pub formals: Vec<Access>,
    /// Accesses for every local allocated so far.
    pub locals: Vec<Access>,
    /// The next frame-resident local's offset; decreases by one word per `InFrame` local.
    next_local_offset: i32,
}

impl Frame {
    /// Construct a new frame for a procedure named `name`, given which formals escape (must live
    /// on the frame) in declaration order, under `isa`'s ABI rules. The static link is not part of
    /// `escapes`; it is always the first formal and is prepended here.
    pub fn new(name: Label, escapes: &[bool], isa: &dyn crate::isa::Isa) -> Self {
        let mut formals = Vec::with_capacity(escapes.len() + 1);
        let mut offset = isa.first_formal_offset();
        let word = isa.word_size();

        // The static link is always escaping and always the first formal.
        formals.push(Access::InFrame(offset));
        offset += word;

        // Every formal is frame-resident, regardless of `escapes`: the calling convention C10
        // actually implements (`munch_args`) always pushes arguments rather than loading the
        // first few into registers, and `entry_exit_1` is identity, so there is no shuffle
        // anywhere that would ever populate a register access. `escapes` is still threaded
        // through so a later `alloc_local`-style register-argument port has it at hand, matching
        // `frm_new_frame`'s own signature.
        for _ in 0..escapes.len() {
            formals.push(Access::InFrame(offset));
            offset += word;
        }

        Self {
            name,
            formals,
            locals: Vec::new(),
            next_local_offset: isa.first_local_offset(),
        }
    }

    /// Allocate a new local. If `escape`, reserve the next frame slot below the frame pointer;
    /// otherwise hand back a fresh register access. Returns the `Access` so the caller can record
    /// it against the declaring variable.
    pub fn alloc_local(&mut self, escape: bool, isa: &dyn crate::isa::Isa, temps: &mut crate::temp::TempFactory) -> Access {
        let access = if escape {
            let offset = self.next_local_offset;
            self.next_local_offset -= isa.word_size();
            Access::InFrame(offset)
        } else {
            Access::InReg(temps.new_temp())
        };
        self.locals.push(access);
        access
    }

    /// Total bytes of frame-resident storage allocated to locals so far.
    pub fn size(&self) -> i32 {
        -self.next_local_offset
    }

    /// The allocator's pre-colouring seed: every machine register mapped to its own name.
    /// Grounded on `frm_initial_registers`, which takes a frame argument but returns data that's
    /// actually target-wide; kept as a per-frame method anyway since the allocator's driver calls
    /// it once per frame, matching the original's call site.
    pub fn initial_registers(&self, isa: &dyn crate::isa::Isa) -> Vec<(Temp, String)> {
        isa.initial_registers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::x86::X86;
    use crate::temp::TempFactory;

    #[test]
    fn locals_decrease_strictly() {
        let mut temps = TempFactory::new();
        let mut syms = crate::symbol::SymbolTable::new();
        let isa = X86::new(&mut temps);
        let name = crate::temp::Label(syms.intern("f"));
        let mut frame = Frame::new(name, &[], &isa);
        let a = frame.alloc_local(true, &isa, &mut temps);
        let b = frame.alloc_local(true, &isa, &mut temps);
        match (a, b) {
            (Access::InFrame(oa), Access::InFrame(ob)) => assert!(ob < oa),
            _ => panic!("expected frame-resident accesses"),
        }
    }

    #[test]
    fn non_escaping_local_is_a_register() {
        let mut temps = TempFactory::new();
        let mut syms = crate::symbol::SymbolTable::new();
        let isa = X86::new(&mut temps);
        let name = crate::temp::Label(syms.intern("f"));
        let mut frame = Frame::new(name, &[], &isa);
        let a = frame.alloc_local(false, &isa, &mut temps);
        assert!(matches!(a, Access::InReg(_)));
    }
}
