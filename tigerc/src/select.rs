//! Maximal-munch instruction selection (C10): lowers canonicalised IR into the pseudo-assembly
//! `Instr` records register allocation consumes.
//!
//! Grounded on `x86codegen.c`'s `munch_exp`/`munch_stm` pair and their `generate_*` helpers, one
//! function per tree shape. The original threads a global `emit`/`global_instr_list`; here that
//! state lives on `Selector` so a compilation can run selection for more than one procedure
//! without resetting a static.

use crate::assem::Instr;
use crate::isa::Isa;
use crate::symbol::SymbolTable;
use crate::temp::{Label, Temp, TempFactory};
use crate::tree::{BinOp, Exp, RelOp, Stm};

/// Lowers one procedure's canonicalised statement list into pseudo-assembly, one `munch_*` call
/// per IR node the way the original's maximal munch does.
pub struct Selector<'a> {
    isa: &'a dyn Isa,
    temps: &'a mut TempFactory,
    syms: &'a SymbolTable,
    instrs: Vec<Instr>,
}

impl<'a> Selector<'a> {
    pub fn new(isa: &'a dyn Isa, temps: &'a mut TempFactory, syms: &'a SymbolTable) -> Self {
        Self { isa, temps, syms, instrs: Vec::new() }
    }

    fn label_name(&self, lab: Label) -> &str {
        self.syms.name(lab.0)
    }

    /// Select instructions for every statement in `stms`, in order, and return the emitted list.
    pub fn select(mut self, stms: Vec<Stm>) -> Vec<Instr> {
        for s in stms {
            self.munch_stm(s);
        }
        // Two adjacent labels confuse a line-oriented emitter; pad with a no-op the way the
        // original's `last_is_label` flag does.
        if matches!(self.instrs.last(), Some(Instr::Label { .. })) {
            self.emit_oper("nop\n", Vec::new(), Vec::new(), None);
        }
        self.instrs
    }

    fn emit(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    fn emit_oper(&mut self, asm: &str, defs: Vec<Temp>, uses: Vec<Temp>, jumps: Option<Vec<Label>>) {
        self.emit(Instr::Oper { asm: asm.to_string(), defs, uses, jumps });
    }

    fn emit_move(&mut self, asm: &str, dst: Temp, src: Temp) {
        self.emit(Instr::Move { asm: asm.to_string(), dst, src });
    }

    // ---- expressions ----------------------------------------------------

    fn munch_exp(&mut self, e: Exp) -> Temp {
        match e {
            Exp::Mem(addr) => self.generate_mem(*addr),
            Exp::BinOp(op, l, r) => self.generate_binop(op, *l, *r),
            Exp::Const(i) => self.generate_const(i),
            Exp::Temp(t) => t,
            Exp::Name(lab) => self.generate_name(lab),
            Exp::Call(f, args) => match *f {
                Exp::Name(lab) => {
                    self.emit_call(lab, args);
                    let t = self.temps.new_temp();
                    self.emit_move("movl `s0, `d0\n", t, self.isa.return_value());
                    t
                }
                other => panic!("cannot select an indirect call to {:?}", other),
            },
            other => panic!("cannot select an expression of shape {:?}", other),
        }
    }

    fn generate_mem(&mut self, addr: Exp) -> Temp {
        match addr {
            Exp::BinOp(BinOp::Plus, e1, e2) if matches!(*e2, Exp::Const(_)) => {
                let i = match *e2 {
                    Exp::Const(i) => i,
                    _ => unreachable!(),
                };
                let base = self.munch_exp(*e1);
                let r = self.temps.new_temp();
                self.emit_oper(&format!("movl {}(`s0), `d0\n", i), vec![r], vec![base], None);
                r
            }
            Exp::BinOp(BinOp::Plus, e1, e2) if matches!(*e1, Exp::Const(_)) => {
                let i = match *e1 {
                    Exp::Const(i) => i,
                    _ => unreachable!(),
                };
                let base = self.munch_exp(*e2);
                let r = self.temps.new_temp();
                self.emit_oper(&format!("movl {}(`s0), `d0\n", i), vec![r], vec![base], None);
                r
            }
            Exp::Const(i) => {
                let r = self.temps.new_temp();
                self.emit_oper(&format!("movl {}, `d0\n", i), vec![r], Vec::new(), None);
                r
            }
            other => {
                let base = self.munch_exp(other);
                let r = self.temps.new_temp();
                self.emit_oper("movl (`s0), `d0\n", vec![r], vec![base], None);
                r
            }
        }
    }

    fn generate_binop(&mut self, op: BinOp, l: Exp, r: Exp) -> Temp {
        match (op, l, r) {
            (BinOp::Plus, l, Exp::Const(i)) => self.munch_add_const(l, i),
            (BinOp::Plus, Exp::Const(i), r) => self.munch_add_const(r, i),
            (BinOp::Minus, l, Exp::Const(i)) => {
                let r1 = self.munch_exp(l);
                let dst = self.temps.new_temp();
                self.emit_move("movl `s0, `d0\n", dst, r1);
                self.emit_oper(&format!("subl ${}, `d0\n", i), vec![dst], vec![dst], None);
                dst
            }
            (BinOp::Div, l, r) => self.generate_div(l, r),
            (op, l, r) => self.generate_binop_general(op, l, r),
        }
    }

    fn munch_add_const(&mut self, base: Exp, i: i32) -> Temp {
        let r1 = self.munch_exp(base);
        let dst = self.temps.new_temp();
        self.emit_move("movl `s0, `d0\n", dst, r1);
        self.emit_oper(&format!("addl ${}, `d0\n", i), vec![dst], vec![dst], None);
        dst
    }

    fn generate_binop_general(&mut self, op: BinOp, l: Exp, r: Exp) -> Temp {
        let r1 = self.munch_exp(l);
        let r2 = self.munch_exp(r);
        let dst = self.temps.new_temp();
        self.emit_move("movl `s0, `d0\n", dst, r1);
        let mnemonic = match op {
            BinOp::Plus => "addl",
            BinOp::Minus => "subl",
            BinOp::Times => "imul",
            BinOp::And => "andl",
            BinOp::Or => "orl",
            BinOp::Lshift => "shll",
            BinOp::Rshift => "shrl",
            BinOp::Arshift => "sarl",
            BinOp::Xor => "xorl",
            BinOp::Div => unreachable!("division is selected by generate_div"),
        };
        self.emit_oper(&format!("{} `s0, `d0\n", mnemonic), vec![dst], vec![r2, dst], None);
        dst
    }

    fn generate_div(&mut self, l: Exp, r: Exp) -> Temp {
        let r1 = self.munch_exp(l);
        let r2 = self.munch_exp(r);
        let eax = self.isa.return_value();
        let edx = self.isa.div_remainder_register();
        self.emit_move("movl `s0, `d0\n", eax, r1);
        self.emit_oper("movl $0, `d0\n", vec![edx], Vec::new(), None);
        self.emit_oper(
            "divl `s0\n",
            vec![eax, edx],
            vec![r2, edx, eax],
            None,
        );
        let dst = self.temps.new_temp();
        self.emit_move("movl `s0, `d0\n", dst, eax);
        dst
    }

    fn generate_const(&mut self, i: i32) -> Temp {
        let r = self.temps.new_temp();
        self.emit_oper(&format!("movl ${}, `d0\n", i), vec![r], Vec::new(), None);
        r
    }

    fn generate_name(&mut self, lab: Label) -> Temp {
        let r = self.temps.new_temp();
        self.emit_oper(&format!("movl ${}, `d0\n", self.label_name(lab)), vec![r], Vec::new(), None);
        r
    }

    // ---- statements -------------------------------------------------------

    fn munch_stm(&mut self, s: Stm) {
        match s {
            Stm::Move(dst, src) => self.generate_move(dst, src),
            Stm::Label(lab) => {
                let asm = format!("{}:\n", self.label_name(lab));
                self.emit(Instr::Label { asm, label: lab });
            }
            Stm::Exp(e) => self.generate_exp_stm(*e),
            Stm::Jump(e, targets) => self.generate_jump(e, targets),
            Stm::CJump(op, l, r, t, f) => self.generate_cjump(op, l, r, t, f),
            Stm::Seq(..) => unreachable!("canonicalisation must remove every Seq before selection"),
        }
    }

    fn generate_move(&mut self, dst: Exp, src: Exp) {
        match dst {
            Exp::Mem(addr) => self.generate_move_to_mem(*addr, src),
            Exp::Temp(t) => match src {
                Exp::Call(f, args) => match *f {
                    Exp::Name(lab) => {
                        self.emit_call(lab, args);
                        self.emit_move("movl `s0, `d0\n", t, self.isa.return_value());
                    }
                    other => panic!("cannot select an indirect call to {:?}", other),
                },
                src => {
                    let r = self.munch_exp(src);
                    self.emit_move("movl `s0, `d0\n", t, r);
                }
            },
            other => panic!("move destination must be a Temp or Mem, found {:?}", other),
        }
    }

    fn generate_move_to_mem(&mut self, addr: Exp, src: Exp) {
        match addr {
            Exp::BinOp(BinOp::Plus, e1, e2) if matches!(*e2, Exp::Const(_)) => {
                let i = match *e2 {
                    Exp::Const(i) => i,
                    _ => unreachable!(),
                };
                self.generate_move_to_mem_offset(*e1, i, src);
            }
            Exp::BinOp(BinOp::Plus, e1, e2) if matches!(*e1, Exp::Const(_)) => {
                let i = match *e1 {
                    Exp::Const(i) => i,
                    _ => unreachable!(),
                };
                self.generate_move_to_mem_offset(*e2, i, src);
            }
            Exp::Const(i) => {
                let r = self.munch_exp(src);
                self.emit_oper(&format!("movl `s0, {}\n", i), Vec::new(), vec![r], None);
            }
            Exp::Mem(e2) => {
                // MOVE(MEM(e1), MEM(e2)): read through e2 before writing through e1.
                let r = self.temps.new_temp();
                let base2 = self.munch_exp(*e2);
                self.emit_oper("movl (`s0), `d0\n", vec![r], vec![base2], None);
                let base1 = self.munch_exp(addr);
                self.emit_oper("movl `s0, (`s1)\n", Vec::new(), vec![r, base1], None);
            }
            e1 => {
                let base1 = self.munch_exp(e1);
                let r2 = self.munch_exp(src);
                self.emit_oper("movl `s1, (`s0)\n", Vec::new(), vec![base1, r2], None);
            }
        }
    }

    fn generate_move_to_mem_offset(&mut self, base: Exp, i: i32, src: Exp) {
        if let Exp::Const(j) = src {
            let r = self.munch_exp(base);
            self.emit_oper(&format!("movl ${}, {}(`s0)\n", j, i), Vec::new(), vec![r], None);
        } else {
            let base_r = self.munch_exp(base);
            let src_r = self.munch_exp(src);
            self.emit_oper(&format!("movl `s1, {}(`s0)\n", i), Vec::new(), vec![base_r, src_r], None);
        }
    }

    fn generate_exp_stm(&mut self, e: Exp) {
        match e {
            Exp::Call(f, args) => match *f {
                Exp::Name(lab) => self.emit_call(lab, args),
                other => panic!("cannot select an indirect call to {:?}", other),
            },
            other => {
                self.munch_exp(other);
            }
        }
    }

    fn generate_jump(&mut self, e: Exp, targets: Vec<Label>) {
        match e {
            Exp::Name(lab) => self.emit_oper("jmp `j0\n", Vec::new(), Vec::new(), Some(vec![lab])),
            other => {
                let r = self.munch_exp(other);
                self.emit_oper("jmp *`s0\n", Vec::new(), vec![r], Some(targets));
            }
        }
    }

    fn generate_cjump(&mut self, op: RelOp, l: Exp, r: Exp, jt: Label, jf: Label) {
        let r1 = self.munch_exp(l);
        let r2 = self.munch_exp(r);
        let r3 = self.temps.new_temp();
        let r4 = self.temps.new_temp();
        self.emit_move("movl `s0, `d0\n", r3, r1);
        self.emit_move("movl `s0, `d0\n", r4, r2);
        self.emit_oper("cmp `s1, `s0\n", Vec::new(), vec![r3, r4], None);
        let opcode = match op {
            RelOp::Eq => "je",
            RelOp::Ne => "jne",
            RelOp::Lt => "jl",
            RelOp::Gt => "jg",
            RelOp::Le => "jle",
            RelOp::Ge => "jge",
            RelOp::Ult => "jb",
            RelOp::Ule => "jbe",
            RelOp::Ugt => "ja",
            RelOp::Uge => "jae",
        };
        self.emit_oper(&format!("{} `j0\n", opcode), Vec::new(), Vec::new(), Some(vec![jt]));
        self.emit_oper("jmp `j0\n", Vec::new(), Vec::new(), Some(vec![jf]));
    }

    // ---- calls --------------------------------------------------------

    fn emit_call(&mut self, target: Label, args: Vec<Exp>) {
        self.caller_save();
        let arg_temps = self.munch_args(args);
        let mut defs = vec![self.isa.return_value()];
        defs.extend_from_slice(self.isa.caller_saves());
        self.emit_oper(&format!("call {}\n", self.label_name(target)), defs, arg_temps.clone(), None);
        self.caller_restore(arg_temps.len());
    }

    /// Munch `args` right to left, pushing each onto the stack as it is munched, and return the
    /// munched temps in left-to-right order — matches the caller's cdecl push order (rightmost
    /// argument pushed first, landing deepest on the stack).
    fn munch_args(&mut self, mut args: Vec<Exp>) -> Vec<Temp> {
        if args.is_empty() {
            return Vec::new();
        }
        let head = args.remove(0);
        let mut rest = self.munch_args(args);
        let r = self.munch_exp(head);
        let sp = self.isa.sp();
        self.emit_oper("pushl `s0\n", vec![sp], vec![r], None);
        let mut out = vec![r];
        out.append(&mut rest);
        out
    }

    fn caller_save(&mut self) {
        let sp = self.isa.sp();
        for &reg in self.isa.caller_saves() {
            self.emit_oper("pushl `s0\n", vec![sp], vec![reg], None);
        }
    }

    fn caller_restore(&mut self, arg_count: usize) {
        let sp = self.isa.sp();
        let word = self.isa.word_size();
        self.emit_oper(&format!("addl ${}, `d0\n", arg_count as i32 * word), vec![sp], vec![sp], None);
        for &reg in self.isa.caller_saves().iter().rev() {
            self.emit_oper("popl `d0\n", vec![reg], vec![sp], None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::x86::X86;
    use crate::symbol::SymbolTable;

    #[test]
    fn constant_move_selects_a_single_oper() {
        let mut temps = TempFactory::new();
        let syms = SymbolTable::new();
        let isa = X86::new(&mut temps);
        let t = temps.new_temp();
        let stms = vec![Stm::Move(Exp::Temp(t), Exp::Const(42))];
        let instrs = Selector::new(&isa, &mut temps, &syms).select(stms);
        assert_eq!(instrs.len(), 1);
        assert!(matches!(&instrs[0], Instr::Oper { asm, .. } if asm.contains("42")));
    }

    #[test]
    fn cjump_emits_both_branch_targets() {
        let mut temps = TempFactory::new();
        let mut syms = SymbolTable::new();
        let isa = X86::new(&mut temps);
        let jt = Label(syms.intern("Lt"));
        let jf = Label(syms.intern("Lf"));
        let stms = vec![Stm::CJump(RelOp::Lt, Exp::Const(1), Exp::Const(2), jt, jf)];
        let instrs = Selector::new(&isa, &mut temps, &syms).select(stms);
        let jumps: Vec<_> = instrs.iter().filter_map(|i| i.jumps()).collect();
        assert_eq!(jumps.len(), 2);
    }

    #[test]
    fn call_pushes_arguments_right_to_left() {
        let mut temps = TempFactory::new();
        let mut syms = SymbolTable::new();
        let isa = X86::new(&mut temps);
        let f = Label(syms.intern("f"));
        let stms = vec![Stm::Exp(Box::new(Exp::Call(
            Box::new(Exp::Name(f)),
            vec![Exp::Const(1), Exp::Const(2)],
        )))];
        let instrs = Selector::new(&isa, &mut temps, &syms).select(stms);
        let pushes: Vec<_> = instrs
            .iter()
            .filter(|i| matches!(i, Instr::Oper { asm, .. } if asm.starts_with("pushl")))
            .collect();
        assert!(pushes.len() >= 2, "expected both arguments to be pushed");
    }
}
