//! Top-level orchestration: AST in, register-allocated fragments out.
//!
//! Wires the whole middle-end together for one compilation unit: C6 (escape analysis) runs once
//! over the whole tree, C7/C8 (translation plus type checking) produces the fragment list, and
//! each procedure fragment flows independently through C9 (canonicalisation) → C10 (instruction
//! selection) → C11/C12 (flow graph, liveness, register allocation), exactly the data flow named
//! in the component overview. String-literal fragments pass straight through to the target's
//! `.ascii` lowering.

use crate::context::CompilationContext;
use crate::error::CodegenResult;
use crate::isa::ProcedureBody;
use crate::regalloc::color::RegisterAllocator;
use crate::semant::Checker;
use crate::temp::{Label, Temp};
use crate::translate::Fragment;
use crate::{canon, escape, regalloc, select};
use std::collections::HashMap;

/// One finished unit of compiler output.
pub enum CompiledFragment {
    /// A string literal's target-specific emission text.
    Str { label: Label, text: String },
    /// An allocated procedure: its prologue/body/epilogue plus the final colouring, kept around
    /// for anything downstream that wants to print a colour map (debugging, §8 test scenarios).
    Proc { body: ProcedureBody, coloring: HashMap<Temp, String> },
}

/// Run the whole pipeline over one parsed program, using `ctx` for every piece of state the
/// original kept as file-scope globals. Returns the fragments produced so far even when semantic
/// errors were reported — `ctx.diags` recovers locally and keeps checking the rest of the
/// program, so the caller should check `ctx.diags.has_errors()` independently of this return
/// value; an empty `Vec` only means no procedure or string fragment was ever recorded; it does
/// not by itself mean there were no errors.
pub fn compile(ctx: &mut CompilationContext, exp: &crate::absyn::Exp) -> CodegenResult<Vec<CompiledFragment>> {
    escape::find_escaping_vars(exp);

    {
        let mut checker = Checker::new(&mut ctx.types, &mut ctx.syms, &mut ctx.temps, &mut ctx.labels, ctx.isa.as_ref(), &mut ctx.translator, &mut ctx.diags);
        checker.check_program(exp);
    }

    if ctx.diags.has_errors() {
        return Ok(Vec::new());
    }

    let fragments = ctx.translator.take_fragments();
    let mut out = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        match fragment {
            Fragment::Str(label, text) => {
                let label_name = ctx.syms.name(label.0).to_string();
                out.push(CompiledFragment::Str {
                    label,
                    text: ctx.isa.string_literal(&label_name, &text),
                });
            }
            Fragment::Proc(body, level) => {
                let done = ctx.labels.fresh(&mut ctx.syms);
                let mut stms = canon::canonicalize(body, done, &mut ctx.temps, &mut ctx.labels, &mut ctx.syms);
                stms.push(crate::tree::Stm::Label(done));

                let selector = select::Selector::new(ctx.isa.as_ref(), &mut ctx.temps, &ctx.syms);
                let instrs = selector.select(stms);
                let instrs = ctx.isa.entry_exit_2(instrs);

                let frame = ctx.translator.frame_mut(level);
                let allocation = regalloc::allocate(instrs, frame, ctx.isa.as_ref(), &mut ctx.temps, RegisterAllocator::IteratedCoalescing)?;

                let frame = ctx.translator.frame(level);
                let proc_body = ctx.isa.entry_exit_3(frame, allocation.instrs);
                out.push(CompiledFragment::Proc { body: proc_body, coloring: allocation.coloring });
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::absyn::{Exp, Var};
    use crate::error::Location;

    fn loc() -> Location {
        Location { line: 1, column: 1 }
    }

    fn int_lit(n: i32) -> Exp {
        Exp::Int(n, loc())
    }

    #[test]
    fn a_trivial_program_compiles_to_one_procedure_fragment() {
        let mut ctx = CompilationContext::new();
        let exp = int_lit(42);
        let fragments = compile(&mut ctx, &exp).expect("no structural allocator failure");
        assert!(!ctx.diags.has_errors());
        assert_eq!(fragments.len(), 1);
        assert!(matches!(fragments[0], CompiledFragment::Proc { .. }));
    }

    #[test]
    fn an_undeclared_variable_is_reported_and_produces_no_fragments() {
        let mut ctx = CompilationContext::new();
        let sym = ctx.syms.intern("undeclared");
        let exp = Exp::Var(Var::Simple(sym, loc()));
        let fragments = compile(&mut ctx, &exp).expect("no structural allocator failure");
        assert!(ctx.diags.has_errors());
        assert!(fragments.is_empty());
    }
}
