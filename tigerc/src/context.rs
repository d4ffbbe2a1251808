//! The single owner of everything the original kept as file-scope global state (C's
//! `static col_ctx c;` in `color.c`, `static sym_table *block_env` in `canon.c`, the fresh-temp
//! and fresh-label counters, the outermost level and fragment list, the error-count globals).
//!
//! One `CompilationContext` is threaded by `&mut` through the whole pipeline instead; there is
//! no global mutable state anywhere in this crate.

use crate::error::Diagnostics;
use crate::isa::x86::X86;
use crate::isa::Isa;
use crate::symbol::SymbolTable;
use crate::temp::{LabelFactory, TempFactory};
use crate::translate::Translator;
use crate::types::Types;

/// Everything one compilation unit needs, owned in one place.
pub struct CompilationContext {
    pub syms: SymbolTable,
    pub types: Types,
    pub temps: TempFactory,
    pub labels: LabelFactory,
    pub isa: Box<dyn Isa>,
    pub translator: Translator,
    pub diags: Diagnostics,
}

impl CompilationContext {
    /// Build a fresh context for the (only) supported target.
    pub fn new() -> Self {
        let mut temps = TempFactory::new();
        let isa: Box<dyn Isa> = Box::new(X86::new(&mut temps));
        let mut labels = LabelFactory::new();
        let mut syms = SymbolTable::new();
        let translator = Translator::new(isa.as_ref(), &mut labels, &mut syms);

        Self {
            syms,
            types: Types::new(),
            temps,
            labels,
            isa,
            translator,
            diags: Diagnostics::default(),
        }
    }

    /// Discard everything and start over for a new source file named `file` — the direct
    /// analogue of `errm_reset(filename)`, extended to cover every piece of state this struct
    /// replaces rather than just the diagnostics accumulator.
    pub fn reset(&mut self, file: impl Into<String>) {
        *self = Self::new();
        self.diags.reset(file);
    }
}

impl Default for CompilationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_gives_a_usable_fresh_context() {
        let mut ctx = CompilationContext::new();
        let a = ctx.temps.new_temp();
        ctx.diags.report(crate::error::Location { line: 1, column: 1 }, "oops");
        assert!(ctx.diags.has_errors());

        ctx.reset("b.tig");
        assert!(!ctx.diags.has_errors());
        let b = ctx.temps.new_temp();
        // The reset context's own fresh temp is still well-formed, independent of the stale `a`
        // from before the reset.
        assert_ne!(a, b);
    }
}
