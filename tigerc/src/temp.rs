//! Fresh virtual-register (`Temp`) and code-label (`Label`) generation, plus debug name maps.
//!
//! Grounded on `temp.c`'s `temp_new_temp`/`label_new_label`/`temp_named_label` monotonic
//! counters and `temp_layer_map` name overlay, adapted to dense entity keys.

use crate::collections::LayeredMap;
use crate::symbol::{Symbol, SymbolTable};
use tiger_entity::{entity_impl, EntityRef, PrimaryMap};

/// An abstract virtual register with a fresh integer identity, unique for the lifetime of one
/// compilation unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Temp(u32);
entity_impl!(Temp, "t");

/// A code-address label. Named labels wrap an interned `Symbol` taken verbatim from the source
/// (used for functions and externals); anonymous labels wrap a freshly interned `L<n>` symbol.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub Symbol);

/// Generates fresh `Temp`s and maintains the debug-name overlay used to print register
/// colourings and intermediate dumps.
#[derive(Default)]
pub struct TempFactory {
    temps: PrimaryMap<Temp, ()>,
    names: LayeredMap<Temp, String>,
}

impl TempFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh temp with a new identity.
    pub fn new_temp(&mut self) -> Temp {
        self.temps.push(())
    }

    /// Allocate a fresh temp and bind a debug name for it at once — used for the frame's named
    /// machine registers (`fp`, `sp`, callee/caller saves) so the allocator's pre-colouring map
    /// and the pretty-printer agree on a name without a second lookup table.
    pub fn named(&mut self, name: &str) -> Temp {
        let t = self.new_temp();
        self.names.set_base(t, name.to_string());
        t
    }

    /// Overlay a debug name for `t` in the top layer (used for register colourings assigned
    /// late, which must not clobber any base machine-register name).
    pub fn set_name(&mut self, t: Temp, name: String) {
        self.names.set(t, name);
    }

    /// The debug name for `t`, if one was bound, else its numeric `Display` form.
    pub fn name(&self, t: Temp) -> String {
        self.names.get(t).cloned().unwrap_or_else(|| t.to_string())
    }
}

/// Generates fresh anonymous labels and resolves named labels against the symbol table.
#[derive(Default)]
pub struct LabelFactory {
    counter: u32,
}

impl LabelFactory {
    /// Create a fresh factory with its anonymous-label counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A label wrapping the interned spelling of `name` verbatim — used for user-visible
    /// function entry points and for calls to the external standard library.
    pub fn named(&self, syms: &mut SymbolTable, name: &str) -> Label {
        Label(syms.intern(name))
    }

    /// A fresh anonymous label, spelled `L<n>` for a monotonically increasing `n`.
    pub fn fresh(&mut self, syms: &mut SymbolTable) -> Label {
        let n = self.counter;
        self.counter += 1;
        Label(syms.intern(&format!("L{}", n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temps_are_distinct_and_monotonic() {
        let mut f = TempFactory::new();
        let a = f.new_temp();
        let b = f.new_temp();
        assert_ne!(a, b);
        assert_eq!(a.index() + 1, b.index());
    }

    #[test]
    fn named_temp_overlay_shadows_base() {
        let mut f = TempFactory::new();
        let fp = f.named("fp");
        assert_eq!(f.name(fp), "fp");
        f.set_name(fp, "%ebp".to_string());
        assert_eq!(f.name(fp), "%ebp");
    }

    #[test]
    fn fresh_labels_are_distinct() {
        let mut syms = SymbolTable::new();
        let mut lf = LabelFactory::new();
        let l0 = lf.fresh(&mut syms);
        let l1 = lf.fresh(&mut syms);
        assert_ne!(l0, l1);
        assert_eq!(syms.name(l0.0), "L0");
    }

    #[test]
    fn named_label_reuses_symbol() {
        let mut syms = SymbolTable::new();
        let lf = LabelFactory::new();
        let main = lf.named(&mut syms, "main");
        assert_eq!(syms.name(main.0), "main");
    }
}
