//! Interned identifiers and scoped symbol tables.
//!
//! `Symbol` gives every distinct spelling a unique, comparable-by-identity integer the way
//! `sym_new_symbol` hashes interned names into a linked list of `_sym_symbol` nodes; `ScopedTable`
//! is the generic "mark and pop" scope stack that `sym_begin_scope`/`sym_end_scope` implement over
//! a generic `tab_table`, specialised here per value type instead of `void *`.

use std::collections::HashMap;
use tiger_entity::{entity_impl, EntityRef, PrimaryMap, SecondaryMap};

/// An interned identifier. Two symbols are equal iff they were interned from equal strings;
/// comparison is a plain integer compare, never a string compare.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);
entity_impl!(Symbol, "sym");

/// Interning table mapping spellings to `Symbol`s and back.
///
/// Owned by `CompilationContext` for the lifetime of a compilation unit; nothing here is process
/// global, unlike the C original's single static table reused across runs.
#[derive(Default)]
pub struct SymbolTable {
    names: PrimaryMap<Symbol, String>,
    ids: HashMap<String, Symbol>,
}

impl SymbolTable {
    /// Create a new, empty interning table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the existing symbol if one was already interned for this
    /// spelling, or creating a fresh one.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&sym) = self.ids.get(name) {
            return sym;
        }
        let sym = self.names.push(name.to_string());
        self.ids.insert(name.to_string(), sym);
        sym
    }

    /// Look up the spelling a symbol was interned from.
    pub fn name(&self, sym: Symbol) -> &str {
        &self.names[sym]
    }
}

/// A binding entry together with the position in the scope history it was pushed at, so
/// `lookup_until_mark` can tell whether the innermost binding predates the most recent mark.
#[derive(Clone)]
struct Entry<V: Clone> {
    pushed_at: usize,
    value: V,
}

/// A mapping from `Symbol` to `V` with nested lexical scopes.
///
/// `bind` pushes a new innermost binding for a symbol; `lookup` returns the innermost live
/// binding; `begin_scope`/`end_scope` bracket a lexical scope, and `end_scope` undoes exactly the
/// bindings made since the matching `begin_scope`, in reverse order, restoring whatever outer
/// binding (if any) was shadowed.
pub struct ScopedTable<V: Clone> {
    stacks: SecondaryMap<Symbol, Vec<Entry<V>>>,
    history: Vec<Symbol>,
    marks: Vec<usize>,
}

impl<V: Clone> ScopedTable<V> {
    /// Create a new, empty table with no open scopes.
    pub fn new() -> Self {
        Self {
            stacks: SecondaryMap::new(),
            history: Vec::new(),
            marks: Vec::new(),
        }
    }

    /// Bind `sym` to `value` in the current (innermost) scope, shadowing any outer binding.
    pub fn bind(&mut self, sym: Symbol, value: V) {
        let pushed_at = self.history.len();
        self.stacks[sym].push(Entry { pushed_at, value });
        self.history.push(sym);
    }

    /// Look up the innermost live binding for `sym`, if any.
    pub fn lookup(&self, sym: Symbol) -> Option<&V> {
        self.stacks[sym].last().map(|e| &e.value)
    }

    /// Open a new scope. Every binding made before the matching `end_scope` is undone by it.
    pub fn begin_scope(&mut self) {
        self.marks.push(self.history.len());
    }

    /// Close the innermost open scope, undoing every binding made since the matching
    /// `begin_scope`, in reverse (last-bound-first-undone) order.
    pub fn end_scope(&mut self) {
        let mark = self.marks.pop().expect("end_scope with no matching begin_scope");
        while self.history.len() > mark {
            let sym = self.history.pop().unwrap();
            self.stacks[sym].pop();
        }
    }

    /// Look up `sym`, but only if its innermost binding was made after the most recently opened
    /// (still-open) scope mark — used by the type checker to reject, for example, seeing a
    /// formal parameter of one function while type-checking a sibling's body in the same group.
    pub fn lookup_until_mark(&self, sym: Symbol) -> Option<&V> {
        let mark = *self.marks.last().unwrap_or(&0);
        self.stacks[sym]
            .last()
            .filter(|e| e.pushed_at >= mark)
            .map(|e| &e.value)
    }
}

impl<V: Clone> Default for ScopedTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_identity() {
        let mut t = SymbolTable::new();
        let a = t.intern("x");
        let b = t.intern("x");
        let c = t.intern("y");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(t.name(a), "x");
    }

    #[test]
    fn scoped_round_trip() {
        let mut syms = SymbolTable::new();
        let k = syms.intern("k");
        let mut t: ScopedTable<i32> = ScopedTable::new();
        t.bind(k, 1);
        t.begin_scope();
        t.bind(k, 2);
        assert_eq!(t.lookup(k), Some(&2));
        t.end_scope();
        assert_eq!(t.lookup(k), Some(&1));
    }

    #[test]
    fn lookup_until_mark_only_sees_fresh_bindings() {
        let mut syms = SymbolTable::new();
        let k = syms.intern("k");
        let mut t: ScopedTable<i32> = ScopedTable::new();
        t.bind(k, 1);
        t.begin_scope();
        assert_eq!(t.lookup_until_mark(k), None);
        t.bind(k, 2);
        assert_eq!(t.lookup_until_mark(k), Some(&2));
        t.end_scope();
    }
}
