//! Type representation with named and structural equivalence.
//!
//! Mirrors the sum type `typ_ty` (`RECORD`/`NIL`/`INT`/`STRING`/`ARRAY`/`NAME`/`VOID`) from the
//! original's `types.h`, but stores each constructed type in a dense arena (`Types`) indexed by
//! `TypeId` rather than as a graph of `malloc`'d nodes, so `Name` resolution is a plain indexed
//! write instead of a pointer mutation.

use crate::symbol::Symbol;
use tiger_entity::{entity_impl, EntityRef, PrimaryMap};

/// A handle to a type stored in a `Types` arena. Two `TypeId`s compare equal iff they name the
/// same constructed type object — this is what gives `Record`/`Array` their "new type every
/// declaration" identity semantics, independent of structural shape.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);
entity_impl!(TypeId, "ty");

/// The data a `TypeId` resolves to.
pub enum TypeData {
    /// The built-in `int` type.
    Int,
    /// The built-in `string` type.
    String,
    /// The `nil` value's type; compatible with any `Record`.
    Nil,
    /// The type of expressions with no value (e.g. assignment, `while`).
    Void,
    /// A record type, with its ordered field names and types.
    Record(Vec<(Symbol, TypeId)>),
    /// An array type, with its element type.
    Array(TypeId),
    /// A named type introduced by a `type` declaration. Starts unresolved (`None`) and is
    /// mutated exactly once, by the type checker's header/body two-pass resolution, to point at
    /// the type its right-hand side denotes.
    Name(Symbol, Option<TypeId>),
}

/// Arena owning every type constructed while checking one compilation unit.
///
/// The four built-in types are interned once at construction and are reachable via the
/// associated constants `Types::INT`, `Types::STRING`, `Types::NIL`, `Types::VOID`.
pub struct Types {
    arena: PrimaryMap<TypeId, TypeData>,
}

impl Types {
    /// The built-in `int` type.
    pub const INT: TypeId = TypeId(0);
    /// The built-in `string` type.
    pub const STRING: TypeId = TypeId(1);
    /// The `nil` type.
    pub const NIL: TypeId = TypeId(2);
    /// The `void` type.
    pub const VOID: TypeId = TypeId(3);

    /// Create a fresh arena with the four built-ins already interned.
    pub fn new() -> Self {
        let mut arena = PrimaryMap::new();
        arena.push(TypeData::Int);
        arena.push(TypeData::String);
        arena.push(TypeData::Nil);
        arena.push(TypeData::Void);
        Self { arena }
    }

    /// Look up the data behind a `TypeId`.
    pub fn get(&self, id: TypeId) -> &TypeData {
        &self.arena[id]
    }

    /// Construct a fresh record type.
    pub fn record(&mut self, fields: Vec<(Symbol, TypeId)>) -> TypeId {
        self.arena.push(TypeData::Record(fields))
    }

    /// Construct a fresh array type with the given element type.
    pub fn array(&mut self, elem: TypeId) -> TypeId {
        self.arena.push(TypeData::Array(elem))
    }

    /// Construct a fresh, as-yet-unresolved named type.
    pub fn name(&mut self, sym: Symbol) -> TypeId {
        self.arena.push(TypeData::Name(sym, None))
    }

    /// Resolve a previously constructed `Name` type to `target`. Called exactly once per `Name`,
    /// during the type checker's body pass; panics if `id` is not a `Name`, which would indicate
    /// a checker bug rather than a user error.
    pub fn resolve_name(&mut self, id: TypeId, target: TypeId) {
        match &mut self.arena[id] {
            TypeData::Name(_, resolved) => *resolved = Some(target),
            _ => panic!("resolve_name called on a non-Name type"),
        }
    }

    /// Follow `Name` links to the first non-`Name` type, or `None` if the chain is unresolved or
    /// cyclic. A cycle longer than 1000 hops is treated as unresolved rather than walked forever
    /// — legal programs never build chains anywhere near that long.
    pub fn actual(&self, id: TypeId) -> Option<TypeId> {
        let mut cur = id;
        for _ in 0..1000 {
            match &self.arena[cur] {
                TypeData::Name(_, Some(next)) => cur = *next,
                TypeData::Name(_, None) => return None,
                _ => return Some(cur),
            }
        }
        None
    }

    /// `true` iff `id` resolves (through `Name` links) to a `Record`.
    pub fn is_record(&self, id: TypeId) -> bool {
        matches!(self.actual(id).map(|t| &self.arena[t]), Some(TypeData::Record(_)))
    }

    /// Two types are compatible iff, after resolving `Name` chains, they denote the same type
    /// object, or one is `Record` and the other is `Nil`.
    pub fn compatible(&self, a: TypeId, b: TypeId) -> bool {
        let (a, b) = match (self.actual(a), self.actual(b)) {
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };
        if a == b {
            return true;
        }
        (self.is_record(a) && b == Self::NIL) || (self.is_record(b) && a == Self::NIL)
    }
}

impl Default for Types {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;

    #[test]
    fn reflexive_and_nil_record_symmetry() {
        let mut syms = SymbolTable::new();
        let mut types = Types::new();
        let hd = syms.intern("hd");
        let rec = types.record(vec![(hd, Types::INT)]);
        assert!(types.compatible(rec, rec));
        assert!(types.compatible(rec, Types::NIL));
        assert!(types.compatible(Types::NIL, rec));
        assert!(types.compatible(Types::INT, Types::INT));
        assert!(!types.compatible(Types::INT, Types::STRING));
    }

    #[test]
    fn name_chain_resolves() {
        let mut syms = SymbolTable::new();
        let mut types = Types::new();
        let list = syms.intern("list");
        let n = types.name(list);
        types.resolve_name(n, Types::INT);
        assert_eq!(types.actual(n), Some(Types::INT));
        assert!(types.compatible(n, Types::INT));
    }

    #[test]
    fn unresolved_name_is_not_compatible_with_anything() {
        let mut syms = SymbolTable::new();
        let mut types = Types::new();
        let t = syms.intern("t");
        let n = types.name(t);
        assert_eq!(types.actual(n), None);
        assert!(!types.compatible(n, Types::INT));
    }

    #[test]
    fn self_referential_name_cycle_is_unresolved() {
        let mut syms = SymbolTable::new();
        let mut types = Types::new();
        let t = syms.intern("t");
        let u = syms.intern("u");
        let nt = types.name(t);
        let nu = types.name(u);
        types.resolve_name(nt, nu);
        types.resolve_name(nu, nt);
        assert_eq!(types.actual(nt), None);
    }
}
