//! Escape analysis (C6): mark AST variables that must live on the frame.
//!
//! One traversal of the AST with a scoped environment mapping each variable symbol to the depth
//! it was declared at and a handle to its `escape` flag. A `Simple` variable reference found at
//! a depth strictly greater than its declared depth is captured by a nested function (or, for a
//! `for`-loop variable, referenced from inside a closure built over the loop body) and must be
//! marked escaping. Mirrors `escape.c`'s `traverse_exp`/`traverse_dec`/`traverse_var` exactly,
//! including the property tested as §8.7: the flag is only ever set, never cleared, so running
//! this twice is idempotent.

use crate::absyn::{Dec, Exp, Var};
use crate::symbol::ScopedTable;
use std::cell::Cell;

type Env<'a> = ScopedTable<(u32, &'a Cell<bool>)>;

/// Run escape analysis over `exp`, the body of the whole compilation unit.
pub fn find_escaping_vars(exp: &Exp) {
    let mut env = Env::new();
    traverse_exp(&mut env, 0, exp);
}

fn traverse_exp<'a>(env: &mut Env<'a>, depth: u32, exp: &'a Exp) {
    match exp {
        Exp::Var(v) => traverse_var(env, depth, v),
        Exp::Nil(_) | Exp::Int(..) | Exp::Str(..) | Exp::Break(_) => {}
        Exp::Call { args, .. } => {
            for a in args {
                traverse_exp(env, depth, a);
            }
        }
        Exp::Record { fields, .. } => {
            for (_, e) in fields {
                traverse_exp(env, depth, e);
            }
        }
        Exp::Seq(exps, _) => {
            for e in exps {
                traverse_exp(env, depth, e);
            }
        }
        Exp::If { test, then, alt, .. } => {
            traverse_exp(env, depth, test);
            traverse_exp(env, depth, then);
            if let Some(alt) = alt {
                traverse_exp(env, depth, alt);
            }
        }
        Exp::While { test, body, .. } => {
            traverse_exp(env, depth, test);
            traverse_exp(env, depth, body);
        }
        Exp::For {
            var, escape, lo, hi, body, ..
        } => {
            traverse_exp(env, depth, lo);
            traverse_exp(env, depth, hi);
            env.begin_scope();
            env.bind(*var, (depth, escape));
            traverse_exp(env, depth, body);
            env.end_scope();
        }
        Exp::Array { size, init, .. } => {
            traverse_exp(env, depth, size);
            traverse_exp(env, depth, init);
        }
        Exp::Let { decs, body, .. } => {
            env.begin_scope();
            for dec in decs {
                traverse_dec(env, depth, dec);
            }
            env.end_scope();
            traverse_exp(env, depth, body);
        }
        Exp::Op { left, right, .. } => {
            traverse_exp(env, depth, left);
            traverse_exp(env, depth, right);
        }
        Exp::Assign { var, exp, .. } => {
            traverse_var(env, depth, var);
            traverse_exp(env, depth, exp);
        }
    }
}

fn traverse_dec<'a>(env: &mut Env<'a>, depth: u32, dec: &'a Dec) {
    match dec {
        Dec::Function(fundecs) => {
            // Every sibling in a mutually recursive group sits at the same nesting depth, one
            // deeper than the group's enclosing scope — not progressively deeper per sibling.
            let inner_depth = depth + 1;
            for fundec in fundecs {
                env.begin_scope();
                for param in &fundec.params {
                    env.bind(param.name, (inner_depth, &param.escape));
                }
                traverse_exp(env, inner_depth, &fundec.body);
                env.end_scope();
            }
        }
        Dec::Type(_) => {}
        Dec::Var { name, escape, init, .. } => {
            env.bind(*name, (depth, escape));
            traverse_exp(env, depth, init);
        }
    }
}

fn traverse_var<'a>(env: &mut Env<'a>, depth: u32, var: &'a Var) {
    match var {
        Var::Simple(sym, _) => {
            if let Some(&(declared_depth, escape)) = env.lookup(*sym) {
                if declared_depth < depth {
                    escape.set(true);
                }
            }
        }
        Var::Field(base, ..) => traverse_var(env, depth, base),
        Var::Subscript(base, index, _) => {
            traverse_var(env, depth, base);
            traverse_exp(env, depth, index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Location;
    use crate::symbol::SymbolTable;

    fn pos() -> Location {
        Location { line: 1, column: 1 }
    }

    #[test]
    fn captured_formal_is_marked_escaping() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let f = syms.intern("f");

        let inner_ref = Exp::Var(Var::Simple(x, pos()));
        let fundec = crate::absyn::FunDec {
            pos: pos(),
            name: f,
            params: Vec::new(),
            result: None,
            body: inner_ref,
        };
        let let_exp = Exp::Let {
            pos: pos(),
            decs: vec![
                Dec::Var {
                    pos: pos(),
                    name: x,
                    typ: None,
                    escape: Cell::new(false),
                    init: Exp::Int(0, pos()),
                },
                Dec::Function(vec![fundec]),
            ],
            body: Box::new(Exp::Int(0, pos())),
        };

        find_escaping_vars(&let_exp);

        if let Exp::Let { decs, .. } = &let_exp {
            if let Dec::Var { escape, .. } = &decs[0] {
                assert!(escape.get(), "x should escape: captured by nested f");
            } else {
                panic!("expected var dec");
            }
        }
    }

    #[test]
    fn every_sibling_in_a_mutually_recursive_group_sits_at_the_same_depth() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let f = syms.intern("f");
        let g = syms.intern("g");

        // f and g are mutually recursive siblings; only g refers to the outer x. If g were
        // traversed one depth deeper than f (accumulating instead of resetting per sibling), this
        // would still mark x as escaping, so this alone can't catch the bug — the point is that
        // fixing it must not regress this case.
        let f_body = Exp::Int(0, pos());
        let g_body = Exp::Var(Var::Simple(x, pos()));
        let fundec_f = crate::absyn::FunDec {
            pos: pos(),
            name: f,
            params: Vec::new(),
            result: None,
            body: f_body,
        };
        let fundec_g = crate::absyn::FunDec {
            pos: pos(),
            name: g,
            params: Vec::new(),
            result: None,
            body: g_body,
        };
        let let_exp = Exp::Let {
            pos: pos(),
            decs: vec![
                Dec::Var {
                    pos: pos(),
                    name: x,
                    typ: None,
                    escape: Cell::new(false),
                    init: Exp::Int(0, pos()),
                },
                Dec::Function(vec![fundec_f, fundec_g]),
            ],
            body: Box::new(Exp::Int(0, pos())),
        };

        find_escaping_vars(&let_exp);

        if let Exp::Let { decs, .. } = &let_exp {
            if let Dec::Var { escape, .. } = &decs[0] {
                assert!(escape.get(), "x should escape: captured by sibling g");
            } else {
                panic!("expected var dec");
            }
        }
    }

    #[test]
    fn unreferenced_local_does_not_escape() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let let_exp = Exp::Let {
            pos: pos(),
            decs: vec![Dec::Var {
                pos: pos(),
                name: x,
                typ: None,
                escape: Cell::new(false),
                init: Exp::Int(0, pos()),
            }],
            body: Box::new(Exp::Int(0, pos())),
        };
        find_escaping_vars(&let_exp);
        if let Exp::Let { decs, .. } = &let_exp {
            if let Dec::Var { escape, .. } = &decs[0] {
                assert!(!escape.get());
            }
        }
    }
}
