//! Black-box end-to-end scenarios for the whole pipeline.
//!
//! There is no lexer/parser in this crate's scope, so each scenario builds its `Exp` tree by
//! hand the same way `semant.rs`'s own unit tests do, instead of feeding source text through a
//! grammar. The scenarios otherwise match the Tiger programs they're named after.

use std::cell::Cell;
use tigerc::absyn::{Dec, Exp, Field, FunDec, OpKind, Ty, Var};
use tigerc::context::CompilationContext;
use tigerc::error::Location;
use tigerc::pipeline::{compile, CompiledFragment};

fn pos() -> Location {
    Location { line: 1, column: 1 }
}

fn int(n: i32) -> Exp {
    Exp::Int(n, pos())
}

fn var(v: Var) -> Exp {
    Exp::Var(v)
}

fn simple(ctx: &mut CompilationContext, name: &str) -> Var {
    Var::Simple(ctx.syms.intern(name), pos())
}

fn op(kind: OpKind, left: Exp, right: Exp) -> Exp {
    Exp::Op { pos: pos(), op: kind, left: Box::new(left), right: Box::new(right) }
}

fn let_exp(decs: Vec<Dec>, body: Exp) -> Exp {
    Exp::Let { pos: pos(), decs, body: Box::new(body) }
}

fn var_dec(ctx: &mut CompilationContext, name: &str, typ: Option<&str>, init: Exp) -> Dec {
    Dec::Var {
        pos: pos(),
        name: ctx.syms.intern(name),
        typ: typ.map(|t| (ctx.syms.intern(t), pos())),
        escape: Cell::new(false),
        init,
    }
}

/// **S1**: `let var x:=5 var y:=x+2 in y end`. Expects one procedure fragment with `y` coloured
/// to a real machine register and no reported errors.
#[test]
fn s1_straight_line_let_assigns_colour_a_surviving_temp() {
    let mut ctx = CompilationContext::new();
    let x_dec = var_dec(&mut ctx, "x", None, int(5));
    let x_ref = var(simple(&mut ctx, "x"));
    let y_dec = var_dec(&mut ctx, "y", None, op(OpKind::Plus, x_ref, int(2)));
    let y_ref = var(simple(&mut ctx, "y"));
    let program = let_exp(vec![x_dec, y_dec], y_ref);

    let fragments = compile(&mut ctx, &program).expect("no structural failure");
    assert!(!ctx.diags.has_errors(), "{}", ctx.diags.render());
    assert_eq!(fragments.len(), 1);
    match &fragments[0] {
        CompiledFragment::Proc { coloring, .. } => {
            assert!(!coloring.is_empty());
            for reg in coloring.values() {
                assert!(reg.starts_with('%'), "not a real register name: {reg}");
            }
        }
        CompiledFragment::Str { .. } => panic!("expected a procedure fragment"),
    }
}

/// **S2**: `let type list={hd:int,tl:list} var l:list:=nil in l end`. `Nil` is compatible with a
/// declared record type on a `var` binding, and type-checking succeeds.
#[test]
fn s2_nil_is_compatible_with_a_declared_record_type() {
    let mut ctx = CompilationContext::new();
    let list_sym = ctx.syms.intern("list");
    let hd_sym = ctx.syms.intern("hd");
    let tl_sym = ctx.syms.intern("tl");
    let int_sym = ctx.syms.intern("int");

    let record_ty = Ty::Record(vec![
        Field { pos: pos(), name: hd_sym, typ: int_sym, escape: Cell::new(false) },
        Field { pos: pos(), name: tl_sym, typ: list_sym, escape: Cell::new(false) },
    ]);
    let type_dec = Dec::Type(vec![(list_sym, record_ty, pos())]);
    let l_dec = var_dec(&mut ctx, "l", Some("list"), Exp::Nil(pos()));
    let l_ref = var(simple(&mut ctx, "l"));
    let program = let_exp(vec![type_dec, l_dec], l_ref);

    let fragments = compile(&mut ctx, &program).expect("no structural failure");
    assert!(!ctx.diags.has_errors(), "{}", ctx.diags.render());
    assert_eq!(fragments.len(), 1);
}

/// **S3**: `let type t=u type u=t in 0 end`. Expects the "infinite recursive type" diagnostic and
/// no fragments, since semantic errors suppress the rest of the pipeline.
#[test]
fn s3_mutually_recursive_type_alias_cycle_is_reported() {
    let mut ctx = CompilationContext::new();
    let t_sym = ctx.syms.intern("t");
    let u_sym = ctx.syms.intern("u");
    let type_dec = Dec::Type(vec![
        (t_sym, Ty::Name(u_sym, pos()), pos()),
        (u_sym, Ty::Name(t_sym, pos()), pos()),
    ]);
    let program = let_exp(vec![type_dec], int(0));

    let fragments = compile(&mut ctx, &program).expect("no structural failure");
    assert!(ctx.diags.has_errors());
    assert!(ctx.diags.render().contains("infinite recursive type"));
    assert!(fragments.is_empty());
}

/// **S4**: `let function f():int=(break; 0) in f() end`. Expects "break outside loop".
#[test]
fn s4_break_outside_a_loop_is_reported() {
    let mut ctx = CompilationContext::new();
    let f_sym = ctx.syms.intern("f");
    let int_sym = ctx.syms.intern("int");
    let body = Exp::Seq(vec![Exp::Break(pos()), int(0)], pos());
    let fundec = FunDec { pos: pos(), name: f_sym, params: vec![], result: Some((int_sym, pos())), body };
    let program = let_exp(
        vec![Dec::Function(vec![fundec])],
        Exp::Call { pos: pos(), func: f_sym, args: vec![] },
    );

    let fragments = compile(&mut ctx, &program).expect("no structural failure");
    assert!(ctx.diags.has_errors());
    assert!(ctx.diags.render().contains("break outside loop"));
    assert!(fragments.is_empty());
}

/// **S5**: `let function fib(n:int):int = if n<2 then n else fib(n-1)+fib(n-2) in fib(10) end`.
/// Expects a clean type-check and a register allocation that needs no spill, with six usable
/// registers (all the target's usable temps are live candidates for `fib`'s one live-across-call
/// value).
#[test]
fn s5_recursive_fibonacci_allocates_without_spilling() {
    let mut ctx = CompilationContext::new();
    let fib_sym = ctx.syms.intern("fib");
    let n_sym = ctx.syms.intern("n");
    let int_sym = ctx.syms.intern("int");

    let n_ref = || var(Var::Simple(n_sym, pos()));
    let call_fib = |arg: Exp| Exp::Call { pos: pos(), func: fib_sym, args: vec![arg] };
    let body = Exp::If {
        pos: pos(),
        test: Box::new(op(OpKind::Lt, n_ref(), int(2))),
        then: Box::new(n_ref()),
        alt: Some(Box::new(op(
            OpKind::Plus,
            call_fib(op(OpKind::Minus, n_ref(), int(1))),
            call_fib(op(OpKind::Minus, n_ref(), int(2))),
        ))),
    };
    let fundec = FunDec {
        pos: pos(),
        name: fib_sym,
        params: vec![Field { pos: pos(), name: n_sym, typ: int_sym, escape: Cell::new(false) }],
        result: Some((int_sym, pos())),
        body,
    };
    let program = let_exp(vec![Dec::Function(vec![fundec])], call_fib(int(10)));

    assert!(ctx.isa.usable_registers().len() >= 6);
    let fragments = compile(&mut ctx, &program).expect("register allocation must not spill");
    assert!(!ctx.diags.has_errors(), "{}", ctx.diags.render());
    // The outermost body plus `fib` itself.
    assert_eq!(fragments.len(), 2);
}

/// **S6**: `let var a:=array of int[10] of 0 in a[3]:=7; a[3] end`. Expects the array creation to
/// translate to the `initArray` external call; this is already asserted directly in `semant.rs`'s
/// own `trans_array` unit tests, so here the test only confirms the whole pipeline accepts the
/// program end to end.
#[test]
fn s6_array_creation_and_subscript_assignment_compiles() {
    let mut ctx = CompilationContext::new();
    let int_sym = ctx.syms.intern("int");
    let int_array_sym = ctx.syms.intern("intArray");
    let type_dec = Dec::Type(vec![(int_array_sym, Ty::Array(int_sym, pos()), pos())]);
    let a_dec = var_dec(
        &mut ctx,
        "a",
        None,
        Exp::Array {
            pos: pos(),
            typ: int_array_sym,
            size: Box::new(int(10)),
            init: Box::new(int(0)),
        },
    );
    fn array_subscript(ctx: &mut CompilationContext, index: i32) -> Var {
        Var::Subscript(Box::new(simple(ctx, "a")), Box::new(int(index)), pos())
    }
    let assign = Exp::Assign { pos: pos(), var: array_subscript(&mut ctx, 3), exp: Box::new(int(7)) };
    let read = var(array_subscript(&mut ctx, 3));
    let program = let_exp(vec![type_dec, a_dec], Exp::Seq(vec![assign, read], pos()));

    let fragments = compile(&mut ctx, &program).expect("no structural failure");
    assert!(!ctx.diags.has_errors(), "{}", ctx.diags.render());
    assert_eq!(fragments.len(), 1);
}
