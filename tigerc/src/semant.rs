//! Type checker (C8): semantic checks, driving `translate` to build IR.
//!
//! A recursive walk over `absyn` threading a variable environment, a type environment, and the
//! label of the innermost enclosing loop (for `break`). Every error is reported through
//! `Diagnostics` and recovered from locally by substituting `Types::INT` (or, for statement
//! contexts, `Types::VOID`) so the checker can keep going and find as many problems as possible
//! in one pass, mirroring `semant.c`'s `check_ty`/`trans_exp` error recovery.

use crate::absyn::{Dec, Exp, OpKind, Ty, Var};
use crate::error::Diagnostics;
use crate::frame::Access;
use crate::isa::Isa;
use crate::symbol::{ScopedTable, Symbol, SymbolTable};
use crate::temp::{Label, LabelFactory, TempFactory};
use crate::translate::{self, ExpValue, Level, Translator};
use crate::tree::{self, RelOp};
use crate::types::{TypeData, TypeId, Types};
use std::collections::HashSet;

/// What a name in the variable environment denotes.
#[derive(Clone)]
enum EnvEntry {
    Var {
        access: Access,
        level: Level,
        typ: TypeId,
    },
    Fun {
        kind: FunKind,
        formals: Vec<TypeId>,
        result: TypeId,
    },
}

#[derive(Clone, Copy)]
enum FunKind {
    External(Label),
    Tiger(Level, Label),
}

/// Threads every piece of context the checker and translator need through one recursive walk.
pub struct Checker<'a> {
    types: &'a mut Types,
    syms: &'a mut SymbolTable,
    temps: &'a mut TempFactory,
    labels: &'a mut LabelFactory,
    isa: &'a dyn Isa,
    tr: &'a mut Translator,
    diags: &'a mut Diagnostics,
    venv: ScopedTable<EnvEntry>,
    tenv: ScopedTable<TypeId>,
    break_targets: Vec<Label>,
}

impl<'a> Checker<'a> {
    /// Create a checker with the Tiger standard library already bound in `venv`, per `env.c`'s
    /// `env_base_venv`/`env_base_tenv`.
    pub fn new(
        types: &'a mut Types,
        syms: &'a mut SymbolTable,
        temps: &'a mut TempFactory,
        labels: &'a mut LabelFactory,
        isa: &'a dyn Isa,
        tr: &'a mut Translator,
        diags: &'a mut Diagnostics,
    ) -> Self {
        let mut c = Self {
            types,
            syms,
            temps,
            labels,
            isa,
            tr,
            diags,
            venv: ScopedTable::new(),
            tenv: ScopedTable::new(),
            break_targets: Vec::new(),
        };
        c.install_base_env();
        c
    }

    fn install_base_env(&mut self) {
        let string = Types::STRING;
        let int = Types::INT;
        let void = Types::VOID;
        let external = |c: &mut Self, name: &str, formals: Vec<TypeId>, result: TypeId| {
            let sym = c.syms.intern(name);
            let label = c.labels.named(c.syms, name);
            c.venv.bind(
                sym,
                EnvEntry::Fun {
                    kind: FunKind::External(label),
                    formals,
                    result,
                },
            );
        };
        external(self, "print", vec![string], void);
        external(self, "printi", vec![int], void);
        external(self, "flush", vec![], void);
        external(self, "getchar", vec![], string);
        external(self, "ord", vec![string], int);
        external(self, "chr", vec![int], string);
        external(self, "size", vec![string], int);
        external(self, "substring", vec![string, int, int], string);
        external(self, "concat", vec![string, string], string);
        external(self, "not", vec![int], int);
        external(self, "exit", vec![int], void);

        let int_sym = self.syms.intern("int");
        self.tenv.bind(int_sym, Types::INT);
        let string_sym = self.syms.intern("string");
        self.tenv.bind(string_sym, Types::STRING);
    }

    /// Type-check and translate the whole program, wrapping it as the body of the outermost
    /// level's single implicit procedure.
    pub fn check_program(&mut self, exp: &Exp) {
        let level = self.tr.outermost();
        let (val, _typ) = self.trans_exp(exp, level);
        let body = translate::un_nx(val, self.temps, self.labels, self.syms);
        self.tr.add_func_frag(body, level, self.isa);
    }

    fn error(&mut self, pos: crate::error::Location, msg: impl Into<String>) {
        self.diags.report(pos, msg);
    }

    fn trans_exp(&mut self, exp: &Exp, level: Level) -> (ExpValue, TypeId) {
        match exp {
            Exp::Var(v) => self.trans_var(v, level),
            Exp::Nil(_) => (ExpValue::Ex(tree::Exp::Const(0)), Types::NIL),
            Exp::Int(i, _) => (ExpValue::Ex(tree::Exp::Const(*i)), Types::INT),
            Exp::Str(s, _) => {
                let e = self.tr.string_lit(self.labels, self.syms, s.clone());
                (ExpValue::Ex(e), Types::STRING)
            }
            Exp::Break(pos) => {
                match self.break_targets.last().copied() {
                    Some(done) => (translate::break_exp(done), Types::VOID),
                    None => {
                        self.error(*pos, "break outside loop");
                        (ExpValue::Nx(tree::Stm::Exp(Box::new(tree::Exp::Const(0)))), Types::VOID)
                    }
                }
            }
            Exp::Op { pos, op, left, right } => self.trans_op(*pos, *op, left, right, level),
            Exp::Call { pos, func, args } => self.trans_call(*pos, *func, args, level),
            Exp::Record { pos, typ, fields } => self.trans_record(*pos, *typ, fields, level),
            Exp::Seq(exps, _) => {
                if exps.is_empty() {
                    return (ExpValue::Nx(tree::Stm::Exp(Box::new(tree::Exp::Const(0)))), Types::VOID);
                }
                let mut stmts = Vec::new();
                let mut last_typ = Types::VOID;
                let mut last_val = None;
                for (i, e) in exps.iter().enumerate() {
                    let (val, typ) = self.trans_exp(e, level);
                    if i + 1 == exps.len() {
                        last_typ = typ;
                        last_val = Some(val);
                    } else {
                        stmts.push(translate::un_nx(val, self.temps, self.labels, self.syms));
                    }
                }
                let last = last_val.unwrap();
                if stmts.is_empty() {
                    (last, last_typ)
                } else {
                    let last_exp = translate::un_ex(last, self.temps, self.labels, self.syms);
                    let combined = tree::Stm::seq(stmts);
                    (ExpValue::Ex(tree::Exp::ESeq(Box::new(combined), Box::new(last_exp))), last_typ)
                }
            }
            Exp::Assign { pos, var, exp } => {
                let (var_val, var_typ) = self.trans_var(var, level);
                let (exp_val, exp_typ) = self.trans_exp(exp, level);
                if !self.types.compatible(var_typ, exp_typ) {
                    self.error(*pos, "type mismatch in assignment");
                }
                let dst = translate::un_ex(var_val, self.temps, self.labels, self.syms);
                let src = translate::un_ex(exp_val, self.temps, self.labels, self.syms);
                (ExpValue::Nx(tree::Stm::Move(dst, src)), Types::VOID)
            }
            Exp::If { pos, test, then, alt } => self.trans_if(*pos, test, then, alt.as_deref(), level),
            Exp::While { pos, test, body } => self.trans_while(*pos, test, body, level),
            Exp::For { pos, var, escape, lo, hi, body } => self.trans_for(*pos, *var, escape, lo, hi, body, level),
            Exp::Let { decs, body, .. } => {
                self.venv.begin_scope();
                self.tenv.begin_scope();
                let mut stmts = Vec::new();
                self.trans_decs(decs, level, &mut stmts);
                let (body_val, body_typ) = self.trans_exp(body, level);
                self.tenv.end_scope();
                self.venv.end_scope();
                if stmts.is_empty() {
                    (body_val, body_typ)
                } else {
                    let body_exp = translate::un_ex(body_val, self.temps, self.labels, self.syms);
                    let combined = tree::Stm::seq(stmts);
                    (ExpValue::Ex(tree::Exp::ESeq(Box::new(combined), Box::new(body_exp))), body_typ)
                }
            }
            Exp::Array { pos, typ, size, init } => self.trans_array(*pos, *typ, size, init, level),
        }
    }

    fn trans_op(
        &mut self,
        pos: crate::error::Location,
        op: OpKind,
        left: &Exp,
        right: &Exp,
        level: Level,
    ) -> (ExpValue, TypeId) {
        let (lval, ltyp) = self.trans_exp(left, level);
        let (rval, rtyp) = self.trans_exp(right, level);
        let lexp = translate::un_ex(lval, self.temps, self.labels, self.syms);
        let rexp = translate::un_ex(rval, self.temps, self.labels, self.syms);

        match op {
            OpKind::Plus | OpKind::Minus | OpKind::Times | OpKind::Divide => {
                if ltyp != Types::INT || rtyp != Types::INT {
                    self.error(pos, "integer required");
                }
                let bop = match op {
                    OpKind::Plus => tree::BinOp::Plus,
                    OpKind::Minus => tree::BinOp::Minus,
                    OpKind::Times => tree::BinOp::Times,
                    OpKind::Divide => tree::BinOp::Div,
                    _ => unreachable!(),
                };
                (ExpValue::Ex(tree::Exp::BinOp(bop, Box::new(lexp), Box::new(rexp))), Types::INT)
            }
            OpKind::Eq | OpKind::Neq | OpKind::Lt | OpKind::Le | OpKind::Gt | OpKind::Ge => {
                if !self.types.compatible(ltyp, rtyp) {
                    self.error(pos, "type mismatch in comparison");
                }
                let relop = match op {
                    OpKind::Eq => RelOp::Eq,
                    OpKind::Neq => RelOp::Ne,
                    OpKind::Lt => RelOp::Lt,
                    OpKind::Le => RelOp::Le,
                    OpKind::Gt => RelOp::Gt,
                    OpKind::Ge => RelOp::Ge,
                    _ => unreachable!(),
                };
                let gen: Box<dyn FnOnce(Label, Label) -> tree::Stm> =
                    Box::new(move |t, f| tree::Stm::CJump(relop, lexp, rexp, t, f));
                (ExpValue::Cx(gen), Types::INT)
            }
        }
    }

    fn trans_call(
        &mut self,
        pos: crate::error::Location,
        func: Symbol,
        args: &[Exp],
        level: Level,
    ) -> (ExpValue, TypeId) {
        let (kind, formals, result) = match self.venv.lookup(func) {
            Some(EnvEntry::Fun { kind, formals, result }) => (*kind, formals.clone(), *result),
            Some(EnvEntry::Var { .. }) => {
                self.error(pos, "expected a function, found a variable");
                return (ExpValue::Ex(tree::Exp::Const(0)), Types::INT);
            }
            None => {
                self.error(pos, format!("undeclared function `{}`", self.syms.name(func)));
                return (ExpValue::Ex(tree::Exp::Const(0)), Types::INT);
            }
        };

        if args.len() != formals.len() {
            self.error(pos, "wrong number of arguments");
        }
        let mut arg_exps = Vec::with_capacity(args.len());
        for (i, a) in args.iter().enumerate() {
            let (val, typ) = self.trans_exp(a, level);
            if let Some(&want) = formals.get(i) {
                if !self.types.compatible(typ, want) {
                    self.error(a.pos(), "argument type mismatch");
                }
            }
            arg_exps.push(translate::un_ex(val, self.temps, self.labels, self.syms));
        }

        let call_exp = match kind {
            FunKind::External(label) => self.tr.external_call(label, arg_exps),
            FunKind::Tiger(fn_level, label) => self.tr.call(label, arg_exps, fn_level, level, self.isa),
        };
        (ExpValue::Ex(call_exp), result)
    }

    fn trans_record(
        &mut self,
        pos: crate::error::Location,
        typ: Symbol,
        fields: &[(Symbol, Exp)],
        level: Level,
    ) -> (ExpValue, TypeId) {
        let decl_typ = self.lookup_type(typ, pos);
        let field_types: Vec<(Symbol, TypeId)> = match self.types.actual(decl_typ).map(|t| self.types.get(t)) {
            Some(TypeData::Record(fs)) => fs.clone(),
            _ => {
                self.error(pos, "not a record type");
                Vec::new()
            }
        };

        let mut inits = Vec::with_capacity(fields.len());
        for (name, exp) in fields {
            let (val, typ_got) = self.trans_exp(exp, level);
            if let Some((_, want)) = field_types.iter().find(|(n, _)| n == name) {
                if !self.types.compatible(typ_got, *want) {
                    self.error(exp.pos(), "field type mismatch");
                }
            } else {
                self.error(exp.pos(), "unknown record field");
            }
            inits.push(translate::un_ex(val, self.temps, self.labels, self.syms));
        }
        let malloc = self.labels.named(self.syms, "malloc");
        let e = translate::record_exp(inits, malloc, self.isa, self.temps);
        (ExpValue::Ex(e), decl_typ)
    }

    fn trans_array(
        &mut self,
        pos: crate::error::Location,
        typ: Symbol,
        size: &Exp,
        init: &Exp,
        level: Level,
    ) -> (ExpValue, TypeId) {
        let decl_typ = self.lookup_type(typ, pos);
        let elem_typ = match self.types.actual(decl_typ).map(|t| self.types.get(t)) {
            Some(TypeData::Array(elem)) => *elem,
            _ => {
                self.error(pos, "not an array type");
                Types::INT
            }
        };
        let (size_val, size_typ) = self.trans_exp(size, level);
        if size_typ != Types::INT {
            self.error(size.pos(), "array size must be an integer");
        }
        let (init_val, init_typ) = self.trans_exp(init, level);
        if !self.types.compatible(init_typ, elem_typ) {
            self.error(init.pos(), "array initialiser type mismatch");
        }
        let size_exp = translate::un_ex(size_val, self.temps, self.labels, self.syms);
        let init_exp = translate::un_ex(init_val, self.temps, self.labels, self.syms);
        let init_array = self.labels.named(self.syms, "initArray");
        let e = translate::array_exp(size_exp, init_exp, init_array);
        (ExpValue::Ex(e), decl_typ)
    }

    fn trans_if(
        &mut self,
        pos: crate::error::Location,
        test: &Exp,
        then: &Exp,
        alt: Option<&Exp>,
        level: Level,
    ) -> (ExpValue, TypeId) {
        let (test_val, test_typ) = self.trans_exp(test, level);
        if test_typ != Types::INT {
            self.error(pos, "if test must be an integer");
        }
        let (then_val, then_typ) = self.trans_exp(then, level);
        let alt_val = match alt {
            None => {
                if then_typ != Types::VOID {
                    self.error(pos, "if without else must not produce a value");
                }
                None
            }
            Some(alt_exp) => {
                let (alt_val, alt_typ) = self.trans_exp(alt_exp, level);
                if !self.types.compatible(then_typ, alt_typ) {
                    self.error(pos, "then and else branches have different types");
                }
                Some(alt_val)
            }
        };
        let result_typ = if alt.is_some() { then_typ } else { Types::VOID };
        (translate::if_exp(test_val, then_val, alt_val, self.temps, self.labels, self.syms), result_typ)
    }

    fn trans_while(&mut self, pos: crate::error::Location, test: &Exp, body: &Exp, level: Level) -> (ExpValue, TypeId) {
        let (test_val, test_typ) = self.trans_exp(test, level);
        if test_typ != Types::INT {
            self.error(pos, "while test must be an integer");
        }
        let done = self.labels.fresh(self.syms);
        self.break_targets.push(done);
        let (body_val, body_typ) = self.trans_exp(body, level);
        self.break_targets.pop();
        if body_typ != Types::VOID {
            self.error(pos, "while body must not produce a value");
        }
        (translate::while_exp(test_val, body_val, done, self.temps, self.labels, self.syms), Types::VOID)
    }

    fn trans_for(
        &mut self,
        pos: crate::error::Location,
        var: Symbol,
        escape: &std::cell::Cell<bool>,
        lo: &Exp,
        hi: &Exp,
        body: &Exp,
        level: Level,
    ) -> (ExpValue, TypeId) {
        let (lo_val, lo_typ) = self.trans_exp(lo, level);
        let (hi_val, hi_typ) = self.trans_exp(hi, level);
        if lo_typ != Types::INT || hi_typ != Types::INT {
            self.error(pos, "for bounds must be integers");
        }

        // The loop machinery in `translate::for_exp` always drives a register temp; an escaping
        // induction variable additionally gets a frame slot that is kept in sync before each
        // iteration of the body runs, so a nested function capturing it over the static link sees
        // the current value.
        let var_temp = self.temps.new_temp();
        let frame_access = if escape.get() {
            Some(self.tr.alloc_local(level, true, self.isa, self.temps))
        } else {
            None
        };

        self.venv.begin_scope();
        let visible_access = frame_access.unwrap_or(Access::InReg(var_temp));
        self.venv.bind(var, EnvEntry::Var { access: visible_access, level, typ: Types::INT });
        let done = self.labels.fresh(self.syms);
        self.break_targets.push(done);
        let (body_val, body_typ) = self.trans_exp(body, level);
        self.break_targets.pop();
        self.venv.end_scope();
        if body_typ != Types::VOID {
            self.error(pos, "for body must not produce a value");
        }

        let body_val = match frame_access {
            Some(access) => {
                let store =
                    tree::Stm::Move(access.exp(tree::Exp::Temp(self.isa.fp())), tree::Exp::Temp(var_temp));
                let body_stm = translate::un_nx(body_val, self.temps, self.labels, self.syms);
                ExpValue::Nx(tree::Stm::seq(vec![store, body_stm]))
            }
            None => body_val,
        };

        (
            translate::for_exp(var_temp, lo_val, hi_val, body_val, done, self.temps, self.labels, self.syms),
            Types::VOID,
        )
    }

    fn trans_var(&mut self, var: &Var, level: Level) -> (ExpValue, TypeId) {
        match var {
            Var::Simple(sym, pos) => match self.venv.lookup(*sym) {
                Some(EnvEntry::Var { access, level: decl_level, typ }) => {
                    let e = self.tr.simple_var(*access, *decl_level, level, self.isa);
                    (ExpValue::Ex(e), *typ)
                }
                Some(EnvEntry::Fun { .. }) => {
                    self.error(*pos, "expected a variable, found a function");
                    (ExpValue::Ex(tree::Exp::Const(0)), Types::INT)
                }
                None => {
                    self.error(*pos, format!("undeclared variable `{}`", self.syms.name(*sym)));
                    (ExpValue::Ex(tree::Exp::Const(0)), Types::INT)
                }
            },
            Var::Field(base, field, pos) => {
                let (base_val, base_typ) = self.trans_var(base, level);
                let base_exp = translate::un_ex(base_val, self.temps, self.labels, self.syms);
                let fields = match self.types.actual(base_typ).map(|t| self.types.get(t)) {
                    Some(TypeData::Record(fs)) => fs.clone(),
                    _ => {
                        self.error(*pos, "not a record type");
                        Vec::new()
                    }
                };
                match fields.iter().position(|(n, _)| n == field) {
                    Some(index) => {
                        let field_typ = fields[index].1;
                        let e = self.tr.field_var(base_exp, index as i32, self.isa);
                        (ExpValue::Ex(e), field_typ)
                    }
                    None => {
                        self.error(*pos, "no such field");
                        (ExpValue::Ex(base_exp), Types::INT)
                    }
                }
            }
            Var::Subscript(base, index, pos) => {
                let (base_val, base_typ) = self.trans_var(base, level);
                let elem_typ = match self.types.actual(base_typ).map(|t| self.types.get(t)) {
                    Some(TypeData::Array(elem)) => *elem,
                    _ => {
                        self.error(*pos, "not an array type");
                        Types::INT
                    }
                };
                let (index_val, index_typ) = self.trans_exp(index, level);
                if index_typ != Types::INT {
                    self.error(*pos, "array index must be an integer");
                }
                let base_exp = translate::un_ex(base_val, self.temps, self.labels, self.syms);
                let index_exp = translate::un_ex(index_val, self.temps, self.labels, self.syms);
                let e = self.tr.subscript_var(base_exp, index_exp, self.isa);
                (ExpValue::Ex(e), elem_typ)
            }
        }
    }

    fn lookup_type(&mut self, sym: Symbol, pos: crate::error::Location) -> TypeId {
        match self.tenv.lookup(sym) {
            Some(&t) => t,
            None => {
                self.error(pos, format!("undeclared type `{}`", self.syms.name(sym)));
                Types::INT
            }
        }
    }

    fn trans_ty(&mut self, ty: &Ty) -> TypeId {
        match ty {
            Ty::Name(sym, pos) => self.lookup_type(*sym, *pos),
            Ty::Array(sym, pos) => {
                let elem = self.lookup_type(*sym, *pos);
                self.types.array(elem)
            }
            Ty::Record(fields) => {
                let mut resolved = Vec::with_capacity(fields.len());
                for f in fields {
                    let ftyp = self.lookup_type(f.typ, f.pos);
                    resolved.push((f.name, ftyp));
                }
                self.types.record(resolved)
            }
        }
    }

    fn trans_decs(&mut self, decs: &[Dec], level: Level, stmts: &mut Vec<tree::Stm>) {
        for dec in decs {
            match dec {
                Dec::Var { pos, name, typ, escape, init } => {
                    let (init_val, init_typ) = self.trans_exp(init, level);
                    let declared_typ = match typ {
                        Some((tsym, tpos)) => Some(self.lookup_type(*tsym, *tpos)),
                        None => None,
                    };
                    match declared_typ {
                        Some(declared) => {
                            if !self.types.compatible(init_typ, declared) {
                                self.error(*pos, "initialiser does not match declared type");
                            }
                        }
                        None if init_typ == Types::NIL => {
                            self.error(*pos, "cannot initialise undeclared-type variable with nil");
                        }
                        None => {}
                    }
                    let var_typ = declared_typ.unwrap_or(init_typ);
                    let access = self.tr.alloc_local(level, escape.get(), self.isa, self.temps);
                    self.venv.bind(*name, EnvEntry::Var { access, level, typ: var_typ });
                    let init_exp = translate::un_ex(init_val, self.temps, self.labels, self.syms);
                    let dst = access.exp(tree::Exp::Temp(self.isa.fp()));
                    stmts.push(tree::Stm::Move(dst, init_exp));
                }
                Dec::Type(group) => {
                    let mut seen = HashSet::new();
                    for (name, _, pos) in group {
                        if !seen.insert(*name) {
                            self.error(*pos, "illegal redeclaration in mutually recursive type group");
                        }
                        let stub = self.types.name(*name);
                        self.tenv.bind(*name, stub);
                    }
                    let stubs: Vec<TypeId> = group.iter().map(|(n, _, _)| *self.tenv.lookup(*n).unwrap()).collect();
                    for ((_, ty, _), &stub) in group.iter().zip(stubs.iter()) {
                        let resolved = self.trans_ty(ty);
                        self.types.resolve_name(stub, resolved);
                    }
                    for ((_, _, pos), &stub) in group.iter().zip(stubs.iter()) {
                        if self.types.actual(stub).is_none() {
                            self.error(*pos, "infinite recursive type");
                        }
                    }
                }
                Dec::Function(fundecs) => {
                    let mut seen = HashSet::new();
                    let mut headers = Vec::with_capacity(fundecs.len());
                    for fd in fundecs {
                        if !seen.insert(fd.name) {
                            self.error(fd.pos, "illegal redeclaration in mutually recursive function group");
                        }
                        let formals: Vec<TypeId> =
                            fd.params.iter().map(|p| self.lookup_type(p.typ, p.pos)).collect();
                        let result = match &fd.result {
                            Some((sym, pos)) => self.lookup_type(*sym, *pos),
                            None => Types::VOID,
                        };
                        let name_str = self.syms.name(fd.name).to_string();
                        let label = self.labels.named(self.syms, &name_str);
                        let escapes: Vec<bool> = fd.params.iter().map(|p| p.escape.get()).collect();
                        let fn_level = self.tr.new_level(level, label, &escapes, self.isa);
                        self.venv.bind(
                            fd.name,
                            EnvEntry::Fun {
                                kind: FunKind::Tiger(fn_level, label),
                                formals: formals.clone(),
                                result,
                            },
                        );
                        headers.push((fn_level, formals, result));
                    }
                    for (fd, (fn_level, formals, result)) in fundecs.iter().zip(headers.into_iter()) {
                        self.venv.begin_scope();
                        let accesses = self.tr.formals(fn_level).to_vec();
                        for ((param, ftyp), access) in
                            fd.params.iter().zip(formals.into_iter()).zip(accesses.into_iter())
                        {
                            self.venv.bind(param.name, EnvEntry::Var { access, level: fn_level, typ: ftyp });
                        }
                        let (body_val, body_typ) = self.trans_exp(&fd.body, fn_level);
                        self.venv.end_scope();
                        if !self.types.compatible(body_typ, result) {
                            self.error(fd.pos, "function body does not match declared result type");
                        }
                        let body_stm = translate::un_nx(body_val, self.temps, self.labels, self.syms);
                        self.tr.add_func_frag(body_stm, fn_level, self.isa);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Location;
    use crate::isa::x86::X86;

    fn pos() -> Location {
        Location { line: 1, column: 1 }
    }

    struct Fixture {
        types: Types,
        syms: SymbolTable,
        temps: TempFactory,
        labels: LabelFactory,
        isa: X86,
        tr: Translator,
        diags: Diagnostics,
    }

    impl Fixture {
        fn new() -> Self {
            let mut temps = TempFactory::new();
            let mut labels = LabelFactory::new();
            let mut syms = SymbolTable::new();
            let isa = X86::new(&mut temps);
            let tr = Translator::new(&isa, &mut labels, &mut syms);
            Self {
                types: Types::new(),
                syms,
                temps,
                labels,
                isa,
                tr,
                diags: Diagnostics::default(),
            }
        }

        fn checker(&mut self) -> Checker<'_> {
            self.diags.reset("test.tig");
            Checker::new(
                &mut self.types,
                &mut self.syms,
                &mut self.temps,
                &mut self.labels,
                &self.isa,
                &mut self.tr,
                &mut self.diags,
            )
        }
    }

    #[test]
    fn undeclared_variable_reports_a_diagnostic() {
        let mut fx = Fixture::new();
        let mut checker = fx.checker();
        let level = checker.tr.outermost();
        let missing = checker.syms.intern("nope");
        let (_, typ) = checker.trans_var(&Var::Simple(missing, pos()), level);
        assert_eq!(typ, Types::INT);
        drop(checker);
        assert!(fx.diags.has_errors());
    }

    #[test]
    fn integer_arithmetic_type_checks_cleanly() {
        let mut fx = Fixture::new();
        let mut checker = fx.checker();
        let level = checker.tr.outermost();
        let exp = Exp::Op {
            pos: pos(),
            op: OpKind::Plus,
            left: Box::new(Exp::Int(1, pos())),
            right: Box::new(Exp::Int(2, pos())),
        };
        let (_, typ) = checker.trans_exp(&exp, level);
        assert_eq!(typ, Types::INT);
        drop(checker);
        assert!(!fx.diags.has_errors());
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let mut fx = Fixture::new();
        let mut checker = fx.checker();
        let level = checker.tr.outermost();
        checker.trans_exp(&Exp::Break(pos()), level);
        drop(checker);
        assert!(fx.diags.has_errors());
    }

    #[test]
    fn break_inside_while_jumps_to_done() {
        let mut fx = Fixture::new();
        let mut checker = fx.checker();
        let level = checker.tr.outermost();
        let loop_exp = Exp::While {
            pos: pos(),
            test: Box::new(Exp::Int(1, pos())),
            body: Box::new(Exp::Break(pos())),
        };
        let (_, typ) = checker.trans_exp(&loop_exp, level);
        assert_eq!(typ, Types::VOID);
        drop(checker);
        assert!(!fx.diags.has_errors());
    }
}
