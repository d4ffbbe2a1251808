//! AST → IR translation, lexical nesting and static links (C7).
//!
//! Owns the one per-compilation piece of global state the type checker needs: the lexical
//! `Level` tree (rooted at `outermost()`) and the growing `Fragment` list. Everything else is a
//! pure function of its arguments, unlike the C original's file-scope `tra_outermost` and
//! `frag_list` statics.

use crate::frame::{Access, Frame};
use crate::isa::Isa;
use crate::symbol::SymbolTable;
use crate::temp::{Label, LabelFactory, TempFactory};
use crate::tree::{BinOp, Exp, RelOp, Stm};
use tiger_entity::{entity_impl, EntityRef, PrimaryMap};

/// A lexical-nesting node. The root level (`Translator::outermost`) has no parent and no static
/// link; every other level's frame carries the static link as its first formal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Level(u32);
entity_impl!(Level, "lvl");

struct LevelData {
    parent: Option<Level>,
    frame: Frame,
}

/// One unit of compiler output: a string literal, or a procedure body plus its frame.
pub enum Fragment {
    /// A string literal, to be emitted as a label plus a `.ascii` directive.
    Str(Label, String),
    /// A procedure body (already passed through `Isa::entry_exit_1`), paired with the level
    /// whose frame describes its formals and locals.
    Proc(Stm, Level),
}

/// The three shapes a translated AST fragment can take, matching Appel's `Ex`/`Nx`/`Cx`.
///
/// `Cx` is represented as a closure from a true/false label pair to the statement that tests the
/// condition and branches to them, rather than as a list of "back-patch handles" into a
/// pre-built tree — since the IR here is an owned `Box` tree rather than an arena of mutable
/// nodes, patching a placeholder field in place isn't available; building the final `CJump` once
/// both labels are known is the direct equivalent.
pub enum ExpValue {
    /// An expression with a value.
    Ex(Exp),
    /// A statement with no value.
    Nx(Stm),
    /// A conditional: call with the true and false labels to get the testing statement.
    Cx(Box<dyn FnOnce(Label, Label) -> Stm>),
}

/// Convert any `ExpValue` to an expression, materialising a fresh temp for a `Cx`.
pub fn un_ex(v: ExpValue, temps: &mut TempFactory, labels: &mut LabelFactory, syms: &mut SymbolTable) -> Exp {
    match v {
        ExpValue::Ex(e) => e,
        ExpValue::Nx(s) => Exp::ESeq(Box::new(s), Box::new(Exp::Const(0))),
        ExpValue::Cx(genstm) => {
            let r = temps.new_temp();
            let t = labels.fresh(syms);
            let f = labels.fresh(syms);
            let body = Stm::seq(vec![
                Stm::Move(Exp::Temp(r), Exp::Const(1)),
                genstm(t, f),
                Stm::Label(f),
                Stm::Move(Exp::Temp(r), Exp::Const(0)),
                Stm::Label(t),
            ]);
            Exp::ESeq(Box::new(body), Box::new(Exp::Temp(r)))
        }
    }
}

/// Convert any `ExpValue` to a statement run for effect only.
pub fn un_nx(v: ExpValue, temps: &mut TempFactory, labels: &mut LabelFactory, syms: &mut SymbolTable) -> Stm {
    match v {
        ExpValue::Nx(s) => s,
        other => Stm::Exp(Box::new(un_ex(other, temps, labels, syms))),
    }
}

/// Convert any `ExpValue` to a conditional-branch generator.
pub fn un_cx(v: ExpValue) -> Box<dyn FnOnce(Label, Label) -> Stm> {
    match v {
        ExpValue::Cx(genstm) => genstm,
        ExpValue::Nx(_) => panic!("un_cx applied to a value-less Nx"),
        ExpValue::Ex(Exp::Const(0)) => Box::new(|_t, f| Stm::Jump(Exp::Name(f), vec![f])),
        ExpValue::Ex(Exp::Const(_)) => Box::new(|t, _f| Stm::Jump(Exp::Name(t), vec![t])),
        ExpValue::Ex(e) => Box::new(move |t, f| Stm::CJump(RelOp::Ne, e, Exp::Const(0), t, f)),
    }
}

/// Owns the level tree and the fragment list for one compilation unit.
pub struct Translator {
    levels: PrimaryMap<Level, LevelData>,
    outermost: Level,
    fragments: Vec<Fragment>,
}

impl Translator {
    /// Create a translator with just the outermost (parent-less) level.
    pub fn new(isa: &dyn Isa, labels: &mut LabelFactory, syms: &mut SymbolTable) -> Self {
        let mut levels = PrimaryMap::new();
        let name = labels.named(syms, "tigermain");
        let frame = Frame::new(name, &[], isa);
        let outermost = levels.push(LevelData { parent: None, frame });
        Self {
            levels,
            outermost,
            fragments: Vec::new(),
        }
    }

    /// The root level every top-level declaration is translated under.
    pub fn outermost(&self) -> Level {
        self.outermost
    }

    /// Create a new nested level for a function declared with the given formal-escape flags
    /// (not counting the implicit static link, which every level but the outermost gets).
    pub fn new_level(&mut self, parent: Level, name: Label, formal_escapes: &[bool], isa: &dyn Isa) -> Level {
        let frame = Frame::new(name, formal_escapes, isa);
        self.levels.push(LevelData { parent: Some(parent), frame })
    }

    /// The accesses for this level's formals, excluding the implicit static link.
    pub fn formals(&self, level: Level) -> &[Access] {
        &self.levels[level].frame.formals[1..]
    }

    /// Allocate a new local in `level`'s frame.
    pub fn alloc_local(&mut self, level: Level, escape: bool, isa: &dyn Isa, temps: &mut TempFactory) -> Access {
        self.levels[level].frame.alloc_local(escape, isa, temps)
    }

    fn parent(&self, level: Level) -> Option<Level> {
        self.levels[level].parent
    }

    /// Compute the IR expression for the frame pointer of `target`, as seen from code executing
    /// at `use_level`, by walking the static-link chain.
    fn frame_pointer_of(&self, use_level: Level, target: Level, isa: &dyn Isa) -> Exp {
        let mut level = use_level;
        let mut fp_exp = Exp::Temp(isa.fp());
        while level != target {
            let sl_access = self.levels[level].frame.formals[0];
            fp_exp = sl_access.exp(fp_exp);
            level = self.parent(level).expect("walked past outermost level without reaching target");
        }
        fp_exp
    }

    /// Lower a reference to a simple variable declared with `access` at `access_level`, used
    /// from code running at `use_level`.
    pub fn simple_var(&self, access: Access, access_level: Level, use_level: Level, isa: &dyn Isa) -> Exp {
        let fp_exp = self.frame_pointer_of(use_level, access_level, isa);
        access.exp(fp_exp)
    }

    /// `record_exp.field_index * word_size` offset access.
    pub fn field_var(&self, record_exp: Exp, field_index: i32, isa: &dyn Isa) -> Exp {
        Exp::Mem(Box::new(Exp::BinOp(
            BinOp::Plus,
            Box::new(record_exp),
            Box::new(Exp::Const(field_index * isa.word_size())),
        )))
    }

    /// `array_exp[index_exp]`, index scaled by word size.
    pub fn subscript_var(&self, array_exp: Exp, index_exp: Exp, isa: &dyn Isa) -> Exp {
        Exp::Mem(Box::new(Exp::BinOp(
            BinOp::Plus,
            Box::new(array_exp),
            Box::new(Exp::BinOp(
                BinOp::Times,
                Box::new(index_exp),
                Box::new(Exp::Const(isa.word_size())),
            )),
        )))
    }

    /// Call `fn_level`'s procedure from code at `caller_level`, prepending the computed static
    /// link.
    pub fn call(&self, label: Label, args: Vec<Exp>, fn_level: Level, caller_level: Level, isa: &dyn Isa) -> Exp {
        let parent = self.parent(fn_level).expect("call to a procedure with no enclosing level");
        let sl = self.frame_pointer_of(caller_level, parent, isa);
        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(sl);
        full_args.extend(args);
        Exp::Call(Box::new(Exp::Name(label)), full_args)
    }

    /// Call an external (standard-library) routine, with no static link.
    pub fn external_call(&self, label: Label, args: Vec<Exp>) -> Exp {
        Exp::Call(Box::new(Exp::Name(label)), args)
    }

    /// Allocate a label for a string literal and record its fragment; returns its address.
    pub fn string_lit(&mut self, labels: &mut LabelFactory, syms: &mut SymbolTable, s: String) -> Exp {
        let label = labels.fresh(syms);
        self.fragments.push(Fragment::Str(label, s));
        Exp::Name(label)
    }

    /// Record a finished procedure body under `level`, applying the target's post-translate
    /// hook.
    pub fn add_func_frag(&mut self, body: Stm, level: Level, isa: &dyn Isa) {
        self.fragments.push(Fragment::Proc(isa.entry_exit_1(body), level));
    }

    /// The frame belonging to `level` — needed once instruction selection and allocation run.
    pub fn frame(&self, level: Level) -> &Frame {
        &self.levels[level].frame
    }

    /// Mutable access to the frame belonging to `level` — the register allocator's spill-rewrite
    /// loop needs this to grow the frame with a slot per spilled temp.
    pub fn frame_mut(&mut self, level: Level) -> &mut Frame {
        &mut self.levels[level].frame
    }

    /// Take the fragment list built so far, leaving the level tree (and so every frame) intact —
    /// the driver still needs `frame`/`frame_mut` by level after this to run C10-C12 per fragment.
    pub fn take_fragments(&mut self) -> Vec<Fragment> {
        std::mem::take(&mut self.fragments)
    }

    /// Consume the translator, yielding its fragment list.
    pub fn into_fragments(self) -> Vec<Fragment> {
        self.fragments
    }
}

/// `if test then then_ [else alt]`.
pub fn if_exp(
    test: ExpValue,
    then_: ExpValue,
    alt: Option<ExpValue>,
    temps: &mut TempFactory,
    labels: &mut LabelFactory,
    syms: &mut SymbolTable,
) -> ExpValue {
    let test_gen = un_cx(test);
    let t_label = labels.fresh(syms);
    let f_label = labels.fresh(syms);
    let test_stm = test_gen(t_label, f_label);

    match alt {
        None => {
            let then_stm = un_nx(then_, temps, labels, syms);
            ExpValue::Nx(Stm::seq(vec![
                test_stm,
                Stm::Label(t_label),
                then_stm,
                Stm::Label(f_label),
            ]))
        }
        Some(alt) => {
            let done = labels.fresh(syms);
            let result = temps.new_temp();
            let then_exp = un_ex(then_, temps, labels, syms);
            let alt_exp = un_ex(alt, temps, labels, syms);
            let stm = Stm::seq(vec![
                test_stm,
                Stm::Label(t_label),
                Stm::Move(Exp::Temp(result), then_exp),
                Stm::Jump(Exp::Name(done), vec![done]),
                Stm::Label(f_label),
                Stm::Move(Exp::Temp(result), alt_exp),
                Stm::Label(done),
            ]);
            ExpValue::Ex(Exp::ESeq(Box::new(stm), Box::new(Exp::Temp(result))))
        }
    }
}

/// `while test do body`; `done` is the label `break` targets inside `body`.
pub fn while_exp(
    test: ExpValue,
    body: ExpValue,
    done: Label,
    temps: &mut TempFactory,
    labels: &mut LabelFactory,
    syms: &mut SymbolTable,
) -> ExpValue {
    let test_label = labels.fresh(syms);
    let body_label = labels.fresh(syms);
    let test_gen = un_cx(test);
    let test_stm = test_gen(body_label, done);
    let body_stm = un_nx(body, temps, labels, syms);
    ExpValue::Nx(Stm::seq(vec![
        Stm::Label(test_label),
        test_stm,
        Stm::Label(body_label),
        body_stm,
        Stm::Jump(Exp::Name(test_label), vec![test_label]),
        Stm::Label(done),
    ]))
}

/// `for var := lo to hi do body`, desugared to a `while` loop over a temp holding `hi`, per the
/// spec's mandated rewrite of the original's stubbed `for` translation.
pub fn for_exp(
    var: crate::temp::Temp,
    lo: ExpValue,
    hi: ExpValue,
    body: ExpValue,
    done: Label,
    temps: &mut TempFactory,
    labels: &mut LabelFactory,
    syms: &mut SymbolTable,
) -> ExpValue {
    let lo_exp = un_ex(lo, temps, labels, syms);
    let hi_exp = un_ex(hi, temps, labels, syms);
    let hi_temp = temps.new_temp();
    let body_stm = un_nx(body, temps, labels, syms);

    let test_label = labels.fresh(syms);
    let body_label = labels.fresh(syms);
    let incr_label = labels.fresh(syms);

    ExpValue::Nx(Stm::seq(vec![
        Stm::Move(Exp::Temp(var), lo_exp),
        Stm::Move(Exp::Temp(hi_temp), hi_exp),
        Stm::Label(test_label),
        Stm::CJump(RelOp::Le, Exp::Temp(var), Exp::Temp(hi_temp), body_label, done),
        Stm::Label(body_label),
        body_stm,
        Stm::CJump(RelOp::Lt, Exp::Temp(var), Exp::Temp(hi_temp), incr_label, done),
        Stm::Label(incr_label),
        Stm::Move(Exp::Temp(var), Exp::BinOp(BinOp::Plus, Box::new(Exp::Temp(var)), Box::new(Exp::Const(1)))),
        Stm::Jump(Exp::Name(test_label), vec![test_label]),
        Stm::Label(done),
    ]))
}

/// `break`, jumping to the innermost enclosing loop's `done` label.
pub fn break_exp(done: Label) -> ExpValue {
    ExpValue::Nx(Stm::Jump(Exp::Name(done), vec![done]))
}

/// `malloc(count * word_size)` followed by moves of each field initialiser into consecutive
/// slots; the expression's value is the record's base pointer.
pub fn record_exp(
    inits: Vec<Exp>,
    malloc_label: Label,
    isa: &dyn Isa,
    temps: &mut TempFactory,
) -> Exp {
    let r = temps.new_temp();
    let word = isa.word_size();
    let size = Exp::Const(inits.len() as i32 * word);
    let mut stmts = vec![Stm::Move(
        Exp::Temp(r),
        Exp::Call(Box::new(Exp::Name(malloc_label)), vec![size]),
    )];
    for (i, init) in inits.into_iter().enumerate() {
        let dst = Exp::Mem(Box::new(Exp::BinOp(
            BinOp::Plus,
            Box::new(Exp::Temp(r)),
            Box::new(Exp::Const(i as i32 * word)),
        )));
        stmts.push(Stm::Move(dst, init));
    }
    Exp::ESeq(Box::new(Stm::seq(stmts)), Box::new(Exp::Temp(r)))
}

/// `initArray(size, init)` external call.
pub fn array_exp(size: Exp, init: Exp, init_array_label: Label) -> Exp {
    Exp::Call(Box::new(Exp::Name(init_array_label)), vec![size, init])
}
