//! Code generation: lowering resolved definitions to G-machine instructions.
//!
//! Three mutually recursive schemes compile a body at stack depth `d`:
//!
//! - `R` compiles the tail of a supercombinator, ending with
//!   `Update d; Pop d; Unwind` (or `Return` inside a case continuation);
//! - `C` builds an expression's graph lazily without evaluating it;
//! - `E` evaluates an expression to WHNF, used for primitive operands,
//!   `if` conditions, and `case` scrutinees.
//!
//! The compile-time environment maps parameters and local slots to absolute
//! stack depths; a variable at absolute depth `o` compiles to `Push (d - o)`,
//! so offsets stay correct as the dynamic stack grows.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};

use crate::{
    ast::{Alt, Binding, Def, Expr, Program, SlotId, VarTarget},
    error::{CompileError, CompileErrorKind, CompileResult},
    gmachine::op::{Code, Instr},
    names::{NameId, Names},
    symtab::{ScRecord, SymbolTable},
};

/// Compiles every definition of a resolved program.
///
/// Returns the records to commit, including any constructor globals
/// synthesized for unsaturated `Pack` mentions.
pub(crate) fn compile_program(
    program: &Program,
    names: &mut Names,
    symtab: &SymbolTable,
) -> CompileResult<Vec<ScRecord>> {
    let mut compiler = Compiler {
        names,
        symtab,
        ctor_records: Vec::new(),
        ctor_ids: AHashSet::new(),
    };
    let mut records = Vec::with_capacity(program.defs.len());
    for def in &program.defs {
        records.push(compiler.compile_def(def)?);
    }
    records.append(&mut compiler.ctor_records);
    Ok(records)
}

/// Compile-time environment: parameter count plus local-slot depths.
struct Env {
    arity: usize,
    locals: AHashMap<SlotId, usize>,
}

impl Env {
    /// Absolute depth of a parameter: the first argument sits on top of the
    /// rearranged stack, at depth `arity`.
    fn arg_depth(&self, index: u32) -> usize {
        self.arity - index as usize
    }
}

struct Compiler<'a> {
    names: &'a mut Names,
    symtab: &'a SymbolTable,
    /// Constructor globals synthesized during this compilation.
    ctor_records: Vec<ScRecord>,
    ctor_ids: AHashSet<NameId>,
}

impl Compiler<'_> {
    fn compile_def(&mut self, def: &Def) -> CompileResult<ScRecord> {
        let name = self.names.intern(&def.name);
        let arity = def.params.len();
        let mut env = Env {
            arity,
            locals: AHashMap::new(),
        };
        let mut code = Vec::new();
        self.r_scheme(&def.body, &mut env, arity, &mut code)?;
        Ok(ScRecord {
            name,
            arity,
            code: Arc::new(code),
        })
    }

    /// R scheme: compile `expr` as the tail of the current supercombinator,
    /// with `d` entries currently above the redex root.
    fn r_scheme(&mut self, expr: &Expr, env: &mut Env, d: usize, out: &mut Vec<Instr>) -> CompileResult<()> {
        match expr {
            Expr::Let {
                recursive,
                bindings,
                body,
            } => {
                let d = self.compile_bindings(bindings, *recursive, env, d, out)?;
                self.r_scheme(body, env, d, out)
            }
            Expr::Case { scrutinee, alts } => {
                self.e_scheme(scrutinee, env, d, out)?;
                let arms = self.compile_alts(alts, env, d, CaseCtx::Tail)?;
                out.push(Instr::CaseJump(arms));
                Ok(())
            }
            Expr::If { cond, then, otherwise } => {
                self.e_scheme(cond, env, d, out)?;
                let t = self.r_block(then, env, d)?;
                let f = self.r_block(otherwise, env, d)?;
                out.push(Instr::Cond(t, f));
                Ok(())
            }
            Expr::BinOp { .. } => {
                self.e_scheme(expr, env, d, out)?;
                out.extend([Instr::Update(d), Instr::Pop(d), Instr::Unwind]);
                Ok(())
            }
            _ => {
                self.c_scheme(expr, env, d, out)?;
                out.extend([Instr::Update(d), Instr::Pop(d), Instr::Unwind]);
                Ok(())
            }
        }
    }

    fn r_block(&mut self, expr: &Expr, env: &mut Env, d: usize) -> CompileResult<Code> {
        let mut code = Vec::new();
        self.r_scheme(expr, env, d, &mut code)?;
        Ok(Arc::new(code))
    }

    /// E scheme: compile `expr` so its WHNF ends up on top of the stack.
    fn e_scheme(&mut self, expr: &Expr, env: &mut Env, d: usize, out: &mut Vec<Instr>) -> CompileResult<()> {
        match expr {
            Expr::Int(n) => {
                out.push(Instr::PushInt(n.clone()));
                Ok(())
            }
            Expr::Decimal(v) => {
                out.push(Instr::PushDecimal(v.clone()));
                Ok(())
            }
            Expr::Char(c) => {
                out.push(Instr::PushChar(*c));
                Ok(())
            }
            Expr::Let {
                recursive,
                bindings,
                body,
            } => {
                let d2 = self.compile_bindings(bindings, *recursive, env, d, out)?;
                self.e_scheme(body, env, d2, out)?;
                out.push(Instr::Slide(d2 - d));
                Ok(())
            }
            Expr::Case { scrutinee, alts } => {
                self.e_scheme(scrutinee, env, d, out)?;
                let arms = self.compile_alts(alts, env, d, CaseCtx::Inner)?;
                out.push(Instr::CaseJump(arms));
                Ok(())
            }
            Expr::If { cond, then, otherwise } => {
                self.e_scheme(cond, env, d, out)?;
                let t = self.e_block(then, env, d)?;
                let f = self.e_block(otherwise, env, d)?;
                out.push(Instr::Cond(t, f));
                Ok(())
            }
            Expr::BinOp { op, lhs, rhs } => {
                self.e_scheme(lhs, env, d, out)?;
                self.e_scheme(rhs, env, d + 1, out)?;
                out.push(Instr::Binary(*op));
                Ok(())
            }
            Expr::App(..) | Expr::Pack { .. } => {
                if self.saturated_pack(expr)?.is_some() {
                    self.emit_saturated_pack(expr, env, d, out)
                } else {
                    self.c_scheme(expr, env, d, out)?;
                    out.push(Instr::Eval);
                    Ok(())
                }
            }
            _ => {
                self.c_scheme(expr, env, d, out)?;
                out.push(Instr::Eval);
                Ok(())
            }
        }
    }

    fn e_block(&mut self, expr: &Expr, env: &mut Env, d: usize) -> CompileResult<Code> {
        let mut code = Vec::new();
        self.e_scheme(expr, env, d, &mut code)?;
        Ok(Arc::new(code))
    }

    /// C scheme: build the graph of `expr` without evaluating anything.
    fn c_scheme(&mut self, expr: &Expr, env: &mut Env, d: usize, out: &mut Vec<Instr>) -> CompileResult<()> {
        match expr {
            Expr::Var(var) => {
                let instr = match var.target {
                    VarTarget::Global(id) => Instr::PushGlobal(id),
                    VarTarget::Arg(index) => Instr::Push(d - env.arg_depth(index)),
                    VarTarget::Local(slot) => {
                        let depth = env.locals.get(&slot).copied().ok_or_else(|| {
                            CompileError::unsupported(format!(
                                "local '{}' reached the code generator without a depth",
                                var.name
                            ))
                        })?;
                        Instr::Push(d - depth)
                    }
                    VarTarget::Unresolved => {
                        return Err(CompileError::unsupported(format!(
                            "identifier '{}' reached the code generator unresolved",
                            var.name
                        )));
                    }
                };
                out.push(instr);
                Ok(())
            }
            Expr::Int(n) => {
                out.push(Instr::PushInt(n.clone()));
                Ok(())
            }
            Expr::Decimal(v) => {
                out.push(Instr::PushDecimal(v.clone()));
                Ok(())
            }
            Expr::Char(c) => {
                out.push(Instr::PushChar(*c));
                Ok(())
            }
            Expr::Pack { tag, arity: 0 } => {
                out.push(Instr::Pack { tag: *tag, arity: 0 });
                Ok(())
            }
            Expr::Pack { tag, arity } => {
                let id = self.ctor_global(*tag, *arity);
                out.push(Instr::PushGlobal(id));
                Ok(())
            }
            Expr::App(..) => {
                if self.saturated_pack(expr)?.is_some() {
                    return self.emit_saturated_pack(expr, env, d, out);
                }
                let Expr::App(f, x) = expr else {
                    unreachable!("matched application")
                };
                self.c_scheme(x, env, d, out)?;
                self.c_scheme(f, env, d + 1, out)?;
                out.push(Instr::MkApp);
                Ok(())
            }
            Expr::BinOp { op, lhs, rhs } => {
                self.c_scheme(rhs, env, d, out)?;
                self.c_scheme(lhs, env, d + 1, out)?;
                out.push(Instr::PushGlobal(self.names.intern(<&'static str>::from(*op))));
                out.extend([Instr::MkApp, Instr::MkApp]);
                Ok(())
            }
            Expr::If { cond, then, otherwise } => {
                self.c_scheme(otherwise, env, d, out)?;
                self.c_scheme(then, env, d + 1, out)?;
                self.c_scheme(cond, env, d + 2, out)?;
                out.push(Instr::PushGlobal(self.names.intern("if")));
                out.extend([Instr::MkApp, Instr::MkApp, Instr::MkApp]);
                Ok(())
            }
            Expr::Let {
                recursive,
                bindings,
                body,
            } => {
                let d2 = self.compile_bindings(bindings, *recursive, env, d, out)?;
                self.c_scheme(body, env, d2, out)?;
                out.push(Instr::Slide(d2 - d));
                Ok(())
            }
            Expr::Case { .. } => Err(CompileError::unsupported(
                "case in a lazy context survived the case lifter",
            )),
            Expr::Lambda { .. } => Err(CompileError::unsupported(
                "abstraction survived the lambda lifter",
            )),
        }
    }

    /// Compiles `let`/`letrec` bindings, extending `env`; returns the new depth.
    ///
    /// `letrec` pre-allocates placeholders, builds each right-hand side, and
    /// patches the placeholder with `Update`, which is what ties cyclic graphs.
    fn compile_bindings(
        &mut self,
        bindings: &[Binding],
        recursive: bool,
        env: &mut Env,
        d: usize,
        out: &mut Vec<Instr>,
    ) -> CompileResult<usize> {
        let k = bindings.len();
        if recursive {
            out.push(Instr::Alloc(k));
            for (i, binding) in bindings.iter().enumerate() {
                self.bind_slot(binding, env, d + i + 1)?;
            }
            for (i, binding) in bindings.iter().enumerate() {
                self.c_scheme(&binding.expr, env, d + k, out)?;
                out.push(Instr::Update(k - 1 - i));
            }
        } else {
            for (i, binding) in bindings.iter().enumerate() {
                self.c_scheme(&binding.expr, env, d + i, out)?;
            }
            for (i, binding) in bindings.iter().enumerate() {
                self.bind_slot(binding, env, d + i + 1)?;
            }
        }
        Ok(d + k)
    }

    fn bind_slot(&mut self, binding: &Binding, env: &mut Env, depth: usize) -> CompileResult<()> {
        if binding.slot == SlotId::UNRESOLVED {
            return Err(CompileError::unsupported(format!(
                "binding '{}' reached the code generator unresolved",
                binding.name
            )));
        }
        env.locals.insert(binding.slot, depth);
        Ok(())
    }

    /// Compiles case alternatives; `d` is the depth before the scrutinee.
    fn compile_alts(&mut self, alts: &[Alt], env: &mut Env, d: usize, ctx: CaseCtx) -> CompileResult<Vec<(u32, Code)>> {
        let mut arms = Vec::with_capacity(alts.len());
        for alt in alts {
            let a = alt.binders.len();
            let mut code = vec![Instr::Split(u32::try_from(a).expect("binder count exceeds u32"))];
            for (i, binder) in alt.binders.iter().enumerate() {
                if binder.slot == SlotId::UNRESOLVED {
                    return Err(CompileError::unsupported(format!(
                        "pattern binder '{}' reached the code generator unresolved",
                        binder.name
                    )));
                }
                env.locals.insert(binder.slot, d + i + 1);
            }
            self.e_scheme(&alt.body, env, d + a, &mut code)?;
            match ctx {
                CaseCtx::Tail => code.extend([Instr::Update(d + a), Instr::Pop(d + a), Instr::Return]),
                CaseCtx::Inner => code.push(Instr::Slide(a)),
            }
            arms.push((alt.tag, Arc::new(code)));
        }
        Ok(arms)
    }

    /// Checks for an application spine headed by a `Pack` literal.
    ///
    /// Returns the arity when the spine is exactly saturated, errors when
    /// over-applied, and `None` otherwise.
    fn saturated_pack(&self, expr: &Expr) -> CompileResult<Option<u32>> {
        let (head, args) = expr.flatten_spine();
        let Expr::Pack { tag, arity } = head else {
            return Ok(None);
        };
        match args.len().cmp(&(*arity as usize)) {
            std::cmp::Ordering::Equal => Ok(Some(*arity)),
            std::cmp::Ordering::Greater => Err(CompileError::new(
                CompileErrorKind::ArityMismatch,
                format!(
                    "constructor Pack{{{tag},{arity}}} applied to {} arguments",
                    args.len()
                ),
            )),
            std::cmp::Ordering::Less => Ok(None),
        }
    }

    /// Emits a saturated constructor application: fields built lazily, first
    /// field pushed last so `Pack` pops them in declaration order.
    fn emit_saturated_pack(&mut self, expr: &Expr, env: &mut Env, d: usize, out: &mut Vec<Instr>) -> CompileResult<()> {
        let (head, args) = expr.flatten_spine();
        let Expr::Pack { tag, arity } = head else {
            unreachable!("caller checked the spine head")
        };
        let (tag, arity) = (*tag, *arity);
        for (i, arg) in args.iter().rev().enumerate() {
            self.c_scheme(arg, env, d + i, out)?;
        }
        out.push(Instr::Pack { tag, arity });
        Ok(())
    }

    /// Returns the global for an unsaturated constructor mention, synthesizing
    /// its record on first use: `Pack t a; Update 0; Pop 0; Unwind`.
    fn ctor_global(&mut self, tag: u32, arity: u32) -> NameId {
        let key = format!("Pack{{{tag},{arity}}}");
        let id = self.names.intern(&key);
        if self.symtab.contains(id) || self.ctor_ids.contains(&id) {
            return id;
        }
        self.ctor_ids.insert(id);
        self.ctor_records.push(ScRecord {
            name: id,
            arity: arity as usize,
            code: Arc::new(vec![
                Instr::Pack { tag, arity },
                Instr::Update(0),
                Instr::Pop(0),
                Instr::Unwind,
            ]),
        });
        id
    }
}

/// Where a `case` sits: the tail of a supercombinator, or inside an `E` context.
#[derive(Clone, Copy, PartialEq, Eq)]
enum CaseCtx {
    Tail,
    Inner,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse::parse_program, resolve::resolve_program, value::BinaryOp};

    fn compile(source: &str) -> (Vec<ScRecord>, Names) {
        let mut program = parse_program(source).unwrap();
        let mut names = Names::new();
        let symtab = SymbolTable::new();
        resolve_program(&mut program, &mut names, &symtab).unwrap();
        let records = compile_program(&program, &mut names, &symtab).unwrap();
        (records, names)
    }

    #[test]
    fn s_combinator_compiles_to_the_classic_sequence() {
        let (records, _) = compile("S f g x = f x (g x)");
        assert_eq!(
            *records[0].code,
            vec![
                Instr::Push(2),
                Instr::Push(2),
                Instr::MkApp,
                Instr::Push(3),
                Instr::Push(2),
                Instr::MkApp,
                Instr::MkApp,
                Instr::Update(3),
                Instr::Pop(3),
                Instr::Unwind,
            ]
        );
    }

    #[test]
    fn k_combinator_selects_its_first_argument() {
        let (records, _) = compile("K x y = x");
        assert_eq!(
            *records[0].code,
            vec![Instr::Push(0), Instr::Update(2), Instr::Pop(2), Instr::Unwind]
        );
    }

    #[test]
    fn tail_binop_compiles_strictly() {
        let (records, _) = compile("add x y = x + y");
        assert_eq!(
            *records[0].code,
            vec![
                Instr::Push(0),
                Instr::Eval,
                Instr::Push(2),
                Instr::Eval,
                Instr::Binary(BinaryOp::Add),
                Instr::Update(2),
                Instr::Pop(2),
                Instr::Unwind,
            ]
        );
    }

    #[test]
    fn letrec_allocates_then_patches() {
        let (records, _) = compile("infinite x = letrec xs = Pack{2,2} x xs in xs");
        let code = &*records[0].code;
        assert_eq!(code[0], Instr::Alloc(1));
        assert!(code.contains(&Instr::Update(0)));
        assert!(matches!(code.last(), Some(Instr::Unwind)));
    }

    #[test]
    fn tail_case_alternatives_return() {
        let (records, _) = compile("hd xs = case xs of <2> x rest -> x");
        let Instr::CaseJump(arms) = records[0].code.last().unwrap() else {
            panic!("expected a case dispatch in tail position");
        };
        let arm = &arms[0].1;
        assert_eq!(arm[0], Instr::Split(2));
        assert_eq!(arm[arm.len() - 1], Instr::Return);
    }

    #[test]
    fn over_applied_constructor_is_rejected() {
        let mut program = parse_program("bad = Pack{1,0} 1").unwrap();
        let mut names = Names::new();
        let symtab = SymbolTable::new();
        resolve_program(&mut program, &mut names, &symtab).unwrap();
        let err = compile_program(&program, &mut names, &symtab).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::ArityMismatch);
    }

    #[test]
    fn unsaturated_constructor_uses_a_synthesized_global() {
        let (records, names) = compile("c = Pack{2,2}");
        assert_eq!(records.len(), 2);
        let ctor = names.get("Pack{2,2}").unwrap();
        assert_eq!(records[1].name, ctor);
        assert_eq!(records[1].arity, 2);
    }
}
