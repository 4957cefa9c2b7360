//! Identifier resolution.
//!
//! Walks every definition after lifting and classifies each variable
//! occurrence: `Arg(i)` for a parameter, `Local(slot)` for a `let`/`letrec`
//! binding or case binder, `Global(id)` for a supercombinator. Binding sites
//! get per-definition slot numbers; the nearest binding shadows. Unknown names
//! fail the load with `UnboundIdentifier`. Definition arities are recorded
//! before bodies are resolved so mutual recursion resolves as globals.

use ahash::AHashMap;

use crate::{
    ast::{Expr, Program, SlotId, VarTarget},
    error::{CompileError, CompileResult},
    names::{NameId, Names},
    symtab::SymbolTable,
};

/// Name, id, and arity of a definition staged by the current load.
pub(crate) type StagedArities = AHashMap<String, (NameId, usize)>;

/// Resolves every variable occurrence in `program`.
///
/// Returns the staged (name, arity) table for the load being processed; records
/// only reach the symbol table once code generation succeeds.
pub(crate) fn resolve_program(
    program: &mut Program,
    names: &mut Names,
    symtab: &SymbolTable,
) -> CompileResult<StagedArities> {
    let mut staged = StagedArities::new();
    for def in &program.defs {
        let id = names.intern(&def.name);
        staged.insert(def.name.clone(), (id, def.params.len()));
    }

    for def in &mut program.defs {
        let mut resolver = Resolver {
            names,
            symtab,
            staged: &staged,
            scope: Vec::new(),
            next_slot: 0,
        };
        for (index, param) in def.params.iter().enumerate() {
            let index = u32::try_from(index).expect("parameter count exceeds u32");
            resolver.scope.push((param.clone(), VarTarget::Arg(index)));
        }
        resolver.expr(&mut def.body)?;
    }
    Ok(staged)
}

struct Resolver<'a> {
    names: &'a Names,
    symtab: &'a SymbolTable,
    staged: &'a StagedArities,
    /// Innermost binding last; lookup walks backwards so shadowing wins.
    scope: Vec<(String, VarTarget)>,
    next_slot: u32,
}

impl Resolver<'_> {
    fn fresh_slot(&mut self) -> SlotId {
        let slot = SlotId(self.next_slot);
        self.next_slot += 1;
        slot
    }

    fn lookup(&self, name: &str) -> CompileResult<VarTarget> {
        if let Some((_, target)) = self.scope.iter().rev().find(|(n, _)| n == name) {
            return Ok(*target);
        }
        if let Some(&(id, _)) = self.staged.get(name) {
            return Ok(VarTarget::Global(id));
        }
        if let Some(id) = self.names.get(name)
            && self.symtab.contains(id)
        {
            return Ok(VarTarget::Global(id));
        }
        Err(CompileError::unbound(name))
    }

    fn expr(&mut self, expr: &mut Expr) -> CompileResult<()> {
        match expr {
            Expr::Var(var) => {
                var.target = self.lookup(&var.name)?;
                Ok(())
            }
            Expr::Int(_) | Expr::Decimal(_) | Expr::Char(_) | Expr::Pack { .. } => Ok(()),
            Expr::App(f, x) => {
                self.expr(f)?;
                self.expr(x)
            }
            Expr::BinOp { lhs, rhs, .. } => {
                self.expr(lhs)?;
                self.expr(rhs)
            }
            Expr::If { cond, then, otherwise } => {
                self.expr(cond)?;
                self.expr(then)?;
                self.expr(otherwise)
            }
            Expr::Lambda { .. } => Err(CompileError::unsupported(
                "abstraction reached the resolver; the lambda lifter should have removed it",
            )),
            Expr::Let {
                recursive,
                bindings,
                body,
            } => {
                let depth = self.scope.len();
                if *recursive {
                    for binding in bindings.iter_mut() {
                        binding.slot = self.fresh_slot();
                        self.scope.push((binding.name.clone(), VarTarget::Local(binding.slot)));
                    }
                    for binding in bindings.iter_mut() {
                        self.expr(&mut binding.expr)?;
                    }
                } else {
                    for binding in bindings.iter_mut() {
                        self.expr(&mut binding.expr)?;
                    }
                    for binding in bindings.iter_mut() {
                        binding.slot = self.fresh_slot();
                        self.scope.push((binding.name.clone(), VarTarget::Local(binding.slot)));
                    }
                }
                self.expr(body)?;
                self.scope.truncate(depth);
                Ok(())
            }
            Expr::Case { scrutinee, alts } => {
                self.expr(scrutinee)?;
                for alt in alts {
                    let depth = self.scope.len();
                    for binder in &mut alt.binders {
                        binder.slot = self.fresh_slot();
                        self.scope.push((binder.name.clone(), VarTarget::Local(binder.slot)));
                    }
                    self.expr(&mut alt.body)?;
                    self.scope.truncate(depth);
                }
                Ok(())
            }
        }
    }
}
