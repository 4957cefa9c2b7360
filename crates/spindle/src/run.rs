//! Public interface for compiling and running Core programs.
//!
//! An [`Engine`] owns the interner and the symbol table. Each `load_str`
//! pushes one program through the whole pipeline — parse, lambda-lift,
//! case-lift, resolve, compile — and commits the records only when every pass
//! succeeded, so a failed load leaves the engine exactly as it was. Loads
//! merge: a later definition with an existing name overwrites the earlier one.
//!
//! Snapshots: a compiled engine serializes to a compact binary form with
//! [`Engine::dump`] and restores with [`Engine::load`], skipping the front end
//! and pipeline entirely on later runs.

use std::sync::Arc;

use ahash::AHashSet;

use crate::{
    error::{CompileError, CompileErrorKind, Error},
    gmachine::{Instr, Machine, compile_program},
    lift::{FreshNames, lift_cases, lift_lambdas},
    names::Names,
    parse::parse_program,
    resolve::resolve_program,
    resource::{NoLimitTracker, ResourceTracker},
    symtab::{ScRecord, SymbolTable},
    tracer::{MachineTracer, NoopTracer},
    value::{BinaryOp, Output},
};

/// The surface-syntax prelude: combinators and the list constructors, with
/// `nil` on tag 1 and `cons` on tag 2.
const PRELUDE: &str = include_str!("prelude.core");

/// Compiler and execution engine for Core programs.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Engine {
    names: Names,
    symtab: SymbolTable,
    fresh: FreshNames,
}

impl Engine {
    /// Creates an engine with only the primitive globals installed:
    /// the strict operators, `negate`, `if`, `abort`, `true`, and `false`.
    #[must_use]
    pub fn new() -> Self {
        let mut engine = Self {
            names: Names::new(),
            symtab: SymbolTable::new(),
            fresh: FreshNames::default(),
        };
        engine.install_primitives();
        engine
    }

    /// Creates an engine with the primitives and the embedded prelude.
    #[must_use]
    pub fn with_prelude() -> Self {
        let mut engine = Self::new();
        engine.load_str(PRELUDE).expect("embedded prelude compiles");
        engine
    }

    /// Parses, lowers, and compiles one program, merging its definitions into
    /// the symbol table. Nothing is committed when any pass fails.
    pub fn load_str(&mut self, source: &str) -> Result<(), Error> {
        let mut program = parse_program(source)?;

        let base: AHashSet<String> = self
            .symtab
            .iter()
            .map(|record| self.names.resolve(record.name).to_owned())
            .collect();
        let mut known = base.clone();
        known.extend(program.defs.iter().map(|def| def.name.clone()));
        lift_lambdas(&mut program, &known, &mut self.fresh);

        // Lifted definitions are globals for the case lifter's free-variable
        // computation.
        let mut known = base;
        known.extend(program.defs.iter().map(|def| def.name.clone()));
        lift_cases(&mut program, &known, &mut self.fresh);

        resolve_program(&mut program, &mut self.names, &self.symtab)?;
        let records = compile_program(&program, &mut self.names, &self.symtab)?;
        for record in records {
            self.symtab.insert(record);
        }
        Ok(())
    }

    /// Evaluates `main` to printed form with no limits and no tracing.
    pub fn run(&self) -> Result<Output, Error> {
        self.run_with(NoLimitTracker, NoopTracer)
    }

    /// Evaluates `main` under the given resource tracker and tracer.
    ///
    /// Pass trackers and tracers by mutable reference to inspect them after
    /// the run, e.g. `engine.run_with(NoLimitTracker, &mut counter)`.
    pub fn run_with<R: ResourceTracker, T: MachineTracer>(&self, tracker: R, tracer: T) -> Result<Output, Error> {
        let entry = self.names.get("main").filter(|&id| self.symtab.contains(id));
        let Some(entry) = entry else {
            return Err(CompileError::new(CompileErrorKind::MissingMain, "no definition named 'main'").into());
        };
        let arity = self.symtab.get(entry).map_or(0, |record| record.arity);
        if arity != 0 {
            return Err(CompileError::new(
                CompileErrorKind::MainTakesArguments,
                format!("'main' must take no arguments, found arity {arity}"),
            )
            .into());
        }
        let mut machine = Machine::new(&self.symtab, &self.names, tracker, tracer);
        Ok(machine.evaluate(entry)?)
    }

    /// Serializes the compiled engine to a binary snapshot.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores an engine from a snapshot produced by [`Engine::dump`].
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    /// Installs the primitive supercombinators with synthesized code.
    ///
    /// A strict binary operator evaluates its first argument, then its second,
    /// applies the primop, and updates the redex root; `if` evaluates only its
    /// condition and selects a branch without evaluating it.
    fn install_primitives(&mut self) {
        use BinaryOp::{Add, And, Div, Eq, Ge, Gt, Le, Lt, Mul, Ne, Or, Sub};

        for op in [Add, Sub, Mul, Div, Eq, Ne, Lt, Le, Gt, Ge, And, Or] {
            let name = self.names.intern(<&'static str>::from(op));
            self.symtab.insert(ScRecord {
                name,
                arity: 2,
                code: Arc::new(vec![
                    Instr::Push(0),
                    Instr::Eval,
                    Instr::Push(2),
                    Instr::Eval,
                    Instr::Binary(op),
                    Instr::Update(2),
                    Instr::Pop(2),
                    Instr::Unwind,
                ]),
            });
        }

        let negate = self.names.intern("negate");
        self.symtab.insert(ScRecord {
            name: negate,
            arity: 1,
            code: Arc::new(vec![
                Instr::Push(0),
                Instr::Eval,
                Instr::Neg,
                Instr::Update(1),
                Instr::Pop(1),
                Instr::Unwind,
            ]),
        });

        let if_name = self.names.intern("if");
        self.symtab.insert(ScRecord {
            name: if_name,
            arity: 3,
            code: Arc::new(vec![
                Instr::Push(0),
                Instr::Eval,
                Instr::Cond(Arc::new(vec![Instr::Push(1)]), Arc::new(vec![Instr::Push(2)])),
                Instr::Update(3),
                Instr::Pop(3),
                Instr::Unwind,
            ]),
        });

        let abort = self.names.intern("abort");
        self.symtab.insert(ScRecord {
            name: abort,
            arity: 0,
            code: Arc::new(vec![Instr::Abort]),
        });

        for (name, value) in [("true", true), ("false", false)] {
            let name = self.names.intern(name);
            self.symtab.insert(ScRecord {
                name,
                arity: 0,
                code: Arc::new(vec![
                    Instr::PushBool(value),
                    Instr::Update(0),
                    Instr::Pop(0),
                    Instr::Unwind,
                ]),
            });
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
