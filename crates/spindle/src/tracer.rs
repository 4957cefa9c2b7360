//! Machine execution tracing.
//!
//! A trait-based tracing system for the G-machine with zero-cost abstraction:
//! the machine carries the tracer as a type parameter, so with [`NoopTracer`]
//! every hook monomorphizes away (the same trick the resource tracker uses).
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (production default) |
//! | [`StderrTracer`] | Human-readable step log to stderr |
//! | [`CountingTracer`] | Instruction and primop frequency counters |
//!
//! `CountingTracer` is also the instrument behind the call-by-need tests: a
//! shared subexpression evaluates once, so its primop fires once.

use ahash::AHashMap;

use crate::{gmachine::Instr, value::BinaryOp};

/// Trait for G-machine execution tracing.
///
/// All methods default to no-ops, so implementations override only the hooks
/// they care about.
pub trait MachineTracer: std::fmt::Debug {
    /// Called before each instruction dispatch in the run loop.
    #[inline]
    fn on_instruction(&mut self, _instr: &Instr, _stack_depth: usize, _dump_depth: usize) {}

    /// Called for each strict binary primop executed.
    #[inline]
    fn on_primop(&mut self, _op: BinaryOp) {}

    /// Called when `Unwind` enters a supercombinator's code.
    #[inline]
    fn on_global_entry(&mut self, _name: &str, _arity: usize) {}

    /// Called when an `Eval` frame is pushed or popped; `depth` is the dump
    /// depth after the transition.
    #[inline]
    fn on_dump_transition(&mut self, _pushed: bool, _depth: usize) {}
}

impl<T: MachineTracer + ?Sized> MachineTracer for &mut T {
    fn on_instruction(&mut self, instr: &Instr, stack_depth: usize, dump_depth: usize) {
        (**self).on_instruction(instr, stack_depth, dump_depth);
    }

    fn on_primop(&mut self, op: BinaryOp) {
        (**self).on_primop(op);
    }

    fn on_global_entry(&mut self, name: &str, arity: usize) {
        (**self).on_global_entry(name, arity);
    }

    fn on_dump_transition(&mut self, pushed: bool, depth: usize) {
        (**self).on_dump_transition(pushed, depth);
    }
}

/// A tracer that does nothing; compiles to zero instructions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl MachineTracer for NoopTracer {}

/// Tracer that prints a human-readable execution log to stderr.
///
/// Useful for interactive debugging; pipe stderr to a file while stdout shows
/// the rendered result.
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Stop after this many instructions to bound runaway output.
    limit: Option<usize>,
    count: usize,
    stopped: bool,
}

impl StderrTracer {
    /// Creates a tracer with no instruction limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracer that stops logging after `limit` instructions.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            count: 0,
            stopped: false,
        }
    }
}

impl MachineTracer for StderrTracer {
    #[inline]
    fn on_instruction(&mut self, instr: &Instr, stack_depth: usize, dump_depth: usize) {
        if self.stopped {
            return;
        }
        eprintln!("{:<12} stack={stack_depth}  dump={dump_depth}", instr.as_ref());
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count >= limit
        {
            eprintln!("--- trace limit reached ({limit} instructions) ---");
            self.stopped = true;
        }
    }

    fn on_global_entry(&mut self, name: &str, arity: usize) {
        if !self.stopped {
            eprintln!("  >>> ENTER {name} (arity {arity})");
        }
    }

    fn on_dump_transition(&mut self, pushed: bool, depth: usize) {
        if !self.stopped {
            let dir = if pushed { "+++" } else { "---" };
            eprintln!("  {dir} dump depth {depth}");
        }
    }
}

/// Tracer that counts instruction and primop executions.
#[derive(Debug, Default)]
pub struct CountingTracer {
    instructions: AHashMap<&'static str, u64>,
    primops: AHashMap<BinaryOp, u64>,
    total: u64,
    max_stack_depth: usize,
    global_entries: u64,
}

impl CountingTracer {
    /// Creates a tracer with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times a given primop ran.
    #[must_use]
    pub fn primop_count(&self, op: BinaryOp) -> u64 {
        self.primops.get(&op).copied().unwrap_or(0)
    }

    /// Number of times the named instruction ran (`"Eval"`, `"MkApp"`, ...).
    #[must_use]
    pub fn instruction_count(&self, name: &str) -> u64 {
        self.instructions.get(name).copied().unwrap_or(0)
    }

    /// Total instructions executed.
    #[must_use]
    pub fn total_instructions(&self) -> u64 {
        self.total
    }

    /// Deepest stack observed.
    #[must_use]
    pub fn max_stack_depth(&self) -> usize {
        self.max_stack_depth
    }

    /// Number of supercombinator entries.
    #[must_use]
    pub fn global_entries(&self) -> u64 {
        self.global_entries
    }
}

impl MachineTracer for CountingTracer {
    #[inline]
    fn on_instruction(&mut self, instr: &Instr, stack_depth: usize, _dump_depth: usize) {
        *self.instructions.entry(<&'static str>::from(instr)).or_insert(0) += 1;
        self.total += 1;
        if stack_depth > self.max_stack_depth {
            self.max_stack_depth = stack_depth;
        }
    }

    #[inline]
    fn on_primop(&mut self, op: BinaryOp) {
        *self.primops.entry(op).or_insert(0) += 1;
    }

    fn on_global_entry(&mut self, _name: &str, _arity: usize) {
        self.global_entries += 1;
    }
}
