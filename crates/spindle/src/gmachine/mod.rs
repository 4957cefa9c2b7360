//! G-machine code generation and execution.
//!
//! `op` defines the instruction set, `compile` lowers resolved definitions into
//! it under the three compilation schemes, and `machine` is the graph-reducing
//! interpreter that drives `Unwind`.

pub(crate) mod compile;
pub(crate) mod machine;
pub(crate) mod op;

pub(crate) use compile::compile_program;
pub(crate) use machine::Machine;
pub(crate) use op::{Code, Instr};
