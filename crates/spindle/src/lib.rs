#![doc = include_str!("../../../README.md")]

mod ast;
mod decimal;
mod error;
mod gmachine;
mod heap;
mod lexer;
mod lift;
mod names;
mod parse;
mod resolve;
mod resource;
mod run;
mod symtab;
pub mod tracer;
mod value;

pub use num_bigint::BigInt;

pub use crate::{
    decimal::Decimal,
    error::{CompileError, CompileErrorKind, Error, ParseError, RunError, RunErrorKind},
    resource::{LimitedTracker, NoLimitTracker, ResourceError, ResourceTracker},
    run::Engine,
    tracer::{CountingTracer, MachineTracer, NoopTracer, StderrTracer},
    value::{BinaryOp, Output},
};
