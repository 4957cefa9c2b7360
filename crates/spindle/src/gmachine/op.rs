//! The G-machine instruction set.

use std::sync::Arc;

use num_bigint::BigInt;

use crate::{decimal::Decimal, names::NameId, value::BinaryOp};

/// A shared, immutable instruction sequence.
///
/// Branch instructions (`Cond`, `CaseJump`) carry their arms as nested `Code`
/// blocks; sharing through `Arc` keeps dispatch allocation-free.
pub(crate) type Code = Arc<Vec<Instr>>;

/// One G-machine instruction.
#[derive(Debug, Clone, PartialEq, strum::AsRefStr, strum::IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum Instr {
    /// Push the address of a supercombinator.
    PushGlobal(NameId),
    /// Allocate an integer atom and push its address.
    PushInt(BigInt),
    /// Allocate a decimal atom and push its address.
    PushDecimal(Decimal),
    /// Allocate a character atom and push its address.
    PushChar(char),
    /// Allocate a boolean atom and push its address.
    PushBool(bool),
    /// Duplicate the stack entry `k` positions below the top.
    Push(usize),
    /// Pop function then argument; push a fresh application node.
    MkApp,
    /// Pop the result; overwrite the node at entry `k` (from the new top) with
    /// an indirection to it.
    Update(usize),
    /// Drop `k` entries.
    Pop(usize),
    /// Push `k` placeholder nodes for `letrec` patching.
    Alloc(usize),
    /// Remove `k` entries below the top.
    Slide(usize),
    /// Walk the spine of the graph at the top of the stack.
    Unwind,
    /// Evaluate the top node to WHNF, saving the continuation on the dump.
    Eval,
    /// Restore the continuation saved by `Eval`, returning the frame's root.
    Return,
    /// Strict binary primop on the two topmost atoms.
    Binary(BinaryOp),
    /// Strict negation of the topmost atom.
    Neg,
    /// Pop a boolean; run the first arm when true, the second otherwise.
    Cond(Code, Code),
    /// Pop `arity` fields; push a constructor node.
    Pack { tag: u32, arity: u32 },
    /// Dispatch on the constructor tag at the top of the stack.
    CaseJump(Vec<(u32, Code)>),
    /// Pop a constructor of `arity` fields; push its fields.
    Split(u32),
    /// Abort evaluation.
    Abort,
}
