//! Atomic runtime values and the strict primitive operations on them.
//!
//! An [`Atom`] is the payload of a `Num` heap node: integer, decimal, character,
//! or boolean. Arithmetic is overloaded over the numeric category (any decimal
//! operand widens the result to decimal; integer division floors). Comparisons
//! are polymorphic but require both operands in the same category — numeric,
//! character, or boolean — and abort with a `TypeError` otherwise.
//!
//! [`Output`] is the public rendered form of a fully reduced program result.

use std::{
    cmp::Ordering,
    fmt::{self, Display},
};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::Zero;
use strum::{Display as StrumDisplay, IntoStaticStr};

use crate::{
    decimal::Decimal,
    error::{RunError, RunErrorKind, RunResult},
};

/// The binary operators of the source language, shared between the AST and the
/// machine's strict primop instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "&")]
    And,
    #[strum(serialize = "|")]
    Or,
}

impl BinaryOp {
    /// True for `+ - * /`.
    #[must_use]
    pub(crate) fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div)
    }
}

/// An atomic value held by a `Num` heap node.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Atom {
    /// Arbitrary-precision integer.
    Int(BigInt),
    /// Arbitrary-precision decimal.
    Decimal(Decimal),
    /// A single character.
    Char(char),
    /// A boolean produced by comparisons or the `true`/`false` globals.
    Bool(bool),
}

impl Atom {
    /// Short description used in primop diagnostics, e.g. `char 'a'`.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Int(n) => format!("int {n}"),
            Self::Decimal(d) => format!("decimal {d}"),
            Self::Char(c) => format!("char '{c}'"),
            Self::Bool(b) => format!("bool {b}"),
        }
    }

    fn type_error(op: BinaryOp, lhs: &Self, rhs: &Self) -> RunError {
        RunError::type_error(format!(
            "'{op}' applied to {} and {}",
            lhs.describe(),
            rhs.describe()
        ))
    }

    /// Applies a strict binary primop to two atoms in WHNF.
    pub(crate) fn binary(op: BinaryOp, lhs: &Self, rhs: &Self) -> RunResult<Self> {
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => Self::arithmetic(op, lhs, rhs),
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = Self::compare(op, lhs, rhs)?;
                Ok(Self::Bool(match op {
                    BinaryOp::Eq => ordering == Ordering::Equal,
                    BinaryOp::Ne => ordering != Ordering::Equal,
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    BinaryOp::Ge => ordering != Ordering::Less,
                    _ => unreachable!("comparison op"),
                }))
            }
            BinaryOp::And | BinaryOp::Or => match (lhs, rhs) {
                (Self::Bool(a), Self::Bool(b)) => Ok(Self::Bool(if op == BinaryOp::And { *a && *b } else { *a || *b })),
                _ => Err(Self::type_error(op, lhs, rhs)),
            },
        }
    }

    /// Overloaded arithmetic: integer unless either operand is decimal.
    fn arithmetic(op: BinaryOp, lhs: &Self, rhs: &Self) -> RunResult<Self> {
        match (lhs, rhs) {
            (Self::Int(a), Self::Int(b)) => match op {
                BinaryOp::Add => Ok(Self::Int(a + b)),
                BinaryOp::Sub => Ok(Self::Int(a - b)),
                BinaryOp::Mul => Ok(Self::Int(a * b)),
                BinaryOp::Div => {
                    if b.is_zero() {
                        Err(RunError::new(RunErrorKind::DivideByZero, format!("{a} / 0")))
                    } else {
                        Ok(Self::Int(a.div_floor(b)))
                    }
                }
                _ => unreachable!("arithmetic op"),
            },
            (Self::Int(_) | Self::Decimal(_), Self::Int(_) | Self::Decimal(_)) => {
                let a = lhs.widen_decimal();
                let b = rhs.widen_decimal();
                match op {
                    BinaryOp::Add => Ok(Self::Decimal(a.add(&b))),
                    BinaryOp::Sub => Ok(Self::Decimal(a.sub(&b))),
                    BinaryOp::Mul => Ok(Self::Decimal(a.mul(&b))),
                    BinaryOp::Div => a
                        .div(&b)
                        .map(Self::Decimal)
                        .ok_or_else(|| RunError::new(RunErrorKind::DivideByZero, format!("{a} / 0"))),
                    _ => unreachable!("arithmetic op"),
                }
            }
            _ => Err(Self::type_error(op, lhs, rhs)),
        }
    }

    /// Category-checked ordering for the comparison primops.
    fn compare(op: BinaryOp, lhs: &Self, rhs: &Self) -> RunResult<Ordering> {
        match (lhs, rhs) {
            (Self::Int(a), Self::Int(b)) => Ok(a.cmp(b)),
            (Self::Int(_) | Self::Decimal(_), Self::Int(_) | Self::Decimal(_)) => {
                Ok(lhs.widen_decimal().cmp_value(&rhs.widen_decimal()))
            }
            (Self::Char(a), Self::Char(b)) => Ok(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Ok(a.cmp(b)),
            _ => Err(Self::type_error(op, lhs, rhs)),
        }
    }

    /// The `negate` primitive.
    pub(crate) fn negate(&self) -> RunResult<Self> {
        match self {
            Self::Int(n) => Ok(Self::Int(-n)),
            Self::Decimal(d) => Ok(Self::Decimal(d.neg())),
            other => Err(RunError::type_error(format!(
                "'negate' applied to {}",
                other.describe()
            ))),
        }
    }

    /// The boolean payload, for `Cond`.
    pub(crate) fn as_bool(&self) -> RunResult<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(RunError::type_error(format!(
                "condition evaluated to {}, expected a bool",
                other.describe()
            ))),
        }
    }

    fn widen_decimal(&self) -> Decimal {
        match self {
            Self::Int(n) => Decimal::from_bigint(n),
            Self::Decimal(d) => d.clone(),
            Self::Char(_) | Self::Bool(_) => unreachable!("non-numeric atom widened"),
        }
    }
}

/// A fully reduced, rendered program result.
///
/// Lists are recognized from the predeclared constructors (`nil` tag 1,
/// `cons` tag 2) and render as `[e1, ..., ek, 'nil']`; any other constructor
/// renders as `Pack{tag,arity}` followed by its rendered fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Integer result.
    Int(BigInt),
    /// Decimal result.
    Decimal(Decimal),
    /// Boolean result.
    Bool(bool),
    /// Character result.
    Char(char),
    /// A nil-terminated chain of `cons` cells.
    List(Vec<Output>),
    /// Any other constructor value.
    Data {
        /// The constructor tag.
        tag: u32,
        /// Rendered fields in construction order.
        fields: Vec<Output>,
    },
}

impl Output {
    pub(crate) fn from_atom(atom: &Atom) -> Self {
        match atom {
            Atom::Int(n) => Self::Int(n.clone()),
            Atom::Decimal(d) => Self::Decimal(d.clone()),
            Atom::Char(c) => Self::Char(*c),
            Atom::Bool(b) => Self::Bool(*b),
        }
    }

    /// True when a nested rendering needs parentheses.
    fn is_compound(&self) -> bool {
        matches!(self, Self::Data { fields, .. } if !fields.is_empty())
    }
}

impl Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Char(c) => write!(f, "{c}"),
            Self::List(items) => {
                f.write_str("[")?;
                for item in items {
                    write!(f, "{item},")?;
                }
                f.write_str("'nil']")
            }
            Self::Data { tag, fields } => {
                write!(f, "Pack{{{tag},{}}}", fields.len())?;
                for field in fields {
                    if field.is_compound() {
                        write!(f, " ({field})")?;
                    } else {
                        write!(f, " {field}")?;
                    }
                }
                Ok(())
            }
        }
    }
}
