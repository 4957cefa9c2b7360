//! Error types for the compilation pipeline and the G-machine.
//!
//! Compile-time failures (`ParseError`, `CompileError`) halt a load before anything
//! is committed to the symbol table. Runtime failures (`RunError`) abort evaluation
//! with a short diagnostic naming the failing operation and the atoms involved; no
//! partial value is produced.

use std::fmt::{self, Display};

use strum::{Display as StrumDisplay, IntoStaticStr};

/// Result alias for operations that can fail at compile time.
pub type CompileResult<T> = Result<T, CompileError>;

/// Result alias for operations that can fail during graph reduction.
pub type RunResult<T> = Result<T, RunError>;

/// A rejection from the lexer or parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Human-readable description of what was expected or found.
    pub message: String,
    /// 1-based source line.
    pub line: usize,
    /// 1-based source column.
    pub column: usize,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at {}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Kinds of compile-time failure raised by the lifters, resolver, and code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, IntoStaticStr)]
pub enum CompileErrorKind {
    /// A variable occurrence resolved to no parameter, local, or global.
    UnboundIdentifier,
    /// A constructor was applied to more arguments than its declared arity.
    ArityMismatch,
    /// A pass was invoked on a construct an earlier pass should have lowered.
    UnsupportedForm,
    /// No definition named `main` exists in the symbol table.
    MissingMain,
    /// `main` exists but takes arguments.
    MainTakesArguments,
}

/// A compile-time failure with its diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// The failure classification.
    pub kind: CompileErrorKind,
    /// Diagnostic text, e.g. the unbound name.
    pub message: String,
}

impl CompileError {
    pub(crate) fn new(kind: CompileErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn unbound(name: &str) -> Self {
        Self::new(CompileErrorKind::UnboundIdentifier, format!("unbound identifier '{name}'"))
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::new(CompileErrorKind::UnsupportedForm, message)
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CompileError {}

/// Kinds of runtime abort.
///
/// `StackUnderflow` and `BadProgram` indicate machine-invariant violations rather
/// than user errors; they should be unreachable from well-compiled programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, IntoStaticStr)]
pub enum RunErrorKind {
    /// A strict primitive was applied to atoms of the wrong category.
    TypeError,
    /// A `case` dispatched on a constructor tag with no matching alternative.
    NoMatchingAlternative,
    /// The `abort` primitive was forced.
    ExplicitAbort,
    /// Integer or decimal division by zero.
    DivideByZero,
    /// The machine popped an empty stack, or unwound an unsaturated global at top level.
    StackUnderflow,
    /// A heap or code invariant was violated (corrupted snapshot, compiler bug).
    BadProgram,
    /// A resource tracker limit was exceeded.
    ResourceExhausted,
}

/// A runtime abort with its diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    /// The abort classification.
    pub kind: RunErrorKind,
    /// Diagnostic text naming the failing primop and the atoms involved.
    pub message: String,
}

impl RunError {
    pub(crate) fn new(kind: RunErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::new(RunErrorKind::TypeError, message)
    }

    pub(crate) fn underflow(message: impl Into<String>) -> Self {
        Self::new(RunErrorKind::StackUnderflow, message)
    }

    pub(crate) fn bad_program(message: impl Into<String>) -> Self {
        Self::new(RunErrorKind::BadProgram, message)
    }
}

impl Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RunError {}

/// Any failure the engine can report: front end, pipeline, or machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Lexer or parser rejection.
    Parse(ParseError),
    /// Lifter, resolver, or code generator failure.
    Compile(CompileError),
    /// Runtime abort.
    Run(RunError),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => e.fmt(f),
            Self::Compile(e) => e.fmt(f),
            Self::Run(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Self::Compile(e)
    }
}

impl From<RunError> for Error {
    fn from(e: RunError) -> Self {
        Self::Run(e)
    }
}
