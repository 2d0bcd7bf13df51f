use std::fmt;

/// Error taxonomy for the labelled interpreter.
///
/// Every variant here is surfaced to callers; the one sentinel the original
/// design models as an exception (`Return`, used to unwind a function body
/// back to its call site) is deliberately **not** a member of this enum — it
/// is threaded through the dispatch loop as a return value instead (see
/// `vm::RunOutcome`), per the re-architecture note in the design docs.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpreterError {
    /// The program counter left the bounds of the instruction stream in a way
    /// that isn't a clean "fell off the end" exit, or the evaluator was asked
    /// to dispatch on a malformed AST node.
    IllegalState(String),
    /// An operator or conversion has no defined meaning for the operand(s),
    /// or a call target is not a function.
    UnsupportedOperation(String),
    /// A name lookup failed in the scope chain.
    RefError(String),
    /// The information-flow policy rejected the program: a sensitive upgrade,
    /// an illegal return across PC levels, or an assignment that would
    /// downgrade or newly create a binding inside a tainted branch.
    FlowControl(String),
    /// The step budget passed to `run` was exhausted before the program
    /// reached a terminal state.
    MaximumStepsReached,
    /// A user function call nested deeper than `Limits::max_call_depth`.
    RecursionLimit { limit: usize },
    /// Assignment to something other than a bare name.
    NotYetImplemented(String),
}

impl fmt::Display for InterpreterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalState(msg) => write!(f, "illegal state: {msg}"),
            Self::UnsupportedOperation(msg) => write!(f, "unsupported operation: {msg}"),
            Self::RefError(msg) => write!(f, "reference error: {msg}"),
            Self::FlowControl(msg) => write!(f, "flow control violation: {msg}"),
            Self::MaximumStepsReached => write!(f, "maximum steps reached"),
            Self::RecursionLimit { limit } => write!(f, "recursion limit exceeded: depth > {limit}"),
            Self::NotYetImplemented(msg) => write!(f, "not yet implemented: {msg}"),
        }
    }
}

impl std::error::Error for InterpreterError {}

pub type InterpreterResult<T> = Result<T, InterpreterError>;
