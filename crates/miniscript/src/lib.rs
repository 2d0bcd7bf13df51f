//! MiniScript: a dynamically-typed scripting language whose interpreter
//! carries a security label on every runtime value.
//!
//! This crate is THE CORE described by the specification it implements: the
//! value model, the scope chain, the AST shape, the compiler that lowers it
//! to a flat jump-based instruction stream, the stepping interpreter, the
//! PC-label stack, and the composable monitor framework that enforces an
//! information-flow control policy across explicit and implicit data flow.
//!
//! Lexing/parsing source text into the AST this crate consumes, AST
//! restrictor visitors, and per-challenge command-line harnesses are
//! deliberately external collaborators — see the `miniscript-parser` and
//! `miniscript-cli` crates.

pub mod ast;
pub mod builtins;
pub mod bytecode;
pub mod error;
pub mod function;
pub mod monitor;
pub mod scope;
pub mod value;
pub mod vm;

pub use error::{InterpreterError, InterpreterResult};
pub use monitor::Monitor;
pub use scope::Scope;
pub use value::{Label, Value, ValueKind};
pub use vm::{Interpreter, Limits, RunOutcome, StepBudget};

use std::{cell::RefCell, rc::Rc};

use ast::Stmt;
use builtins::OutputSink;

/// Compiles and runs a whole program (the statement list produced by a
/// parser) to completion, treating it like an implicit top-level function
/// body: locals declared anywhere in the program via `var` are pre-declared
/// into `scope` before execution starts, exactly the way `UserFunction::call`
/// pre-declares a function's locals (spec §4.9). This resolves an
/// underspecified corner of spec §4.7 ("the name is declared at function
/// entry") for code that never enters a function at all.
pub fn run_program(
    stmts: &[Stmt],
    scope: &Rc<RefCell<Scope>>,
    monitor: &mut Monitor,
    budget: &mut StepBudget,
    limits: &Limits,
    out: &mut dyn OutputSink,
) -> InterpreterResult<Value> {
    let locals = bytecode::scan_locals(stmts);
    {
        let mut scope_mut = scope.borrow_mut();
        for local in locals {
            if !scope_mut.contains(&local) {
                scope_mut.declare(local, Value::undefined(), &Label::new());
            }
        }
    }
    let code = Rc::new(bytecode::compile_block(stmts));
    let mut interpreter = Interpreter::new(code, scope.clone(), monitor);
    match interpreter.run(budget, limits, out)? {
        RunOutcome::Returned(value) => Ok(value),
        RunOutcome::FellOff => Ok(Value::undefined()),
    }
}
