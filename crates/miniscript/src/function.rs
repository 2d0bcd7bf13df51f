use std::{cell::RefCell, fmt, rc::Rc};

use crate::{
    bytecode::Instruction,
    builtins::OutputSink,
    error::InterpreterError,
    monitor::Monitor,
    scope::Scope,
    value::Value,
    vm::{Interpreter, Limits, RunOutcome, StepBudget},
};

/// A callable value: either a user-defined function or a host builtin
/// (spec §4.9).
pub enum Function {
    User(UserFunction),
    Builtin(BuiltinFunction),
}

impl Function {
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::User(f) => f.name.as_deref().unwrap_or("<anonymous>"),
            Self::Builtin(f) => &f.name,
        }
    }

    /// Invokes the function, threading the monitor (for call/return
    /// bookkeeping and PC-level checks), the shared step budget, the
    /// recursion-depth limit, and the output sink builtins print through.
    pub fn call(
        self: &Rc<Self>,
        args: Vec<Value>,
        monitor: &mut Monitor,
        budget: &mut StepBudget,
        limits: &Limits,
        out: &mut dyn OutputSink,
    ) -> Result<Value, InterpreterError> {
        monitor.enter_call();
        if monitor.call_depth() > limits.max_call_depth {
            return Err(InterpreterError::RecursionLimit {
                limit: limits.max_call_depth,
            });
        }
        match self.as_ref() {
            Self::User(f) => f.call(args, monitor, budget, limits, out),
            Self::Builtin(f) => {
                let host_result = f.call(&args, monitor, out)?.unwrap_or_else(Value::undefined);
                monitor.on_return(&host_result)?;
                Ok(host_result)
            }
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.display_name())
    }
}

/// A function defined in MiniScript source: compiled body, the locals
/// discovered at compile time, its parameter names, and the scope it
/// closed over at definition time (spec §4.9).
pub struct UserFunction {
    pub name: Option<String>,
    pub code: Rc<Vec<Instruction>>,
    pub locals: Vec<String>,
    pub params: Vec<String>,
    pub captured: Rc<RefCell<Scope>>,
}

impl UserFunction {
    fn call(
        &self,
        args: Vec<Value>,
        monitor: &mut Monitor,
        budget: &mut StepBudget,
        limits: &Limits,
        out: &mut dyn OutputSink,
    ) -> Result<Value, InterpreterError> {
        let frame = Scope::child(self.captured.clone());
        let current_pc = monitor.current_pc().clone();
        {
            let mut frame_mut = frame.borrow_mut();
            for local in &self.locals {
                frame_mut.declare(local.clone(), Value::undefined(), &current_pc);
            }
            for (i, param) in self.params.iter().enumerate() {
                let value = args.get(i).cloned().unwrap_or_else(Value::undefined);
                frame_mut.declare(param.clone(), value, &current_pc);
            }
        }

        let mut interpreter = Interpreter::new(self.code.clone(), frame, monitor);
        match interpreter.run(budget, limits, out)? {
            RunOutcome::Returned(value) => Ok(value),
            RunOutcome::FellOff => {
                // No explicit `return` executed: the call/return bookkeeping
                // that would normally happen inside the `Return` instruction
                // dispatch still needs to fire exactly once so the monitor's
                // PC-stack depth stays balanced (spec §4.8 invariant).
                monitor.on_return(&Value::undefined())?;
                Ok(Value::undefined())
            }
        }
    }
}

/// A builtin function: a host callable plus a flag for whether it wants to
/// observe the monitor (used by `labelPrint` to read the current PC level).
#[derive(Clone)]
pub struct BuiltinFunction {
    pub name: String,
    pub wants_monitor: bool,
    #[allow(clippy::type_complexity)]
    func: Rc<dyn Fn(&[Value], Option<&Monitor>, &mut dyn OutputSink) -> Result<Option<Value>, InterpreterError>>,
}

impl BuiltinFunction {
    pub fn new(
        name: impl Into<String>,
        wants_monitor: bool,
        func: impl Fn(&[Value], Option<&Monitor>, &mut dyn OutputSink) -> Result<Option<Value>, InterpreterError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            wants_monitor,
            func: Rc::new(func),
        }
    }

    pub(crate) fn call(
        &self,
        args: &[Value],
        monitor: &Monitor,
        out: &mut dyn OutputSink,
    ) -> Result<Option<Value>, InterpreterError> {
        let visible_monitor = self.wants_monitor.then_some(monitor);
        (self.func)(args, visible_monitor, out)
    }
}
