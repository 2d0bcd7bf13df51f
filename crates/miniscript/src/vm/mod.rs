//! The PC-driven interpreter loop (spec §4.7).

mod binary;
mod eval;

use std::{cell::RefCell, rc::Rc};

use crate::{
    ast::Expr,
    builtins::OutputSink,
    bytecode::Instruction,
    error::InterpreterError,
    monitor::Monitor,
    scope::Scope,
    value::Value,
};

/// Resource limits beyond the step budget (spec §5.1, an ambient addition
/// the original source has no equivalent of).
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_call_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_call_depth: 256 }
    }
}

/// Caps the total number of instructions executed across a run, *including*
/// every nested function call — a single counter shared by reference
/// through every `UserFunction::call`, so recursion cannot be used to reset
/// the budget (spec §9 design note iv: "implementations should always
/// expose a budgeted form").
#[derive(Debug)]
pub struct StepBudget {
    remaining: u64,
}

impl StepBudget {
    #[must_use]
    pub fn new(max_steps: u64) -> Self {
        Self { remaining: max_steps }
    }

    fn consume(&mut self) -> Result<(), InterpreterError> {
        if self.remaining == 0 {
            return Err(InterpreterError::MaximumStepsReached);
        }
        self.remaining -= 1;
        Ok(())
    }
}

/// What a single `step()` call did to the program counter.
enum StepOutcome {
    Advance(i64),
    Returned(Value),
}

/// What a whole `run()` call produced: either the function body executed an
/// explicit `return`, or control fell off the end of the instruction stream
/// (spec §4.9: "absent return → Undefined").
pub enum RunOutcome {
    Returned(Value),
    FellOff,
}

/// One stepping interpreter: an instruction stream, a scope, a program
/// counter, and a reference to the shared monitor (spec §4.7).
///
/// A fresh `Interpreter` is created for every function call (its own `pc`
/// and `scope`), but it borrows the *same* `Monitor` the caller holds — the
/// monitor's PC-label stack and return-address stack span every nested call
/// in a run, which is exactly what lets `ReturnRule`/`AssignRule` reason
/// about flows that cross function boundaries.
pub struct Interpreter<'m> {
    code: Rc<Vec<Instruction>>,
    scope: Rc<RefCell<Scope>>,
    pc: i64,
    monitor: &'m mut Monitor,
}

impl<'m> Interpreter<'m> {
    #[must_use]
    pub fn new(code: Rc<Vec<Instruction>>, scope: Rc<RefCell<Scope>>, monitor: &'m mut Monitor) -> Self {
        Self { code, scope, pc: 0, monitor }
    }

    /// Fetches the instruction at `pc`, dispatches it, and reports whether
    /// control should keep advancing or a `Return` instruction fired.
    fn step(&mut self, budget: &mut StepBudget, limits: &Limits, out: &mut dyn OutputSink) -> Result<StepOutcome, InterpreterError> {
        budget.consume()?;
        let index = usize::try_from(self.pc).map_err(|_| InterpreterError::IllegalState("pc went negative".to_owned()))?;
        let instruction = self
            .code
            .get(index)
            .ok_or_else(|| InterpreterError::IllegalState(format!("pc {index} out of bounds")))?;

        match instruction {
            Instruction::Jump(offset) => Ok(StepOutcome::Advance(*offset)),
            Instruction::ConditionalJump(cond, offset) => {
                let value = eval::eval(cond, &self.scope, self.monitor, budget, limits, out)?;
                self.monitor.enter_block(&value);
                Ok(StepOutcome::Advance(if value.is_falsy() { 1 } else { *offset }))
            }
            Instruction::Assign(target, value) => {
                eval::perform_assign(target, value, &self.scope, self.monitor, budget, limits, out)?;
                Ok(StepOutcome::Advance(1))
            }
            Instruction::Return(expr) => {
                let value = eval::eval(expr, &self.scope, self.monitor, budget, limits, out)?;
                self.monitor.on_return(&value)?;
                Ok(StepOutcome::Returned(value))
            }
            Instruction::EndBlock => {
                self.monitor.end_block();
                Ok(StepOutcome::Advance(1))
            }
            Instruction::VarDecl(name, value) => {
                if let Some(value) = value {
                    eval::perform_assign(&Expr::Name(name.clone()), value, &self.scope, self.monitor, budget, limits, out)?;
                }
                Ok(StepOutcome::Advance(1))
            }
            Instruction::Expression(expr) => {
                eval::eval(expr, &self.scope, self.monitor, budget, limits, out)?;
                Ok(StepOutcome::Advance(1))
            }
        }
    }

    /// Runs until the program counter exits the code bounds cleanly (normal
    /// completion) or a `Return` instruction fires. An out-of-bounds `pc`
    /// reached through a malformed jump — anything other than landing
    /// exactly at `code.len()` — fails `IllegalState`; exhausting `budget`
    /// fails `MaximumStepsReached`.
    pub fn run(&mut self, budget: &mut StepBudget, limits: &Limits, out: &mut dyn OutputSink) -> Result<RunOutcome, InterpreterError> {
        loop {
            if self.pc == self.code.len() as i64 {
                return Ok(RunOutcome::FellOff);
            }
            if self.pc < 0 || self.pc > self.code.len() as i64 {
                return Err(InterpreterError::IllegalState(format!("pc {} out of bounds", self.pc)));
            }
            match self.step(budget, limits, out)? {
                StepOutcome::Advance(offset) => self.pc += offset,
                StepOutcome::Returned(value) => return Ok(RunOutcome::Returned(value)),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn run_unbounded(&mut self, out: &mut dyn OutputSink) -> Result<RunOutcome, InterpreterError> {
        self.run(&mut StepBudget::new(u64::MAX), &Limits::default(), out)
    }
}
