//! The challenge harness (spec §1 "out of scope": "the per-challenge
//! command-line harnesses"; spec §6 "Challenge harness").
//!
//! Grounded in `original_source/challenges/common.py`'s `Challenge` class:
//! build a scope with a `high`/`low` pair, parse and optionally restrict the
//! attacker's source, compile, run it under a configured monitor, and check
//! that `low` ended up structurally equal to `high` with an empty label.

use miniscript::{
    builtins::{install_builtins, OutputSink},
    monitor::Monitor,
    run_program,
    value::{Label, Value},
    vm::{Limits, StepBudget},
    InterpreterError,
};
use miniscript_parser::{check, parse, AllowAll, NoConditionals, Restrictor};

/// Which high-labelled seed value to challenge the attacker to exfiltrate.
#[derive(Debug, Clone, Copy)]
pub enum HighKind {
    Number(f64),
    Boolean(bool),
}

impl HighKind {
    fn into_value(self) -> Value {
        let value = match self {
            Self::Number(n) => Value::number(n),
            Self::Boolean(b) => Value::boolean(b),
        };
        value.with_label_joined(&Label::from(["high".to_owned()]))
    }
}

/// Which `Restrictor` to run over the parsed AST before compiling it, chosen
/// by name on the command line (spec §1's "AST-restrictor visitors").
#[derive(Debug, Clone, Copy)]
pub enum RestrictorKind {
    AllowAll,
    NoConditionals,
}

impl RestrictorKind {
    fn build(self) -> Box<dyn Restrictor> {
        match self {
            Self::AllowAll => Box::new(AllowAll),
            Self::NoConditionals => Box::new(NoConditionals),
        }
    }
}

pub struct ChallengeConfig {
    pub monitor: Monitor,
    pub restrictor: RestrictorKind,
    pub high: HighKind,
    pub limits: Limits,
    pub max_steps: u64,
}

pub enum Outcome {
    Passed,
    FailedPolicyCheck { got: Value },
    ForbiddenSyntax,
    Error(InterpreterError),
}

/// Runs one challenge attempt against `source`, mirroring
/// `Challenge.run`/`Challenge.check` from the original harness.
pub fn run(source: &str, config: &ChallengeConfig, out: &mut dyn OutputSink) -> Outcome {
    let program = match parse(source) {
        Ok(program) => program,
        Err(err) => return Outcome::Error(InterpreterError::IllegalState(err.to_string())),
    };

    let mut restrictor = config.restrictor.build();
    if !check(&program, restrictor.as_mut()) {
        return Outcome::ForbiddenSyntax;
    }

    let scope = miniscript::Scope::root();
    install_builtins(&scope);
    {
        let mut scope_mut = scope.borrow_mut();
        scope_mut.declare("high", config.high.into_value(), &Label::new());
        scope_mut.declare("low", Value::undefined(), &Label::new());
    }

    let mut monitor = config.monitor.clone();
    let mut budget = StepBudget::new(config.max_steps);
    if let Err(err) = run_program(&program, &scope, &mut monitor, &mut budget, &config.limits, out) {
        return Outcome::Error(err);
    }

    let low = match scope.borrow().get("low") {
        Ok(v) => v,
        Err(err) => return Outcome::Error(err),
    };
    let high = scope.borrow().get("high").expect("declared above");
    if low.structurally_eq(&high) && low.label.is_empty() {
        Outcome::Passed
    } else {
        Outcome::FailedPolicyCheck { got: low }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miniscript::builtins::NoPrint;

    fn full_config(high: HighKind) -> ChallengeConfig {
        ChallengeConfig {
            monitor: Monitor::full(),
            restrictor: RestrictorKind::AllowAll,
            high,
            limits: Limits::default(),
            max_steps: 10_000,
        }
    }

    #[test]
    fn explicit_flow_is_blocked() {
        let config = full_config(HighKind::Number(7.0));
        let outcome = run("low = high;", &config, &mut NoPrint);
        assert!(matches!(outcome, Outcome::FailedPolicyCheck { .. }));
    }

    #[test]
    fn implicit_flow_is_blocked() {
        let config = full_config(HighKind::Boolean(true));
        let outcome = run("if (high) { low = 1; } else { low = 0; }", &config, &mut NoPrint);
        assert!(matches!(outcome, Outcome::Error(InterpreterError::FlowControl(_))));
    }

    #[test]
    fn arithmetic_flow_is_blocked() {
        let config = full_config(HighKind::Number(7.0));
        let outcome = run("low = (high * 0) + 42;", &config, &mut NoPrint);
        assert!(matches!(outcome, Outcome::FailedPolicyCheck { .. }));
    }

    #[test]
    fn unlabelled_program_passes() {
        let config = full_config(HighKind::Number(7.0));
        let outcome = run("low = 7;", &config, &mut NoPrint);
        assert!(matches!(outcome, Outcome::Passed));
    }

    #[test]
    fn no_conditionals_restrictor_rejects_if() {
        let config = ChallengeConfig { restrictor: RestrictorKind::NoConditionals, ..full_config(HighKind::Boolean(true)) };
        let outcome = run("if (high) { low = 1; }", &config, &mut NoPrint);
        assert!(matches!(outcome, Outcome::ForbiddenSyntax));
    }

    #[test]
    fn step_budget_is_enforced() {
        let config = ChallengeConfig { max_steps: 50, ..full_config(HighKind::Number(1.0)) };
        let outcome = run("while (true) { var x = 1; }", &config, &mut NoPrint);
        assert!(matches!(outcome, Outcome::Error(InterpreterError::MaximumStepsReached)));
    }
}
