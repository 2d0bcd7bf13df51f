//! Whole-program integration tests for the end-to-end scenarios and
//! universal properties enumerated in spec §8, built through
//! `miniscript-parser` and run through named monitor compositions —
//! mirroring the split the teacher crate keeps between inline
//! `#[cfg(test)] mod tests` blocks (unit-level, one per module) and a
//! top-level `tests/` directory (whole-program, black-box).

use std::{cell::RefCell, rc::Rc};

use miniscript::{
    builtins::{install_builtins, CollectPrint},
    monitor::Monitor,
    run_program,
    value::{Label, Value},
    vm::{Limits, StepBudget},
    InterpreterError, Scope,
};
use pretty_assertions::assert_eq;

fn run_with_high(
    source: &str,
    high: Value,
    monitor: &mut Monitor,
    max_steps: u64,
) -> Result<Rc<RefCell<Scope>>, InterpreterError> {
    let program = miniscript_parser::parse(source).expect("source parses");
    let scope = Scope::root();
    install_builtins(&scope);
    {
        let mut scope_mut = scope.borrow_mut();
        scope_mut.declare("high", high, &Label::new());
        scope_mut.declare("low", Value::undefined(), &Label::new());
    }
    let mut budget = StepBudget::new(max_steps);
    let mut out = CollectPrint::default();
    run_program(&program, &scope, monitor, &mut budget, &Limits::default(), &mut out)?;
    Ok(scope)
}

fn high_number(n: f64) -> Value {
    Value::number(n).with_label_joined(&Label::from(["high".to_owned()]))
}

fn high_boolean(b: bool) -> Value {
    Value::boolean(b).with_label_joined(&Label::from(["high".to_owned()]))
}

/// (a) Explicit flow blocked: `low = high;` leaves `low` structurally equal
/// to `high` but with its label intact, so the harness-level check
/// (`low.label.is_empty()`) fails even though no error was raised.
#[test]
fn explicit_flow_leaves_label_tainted() {
    let mut monitor = Monitor::full();
    let scope = run_with_high("low = high;", high_number(7.0), &mut monitor, 1_000).unwrap();
    let low = scope.borrow().get("low").unwrap();
    assert_eq!(low.label, Label::from(["high".to_owned()]));
}

/// (b) Implicit flow blocked: assigning to `low` inside a branch guarded by
/// `high` is rejected by the no-sensitive-upgrade rule.
#[test]
fn implicit_flow_is_flow_control_error() {
    let mut monitor = Monitor::full();
    let err = run_with_high("if (high) { low = 1; } else { low = 0; }", high_boolean(true), &mut monitor, 1_000)
        .unwrap_err();
    assert!(matches!(err, InterpreterError::FlowControl(_)));
}

/// (c) Arithmetic admitted: `(high * 0) + 42` still carries `high`'s label
/// through the join, even though its numeric value no longer depends on it.
#[test]
fn arithmetic_join_taints_regardless_of_value() {
    let mut monitor = Monitor::full();
    let scope = run_with_high("low = (high * 0) + 42;", high_number(7.0), &mut monitor, 1_000).unwrap();
    let low = scope.borrow().get("low").unwrap();
    assert_eq!(low.to_number(), 42.0);
    assert_eq!(low.label, Label::from(["high".to_owned()]));
}

/// (d) `label()` round-trips structurally while unioning tags.
#[test]
fn label_function_round_trips() {
    let mut monitor = Monitor::full();
    let scope =
        run_with_high(r#"x = label(5, "a", "b"); y = label(5, "a", "b");"#, high_number(0.0), &mut monitor, 1_000)
            .unwrap();
    let scope = scope.borrow();
    let x = scope.get("x").unwrap();
    let y = scope.get("y").unwrap();
    assert!(x.structurally_eq(&y));
    assert_eq!(x.label, Label::from(["a".to_owned(), "b".to_owned()]));
}

/// (e) Division edge cases.
#[test]
fn division_edge_cases() {
    let mut monitor = Monitor::none();
    let scope = run_with_high("a = 1/0; b = -1/0; c = 0/0; d = 4/2;", high_number(0.0), &mut monitor, 1_000).unwrap();
    let scope = scope.borrow();
    assert_eq!(scope.get("a").unwrap().to_number(), f64::INFINITY);
    assert_eq!(scope.get("b").unwrap().to_number(), f64::NEG_INFINITY);
    assert!(scope.get("c").unwrap().to_number().is_nan());
    assert_eq!(scope.get("d").unwrap().to_number(), 2.0);
}

/// (f) Loop termination via budget: `pc_levels == [∅]` is *not* required
/// after an abnormal `MaximumStepsReached` exit, only that the error fires.
#[test]
fn infinite_loop_is_stopped_by_step_budget() {
    let mut monitor = Monitor::full();
    let err = run_with_high("while (true) { var x = 1; }", high_number(0.0), &mut monitor, 100).unwrap_err();
    assert!(matches!(err, InterpreterError::MaximumStepsReached));
}

/// (g) Return across branches: with `h` falsy, `return 2` is reached
/// *outside* the tainted branch (PC level `∅`), so the return itself is
/// legal — but `l`'s label still ends up `{"high"}` because the call-site
/// argument `f(h)` was bound with `h`'s label, and that label flows back
/// out through the call's result regardless of which `return` fired.
#[test]
fn return_outside_tainted_branch_is_legal_but_result_stays_tainted() {
    let mut monitor = Monitor::full();
    let scope = run_with_high(
        "function f(x) { if (x) { return 1; } return 2; } low = f(high);",
        high_boolean(false),
        &mut monitor,
        1_000,
    )
    .unwrap();
    let low = scope.borrow().get("low").unwrap();
    assert_eq!(low.to_number(), 2.0);
    assert_eq!(low.label, Label::from(["high".to_owned()]));
}

/// Universal property 6: a call's PC-stack depth is restored exactly to its
/// pre-call depth on return, even across an internal branch that `return`
/// unwinds through (using the same falsy-`h` program as scenario (g), since
/// a truthy `h` would instead hit `ReturnRule`'s rejection of returning from
/// a more sensitive context than the caller's — a different, and also
/// correct, outcome covered by the next test).
#[test]
fn return_discipline_restores_pc_depth_across_branches() {
    let mut monitor = Monitor::full();
    assert_eq!(monitor.pc_depth(), 1);
    run_with_high(
        "function f(x) { if (x) { return 1; } return 2; } low = f(high);",
        high_boolean(false),
        &mut monitor,
        1_000,
    )
    .unwrap();
    assert_eq!(monitor.pc_depth(), 1);
}

/// `ReturnRule` rejects a `return` executed from a branch more sensitive
/// than the calling context — here `h` is truthy, so `return 1` fires from
/// inside the tainted `if` branch.
#[test]
fn return_rule_rejects_return_from_tainted_branch() {
    let mut monitor = Monitor::full();
    let err = run_with_high(
        "function f(x) { if (x) { return 1; } return 2; } low = f(high);",
        high_boolean(true),
        &mut monitor,
        1_000,
    )
    .unwrap_err();
    assert!(matches!(err, InterpreterError::FlowControl(_)));
}

/// Universal property 7: compiling `If`/`While` and executing under a
/// no-op monitor reaches the state a direct recursive interpretation of the
/// same AST would.
#[test]
fn compiled_control_flow_reaches_expected_state() {
    let mut monitor = Monitor::none();
    let scope = run_with_high(
        "var i = 0; var sum = 0; while (i < 5) { sum = sum + i; i = i + 1; } low = sum;",
        high_number(0.0),
        &mut monitor,
        1_000,
    )
    .unwrap();
    assert_eq!(scope.borrow().get("low").unwrap().to_number(), 10.0);
}

/// Short-circuit evaluation: `&&`/`||` do not evaluate (or taint through)
/// their right operand when the left side already decides the result.
#[test]
fn short_circuit_skips_right_operand_label() {
    let mut monitor = Monitor::full();
    let scope = run_with_high("low = false && high;", high_boolean(true), &mut monitor, 1_000).unwrap();
    let low = scope.borrow().get("low").unwrap();
    assert!(low.label.is_empty());
    assert!(!low.to_number().is_nan()); // false (0), not high's value
}

/// A program using only public values passes the non-interference check:
/// the monitor never needs to reject anything, and `low` ends unlabelled.
#[test]
fn fully_public_program_ends_unlabelled() {
    let mut monitor = Monitor::full();
    let scope = run_with_high("low = 1 + 2 * 3;", high_number(0.0), &mut monitor, 1_000).unwrap();
    let low = scope.borrow().get("low").unwrap();
    assert_eq!(low.to_number(), 7.0);
    assert!(low.label.is_empty());
}
