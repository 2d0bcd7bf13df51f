use std::{cell::RefCell, rc::Rc};

use super::{binary, Limits, StepBudget};
use crate::{
    ast::{BinOpKind, Expr, UnaryOpKind},
    builtins::OutputSink,
    bytecode::{compile_block, scan_locals},
    error::InterpreterError,
    function::{Function, UserFunction},
    monitor::Monitor,
    scope::Scope,
    value::{Value, ValueKind},
};

/// Pure evaluation over expressions, invoking the monitor's hooks wherever
/// spec §4.6 calls for it. "Pure" in the sense of having no control-flow
/// effect of its own (it never jumps); it still performs side effects
/// through `print`/`labelPrint` when a `Call` expression reaches a builtin.
#[allow(clippy::too_many_arguments)]
pub fn eval(
    expr: &Expr,
    scope: &Rc<RefCell<Scope>>,
    monitor: &mut Monitor,
    budget: &mut StepBudget,
    limits: &Limits,
    out: &mut dyn OutputSink,
) -> Result<Value, InterpreterError> {
    match expr {
        Expr::Number(n) => Ok(monitor.literal(Value::number(*n))),
        Expr::String(s) => Ok(monitor.literal(Value::string(s.clone()))),
        Expr::Boolean(b) => Ok(monitor.literal(Value::boolean(*b))),
        Expr::Null => Ok(monitor.literal(Value::null())),
        Expr::Undefined => Ok(monitor.literal(Value::undefined())),
        Expr::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, scope, monitor, budget, limits, out)?);
            }
            Ok(monitor.literal(Value::array(values)))
        }
        Expr::Name(name) => scope.borrow().get(name),
        Expr::BinOp(op, left, right) => eval_binop(*op, left, right, scope, monitor, budget, limits, out),
        Expr::UnaryOp(op, operand) => {
            let value = eval(operand, scope, monitor, budget, limits, out)?;
            let label = monitor.unary_op(&value);
            let kind = match op {
                UnaryOpKind::Neg => ValueKind::Number(-value.to_number()),
                UnaryOpKind::Not => ValueKind::Boolean(value.is_falsy()),
            };
            Ok(Value::new(kind, label))
        }
        Expr::Index(target, index) => {
            let target = eval(target, scope, monitor, budget, limits, out)?;
            let index = eval(index, scope, monitor, budget, limits, out)?;
            let label = crate::value::join(&target.label, &index.label);
            let ValueKind::Array(values) = &target.kind else {
                return Err(InterpreterError::UnsupportedOperation(
                    "cannot index a value that is not an array".to_owned(),
                ));
            };
            let i = index.to_number();
            let element = (i >= 0.0 && i.fract() == 0.0)
                .then(|| values.get(i as usize).cloned())
                .flatten()
                .unwrap_or_else(Value::undefined);
            Ok(Value::new(element.kind, crate::value::join(&element.label, &label)))
        }
        Expr::Attribute(_value, attr) => Err(InterpreterError::UnsupportedOperation(format!(
            "no value in this language has an attribute '{attr}'"
        ))),
        Expr::Call(callee, arg_exprs) => {
            let callee_value = eval(callee, scope, monitor, budget, limits, out)?;
            let mut args = Vec::with_capacity(arg_exprs.len());
            for arg in arg_exprs {
                args.push(eval(arg, scope, monitor, budget, limits, out)?);
            }
            let ValueKind::Function(func) = &callee_value.kind else {
                return Err(InterpreterError::UnsupportedOperation("value is not a function".to_owned()));
            };
            func.call(args, monitor, budget, limits, out)
        }
        Expr::Assign(target, value) => perform_assign(target, value, scope, monitor, budget, limits, out),
        Expr::Return(_) => Err(InterpreterError::IllegalState(
            "Return only appears as a top-level instruction, never nested in an expression".to_owned(),
        )),
        Expr::FunctionDef(name, params, body) => {
            let locals = scan_locals(body);
            let code = compile_block(body);
            let user_fn = UserFunction {
                name: name.clone(),
                code: Rc::new(code),
                locals,
                params: params.clone(),
                captured: scope.clone(),
            };
            let value = Value::function(Function::User(user_fn));
            if let Some(name) = name {
                scope.borrow_mut().declare(name.clone(), value.clone(), &crate::value::Label::new());
            }
            Ok(value)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn eval_binop(
    op: BinOpKind,
    left: &Expr,
    right: &Expr,
    scope: &Rc<RefCell<Scope>>,
    monitor: &mut Monitor,
    budget: &mut StepBudget,
    limits: &Limits,
    out: &mut dyn OutputSink,
) -> Result<Value, InterpreterError> {
    let left_value = eval(left, scope, monitor, budget, limits, out)?;

    if op.is_short_circuit() {
        let left_decides = match op {
            BinOpKind::Or => !left_value.is_falsy(),
            BinOpKind::And => left_value.is_falsy(),
            _ => unreachable!("is_short_circuit only returns true for And/Or"),
        };
        if left_decides {
            return Ok(left_value);
        }
        monitor.enter_block(&left_value);
        let right_value = eval(right, scope, monitor, budget, limits, out)?;
        monitor.end_block();
        let label = monitor.bin_op(&left_value, &right_value);
        return Ok(Value::new(right_value.kind, label));
    }

    let right_value = eval(right, scope, monitor, budget, limits, out)?;
    let label = monitor.bin_op(&left_value, &right_value);
    let kind = binary::apply(op, &left_value, &right_value)?;
    Ok(Value::new(kind, label))
}

/// Shared by `Expr::Assign` and the `Assign`/`VarDecl` instructions: resolves
/// the target name, evaluates the right-hand side, runs it through
/// `AssignRule`, and writes the result into scope.
#[allow(clippy::too_many_arguments)]
pub(crate) fn perform_assign(
    target: &Expr,
    value: &Expr,
    scope: &Rc<RefCell<Scope>>,
    monitor: &mut Monitor,
    budget: &mut StepBudget,
    limits: &Limits,
    out: &mut dyn OutputSink,
) -> Result<Value, InterpreterError> {
    let name = expect_name(target)?;
    let raw = eval(value, scope, monitor, budget, limits, out)?;
    let stored = monitor.secure_assign(&name, &scope.borrow(), raw)?;
    scope.borrow_mut().set(&name, stored.clone(), false);
    Ok(stored)
}

/// `Assign`'s target must be a `Name`; anything else fails `NotYetImplemented`
/// (spec §4.7: "Non-name targets fail NotYetImplemented").
fn expect_name(target: &Expr) -> Result<String, InterpreterError> {
    match target {
        Expr::Name(name) => Ok(name.clone()),
        _ => Err(InterpreterError::NotYetImplemented(
            "assignment to a non-name target".to_owned(),
        )),
    }
}
