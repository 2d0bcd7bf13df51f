use crate::{
    ast::BinOpKind,
    error::InterpreterError,
    value::{Value, ValueKind},
};

/// Applies a non-short-circuit binary operator to two already-evaluated
/// operands, per the per-operator contracts in spec §4.6. The result's
/// label is computed by the caller (`monitor.bin_op`); this only computes
/// the payload.
pub fn apply(op: BinOpKind, left: &Value, right: &Value) -> Result<ValueKind, InterpreterError> {
    Ok(match op {
        BinOpKind::Add => return Ok(add(left, right)?),
        BinOpKind::Sub => ValueKind::Number(left.to_number() - right.to_number()),
        BinOpKind::Mul => ValueKind::Number(left.to_number() * right.to_number()),
        BinOpKind::Mod => ValueKind::Number(left.to_number() % right.to_number()),
        BinOpKind::Div => ValueKind::Number(divide(left.to_number(), right.to_number())),
        BinOpKind::Eq => ValueKind::Boolean(left.structurally_eq(right)),
        BinOpKind::Ne => ValueKind::Boolean(!left.structurally_eq(right)),
        BinOpKind::Gt => ValueKind::Boolean(left.to_number() > right.to_number()),
        BinOpKind::Lt => ValueKind::Boolean(left.to_number() < right.to_number()),
        BinOpKind::Ge => ValueKind::Boolean(left.to_number() >= right.to_number()),
        BinOpKind::Le => ValueKind::Boolean(left.to_number() <= right.to_number()),
        BinOpKind::And | BinOpKind::Or => {
            return Err(InterpreterError::IllegalState(
                "short-circuit operators are handled by the evaluator directly".to_owned(),
            ));
        }
    })
}

/// `+`: numeric add when both operands are `Number`/`Boolean`, otherwise
/// string-concatenation of their string forms (spec §4.6).
fn add(left: &Value, right: &Value) -> Result<ValueKind, InterpreterError> {
    let both_numeric = matches!(left.kind, ValueKind::Number(_) | ValueKind::Boolean(_))
        && matches!(right.kind, ValueKind::Number(_) | ValueKind::Boolean(_));
    if both_numeric {
        Ok(ValueKind::Number(left.to_number() + right.to_number()))
    } else {
        Ok(ValueKind::String(format!(
            "{}{}",
            left.to_display_string()?,
            right.to_display_string()?
        )))
    }
}

/// `/` with the explicit zero-divisor cases from spec §4.6:
/// `0/0 = NaN`, `positive/0 = +Inf`, `negative/0 = -Inf`.
fn divide(left: f64, right: f64) -> f64 {
    if right == 0.0 {
        if left == 0.0 {
            f64::NAN
        } else if left > 0.0 {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        }
    } else {
        left / right
    }
}
