//! The pluggable monitor framework (spec §4.8).
//!
//! The original source assembles monitors via cooperative multiple
//! inheritance of mixin classes. A systems language has no such thing, so
//! `Monitor` is instead a struct of independent rule flags: each hook method
//! consults the relevant flag and no-ops when its rule is disabled. This
//! keeps the six rules — `BlockRule`, `LiteralRule`, `ArithmeticOpRule`,
//! `UnaryOperatorRule`, `AssignRule`, `ReturnRule` — freely composable
//! without a class hierarchy (spec §9 design notes).
//!
//! `enter_call`/`on_return` bookkeeping is always on, regardless of which
//! rules are enabled: it maintains the invariant that a function call exits
//! at the same PC-stack depth it was entered at (spec §4.8 "Base call/return
//! bookkeeping").

use crate::{
    error::InterpreterError,
    scope::Scope,
    value::{Label, Value},
};

/// A composable information-flow monitor.
///
/// Owns the PC label stack (`pc_levels`, never empty) and the
/// `return_address` stack recording the PC-stack depth to restore on each
/// call's return.
#[derive(Debug, Clone)]
pub struct Monitor {
    pub block_rule: bool,
    pub literal_rule: bool,
    pub arithmetic_rule: bool,
    pub unary_rule: bool,
    pub assign_rule: bool,
    pub return_rule: bool,
    pc_levels: Vec<Label>,
    return_address: Vec<usize>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::none()
    }
}

impl Monitor {
    /// A monitor with every rule disabled — the PC level never changes and
    /// no policy is enforced ("Without this rule, the monitor permits any
    /// branch behaviour", spec §4.8).
    #[must_use]
    pub fn none() -> Self {
        Self {
            block_rule: false,
            literal_rule: false,
            arithmetic_rule: false,
            unary_rule: false,
            assign_rule: false,
            return_rule: false,
            pc_levels: vec![Label::new()],
            return_address: Vec::new(),
        }
    }

    /// The composition used at top level in the shipping challenges: all six
    /// rules active (spec §4.8).
    #[must_use]
    pub fn full() -> Self {
        Self {
            block_rule: true,
            literal_rule: true,
            arithmetic_rule: true,
            unary_rule: true,
            assign_rule: true,
            return_rule: true,
            ..Self::none()
        }
    }

    #[must_use]
    pub fn with_block(mut self, enabled: bool) -> Self {
        self.block_rule = enabled;
        self
    }

    #[must_use]
    pub fn with_literal(mut self, enabled: bool) -> Self {
        self.literal_rule = enabled;
        self
    }

    #[must_use]
    pub fn with_arithmetic(mut self, enabled: bool) -> Self {
        self.arithmetic_rule = enabled;
        self
    }

    #[must_use]
    pub fn with_unary(mut self, enabled: bool) -> Self {
        self.unary_rule = enabled;
        self
    }

    #[must_use]
    pub fn with_assign(mut self, enabled: bool) -> Self {
        self.assign_rule = enabled;
        self
    }

    #[must_use]
    pub fn with_return(mut self, enabled: bool) -> Self {
        self.return_rule = enabled;
        self
    }

    /// The current PC level: the top of the (never-empty) PC label stack.
    #[must_use]
    pub fn current_pc(&self) -> &Label {
        self.pc_levels.last().expect("pc_levels is never empty")
    }

    #[must_use]
    pub fn pc_depth(&self) -> usize {
        self.pc_levels.len()
    }

    /// `BlockRule::enter_block`: pushes `current ∪ guard.label`.
    pub fn enter_block(&mut self, guard: &Value) {
        if self.block_rule {
            let next = crate::value::join(self.current_pc(), &guard.label);
            self.pc_levels.push(next);
        }
    }

    /// `BlockRule::end_block`: pops one frame, never emptying the stack.
    pub fn end_block(&mut self) {
        if self.block_rule && self.pc_levels.len() > 1 {
            self.pc_levels.pop();
        }
    }

    /// `LiteralRule::literal`: overwrites the literal's label with the
    /// current PC level.
    #[must_use]
    pub fn literal(&self, mut value: Value) -> Value {
        if self.literal_rule {
            value.label = self.current_pc().clone();
        }
        value
    }

    /// `ArithmeticOpRule::BinOp`: joins the current PC level with both
    /// operand labels; an empty label (no taint propagated) when the rule is
    /// disabled.
    #[must_use]
    pub fn bin_op(&self, left: &Value, right: &Value) -> Label {
        if self.arithmetic_rule {
            let mut label = crate::value::join(&left.label, &right.label);
            label = crate::value::join(&label, self.current_pc());
            label
        } else {
            Label::new()
        }
    }

    /// `UnaryOperatorRule::UnaryOp`.
    #[must_use]
    pub fn unary_op(&self, operand: &Value) -> Label {
        if self.unary_rule {
            crate::value::join(&operand.label, self.current_pc())
        } else {
            Label::new()
        }
    }

    /// `AssignRule`: validates the no-sensitive-upgrade policy and returns
    /// the value to store, its label raised by the current PC level.
    ///
    /// `value` is already the evaluated, deep-copied right-hand side (owned
    /// by the caller); this only ever raises its label, never lowers it.
    pub fn secure_assign(&self, target_name: &str, scope: &Scope, value: Value) -> Result<Value, InterpreterError> {
        if !self.assign_rule || self.current_pc().is_empty() {
            return Ok(value);
        }
        if !scope.contains(target_name) {
            return Err(InterpreterError::FlowControl(format!(
                "cannot create variable '{target_name}' in a tainted branch"
            )));
        }
        let existing_label = scope.label_of(target_name).unwrap_or_default();
        if !self.current_pc().is_subset(&existing_label) {
            return Err(InterpreterError::FlowControl(format!(
                "cannot modify variable '{target_name}' with label {existing_label:?} from a more sensitive context"
            )));
        }
        Ok(value.with_label_joined(self.current_pc()))
    }

    /// Base call bookkeeping (always on): pushes the current PC-stack depth
    /// so `on_return` knows how far to unwind.
    pub fn enter_call(&mut self) {
        self.return_address.push(self.pc_levels.len());
    }

    /// Number of calls currently on the stack (length of `return_address`).
    /// Used to enforce `Limits::max_call_depth`.
    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.return_address.len()
    }

    /// `ReturnRule` plus base call/return bookkeeping: validates (when
    /// enabled) that the returning PC level is not more sensitive than the
    /// caller's, then always pops `return_address` and truncates
    /// `pc_levels` back to the depth recorded at the matching `enter_call`.
    pub fn on_return(&mut self, _value: &Value) -> Result<(), InterpreterError> {
        let depth = self
            .return_address
            .pop()
            .expect("on_return called without a matching enter_call");
        if self.return_rule {
            let caller_level = self.pc_levels.get(depth.saturating_sub(1)).cloned().unwrap_or_default();
            if !self.current_pc().is_subset(&caller_level) {
                return Err(InterpreterError::FlowControl(
                    "cannot return from a more sensitive context than the caller's".to_owned(),
                ));
            }
        }
        self.pc_levels.truncate(depth.max(1));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    fn tagged(tag: &str) -> Value {
        Value::new(ValueKind::Boolean(true), Label::from([tag.to_owned()]))
    }

    #[test]
    fn enter_block_joins_guard_label_and_end_block_pops() {
        let mut m = Monitor::full();
        assert!(m.current_pc().is_empty());
        m.enter_block(&tagged("high"));
        assert_eq!(m.current_pc(), &Label::from(["high".to_owned()]));
        m.end_block();
        assert!(m.current_pc().is_empty());
    }

    #[test]
    fn end_block_never_empties_the_stack() {
        let mut m = Monitor::full();
        m.end_block();
        m.end_block();
        assert_eq!(m.pc_depth(), 1);
    }

    #[test]
    fn literal_rule_off_leaves_label_untouched() {
        let m = Monitor::none();
        let v = m.literal(Value::number(1.0));
        assert!(v.label.is_empty());
    }

    #[test]
    fn bin_op_joins_operands_and_pc() {
        let mut m = Monitor::full();
        m.enter_block(&tagged("high"));
        let label = m.bin_op(&Value::number(1.0), &Value::number(2.0));
        assert_eq!(label, Label::from(["high".to_owned()]));
    }

    #[test]
    fn assign_rule_blocks_sensitive_upgrade() {
        let mut m = Monitor::full();
        let root = Scope::root();
        root.borrow_mut().declare("l", Value::undefined(), &Label::new());
        m.enter_block(&tagged("high"));
        let result = m.secure_assign("l", &root.borrow(), Value::number(1.0));
        assert!(matches!(result, Err(InterpreterError::FlowControl(_))));
    }

    #[test]
    fn assign_rule_blocks_creating_new_names_in_tainted_branch() {
        let mut m = Monitor::full();
        let root = Scope::root();
        m.enter_block(&tagged("high"));
        let result = m.secure_assign("new_name", &root.borrow(), Value::number(1.0));
        assert!(matches!(result, Err(InterpreterError::FlowControl(_))));
    }

    #[test]
    fn call_and_return_restore_pc_depth() {
        let mut m = Monitor::full();
        m.enter_block(&tagged("high"));
        m.enter_call();
        assert_eq!(m.pc_depth(), 2);
        m.on_return(&Value::undefined()).unwrap();
        assert_eq!(m.pc_depth(), 2); // unchanged: the call happened inside the tainted block
        m.end_block();
        assert_eq!(m.pc_depth(), 1);
    }

    #[test]
    fn return_rule_rejects_return_from_more_sensitive_context_than_caller() {
        let mut m = Monitor::full();
        m.enter_call(); // depth recorded at 1
        m.enter_block(&tagged("high")); // now inside a tainted branch, depth 2
        let result = m.on_return(&Value::undefined());
        assert!(matches!(result, Err(InterpreterError::FlowControl(_))));
    }
}
