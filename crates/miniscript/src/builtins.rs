//! Optional builtin host functions injected into the global environment
//! (spec §1 "out of scope", §4.9): `print`, `label`, `labelPrint`.
//!
//! These are not part of THE CORE — a caller is free to build a global
//! scope without calling `install_builtins` at all — but they're provided
//! here because every shipping challenge needs them.

use std::{cell::RefCell, rc::Rc};

use crate::{
    error::InterpreterError,
    function::{BuiltinFunction, Function},
    scope::Scope,
    value::{Label, Value},
};

/// Where `print`/`labelPrint` write their output.
///
/// Decouples builtins from `println!` exactly the way the teacher crate's
/// `PrintWriter` trait decouples the VM's `print()` builtin from stdout, so
/// tests can capture output instead of writing to the terminal.
pub trait OutputSink {
    fn write_line(&mut self, line: &str);
}

/// Writes to the process's standard output.
#[derive(Debug, Default)]
pub struct StdPrint;

impl OutputSink for StdPrint {
    fn write_line(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Collects output into a `Vec<String>` instead of printing it; used by
/// tests that assert on what a program printed.
#[derive(Debug, Default)]
pub struct CollectPrint(pub Vec<String>);

impl OutputSink for CollectPrint {
    fn write_line(&mut self, line: &str) {
        self.0.push(line.to_owned());
    }
}

/// Discards all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl OutputSink for NoPrint {
    fn write_line(&mut self, _line: &str) {}
}

/// Declares `print`, `label`, and `labelPrint` in the given scope.
pub fn install_builtins(scope: &Rc<RefCell<Scope>>) {
    let mut scope_mut = scope.borrow_mut();
    scope_mut.declare("print", Value::function(Function::Builtin(print_builtin())), &Label::new());
    scope_mut.declare("label", Value::function(Function::Builtin(label_builtin())), &Label::new());
    scope_mut.declare(
        "labelPrint",
        Value::function(Function::Builtin(label_print_builtin())),
        &Label::new(),
    );
}

fn print_builtin() -> BuiltinFunction {
    BuiltinFunction::new("print", false, |args, _monitor, out| {
        let mut parts = Vec::with_capacity(args.len());
        for arg in args {
            parts.push(arg.to_display_string()?);
        }
        out.write_line(&parts.join(" "));
        Ok(None)
    })
}

/// `label(v, ...tags)`: deep-copies `v` and returns the copy with its label
/// unioned with the stringified tags.
fn label_builtin() -> BuiltinFunction {
    BuiltinFunction::new("label", false, |args, _monitor, _out| {
        let Some((value, tags)) = args.split_first() else {
            return Err(InterpreterError::UnsupportedOperation("label() requires a value argument".to_owned()));
        };
        let mut copy = value.clone();
        for tag in tags {
            copy.label.insert(tag.to_display_string()?);
        }
        Ok(Some(copy))
    })
}

fn label_print_builtin() -> BuiltinFunction {
    BuiltinFunction::new("labelPrint", true, |args, monitor, out| {
        let monitor = monitor.expect("labelPrint always requests the monitor");
        for arg in args {
            out.write_line(&format!(
                "{} label={:?} pc={:?}",
                arg.to_display_string()?,
                arg.label,
                monitor.current_pc()
            ));
        }
        Ok(None)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{monitor::Monitor, value::ValueKind};

    #[test]
    fn label_unions_tags_and_deep_copies() {
        let original = Value::number(5.0);
        let f = label_builtin();
        let mut out = NoPrint;
        let monitor = Monitor::full();
        let result = f
            .call(&[original.clone(), Value::string("a"), Value::string("b")], &monitor, &mut out)
            .unwrap()
            .unwrap();
        assert!(original.label.is_empty());
        assert_eq!(result.label, Label::from(["a".to_owned(), "b".to_owned()]));
        assert!(matches!(result.kind, ValueKind::Number(n) if n == 5.0));
    }

    #[test]
    fn print_joins_args_with_spaces() {
        let f = print_builtin();
        let mut out = CollectPrint::default();
        let monitor = Monitor::full();
        f.call(&[Value::string("a"), Value::number(1.0)], &monitor, &mut out).unwrap();
        assert_eq!(out.0, vec!["a 1".to_owned()]);
    }
}
