use std::{collections::BTreeSet, fmt, rc::Rc};

use crate::{error::InterpreterError, function::Function};

/// A security label: an unordered set of string tags.
///
/// Implemented as a `BTreeSet` rather than a hash set so that two labels
/// compare and iterate deterministically — useful for `Display`, for the
/// `label`/`labelPrint` builtins, and for tests that assert on a label's
/// rendered form. The partial order is subset inclusion; join is union;
/// bottom is the empty set.
pub type Label = BTreeSet<String>;

/// Joins two labels, producing their union. A tiny free function rather than
/// a method on `BTreeSet` so call sites read as the lattice operation they
/// are (`join(a, b)`) instead of a generic collection method.
#[must_use]
pub fn join(a: &Label, b: &Label) -> Label {
    a.union(b).cloned().collect()
}

/// A single runtime value together with the security label it carries.
///
/// Labels are value-local metadata, never derived from address: copying a
/// value copies its label. `Value` derives `Clone`, and that clone *is* the
/// deep copy the monitor's assign rule relies on (`AssignRule`, spec §4.8) —
/// `String` and `Array` payloads are owned, so there is no aliasing to worry
/// about and no separate "deep_clone" method is needed.
#[derive(Debug, Clone)]
pub struct Value {
    pub kind: ValueKind,
    pub label: Label,
}

#[derive(Debug, Clone)]
pub enum ValueKind {
    Undefined,
    Null,
    Number(f64),
    Boolean(bool),
    String(String),
    Array(Vec<Value>),
    Function(Rc<Function>),
}

impl Value {
    #[must_use]
    pub fn new(kind: ValueKind, label: Label) -> Self {
        Self { kind, label }
    }

    #[must_use]
    pub fn unlabelled(kind: ValueKind) -> Self {
        Self::new(kind, Label::new())
    }

    #[must_use]
    pub fn undefined() -> Self {
        Self::unlabelled(ValueKind::Undefined)
    }

    #[must_use]
    pub fn null() -> Self {
        Self::unlabelled(ValueKind::Null)
    }

    #[must_use]
    pub fn number(v: f64) -> Self {
        Self::unlabelled(ValueKind::Number(v))
    }

    #[must_use]
    pub fn boolean(v: bool) -> Self {
        Self::unlabelled(ValueKind::Boolean(v))
    }

    #[must_use]
    pub fn string(v: impl Into<String>) -> Self {
        Self::unlabelled(ValueKind::String(v.into()))
    }

    #[must_use]
    pub fn array(values: Vec<Value>) -> Self {
        Self::unlabelled(ValueKind::Array(values))
    }

    #[must_use]
    pub fn function(f: Function) -> Self {
        Self::unlabelled(ValueKind::Function(Rc::new(f)))
    }

    /// Returns a clone of this value with `extra` joined into its label.
    #[must_use]
    pub fn with_label_joined(&self, extra: &Label) -> Self {
        Self {
            kind: self.kind.clone(),
            label: join(&self.label, extra),
        }
    }

    /// `to_number(v)`: the total conversion to a numeric value (spec §4.1).
    ///
    /// Never fails — every variant has a defined numeric form, including
    /// `NaN` for values with no sensible number (`Undefined`, non-numeric
    /// strings, multi-element arrays).
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match &self.kind {
            ValueKind::Number(n) => *n,
            ValueKind::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            ValueKind::Null => 0.0,
            ValueKind::Undefined => f64::NAN,
            ValueKind::String(s) => s.trim().parse::<i64>().map_or(f64::NAN, |n| n as f64),
            ValueKind::Array(values) if values.len() == 1 => values[0].to_number(),
            ValueKind::Array(_) | ValueKind::Function(_) => f64::NAN,
        }
    }

    /// `to_string(v)`: the total conversion to a display string (spec §4.1).
    ///
    /// Fails with `UnsupportedOperation` only for values that genuinely have
    /// no string form — in this language, none do, so this always succeeds;
    /// the `Result` return keeps the signature honest with the spec's
    /// "fails with `UnsupportedOperation` when asked to ... string-convert
    /// something that has no string form" clause for callers that extend the
    /// value model with such a variant.
    pub fn to_display_string(&self) -> Result<String, InterpreterError> {
        Ok(match &self.kind {
            ValueKind::Undefined => "undefined".to_owned(),
            ValueKind::Null => "null".to_owned(),
            ValueKind::Boolean(b) => b.to_string(),
            ValueKind::Number(n) => format_number(*n),
            ValueKind::String(s) => s.clone(),
            ValueKind::Array(values) => match values.len() {
                0 => String::new(),
                1 => values[0].to_display_string()?,
                _ => {
                    let mut out = String::from("[");
                    for (i, v) in values.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(&v.to_display_string()?);
                    }
                    out.push(']');
                    out
                }
            },
            ValueKind::Function(f) => f.display_name().to_owned(),
        })
    }

    /// `is_falsy(v)` (spec §4.1).
    #[must_use]
    pub fn is_falsy(&self) -> bool {
        match &self.kind {
            ValueKind::Boolean(b) => !*b,
            ValueKind::Number(n) => *n == 0.0 || n.is_nan(),
            ValueKind::Null | ValueKind::Undefined => true,
            ValueKind::String(s) => s.is_empty(),
            ValueKind::Array(_) | ValueKind::Function(_) => false,
        }
    }

    /// Structural equality ignoring labels (spec §4.1: "Labels do not
    /// participate in equality of values").
    #[must_use]
    pub fn structurally_eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (ValueKind::Undefined, ValueKind::Undefined) | (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Number(a), ValueKind::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (ValueKind::Boolean(a), ValueKind::Boolean(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Array(a), ValueKind::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structurally_eq(y))
            }
            (ValueKind::Function(a), ValueKind::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string().unwrap_or_default())
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_owned() } else { "-Infinity".to_owned() }
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}
