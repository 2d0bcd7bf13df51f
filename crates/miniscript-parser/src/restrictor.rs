//! AST-restrictor visitors (spec §1 "out of scope": "AST-restrictor visitors
//! that reject forbidden syntax before execution").
//!
//! Grounded in `original_source/challenges/04 - No ifs/challenge.py`'s
//! `NoIfNodeVisitor(NodeVisitor)`, which overrides a single `visit_If` and
//! otherwise falls back to the base `NodeVisitor`'s permissive traversal. A
//! `NodeVisitor` subclass in the original is reduced here to a single
//! `visit_stmt`/`visit_expr` pair on a trait object: a restrictor either
//! approves a node (and this module recurses into its children) or rejects
//! the whole program by returning `false`.

use miniscript::ast::{Expr, Stmt};

/// A restriction policy applied to a parsed program before it is compiled.
///
/// `visit_stmt`/`visit_expr` are called once per node, outermost first; a
/// `false` return stops the walk and rejects the program (mirrors
/// `Challenge.run`: "if not self.restrictions or self.restrictions(ast)").
/// The default implementations approve every node and let `walk` recurse
/// into children, matching `NodeVisitor.generic_visit`'s traversal.
pub trait Restrictor {
    fn visit_stmt(&mut self, _stmt: &Stmt) -> bool {
        true
    }

    fn visit_expr(&mut self, _expr: &Expr) -> bool {
        true
    }
}

/// The default, permissive restrictor — equivalent to running a challenge
/// with `restrictions=None` in the original harness.
#[derive(Debug, Default)]
pub struct AllowAll;

impl Restrictor for AllowAll {}

/// Rejects any program containing an `if` statement, modeling challenge
/// "04 - No ifs".
#[derive(Debug, Default)]
pub struct NoConditionals;

impl Restrictor for NoConditionals {
    fn visit_stmt(&mut self, stmt: &Stmt) -> bool {
        !matches!(stmt, Stmt::If(..))
    }
}

/// Walks every statement (and, within each statement, every expression) in
/// `program`, applying `restrictor`. Returns `true` iff every node was
/// approved.
#[must_use]
pub fn check(program: &[Stmt], restrictor: &mut dyn Restrictor) -> bool {
    program.iter().all(|stmt| check_stmt(stmt, restrictor))
}

fn check_stmt(stmt: &Stmt, restrictor: &mut dyn Restrictor) -> bool {
    if !restrictor.visit_stmt(stmt) {
        return false;
    }
    match stmt {
        Stmt::If(cond, then, els) => {
            check_expr(cond, restrictor)
                && check(then, restrictor)
                && els.as_deref().is_none_or(|e| check(e, restrictor))
        }
        Stmt::While(cond, body) => check_expr(cond, restrictor) && check(body, restrictor),
        Stmt::VarDecl(_, value) => value.as_ref().is_none_or(|v| check_expr(v, restrictor)),
        Stmt::Expr(expr) => check_expr(expr, restrictor),
    }
}

fn check_expr(expr: &Expr, restrictor: &mut dyn Restrictor) -> bool {
    if !restrictor.visit_expr(expr) {
        return false;
    }
    match expr {
        Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) | Expr::Null | Expr::Undefined | Expr::Name(_) => true,
        Expr::Array(items) => items.iter().all(|i| check_expr(i, restrictor)),
        Expr::BinOp(_, l, r) => check_expr(l, restrictor) && check_expr(r, restrictor),
        Expr::UnaryOp(_, e) => check_expr(e, restrictor),
        Expr::Index(t, i) => check_expr(t, restrictor) && check_expr(i, restrictor),
        Expr::Attribute(v, _) => check_expr(v, restrictor),
        Expr::Call(f, args) => check_expr(f, restrictor) && args.iter().all(|a| check_expr(a, restrictor)),
        Expr::Assign(t, v) => check_expr(t, restrictor) && check_expr(v, restrictor),
        Expr::Return(e) => check_expr(e, restrictor),
        Expr::FunctionDef(_, _, body) => check(body, restrictor),
    }
}
