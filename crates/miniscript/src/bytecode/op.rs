use crate::ast::Expr;

/// The closed instruction set the compiler lowers an AST into (spec §4.5).
///
/// Jump offsets are *relative* to the jump instruction itself, matching the
/// compiler's lowering rules (spec §4.4) exactly.
#[derive(Debug, Clone)]
pub enum Instruction {
    Jump(i64),
    ConditionalJump(Expr, i64),
    Assign(Expr, Expr),
    Return(Expr),
    EndBlock,
    VarDecl(String, Option<Expr>),
    /// Any expression evaluated for side effect; the result is discarded.
    Expression(Expr),
}
