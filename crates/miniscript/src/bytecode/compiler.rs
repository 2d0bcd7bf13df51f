use super::{builder::CodeBuilder, op::Instruction};
use crate::ast::{Expr, Stmt};

/// Lowers a structured statement list into a flat instruction stream with
/// only relative jumps and explicit `EndBlock` markers (spec §4.4).
#[must_use]
pub fn compile_block(stmts: &[Stmt]) -> Vec<Instruction> {
    let mut builder = CodeBuilder::new();
    for stmt in stmts {
        builder.push_block(compile_stmt(stmt));
    }
    builder.build()
}

fn compile_stmt(stmt: &Stmt) -> Vec<Instruction> {
    match stmt {
        // Expression / Assign / Return / VarDecl / Call: emit the node
        // itself as a single-slot instruction.
        Stmt::Expr(Expr::Assign(target, value)) => {
            vec![Instruction::Assign((**target).clone(), (**value).clone())]
        }
        Stmt::Expr(Expr::Return(expr)) => vec![Instruction::Return((**expr).clone())],
        Stmt::Expr(expr) => vec![Instruction::Expression(expr.clone())],
        Stmt::VarDecl(name, value) => vec![Instruction::VarDecl(name.clone(), value.clone())],
        Stmt::If(cond, then, els) => compile_if(cond, then, els.as_deref()),
        Stmt::While(cond, body) => compile_while(cond, body),
    }
}

/// `If(cond, then, els?)` (spec §4.4):
/// ```text
/// ConditionalJump(cond, |els|+2)
/// <els>                         (may be empty)
/// Jump(|then|+1)
/// <then>
/// EndBlock
/// ```
fn compile_if(cond: &Expr, then: &[Stmt], els: Option<&[Stmt]>) -> Vec<Instruction> {
    let then_code = compile_block(then);
    let els_code = els.map(compile_block).unwrap_or_default();

    let mut builder = CodeBuilder::new();
    builder.push(Instruction::ConditionalJump(cond.clone(), (els_code.len() + 2) as i64));
    builder.push_block(els_code);
    builder.push(Instruction::Jump((then_code.len() + 1) as i64));
    builder.push_block(then_code);
    builder.push(Instruction::EndBlock);
    builder.build()
}

/// `While(cond, body)` (spec §4.4):
/// ```text
/// Jump(|body|+2)
/// <body>
/// EndBlock
/// ConditionalJump(cond, -(|body|+1))
/// EndBlock
/// ```
fn compile_while(cond: &Expr, body: &[Stmt]) -> Vec<Instruction> {
    let body_code = compile_block(body);

    let mut builder = CodeBuilder::new();
    builder.push(Instruction::Jump((body_code.len() + 2) as i64));
    builder.push_block(body_code.clone());
    builder.push(Instruction::EndBlock);
    builder.push(Instruction::ConditionalJump(cond.clone(), -((body_code.len() + 1) as i64)));
    builder.push(Instruction::EndBlock);
    builder.build()
}

/// Scans a function body's statements for `VarDecl` names, the way
/// `UserFunction::call` needs in order to pre-declare locals at function
/// entry (spec §4.9). Recurses into nested `If`/`While` blocks (they share
/// the function's scope) but not into nested `FunctionDef` expressions —
/// those get their own locals scan when their own `UserFunction` is built.
#[must_use]
pub fn scan_locals(stmts: &[Stmt]) -> Vec<String> {
    let mut locals = Vec::new();
    scan_locals_into(stmts, &mut locals);
    locals
}

fn scan_locals_into(stmts: &[Stmt], locals: &mut Vec<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::VarDecl(name, _) => {
                if !locals.contains(name) {
                    locals.push(name.clone());
                }
            }
            Stmt::If(_, then, els) => {
                scan_locals_into(then, locals);
                if let Some(els) = els {
                    scan_locals_into(els, locals);
                }
            }
            Stmt::While(_, body) => scan_locals_into(body, locals),
            Stmt::Expr(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOpKind;

    fn name(s: &str) -> Expr {
        Expr::Name(s.to_owned())
    }

    #[test]
    fn if_without_else_has_exactly_one_end_block() {
        let code = compile_if(&name("cond"), &[Stmt::VarDecl("x".into(), None)], None);
        let end_blocks = code.iter().filter(|i| matches!(i, Instruction::EndBlock)).count();
        assert_eq!(end_blocks, 1);
        assert_eq!(code.len(), 4); // ConditionalJump, Jump, VarDecl, EndBlock
    }

    #[test]
    fn if_jump_offsets_land_correctly() {
        let then = vec![Stmt::Expr(Expr::Assign(Box::new(name("l")), Box::new(Expr::Number(1.0))))];
        let els = vec![Stmt::Expr(Expr::Assign(Box::new(name("l")), Box::new(Expr::Number(0.0))))];
        let code = compile_if(&name("h"), &then, Some(&els));
        // ConditionalJump(cond, |els|+2) with |els| == 1 -> offset 3
        match &code[0] {
            Instruction::ConditionalJump(_, offset) => assert_eq!(*offset, 3),
            other => panic!("expected ConditionalJump, got {other:?}"),
        }
        // landing at pc + 3 from index 0 is index 3, which is the start of <then>
        assert!(matches!(code[3], Instruction::Assign(_, Expr::Number(n)) if n == 1.0));
        // falsy path advances by 1, landing at index 1, start of <els>
        assert!(matches!(code[1], Instruction::Assign(_, Expr::Number(n)) if n == 0.0));
    }

    #[test]
    fn while_has_tail_test_and_two_end_blocks() {
        let body = vec![Stmt::Expr(Expr::Assign(Box::new(name("x")), Box::new(Expr::Number(1.0))))];
        let code = compile_while(&name("true"), &body);
        assert!(matches!(code[0], Instruction::Jump(3))); // |body|=1 -> jump 1+2=3
        assert!(matches!(code[2], Instruction::EndBlock));
        assert!(matches!(code[3], Instruction::ConditionalJump(_, -2))); // -(1+1)
        assert!(matches!(code[4], Instruction::EndBlock));
    }

    #[test]
    fn locals_scan_recurses_into_control_flow_but_not_nested_functions() {
        let body = vec![
            Stmt::VarDecl("a".into(), None),
            Stmt::If(
                name("cond"),
                vec![Stmt::VarDecl("b".into(), None)],
                Some(vec![Stmt::VarDecl("c".into(), None)]),
            ),
            Stmt::Expr(Expr::FunctionDef(None, vec![], vec![Stmt::VarDecl("inner".into(), None)])),
        ];
        let locals = scan_locals(&body);
        assert_eq!(locals, vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]);
    }

    #[test]
    fn flattening_preserves_statement_order() {
        let stmts = vec![
            Stmt::VarDecl("a".into(), Some(Expr::Number(1.0))),
            Stmt::Expr(Expr::Assign(Box::new(name("a")), Box::new(Expr::BinOp(BinOpKind::Add, Box::new(name("a")), Box::new(Expr::Number(1.0)))))),
        ];
        let code = compile_block(&stmts);
        assert_eq!(code.len(), 2);
        assert!(matches!(code[0], Instruction::VarDecl(_, _)));
        assert!(matches!(code[1], Instruction::Assign(_, _)));
    }
}
