//! Pre-order traversal of statements and expressions with an explicit work
//! stack. Visitors return `false` to stop the walk early.

use smallvec::SmallVec;

use super::tree::{Expr, ExternalDecl, FunctionDef, Stmt, TranslationUnit};

impl Expr {
    /// Direct subexpressions in evaluation order.
    pub fn children(&self) -> SmallVec<[&Expr; 4]> {
        let mut out = SmallVec::new();
        match self {
            Expr::Literal(_) | Expr::Var(_) => {}
            Expr::Index { base, index } => {
                out.push(base.as_ref());
                out.push(index.as_ref());
            }
            Expr::Swizzle { base, .. } | Expr::Length(base) | Expr::Paren(base) => {
                out.push(base.as_ref())
            }
            Expr::Unary { expr, .. } => out.push(expr.as_ref()),
            Expr::Binary { left, right, .. } => {
                out.push(left.as_ref());
                out.push(right.as_ref());
            }
            Expr::Assign { target, value, .. } => {
                out.push(target.as_ref());
                out.push(value.as_ref());
            }
            Expr::Ternary {
                cond,
                accept,
                reject,
            } => {
                out.push(cond.as_ref());
                out.push(accept.as_ref());
                out.push(reject.as_ref());
            }
            Expr::Call { args, .. } | Expr::Construct { args, .. } => out.extend(args.iter()),
        }
        out
    }
}

impl Stmt {
    /// Expressions owned directly by this statement, not by nested ones.
    pub fn expressions(&self) -> SmallVec<[&Expr; 2]> {
        let mut out = SmallVec::new();
        match self {
            Stmt::Decl(decl) => out.extend(decl.init.as_ref()),
            Stmt::Expr(expr) | Stmt::Return(Some(expr)) => out.push(expr),
            Stmt::If { cond, .. } | Stmt::While { cond, .. } | Stmt::DoWhile { cond, .. } => {
                out.push(cond)
            }
            Stmt::Switch { selector, .. } => out.push(selector),
            Stmt::For { cond, step, .. } => {
                out.extend(cond.as_ref());
                out.extend(step.as_ref());
            }
            Stmt::Block(_) | Stmt::Break | Stmt::Continue | Stmt::Return(None) => {}
        }
        out
    }
}

pub trait StatementVisitor<F>
where
    F: FnMut(&Stmt) -> bool,
{
    fn visit_statements(&self, visitor: F);
}

pub trait StatementVisitorMut<F>
where
    F: FnMut(&mut Stmt) -> bool,
{
    fn visit_statements_mut(&mut self, visitor: F);
}

pub trait ExpressionVisitor<F>
where
    F: FnMut(&Expr) -> bool,
{
    fn visit_expressions(&self, visitor: F);
}

#[allow(single_use_lifetimes)]
fn walk_statements<'a, F>(roots: impl DoubleEndedIterator<Item = &'a Stmt>, visitor: &mut F) -> bool
where
    F: FnMut(&Stmt) -> bool,
{
    let mut stack: Vec<&Stmt> = roots.rev().collect();
    while let Some(stmt) = stack.pop() {
        if !visitor(stmt) {
            return false;
        }
        match stmt {
            Stmt::Block(stmts) => stack.extend(stmts.iter().rev()),
            Stmt::If { accept, reject, .. } => {
                stack.extend(reject.as_deref());
                stack.push(accept);
            }
            Stmt::Switch { cases, .. } => {
                stack.extend(cases.iter().rev().flat_map(|case| case.body.iter().rev()))
            }
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => stack.push(body),
            Stmt::For { init, body, .. } => {
                stack.push(body);
                stack.extend(init.as_deref());
            }
            Stmt::Decl(_)
            | Stmt::Expr(_)
            | Stmt::Break
            | Stmt::Continue
            | Stmt::Return(_) => {}
        }
    }
    true
}

#[allow(single_use_lifetimes)]
fn walk_statements_mut<'a, F>(
    roots: impl DoubleEndedIterator<Item = &'a mut Stmt>,
    visitor: &mut F,
) -> bool
where
    F: FnMut(&mut Stmt) -> bool,
{
    let mut stack: Vec<&mut Stmt> = roots.rev().collect();
    while let Some(stmt) = stack.pop() {
        if !visitor(&mut *stmt) {
            return false;
        }
        match stmt {
            Stmt::Block(stmts) => stack.extend(stmts.iter_mut().rev()),
            Stmt::If { accept, reject, .. } => {
                stack.extend(reject.as_deref_mut());
                stack.push(accept);
            }
            Stmt::Switch { cases, .. } => stack.extend(
                cases
                    .iter_mut()
                    .rev()
                    .flat_map(|case| case.body.iter_mut().rev()),
            ),
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => stack.push(body),
            Stmt::For { init, body, .. } => {
                stack.push(body);
                stack.extend(init.as_deref_mut());
            }
            Stmt::Decl(_)
            | Stmt::Expr(_)
            | Stmt::Break
            | Stmt::Continue
            | Stmt::Return(_) => {}
        }
    }
    true
}

fn walk_expressions<F>(root: &Expr, visitor: &mut F) -> bool
where
    F: FnMut(&Expr) -> bool,
{
    let mut stack = vec![root];
    while let Some(expr) = stack.pop() {
        if !visitor(expr) {
            return false;
        }
        stack.extend(expr.children().into_iter().rev());
    }
    true
}

impl<F> StatementVisitor<F> for FunctionDef
where
    F: FnMut(&Stmt) -> bool,
{
    fn visit_statements(&self, mut visitor: F) {
        walk_statements(self.body.iter(), &mut visitor);
    }
}

impl<F> StatementVisitorMut<F> for FunctionDef
where
    F: FnMut(&mut Stmt) -> bool,
{
    fn visit_statements_mut(&mut self, mut visitor: F) {
        walk_statements_mut(self.body.iter_mut(), &mut visitor);
    }
}

impl<F> StatementVisitor<F> for TranslationUnit
where
    F: FnMut(&Stmt) -> bool,
{
    fn visit_statements(&self, mut visitor: F) {
        for decl in &self.decls {
            if let ExternalDecl::Function(function) = decl {
                if !walk_statements(function.body.iter(), &mut visitor) {
                    return;
                }
            }
        }
    }
}

impl<F> StatementVisitorMut<F> for TranslationUnit
where
    F: FnMut(&mut Stmt) -> bool,
{
    fn visit_statements_mut(&mut self, mut visitor: F) {
        for function in self.functions_mut() {
            if !walk_statements_mut(function.body.iter_mut(), &mut visitor) {
                return;
            }
        }
    }
}

impl<F> ExpressionVisitor<F> for Expr
where
    F: FnMut(&Expr) -> bool,
{
    fn visit_expressions(&self, mut visitor: F) {
        walk_expressions(self, &mut visitor);
    }
}

impl<F> ExpressionVisitor<F> for FunctionDef
where
    F: FnMut(&Expr) -> bool,
{
    fn visit_expressions(&self, mut visitor: F) {
        let mut go_on = true;
        walk_statements(self.body.iter(), &mut |stmt: &Stmt| {
            for expr in stmt.expressions() {
                go_on = walk_expressions(expr, &mut visitor);
                if !go_on {
                    break;
                }
            }
            go_on
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Prototype, VarDecl};

    fn function() -> FunctionDef {
        let body = vec![
            Stmt::Decl(VarDecl {
                ty: crate::ir::BasicType::INT.into(),
                name: "a".into(),
                init: Some(Expr::binary(BinaryOp::Add, Expr::var("b"), Expr::int(1))),
            }),
            Stmt::While {
                cond: Expr::var("c"),
                body: Box::new(Stmt::Block(vec![Stmt::Break])),
            },
        ];
        FunctionDef {
            proto: Prototype {
                name: "main".into(),
                ret: None,
                params: vec![],
            },
            body,
        }
    }

    #[test]
    fn visits_statements_in_source_order() {
        let mut kinds = Vec::new();
        function().visit_statements(|stmt: &Stmt| {
            kinds.push(match stmt {
                Stmt::Decl(_) => "decl",
                Stmt::While { .. } => "while",
                Stmt::Block(_) => "block",
                Stmt::Break => "break",
                _ => "other",
            });
            true
        });
        assert_eq!(kinds, vec!["decl", "while", "block", "break"]);
    }

    #[test]
    fn stops_when_the_visitor_says_so() {
        let mut seen = 0;
        function().visit_statements(|_: &Stmt| {
            seen += 1;
            false
        });
        assert_eq!(seen, 1);
    }

    #[test]
    fn visits_expressions_pre_order() {
        let mut vars = Vec::new();
        function().visit_expressions(|expr: &Expr| {
            if let Expr::Var(name) = expr {
                vars.push(name.clone());
            }
            true
        });
        assert_eq!(vars, vec!["b", "c"]);
    }

    #[test]
    fn mutable_walk_reaches_nested_bodies() {
        let mut f = function();
        f.visit_statements_mut(|stmt: &mut Stmt| {
            if let Stmt::Block(stmts) = stmt {
                stmts.insert(0, Stmt::Continue);
            }
            true
        });
        match &f.body[1] {
            Stmt::While { body, .. } => {
                assert_eq!(**body, Stmt::Block(vec![Stmt::Continue, Stmt::Break]))
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
