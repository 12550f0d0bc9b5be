//! Typed expression rewriting over every generated function. The walker
//! keeps a [`TypeEnv`] in sync with the declarations it passes so that a
//! rewriter can ask for the type of any subexpression it is handed.

use super::wrappers::is_wrapper_name;
use crate::{
    error::PassError,
    ir::{typing::TypeEnv, Expr, Stmt, TranslationUnit},
};

pub(crate) trait ExprRewriter {
    /// Rewrites one top-level expression. Implementations recurse on their
    /// own, usually through [`map_children`].
    fn rewrite(&mut self, env: &TypeEnv, expr: Expr) -> Result<Expr, PassError>;
}

/// Rebuilds `expr` with every direct child passed through `f`, in
/// evaluation order.
pub(crate) fn map_children<E>(
    expr: Expr,
    f: &mut impl FnMut(Expr) -> Result<Expr, E>,
) -> Result<Expr, E> {
    fn boxed<E>(
        expr: Box<Expr>,
        f: &mut impl FnMut(Expr) -> Result<Expr, E>,
    ) -> Result<Box<Expr>, E> {
        f(*expr).map(Box::new)
    }

    Ok(match expr {
        leaf @ (Expr::Literal(_) | Expr::Var(_)) => leaf,
        Expr::Index { base, index } => Expr::Index {
            base: boxed(base, f)?,
            index: boxed(index, f)?,
        },
        Expr::Swizzle { base, letters } => Expr::Swizzle {
            base: boxed(base, f)?,
            letters,
        },
        Expr::Length(base) => Expr::Length(boxed(base, f)?),
        Expr::Unary { op, expr } => Expr::Unary {
            op,
            expr: boxed(expr, f)?,
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op,
            left: boxed(left, f)?,
            right: boxed(right, f)?,
        },
        Expr::Assign { op, target, value } => Expr::Assign {
            op,
            target: boxed(target, f)?,
            value: boxed(value, f)?,
        },
        Expr::Ternary {
            cond,
            accept,
            reject,
        } => Expr::Ternary {
            cond: boxed(cond, f)?,
            accept: boxed(accept, f)?,
            reject: boxed(reject, f)?,
        },
        Expr::Paren(inner) => Expr::Paren(boxed(inner, f)?),
        Expr::Call { callee, args } => Expr::Call {
            callee,
            args: args.into_iter().map(&mut *f).collect::<Result<_, _>>()?,
        },
        Expr::Construct { ty, args } => Expr::Construct {
            ty,
            args: args.into_iter().map(&mut *f).collect::<Result<_, _>>()?,
        },
    })
}

/// Runs `rewriter` over every expression of every function but the safe
/// wrappers. `env` holds the globals and prototypes visible to all of them.
pub(crate) fn rewrite_functions<R: ExprRewriter>(
    unit: &mut TranslationUnit,
    env: &TypeEnv,
    rewriter: &mut R,
) -> Result<(), PassError> {
    for function in unit.functions_mut() {
        if is_wrapper_name(&function.proto.name) {
            continue;
        }
        let mut env = env.clone();
        env.push();
        for param in &function.proto.params {
            env.declare(&param.name, param.ty.into());
        }
        walk_stmts(rewriter, &mut env, &mut function.body)?;
    }
    Ok(())
}

fn rewrite_slot<R: ExprRewriter>(
    rewriter: &mut R,
    env: &TypeEnv,
    slot: &mut Expr,
) -> Result<(), PassError> {
    let expr = std::mem::replace(slot, Expr::boolean(false));
    *slot = rewriter.rewrite(env, expr)?;
    Ok(())
}

fn walk_stmts<R: ExprRewriter>(
    rewriter: &mut R,
    env: &mut TypeEnv,
    stmts: &mut [Stmt],
) -> Result<(), PassError> {
    stmts
        .iter_mut()
        .try_for_each(|stmt| walk_stmt(rewriter, env, stmt))
}

fn walk_scoped<R: ExprRewriter>(
    rewriter: &mut R,
    env: &mut TypeEnv,
    stmt: &mut Stmt,
) -> Result<(), PassError> {
    env.push();
    let result = match stmt {
        Stmt::Block(stmts) => walk_stmts(rewriter, env, stmts),
        other => walk_stmt(rewriter, env, other),
    };
    env.pop();
    result
}

fn walk_stmt<R: ExprRewriter>(
    rewriter: &mut R,
    env: &mut TypeEnv,
    stmt: &mut Stmt,
) -> Result<(), PassError> {
    match stmt {
        Stmt::Decl(decl) => {
            if let Some(init) = &mut decl.init {
                rewrite_slot(rewriter, env, init)?;
            }
            env.declare(&decl.name, decl.ty);
        }
        Stmt::Expr(expr) | Stmt::Return(Some(expr)) => rewrite_slot(rewriter, env, expr)?,
        Stmt::Block(stmts) => {
            env.push();
            let result = walk_stmts(rewriter, env, stmts);
            env.pop();
            result?
        }
        Stmt::If {
            cond,
            accept,
            reject,
        } => {
            rewrite_slot(rewriter, env, cond)?;
            walk_scoped(rewriter, env, accept)?;
            if let Some(reject) = reject {
                walk_scoped(rewriter, env, reject)?;
            }
        }
        Stmt::Switch { selector, cases } => {
            rewrite_slot(rewriter, env, selector)?;
            env.push();
            for case in cases.iter_mut() {
                walk_stmts(rewriter, env, &mut case.body)?;
            }
            env.pop();
        }
        Stmt::While { cond, body } => {
            rewrite_slot(rewriter, env, cond)?;
            walk_scoped(rewriter, env, body)?;
        }
        Stmt::DoWhile { body, cond } => {
            walk_scoped(rewriter, env, body)?;
            rewrite_slot(rewriter, env, cond)?;
        }
        Stmt::For {
            init,
            cond,
            step,
            body,
        } => {
            env.push();
            if let Some(init) = init {
                walk_stmt(rewriter, env, init)?;
            }
            if let Some(cond) = cond {
                rewrite_slot(rewriter, env, cond)?;
            }
            if let Some(step) = step {
                rewrite_slot(rewriter, env, step)?;
            }
            walk_scoped(rewriter, env, body)?;
            env.pop();
        }
        Stmt::Break | Stmt::Continue | Stmt::Return(None) => {}
    }
    Ok(())
}
