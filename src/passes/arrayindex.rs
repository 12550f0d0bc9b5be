use serde::Deserialize;

use super::{
    walk::{map_children, rewrite_functions, ExprRewriter},
    wrappers::{is_index_clamp, is_length, Operation, WrapperObligation},
};
use crate::{
    error::PassError,
    generator::GenerationContext,
    ir::{typing::TypeEnv, BasicType, BinaryOp, Expr, ScalarKind},
};

/// Bounded form every array index is rewritten to.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum IndexMode {
    /// `clamp(i, 0, a.length() - 1)`
    #[default]
    Clamp,
    /// `SAFE_ABS(i) % a.length()`
    Modulo,
}

fn is_pure(expr: &Expr) -> bool {
    match expr {
        Expr::Var(_) | Expr::Literal(_) => true,
        Expr::Index { base, index } => is_pure(base) && is_pure(index),
        Expr::Swizzle { base, .. } | Expr::Paren(base) => is_pure(base),
        _ => false,
    }
}

fn already_safe(index: &Expr) -> bool {
    match index {
        Expr::Call { callee, args } if callee == "clamp" => is_index_clamp(args),
        Expr::Binary {
            op: BinaryOp::Modulo,
            right,
            ..
        } => is_length(right),
        _ => false,
    }
}

#[derive(Debug)]
struct IndexGuard {
    mode: IndexMode,
    obligations: Vec<WrapperObligation>,
}

impl IndexGuard {
    fn guard(&mut self, base: &Expr, len: u32, kind: ScalarKind, index: Expr) -> Expr {
        // `.length()` would evaluate an impure base twice
        let length = if is_pure(base) {
            Expr::Length(Box::new(base.clone()))
        } else {
            Expr::int(len as i32)
        };
        let unsigned = kind == ScalarKind::Uint;
        let length = if unsigned {
            Expr::construct(BasicType::UINT, vec![length])
        } else {
            length
        };
        let (zero, one) = if unsigned {
            (Expr::uint(0), Expr::uint(1))
        } else {
            (Expr::int(0), Expr::int(1))
        };
        match self.mode {
            IndexMode::Clamp => Expr::call(
                "clamp",
                vec![index, zero, Expr::binary(BinaryOp::Subtract, length, one)],
            ),
            IndexMode::Modulo if unsigned => Expr::binary(BinaryOp::Modulo, index, length),
            IndexMode::Modulo => {
                self.obligations
                    .push(WrapperObligation::new(Operation::Abs, BasicType::INT, None));
                Expr::binary(
                    BinaryOp::Modulo,
                    Expr::call(Operation::Abs.name(), vec![index]),
                    length,
                )
            }
        }
    }
}

impl ExprRewriter for IndexGuard {
    fn rewrite(&mut self, env: &TypeEnv, expr: Expr) -> Result<Expr, PassError> {
        let target = match &expr {
            Expr::Index { base, index } if !already_safe(index) => {
                let base_ty = env.infer(base)?;
                match base_ty.array_length() {
                    Some(len) => Some((len, env.infer_basic(index)?.kind)),
                    None => None,
                }
            }
            _ => None,
        };
        let expr = map_children(expr, &mut |child| self.rewrite(env, child))?;
        Ok(match (target, expr) {
            (Some((len, kind)), Expr::Index { base, index }) => {
                let index = self.guard(&base, len, kind, *index);
                Expr::Index {
                    base,
                    index: Box::new(index),
                }
            }
            (_, expr) => expr,
        })
    }
}

/// Bounds every array subscript to `[0, length)`.
pub fn safe_indexing(
    mut ctx: GenerationContext,
    mode: IndexMode,
) -> Result<GenerationContext, PassError> {
    let env = TypeEnv::for_unit(&ctx.unit);
    let mut guard = IndexGuard {
        mode,
        obligations: Vec::new(),
    };
    rewrite_functions(&mut ctx.unit, &env, &mut guard)?;
    for obligation in guard.obligations {
        ctx.require_wrapper(obligation);
    }
    Ok(ctx)
}
