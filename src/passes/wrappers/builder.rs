//! Call-site rewriting. `ArithmeticWrapperBuilder` covers operators,
//! `StdWrapperBuilder` covers builtin calls; both answer whether a node
//! needs a wrapper, and [`WrapperBuilder`] applies the answer bottom-up.

use smallvec::SmallVec;

use super::{Operation, WrapperObligation};
use crate::{
    error::PassError,
    ir::{typing::TypeEnv, BasicType, BinaryOp, Expr, Literal, ScalarKind},
    passes::walk::{map_children, ExprRewriter},
};

/// `x.length()` or `uint(x.length())`.
pub(crate) fn is_length(expr: &Expr) -> bool {
    match expr {
        Expr::Length(_) => true,
        Expr::Construct { args, .. } => matches!(args.as_slice(), [Expr::Length(_)]),
        _ => false,
    }
}

/// Arguments of a `clamp(i, 0, x.length() - 1)` emitted by safe indexing.
pub(crate) fn is_index_clamp(args: &[Expr]) -> bool {
    let zero = |expr: &Expr| {
        matches!(
            expr,
            Expr::Literal(Literal::Int(0)) | Expr::Literal(Literal::Uint(0))
        )
    };
    match args {
        [_, lo, Expr::Binary {
            op: BinaryOp::Subtract,
            left,
            ..
        }] => zero(lo) && is_length(left),
        _ => false,
    }
}

struct ArithmeticWrapperBuilder;

impl ArithmeticWrapperBuilder {
    fn plan(env: &TypeEnv, expr: &Expr) -> Result<Option<WrapperObligation>, PassError> {
        match expr {
            Expr::Binary { op, left, right } => {
                let Some(operation) = Operation::for_binary(*op) else {
                    return Ok(None);
                };
                if *op == BinaryOp::Modulo && is_length(right) {
                    return Ok(None);
                }
                let l = env.infer_basic(left)?;
                let r = env.infer_basic(right)?;
                Self::obligation(operation, [l, r])
            }
            Expr::Assign { op, target, value } => {
                let Some(operation) = Operation::for_assign(*op) else {
                    return Ok(None);
                };
                let t = env.infer_basic(target)?;
                let v = env.infer_basic(value)?;
                Self::obligation(operation, [t, v])
            }
            Expr::Unary { op, expr } => {
                let Some(operation) = Operation::for_unary(*op) else {
                    return Ok(None);
                };
                let ty = env.infer_basic(expr)?;
                if ty.kind != ScalarKind::Float {
                    return Ok(None);
                }
                WrapperObligation::from_args(operation, &[ty]).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn obligation(
        operation: Operation,
        [l, r]: [BasicType; 2],
    ) -> Result<Option<WrapperObligation>, PassError> {
        use Operation as O;
        let float_only = matches!(
            operation,
            O::Add | O::AddAssign | O::Sub | O::SubAssign | O::Mul | O::MulAssign
        );
        if float_only && l.kind != ScalarKind::Float {
            return Ok(None);
        }
        WrapperObligation::from_args(operation, &[l, r]).map(Some)
    }
}

struct StdWrapperBuilder;

impl StdWrapperBuilder {
    fn plan(env: &TypeEnv, expr: &Expr) -> Result<Option<WrapperObligation>, PassError> {
        let Expr::Call { callee, args } = expr else {
            return Ok(None);
        };
        let operation = match callee.as_str() {
            "abs" => Operation::Abs,
            "clamp" if !is_index_clamp(args) => Operation::Clamp,
            "bitfieldExtract" => Operation::BitfieldExtract,
            "bitfieldInsert" => Operation::BitfieldInsert,
            _ => return Ok(None),
        };
        let types = args
            .iter()
            .map(|arg| env.infer_basic(arg))
            .collect::<Result<SmallVec<[_; 4]>, _>>()?;
        if operation == Operation::Abs && types.first().map(|ty| ty.kind) != Some(ScalarKind::Int)
        {
            return Ok(None);
        }
        WrapperObligation::from_args(operation, &types).map(Some)
    }
}

#[derive(Debug, Default)]
pub(super) struct WrapperBuilder {
    obligations: Vec<WrapperObligation>,
}

impl WrapperBuilder {
    pub(super) fn into_obligations(self) -> Vec<WrapperObligation> {
        self.obligations
    }
}

/// Operands of the wrapper call replacing `expr`.
fn call_args(expr: Expr) -> Vec<Expr> {
    match expr {
        Expr::Binary { left, right, .. } => vec![*left, *right],
        Expr::Assign { target, value, .. } => vec![*target, *value],
        Expr::Unary { expr, .. } => vec![*expr],
        Expr::Call { args, .. } => args,
        other => vec![other],
    }
}

impl ExprRewriter for WrapperBuilder {
    fn rewrite(&mut self, env: &TypeEnv, expr: Expr) -> Result<Expr, PassError> {
        // operand types are read off the tree before its children are
        // replaced by wrapper calls
        let plan = match ArithmeticWrapperBuilder::plan(env, &expr)? {
            Some(obligation) => Some(obligation),
            None => StdWrapperBuilder::plan(env, &expr)?,
        };
        let expr = map_children(expr, &mut |child| self.rewrite(env, child))?;
        Ok(match plan {
            Some(obligation) => {
                self.obligations.push(obligation);
                Expr::call(obligation.name(), call_args(expr))
            }
            None => expr,
        })
    }
}
