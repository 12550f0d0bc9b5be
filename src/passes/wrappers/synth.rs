//! Wrapper bodies. Every body is `cond ? fallback : real`, where `cond`
//! holds exactly for the inputs on which `real` is undefined.

use super::{Operation, WrapperObligation, ID_PARAM, TRACE_MEMBER};
use crate::ir::{
    typing::literal_of, AssignOp, BasicType, BinaryOp, Expr, ScalarKind, Stmt, UnaryOp,
};

/// Smallest float magnitude at which consecutive integers stop being
/// representable.
const FLOAT_PRECISION_LIMIT: i64 = 1 << 24;
const FLOAT_FALLBACK: i64 = 8;
const MOD_FALLBACK: i64 = i32::MAX as i64 - 1;
const SHIFT_FALLBACK: i32 = 16;

struct Parts {
    cond: Expr,
    fallback: Expr,
    real: Expr,
}

fn param(name: &str) -> Expr {
    Expr::var(name)
}

fn literal(ty: BasicType, value: i64) -> Expr {
    Expr::Literal(literal_of(ty, value))
}

fn splat(ty: BasicType, value: i64) -> Expr {
    Expr::splat(ty, literal_of(ty, value))
}

fn vector_builtin(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Equal => "equal",
        BinaryOp::NotEqual => "notEqual",
        BinaryOp::Less => "lessThan",
        BinaryOp::LessEqual => "lessThanEqual",
        BinaryOp::Greater => "greaterThan",
        BinaryOp::GreaterEqual => "greaterThanEqual",
        other => unreachable!("{other:?} is not a comparison"),
    }
}

/// `x <op> value`, or `any(<op>(x, T(value)))` when `x` is a vector.
fn compare(x: Expr, ty: BasicType, op: BinaryOp, value: i64) -> Expr {
    compare_with(x, ty, op, splat(ty, value))
}

fn compare_with(x: Expr, ty: BasicType, op: BinaryOp, rhs: Expr) -> Expr {
    if ty.is_scalar() {
        Expr::binary(op, x, rhs)
    } else {
        Expr::call("any", vec![Expr::call(vector_builtin(op), vec![x, rhs])])
    }
}

fn or(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOp::LogicalOr, left, right)
}

/// `A` converted to the wrapper's return shape when a scalar operand meets
/// a vector one.
fn widened(x: Expr, ty: BasicType, ret: BasicType) -> Expr {
    if ty == ret {
        x
    } else {
        Expr::construct(ret, vec![x])
    }
}

struct Synth {
    traced: bool,
    deps: Vec<WrapperObligation>,
}

impl Synth {
    /// A call of another wrapper from inside a body, forwarding the call
    /// site id when tracing.
    fn safe_call(&mut self, op: Operation, ty: BasicType, mut args: Vec<Expr>) -> Expr {
        self.deps.push(WrapperObligation::new(op, ty, None));
        if self.traced {
            args.push(param(ID_PARAM));
        }
        Expr::call(op.name(), args)
    }

    fn safe_abs(&mut self, x: Expr, ty: BasicType) -> Expr {
        self.safe_call(Operation::Abs, ty, vec![x])
    }

    fn parts(&mut self, ob: &WrapperObligation) -> Parts {
        use Operation as O;
        let (a, ret) = (ob.a, ob.ret());
        let b = ob.b.unwrap_or(a);
        let (pa, pb) = (param("A"), param("B"));
        match ob.op {
            O::Abs => Parts {
                cond: compare(pa.clone(), a, BinaryOp::Equal, i32::MIN as i64),
                fallback: splat(a, i32::MAX as i64),
                real: Expr::call("abs", vec![pa]),
            },
            O::Div | O::DivAssign => {
                let mut cond = compare(pb.clone(), b, BinaryOp::Equal, 0);
                if a.kind == ScalarKind::Int {
                    let overflow = Expr::binary(
                        BinaryOp::LogicalAnd,
                        compare(pa.clone(), a, BinaryOp::Equal, i32::MIN as i64),
                        compare(pb.clone(), b, BinaryOp::Equal, -1),
                    );
                    cond = or(cond, Expr::paren(overflow));
                }
                if ob.op == O::Div {
                    Parts {
                        cond,
                        fallback: Expr::binary(
                            BinaryOp::Divide,
                            widened(pa.clone(), a, ret),
                            literal(a, 2),
                        ),
                        real: Expr::binary(BinaryOp::Divide, pa, pb),
                    }
                } else {
                    Parts {
                        cond,
                        fallback: Expr::assign(AssignOp::Divide, pa.clone(), literal(a, 2)),
                        real: Expr::assign(AssignOp::Divide, pa, pb),
                    }
                }
            }
            O::Mod | O::ModAssign if a.kind == ScalarKind::Int => {
                let abs_b = self.safe_abs(pb.clone(), b);
                let cond = compare(abs_b, b, BinaryOp::Equal, 0);
                let fallback = Expr::binary(
                    BinaryOp::Modulo,
                    widened(self.safe_abs(pa.clone(), a), a, ret),
                    literal(a, MOD_FALLBACK),
                );
                let real = Expr::binary(
                    BinaryOp::Modulo,
                    self.safe_abs(pa.clone(), a),
                    self.safe_abs(pb, b),
                );
                if ob.op == O::Mod {
                    Parts {
                        cond,
                        fallback,
                        real,
                    }
                } else {
                    Parts {
                        cond,
                        fallback: Expr::assign(AssignOp::Assign, pa.clone(), fallback),
                        real: Expr::assign(AssignOp::Assign, pa, real),
                    }
                }
            }
            O::Mod => Parts {
                cond: compare(pb.clone(), b, BinaryOp::Equal, 0),
                fallback: Expr::binary(
                    BinaryOp::Modulo,
                    widened(pa.clone(), a, ret),
                    literal(a, MOD_FALLBACK),
                ),
                real: Expr::binary(BinaryOp::Modulo, pa, pb),
            },
            O::ModAssign => Parts {
                cond: compare(pb.clone(), b, BinaryOp::Equal, 0),
                fallback: Expr::assign(AssignOp::Modulo, pa.clone(), literal(a, MOD_FALLBACK)),
                real: Expr::assign(AssignOp::Modulo, pa, pb),
            },
            O::LShift | O::LShiftAssign | O::RShift | O::RShiftAssign => {
                let mut cond = compare(pb.clone(), b, BinaryOp::GreaterEqual, 32);
                if b.kind == ScalarKind::Int {
                    cond = or(cond, compare(pb.clone(), b, BinaryOp::Less, 0));
                }
                let fallback_amount = Expr::int(SHIFT_FALLBACK);
                match (ob.op.assign_op(), ob.op.binary_op()) {
                    (Some(assign), _) => Parts {
                        cond,
                        fallback: Expr::assign(assign, pa.clone(), fallback_amount),
                        real: Expr::assign(assign, pa, pb),
                    },
                    (None, Some(op)) => Parts {
                        cond,
                        fallback: Expr::binary(op, pa.clone(), fallback_amount),
                        real: Expr::binary(op, pa, pb),
                    },
                    (None, None) => unreachable!("shifts have an operator"),
                }
            }
            O::BitfieldExtract | O::BitfieldInsert => {
                let (callee, leading, offset, bits) = if ob.op == O::BitfieldExtract {
                    ("bitfieldExtract", vec![pa], param("B"), param("C"))
                } else {
                    ("bitfieldInsert", vec![pa, pb], param("C"), param("D"))
                };
                let int = BasicType::INT;
                let cond = [
                    Expr::binary(BinaryOp::Less, offset.clone(), Expr::int(0)),
                    Expr::binary(BinaryOp::GreaterEqual, offset.clone(), Expr::int(32)),
                    Expr::binary(BinaryOp::Less, bits.clone(), Expr::int(0)),
                    Expr::binary(
                        BinaryOp::Greater,
                        bits.clone(),
                        Expr::binary(BinaryOp::Subtract, Expr::int(32), offset.clone()),
                    ),
                ]
                .into_iter()
                .reduce(or)
                .expect("four tests");
                let safe_offset = Expr::binary(
                    BinaryOp::Modulo,
                    self.safe_abs(offset.clone(), int),
                    Expr::int(32),
                );
                let safe_bits = Expr::binary(
                    BinaryOp::Modulo,
                    self.safe_abs(bits.clone(), int),
                    Expr::binary(BinaryOp::Subtract, Expr::int(32), safe_offset.clone()),
                );
                let mut fallback_args = leading.clone();
                fallback_args.extend([safe_offset, safe_bits]);
                let mut real_args = leading;
                real_args.extend([offset, bits]);
                Parts {
                    cond,
                    fallback: Expr::call(callee, fallback_args),
                    real: Expr::call(callee, real_args),
                }
            }
            O::Clamp => {
                let (lo, hi) = (pb, param("C"));
                Parts {
                    cond: compare_with(lo.clone(), b, BinaryOp::Greater, hi.clone()),
                    fallback: Expr::call(
                        "clamp",
                        vec![
                            pa.clone(),
                            Expr::call("min", vec![lo.clone(), hi.clone()]),
                            Expr::call("max", vec![lo.clone(), hi.clone()]),
                        ],
                    ),
                    real: Expr::call("clamp", vec![pa, lo, hi]),
                }
            }
            O::Add | O::Sub | O::Mul => {
                let op = ob.op.binary_op().expect("arithmetic operator");
                let result = Expr::binary(op, pa.clone(), pb.clone());
                Parts {
                    cond: compare(
                        Expr::call("abs", vec![result.clone()]),
                        ret,
                        BinaryOp::GreaterEqual,
                        FLOAT_PRECISION_LIMIT,
                    ),
                    fallback: splat(ret, FLOAT_FALLBACK),
                    real: result,
                }
            }
            O::AddAssign | O::SubAssign | O::MulAssign => {
                let op = ob.op.binary_op().expect("arithmetic operator");
                let assign = ob.op.assign_op().expect("compound assignment");
                Parts {
                    cond: compare(
                        Expr::call("abs", vec![Expr::binary(op, pa.clone(), pb.clone())]),
                        a,
                        BinaryOp::GreaterEqual,
                        FLOAT_PRECISION_LIMIT,
                    ),
                    fallback: Expr::assign(AssignOp::Assign, pa.clone(), splat(a, FLOAT_FALLBACK)),
                    real: Expr::assign(assign, pa, pb),
                }
            }
            O::PreInc | O::PreDec | O::PostInc | O::PostDec => {
                let op = ob.op.binary_op().expect("increment operator");
                let unary: UnaryOp = ob.op.unary_op().expect("increment operator");
                Parts {
                    cond: compare(
                        Expr::call("abs", vec![Expr::binary(op, pa.clone(), Expr::float(1.0))]),
                        a,
                        BinaryOp::GreaterEqual,
                        FLOAT_PRECISION_LIMIT,
                    ),
                    fallback: Expr::assign(AssignOp::Assign, pa.clone(), splat(a, FLOAT_FALLBACK)),
                    real: Expr::unary(unary, pa),
                }
            }
        }
    }
}

fn record_branch(bit: i32) -> Stmt {
    Stmt::Expr(Expr::assign(
        AssignOp::BitOr,
        Expr::index(Expr::var(TRACE_MEMBER), Expr::var(ID_PARAM)),
        Expr::int(bit),
    ))
}

/// Body of the wrapper for `ob`, plus the wrappers that body calls.
pub(super) fn body(ob: &WrapperObligation, traced: bool) -> (Vec<Stmt>, Vec<WrapperObligation>) {
    let mut synth = Synth {
        traced,
        deps: Vec::new(),
    };
    let Parts {
        cond,
        fallback,
        real,
    } = synth.parts(ob);
    let body = if traced {
        vec![
            Stmt::If {
                cond,
                accept: Box::new(Stmt::Block(vec![
                    record_branch(1),
                    Stmt::Return(Some(fallback)),
                ])),
                reject: None,
            },
            record_branch(2),
            Stmt::Return(Some(real)),
        ]
    } else {
        vec![Stmt::Return(Some(Expr::ternary(cond, fallback, real)))]
    };
    (body, synth.deps)
}
