//! Type-aware choices of the generator: which operator or builtin may
//! produce a requested type and which operand types it then needs.

use crate::{
    ir::{BasicType, BinaryOp, ScalarKind, UnaryOp},
    randomext::{Randomness, RandomnessExt},
};

/// A builtin call shape: callee and the type of every argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltinChoice {
    pub callee: &'static str,
    pub args: Vec<BasicType>,
}

pub trait TypeStrategy: std::fmt::Debug {
    /// Type of a fresh local declaration.
    fn basic_type(&self, rng: &mut dyn Randomness) -> BasicType;

    /// Operator whose result is `target`, `None` if there is none.
    fn binary_op(&self, rng: &mut dyn Randomness, target: BasicType) -> Option<BinaryOp>;

    /// Operand types of `op` such that the result is `target`.
    fn operand_types(
        &self,
        rng: &mut dyn Randomness,
        op: BinaryOp,
        target: BasicType,
    ) -> (BasicType, BasicType);

    /// Side-effect free prefix operator over `target`.
    fn unary_op(&self, rng: &mut dyn Randomness, target: BasicType) -> Option<UnaryOp>;

    fn builtin(&self, rng: &mut dyn Randomness, target: BasicType) -> Option<BuiltinChoice>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTypeStrategy;

impl DefaultTypeStrategy {
    const ARITHMETIC: [BinaryOp; 4] = [
        BinaryOp::Add,
        BinaryOp::Subtract,
        BinaryOp::Multiply,
        BinaryOp::Divide,
    ];
    const INTEGER: [BinaryOp; 6] = [
        BinaryOp::Modulo,
        BinaryOp::BitAnd,
        BinaryOp::BitOr,
        BinaryOp::BitXor,
        BinaryOp::ShiftLeft,
        BinaryOp::ShiftRight,
    ];
    const BOOLEAN: [BinaryOp; 9] = [
        BinaryOp::LogicalAnd,
        BinaryOp::LogicalOr,
        BinaryOp::LogicalXor,
        BinaryOp::Equal,
        BinaryOp::NotEqual,
        BinaryOp::Less,
        BinaryOp::LessEqual,
        BinaryOp::Greater,
        BinaryOp::GreaterEqual,
    ];

    pub fn binary_ops(target: BasicType) -> Vec<BinaryOp> {
        match target.kind {
            ScalarKind::Bool if target.is_scalar() => Self::BOOLEAN.to_vec(),
            ScalarKind::Bool => Vec::new(),
            ScalarKind::Float => Self::ARITHMETIC.to_vec(),
            ScalarKind::Int | ScalarKind::Uint => {
                Self::ARITHMETIC.iter().chain(&Self::INTEGER).copied().collect()
            }
        }
    }

    pub fn unary_ops(target: BasicType) -> Vec<UnaryOp> {
        match target.kind {
            ScalarKind::Bool if target.is_scalar() => vec![UnaryOp::LogicalNot],
            ScalarKind::Bool => Vec::new(),
            ScalarKind::Float => vec![UnaryOp::Negate, UnaryOp::Plus],
            ScalarKind::Int | ScalarKind::Uint => {
                vec![UnaryOp::Negate, UnaryOp::Plus, UnaryOp::BitwiseNot]
            }
        }
    }

    pub fn builtins(target: BasicType) -> Vec<BuiltinChoice> {
        let choice = |callee, args: &[BasicType]| BuiltinChoice {
            callee,
            args: args.to_vec(),
        };
        let t = target;
        match t.kind {
            ScalarKind::Int | ScalarKind::Float => {
                let mut out = vec![
                    choice("abs", &[t]),
                    choice("min", &[t, t]),
                    choice("max", &[t, t]),
                    choice("clamp", &[t, t, t]),
                ];
                if t.kind == ScalarKind::Int {
                    out.push(choice("bitfieldExtract", &[t, BasicType::INT, BasicType::INT]));
                    out.push(choice(
                        "bitfieldInsert",
                        &[t, t, BasicType::INT, BasicType::INT],
                    ));
                }
                out
            }
            ScalarKind::Uint => vec![
                choice("min", &[t, t]),
                choice("max", &[t, t]),
                choice("clamp", &[t, t, t]),
                choice("bitfieldExtract", &[t, BasicType::INT, BasicType::INT]),
                choice("bitfieldInsert", &[t, t, BasicType::INT, BasicType::INT]),
            ],
            ScalarKind::Bool if t.is_scalar() => (2..=4)
                .flat_map(|size| {
                    let v = BasicType::make_vector(ScalarKind::Bool, size);
                    [choice("any", &[v]), choice("all", &[v])]
                })
                .collect(),
            ScalarKind::Bool => {
                let mut out = vec![choice("not", &[t])];
                for kind in [ScalarKind::Int, ScalarKind::Uint, ScalarKind::Float] {
                    let v = t.with_kind(kind);
                    for callee in [
                        "lessThan",
                        "lessThanEqual",
                        "greaterThan",
                        "greaterThanEqual",
                    ] {
                        out.push(choice(callee, &[v, v]));
                    }
                }
                for kind in ScalarKind::ALL {
                    let v = t.with_kind(kind);
                    out.push(choice("equal", &[v, v]));
                    out.push(choice("notEqual", &[v, v]));
                }
                out
            }
        }
    }
}

impl TypeStrategy for DefaultTypeStrategy {
    fn basic_type(&self, rng: &mut dyn Randomness) -> BasicType {
        let kind = *rng.choose(&ScalarKind::ALL);
        BasicType::make_vector(kind, rng.int_between(1, 5) as u8)
    }

    fn binary_op(&self, rng: &mut dyn Randomness, target: BasicType) -> Option<BinaryOp> {
        let ops = Self::binary_ops(target);
        (!ops.is_empty()).then(|| *rng.choose(&ops))
    }

    fn operand_types(
        &self,
        rng: &mut dyn Randomness,
        op: BinaryOp,
        target: BasicType,
    ) -> (BasicType, BasicType) {
        use BinaryOp as B;
        match op {
            op if op.is_logical() => (BasicType::BOOL, BasicType::BOOL),
            B::Equal | B::NotEqual => {
                let ty = self.basic_type(rng);
                (ty, ty)
            }
            op if op.is_comparison() => {
                let kind = *rng.choose(&[ScalarKind::Int, ScalarKind::Uint, ScalarKind::Float]);
                (BasicType::scalar(kind), BasicType::scalar(kind))
            }
            B::ShiftLeft | B::ShiftRight => {
                let kind = *rng.choose(&[ScalarKind::Int, ScalarKind::Uint]);
                (target, BasicType::scalar(kind))
            }
            B::Comma => (self.basic_type(rng), target),
            _ if target.is_vector() => match rng.int_below(3) {
                // a scalar on one side forces the full vector on the other
                0 => (target.element_type(), target),
                1 => (target, target.element_type()),
                _ => (target, target),
            },
            _ => (target, target),
        }
    }

    fn unary_op(&self, rng: &mut dyn Randomness, target: BasicType) -> Option<UnaryOp> {
        let ops = Self::unary_ops(target);
        (!ops.is_empty()).then(|| *rng.choose(&ops))
    }

    fn builtin(&self, rng: &mut dyn Randomness, target: BasicType) -> Option<BuiltinChoice> {
        let mut builtins = Self::builtins(target);
        if builtins.is_empty() {
            None
        } else {
            let idx = rng.index(builtins.len());
            Some(builtins.swap_remove(idx))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::typing::{binary_result, builtin_result},
        randomext::UniformRandom,
    };

    #[test]
    fn operand_types_produce_the_target() {
        let strategy = DefaultTypeStrategy;
        let mut rng = UniformRandom::with_seed(3);
        for target in BasicType::all() {
            for op in DefaultTypeStrategy::binary_ops(target) {
                for _ in 0..8 {
                    let (l, r) = strategy.operand_types(&mut rng, op, target);
                    assert_eq!(binary_result(op, l, r), Some(target), "{l} {op:?} {r}");
                }
            }
        }
    }

    #[test]
    fn builtins_are_well_typed() {
        for target in BasicType::all() {
            for choice in DefaultTypeStrategy::builtins(target) {
                assert_eq!(
                    builtin_result(choice.callee, &choice.args),
                    Some(target),
                    "{}",
                    choice.callee
                );
            }
        }
    }

    #[test]
    fn boolean_operators_compare_or_combine() {
        let ops = DefaultTypeStrategy::binary_ops(BasicType::BOOL);
        assert!(ops.iter().all(|op| op.is_comparison() || op.is_logical()));
        assert_eq!(ops.iter().filter(|op| op.is_logical()).count(), 3);
        assert!(!BinaryOp::BitAnd.is_logical());
        assert!(!BinaryOp::Comma.is_comparison());
    }

    #[test]
    fn boolean_vectors_have_no_operator() {
        let bvec = BasicType::make_vector(ScalarKind::Bool, 3);
        let mut rng = UniformRandom::with_seed(0);
        assert_eq!(DefaultTypeStrategy.binary_op(&mut rng, bvec), None);
        assert_eq!(DefaultTypeStrategy.unary_op(&mut rng, bvec), None);
        assert!(DefaultTypeStrategy.builtin(&mut rng, bvec).is_some());
    }
}
